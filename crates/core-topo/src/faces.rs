//! Face-region segmentation and primitive fitting.
//!
//! Triangles flood-fill into regions across edges whose dihedral angle
//! stays under the threshold. Each region gets three candidate fits
//! (plane, sphere, cylinder) with tolerances scaled from the bounding-box
//! diagonal; the admissible fit with the smallest normalized residual
//! names the region. Compatible adjacent regions (same primitive, matching
//! parameters) are merged with a union-find pass and refitted.

use std::collections::{HashMap, VecDeque};

use glam::DVec3;

use core_kernel::MeshData;

use crate::edge_key;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FacePrimitive {
    #[default]
    Unknown,
    Plane,
    Sphere,
    Cylinder,
}

impl FacePrimitive {
    pub fn name(self) -> &'static str {
        match self {
            Self::Plane => "Plane",
            Self::Sphere => "Sphere",
            Self::Cylinder => "Cylinder",
            Self::Unknown => "Unknown",
        }
    }
}

/// Fit parameters for one region; only the fields of the winning primitive
/// are meaningful.
#[derive(Debug, Clone)]
struct RegionFit {
    primitive: FacePrimitive,
    plane_n: DVec3,
    plane_d: f64,
    plane_rms: f64,
    sphere_c: DVec3,
    sphere_r: f64,
    sphere_rms: f64,
    cylinder_axis: DVec3,
    cylinder_point: DVec3,
    cylinder_r: f64,
    cylinder_rms: f64,
}

impl Default for RegionFit {
    fn default() -> Self {
        Self {
            primitive: FacePrimitive::Unknown,
            plane_n: DVec3::ZERO,
            plane_d: 0.0,
            plane_rms: f64::INFINITY,
            sphere_c: DVec3::ZERO,
            sphere_r: 0.0,
            sphere_rms: f64::INFINITY,
            cylinder_axis: DVec3::ZERO,
            cylinder_point: DVec3::ZERO,
            cylinder_r: 0.0,
            cylinder_rms: f64::INFINITY,
        }
    }
}

/// Segmentation result: `regions` partition the triangle set and
/// `tri_region[t]` names the region of triangle `t`.
#[derive(Debug, Default)]
pub struct FaceRegions {
    pub regions: Vec<Vec<u32>>,
    pub region_types: Vec<FacePrimitive>,
    pub tri_region: Vec<u32>,
}

struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] == x {
            return x;
        }
        let root = self.find(self.parent[x]);
        self.parent[x] = root;
        root
    }

    fn unite(&mut self, a: usize, b: usize) {
        let (mut a, mut b) = (self.find(a), self.find(b));
        if a == b {
            return;
        }
        if self.rank[a] < self.rank[b] {
            std::mem::swap(&mut a, &mut b);
        }
        self.parent[b] = a;
        if self.rank[a] == self.rank[b] {
            self.rank[a] += 1;
        }
    }
}

/// Gauss-Jordan solve of an n×n system with partial pivoting; the matrix
/// rows carry the augmented column.
fn solve_augmented<const N: usize, const M: usize>(m: &mut [[f64; M]; N]) -> Option<[f64; N]> {
    debug_assert_eq!(M, N + 1);
    for col in 0..N {
        let mut pivot = col;
        let mut best = m[col][col].abs();
        for row in col + 1..N {
            if m[row][col].abs() > best {
                best = m[row][col].abs();
                pivot = row;
            }
        }
        if best < 1e-14 {
            return None;
        }
        m.swap(pivot, col);
        let inv = 1.0 / m[col][col];
        for k in col..M {
            m[col][k] *= inv;
        }
        for row in 0..N {
            if row == col {
                continue;
            }
            let f = m[row][col];
            if f.abs() < 1e-16 {
                continue;
            }
            for k in col..M {
                m[row][k] -= f * m[col][k];
            }
        }
    }
    let mut out = [0.0; N];
    for i in 0..N {
        out[i] = m[i][N];
    }
    Some(out)
}

fn classify_region(
    tris: &[u32],
    centers: &[DVec3],
    normals: &[DVec3],
    plane_tol: f64,
    sphere_tol: f64,
    cylinder_tol: f64,
) -> RegionFit {
    let mut fit = RegionFit::default();
    if tris.is_empty() {
        return fit;
    }
    let count = tris.len() as f64;

    // Plane: centroid plus averaged normal.
    let mut centroid = DVec3::ZERO;
    let mut nsum = DVec3::ZERO;
    for &t in tris {
        centroid += centers[t as usize];
        nsum += normals[t as usize];
    }
    centroid /= count;
    fit.plane_n = nsum.normalize_or_zero();
    if fit.plane_n != DVec3::ZERO {
        fit.plane_d = -fit.plane_n.dot(centroid);
        let mut err2 = 0.0;
        for &t in tris {
            let dist = fit.plane_n.dot(centers[t as usize]) + fit.plane_d;
            err2 += dist * dist;
        }
        fit.plane_rms = (err2 / count).sqrt();
    }

    // Sphere: least squares over p = c + r·n.
    if tris.len() >= 6 {
        let mut ata = [[0.0f64; 4]; 4];
        let mut atb = [0.0f64; 4];
        for &t in tris {
            let p = centers[t as usize];
            let n = normals[t as usize];
            let rows = [
                [1.0, 0.0, 0.0, n.x, p.x],
                [0.0, 1.0, 0.0, n.y, p.y],
                [0.0, 0.0, 1.0, n.z, p.z],
            ];
            for row in rows {
                for i in 0..4 {
                    atb[i] += row[i] * row[4];
                    for j in 0..4 {
                        ata[i][j] += row[i] * row[j];
                    }
                }
            }
        }
        let mut aug = [[0.0f64; 5]; 4];
        for i in 0..4 {
            aug[i][..4].copy_from_slice(&ata[i]);
            aug[i][4] = atb[i];
        }
        if let Some(x) = solve_augmented(&mut aug) {
            if x[3].is_finite() && x[3] > 1e-9 {
                fit.sphere_c = DVec3::new(x[0], x[1], x[2]);
                fit.sphere_r = x[3];
                let mut err2 = 0.0;
                for &t in tris {
                    let est = fit.sphere_c + normals[t as usize] * fit.sphere_r;
                    err2 += (est - centers[t as usize]).length_squared();
                }
                fit.sphere_rms = (err2 / count).sqrt();
            }
        }
    }

    // Cylinder: axis from consecutive normal cross products, then a 2-D
    // circle fit in the orthogonal plane.
    if tris.len() >= 8 {
        let mut axis = DVec3::ZERO;
        for pair in tris.windows(2) {
            let c = normals[pair[0] as usize].cross(normals[pair[1] as usize]);
            if c.length() < 1e-8 {
                continue;
            }
            axis += if axis.dot(c) < 0.0 { -c } else { c };
        }
        axis = axis.normalize_or_zero();
        if axis.length() > 1e-8 {
            let helper = if axis.z.abs() < 0.9 { DVec3::Z } else { DVec3::X };
            let u = axis.cross(helper).normalize_or_zero();
            let v = axis.cross(u);

            let mut ata = [[0.0f64; 3]; 3];
            let mut atb = [0.0f64; 3];
            for &t in tris {
                let p = centers[t as usize];
                let x = p.dot(u);
                let y = p.dot(v);
                let row = [x, y, 1.0];
                let rhs = -(x * x + y * y);
                for i in 0..3 {
                    atb[i] += row[i] * rhs;
                    for j in 0..3 {
                        ata[i][j] += row[i] * row[j];
                    }
                }
            }
            let mut aug = [[0.0f64; 4]; 3];
            for i in 0..3 {
                aug[i][..3].copy_from_slice(&ata[i]);
                aug[i][3] = atb[i];
            }
            if let Some(x) = solve_augmented(&mut aug) {
                let cx = -0.5 * x[0];
                let cy = -0.5 * x[1];
                let rr = cx * cx + cy * cy - x[2];
                if rr.is_finite() && rr > 1e-12 {
                    let r = rr.sqrt();
                    let c3 = u * cx + v * cy;
                    let mut rad_err2 = 0.0;
                    let mut ndot_err2 = 0.0;
                    for &t in tris {
                        let d = centers[t as usize] - c3;
                        let radial = d - axis * d.dot(axis);
                        let re = radial.length() - r;
                        rad_err2 += re * re;
                        let na = normals[t as usize].dot(axis);
                        ndot_err2 += na * na;
                    }
                    let radial_rms = (rad_err2 / count).sqrt();
                    let normal_rms = (ndot_err2 / count).sqrt();
                    fit.cylinder_axis = axis;
                    fit.cylinder_point = c3;
                    fit.cylinder_r = r;
                    fit.cylinder_rms =
                        (radial_rms * radial_rms + (normal_rms * r) * (normal_rms * r)).sqrt();
                }
            }
        }
    }

    // Admissible fit with the smallest tolerance-normalized residual wins.
    let norm = |rms: f64, tol: f64| rms / if tol > 1e-12 { tol } else { 1.0 };
    let plane_ok = fit.plane_rms <= plane_tol;
    let sphere_ok = fit.sphere_rms <= sphere_tol;
    let cyl_ok = fit.cylinder_rms <= cylinder_tol;
    let mut best = f64::INFINITY;
    fit.primitive = FacePrimitive::Unknown;
    if plane_ok && norm(fit.plane_rms, plane_tol) < best {
        best = norm(fit.plane_rms, plane_tol);
        fit.primitive = FacePrimitive::Plane;
    }
    if sphere_ok && norm(fit.sphere_rms, sphere_tol) < best {
        best = norm(fit.sphere_rms, sphere_tol);
        fit.primitive = FacePrimitive::Sphere;
    }
    if cyl_ok && norm(fit.cylinder_rms, cylinder_tol) < best {
        fit.primitive = FacePrimitive::Cylinder;
    }
    fit
}

fn compatible_for_merge(
    a: &RegionFit,
    b: &RegionFit,
    plane_tol: f64,
    sphere_tol: f64,
    cylinder_tol: f64,
) -> bool {
    let dot_tol = 8.0f64.to_radians().cos();
    match (a.primitive, b.primitive) {
        (FacePrimitive::Plane, FacePrimitive::Plane) => {
            let mut bn = b.plane_n;
            let mut bd = b.plane_d;
            if a.plane_n.dot(bn) < 0.0 {
                bn = -bn;
                bd = -bd;
            }
            if a.plane_n.dot(bn) < dot_tol {
                return false;
            }
            (a.plane_d - bd).abs() <= plane_tol * 1.5
        }
        (FacePrimitive::Sphere, FacePrimitive::Sphere) => {
            a.sphere_c.distance(b.sphere_c) <= sphere_tol * 2.0
                && (a.sphere_r - b.sphere_r).abs() <= sphere_tol * 2.0
        }
        (FacePrimitive::Cylinder, FacePrimitive::Cylinder) => {
            let mut ba = b.cylinder_axis;
            if a.cylinder_axis.dot(ba) < 0.0 {
                ba = -ba;
            }
            if a.cylinder_axis.dot(ba) < dot_tol {
                return false;
            }
            if (a.cylinder_r - b.cylinder_r).abs() > cylinder_tol * 2.0 {
                return false;
            }
            let delta = b.cylinder_point - a.cylinder_point;
            delta.cross(a.cylinder_axis).length() <= cylinder_tol * 2.5
        }
        _ => false,
    }
}

/// Segment the mesh into primitive-fitted face regions.
pub fn detect_mesh_faces(mesh: &MeshData, max_dihedral_degrees: f64) -> FaceRegions {
    let mut out = FaceRegions::default();
    let tri_count = mesh.num_tri();
    if tri_count == 0 || mesh.num_prop < 3 {
        return out;
    }

    let mut tri_normal = Vec::with_capacity(tri_count);
    let mut tri_center = Vec::with_capacity(tri_count);
    let mut bmin = mesh.pos(mesh.tri_verts[0]);
    let mut bmax = bmin;
    for t in 0..tri_count {
        let [i0, i1, i2] = mesh.tri(t);
        let (p0, p1, p2) = (mesh.pos(i0), mesh.pos(i1), mesh.pos(i2));
        tri_normal.push((p1 - p0).cross(p2 - p0).normalize_or_zero());
        tri_center.push((p0 + p1 + p2) / 3.0);
        for p in [p0, p1, p2] {
            bmin = bmin.min(p);
            bmax = bmax.max(p);
        }
    }
    let bbox_diag = (bmax - bmin).length().max(1e-6);
    let plane_tol = (bbox_diag * 0.003).max(1e-5);
    let sphere_tol = (bbox_diag * 0.005).max(1e-5);
    let cylinder_tol = (bbox_diag * 0.0055).max(1e-5);

    // Triangle adjacency through shared edges.
    let mut edge_to_tris: HashMap<u64, Vec<u32>> = HashMap::with_capacity(tri_count * 2);
    for t in 0..tri_count {
        let [i0, i1, i2] = mesh.tri(t);
        for (a, b) in [(i0, i1), (i1, i2), (i2, i0)] {
            edge_to_tris.entry(edge_key(a, b)).or_default().push(t as u32);
        }
    }
    let mut neighbors: Vec<Vec<u32>> = vec![Vec::new(); tri_count];
    for tris in edge_to_tris.values() {
        for i in 0..tris.len() {
            for j in i + 1..tris.len() {
                neighbors[tris[i] as usize].push(tris[j]);
                neighbors[tris[j] as usize].push(tris[i]);
            }
        }
    }
    for adj in &mut neighbors {
        adj.sort_unstable();
        adj.dedup();
    }

    // Flood fill by dihedral threshold; every triangle lands in exactly
    // one region.
    let threshold = max_dihedral_degrees.to_radians().cos();
    let mut tri_region = vec![usize::MAX; tri_count];
    let mut regions: Vec<Vec<u32>> = Vec::new();
    let mut queue = VecDeque::new();
    for seed in 0..tri_count {
        if tri_region[seed] != usize::MAX {
            continue;
        }
        let region_id = regions.len();
        regions.push(Vec::new());
        tri_region[seed] = region_id;
        queue.push_back(seed as u32);
        while let Some(tri) = queue.pop_front() {
            regions[region_id].push(tri);
            for &nb in &neighbors[tri as usize] {
                if tri_region[nb as usize] != usize::MAX {
                    continue;
                }
                if tri_normal[tri as usize].dot(tri_normal[nb as usize]) < threshold {
                    continue;
                }
                tri_region[nb as usize] = region_id;
                queue.push_back(nb);
            }
        }
    }

    // Region adjacency across region boundaries.
    let mut region_adj: Vec<(usize, usize)> = Vec::new();
    for t in 0..tri_count {
        let a = tri_region[t];
        for &nb in &neighbors[t] {
            let b = tri_region[nb as usize];
            if a != b {
                region_adj.push((a.min(b), a.max(b)));
            }
        }
    }
    region_adj.sort_unstable();
    region_adj.dedup();

    let fits: Vec<RegionFit> = regions
        .iter()
        .map(|r| classify_region(r, &tri_center, &tri_normal, plane_tol, sphere_tol, cylinder_tol))
        .collect();

    let mut dsu = DisjointSet::new(regions.len());
    for &(a, b) in &region_adj {
        if compatible_for_merge(&fits[a], &fits[b], plane_tol, sphere_tol, cylinder_tol) {
            dsu.unite(a, b);
        }
    }

    // Rebuild regions from union-find roots and refit the merged sets.
    let mut root_to_new: HashMap<usize, usize> = HashMap::new();
    let mut merged: Vec<Vec<u32>> = Vec::new();
    out.tri_region = vec![0; tri_count];
    for t in 0..tri_count {
        let root = dsu.find(tri_region[t]);
        let id = *root_to_new.entry(root).or_insert_with(|| {
            merged.push(Vec::new());
            merged.len() - 1
        });
        out.tri_region[t] = id as u32;
        merged[id].push(t as u32);
    }
    out.region_types = merged
        .iter()
        .map(|r| {
            classify_region(r, &tri_center, &tri_normal, plane_tol, sphere_tol, cylinder_tol)
                .primitive
        })
        .collect();
    out.regions = merged;
    out
}

/// Intersect every triangle and return the region id of the nearest hit.
pub fn pick_face_region_by_ray(
    mesh: &MeshData,
    faces: &FaceRegions,
    ray_origin: DVec3,
    ray_dir: DVec3,
) -> Option<(u32, f64)> {
    let tri_count = mesh.num_tri();
    if tri_count == 0 || faces.tri_region.len() != tri_count {
        return None;
    }
    let dir = ray_dir.normalize_or_zero();
    let mut best: Option<(u32, f64)> = None;
    for t in 0..tri_count {
        let [i0, i1, i2] = mesh.tri(t);
        let Some(hit) =
            ray_triangle_t(ray_origin, dir, mesh.pos(i0), mesh.pos(i1), mesh.pos(i2))
        else {
            continue;
        };
        if best.is_none_or(|(_, bt)| hit < bt) {
            best = Some((faces.tri_region[t], hit));
        }
    }
    best
}

fn ray_triangle_t(orig: DVec3, dir: DVec3, v0: DVec3, v1: DVec3, v2: DVec3) -> Option<f64> {
    let e1 = v1 - v0;
    let e2 = v2 - v0;
    let p = dir.cross(e2);
    let det = e1.dot(p);
    if det.abs() < 1e-12 {
        return None;
    }
    let inv = 1.0 / det;
    let tvec = orig - v0;
    let u = tvec.dot(p) * inv;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = tvec.cross(e1);
    let v = dir.dot(q) * inv;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = e2.dot(q) * inv;
    (t > 1e-9).then_some(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::solid::Manifold;
    use glam::DVec3 as V;

    #[test]
    fn cube_faces_partition_into_six_planes() {
        let m = Manifold::cube(V::splat(4.0), true);
        let faces = detect_mesh_faces(m.mesh(), 40.0);
        assert_eq!(faces.regions.len(), 6);
        assert!(faces.region_types.iter().all(|&t| t == FacePrimitive::Plane));

        // Partition: every triangle in exactly one region.
        let total: usize = faces.regions.iter().map(Vec::len).sum();
        assert_eq!(total, m.mesh().num_tri());
        let mut seen = vec![false; m.mesh().num_tri()];
        for (rid, region) in faces.regions.iter().enumerate() {
            for &t in region {
                assert!(!seen[t as usize], "triangle {t} in two regions");
                seen[t as usize] = true;
                assert_eq!(faces.tri_region[t as usize] as usize, rid);
            }
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn sphere_segments_into_one_spherical_region() {
        // Fine enough that triangle normals track the radial direction
        // within the sphere-fit tolerance.
        let m = Manifold::sphere(20.0, 128);
        let faces = detect_mesh_faces(m.mesh(), 40.0);
        assert_eq!(faces.regions.len(), 1);
        assert_eq!(faces.region_types[0], FacePrimitive::Sphere);
    }

    #[test]
    fn cylinder_wall_classifies_as_cylinder() {
        let m = Manifold::cylinder(20.0, 8.0, -1.0, 48, false);
        let faces = detect_mesh_faces(m.mesh(), 40.0);
        // Two planar caps plus the wall.
        assert_eq!(faces.regions.len(), 3);
        let mut types = faces.region_types.clone();
        types.sort_by_key(|t| t.name());
        assert_eq!(
            types,
            vec![FacePrimitive::Cylinder, FacePrimitive::Plane, FacePrimitive::Plane]
        );
    }

    #[test]
    fn face_pick_returns_the_facing_region() {
        let m = Manifold::cube(V::splat(4.0), true);
        let faces = detect_mesh_faces(m.mesh(), 40.0);
        let (region, t) = pick_face_region_by_ray(
            m.mesh(),
            &faces,
            V::new(10.0, 0.3, 0.2),
            V::new(-1.0, 0.0, 0.0),
        )
        .expect("ray hits the cube");
        assert!((t - 8.0).abs() < 1e-6);
        assert_eq!(faces.region_types[region as usize], FacePrimitive::Plane);
        // The region's triangles all face +x.
        for &tri in &faces.regions[region as usize] {
            let [i0, i1, i2] = m.mesh().tri(tri as usize);
            let n = (m.mesh().pos(i1) - m.mesh().pos(i0))
                .cross(m.mesh().pos(i2) - m.mesh().pos(i0))
                .normalize();
            assert!(n.x > 0.9);
        }
    }

    #[test]
    fn empty_mesh_yields_no_regions() {
        let faces = detect_mesh_faces(&MeshData::empty(), 40.0);
        assert!(faces.regions.is_empty());
        assert!(pick_face_region_by_ray(
            &MeshData::empty(),
            &faces,
            V::ZERO,
            V::X
        )
        .is_none());
    }
}
