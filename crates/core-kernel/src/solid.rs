//! Solid construction: primitives, sweeps, transforms, booleans, slicing.
//!
//! Every constructor returns a [`Manifold`] whose status the caller must
//! check; invalid input yields `InvalidConstruction` rather than an error.
//! Generators write consistent winding per construction and then a global
//! signed-volume pass guarantees outward orientation for the closed result.

use glam::{DMat3, DVec2, DVec3};

use crate::KernelStatus;
use crate::cross_section::{CrossSection, signed_area};
use crate::csg::{self, BooleanOp};
use crate::mesh::{MeshBuilder, MeshData};

/// Handle to a 3-D solid.
#[derive(Debug, Clone, Default)]
pub struct Manifold {
    mesh: MeshData,
    status: KernelStatus,
}

impl Manifold {
    pub fn invalid(status: KernelStatus) -> Self {
        Self {
            mesh: MeshData::empty(),
            status,
        }
    }

    fn from_closed(mesh: MeshData) -> Self {
        if mesh.is_empty() {
            return Self::invalid(KernelStatus::InvalidConstruction);
        }
        if mesh
            .vert_properties
            .iter()
            .any(|v| !v.is_finite())
        {
            return Self::invalid(KernelStatus::NonFiniteVertex);
        }
        let mut mesh = mesh;
        orient_outward(&mut mesh);
        Self {
            mesh,
            status: KernelStatus::NoError,
        }
    }

    pub fn status(&self) -> KernelStatus {
        self.status
    }

    pub fn mesh(&self) -> &MeshData {
        &self.mesh
    }

    /// Snapshot of the mesh, the shape handed to analysis and export.
    pub fn get_mesh(&self) -> MeshData {
        self.mesh.clone()
    }

    // ── Primitives ───────────────────────────────────────────────────────

    /// UV sphere: `segments` slices around and `segments` stacks top to
    /// bottom, which yields `2·n·(n−1)` triangles.
    pub fn sphere(radius: f64, segments: u32) -> Self {
        if !radius.is_finite() || radius <= 0.0 || segments < 3 {
            return Self::invalid(KernelStatus::InvalidConstruction);
        }
        let n = segments as usize;
        let point = |stack: usize, slice: usize| -> DVec3 {
            let phi = std::f64::consts::PI * stack as f64 / n as f64;
            let theta = std::f64::consts::TAU * (slice % n) as f64 / n as f64;
            DVec3::new(
                radius * phi.sin() * theta.cos(),
                radius * phi.sin() * theta.sin(),
                radius * phi.cos(),
            )
        };
        let mut b = MeshBuilder::new();
        for stack in 0..n {
            for slice in 0..n {
                let a = point(stack, slice);
                let c = point(stack, slice + 1);
                let d = point(stack + 1, slice + 1);
                let e = point(stack + 1, slice);
                // Degenerate pole triangles are dropped by the builder.
                b.triangle(a, c, d);
                b.triangle(a, d, e);
            }
        }
        Self::from_closed(b.finish())
    }

    /// Axis-aligned box, origin-anchored or centered.
    pub fn cube(size: DVec3, centered: bool) -> Self {
        if !size.is_finite() || size.min_element() <= 0.0 {
            return Self::invalid(KernelStatus::InvalidConstruction);
        }
        let o = if centered { -size * 0.5 } else { DVec3::ZERO };
        let corner = |mask: usize| -> DVec3 {
            DVec3::new(
                o.x + if mask & 1 != 0 { size.x } else { 0.0 },
                o.y + if mask & 2 != 0 { size.y } else { 0.0 },
                o.z + if mask & 4 != 0 { size.z } else { 0.0 },
            )
        };
        // Outward-wound index table over corners 0..7 (bit 1 = +x, 2 = +y, 4 = +z).
        const FACES: [[usize; 3]; 12] = [
            [0, 2, 3],
            [0, 3, 1], // z = 0
            [4, 5, 7],
            [4, 7, 6], // z = max
            [0, 1, 5],
            [0, 5, 4], // y = 0
            [1, 3, 7],
            [1, 7, 5], // x = max
            [3, 2, 6],
            [3, 6, 7], // y = max
            [2, 0, 4],
            [2, 4, 6], // x = 0
        ];
        let mut b = MeshBuilder::new();
        for f in FACES {
            b.triangle(corner(f[0]), corner(f[1]), corner(f[2]));
        }
        Self::from_closed(b.finish())
    }

    /// Cylinder or cone between two circular rings. A negative `radius_high`
    /// copies `radius_low`.
    pub fn cylinder(height: f64, radius_low: f64, radius_high: f64, segments: u32, centered: bool) -> Self {
        if !height.is_finite() || height <= 0.0 || !radius_low.is_finite() || radius_low <= 0.0 || segments < 3 {
            return Self::invalid(KernelStatus::InvalidConstruction);
        }
        let r_top = if radius_high < 0.0 { radius_low } else { radius_high };
        let n = segments as usize;
        let z0 = if centered { -height * 0.5 } else { 0.0 };
        let z1 = z0 + height;
        let ring = |radius: f64, z: f64, slice: usize| -> DVec3 {
            let theta = std::f64::consts::TAU * (slice % n) as f64 / n as f64;
            DVec3::new(radius * theta.cos(), radius * theta.sin(), z)
        };
        let mut b = MeshBuilder::new();
        for j in 0..n {
            let b0 = ring(radius_low, z0, j);
            let b1 = ring(radius_low, z0, j + 1);
            let t0 = ring(r_top, z1, j);
            let t1 = ring(r_top, z1, j + 1);
            b.triangle(b0, b1, t1);
            b.triangle(b0, t1, t0);
        }
        // Cap fans; the top one vanishes for a cone.
        for j in 1..n - 1 {
            b.triangle(ring(radius_low, z0, 0), ring(radius_low, z0, j + 1), ring(radius_low, z0, j));
            if r_top > 0.0 {
                b.triangle(ring(r_top, z1, 0), ring(r_top, z1, j), ring(r_top, z1, j + 1));
            }
        }
        Self::from_closed(b.finish())
    }

    // ── Sweeps ───────────────────────────────────────────────────────────

    /// Linear extrusion along +z with optional twist. `divisions` is the
    /// number of intermediate layers (minimum 1).
    pub fn extrude(section: &CrossSection, height: f64, divisions: u32, twist_degrees: f64) -> Self {
        if section.is_empty() || !height.is_finite() || height <= 0.0 {
            return Self::invalid(KernelStatus::InvalidConstruction);
        }
        let div = divisions.max(1) as usize;
        let mut b = MeshBuilder::new();
        let layer_point = |p: DVec2, k: usize| -> DVec3 {
            let f = k as f64 / div as f64;
            let a = (twist_degrees * f).to_radians();
            let (s, c) = a.sin_cos();
            DVec3::new(c * p.x - s * p.y, s * p.x + c * p.y, height * f)
        };
        for contour in section.contours() {
            let m = contour.len();
            for k in 0..div {
                for i in 0..m {
                    let p0 = contour[i];
                    let p1 = contour[(i + 1) % m];
                    let a = layer_point(p0, k);
                    let c = layer_point(p1, k);
                    let d = layer_point(p1, k + 1);
                    let e = layer_point(p0, k + 1);
                    b.triangle(a, c, d);
                    b.triangle(a, d, e);
                }
            }
        }
        for tri in triangulate_section(section) {
            // Bottom cap faces −z, top cap (twisted into place) faces +z.
            b.triangle(
                DVec3::new(tri[0].x, tri[0].y, 0.0),
                DVec3::new(tri[2].x, tri[2].y, 0.0),
                DVec3::new(tri[1].x, tri[1].y, 0.0),
            );
            b.triangle(
                layer_point(tri[0], div),
                layer_point(tri[1], div),
                layer_point(tri[2], div),
            );
        }
        Self::from_closed(b.finish())
    }

    /// Revolve the section (x ≥ 0 half) around the y axis, the result's z.
    /// `degrees` is clamped to (0°, 360°]; a partial sweep is capped.
    pub fn revolve(section: &CrossSection, segments: u32, degrees: f64) -> Self {
        if section.is_empty() || !degrees.is_finite() || degrees <= 0.0 || segments < 3 {
            return Self::invalid(KernelStatus::InvalidConstruction);
        }
        let sweep_deg = degrees.min(360.0);
        let full = (sweep_deg - 360.0).abs() < 1e-9;
        let m = segments as usize;
        let sweep = sweep_deg.to_radians();
        let station = |p: DVec2, s: usize| -> DVec3 {
            let x = p.x.max(0.0);
            let a = sweep * (if full { s % m } else { s }) as f64 / m as f64;
            DVec3::new(x * a.cos(), x * a.sin(), p.y)
        };
        let mut b = MeshBuilder::new();
        for contour in section.contours() {
            let v = contour.len();
            for s in 0..m {
                for i in 0..v {
                    let p0 = contour[i];
                    let p1 = contour[(i + 1) % v];
                    let a = station(p0, s);
                    let c = station(p1, s);
                    let d = station(p1, s + 1);
                    let e = station(p0, s + 1);
                    b.triangle(a, d, c);
                    b.triangle(a, e, d);
                }
            }
        }
        if !full {
            for tri in triangulate_section(section) {
                b.triangle(station(tri[0], 0), station(tri[1], 0), station(tri[2], 0));
                b.triangle(station(tri[0], m), station(tri[2], m), station(tri[1], m));
            }
        }
        Self::from_closed(b.finish())
    }

    // ── Transforms ───────────────────────────────────────────────────────

    pub fn translate(&self, d: DVec3) -> Self {
        self.mapped(|p| p + d)
    }

    /// Rotations applied in x, then y, then z order, degrees.
    pub fn rotate(&self, x_deg: f64, y_deg: f64, z_deg: f64) -> Self {
        let m = DMat3::from_rotation_z(z_deg.to_radians())
            * DMat3::from_rotation_y(y_deg.to_radians())
            * DMat3::from_rotation_x(x_deg.to_radians());
        self.mapped(|p| m * p)
    }

    pub fn scale(&self, s: DVec3) -> Self {
        self.mapped(|p| p * s)
    }

    fn mapped(&self, f: impl Fn(DVec3) -> DVec3) -> Self {
        if !self.status.is_ok() {
            return self.clone();
        }
        let mut mesh = self.mesh.clone();
        for i in 0..mesh.num_vert() {
            let p = f(mesh.pos(i as u32));
            let base = i * mesh.num_prop;
            mesh.vert_properties[base] = p.x as f32;
            mesh.vert_properties[base + 1] = p.y as f32;
            mesh.vert_properties[base + 2] = p.z as f32;
        }
        if mesh.vert_properties.iter().any(|v| !v.is_finite()) {
            return Self::invalid(KernelStatus::NonFiniteVertex);
        }
        orient_outward(&mut mesh);
        Self {
            mesh,
            status: KernelStatus::NoError,
        }
    }

    /// Midpoint-subdivide triangles until no edge exceeds the length bound
    /// implied by `tolerance`, with a pass cap to bound the blowup. The
    /// surface is piecewise planar, so this raises density without moving
    /// geometry.
    pub fn refine_to_tolerance(&self, tolerance: f64) -> Self {
        if !self.status.is_ok() || !tolerance.is_finite() || tolerance <= 0.0 {
            return self.clone();
        }
        let Some((mn, mx)) = self.mesh.bounds() else {
            return self.clone();
        };
        let diag = (mx - mn).length().max(1e-6);
        let target = (diag * tolerance).sqrt().max(diag * 1e-3);
        let mut mesh = self.mesh.clone();
        for _ in 0..6 {
            let mut longest: f64 = 0.0;
            for t in 0..mesh.num_tri() {
                let [a, b, c] = mesh.tri(t);
                let (pa, pb, pc) = (mesh.pos(a), mesh.pos(b), mesh.pos(c));
                longest = longest
                    .max((pb - pa).length())
                    .max((pc - pb).length())
                    .max((pa - pc).length());
            }
            if longest <= target {
                break;
            }
            let mut b4 = MeshBuilder::new();
            for t in 0..mesh.num_tri() {
                let [a, b, c] = mesh.tri(t);
                let (pa, pb, pc) = (mesh.pos(a), mesh.pos(b), mesh.pos(c));
                let ab = (pa + pb) * 0.5;
                let bc = (pb + pc) * 0.5;
                let ca = (pc + pa) * 0.5;
                b4.triangle(pa, ab, ca);
                b4.triangle(ab, pb, bc);
                b4.triangle(ca, bc, pc);
                b4.triangle(ab, bc, ca);
            }
            mesh = b4.finish();
        }
        Self {
            mesh,
            status: KernelStatus::NoError,
        }
    }

    // ── Booleans ─────────────────────────────────────────────────────────

    pub fn boolean(&self, other: &Manifold, op: BooleanOp) -> Self {
        if !self.status.is_ok() {
            return self.clone();
        }
        if !other.status.is_ok() {
            return other.clone();
        }
        let mesh = csg::boolean(&self.mesh, &other.mesh, op);
        if mesh.is_empty() {
            return Self::invalid(KernelStatus::InvalidConstruction);
        }
        Self {
            mesh,
            status: KernelStatus::NoError,
        }
    }

    /// n-ary union, the merge primitive behind `Union` records and scene
    /// merging.
    pub fn union_many(parts: &[Manifold]) -> Self {
        if parts.is_empty() {
            return Self::invalid(KernelStatus::InvalidConstruction);
        }
        for p in parts {
            if !p.status.is_ok() {
                return p.clone();
            }
        }
        let mut acc = parts[0].clone();
        for p in &parts[1..] {
            acc = acc.boolean(p, BooleanOp::Union);
            if !acc.status.is_ok() {
                return acc;
            }
        }
        acc
    }

    // ── Slicing ──────────────────────────────────────────────────────────

    /// Planar cross-section at height `z`, oriented so filled regions carry
    /// positive area.
    pub fn slice(&self, z: f64) -> CrossSection {
        if !self.status.is_ok() || self.mesh.is_empty() || !z.is_finite() {
            return CrossSection::empty();
        }
        slice_mesh(&self.mesh, z)
    }
}

/// Flip all windings if the signed volume is negative, making triangle
/// normals point outward for a closed mesh.
fn orient_outward(mesh: &mut MeshData) {
    let mut volume = 0.0;
    for t in 0..mesh.num_tri() {
        let [i0, i1, i2] = mesh.tri(t);
        let p0 = mesh.pos(i0);
        let p1 = mesh.pos(i1);
        let p2 = mesh.pos(i2);
        volume += p0.dot(p1.cross(p2));
    }
    if volume < 0.0 {
        for t in 0..mesh.num_tri() {
            mesh.tri_verts.swap(t * 3 + 1, t * 3 + 2);
        }
    }
}

/// Triangulate a section's shells (with their holes) into 2-D triangles.
fn triangulate_section(section: &CrossSection) -> Vec<[DVec2; 3]> {
    let contours = section.contours();
    let mut shells: Vec<(usize, Vec<usize>)> = Vec::new();
    let mut holes: Vec<usize> = Vec::new();
    for (i, c) in contours.iter().enumerate() {
        if signed_area(c) >= 0.0 {
            shells.push((i, Vec::new()));
        } else {
            holes.push(i);
        }
    }
    for h in holes {
        let probe = contours[h][0];
        if let Some(shell) = shells
            .iter_mut()
            .find(|(s, _)| point_in_polygon(probe, &contours[*s]))
        {
            shell.1.push(h);
        }
    }

    let mut out = Vec::new();
    for (shell, shell_holes) in shells {
        let mut flat: Vec<f64> = Vec::new();
        let mut points: Vec<DVec2> = Vec::new();
        let mut hole_starts: Vec<usize> = Vec::new();
        for &p in &contours[shell] {
            flat.extend_from_slice(&[p.x, p.y]);
            points.push(p);
        }
        for &h in &shell_holes {
            hole_starts.push(points.len());
            for &p in &contours[h] {
                flat.extend_from_slice(&[p.x, p.y]);
                points.push(p);
            }
        }
        let Ok(indices) = earcutr::earcut(&flat, &hole_starts, 2) else {
            continue;
        };
        for tri in indices.chunks_exact(3) {
            out.push([points[tri[0]], points[tri[1]], points[tri[2]]]);
        }
    }
    out
}

fn point_in_polygon(p: DVec2, poly: &[DVec2]) -> bool {
    let mut inside = false;
    let n = poly.len();
    for i in 0..n {
        let a = poly[i];
        let b = poly[(i + 1) % n];
        if (a.y > p.y) != (b.y > p.y) {
            let x = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
            if p.x < x {
                inside = !inside;
            }
        }
    }
    inside
}

/// Intersect every triangle with the plane `z`, orient the resulting
/// segments so material lies to the left, and chain them into loops.
fn slice_mesh(mesh: &MeshData, z: f64) -> CrossSection {
    let quant = |p: DVec2| -> (i64, i64) { ((p.x * 1e6).round() as i64, (p.y * 1e6).round() as i64) };
    let mut segments: Vec<(DVec2, DVec2)> = Vec::new();

    for t in 0..mesh.num_tri() {
        let [i0, i1, i2] = mesh.tri(t);
        let p = [mesh.pos(i0), mesh.pos(i1), mesh.pos(i2)];
        let d = [p[0].z - z, p[1].z - z, p[2].z - z];
        let mut hits: Vec<DVec2> = Vec::new();
        for e in 0..3 {
            let (a, b) = (e, (e + 1) % 3);
            if (d[a] > 0.0) != (d[b] > 0.0) {
                let f = d[a] / (d[a] - d[b]);
                let q = p[a] + (p[b] - p[a]) * f;
                hits.push(DVec2::new(q.x, q.y));
            }
        }
        if hits.len() != 2 || (hits[0] - hits[1]).length_squared() < 1e-18 {
            continue;
        }
        let normal = (p[1] - p[0]).cross(p[2] - p[0]);
        // Walk along z × n so the solid stays on the left of the contour.
        let along = DVec2::new(-normal.y, normal.x);
        let dir = hits[1] - hits[0];
        if dir.dot(along) >= 0.0 {
            segments.push((hits[0], hits[1]));
        } else {
            segments.push((hits[1], hits[0]));
        }
    }

    let mut by_start: std::collections::HashMap<(i64, i64), Vec<usize>> =
        std::collections::HashMap::new();
    for (i, seg) in segments.iter().enumerate() {
        by_start.entry(quant(seg.0)).or_default().push(i);
    }
    let mut used = vec![false; segments.len()];
    let mut contours: Vec<Vec<DVec2>> = Vec::new();
    for start in 0..segments.len() {
        if used[start] {
            continue;
        }
        let mut loop_pts = vec![segments[start].0];
        let mut cur = start;
        used[start] = true;
        loop {
            let end = segments[cur].1;
            let key = quant(end);
            if key == quant(loop_pts[0]) {
                contours.push(loop_pts);
                break;
            }
            let Some(next) = by_start
                .get(&key)
                .and_then(|cands| cands.iter().find(|&&i| !used[i]).copied())
            else {
                // Open chain: slicing grazed the surface; discard.
                break;
            };
            loop_pts.push(end);
            used[next] = true;
            cur = next;
            if loop_pts.len() > segments.len() + 1 {
                break;
            }
        }
    }
    CrossSection::from_polygons(contours)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sphere_triangle_count_formula() {
        for n in [4u32, 8, 16, 32] {
            let m = Manifold::sphere(20.0, n);
            assert!(m.status().is_ok());
            assert_eq!(m.mesh().num_tri() as u32, 2 * n * (n - 1), "segments {n}");
        }
    }

    #[test]
    fn sphere_rejects_nonpositive_radius() {
        assert_eq!(
            Manifold::sphere(0.0, 16).status(),
            KernelStatus::InvalidConstruction
        );
    }

    #[test]
    fn cube_is_twelve_triangles_with_expected_bounds() {
        let m = Manifold::cube(DVec3::new(4.0, 5.0, 6.0), false);
        assert_eq!(m.mesh().num_tri(), 12);
        let (mn, mx) = m.mesh().bounds().unwrap();
        assert_eq!(mn, DVec3::ZERO);
        assert_eq!(mx, DVec3::new(4.0, 5.0, 6.0));

        let c = Manifold::cube(DVec3::new(4.0, 4.0, 4.0), true);
        let (mn, mx) = c.mesh().bounds().unwrap();
        assert_eq!(mn, DVec3::splat(-2.0));
        assert_eq!(mx, DVec3::splat(2.0));
    }

    #[test]
    fn cube_volume_is_positive_after_orientation() {
        let m = Manifold::cube(DVec3::splat(2.0), true);
        let mesh = m.mesh();
        let mut volume = 0.0;
        for t in 0..mesh.num_tri() {
            let [a, b, c] = mesh.tri(t);
            volume += mesh.pos(a).dot(mesh.pos(b).cross(mesh.pos(c)));
        }
        assert!((volume / 6.0 - 8.0).abs() < 1e-6);
    }

    #[test]
    fn cylinder_triangle_count() {
        let m = Manifold::cylinder(20.0, 8.0, -1.0, 16, false);
        assert!(m.status().is_ok());
        assert_eq!(m.mesh().num_tri(), 4 * 16 - 4);
        let (mn, mx) = m.mesh().bounds().unwrap();
        assert!((mx.z - 20.0).abs() < 1e-6 && mn.z.abs() < 1e-6);
    }

    #[test]
    fn cone_drops_top_cap() {
        let m = Manifold::cylinder(10.0, 5.0, 0.0, 16, false);
        assert!(m.status().is_ok());
        assert_eq!(m.mesh().num_tri(), 2 * 16 - 2);
    }

    #[test]
    fn extrude_rect_makes_a_box() {
        let cs = CrossSection::rect(40.0, 20.0, true);
        let m = Manifold::extrude(&cs, 8.0, 1, 0.0);
        assert!(m.status().is_ok());
        let (mn, mx) = m.mesh().bounds().unwrap();
        assert!((mx.x - mn.x - 40.0).abs() < 1e-5);
        assert!((mx.y - mn.y - 20.0).abs() < 1e-5);
        assert!((mx.z - mn.z - 8.0).abs() < 1e-5);
        // 4 side quads + 2 caps of 2 triangles each.
        assert_eq!(m.mesh().num_tri(), 12);
    }

    #[test]
    fn extrude_of_empty_section_is_invalid() {
        let m = Manifold::extrude(&CrossSection::empty(), 8.0, 1, 0.0);
        assert_eq!(m.status(), KernelStatus::InvalidConstruction);
    }

    #[test]
    fn twisted_extrude_layers_multiply_side_triangles() {
        let cs = CrossSection::rect(10.0, 10.0, true);
        let straight = Manifold::extrude(&cs, 10.0, 1, 0.0);
        let twisted = Manifold::extrude(&cs, 10.0, 8, 45.0);
        assert!(twisted.mesh().num_tri() > straight.mesh().num_tri());
    }

    #[test]
    fn revolve_full_circle_has_no_caps() {
        // A square profile offset from the axis revolves into a torus-like
        // ring: every edge contributes segments × 2 triangles.
        let cs = CrossSection::rect(2.0, 2.0, true).translate(DVec2::new(6.0, 0.0));
        let m = Manifold::revolve(&cs, 24, 360.0);
        assert!(m.status().is_ok());
        assert_eq!(m.mesh().num_tri(), 4 * 24 * 2);
    }

    #[test]
    fn revolve_partial_is_capped_and_smaller() {
        let cs = CrossSection::rect(2.0, 2.0, true).translate(DVec2::new(6.0, 0.0));
        let full = Manifold::revolve(&cs, 24, 360.0);
        let half = Manifold::revolve(&cs, 12, 180.0);
        assert!(half.status().is_ok());
        assert!(half.mesh().num_tri() < full.mesh().num_tri());
        let (mn, _) = half.mesh().bounds().unwrap();
        // Half sweep stays in the y ≥ 0 half space (within tessellation slack).
        assert!(mn.y > -1e-6);
    }

    #[test]
    fn transforms_move_bounds() {
        let m = Manifold::cube(DVec3::splat(2.0), true).translate(DVec3::new(10.0, 0.0, 0.0));
        let (mn, mx) = m.mesh().bounds().unwrap();
        assert!((mn.x - 9.0).abs() < 1e-6 && (mx.x - 11.0).abs() < 1e-6);

        let s = Manifold::cube(DVec3::splat(2.0), true).scale(DVec3::new(2.0, 1.0, 1.0));
        let (mn, mx) = s.mesh().bounds().unwrap();
        assert!((mx.x - mn.x - 4.0).abs() < 1e-6);

        let r = Manifold::cube(DVec3::splat(2.0), true).rotate(0.0, 0.0, 90.0);
        assert!(r.status().is_ok());
    }

    #[test]
    fn union_of_disjoint_parts_keeps_all_triangles() {
        let a = Manifold::cube(DVec3::splat(2.0), true);
        let b = a.translate(DVec3::new(10.0, 0.0, 0.0));
        let u = Manifold::union_many(&[a.clone(), b]);
        assert!(u.status().is_ok());
        assert_eq!(u.mesh().num_tri(), 2 * a.mesh().num_tri());
    }

    #[test]
    fn union_of_invalid_part_propagates_status() {
        let a = Manifold::cube(DVec3::splat(2.0), true);
        let bad = Manifold::invalid(KernelStatus::NotManifold);
        assert_eq!(
            Manifold::union_many(&[a, bad]).status(),
            KernelStatus::NotManifold
        );
    }

    #[test]
    fn slice_of_cube_recovers_the_square() {
        let m = Manifold::cube(DVec3::new(4.0, 6.0, 10.0), true);
        let cs = m.slice(0.0);
        assert!(!cs.is_empty());
        let (mn, mx) = cs.bounds().unwrap();
        assert!((mx.x - mn.x - 4.0).abs() < 1e-5);
        assert!((mx.y - mn.y - 6.0).abs() < 1e-5);
        let area: f64 = cs.contours().iter().map(|c| signed_area(c)).sum();
        assert!((area - 24.0).abs() < 1e-4);
    }

    #[test]
    fn slice_outside_the_solid_is_empty() {
        let m = Manifold::cube(DVec3::splat(2.0), true);
        assert!(m.slice(5.0).is_empty());
    }
}
