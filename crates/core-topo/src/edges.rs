//! Edge topology and feature chains.
//!
//! Chains are maximal runs of candidate edges joined end-to-end under a
//! turn-angle rule. Extraction first roots chains at vertices whose
//! candidate degree is not exactly 2 (endpoints and junctions), then covers
//! leftover interior loops. Short noisy chains are filtered by total length
//! and segment count unless they touch the preserve mask; if nothing
//! qualifies, the single longest chain is kept so the display always has
//! something to draw.

use std::collections::HashMap;

use glam::DVec3;

use core_kernel::MeshData;

use crate::{EdgeClass, edge_key, point_ray_distance};
use crate::silhouette::SilhouetteResult;

/// One unordered mesh edge with up to two incident triangles and their
/// cached normals.
#[derive(Debug, Clone, Copy)]
pub struct EdgeRecord {
    pub v0: u32,
    pub v1: u32,
    pub tri_a: Option<u32>,
    pub tri_b: Option<u32>,
    pub normal_a: DVec3,
    pub normal_b: DVec3,
}

impl EdgeRecord {
    pub fn other_vertex(&self, v: u32) -> u32 {
        if self.v0 == v { self.v1 } else { self.v0 }
    }
}

/// Result of [`build_edge_topology`]. Index lists only name kept edges.
#[derive(Debug, Default)]
pub struct EdgeTopology {
    pub edges: Vec<EdgeRecord>,
    pub flags: Vec<EdgeClass>,
    pub edge_lengths: Vec<f64>,
    pub sharp_edges: Vec<usize>,
    pub boundary_edges: Vec<usize>,
    pub non_manifold_edges: Vec<usize>,
    pub feature_chains: Vec<Vec<usize>>,
    /// Per-edge back-pointer into `feature_chains` for kept edges.
    pub edge_feature_chain: Vec<Option<u32>>,
}

pub(crate) struct ChainExtraction {
    pub chains: Vec<Vec<usize>>,
    pub kept: Vec<bool>,
}

fn edge_dir_from_vertex(mesh: &MeshData, e: &EdgeRecord, from: u32) -> DVec3 {
    (mesh.pos(e.other_vertex(from)) - mesh.pos(from)).normalize_or_zero()
}

/// Greedy chain walk over the candidate mask. Shared by feature and
/// silhouette extraction.
pub(crate) fn extract_chains(
    mesh: &MeshData,
    edges: &[EdgeRecord],
    include: &[bool],
    max_turn_deg: f64,
    edge_lengths: &[f64],
    min_chain_length: f64,
    min_segments: usize,
    preserve: Option<&[bool]>,
) -> ChainExtraction {
    let mut out = ChainExtraction {
        chains: Vec::new(),
        kept: vec![false; edges.len()],
    };
    let num_verts = mesh.num_vert();
    if edges.is_empty() || include.len() != edges.len() || num_verts == 0 {
        return out;
    }

    let mut incident: Vec<Vec<usize>> = vec![Vec::new(); num_verts];
    let mut degree = vec![0usize; num_verts];
    for (i, e) in edges.iter().enumerate() {
        if !include[i] || e.v0 as usize >= num_verts || e.v1 as usize >= num_verts {
            continue;
        }
        incident[e.v0 as usize].push(i);
        incident[e.v1 as usize].push(i);
        degree[e.v0 as usize] += 1;
        degree[e.v1 as usize] += 1;
    }

    let min_cos = max_turn_deg.to_radians().cos();
    let mut visited = vec![false; edges.len()];

    let choose_next = |at: u32, cur: usize, incoming: DVec3, visited: &[bool]| -> Option<usize> {
        let mut best = None;
        let mut best_score = -2.0;
        for &cand in &incident[at as usize] {
            if cand == cur || !include[cand] || visited[cand] {
                continue;
            }
            let out_dir = edge_dir_from_vertex(mesh, &edges[cand], at);
            let score = incoming.dot(out_dir);
            if score > best_score {
                best_score = score;
                best = Some(cand);
            }
        }
        (best_score >= min_cos).then_some(best).flatten()
    };

    let trace = |start_edge: usize, start_vertex: u32, visited: &mut Vec<bool>| -> Vec<usize> {
        let mut chain = Vec::new();
        let mut cur = start_edge;
        let mut from = start_vertex;
        loop {
            if visited[cur] {
                break;
            }
            visited[cur] = true;
            chain.push(cur);
            let e = &edges[cur];
            let to = e.other_vertex(from);
            let incoming = edge_dir_from_vertex(mesh, e, from);
            match choose_next(to, cur, incoming, visited) {
                Some(next) => {
                    from = to;
                    cur = next;
                }
                None => break,
            }
        }
        chain
    };

    // Endpoint-rooted chains first, then leftover interior loops.
    for i in 0..edges.len() {
        if !include[i] || visited[i] {
            continue;
        }
        let e = &edges[i];
        let end0 = degree[e.v0 as usize] != 2;
        let end1 = degree[e.v1 as usize] != 2;
        if !end0 && !end1 {
            continue;
        }
        let start = if end0 { e.v0 } else { e.v1 };
        let chain = trace(i, start, &mut visited);
        if !chain.is_empty() {
            out.chains.push(chain);
        }
    }
    for i in 0..edges.len() {
        if !include[i] || visited[i] {
            continue;
        }
        let chain = trace(i, edges[i].v0, &mut visited);
        if !chain.is_empty() {
            out.chains.push(chain);
        }
    }

    let mut longest = (-1.0f64, None::<usize>);
    for (ci, chain) in out.chains.iter().enumerate() {
        let mut chain_len = 0.0;
        let mut preserved = false;
        for &ei in chain {
            chain_len += edge_lengths[ei];
            if preserve.is_some_and(|m| m[ei]) {
                preserved = true;
            }
        }
        if chain_len > longest.0 {
            longest = (chain_len, Some(ci));
        }
        if (chain.len() < min_segments || chain_len < min_chain_length) && !preserved {
            continue;
        }
        for &ei in chain {
            out.kept[ei] = true;
        }
    }

    if !out.kept.iter().any(|&k| k) {
        if let Some(ci) = longest.1 {
            for &ei in &out.chains[ci] {
                out.kept[ei] = true;
            }
        }
    }
    out
}

/// Build edge ↔ triangle adjacency, classify edges, and chain features.
pub fn build_edge_topology(mesh: &MeshData, sharp_angle_deg: f64) -> EdgeTopology {
    let mut out = EdgeTopology::default();
    let tri_count = mesh.num_tri();
    if tri_count == 0 || mesh.num_prop < 3 {
        return out;
    }

    let mut tri_normal = Vec::with_capacity(tri_count);
    let mut bmin = mesh.pos(mesh.tri_verts[0]);
    let mut bmax = bmin;
    for t in 0..tri_count {
        let [i0, i1, i2] = mesh.tri(t);
        let (p0, p1, p2) = (mesh.pos(i0), mesh.pos(i1), mesh.pos(i2));
        tri_normal.push((p1 - p0).cross(p2 - p0).normalize_or_zero());
        for p in [p0, p1, p2] {
            bmin = bmin.min(p);
            bmax = bmax.max(p);
        }
    }
    let bbox_diag = (bmax - bmin).length().max(1e-6);

    let mut edge_to_tris: HashMap<u64, Vec<u32>> = HashMap::with_capacity(tri_count * 2);
    for t in 0..tri_count {
        let [i0, i1, i2] = mesh.tri(t);
        for (a, b) in [(i0, i1), (i1, i2), (i2, i0)] {
            edge_to_tris.entry(edge_key(a, b)).or_default().push(t as u32);
        }
    }
    let mut keys: Vec<u64> = edge_to_tris.keys().copied().collect();
    keys.sort_unstable();

    let sharp_cos = sharp_angle_deg.to_radians().cos();
    for key in keys {
        let tris = &edge_to_tris[&key];
        let v0 = (key >> 32) as u32;
        let v1 = (key & 0xffff_ffff) as u32;
        let mut rec = EdgeRecord {
            v0,
            v1,
            tri_a: None,
            tri_b: None,
            normal_a: DVec3::ZERO,
            normal_b: DVec3::ZERO,
        };
        if let Some(&t) = tris.first() {
            rec.tri_a = Some(t);
            rec.normal_a = tri_normal[t as usize];
        }
        if let Some(&t) = tris.get(1) {
            rec.tri_b = Some(t);
            rec.normal_b = tri_normal[t as usize];
        }

        let mut flags = EdgeClass::empty();
        match tris.len() {
            1 => flags |= EdgeClass::BOUNDARY,
            2 => {
                let d = tri_normal[tris[0] as usize].dot(tri_normal[tris[1] as usize]);
                if d.is_finite() && d < sharp_cos {
                    flags |= EdgeClass::SHARP;
                }
            }
            _ => flags |= EdgeClass::NON_MANIFOLD,
        }

        out.edge_lengths.push((mesh.pos(v1) - mesh.pos(v0)).length());
        out.edges.push(rec);
        out.flags.push(flags);
    }

    // Sharp edges shorter than a quarter of the median length are
    // tessellation noise, not features.
    let mut sorted = out.edge_lengths.clone();
    sorted.sort_by(f64::total_cmp);
    let median = sorted.get(sorted.len() / 2).copied().unwrap_or(0.0);
    let min_sharp_len = (median * 0.25).max(1e-8);

    let mut feature = vec![false; out.edges.len()];
    let mut preserve = vec![false; out.edges.len()];
    for i in 0..out.edges.len() {
        let flags = out.flags[i];
        if flags.intersects(EdgeClass::BOUNDARY | EdgeClass::NON_MANIFOLD) {
            feature[i] = true;
            preserve[i] = true;
            continue;
        }
        if flags.contains(EdgeClass::SHARP) && out.edge_lengths[i] >= min_sharp_len {
            feature[i] = true;
        }
    }

    let min_chain_len = (bbox_diag * 0.015).max(1e-4);
    let extraction = extract_chains(
        mesh,
        &out.edges,
        &feature,
        35.0,
        &out.edge_lengths,
        min_chain_len,
        2,
        Some(&preserve),
    );

    out.edge_feature_chain = vec![None; out.edges.len()];
    for (i, &kept) in extraction.kept.iter().enumerate() {
        if !kept {
            continue;
        }
        let flags = out.flags[i];
        if flags.contains(EdgeClass::SHARP) {
            out.sharp_edges.push(i);
        }
        if flags.contains(EdgeClass::BOUNDARY) {
            out.boundary_edges.push(i);
        }
        if flags.contains(EdgeClass::NON_MANIFOLD) {
            out.non_manifold_edges.push(i);
        }
    }

    for chain in extraction.chains {
        let kept: Vec<usize> = chain.into_iter().filter(|&ei| extraction.kept[ei]).collect();
        if kept.is_empty() {
            continue;
        }
        let chain_id = out.feature_chains.len() as u32;
        for &ei in &kept {
            out.edge_feature_chain[ei] = Some(chain_id);
        }
        out.feature_chains.push(kept);
    }

    out
}

/// Pick the candidate edge closest to the ray: endpoints and midpoint are
/// tested against a caller-supplied radius; ties break by smaller `t`,
/// then by miss distance. Returns the edge index and its hit distance.
pub fn pick_edge_by_ray(
    mesh: &MeshData,
    topo: &EdgeTopology,
    silhouette: &SilhouetteResult,
    ray_origin: DVec3,
    ray_dir: DVec3,
    pick_radius: f64,
) -> Option<(usize, f64)> {
    if mesh.num_prop < 3 || topo.edges.is_empty() {
        return None;
    }
    let dir = ray_dir.normalize_or_zero();
    if dir == DVec3::ZERO {
        return None;
    }

    let mut candidate = vec![false; topo.edges.len()];
    for list in [
        &topo.sharp_edges,
        &topo.boundary_edges,
        &topo.non_manifold_edges,
        &silhouette.silhouette_edges,
    ] {
        for &i in list.iter() {
            if i < candidate.len() {
                candidate[i] = true;
            }
        }
    }

    let mut best: Option<(usize, f64, f64)> = None;
    for (i, e) in topo.edges.iter().enumerate() {
        if !candidate[i] {
            continue;
        }
        let p0 = mesh.pos(e.v0);
        let p1 = mesh.pos(e.v1);
        let h0 = point_ray_distance(p0, ray_origin, dir);
        let h1 = point_ray_distance(p1, ray_origin, dir);
        let (mut t, mut d) = match (h0, h1) {
            (Some((t0, d0)), Some((t1, d1))) => (t0.min(t1), d0.min(d1)),
            (Some(h), None) | (None, Some(h)) => h,
            (None, None) => continue,
        };
        if let Some((tm, dm)) = point_ray_distance((p0 + p1) * 0.5, ray_origin, dir) {
            t = t.min(tm);
            d = d.min(dm);
        }
        if d > pick_radius {
            continue;
        }
        let better = match best {
            None => true,
            Some((_, bt, bd)) => t < bt || ((t - bt).abs() <= 1e-9 && d < bd),
        };
        if better {
            best = Some((i, t, d));
        }
    }
    best.map(|(i, t, _)| (i, t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::cross_section::CrossSection;
    use core_kernel::solid::Manifold;
    use glam::DVec3 as V;

    fn single_quad() -> MeshData {
        MeshData {
            num_prop: 3,
            vert_properties: vec![
                0.0, 0.0, 0.0, //
                2.0, 0.0, 0.0, //
                2.0, 2.0, 0.0, //
                0.0, 2.0, 0.0,
            ],
            tri_verts: vec![0, 1, 2, 0, 2, 3],
        }
    }

    #[test]
    fn quad_classifies_boundary_and_flat_interior() {
        let topo = build_edge_topology(&single_quad(), 30.0);
        assert_eq!(topo.edges.len(), 5);
        let boundary = topo
            .flags
            .iter()
            .filter(|f| f.contains(EdgeClass::BOUNDARY))
            .count();
        assert_eq!(boundary, 4);
        // The shared diagonal is flat, neither boundary nor sharp.
        assert_eq!(
            topo.flags
                .iter()
                .filter(|f| f.intersects(EdgeClass::SHARP | EdgeClass::NON_MANIFOLD))
                .count(),
            0
        );
    }

    #[test]
    fn every_boundary_edge_lands_in_exactly_one_kept_chain() {
        let topo = build_edge_topology(&single_quad(), 30.0);
        assert_eq!(topo.boundary_edges.len(), 4);
        for &i in &topo.boundary_edges {
            let chain = topo.edge_feature_chain[i].expect("boundary edge must be kept");
            assert!(topo.feature_chains[chain as usize].contains(&i));
            // No other chain may claim it.
            let claims = topo
                .feature_chains
                .iter()
                .filter(|c| c.contains(&i))
                .count();
            assert_eq!(claims, 1);
        }
    }

    #[test]
    fn cube_edges_are_sharp_and_diagonals_are_not() {
        let m = Manifold::cube(V::splat(2.0), true);
        let topo = build_edge_topology(m.mesh(), 30.0);
        assert_eq!(topo.edges.len(), 18);
        let sharp = topo
            .flags
            .iter()
            .filter(|f| f.contains(EdgeClass::SHARP))
            .count();
        assert_eq!(sharp, 12);
    }

    #[test]
    fn non_manifold_fan_is_flagged() {
        // Three triangles sharing the same edge (0,1).
        let mesh = MeshData {
            num_prop: 3,
            vert_properties: vec![
                0.0, 0.0, 0.0, //
                0.0, 0.0, 2.0, //
                2.0, 0.0, 1.0, //
                -2.0, 1.0, 1.0, //
                -2.0, -1.0, 1.0,
            ],
            tri_verts: vec![0, 1, 2, 0, 3, 1, 0, 1, 4],
        };
        let topo = build_edge_topology(&mesh, 30.0);
        let nm: Vec<_> = topo
            .flags
            .iter()
            .enumerate()
            .filter(|(_, f)| f.contains(EdgeClass::NON_MANIFOLD))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(nm.len(), 1);
        let e = &topo.edges[nm[0]];
        assert_eq!((e.v0, e.v1), (0, 1));
        // Non-manifold edges are preserved through chain filtering.
        assert_eq!(topo.non_manifold_edges, nm);
    }

    #[test]
    fn rounded_plate_rims_chain_into_loops() {
        // Arc resolution keeps rim chords above the median-length floor
        // and their turns under the 35° chain rule.
        let cs = CrossSection::rect(40.0, 20.0, true).fillet(5.0, 12);
        let m = Manifold::extrude(&cs, 8.0, 1, 0.0);
        let topo = build_edge_topology(m.mesh(), 30.0);
        // Two sharp rims (top and bottom), each a coherent loop.
        assert_eq!(topo.feature_chains.len(), 2);
        let rim_len = cs.contours()[0].len();
        for chain in &topo.feature_chains {
            assert_eq!(chain.len(), rim_len);
        }
        assert_eq!(topo.sharp_edges.len(), 2 * rim_len);
    }

    #[test]
    fn short_sharp_edges_below_median_floor_are_dropped() {
        // A finely filleted plate tessellates its rim arcs into edges far
        // shorter than the median mesh edge; those are noise, not
        // features, and must not survive unless they are also boundary.
        let cs = CrossSection::rect(40.0, 20.0, true).fillet(5.0, 64);
        let m = Manifold::extrude(&cs, 8.0, 1, 0.0);
        let topo = build_edge_topology(m.mesh(), 30.0);
        let mut sorted = topo.edge_lengths.clone();
        sorted.sort_by(f64::total_cmp);
        let floor = (sorted[sorted.len() / 2] * 0.25).max(1e-8);
        for &i in &topo.sharp_edges {
            assert!(
                topo.edge_lengths[i] >= floor || topo.flags[i].contains(EdgeClass::BOUNDARY),
                "kept sharp edge {} under the length floor",
                i
            );
        }
    }

    #[test]
    fn closed_cube_falls_back_to_longest_chain() {
        // Cube corners exceed the 35° turn rule, so no chain reaches two
        // segments; the extractor keeps a single edge rather than nothing.
        let m = Manifold::cube(V::splat(2.0), true);
        let topo = build_edge_topology(m.mesh(), 30.0);
        assert_eq!(topo.feature_chains.len(), 1);
        assert_eq!(topo.feature_chains[0].len(), 1);
    }

    #[test]
    fn edge_pick_selects_nearby_boundary_edge() {
        let mesh = single_quad();
        let topo = build_edge_topology(&mesh, 30.0);
        let silhouette = SilhouetteResult::default();
        // Aim just past the midpoint of the bottom edge (y = 0).
        let hit = pick_edge_by_ray(
            &mesh,
            &topo,
            &silhouette,
            V::new(1.0, 0.05, 5.0),
            V::new(0.0, 0.0, -1.0),
            0.2,
        );
        let (edge, t) = hit.expect("edge within pick radius");
        let e = &topo.edges[edge];
        let ymid = (mesh.pos(e.v0).y + mesh.pos(e.v1).y) * 0.5;
        assert!(ymid.abs() < 1e-9, "picked the y=0 edge");
        assert!(t > 0.0);

        let miss = pick_edge_by_ray(
            &mesh,
            &topo,
            &silhouette,
            V::new(10.0, 10.0, 5.0),
            V::new(0.0, 0.0, -1.0),
            0.2,
        );
        assert!(miss.is_none());
    }
}
