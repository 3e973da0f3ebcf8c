//! View-dependent silhouette strokes.
//!
//! An interior edge is a silhouette candidate when its two incident
//! triangles face opposite ways relative to the ray from the edge midpoint
//! to the eye. Candidates run through the same chain engine as mechanical
//! features, with a looser turn threshold and a longer minimum so only
//! coherent strokes survive.

use glam::DVec3;

use core_kernel::MeshData;

use crate::EdgeClass;
use crate::edges::{EdgeTopology, extract_chains};

#[derive(Debug, Default)]
pub struct SilhouetteResult {
    pub is_silhouette: Vec<bool>,
    pub silhouette_edges: Vec<usize>,
}

/// Compute silhouette edges for the given eye position.
pub fn compute_silhouette_edges(
    mesh: &MeshData,
    topo: &EdgeTopology,
    eye: DVec3,
) -> SilhouetteResult {
    let mut out = SilhouetteResult {
        is_silhouette: vec![false; topo.edges.len()],
        silhouette_edges: Vec::new(),
    };
    if mesh.num_prop < 3 || topo.edges.is_empty() {
        return out;
    }

    let mut bmin = mesh.pos(topo.edges[0].v0);
    let mut bmax = bmin;
    for e in &topo.edges {
        for v in [e.v0, e.v1] {
            let p = mesh.pos(v);
            bmin = bmin.min(p);
            bmax = bmax.max(p);
        }
    }
    let bbox_diag = (bmax - bmin).length().max(1e-6);

    let mut candidate = vec![false; topo.edges.len()];
    for (i, e) in topo.edges.iter().enumerate() {
        if topo.flags[i].contains(EdgeClass::NON_MANIFOLD) {
            continue;
        }
        if e.tri_a.is_none() || e.tri_b.is_none() {
            continue;
        }
        let mid = (mesh.pos(e.v0) + mesh.pos(e.v1)) * 0.5;
        let view = (eye - mid).normalize_or_zero();
        let da = e.normal_a.dot(view);
        let db = e.normal_b.dot(view);
        if !da.is_finite() || !db.is_finite() {
            continue;
        }
        if (da > 0.0) != (db > 0.0) {
            candidate[i] = true;
        }
    }

    let extraction = extract_chains(
        mesh,
        &topo.edges,
        &candidate,
        42.0,
        &topo.edge_lengths,
        (bbox_diag * 0.02).max(1e-4),
        3,
        None,
    );
    for (i, &kept) in extraction.kept.iter().enumerate() {
        if kept {
            out.is_silhouette[i] = true;
            out.silhouette_edges.push(i);
        }
    }
    out
}
