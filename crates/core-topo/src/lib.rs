//! Mesh analysis for interactive picking and feature display.
//!
//! Everything in this crate derives from a mesh snapshot and is invalidated
//! when that mesh changes:
//! * edge ↔ triangle adjacency with boundary / sharp / non-manifold
//!   classification and feature chains,
//! * view-dependent silhouette strokes,
//! * face regions segmented by dihedral angle and fitted to primitives.

use bitflags::bitflags;
use glam::DVec3;

pub mod edges;
pub mod faces;
pub mod silhouette;

pub use edges::{EdgeRecord, EdgeTopology, build_edge_topology, pick_edge_by_ray};
pub use faces::{FacePrimitive, FaceRegions, detect_mesh_faces, pick_face_region_by_ray};
pub use silhouette::{SilhouetteResult, compute_silhouette_edges};

bitflags! {
    /// Classification of one mesh edge. Combinable where topology allows:
    /// a non-manifold edge never carries `SHARP` because more than two
    /// incident triangles leave no normal pair to compare.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EdgeClass: u8 {
        const BOUNDARY = 1;
        const SHARP = 2;
        const NON_MANIFOLD = 4;
    }
}

/// Unordered vertex pair encoded as `min << 32 | max`, the adjacency key
/// shared by edge and face analysis.
pub(crate) fn edge_key(a: u32, b: u32) -> u64 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    ((lo as u64) << 32) | hi as u64
}

/// Shortest distance from a point to a forward ray; `None` behind origin.
pub(crate) fn point_ray_distance(p: DVec3, orig: DVec3, dir: DVec3) -> Option<(f64, f64)> {
    let t = (p - orig).dot(dir);
    if !t.is_finite() || t <= 1e-9 {
        return None;
    }
    let d = (p - (orig + dir * t)).length();
    d.is_finite().then_some((t, d))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_key_is_order_independent() {
        assert_eq!(edge_key(3, 9), edge_key(9, 3));
        assert_ne!(edge_key(3, 9), edge_key(3, 8));
    }

    #[test]
    fn point_behind_ray_origin_is_rejected() {
        let origin = DVec3::ZERO;
        let dir = DVec3::X;
        assert!(point_ray_distance(DVec3::new(-5.0, 0.0, 0.0), origin, dir).is_none());
        let (t, d) = point_ray_distance(DVec3::new(4.0, 3.0, 0.0), origin, dir).unwrap();
        assert!((t - 4.0).abs() < 1e-12);
        assert!((d - 3.0).abs() < 1e-12);
    }
}
