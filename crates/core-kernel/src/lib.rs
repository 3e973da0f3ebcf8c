//! Foundational geometry kernel behind the replay interpreter.
//!
//! The replay layer treats this crate the way the original runtime treats
//! its external solid-modelling library: every construction call returns a
//! handle carrying a status flag, callers check the status after each call,
//! and nothing here panics on bad input. Solids are closed triangle meshes;
//! cross-sections are filled 2-D regions expressed as closed contours
//! (positive signed area = shell, negative = hole).
//!
//! Scope notes:
//! * Boolean union concatenates part meshes; subtract/intersect classify
//!   whole triangles against the other solid by centroid containment. That
//!   is a foundational treatment, not an exact CSG, and is good enough
//!   for the interactive paths this kernel backs.
//! * Tessellation counts are deterministic in the segment inputs so replay
//!   fidelity across quality profiles is a property of the caller's
//!   segment policy alone.

use thiserror::Error;

pub mod cross_section;
pub mod csg;
pub mod mesh;
pub mod mesh_io;
pub mod solid;

pub use cross_section::{CrossSection, JoinKind};
pub use mesh::MeshData;
pub use solid::Manifold;

/// Status flag carried by every solid handle. Mirrors the discipline of the
/// upstream kernel: construction never fails loudly, callers inspect the
/// flag before using the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KernelStatus {
    #[default]
    NoError,
    NonFiniteVertex,
    NotManifold,
    VertexOutOfBounds,
    InvalidConstruction,
}

impl KernelStatus {
    /// Human-readable status name surfaced in session error text.
    pub fn name(self) -> &'static str {
        match self {
            Self::NoError => "No error",
            Self::NonFiniteVertex => "Non-finite vertex",
            Self::NotManifold => "Not manifold",
            Self::VertexOutOfBounds => "Vertex out of bounds",
            Self::InvalidConstruction => "Invalid construction",
        }
    }

    pub fn is_ok(self) -> bool {
        self == Self::NoError
    }
}

/// Errors from the mesh I/O surface (3MF writing). Geometry construction
/// reports through [`KernelStatus`] instead.
#[derive(Debug, Error)]
pub enum MeshIoError {
    #[error("output path is empty")]
    EmptyPath,
    #[error("mesh is empty; nothing to export")]
    EmptyMesh,
    #[error("3MF write failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("3MF container write failed: {0}")]
    Container(#[from] zip::result::ZipError),
}
