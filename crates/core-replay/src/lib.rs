//! Replay of worker op streams into geometry, semantics, and dimensions.
//!
//! The worker sends construction operations, not geometry. This crate turns
//! a validated record stream into:
//! * dense node tables of kernel handles (the geometry itself),
//! * a structural semantics mirror of every record,
//! * sketch dimension models lifted symbolically from that mirror,
//! * postorder operation traces for the inspector,
//! all under a profile-driven level-of-detail policy.
//!
//! Failure is atomic: any malformed record, missing or wrong-kind input,
//! duplicate output id, or kernel fault rejects the whole stream.

use thiserror::Error;

use core_kernel::KernelStatus;
use core_protocol::ProtocolError;

pub mod interpreter;
pub mod lod;
pub mod sketch;
pub mod trace;

pub use interpreter::{
    NodeSemantic, ReplayInput, ReplayTables, replay_ops_to_mesh, replay_ops_to_tables,
    resolve_replay_cross_section, resolve_replay_manifold,
};
pub use lod::{
    LodProfile, ReplayLodPolicy, ReplayPostprocessPolicy, apply_replay_postprocess,
    auto_circular_segments, auto_circular_segments_for_revolve, lod_tolerance_for_profile,
};
pub use sketch::{
    SketchDimensionEntity, SketchDimensionModel, SketchLineDim, SketchPrimitiveKind,
    SketchTextSummary, build_sketch_dimension_model,
};
pub use trace::{OpTraceEntry, build_operation_trace};

/// Replay failures. The whole stream is rejected on the first one.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("replay failed: missing out node id")]
    MissingOutId,
    #[error("replay failed: duplicate out node id {0}")]
    DuplicateOutId(u32),
    #[error("replay failed: unknown opcode {0}")]
    UnknownOpcode(u16),
    #[error("replay failed: invalid {op} payload")]
    MalformedPayload { op: &'static str },
    #[error("replay failed: payload trailing bytes for opcode {0}")]
    TrailingBytes(u16),
    #[error("replay failed: missing manifold node {0}")]
    MissingManifold(u32),
    #[error("replay failed: missing cross-section node {0}")]
    MissingCrossSection(u32),
    #[error("replay failed in {ctx}: status={status:?}")]
    Kernel { ctx: &'static str, status: KernelStatus },
    #[error("replay failed: root node is not a manifold")]
    RootNotManifold,
    #[error("replay failed: root node is not a cross-section")]
    RootNotCrossSection,
    #[error("replay failed: root manifold node {0} missing")]
    RootManifoldMissing(u32),
    #[error("replay failed: root cross-section node {0} missing")]
    RootCrossSectionMissing(u32),
    #[error("replay failed: missing semantic node {0}")]
    MissingSemanticNode(u32),
    #[error("replay failed: cyclic semantic node graph")]
    CyclicSemanticGraph,
    #[error("replay failed: malformed {op} semantic node")]
    MalformedSemantic { op: &'static str },
    #[error("sketch semantic model requires contour fallback for this operation chain")]
    SketchFallbackRequired,
}
