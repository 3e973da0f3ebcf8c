#![allow(dead_code)] // Shared across the replay test binaries; each uses a subset.

use core_protocol::{NodeKind, OpCode, PayloadWriter, RecordWriter};
use core_replay::{LodProfile, ReplayInput, ReplayLodPolicy};

pub fn payload_sphere(out_id: u32, radius: f64, segments: u32) -> Vec<u8> {
    PayloadWriter::new().u32(out_id).f64(radius).u32(segments).finish()
}

pub fn payload_cube(out_id: u32, x: f64, y: f64, z: f64, center: u32) -> Vec<u8> {
    PayloadWriter::new()
        .u32(out_id)
        .f64(x)
        .f64(y)
        .f64(z)
        .u32(center)
        .finish()
}

pub fn payload_cylinder(out_id: u32, h: f64, r1: f64, r2: f64, segments: u32, center: u32) -> Vec<u8> {
    PayloadWriter::new()
        .u32(out_id)
        .f64(h)
        .f64(r1)
        .f64(r2)
        .u32(segments)
        .u32(center)
        .finish()
}

pub fn payload_cross_circle(out_id: u32, radius: f64, segments: u32) -> Vec<u8> {
    PayloadWriter::new().u32(out_id).f64(radius).u32(segments).finish()
}

pub fn payload_cross_square(out_id: u32, w: f64, h: f64, center: u32) -> Vec<u8> {
    PayloadWriter::new().u32(out_id).f64(w).f64(h).u32(center).finish()
}

pub fn payload_cross_fillet(out_id: u32, in_id: u32, radius: f64) -> Vec<u8> {
    PayloadWriter::new().u32(out_id).u32(in_id).f64(radius).finish()
}

pub fn payload_cross_offset_clone(out_id: u32, in_id: u32, delta: f64) -> Vec<u8> {
    PayloadWriter::new().u32(out_id).u32(in_id).f64(delta).finish()
}

pub fn payload_extrude(out_id: u32, cs_id: u32, h: f64, divisions: u32, twist: f64) -> Vec<u8> {
    PayloadWriter::new()
        .u32(out_id)
        .u32(cs_id)
        .f64(h)
        .u32(divisions)
        .f64(twist)
        .finish()
}

pub fn payload_revolve(out_id: u32, cs_id: u32, segments: u32, degrees: f64) -> Vec<u8> {
    PayloadWriter::new()
        .u32(out_id)
        .u32(cs_id)
        .u32(segments)
        .f64(degrees)
        .finish()
}

pub fn payload_translate(out_id: u32, in_id: u32, x: f64, y: f64, z: f64) -> Vec<u8> {
    PayloadWriter::new()
        .u32(out_id)
        .u32(in_id)
        .f64(x)
        .f64(y)
        .f64(z)
        .finish()
}

/// The fillet-plate stream used across suites: centered 40×20 square,
/// 5 mm corner fillet, extruded 8 mm.
pub fn fillet_plate_stream() -> (Vec<u8>, u32) {
    let mut w = RecordWriter::new();
    w.record(OpCode::CrossSquare, &payload_cross_square(1, 40.0, 20.0, 1));
    w.record(OpCode::CrossFillet, &payload_cross_fillet(2, 1, 5.0));
    w.record(OpCode::Extrude, &payload_extrude(3, 2, 8.0, 0, 0.0));
    let count = w.count();
    (w.finish(), count)
}

pub fn replay_to_mesh(
    records: &[u8],
    op_count: u32,
    root_id: u32,
    profile: LodProfile,
) -> Result<core_kernel::MeshData, core_replay::ReplayError> {
    let input = ReplayInput {
        records,
        op_count,
        root_kind: NodeKind::Manifold as u32,
        root_id,
        lod_policy: ReplayLodPolicy {
            profile,
            ..Default::default()
        },
    };
    core_replay::replay_ops_to_mesh(&input)
}
