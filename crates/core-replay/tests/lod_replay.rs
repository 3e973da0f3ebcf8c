//! Replay fidelity across level-of-detail profiles.
//!
//! Opcodes with explicit segment counts must produce bitwise-identical
//! triangle counts at every profile; zero-segment opcodes must respond to
//! profile quality.

mod common;

use common::*;
use core_protocol::{OpCode, RecordWriter};
use core_replay::{LodProfile, auto_circular_segments};

const PROFILES: [LodProfile; 3] = [LodProfile::Draft, LodProfile::Model, LodProfile::Export3mf];

fn tri_counts(records: &[u8], op_count: u32, root_id: u32) -> [usize; 3] {
    let mut out = [0usize; 3];
    for (i, profile) in PROFILES.into_iter().enumerate() {
        let mesh = replay_to_mesh(records, op_count, root_id, profile)
            .unwrap_or_else(|e| panic!("replay at {profile:?}: {e}"));
        out[i] = mesh.num_tri();
    }
    out
}

#[test]
fn sphere_auto_segmentation_tracks_profile() {
    let mut w = RecordWriter::new();
    w.record(OpCode::Sphere, &payload_sphere(1, 20.0, 0));
    let count = w.count();
    let records = w.finish();
    let [d, m, e] = tri_counts(&records, count, 1);
    assert!(d < m && m < e, "{d} {m} {e}");
    // The counts follow the UV-sphere formula at the derived segmentation.
    for (profile, tris) in PROFILES.into_iter().zip([d, m, e]) {
        let n = auto_circular_segments(20.0, profile) as usize;
        assert_eq!(tris, 2 * n * (n - 1), "profile {profile:?}");
    }
}

#[test]
fn cylinder_auto_segmentation_tracks_profile() {
    let mut w = RecordWriter::new();
    w.record(OpCode::Cylinder, &payload_cylinder(1, 20.0, 8.0, -1.0, 0, 0));
    let count = w.count();
    let records = w.finish();
    let [d, m, e] = tri_counts(&records, count, 1);
    assert!(d < m && m < e, "{d} {m} {e}");
}

#[test]
fn revolve_auto_segmentation_tracks_profile() {
    let mut w = RecordWriter::new();
    w.record(OpCode::CrossCircle, &payload_cross_circle(1, 6.0, 0));
    w.record(OpCode::Revolve, &payload_revolve(2, 1, 0, 360.0));
    let count = w.count();
    let records = w.finish();
    let [d, m, e] = tri_counts(&records, count, 2);
    assert!(d < m && m < e, "{d} {m} {e}");
}

#[test]
fn explicit_segments_are_stable_across_profiles() {
    let mut w = RecordWriter::new();
    w.record(OpCode::Sphere, &payload_sphere(1, 20.0, 64));
    let count = w.count();
    let records = w.finish();
    let [d, m, e] = tri_counts(&records, count, 1);
    assert_eq!(d, m);
    assert_eq!(m, e);
    assert_eq!(d, 2 * 64 * 63);
}

#[test]
fn cube_is_profile_invariant() {
    let mut w = RecordWriter::new();
    w.record(OpCode::Cube, &payload_cube(1, 4.0, 5.0, 6.0, 0));
    let count = w.count();
    let records = w.finish();
    let [d, m, e] = tri_counts(&records, count, 1);
    assert_eq!(d, m);
    assert_eq!(m, e);
}

#[test]
fn fillet_round_offset_tracks_profile() {
    let (records, count) = fillet_plate_stream();
    let [d, m, e] = tri_counts(&records, count, 3);
    assert!(d < m && m < e, "{d} {m} {e}");
}

#[test]
fn fillet_plate_bounds_match_the_profile_dimensions() {
    let (records, count) = fillet_plate_stream();
    for profile in PROFILES {
        let mesh = replay_to_mesh(&records, count, 3, profile).unwrap();
        let (mn, mx) = mesh.bounds().unwrap();
        let d = mx - mn;
        assert!((d.x - 40.0).abs() < 1.0, "dx {} at {profile:?}", d.x);
        assert!((d.y - 20.0).abs() < 1.0, "dy {} at {profile:?}", d.y);
        assert!((d.z - 8.0).abs() < 0.1, "dz {} at {profile:?}", d.z);
    }
}

#[test]
fn miter_offset_clone_is_profile_invariant() {
    let mut w = RecordWriter::new();
    w.record(OpCode::CrossSquare, &payload_cross_square(1, 40.0, 20.0, 1));
    w.record(OpCode::CrossOffsetClone, &payload_cross_offset_clone(2, 1, 4.0));
    w.record(OpCode::Extrude, &payload_extrude(3, 2, 8.0, 0, 0.0));
    let count = w.count();
    let records = w.finish();
    let [d, m, e] = tri_counts(&records, count, 3);
    assert_eq!(d, m);
    assert_eq!(m, e);
}
