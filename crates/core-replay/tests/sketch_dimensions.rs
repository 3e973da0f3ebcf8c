//! Symbolic dimension lifting over the semantics mirror.

mod common;

use common::*;
use core_protocol::{OpCode, PayloadWriter, RecordWriter};
use core_replay::{
    NodeSemantic, ReplayError, ReplayLodPolicy, ReplayTables, SketchDimensionEntity,
    SketchPrimitiveKind, build_sketch_dimension_model, replay_ops_to_tables,
};
use glam::DVec2;

fn replay(records: &[u8], count: u32) -> ReplayTables {
    replay_ops_to_tables(records, count, &ReplayLodPolicy::default()).unwrap()
}

fn line_values(model: &core_replay::SketchDimensionModel) -> Vec<f64> {
    model
        .entities
        .iter()
        .filter_map(|e| match e {
            SketchDimensionEntity::Line(l) => Some(l.value),
            SketchDimensionEntity::Summary(_) => None,
        })
        .collect()
}

#[test]
fn rect_lift_reports_authoritative_size() {
    let mut w = RecordWriter::new();
    w.record(OpCode::CrossRect, &payload_cross_square(1, 80.0, 50.0, 0));
    let count = w.count();
    let records = w.finish();
    let tables = replay(&records, count);
    let model = build_sketch_dimension_model(&tables, 1).unwrap();
    assert_eq!(model.primitive, SketchPrimitiveKind::Rect);
    assert_eq!(model.rect_size, Some((80.0, 50.0)));
    assert_eq!(line_values(&model), vec![80.0, 50.0]);
    // Origin-anchored rect centers its anchor on the body.
    assert_eq!(model.anchor, DVec2::new(40.0, 25.0));
    assert_eq!(model.logical_vertices.len(), 4);
}

#[test]
fn translated_rect_moves_vertices_and_anchor() {
    let mut w = RecordWriter::new();
    w.record(OpCode::CrossSquare, &payload_cross_square(1, 10.0, 10.0, 1));
    w.record(
        OpCode::CrossTranslate,
        &PayloadWriter::new().u32(2).u32(1).f64(5.0).f64(-2.0).finish(),
    );
    let count = w.count();
    let records = w.finish();
    let tables = replay(&records, count);
    let model = build_sketch_dimension_model(&tables, 2).unwrap();
    assert_eq!(model.anchor, DVec2::new(5.0, -2.0));
    assert!(model
        .logical_vertices
        .iter()
        .any(|v| (*v - DVec2::new(0.0, -7.0)).length() < 1e-9));
}

#[test]
fn rotated_rect_keeps_dimension_values() {
    let mut w = RecordWriter::new();
    w.record(OpCode::CrossSquare, &payload_cross_square(1, 8.0, 2.0, 1));
    w.record(
        OpCode::CrossRotate,
        &PayloadWriter::new().u32(2).u32(1).f64(45.0).finish(),
    );
    let count = w.count();
    let records = w.finish();
    let tables = replay(&records, count);
    let model = build_sketch_dimension_model(&tables, 2).unwrap();
    assert_eq!(line_values(&model), vec![8.0, 2.0]);
}

#[test]
fn circle_lift_carries_radius_summary() {
    let mut w = RecordWriter::new();
    w.record(OpCode::CrossCircle, &payload_cross_circle(1, 12.5, 0));
    let count = w.count();
    let records = w.finish();
    let tables = replay(&records, count);
    let model = build_sketch_dimension_model(&tables, 1).unwrap();
    assert_eq!(model.primitive, SketchPrimitiveKind::Circle);
    assert_eq!(model.circle_radius, Some(12.5));
    assert!(matches!(
        model.entities.as_slice(),
        [SketchDimensionEntity::Summary(s)] if s.text.contains("12.5")
    ));
}

#[test]
fn point_lift_anchors_at_position() {
    let mut w = RecordWriter::new();
    w.record(
        OpCode::CrossPoint,
        &PayloadWriter::new().u32(1).f64(3.0).f64(4.0).f64(0.5).u32(8).finish(),
    );
    let count = w.count();
    let records = w.finish();
    let tables = replay(&records, count);
    let model = build_sketch_dimension_model(&tables, 1).unwrap();
    assert_eq!(model.primitive, SketchPrimitiveKind::Point);
    assert_eq!(model.anchor, DVec2::new(3.0, 4.0));
    assert_eq!(model.circle_radius, Some(0.5));
}

#[test]
fn fillet_records_radius_but_keeps_parent_vertices() {
    let mut w = RecordWriter::new();
    w.record(OpCode::CrossSquare, &payload_cross_square(1, 40.0, 20.0, 1));
    w.record(OpCode::CrossFillet, &payload_cross_fillet(2, 1, 5.0));
    let count = w.count();
    let records = w.finish();
    let tables = replay(&records, count);
    let model = build_sketch_dimension_model(&tables, 2).unwrap();
    assert_eq!(model.primitive, SketchPrimitiveKind::Rect);
    assert_eq!(model.fillet_radius, Some(5.0));
    assert_eq!(model.logical_vertices.len(), 4);
    assert_eq!(line_values(&model), vec![40.0, 20.0]);
}

#[test]
fn offset_clone_requires_contour_fallback() {
    let mut w = RecordWriter::new();
    w.record(OpCode::CrossSquare, &payload_cross_square(1, 40.0, 20.0, 1));
    w.record(OpCode::CrossOffsetClone, &payload_cross_offset_clone(2, 1, 4.0));
    let count = w.count();
    let records = w.finish();
    let tables = replay(&records, count);
    assert!(matches!(
        build_sketch_dimension_model(&tables, 2).unwrap_err(),
        ReplayError::SketchFallbackRequired
    ));
}

#[test]
fn hexagon_classifies_as_regular_polygon() {
    let mut payload = PayloadWriter::new().u32(1).u32(1).u32(6);
    for k in 0..6 {
        let a = std::f64::consts::TAU * k as f64 / 6.0;
        payload = payload.f64(10.0 * a.cos()).f64(10.0 * a.sin());
    }
    let mut w = RecordWriter::new();
    w.record(OpCode::CrossPolygons, &payload.finish());
    let count = w.count();
    let records = w.finish();
    let tables = replay(&records, count);
    let model = build_sketch_dimension_model(&tables, 1).unwrap();
    assert_eq!(model.primitive, SketchPrimitiveKind::RegularPolygon);
    assert!(model.regular_polygon);
    assert_eq!(model.polygon_sides, 6);
    assert_eq!(model.entities.len(), 6);
}

#[test]
fn skewed_quad_classifies_as_irregular_polygon() {
    let pts = [(0.0, 0.0), (12.0, 0.0), (14.0, 7.0), (1.0, 5.0)];
    let mut payload = PayloadWriter::new().u32(1).u32(1).u32(4);
    for (x, y) in pts {
        payload = payload.f64(x).f64(y);
    }
    let mut w = RecordWriter::new();
    w.record(OpCode::CrossPolygons, &payload.finish());
    let count = w.count();
    let records = w.finish();
    let tables = replay(&records, count);
    let model = build_sketch_dimension_model(&tables, 1).unwrap();
    assert_eq!(model.primitive, SketchPrimitiveKind::IrregularPolygon);
    assert!(!model.regular_polygon);
}

#[test]
fn self_referential_node_is_refused_as_a_cycle() {
    // A stream can never produce this shape (inputs must precede outputs),
    // so the tables are hand-crafted the way a malformed authoring engine
    // might populate them.
    let mut tables = ReplayTables::default();
    tables.manifolds.resize(2, None);
    tables.cross_sections.resize(2, None);
    tables.cross_sections[1] = Some(core_kernel::CrossSection::rect(4.0, 4.0, true));
    tables.semantics.resize(2, NodeSemantic::default());
    tables.semantics[1] = NodeSemantic {
        opcode: OpCode::CrossTranslate as u16,
        out_id: 1,
        inputs: vec![1],
        params_f64: vec![1.0, 1.0],
        valid: true,
        ..Default::default()
    };
    assert!(matches!(
        build_sketch_dimension_model(&tables, 1).unwrap_err(),
        ReplayError::CyclicSemanticGraph
    ));
}

#[test]
fn missing_root_is_refused() {
    let tables = ReplayTables::default();
    assert!(matches!(
        build_sketch_dimension_model(&tables, 3).unwrap_err(),
        ReplayError::RootCrossSectionMissing(3)
    ));
}
