//! Symbolic sketch dimension models.
//!
//! The dimension overlay wants authoritative values ("this rect is 80 by
//! 50"), not measurements of tessellated contours. This lifter evaluates
//! the semantics mirror of the cross-section graph symbolically: primitive
//! sources establish vertices and anchors, affine ops transform them, and
//! operations without a symbolic story mark the node as fallback-only so
//! the overlay reads the evaluated contour from the kernel instead.
//!
//! The replay graph is a DAG by construction, but the stream is untrusted,
//! so the walk keeps an explicit visiting set and refuses cycles.

use std::collections::HashSet;

use glam::DVec2;

use core_protocol::OpCode;

use crate::ReplayError;
use crate::interpreter::{NodeSemantic, ReplayTables};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SketchPrimitiveKind {
    #[default]
    Unknown,
    Circle,
    Rect,
    RegularPolygon,
    IrregularPolygon,
    Point,
}

impl SketchPrimitiveKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Circle => "Circle",
            Self::Rect => "Rect",
            Self::RegularPolygon => "RegularPolygon",
            Self::IrregularPolygon => "IrregularPolygon",
            Self::Point => "Point",
        }
    }
}

/// Oriented line dimension: endpoints plus the authoritative value.
#[derive(Debug, Clone, Copy)]
pub struct SketchLineDim {
    pub a: DVec2,
    pub b: DVec2,
    pub value: f64,
}

/// Text annotation anchored in sketch space.
#[derive(Debug, Clone)]
pub struct SketchTextSummary {
    pub anchor: DVec2,
    pub text: String,
}

#[derive(Debug, Clone)]
pub enum SketchDimensionEntity {
    Line(SketchLineDim),
    Summary(SketchTextSummary),
}

#[derive(Debug, Clone, Default)]
pub struct SketchDimensionModel {
    pub primitive: SketchPrimitiveKind,
    pub logical_vertices: Vec<DVec2>,
    pub anchor: DVec2,
    pub rect_size: Option<(f64, f64)>,
    pub circle_radius: Option<f64>,
    pub fillet_radius: Option<f64>,
    pub regular_polygon: bool,
    pub polygon_sides: u32,
    pub entities: Vec<SketchDimensionEntity>,
}

#[derive(Debug, Clone, Default)]
struct EvalNode {
    fallback_only: bool,
    vertices: Vec<DVec2>,
    anchor: DVec2,
    primitive: SketchPrimitiveKind,
    rect_size: Option<(f64, f64)>,
    circle_radius: Option<f64>,
    fillet_radius: Option<f64>,
}

fn polygon_area(poly: &[DVec2]) -> f64 {
    if poly.len() < 3 {
        return 0.0;
    }
    let mut acc = 0.0;
    for i in 0..poly.len() {
        let a = poly[i];
        let b = poly[(i + 1) % poly.len()];
        acc += a.x * b.y - b.x * a.y;
    }
    0.5 * acc
}

/// A polygon is regular when edge lengths and circumradii each vary by at
/// most 2.5%.
fn classify_regular_polygon(poly: &[DVec2]) -> bool {
    if poly.len() < 3 {
        return false;
    }
    let center = poly.iter().copied().sum::<DVec2>() / poly.len() as f64;
    let mut edge_min = f64::INFINITY;
    let mut edge_max: f64 = 0.0;
    let mut rad_min = f64::INFINITY;
    let mut rad_max: f64 = 0.0;
    for i in 0..poly.len() {
        let edge = poly[i].distance(poly[(i + 1) % poly.len()]);
        let radius = poly[i].distance(center);
        edge_min = edge_min.min(edge);
        edge_max = edge_max.max(edge);
        rad_min = rad_min.min(radius);
        rad_max = rad_max.max(radius);
    }
    if edge_max <= 1e-9 || rad_max <= 1e-9 {
        return false;
    }
    (edge_max - edge_min) / edge_max <= 0.025 && (rad_max - rad_min) / rad_max <= 0.025
}

fn rectangle_vertices(w: f64, h: f64, centered: bool) -> Vec<DVec2> {
    let (x0, y0) = if centered { (-w * 0.5, -h * 0.5) } else { (0.0, 0.0) };
    let (x1, y1) = (x0 + w, y0 + h);
    vec![
        DVec2::new(x0, y0),
        DVec2::new(x1, y0),
        DVec2::new(x1, y1),
        DVec2::new(x0, y1),
    ]
}

fn rotate_deg(p: DVec2, degrees: f64) -> DVec2 {
    let (s, c) = degrees.to_radians().sin_cos();
    DVec2::new(c * p.x - s * p.y, s * p.x + c * p.y)
}

fn eval_sketch_node(
    tables: &ReplayTables,
    id: u32,
    visiting: &mut HashSet<u32>,
) -> Result<EvalNode, ReplayError> {
    let Some(node) = tables.semantic(id) else {
        return Err(ReplayError::MissingSemanticNode(id));
    };
    if !visiting.insert(id) {
        return Err(ReplayError::CyclicSemanticGraph);
    }
    let result = eval_sketch_node_inner(tables, node, visiting);
    visiting.remove(&id);
    result
}

fn eval_sketch_node_inner(
    tables: &ReplayTables,
    node: &NodeSemantic,
    visiting: &mut HashSet<u32>,
) -> Result<EvalNode, ReplayError> {
    let mut res = EvalNode::default();
    let op = OpCode::from_u16(node.opcode);
    let malformed = |op: &'static str| ReplayError::MalformedSemantic { op };

    match op {
        Some(OpCode::CrossRect) | Some(OpCode::CrossSquare) => {
            if node.params_f64.len() < 2 || node.params_u32.is_empty() {
                return Err(malformed("rect"));
            }
            let w = node.params_f64[0].abs();
            let h = node.params_f64[1].abs();
            let centered = node.params_u32[0] != 0;
            res.primitive = SketchPrimitiveKind::Rect;
            res.vertices = rectangle_vertices(w, h, centered);
            res.rect_size = Some((w, h));
            res.anchor = if centered {
                DVec2::ZERO
            } else {
                DVec2::new(w * 0.5, h * 0.5)
            };
        }
        Some(OpCode::CrossPolygons) => {
            let Some(polys) = node.polygons.as_ref().filter(|p| !p.is_empty()) else {
                return Err(malformed("cross polygon"));
            };
            // Dimension the shell with the largest absolute area.
            let best = polys
                .iter()
                .max_by(|a, b| {
                    polygon_area(a)
                        .abs()
                        .total_cmp(&polygon_area(b).abs())
                })
                .filter(|p| p.len() >= 3)
                .ok_or_else(|| malformed("cross polygon shell"))?;
            res.vertices = best.clone();
            res.anchor = best.iter().copied().sum::<DVec2>() / best.len() as f64;
            res.primitive = if classify_regular_polygon(best) {
                SketchPrimitiveKind::RegularPolygon
            } else {
                SketchPrimitiveKind::IrregularPolygon
            };
        }
        Some(OpCode::CrossCircle) => {
            if node.params_f64.is_empty() {
                return Err(malformed("circle"));
            }
            res.primitive = SketchPrimitiveKind::Circle;
            res.anchor = DVec2::ZERO;
            res.circle_radius = Some(node.params_f64[0].abs());
        }
        Some(OpCode::CrossPoint) => {
            if node.params_f64.len() < 3 {
                return Err(malformed("point"));
            }
            res.primitive = SketchPrimitiveKind::Point;
            res.anchor = DVec2::new(node.params_f64[0], node.params_f64[1]);
            res.circle_radius = Some(node.params_f64[2].abs());
        }
        Some(OpCode::CrossTranslate)
        | Some(OpCode::CrossRotate)
        | Some(OpCode::CrossFillet)
        | Some(OpCode::CrossOffsetClone) => {
            let Some(&input) = node.inputs.first() else {
                return Err(malformed("cross transform"));
            };
            res = eval_sketch_node(tables, input, visiting)?;
            match op {
                Some(OpCode::CrossTranslate) => {
                    if node.params_f64.len() < 2 {
                        return Err(malformed("cross translate"));
                    }
                    let d = DVec2::new(node.params_f64[0], node.params_f64[1]);
                    for v in &mut res.vertices {
                        *v += d;
                    }
                    res.anchor += d;
                }
                Some(OpCode::CrossRotate) => {
                    if node.params_f64.is_empty() {
                        return Err(malformed("cross rotate"));
                    }
                    let deg = node.params_f64[0];
                    for v in &mut res.vertices {
                        *v = rotate_deg(*v, deg);
                    }
                    res.anchor = rotate_deg(res.anchor, deg);
                }
                Some(OpCode::CrossFillet) => {
                    if node.params_f64.is_empty() {
                        return Err(malformed("cross fillet"));
                    }
                    // Keep the parent's vertices; the rounded outline shows
                    // up through the contour fallback.
                    res.fillet_radius = Some(node.params_f64[0].abs());
                }
                _ => {
                    res.fallback_only = true;
                }
            }
        }
        _ => {
            res.fallback_only = true;
        }
    }
    Ok(res)
}

/// Lift the sketch dimension model for a cross-section root.
pub fn build_sketch_dimension_model(
    tables: &ReplayTables,
    root_id: u32,
) -> Result<SketchDimensionModel, ReplayError> {
    if !tables.has_cross_section(root_id) {
        return Err(ReplayError::RootCrossSectionMissing(root_id));
    }
    let mut visiting = HashSet::new();
    let node = eval_sketch_node(tables, root_id, &mut visiting)?;
    if node.fallback_only {
        return Err(ReplayError::SketchFallbackRequired);
    }

    let mut model = SketchDimensionModel {
        primitive: node.primitive,
        logical_vertices: node.vertices.clone(),
        anchor: node.anchor,
        rect_size: node.rect_size,
        circle_radius: node.circle_radius,
        fillet_radius: node.fillet_radius,
        ..Default::default()
    };

    match node.primitive {
        SketchPrimitiveKind::Rect if node.vertices.len() == 4 => {
            let (w, h) = node.rect_size.unwrap_or_else(|| {
                (
                    node.vertices[0].distance(node.vertices[1]),
                    node.vertices[1].distance(node.vertices[2]),
                )
            });
            model.entities.push(SketchDimensionEntity::Line(SketchLineDim {
                a: node.vertices[0],
                b: node.vertices[1],
                value: w,
            }));
            model.entities.push(SketchDimensionEntity::Line(SketchLineDim {
                a: node.vertices[1],
                b: node.vertices[2],
                value: h,
            }));
        }
        SketchPrimitiveKind::RegularPolygon | SketchPrimitiveKind::IrregularPolygon => {
            model.polygon_sides = node.vertices.len() as u32;
            model.regular_polygon = node.primitive == SketchPrimitiveKind::RegularPolygon;
            for i in 0..node.vertices.len() {
                let a = node.vertices[i];
                let b = node.vertices[(i + 1) % node.vertices.len()];
                model.entities.push(SketchDimensionEntity::Line(SketchLineDim {
                    a,
                    b,
                    value: a.distance(b),
                }));
            }
        }
        SketchPrimitiveKind::Circle => {
            if let Some(r) = node.circle_radius {
                model.entities.push(SketchDimensionEntity::Summary(SketchTextSummary {
                    anchor: node.anchor,
                    text: format!("R {r}"),
                }));
            }
        }
        SketchPrimitiveKind::Point => {
            model.entities.push(SketchDimensionEntity::Summary(SketchTextSummary {
                anchor: node.anchor,
                text: format!("({}, {})", node.anchor.x, node.anchor.y),
            }));
        }
        _ => {}
    }

    Ok(model)
}
