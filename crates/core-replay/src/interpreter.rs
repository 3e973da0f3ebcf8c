//! Replay of the op record stream into node tables.
//!
//! Records execute strictly in stream order. Each one writes a single
//! `out_id` into the manifold or cross-section table; inputs must already
//! be populated in the kind the opcode expects. Alongside the kernel
//! handles, every record's raw structure is mirrored into a semantics
//! table: the kernel is opaque and exposes no construction history, so
//! the dimension lifter and operation inspector read that mirror instead.

use glam::{DVec2, DVec3};

use core_kernel::cross_section::JoinKind;
use core_kernel::csg::BooleanOp;
use core_kernel::{CrossSection, Manifold, MeshData};
use core_protocol::{NodeKind, OpCode, OpRecordView, PayloadCursor, read_op_records};

use crate::ReplayError;
use crate::lod::{
    ReplayLodPolicy, apply_replay_postprocess, auto_circular_segments,
    auto_circular_segments_for_revolve,
};

/// Structural mirror of one executed record.
#[derive(Debug, Clone, Default)]
pub struct NodeSemantic {
    pub opcode: u16,
    pub out_id: u32,
    pub inputs: Vec<u32>,
    pub params_f64: Vec<f64>,
    pub params_u32: Vec<u32>,
    pub polygons: Option<Vec<Vec<DVec2>>>,
    pub valid: bool,
}

/// Dense, id-indexed node tables built by one replay. Fresh per request.
#[derive(Debug, Default)]
pub struct ReplayTables {
    pub manifolds: Vec<Option<Manifold>>,
    pub cross_sections: Vec<Option<CrossSection>>,
    pub semantics: Vec<NodeSemantic>,
}

impl ReplayTables {
    fn ensure(&mut self, id: u32) {
        let need = id as usize + 1;
        if self.manifolds.len() < need {
            self.manifolds.resize(need, None);
            self.cross_sections.resize(need, None);
            self.semantics.resize(need, NodeSemantic::default());
        }
    }

    pub fn has_manifold(&self, id: u32) -> bool {
        self.manifolds.get(id as usize).is_some_and(Option::is_some)
    }

    pub fn has_cross_section(&self, id: u32) -> bool {
        self.cross_sections
            .get(id as usize)
            .is_some_and(Option::is_some)
    }

    pub fn semantic(&self, id: u32) -> Option<&NodeSemantic> {
        self.semantics.get(id as usize).filter(|n| n.valid)
    }

    fn need_manifold(&self, id: u32) -> Result<Manifold, ReplayError> {
        self.manifolds
            .get(id as usize)
            .and_then(Clone::clone)
            .ok_or(ReplayError::MissingManifold(id))
    }

    fn need_cross_section(&self, id: u32) -> Result<CrossSection, ReplayError> {
        self.cross_sections
            .get(id as usize)
            .and_then(Clone::clone)
            .ok_or(ReplayError::MissingCrossSection(id))
    }
}

/// Everything needed to replay one response to a mesh.
pub struct ReplayInput<'a> {
    pub records: &'a [u8],
    pub op_count: u32,
    pub root_kind: u32,
    pub root_id: u32,
    pub lod_policy: ReplayLodPolicy,
}

fn check_status(m: Manifold, ctx: &'static str) -> Result<Manifold, ReplayError> {
    if m.status().is_ok() {
        Ok(m)
    } else {
        Err(ReplayError::Kernel {
            ctx,
            status: m.status(),
        })
    }
}

/// Explicit positive segment counts are authoritative; zero derives from
/// the profile tolerance.
fn resolve_segments(explicit: u32, radius: f64, policy: &ReplayLodPolicy) -> u32 {
    if explicit == 0 {
        auto_circular_segments(radius, policy.profile)
    } else {
        explicit.max(3)
    }
}

/// Walk the record stream and populate the node tables.
pub fn replay_ops_to_tables(
    records: &[u8],
    op_count: u32,
    policy: &ReplayLodPolicy,
) -> Result<ReplayTables, ReplayError> {
    let views = read_op_records(records, op_count)?;
    let mut tables = ReplayTables::default();
    for view in &views {
        execute_record(view, &mut tables, policy)?;
    }
    tracing::debug!(
        target: "replay",
        ops = views.len(),
        nodes = tables.semantics.len(),
        "replayed op stream"
    );
    Ok(tables)
}

fn execute_record(
    view: &OpRecordView<'_>,
    tables: &mut ReplayTables,
    policy: &ReplayLodPolicy,
) -> Result<(), ReplayError> {
    let Some(op) = OpCode::from_u16(view.opcode) else {
        return Err(ReplayError::UnknownOpcode(view.opcode));
    };
    let mut cur = PayloadCursor::new(view.payload);
    let out_id = cur.read_u32().ok_or(ReplayError::MissingOutId)?;
    tables.ensure(out_id);
    if tables.has_manifold(out_id) || tables.has_cross_section(out_id) {
        return Err(ReplayError::DuplicateOutId(out_id));
    }

    let mut sem = NodeSemantic {
        opcode: view.opcode,
        out_id,
        ..Default::default()
    };
    let malformed = || ReplayError::MalformedPayload { op: op.name() };

    enum Produced {
        Solid(Manifold),
        Section(CrossSection),
    }

    let produced = match op {
        OpCode::Sphere => {
            let radius = cur.read_f64().ok_or_else(malformed)?;
            let seg = cur.read_u32().ok_or_else(malformed)?;
            sem.params_f64.push(radius);
            sem.params_u32.push(seg);
            let m = Manifold::sphere(radius, resolve_segments(seg, radius, policy));
            Produced::Solid(check_status(m, "sphere")?)
        }
        OpCode::Cube => {
            let x = cur.read_f64().ok_or_else(malformed)?;
            let y = cur.read_f64().ok_or_else(malformed)?;
            let z = cur.read_f64().ok_or_else(malformed)?;
            let center = cur.read_u32().ok_or_else(malformed)?;
            sem.params_f64.extend([x, y, z]);
            sem.params_u32.push(center);
            let m = Manifold::cube(DVec3::new(x, y, z), center != 0);
            Produced::Solid(check_status(m, "cube")?)
        }
        OpCode::Cylinder => {
            let h = cur.read_f64().ok_or_else(malformed)?;
            let r1 = cur.read_f64().ok_or_else(malformed)?;
            let r2 = cur.read_f64().ok_or_else(malformed)?;
            let seg = cur.read_u32().ok_or_else(malformed)?;
            let center = cur.read_u32().ok_or_else(malformed)?;
            sem.params_f64.extend([h, r1, r2]);
            sem.params_u32.extend([seg, center]);
            let r_auto = r1.max(if r2 < 0.0 { r1 } else { r2 });
            let m = Manifold::cylinder(h, r1, r2, resolve_segments(seg, r_auto, policy), center != 0);
            Produced::Solid(check_status(m, "cylinder")?)
        }
        OpCode::Union => {
            let count = cur.read_u32().ok_or_else(malformed)?;
            if count == 0 {
                return Err(malformed());
            }
            sem.params_u32.push(count);
            let mut parts = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let id = cur.read_u32().ok_or_else(malformed)?;
                sem.inputs.push(id);
                parts.push(tables.need_manifold(id)?);
            }
            Produced::Solid(check_status(Manifold::union_many(&parts), "union")?)
        }
        OpCode::Subtract | OpCode::Intersect => {
            let a = cur.read_u32().ok_or_else(malformed)?;
            let b = cur.read_u32().ok_or_else(malformed)?;
            sem.inputs.extend([a, b]);
            let ma = tables.need_manifold(a)?;
            let mb = tables.need_manifold(b)?;
            let bool_op = if op == OpCode::Subtract {
                BooleanOp::Subtract
            } else {
                BooleanOp::Intersect
            };
            Produced::Solid(check_status(ma.boolean(&mb, bool_op), "boolean")?)
        }
        OpCode::Translate | OpCode::Rotate | OpCode::Scale => {
            let in_id = cur.read_u32().ok_or_else(malformed)?;
            let x = cur.read_f64().ok_or_else(malformed)?;
            let y = cur.read_f64().ok_or_else(malformed)?;
            let z = cur.read_f64().ok_or_else(malformed)?;
            sem.inputs.push(in_id);
            sem.params_f64.extend([x, y, z]);
            let m = tables.need_manifold(in_id)?;
            let out = match op {
                OpCode::Translate => m.translate(DVec3::new(x, y, z)),
                OpCode::Rotate => m.rotate(x, y, z),
                _ => m.scale(DVec3::new(x, y, z)),
            };
            Produced::Solid(check_status(out, "transform")?)
        }
        OpCode::Extrude => {
            let cs_id = cur.read_u32().ok_or_else(malformed)?;
            let h = cur.read_f64().ok_or_else(malformed)?;
            let div = cur.read_u32().ok_or_else(malformed)?;
            let twist = cur.read_f64().ok_or_else(malformed)?;
            sem.inputs.push(cs_id);
            sem.params_f64.extend([h, twist]);
            sem.params_u32.push(div);
            let cs = tables.need_cross_section(cs_id)?;
            let divisions = if div != 0 {
                div
            } else if twist == 0.0 {
                1
            } else {
                auto_circular_segments_for_revolve(cs.max_radius(), twist.abs().min(360.0), policy.profile)
            };
            let m = Manifold::extrude(&cs, h, divisions, twist);
            Produced::Solid(check_status(m, "extrude")?)
        }
        OpCode::Revolve => {
            let cs_id = cur.read_u32().ok_or_else(malformed)?;
            let seg = cur.read_u32().ok_or_else(malformed)?;
            let deg = cur.read_f64().ok_or_else(malformed)?;
            sem.inputs.push(cs_id);
            sem.params_f64.push(deg);
            sem.params_u32.push(seg);
            let cs = tables.need_cross_section(cs_id)?;
            let segments = if seg == 0 {
                auto_circular_segments_for_revolve(cs.max_radius(), deg, policy.profile)
            } else {
                seg.max(3)
            };
            let m = Manifold::revolve(&cs, segments, deg);
            Produced::Solid(check_status(m, "revolve")?)
        }
        OpCode::Slice => {
            let in_id = cur.read_u32().ok_or_else(malformed)?;
            let z = cur.read_f64().ok_or_else(malformed)?;
            sem.inputs.push(in_id);
            sem.params_f64.push(z);
            let m = tables.need_manifold(in_id)?;
            Produced::Section(m.slice(z))
        }
        OpCode::CrossCircle => {
            let radius = cur.read_f64().ok_or_else(malformed)?;
            let seg = cur.read_u32().ok_or_else(malformed)?;
            sem.params_f64.push(radius);
            sem.params_u32.push(seg);
            Produced::Section(CrossSection::circle(
                radius,
                resolve_segments(seg, radius, policy),
            ))
        }
        OpCode::CrossSquare | OpCode::CrossRect => {
            let w = cur.read_f64().ok_or_else(malformed)?;
            let h = cur.read_f64().ok_or_else(malformed)?;
            let center = cur.read_u32().ok_or_else(malformed)?;
            sem.params_f64.extend([w, h]);
            sem.params_u32.push(center);
            Produced::Section(CrossSection::rect(w, h, center != 0))
        }
        OpCode::CrossPoint => {
            let x = cur.read_f64().ok_or_else(malformed)?;
            let y = cur.read_f64().ok_or_else(malformed)?;
            let radius = cur.read_f64().ok_or_else(malformed)?;
            let seg = cur.read_u32().ok_or_else(malformed)?;
            sem.params_f64.extend([x, y, radius]);
            sem.params_u32.push(seg);
            let marker = CrossSection::circle(radius, resolve_segments(seg, radius, policy))
                .translate(DVec2::new(x, y));
            Produced::Section(marker)
        }
        OpCode::CrossPolygons => {
            let contour_count = cur.read_u32().ok_or_else(malformed)?;
            if contour_count == 0 {
                return Err(malformed());
            }
            sem.params_u32.push(contour_count);
            let mut polys = Vec::with_capacity(contour_count as usize);
            for _ in 0..contour_count {
                let point_count = cur.read_u32().ok_or_else(malformed)?;
                if point_count < 3 {
                    return Err(malformed());
                }
                let mut poly = Vec::with_capacity(point_count as usize);
                for _ in 0..point_count {
                    let x = cur.read_f64().ok_or_else(malformed)?;
                    let y = cur.read_f64().ok_or_else(malformed)?;
                    poly.push(DVec2::new(x, y));
                }
                polys.push(poly);
            }
            sem.polygons = Some(polys.clone());
            Produced::Section(CrossSection::from_polygons(polys))
        }
        OpCode::CrossTranslate => {
            let in_id = cur.read_u32().ok_or_else(malformed)?;
            let x = cur.read_f64().ok_or_else(malformed)?;
            let y = cur.read_f64().ok_or_else(malformed)?;
            sem.inputs.push(in_id);
            sem.params_f64.extend([x, y]);
            let cs = tables.need_cross_section(in_id)?;
            Produced::Section(cs.translate(DVec2::new(x, y)))
        }
        OpCode::CrossRotate => {
            let in_id = cur.read_u32().ok_or_else(malformed)?;
            let deg = cur.read_f64().ok_or_else(malformed)?;
            sem.inputs.push(in_id);
            sem.params_f64.push(deg);
            let cs = tables.need_cross_section(in_id)?;
            Produced::Section(cs.rotate(deg))
        }
        OpCode::CrossFillet => {
            let in_id = cur.read_u32().ok_or_else(malformed)?;
            let radius = cur.read_f64().ok_or_else(malformed)?;
            sem.inputs.push(in_id);
            sem.params_f64.push(radius);
            let cs = tables.need_cross_section(in_id)?;
            let arc = auto_circular_segments(radius, policy.profile);
            Produced::Section(cs.fillet(radius, arc))
        }
        OpCode::CrossOffsetClone => {
            let in_id = cur.read_u32().ok_or_else(malformed)?;
            let delta = cur.read_f64().ok_or_else(malformed)?;
            sem.inputs.push(in_id);
            sem.params_f64.push(delta);
            let cs = tables.need_cross_section(in_id)?;
            Produced::Section(cs.offset(delta, JoinKind::Miter))
        }
    };

    if !cur.exhausted() {
        return Err(ReplayError::TrailingBytes(view.opcode));
    }

    sem.valid = true;
    tables.semantics[out_id as usize] = sem;
    match produced {
        Produced::Solid(m) => tables.manifolds[out_id as usize] = Some(m),
        Produced::Section(cs) => tables.cross_sections[out_id as usize] = Some(cs),
    }
    Ok(())
}

/// Resolve a manifold root, rejecting kind mismatches and kernel faults.
pub fn resolve_replay_manifold(
    tables: &ReplayTables,
    root_kind: u32,
    root_id: u32,
) -> Result<Manifold, ReplayError> {
    if NodeKind::from_u32(root_kind) != NodeKind::Manifold {
        return Err(ReplayError::RootNotManifold);
    }
    let m = tables
        .manifolds
        .get(root_id as usize)
        .and_then(Clone::clone)
        .ok_or(ReplayError::RootManifoldMissing(root_id))?;
    check_status(m, "final")
}

/// Resolve a cross-section root.
pub fn resolve_replay_cross_section(
    tables: &ReplayTables,
    root_kind: u32,
    root_id: u32,
) -> Result<CrossSection, ReplayError> {
    if NodeKind::from_u32(root_kind) != NodeKind::CrossSection {
        return Err(ReplayError::RootNotCrossSection);
    }
    tables
        .cross_sections
        .get(root_id as usize)
        .and_then(Clone::clone)
        .ok_or(ReplayError::RootCrossSectionMissing(root_id))
}

/// Replay a stream and return the root manifold's mesh, applying the
/// optional post-process hook.
pub fn replay_ops_to_mesh(input: &ReplayInput<'_>) -> Result<MeshData, ReplayError> {
    let tables = replay_ops_to_tables(input.records, input.op_count, &input.lod_policy)?;
    let root = resolve_replay_manifold(&tables, input.root_kind, input.root_id)?;
    let root = apply_replay_postprocess(root, &input.lod_policy.postprocess);
    Ok(root.get_mesh())
}
