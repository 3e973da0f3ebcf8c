//! Postorder operation traces for the inspector.

use std::collections::HashSet;

use core_protocol::{NodeKind, OpCode};

use crate::ReplayError;
use crate::interpreter::ReplayTables;

/// One inspector row: opcode, display name, output id, and the merged
/// parameter list (floats first, then the integer params widened).
#[derive(Debug, Clone)]
pub struct OpTraceEntry {
    pub opcode: u16,
    pub name: &'static str,
    pub out_id: u32,
    pub args: Vec<f64>,
}

fn collect_postorder(tables: &ReplayTables, id: u32, visited: &mut HashSet<u32>, order: &mut Vec<u32>) {
    let Some(node) = tables.semantic(id) else {
        return;
    };
    if !visited.insert(id) {
        return;
    }
    for &input in &node.inputs {
        collect_postorder(tables, input, visited, order);
    }
    order.push(id);
}

/// Build the postorder trace rooted at `(root_kind, root_id)`.
pub fn build_operation_trace(
    tables: &ReplayTables,
    root_kind: u32,
    root_id: u32,
) -> Result<Vec<OpTraceEntry>, ReplayError> {
    match NodeKind::from_u32(root_kind) {
        NodeKind::Manifold => {
            if !tables.has_manifold(root_id) {
                return Err(ReplayError::RootManifoldMissing(root_id));
            }
        }
        NodeKind::CrossSection => {
            if !tables.has_cross_section(root_id) {
                return Err(ReplayError::RootCrossSectionMissing(root_id));
            }
        }
        NodeKind::Unknown => return Err(ReplayError::RootNotManifold),
    }

    let mut visited = HashSet::new();
    let mut order = Vec::new();
    collect_postorder(tables, root_id, &mut visited, &mut order);

    let mut out = Vec::with_capacity(order.len());
    for id in order {
        let Some(node) = tables.semantic(id) else {
            continue;
        };
        let mut args = Vec::with_capacity(node.params_f64.len() + node.params_u32.len());
        args.extend_from_slice(&node.params_f64);
        args.extend(node.params_u32.iter().map(|&v| v as f64));
        out.push(OpTraceEntry {
            opcode: node.opcode,
            name: OpCode::from_u16(node.opcode).map_or("Unknown", OpCode::name),
            out_id: node.out_id,
            args,
        });
    }
    Ok(out)
}
