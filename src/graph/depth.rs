// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::{BTreeMap, HashSet};

use crate::errors::GraphError;
use crate::graph::{topological_order, StructureSnapshot};
use crate::schema::PortDirection;

/// Propagate resolved port depths forward through `workflow_id`.
///
/// The workflow's boundary inputs are seeded with their resolved depth (or
/// declared depth when unset). Each processor, in topological order, adds
/// `sum(max(0, resolved - declared))` over its inputs to the declared depth of
/// every output. Depths travel along datalinks and pass unchanged through
/// boundary and nested-workflow ports.
///
/// Returns every `(port id, resolved depth)` set on the snapshot, ordered by
/// port id.
pub fn propagate_depths(
    snapshot: &mut StructureSnapshot,
    workflow_id: &str,
) -> Result<Vec<(String, u32)>, GraphError> {
    snapshot.require_workflow(workflow_id)?;
    let order = topological_order(snapshot, workflow_id)?;
    let mut assigned = BTreeMap::new();

    let seeds: Vec<(String, u32)> = snapshot
        .boundary_ports(workflow_id, PortDirection::Input)
        .into_iter()
        .map(|p| (p.id.clone(), p.effective_depth()))
        .collect();
    for (port_id, depth) in seeds {
        assign(snapshot, &port_id, depth, &mut assigned);
        push(snapshot, &port_id, depth, &mut assigned, &mut HashSet::new());
    }

    for processor_id in order {
        let extra: u32 = snapshot
            .input_ports(&processor_id)
            .into_iter()
            .map(|p| p.depth_delta())
            .sum();
        let outputs: Vec<(String, u32)> = snapshot
            .output_ports(&processor_id)
            .into_iter()
            .map(|p| (p.id.clone(), p.declared_depth + extra))
            .collect();

        for (port_id, depth) in outputs {
            assign(snapshot, &port_id, depth, &mut assigned);
            push(snapshot, &port_id, depth, &mut assigned, &mut HashSet::new());
        }
    }

    Ok(assigned.into_iter().collect())
}

fn assign(
    snapshot: &mut StructureSnapshot,
    port_id: &str,
    depth: u32,
    assigned: &mut BTreeMap<String, u32>,
) {
    if let Some(resolved) = snapshot.set_resolved_depth(port_id, depth) {
        assigned.insert(port_id.to_string(), resolved);
    }
}

fn push(
    snapshot: &mut StructureSnapshot,
    port_id: &str,
    depth: u32,
    assigned: &mut BTreeMap<String, u32>,
    visited: &mut HashSet<String>,
) {
    if !visited.insert(port_id.to_string()) {
        return;
    }

    let sinks: Vec<String> = snapshot
        .outgoing_links(port_id)
        .into_iter()
        .map(|link| link.sink_port_id.clone())
        .collect();

    for sink_id in sinks {
        assign(snapshot, &sink_id, depth, assigned);
        let transparent = snapshot
            .port(&sink_id)
            .map(|sink| snapshot.is_transparent(sink))
            .unwrap_or(false);
        if transparent {
            push(snapshot, &sink_id, depth, assigned, visited);
        }
    }
}
