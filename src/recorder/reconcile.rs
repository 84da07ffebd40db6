// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! End-of-run backpatching of workflow boundary ports.
//!
//! Boundary inputs receive copies of their successor's bindings, boundary
//! outputs and their predecessor exchange bindings and collections, so that
//! either name resolves to the same values. Every copy is written with
//! [`WriteMode::KeepExisting`]: rows already present are left alone.

use crate::errors::RecorderError;
use crate::graph::{propagate_depths, StructureSnapshot};
use crate::observability::messages::graph::{DepthsPropagated, TopologicalSortFailed};
use crate::observability::messages::recorder::{AmbiguousBoundaryLink, ReconciliationSkipped};
use crate::observability::messages::StructuredLog;
use crate::schema::{Port, PortDirection, WriteBatch, WriteIntent, WriteMode};
use crate::traits::ProvenanceStore;

/// What reconciliation of one run planned.
#[derive(Debug, Default)]
pub struct Reconciliation {
    pub batch: WriteBatch,
    pub backpatched: usize,
    pub depths: usize,
}

pub async fn plan_reconciliation(
    store: &dyn ProvenanceStore,
    run_id: &str,
    workflow_id: &str,
    observed_depths: &[(String, u32)],
    persist_depths: bool,
) -> Result<Reconciliation, RecorderError> {
    let mut snapshot = StructureSnapshot::load(store, workflow_id).await?;
    snapshot.require_workflow(workflow_id)?;
    let mut plan = Reconciliation::default();

    let inputs: Vec<Port> = snapshot
        .boundary_ports(workflow_id, PortDirection::Input)
        .into_iter()
        .cloned()
        .collect();
    for boundary in &inputs {
        let links = snapshot.outgoing_links(&boundary.id);
        let Some(first) = links.first() else {
            ReconciliationSkipped {
                run_id,
                port_name: &boundary.name,
                direction: boundary.direction,
            }
            .log();
            continue;
        };
        if links.len() > 1 {
            AmbiguousBoundaryLink {
                workflow_id,
                port_name: &boundary.name,
                links: links.len(),
            }
            .log();
        }
        let Some(successor) = snapshot.port(&first.sink_port_id) else {
            continue;
        };

        let target = boundary.port_ref();
        for binding in store.port_bindings(run_id, &successor.port_ref()).await? {
            plan.batch.push(WriteIntent::PortBinding {
                binding: binding.rebound_to(&target, Some(boundary.id.clone())),
                mode: WriteMode::KeepExisting,
            });
            plan.backpatched += 1;
        }
    }

    let outputs: Vec<Port> = snapshot
        .boundary_ports(workflow_id, PortDirection::Output)
        .into_iter()
        .cloned()
        .collect();
    for boundary in &outputs {
        let predecessor = snapshot
            .incoming_link(&boundary.id)
            .and_then(|link| snapshot.port(&link.source_port_id));
        let Some(predecessor) = predecessor else {
            ReconciliationSkipped {
                run_id,
                port_name: &boundary.name,
                direction: boundary.direction,
            }
            .log();
            continue;
        };

        // Merge both ways
        let pairs = [
            (predecessor.port_ref(), boundary.port_ref(), boundary.id.clone()),
            (boundary.port_ref(), predecessor.port_ref(), predecessor.id.clone()),
        ];
        for (from, to, to_id) in pairs {
            for binding in store.port_bindings(run_id, &from).await? {
                plan.batch.push(WriteIntent::PortBinding {
                    binding: binding.rebound_to(&to, Some(to_id.clone())),
                    mode: WriteMode::KeepExisting,
                });
                plan.backpatched += 1;
            }
            for collection in store.collections(run_id, &from).await? {
                plan.batch.push(WriteIntent::Collection {
                    collection: collection.rebound_to(&to),
                    mode: WriteMode::KeepExisting,
                });
                plan.backpatched += 1;
            }
        }
    }

    for (port_id, depth) in observed_depths {
        snapshot.set_resolved_depth(port_id, *depth);
    }
    match propagate_depths(&mut snapshot, workflow_id) {
        Ok(assigned) => {
            DepthsPropagated {
                workflow_id,
                port_count: assigned.len(),
            }
            .log();
            plan.depths = assigned.len();
            if persist_depths {
                for (port_id, depth) in assigned {
                    plan.batch
                        .push(WriteIntent::ResolvedDepth { port_id, depth });
                }
            }
        }
        Err(error) => TopologicalSortFailed {
            workflow_id,
            error: &error,
        }
        .log(),
    }

    Ok(plan)
}
