// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::{HashMap, VecDeque};

use crate::errors::GraphError;
use crate::graph::predecessors::{predecessor_counts, processor_edge};
use crate::graph::StructureSnapshot;

/// Topological order of the processors of `workflow_id`, as processor ids.
///
/// Kahn's algorithm seeded with the zero-predecessor processors in name order.
/// A nested-workflow processor is replaced, where it is dequeued, by the
/// topological order of its sub-workflow, so the result lists only processors
/// that do work. Nested processors still release their successors in the
/// parent workflow.
///
/// ## Error Conditions
/// - `GraphError::Cycle` when some processors can never be released
/// - `GraphError::NestingCycle` when a sub-workflow (transitively) nests itself
/// - `GraphError::UnknownWorkflow` for a workflow outside the snapshot
pub fn topological_order(
    snapshot: &StructureSnapshot,
    workflow_id: &str,
) -> Result<Vec<String>, GraphError> {
    let mut nesting = Vec::new();
    order_workflow(snapshot, workflow_id, &mut nesting)
}

fn order_workflow(
    snapshot: &StructureSnapshot,
    workflow_id: &str,
    nesting: &mut Vec<String>,
) -> Result<Vec<String>, GraphError> {
    if nesting.iter().any(|id| id == workflow_id) {
        return Err(GraphError::NestingCycle {
            workflow_id: workflow_id.to_string(),
        });
    }
    nesting.push(workflow_id.to_string());

    let mut in_degree = predecessor_counts(snapshot, workflow_id)?;

    // processor id -> successor processor ids, one entry per link
    let mut successors: HashMap<&str, Vec<&str>> = HashMap::new();
    for link in snapshot.links() {
        if let Some((source, sink)) = processor_edge(snapshot, workflow_id, link) {
            successors.entry(source).or_default().push(sink);
        }
    }

    let mut queue: VecDeque<String> = snapshot
        .processors_in(workflow_id)
        .into_iter()
        .filter(|p| in_degree.get(&p.id).copied().unwrap_or(0) == 0)
        .map(|p| p.id.clone())
        .collect();

    let mut released = 0;
    let mut order = Vec::new();

    while let Some(current_id) = queue.pop_front() {
        released += 1;

        match snapshot
            .processor(&current_id)
            .and_then(|p| p.nested_workflow_id.as_deref())
        {
            Some(nested_id) if snapshot.contains_workflow(nested_id) => {
                order.extend(order_workflow(snapshot, nested_id, nesting)?);
            }
            _ => order.push(current_id.clone()),
        }

        let mut ready = Vec::new();
        for successor in successors.get(current_id.as_str()).into_iter().flatten() {
            if let Some(count) = in_degree.get_mut(*successor) {
                *count -= 1;
                if *count == 0 {
                    ready.push(*successor);
                }
            }
        }
        ready.sort_by_key(|id| snapshot.processor(id).map(|p| p.name.as_str()));
        queue.extend(ready.into_iter().map(str::to_string));
    }

    nesting.pop();

    if released != in_degree.len() {
        let mut remaining: Vec<String> = in_degree
            .iter()
            .filter(|(_, count)| **count > 0)
            .filter_map(|(id, _)| snapshot.processor(id).map(|p| p.name.clone()))
            .collect();
        remaining.sort();
        return Err(GraphError::Cycle {
            workflow_id: workflow_id.to_string(),
            remaining,
        });
    }

    Ok(order)
}
