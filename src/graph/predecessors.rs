// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::HashMap;

use crate::errors::GraphError;
use crate::graph::StructureSnapshot;
use crate::schema::Datalink;

/// The processor ids at both ends of `link` when it is a processor-to-processor
/// link scoped to `workflow_id`
pub(crate) fn processor_edge<'a>(
    snapshot: &'a StructureSnapshot,
    workflow_id: &str,
    link: &Datalink,
) -> Option<(&'a str, &'a str)> {
    if link.workflow_id != workflow_id {
        return None;
    }
    let source = snapshot.owner(snapshot.port(&link.source_port_id)?)?;
    let sink = snapshot.owner(snapshot.port(&link.sink_port_id)?)?;
    if source.workflow_id != workflow_id || sink.workflow_id != workflow_id {
        return None;
    }
    Some((source.id.as_str(), sink.id.as_str()))
}

/// Count incoming datalinks per processor of `workflow_id`, keyed by processor id.
///
/// Only links scoped to the workflow whose two endpoints are processors of the
/// workflow count. Links touching a boundary port, which includes the bridging
/// links between a nested-workflow processor and its sub-workflow, are internal
/// to the recursive expansion and are not counted at this scope.
pub fn predecessor_counts(
    snapshot: &StructureSnapshot,
    workflow_id: &str,
) -> Result<HashMap<String, usize>, GraphError> {
    snapshot.require_workflow(workflow_id)?;

    let mut counts: HashMap<String, usize> = snapshot
        .processors_in(workflow_id)
        .into_iter()
        .map(|p| (p.id.clone(), 0))
        .collect();

    for link in snapshot.links() {
        if let Some((_, sink)) = processor_edge(snapshot, workflow_id, link) {
            if let Some(count) = counts.get_mut(sink) {
                *count += 1;
            }
        }
    }

    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::SnapshotBuilder;
    use crate::schema::PortDirection;

    #[test]
    fn test_counts_processor_links_only() {
        let snapshot = SnapshotBuilder::new("W", "W")
            .boundary("W", "X", PortDirection::Input)
            .processor("W", "A", &["in"], &["out"])
            .processor("W", "B", &["left", "right"], &["out"])
            .link("W", ("W", "X"), ("A", "in"))
            .link("W", ("A", "out"), ("B", "left"))
            .link("W", ("A", "out"), ("B", "right"))
            .build();

        let counts = predecessor_counts(&snapshot, "W").unwrap();
        assert_eq!(counts["W/A"], 0);
        assert_eq!(counts["W/B"], 2);
    }

    #[test]
    fn test_bridging_links_are_not_counted_at_parent_scope() {
        let snapshot = SnapshotBuilder::new("W", "W")
            .workflow("N", "Nested", "W")
            .boundary("N", "x", PortDirection::Input)
            .boundary("N", "y", PortDirection::Output)
            .processor("N", "Echo", &["in"], &["out"])
            .link("N", ("Nested", "x"), ("Echo", "in"))
            .link("N", ("Echo", "out"), ("Nested", "y"))
            .processor("W", "A", &["in"], &["out"])
            .nested("W", "Sub", "N", &["x"], &["y"])
            .processor("W", "B", &["in"], &["out"])
            .link("W", ("A", "out"), ("Sub", "x"))
            .link("W", ("Sub", "y"), ("B", "in"))
            .build();

        let counts = predecessor_counts(&snapshot, "W").unwrap();
        assert_eq!(counts.len(), 3);
        assert_eq!(counts["W/A"], 0);
        assert_eq!(counts["W/Sub"], 1);
        assert_eq!(counts["W/B"], 1);

        let nested = predecessor_counts(&snapshot, "N").unwrap();
        assert_eq!(nested.len(), 1);
        assert_eq!(nested["N/Echo"], 0);
    }

    #[test]
    fn test_unknown_workflow() {
        let snapshot = SnapshotBuilder::new("W", "W").build();
        assert!(matches!(
            predecessor_counts(&snapshot, "missing"),
            Err(GraphError::UnknownWorkflow { .. })
        ));
    }
}
