// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::errors::StorageError;
use crate::events::{LinkEndpoint, PortDescription, WorkflowDescription};
use crate::observability::messages::recorder::{
    DuplicateSinkLink, StructureAlreadyKnown, StructureIngested, UnresolvedDatalinkEndpoint,
};
use crate::observability::messages::StructuredLog;
use crate::schema::{Datalink, Port, PortDirection, Processor, Workflow, WriteBatch, WriteIntent};
use crate::traits::ProvenanceStore;

/// Port name index of one workflow: `(owning processor, port, direction)`,
/// with `None` as owner for boundary ports.
type PortIndex = HashMap<(Option<String>, String, PortDirection), String>;

/// Boundary port ids of a workflow by `(name, direction)`.
type BoundaryIndex = HashMap<(String, PortDirection), String>;

/// Plan the static rows for a workflow description.
///
/// Returns an empty batch when the top-level workflow is already stored.
/// Nested workflows that are already stored are not written again; their
/// boundary ports are reused for the bridging links.
pub async fn plan_structure(
    store: &dyn ProvenanceStore,
    run_id: &str,
    description: &WorkflowDescription,
) -> Result<WriteBatch, StorageError> {
    if store.workflow(&description.id).await?.is_some() {
        StructureAlreadyKnown {
            workflow_id: &description.id,
        }
        .log();
        return Ok(WriteBatch::new());
    }

    let mut planner = StructurePlanner::default();
    for nested_id in description.workflow_ids().into_iter().skip(1) {
        if store.workflow(nested_id).await?.is_none() {
            continue;
        }
        let boundary: BoundaryIndex = store
            .ports(nested_id)
            .await?
            .into_iter()
            .filter(Port::is_boundary)
            .map(|p| ((p.name, p.direction), p.id))
            .collect();
        for link in store.datalinks(nested_id).await? {
            planner.linked_sinks.insert(link.sink_port_id);
        }
        planner.ingested.insert(nested_id.to_string(), boundary);
    }

    planner.walk(description, None);

    StructureIngested {
        workflow_id: &description.id,
        run_id,
        workflows: planner.workflows,
        processors: planner.processors,
        ports: planner.ports,
        links: planner.links,
    }
    .log();

    Ok(planner.batch)
}

#[derive(Default)]
struct StructurePlanner {
    batch: WriteBatch,
    /// Workflows written (or found) so far, with their boundary port ids
    ingested: HashMap<String, BoundaryIndex>,
    linked_sinks: HashSet<String>,
    workflows: usize,
    processors: usize,
    ports: usize,
    links: usize,
}

impl StructurePlanner {
    /// Write one workflow depth-first and return its boundary port ids
    fn walk(&mut self, description: &WorkflowDescription, parent_id: Option<&str>) -> BoundaryIndex {
        if let Some(boundary) = self.ingested.get(&description.id) {
            return boundary.clone();
        }
        // Registered before recursing so a self-nesting description terminates
        self.ingested
            .insert(description.id.clone(), BoundaryIndex::new());

        self.batch.push(WriteIntent::Workflow(Workflow {
            id: description.id.clone(),
            parent_id: parent_id.map(str::to_string),
            name: description.name.clone(),
        }));
        self.workflows += 1;

        let mut index = PortIndex::new();
        let mut boundary = BoundaryIndex::new();
        for (direction, ports) in [
            (PortDirection::Input, &description.inputs),
            (PortDirection::Output, &description.outputs),
        ] {
            for (order, port) in ports.iter().enumerate() {
                let id = self.port(description, None, &description.name, port, direction, order);
                index.insert((None, port.name.clone(), direction), id.clone());
                boundary.insert((port.name.clone(), direction), id);
            }
        }
        self.ingested
            .insert(description.id.clone(), boundary.clone());

        for processor in &description.processors {
            let processor_id = Uuid::new_v4().to_string();
            let nested = processor.nested_workflow();
            self.batch.push(WriteIntent::Processor(Processor {
                id: processor_id.clone(),
                name: processor.name.clone(),
                workflow_id: description.id.clone(),
                first_activity: processor.activity.classifier.clone(),
                nested_workflow_id: nested.map(|n| n.id.clone()),
                top_level: parent_id.is_none(),
            }));
            self.processors += 1;

            let mut own = Vec::new();
            for (direction, ports) in [
                (PortDirection::Input, &processor.inputs),
                (PortDirection::Output, &processor.outputs),
            ] {
                for (order, port) in ports.iter().enumerate() {
                    let id = self.port(
                        description,
                        Some(&processor_id),
                        &processor.name,
                        port,
                        direction,
                        order,
                    );
                    index.insert(
                        (Some(processor.name.clone()), port.name.clone(), direction),
                        id.clone(),
                    );
                    own.push((port.name.clone(), direction, id));
                }
            }

            if let Some(nested) = nested {
                let nested_boundary = self.walk(nested, Some(&description.id));
                for (name, direction, id) in own {
                    let Some(inner) = nested_boundary.get(&(name, direction)) else {
                        continue;
                    };
                    match direction {
                        PortDirection::Input => self.link(&nested.id, &id, inner),
                        PortDirection::Output => self.link(&nested.id, inner, &id),
                    }
                }
            }
        }

        for link in &description.datalinks {
            let source = resolve_endpoint(&index, &link.source, PortDirection::Output);
            let sink = resolve_endpoint(&index, &link.sink, PortDirection::Input);
            match (source, sink) {
                (Some(source), Some(sink)) => {
                    let (source, sink) = (source.clone(), sink.clone());
                    self.link(&description.id, &source, &sink);
                }
                (None, _) => UnresolvedDatalinkEndpoint {
                    workflow_id: &description.id,
                    endpoint: &link.source.to_string(),
                }
                .log(),
                (_, None) => UnresolvedDatalinkEndpoint {
                    workflow_id: &description.id,
                    endpoint: &link.sink.to_string(),
                }
                .log(),
            }
        }

        boundary
    }

    fn port(
        &mut self,
        workflow: &WorkflowDescription,
        processor_id: Option<&str>,
        owner_name: &str,
        port: &PortDescription,
        direction: PortDirection,
        order: usize,
    ) -> String {
        let id = Uuid::new_v4().to_string();
        self.batch.push(WriteIntent::Port(Port {
            id: id.clone(),
            processor_id: processor_id.map(str::to_string),
            processor_name: owner_name.to_string(),
            workflow_id: workflow.id.clone(),
            name: port.name.clone(),
            direction,
            declared_depth: port.depth,
            resolved_depth: None,
            iteration_strategy_order: order as u32,
        }));
        self.ports += 1;
        id
    }

    fn link(&mut self, workflow_id: &str, source: &str, sink: &str) {
        if !self.linked_sinks.insert(sink.to_string()) {
            DuplicateSinkLink {
                workflow_id,
                sink,
            }
            .log();
            return;
        }
        self.batch.push(WriteIntent::Datalink(Datalink {
            id: Uuid::new_v4().to_string(),
            workflow_id: workflow_id.to_string(),
            source_port_id: source.to_string(),
            sink_port_id: sink.to_string(),
        }));
        self.links += 1;
    }
}

/// A link source is a processor output or a boundary input; a sink is a
/// processor input or a boundary output.
fn resolve_endpoint<'a>(
    index: &'a PortIndex,
    endpoint: &LinkEndpoint,
    processor_side: PortDirection,
) -> Option<&'a String> {
    match endpoint {
        LinkEndpoint::Processor { processor, port } => {
            index.get(&(Some(processor.clone()), port.clone(), processor_side))
        }
        LinkEndpoint::Workflow { port } => {
            let boundary_side = match processor_side {
                PortDirection::Output => PortDirection::Input,
                PortDirection::Input => PortDirection::Output,
            };
            index.get(&(None, port.clone(), boundary_side))
        }
        LinkEndpoint::Merge { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::memory::InMemoryStore;
    use crate::events::DatalinkDescription;
    use crate::fixtures::{identity_workflow, nested_workflow};

    fn count(batch: &WriteBatch, kind: &str) -> usize {
        batch.iter().filter(|i| i.kind() == kind).count()
    }

    #[tokio::test]
    async fn test_identity_structure_rows() {
        let store = InMemoryStore::new();
        let batch = plan_structure(&store, "R1", &identity_workflow())
            .await
            .unwrap();

        assert_eq!(count(&batch, "workflow"), 1);
        assert_eq!(count(&batch, "processor"), 1);
        assert_eq!(count(&batch, "port"), 4);
        assert_eq!(count(&batch, "datalink"), 2);
    }

    #[tokio::test]
    async fn test_known_workflow_is_skipped() {
        let store = InMemoryStore::new();
        let batch = plan_structure(&store, "R1", &identity_workflow())
            .await
            .unwrap();
        store.apply(batch).await.unwrap();

        let again = plan_structure(&store, "R2", &identity_workflow())
            .await
            .unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn test_nested_workflow_gets_parent_and_bridging_links() {
        let store = InMemoryStore::new();
        let batch = plan_structure(&store, "R1", &nested_workflow())
            .await
            .unwrap();

        let inner = batch
            .iter()
            .find_map(|i| match i {
                WriteIntent::Workflow(w) if w.id == "wf-inner" => Some(w.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(inner.parent_id.as_deref(), Some("wf-outer"));

        // 3 outer links, 2 inner links, 2 bridging links scoped to the inner workflow
        assert_eq!(count(&batch, "datalink"), 7);
        let scoped_inner = batch
            .iter()
            .filter(|i| matches!(i, WriteIntent::Datalink(l) if l.workflow_id == "wf-inner"))
            .count();
        assert_eq!(scoped_inner, 4);
    }

    #[tokio::test]
    async fn test_merge_endpoints_and_duplicate_sinks_are_skipped() {
        let mut description = identity_workflow();
        description.datalinks.push(DatalinkDescription {
            source: LinkEndpoint::Merge {
                name: "m".into(),
                port: "out".into(),
            },
            sink: LinkEndpoint::Processor {
                processor: "Proc1".into(),
                port: "in".into(),
            },
        });
        description.datalinks.push(DatalinkDescription {
            source: LinkEndpoint::Processor {
                processor: "Proc1".into(),
                port: "out".into(),
            },
            sink: LinkEndpoint::Workflow { port: "Y".into() },
        });

        let store = InMemoryStore::new();
        let batch = plan_structure(&store, "R1", &description).await.unwrap();

        assert_eq!(count(&batch, "datalink"), 2);
    }
}
