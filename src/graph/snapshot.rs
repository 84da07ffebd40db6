// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::HashMap;

use crate::errors::{GraphError, StorageError};
use crate::schema::{Datalink, Port, PortDirection, Processor, Workflow};
use crate::traits::ProvenanceStore;

/// Immutable in-memory copy of one top-level workflow's static structure.
///
/// Loaded once per lineage query or reconciliation so that graph walks never
/// interleave with store reads. Only resolved depths may be changed, and only
/// on this copy.
#[derive(Debug, Clone, Default)]
pub struct StructureSnapshot {
    top_workflow_id: String,
    workflows: HashMap<String, Workflow>,
    processors: HashMap<String, Processor>,
    ports: HashMap<String, Port>,
    links: Vec<Datalink>,
    /// workflow id -> processor ids ordered by name
    processors_by_workflow: HashMap<String, Vec<String>>,
    /// processor id -> port ids
    ports_by_processor: HashMap<String, Vec<String>>,
    /// workflow id -> boundary port ids
    boundary_ports: HashMap<String, Vec<String>>,
    /// sink port id -> link index
    by_sink: HashMap<String, usize>,
    /// source port id -> link indexes
    by_source: HashMap<String, Vec<usize>>,
}

impl StructureSnapshot {
    /// Load the workflow tree rooted at `top_workflow_id`
    pub async fn load(
        store: &dyn ProvenanceStore,
        top_workflow_id: &str,
    ) -> Result<Self, StorageError> {
        let workflows = store.workflow_tree(top_workflow_id).await?;
        let mut processors = Vec::new();
        let mut ports = Vec::new();
        let mut links = Vec::new();

        for workflow in &workflows {
            processors.extend(store.processors(&workflow.id).await?);
            ports.extend(store.ports(&workflow.id).await?);
            links.extend(store.datalinks(&workflow.id).await?);
        }

        Ok(Self::from_parts(
            top_workflow_id,
            workflows,
            processors,
            ports,
            links,
        ))
    }

    pub fn from_parts(
        top_workflow_id: &str,
        workflows: Vec<Workflow>,
        processors: Vec<Processor>,
        ports: Vec<Port>,
        links: Vec<Datalink>,
    ) -> Self {
        let mut snapshot = Self {
            top_workflow_id: top_workflow_id.to_string(),
            ..Self::default()
        };

        for workflow in workflows {
            snapshot
                .processors_by_workflow
                .entry(workflow.id.clone())
                .or_default();
            snapshot.workflows.insert(workflow.id.clone(), workflow);
        }

        let mut sorted_processors = processors;
        sorted_processors.sort_by(|a, b| (&a.workflow_id, &a.name).cmp(&(&b.workflow_id, &b.name)));
        for processor in sorted_processors {
            snapshot
                .processors_by_workflow
                .entry(processor.workflow_id.clone())
                .or_default()
                .push(processor.id.clone());
            snapshot.processors.insert(processor.id.clone(), processor);
        }

        for port in ports {
            match &port.processor_id {
                Some(processor_id) => snapshot
                    .ports_by_processor
                    .entry(processor_id.clone())
                    .or_default()
                    .push(port.id.clone()),
                None => snapshot
                    .boundary_ports
                    .entry(port.workflow_id.clone())
                    .or_default()
                    .push(port.id.clone()),
            }
            snapshot.ports.insert(port.id.clone(), port);
        }

        for (index, link) in links.iter().enumerate() {
            // First link into a sink wins
            snapshot
                .by_sink
                .entry(link.sink_port_id.clone())
                .or_insert(index);
            snapshot
                .by_source
                .entry(link.source_port_id.clone())
                .or_default()
                .push(index);
        }
        snapshot.links = links;

        snapshot
    }

    pub fn top_workflow_id(&self) -> &str {
        &self.top_workflow_id
    }

    pub fn workflow(&self, workflow_id: &str) -> Option<&Workflow> {
        self.workflows.get(workflow_id)
    }

    pub fn contains_workflow(&self, workflow_id: &str) -> bool {
        self.workflows.contains_key(workflow_id)
    }

    pub fn require_workflow(&self, workflow_id: &str) -> Result<&Workflow, GraphError> {
        self.workflow(workflow_id)
            .ok_or_else(|| GraphError::UnknownWorkflow {
                workflow_id: workflow_id.to_string(),
            })
    }

    pub fn processor(&self, processor_id: &str) -> Option<&Processor> {
        self.processors.get(processor_id)
    }

    /// Processors of one workflow, ordered by name
    pub fn processors_in(&self, workflow_id: &str) -> Vec<&Processor> {
        self.processors_by_workflow
            .get(workflow_id)
            .map(|ids| ids.iter().filter_map(|id| self.processors.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn processor_by_name(&self, workflow_id: &str, name: &str) -> Option<&Processor> {
        self.processors_in(workflow_id)
            .into_iter()
            .find(|p| p.name == name)
    }

    pub fn port(&self, port_id: &str) -> Option<&Port> {
        self.ports.get(port_id)
    }

    pub fn ports(&self) -> impl Iterator<Item = &Port> {
        self.ports.values()
    }

    /// The processor owning a port, `None` for boundary ports
    pub fn owner(&self, port: &Port) -> Option<&Processor> {
        port.processor_id
            .as_deref()
            .and_then(|id| self.processors.get(id))
    }

    fn processor_ports(&self, processor_id: &str, direction: PortDirection) -> Vec<&Port> {
        let mut ports: Vec<&Port> = self
            .ports_by_processor
            .get(processor_id)
            .map(|ids| ids.iter().filter_map(|id| self.ports.get(id)).collect())
            .unwrap_or_default();
        ports.retain(|p| p.direction == direction);
        ports.sort_by(|a, b| {
            (a.iteration_strategy_order, &a.name).cmp(&(b.iteration_strategy_order, &b.name))
        });
        ports
    }

    /// Input ports in iteration-strategy order
    pub fn input_ports(&self, processor_id: &str) -> Vec<&Port> {
        self.processor_ports(processor_id, PortDirection::Input)
    }

    pub fn output_ports(&self, processor_id: &str) -> Vec<&Port> {
        self.processor_ports(processor_id, PortDirection::Output)
    }

    pub fn boundary_ports(&self, workflow_id: &str, direction: PortDirection) -> Vec<&Port> {
        let mut ports: Vec<&Port> = self
            .boundary_ports
            .get(workflow_id)
            .map(|ids| ids.iter().filter_map(|id| self.ports.get(id)).collect())
            .unwrap_or_default();
        ports.retain(|p| p.direction == direction);
        ports.sort_by(|a, b| {
            (a.iteration_strategy_order, &a.name).cmp(&(b.iteration_strategy_order, &b.name))
        });
        ports
    }

    /// Port addressed by owner name; processor ports shadow a same-named
    /// boundary port of the workflow
    pub fn find_port(
        &self,
        workflow_id: &str,
        owner_name: &str,
        port_name: &str,
        direction: PortDirection,
    ) -> Option<&Port> {
        if let Some(processor) = self.processor_by_name(workflow_id, owner_name) {
            if let Some(port) = self
                .processor_ports(&processor.id, direction)
                .into_iter()
                .find(|p| p.name == port_name)
            {
                return Some(port);
            }
        }

        let workflow = self.workflows.get(workflow_id)?;
        if workflow.name != owner_name {
            return None;
        }
        self.boundary_ports(workflow_id, direction)
            .into_iter()
            .find(|p| p.name == port_name)
    }

    pub fn incoming_link(&self, port_id: &str) -> Option<&Datalink> {
        self.by_sink.get(port_id).map(|&index| &self.links[index])
    }

    pub fn outgoing_links(&self, port_id: &str) -> Vec<&Datalink> {
        self.by_source
            .get(port_id)
            .map(|indexes| indexes.iter().map(|&index| &self.links[index]).collect())
            .unwrap_or_default()
    }

    pub fn links(&self) -> &[Datalink] {
        &self.links
    }

    /// Boundary ports and ports of nested-workflow processors pass values
    /// through unchanged
    pub fn is_transparent(&self, port: &Port) -> bool {
        match self.owner(port) {
            None => true,
            Some(processor) => processor.is_nested_workflow(),
        }
    }

    pub fn set_resolved_depth(&mut self, port_id: &str, depth: u32) -> Option<u32> {
        let port = self.ports.get_mut(port_id)?;
        let resolved = depth.max(port.declared_depth);
        port.resolved_depth = Some(resolved);
        Some(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::SnapshotBuilder;

    #[test]
    fn test_find_port_prefers_processor_over_boundary() {
        let snapshot = SnapshotBuilder::new("W", "W")
            .boundary("W", "X", PortDirection::Input)
            .processor("W", "W", &["X"], &["out"])
            .build();

        let port = snapshot
            .find_port("W", "W", "X", PortDirection::Input)
            .unwrap();
        assert!(!port.is_boundary());
    }

    #[test]
    fn test_links_are_indexed_both_ways() {
        let snapshot = SnapshotBuilder::new("W", "W")
            .boundary("W", "X", PortDirection::Input)
            .processor("W", "A", &["in"], &["out"])
            .processor("W", "B", &["in"], &["out"])
            .link("W", ("W", "X"), ("A", "in"))
            .link("W", ("A", "out"), ("B", "in"))
            .build();

        let a_out = snapshot
            .find_port("W", "A", "out", PortDirection::Output)
            .unwrap();
        let b_in = snapshot
            .find_port("W", "B", "in", PortDirection::Input)
            .unwrap();

        assert_eq!(snapshot.outgoing_links(&a_out.id).len(), 1);
        assert_eq!(
            snapshot.incoming_link(&b_in.id).unwrap().source_port_id,
            a_out.id
        );
        assert!(snapshot.is_transparent(
            snapshot
                .find_port("W", "W", "X", PortDirection::Input)
                .unwrap()
        ));
    }
}
