// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! In-memory provenance store backed by DashMap tables.
//!
//! The default backend. Every table is a sharded concurrent map keyed the way
//! the relational schema keys it, so interleaved batches from different runs
//! never contend on a single lock. Reads sort their results so that callers
//! see the same order the SQLite backend produces.

use std::collections::{HashSet, VecDeque};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::errors::storage::Result;
use crate::lineage::{DependencyRecord, LineageQuery, LookupTable};
use crate::schema::{
    BindingKey, Collection, DataBinding, DataflowInvocation, Datalink, Port, PortBinding,
    PortDirection, PortRef, Processor, ProcessorEnactment, Workflow, WorkflowRun, WriteBatch,
    WriteIntent, WriteMode,
};
use crate::traits::ProvenanceStore;

pub struct InMemoryStore {
    workflows: DashMap<String, Workflow>,
    processors: DashMap<String, Processor>,
    ports: DashMap<String, Port>,
    datalinks: DashMap<String, Datalink>,
    runs: DashMap<String, WorkflowRun>,
    invocations: DashMap<String, DataflowInvocation>,
    /// Keyed by (run id, process identifier)
    enactments: DashMap<(String, String), ProcessorEnactment>,
    /// Keyed by (binding group id, port id)
    data_bindings: DashMap<(String, String), DataBinding>,
    port_bindings: DashMap<BindingKey, PortBinding>,
    collections: DashMap<BindingKey, Collection>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            workflows: DashMap::new(),
            processors: DashMap::new(),
            ports: DashMap::new(),
            datalinks: DashMap::new(),
            runs: DashMap::new(),
            invocations: DashMap::new(),
            enactments: DashMap::new(),
            data_bindings: DashMap::new(),
            port_bindings: DashMap::new(),
            collections: DashMap::new(),
        }
    }

    fn apply_intent(&self, intent: WriteIntent) {
        match intent {
            // Static structure is immutable once written
            WriteIntent::Workflow(workflow) => {
                self.workflows.entry(workflow.id.clone()).or_insert(workflow);
            }
            WriteIntent::Processor(processor) => {
                self.processors
                    .entry(processor.id.clone())
                    .or_insert(processor);
            }
            WriteIntent::Port(port) => {
                self.ports.entry(port.id.clone()).or_insert(port);
            }
            WriteIntent::Datalink(link) => {
                self.datalinks.entry(link.id.clone()).or_insert(link);
            }
            WriteIntent::Run(run) => {
                self.runs.entry(run.run_id.clone()).or_insert(run);
            }
            WriteIntent::Invocation(invocation) => {
                self.invocations
                    .insert(invocation.invocation_id.clone(), invocation);
            }
            WriteIntent::CompleteInvocation {
                invocation_id,
                ended,
                input_bindings_id,
                output_bindings_id,
            } => {
                if let Some(mut invocation) = self.invocations.get_mut(&invocation_id) {
                    invocation.ended = Some(ended);
                    invocation.completed = true;
                    if input_bindings_id.is_some() {
                        invocation.input_bindings_id = input_bindings_id;
                    }
                    if output_bindings_id.is_some() {
                        invocation.output_bindings_id = output_bindings_id;
                    }
                }
            }
            WriteIntent::Enactment(enactment) => {
                let key = (
                    enactment.run_id.clone(),
                    enactment.process_identifier.clone(),
                );
                self.enactments.insert(key, enactment);
            }
            WriteIntent::DataBinding(binding) => {
                let key = (binding.binding_group_id.clone(), binding.port_id.clone());
                self.data_bindings.insert(key, binding);
            }
            WriteIntent::PortBinding { binding, mode } => match mode {
                WriteMode::Upsert => {
                    self.port_bindings.insert(binding.key(), binding);
                }
                WriteMode::KeepExisting => {
                    self.port_bindings.entry(binding.key()).or_insert(binding);
                }
            },
            WriteIntent::Collection { collection, mode } => match mode {
                WriteMode::Upsert => {
                    self.collections.insert(collection.key(), collection);
                }
                WriteMode::KeepExisting => {
                    self.collections
                        .entry(collection.key())
                        .or_insert(collection);
                }
            },
            WriteIntent::ResolvedDepth { port_id, depth } => {
                if let Some(mut port) = self.ports.get_mut(&port_id) {
                    let declared = port.declared_depth;
                    port.resolved_depth = Some(depth.max(declared));
                }
            }
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn same_port(
    port: &PortRef,
    workflow_id: &str,
    processor_name: &str,
    port_name: &str,
    is_input: bool,
) -> bool {
    port.workflow_id == workflow_id
        && port.processor_name == processor_name
        && port.port_name == port_name
        && port.is_input() == is_input
}

#[async_trait]
impl ProvenanceStore for InMemoryStore {
    async fn apply(&self, batch: WriteBatch) -> Result<()> {
        for intent in batch {
            self.apply_intent(intent);
        }
        Ok(())
    }

    async fn workflow(&self, workflow_id: &str) -> Result<Option<Workflow>> {
        Ok(self.workflows.get(workflow_id).map(|w| w.value().clone()))
    }

    async fn workflow_tree(&self, top_workflow_id: &str) -> Result<Vec<Workflow>> {
        let mut tree = Vec::new();
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([top_workflow_id.to_string()]);

        while let Some(id) = queue.pop_front() {
            if !seen.insert(id.clone()) {
                continue;
            }
            let Some(workflow) = self.workflows.get(&id).map(|w| w.value().clone()) else {
                continue;
            };
            tree.push(workflow);

            let mut children: Vec<String> = self
                .workflows
                .iter()
                .filter(|w| w.parent_id.as_deref() == Some(id.as_str()))
                .map(|w| w.id.clone())
                .collect();
            children.sort();
            queue.extend(children);
        }

        Ok(tree)
    }

    async fn processors(&self, workflow_id: &str) -> Result<Vec<Processor>> {
        let mut processors: Vec<Processor> = self
            .processors
            .iter()
            .filter(|p| p.workflow_id == workflow_id)
            .map(|p| p.value().clone())
            .collect();
        processors.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(processors)
    }

    async fn find_processor(&self, workflow_id: &str, name: &str) -> Result<Option<Processor>> {
        Ok(self
            .processors(workflow_id)
            .await?
            .into_iter()
            .find(|p| p.name == name))
    }

    async fn ports(&self, workflow_id: &str) -> Result<Vec<Port>> {
        let mut ports: Vec<Port> = self
            .ports
            .iter()
            .filter(|p| p.workflow_id == workflow_id)
            .map(|p| p.value().clone())
            .collect();
        ports.sort_by(|a, b| {
            (&a.processor_name, a.direction, a.iteration_strategy_order, &a.name).cmp(&(
                &b.processor_name,
                b.direction,
                b.iteration_strategy_order,
                &b.name,
            ))
        });
        Ok(ports)
    }

    async fn datalinks(&self, workflow_id: &str) -> Result<Vec<Datalink>> {
        let mut links: Vec<Datalink> = self
            .datalinks
            .iter()
            .filter(|l| l.workflow_id == workflow_id)
            .map(|l| l.value().clone())
            .collect();
        links.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(links)
    }

    async fn find_ports(
        &self,
        workflow_id: &str,
        processor_name: &str,
        port_name: &str,
        direction: PortDirection,
    ) -> Result<Vec<Port>> {
        let mut ports: Vec<Port> = self
            .ports
            .iter()
            .filter(|p| {
                p.workflow_id == workflow_id
                    && p.processor_name == processor_name
                    && p.name == port_name
                    && p.direction == direction
            })
            .map(|p| p.value().clone())
            .collect();
        // Processor-owned ports win over a boundary port of the same name
        ports.sort_by(|a, b| (a.is_boundary(), &a.id).cmp(&(b.is_boundary(), &b.id)));
        Ok(ports)
    }

    async fn run(&self, run_id: &str) -> Result<Option<WorkflowRun>> {
        Ok(self.runs.get(run_id).map(|r| r.value().clone()))
    }

    async fn runs(&self, workflow_id: Option<&str>) -> Result<Vec<WorkflowRun>> {
        let mut runs: Vec<WorkflowRun> = self
            .runs
            .iter()
            .filter(|r| workflow_id.map_or(true, |id| r.workflow_id == id))
            .map(|r| r.value().clone())
            .collect();
        runs.sort_by(|a, b| (a.timestamp, &a.run_id).cmp(&(b.timestamp, &b.run_id)));
        Ok(runs)
    }

    async fn invocations(&self, run_id: &str) -> Result<Vec<DataflowInvocation>> {
        let mut invocations: Vec<DataflowInvocation> = self
            .invocations
            .iter()
            .filter(|i| i.run_id == run_id)
            .map(|i| i.value().clone())
            .collect();
        invocations.sort_by(|a, b| {
            (a.started, &a.invocation_id).cmp(&(b.started, &b.invocation_id))
        });
        Ok(invocations)
    }

    async fn enactment_by_process(
        &self,
        run_id: &str,
        process_identifier: &str,
    ) -> Result<Option<ProcessorEnactment>> {
        let key = (run_id.to_string(), process_identifier.to_string());
        Ok(self.enactments.get(&key).map(|e| e.value().clone()))
    }

    async fn enactments(&self, run_id: &str) -> Result<Vec<ProcessorEnactment>> {
        let mut enactments: Vec<ProcessorEnactment> = self
            .enactments
            .iter()
            .filter(|e| e.run_id == run_id)
            .map(|e| e.value().clone())
            .collect();
        enactments.sort_by(|a, b| {
            (a.started, &a.process_identifier).cmp(&(b.started, &b.process_identifier))
        });
        Ok(enactments)
    }

    async fn data_bindings(&self, binding_group_id: &str) -> Result<Vec<DataBinding>> {
        let mut bindings: Vec<DataBinding> = self
            .data_bindings
            .iter()
            .filter(|b| b.binding_group_id == binding_group_id)
            .map(|b| b.value().clone())
            .collect();
        bindings.sort_by(|a, b| a.port_id.cmp(&b.port_id));
        Ok(bindings)
    }

    async fn port_bindings(&self, run_id: &str, port: &PortRef) -> Result<Vec<PortBinding>> {
        let mut bindings: Vec<PortBinding> = self
            .port_bindings
            .iter()
            .filter(|b| {
                b.run_id == run_id
                    && same_port(port, &b.workflow_id, &b.processor_name, &b.port_name, b.is_input)
            })
            .map(|b| b.value().clone())
            .collect();
        bindings.sort_by(|a, b| a.iteration.cmp(&b.iteration));
        Ok(bindings)
    }

    async fn collections(&self, run_id: &str, port: &PortRef) -> Result<Vec<Collection>> {
        let mut collections: Vec<Collection> = self
            .collections
            .iter()
            .filter(|c| {
                c.run_id == run_id
                    && same_port(port, &c.workflow_id, &c.processor_name, &c.port_name, c.is_input)
            })
            .map(|c| c.value().clone())
            .collect();
        collections.sort_by(|a, b| a.iteration.cmp(&b.iteration));
        Ok(collections)
    }

    async fn lookup(&self, query: &LineageQuery) -> Result<Vec<DependencyRecord>> {
        let mut records: Vec<DependencyRecord> = match query.table {
            LookupTable::Collection => self
                .collections
                .iter()
                .filter(|c| query.matches_collection(c.value()))
                .map(|c| DependencyRecord::from(c.value()))
                .collect(),
            LookupTable::PortBinding => self
                .port_bindings
                .iter()
                .filter(|b| query.matches_binding(b.value()))
                .map(|b| DependencyRecord::from(b.value()))
                .collect(),
        };
        records.sort_by(|a, b| (&a.iteration, &a.value).cmp(&(&b.iteration, &b.value)));
        Ok(records)
    }

    async fn delete_run(&self, run_id: &str) -> Result<()> {
        self.runs.remove(run_id);
        self.invocations.retain(|_, i| i.run_id != run_id);
        self.enactments.retain(|(run, _), _| run != run_id);
        self.data_bindings.retain(|_, b| b.run_id != run_id);
        self.port_bindings.retain(|key, _| key.run_id != run_id);
        self.collections.retain(|key, _| key.run_id != run_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{IterationVector, ValueKind};

    fn binding(iteration: Vec<u32>, value: &str) -> PortBinding {
        PortBinding {
            workflow_id: "W".into(),
            processor_name: "Proc1".into(),
            port_name: "out".into(),
            port_id: Some("port-out".into()),
            is_input: false,
            run_id: "R1".into(),
            iteration: IterationVector::new(iteration),
            value: Some(value.into()),
            kind: ValueKind::Atomic,
            collection_id: None,
            position: 1,
        }
    }

    fn out_port() -> PortRef {
        PortRef::new("W", "Proc1", "out", PortDirection::Output)
    }

    #[tokio::test]
    async fn test_upsert_replaces_and_keep_existing_ignores() {
        let store = InMemoryStore::new();
        let batch = WriteBatch::from(vec![
            WriteIntent::PortBinding {
                binding: binding(vec![0], "first"),
                mode: WriteMode::Upsert,
            },
            WriteIntent::PortBinding {
                binding: binding(vec![0], "second"),
                mode: WriteMode::Upsert,
            },
            WriteIntent::PortBinding {
                binding: binding(vec![0], "ignored"),
                mode: WriteMode::KeepExisting,
            },
        ]);
        store.apply(batch).await.unwrap();

        let bindings = store.port_bindings("R1", &out_port()).await.unwrap();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].value.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_lookup_semantics() {
        let store = InMemoryStore::new();
        let batch = WriteBatch::from(vec![
            WriteIntent::PortBinding {
                binding: binding(vec![0], "a"),
                mode: WriteMode::Upsert,
            },
            WriteIntent::PortBinding {
                binding: binding(vec![1], "b"),
                mode: WriteMode::Upsert,
            },
        ]);
        store.apply(batch).await.unwrap();

        let all = crate::lineage::LookupPair::new("R1", out_port(), IterationVector::root());
        assert!(store.lookup(&all.collection).await.unwrap().is_empty());
        let records = store.lookup(&all.binding).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].value.as_deref(), Some("a"));

        let one = crate::lineage::LookupPair::new("R1", out_port(), IterationVector::new(vec![1]));
        let records = store.lookup(&one.binding).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_resolved_depth_never_drops_below_declared() {
        let store = InMemoryStore::new();
        let port = Port {
            id: "p1".into(),
            processor_id: Some("proc".into()),
            processor_name: "Proc1".into(),
            workflow_id: "W".into(),
            name: "in".into(),
            direction: PortDirection::Input,
            declared_depth: 1,
            resolved_depth: None,
            iteration_strategy_order: 0,
        };
        store
            .apply(WriteBatch::from(vec![
                WriteIntent::Port(port),
                WriteIntent::ResolvedDepth {
                    port_id: "p1".into(),
                    depth: 0,
                },
            ]))
            .await
            .unwrap();

        let ports = store.ports("W").await.unwrap();
        assert_eq!(ports[0].resolved_depth, Some(1));
    }

    #[tokio::test]
    async fn test_delete_run_keeps_other_runs() {
        let store = InMemoryStore::new();
        let mut other = binding(vec![0], "kept");
        other.run_id = "R2".into();
        store
            .apply(WriteBatch::from(vec![
                WriteIntent::PortBinding {
                    binding: binding(vec![0], "gone"),
                    mode: WriteMode::Upsert,
                },
                WriteIntent::PortBinding {
                    binding: other,
                    mode: WriteMode::Upsert,
                },
            ]))
            .await
            .unwrap();

        store.delete_run("R1").await.unwrap();

        assert!(store.port_bindings("R1", &out_port()).await.unwrap().is_empty());
        assert_eq!(store.port_bindings("R2", &out_port()).await.unwrap().len(), 1);
    }
}
