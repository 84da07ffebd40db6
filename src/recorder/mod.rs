// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Event recorder: turns the runtime event stream into provenance rows.
//!
//! Each event is handled in two steps. [`EventRecorder::plan`] updates the
//! per-run span bookkeeping and returns the [`WriteBatch`] the event implies;
//! the batch is then handed to the store. The terminal `end_workflow` event
//! of a top-level process additionally reconciles boundary ports, persists
//! propagated depths and releases the run's bookkeeping, all inside the same
//! call so that no query sees a half-reconciled run.
//!
//! Failures never escape [`EventRecorder::record`]: a failing event is logged
//! and dropped, and the next event is processed normally.

pub mod bookkeeping;
pub mod crystallizer;
pub mod iteration;
pub mod reconcile;
pub mod structure;

#[cfg(test)]
mod integration_tests;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::Instrument;
use uuid::Uuid;

use crate::errors::RecorderError;
use crate::events::{BoundaryItem, DataValue, EventPayload, ProvenanceEvent};
use crate::config::consts::MAX_LIST_POSITION;
use crate::observability::messages::recorder::{
    AmbiguousPortMatch, BoundaryIndexRejected, BoundaryMaterialized, EngineErrorReported,
    EventIngestionFailed, EventReceived, EventRecorded, LateEventIgnored, PortLookupMiss,
    RunBookkeepingReleased, RunReconciled,
};
use crate::observability::messages::StructuredLog;
use crate::schema::{
    DataBinding, DataflowInvocation, IterationVector, Port, PortDirection, PortRef,
    ProcessorEnactment, WorkflowRun, WriteBatch, WriteIntent,
};
use crate::traits::ProvenanceStore;

pub use bookkeeping::{Bookkeeping, RunBookkeeping, SpanContext};
pub use crystallizer::{Materialized, PortTree};
pub use iteration::ValueDecomposer;
pub use reconcile::{plan_reconciliation, Reconciliation};
pub use structure::plan_structure;

/// Recorder behaviour switches.
///
/// # Example
/// ```yaml
/// recorder:
///   reconcile_boundaries: true
///   persist_depths: false
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecorderOptions {
    /// Backpatch boundary ports when a top-level run ends
    #[serde(default = "default_true")]
    pub reconcile_boundaries: bool,
    /// Write the depths propagated during reconciliation back to the ports
    #[serde(default = "default_true")]
    pub persist_depths: bool,
}

fn default_true() -> bool {
    true
}

impl Default for RecorderOptions {
    fn default() -> Self {
        Self {
            reconcile_boundaries: true,
            persist_depths: true,
        }
    }
}

pub struct EventRecorder {
    store: Arc<dyn ProvenanceStore>,
    bookkeeping: Bookkeeping,
    options: RecorderOptions,
    /// Serializes structure ingestion so concurrent first runs of one
    /// workflow write its structure once
    structure_lock: Mutex<()>,
}

impl EventRecorder {
    pub fn new(store: Arc<dyn ProvenanceStore>) -> Self {
        Self::with_options(store, RecorderOptions::default())
    }

    pub fn with_options(store: Arc<dyn ProvenanceStore>, options: RecorderOptions) -> Self {
        Self {
            store,
            bookkeeping: Bookkeeping::new(),
            options,
            structure_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<dyn ProvenanceStore> {
        &self.store
    }

    pub fn options(&self) -> &RecorderOptions {
        &self.options
    }

    /// Runs with live bookkeeping, i.e. started and not yet ended
    pub fn active_runs(&self) -> usize {
        self.bookkeeping.active_runs()
    }

    /// Record one event. Errors are logged, never returned.
    pub async fn record(&self, event: &ProvenanceEvent) {
        if let Err(error) = self.try_record(event).await {
            EventIngestionFailed {
                run_id: &event.run_id,
                identifier: &event.identifier,
                kind: event.kind(),
                error: &error,
            }
            .log();
        }
    }

    /// Record one event, returning the failure that abandoned it.
    pub async fn try_record(&self, event: &ProvenanceEvent) -> Result<(), RecorderError> {
        let start_msg = EventReceived {
            run_id: &event.run_id,
            identifier: &event.identifier,
            kind: event.kind(),
        };
        let span = start_msg.span("record");
        span.in_scope(|| start_msg.log());

        self.record_event(event).instrument(span).await
    }

    async fn record_event(&self, event: &ProvenanceEvent) -> Result<(), RecorderError> {
        let written = self.apply_planned(event).await;
        // a top-level run is released even when its last writes fail
        let finished = match event.payload {
            EventPayload::EndWorkflow => self.finish_process(event, written.is_ok()).await,
            _ => Ok(()),
        };
        let writes = written?;
        finished?;

        EventRecorded {
            run_id: &event.run_id,
            identifier: &event.identifier,
            kind: event.kind(),
            writes,
        }
        .log();
        Ok(())
    }

    async fn apply_planned(&self, event: &ProvenanceEvent) -> Result<usize, RecorderError> {
        let _structure_guard = match event.payload {
            EventPayload::WorkflowStructure { .. } => Some(self.structure_lock.lock().await),
            _ => None,
        };

        let batch = self.plan(event).await?;
        let writes = batch.len();
        if !batch.is_empty() {
            self.store.apply(batch).await?;
        }
        Ok(writes)
    }

    /// Update bookkeeping for `event` and return the rows it implies.
    ///
    /// Only reads the store. For `end_workflow` this is the materialization
    /// phase; reconciliation happens in [`EventRecorder::try_record`].
    /// Events of a run whose top-level workflow already ended write nothing.
    pub async fn plan(&self, event: &ProvenanceEvent) -> Result<WriteBatch, RecorderError> {
        let Some(run) = self.bookkeeping.run(&event.run_id) else {
            self.late_event(event);
            return Ok(WriteBatch::new());
        };
        run.register_parent(&event.identifier, event.parent_id.as_deref());

        match &event.payload {
            EventPayload::WorkflowStructure { workflow } => {
                let mut batch = plan_structure(self.store.as_ref(), &event.run_id, workflow).await?;
                batch.push(WriteIntent::Run(WorkflowRun {
                    run_id: event.run_id.clone(),
                    workflow_id: workflow.id.clone(),
                    timestamp: event.timestamp,
                    structure: serde_json::to_value(workflow)?,
                }));
                Ok(batch)
            }
            EventPayload::ProcessSpanStart { workflow_id } => {
                Ok(self.process_span_start(&run, event, workflow_id))
            }
            EventPayload::ProcessorSpanStart { processor_name } => {
                run.register_context(
                    &event.identifier,
                    SpanContext {
                        processor_name: Some(processor_name.clone()),
                        ..SpanContext::default()
                    },
                );
                Ok(WriteBatch::new())
            }
            EventPayload::ActivitySpanStart { activity } => {
                run.register_context(
                    &event.identifier,
                    SpanContext {
                        activity: Some(activity.clone()),
                        ..SpanContext::default()
                    },
                );
                Ok(WriteBatch::new())
            }
            EventPayload::InvocationStarted { iteration } => {
                let known = run.enactment(&event.process_id).is_some();
                let enactment = self.load_or_create_enactment(&run, event, iteration).await?;
                if known {
                    return Ok(WriteBatch::new());
                }
                Ok(WriteBatch::from(vec![WriteIntent::Enactment(enactment)]))
            }
            EventPayload::IterationCompleted {
                iteration,
                inputs,
                outputs,
                started,
                ended,
            } => {
                self.iteration_completed(
                    &run,
                    event,
                    IterationData {
                        iteration,
                        inputs: inputs.as_ref(),
                        outputs: outputs.as_ref(),
                        started: *started,
                        ended: *ended,
                    },
                )
                .await
            }
            EventPayload::BoundaryDataItem(item) => {
                self.buffer_boundary_item(&run, event, item)?;
                Ok(WriteBatch::new())
            }
            EventPayload::EndWorkflow => self.materialize_process(&run, event).await,
            EventPayload::Error { message } => {
                report_engine_error(event, message);
                Ok(WriteBatch::new())
            }
        }
    }

    fn late_event(&self, event: &ProvenanceEvent) {
        match &event.payload {
            EventPayload::Error { message } => report_engine_error(event, message),
            _ => LateEventIgnored {
                run_id: &event.run_id,
                identifier: &event.identifier,
                kind: event.kind(),
            }
            .log(),
        }
    }

    fn process_span_start(
        &self,
        run: &RunBookkeeping,
        event: &ProvenanceEvent,
        workflow_id: &str,
    ) -> WriteBatch {
        let ancestry = event
            .parent_id
            .as_deref()
            .map(|parent| run.resolve(parent))
            .unwrap_or_default();
        let invocation_id = Uuid::new_v4().to_string();

        run.register_context(
            &event.identifier,
            SpanContext {
                workflow_id: Some(workflow_id.to_string()),
                invocation_id: Some(invocation_id.clone()),
                process_span: Some(event.identifier.clone()),
                top_level: Some(event.parent_id.is_none()),
                ..SpanContext::default()
            },
        );

        WriteBatch::from(vec![WriteIntent::Invocation(DataflowInvocation {
            invocation_id,
            workflow_id: workflow_id.to_string(),
            run_id: event.run_id.clone(),
            parent_enactment_id: ancestry.enactment_id,
            started: event.timestamp,
            ended: None,
            input_bindings_id: None,
            output_bindings_id: None,
            completed: false,
        })])
    }

    /// Cached enactment for the event's process identifier, else the stored
    /// one, else a new one started at the event's timestamp
    async fn load_or_create_enactment(
        &self,
        run: &RunBookkeeping,
        event: &ProvenanceEvent,
        iteration: &IterationVector,
    ) -> Result<ProcessorEnactment, RecorderError> {
        let enactment = match run.enactment(&event.process_id) {
            Some(cached) => cached,
            None => match self
                .store
                .enactment_by_process(&event.run_id, &event.process_id)
                .await?
            {
                Some(stored) => stored,
                None => self.new_enactment(run, event, iteration).await?,
            },
        };

        run.remember_enactment(enactment.clone());
        run.register_context(
            &event.identifier,
            SpanContext {
                enactment_id: Some(enactment.enactment_id.clone()),
                iteration: Some(enactment.iteration.clone()),
                ..SpanContext::default()
            },
        );
        Ok(enactment)
    }

    async fn new_enactment(
        &self,
        run: &RunBookkeeping,
        event: &ProvenanceEvent,
        iteration: &IterationVector,
    ) -> Result<ProcessorEnactment, RecorderError> {
        let ancestry = self.ancestry(run, event);
        let workflow_id = require(&ancestry.workflow_id, event, "workflow")?;
        let processor_name = require(&ancestry.processor_name, event, "processor")?;
        let processor_id = self
            .store
            .find_processor(workflow_id, processor_name)
            .await?
            .map(|p| p.id);

        Ok(ProcessorEnactment {
            enactment_id: Uuid::new_v4().to_string(),
            processor_id,
            processor_name: processor_name.to_string(),
            run_id: event.run_id.clone(),
            process_identifier: event.process_id.clone(),
            iteration: iteration.clone(),
            parent_enactment_id: ancestry.enactment_id.clone(),
            started: event.timestamp,
            ended: None,
            input_bindings_id: None,
            output_bindings_id: None,
        })
    }

    /// Context of the event's parent chain; the event's own span is excluded
    /// so that its enactment is never its own parent
    fn ancestry(&self, run: &RunBookkeeping, event: &ProvenanceEvent) -> SpanContext {
        event
            .parent_id
            .as_deref()
            .map(|parent| run.resolve(parent))
            .unwrap_or_default()
    }

    async fn iteration_completed(
        &self,
        run: &RunBookkeeping,
        event: &ProvenanceEvent,
        data: IterationData<'_>,
    ) -> Result<WriteBatch, RecorderError> {
        let ancestry = self.ancestry(run, event);
        let workflow_id = require(&ancestry.workflow_id, event, "workflow")?.to_string();
        let processor_name = require(&ancestry.processor_name, event, "processor")?.to_string();

        let mut enactment = self
            .load_or_create_enactment(run, event, data.iteration)
            .await?;
        enactment.iteration = data.iteration.clone();

        let mut batch = WriteBatch::new();
        if let Some(inputs) = data.inputs {
            if let Some(started) = data.started {
                enactment.started = started;
            }
            let group = enactment
                .input_bindings_id
                .get_or_insert_with(|| Uuid::new_v4().to_string())
                .clone();
            let port = PortRef::new(&workflow_id, &processor_name, "", PortDirection::Input);
            self.bind_values(event, &port, &group, data.iteration, inputs, &mut batch)
                .await?;
        }
        if let Some(outputs) = data.outputs {
            enactment.ended = Some(data.ended.unwrap_or(event.timestamp));
            let group = enactment
                .output_bindings_id
                .get_or_insert_with(|| Uuid::new_v4().to_string())
                .clone();
            let port = PortRef::new(&workflow_id, &processor_name, "", PortDirection::Output);
            self.bind_values(event, &port, &group, data.iteration, outputs, &mut batch)
                .await?;
        }

        run.remember_enactment(enactment.clone());
        run.register_context(
            &event.identifier,
            SpanContext {
                enactment_id: Some(enactment.enactment_id.clone()),
                iteration: Some(data.iteration.clone()),
                ..SpanContext::default()
            },
        );

        let mut planned = WriteBatch::from(vec![WriteIntent::Enactment(enactment)]);
        planned.extend(batch);
        Ok(planned)
    }

    /// One `DataBinding` per resolvable port, plus the decomposed port
    /// bindings of every value. `owner` carries workflow, processor and
    /// direction; its port name is ignored.
    async fn bind_values(
        &self,
        event: &ProvenanceEvent,
        owner: &PortRef,
        group: &str,
        iteration: &IterationVector,
        values: &BTreeMap<String, DataValue>,
        batch: &mut WriteBatch,
    ) -> Result<(), RecorderError> {
        for (port_name, value) in values {
            let port = PortRef {
                port_name: port_name.clone(),
                ..owner.clone()
            };
            let matches = self
                .store
                .find_ports(
                    &port.workflow_id,
                    &port.processor_name,
                    port_name,
                    port.direction,
                )
                .await?;
            let unique = unique_port(&port, &matches);

            let port_id = matches.first().map(|p| p.id.as_str());
            let reference =
                ValueDecomposer::new(&event.run_id, &port, port_id).decompose(value, iteration, batch);

            if let Some(found) = unique {
                batch.push(WriteIntent::DataBinding(DataBinding {
                    binding_group_id: group.to_string(),
                    port_id: found.id.clone(),
                    run_id: event.run_id.clone(),
                    value: reference,
                }));
            }
        }
        Ok(())
    }

    fn buffer_boundary_item(
        &self,
        run: &RunBookkeeping,
        event: &ProvenanceEvent,
        item: &BoundaryItem,
    ) -> Result<(), RecorderError> {
        if let Some(position) = item
            .index
            .components()
            .iter()
            .copied()
            .find(|&p| p > MAX_LIST_POSITION)
        {
            BoundaryIndexRejected {
                run_id: &event.run_id,
                port_name: &item.port_name,
                position,
                limit: MAX_LIST_POSITION,
            }
            .log();
            return Ok(());
        }

        let ancestry = self.ancestry(run, event);
        let process_span = require(&ancestry.process_span, event, "process span")?;

        run.buffer_boundary_item(
            (process_span.to_string(), item.direction, item.port_name.clone()),
            item.index.clone(),
            item.value.clone(),
            item.is_list,
            &event.process_id,
        );
        Ok(())
    }

    /// Materialize the ending process's boundary trees and close its invocation
    async fn materialize_process(
        &self,
        run: &RunBookkeeping,
        event: &ProvenanceEvent,
    ) -> Result<WriteBatch, RecorderError> {
        let ancestry = self.ancestry(run, event);
        let process_span = require(&ancestry.process_span, event, "process span")?;
        let workflow_id = require(&ancestry.workflow_id, event, "workflow")?;
        let invocation_id = require(&ancestry.invocation_id, event, "invocation")?;

        let trees = run.drain_boundary(process_span);
        let workflow_name = match self.store.workflow(workflow_id).await? {
            Some(workflow) => workflow.name,
            None => workflow_id.to_string(),
        };

        let mut batch = WriteBatch::new();
        let mut groups: [Option<String>; 2] = [None, None];
        let (mut collections, mut bindings) = (0, 0);
        let ports = trees.len();

        for (direction, port_name, tree) in trees {
            let port = PortRef::new(workflow_id, &workflow_name, &port_name, direction);
            let boundary: Vec<Port> = self
                .store
                .find_ports(workflow_id, &workflow_name, &port_name, direction)
                .await?
                .into_iter()
                .filter(Port::is_boundary)
                .collect();
            let port_id = boundary.first().map(|p| p.id.as_str());

            let materialized = tree.materialize(&event.run_id, &port, port_id);
            collections += materialized.collections;
            bindings += materialized.bindings;
            batch.extend(materialized.batch);

            match (port_id, materialized.root_value) {
                (Some(port_id), Some(value)) => {
                    if direction.is_input() {
                        run.observe_depth(port_id, materialized.depth);
                    }
                    let slot = if direction.is_input() { 0 } else { 1 };
                    let group = groups[slot]
                        .get_or_insert_with(|| Uuid::new_v4().to_string())
                        .clone();
                    batch.push(WriteIntent::DataBinding(DataBinding {
                        binding_group_id: group,
                        port_id: port_id.to_string(),
                        run_id: event.run_id.clone(),
                        value,
                    }));
                }
                (None, _) => PortLookupMiss {
                    workflow_id,
                    processor_name: &workflow_name,
                    port_name: &port_name,
                    direction,
                }
                .log(),
                (Some(_), None) => {}
            }
        }

        BoundaryMaterialized {
            run_id: &event.run_id,
            workflow_id,
            ports,
            collections,
            bindings,
        }
        .log();

        let [input_bindings_id, output_bindings_id] = groups;
        batch.push(WriteIntent::CompleteInvocation {
            invocation_id: invocation_id.to_string(),
            ended: event.timestamp,
            input_bindings_id,
            output_bindings_id,
        });
        Ok(batch)
    }

    /// Second phase of `end_workflow`: reconcile and release a top-level run.
    /// `materialized` tells whether the first phase reached the store.
    async fn finish_process(
        &self,
        event: &ProvenanceEvent,
        materialized: bool,
    ) -> Result<(), RecorderError> {
        let Some(run) = self.bookkeeping.get(&event.run_id) else {
            return Ok(());
        };
        let ancestry = self.ancestry(&run, event);
        if ancestry.top_level != Some(true) {
            return Ok(());
        }

        let reconciled = match require(&ancestry.workflow_id, event, "workflow") {
            Ok(workflow_id) if materialized && self.options.reconcile_boundaries => {
                self.reconcile_run(&run, event, workflow_id).await
            }
            Ok(_) => Ok(()),
            Err(error) => Err(error),
        };

        if let Some(released) = self.bookkeeping.release(&event.run_id) {
            RunBookkeepingReleased {
                run_id: &event.run_id,
                spans: released.span_count(),
            }
            .log();
        }
        reconciled
    }

    async fn reconcile_run(
        &self,
        run: &RunBookkeeping,
        event: &ProvenanceEvent,
        workflow_id: &str,
    ) -> Result<(), RecorderError> {
        let plan = plan_reconciliation(
            self.store.as_ref(),
            &event.run_id,
            workflow_id,
            &run.observed_depths(),
            self.options.persist_depths,
        )
        .await?;
        let (backpatched, depths) = (plan.backpatched, plan.depths);
        if !plan.batch.is_empty() {
            self.store.apply(plan.batch).await?;
        }
        RunReconciled {
            run_id: &event.run_id,
            workflow_id,
            backpatched,
            depths,
        }
        .log();
        Ok(())
    }
}

fn report_engine_error(event: &ProvenanceEvent, message: &str) {
    EngineErrorReported {
        run_id: &event.run_id,
        identifier: &event.identifier,
        message,
    }
    .log();
}

/// Borrowed fields of an `iteration_completed` payload.
struct IterationData<'a> {
    iteration: &'a IterationVector,
    inputs: Option<&'a BTreeMap<String, DataValue>>,
    outputs: Option<&'a BTreeMap<String, DataValue>>,
    started: Option<DateTime<Utc>>,
    ended: Option<DateTime<Utc>>,
}

fn require<'a>(
    field: &'a Option<String>,
    event: &ProvenanceEvent,
    what: &'static str,
) -> Result<&'a str, RecorderError> {
    field
        .as_deref()
        .ok_or_else(|| RecorderError::MissingContext {
            identifier: event.identifier.clone(),
            what,
        })
}

/// The single port matching a name lookup; misses and ambiguity are logged
fn unique_port<'a>(port: &PortRef, matches: &'a [Port]) -> Option<&'a Port> {
    match matches {
        [] => {
            PortLookupMiss {
                workflow_id: &port.workflow_id,
                processor_name: &port.processor_name,
                port_name: &port.port_name,
                direction: port.direction,
            }
            .log();
            None
        }
        [only] => Some(only),
        _ => {
            AmbiguousPortMatch {
                workflow_id: &port.workflow_id,
                processor_name: &port.processor_name,
                port_name: &port.port_name,
                matches: matches.len(),
            }
            .log();
            None
        }
    }
}
