// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Per-run span bookkeeping.
//!
//! Runtime events only carry their own identifier and the identifier of their
//! parent span. The recorder remembers `identifier -> parent` and whatever
//! partial context each span contributed, and resolves the full context of a
//! later event by walking that chain nearest-first. Everything is scoped per
//! run so a finished run can be dropped as a whole.

use std::sync::Arc;

use dashmap::{DashMap, DashSet};

use crate::config::consts::MAX_ANCESTRY_DEPTH;
use crate::recorder::crystallizer::PortTree;
use crate::schema::{IterationVector, PortDirection, ProcessorEnactment};

/// Context a span contributes to its descendants. Unset fields are inherited.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpanContext {
    pub workflow_id: Option<String>,
    pub processor_name: Option<String>,
    pub activity: Option<String>,
    pub iteration: Option<IterationVector>,
    pub enactment_id: Option<String>,
    pub invocation_id: Option<String>,
    /// Identifier of the nearest process (workflow) span
    pub process_span: Option<String>,
    /// Set on process spans: whether the workflow is the run's top level
    pub top_level: Option<bool>,
}

impl SpanContext {
    /// Fill every unset field from `ancestor`
    fn inherit(&mut self, ancestor: &SpanContext) {
        fn fill<T: Clone>(slot: &mut Option<T>, from: &Option<T>) {
            if slot.is_none() {
                slot.clone_from(from);
            }
        }

        fill(&mut self.workflow_id, &ancestor.workflow_id);
        fill(&mut self.processor_name, &ancestor.processor_name);
        fill(&mut self.activity, &ancestor.activity);
        fill(&mut self.iteration, &ancestor.iteration);
        fill(&mut self.enactment_id, &ancestor.enactment_id);
        fill(&mut self.invocation_id, &ancestor.invocation_id);
        fill(&mut self.process_span, &ancestor.process_span);
        fill(&mut self.top_level, &ancestor.top_level);
    }
}

/// Buffered boundary values are keyed by owning process span, direction and
/// port name.
pub type BoundaryKey = (String, PortDirection, String);

/// Bookkeeping of one run.
#[derive(Debug, Default)]
pub struct RunBookkeeping {
    parents: DashMap<String, String>,
    contexts: DashMap<String, SpanContext>,
    enactments: DashMap<String, ProcessorEnactment>,
    boundary: DashMap<BoundaryKey, PortTree>,
    /// Boundary input port id -> depth observed while crystallizing
    observed_depths: DashMap<String, u32>,
}

impl RunBookkeeping {
    pub fn register_parent(&self, identifier: &str, parent_id: Option<&str>) {
        if let Some(parent) = parent_id {
            if parent != identifier {
                self.parents
                    .insert(identifier.to_string(), parent.to_string());
            }
        }
    }

    /// Merge `context` into whatever `identifier` already contributed; newer
    /// values win
    pub fn register_context(&self, identifier: &str, context: SpanContext) {
        let mut entry = self.contexts.entry(identifier.to_string()).or_default();
        let mut merged = context;
        merged.inherit(entry.value());
        *entry = merged;
    }

    /// Context of `identifier` merged with its ancestors, nearest first
    pub fn resolve(&self, identifier: &str) -> SpanContext {
        let mut resolved = SpanContext::default();
        let mut current = Some(identifier.to_string());
        let mut steps = 0;

        while let Some(id) = current {
            if steps >= MAX_ANCESTRY_DEPTH {
                break;
            }
            if let Some(context) = self.contexts.get(&id) {
                resolved.inherit(context.value());
            }
            current = self.parents.get(&id).map(|p| p.value().clone());
            steps += 1;
        }

        resolved
    }

    pub fn enactment(&self, process_id: &str) -> Option<ProcessorEnactment> {
        self.enactments.get(process_id).map(|e| e.value().clone())
    }

    pub fn remember_enactment(&self, enactment: ProcessorEnactment) {
        self.enactments
            .insert(enactment.process_identifier.clone(), enactment);
    }

    pub fn buffer_boundary_item(
        &self,
        key: BoundaryKey,
        index: IterationVector,
        value: Option<String>,
        is_list: bool,
        process_id: &str,
    ) {
        self.boundary
            .entry(key)
            .or_default()
            .insert(index, value, is_list, process_id);
    }

    /// Remove and return every boundary tree buffered for one process span,
    /// ordered by direction and port name
    pub fn drain_boundary(&self, process_span: &str) -> Vec<(PortDirection, String, PortTree)> {
        let keys: Vec<BoundaryKey> = self
            .boundary
            .iter()
            .filter(|entry| entry.key().0 == process_span)
            .map(|entry| entry.key().clone())
            .collect();

        let mut drained: Vec<(PortDirection, String, PortTree)> = keys
            .into_iter()
            .filter_map(|key| self.boundary.remove(&key))
            .map(|((_, direction, port_name), tree)| (direction, port_name, tree))
            .collect();
        drained.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));
        drained
    }

    pub fn observe_depth(&self, port_id: &str, depth: u32) {
        self.observed_depths
            .entry(port_id.to_string())
            .and_modify(|d| *d = (*d).max(depth))
            .or_insert(depth);
    }

    pub fn observed_depths(&self) -> Vec<(String, u32)> {
        let mut depths: Vec<(String, u32)> = self
            .observed_depths
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        depths.sort();
        depths
    }

    /// Number of spans seen so far
    pub fn span_count(&self) -> usize {
        self.contexts.len().max(self.parents.len())
    }
}

/// Map of runs to their bookkeeping.
///
/// Released runs are remembered by id so that a straggling event cannot bring
/// their bookkeeping back.
#[derive(Debug, Default)]
pub struct Bookkeeping {
    runs: DashMap<String, Arc<RunBookkeeping>>,
    finished: DashSet<String>,
}

impl Bookkeeping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bookkeeping of `run_id`, created on first use; `None` once the run
    /// has been released
    pub fn run(&self, run_id: &str) -> Option<Arc<RunBookkeeping>> {
        if self.finished.contains(run_id) {
            return None;
        }
        let run = self
            .runs
            .entry(run_id.to_string())
            .or_default()
            .value()
            .clone();
        // lost a race with release
        if self.finished.contains(run_id) {
            self.runs.remove(run_id);
            return None;
        }
        Some(run)
    }

    /// Bookkeeping of a live run, never creating it
    pub fn get(&self, run_id: &str) -> Option<Arc<RunBookkeeping>> {
        self.runs.get(run_id).map(|run| run.value().clone())
    }

    /// Drop the run's bookkeeping and refuse to recreate it
    pub fn release(&self, run_id: &str) -> Option<Arc<RunBookkeeping>> {
        self.finished.insert(run_id.to_string());
        self.runs.remove(run_id).map(|(_, run)| run)
    }

    pub fn contains_run(&self, run_id: &str) -> bool {
        self.runs.contains_key(run_id)
    }

    pub fn active_runs(&self) -> usize {
        self.runs.len()
    }
}
