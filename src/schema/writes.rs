// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use chrono::{DateTime, Utc};

use crate::schema::{
    Collection, DataBinding, DataflowInvocation, Datalink, Port, PortBinding, Processor,
    ProcessorEnactment, Workflow, WorkflowRun,
};

/// How a binding or collection write treats an existing row with the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace the existing row
    Upsert,
    /// Insert only if absent; duplicates are ignored
    KeepExisting,
}

/// One pending mutation of the provenance store.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteIntent {
    Workflow(Workflow),
    Processor(Processor),
    Port(Port),
    Datalink(Datalink),
    Run(WorkflowRun),
    /// Inserted or replaced by invocation id
    Invocation(DataflowInvocation),
    CompleteInvocation {
        invocation_id: String,
        ended: DateTime<Utc>,
        input_bindings_id: Option<String>,
        output_bindings_id: Option<String>,
    },
    /// Inserted or replaced by `(run, process identifier)`
    Enactment(ProcessorEnactment),
    DataBinding(DataBinding),
    PortBinding {
        binding: PortBinding,
        mode: WriteMode,
    },
    Collection {
        collection: Collection,
        mode: WriteMode,
    },
    ResolvedDepth {
        port_id: String,
        depth: u32,
    },
}

impl WriteIntent {
    /// Short label used in log fields
    pub fn kind(&self) -> &'static str {
        match self {
            WriteIntent::Workflow(_) => "workflow",
            WriteIntent::Processor(_) => "processor",
            WriteIntent::Port(_) => "port",
            WriteIntent::Datalink(_) => "datalink",
            WriteIntent::Run(_) => "workflow_run",
            WriteIntent::Invocation(_) => "dataflow_invocation",
            WriteIntent::CompleteInvocation { .. } => "complete_invocation",
            WriteIntent::Enactment(_) => "processor_enactment",
            WriteIntent::DataBinding(_) => "data_binding",
            WriteIntent::PortBinding { .. } => "port_binding",
            WriteIntent::Collection { .. } => "collection",
            WriteIntent::ResolvedDepth { .. } => "resolved_depth",
        }
    }
}

/// Ordered list of write intents applied atomically by a store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch(pub Vec<WriteIntent>);

impl WriteBatch {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, intent: WriteIntent) {
        self.0.push(intent);
    }

    pub fn extend(&mut self, other: WriteBatch) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WriteIntent> {
        self.0.iter()
    }

    pub fn port_bindings(&self) -> impl Iterator<Item = &PortBinding> {
        self.0.iter().filter_map(|intent| match intent {
            WriteIntent::PortBinding { binding, .. } => Some(binding),
            _ => None,
        })
    }

    pub fn collections(&self) -> impl Iterator<Item = &Collection> {
        self.0.iter().filter_map(|intent| match intent {
            WriteIntent::Collection { collection, .. } => Some(collection),
            _ => None,
        })
    }
}

impl From<Vec<WriteIntent>> for WriteBatch {
    fn from(intents: Vec<WriteIntent>) -> Self {
        Self(intents)
    }
}

impl IntoIterator for WriteBatch {
    type Item = WriteIntent;
    type IntoIter = std::vec::IntoIter<WriteIntent>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
