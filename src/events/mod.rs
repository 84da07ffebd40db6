// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Runtime events consumed by the [`crate::recorder::EventRecorder`].
//!
//! Each event carries an opaque `identifier`, the identifier of its parent span
//! (if any), the hierarchical process identifier of the activity that emitted
//! it, and the run it belongs to. The kind-specific data lives in
//! [`EventPayload`], which serializes with a `kind` tag:
//!
//! ```json
//! {"identifier":"i1","parent_id":"act-1","process_id":"run:W:Proc1:i0",
//!  "run_id":"R1","payload":{"kind":"invocation_started","iteration":[0]}}
//! ```

mod structure;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::schema::{IterationVector, PortDirection, ValueKind};

pub use structure::{
    ActivityDescription, DatalinkDescription, LinkEndpoint, PortDescription,
    ProcessorDescription, WorkflowDescription,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceEvent {
    pub identifier: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub process_id: String,
    pub run_id: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

impl ProvenanceEvent {
    pub fn new(
        identifier: impl Into<String>,
        parent_id: Option<&str>,
        run_id: impl Into<String>,
        payload: EventPayload,
    ) -> Self {
        let identifier = identifier.into();
        Self {
            process_id: identifier.clone(),
            identifier,
            parent_id: parent_id.map(str::to_string),
            run_id: run_id.into(),
            timestamp: Utc::now(),
            payload,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.payload.kind()
    }
}

/// Kind-specific event data, one variant per runtime event kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    WorkflowStructure {
        workflow: WorkflowDescription,
    },
    /// A (sub)workflow starts executing
    ProcessSpanStart {
        workflow_id: String,
    },
    ProcessorSpanStart {
        processor_name: String,
    },
    ActivitySpanStart {
        activity: String,
    },
    InvocationStarted {
        #[serde(default)]
        iteration: IterationVector,
    },
    IterationCompleted {
        #[serde(default)]
        iteration: IterationVector,
        #[serde(default)]
        inputs: Option<BTreeMap<String, DataValue>>,
        #[serde(default)]
        outputs: Option<BTreeMap<String, DataValue>>,
        #[serde(default)]
        started: Option<DateTime<Utc>>,
        #[serde(default)]
        ended: Option<DateTime<Utc>>,
    },
    BoundaryDataItem(BoundaryItem),
    EndWorkflow,
    Error {
        message: String,
    },
}

impl EventPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            EventPayload::WorkflowStructure { .. } => "workflow_structure",
            EventPayload::ProcessSpanStart { .. } => "process_span_start",
            EventPayload::ProcessorSpanStart { .. } => "processor_span_start",
            EventPayload::ActivitySpanStart { .. } => "activity_span_start",
            EventPayload::InvocationStarted { .. } => "invocation_started",
            EventPayload::IterationCompleted { .. } => "iteration_completed",
            EventPayload::BoundaryDataItem(_) => "boundary_data_item",
            EventPayload::EndWorkflow => "end_workflow",
            EventPayload::Error { .. } => "error",
        }
    }
}

/// One fragment of a workflow boundary port's value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryItem {
    pub port_name: String,
    pub direction: PortDirection,
    #[serde(default)]
    pub index: IterationVector,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub is_list: bool,
}

/// A value bound to a port in an `iteration_completed` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DataValue {
    Atomic {
        reference: String,
    },
    Error {
        reference: String,
    },
    Reference {
        reference: String,
    },
    List {
        #[serde(default)]
        reference: Option<String>,
        #[serde(default)]
        elements: Vec<DataValue>,
    },
}

impl DataValue {
    pub fn atomic(reference: impl Into<String>) -> Self {
        DataValue::Atomic {
            reference: reference.into(),
        }
    }

    pub fn list(reference: impl Into<String>, elements: Vec<DataValue>) -> Self {
        DataValue::List {
            reference: Some(reference.into()),
            elements,
        }
    }

    /// The value reference; lists without one have none
    pub fn reference(&self) -> Option<&str> {
        match self {
            DataValue::Atomic { reference }
            | DataValue::Error { reference }
            | DataValue::Reference { reference } => Some(reference),
            DataValue::List { reference, .. } => reference.as_deref(),
        }
    }

    /// Kind of a non-list value
    pub fn value_kind(&self) -> Option<ValueKind> {
        match self {
            DataValue::Atomic { .. } => Some(ValueKind::Atomic),
            DataValue::Error { .. } => Some(ValueKind::Error),
            DataValue::Reference { .. } => Some(ValueKind::Reference),
            DataValue::List { .. } => None,
        }
    }
}
