// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Persisted provenance entities.
//!
//! Static structure (`Workflow`, `Processor`, `Port`, `Datalink`) is written
//! once per top-level workflow id and never changes afterwards, except for a
//! port's resolved depth. Everything else is scoped to one `WorkflowRun`.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::consts::TOP_COLLECTION;
use crate::errors::SchemaError;
use crate::schema::IterationVector;

/// Direction of a port relative to its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    Input,
    Output,
}

impl PortDirection {
    pub fn is_input(self) -> bool {
        matches!(self, PortDirection::Input)
    }

    pub fn from_is_input(is_input: bool) -> Self {
        if is_input {
            PortDirection::Input
        } else {
            PortDirection::Output
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PortDirection::Input => "input",
            PortDirection::Output => "output",
        }
    }
}

impl Display for PortDirection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PortDirection {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "input" | "in" => Ok(PortDirection::Input),
            "output" | "out" => Ok(PortDirection::Output),
            other => Err(SchemaError::InvalidDirection(other.to_string())),
        }
    }
}

/// A static dataflow graph. `parent_id` is set iff the workflow is nested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub parent_id: Option<String>,
    pub name: String,
}

impl Workflow {
    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// A static node inside a workflow. Names are unique within the workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Processor {
    pub id: String,
    pub name: String,
    pub workflow_id: String,
    /// Classifier of the processor's first activity
    pub first_activity: String,
    /// Set when the processor invokes a sub-workflow
    pub nested_workflow_id: Option<String>,
    pub top_level: bool,
}

impl Processor {
    pub fn is_nested_workflow(&self) -> bool {
        self.nested_workflow_id.is_some()
    }
}

/// A named input or output slot of a processor, or of a workflow boundary when
/// `processor_id` is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub id: String,
    pub processor_id: Option<String>,
    /// Owning processor's name, or the workflow's name for a boundary port
    pub processor_name: String,
    pub workflow_id: String,
    pub name: String,
    pub direction: PortDirection,
    pub declared_depth: u32,
    pub resolved_depth: Option<u32>,
    pub iteration_strategy_order: u32,
}

impl Port {
    pub fn is_boundary(&self) -> bool {
        self.processor_id.is_none()
    }

    pub fn is_input(&self) -> bool {
        self.direction.is_input()
    }

    /// Resolved depth when known, declared depth otherwise
    pub fn effective_depth(&self) -> u32 {
        self.resolved_depth.unwrap_or(self.declared_depth)
    }

    /// Extra nesting levels added by implicit iteration
    pub fn depth_delta(&self) -> u32 {
        self.effective_depth().saturating_sub(self.declared_depth)
    }

    pub fn port_ref(&self) -> PortRef {
        PortRef {
            workflow_id: self.workflow_id.clone(),
            processor_name: self.processor_name.clone(),
            port_name: self.name.clone(),
            direction: self.direction,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Datalink {
    pub id: String,
    pub workflow_id: String,
    pub source_port_id: String,
    pub sink_port_id: String,
}

/// One execution of a top-level workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub run_id: String,
    pub workflow_id: String,
    pub timestamp: DateTime<Utc>,
    /// Serialized structure description the run was started with
    pub structure: serde_json::Value,
}

/// One execution span of a (sub)workflow within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataflowInvocation {
    pub invocation_id: String,
    pub workflow_id: String,
    pub run_id: String,
    /// The invoking enactment; set iff this is a nested-workflow invocation
    pub parent_enactment_id: Option<String>,
    pub started: DateTime<Utc>,
    pub ended: Option<DateTime<Utc>>,
    pub input_bindings_id: Option<String>,
    pub output_bindings_id: Option<String>,
    pub completed: bool,
}

/// One execution span of a processor at one iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorEnactment {
    pub enactment_id: String,
    pub processor_id: Option<String>,
    pub processor_name: String,
    pub run_id: String,
    /// Opaque hierarchical process identifier, unique per run
    pub process_identifier: String,
    pub iteration: IterationVector,
    pub parent_enactment_id: Option<String>,
    pub started: DateTime<Utc>,
    pub ended: Option<DateTime<Utc>>,
    pub input_bindings_id: Option<String>,
    pub output_bindings_id: Option<String>,
}

/// Association of a port to a value reference inside one binding group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataBinding {
    pub binding_group_id: String,
    pub port_id: String,
    pub run_id: String,
    pub value: String,
}

/// Kind of value held by a [`PortBinding`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Atomic,
    Error,
    Reference,
    /// Synthesized during crystallization for an element that never arrived
    Placeholder,
}

impl ValueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueKind::Atomic => "atomic",
            ValueKind::Error => "error",
            ValueKind::Reference => "reference",
            ValueKind::Placeholder => "placeholder",
        }
    }
}

impl FromStr for ValueKind {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "atomic" => Ok(ValueKind::Atomic),
            "error" => Ok(ValueKind::Error),
            "reference" => Ok(ValueKind::Reference),
            "placeholder" => Ok(ValueKind::Placeholder),
            other => Err(SchemaError::InvalidValueKind(other.to_string())),
        }
    }
}

/// The finest-grained lineage fact: one value at one port and iteration.
///
/// Port names are denormalized so a binding stays addressable even when its
/// port row could not be resolved at ingestion time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    pub workflow_id: String,
    pub processor_name: String,
    pub port_name: String,
    pub port_id: Option<String>,
    pub is_input: bool,
    pub run_id: String,
    pub iteration: IterationVector,
    pub value: Option<String>,
    pub kind: ValueKind,
    pub collection_id: Option<String>,
    /// 1-based position within `collection_id`, 1 when uncollected
    pub position: u32,
}

impl PortBinding {
    pub fn key(&self) -> BindingKey {
        BindingKey {
            run_id: self.run_id.clone(),
            workflow_id: self.workflow_id.clone(),
            processor_name: self.processor_name.clone(),
            port_name: self.port_name.clone(),
            is_input: self.is_input,
            iteration: self.iteration.clone(),
        }
    }

    pub fn port_ref(&self) -> PortRef {
        PortRef {
            workflow_id: self.workflow_id.clone(),
            processor_name: self.processor_name.clone(),
            port_name: self.port_name.clone(),
            direction: PortDirection::from_is_input(self.is_input),
        }
    }

    /// Same binding, addressed through another port
    pub fn rebound_to(&self, port: &PortRef, port_id: Option<String>) -> Self {
        Self {
            workflow_id: port.workflow_id.clone(),
            processor_name: port.processor_name.clone(),
            port_name: port.port_name.clone(),
            port_id,
            is_input: port.direction.is_input(),
            ..self.clone()
        }
    }
}

/// A node of a nested-list value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub collection_id: String,
    /// Parent collection id, [`TOP_COLLECTION`] for a root list
    pub parent_collection_id: String,
    pub workflow_id: String,
    pub processor_name: String,
    pub port_name: String,
    pub is_input: bool,
    pub run_id: String,
    pub iteration: IterationVector,
    /// Last component of `iteration`, 0 for a root list
    pub position: u32,
}

impl Collection {
    pub fn is_root(&self) -> bool {
        self.parent_collection_id == TOP_COLLECTION
    }

    pub fn key(&self) -> BindingKey {
        BindingKey {
            run_id: self.run_id.clone(),
            workflow_id: self.workflow_id.clone(),
            processor_name: self.processor_name.clone(),
            port_name: self.port_name.clone(),
            is_input: self.is_input,
            iteration: self.iteration.clone(),
        }
    }

    pub fn rebound_to(&self, port: &PortRef) -> Self {
        Self {
            workflow_id: port.workflow_id.clone(),
            processor_name: port.processor_name.clone(),
            port_name: port.port_name.clone(),
            is_input: port.direction.is_input(),
            ..self.clone()
        }
    }
}

/// Uniqueness key shared by port bindings and collections.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingKey {
    pub run_id: String,
    pub workflow_id: String,
    pub processor_name: String,
    pub port_name: String,
    pub is_input: bool,
    pub iteration: IterationVector,
}

/// Name-based address of a port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortRef {
    pub workflow_id: String,
    pub processor_name: String,
    pub port_name: String,
    pub direction: PortDirection,
}

impl PortRef {
    pub fn new(
        workflow_id: impl Into<String>,
        processor_name: impl Into<String>,
        port_name: impl Into<String>,
        direction: PortDirection,
    ) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            processor_name: processor_name.into(),
            port_name: port_name.into(),
            direction,
        }
    }

    pub fn is_input(&self) -> bool {
        self.direction.is_input()
    }
}

impl Display for PortRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}.{} ({})",
            self.workflow_id, self.processor_name, self.port_name, self.direction
        )
    }
}
