// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Persisted data model of the provenance subsystem.

mod entities;
mod iteration;
mod writes;

pub use entities::{
    BindingKey, Collection, DataBinding, DataflowInvocation, Datalink, Port, PortBinding,
    PortDirection, PortRef, Processor, ProcessorEnactment, ValueKind, Workflow, WorkflowRun,
};
pub use iteration::{IterationSelector, IterationVector};
pub use writes::{WriteBatch, WriteIntent, WriteMode};
