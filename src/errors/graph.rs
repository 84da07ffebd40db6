// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Errors from the static graph utilities.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// Kahn's algorithm could not order every processor of the workflow
    #[error("Workflow '{workflow_id}' contains a datalink cycle through: {}", .remaining.join(", "))]
    Cycle {
        workflow_id: String,
        remaining: Vec<String>,
    },

    /// The workflow is not part of the loaded structure snapshot
    #[error("Workflow '{workflow_id}' is not part of the structure snapshot")]
    UnknownWorkflow { workflow_id: String },

    /// A nested-workflow processor (transitively) invokes its own workflow
    #[error("Nested workflow '{workflow_id}' invokes itself")]
    NestingCycle { workflow_id: String },
}
