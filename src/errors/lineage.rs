// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

use crate::errors::{GraphError, StorageError};

/// Errors that abort one in-flight lineage query.
#[derive(Debug, Error)]
pub enum LineageError {
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),

    #[error("graph failure: {0}")]
    Graph(#[from] GraphError),

    #[error("Workflow run '{run_id}' is not recorded")]
    UnknownRun { run_id: String },
}
