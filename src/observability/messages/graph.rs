// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for the static graph utilities.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Resolved depths were propagated through a workflow.
///
/// # Log Level
/// `debug!` - Detailed diagnostic information
pub struct DepthsPropagated<'a> {
    pub workflow_id: &'a str,
    pub port_count: usize,
}

impl Display for DepthsPropagated<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Propagated resolved depths to {} ports of workflow '{}'",
            self.port_count, self.workflow_id
        )
    }
}

impl StructuredLog for DepthsPropagated<'_> {
    fn log(&self) {
        tracing::debug!(
            workflow_id = self.workflow_id,
            port_count = self.port_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "depth_propagation",
            span_name = name,
            workflow_id = self.workflow_id,
            port_count = self.port_count,
        )
    }
}

/// The processors of a workflow could not be ordered.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct TopologicalSortFailed<'a> {
    pub workflow_id: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for TopologicalSortFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Failed to order processors of workflow '{}': {}",
            self.workflow_id, self.error
        )
    }
}

impl StructuredLog for TopologicalSortFailed<'_> {
    fn log(&self) {
        tracing::error!(
            workflow_id = self.workflow_id,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "topological_sort_failed",
            span_name = name,
            workflow_id = self.workflow_id,
            error = %self.error,
        )
    }
}
