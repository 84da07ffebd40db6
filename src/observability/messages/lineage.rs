// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for lineage queries.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A lineage query is starting.
///
/// # Log Level
/// `info!` - Important operational events
pub struct LineageQueryStarted<'a> {
    pub run_id: &'a str,
    pub workflow_id: &'a str,
    pub processor_name: &'a str,
    pub port_name: &'a str,
    pub selector: &'a str,
}

impl Display for LineageQueryStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Resolving lineage of {}.{} at {} in run '{}' (workflow '{}')",
            self.processor_name, self.port_name, self.selector, self.run_id, self.workflow_id
        )
    }
}

impl StructuredLog for LineageQueryStarted<'_> {
    fn log(&self) {
        tracing::info!(
            run_id = self.run_id,
            workflow_id = self.workflow_id,
            processor_name = self.processor_name,
            port_name = self.port_name,
            selector = self.selector,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "lineage_query",
            span_name = name,
            run_id = self.run_id,
            processor_name = self.processor_name,
            port_name = self.port_name,
        )
    }
}

/// The query's starting port does not exist; the query answers empty.
///
/// # Log Level
/// `warn!` - Lookup miss, partial result omitted
pub struct InitialPortNotFound<'a> {
    pub run_id: &'a str,
    pub workflow_id: &'a str,
    pub processor_name: &'a str,
    pub port_name: &'a str,
}

impl Display for InitialPortNotFound<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "No port {}.{} in workflow '{}' for run '{}', returning empty lineage",
            self.processor_name, self.port_name, self.workflow_id, self.run_id
        )
    }
}

impl StructuredLog for InitialPortNotFound<'_> {
    fn log(&self) {
        tracing::warn!(
            run_id = self.run_id,
            workflow_id = self.workflow_id,
            processor_name = self.processor_name,
            port_name = self.port_name,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "initial_port_not_found",
            span_name = name,
            run_id = self.run_id,
            processor_name = self.processor_name,
            port_name = self.port_name,
        )
    }
}

/// A lineage query finished.
///
/// # Log Level
/// `info!` - Important operational events
pub struct LineageQueryCompleted<'a> {
    pub run_id: &'a str,
    pub processor_name: &'a str,
    pub port_name: &'a str,
    pub iterations: usize,
    pub lookups: usize,
}

impl Display for LineageQueryCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Resolved lineage of {}.{} in run '{}': {} iterations, {} lookups",
            self.processor_name, self.port_name, self.run_id, self.iterations, self.lookups
        )
    }
}

impl StructuredLog for LineageQueryCompleted<'_> {
    fn log(&self) {
        tracing::info!(
            run_id = self.run_id,
            processor_name = self.processor_name,
            port_name = self.port_name,
            iterations = self.iterations,
            lookups = self.lookups,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "lineage_query_completed",
            span_name = name,
            run_id = self.run_id,
        )
    }
}

/// A lineage query was aborted.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct LineageQueryFailed<'a> {
    pub run_id: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for LineageQueryFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Lineage query for run '{}' failed: {}",
            self.run_id, self.error
        )
    }
}

impl StructuredLog for LineageQueryFailed<'_> {
    fn log(&self) {
        tracing::error!(run_id = self.run_id, error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "lineage_query_failed",
            span_name = name,
            run_id = self.run_id,
            error = %self.error,
        )
    }
}
