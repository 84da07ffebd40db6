// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for event ingestion, crystallization and reconciliation.

use crate::observability::messages::StructuredLog;
use crate::schema::PortDirection;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// An event was planned and its writes applied.
///
/// # Log Level
/// `debug!` - Detailed diagnostic information
pub struct EventRecorded<'a> {
    pub run_id: &'a str,
    pub identifier: &'a str,
    pub kind: &'a str,
    pub writes: usize,
}

impl Display for EventRecorded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Recorded {} event '{}' for run '{}' ({} writes)",
            self.kind, self.identifier, self.run_id, self.writes
        )
    }
}

impl StructuredLog for EventRecorded<'_> {
    fn log(&self) {
        tracing::debug!(
            run_id = self.run_id,
            identifier = self.identifier,
            kind = self.kind,
            writes = self.writes,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "event_recorded",
            span_name = name,
            run_id = self.run_id,
            identifier = self.identifier,
            kind = self.kind,
        )
    }
}

/// Ingestion of one event was abandoned. The recorder keeps going.
///
/// # Log Level
/// `error!` - Failure requiring attention
///
/// # Example
/// ```text
/// ERROR Abandoned iteration_completed event 'R1:W:Proc1:i0' for run 'R1': storage error: ...
/// ```
pub struct EventIngestionFailed<'a> {
    pub run_id: &'a str,
    pub identifier: &'a str,
    pub kind: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for EventIngestionFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Abandoned {} event '{}' for run '{}': {}",
            self.kind, self.identifier, self.run_id, self.error
        )
    }
}

impl StructuredLog for EventIngestionFailed<'_> {
    fn log(&self) {
        tracing::error!(
            run_id = self.run_id,
            identifier = self.identifier,
            kind = self.kind,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "event_ingestion_failed",
            span_name = name,
            run_id = self.run_id,
            identifier = self.identifier,
            kind = self.kind,
            error = %self.error,
        )
    }
}

/// A workflow structure was written.
///
/// # Log Level
/// `info!` - Important operational events
pub struct StructureIngested<'a> {
    pub workflow_id: &'a str,
    pub run_id: &'a str,
    pub workflows: usize,
    pub processors: usize,
    pub ports: usize,
    pub links: usize,
}

impl Display for StructureIngested<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Ingested structure of workflow '{}' for run '{}': {} workflows, {} processors, {} ports, {} links",
            self.workflow_id, self.run_id, self.workflows, self.processors, self.ports, self.links
        )
    }
}

impl StructuredLog for StructureIngested<'_> {
    fn log(&self) {
        tracing::info!(
            workflow_id = self.workflow_id,
            run_id = self.run_id,
            workflows = self.workflows,
            processors = self.processors,
            ports = self.ports,
            links = self.links,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "structure_ingested",
            span_name = name,
            workflow_id = self.workflow_id,
            run_id = self.run_id,
        )
    }
}

/// Structure ingestion was skipped because the workflow is already stored.
///
/// # Log Level
/// `debug!` - Detailed diagnostic information
pub struct StructureAlreadyKnown<'a> {
    pub workflow_id: &'a str,
}

impl Display for StructureAlreadyKnown<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Structure of workflow '{}' already known, skipping ingestion",
            self.workflow_id
        )
    }
}

impl StructuredLog for StructureAlreadyKnown<'_> {
    fn log(&self) {
        tracing::debug!(workflow_id = self.workflow_id, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "structure_already_known",
            span_name = name,
            workflow_id = self.workflow_id,
        )
    }
}

/// A datalink endpoint did not resolve to a port and the link was skipped.
///
/// # Log Level
/// `warn!` - Lookup miss, partial result omitted
pub struct UnresolvedDatalinkEndpoint<'a> {
    pub workflow_id: &'a str,
    pub endpoint: &'a str,
}

impl Display for UnresolvedDatalinkEndpoint<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Skipping datalink in workflow '{}': endpoint {} does not resolve to a port",
            self.workflow_id, self.endpoint
        )
    }
}

impl StructuredLog for UnresolvedDatalinkEndpoint<'_> {
    fn log(&self) {
        tracing::warn!(
            workflow_id = self.workflow_id,
            endpoint = self.endpoint,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "unresolved_datalink_endpoint",
            span_name = name,
            workflow_id = self.workflow_id,
            endpoint = self.endpoint,
        )
    }
}

/// A second datalink into an already linked sink port was skipped.
///
/// # Log Level
/// `warn!` - Structural ambiguity
pub struct DuplicateSinkLink<'a> {
    pub workflow_id: &'a str,
    pub sink: &'a str,
}

impl Display for DuplicateSinkLink<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Skipping datalink in workflow '{}': sink {} already has an incoming link",
            self.workflow_id, self.sink
        )
    }
}

impl StructuredLog for DuplicateSinkLink<'_> {
    fn log(&self) {
        tracing::warn!(workflow_id = self.workflow_id, sink = self.sink, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "duplicate_sink_link",
            span_name = name,
            workflow_id = self.workflow_id,
            sink = self.sink,
        )
    }
}

/// No port matched a name-based lookup; the data binding was skipped.
///
/// # Log Level
/// `warn!` - Lookup miss, partial result omitted
pub struct PortLookupMiss<'a> {
    pub workflow_id: &'a str,
    pub processor_name: &'a str,
    pub port_name: &'a str,
    pub direction: PortDirection,
}

impl Display for PortLookupMiss<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "No {} port '{}' on '{}' in workflow '{}'",
            self.direction, self.port_name, self.processor_name, self.workflow_id
        )
    }
}

impl StructuredLog for PortLookupMiss<'_> {
    fn log(&self) {
        tracing::warn!(
            workflow_id = self.workflow_id,
            processor_name = self.processor_name,
            port_name = self.port_name,
            direction = %self.direction,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "port_lookup_miss",
            span_name = name,
            workflow_id = self.workflow_id,
            processor_name = self.processor_name,
            port_name = self.port_name,
        )
    }
}

/// More than one port matched a name-based lookup.
///
/// # Log Level
/// `warn!` - Structural ambiguity
pub struct AmbiguousPortMatch<'a> {
    pub workflow_id: &'a str,
    pub processor_name: &'a str,
    pub port_name: &'a str,
    pub matches: usize,
}

impl Display for AmbiguousPortMatch<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} ports named '{}' on '{}' in workflow '{}', data binding skipped",
            self.matches, self.port_name, self.processor_name, self.workflow_id
        )
    }
}

impl StructuredLog for AmbiguousPortMatch<'_> {
    fn log(&self) {
        tracing::warn!(
            workflow_id = self.workflow_id,
            processor_name = self.processor_name,
            port_name = self.port_name,
            matches = self.matches,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "ambiguous_port_match",
            span_name = name,
            workflow_id = self.workflow_id,
            port_name = self.port_name,
        )
    }
}

/// A boundary input feeds more than one link; the first one is used.
///
/// # Log Level
/// `warn!` - Structural ambiguity
pub struct AmbiguousBoundaryLink<'a> {
    pub workflow_id: &'a str,
    pub port_name: &'a str,
    pub links: usize,
}

impl Display for AmbiguousBoundaryLink<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Boundary input '{}' of workflow '{}' has {} outgoing links, backpatching from the first",
            self.port_name, self.workflow_id, self.links
        )
    }
}

impl StructuredLog for AmbiguousBoundaryLink<'_> {
    fn log(&self) {
        tracing::warn!(
            workflow_id = self.workflow_id,
            port_name = self.port_name,
            links = self.links,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "ambiguous_boundary_link",
            span_name = name,
            workflow_id = self.workflow_id,
            port_name = self.port_name,
        )
    }
}

/// Buffered boundary values of a process were materialized.
///
/// # Log Level
/// `debug!` - Detailed diagnostic information
pub struct BoundaryMaterialized<'a> {
    pub run_id: &'a str,
    pub workflow_id: &'a str,
    pub ports: usize,
    pub collections: usize,
    pub bindings: usize,
}

impl Display for BoundaryMaterialized<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Materialized {} boundary ports of workflow '{}' in run '{}': {} collections, {} bindings",
            self.ports, self.workflow_id, self.run_id, self.collections, self.bindings
        )
    }
}

impl StructuredLog for BoundaryMaterialized<'_> {
    fn log(&self) {
        tracing::debug!(
            run_id = self.run_id,
            workflow_id = self.workflow_id,
            ports = self.ports,
            collections = self.collections,
            bindings = self.bindings,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "boundary_materialized",
            span_name = name,
            run_id = self.run_id,
            workflow_id = self.workflow_id,
        )
    }
}

/// Boundary ports of a finished run were backpatched.
///
/// # Log Level
/// `info!` - Important operational events
pub struct RunReconciled<'a> {
    pub run_id: &'a str,
    pub workflow_id: &'a str,
    pub backpatched: usize,
    pub depths: usize,
}

impl Display for RunReconciled<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Reconciled run '{}' of workflow '{}': {} rows backpatched, {} depths resolved",
            self.run_id, self.workflow_id, self.backpatched, self.depths
        )
    }
}

impl StructuredLog for RunReconciled<'_> {
    fn log(&self) {
        tracing::info!(
            run_id = self.run_id,
            workflow_id = self.workflow_id,
            backpatched = self.backpatched,
            depths = self.depths,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "run_reconciled",
            span_name = name,
            run_id = self.run_id,
            workflow_id = self.workflow_id,
        )
    }
}

/// A boundary port had no resolvable neighbour to reconcile with.
///
/// # Log Level
/// `debug!` - Detailed diagnostic information
pub struct ReconciliationSkipped<'a> {
    pub run_id: &'a str,
    pub port_name: &'a str,
    pub direction: PortDirection,
}

impl Display for ReconciliationSkipped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "No linked port for boundary {} '{}' in run '{}'",
            self.direction, self.port_name, self.run_id
        )
    }
}

impl StructuredLog for ReconciliationSkipped<'_> {
    fn log(&self) {
        tracing::debug!(
            run_id = self.run_id,
            port_name = self.port_name,
            direction = %self.direction,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "reconciliation_skipped",
            span_name = name,
            run_id = self.run_id,
            port_name = self.port_name,
        )
    }
}

/// The engine reported an error event.
///
/// # Log Level
/// `warn!` - Recoverable issue
pub struct EngineErrorReported<'a> {
    pub run_id: &'a str,
    pub identifier: &'a str,
    pub message: &'a str,
}

impl Display for EngineErrorReported<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Engine reported error for '{}' in run '{}': {}",
            self.identifier, self.run_id, self.message
        )
    }
}

impl StructuredLog for EngineErrorReported<'_> {
    fn log(&self) {
        tracing::warn!(
            run_id = self.run_id,
            identifier = self.identifier,
            message = self.message,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "engine_error",
            span_name = name,
            run_id = self.run_id,
            identifier = self.identifier,
        )
    }
}

/// Span bookkeeping of a finished run was dropped.
///
/// # Log Level
/// `debug!` - Detailed diagnostic information
pub struct RunBookkeepingReleased<'a> {
    pub run_id: &'a str,
    pub spans: usize,
}

impl Display for RunBookkeepingReleased<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Released bookkeeping for run '{}' ({} spans)",
            self.run_id, self.spans
        )
    }
}

impl StructuredLog for RunBookkeepingReleased<'_> {
    fn log(&self) {
        tracing::debug!(run_id = self.run_id, spans = self.spans, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "run_bookkeeping_released",
            span_name = name,
            run_id = self.run_id,
        )
    }
}

/// An event is about to be planned and applied.
///
/// # Log Level
/// `trace!` - Per-event firehose
pub struct EventReceived<'a> {
    pub run_id: &'a str,
    pub identifier: &'a str,
    pub kind: &'a str,
}

impl Display for EventReceived<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Received {} event '{}' for run '{}'",
            self.kind, self.identifier, self.run_id
        )
    }
}

impl StructuredLog for EventReceived<'_> {
    fn log(&self) {
        tracing::trace!(
            run_id = self.run_id,
            identifier = self.identifier,
            kind = self.kind,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "event_received",
            span_name = name,
            run_id = self.run_id,
            identifier = self.identifier,
            kind = self.kind,
        )
    }
}

/// A boundary item's index asks for more list slots than the recorder will
/// synthesize. The item is dropped.
///
/// # Log Level
/// `warn!` - Malformed input, partial result omitted
///
/// # Example
/// ```text
/// WARN Dropped boundary item of port 'X' in run 'R1': position 4000000000 exceeds 65536
/// ```
pub struct BoundaryIndexRejected<'a> {
    pub run_id: &'a str,
    pub port_name: &'a str,
    pub position: u32,
    pub limit: u32,
}

impl Display for BoundaryIndexRejected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Dropped boundary item of port '{}' in run '{}': position {} exceeds {}",
            self.port_name, self.run_id, self.position, self.limit
        )
    }
}

impl StructuredLog for BoundaryIndexRejected<'_> {
    fn log(&self) {
        tracing::warn!(
            run_id = self.run_id,
            port_name = self.port_name,
            position = self.position,
            limit = self.limit,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "boundary_index_rejected",
            span_name = name,
            run_id = self.run_id,
            port_name = self.port_name,
        )
    }
}

/// An event arrived for a run whose top-level workflow already ended.
///
/// # Log Level
/// `debug!` - Detailed diagnostic information
pub struct LateEventIgnored<'a> {
    pub run_id: &'a str,
    pub identifier: &'a str,
    pub kind: &'a str,
}

impl Display for LateEventIgnored<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Ignored {} event '{}': run '{}' has already ended",
            self.kind, self.identifier, self.run_id
        )
    }
}

impl StructuredLog for LateEventIgnored<'_> {
    fn log(&self) {
        tracing::debug!(
            run_id = self.run_id,
            identifier = self.identifier,
            kind = self.kind,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "late_event_ignored",
            span_name = name,
            run_id = self.run_id,
            identifier = self.identifier,
        )
    }
}
