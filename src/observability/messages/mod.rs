// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Every diagnostic the provenance subsystem emits is one of these structs.
//! Each implements `Display` for the human-readable line and [`StructuredLog`]
//! to emit it at its documented level with structured fields.
//!
//! # Organization
//!
//! * `recorder` - event ingestion, crystallization and reconciliation
//! * `lineage` - lineage query lifecycle
//! * `graph` - depth propagation and ordering
//! * `storage` - store lifecycle
//!
//! # Usage Pattern
//!
//! ```rust
//! use dagwood_lineage::observability::messages::recorder::StructureAlreadyKnown;
//! use dagwood_lineage::observability::messages::StructuredLog;
//!
//! StructureAlreadyKnown { workflow_id: "wf-W" }.log();
//! ```

use tracing::Span;

pub mod graph;
pub mod lineage;
pub mod recorder;
pub mod storage;

/// A message that knows its own level and structured fields.
pub trait StructuredLog {
    /// Emit the message as a tracing event
    fn log(&self);

    /// A span carrying the message's fields
    fn span(&self, name: &str) -> Span;
}
