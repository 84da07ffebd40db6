// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and tracing.
//!
//! This module provides centralized message types for all diagnostic and operational
//! logging throughout the provenance subsystem. Message types follow a struct-based
//! pattern with `Display` trait implementation to:
//!
//! * Eliminate magic strings scattered throughout the codebase
//! * Keep field names consistent between log lines
//! * Provide consistent, structured logging output
//!
//! # Architecture
//!
//! Messages are organized by subsystem:
//! * `messages::recorder` - event ingestion, crystallization and reconciliation
//! * `messages::lineage` - lineage query lifecycle
//! * `messages::graph` - depth propagation and ordering
//! * `messages::storage` - store lifecycle
//!
//! # Usage
//!
//! ```rust
//! use dagwood_lineage::observability::messages::lineage::LineageQueryFailed;
//! use dagwood_lineage::observability::messages::StructuredLog;
//!
//! let error = std::io::Error::new(std::io::ErrorKind::Other, "test error");
//! let msg = LineageQueryFailed {
//!     run_id: "R1",
//!     error: &error,
//! };
//!
//! msg.log();
//! ```
//!
//! The library never installs a subscriber; binaries call [`init_tracing`].

pub mod messages;

use tracing_subscriber::EnvFilter;

/// Install a `fmt` subscriber filtered by `RUST_LOG`, falling back to `filter`.
///
/// Installing twice is not an error; the first subscriber stays active.
pub fn init_tracing(filter: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}
