// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod backends;   // provenance stores
pub mod config;     // config + runtime wiring
pub mod errors;     // error handling
pub mod events;     // inbound event stream
pub mod graph;      // static structure utilities
pub mod lineage;    // backward lineage queries
pub mod observability;
pub mod recorder;   // event ingestion
pub mod schema;     // persisted data model
pub mod traits;     // unified abstractions

#[cfg(test)]
mod fixtures;
