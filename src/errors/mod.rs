// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod config;
mod graph;
mod lineage;
mod recorder;
mod schema;
pub mod storage;

pub use config::ConfigError;
pub use graph::GraphError;
pub use lineage::LineageError;
pub use recorder::RecorderError;
pub use schema::SchemaError;
pub use storage::StorageError;
