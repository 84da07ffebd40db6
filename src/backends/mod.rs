// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Provenance store backends.
//!
//! Every backend implements [`crate::traits::ProvenanceStore`] and is created
//! through [`factory::StoreFactory`] from the `storage` configuration section:
//!
//! ```text
//! Configuration -> StoreFactory -> Arc<dyn ProvenanceStore> -> Recorder / Resolver
//! ```
//!
//! ## Memory Backend
//! DashMap tables living in the process. Always available; the default.
//!
//! ## SQLite Backend
//! One relational table per entity through `sqlx`. Only compiled with the
//! `sqlite` cargo feature.
//!
//! # Examples
//!
//! ```rust
//! use dagwood_lineage::backends::factory::StoreFactory;
//! use dagwood_lineage::config::StorageConfig;
//!
//! # tokio_test_block(async {
//! let store = StoreFactory::from_config(&StorageConfig::default()).await?;
//! assert!(store.runs(None).await?.is_empty());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
//! ```

pub mod factory;
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use factory::StoreFactory;
pub use memory::InMemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
