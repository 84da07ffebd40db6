// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Backward lineage over recorded runs.
//!
//! [`LineageResolver`] answers "which values, through which processors, led to
//! this port at this iteration" for one run:
//!
//! 1. load a [`crate::graph::StructureSnapshot`] of the run's workflow and
//!    propagate port depths on it
//! 2. plan the alternating xfer / xform walk from the queried port
//!    ([`walk::plan_walk`]), projecting the iteration path onto each input
//!    ([`project_path`])
//! 3. execute the planned [`LookupPair`]s, optionally asserting an [`OpmGraph`]
//!
//! [`ProvenanceAccess`] offers plain reads of the same data.
//!
//! ```no_run
//! use std::sync::Arc;
//! use dagwood_lineage::backends::memory::InMemoryStore;
//! use dagwood_lineage::lineage::{LineageRequest, LineageResolver};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let resolver = LineageResolver::new(Arc::new(InMemoryStore::new()));
//! let request = LineageRequest::new("R1", "wf-W", "Proc1", "in").targeting(["Proc1"]);
//! let answer = resolver.resolve(&request).await?;
//! for record in answer.records() {
//!     println!("{:?} = {:?}", record.iteration, record.value);
//! }
//! # Ok(())
//! # }
//! ```

mod access;
mod opm;
mod projection;
mod query;
mod resolver;
pub mod walk;


pub use access::ProvenanceAccess;
pub use opm::{OpmArtifact, OpmEdge, OpmGraph, OpmProcess};
pub use projection::project_path;
pub use query::{DependencyRecord, LineageQuery, LookupPair, LookupTable};
pub use resolver::{
    DependencySet, IterationLineage, LineageAnswer, LineageOptions, LineagePath, LineageRequest,
    LineageResolver,
};
