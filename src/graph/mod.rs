// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Static graph utilities over one run's workflow structure.
//!
//! * [`StructureSnapshot`] - immutable copy of a workflow tree with link indexes
//! * [`predecessor_counts`] - incoming processor links per processor
//! * [`topological_order`] - Kahn's algorithm with nested workflows spliced in
//! * [`propagate_depths`] - forward propagation of resolved port depths

mod depth;
mod predecessors;
mod snapshot;
mod topological;

pub use depth::propagate_depths;
pub use predecessors::predecessor_counts;
pub use snapshot::StructureSnapshot;
pub use topological::topological_order;
