// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Crystallization of workflow boundary values.
//!
//! Boundary ports receive their values as loose `(index, value, is_list)`
//! fragments in no guaranteed order. A [`PortTree`] collects the fragments of
//! one port and, once the owning process ends, turns them into `Collection`
//! and `PortBinding` rows. Parenthood is inferred from index vectors alone:
//! `[a]` is the parent of `[a, b]`.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use uuid::Uuid;

use crate::config::consts::TOP_COLLECTION;
use crate::schema::{
    Collection, IterationVector, PortBinding, PortRef, ValueKind, WriteBatch, WriteIntent,
    WriteMode,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TreeNode {
    pub process_id: String,
    pub value: Option<String>,
    pub is_list: bool,
    pub children: BTreeSet<IterationVector>,
}

/// Fragments of one boundary port, ordered by index vector.
#[derive(Debug, Clone, Default)]
pub struct PortTree {
    nodes: BTreeMap<IterationVector, TreeNode>,
}

/// Rows produced by [`PortTree::materialize`].
#[derive(Debug, Clone, Default)]
pub struct Materialized {
    pub batch: WriteBatch,
    /// Collection id of the root list, or the value of a root leaf
    pub root_value: Option<String>,
    /// Nesting depth observed in the assembled value
    pub depth: u32,
    pub collections: usize,
    pub bindings: usize,
}

impl PortTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, index: &IterationVector) -> Option<&TreeNode> {
        self.nodes.get(index)
    }

    /// Upsert the fragment at `index` and link it with its parent and any
    /// children that arrived before it
    pub fn insert(
        &mut self,
        index: IterationVector,
        value: Option<String>,
        is_list: bool,
        process_id: &str,
    ) {
        let children: BTreeSet<IterationVector> = self
            .descendants(&index)
            .filter(|other| index.is_parent_of(other))
            .cloned()
            .collect();

        let node = self.nodes.entry(index.clone()).or_default();
        node.process_id = process_id.to_string();
        if value.is_some() {
            node.value = value;
        }
        node.is_list |= is_list;
        node.children.extend(children);

        if let Some(parent) = index.parent() {
            if let Some(parent_node) = self.nodes.get_mut(&parent) {
                parent_node.children.insert(index);
            }
        }
    }

    /// Every stored vector strictly below `index`. Descendants sort directly
    /// after their ancestor, so this is a bounded range walk.
    fn descendants<'t>(
        &'t self,
        index: &'t IterationVector,
    ) -> impl Iterator<Item = &'t IterationVector> + 't {
        self.nodes
            .range((Bound::Excluded(index), Bound::Unbounded))
            .map(|(key, _)| key)
            .take_while(move |key| key.starts_with(index))
    }

    fn has_descendants(&self, index: &IterationVector) -> bool {
        self.descendants(index).next().is_some()
    }

    /// Highest child position below `index`, looking through missing
    /// intermediate nodes. The last descendant in order carries it.
    fn max_child_position(&self, index: &IterationVector) -> Option<u32> {
        self.descendants(index)
            .last()
            .and_then(|last| last.components().get(index.len()).copied())
    }

    /// Assemble the tree into rows for `port`. Gaps are filled with
    /// placeholders; every row is written with [`WriteMode::Upsert`].
    pub fn materialize(&self, run_id: &str, port: &PortRef, port_id: Option<&str>) -> Materialized {
        let mut out = Materialized::default();
        if self.nodes.is_empty() {
            return out;
        }

        let root = IterationVector::root();
        let (root_value, depth) = self.emit(&root, None, 1, run_id, port, port_id, &mut out);
        out.root_value = root_value;
        out.depth = depth;
        out
    }

    #[allow(clippy::too_many_arguments)]
    fn emit(
        &self,
        index: &IterationVector,
        parent_collection: Option<&str>,
        position: u32,
        run_id: &str,
        port: &PortRef,
        port_id: Option<&str>,
        out: &mut Materialized,
    ) -> (Option<String>, u32) {
        let node = self.nodes.get(index);
        let is_list = node.map_or(false, |n| n.is_list) || self.has_descendants(index);

        if !is_list {
            let value = node.and_then(|n| n.value.clone());
            let kind = if value.is_some() {
                ValueKind::Reference
            } else {
                ValueKind::Placeholder
            };
            out.batch.push(WriteIntent::PortBinding {
                binding: PortBinding {
                    workflow_id: port.workflow_id.clone(),
                    processor_name: port.processor_name.clone(),
                    port_name: port.port_name.clone(),
                    port_id: port_id.map(str::to_string),
                    is_input: port.is_input(),
                    run_id: run_id.to_string(),
                    iteration: index.clone(),
                    value: value.clone(),
                    kind,
                    collection_id: parent_collection.map(str::to_string),
                    position,
                },
                mode: WriteMode::Upsert,
            });
            out.bindings += 1;
            return (value, 0);
        }

        let collection_id = node
            .and_then(|n| n.value.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        out.batch.push(WriteIntent::Collection {
            collection: Collection {
                collection_id: collection_id.clone(),
                parent_collection_id: parent_collection
                    .unwrap_or(TOP_COLLECTION)
                    .to_string(),
                workflow_id: port.workflow_id.clone(),
                processor_name: port.processor_name.clone(),
                port_name: port.port_name.clone(),
                is_input: port.is_input(),
                run_id: run_id.to_string(),
                iteration: index.clone(),
                position: index.last().unwrap_or(0),
            },
            mode: WriteMode::Upsert,
        });
        out.collections += 1;

        let mut depth = 1;
        if let Some(max_position) = self.max_child_position(index) {
            for child in 0..=max_position {
                let (_, child_depth) = self.emit(
                    &index.child(child),
                    Some(&collection_id),
                    child + 1,
                    run_id,
                    port,
                    port_id,
                    out,
                );
                depth = depth.max(child_depth + 1);
            }
        }

        (Some(collection_id), depth)
    }
}
