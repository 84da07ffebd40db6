// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Ready-to-run lookups emitted by the lineage walk and the records they return.

use serde::{Deserialize, Serialize};

use crate::schema::{Collection, IterationVector, PortBinding, PortRef};

/// Table a [`LineageQuery`] reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupTable {
    Collection,
    PortBinding,
}

/// One parametrized lookup against the lineage tables.
///
/// Collection lookups match the iteration exactly, so the empty path selects
/// the root list. PortBinding lookups with an empty path are unconstrained and
/// return every binding of the port in the run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineageQuery {
    pub table: LookupTable,
    pub run_id: String,
    pub port: PortRef,
    pub iteration: IterationVector,
}

impl LineageQuery {
    pub fn matches_collection(&self, collection: &Collection) -> bool {
        self.table == LookupTable::Collection
            && collection.run_id == self.run_id
            && collection.workflow_id == self.port.workflow_id
            && collection.processor_name == self.port.processor_name
            && collection.port_name == self.port.port_name
            && collection.is_input == self.port.is_input()
            && collection.iteration == self.iteration
    }

    pub fn matches_binding(&self, binding: &PortBinding) -> bool {
        self.table == LookupTable::PortBinding
            && binding.run_id == self.run_id
            && binding.workflow_id == self.port.workflow_id
            && binding.processor_name == self.port.processor_name
            && binding.port_name == self.port.port_name
            && binding.is_input == self.port.is_input()
            && (self.iteration.is_empty() || binding.iteration == self.iteration)
    }
}

/// Collection lookup first, PortBinding lookup only when that returns nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupPair {
    pub collection: LineageQuery,
    pub binding: LineageQuery,
}

impl LookupPair {
    pub fn new(run_id: &str, port: PortRef, iteration: IterationVector) -> Self {
        Self {
            collection: LineageQuery {
                table: LookupTable::Collection,
                run_id: run_id.to_string(),
                port: port.clone(),
                iteration: iteration.clone(),
            },
            binding: LineageQuery {
                table: LookupTable::PortBinding,
                run_id: run_id.to_string(),
                port,
                iteration,
            },
        }
    }

    pub fn port(&self) -> &PortRef {
        &self.binding.port
    }

    pub fn iteration(&self) -> &IterationVector {
        &self.binding.iteration
    }
}

/// A row returned by a lineage lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRecord {
    pub workflow_id: String,
    pub processor_name: String,
    pub port_name: String,
    pub run_id: String,
    pub iteration: IterationVector,
    pub collection_id: Option<String>,
    pub parent_collection_id: Option<String>,
    pub value: Option<String>,
    pub is_input: bool,
    pub is_collection: bool,
}

impl From<&PortBinding> for DependencyRecord {
    fn from(binding: &PortBinding) -> Self {
        Self {
            workflow_id: binding.workflow_id.clone(),
            processor_name: binding.processor_name.clone(),
            port_name: binding.port_name.clone(),
            run_id: binding.run_id.clone(),
            iteration: binding.iteration.clone(),
            collection_id: binding.collection_id.clone(),
            parent_collection_id: None,
            value: binding.value.clone(),
            is_input: binding.is_input,
            is_collection: false,
        }
    }
}

impl From<&Collection> for DependencyRecord {
    fn from(collection: &Collection) -> Self {
        Self {
            workflow_id: collection.workflow_id.clone(),
            processor_name: collection.processor_name.clone(),
            port_name: collection.port_name.clone(),
            run_id: collection.run_id.clone(),
            iteration: collection.iteration.clone(),
            collection_id: Some(collection.collection_id.clone()),
            parent_collection_id: Some(collection.parent_collection_id.clone()),
            value: Some(collection.collection_id.clone()),
            is_input: collection.is_input,
            is_collection: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{PortDirection, ValueKind};

    fn binding(iteration: Vec<u32>) -> PortBinding {
        PortBinding {
            workflow_id: "W".into(),
            processor_name: "Proc1".into(),
            port_name: "out".into(),
            port_id: None,
            is_input: false,
            run_id: "R1".into(),
            iteration: IterationVector::new(iteration),
            value: Some("v".into()),
            kind: ValueKind::Atomic,
            collection_id: None,
            position: 1,
        }
    }

    #[test]
    fn test_empty_path_binding_lookup_is_unconstrained() {
        let port = PortRef::new("W", "Proc1", "out", PortDirection::Output);
        let pair = LookupPair::new("R1", port, IterationVector::root());

        assert!(pair.binding.matches_binding(&binding(vec![])));
        assert!(pair.binding.matches_binding(&binding(vec![3, 1])));
        assert!(!pair.collection.matches_binding(&binding(vec![])));
    }

    #[test]
    fn test_pinpointed_binding_lookup_is_exact() {
        let port = PortRef::new("W", "Proc1", "out", PortDirection::Output);
        let pair = LookupPair::new("R1", port, IterationVector::new(vec![3]));

        assert!(!pair.binding.matches_binding(&binding(vec![3, 1])));
        assert!(pair.binding.matches_binding(&binding(vec![3])));
    }

    #[test]
    fn test_direction_is_part_of_the_match() {
        let port = PortRef::new("W", "Proc1", "out", PortDirection::Input);
        let pair = LookupPair::new("R1", port, IterationVector::root());

        assert!(!pair.binding.matches_binding(&binding(vec![])));
    }
}
