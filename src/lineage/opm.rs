// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! OPM-style causal graph asserted while a lineage walk runs.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::lineage::DependencyRecord;
use crate::schema::IterationVector;

/// A value reference, or a collection id for list nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpmArtifact {
    pub id: String,
    pub is_collection: bool,
}

/// One processor at one iteration of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpmProcess {
    pub id: String,
    pub processor_name: String,
    pub run_id: String,
    pub iteration: IterationVector,
}

/// `used` or `wasGeneratedBy` edge, the port name being the role.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OpmEdge {
    pub process: String,
    pub artifact: String,
    pub role: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpmGraph {
    pub artifacts: BTreeMap<String, OpmArtifact>,
    pub processes: BTreeMap<String, OpmProcess>,
    pub used: BTreeSet<OpmEdge>,
    pub was_generated_by: BTreeSet<OpmEdge>,
}

impl OpmGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty() && self.processes.is_empty()
    }

    /// Assert the process node for `(run, processor, iteration)`, returning its id
    pub fn process(&mut self, run_id: &str, processor_name: &str, iteration: &IterationVector) -> String {
        let id = format!("{}:{}:{}", run_id, processor_name, iteration);
        self.processes
            .entry(id.clone())
            .or_insert_with(|| OpmProcess {
                id: id.clone(),
                processor_name: processor_name.to_string(),
                run_id: run_id.to_string(),
                iteration: iteration.clone(),
            });
        id
    }

    /// Records without a value reference (placeholders) assert nothing
    fn artifact(&mut self, record: &DependencyRecord) -> Option<String> {
        let id = record.value.clone()?;
        self.artifacts
            .entry(id.clone())
            .or_insert_with(|| OpmArtifact {
                id: id.clone(),
                is_collection: record.is_collection,
            });
        Some(id)
    }

    pub fn used(&mut self, process: &str, record: &DependencyRecord) {
        if let Some(artifact) = self.artifact(record) {
            self.used.insert(OpmEdge {
                process: process.to_string(),
                artifact,
                role: record.port_name.clone(),
            });
        }
    }

    pub fn was_generated_by(&mut self, process: &str, record: &DependencyRecord) {
        if let Some(artifact) = self.artifact(record) {
            self.was_generated_by.insert(OpmEdge {
                process: process.to_string(),
                artifact,
                role: record.port_name.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(port: &str, value: Option<&str>, is_input: bool) -> DependencyRecord {
        DependencyRecord {
            workflow_id: "W".to_string(),
            processor_name: "A".to_string(),
            port_name: port.to_string(),
            run_id: "R1".to_string(),
            iteration: IterationVector::root(),
            collection_id: None,
            parent_collection_id: None,
            value: value.map(str::to_string),
            is_input,
            is_collection: false,
        }
    }

    #[test]
    fn test_artifacts_are_deduplicated_by_reference() {
        let mut graph = OpmGraph::new();
        let process = graph.process("R1", "A", &IterationVector::root());

        graph.used(&process, &record("in", Some("v1"), true));
        graph.was_generated_by(&process, &record("out", Some("v1"), false));
        graph.used(&process, &record("in", Some("v1"), true));

        assert_eq!(graph.artifacts.len(), 1);
        assert_eq!(graph.used.len(), 1);
        assert_eq!(graph.was_generated_by.len(), 1);
        assert_eq!(process, "R1:A:[]");
    }

    #[test]
    fn test_placeholders_assert_nothing() {
        let mut graph = OpmGraph::new();
        let process = graph.process("R1", "A", &IterationVector::new(vec![1]));
        graph.used(&process, &record("in", None, true));

        assert!(graph.artifacts.is_empty());
        assert!(graph.used.is_empty());
        assert_eq!(graph.processes.len(), 1);
    }
}
