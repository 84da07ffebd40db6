// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Backward walk over a structure snapshot.
//!
//! Two steps alternate: `xfer` crosses a datalink from a sink port to its
//! source, `xform` crosses a processor from one of its outputs to its inputs,
//! projecting the iteration path onto each input. Workflow boundary ports and
//! the ports of nested-workflow processors are transparent: the walk passes
//! through them with the path unchanged, which is how it enters and leaves
//! nested workflows.
//!
//! The walk only plans. It returns [`PlannedStep`]s holding ready-to-run
//! lookups and never touches the store.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::graph::StructureSnapshot;
use crate::lineage::{project_path, LookupPair};
use crate::schema::{IterationVector, Port};

/// One relevant step of the walk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedStep {
    /// Processors traversed so far, transparent ones left out
    pub path: Vec<String>,
    pub processor_name: String,
    pub workflow_id: String,
    /// Iteration path at which the step's port was reached
    pub iteration: IterationVector,
    /// Boundary or nested-workflow crossing
    pub transparent: bool,
    /// Lookups for the port the walk arrived at
    pub output: LookupPair,
    /// Lookups for the processor's inputs at their projected paths
    pub inputs: Vec<LookupPair>,
    /// Whether `inputs` are part of the answer
    pub include_inputs: bool,
}

/// Parameters of one walk.
pub struct WalkScope<'a> {
    pub run_id: &'a str,
    /// Processors whose steps are recorded; empty means every processor
    pub targets: &'a BTreeSet<String>,
    pub return_inputs: bool,
}

/// Plan the walk backward from `start` at `path`
pub fn plan_walk(
    snapshot: &StructureSnapshot,
    scope: &WalkScope<'_>,
    start: &Port,
    path: &IterationVector,
) -> Vec<PlannedStep> {
    let mut walker = Walker {
        snapshot,
        scope,
        visited_ports: HashSet::new(),
        expanded: HashSet::new(),
        steps: Vec::new(),
    };

    let opaque_input = start.is_input() && !snapshot.is_transparent(start);
    if opaque_input {
        walker.input_start(start, path);
    } else {
        walker.xform(start, path, &[]);
    }
    walker.steps
}

struct Walker<'a, 's> {
    snapshot: &'a StructureSnapshot,
    scope: &'a WalkScope<'s>,
    /// (port id, path) pairs already stepped through
    visited_ports: HashSet<(String, IterationVector)>,
    /// (processor id, path) pairs whose inputs were already followed
    expanded: HashSet<(String, IterationVector)>,
    steps: Vec<PlannedStep>,
}

/// One traversed processor and whether it is transparent
type Trail = [(String, bool)];

impl Walker<'_, '_> {
    fn is_relevant(&self, processor_name: &str) -> bool {
        self.scope.targets.is_empty() || self.scope.targets.contains(processor_name)
    }

    fn filtered(trail: &Trail) -> Vec<String> {
        trail
            .iter()
            .filter(|(_, transparent)| !transparent)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// A query on a processor input records the input itself, then follows
    /// its link
    fn input_start(&mut self, input: &Port, path: &IterationVector) {
        let trail = vec![(input.processor_name.clone(), false)];
        self.visited_ports.insert((input.id.clone(), path.clone()));

        if self.is_relevant(&input.processor_name) {
            self.steps.push(PlannedStep {
                path: Self::filtered(&trail),
                processor_name: input.processor_name.clone(),
                workflow_id: input.workflow_id.clone(),
                iteration: path.clone(),
                transparent: false,
                output: LookupPair::new(self.scope.run_id, input.port_ref(), path.clone()),
                inputs: Vec::new(),
                include_inputs: false,
            });
        }
        self.xfer(input, path, &trail);
    }

    fn xfer(&mut self, sink: &Port, path: &IterationVector, trail: &Trail) {
        let snapshot = self.snapshot;
        let Some(link) = snapshot.incoming_link(&sink.id) else {
            return;
        };
        let Some(source) = snapshot.port(&link.source_port_id) else {
            return;
        };
        self.xform(source, path, trail);
    }

    fn xform(&mut self, port: &Port, path: &IterationVector, trail: &Trail) {
        if !self.visited_ports.insert((port.id.clone(), path.clone())) {
            return;
        }

        let snapshot = self.snapshot;
        let transparent = snapshot.is_transparent(port);
        let mut trail = trail.to_vec();
        trail.push((port.processor_name.clone(), transparent));

        // Transparent ports are their own single input; processors project
        // the path onto theirs
        let (inputs, projected): (Vec<&Port>, Vec<IterationVector>) = if transparent {
            (vec![port], vec![path.clone()])
        } else {
            let processor_id = port.processor_id.as_deref().unwrap_or_default();
            if !self.expanded.insert((processor_id.to_string(), path.clone())) {
                (Vec::new(), Vec::new())
            } else {
                let inputs = snapshot.input_ports(processor_id);
                let deltas: Vec<u32> = inputs.iter().map(|p| p.depth_delta()).collect();
                let projected = project_path(path, &deltas);
                (inputs, projected)
            }
        };

        if self.is_relevant(&port.processor_name) {
            let run_id = self.scope.run_id;
            self.steps.push(PlannedStep {
                path: Self::filtered(&trail),
                processor_name: port.processor_name.clone(),
                workflow_id: port.workflow_id.clone(),
                iteration: path.clone(),
                transparent,
                output: LookupPair::new(run_id, port.port_ref(), path.clone()),
                inputs: if transparent {
                    Vec::new()
                } else {
                    inputs
                        .iter()
                        .zip(&projected)
                        .map(|(input, sub)| LookupPair::new(run_id, input.port_ref(), sub.clone()))
                        .collect()
                },
                include_inputs: self.scope.return_inputs,
            });
        }

        for (input, sub) in inputs.into_iter().zip(projected) {
            self.xfer(input, &sub, &trail);
        }
    }
}
