// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::errors::LineageError;
use crate::graph::{propagate_depths, StructureSnapshot};
use crate::lineage::opm::OpmGraph;
use crate::lineage::walk::{plan_walk, PlannedStep, WalkScope};
use crate::lineage::{DependencyRecord, LineageQuery, LookupPair};
use crate::observability::messages::graph::TopologicalSortFailed;
use crate::observability::messages::lineage::{
    InitialPortNotFound, LineageQueryCompleted, LineageQueryFailed, LineageQueryStarted,
};
use crate::observability::messages::StructuredLog;
use crate::schema::{IterationSelector, IterationVector, PortDirection, PortRef};
use crate::traits::ProvenanceStore;

/// Which port of which run to explain, and which upstream processors matter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageRequest {
    pub run_id: String,
    /// Workflow owning the port; may be nested below the run's workflow
    pub workflow_id: String,
    /// Processor name, or the workflow name for a boundary port
    pub processor_name: String,
    pub port_name: String,
    #[serde(default)]
    pub selector: IterationSelector,
    /// Processors to report; empty reports every processor on the way
    #[serde(default)]
    pub targets: BTreeSet<String>,
}

impl LineageRequest {
    pub fn new(
        run_id: impl Into<String>,
        workflow_id: impl Into<String>,
        processor_name: impl Into<String>,
        port_name: impl Into<String>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            workflow_id: workflow_id.into(),
            processor_name: processor_name.into(),
            port_name: port_name.into(),
            selector: IterationSelector::default(),
            targets: BTreeSet::new(),
        }
    }

    pub fn at(mut self, selector: IterationSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn targeting<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.targets = targets.into_iter().map(Into::into).collect();
        self
    }
}

/// Resolver behaviour switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineageOptions {
    /// Also return the records of each processor's inputs
    pub return_inputs: bool,
    /// Assert an [`OpmGraph`] while resolving
    pub build_opm: bool,
}

/// Records one lookup pair returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySet {
    pub port: PortRef,
    pub iteration: IterationVector,
    pub records: Vec<DependencyRecord>,
}

/// Dependencies reached along one traversal path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineagePath {
    /// Processors from the queried port back to the reported one
    pub processors: Vec<String>,
    pub dependencies: Vec<DependencySet>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationLineage {
    pub iteration: IterationVector,
    pub paths: Vec<LineagePath>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageAnswer {
    pub run_id: String,
    pub iterations: Vec<IterationLineage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opm: Option<OpmGraph>,
}

impl LineageAnswer {
    fn empty(run_id: &str, build_opm: bool) -> Self {
        Self {
            run_id: run_id.to_string(),
            iterations: Vec::new(),
            opm: build_opm.then(OpmGraph::new),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.iterations.iter().all(|i| i.paths.is_empty())
    }

    /// Every record of every path, in answer order
    pub fn records(&self) -> impl Iterator<Item = &DependencyRecord> {
        self.iterations
            .iter()
            .flat_map(|i| i.paths.iter())
            .flat_map(|p| p.dependencies.iter())
            .flat_map(|d| d.records.iter())
    }
}

/// Read-only backward lineage over recorded runs.
///
/// Each query loads one [`StructureSnapshot`] of the run's workflow, resolves
/// port depths on that copy, plans the walk without touching the store and
/// then executes the planned lookups. Queries share nothing, so any number may
/// run concurrently.
pub struct LineageResolver {
    store: Arc<dyn ProvenanceStore>,
    options: LineageOptions,
}

impl LineageResolver {
    pub fn new(store: Arc<dyn ProvenanceStore>) -> Self {
        Self::with_options(store, LineageOptions::default())
    }

    pub fn with_options(store: Arc<dyn ProvenanceStore>, options: LineageOptions) -> Self {
        Self { store, options }
    }

    pub fn options(&self) -> LineageOptions {
        self.options
    }

    pub async fn resolve(&self, request: &LineageRequest) -> Result<LineageAnswer, LineageError> {
        let selector = request.selector.to_string();
        let start_msg = LineageQueryStarted {
            run_id: &request.run_id,
            workflow_id: &request.workflow_id,
            processor_name: &request.processor_name,
            port_name: &request.port_name,
            selector: &selector,
        };
        let span = start_msg.span("resolve");
        span.in_scope(|| start_msg.log());

        let mut lookups = 0;
        let resolved = self
            .try_resolve(request, &mut lookups)
            .instrument(span.clone())
            .await;
        span.in_scope(|| match resolved {
            Ok(answer) => {
                LineageQueryCompleted {
                    run_id: &request.run_id,
                    processor_name: &request.processor_name,
                    port_name: &request.port_name,
                    iterations: answer.iterations.len(),
                    lookups,
                }
                .log();
                Ok(answer)
            }
            Err(error) => {
                LineageQueryFailed {
                    run_id: &request.run_id,
                    error: &error,
                }
                .log();
                Err(error)
            }
        })
    }

    async fn try_resolve(
        &self,
        request: &LineageRequest,
        lookups: &mut usize,
    ) -> Result<LineageAnswer, LineageError> {
        let store = self.store.as_ref();
        let run = store
            .run(&request.run_id)
            .await?
            .ok_or_else(|| LineageError::UnknownRun {
                run_id: request.run_id.clone(),
            })?;

        let mut snapshot = StructureSnapshot::load(store, &run.workflow_id).await?;
        if let Err(error) = propagate_depths(&mut snapshot, &run.workflow_id) {
            TopologicalSortFailed {
                workflow_id: &run.workflow_id,
                error: &error,
            }
            .log();
        }

        let start = [PortDirection::Output, PortDirection::Input]
            .into_iter()
            .find_map(|direction| {
                snapshot.find_port(
                    &request.workflow_id,
                    &request.processor_name,
                    &request.port_name,
                    direction,
                )
            });
        let Some(start) = start else {
            InitialPortNotFound {
                run_id: &request.run_id,
                workflow_id: &request.workflow_id,
                processor_name: &request.processor_name,
                port_name: &request.port_name,
            }
            .log();
            return Ok(LineageAnswer::empty(&request.run_id, self.options.build_opm));
        };

        let paths = match &request.selector {
            IterationSelector::Path(path) => vec![path.clone()],
            IterationSelector::All => store
                .port_bindings(&request.run_id, &start.port_ref())
                .await?
                .into_iter()
                .map(|binding| binding.iteration)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect(),
        };

        let scope = WalkScope {
            run_id: &request.run_id,
            targets: &request.targets,
            return_inputs: self.options.return_inputs,
        };
        let mut execution = Execution {
            store,
            cache: HashMap::new(),
            opm: self.options.build_opm.then(OpmGraph::new),
            lookups,
        };

        let mut iterations = Vec::with_capacity(paths.len());
        for path in paths {
            let steps = plan_walk(&snapshot, &scope, start, &path);
            let mut lineage = Vec::with_capacity(steps.len());
            for step in &steps {
                lineage.push(execution.step(step).await?);
            }
            iterations.push(IterationLineage {
                iteration: path,
                paths: lineage,
            });
        }

        Ok(LineageAnswer {
            run_id: request.run_id.clone(),
            iterations,
            opm: execution.opm,
        })
    }
}

/// Runs planned lookups, each distinct query at most once per request.
struct Execution<'a> {
    store: &'a dyn ProvenanceStore,
    cache: HashMap<LineageQuery, Vec<DependencyRecord>>,
    opm: Option<OpmGraph>,
    lookups: &'a mut usize,
}

impl Execution<'_> {
    async fn query(&mut self, query: &LineageQuery) -> Result<Vec<DependencyRecord>, LineageError> {
        if let Some(records) = self.cache.get(query) {
            return Ok(records.clone());
        }
        *self.lookups += 1;
        let records = self.store.lookup(query).await?;
        self.cache.insert(query.clone(), records.clone());
        Ok(records)
    }

    /// Collection lookup, falling back to the binding lookup
    async fn pair(&mut self, pair: &LookupPair) -> Result<DependencySet, LineageError> {
        let mut records = self.query(&pair.collection).await?;
        if records.is_empty() {
            records = self.query(&pair.binding).await?;
        }
        Ok(DependencySet {
            port: pair.port().clone(),
            iteration: pair.iteration().clone(),
            records,
        })
    }

    async fn step(&mut self, step: &PlannedStep) -> Result<LineagePath, LineageError> {
        let output = self.pair(&step.output).await?;
        let run_inputs = step.include_inputs || (self.opm.is_some() && !step.transparent);
        let mut inputs = Vec::new();
        if run_inputs {
            for pair in &step.inputs {
                inputs.push(self.pair(pair).await?);
            }
        }

        if let Some(opm) = self.opm.as_mut().filter(|_| !step.transparent) {
            let process = opm.process(
                &step.output.binding.run_id,
                &step.processor_name,
                &step.iteration,
            );
            for record in &output.records {
                if record.is_input {
                    opm.used(&process, record);
                } else {
                    opm.was_generated_by(&process, record);
                }
            }
            for record in inputs.iter().flat_map(|set| set.records.iter()) {
                opm.used(&process, record);
            }
        }

        let mut dependencies = vec![output];
        if step.include_inputs {
            dependencies.extend(inputs);
        }
        dependencies.retain(|set| !set.records.is_empty());

        Ok(LineagePath {
            processors: step.path.clone(),
            dependencies,
        })
    }
}
