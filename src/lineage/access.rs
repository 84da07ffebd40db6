// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::errors::LineageError;
use crate::schema::{
    DataBinding, DataflowInvocation, PortBinding, PortDirection, PortRef, ProcessorEnactment,
    WorkflowRun,
};
use crate::traits::ProvenanceStore;

/// Read access to recorded runs for consumers that do not walk lineage.
#[derive(Clone)]
pub struct ProvenanceAccess {
    store: Arc<dyn ProvenanceStore>,
}

impl ProvenanceAccess {
    pub fn new(store: Arc<dyn ProvenanceStore>) -> Self {
        Self { store }
    }

    /// Runs ordered by timestamp, optionally of one workflow only
    pub async fn list_runs(&self, workflow_id: Option<&str>) -> Result<Vec<WorkflowRun>, LineageError> {
        Ok(self.store.runs(workflow_id).await?)
    }

    pub async fn run(&self, run_id: &str) -> Result<WorkflowRun, LineageError> {
        self.store
            .run(run_id)
            .await?
            .ok_or_else(|| LineageError::UnknownRun {
                run_id: run_id.to_string(),
            })
    }

    pub async fn invocations(&self, run_id: &str) -> Result<Vec<DataflowInvocation>, LineageError> {
        Ok(self.store.invocations(run_id).await?)
    }

    pub async fn enactments(
        &self,
        run_id: &str,
        processor_name: Option<&str>,
    ) -> Result<Vec<ProcessorEnactment>, LineageError> {
        let mut enactments = self.store.enactments(run_id).await?;
        if let Some(name) = processor_name {
            enactments.retain(|e| e.processor_name == name);
        }
        Ok(enactments)
    }

    pub async fn data_bindings(&self, binding_group_id: &str) -> Result<Vec<DataBinding>, LineageError> {
        Ok(self.store.data_bindings(binding_group_id).await?)
    }

    pub async fn port_values(&self, run_id: &str, port: &PortRef) -> Result<Vec<PortBinding>, LineageError> {
        Ok(self.store.port_bindings(run_id, port).await?)
    }

    /// Bindings of the run's top-level boundary inputs, keyed by port name
    pub async fn initial_inputs(
        &self,
        run_id: &str,
    ) -> Result<BTreeMap<String, Vec<PortBinding>>, LineageError> {
        self.boundary_values(run_id, PortDirection::Input).await
    }

    /// Bindings of the run's top-level boundary outputs, keyed by port name
    pub async fn final_outputs(
        &self,
        run_id: &str,
    ) -> Result<BTreeMap<String, Vec<PortBinding>>, LineageError> {
        self.boundary_values(run_id, PortDirection::Output).await
    }

    async fn boundary_values(
        &self,
        run_id: &str,
        direction: PortDirection,
    ) -> Result<BTreeMap<String, Vec<PortBinding>>, LineageError> {
        let run = self.run(run_id).await?;
        let mut values = BTreeMap::new();
        for port in self.store.ports(&run.workflow_id).await? {
            if !port.is_boundary() || port.direction != direction {
                continue;
            }
            let bindings = self.store.port_bindings(run_id, &port.port_ref()).await?;
            values.insert(port.name.clone(), bindings);
        }
        Ok(values)
    }

    /// Drop every dynamic row of the run; workflow structure stays
    pub async fn delete_run(&self, run_id: &str) -> Result<(), LineageError> {
        self.run(run_id).await?;
        Ok(self.store.delete_run(run_id).await?)
    }
}
