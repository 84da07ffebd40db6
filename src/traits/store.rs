use async_trait::async_trait;

use crate::errors::storage::Result;
use crate::lineage::{DependencyRecord, LineageQuery};
use crate::schema::{
    Collection, DataBinding, DataflowInvocation, Datalink, Port, PortBinding, PortDirection,
    PortRef, Processor, ProcessorEnactment, Workflow, WorkflowRun, WriteBatch,
};

/// Storage seam for provenance data.
///
/// Writes arrive as whole [`WriteBatch`]es and are applied in order;
/// transactional backends apply a batch atomically. Reads return rows in a
/// deterministic order so that "first match" policies upstream stay
/// reproducible.
#[async_trait]
pub trait ProvenanceStore: Send + Sync {
    async fn apply(&self, batch: WriteBatch) -> Result<()>;

    async fn workflow(&self, workflow_id: &str) -> Result<Option<Workflow>>;

    /// The workflow and every workflow nested below it
    async fn workflow_tree(&self, top_workflow_id: &str) -> Result<Vec<Workflow>>;

    async fn processors(&self, workflow_id: &str) -> Result<Vec<Processor>>;

    async fn find_processor(&self, workflow_id: &str, name: &str) -> Result<Option<Processor>>;

    async fn ports(&self, workflow_id: &str) -> Result<Vec<Port>>;

    async fn datalinks(&self, workflow_id: &str) -> Result<Vec<Datalink>>;

    /// Ports by owner name, port name and direction; boundary ports are owned
    /// by the workflow name
    async fn find_ports(
        &self,
        workflow_id: &str,
        processor_name: &str,
        port_name: &str,
        direction: PortDirection,
    ) -> Result<Vec<Port>>;

    async fn run(&self, run_id: &str) -> Result<Option<WorkflowRun>>;

    /// Runs ordered by timestamp, optionally restricted to one workflow
    async fn runs(&self, workflow_id: Option<&str>) -> Result<Vec<WorkflowRun>>;

    async fn invocations(&self, run_id: &str) -> Result<Vec<DataflowInvocation>>;

    async fn enactment_by_process(
        &self,
        run_id: &str,
        process_identifier: &str,
    ) -> Result<Option<ProcessorEnactment>>;

    async fn enactments(&self, run_id: &str) -> Result<Vec<ProcessorEnactment>>;

    async fn data_bindings(&self, binding_group_id: &str) -> Result<Vec<DataBinding>>;

    /// Every binding of a port in a run, ordered by iteration
    async fn port_bindings(&self, run_id: &str, port: &PortRef) -> Result<Vec<PortBinding>>;

    async fn collections(&self, run_id: &str, port: &PortRef) -> Result<Vec<Collection>>;

    /// Execute one planned lineage lookup
    async fn lookup(&self, query: &LineageQuery) -> Result<Vec<DependencyRecord>>;

    /// Delete every dynamic row of a run; static structure is kept
    async fn delete_run(&self, run_id: &str) -> Result<()>;
}
