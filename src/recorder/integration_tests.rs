use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::backends::memory::InMemoryStore;
use crate::errors::storage::Result as StorageResult;
use crate::errors::{RecorderError, StorageError};
use crate::events::{BoundaryItem, EventPayload, ProvenanceEvent};
use crate::fixtures::{identity_run, nested_run};
use crate::lineage::{DependencyRecord, LineageQuery};
use crate::recorder::EventRecorder;
use crate::schema::{
    Collection, DataBinding, DataflowInvocation, Datalink, IterationVector, Port, PortBinding,
    PortDirection, PortRef, Processor, ProcessorEnactment, ValueKind, Workflow, WorkflowRun,
    WriteBatch,
};
use crate::traits::ProvenanceStore;

/// In-memory store whose writes or structure reads can be switched to fail
#[derive(Default)]
struct FailingStore {
    inner: InMemoryStore,
    fail_writes: AtomicBool,
    fail_structure_reads: AtomicBool,
}

impl FailingStore {
    fn check(flag: &AtomicBool) -> StorageResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StorageError::Database("injected failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ProvenanceStore for FailingStore {
    async fn apply(&self, batch: WriteBatch) -> StorageResult<()> {
        Self::check(&self.fail_writes)?;
        self.inner.apply(batch).await
    }

    async fn workflow(&self, workflow_id: &str) -> StorageResult<Option<Workflow>> {
        self.inner.workflow(workflow_id).await
    }

    async fn workflow_tree(&self, top_workflow_id: &str) -> StorageResult<Vec<Workflow>> {
        Self::check(&self.fail_structure_reads)?;
        self.inner.workflow_tree(top_workflow_id).await
    }

    async fn processors(&self, workflow_id: &str) -> StorageResult<Vec<Processor>> {
        self.inner.processors(workflow_id).await
    }

    async fn find_processor(&self, workflow_id: &str, name: &str) -> StorageResult<Option<Processor>> {
        self.inner.find_processor(workflow_id, name).await
    }

    async fn ports(&self, workflow_id: &str) -> StorageResult<Vec<Port>> {
        self.inner.ports(workflow_id).await
    }

    async fn datalinks(&self, workflow_id: &str) -> StorageResult<Vec<Datalink>> {
        self.inner.datalinks(workflow_id).await
    }

    async fn find_ports(
        &self,
        workflow_id: &str,
        processor_name: &str,
        port_name: &str,
        direction: PortDirection,
    ) -> StorageResult<Vec<Port>> {
        self.inner
            .find_ports(workflow_id, processor_name, port_name, direction)
            .await
    }

    async fn run(&self, run_id: &str) -> StorageResult<Option<WorkflowRun>> {
        self.inner.run(run_id).await
    }

    async fn runs(&self, workflow_id: Option<&str>) -> StorageResult<Vec<WorkflowRun>> {
        self.inner.runs(workflow_id).await
    }

    async fn invocations(&self, run_id: &str) -> StorageResult<Vec<DataflowInvocation>> {
        self.inner.invocations(run_id).await
    }

    async fn enactment_by_process(
        &self,
        run_id: &str,
        process_identifier: &str,
    ) -> StorageResult<Option<ProcessorEnactment>> {
        self.inner.enactment_by_process(run_id, process_identifier).await
    }

    async fn enactments(&self, run_id: &str) -> StorageResult<Vec<ProcessorEnactment>> {
        self.inner.enactments(run_id).await
    }

    async fn data_bindings(&self, binding_group_id: &str) -> StorageResult<Vec<DataBinding>> {
        self.inner.data_bindings(binding_group_id).await
    }

    async fn port_bindings(&self, run_id: &str, port: &PortRef) -> StorageResult<Vec<PortBinding>> {
        self.inner.port_bindings(run_id, port).await
    }

    async fn collections(&self, run_id: &str, port: &PortRef) -> StorageResult<Vec<Collection>> {
        self.inner.collections(run_id, port).await
    }

    async fn lookup(&self, query: &LineageQuery) -> StorageResult<Vec<DependencyRecord>> {
        self.inner.lookup(query).await
    }

    async fn delete_run(&self, run_id: &str) -> StorageResult<()> {
        self.inner.delete_run(run_id).await
    }
}

/// Integration tests for the recorder replaying complete event streams
#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<InMemoryStore>, EventRecorder) {
        let store = Arc::new(InMemoryStore::new());
        let recorder = EventRecorder::new(store.clone());
        (store, recorder)
    }

    async fn replay(recorder: &EventRecorder, events: &[ProvenanceEvent]) {
        for event in events {
            recorder
                .try_record(event)
                .await
                .unwrap_or_else(|e| panic!("{} failed: {}", event.kind(), e));
        }
    }

    fn values(bindings: &[crate::schema::PortBinding]) -> Vec<(IterationVector, Option<String>)> {
        bindings
            .iter()
            .map(|b| (b.iteration.clone(), b.value.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_identity_run_is_recorded() {
        let (store, recorder) = recorder();
        replay(&recorder, &identity_run("R1")).await;

        let input = PortRef::new("wf-W", "Proc1", "in", PortDirection::Input);
        let bindings = store.port_bindings("R1", &input).await.unwrap();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].value.as_deref(), Some("v1"));
        assert_eq!(bindings[0].kind, ValueKind::Atomic);
        assert!(bindings[0].port_id.is_some());

        let enactments = store.enactments("R1").await.unwrap();
        assert_eq!(enactments.len(), 1);
        let enactment = &enactments[0];
        assert_eq!(enactment.processor_name, "Proc1");
        assert!(enactment.processor_id.is_some());
        assert!(enactment.ended.is_some());
        let inputs = store
            .data_bindings(enactment.input_bindings_id.as_deref().unwrap())
            .await
            .unwrap();
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].value, "v1");

        let invocations = store.invocations("R1").await.unwrap();
        assert_eq!(invocations.len(), 1);
        assert!(invocations[0].completed);
        assert!(invocations[0].parent_enactment_id.is_none());
        assert!(invocations[0].input_bindings_id.is_some());
        assert!(invocations[0].output_bindings_id.is_some());

        assert!(store.run("R1").await.unwrap().is_some());
        assert_eq!(recorder.active_runs(), 0);
    }

    #[tokio::test]
    async fn test_boundary_output_matches_its_predecessor() {
        let (store, recorder) = recorder();
        replay(&recorder, &identity_run("R1")).await;

        let y = PortRef::new("wf-W", "W", "Y", PortDirection::Output);
        let out = PortRef::new("wf-W", "Proc1", "out", PortDirection::Output);
        let y_bindings = store.port_bindings("R1", &y).await.unwrap();
        let out_bindings = store.port_bindings("R1", &out).await.unwrap();

        assert!(!y_bindings.is_empty());
        assert_eq!(values(&y_bindings), values(&out_bindings));
    }

    #[tokio::test]
    async fn test_boundary_input_is_backpatched_without_boundary_items() {
        let (store, recorder) = recorder();
        let events: Vec<ProvenanceEvent> = identity_run("R1")
            .into_iter()
            .filter(|e| !matches!(e.payload, EventPayload::BoundaryDataItem(_)))
            .collect();
        replay(&recorder, &events).await;

        let x = PortRef::new("wf-W", "W", "X", PortDirection::Input);
        let bindings = store.port_bindings("R1", &x).await.unwrap();
        assert_eq!(values(&bindings), vec![(IterationVector::root(), Some("v1".to_string()))]);
    }

    #[tokio::test]
    async fn test_structure_ingestion_is_idempotent() {
        let (store, recorder) = recorder();
        replay(&recorder, &identity_run("R1")).await;
        replay(&recorder, &identity_run("R2")).await;

        assert_eq!(store.processors("wf-W").await.unwrap().len(), 1);
        assert_eq!(store.ports("wf-W").await.unwrap().len(), 4);
        assert_eq!(store.datalinks("wf-W").await.unwrap().len(), 2);
        assert_eq!(store.runs(Some("wf-W")).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_nested_invocation_links_to_invoking_enactment() {
        let (store, recorder) = recorder();
        replay(&recorder, &nested_run("R1")).await;

        let enactments = store.enactments("R1").await.unwrap();
        let inner = enactments
            .iter()
            .find(|e| e.processor_name == "Inner")
            .unwrap();
        let echo = enactments
            .iter()
            .find(|e| e.processor_name == "Echo")
            .unwrap();
        assert_eq!(
            echo.parent_enactment_id.as_deref(),
            Some(inner.enactment_id.as_str())
        );

        let invocations = store.invocations("R1").await.unwrap();
        assert_eq!(invocations.len(), 2);
        let nested = invocations
            .iter()
            .find(|i| i.workflow_id == "wf-inner")
            .unwrap();
        assert_eq!(
            nested.parent_enactment_id.as_deref(),
            Some(inner.enactment_id.as_str())
        );
        assert!(invocations.iter().all(|i| i.completed));

        let inner_out = PortRef::new("wf-inner", "InnerFlow", "y", PortDirection::Output);
        let bindings = store.port_bindings("R1", &inner_out).await.unwrap();
        assert_eq!(bindings[0].value.as_deref(), Some("e1"));
    }

    #[tokio::test]
    async fn test_reconciliation_persists_resolved_depths() {
        let (store, recorder) = recorder();
        replay(&recorder, &identity_run("R1")).await;

        let ports = store.ports("wf-W").await.unwrap();
        assert!(ports.iter().all(|p| p.resolved_depth == Some(0)));
    }

    #[tokio::test]
    async fn test_boundary_list_is_crystallized() {
        let (store, recorder) = recorder();
        let mut events = identity_run("R1");
        let end = events.pop().unwrap();
        let process = end.parent_id.clone().unwrap();
        for (i, (index, value, is_list)) in [
            (vec![1], "b", false),
            (vec![], "L", true),
            (vec![0], "a", false),
        ]
        .into_iter()
        .enumerate()
        {
            events.push(ProvenanceEvent::new(
                format!("R1:Z:{}", i),
                Some(&process),
                "R1",
                EventPayload::BoundaryDataItem(BoundaryItem {
                    port_name: "Z".to_string(),
                    direction: PortDirection::Output,
                    index: IterationVector::new(index),
                    value: Some(value.to_string()),
                    is_list,
                }),
            ));
        }
        events.push(end);
        replay(&recorder, &events).await;

        // Z is not a declared port, but its rows are still addressable by name
        let z = PortRef::new("wf-W", "W", "Z", PortDirection::Output);
        let collections = store.collections("R1", &z).await.unwrap();
        let bindings = store.port_bindings("R1", &z).await.unwrap();
        assert_eq!(collections.len(), 1);
        assert_eq!(collections[0].collection_id, "L");
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0].position, 1);
        assert_eq!(bindings[1].position, 2);
        assert!(bindings
            .iter()
            .all(|b| b.collection_id.as_deref() == Some("L")));
    }

    #[tokio::test]
    async fn test_event_without_context_is_dropped_not_fatal() {
        let (store, recorder) = recorder();
        let orphan = ProvenanceEvent::new(
            "orphan",
            Some("nobody"),
            "R9",
            EventPayload::IterationCompleted {
                iteration: IterationVector::root(),
                inputs: None,
                outputs: None,
                started: None,
                ended: None,
            },
        );

        let error = recorder.try_record(&orphan).await.unwrap_err();
        assert!(matches!(error, RecorderError::MissingContext { .. }));

        // record swallows the failure and later events still land
        recorder.record(&orphan).await;
        replay(&recorder, &identity_run("R1")).await;
        assert_eq!(store.enactments("R1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_error_events_write_nothing() {
        let (_, recorder) = recorder();
        let event = ProvenanceEvent::new(
            "R1:err",
            None,
            "R1",
            EventPayload::Error {
                message: "boom".to_string(),
            },
        );

        assert!(recorder.plan(&event).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_events_after_run_end_leave_no_bookkeeping() {
        let (store, recorder) = recorder();
        replay(&recorder, &identity_run("R1")).await;
        assert_eq!(recorder.active_runs(), 0);

        let late_error = ProvenanceEvent::new(
            "R1:late",
            Some("R1:W"),
            "R1",
            EventPayload::Error {
                message: "late".to_string(),
            },
        );
        let late_item = ProvenanceEvent::new(
            "R1:late-item",
            Some("R1:W"),
            "R1",
            EventPayload::BoundaryDataItem(BoundaryItem {
                port_name: "Y".to_string(),
                direction: PortDirection::Output,
                index: IterationVector::root(),
                value: Some("stale".to_string()),
                is_list: false,
            }),
        );
        recorder.try_record(&late_error).await.unwrap();
        recorder.try_record(&late_item).await.unwrap();

        assert_eq!(recorder.active_runs(), 0);
        let y = PortRef::new("wf-W", "W", "Y", PortDirection::Output);
        let bindings = store.port_bindings("R1", &y).await.unwrap();
        assert_eq!(values(&bindings), vec![(IterationVector::root(), Some("v1".to_string()))]);
    }

    #[tokio::test]
    async fn test_failed_final_write_still_releases_run() {
        let store = Arc::new(FailingStore::default());
        let recorder = EventRecorder::new(store.clone());
        let mut events = identity_run("R1");
        let end = events.pop().unwrap();
        replay(&recorder, &events).await;
        assert_eq!(recorder.active_runs(), 1);

        store.fail_writes.store(true, Ordering::SeqCst);
        let error = recorder.try_record(&end).await.unwrap_err();

        assert!(matches!(error, RecorderError::Storage(_)));
        assert_eq!(recorder.active_runs(), 0);
    }

    #[tokio::test]
    async fn test_failed_reconciliation_still_releases_run() {
        let store = Arc::new(FailingStore::default());
        let recorder = EventRecorder::new(store.clone());
        let mut events = identity_run("R1");
        let end = events.pop().unwrap();
        replay(&recorder, &events).await;

        store.fail_structure_reads.store(true, Ordering::SeqCst);
        let error = recorder.try_record(&end).await.unwrap_err();

        assert!(matches!(error, RecorderError::Storage(_)));
        assert_eq!(recorder.active_runs(), 0);
        // materialization landed before reconciliation failed
        let invocations = store.invocations("R1").await.unwrap();
        assert!(invocations.iter().all(|i| i.completed));
    }

    #[tokio::test]
    async fn test_out_of_range_boundary_index_is_dropped() {
        let (store, recorder) = recorder();
        let mut events = identity_run("R1");
        let end = events.pop().unwrap();
        let process = end.parent_id.clone().unwrap();
        events.push(ProvenanceEvent::new(
            "R1:Z:far",
            Some(&process),
            "R1",
            EventPayload::BoundaryDataItem(BoundaryItem {
                port_name: "Z".to_string(),
                direction: PortDirection::Output,
                index: IterationVector::new(vec![4_000_000_000]),
                value: Some("far".to_string()),
                is_list: false,
            }),
        ));
        events.push(end);
        replay(&recorder, &events).await;

        let z = PortRef::new("wf-W", "W", "Z", PortDirection::Output);
        assert!(store.port_bindings("R1", &z).await.unwrap().is_empty());
        assert!(store.collections("R1", &z).await.unwrap().is_empty());
        assert_eq!(recorder.active_runs(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_runs_do_not_interfere() {
        let (store, recorder) = recorder();
        let recorder = Arc::new(recorder);

        let mut handles = Vec::new();
        for i in 0..8 {
            let recorder = recorder.clone();
            handles.push(tokio::spawn(async move {
                let run_id = format!("R{}", i);
                for event in identity_run(&run_id) {
                    recorder.record(&event).await;
                }
                run_id
            }));
        }

        let out = PortRef::new("wf-W", "Proc1", "out", PortDirection::Output);
        for handle in handles {
            let run_id = handle.await.unwrap();
            let bindings = store.port_bindings(&run_id, &out).await.unwrap();
            assert_eq!(bindings.len(), 1);
            assert_eq!(bindings[0].run_id, run_id);
        }
        assert_eq!(store.processors("wf-W").await.unwrap().len(), 1);
        assert_eq!(recorder.active_runs(), 0);
    }
}
