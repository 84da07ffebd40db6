// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use uuid::Uuid;

use crate::config::consts::TOP_COLLECTION;
use crate::events::DataValue;
use crate::schema::{
    Collection, IterationVector, PortBinding, PortRef, WriteBatch, WriteIntent, WriteMode,
};

/// Breaks a processor port value into `PortBinding` and `Collection` rows.
///
/// A list becomes one collection plus one recursive step per element, the
/// element's iteration being the list's iteration extended by its position.
pub struct ValueDecomposer<'a> {
    run_id: &'a str,
    port: &'a PortRef,
    port_id: Option<&'a str>,
}

impl<'a> ValueDecomposer<'a> {
    pub fn new(run_id: &'a str, port: &'a PortRef, port_id: Option<&'a str>) -> Self {
        Self {
            run_id,
            port,
            port_id,
        }
    }

    /// Push the rows for `value` bound at `iteration` and return the reference
    /// recorded for the whole value (a collection id for lists)
    pub fn decompose(
        &self,
        value: &DataValue,
        iteration: &IterationVector,
        batch: &mut WriteBatch,
    ) -> String {
        self.element(value, iteration, None, 1, batch)
    }

    fn element(
        &self,
        value: &DataValue,
        iteration: &IterationVector,
        parent: Option<&str>,
        position: u32,
        batch: &mut WriteBatch,
    ) -> String {
        match value {
            DataValue::List { reference, elements } => {
                let collection_id = reference
                    .clone()
                    .unwrap_or_else(|| Uuid::new_v4().to_string());
                batch.push(WriteIntent::Collection {
                    collection: Collection {
                        collection_id: collection_id.clone(),
                        parent_collection_id: parent.unwrap_or(TOP_COLLECTION).to_string(),
                        workflow_id: self.port.workflow_id.clone(),
                        processor_name: self.port.processor_name.clone(),
                        port_name: self.port.port_name.clone(),
                        is_input: self.port.is_input(),
                        run_id: self.run_id.to_string(),
                        iteration: iteration.clone(),
                        position: iteration.last().unwrap_or(0),
                    },
                    mode: WriteMode::Upsert,
                });
                for (i, element) in elements.iter().enumerate() {
                    let i = i as u32;
                    self.element(
                        element,
                        &iteration.child(i),
                        Some(&collection_id),
                        i + 1,
                        batch,
                    );
                }
                collection_id
            }
            DataValue::Atomic { reference }
            | DataValue::Error { reference }
            | DataValue::Reference { reference } => {
                if let Some(kind) = value.value_kind() {
                    batch.push(WriteIntent::PortBinding {
                        binding: PortBinding {
                            workflow_id: self.port.workflow_id.clone(),
                            processor_name: self.port.processor_name.clone(),
                            port_name: self.port.port_name.clone(),
                            port_id: self.port_id.map(str::to_string),
                            is_input: self.port.is_input(),
                            run_id: self.run_id.to_string(),
                            iteration: iteration.clone(),
                            value: Some(reference.clone()),
                            kind,
                            collection_id: parent.map(str::to_string),
                            position,
                        },
                        mode: WriteMode::Upsert,
                    });
                }
                reference.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{PortDirection, ValueKind};

    fn port() -> PortRef {
        PortRef::new("wf-W", "Proc1", "out", PortDirection::Output)
    }

    #[test]
    fn test_atomic_value_is_one_binding() {
        let port = port();
        let mut batch = WriteBatch::new();
        let reference = ValueDecomposer::new("R1", &port, Some("p-out")).decompose(
            &DataValue::atomic("v1"),
            &IterationVector::new(vec![2]),
            &mut batch,
        );

        assert_eq!(reference, "v1");
        let bindings: Vec<&PortBinding> = batch.port_bindings().collect();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].iteration, IterationVector::new(vec![2]));
        assert_eq!(bindings[0].kind, ValueKind::Atomic);
        assert_eq!(bindings[0].position, 1);
        assert!(bindings[0].collection_id.is_none());
        assert_eq!(bindings[0].port_id.as_deref(), Some("p-out"));
    }

    #[test]
    fn test_nested_list_extends_the_iteration() {
        let value = DataValue::list(
            "outer",
            vec![
                DataValue::list("inner", vec![DataValue::atomic("a"), DataValue::atomic("b")]),
                DataValue::Error {
                    reference: "err".into(),
                },
            ],
        );
        let port = port();
        let mut batch = WriteBatch::new();
        ValueDecomposer::new("R1", &port, None).decompose(
            &value,
            &IterationVector::new(vec![3]),
            &mut batch,
        );

        let collections: Vec<&Collection> = batch.collections().collect();
        assert_eq!(collections.len(), 2);
        assert_eq!(collections[0].parent_collection_id, TOP_COLLECTION);
        assert_eq!(collections[0].position, 3);
        assert_eq!(collections[1].parent_collection_id, "outer");
        assert_eq!(collections[1].iteration, IterationVector::new(vec![3, 0]));

        let bindings: Vec<&PortBinding> = batch.port_bindings().collect();
        assert_eq!(bindings.len(), 3);
        assert_eq!(bindings[1].iteration, IterationVector::new(vec![3, 0, 1]));
        assert_eq!(bindings[1].position, 2);
        assert_eq!(bindings[1].collection_id.as_deref(), Some("inner"));
        assert_eq!(bindings[2].kind, ValueKind::Error);
        assert_eq!(bindings[2].iteration, IterationVector::new(vec![3, 1]));
    }

    #[test]
    fn test_list_without_reference_gets_generated_id() {
        let port = port();
        let mut batch = WriteBatch::new();
        let id = ValueDecomposer::new("R1", &port, None).decompose(
            &DataValue::List {
                reference: None,
                elements: vec![],
            },
            &IterationVector::root(),
            &mut batch,
        );

        assert!(!id.is_empty());
        assert_eq!(batch.collections().next().unwrap().collection_id, id);
    }
}
