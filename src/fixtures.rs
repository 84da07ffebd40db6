// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Shared test fixtures: hand-built structure snapshots and recorded event streams.

use std::collections::BTreeMap;

use crate::events::{
    ActivityDescription, BoundaryItem, DataValue, DatalinkDescription, EventPayload,
    LinkEndpoint, PortDescription, ProcessorDescription, ProvenanceEvent, WorkflowDescription,
};
use crate::graph::StructureSnapshot;
use crate::schema::{Datalink, IterationVector, Port, PortDirection, Processor, Workflow};

/// Deterministic port id used by [`SnapshotBuilder`]
pub fn port_id(workflow: &str, owner: &str, port: &str, direction: PortDirection) -> String {
    format!("{}/{}.{}/{}", workflow, owner, port, direction)
}

/// Deterministic boundary port id used by [`SnapshotBuilder`]
pub fn boundary_id(workflow: &str, port: &str, direction: PortDirection) -> String {
    format!("{}/@{}/{}", workflow, port, direction)
}

/// Builds a [`StructureSnapshot`] without going through the recorder.
pub struct SnapshotBuilder {
    top: String,
    workflows: Vec<Workflow>,
    processors: Vec<Processor>,
    ports: Vec<Port>,
    links: Vec<Datalink>,
}

impl SnapshotBuilder {
    pub fn new(top_id: &str, top_name: &str) -> Self {
        Self {
            top: top_id.to_string(),
            workflows: vec![Workflow {
                id: top_id.to_string(),
                parent_id: None,
                name: top_name.to_string(),
            }],
            processors: Vec::new(),
            ports: Vec::new(),
            links: Vec::new(),
        }
    }

    fn workflow_name(&self, workflow_id: &str) -> String {
        self.workflows
            .iter()
            .find(|w| w.id == workflow_id)
            .map(|w| w.name.clone())
            .unwrap_or_else(|| workflow_id.to_string())
    }

    pub fn workflow(mut self, id: &str, name: &str, parent: &str) -> Self {
        self.workflows.push(Workflow {
            id: id.to_string(),
            parent_id: Some(parent.to_string()),
            name: name.to_string(),
        });
        self
    }

    pub fn boundary(self, workflow: &str, name: &str, direction: PortDirection) -> Self {
        self.boundary_with_depth(workflow, name, direction, 0)
    }

    pub fn boundary_with_depth(
        mut self,
        workflow: &str,
        name: &str,
        direction: PortDirection,
        depth: u32,
    ) -> Self {
        let order = self
            .ports
            .iter()
            .filter(|p| p.workflow_id == workflow && p.processor_id.is_none())
            .count() as u32;
        self.ports.push(Port {
            id: boundary_id(workflow, name, direction),
            processor_id: None,
            processor_name: self.workflow_name(workflow),
            workflow_id: workflow.to_string(),
            name: name.to_string(),
            direction,
            declared_depth: depth,
            resolved_depth: None,
            iteration_strategy_order: order,
        });
        self
    }

    pub fn processor(self, workflow: &str, name: &str, inputs: &[&str], outputs: &[&str]) -> Self {
        let inputs: Vec<(&str, u32)> = inputs.iter().map(|n| (*n, 0)).collect();
        let outputs: Vec<(&str, u32)> = outputs.iter().map(|n| (*n, 0)).collect();
        self.processor_with_depths(workflow, name, &inputs, &outputs)
    }

    pub fn processor_with_depths(
        self,
        workflow: &str,
        name: &str,
        inputs: &[(&str, u32)],
        outputs: &[(&str, u32)],
    ) -> Self {
        self.add_processor(workflow, name, None, inputs, outputs)
    }

    /// A processor invoking `nested_id`, with bridging links to the nested
    /// workflow's same-named boundary ports
    pub fn nested(
        mut self,
        workflow: &str,
        name: &str,
        nested_id: &str,
        inputs: &[&str],
        outputs: &[&str],
    ) -> Self {
        let in_depths: Vec<(&str, u32)> = inputs.iter().map(|n| (*n, 0)).collect();
        let out_depths: Vec<(&str, u32)> = outputs.iter().map(|n| (*n, 0)).collect();
        self = self.add_processor(workflow, name, Some(nested_id), &in_depths, &out_depths);
        for input in inputs {
            self = self.link_ids(
                nested_id,
                &port_id(workflow, name, input, PortDirection::Input),
                &boundary_id(nested_id, input, PortDirection::Input),
            );
        }
        for output in outputs {
            self = self.link_ids(
                nested_id,
                &boundary_id(nested_id, output, PortDirection::Output),
                &port_id(workflow, name, output, PortDirection::Output),
            );
        }
        self
    }

    fn add_processor(
        mut self,
        workflow: &str,
        name: &str,
        nested_id: Option<&str>,
        inputs: &[(&str, u32)],
        outputs: &[(&str, u32)],
    ) -> Self {
        let processor_id = format!("{}/{}", workflow, name);
        let top_level = workflow == self.top;
        self.processors.push(Processor {
            id: processor_id.clone(),
            name: name.to_string(),
            workflow_id: workflow.to_string(),
            first_activity: if nested_id.is_some() {
                "dataflow".to_string()
            } else {
                "beanshell".to_string()
            },
            nested_workflow_id: nested_id.map(str::to_string),
            top_level,
        });
        for (direction, ports) in [
            (PortDirection::Input, inputs),
            (PortDirection::Output, outputs),
        ] {
            for (order, (port, depth)) in ports.iter().enumerate() {
                self.ports.push(Port {
                    id: port_id(workflow, name, port, direction),
                    processor_id: Some(processor_id.clone()),
                    processor_name: name.to_string(),
                    workflow_id: workflow.to_string(),
                    name: port.to_string(),
                    direction,
                    declared_depth: *depth,
                    resolved_depth: None,
                    iteration_strategy_order: order as u32,
                });
            }
        }
        self
    }

    /// Link inside `scope`: sources resolve to a processor output or a
    /// boundary input, sinks to a processor input or a boundary output
    pub fn link(self, scope: &str, source: (&str, &str), sink: (&str, &str)) -> Self {
        let source_id = self.resolve(scope, source, PortDirection::Output);
        let sink_id = self.resolve(scope, sink, PortDirection::Input);
        self.link_ids(scope, &source_id, &sink_id)
    }

    fn resolve(&self, scope: &str, (owner, port): (&str, &str), processor_side: PortDirection) -> String {
        let candidate = port_id(scope, owner, port, processor_side);
        if self.ports.iter().any(|p| p.id == candidate) {
            return candidate;
        }
        let boundary_side = match processor_side {
            PortDirection::Output => PortDirection::Input,
            PortDirection::Input => PortDirection::Output,
        };
        boundary_id(scope, port, boundary_side)
    }

    pub fn link_ids(mut self, scope: &str, source_id: &str, sink_id: &str) -> Self {
        let index = self.links.len();
        self.links.push(Datalink {
            id: format!("link-{:03}", index),
            workflow_id: scope.to_string(),
            source_port_id: source_id.to_string(),
            sink_port_id: sink_id.to_string(),
        });
        self
    }

    pub fn build(self) -> StructureSnapshot {
        StructureSnapshot::from_parts(
            &self.top,
            self.workflows,
            self.processors,
            self.ports,
            self.links,
        )
    }
}

fn ports(names: &[&str]) -> Vec<PortDescription> {
    names
        .iter()
        .map(|name| PortDescription {
            name: name.to_string(),
            depth: 0,
        })
        .collect()
}

/// `W`: boundary input `X` -> `Proc1.in`, `Proc1.out` -> boundary output `Y`
pub fn identity_workflow() -> WorkflowDescription {
    WorkflowDescription {
        id: "wf-W".to_string(),
        name: "W".to_string(),
        inputs: ports(&["X"]),
        outputs: ports(&["Y"]),
        processors: vec![ProcessorDescription {
            name: "Proc1".to_string(),
            activity: ActivityDescription {
                classifier: "beanshell".to_string(),
                nested: None,
            },
            inputs: ports(&["in"]),
            outputs: ports(&["out"]),
        }],
        datalinks: vec![
            DatalinkDescription {
                source: LinkEndpoint::Workflow {
                    port: "X".to_string(),
                },
                sink: LinkEndpoint::Processor {
                    processor: "Proc1".to_string(),
                    port: "in".to_string(),
                },
            },
            DatalinkDescription {
                source: LinkEndpoint::Processor {
                    processor: "Proc1".to_string(),
                    port: "out".to_string(),
                },
                sink: LinkEndpoint::Workflow {
                    port: "Y".to_string(),
                },
            },
        ],
    }
}

/// `Outer`: `A` -> nested `Inner` (running `Echo`) -> boundary output `result`
pub fn nested_workflow() -> WorkflowDescription {
    let inner = WorkflowDescription {
        id: "wf-inner".to_string(),
        name: "InnerFlow".to_string(),
        inputs: ports(&["x"]),
        outputs: ports(&["y"]),
        processors: vec![ProcessorDescription {
            name: "Echo".to_string(),
            activity: ActivityDescription {
                classifier: "beanshell".to_string(),
                nested: None,
            },
            inputs: ports(&["in"]),
            outputs: ports(&["out"]),
        }],
        datalinks: vec![
            DatalinkDescription {
                source: LinkEndpoint::Workflow {
                    port: "x".to_string(),
                },
                sink: LinkEndpoint::Processor {
                    processor: "Echo".to_string(),
                    port: "in".to_string(),
                },
            },
            DatalinkDescription {
                source: LinkEndpoint::Processor {
                    processor: "Echo".to_string(),
                    port: "out".to_string(),
                },
                sink: LinkEndpoint::Workflow {
                    port: "y".to_string(),
                },
            },
        ],
    };

    WorkflowDescription {
        id: "wf-outer".to_string(),
        name: "Outer".to_string(),
        inputs: ports(&["seed"]),
        outputs: ports(&["result"]),
        processors: vec![
            ProcessorDescription {
                name: "A".to_string(),
                activity: ActivityDescription {
                    classifier: "beanshell".to_string(),
                    nested: None,
                },
                inputs: ports(&["in"]),
                outputs: ports(&["out"]),
            },
            ProcessorDescription {
                name: "Inner".to_string(),
                activity: ActivityDescription {
                    classifier: "dataflow".to_string(),
                    nested: Some(Box::new(inner)),
                },
                inputs: ports(&["x"]),
                outputs: ports(&["y"]),
            },
        ],
        datalinks: vec![
            DatalinkDescription {
                source: LinkEndpoint::Workflow {
                    port: "seed".to_string(),
                },
                sink: LinkEndpoint::Processor {
                    processor: "A".to_string(),
                    port: "in".to_string(),
                },
            },
            DatalinkDescription {
                source: LinkEndpoint::Processor {
                    processor: "A".to_string(),
                    port: "out".to_string(),
                },
                sink: LinkEndpoint::Processor {
                    processor: "Inner".to_string(),
                    port: "x".to_string(),
                },
            },
            DatalinkDescription {
                source: LinkEndpoint::Processor {
                    processor: "Inner".to_string(),
                    port: "y".to_string(),
                },
                sink: LinkEndpoint::Workflow {
                    port: "result".to_string(),
                },
            },
        ],
    }
}

fn values(pairs: &[(&str, DataValue)]) -> Option<BTreeMap<String, DataValue>> {
    Some(
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect(),
    )
}

/// Full event stream of run `R1` over [`identity_workflow`], binding `X = v1`
/// and `Y = v1` through `Proc1` at iteration `[]`.
pub fn identity_run(run_id: &str) -> Vec<ProvenanceEvent> {
    let process = format!("{}:W", run_id);
    let processor = format!("{}:W:Proc1", run_id);
    let activity = format!("{}:W:Proc1:act", run_id);
    let job = format!("{}:W:Proc1:i0", run_id);

    vec![
        ProvenanceEvent::new(
            format!("{}:structure", run_id),
            None,
            run_id,
            EventPayload::WorkflowStructure {
                workflow: identity_workflow(),
            },
        ),
        ProvenanceEvent::new(
            process.clone(),
            None,
            run_id,
            EventPayload::ProcessSpanStart {
                workflow_id: "wf-W".to_string(),
            },
        ),
        ProvenanceEvent::new(
            processor.clone(),
            Some(&process),
            run_id,
            EventPayload::ProcessorSpanStart {
                processor_name: "Proc1".to_string(),
            },
        ),
        ProvenanceEvent::new(
            activity.clone(),
            Some(&processor),
            run_id,
            EventPayload::ActivitySpanStart {
                activity: "beanshell".to_string(),
            },
        ),
        ProvenanceEvent::new(
            job.clone(),
            Some(&activity),
            run_id,
            EventPayload::InvocationStarted {
                iteration: IterationVector::root(),
            },
        ),
        ProvenanceEvent::new(
            job.clone(),
            Some(&activity),
            run_id,
            EventPayload::IterationCompleted {
                iteration: IterationVector::root(),
                inputs: values(&[("in", DataValue::atomic("v1"))]),
                outputs: None,
                started: None,
                ended: None,
            },
        ),
        ProvenanceEvent::new(
            job,
            Some(&activity),
            run_id,
            EventPayload::IterationCompleted {
                iteration: IterationVector::root(),
                inputs: None,
                outputs: values(&[("out", DataValue::atomic("v1"))]),
                started: None,
                ended: None,
            },
        ),
        ProvenanceEvent::new(
            format!("{}:X:item", run_id),
            Some(&process),
            run_id,
            EventPayload::BoundaryDataItem(BoundaryItem {
                port_name: "X".to_string(),
                direction: PortDirection::Input,
                index: IterationVector::root(),
                value: Some("v1".to_string()),
                is_list: false,
            }),
        ),
        ProvenanceEvent::new(
            format!("{}:Y:item", run_id),
            Some(&process),
            run_id,
            EventPayload::BoundaryDataItem(BoundaryItem {
                port_name: "Y".to_string(),
                direction: PortDirection::Output,
                index: IterationVector::root(),
                value: Some("v1".to_string()),
                is_list: false,
            }),
        ),
        ProvenanceEvent::new(
            format!("{}:end", run_id),
            Some(&process),
            run_id,
            EventPayload::EndWorkflow,
        ),
    ]
}

fn event(identifier: &str, parent: Option<&str>, run_id: &str, payload: EventPayload) -> ProvenanceEvent {
    ProvenanceEvent::new(identifier, parent, run_id, payload)
}

fn boundary_item(
    identifier: String,
    process: &str,
    run_id: &str,
    port: &str,
    direction: PortDirection,
    value: &str,
) -> ProvenanceEvent {
    event(
        &identifier,
        Some(process),
        run_id,
        EventPayload::BoundaryDataItem(BoundaryItem {
            port_name: port.to_string(),
            direction,
            index: IterationVector::root(),
            value: Some(value.to_string()),
            is_list: false,
        }),
    )
}

/// Spans for one processor invocation at `[]`: processor, activity and job,
/// followed by the job's completion events
fn processor_spans(
    run_id: &str,
    parent: &str,
    name: &str,
    inputs: &[(&str, DataValue)],
    outputs: &[(&str, DataValue)],
) -> (String, Vec<ProvenanceEvent>) {
    let processor = format!("{}:{}", parent, name);
    let activity = format!("{}:act", processor);
    let job = format!("{}:i0", processor);
    let completed = |inputs: Option<BTreeMap<String, DataValue>>,
                     outputs: Option<BTreeMap<String, DataValue>>| EventPayload::IterationCompleted {
        iteration: IterationVector::root(),
        inputs,
        outputs,
        started: None,
        ended: None,
    };

    let mut events = vec![
        event(
            &processor,
            Some(parent),
            run_id,
            EventPayload::ProcessorSpanStart {
                processor_name: name.to_string(),
            },
        ),
        event(
            &activity,
            Some(&processor),
            run_id,
            EventPayload::ActivitySpanStart {
                activity: "beanshell".to_string(),
            },
        ),
        event(
            &job,
            Some(&activity),
            run_id,
            EventPayload::InvocationStarted {
                iteration: IterationVector::root(),
            },
        ),
    ];
    if !inputs.is_empty() {
        events.push(event(&job, Some(&activity), run_id, completed(values(inputs), None)));
    }
    if !outputs.is_empty() {
        events.push(event(&job, Some(&activity), run_id, completed(None, values(outputs))));
    }
    (job, events)
}

/// Full event stream over [`nested_workflow`]: `seed = s1`, `A` maps it to
/// `a1`, the nested `Echo` maps `a1` to `e1`, `result = e1`.
pub fn nested_run(run_id: &str) -> Vec<ProvenanceEvent> {
    let outer = format!("{}:Outer", run_id);
    let mut events = vec![
        event(
            &format!("{}:structure", run_id),
            None,
            run_id,
            EventPayload::WorkflowStructure {
                workflow: nested_workflow(),
            },
        ),
        event(
            &outer,
            None,
            run_id,
            EventPayload::ProcessSpanStart {
                workflow_id: "wf-outer".to_string(),
            },
        ),
    ];

    let (_, a) = processor_spans(
        run_id,
        &outer,
        "A",
        &[("in", DataValue::atomic("s1"))],
        &[("out", DataValue::atomic("a1"))],
    );
    events.extend(a);

    let (inner_job, mut inner) = processor_spans(
        run_id,
        &outer,
        "Inner",
        &[("x", DataValue::atomic("a1"))],
        &[],
    );
    let inner_activity = format!("{}:Inner:act", outer);
    events.append(&mut inner);

    let nested = format!("{}:InnerFlow", inner_job);
    events.push(event(
        &nested,
        Some(&inner_job),
        run_id,
        EventPayload::ProcessSpanStart {
            workflow_id: "wf-inner".to_string(),
        },
    ));
    let (_, echo) = processor_spans(
        run_id,
        &nested,
        "Echo",
        &[("in", DataValue::atomic("a1"))],
        &[("out", DataValue::atomic("e1"))],
    );
    events.extend(echo);
    events.push(boundary_item(format!("{}:x", nested), &nested, run_id, "x", PortDirection::Input, "a1"));
    events.push(boundary_item(format!("{}:y", nested), &nested, run_id, "y", PortDirection::Output, "e1"));
    events.push(event(&format!("{}:end", nested), Some(&nested), run_id, EventPayload::EndWorkflow));

    events.push(event(
        &inner_job,
        Some(&inner_activity),
        run_id,
        EventPayload::IterationCompleted {
            iteration: IterationVector::root(),
            inputs: None,
            outputs: values(&[("y", DataValue::atomic("e1"))]),
            started: None,
            ended: None,
        },
    ));
    events.push(boundary_item(format!("{}:seed", outer), &outer, run_id, "seed", PortDirection::Input, "s1"));
    events.push(boundary_item(format!("{}:result", outer), &outer, run_id, "result", PortDirection::Output, "e1"));
    events.push(event(&format!("{}:end", outer), Some(&outer), run_id, EventPayload::EndWorkflow));
    events
}
