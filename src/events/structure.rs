// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! In-memory workflow description carried by a `workflow_structure` event.

use serde::{Deserialize, Serialize};

use crate::config::consts::DATAFLOW_ACTIVITY;

/// Static description of one (possibly nested) workflow.
///
/// # Example
/// ```yaml
/// id: wf-1
/// name: W
/// inputs:
///   - name: X
/// outputs:
///   - name: Y
/// processors:
///   - name: Proc1
///     activity:
///       classifier: beanshell
///     inputs:
///       - name: in
///     outputs:
///       - name: out
/// datalinks:
///   - source: { type: workflow, port: X }
///     sink: { type: processor, processor: Proc1, port: in }
///   - source: { type: processor, processor: Proc1, port: out }
///     sink: { type: workflow, port: Y }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDescription {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<PortDescription>,
    #[serde(default)]
    pub outputs: Vec<PortDescription>,
    #[serde(default)]
    pub processors: Vec<ProcessorDescription>,
    #[serde(default)]
    pub datalinks: Vec<DatalinkDescription>,
}

impl WorkflowDescription {
    /// Every workflow id in this description, depth-first
    pub fn workflow_ids(&self) -> Vec<&str> {
        let mut ids = vec![self.id.as_str()];
        for processor in &self.processors {
            if let Some(nested) = processor.nested_workflow() {
                ids.extend(nested.workflow_ids());
            }
        }
        ids
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDescription {
    pub name: String,
    /// Declared collection nesting depth
    #[serde(default)]
    pub depth: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorDescription {
    pub name: String,
    pub activity: ActivityDescription,
    #[serde(default)]
    pub inputs: Vec<PortDescription>,
    #[serde(default)]
    pub outputs: Vec<PortDescription>,
}

impl ProcessorDescription {
    /// The sub-workflow invoked by this processor, if its activity is a dataflow
    pub fn nested_workflow(&self) -> Option<&WorkflowDescription> {
        if self.activity.classifier == DATAFLOW_ACTIVITY {
            self.activity.nested.as_deref()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityDescription {
    pub classifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nested: Option<Box<WorkflowDescription>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatalinkDescription {
    pub source: LinkEndpoint,
    pub sink: LinkEndpoint,
}

/// One end of a datalink, addressed by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LinkEndpoint {
    Processor { processor: String, port: String },
    /// A boundary port of the enclosing workflow
    Workflow { port: String },
    /// Merge nodes have no port rows and never resolve
    Merge { name: String, port: String },
}

impl std::fmt::Display for LinkEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkEndpoint::Processor { processor, port } => write!(f, "{}.{}", processor, port),
            LinkEndpoint::Workflow { port } => write!(f, "<workflow>.{}", port),
            LinkEndpoint::Merge { name, port } => write!(f, "<merge {}>.{}", name, port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_nested_description() {
        let yaml = r#"
id: outer
name: Outer
inputs: [{ name: a }]
processors:
  - name: Inner
    activity:
      classifier: dataflow
      nested:
        id: inner
        name: InnerFlow
        inputs: [{ name: x, depth: 1 }]
  - name: Echo
    activity: { classifier: beanshell }
datalinks:
  - source: { type: workflow, port: a }
    sink: { type: processor, processor: Inner, port: x }
"#;
        let description: WorkflowDescription = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(description.workflow_ids(), vec!["outer", "inner"]);
        assert!(description.processors[0].nested_workflow().is_some());
        assert!(description.processors[1].nested_workflow().is_none());
        assert_eq!(
            description.processors[0].nested_workflow().unwrap().inputs[0].depth,
            1
        );
        assert_eq!(
            description.datalinks[0].sink,
            LinkEndpoint::Processor {
                processor: "Inner".into(),
                port: "x".into()
            }
        );
    }
}
