//! Workflow Definition Data Model
//!
//! Core data structures describing the pipeline under test. A definition
//! is produced by the visual editor and consumed read-only by the
//! execution engine; steps are keyed by their 1-based position.
//!
//! # Example YAML Format
//!
//! ```yaml
//! workflowId: 1
//! workflowName: Income Verification Workflow
//! steps:
//!   - stepName: Document Extraction
//!     nodeType: text-extraction
//!
//!   - stepName: Data Validation
//!     nodeType: insights-executor
//!
//!   - stepName: Generate Output
//!     nodeType: output-generator
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Category of processing a step performs.
///
/// Drives the shape of the synthetic output produced for the step.
/// Tags not recognized by this engine deserialize to [`NodeType::Unknown`].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum NodeType {
    /// Document/text extraction from source files
    TextExtraction,
    /// Analysis producing textual insights and a recommendation
    InsightsExecutor,
    /// Final decision payload generation
    OutputGenerator,
    /// Any node tag this engine does not recognize
    #[serde(other)]
    Unknown,
}

impl NodeType {
    /// Returns the wire tag for this node type.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::TextExtraction => "text-extraction",
            NodeType::InsightsExecutor => "insights-executor",
            NodeType::OutputGenerator => "output-generator",
            NodeType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a workflow definition.
///
/// The step number is implicit: position in the definition, 1-based.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepDescriptor {
    /// Human-readable step name shown in logs and breakdowns
    pub step_name: String,

    /// Processing category for this step
    pub node_type: NodeType,
}

impl StepDescriptor {
    /// Creates a new step descriptor.
    pub fn new(step_name: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            step_name: step_name.into().trim().to_string(),
            node_type,
        }
    }
}

/// An ordered workflow definition, as supplied by the editor.
///
/// Immutable for the duration of a run.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    /// Identifier of the workflow this definition was built from
    #[serde(default)]
    pub workflow_id: u64,

    /// Display name of the workflow
    pub workflow_name: String,

    /// Ordered step descriptors; step numbers follow position (1-based)
    pub steps: Vec<StepDescriptor>,
}

impl WorkflowDefinition {
    /// Creates a new empty definition.
    pub fn new(workflow_id: u64, workflow_name: impl Into<String>) -> Self {
        Self {
            workflow_id,
            workflow_name: workflow_name.into(),
            steps: Vec::new(),
        }
    }

    /// Appends a step to the definition.
    pub fn with_step(mut self, step_name: impl Into<String>, node_type: NodeType) -> Self {
        self.steps.push(StepDescriptor::new(step_name, node_type));
        self
    }

    /// Returns the descriptor for a 1-based step number.
    pub fn step(&self, step_number: usize) -> Option<&StepDescriptor> {
        if step_number == 0 {
            return None;
        }
        self.steps.get(step_number - 1)
    }

    /// Returns the number of steps in the definition.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if the definition has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The built-in income-verification demo pipeline.
    ///
    /// Used by the CLI when no definition file is supplied.
    pub fn income_verification_demo() -> Self {
        Self::new(1, "Income Verification Workflow")
            .with_step("Document Extraction", NodeType::TextExtraction)
            .with_step("Data Validation", NodeType::InsightsExecutor)
            .with_step("Income Calculation", NodeType::InsightsExecutor)
            .with_step("Generate Output", NodeType::OutputGenerator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definition_builder() {
        let definition = WorkflowDefinition::new(7, "Test Flow")
            .with_step("Extract", NodeType::TextExtraction)
            .with_step("Decide", NodeType::OutputGenerator);

        assert_eq!(definition.workflow_id, 7);
        assert_eq!(definition.len(), 2);
        assert_eq!(definition.steps[0].step_name, "Extract");
        assert_eq!(definition.steps[1].node_type, NodeType::OutputGenerator);
    }

    #[test]
    fn test_definition_step_lookup_is_one_based() {
        let definition = WorkflowDefinition::income_verification_demo();

        assert!(definition.step(0).is_none());
        assert_eq!(definition.step(1).unwrap().step_name, "Document Extraction");
        assert_eq!(definition.step(4).unwrap().step_name, "Generate Output");
        assert!(definition.step(5).is_none());
    }

    #[test]
    fn test_definition_empty() {
        let definition = WorkflowDefinition::new(1, "Empty");
        assert!(definition.is_empty());
        assert_eq!(definition.len(), 0);
    }

    #[test]
    fn test_node_type_wire_tags() {
        let parsed: NodeType = serde_yaml::from_str("text-extraction").unwrap();
        assert_eq!(parsed, NodeType::TextExtraction);

        let parsed: NodeType = serde_yaml::from_str("insights-executor").unwrap();
        assert_eq!(parsed, NodeType::InsightsExecutor);

        let json = serde_json::to_string(&NodeType::OutputGenerator).unwrap();
        assert_eq!(json, "\"output-generator\"");
    }

    #[test]
    fn test_node_type_unrecognized_tag() {
        let parsed: NodeType = serde_yaml::from_str("image-classifier").unwrap();
        assert_eq!(parsed, NodeType::Unknown);
    }

    #[test]
    fn test_step_descriptor_trims_name() {
        let step = StepDescriptor::new("  Extract  ", NodeType::TextExtraction);
        assert_eq!(step.step_name, "Extract");
    }

    #[test]
    fn test_demo_definition_shape() {
        let demo = WorkflowDefinition::income_verification_demo();
        assert_eq!(demo.len(), 4);
        assert_eq!(demo.steps[0].node_type, NodeType::TextExtraction);
        assert_eq!(demo.steps[3].node_type, NodeType::OutputGenerator);
    }
}
