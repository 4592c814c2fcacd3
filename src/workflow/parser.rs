//! Workflow Definition Parser
//!
//! Handles loading workflow definitions from YAML files exported by the
//! visual editor. Structural rules of the step list (ordering of node
//! types, connector validity) are the editor's responsibility; this
//! loader only checks that the file parses.

use std::error::Error;
use std::fs;

use log::{debug, info};

use super::model::WorkflowDefinition;

/// Loads a workflow definition from a YAML file.
///
/// # Arguments
///
/// * `path` - Path to the definition YAML file
///
/// # Returns
///
/// * `Ok(WorkflowDefinition)` - Successfully loaded definition
/// * `Err` - Read or parse error
///
/// # Example
///
/// ```rust,no_run
/// use flowbench::workflow::load_definition;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let definition = load_definition("income_verification.yaml")?;
///     println!("Loaded {} steps", definition.len());
///     Ok(())
/// }
/// ```
pub fn load_definition(path: &str) -> Result<WorkflowDefinition, Box<dyn Error>> {
    info!("Loading workflow definition from: {}", path);

    let yaml_content = fs::read_to_string(path).map_err(|e| {
        format!(
            "Failed to read definition file '{}': {}. Check that the file exists and is readable.",
            path, e
        )
    })?;

    debug!("YAML content loaded ({} bytes)", yaml_content.len());

    let definition: WorkflowDefinition = serde_yaml::from_str(&yaml_content).map_err(|e| {
        format!(
            "Failed to parse workflow definition YAML: {}. Check the file format.",
            e
        )
    })?;

    info!(
        "Definition '{}' parsed: {} steps",
        definition.workflow_name,
        definition.len()
    );

    Ok(definition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::model::NodeType;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE_YAML: &str = "\
workflowId: 3
workflowName: Income Verification Workflow
steps:
  - stepName: Document Extraction
    nodeType: text-extraction
  - stepName: Income Calculation
    nodeType: insights-executor
  - stepName: Generate Output
    nodeType: output-generator
";

    fn write_temp_yaml(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_definition() {
        let file = write_temp_yaml(SAMPLE_YAML);
        let definition = load_definition(file.path().to_str().unwrap()).unwrap();

        assert_eq!(definition.workflow_id, 3);
        assert_eq!(definition.workflow_name, "Income Verification Workflow");
        assert_eq!(definition.len(), 3);
        assert_eq!(definition.steps[0].node_type, NodeType::TextExtraction);
        assert_eq!(definition.steps[2].node_type, NodeType::OutputGenerator);
    }

    #[test]
    fn test_load_definition_missing_file() {
        let result = load_definition("/nonexistent/definition.yaml");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Failed to read"));
    }

    #[test]
    fn test_load_definition_invalid_yaml() {
        let file = write_temp_yaml("steps: [not: valid: yaml: here");
        let result = load_definition(file.path().to_str().unwrap());

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("parse"));
    }

    #[test]
    fn test_load_definition_defaults_workflow_id() {
        let file = write_temp_yaml(
            "workflowName: No Id\nsteps:\n  - stepName: Only Step\n    nodeType: text-extraction\n",
        );
        let definition = load_definition(file.path().to_str().unwrap()).unwrap();

        assert_eq!(definition.workflow_id, 0);
        assert_eq!(definition.len(), 1);
    }

    #[test]
    fn test_load_definition_unknown_node_type() {
        let file = write_temp_yaml(
            "workflowName: Odd\nsteps:\n  - stepName: Mystery\n    nodeType: quantum-resolver\n",
        );
        let definition = load_definition(file.path().to_str().unwrap()).unwrap();

        assert_eq!(definition.steps[0].node_type, NodeType::Unknown);
    }
}
