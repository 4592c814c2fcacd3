//! Execution Record Data Model
//!
//! Mutable state for one test run: the run itself, its steps, the
//! append-only console log, and the per-run analytics snapshot.
//! Records serialize with the camelCase field names used by the
//! persisted history blob.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::EngineError;
use crate::workflow::model::{NodeType, WorkflowDefinition};

/// Lifecycle status shared by runs and steps.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    /// Waiting for its scheduled start
    Pending,
    /// Currently executing
    Running,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Failed,
}

/// Result of a manual accuracy review. Absence means unverified.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccuracyStatus {
    Correct,
    Incorrect,
}

impl std::fmt::Display for AccuracyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            AccuracyStatus::Correct => "correct",
            AccuracyStatus::Incorrect => "incorrect",
        })
    }
}

/// Token counts for one step invocation.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
}

impl TokenUsage {
    /// Total tokens across input and output.
    pub fn total(&self) -> u64 {
        self.input + self.output
    }
}

/// The subject a run executes against.
///
/// A borrower-level target always carries its loan, so the pairing
/// invariant holds by construction.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "testType")]
pub enum RunTarget {
    #[serde(rename = "loan", rename_all = "camelCase")]
    Loan { loan_id: u64 },
    #[serde(rename = "borrower", rename_all = "camelCase")]
    Borrower { loan_id: u64, borrower_id: u64 },
}

impl RunTarget {
    /// Builds a loan-level target from a raw UI selection.
    pub fn for_loan(loan_id: Option<u64>) -> Result<Self, EngineError> {
        let loan_id = loan_id.ok_or(EngineError::MissingLoan)?;
        Ok(RunTarget::Loan { loan_id })
    }

    /// Builds a borrower-level target from a raw UI selection.
    pub fn for_borrower(
        loan_id: Option<u64>,
        borrower_id: Option<u64>,
    ) -> Result<Self, EngineError> {
        let loan_id = loan_id.ok_or(EngineError::MissingLoan)?;
        let borrower_id = borrower_id.ok_or(EngineError::MissingBorrower)?;
        Ok(RunTarget::Borrower {
            loan_id,
            borrower_id,
        })
    }

    /// The loan this target runs against.
    pub fn loan_id(&self) -> u64 {
        match *self {
            RunTarget::Loan { loan_id } => loan_id,
            RunTarget::Borrower { loan_id, .. } => loan_id,
        }
    }

    /// The borrower, when the target is borrower-level.
    pub fn borrower_id(&self) -> Option<u64> {
        match *self {
            RunTarget::Loan { .. } => None,
            RunTarget::Borrower { borrower_id, .. } => Some(borrower_id),
        }
    }

    /// Test level as shown in logs ("loan" or "borrower").
    pub fn level(&self) -> &'static str {
        match self {
            RunTarget::Loan { .. } => "loan",
            RunTarget::Borrower { .. } => "borrower",
        }
    }
}

/// One stage of a run, tied to a definition entry by position.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStep {
    /// 1-based position, matching the workflow definition
    pub step_number: u32,

    /// Step name from the definition
    pub step_name: String,

    /// Processing category, drives synthetic output shape
    pub node_type: NodeType,

    pub status: ExecutionStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,

    /// Simulated processing duration, set only on completion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,

    /// Opaque structured input payload
    pub input_data: Value,

    /// Output payload, absent until completed or manually edited
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_data: Option<Value>,

    /// Error detail for a failed step (contract for a real pipeline;
    /// the synthetic generator never populates it)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub tokens: TokenUsage,

    /// Dollar cost derived from token usage, zero while pending
    pub cost: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy_status: Option<AccuracyStatus>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
}

impl ExecutionStep {
    /// Creates a pending step for a definition entry.
    pub fn pending(step_number: u32, step_name: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            step_number,
            step_name: step_name.into(),
            node_type,
            status: ExecutionStatus::Pending,
            start_time: None,
            end_time: None,
            duration_seconds: None,
            input_data: json!({
                "placeholder": "Input data will be populated during execution"
            }),
            output_data: None,
            error: None,
            tokens: TokenUsage::default(),
            cost: 0.0,
            accuracy_status: None,
            verified_at: None,
        }
    }

    /// Clears all recorded execution data, returning the step to its
    /// pending defaults. Accuracy review data is not execution data and
    /// survives a reset.
    pub fn reset(&mut self) {
        self.status = ExecutionStatus::Pending;
        self.start_time = None;
        self.end_time = None;
        self.duration_seconds = None;
        self.output_data = None;
        self.error = None;
        self.tokens = TokenUsage::default();
        self.cost = 0.0;
    }

    /// Returns true once the step has finished successfully.
    pub fn is_completed(&self) -> bool {
        self.status == ExecutionStatus::Completed
    }
}

/// Analytics entry for one completed step.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepAnalytics {
    pub step_number: u32,
    pub step_name: String,
    pub tokens: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: f64,
    pub duration: f64,
}

/// Per-run analytics snapshot, recomputed after every step completion.
///
/// Only completed steps contribute; pending and failed steps are
/// excluded from the breakdown rather than zero-filled.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionAnalytics {
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_cost: f64,
    pub total_duration: f64,
    pub step_breakdown: Vec<StepAnalytics>,
}

impl ExecutionAnalytics {
    /// Computes the snapshot from a run's step array.
    pub fn from_steps(steps: &[ExecutionStep]) -> Self {
        let mut analytics = Self::default();

        for step in steps.iter().filter(|s| s.is_completed()) {
            let duration = step.duration_seconds.unwrap_or(0.0);

            analytics.total_input_tokens += step.tokens.input;
            analytics.total_output_tokens += step.tokens.output;
            analytics.total_cost += step.cost;
            analytics.total_duration += duration;

            analytics.step_breakdown.push(StepAnalytics {
                step_number: step.step_number,
                step_name: step.step_name.clone(),
                tokens: step.tokens.total(),
                input_tokens: step.tokens.input,
                output_tokens: step.tokens.output,
                cost: step.cost,
                duration,
            });
        }

        analytics
    }
}

/// One instantiation of a workflow definition against a test target.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    /// Opaque unique id
    pub id: String,

    pub workflow_id: u64,
    pub workflow_name: String,

    #[serde(flatten)]
    pub target: RunTarget,

    pub status: ExecutionStatus,

    pub start_time: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,

    /// Sum of completed steps' durations, finalized at run completion
    pub total_duration_seconds: f64,

    /// One step per definition entry, same ordering
    pub steps: Vec<ExecutionStep>,

    pub analytics: ExecutionAnalytics,

    /// Append-only audit trail of the run
    pub console_logs: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_accuracy: Option<AccuracyStatus>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
}

impl ExecutionRecord {
    /// Creates a record for a fresh run: all steps pending, run status
    /// running. No timers have fired yet.
    pub fn new(definition: &WorkflowDefinition, target: RunTarget) -> Self {
        let steps = definition
            .steps
            .iter()
            .enumerate()
            .map(|(index, descriptor)| {
                ExecutionStep::pending(
                    index as u32 + 1,
                    descriptor.step_name.clone(),
                    descriptor.node_type,
                )
            })
            .collect();

        Self {
            id: generate_execution_id(),
            workflow_id: definition.workflow_id,
            workflow_name: definition.workflow_name.clone(),
            target,
            status: ExecutionStatus::Running,
            start_time: Utc::now(),
            end_time: None,
            total_duration_seconds: 0.0,
            steps,
            analytics: ExecutionAnalytics::default(),
            console_logs: Vec::new(),
            execution_accuracy: None,
            verified_at: None,
        }
    }

    /// Appends a timestamped line to the console log.
    pub fn log(&mut self, message: impl AsRef<str>) {
        let timestamp = Local::now().format("%H:%M:%S");
        self.console_logs
            .push(format!("[{}] {}", timestamp, message.as_ref()));
    }

    /// Returns the step with the given 1-based number.
    pub fn step(&self, step_number: u32) -> Option<&ExecutionStep> {
        self.steps.iter().find(|s| s.step_number == step_number)
    }

    /// Mutable access to the step with the given 1-based number.
    pub fn step_mut(&mut self, step_number: u32) -> Option<&mut ExecutionStep> {
        self.steps.iter_mut().find(|s| s.step_number == step_number)
    }

    /// Recomputes the analytics snapshot from the current step array.
    pub fn refresh_analytics(&mut self) {
        self.analytics = ExecutionAnalytics::from_steps(&self.steps);
    }

    /// Marks the run completed: stamps the end time and finalizes the
    /// total duration as the sum of all recorded step durations.
    pub fn complete(&mut self) {
        self.status = ExecutionStatus::Completed;
        self.end_time = Some(Utc::now());
        self.total_duration_seconds = self
            .steps
            .iter()
            .filter_map(|s| s.duration_seconds)
            .sum();
    }

    /// Resets every step with `step_number >= from` to pending defaults
    /// and puts the run back into the running state. Steps before the
    /// cut keep their recorded data untouched.
    pub fn reset_from(&mut self, from: u32) {
        for step in self.steps.iter_mut().filter(|s| s.step_number >= from) {
            step.reset();
        }
        self.status = ExecutionStatus::Running;
        self.end_time = None;
    }
}

/// Generates an opaque execution id.
///
/// Millisecond timestamp plus a random suffix so ids stay unique even
/// under a paused test clock.
fn generate_execution_id() -> String {
    format!(
        "exec-{}-{:04x}",
        Utc::now().timestamp_millis(),
        rand::random::<u16>()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::model::WorkflowDefinition;

    fn demo_record() -> ExecutionRecord {
        let definition = WorkflowDefinition::income_verification_demo();
        ExecutionRecord::new(&definition, RunTarget::Loan { loan_id: 42 })
    }

    fn complete_step(step: &mut ExecutionStep, input: u64, output: u64, duration: f64) {
        step.status = ExecutionStatus::Completed;
        step.start_time = Some(Utc::now());
        step.end_time = Some(Utc::now());
        step.duration_seconds = Some(duration);
        step.tokens = TokenUsage { input, output };
        step.cost = (input as f64 * 0.03 + output as f64 * 0.06) / 1000.0;
        step.output_data = Some(json!({"ok": true}));
    }

    #[test]
    fn test_new_record_all_steps_pending_run_running() {
        let record = demo_record();

        assert_eq!(record.status, ExecutionStatus::Running);
        assert_eq!(record.steps.len(), 4);
        assert!(record
            .steps
            .iter()
            .all(|s| s.status == ExecutionStatus::Pending));
        assert!(record.steps.iter().all(|s| s.output_data.is_none()));
        assert!(record.end_time.is_none());
    }

    #[test]
    fn test_step_numbers_contiguous_ascending() {
        let record = demo_record();
        let numbers: Vec<u32> = record.steps.iter().map(|s| s.step_number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_run_target_validation() {
        assert!(matches!(
            RunTarget::for_loan(None),
            Err(EngineError::MissingLoan)
        ));
        assert!(matches!(
            RunTarget::for_borrower(Some(7), None),
            Err(EngineError::MissingBorrower)
        ));

        let target = RunTarget::for_borrower(Some(7), Some(2)).unwrap();
        assert_eq!(target.loan_id(), 7);
        assert_eq!(target.borrower_id(), Some(2));
        assert_eq!(target.level(), "borrower");
    }

    #[test]
    fn test_target_serializes_with_test_type_tag() {
        let loan = serde_json::to_value(RunTarget::Loan { loan_id: 42 }).unwrap();
        assert_eq!(loan["testType"], "loan");
        assert_eq!(loan["loanId"], 42);
        assert!(loan.get("borrowerId").is_none());

        let borrower = serde_json::to_value(RunTarget::Borrower {
            loan_id: 7,
            borrower_id: 1,
        })
        .unwrap();
        assert_eq!(borrower["testType"], "borrower");
        assert_eq!(borrower["borrowerId"], 1);
    }

    #[test]
    fn test_analytics_exclude_pending_steps() {
        let mut record = demo_record();
        complete_step(record.step_mut(1).unwrap(), 100, 200, 2.5);
        complete_step(record.step_mut(2).unwrap(), 150, 300, 3.0);
        record.refresh_analytics();

        assert_eq!(record.analytics.step_breakdown.len(), 2);
        assert_eq!(record.analytics.total_input_tokens, 250);
        assert_eq!(record.analytics.total_output_tokens, 500);
        assert!((record.analytics.total_duration - 5.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_analytics_total_cost_is_step_sum() {
        let mut record = demo_record();
        for n in 1..=4 {
            complete_step(record.step_mut(n).unwrap(), 120, 240, 2.0);
        }
        record.refresh_analytics();

        let step_sum: f64 = record.steps.iter().map(|s| s.cost).sum();
        assert!((record.analytics.total_cost - step_sum).abs() < 1e-12);
        assert_eq!(record.analytics.step_breakdown.len(), 4);
    }

    #[test]
    fn test_complete_sums_step_durations() {
        let mut record = demo_record();
        for n in 1..=4 {
            complete_step(record.step_mut(n).unwrap(), 100, 200, 2.0);
        }
        record.complete();

        assert_eq!(record.status, ExecutionStatus::Completed);
        assert!(record.end_time.is_some());
        assert!((record.total_duration_seconds - 8.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_reset_from_leaves_prefix_untouched() {
        let mut record = demo_record();
        for n in 1..=4 {
            complete_step(record.step_mut(n).unwrap(), 100, 200, 2.0);
        }
        record.complete();

        let step_two_before = record.step(2).unwrap().clone();
        record.reset_from(3);

        assert_eq!(*record.step(2).unwrap(), step_two_before);
        assert_eq!(record.step(3).unwrap().status, ExecutionStatus::Pending);
        assert_eq!(record.step(4).unwrap().status, ExecutionStatus::Pending);
        assert!(record.step(3).unwrap().output_data.is_none());
        assert_eq!(record.step(4).unwrap().tokens, TokenUsage::default());
        assert_eq!(record.status, ExecutionStatus::Running);
        assert!(record.end_time.is_none());
    }

    #[test]
    fn test_reset_keeps_accuracy_review() {
        let mut record = demo_record();
        complete_step(record.step_mut(3).unwrap(), 100, 200, 2.0);
        record.step_mut(3).unwrap().accuracy_status = Some(AccuracyStatus::Incorrect);

        record.reset_from(3);

        assert_eq!(
            record.step(3).unwrap().accuracy_status,
            Some(AccuracyStatus::Incorrect)
        );
    }

    #[test]
    fn test_console_log_appends_timestamped_lines() {
        let mut record = demo_record();
        record.log("Starting execution for loan level test...");
        record.log("Workflow: Income Verification Workflow");

        assert_eq!(record.console_logs.len(), 2);
        assert!(record.console_logs[0].starts_with('['));
        assert!(record.console_logs[0].contains("Starting execution"));
    }

    #[test]
    fn test_execution_ids_unique() {
        let a = demo_record();
        let b = demo_record();
        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("exec-"));
    }

    #[test]
    fn test_record_serialization_roundtrip() {
        let mut record = demo_record();
        complete_step(record.step_mut(1).unwrap(), 100, 200, 2.5);
        record.refresh_analytics();
        record.log("line");

        let json = serde_json::to_string_pretty(&record).unwrap();
        let loaded: ExecutionRecord = serde_json::from_str(&json).unwrap();

        assert_eq!(loaded, record);
        assert!(json.contains("\"loanId\""));
        assert!(json.contains("\"testType\""));
        assert!(json.contains("\"stepNumber\""));
    }
}
