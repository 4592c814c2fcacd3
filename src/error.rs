//! Engine error types.

use thiserror::Error;

use crate::history::StoreError;

/// Errors reported by the execution engine's mutating operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No loan was selected for the test run.
    #[error("no loan selected: a test run requires a loan")]
    MissingLoan,

    /// A borrower-level test was requested without a borrower.
    #[error("no borrower selected: a borrower-level test requires a borrower")]
    MissingBorrower,

    /// The workflow definition has no steps to run.
    #[error("workflow definition has no steps")]
    EmptyDefinition,

    /// An operation required an execution record but none exists.
    #[error("no execution record: start a run first")]
    NoExecution,

    /// The referenced step number is not part of the execution.
    #[error("step {0} not found in the current execution")]
    StepNotFound(u32),

    /// Rerun was requested without the destructive-operation confirmation.
    #[error("rerun from step {0} not confirmed: recorded step data would be cleared")]
    RerunNotConfirmed(u32),

    /// A manually edited output payload failed to parse.
    #[error("edited output is not valid JSON: {source}")]
    InvalidOutput {
        #[source]
        source: serde_json::Error,
    },

    /// The history store failed to persist the record.
    #[error("failed to persist execution history")]
    Persistence(#[from] StoreError),
}
