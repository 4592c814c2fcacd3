//! Workflow Execution Module
//!
//! Provides the execution engine that runs workflow definitions against
//! a test target: fixed-offset step scheduling, rerun-from-step,
//! accuracy tagging, and the per-run record model.
//!
//! # Architecture
//!
//! - [`engine`]: Scheduling, rerun, tagging, and the exposed facade
//! - [`record`]: Execution record and step state
//! - [`simulate`]: Per-node synthetic output generation

pub mod engine;
pub mod record;
pub mod simulate;

pub use engine::Engine;
pub use record::{AccuracyStatus, ExecutionRecord, ExecutionStatus, ExecutionStep, RunTarget};
pub use simulate::{OutputGenerator, StepOutcome, SyntheticGenerator};
