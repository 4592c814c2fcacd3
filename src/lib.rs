//! Flowbench - Workflow Testing Engine
//!
//! An execution core for testing document-processing workflows against
//! real loan data before they reach production. Runs a workflow
//! definition as a simulated multi-step pipeline, tracks per-step cost
//! and latency analytics, supports partial re-execution, and aggregates
//! accuracy statistics over a persisted run history.
//!
//! # Architecture
//!
//! The library is organized into four main modules:
//!
//! - [`workflow`]: Data structures and parsing for workflow definitions
//! - [`execution`]: Execution engine with fixed-offset step scheduling
//! - [`metrics`]: Accuracy and performance aggregation over history
//! - [`history`]: Persistence of past execution records
//!
//! # Example
//!
//! ```rust,no_run
//! use flowbench::execution::{Engine, RunTarget};
//! use flowbench::history::HistoryStore;
//! use flowbench::workflow::load_definition;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Load a definition exported by the editor
//!     let definition = load_definition("income_verification.yaml")?;
//!
//!     // Create the engine over the persisted history
//!     let engine = Engine::new(definition, HistoryStore::open(HistoryStore::default_path()));
//!
//!     // Run against loan 42 and wait for the simulated pipeline
//!     engine.start_execution(RunTarget::Loan { loan_id: 42 })?;
//!     engine.join().await;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod execution;
pub mod history;
pub mod metrics;
pub mod workflow;

// Re-export commonly used types
pub use error::EngineError;
pub use execution::engine::Engine;
pub use execution::record::{ExecutionRecord, RunTarget};
pub use workflow::model::{StepDescriptor, WorkflowDefinition};
pub use workflow::parser::load_definition;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "Flowbench";
