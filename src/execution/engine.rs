//! Workflow Test Execution Engine
//!
//! The core engine that drives simulated runs of a workflow definition:
//! - Fixed-offset scheduling of step lifecycles on the tokio timer
//! - Full-run execution and suffix rerun ("rerun from step N")
//! - Accuracy tagging with one-way run-level propagation
//! - History persistence and wholesale metric recomputation
//!
//! # Timing contract
//!
//! Step *k* (0-indexed within a scheduled batch) enters the running
//! state `k * 3.5s` after the batch is scheduled, independent of whether
//! step *k-1* has finished; its completion fires a fixed `3s` after its
//! own start. Steps are therefore pinned to wall-clock offsets, not
//! chained by dependency. All transitions are deferred tasks against the
//! tokio clock, so tests drive them deterministically with a paused
//! runtime.
//!
//! Every scheduled batch is stamped with a generation number. A rerun
//! or a new run bumps the generation instead of cancelling in-flight
//! timers; a batch whose stamp no longer matches no-ops on wakeup, so a
//! superseded timer can never overwrite fresher state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use log::{debug, info};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

use crate::error::EngineError;
use crate::execution::record::{
    AccuracyStatus, ExecutionRecord, ExecutionStatus, RunTarget,
};
use crate::execution::simulate::{token_cost, OutputGenerator, SyntheticGenerator};
use crate::history::HistoryStore;
use crate::metrics::{AccuracyMetrics, Metrics, PerformanceAverages};
use crate::workflow::model::WorkflowDefinition;

/// Offset between consecutive step starts within a batch.
pub const STEP_START_INTERVAL: Duration = Duration::from_millis(3500);

/// Simulated processing delay between a step's start and completion.
pub const STEP_PROCESSING_DELAY: Duration = Duration::from_secs(3);

/// Poison-recovering lock. Engine state stays usable even if a task
/// panicked while holding the guard.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Workflow test execution engine.
///
/// Owns the single active execution record, the history store handle,
/// the output-generation strategy, and the cached aggregate metrics.
/// Accessors hand out clones; callers never share the live record.
///
/// # Example
///
/// ```rust,no_run
/// use flowbench::execution::Engine;
/// use flowbench::execution::record::RunTarget;
/// use flowbench::history::HistoryStore;
/// use flowbench::workflow::WorkflowDefinition;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let definition = WorkflowDefinition::income_verification_demo();
///     let history = HistoryStore::open(HistoryStore::default_path());
///     let engine = Engine::new(definition, history);
///
///     engine.start_execution(RunTarget::Loan { loan_id: 42 })?;
///     engine.join().await;
///     Ok(())
/// }
/// ```
pub struct Engine {
    definition: WorkflowDefinition,
    generator: Arc<dyn OutputGenerator>,
    current: Arc<Mutex<Option<ExecutionRecord>>>,
    history: Arc<Mutex<HistoryStore>>,
    metrics: Arc<Mutex<Metrics>>,
    generation: Arc<AtomicU64>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Engine {
    /// Creates an engine for a workflow definition, recomputing the
    /// aggregate metrics from whatever history the store loaded.
    pub fn new(definition: WorkflowDefinition, history: HistoryStore) -> Self {
        let metrics = Metrics::compute(history.records());

        Self {
            definition,
            generator: Arc::new(SyntheticGenerator),
            current: Arc::new(Mutex::new(None)),
            history: Arc::new(Mutex::new(history)),
            metrics: Arc::new(Mutex::new(metrics)),
            generation: Arc::new(AtomicU64::new(0)),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Replaces the synthetic generator with another strategy.
    pub fn with_generator(mut self, generator: Arc<dyn OutputGenerator>) -> Self {
        self.generator = generator;
        self
    }

    /// The definition this engine runs.
    pub fn definition(&self) -> &WorkflowDefinition {
        &self.definition
    }

    /// Starts a fresh run against the given target.
    ///
    /// The record is created with every step pending and the run status
    /// running; no timer has fired when this returns. Returns the new
    /// execution id.
    pub fn start_execution(&self, target: RunTarget) -> Result<String, EngineError> {
        if self.definition.is_empty() {
            return Err(EngineError::EmptyDefinition);
        }

        let mut record = ExecutionRecord::new(&self.definition, target);
        record.log(format!(
            "Starting execution for {} level test...",
            target.level()
        ));
        record.log(format!("Workflow: {}", record.workflow_name));
        record.log(format!("Loan: {}", target.loan_id()));

        let id = record.id.clone();
        info!(
            "Starting execution {} ({} steps, {} level)",
            id,
            record.steps.len(),
            target.level()
        );

        let generation = self.next_generation();
        *lock(&self.current) = Some(record);
        self.schedule_batch(1, generation, false);

        Ok(id)
    }

    /// Reruns the current execution from a step onwards.
    ///
    /// Destructive: recorded data for every step with number >= `from`
    /// is cleared, so the call requires `confirmed = true`. Declining
    /// leaves all state untouched. Steps before the cut keep their
    /// outputs; the reset suffix is rescheduled with suffix-relative
    /// offsets (first reset step starts immediately).
    pub fn rerun_from_step(&self, from: u32, confirmed: bool) -> Result<(), EngineError> {
        {
            let mut guard = lock(&self.current);
            let record = guard.as_mut().ok_or(EngineError::NoExecution)?;

            if record.step(from).is_none() {
                return Err(EngineError::StepNotFound(from));
            }
            if !confirmed {
                return Err(EngineError::RerunNotConfirmed(from));
            }

            record.reset_from(from);
            record.log(format!("Rerunning workflow from Step {}...", from));
        }

        info!("Rerunning execution from step {}", from);
        let generation = self.next_generation();
        self.schedule_batch(from, generation, true);

        Ok(())
    }

    /// Tags one step of the current execution as correct or incorrect.
    ///
    /// Marking a step incorrect force-sets the run's accuracy to
    /// incorrect as well, regardless of any prior run-level tag. The
    /// propagation is one-way: marking a step correct never clears an
    /// earlier incorrect marking. Persists the record and recomputes
    /// the aggregate metrics.
    pub fn mark_step_accuracy(
        &self,
        step_number: u32,
        status: AccuracyStatus,
    ) -> Result<(), EngineError> {
        let snapshot = {
            let mut guard = lock(&self.current);
            let record = guard.as_mut().ok_or(EngineError::NoExecution)?;

            let now = Utc::now();
            {
                let step = record
                    .step_mut(step_number)
                    .ok_or(EngineError::StepNotFound(step_number))?;
                step.accuracy_status = Some(status);
                step.verified_at = Some(now);
            }

            if status == AccuracyStatus::Incorrect {
                record.execution_accuracy = Some(AccuracyStatus::Incorrect);
                record.verified_at = Some(now);
                record.log(format!(
                    "Execution automatically marked as incorrect due to step {}",
                    step_number
                ));
            }

            record.log(format!("[Step {}] Marked as {}", step_number, status));
            record.clone()
        };

        info!("Step {} marked {}", step_number, status);
        self.persist_and_recompute(snapshot)
    }

    /// Tags the current execution as a whole. Does not touch any
    /// step-level status. Persists and recomputes metrics.
    pub fn mark_execution_accuracy(&self, status: AccuracyStatus) -> Result<(), EngineError> {
        let snapshot = {
            let mut guard = lock(&self.current);
            let record = guard.as_mut().ok_or(EngineError::NoExecution)?;

            record.execution_accuracy = Some(status);
            record.verified_at = Some(Utc::now());
            record.log(format!("Execution marked as {}", status));
            record.clone()
        };

        info!("Execution marked {}", status);
        self.persist_and_recompute(snapshot)
    }

    /// Replaces a step's output with a manually edited payload.
    ///
    /// The text must parse as JSON; on a parse error nothing is
    /// mutated. Editing does not persist and does not touch analytics.
    pub fn save_edited_output(&self, step_number: u32, json_text: &str) -> Result<(), EngineError> {
        let mut guard = lock(&self.current);
        let record = guard.as_mut().ok_or(EngineError::NoExecution)?;

        if record.step(step_number).is_none() {
            return Err(EngineError::StepNotFound(step_number));
        }

        let parsed = serde_json::from_str(json_text)
            .map_err(|source| EngineError::InvalidOutput { source })?;

        // step re-borrowed after the fallible parse so a failure leaves
        // the record untouched
        if let Some(step) = record.step_mut(step_number) {
            step.output_data = Some(parsed);
        }
        record.log(format!("[Step {}] Output manually edited", step_number));

        Ok(())
    }

    /// Snapshot of the active execution record, if any.
    pub fn current_execution(&self) -> Option<ExecutionRecord> {
        lock(&self.current).clone()
    }

    /// Snapshot of the persisted execution history.
    pub fn execution_history(&self) -> Vec<ExecutionRecord> {
        lock(&self.history).records().to_vec()
    }

    /// Latest aggregate accuracy metrics.
    pub fn accuracy_metrics(&self) -> AccuracyMetrics {
        lock(&self.metrics).accuracy.clone()
    }

    /// Latest aggregate performance averages.
    pub fn performance_averages(&self) -> PerformanceAverages {
        lock(&self.metrics).performance.clone()
    }

    /// Awaits every scheduled step task. Stale-generation tasks no-op
    /// and finish immediately; live ones drive the run to its terminal
    /// state (the paused-clock tests rely on this to advance virtual
    /// time).
    pub async fn join(&self) {
        let handles = std::mem::take(&mut *lock(&self.tasks));
        for handle in handles {
            let _ = handle.await;
        }
    }

    /// Bumps the batch generation, invalidating all in-flight timers.
    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Schedules the step lifecycles for steps `from..=last` at fixed
    /// offsets from now.
    fn schedule_batch(&self, from: u32, generation: u64, is_rerun: bool) {
        let last = self.definition.len() as u32;
        let mut tasks = lock(&self.tasks);

        for (offset_index, step_number) in (from..=last).enumerate() {
            let current = Arc::clone(&self.current);
            let generator = Arc::clone(&self.generator);
            let live_generation = Arc::clone(&self.generation);

            tasks.push(tokio::spawn(async move {
                sleep(STEP_START_INTERVAL * offset_index as u32).await;
                run_step_lifecycle(
                    current,
                    generator,
                    live_generation,
                    generation,
                    step_number,
                    last,
                    is_rerun,
                )
                .await;
            }));
        }
    }

    /// Persists a record snapshot (replace-by-id) and recomputes the
    /// cached metrics over the full history.
    fn persist_and_recompute(&self, snapshot: ExecutionRecord) -> Result<(), EngineError> {
        let mut history = lock(&self.history);
        history.append_or_replace(snapshot);
        history.save()?;

        *lock(&self.metrics) = Metrics::compute(history.records());
        Ok(())
    }
}

/// Drives one step through running -> completed against the shared
/// record. Both transitions re-check the batch generation and no-op if
/// a newer batch has superseded this one.
async fn run_step_lifecycle(
    current: Arc<Mutex<Option<ExecutionRecord>>>,
    generator: Arc<dyn OutputGenerator>,
    live_generation: Arc<AtomicU64>,
    generation: u64,
    step_number: u32,
    last_step: u32,
    is_rerun: bool,
) {
    // pending -> running
    let node_type = {
        let mut guard = lock(&current);
        if live_generation.load(Ordering::SeqCst) != generation {
            return;
        }
        let Some(record) = guard.as_mut() else {
            return;
        };
        let Some(step) = record.step_mut(step_number) else {
            return;
        };

        step.status = ExecutionStatus::Running;
        step.start_time = Some(Utc::now());
        let step_name = step.step_name.clone();
        let node_type = step.node_type;

        record.log(format!("[Step {}] Starting: {}", step_number, step_name));
        debug!("Step {} running: {}", step_number, step_name);
        node_type
    };

    sleep(STEP_PROCESSING_DELAY).await;

    // running -> completed
    let mut guard = lock(&current);
    if live_generation.load(Ordering::SeqCst) != generation {
        return;
    }
    let Some(record) = guard.as_mut() else {
        return;
    };

    let outcome = generator.generate(node_type);
    let step_name;
    {
        let Some(step) = record.step_mut(step_number) else {
            return;
        };
        step.status = ExecutionStatus::Completed;
        step.end_time = Some(Utc::now());
        step.duration_seconds = Some(outcome.duration_seconds);
        step.output_data = Some(outcome.output);
        step.tokens = outcome.tokens;
        step.cost = token_cost(&outcome.tokens);
        step_name = step.step_name.clone();
    }

    record.log(format!(
        "[Step {}] Completed: {} ({:.2}s)",
        step_number, step_name, outcome.duration_seconds
    ));
    record.log(format!(
        "  Tokens: {} in / {} out | Cost: ${:.4}",
        outcome.tokens.input,
        outcome.tokens.output,
        token_cost(&outcome.tokens)
    ));
    debug!("Step {} completed: {}", step_number, step_name);

    // last step by array position ends the run
    if step_number == last_step {
        record.complete();
        if is_rerun {
            record.log("Rerun completed successfully!");
        } else {
            record.log("Execution completed successfully!");
            record.log(format!(
                "Total duration: {:.2}s",
                record.total_duration_seconds
            ));
        }
        info!(
            "Execution {} completed in {:.2}s (simulated)",
            record.id, record.total_duration_seconds
        );
    }

    record.refresh_analytics();
}
