//! Accuracy Aggregation
//!
//! Recomputes correctness rates over the full execution history. Rates
//! divide by verified (correct + incorrect) counts only; unverified
//! runs and steps never enter a denominator. An empty history yields
//! all-zero metrics.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::execution::record::{AccuracyStatus, ExecutionRecord};

/// Pooled step-level correctness counts across every run.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepAccuracyTotals {
    pub total_steps: usize,
    pub correct_steps: usize,
    pub incorrect_steps: usize,
    pub step_accuracy_rate: f64,
}

/// Correctness counts for one step number pooled across runs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepAccuracyBreakdown {
    pub step_number: u32,
    /// Step name from the first run encountered with this number
    pub step_name: String,
    pub correct_count: usize,
    pub incorrect_count: usize,
    pub total_runs: usize,
    pub accuracy_rate: f64,
}

/// Aggregate accuracy metrics, recomputed wholesale from history.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccuracyMetrics {
    pub total_runs: usize,
    pub correct_runs: usize,
    pub incorrect_runs: usize,
    pub unverified_runs: usize,
    /// correctRuns / (correctRuns + incorrectRuns) as a percentage
    pub accuracy_rate: f64,
    pub step_accuracy: StepAccuracyTotals,
    /// Per-step counts, sorted ascending by step number
    pub step_breakdown: Vec<StepAccuracyBreakdown>,
    /// Distinct loan ids across the history
    pub unique_loans: usize,
    /// Distinct (loan, borrower) pairs across the history
    pub unique_borrowers: usize,
}

/// Percentage of `correct` among verified entries; 0 when nothing is
/// verified.
fn verified_rate(correct: usize, incorrect: usize) -> f64 {
    let verified = correct + incorrect;
    if verified == 0 {
        0.0
    } else {
        correct as f64 / verified as f64 * 100.0
    }
}

impl AccuracyMetrics {
    /// Computes the metrics from the full history.
    pub fn compute(records: &[ExecutionRecord]) -> Self {
        let correct_runs = records
            .iter()
            .filter(|r| r.execution_accuracy == Some(AccuracyStatus::Correct))
            .count();
        let incorrect_runs = records
            .iter()
            .filter(|r| r.execution_accuracy == Some(AccuracyStatus::Incorrect))
            .count();
        let unverified_runs = records
            .iter()
            .filter(|r| r.execution_accuracy.is_none())
            .count();

        let mut step_totals = StepAccuracyTotals::default();
        for step in records.iter().flat_map(|r| r.steps.iter()) {
            step_totals.total_steps += 1;
            match step.accuracy_status {
                Some(AccuracyStatus::Correct) => step_totals.correct_steps += 1,
                Some(AccuracyStatus::Incorrect) => step_totals.incorrect_steps += 1,
                None => {}
            }
        }
        step_totals.step_accuracy_rate =
            verified_rate(step_totals.correct_steps, step_totals.incorrect_steps);

        let mut unique_loans = HashSet::new();
        let mut unique_borrowers = HashSet::new();
        for record in records {
            unique_loans.insert(record.target.loan_id());
            if let Some(borrower_id) = record.target.borrower_id() {
                unique_borrowers.insert((record.target.loan_id(), borrower_id));
            }
        }

        Self {
            total_runs: records.len(),
            correct_runs,
            incorrect_runs,
            unverified_runs,
            accuracy_rate: verified_rate(correct_runs, incorrect_runs),
            step_accuracy: step_totals,
            step_breakdown: step_breakdown(records),
            unique_loans: unique_loans.len(),
            unique_borrowers: unique_borrowers.len(),
        }
    }
}

/// Pools per-step counts across every run, keyed by step number.
fn step_breakdown(records: &[ExecutionRecord]) -> Vec<StepAccuracyBreakdown> {
    struct Tally {
        name: String,
        correct: usize,
        incorrect: usize,
        total: usize,
    }

    // BTreeMap keeps the breakdown sorted by step number
    let mut tallies: BTreeMap<u32, Tally> = BTreeMap::new();

    for record in records {
        for step in &record.steps {
            let tally = tallies.entry(step.step_number).or_insert_with(|| Tally {
                name: step.step_name.clone(),
                correct: 0,
                incorrect: 0,
                total: 0,
            });

            tally.total += 1;
            match step.accuracy_status {
                Some(AccuracyStatus::Correct) => tally.correct += 1,
                Some(AccuracyStatus::Incorrect) => tally.incorrect += 1,
                None => {}
            }
        }
    }

    tallies
        .into_iter()
        .map(|(step_number, tally)| StepAccuracyBreakdown {
            step_number,
            step_name: tally.name,
            correct_count: tally.correct,
            incorrect_count: tally.incorrect,
            total_runs: tally.total,
            accuracy_rate: verified_rate(tally.correct, tally.incorrect),
        })
        .collect()
}
