//! Performance Aggregation
//!
//! Arithmetic means of token, cost, and duration totals across the full
//! execution history. An empty history yields all-zero averages.

use serde::{Deserialize, Serialize};

use crate::execution::record::ExecutionRecord;

/// Aggregate performance averages, recomputed wholesale from history.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceAverages {
    pub avg_tokens: f64,
    pub avg_input_tokens: f64,
    pub avg_output_tokens: f64,
    pub avg_cost: f64,
    pub avg_duration: f64,
    pub total_runs: usize,
}

impl PerformanceAverages {
    /// Computes the averages from the full history.
    pub fn compute(records: &[ExecutionRecord]) -> Self {
        if records.is_empty() {
            return Self::default();
        }

        let count = records.len() as f64;
        let avg_input_tokens = records
            .iter()
            .map(|r| r.analytics.total_input_tokens as f64)
            .sum::<f64>()
            / count;
        let avg_output_tokens = records
            .iter()
            .map(|r| r.analytics.total_output_tokens as f64)
            .sum::<f64>()
            / count;
        let avg_cost = records.iter().map(|r| r.analytics.total_cost).sum::<f64>() / count;
        let avg_duration = records
            .iter()
            .map(|r| r.analytics.total_duration)
            .sum::<f64>()
            / count;

        Self {
            avg_tokens: avg_input_tokens + avg_output_tokens,
            avg_input_tokens,
            avg_output_tokens,
            avg_cost,
            avg_duration,
            total_runs: records.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::record::RunTarget;
    use crate::workflow::model::WorkflowDefinition;

    fn run_with_totals(input: u64, output: u64, cost: f64, duration: f64) -> ExecutionRecord {
        let definition = WorkflowDefinition::income_verification_demo();
        let mut record =
            ExecutionRecord::new(&definition, RunTarget::Loan { loan_id: 1 });
        record.analytics.total_input_tokens = input;
        record.analytics.total_output_tokens = output;
        record.analytics.total_cost = cost;
        record.analytics.total_duration = duration;
        record
    }

    #[test]
    fn test_empty_history_is_all_zero() {
        let averages = PerformanceAverages::compute(&[]);
        assert_eq!(averages.total_runs, 0);
        assert_eq!(averages.avg_tokens, 0.0);
        assert_eq!(averages.avg_cost, 0.0);
        assert_eq!(averages.avg_duration, 0.0);
    }

    #[test]
    fn test_averages_over_two_runs() {
        let records = vec![
            run_with_totals(100, 200, 0.02, 8.0),
            run_with_totals(300, 400, 0.04, 12.0),
        ];

        let averages = PerformanceAverages::compute(&records);
        assert_eq!(averages.total_runs, 2);
        assert!((averages.avg_input_tokens - 200.0).abs() < f64::EPSILON);
        assert!((averages.avg_output_tokens - 300.0).abs() < f64::EPSILON);
        assert!((averages.avg_tokens - 500.0).abs() < f64::EPSILON);
        assert!((averages.avg_cost - 0.03).abs() < 1e-12);
        assert!((averages.avg_duration - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_single_run_average_equals_totals() {
        let records = vec![run_with_totals(500, 900, 0.069, 11.5)];
        let averages = PerformanceAverages::compute(&records);

        assert!((averages.avg_tokens - 1400.0).abs() < f64::EPSILON);
        assert!((averages.avg_cost - 0.069).abs() < 1e-12);
        assert_eq!(averages.total_runs, 1);
    }
}
