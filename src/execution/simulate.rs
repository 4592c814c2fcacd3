//! Step Output Simulation
//!
//! Synthesizes the result of a single step invocation: an output payload
//! shaped by the step's node type, token counts, and a simulated
//! processing duration. Generation is pure per call and does no timing;
//! scheduling is the engine's responsibility.
//!
//! The [`OutputGenerator`] trait is the seam where a production build
//! plugs in a real pipeline call in place of the synthetic generator.

use rand::Rng;
use serde_json::{json, Value};

use crate::execution::record::TokenUsage;
use crate::workflow::model::NodeType;

/// Dollar cost per 1K input tokens.
pub const INPUT_TOKEN_RATE: f64 = 0.03;

/// Dollar cost per 1K output tokens.
pub const OUTPUT_TOKEN_RATE: f64 = 0.06;

/// The synthesized result of one step invocation.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// Structured output payload, shape keyed by node type
    pub output: Value,
    /// Token usage attributed to the invocation
    pub tokens: TokenUsage,
    /// Simulated processing duration in seconds
    pub duration_seconds: f64,
}

impl StepOutcome {
    /// Dollar cost of this outcome's token usage.
    pub fn cost(&self) -> f64 {
        token_cost(&self.tokens)
    }
}

/// Cost of a token usage figure at the configured per-1K rates.
pub fn token_cost(tokens: &TokenUsage) -> f64 {
    (tokens.input as f64 * INPUT_TOKEN_RATE + tokens.output as f64 * OUTPUT_TOKEN_RATE) / 1000.0
}

/// Produces the result of a step invocation for a node type.
///
/// Implementations must be cheap and non-blocking; the engine calls
/// them from inside its scheduling tasks.
pub trait OutputGenerator: Send + Sync {
    fn generate(&self, node_type: NodeType) -> StepOutcome;
}

/// Default generator producing randomized synthetic results.
///
/// Token counts are uniform in [100,300) input and [200,600) output;
/// durations are uniform in [2,5) seconds.
#[derive(Debug, Default)]
pub struct SyntheticGenerator;

impl OutputGenerator for SyntheticGenerator {
    fn generate(&self, node_type: NodeType) -> StepOutcome {
        let mut rng = rand::thread_rng();

        let tokens = TokenUsage {
            input: rng.gen_range(100..300),
            output: rng.gen_range(200..600),
        };

        StepOutcome {
            output: synthetic_output(node_type),
            tokens,
            duration_seconds: rng.gen_range(2.0..5.0),
        }
    }
}

/// Builds the canned output payload for a node type.
fn synthetic_output(node_type: NodeType) -> Value {
    match node_type {
        NodeType::TextExtraction => json!({
            "documentType": "W2 Form",
            "extractedFields": {
                "employerName": "Acme Corporation",
                "employeeSSN": "***-**-1234",
                "wages": "85,000.00",
                "taxYear": "2023"
            },
            "confidence": 0.95
        }),
        NodeType::InsightsExecutor => json!({
            "insights": [
                "Total income from W2: $85,000",
                "Income verification status: Confirmed",
                "Employment stability: 5+ years"
            ],
            "riskLevel": "Low",
            "recommendation": "Approve"
        }),
        NodeType::OutputGenerator => json!({
            "finalDecision": "Approved",
            "approvedAmount": 450000,
            "interestRate": 6.5,
            "termYears": 30,
            "monthlyPayment": 2844.53
        }),
        NodeType::Unknown => json!({
            "message": "Processing completed"
        }),
    }
}
