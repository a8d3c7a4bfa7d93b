//! Seven-dimension scoring engine.
//!
//! Folds raw execution telemetry into seven orthogonal 0-100 quality scores
//! and a weighted aggregate:
//!
//! 1. FUNCTIONAL - task accuracy (CRM reward)
//! 2. DRIFT_ADAPTATION - success under schema drift
//! 3. TOKEN_EFFICIENCY - cost optimization
//! 4. QUERY_EFFICIENCY - database query optimization
//! 5. ERROR_RECOVERY - graceful failure handling
//! 6. TRAJECTORY_EFFICIENCY - optimal vs actual turns
//! 7. HALLUCINATION_RATE - invalid tool call tracking
//!
//! Each formula degrades piecewise-linearly rather than binarily so partial
//! credit reflects partial competence, with hard floors that keep any single
//! sub-metric from being gamed.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The seven evaluation dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScoreDimension {
    Functional,
    DriftAdaptation,
    TokenEfficiency,
    QueryEfficiency,
    ErrorRecovery,
    TrajectoryEfficiency,
    HallucinationRate,
}

impl ScoreDimension {
    pub const ALL: [ScoreDimension; 7] = [
        ScoreDimension::Functional,
        ScoreDimension::DriftAdaptation,
        ScoreDimension::TokenEfficiency,
        ScoreDimension::QueryEfficiency,
        ScoreDimension::ErrorRecovery,
        ScoreDimension::TrajectoryEfficiency,
        ScoreDimension::HallucinationRate,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ScoreDimension::Functional => "FUNCTIONAL",
            ScoreDimension::DriftAdaptation => "DRIFT_ADAPTATION",
            ScoreDimension::TokenEfficiency => "TOKEN_EFFICIENCY",
            ScoreDimension::QueryEfficiency => "QUERY_EFFICIENCY",
            ScoreDimension::ErrorRecovery => "ERROR_RECOVERY",
            ScoreDimension::TrajectoryEfficiency => "TRAJECTORY_EFFICIENCY",
            ScoreDimension::HallucinationRate => "HALLUCINATION_RATE",
        }
    }
}

impl fmt::Display for ScoreDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Terminal state of an agent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinalState {
    Completed,
    Partial,
    Failed,
    #[default]
    Unknown,
}

/// Score for a single dimension. Raw scores are clamped to [0, 100] at
/// construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionScore {
    pub dimension: ScoreDimension,
    pub raw_score: f64,
    pub weight: f64,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl DimensionScore {
    pub fn new(dimension: ScoreDimension, raw_score: f64, weight: f64) -> Self {
        Self {
            dimension,
            raw_score: raw_score.clamp(0.0, 100.0),
            weight,
            metadata: HashMap::new(),
        }
    }

    pub fn weighted_score(&self) -> f64 {
        self.raw_score * self.weight
    }
}

/// Complete evaluation result across all dimensions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub task_idx: String,
    pub task_name: String,
    pub dimension_scores: Vec<DimensionScore>,
}

impl EvaluationResult {
    /// Weighted average of all dimension scores; 0 when empty.
    pub fn total_score(&self) -> f64 {
        if self.dimension_scores.is_empty() {
            return 0.0;
        }

        let total_weighted: f64 = self.dimension_scores.iter().map(|d| d.weighted_score()).sum();
        let total_weights: f64 = self.dimension_scores.iter().map(|d| d.weight).sum();

        if total_weights > 0.0 {
            total_weighted / total_weights
        } else {
            0.0
        }
    }

    /// Raw scores keyed by dimension name.
    pub fn dimension_breakdown(&self) -> HashMap<String, f64> {
        self.dimension_scores
            .iter()
            .map(|d| (d.dimension.name().to_string(), d.raw_score))
            .collect()
    }
}

/// Metrics collected during agent execution. Assembled once per task by the
/// orchestrator and consumed exactly once by the scorer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentMetrics {
    // Task outcome
    pub task_completed: bool,
    pub crm_reward: f64,

    // Drift context
    pub drift_level: u8,
    pub drift_percentage: f64,

    // Token usage
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,

    // Query tracking
    pub queries_executed: u32,
    pub queries_failed: u32,

    // Error tracking
    pub errors_encountered: u32,
    pub errors_recovered: u32,
    pub final_state: FinalState,

    // Context rot
    pub rot_level: u8,

    // Trajectory efficiency
    pub optimal_turns: u32,
    pub actual_turns: u32,

    // Hallucination tracking
    pub total_tool_calls: u32,
    pub invalid_tool_calls: u32,
    pub malformed_tool_calls: u32,
}

/// Calculates seven-dimension scores from agent execution metrics. A pure
/// function over [`AgentMetrics`]; holds no mutable state.
#[derive(Debug, Clone)]
pub struct SevenDimensionScorer {
    weights: HashMap<ScoreDimension, f64>,
    token_budget: u64,
    query_budget: u32,
}

impl Default for SevenDimensionScorer {
    fn default() -> Self {
        let weights = HashMap::from([
            (ScoreDimension::Functional, 0.30),
            (ScoreDimension::DriftAdaptation, 0.20),
            (ScoreDimension::TokenEfficiency, 0.12),
            (ScoreDimension::QueryEfficiency, 0.12),
            (ScoreDimension::ErrorRecovery, 0.08),
            (ScoreDimension::TrajectoryEfficiency, 0.10),
            (ScoreDimension::HallucinationRate, 0.08),
        ]);

        Self {
            weights,
            token_budget: 10_000,
            query_budget: 20,
        }
    }
}

impl SevenDimensionScorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weights(mut self, weights: HashMap<ScoreDimension, f64>) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_token_budget(mut self, token_budget: u64) -> Self {
        self.token_budget = token_budget;
        self
    }

    pub fn with_query_budget(mut self, query_budget: u32) -> Self {
        self.query_budget = query_budget;
        self
    }

    fn weight(&self, dimension: ScoreDimension) -> f64 {
        self.weights.get(&dimension).copied().unwrap_or(1.0)
    }

    /// Calculate all seven dimension scores.
    pub fn score(
        &self,
        task_idx: impl Into<String>,
        task_name: impl Into<String>,
        metrics: &AgentMetrics,
    ) -> EvaluationResult {
        let dimension_scores = vec![
            self.score_functional(metrics),
            self.score_drift_adaptation(metrics),
            self.score_token_efficiency(metrics),
            self.score_query_efficiency(metrics),
            self.score_error_recovery(metrics),
            self.score_trajectory_efficiency(metrics),
            self.score_hallucination(metrics),
        ];

        EvaluationResult {
            task_idx: task_idx.into(),
            task_name: task_name.into(),
            dimension_scores,
        }
    }

    fn score_functional(&self, metrics: &AgentMetrics) -> DimensionScore {
        let mut raw_score = metrics.crm_reward * 100.0;
        // Partial credit for completing the loop even when the answer missed.
        if metrics.task_completed && metrics.crm_reward == 0.0 {
            raw_score = 30.0;
        }

        DimensionScore::new(
            ScoreDimension::Functional,
            raw_score,
            self.weight(ScoreDimension::Functional),
        )
    }

    fn score_drift_adaptation(&self, metrics: &AgentMetrics) -> DimensionScore {
        let base_score = if metrics.crm_reward == 1.0 { 100.0 } else { 0.0 };

        let drift_bonus = if metrics.drift_level > 0 && metrics.crm_reward == 1.0 {
            metrics.drift_level as f64 * 10.0
        } else {
            0.0
        };

        let drift_penalty = if metrics.drift_level > 0 && metrics.crm_reward == 0.0 {
            if metrics.task_completed {
                20.0
            } else {
                40.0
            }
        } else {
            0.0
        };

        DimensionScore::new(
            ScoreDimension::DriftAdaptation,
            base_score + drift_bonus - drift_penalty,
            self.weight(ScoreDimension::DriftAdaptation),
        )
    }

    fn score_token_efficiency(&self, metrics: &AgentMetrics) -> DimensionScore {
        let budget = self.token_budget as f64;
        let tokens = metrics.total_tokens as f64;

        let raw_score = if metrics.total_tokens == 0 {
            100.0
        } else if tokens <= budget {
            100.0 - (tokens / budget) * 40.0
        } else if tokens <= budget * 2.0 {
            60.0 - ((tokens - budget) / budget) * 30.0
        } else {
            30.0
        };

        DimensionScore::new(
            ScoreDimension::TokenEfficiency,
            raw_score,
            self.weight(ScoreDimension::TokenEfficiency),
        )
    }

    fn score_query_efficiency(&self, metrics: &AgentMetrics) -> DimensionScore {
        let raw_score = if metrics.queries_executed == 0 {
            100.0
        } else {
            let executed = metrics.queries_executed as f64;
            let budget = self.query_budget as f64;

            let count_score = if metrics.queries_executed <= self.query_budget {
                100.0 - (executed / budget) * 30.0
            } else {
                (70.0 - (executed - budget) * 5.0).max(30.0)
            };

            let failure_rate = metrics.queries_failed as f64 / executed;
            (count_score - failure_rate * 40.0).max(0.0)
        };

        DimensionScore::new(
            ScoreDimension::QueryEfficiency,
            raw_score,
            self.weight(ScoreDimension::QueryEfficiency),
        )
    }

    fn score_error_recovery(&self, metrics: &AgentMetrics) -> DimensionScore {
        let mut raw_score = 100.0;

        if metrics.errors_encountered > 0 {
            let unrecovered =
                metrics.errors_encountered as f64 - metrics.errors_recovered as f64;
            raw_score =
                (100.0 - unrecovered * 15.0 + metrics.errors_recovered as f64 * 5.0).max(0.0);
        }

        // A failed or partial terminal state caps recovery credit no matter
        // how many individual errors were handled.
        match metrics.final_state {
            FinalState::Failed => raw_score = raw_score.min(30.0),
            FinalState::Partial => raw_score = raw_score.min(60.0),
            FinalState::Completed | FinalState::Unknown => {}
        }

        DimensionScore::new(
            ScoreDimension::ErrorRecovery,
            raw_score,
            self.weight(ScoreDimension::ErrorRecovery),
        )
    }

    fn score_trajectory_efficiency(&self, metrics: &AgentMetrics) -> DimensionScore {
        let raw_score = if metrics.actual_turns == 0 {
            0.0
        } else if metrics.optimal_turns == 0 {
            // No optimal reference: fall back to a turn-count heuristic.
            let actual = metrics.actual_turns as f64;
            if metrics.task_completed {
                (100.0 - actual * 5.0).max(30.0)
            } else {
                (50.0 - actual * 2.0).max(0.0)
            }
        } else {
            let tes_ratio = metrics.optimal_turns as f64 / metrics.actual_turns as f64;
            (tes_ratio * 100.0).min(100.0)
        };

        DimensionScore::new(
            ScoreDimension::TrajectoryEfficiency,
            raw_score,
            self.weight(ScoreDimension::TrajectoryEfficiency),
        )
    }

    fn score_hallucination(&self, metrics: &AgentMetrics) -> DimensionScore {
        let raw_score = if metrics.total_tool_calls == 0 {
            80.0
        } else {
            let total = metrics.total_tool_calls as f64;
            let invalid_rate = metrics.invalid_tool_calls as f64 / total;
            let malformed_rate = metrics.malformed_tool_calls as f64 / total;
            let hallucination_rate = invalid_rate * 0.7 + malformed_rate * 0.3;

            if hallucination_rate == 0.0 {
                100.0
            } else if hallucination_rate < 0.05 {
                95.0 - hallucination_rate * 100.0
            } else if hallucination_rate < 0.15 {
                80.0 - (hallucination_rate - 0.05) * 200.0
            } else {
                (60.0 - hallucination_rate * 100.0).max(0.0)
            }
        };

        DimensionScore::new(
            ScoreDimension::HallucinationRate,
            raw_score,
            self.weight(ScoreDimension::HallucinationRate),
        )
    }
}
