pub mod entropy;
pub mod evaluator;
pub mod scorer;
pub mod task;

pub use entropy::{
    DriftLevel, DriftMapping, DriftType, EntropyEngine, EntropyMetrics, EntropySession,
    ParseLevelError, Record, RotLevel,
};
pub use evaluator::{AnswerEvaluator, Evaluation};
pub use scorer::{
    AgentMetrics, DimensionScore, EvaluationResult, FinalState, ScoreDimension,
    SevenDimensionScorer,
};
pub use task::{CrmTask, ParseMetricError, RewardMetric, TASK_CATEGORIES};

pub mod prelude {
    pub use crate::entropy::*;
    pub use crate::evaluator::*;
    pub use crate::scorer::*;
    pub use crate::task::*;
}
