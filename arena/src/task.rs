//! Task boundary value types.
//!
//! The dataset itself is an external collaborator; this module only fixes
//! the shape of a task as it crosses into the core, plus the answer-field
//! normalization the raw rows need.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Comparison policy used to grade an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardMetric {
    ExactMatch,
    FuzzyMatch,
    PrivacyRejection,
}

impl RewardMetric {
    pub fn as_str(self) -> &'static str {
        match self {
            RewardMetric::ExactMatch => "exact_match",
            RewardMetric::FuzzyMatch => "fuzzy_match",
            RewardMetric::PrivacyRejection => "privacy_rejection",
        }
    }
}

impl fmt::Display for RewardMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown reward metric: {0}")]
pub struct ParseMetricError(String);

impl FromStr for RewardMetric {
    type Err = ParseMetricError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exact_match" => Ok(RewardMetric::ExactMatch),
            "fuzzy_match" => Ok(RewardMetric::FuzzyMatch),
            "privacy_rejection" => Ok(RewardMetric::PrivacyRejection),
            other => Err(ParseMetricError(other.to_string())),
        }
    }
}

/// A single CRM evaluation task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrmTask {
    pub idx: String,
    pub query: String,
    pub answer: Vec<String>,
    pub task: String,
    pub reward_metric: RewardMetric,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub persona: String,
}

impl CrmTask {
    /// Context that must be shown to the agent.
    pub fn required_context(&self) -> &str {
        self.metadata.get("required").map(String::as_str).unwrap_or("")
    }

    /// Context that may be shown to the agent.
    pub fn optional_context(&self) -> &str {
        self.metadata.get("optional").map(String::as_str).unwrap_or("")
    }
}

/// The fixed task categories of the benchmark suite.
pub const TASK_CATEGORIES: [&str; 22] = [
    "activity_priority",
    "best_region_identification",
    "case_routing",
    "confidential_company_knowledge",
    "conversion_rate_comprehension",
    "handle_time",
    "internal_operation_data",
    "invalid_config",
    "knowledge_qa",
    "lead_qualification",
    "lead_routing",
    "monthly_trend_analysis",
    "named_entity_disambiguation",
    "policy_violation_identification",
    "private_customer_information",
    "quote_approval",
    "sales_amount_understanding",
    "sales_cycle_understanding",
    "sales_insight_mining",
    "top_issue_identification",
    "transfer_count",
    "wrong_stage_rectification",
];

/// Normalize a raw dataset answer field to the canonical answer list.
///
/// Rows encode answers inconsistently: JSON null, a JSON array (possibly
/// holding nulls), a string that itself encodes an array, or a bare scalar.
pub fn parse_answer(answer: &Value) -> Vec<String> {
    match answer {
        Value::Null => vec!["None".to_string()],
        Value::Array(items) => items.iter().map(answer_string).collect(),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Array(items)) => items.iter().map(answer_string).collect(),
            Ok(other) => vec![answer_string(&other)],
            Err(_) => vec![s.clone()],
        },
        other => vec![answer_string(other)],
    }
}

/// Render a JSON value as an answer string: nulls become "None", strings
/// drop their quotes, everything else keeps its JSON rendering.
pub(crate) fn answer_string(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reward_metric_parsing() {
        assert_eq!(
            "exact_match".parse::<RewardMetric>().unwrap(),
            RewardMetric::ExactMatch
        );
        assert_eq!(
            "privacy_rejection".parse::<RewardMetric>().unwrap(),
            RewardMetric::PrivacyRejection
        );
        assert!("cosine_similarity".parse::<RewardMetric>().is_err());
        assert_eq!(RewardMetric::FuzzyMatch.to_string(), "fuzzy_match");
    }

    #[test]
    fn test_parse_answer_null() {
        assert_eq!(parse_answer(&Value::Null), vec!["None"]);
    }

    #[test]
    fn test_parse_answer_array() {
        assert_eq!(parse_answer(&json!(["A", "B"])), vec!["A", "B"]);
        assert_eq!(parse_answer(&json!([null])), vec!["None"]);
        assert_eq!(parse_answer(&json!([1, 2])), vec!["1", "2"]);
    }

    #[test]
    fn test_parse_answer_encoded_array() {
        assert_eq!(parse_answer(&json!(r#"["A", "B"]"#)), vec!["A", "B"]);
        assert_eq!(parse_answer(&json!("42")), vec!["42"]);
    }

    #[test]
    fn test_parse_answer_plain_string() {
        assert_eq!(parse_answer(&json!("Acme Corp")), vec!["Acme Corp"]);
    }

    #[test]
    fn test_parse_answer_scalar() {
        assert_eq!(parse_answer(&json!(7)), vec!["7"]);
        assert_eq!(parse_answer(&json!(true)), vec!["true"]);
    }

    #[test]
    fn test_task_context_accessors() {
        let task = CrmTask {
            idx: "17".to_string(),
            query: "Which region has the highest conversion rate?".to_string(),
            answer: vec!["EMEA".to_string()],
            task: "best_region_identification".to_string(),
            reward_metric: RewardMetric::ExactMatch,
            metadata: HashMap::from([("required".to_string(), "leads table".to_string())]),
            persona: String::new(),
        };

        assert_eq!(task.required_context(), "leads table");
        assert_eq!(task.optional_context(), "");
        assert!(TASK_CATEGORIES.contains(&task.task.as_str()));
    }

    #[test]
    fn test_task_deserialization() {
        let json = r#"{
            "idx": "3",
            "query": "Route case 12345",
            "answer": ["Tier 2"],
            "task": "case_routing",
            "reward_metric": "exact_match"
        }"#;

        let task: CrmTask = serde_json::from_str(json).unwrap();
        assert_eq!(task.reward_metric, RewardMetric::ExactMatch);
        assert!(task.metadata.is_empty());
        assert!(task.persona.is_empty());
    }
}
