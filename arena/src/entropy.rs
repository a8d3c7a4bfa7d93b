//! Entropy engine: schema drift and context rot.
//!
//! Adversarial perturbation generator for robustness benchmarking. Schema
//! drift renames database-like columns behind the agent's back; context rot
//! injects plausible distractor records into query results. All
//! transformations are driven by a per-session seeded RNG so a run can be
//! replayed byte-for-byte from its seed.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

/// A single row as returned by the CRM query layer.
pub type Record = serde_json::Map<String, Value>;

/// Raised when a level string from an external boundary does not name a
/// known intensity. Construction from the enums themselves cannot fail.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown entropy level: {0}")]
pub struct ParseLevelError(String);

/// Schema drift intensity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftLevel {
    None,
    Low,
    Medium,
    High,
}

impl DriftLevel {
    /// Fraction of a table's columns renamed at this level.
    pub fn percentage(self) -> f64 {
        match self {
            DriftLevel::None => 0.0,
            DriftLevel::Low => 0.10,
            DriftLevel::Medium => 0.30,
            DriftLevel::High => 0.50,
        }
    }

    /// Ordinal rank for telemetry records.
    pub fn ordinal(self) -> u8 {
        match self {
            DriftLevel::None => 0,
            DriftLevel::Low => 1,
            DriftLevel::Medium => 2,
            DriftLevel::High => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DriftLevel::None => "none",
            DriftLevel::Low => "low",
            DriftLevel::Medium => "medium",
            DriftLevel::High => "high",
        }
    }
}

impl fmt::Display for DriftLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DriftLevel {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(DriftLevel::None),
            "low" => Ok(DriftLevel::Low),
            "medium" => Ok(DriftLevel::Medium),
            "high" => Ok(DriftLevel::High),
            other => Err(ParseLevelError(other.to_string())),
        }
    }
}

/// Context rot intensity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotLevel {
    None,
    Low,
    Medium,
    High,
}

impl RotLevel {
    /// Fraction of distractor records injected relative to the result set.
    pub fn percentage(self) -> f64 {
        match self {
            RotLevel::None => 0.0,
            RotLevel::Low => 0.10,
            RotLevel::Medium => 0.25,
            RotLevel::High => 0.40,
        }
    }

    pub fn ordinal(self) -> u8 {
        match self {
            RotLevel::None => 0,
            RotLevel::Low => 1,
            RotLevel::Medium => 2,
            RotLevel::High => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RotLevel::None => "none",
            RotLevel::Low => "low",
            RotLevel::Medium => "medium",
            RotLevel::High => "high",
        }
    }
}

impl fmt::Display for RotLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RotLevel {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(RotLevel::None),
            "low" => Ok(RotLevel::Low),
            "medium" => Ok(RotLevel::Medium),
            "high" => Ok(RotLevel::High),
            other => Err(ParseLevelError(other.to_string())),
        }
    }
}

/// How a drifted column name was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftType {
    Synonym,
    DomainTerm,
    Abbreviation,
}

/// One column rename, recorded in session order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftMapping {
    pub table: String,
    pub original_column: String,
    pub drifted_column: String,
    pub drift_type: DriftType,
}

/// Append-only ledger of every transformation produced in one run.
#[derive(Debug, Clone, Serialize)]
pub struct EntropySession {
    pub session_id: String,
    pub drift_level: DriftLevel,
    pub rot_level: RotLevel,
    pub seed: u64,
    pub drift_mappings: Vec<DriftMapping>,
    pub created_at: DateTime<Utc>,
}

/// Read-only snapshot of accumulated entropy for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EntropyMetrics {
    pub drift_level: DriftLevel,
    pub rot_level: RotLevel,
    pub drift_percentage: f64,
    pub rot_percentage: f64,
    pub columns_drifted: usize,
}

// Root term -> rename candidates. Matched by first containing root term in
// table order, so "id" also catches foreign-key style names at high drift.
const SYNONYMS: &[(&str, &[&str])] = &[
    ("id", &["identifier", "key", "uid"]),
    ("name", &["title", "label", "displayname"]),
    ("email", &["emailaddress", "mail", "contact_email"]),
    ("phone", &["telephone", "phonenumber", "mobile"]),
    ("status", &["state", "condition", "statuscode"]),
    ("description", &["details", "summary", "desc"]),
    ("owner_id", &["assigned_to", "assignee", "agent_id"]),
    ("account_id", &["customer_id", "client_id", "company_id"]),
    ("case_number", &["ticket_number", "case_id", "incident_id"]),
    ("priority", &["urgency", "importance", "severity"]),
    ("amount", &["value", "total", "price"]),
    ("stage", &["phase", "step", "milestone"]),
];

// Terser alternatives layered over SYNONYMS at high drift.
const ABBREVIATIONS: &[(&str, &[&str])] = &[
    ("id", &["_id", "ref", "pk"]),
    ("name", &["nm", "disp", "lbl"]),
    ("email", &["em", "eaddr"]),
    ("status", &["st", "stat"]),
    ("description", &["desc", "dsc"]),
    ("owner_id", &["own", "o_id"]),
    ("amount", &["amt", "val"]),
    ("priority", &["pri", "urg"]),
];

/// Seeded perturbation generator scoped to one evaluation run.
///
/// The per-table drift cache guarantees a table's columns are renamed the
/// same way on every access within a session; `&mut self` receivers make a
/// single engine instance exclusive to one run at a time.
pub struct EntropyEngine {
    drift_level: DriftLevel,
    rot_level: RotLevel,
    seed: u64,
    rng: StdRng,
    session: EntropySession,
    drift_map: HashMap<String, HashMap<String, String>>,
    reverse_drift_map: HashMap<String, HashMap<String, String>>,
}

impl EntropyEngine {
    /// Create an engine with a generated seed. The seed is retrievable via
    /// [`EntropyEngine::seed`] for reproducibility logging.
    pub fn new(drift_level: DriftLevel, rot_level: RotLevel) -> Self {
        Self::with_seed(drift_level, rot_level, rand::random())
    }

    pub fn with_seed(drift_level: DriftLevel, rot_level: RotLevel, seed: u64) -> Self {
        let created_at = Utc::now();
        let session_id = generate_session_id(created_at, seed, drift_level, rot_level);

        info!(
            "EntropyEngine: drift={}, rot={}, seed={}, session={}",
            drift_level, rot_level, seed, session_id
        );

        Self {
            drift_level,
            rot_level,
            seed,
            rng: StdRng::seed_from_u64(seed),
            session: EntropySession {
                session_id,
                drift_level,
                rot_level,
                seed,
                drift_mappings: Vec::new(),
                created_at,
            },
            drift_map: HashMap::new(),
            reverse_drift_map: HashMap::new(),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn drift_level(&self) -> DriftLevel {
        self.drift_level
    }

    pub fn rot_level(&self) -> RotLevel {
        self.rot_level
    }

    pub fn session(&self) -> &EntropySession {
        &self.session
    }

    pub fn drift_percentage(&self) -> f64 {
        self.drift_level.percentage()
    }

    pub fn rot_percentage(&self) -> f64 {
        self.rot_level.percentage()
    }

    /// Apply schema drift to a table's columns, returning the full
    /// original -> drifted mapping. Idempotent per table within a session:
    /// the first call computes and caches, later calls return the cache.
    pub fn drift_schema(&mut self, table: &str, columns: &[String]) -> HashMap<String, String> {
        if self.drift_level == DriftLevel::None {
            return columns.iter().map(|c| (c.clone(), c.clone())).collect();
        }

        if let Some(cached) = self.drift_map.get(table) {
            return cached.clone();
        }

        let num_to_drift = ((columns.len() as f64 * self.drift_level.percentage()) as usize).max(1);

        // Foreign-key style columns are protected from drift except at
        // maximum adversarial intensity.
        let mut driftable: Vec<&String> = columns
            .iter()
            .filter(|c| !c.ends_with("_id") || self.drift_level == DriftLevel::High)
            .collect();
        if driftable.is_empty() {
            driftable = columns.iter().collect();
        }

        let count = num_to_drift.min(driftable.len());
        let selected: HashSet<&String> = driftable
            .choose_multiple(&mut self.rng, count)
            .copied()
            .collect();

        let drift_type = self.drift_type();
        let mut mapping = HashMap::with_capacity(columns.len());
        for col in columns {
            if selected.contains(col) {
                let drifted = self.drift_column_name(col);
                self.session.drift_mappings.push(DriftMapping {
                    table: table.to_string(),
                    original_column: col.clone(),
                    drifted_column: drifted.clone(),
                    drift_type,
                });
                mapping.insert(col.clone(), drifted);
            } else {
                mapping.insert(col.clone(), col.clone());
            }
        }

        let reverse: HashMap<String, String> = mapping
            .iter()
            .map(|(original, drifted)| (drifted.clone(), original.clone()))
            .collect();

        debug!(
            "Schema drift applied to '{}': {} of {} columns renamed",
            table,
            count,
            columns.len()
        );

        self.drift_map.insert(table.to_string(), mapping.clone());
        self.reverse_drift_map.insert(table.to_string(), reverse);
        mapping
    }

    /// Resolve a drifted column name back to its original, if the table has
    /// been drifted this session.
    pub fn reverse_lookup(&self, table: &str, drifted_column: &str) -> Option<&str> {
        self.reverse_drift_map
            .get(table)
            .and_then(|map| map.get(drifted_column))
            .map(String::as_str)
    }

    fn drift_column_name(&mut self, column: &str) -> String {
        let col_lower = column.to_lowercase();

        for &(root, synonyms) in SYNONYMS {
            if !col_lower.contains(root) {
                continue;
            }
            let alternatives: &[&str] = if self.drift_level == DriftLevel::High {
                ABBREVIATIONS
                    .iter()
                    .find(|(abbr_root, _)| *abbr_root == root)
                    .map(|&(_, alts)| alts)
                    .unwrap_or(synonyms)
            } else {
                synonyms
            };
            if let Some(pick) = alternatives.choose(&mut self.rng) {
                return (*pick).to_string();
            }
        }

        format!("{}_val", column)
    }

    fn drift_type(&self) -> DriftType {
        match self.drift_level {
            DriftLevel::None | DriftLevel::Low => DriftType::Synonym,
            DriftLevel::Medium => DriftType::DomainTerm,
            DriftLevel::High => DriftType::Abbreviation,
        }
    }

    /// Inject distractor records into a query result set. Returns the
    /// augmented records and the indices where distractors landed, in
    /// insertion order, so callers can verify downstream filtering without
    /// content matching.
    pub fn apply_context_rot(
        &mut self,
        table: &str,
        records: &[Record],
    ) -> (Vec<Record>, Vec<usize>) {
        if self.rot_level == RotLevel::None || records.is_empty() {
            return (records.to_vec(), Vec::new());
        }

        let num_distractors =
            ((records.len() as f64 * self.rot_level.percentage()) as usize).max(1);

        // Each distractor is an independent clone of a sampled template;
        // generated distractors never feed back into the template pool.
        let mut distractors = Vec::with_capacity(num_distractors);
        for _ in 0..num_distractors {
            let template = records[self.rng.gen_range(0..records.len())].clone();
            distractors.push(self.perturb_record(template));
        }

        let mut combined = records.to_vec();
        let mut distractor_indices = Vec::with_capacity(num_distractors);
        for distractor in distractors {
            let insert_pos = self.rng.gen_range(0..=combined.len());
            combined.insert(insert_pos, distractor);
            distractor_indices.push(insert_pos);
        }

        debug!(
            "Context rot applied to '{}': {} distractors injected into {} records",
            table,
            distractor_indices.len(),
            records.len()
        );

        (combined, distractor_indices)
    }

    fn perturb_record(&mut self, mut record: Record) -> Record {
        for value in record.values_mut() {
            if !value.is_number() {
                continue;
            }
            if self.rng.gen::<f64>() >= 0.3 {
                continue;
            }
            let factor = self.rng.gen_range(0.8..=1.2);
            if let Some(int) = value.as_i64() {
                *value = Value::from((int as f64 * factor) as i64);
            } else if let Some(uint) = value.as_u64() {
                *value = Value::from((uint as f64 * factor) as u64);
            } else if let Some(float) = value.as_f64() {
                if let Some(scaled) = serde_json::Number::from_f64(float * factor) {
                    *value = Value::Number(scaled);
                }
            }
        }
        record
    }

    pub fn metrics(&self) -> EntropyMetrics {
        EntropyMetrics {
            drift_level: self.drift_level,
            rot_level: self.rot_level,
            drift_percentage: self.drift_level.percentage(),
            rot_percentage: self.rot_level.percentage(),
            columns_drifted: self.session.drift_mappings.len(),
        }
    }
}

fn generate_session_id(
    created_at: DateTime<Utc>,
    seed: u64,
    drift: DriftLevel,
    rot: RotLevel,
) -> String {
    let data = format!("{}-{}-{}-{}", created_at.to_rfc3339(), seed, drift, rot);
    let digest = Sha256::digest(data.as_bytes());
    let mut hex = String::with_capacity(16);
    for byte in digest.iter().take(8) {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}
