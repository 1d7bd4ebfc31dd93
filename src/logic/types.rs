//! Type definitions for per-family logic tables.
//!
//! These types support both TOML deserialization (for loading tables)
//! and JSON serialization (for handing tables to callers).

use serde::{Deserialize, Serialize};

// =============================================================================
// CONFIGURATION TYPES (loaded from TOML)
// =============================================================================

/// Root configuration loaded from logic_tables.toml.
#[derive(Debug, Clone, Deserialize)]
pub struct LogicTablesConfig {
    /// Version label of the table set, carried into logs for traceability
    #[serde(default)]
    pub version: Option<String>,
    /// One logic table per component family
    pub families: Vec<LogicTable>,
}

/// The ordered, weighted rule set that judges replacements for one family.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicTable {
    /// Stable family identifier (e.g., "mlcc")
    pub family_id: String,
    /// Human-readable family name (e.g., "Ceramic Capacitors")
    pub family_name: String,
    /// Broad category the family belongs to
    pub category: String,
    #[serde(default)]
    pub description: String,
    /// Case-insensitive substrings matched against vendor subcategory labels
    #[serde(default)]
    pub subcategory_patterns: Vec<String>,
    /// Questions an upstream dialogue may ask to inform application review rules
    #[serde(default)]
    pub context_questions: Vec<ContextQuestion>,
    pub rules: Vec<MatchingRule>,
}

impl LogicTable {
    /// Sum of all rule weights; the denominator of the match percentage.
    pub fn total_weight(&self) -> f64 {
        self.rules.iter().map(|r| r.weight).sum()
    }

    pub fn rule(&self, attribute_id: &str) -> Option<&MatchingRule> {
        self.rules.iter().find(|r| r.attribute_id == attribute_id)
    }
}

/// One attribute-level comparison policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingRule {
    /// Canonical attribute identifier (key into part parameters)
    pub attribute_id: String,
    /// Display name of the attribute
    pub attribute_name: String,
    /// Relative importance; normalized against the table total at scoring time
    pub weight: f64,
    /// Why this attribute matters when substituting parts
    #[serde(default)]
    pub engineering_reason: String,
    /// How source and candidate values are compared
    #[serde(flatten)]
    pub logic: LogicType,
}

/// Comparison policy of a rule. Each variant carries only what it needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "logic_type", rename_all = "snake_case")]
pub enum LogicType {
    /// Values must be exactly equal
    Identity,
    /// Values are ranked in a hierarchy; a stronger candidate is an upgrade
    IdentityUpgrade {
        /// Category labels, weakest first
        upgrade_hierarchy: Vec<String>,
    },
    /// Only constrains when the source requires the flag
    IdentityFlag,
    /// Numeric comparison against the source value
    Threshold { direction: ThresholdDirection },
    /// Physical/package constraint; defaults to `lte`
    Fit {
        #[serde(default)]
        direction: Option<ThresholdDirection>,
    },
    /// Always needs an engineer to confirm suitability
    ApplicationReview,
    /// Informational only, never blocks
    Operational,
}

impl LogicType {
    /// Wire label of the variant, matching the TOML tag.
    pub fn label(&self) -> &'static str {
        match self {
            LogicType::Identity => "identity",
            LogicType::IdentityUpgrade { .. } => "identity_upgrade",
            LogicType::IdentityFlag => "identity_flag",
            LogicType::Threshold { .. } => "threshold",
            LogicType::Fit { .. } => "fit",
            LogicType::ApplicationReview => "application_review",
            LogicType::Operational => "operational",
        }
    }
}

/// Direction of a numeric comparison, read as "candidate OP source".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdDirection {
    /// Candidate must be at least the source value
    Gte,
    /// Candidate must not exceed the source value
    Lte,
    /// Candidate range must contain the source range
    RangeSuperset,
}

/// A family-specific question whose answer informs application review rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextQuestion {
    pub question_id: String,
    pub prompt: String,
    /// Attributes whose review this answer informs
    #[serde(default)]
    pub attribute_ids: Vec<String>,
}
