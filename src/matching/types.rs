//! Type definitions for cross-reference matching.
//!
//! Inputs arrive already mapped to canonical attribute ids by the
//! attribute-resolution layer; outputs are serialized to the calling service.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::value::is_missing_value;

// =============================================================================
// INPUT TYPES
// =============================================================================

/// Identifying summary of a part.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartSummary {
    /// Manufacturer part number
    pub mpn: String,
    #[serde(default)]
    pub manufacturer: String,
    #[serde(default)]
    pub description: String,
    /// Vendor subcategory label (used to resolve the family table)
    #[serde(default)]
    pub subcategory: Option<String>,
}

/// A part plus its raw attribute values keyed by canonical attribute id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartAttributes {
    pub part: PartSummary,
    #[serde(default)]
    pub parameters: HashMap<String, String>,
}

impl PartAttributes {
    pub fn value(&self, attribute_id: &str) -> Option<&str> {
        self.parameters.get(attribute_id).map(String::as_str)
    }
}

/// One matching request: a source part, its candidates, and user input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchRequest {
    /// Explicit family; when absent the source subcategory is used
    #[serde(default)]
    pub family_id: Option<String>,
    pub source: PartAttributes,
    #[serde(default)]
    pub candidates: Vec<PartAttributes>,
    /// User-supplied source values that take precedence over resolved ones
    #[serde(default)]
    pub overrides: HashMap<String, String>,
    /// Answers to the family's application-context questions, by question id
    #[serde(default)]
    pub application_answers: HashMap<String, String>,
}

// =============================================================================
// OUTPUT TYPES
// =============================================================================

/// Outcome of one rule for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleResult {
    Pass,
    Fail,
    Review,
    Upgrade,
}

impl RuleResult {
    /// Share of the rule weight this outcome earns.
    pub fn weight_factor(self) -> f64 {
        match self {
            RuleResult::Pass | RuleResult::Upgrade => 1.0,
            RuleResult::Review => 0.5,
            RuleResult::Fail => 0.0,
        }
    }
}

/// Per-attribute outcome of comparing a source and a candidate under one rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchDetail {
    pub parameter_id: String,
    pub parameter_name: String,
    pub source_value: String,
    pub replacement_value: String,
    pub rule_result: RuleResult,
    /// Reviewer context, e.g. an application answer bearing on this rule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl MatchDetail {
    /// True when the candidate had no usable value for this attribute.
    pub fn is_replacement_missing(&self) -> bool {
        is_missing_value(&self.replacement_value)
    }
}

/// A candidate after evaluation, before ranking.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub part: PartSummary,
    pub match_percentage: u8,
    pub match_details: Vec<MatchDetail>,
}

/// A ranked replacement recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XrefRecommendation {
    pub part: PartSummary,
    /// Weighted pass rate across all rules, 0-100
    pub match_percentage: u8,
    pub match_details: Vec<MatchDetail>,
}

/// A rule attribute the source part has no value for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingAttribute {
    pub attribute_id: String,
    pub attribute_name: String,
    pub weight: f64,
}

/// Complete result of a matching request.
#[derive(Debug, Clone, Serialize)]
pub struct MatchOutcome {
    pub family_id: String,
    pub family_name: String,
    /// Ranked recommendations, best first
    pub recommendations: Vec<XrefRecommendation>,
    /// Source attributes that could not be evaluated
    pub missing_attributes: Vec<MissingAttribute>,
}
