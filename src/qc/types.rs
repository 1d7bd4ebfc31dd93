//! Type definitions for recommendation quality control.
//!
//! Inputs are historical log rows and feedback supplied by the persistence
//! layer; the output is the aggregate handed to reporting.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::matching::XrefRecommendation;

// =============================================================================
// INPUT TYPES
// =============================================================================

/// A persisted record of one past recommendation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationLogEntry {
    pub id: String,
    #[serde(default)]
    pub family_id: Option<String>,
    #[serde(default)]
    pub family_name: String,
    pub source_mpn: String,
    pub recommendation_count: usize,
    pub snapshot: LogSnapshot,
    /// Where the parametric data came from (e.g., "digikey", "partsio")
    #[serde(default)]
    pub data_source: String,
    /// Channel the request arrived through (e.g., "chat", "api", "batch")
    #[serde(default)]
    pub request_source: String,
    pub created_at: DateTime<Utc>,
}

impl RecommendationLogEntry {
    /// The best recommendation of the run, if it returned any.
    pub fn top_recommendation(&self) -> Option<&XrefRecommendation> {
        self.snapshot.recommendations.first()
    }
}

/// One capped fetch of log rows.
#[derive(Debug, Clone, Default)]
pub struct LogPage {
    pub entries: Vec<RecommendationLogEntry>,
    /// Rows the query returned, including any that failed to decode
    pub rows_read: usize,
}

impl LogPage {
    pub fn new(entries: Vec<RecommendationLogEntry>) -> Self {
        Self {
            rows_read: entries.len(),
            entries,
        }
    }
}

/// Recommendations as they were returned at log time, best first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogSnapshot {
    #[serde(default)]
    pub recommendations: Vec<XrefRecommendation>,
}

/// Triage state of a feedback record.
///
/// Variant order is priority order: when a log carries several statuses the
/// lowest one is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackStatus {
    Open,
    Reviewed,
    Resolved,
    Dismissed,
}

impl FeedbackStatus {
    pub fn priority(self) -> u8 {
        match self {
            FeedbackStatus::Open => 0,
            FeedbackStatus::Reviewed => 1,
            FeedbackStatus::Resolved => 2,
            FeedbackStatus::Dismissed => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FeedbackStatus::Open => "open",
            FeedbackStatus::Reviewed => "reviewed",
            FeedbackStatus::Resolved => "resolved",
            FeedbackStatus::Dismissed => "dismissed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "open" => Some(FeedbackStatus::Open),
            "reviewed" => Some(FeedbackStatus::Reviewed),
            "resolved" => Some(FeedbackStatus::Resolved),
            "dismissed" => Some(FeedbackStatus::Dismissed),
            _ => None,
        }
    }

    /// Highest-priority (lowest value) status among several.
    pub fn most_urgent(statuses: impl IntoIterator<Item = FeedbackStatus>) -> Option<Self> {
        statuses.into_iter().min_by_key(|s| s.priority())
    }
}

/// A user-submitted quality signal on a logged recommendation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub log_id: String,
    pub status: FeedbackStatus,
    #[serde(default)]
    pub user_comment: Option<String>,
}

/// Caller-supplied filters for the QC data fetch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QcFilters {
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub family_id: Option<String>,
    pub request_source: Option<String>,
    /// Free-text search over source MPN and family name
    pub search: Option<String>,
    /// Only logs that have at least one feedback record
    #[serde(default)]
    pub has_feedback: bool,
}

// =============================================================================
// OUTPUT TYPES
// =============================================================================

/// Inclusive date bounds the analysis covers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Count of top-recommendation scores in one distribution bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketCount {
    pub label: String,
    pub count: usize,
}

/// Accumulated outcomes of one rule across a family's logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleStats {
    pub attribute_id: String,
    pub attribute_name: String,
    /// Current logic type label, or "unknown" when the rule no longer exists
    pub logic_type: String,
    /// Current table weight (0 when the rule no longer exists)
    pub weight: f64,
    pub total_evaluations: usize,
    pub pass_count: usize,
    pub fail_count: usize,
    pub review_count: usize,
    pub upgrade_count: usize,
    /// Evaluations whose replacement value was blank or a placeholder
    pub missing_count: usize,
    /// Σ weight earned, using current weights
    pub earned_weight: f64,
    /// Σ weight available, using current weights
    pub possible_weight: f64,
}

impl RuleStats {
    pub fn new(attribute_id: &str, attribute_name: &str, logic_type: &str, weight: f64) -> Self {
        Self {
            attribute_id: attribute_id.to_string(),
            attribute_name: attribute_name.to_string(),
            logic_type: logic_type.to_string(),
            weight,
            total_evaluations: 0,
            pass_count: 0,
            fail_count: 0,
            review_count: 0,
            upgrade_count: 0,
            missing_count: 0,
            earned_weight: 0.0,
            possible_weight: 0.0,
        }
    }

    pub fn fail_rate(&self) -> f64 {
        ratio(self.fail_count, self.total_evaluations)
    }

    pub fn missing_rate(&self) -> f64 {
        ratio(self.missing_count, self.total_evaluations)
    }

    /// Share of available weight actually earned, 0 when nothing was available.
    pub fn earned_ratio(&self) -> f64 {
        if self.possible_weight > 0.0 {
            self.earned_weight / self.possible_weight
        } else {
            0.0
        }
    }
}

fn ratio(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

/// A rule ranked by how often it fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleFailRate {
    pub attribute_id: String,
    pub attribute_name: String,
    pub logic_type: String,
    pub weight: f64,
    pub fail_count: usize,
    pub total_evaluations: usize,
    pub fail_rate: f64,
}

/// An attribute ranked by how often candidates lack a value for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingRate {
    pub attribute_id: String,
    pub attribute_name: String,
    pub missing_count: usize,
    pub total_evaluations: usize,
    pub missing_rate: f64,
}

/// Representative log of a family, for reviewers to inspect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QcExample {
    /// Lowest-scoring log of the family
    WorstCase {
        family_id: String,
        log_id: String,
        source_mpn: String,
        top_mpn: String,
        match_percentage: u8,
        /// Attributes that failed on the top recommendation
        failing_attributes: Vec<String>,
    },
    /// A log a user left feedback on
    Feedback {
        family_id: String,
        log_id: String,
        source_mpn: String,
        status: FeedbackStatus,
        user_comment: Option<String>,
    },
}

/// Aggregate quality statistics of one family.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilyQcSummary {
    pub family_id: String,
    pub family_name: String,
    pub log_count: usize,
    pub avg_match_percentage: f64,
    pub median_match_percentage: f64,
    pub avg_recommendation_count: f64,
    pub distribution: Vec<BucketCount>,
    /// Every rule seen, in current table order, then unknown rules by id
    pub rule_stats: Vec<RuleStats>,
    pub top_failing_rules: Vec<RuleFailRate>,
    pub top_missing_attributes: Vec<MissingRate>,
    pub feedback_count: usize,
    pub feedback_by_status: BTreeMap<FeedbackStatus, usize>,
    /// Most urgent status among the family's feedback
    pub feedback_status: Option<FeedbackStatus>,
    pub worst_example: Option<QcExample>,
    pub feedback_example: Option<QcExample>,
}

/// Everything the reporting layer needs to review recommendation quality.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QcAnalysisInput {
    pub total_logs: usize,
    pub total_feedback: usize,
    /// True when the log fetch hit its row cap
    #[serde(default)]
    pub truncated: bool,
    pub date_range: DateRange,
    pub by_data_source: BTreeMap<String, usize>,
    pub by_request_source: BTreeMap<String, usize>,
    /// Families ordered by log count, largest first
    pub families: Vec<FamilyQcSummary>,
    /// Cross-family representative examples (at most five)
    pub examples: Vec<QcExample>,
}
