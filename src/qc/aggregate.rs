//! Roll-up of recommendation logs and feedback into per-family QC statistics.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, info};

use crate::logic::{LogicTable, LogicTableRegistry};
use crate::matching::{MatchDetail, RuleResult};

use super::stats::{bucket_index, mean, median, BUCKET_LABELS};
use super::types::*;

/// Family id used for logs recorded without one.
pub const UNKNOWN_FAMILY: &str = "unknown";
/// Data or request source label for logs recorded without one.
pub const UNKNOWN_SOURCE: &str = "unknown";
/// Logic type label for rules no longer present in the current table.
pub const UNKNOWN_LOGIC_TYPE: &str = "unknown";
/// Maximum number of cross-family representative examples.
pub const MAX_EXAMPLES: usize = 5;
/// Length of the top failing / top missing rule lists.
const TOP_RULES: usize = 5;

/// Aggregate logs and feedback into the QC analysis structure.
///
/// Rule weights and logic types come from the registry as it is now, not as
/// they were when the logs were written. Empty input yields a zero-valued
/// result.
pub fn aggregate(
    logs: &[RecommendationLogEntry],
    feedback: &[FeedbackRecord],
    registry: &LogicTableRegistry,
    filters: &QcFilters,
) -> QcAnalysisInput {
    let date_range = effective_date_range(filters, logs);
    if logs.is_empty() {
        info!("QC aggregation over an empty log set");
        return QcAnalysisInput {
            date_range,
            ..Default::default()
        };
    }

    let mut feedback_by_log: HashMap<&str, Vec<&FeedbackRecord>> = HashMap::new();
    for record in feedback {
        feedback_by_log
            .entry(record.log_id.as_str())
            .or_default()
            .push(record);
    }

    let mut by_data_source = BTreeMap::new();
    let mut by_request_source = BTreeMap::new();
    let mut accumulators: Vec<FamilyAccumulator> = Vec::new();
    let mut index_by_family: HashMap<String, usize> = HashMap::new();
    let mut total_feedback = 0;

    for entry in logs {
        *by_data_source.entry(label_or_unknown(&entry.data_source)).or_insert(0) += 1;
        *by_request_source
            .entry(label_or_unknown(&entry.request_source))
            .or_insert(0) += 1;

        let family_id = entry
            .family_id
            .as_deref()
            .filter(|f| !f.trim().is_empty())
            .unwrap_or(UNKNOWN_FAMILY);
        let idx = *index_by_family
            .entry(family_id.to_string())
            .or_insert_with(|| {
                accumulators.push(FamilyAccumulator::new(family_id, registry.get_table(family_id)));
                accumulators.len() - 1
            });

        let rows = feedback_by_log
            .get(entry.id.as_str())
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        total_feedback += rows.len();
        accumulators[idx].add_entry(entry, rows);
    }

    let mut families: Vec<FamilyQcSummary> =
        accumulators.into_iter().map(FamilyAccumulator::finish).collect();
    families.sort_by(|a, b| {
        b.log_count
            .cmp(&a.log_count)
            .then_with(|| a.family_id.cmp(&b.family_id))
    });

    let examples = select_examples(&families);

    info!(
        "QC aggregation: {} logs, {} feedback, {} families, {} examples",
        logs.len(),
        total_feedback,
        families.len(),
        examples.len()
    );

    QcAnalysisInput {
        total_logs: logs.len(),
        total_feedback,
        truncated: false,
        date_range,
        by_data_source,
        by_request_source,
        families,
        examples,
    }
}

/// Filter bounds when given, otherwise the span of the logs themselves.
fn effective_date_range(filters: &QcFilters, logs: &[RecommendationLogEntry]) -> DateRange {
    DateRange {
        from: filters
            .date_from
            .or_else(|| logs.iter().map(|l| l.created_at).min()),
        to: filters
            .date_to
            .or_else(|| logs.iter().map(|l| l.created_at).max()),
    }
}

fn label_or_unknown(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        UNKNOWN_SOURCE.to_string()
    } else {
        trimmed.to_string()
    }
}

/// One worst-case and one feedback example per family, in family order.
fn select_examples(families: &[FamilyQcSummary]) -> Vec<QcExample> {
    let mut examples = Vec::with_capacity(MAX_EXAMPLES);
    for family in families {
        for example in [&family.worst_example, &family.feedback_example]
            .into_iter()
            .flatten()
        {
            if examples.len() >= MAX_EXAMPLES {
                return examples;
            }
            examples.push(example.clone());
        }
    }
    examples
}

struct WorstLog {
    match_percentage: u8,
    example: QcExample,
}

struct FamilyAccumulator<'t> {
    family_id: String,
    family_name: String,
    table: Option<&'t LogicTable>,
    log_count: usize,
    recommendation_total: usize,
    percentages: Vec<f64>,
    buckets: [usize; 5],
    rules: HashMap<String, RuleStats>,
    feedback_count: usize,
    feedback_by_status: BTreeMap<FeedbackStatus, usize>,
    feedback_example: Option<QcExample>,
    worst: Option<WorstLog>,
}

impl<'t> FamilyAccumulator<'t> {
    fn new(family_id: &str, table: Option<&'t LogicTable>) -> Self {
        Self {
            family_id: family_id.to_string(),
            family_name: table.map(|t| t.family_name.clone()).unwrap_or_default(),
            table,
            log_count: 0,
            recommendation_total: 0,
            percentages: Vec::new(),
            buckets: [0; 5],
            rules: HashMap::new(),
            feedback_count: 0,
            feedback_by_status: BTreeMap::new(),
            feedback_example: None,
            worst: None,
        }
    }

    fn add_entry(&mut self, entry: &RecommendationLogEntry, feedback: &[&FeedbackRecord]) {
        self.log_count += 1;
        self.recommendation_total += entry.recommendation_count;
        if self.family_name.is_empty() && !entry.family_name.is_empty() {
            self.family_name = entry.family_name.clone();
        }

        if let Some(top) = entry.top_recommendation() {
            self.percentages.push(f64::from(top.match_percentage));
            self.buckets[bucket_index(top.match_percentage)] += 1;

            let is_worse = self
                .worst
                .as_ref()
                .map_or(true, |w| top.match_percentage < w.match_percentage);
            if is_worse {
                self.worst = Some(WorstLog {
                    match_percentage: top.match_percentage,
                    example: QcExample::WorstCase {
                        family_id: self.family_id.clone(),
                        log_id: entry.id.clone(),
                        source_mpn: entry.source_mpn.clone(),
                        top_mpn: top.part.mpn.clone(),
                        match_percentage: top.match_percentage,
                        failing_attributes: top
                            .match_details
                            .iter()
                            .filter(|d| d.rule_result == RuleResult::Fail)
                            .map(|d| d.parameter_name.clone())
                            .collect(),
                    },
                });
            }
        }

        for recommendation in &entry.snapshot.recommendations {
            for detail in &recommendation.match_details {
                self.add_detail(detail);
            }
        }

        for record in feedback {
            self.feedback_count += 1;
            *self.feedback_by_status.entry(record.status).or_insert(0) += 1;
            if self.feedback_example.is_none() {
                self.feedback_example = Some(QcExample::Feedback {
                    family_id: self.family_id.clone(),
                    log_id: entry.id.clone(),
                    source_mpn: entry.source_mpn.clone(),
                    status: record.status,
                    user_comment: record.user_comment.clone(),
                });
            }
        }
    }

    fn add_detail(&mut self, detail: &MatchDetail) {
        let table = self.table;
        let stats = self
            .rules
            .entry(detail.parameter_id.clone())
            .or_insert_with(|| match table.and_then(|t| t.rule(&detail.parameter_id)) {
                Some(rule) => RuleStats::new(
                    &rule.attribute_id,
                    &rule.attribute_name,
                    rule.logic.label(),
                    rule.weight,
                ),
                None => {
                    debug!(
                        "Rule '{}' is not in the current table; counting with weight 0",
                        detail.parameter_id
                    );
                    RuleStats::new(
                        &detail.parameter_id,
                        &detail.parameter_name,
                        UNKNOWN_LOGIC_TYPE,
                        0.0,
                    )
                }
            });

        stats.total_evaluations += 1;
        match detail.rule_result {
            RuleResult::Pass => stats.pass_count += 1,
            RuleResult::Fail => stats.fail_count += 1,
            RuleResult::Review => stats.review_count += 1,
            RuleResult::Upgrade => stats.upgrade_count += 1,
        }
        if detail.is_replacement_missing() {
            stats.missing_count += 1;
        }
        stats.earned_weight += stats.weight * detail.rule_result.weight_factor();
        stats.possible_weight += stats.weight;
    }

    fn finish(mut self) -> FamilyQcSummary {
        let mut rule_stats = Vec::with_capacity(self.rules.len());
        if let Some(table) = self.table {
            for rule in &table.rules {
                if let Some(stats) = self.rules.remove(&rule.attribute_id) {
                    rule_stats.push(stats);
                }
            }
        }
        let mut unknown: Vec<RuleStats> = self.rules.into_values().collect();
        unknown.sort_by(|a, b| a.attribute_id.cmp(&b.attribute_id));
        rule_stats.extend(unknown);

        let mut failing: Vec<&RuleStats> = rule_stats.iter().filter(|s| s.fail_count > 0).collect();
        failing.sort_by(|a, b| {
            b.fail_rate()
                .total_cmp(&a.fail_rate())
                .then_with(|| b.fail_count.cmp(&a.fail_count))
                .then_with(|| a.attribute_id.cmp(&b.attribute_id))
        });
        let top_failing_rules = failing
            .into_iter()
            .take(TOP_RULES)
            .map(|s| RuleFailRate {
                attribute_id: s.attribute_id.clone(),
                attribute_name: s.attribute_name.clone(),
                logic_type: s.logic_type.clone(),
                weight: s.weight,
                fail_count: s.fail_count,
                total_evaluations: s.total_evaluations,
                fail_rate: s.fail_rate(),
            })
            .collect();

        let mut missing: Vec<&RuleStats> =
            rule_stats.iter().filter(|s| s.missing_count > 0).collect();
        missing.sort_by(|a, b| {
            b.missing_rate()
                .total_cmp(&a.missing_rate())
                .then_with(|| b.missing_count.cmp(&a.missing_count))
                .then_with(|| a.attribute_id.cmp(&b.attribute_id))
        });
        let top_missing_attributes = missing
            .into_iter()
            .take(TOP_RULES)
            .map(|s| MissingRate {
                attribute_id: s.attribute_id.clone(),
                attribute_name: s.attribute_name.clone(),
                missing_count: s.missing_count,
                total_evaluations: s.total_evaluations,
                missing_rate: s.missing_rate(),
            })
            .collect();

        let distribution = BUCKET_LABELS
            .iter()
            .zip(self.buckets)
            .map(|(label, count)| BucketCount {
                label: label.to_string(),
                count,
            })
            .collect();

        let feedback_status = FeedbackStatus::most_urgent(self.feedback_by_status.keys().copied());
        let family_name = if self.family_name.is_empty() {
            self.family_id.clone()
        } else {
            self.family_name
        };

        FamilyQcSummary {
            family_id: self.family_id,
            family_name,
            log_count: self.log_count,
            avg_match_percentage: mean(&self.percentages),
            median_match_percentage: median(&self.percentages),
            avg_recommendation_count: self.recommendation_total as f64 / self.log_count.max(1) as f64,
            distribution,
            rule_stats,
            top_failing_rules,
            top_missing_attributes,
            feedback_count: self.feedback_count,
            feedback_by_status: self.feedback_by_status,
            feedback_status,
            worst_example: self.worst.map(|w| w.example),
            feedback_example: self.feedback_example,
        }
    }
}
