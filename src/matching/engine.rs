//! Rule evaluation engine for cross-reference matching.
//!
//! `evaluate` compares one candidate against one source under a logic table,
//! `score` turns the per-rule outcomes into a weighted match percentage, and
//! `MatchingEngine` ties both to the registry for whole requests.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::error::{Result, XrefError};
use crate::logic::{LogicTable, LogicTableRegistry, LogicType, MatchingRule, ThresholdDirection};

use super::missing::detect_missing;
use super::ranker::rank;
use super::types::*;
use super::value::{flag_required, is_missing_value, parse_numeric, parse_range};

/// Evaluate every rule of `table` for one candidate, in table order.
///
/// `overrides` replace source values before comparison. `application_answers`
/// are keyed by context question id and only annotate application review
/// rules; they never change a rule's outcome.
pub fn evaluate(
    source: &PartAttributes,
    candidate: &PartAttributes,
    table: &LogicTable,
    overrides: &HashMap<String, String>,
    application_answers: &HashMap<String, String>,
) -> Vec<MatchDetail> {
    table
        .rules
        .iter()
        .map(|rule| {
            let source_value = overrides
                .get(&rule.attribute_id)
                .map(String::as_str)
                .or_else(|| source.value(&rule.attribute_id))
                .unwrap_or("");
            let replacement_value = candidate.value(&rule.attribute_id).unwrap_or("");

            let note = match rule.logic {
                LogicType::ApplicationReview => context_note(table, rule, application_answers),
                _ => None,
            };

            MatchDetail {
                parameter_id: rule.attribute_id.clone(),
                parameter_name: rule.attribute_name.clone(),
                source_value: source_value.to_string(),
                replacement_value: replacement_value.to_string(),
                rule_result: evaluate_rule(&rule.logic, source_value, replacement_value),
                note,
            }
        })
        .collect()
}

/// Weighted match percentage of evaluated details, 0-100.
///
/// Pass and upgrade earn the full rule weight, review half, fail nothing.
/// Weights come from `table`; a table with zero total weight scores 0.
pub fn score(details: &[MatchDetail], table: &LogicTable) -> u8 {
    let total = table.total_weight();
    if total <= 0.0 {
        return 0;
    }

    let earned: f64 = details
        .iter()
        .filter_map(|d| {
            table
                .rule(&d.parameter_id)
                .map(|rule| rule.weight * d.rule_result.weight_factor())
        })
        .sum();

    (100.0 * earned / total).round().clamp(0.0, 100.0) as u8
}

/// Return a copy of the source with overrides merged over its parameters.
pub fn apply_overrides(source: &PartAttributes, overrides: &HashMap<String, String>) -> PartAttributes {
    let mut merged = source.clone();
    for (attribute_id, value) in overrides {
        merged.parameters.insert(attribute_id.clone(), value.clone());
    }
    merged
}

/// Outcome of a single rule.
///
/// A missing replacement value fails every comparative rule. Operational,
/// application review and not-required flag rules keep their fixed outcome.
fn evaluate_rule(logic: &LogicType, source: &str, replacement: &str) -> RuleResult {
    match logic {
        LogicType::Operational => RuleResult::Pass,
        LogicType::ApplicationReview => RuleResult::Review,
        LogicType::IdentityFlag if !flag_required(source) => RuleResult::Pass,
        _ if is_missing_value(replacement) => RuleResult::Fail,
        LogicType::Identity | LogicType::IdentityFlag => identity(source, replacement),
        LogicType::IdentityUpgrade { upgrade_hierarchy } => {
            compare_rank(upgrade_hierarchy, source, replacement)
        }
        LogicType::Threshold { direction } => compare_threshold(*direction, source, replacement),
        LogicType::Fit { direction } => compare_threshold(
            direction.unwrap_or(ThresholdDirection::Lte),
            source,
            replacement,
        ),
    }
}

fn identity(source: &str, replacement: &str) -> RuleResult {
    if source == replacement {
        RuleResult::Pass
    } else {
        RuleResult::Fail
    }
}

/// Rank comparison within an upgrade hierarchy (weakest first).
///
/// A source value outside the hierarchy can only be matched exactly.
fn compare_rank(hierarchy: &[String], source: &str, replacement: &str) -> RuleResult {
    let rank = |value: &str| hierarchy.iter().position(|h| h == value);

    match (rank(source), rank(replacement)) {
        (Some(s), Some(c)) if c == s => RuleResult::Pass,
        (Some(s), Some(c)) if c > s => RuleResult::Upgrade,
        (Some(_), _) => RuleResult::Fail,
        (None, _) => identity(source, replacement),
    }
}

fn compare_threshold(direction: ThresholdDirection, source: &str, replacement: &str) -> RuleResult {
    let passed = match direction {
        ThresholdDirection::Gte => match (parse_numeric(source), parse_numeric(replacement)) {
            (Some(s), Some(c)) => c >= s,
            _ => false,
        },
        ThresholdDirection::Lte => match (parse_numeric(source), parse_numeric(replacement)) {
            (Some(s), Some(c)) => c <= s,
            _ => false,
        },
        ThresholdDirection::RangeSuperset => match (parse_range(source), parse_range(replacement)) {
            (Some((s_min, s_max)), Some((c_min, c_max))) => c_min <= s_min && c_max >= s_max,
            _ => false,
        },
    };

    if passed {
        RuleResult::Pass
    } else {
        RuleResult::Fail
    }
}

/// Collect the application answers that bear on a review rule.
fn context_note(
    table: &LogicTable,
    rule: &MatchingRule,
    answers: &HashMap<String, String>,
) -> Option<String> {
    let notes: Vec<String> = table
        .context_questions
        .iter()
        .filter(|q| q.attribute_ids.iter().any(|a| *a == rule.attribute_id))
        .filter_map(|q| {
            answers
                .get(&q.question_id)
                .filter(|answer| !answer.trim().is_empty())
                .map(|answer| format!("{}: {}", q.prompt, answer.trim()))
        })
        .collect();

    (!notes.is_empty()).then(|| notes.join("; "))
}

/// Request-level matching over a shared registry.
pub struct MatchingEngine<'a> {
    registry: &'a LogicTableRegistry,
}

impl<'a> MatchingEngine<'a> {
    pub fn new(registry: &'a LogicTableRegistry) -> Self {
        Self { registry }
    }

    /// Resolve the logic table for a request.
    ///
    /// An explicit family id wins; otherwise the subcategory label is matched
    /// against registered patterns.
    pub fn resolve_table(
        &self,
        family_id: Option<&str>,
        subcategory: Option<&str>,
    ) -> Result<&'a LogicTable> {
        if let Some(family_id) = family_id {
            return self
                .registry
                .get_table(family_id)
                .ok_or_else(|| XrefError::UnknownFamily(family_id.to_string()));
        }
        let subcategory = subcategory.unwrap_or("");
        self.registry
            .get_table_for_subcategory(subcategory)
            .ok_or_else(|| XrefError::UnknownFamily(format!("subcategory '{}'", subcategory)))
    }

    /// Evaluate and score one candidate for a request.
    pub fn score_candidate(
        &self,
        table: &LogicTable,
        request: &MatchRequest,
        candidate: &PartAttributes,
    ) -> ScoredCandidate {
        let match_details = evaluate(
            &request.source,
            candidate,
            table,
            &request.overrides,
            &request.application_answers,
        );
        let match_percentage = score(&match_details, table);
        ScoredCandidate {
            part: candidate.part.clone(),
            match_percentage,
            match_details,
        }
    }

    /// Score and rank every candidate of a request.
    pub fn recommend(&self, request: &MatchRequest) -> Result<MatchOutcome> {
        let table = self.resolve_table(
            request.family_id.as_deref(),
            request.source.part.subcategory.as_deref(),
        )?;

        let scored: Vec<ScoredCandidate> = request
            .candidates
            .iter()
            .map(|candidate| self.score_candidate(table, request, candidate))
            .collect();
        let recommendations = rank(scored);

        let merged_source = apply_overrides(&request.source, &request.overrides);
        let missing_attributes = detect_missing(&merged_source, table);

        info!(
            "Matched {} candidates for {} against '{}' (best {}%, {} source attributes missing)",
            recommendations.len(),
            request.source.part.mpn,
            table.family_id,
            recommendations.first().map_or(0, |r| r.match_percentage),
            missing_attributes.len()
        );
        debug!(
            "Top candidates for {}: {:?}",
            request.source.part.mpn,
            recommendations
                .iter()
                .take(3)
                .map(|r| (&r.part.mpn, r.match_percentage))
                .collect::<Vec<_>>()
        );

        Ok(MatchOutcome {
            family_id: table.family_id.clone(),
            family_name: table.family_name.clone(),
            recommendations,
            missing_attributes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::{default_tables, ContextQuestion};

    fn rule(attribute_id: &str, weight: f64, logic: LogicType) -> MatchingRule {
        MatchingRule {
            attribute_id: attribute_id.to_string(),
            attribute_name: attribute_id.to_string(),
            weight,
            engineering_reason: String::new(),
            logic,
        }
    }

    fn table(rules: Vec<MatchingRule>) -> LogicTable {
        LogicTable {
            family_id: "test".to_string(),
            family_name: "Test".to_string(),
            category: "Test".to_string(),
            description: String::new(),
            subcategory_patterns: vec![],
            context_questions: vec![],
            rules,
        }
    }

    fn part(mpn: &str, params: &[(&str, &str)]) -> PartAttributes {
        PartAttributes {
            part: PartSummary {
                mpn: mpn.to_string(),
                ..Default::default()
            },
            parameters: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn single(logic: LogicType, source: &str, candidate: &str) -> RuleResult {
        let t = table(vec![rule("attr", 1.0, logic)]);
        let details = evaluate(
            &part("SRC", &[("attr", source)]),
            &part("CAND", &[("attr", candidate)]),
            &t,
            &HashMap::new(),
            &HashMap::new(),
        );
        details[0].rule_result
    }

    fn voltage_package_table() -> LogicTable {
        table(vec![
            rule(
                "voltage",
                5.0,
                LogicType::Threshold {
                    direction: ThresholdDirection::Gte,
                },
            ),
            rule("package", 3.0, LogicType::Identity),
        ])
    }

    #[test]
    fn test_identity_is_exact_and_case_sensitive() {
        assert_eq!(single(LogicType::Identity, "SOT23", "SOT23"), RuleResult::Pass);
        assert_eq!(single(LogicType::Identity, "SOT23", "sot23"), RuleResult::Fail);
        assert_eq!(single(LogicType::Identity, "SOT23", "SOT-23"), RuleResult::Fail);
    }

    #[test]
    fn test_threshold_gte() {
        let gte = LogicType::Threshold {
            direction: ThresholdDirection::Gte,
        };
        assert_eq!(single(gte.clone(), "10", "12"), RuleResult::Pass);
        assert_eq!(single(gte.clone(), "10", "10"), RuleResult::Pass);
        assert_eq!(single(gte.clone(), "10", "8"), RuleResult::Fail);
        assert_eq!(single(gte, "25V", "50V"), RuleResult::Pass);
    }

    #[test]
    fn test_threshold_lte() {
        let lte = LogicType::Threshold {
            direction: ThresholdDirection::Lte,
        };
        assert_eq!(single(lte.clone(), "±10%", "±5%"), RuleResult::Pass);
        assert_eq!(single(lte, "±5%", "±10%"), RuleResult::Fail);
    }

    #[test]
    fn test_threshold_unparsable_fails() {
        let gte = LogicType::Threshold {
            direction: ThresholdDirection::Gte,
        };
        assert_eq!(single(gte.clone(), "10", "lots"), RuleResult::Fail);
        assert_eq!(single(gte, "unknown", "12"), RuleResult::Fail);
    }

    #[test]
    fn test_range_superset() {
        let range = LogicType::Threshold {
            direction: ThresholdDirection::RangeSuperset,
        };
        assert_eq!(
            single(range.clone(), "-40°C ~ 85°C", "-55°C ~ 125°C"),
            RuleResult::Pass
        );
        assert_eq!(
            single(range.clone(), "-55°C ~ 125°C", "-40°C ~ 125°C"),
            RuleResult::Fail
        );
        assert_eq!(single(range, "-40°C ~ 85°C", "-40°C ~ 85°C"), RuleResult::Pass);
    }

    #[test]
    fn test_range_superset_with_dash_separator() {
        let range = LogicType::Threshold {
            direction: ThresholdDirection::RangeSuperset,
        };
        // Narrower candidate must not pass
        assert_eq!(single(range.clone(), "1.8V - 5.5V", "1.8V - 3.6V"), RuleResult::Fail);
        // Wider candidate must not fail
        assert_eq!(single(range.clone(), "2.7V - 5.5V", "1.8V - 5.5V"), RuleResult::Pass);
        assert_eq!(single(range.clone(), "2.7V – 5.5V", "1.8V ~ 6V"), RuleResult::Pass);
        assert_eq!(single(range, "2.7V - 5.5V", "1.8V/5.5V"), RuleResult::Fail);
    }

    #[test]
    fn test_threshold_ignores_unit_words() {
        let gte = LogicType::Threshold {
            direction: ThresholdDirection::Gte,
        };
        assert_eq!(single(gte.clone(), "8", "8 pins"), RuleResult::Pass);
        assert_eq!(single(gte.clone(), "5 min", "10 min"), RuleResult::Pass);
        assert_eq!(single(gte, "1e3", "900"), RuleResult::Fail);
    }

    #[test]
    fn test_identity_upgrade() {
        let upgrade = LogicType::IdentityUpgrade {
            upgrade_hierarchy: vec!["low".to_string(), "mid".to_string(), "high".to_string()],
        };
        assert_eq!(single(upgrade.clone(), "mid", "high"), RuleResult::Upgrade);
        assert_eq!(single(upgrade.clone(), "mid", "mid"), RuleResult::Pass);
        assert_eq!(single(upgrade.clone(), "mid", "low"), RuleResult::Fail);
        assert_eq!(single(upgrade.clone(), "mid", "ultra"), RuleResult::Fail);
        // Source outside the hierarchy degrades to exact matching
        assert_eq!(single(upgrade.clone(), "custom", "custom"), RuleResult::Pass);
        assert_eq!(single(upgrade, "custom", "high"), RuleResult::Fail);
    }

    #[test]
    fn test_identity_flag() {
        assert_eq!(
            single(LogicType::IdentityFlag, "AEC-Q200", "AEC-Q200"),
            RuleResult::Pass
        );
        assert_eq!(
            single(LogicType::IdentityFlag, "AEC-Q200", "Commercial"),
            RuleResult::Fail
        );
        assert_eq!(single(LogicType::IdentityFlag, "AEC-Q200", ""), RuleResult::Fail);
        // Not required: anything passes
        assert_eq!(single(LogicType::IdentityFlag, "No", "Commercial"), RuleResult::Pass);
        assert_eq!(single(LogicType::IdentityFlag, "", ""), RuleResult::Pass);
    }

    #[test]
    fn test_fit_defaults_to_lte() {
        let fit = LogicType::Fit { direction: None };
        assert_eq!(single(fit.clone(), "1.0mm", "0.8mm"), RuleResult::Pass);
        assert_eq!(single(fit, "1.0mm", "1.2mm"), RuleResult::Fail);

        let fit_gte = LogicType::Fit {
            direction: Some(ThresholdDirection::Gte),
        };
        assert_eq!(single(fit_gte, "1.0mm", "1.2mm"), RuleResult::Pass);
    }

    #[test]
    fn test_application_review_always_review() {
        for (s, c) in [("a", "a"), ("a", "b"), ("", ""), ("10", "-")] {
            assert_eq!(single(LogicType::ApplicationReview, s, c), RuleResult::Review);
        }
    }

    #[test]
    fn test_operational_always_pass() {
        for (s, c) in [("Tape & Reel", "Cut Tape"), ("", ""), ("x", "-")] {
            assert_eq!(single(LogicType::Operational, s, c), RuleResult::Pass);
        }
    }

    #[test]
    fn test_missing_replacement_fails_comparative_rules() {
        assert_eq!(single(LogicType::Identity, "", ""), RuleResult::Fail);
        assert_eq!(single(LogicType::Identity, "0603", "-"), RuleResult::Fail);
        let gte = LogicType::Threshold {
            direction: ThresholdDirection::Gte,
        };
        assert_eq!(single(gte, "10", "—"), RuleResult::Fail);
    }

    #[test]
    fn test_attribute_absent_from_both_is_deterministic() {
        let t = voltage_package_table();
        let details = evaluate(
            &part("SRC", &[]),
            &part("CAND", &[]),
            &t,
            &HashMap::new(),
            &HashMap::new(),
        );
        assert_eq!(details.len(), 2);
        for d in &details {
            assert_eq!(d.source_value, "");
            assert_eq!(d.replacement_value, "");
            assert_eq!(d.rule_result, RuleResult::Fail);
            assert!(d.is_replacement_missing());
        }
    }

    #[test]
    fn test_scoring_example() {
        let t = voltage_package_table();
        assert_eq!(t.total_weight(), 8.0);
        let source = part("SRC", &[("voltage", "10"), ("package", "SOT23")]);
        let none = HashMap::new();

        let good = part("GOOD", &[("voltage", "12"), ("package", "SOT23")]);
        let details = evaluate(&source, &good, &t, &none, &none);
        assert_eq!(score(&details, &t), 100);

        let weak = part("WEAK", &[("voltage", "8"), ("package", "SOT23")]);
        let details = evaluate(&source, &weak, &t, &none, &none);
        assert_eq!(details[0].rule_result, RuleResult::Fail);
        assert_eq!(details[1].rule_result, RuleResult::Pass);
        assert_eq!(score(&details, &t), 38);
    }

    #[test]
    fn test_review_earns_half_weight() {
        let t = table(vec![
            rule("a", 2.0, LogicType::Identity),
            rule("b", 2.0, LogicType::ApplicationReview),
        ]);
        let none = HashMap::new();
        let details = evaluate(
            &part("S", &[("a", "x")]),
            &part("C", &[("a", "x")]),
            &t,
            &none,
            &none,
        );
        // earned = 2 + 1 = 3 of 4
        assert_eq!(score(&details, &t), 75);
    }

    #[test]
    fn test_zero_weight_table_scores_zero() {
        let t = table(vec![rule("a", 0.0, LogicType::Identity)]);
        let none = HashMap::new();
        let details = evaluate(
            &part("S", &[("a", "x")]),
            &part("C", &[("a", "x")]),
            &t,
            &none,
            &none,
        );
        assert_eq!(score(&details, &t), 0);
        assert_eq!(score(&[], &table(vec![])), 0);
    }

    #[test]
    fn test_overrides_take_precedence() {
        let t = voltage_package_table();
        let source = part("SRC", &[("voltage", "10"), ("package", "SOT23")]);
        let candidate = part("CAND", &[("voltage", "12"), ("package", "SOT23")]);
        let overrides = HashMap::from([("voltage".to_string(), "16".to_string())]);

        let details = evaluate(&source, &candidate, &t, &overrides, &HashMap::new());
        assert_eq!(details[0].source_value, "16");
        assert_eq!(details[0].rule_result, RuleResult::Fail);
        // The source itself is untouched
        assert_eq!(source.value("voltage"), Some("10"));
    }

    #[test]
    fn test_application_answer_annotates_review() {
        let mut t = table(vec![rule("dc_bias", 3.0, LogicType::ApplicationReview)]);
        t.context_questions.push(ContextQuestion {
            question_id: "bias".to_string(),
            prompt: "Applied DC voltage".to_string(),
            attribute_ids: vec!["dc_bias".to_string()],
        });
        let answers = HashMap::from([("bias".to_string(), "12V".to_string())]);

        let details = evaluate(&part("S", &[]), &part("C", &[]), &t, &HashMap::new(), &answers);
        assert_eq!(details[0].rule_result, RuleResult::Review);
        assert_eq!(details[0].note.as_deref(), Some("Applied DC voltage: 12V"));

        let details = evaluate(
            &part("S", &[]),
            &part("C", &[]),
            &t,
            &HashMap::new(),
            &HashMap::new(),
        );
        assert!(details[0].note.is_none());
    }

    #[test]
    fn test_percentage_bounds_on_default_tables() {
        let registry = LogicTableRegistry::new(default_tables()).unwrap();
        let none = HashMap::new();
        for t in registry.list_all() {
            let full: Vec<(&str, &str)> =
                t.rules.iter().map(|r| (r.attribute_id.as_str(), "1")).collect();
            let source = part("S", &full);
            for candidate in [part("EMPTY", &[]), part("SAME", &full)] {
                let details = evaluate(&source, &candidate, t, &none, &none);
                assert_eq!(details.len(), t.rules.len());
                assert!(score(&details, t) <= 100);
            }
        }
    }

    #[test]
    fn test_recommend_ranks_and_reports_missing() {
        let registry = LogicTableRegistry::new(default_tables()).unwrap();
        let engine = MatchingEngine::new(&registry);

        let mut source = part(
            "GRM188R71H104KA93D",
            &[
                ("capacitance", "0.1µF"),
                ("voltage_rated", "50V"),
                ("dielectric", "X7R"),
                ("package", "0603 (1608 Metric)"),
            ],
        );
        source.part.subcategory = Some("Ceramic Capacitors".to_string());

        let request = MatchRequest {
            family_id: None,
            source,
            candidates: vec![
                part(
                    "CL10B104KB8NNNC",
                    &[
                        ("capacitance", "0.1µF"),
                        ("voltage_rated", "50V"),
                        ("dielectric", "X7R"),
                        ("package", "0603 (1608 Metric)"),
                    ],
                ),
                part(
                    "C0603C104K3RACTU",
                    &[
                        ("capacitance", "0.1µF"),
                        ("voltage_rated", "25V"),
                        ("dielectric", "X7R"),
                        ("package", "0603 (1608 Metric)"),
                    ],
                ),
            ],
            ..Default::default()
        };

        let outcome = engine.recommend(&request).unwrap();
        assert_eq!(outcome.family_id, "mlcc");
        assert_eq!(outcome.recommendations.len(), 2);
        assert_eq!(outcome.recommendations[0].part.mpn, "CL10B104KB8NNNC");
        assert!(
            outcome.recommendations[0].match_percentage
                > outcome.recommendations[1].match_percentage
        );
        assert!(outcome
            .missing_attributes
            .iter()
            .any(|m| m.attribute_id == "tolerance"));
        assert!(!outcome
            .missing_attributes
            .iter()
            .any(|m| m.attribute_id == "capacitance"));
    }

    #[test]
    fn test_recommend_unknown_family() {
        let registry = LogicTableRegistry::new(default_tables()).unwrap();
        let engine = MatchingEngine::new(&registry);

        let request = MatchRequest {
            family_id: Some("crystals".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            engine.recommend(&request),
            Err(XrefError::UnknownFamily(_))
        ));

        let request = MatchRequest::default();
        assert!(matches!(
            engine.recommend(&request),
            Err(XrefError::UnknownFamily(_))
        ));
    }
}
