use std::cmp::Ordering;

use super::types::{ScoredCandidate, XrefRecommendation};

/// Order scored candidates into recommendations, best first.
///
/// Ties on match percentage are broken by MPN, then manufacturer, both
/// ascending, so the ordering is fully deterministic.
pub fn rank(mut candidates: Vec<ScoredCandidate>) -> Vec<XrefRecommendation> {
    candidates.sort_by(compare_candidates);
    candidates
        .into_iter()
        .map(|c| XrefRecommendation {
            part: c.part,
            match_percentage: c.match_percentage,
            match_details: c.match_details,
        })
        .collect()
}

/// Keep the best `n` recommendations.
pub fn top_n(mut recommendations: Vec<XrefRecommendation>, n: usize) -> Vec<XrefRecommendation> {
    recommendations.truncate(n);
    recommendations
}

fn compare_candidates(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.match_percentage
        .cmp(&a.match_percentage)
        .then_with(|| a.part.mpn.cmp(&b.part.mpn))
        .then_with(|| a.part.manufacturer.cmp(&b.part.manufacturer))
}
