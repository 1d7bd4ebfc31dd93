use crate::logic::LogicTable;

use super::types::{MissingAttribute, PartAttributes};

/// Default weight at or above which a missing source attribute is critical.
pub const DEFAULT_CRITICAL_WEIGHT: f64 = 7.0;

/// List rule attributes the source part has no value for, in rule order.
///
/// An attribute is missing when its key is absent or its value is blank.
pub fn detect_missing(source: &PartAttributes, table: &LogicTable) -> Vec<MissingAttribute> {
    table
        .rules
        .iter()
        .filter(|rule| {
            source
                .value(&rule.attribute_id)
                .map_or(true, |v| v.trim().is_empty())
        })
        .map(|rule| MissingAttribute {
            attribute_id: rule.attribute_id.clone(),
            attribute_name: rule.attribute_name.clone(),
            weight: rule.weight,
        })
        .collect()
}

/// Missing attributes important enough to ask the user for before recommending.
pub fn critical_missing(missing: &[MissingAttribute], threshold: f64) -> Vec<&MissingAttribute> {
    missing.iter().filter(|m| m.weight >= threshold).collect()
}
