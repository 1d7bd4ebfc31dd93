use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use crate::error::{Result, XrefError};

use super::types::{ContextQuestion, LogicTable, LogicTablesConfig, LogicType};

/// Immutable catalog of logic tables, keyed by family id and by subcategory.
///
/// Built once at startup and shared by reference. There is no mutation API;
/// reloading tables means constructing a new registry.
#[derive(Debug)]
pub struct LogicTableRegistry {
    tables: Vec<LogicTable>,
    by_family: HashMap<String, usize>,
    /// Lowercased subcategory patterns, longest first, ties in registration order.
    patterns: Vec<(String, usize)>,
    version: Option<String>,
}

impl LogicTableRegistry {
    /// Build a registry from a loaded table set, validating its invariants.
    pub fn new(config: LogicTablesConfig) -> Result<Self> {
        let mut registry = Self::from_tables(config.families)?;
        registry.version = config.version;
        Ok(registry)
    }

    pub fn from_tables(tables: Vec<LogicTable>) -> Result<Self> {
        let mut by_family = HashMap::with_capacity(tables.len());
        let mut patterns = Vec::new();

        for (idx, table) in tables.iter().enumerate() {
            validate_table(table)?;
            if by_family.insert(table.family_id.clone(), idx).is_some() {
                return Err(XrefError::LogicTable(format!(
                    "Duplicate family id '{}'",
                    table.family_id
                )));
            }
            for pattern in &table.subcategory_patterns {
                let pattern = pattern.trim().to_lowercase();
                if !pattern.is_empty() {
                    patterns.push((pattern, idx));
                }
            }
        }

        // Stable sort keeps registration order among equal-length patterns.
        patterns.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        info!(
            "Loaded {} logic tables ({} rules, {} subcategory patterns)",
            tables.len(),
            tables.iter().map(|t| t.rules.len()).sum::<usize>(),
            patterns.len()
        );

        Ok(Self {
            tables,
            by_family,
            patterns,
            version: None,
        })
    }

    /// Look up a table by family id.
    pub fn get_table(&self, family_id: &str) -> Option<&LogicTable> {
        self.by_family.get(family_id).map(|&idx| &self.tables[idx])
    }

    /// Resolve a vendor subcategory label to a family table.
    ///
    /// Each registered pattern is tested as a case-insensitive substring of the
    /// label. The longest matching pattern wins; equal lengths fall back to
    /// registration order.
    pub fn get_table_for_subcategory(&self, subcategory: &str) -> Option<&LogicTable> {
        let label = subcategory.to_lowercase();
        let hit = self
            .patterns
            .iter()
            .find(|(pattern, _)| label.contains(pattern.as_str()))
            .map(|&(_, idx)| &self.tables[idx]);

        match hit {
            Some(table) => debug!("Subcategory '{}' -> family '{}'", subcategory, table.family_id),
            None => debug!("Subcategory '{}' matched no family", subcategory),
        }
        hit
    }

    pub fn list_all(&self) -> &[LogicTable] {
        &self.tables
    }

    /// Application-context questions registered for a family.
    pub fn context_questions(&self, family_id: &str) -> &[ContextQuestion] {
        self.get_table(family_id)
            .map(|t| t.context_questions.as_slice())
            .unwrap_or(&[])
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }
}

fn validate_table(table: &LogicTable) -> Result<()> {
    if table.family_id.trim().is_empty() {
        return Err(XrefError::LogicTable(format!(
            "Table '{}' has an empty family id",
            table.family_name
        )));
    }

    let mut seen = HashSet::with_capacity(table.rules.len());
    for rule in &table.rules {
        if !seen.insert(rule.attribute_id.as_str()) {
            return Err(XrefError::LogicTable(format!(
                "Duplicate attribute '{}' in family '{}'",
                rule.attribute_id, table.family_id
            )));
        }
        if !rule.weight.is_finite() || rule.weight < 0.0 {
            return Err(XrefError::LogicTable(format!(
                "Rule '{}' in family '{}' has invalid weight {}",
                rule.attribute_id, table.family_id, rule.weight
            )));
        }
        if let LogicType::IdentityUpgrade { upgrade_hierarchy } = &rule.logic {
            if upgrade_hierarchy.is_empty() {
                return Err(XrefError::LogicTable(format!(
                    "Rule '{}' in family '{}' has an empty upgrade hierarchy",
                    rule.attribute_id, table.family_id
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::default_tables;
    use crate::logic::types::MatchingRule;

    fn table(family_id: &str, patterns: &[&str]) -> LogicTable {
        LogicTable {
            family_id: family_id.to_string(),
            family_name: family_id.to_uppercase(),
            category: "Test".to_string(),
            description: String::new(),
            subcategory_patterns: patterns.iter().map(|p| p.to_string()).collect(),
            context_questions: vec![],
            rules: vec![rule("value", 5.0)],
        }
    }

    fn rule(attribute_id: &str, weight: f64) -> MatchingRule {
        MatchingRule {
            attribute_id: attribute_id.to_string(),
            attribute_name: attribute_id.to_string(),
            weight,
            engineering_reason: String::new(),
            logic: LogicType::Identity,
        }
    }

    #[test]
    fn test_default_registry_builds() {
        let registry = LogicTableRegistry::new(default_tables()).unwrap();
        assert_eq!(registry.list_all().len(), 5);
        assert_eq!(registry.version(), Some("2026.10"));
        assert!(registry.get_table("mlcc").is_some());
        assert!(registry.get_table("nonexistent").is_none());
    }

    #[test]
    fn test_subcategory_is_case_insensitive_substring() {
        let registry = LogicTableRegistry::new(default_tables()).unwrap();
        let table = registry
            .get_table_for_subcategory("CERAMIC CAPACITORS")
            .expect("should resolve");
        assert_eq!(table.family_id, "mlcc");

        let table = registry
            .get_table_for_subcategory("Aluminum Electrolytic Capacitors")
            .expect("should resolve");
        assert_eq!(table.family_id, "alum_electrolytic");

        assert!(registry.get_table_for_subcategory("Crystals").is_none());
    }

    #[test]
    fn test_longest_pattern_wins() {
        let registry = LogicTableRegistry::from_tables(vec![
            table("generic", &["capacitor"]),
            table("tantalum", &["tantalum capacitor"]),
        ])
        .unwrap();

        let hit = registry
            .get_table_for_subcategory("Tantalum Capacitors")
            .unwrap();
        assert_eq!(hit.family_id, "tantalum");

        let hit = registry.get_table_for_subcategory("Film Capacitors").unwrap();
        assert_eq!(hit.family_id, "generic");
    }

    #[test]
    fn test_equal_length_patterns_use_registration_order() {
        let registry = LogicTableRegistry::from_tables(vec![
            table("first", &["diode"]),
            table("second", &["array"]),
        ])
        .unwrap();
        let hit = registry.get_table_for_subcategory("Diode Array").unwrap();
        assert_eq!(hit.family_id, "first");
    }

    #[test]
    fn test_duplicate_family_rejected() {
        let result =
            LogicTableRegistry::from_tables(vec![table("dup", &[]), table("dup", &[])]);
        assert!(matches!(result, Err(XrefError::LogicTable(_))));
    }

    #[test]
    fn test_duplicate_attribute_rejected() {
        let mut t = table("fam", &[]);
        t.rules.push(rule("value", 1.0));
        let result = LogicTableRegistry::from_tables(vec![t]);
        assert!(matches!(result, Err(XrefError::LogicTable(_))));
    }

    #[test]
    fn test_negative_weight_rejected() {
        let mut t = table("fam", &[]);
        t.rules.push(rule("other", -1.0));
        assert!(LogicTableRegistry::from_tables(vec![t]).is_err());
    }

    #[test]
    fn test_empty_hierarchy_rejected() {
        let mut t = table("fam", &[]);
        t.rules.push(MatchingRule {
            logic: LogicType::IdentityUpgrade {
                upgrade_hierarchy: vec![],
            },
            ..rule("grade", 2.0)
        });
        assert!(LogicTableRegistry::from_tables(vec![t]).is_err());
    }

    #[test]
    fn test_context_questions() {
        let registry = LogicTableRegistry::new(default_tables()).unwrap();
        let questions = registry.context_questions("mlcc");
        assert_eq!(questions.len(), 1);
        assert!(questions[0].attribute_ids.contains(&"dc_bias".to_string()));
        assert!(registry.context_questions("nonexistent").is_empty());
    }

    #[test]
    fn test_registry_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LogicTableRegistry>();
    }
}
