//! TOML loading for logic tables.
//!
//! Provides two loading methods:
//! - `default_tables()` - Loads embedded tables compiled into the binary
//! - `load_tables(path)` - Loads a custom table set from a file path

use anyhow::Result;
use std::path::Path;

use super::types::LogicTablesConfig;

/// Default tables embedded in the binary at compile time.
/// These are loaded from `config/logic_tables.toml`.
const DEFAULT_TABLES: &str = include_str!("../../config/logic_tables.toml");

/// Load logic tables from a TOML file at the given path.
///
/// # Returns
/// * `Ok(LogicTablesConfig)` - Parsed table set
/// * `Err` - If file cannot be read or TOML is invalid
pub fn load_tables(path: &Path) -> Result<LogicTablesConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_tables(&content)
}

/// Parse a table set from TOML text.
pub fn parse_tables(content: &str) -> Result<LogicTablesConfig> {
    let config: LogicTablesConfig = toml::from_str(content)?;
    Ok(config)
}

/// Get the default tables embedded in the binary.
///
/// Covers ceramic capacitors, aluminum electrolytic capacitors, chip
/// resistors, MOSFETs and linear regulators.
///
/// # Panics
/// Panics if the embedded TOML is invalid (this would be a compile-time bug).
pub fn default_tables() -> LogicTablesConfig {
    parse_tables(DEFAULT_TABLES).expect("embedded logic_tables.toml must be valid TOML")
}
