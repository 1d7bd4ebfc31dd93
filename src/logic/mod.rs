//! Per-family logic tables that drive cross-reference matching.
//!
//! Tables are loaded from TOML (embedded defaults or a custom file) into an
//! immutable [`LogicTableRegistry`] that the matching engine and the QC
//! aggregator both read from.
//!
//! # Example
//!
//! ```ignore
//! use xrefmate::logic::{default_tables, LogicTableRegistry};
//!
//! let registry = LogicTableRegistry::new(default_tables())?;
//! let table = registry.get_table_for_subcategory("Ceramic Capacitors").unwrap();
//! println!("{} rules, total weight {}", table.rules.len(), table.total_weight());
//! ```

mod registry;
mod tables;
mod types;

pub use registry::LogicTableRegistry;
pub use tables::{default_tables, load_tables, parse_tables};
pub use types::*;
