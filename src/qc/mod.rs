//! Quality control over historical recommendation runs.
//!
//! Logs and feedback are pulled through a [`QcLogSource`], then rolled up
//! per family by [`aggregate`] into a [`QcAnalysisInput`] for reporting.

mod aggregate;
mod source;
pub mod stats;
pub mod store;
mod types;

pub use aggregate::{aggregate, MAX_EXAMPLES, UNKNOWN_FAMILY, UNKNOWN_LOGIC_TYPE, UNKNOWN_SOURCE};
pub use source::{collect_qc_input, QcLogSource};
pub use store::SqliteLogStore;
pub use types::*;
