//! Cross-reference matching of candidate parts against a source part.
//!
//! # Architecture
//!
//! - **Evaluation**: source + candidate + logic table -> per-rule match details
//! - **Scoring**: details -> weighted match percentage
//! - **Ranking**: scored candidates -> ordered recommendations
//! - **Missing attributes**: rule attributes the source has no value for
//!
//! Everything here is synchronous and side-effect free.
//!
//! # Example
//!
//! ```ignore
//! use xrefmate::logic::{default_tables, LogicTableRegistry};
//! use xrefmate::matching::{MatchingEngine, MatchRequest};
//!
//! let registry = LogicTableRegistry::new(default_tables())?;
//! let engine = MatchingEngine::new(&registry);
//! let outcome = engine.recommend(&request)?;
//!
//! for rec in outcome.recommendations {
//!     println!("{}: {}%", rec.part.mpn, rec.match_percentage);
//! }
//! ```

mod engine;
mod missing;
mod ranker;
mod types;
pub mod value;

pub use engine::{apply_overrides, evaluate, score, MatchingEngine};
pub use missing::{critical_missing, detect_missing, DEFAULT_CRITICAL_WEIGHT};
pub use ranker::{rank, top_n};
pub use types::*;
