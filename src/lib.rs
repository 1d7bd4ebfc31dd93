pub mod batch;
pub mod config;
mod error;
pub mod logic;
pub mod matching;
pub mod qc;

pub use config::EngineConfig;
pub use error::{Result, XrefError};
pub use logic::LogicTableRegistry;
pub use matching::MatchingEngine;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence; `default_filter` applies when it is unset or
/// invalid. Calling this more than once is harmless.
pub fn init_tracing(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
