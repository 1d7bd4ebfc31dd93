use thiserror::Error;

#[derive(Debug, Error)]
pub enum XrefError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Logic table error: {0}")]
    LogicTable(String),

    #[error("No logic table registered for family: {0}")]
    UnknownFamily(String),

    #[error("QC data fetch failed: {0}")]
    Fetch(String),

    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<XrefError> for String {
    fn from(err: XrefError) -> Self {
        err.to_string()
    }
}

pub type Result<T> = std::result::Result<T, XrefError>;
