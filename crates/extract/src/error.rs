use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ExtractError {
    /// Required file/table/endpoint does not exist.
    SourceUnavailable(String),
    /// Transport-level failure reaching an external source.
    Network(String),
    /// Structural mismatch in fetched data (no table, wrong column count).
    Parse(String),
    /// Every configured provider failed for one enrichment key.
    ProviderExhausted { key: String },
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourceUnavailable(what) => write!(f, "source unavailable: {what}"),
            Self::Network(msg) => write!(f, "network error: {msg}"),
            Self::Parse(msg) => write!(f, "parse error: {msg}"),
            Self::ProviderExhausted { key } => {
                write!(f, "all providers failed for key '{key}'")
            }
        }
    }
}

impl std::error::Error for ExtractError {}
