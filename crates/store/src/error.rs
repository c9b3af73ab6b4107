use std::fmt;

#[derive(Debug)]
pub enum StoreError {
    /// Database could not be opened.
    Open(String),
    /// Snapshot write failed; the prior table contents are unchanged.
    Write { table: String, message: String },
    /// Read-back failed.
    Read { table: String, message: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open(msg) => write!(f, "cannot open database: {msg}"),
            Self::Write { table, message } => {
                write!(f, "cannot write table '{table}': {message}")
            }
            Self::Read { table, message } => {
                write!(f, "cannot read table '{table}': {message}")
            }
        }
    }
}

impl std::error::Error for StoreError {}
