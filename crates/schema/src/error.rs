use std::fmt;

/// Why a single row was rejected. Row-level only: a reject never aborts the
/// batch it came from.
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    /// Required field absent, null, or empty after trimming.
    MissingField(String),
    /// Value could not be coerced to the declared type.
    TypeMismatch { field: String, value: String },
    /// Value coerced but violates a declared bound.
    ConstraintViolation { field: String, rule: String },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "missing required field '{field}'"),
            Self::TypeMismatch { field, value } => {
                write!(f, "field '{field}': cannot coerce '{value}'")
            }
            Self::ConstraintViolation { field, rule } => {
                write!(f, "field '{field}': violates {rule}")
            }
        }
    }
}

impl std::error::Error for RejectReason {}
