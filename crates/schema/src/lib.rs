//! `shipdash-schema` - Row-level schema validation.
//!
//! Pure crate: receives untyped rows, returns typed, normalized records or
//! per-row rejection reasons. No IO dependencies.

pub mod error;
pub mod record;
pub mod schema;
pub mod value;

pub use error::RejectReason;
pub use record::{RawRecord, ValidatedRecord};
pub use schema::{BatchOutcome, FieldKind, FieldSpec, RowReject, Schema};
pub use value::Value;
