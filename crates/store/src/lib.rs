//! `shipdash-store` - result table persistence.
//!
//! Every write replaces a whole table in one transaction: either the new
//! snapshot lands completely or the prior contents survive untouched. Each
//! persisted row carries the pipeline run identifier.

pub mod error;
pub mod table;

pub use error::StoreError;
pub use table::{ColumnKind, ColumnSpec, TableSpec, TableStore, RUN_ID_COLUMN};
