//! `shipdash-recon` - multi-source reconciliation engine.
//!
//! Pure engine crate: receives pre-loaded, already-normalized sources and
//! returns the merged master record set. No CLI or IO dependencies.
//!
//! Join keys must be normalized (trimmed, uppercased) before records reach
//! this crate; the engine never re-derives them.

pub mod merge;
pub mod model;

pub use merge::merge;
pub use model::{
    FuelQuote, MasterRecord, MergeInput, MergeOutput, MergeSummary, PrimaryRow, WeatherReading,
};
