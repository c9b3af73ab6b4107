//! `shipdash-pipeline` - run orchestration.
//!
//! Sequences extraction, validation, reconciliation, and persistence for a
//! single batch run. Stage failures are classified by an explicit policy
//! table: fatal stages halt the run, degradable stages are recorded and
//! skipped. Every collaborator is injected; nothing is looked up from
//! ambient global state.

pub mod config;
pub mod error;
pub mod run;
pub mod schemas;

pub use config::PipelineConfig;
pub use error::PipelineError;
pub use run::{failure_class, run, FailureClass, RunId, RunReport, Sources, Stage, StageStatus};
