use std::fmt;

use crate::run::Stage;

#[derive(Debug)]
pub enum PipelineError {
    /// Configuration could not be parsed or validated.
    Config(String),
    /// A fatal stage failed; downstream stages did not execute.
    Stage { stage: Stage, message: String },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config error: {msg}"),
            Self::Stage { stage, message } => write!(f, "{stage} failed: {message}"),
        }
    }
}

impl std::error::Error for PipelineError {}
