use std::fmt;
use thiserror::Error;

/// Where in a run an invariant was broken. Every field is optional as some checks happen before
/// any request has been processed (e.g. allocation sums)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunContext {
    pub experiment: Option<usize>,
    pub replication: Option<usize>,
    pub request: Option<u64>,
}

impl RunContext {
    pub fn experiment(index: usize) -> Self {
        Self { experiment: Some(index), ..Self::default() }
    }

    pub fn with_replication(self, replication: usize) -> Self {
        Self { replication: Some(replication), ..self }
    }

    pub fn with_request(self, request: u64) -> Self {
        Self { request: Some(request), ..self }
    }
}

impl fmt::Display for RunContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = [("experiment", self.experiment.map(|e| e as u64)), ("replication", self.replication.map(|r| r as u64)), ("request", self.request)];
        let formatted = fields
            .iter()
            .filter_map(|(name, value)| value.map(|v| format!("{name} {v}")))
            .reduce(|a, b| format!("{a}, {b}"));
        match formatted {
            Some(s) => write!(f, "{s}"),
            None => write!(f, "outside of any run"),
        }
    }
}

/// Errors produced by the simulation engine
///
/// Configuration errors are recoverable at the granularity of a single experiment: the queue runner
/// records them and moves on. Invariant violations indicate a bug in the engine itself and stop the
/// run.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invariant violation ({context}): {message}")]
    InvariantViolation { context: RunContext, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Couldn't parse the experiment descriptor: {0}")]
    Parse(#[from] serde_json::Error),
}

impl SimError {
    pub fn config(message: impl Into<String>) -> Self {
        SimError::Configuration(message.into())
    }

    pub fn invariant(context: RunContext, message: impl Into<String>) -> Self {
        SimError::InvariantViolation { context, message: message.into() }
    }

    /// Fills in whichever context fields the raising site didn't know about
    pub fn in_context(self, outer: RunContext) -> Self {
        match self {
            SimError::InvariantViolation { context, message } => SimError::InvariantViolation {
                context: RunContext {
                    experiment: context.experiment.or(outer.experiment),
                    replication: context.replication.or(outer.replication),
                    request: context.request.or(outer.request),
                },
                message,
            },
            other => other,
        }
    }

    /// True for errors that should abort the whole queue rather than a single experiment
    pub fn is_fatal(&self) -> bool {
        matches!(self, SimError::InvariantViolation { .. })
    }
}

pub type SimResult<T> = Result<T, SimError>;
