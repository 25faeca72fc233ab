/*!
 * Error types for the transqa pipeline.
 *
 * The taxonomy follows the way failures propagate through the pipeline:
 * - `BackendError`: anything that went wrong across the process boundary
 * - `UnitFailure`: a single translation unit could not be translated (non-fatal)
 * - `EvaluatorFailure`: one quality evaluator produced no usable signal (non-fatal)
 * - `PipelineError`: failures surfaced to the caller (precondition, lookup, store)
 * - `AppError`: top-level wrapper used by the binary
 */

use std::time::Duration;

use thiserror::Error;

use crate::database::models::{RequestStatus, UnitStatus};
use crate::registry::EngineType;

/// Errors that can occur when invoking an external process
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    /// The external program could not be started
    #[error("Failed to spawn external process: {0}")]
    Spawn(String),

    /// The call did not answer within its timeout
    #[error("External call timed out after {after:?}")]
    Timeout {
        /// The timeout that elapsed
        after: Duration,
    },

    /// The program exited with a non-zero status
    #[error("External process exited with code {code:?}: {stderr}")]
    NonZeroExit {
        /// Exit code, if the process was not killed by a signal
        code: Option<i32>,
        /// Diagnostic text captured from stderr
        stderr: String,
    },

    /// The program answered but its output does not follow the contract
    #[error("Malformed external response: {0}")]
    MalformedResponse(String),

    /// The program answered with an explicit error field
    #[error("External process reported an error: {0}")]
    Reported(String),
}

/// Reason a unit could not be translated
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UnitFailureReason {
    /// The translation backend failed
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The backend answered with an empty translation
    #[error("Translation backend returned an empty translation")]
    EmptyTranslation,

    /// The unit's outcome could not be written to the store
    #[error("Failed to persist unit outcome: {0}")]
    Store(String),
}

/// A unit-level translation failure. Recorded against the unit, never fatal to the batch.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Translation failed for unit {unit_id}: {reason}")]
pub struct UnitFailure {
    /// Unit that failed
    pub unit_id: String,
    /// Why it failed
    pub reason: UnitFailureReason,
}

impl UnitFailure {
    pub fn new(unit_id: impl Into<String>, reason: impl Into<UnitFailureReason>) -> Self {
        Self {
            unit_id: unit_id.into(),
            reason: reason.into(),
        }
    }

    /// Whether the failure came from an elapsed timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self.reason, UnitFailureReason::Backend(BackendError::Timeout { .. }))
    }
}

/// Which quality evaluator failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluatorKind {
    Classical,
    Neural,
}

impl std::fmt::Display for EvaluatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvaluatorKind::Classical => write!(f, "classical"),
            EvaluatorKind::Neural => write!(f, "neural"),
        }
    }
}

/// A single evaluator failed. Absorbed by the reconciliation fallback.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{evaluator} evaluator failed: {source}")]
pub struct EvaluatorFailure {
    /// Evaluator that failed
    pub evaluator: EvaluatorKind,
    /// Underlying process-boundary error
    pub source: BackendError,
}

impl EvaluatorFailure {
    pub fn classical(source: BackendError) -> Self {
        Self {
            evaluator: EvaluatorKind::Classical,
            source,
        }
    }

    pub fn neural(source: BackendError) -> Self {
        Self {
            evaluator: EvaluatorKind::Neural,
            source,
        }
    }
}

/// Errors surfaced to callers of the pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The selected engine is not registered or not marked available
    #[error("Translation engine {0} is not available")]
    EngineUnavailable(EngineType),

    /// The engine is registered for a different language pair than the request asks for
    #[error("Engine {engine} translates {supported}, request asks for {requested}")]
    LanguagePairMismatch {
        engine: EngineType,
        supported: String,
        requested: String,
    },

    /// The request could not be created from the given input
    #[error("Invalid translation request: {0}")]
    InvalidRequest(String),

    /// No translation request with this id
    #[error("Translation request not found: {0}")]
    RequestNotFound(String),

    /// No translation unit with this id
    #[error("Translation unit not found: {0}")]
    UnitNotFound(String),

    /// The request is not in a state that allows the transition
    #[error("Invalid request transition from {from} to {to}")]
    InvalidTransition {
        from: RequestStatus,
        to: RequestStatus,
    },

    /// A review action was rejected
    #[error("Unit {unit_id} cannot move to {status}: {reason}")]
    ReviewRejected {
        unit_id: String,
        status: UnitStatus,
        reason: String,
    },

    /// Persistence failure
    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from the configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error from the pipeline
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
