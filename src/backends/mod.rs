/*!
 * Inference backends.
 *
 * Translation and quality scoring are performed by external programs. This
 * module defines the message contract exchanged with them and the traits the
 * pipeline calls through:
 * - `TranslationBackend`: turns one source text into a translation
 * - `ClassicalScorer`: overlap metrics against a reference
 * - `NeuralScorer`: learned error score, with or without a reference
 *
 * `process` implements the traits over a child process speaking JSON on
 * stdin/stdout; `mock` provides scripted implementations for tests.
 */

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use crate::errors::BackendError;
use crate::registry::EngineType;

pub mod mock;
pub mod process;

/// Version of the JSON message contract
pub const PROTOCOL_VERSION: u32 = 1;

fn protocol_version() -> u32 {
    PROTOCOL_VERSION
}

/// Request sent to a translation backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslateRequest {
    #[serde(default = "protocol_version")]
    pub version: u32,
    pub source_text: String,
    pub engine: EngineType,
    pub resource_handle: String,
    pub source_language: String,
    pub target_language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslateResponse {
    #[serde(default)]
    pub version: Option<u32>,
    #[serde(default)]
    pub translation: String,
    #[serde(default)]
    pub error: Option<String>,
}

/// Request sent to the classical evaluator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassicalRequest {
    #[serde(default = "protocol_version")]
    pub version: u32,
    pub hypothesis: String,
    pub reference: String,
}

/// Classical evaluator output. Metric names are opaque identifiers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassicalResponse {
    #[serde(default)]
    pub version: Option<u32>,
    #[serde(default)]
    pub bleu_score: Option<f64>,
    #[serde(default)]
    pub chrf_score: Option<f64>,
    #[serde(default)]
    pub ter_score: Option<f64>,
    /// Quality tag; may be a label or a non-label tag such as `NO_REFERENCE`
    #[serde(default)]
    pub quality_label: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Request sent to the neural evaluator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuralRequest {
    #[serde(default = "protocol_version")]
    pub version: u32,
    pub source: String,
    pub hypothesis: String,
    #[serde(default)]
    pub reference: Option<String>,
}

/// Neural evaluator output (score: lower is better)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NeuralResponse {
    #[serde(default)]
    pub version: Option<u32>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub variant: Option<String>,
    #[serde(default)]
    pub quality_level: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Something that can translate one unit of text
#[async_trait]
pub trait TranslationBackend: Send + Sync + Debug {
    async fn translate(&self, request: TranslateRequest) -> Result<TranslateResponse, BackendError>;
}

/// Classical overlap metrics; only called with a reference
#[async_trait]
pub trait ClassicalScorer: Send + Sync + Debug {
    async fn score(&self, request: ClassicalRequest) -> Result<ClassicalResponse, BackendError>;
}

/// Learned quality estimator
#[async_trait]
pub trait NeuralScorer: Send + Sync + Debug {
    async fn score(&self, request: NeuralRequest) -> Result<NeuralResponse, BackendError>;
}

/// Reject responses that declare a protocol version other than ours
pub fn check_version(version: Option<u32>) -> Result<(), BackendError> {
    match version {
        Some(v) if v != PROTOCOL_VERSION => Err(BackendError::MalformedResponse(format!(
            "unsupported protocol version {} (expected {})",
            v, PROTOCOL_VERSION
        ))),
        _ => Ok(()),
    }
}

/// Bound an external call by a timeout.
///
/// The future is dropped when the timeout elapses; process backends spawn
/// their children with `kill_on_drop` so nothing keeps running afterwards.
pub async fn with_timeout<T, F>(after: Duration, call: F) -> Result<T, BackendError>
where
    F: Future<Output = Result<T, BackendError>>,
{
    tokio::select! {
        result = call => result,
        _ = tokio::time::sleep(after) => Err(BackendError::Timeout { after }),
    }
}
