/*!
 * Mock backend implementations for testing.
 *
 * - `MockTranslator::working()` - always succeeds with a tagged translation
 * - `MockTranslator::failing()` - always fails with a non-zero exit
 * - `MockTranslator::slow(ms)` - sleeps before answering (for timeout testing)
 * - `MockClassicalScorer` / `MockNeuralScorer` - return scripted outputs
 *
 * Every mock counts its calls so tests can assert which evaluators ran.
 */

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{
    ClassicalRequest, ClassicalResponse, ClassicalScorer, NeuralRequest, NeuralResponse,
    NeuralScorer, TranslateRequest, TranslateResponse, TranslationBackend,
};
use crate::errors::BackendError;

/// Behavior mode for the mock translator
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with `[<target>] <source>`
    Working,
    /// Fails with a non-zero exit
    Failing,
    /// Answers with an explicit error field
    Reported,
    /// Answers with an empty translation
    Empty,
    /// Answers with sentinel tokens around the translation
    Noisy,
    /// Answers with the source text unchanged
    Echo,
    /// Sleeps before succeeding
    Slow { delay_ms: u64 },
}

/// Mock translation backend
#[derive(Debug, Clone)]
pub struct MockTranslator {
    behavior: MockBehavior,
    overrides: HashMap<String, MockBehavior>,
    request_count: Arc<AtomicUsize>,
}

impl MockTranslator {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            overrides: HashMap::new(),
            request_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Use a different behavior for one source text
    pub fn with_override(mut self, source_text: impl Into<String>, behavior: MockBehavior) -> Self {
        self.overrides.insert(source_text.into(), behavior);
        self
    }

    /// Number of translate calls received so far
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Expected output of the `Working` behavior
    pub fn expected_translation(source_text: &str, target_language: &str) -> String {
        format!("[{}] {}", target_language, source_text)
    }
}

#[async_trait]
impl TranslationBackend for MockTranslator {
    async fn translate(&self, request: TranslateRequest) -> Result<TranslateResponse, BackendError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);

        let behavior = self
            .overrides
            .get(&request.source_text)
            .copied()
            .unwrap_or(self.behavior);

        let translation = Self::expected_translation(&request.source_text, &request.target_language);
        let ok = |translation: String| -> Result<TranslateResponse, BackendError> {
            Ok(TranslateResponse {
                version: Some(super::PROTOCOL_VERSION),
                translation,
                error: None,
            })
        };

        match behavior {
            MockBehavior::Working => ok(translation),
            MockBehavior::Failing => Err(BackendError::NonZeroExit {
                code: Some(1),
                stderr: "Simulated backend failure".to_string(),
            }),
            MockBehavior::Reported => Ok(TranslateResponse {
                version: Some(super::PROTOCOL_VERSION),
                translation: String::new(),
                error: Some("Simulated model error".to_string()),
            }),
            MockBehavior::Empty => ok(String::new()),
            MockBehavior::Noisy => ok(format!("__fra_Latn__ {}</s><pad>", translation)),
            MockBehavior::Echo => ok(request.source_text.clone()),
            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                ok(translation)
            }
        }
    }
}

/// Mock classical evaluator with a scripted outcome
#[derive(Debug, Clone)]
pub struct MockClassicalScorer {
    outcome: Result<ClassicalResponse, BackendError>,
    delay: Option<Duration>,
    request_count: Arc<AtomicUsize>,
}

impl MockClassicalScorer {
    pub fn returning(response: ClassicalResponse) -> Self {
        Self {
            outcome: Ok(response),
            delay: None,
            request_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Successful scoring with the given label tag
    pub fn with_label(label: &str) -> Self {
        Self::returning(ClassicalResponse {
            version: Some(super::PROTOCOL_VERSION),
            bleu_score: Some(48.2),
            chrf_score: Some(66.1),
            ter_score: Some(31.0),
            quality_label: Some(label.to_string()),
            error: None,
        })
    }

    pub fn failing(error: BackendError) -> Self {
        Self {
            outcome: Err(error),
            delay: None,
            request_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClassicalScorer for MockClassicalScorer {
    async fn score(&self, _request: ClassicalRequest) -> Result<ClassicalResponse, BackendError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.outcome.clone()
    }
}

/// Mock neural evaluator with a scripted outcome
#[derive(Debug, Clone)]
pub struct MockNeuralScorer {
    outcome: Result<NeuralResponse, BackendError>,
    delay: Option<Duration>,
    request_count: Arc<AtomicUsize>,
    last_request: Arc<parking_lot::Mutex<Option<NeuralRequest>>>,
}

impl MockNeuralScorer {
    pub fn returning(response: NeuralResponse) -> Self {
        Self {
            outcome: Ok(response),
            delay: None,
            request_count: Arc::new(AtomicUsize::new(0)),
            last_request: Arc::new(parking_lot::Mutex::new(None)),
        }
    }

    /// Successful scoring with a score and an optional quality level tag
    pub fn with_score(score: f64, quality_level: Option<&str>) -> Self {
        Self::returning(NeuralResponse {
            version: Some(super::PROTOCOL_VERSION),
            score: Some(score),
            confidence: None,
            mode: Some("reference_free".to_string()),
            variant: Some("metricx-24-hybrid".to_string()),
            quality_level: quality_level.map(str::to_string),
            error: None,
        })
    }

    pub fn failing(error: BackendError) -> Self {
        Self {
            outcome: Err(error),
            delay: None,
            request_count: Arc::new(AtomicUsize::new(0)),
            last_request: Arc::new(parking_lot::Mutex::new(None)),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// The most recent request received
    pub fn last_request(&self) -> Option<NeuralRequest> {
        self.last_request.lock().clone()
    }
}

#[async_trait]
impl NeuralScorer for MockNeuralScorer {
    async fn score(&self, request: NeuralRequest) -> Result<NeuralResponse, BackendError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock() = Some(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.outcome.clone()
    }
}
