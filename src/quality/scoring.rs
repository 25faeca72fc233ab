/*!
 * Scoring adapter.
 *
 * Uniform front for the two external evaluators. Raw evaluator answers are
 * normalized here: tags become enums, non-finite numbers are dropped, and an
 * explicit error field becomes an `EvaluatorFailure`.
 */

use log::warn;
use std::sync::Arc;
use std::time::Duration;

use super::label::{derived_confidence, EvaluationMode, NeuralVariant, QualityLabel};
use crate::backends::{
    with_timeout, ClassicalRequest, ClassicalScorer, NeuralRequest, NeuralScorer,
    PROTOCOL_VERSION,
};
use crate::database::models::ClassicalScores;
use crate::errors::{BackendError, EvaluatorFailure};

/// Normalized classical evaluator output
#[derive(Debug, Clone, PartialEq)]
pub struct ClassicalSignal {
    pub scores: ClassicalScores,
    /// Recognized label; `None` for non-label tags such as `NO_REFERENCE`
    pub label: Option<QualityLabel>,
}

/// Normalized neural evaluator output
#[derive(Debug, Clone, PartialEq)]
pub struct NeuralSignal {
    pub score: Option<f64>,
    pub confidence: Option<f64>,
    pub mode: EvaluationMode,
    pub variant: NeuralVariant,
    pub label: Option<QualityLabel>,
}

/// Uniform interface over the classical and neural evaluators
#[derive(Debug, Clone)]
pub struct ScoringAdapter {
    classical: Arc<dyn ClassicalScorer>,
    neural: Arc<dyn NeuralScorer>,
    classical_timeout: Duration,
    neural_timeout: Duration,
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

fn reported_error(error: Option<String>) -> Option<String> {
    error.filter(|e| !e.trim().is_empty())
}

impl ScoringAdapter {
    pub fn new(
        classical: Arc<dyn ClassicalScorer>,
        neural: Arc<dyn NeuralScorer>,
        classical_timeout: Duration,
        neural_timeout: Duration,
    ) -> Self {
        Self {
            classical,
            neural,
            classical_timeout,
            neural_timeout,
        }
    }

    /// Score a hypothesis against a reference with the classical evaluator
    pub async fn score_classical(
        &self,
        hypothesis: &str,
        reference: &str,
    ) -> Result<ClassicalSignal, EvaluatorFailure> {
        let request = ClassicalRequest {
            version: PROTOCOL_VERSION,
            hypothesis: hypothesis.to_string(),
            reference: reference.to_string(),
        };

        let response = with_timeout(self.classical_timeout, self.classical.score(request))
            .await
            .map_err(|e| {
                warn!("Classical evaluator failed: {}", e);
                EvaluatorFailure::classical(e)
            })?;

        if let Some(message) = reported_error(response.error) {
            warn!("Classical evaluator reported an error: {}", message);
            return Err(EvaluatorFailure::classical(BackendError::Reported(message)));
        }

        Ok(ClassicalSignal {
            scores: ClassicalScores {
                bleu: finite(response.bleu_score),
                chrf: finite(response.chrf_score),
                ter: finite(response.ter_score),
            },
            label: response.quality_label.as_deref().and_then(QualityLabel::from_tag),
        })
    }

    /// Score a hypothesis with the neural evaluator, with or without a reference
    pub async fn score_neural(
        &self,
        source: &str,
        hypothesis: &str,
        reference: Option<&str>,
    ) -> Result<NeuralSignal, EvaluatorFailure> {
        let request = NeuralRequest {
            version: PROTOCOL_VERSION,
            source: source.to_string(),
            hypothesis: hypothesis.to_string(),
            reference: reference.map(str::to_string),
        };

        let response = with_timeout(self.neural_timeout, self.neural.score(request))
            .await
            .map_err(|e| {
                warn!("Neural evaluator failed: {}", e);
                EvaluatorFailure::neural(e)
            })?;

        if let Some(message) = reported_error(response.error) {
            warn!("Neural evaluator reported an error: {}", message);
            return Err(EvaluatorFailure::neural(BackendError::Reported(message)));
        }

        let score = finite(response.score);
        let confidence = finite(response.confidence)
            .map(|c| c.clamp(0.0, 1.0))
            .or_else(|| score.map(derived_confidence));

        let mode = match response.mode.as_deref() {
            Some(tag) => EvaluationMode::from_tag(tag),
            None if reference.is_some() => EvaluationMode::ReferenceBased,
            None => EvaluationMode::ReferenceFree,
        };

        Ok(NeuralSignal {
            score,
            confidence,
            mode,
            variant: response
                .variant
                .as_deref()
                .map(NeuralVariant::from_tag)
                .unwrap_or(NeuralVariant::Metricx24Hybrid),
            label: response.quality_level.as_deref().and_then(QualityLabel::from_tag),
        })
    }
}
