/*!
 * Quality labels and the reconciliation policy.
 *
 * Evaluator tags arrive as free-form strings. Every tag is mapped through an
 * exhaustive match into one of the enumerations below; anything else is treated
 * as "no signal" rather than passed through.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Neural score at or below which a translation is EXCELLENT
pub const EXCELLENT_MAX_SCORE: f64 = 7.0;
/// Neural score at or below which a translation is GOOD
pub const GOOD_MAX_SCORE: f64 = 12.0;
/// Neural score at or below which a translation is FAIR
pub const FAIR_MAX_SCORE: f64 = 18.0;
/// Upper bound of the nominal neural score range
pub const NEURAL_SCORE_RANGE: f64 = 25.0;

/// Unified verdict for a translation unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualityLabel {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl QualityLabel {
    /// Conservative label used when no evaluator produced a usable signal
    pub const DEFAULT: QualityLabel = QualityLabel::Poor;

    /// Parse an evaluator tag; tags outside the four labels yield `None`
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().as_str() {
            "excellent" => Some(QualityLabel::Excellent),
            "good" => Some(QualityLabel::Good),
            "fair" => Some(QualityLabel::Fair),
            "poor" => Some(QualityLabel::Poor),
            _ => None,
        }
    }

    /// Derive a label from a neural score (lower is better)
    pub fn from_neural_score(score: f64) -> Self {
        if score <= EXCELLENT_MAX_SCORE {
            QualityLabel::Excellent
        } else if score <= GOOD_MAX_SCORE {
            QualityLabel::Good
        } else if score <= FAIR_MAX_SCORE {
            QualityLabel::Fair
        } else {
            QualityLabel::Poor
        }
    }
}

impl fmt::Display for QualityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityLabel::Excellent => write!(f, "EXCELLENT"),
            QualityLabel::Good => write!(f, "GOOD"),
            QualityLabel::Fair => write!(f, "FAIR"),
            QualityLabel::Poor => write!(f, "POOR"),
        }
    }
}

impl std::str::FromStr for QualityLabel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_tag(s).ok_or_else(|| anyhow::anyhow!("Invalid quality label: {}", s))
    }
}

/// Whether the neural evaluator scored against a reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvaluationMode {
    ReferenceBased,
    ReferenceFree,
}

impl EvaluationMode {
    /// Normalize a mode tag such as `reference_based` or `reference_free_fallback`
    pub fn from_tag(tag: &str) -> Self {
        let tag = tag.to_lowercase();
        if tag.contains("reference_based") || tag.contains("reference-based") {
            EvaluationMode::ReferenceBased
        } else {
            EvaluationMode::ReferenceFree
        }
    }
}

impl fmt::Display for EvaluationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluationMode::ReferenceBased => write!(f, "REFERENCE_BASED"),
            EvaluationMode::ReferenceFree => write!(f, "REFERENCE_FREE"),
        }
    }
}

impl std::str::FromStr for EvaluationMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "REFERENCE_BASED" => Ok(EvaluationMode::ReferenceBased),
            "REFERENCE_FREE" => Ok(EvaluationMode::ReferenceFree),
            _ => Err(anyhow::anyhow!("Invalid evaluation mode: {}", s)),
        }
    }
}

/// Neural model variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NeuralVariant {
    Metricx24Hybrid,
    Metricx24Xl,
    Metricx24Xxl,
}

impl NeuralVariant {
    /// Normalize a variant tag; unknown variants map to the hybrid model
    pub fn from_tag(tag: &str) -> Self {
        let normalized = tag.to_uppercase().replace('-', "_");
        if normalized.contains("HYBRID") {
            NeuralVariant::Metricx24Hybrid
        } else if normalized.contains("XXL") {
            NeuralVariant::Metricx24Xxl
        } else if normalized.contains("XL") {
            NeuralVariant::Metricx24Xl
        } else {
            NeuralVariant::Metricx24Hybrid
        }
    }
}

impl fmt::Display for NeuralVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NeuralVariant::Metricx24Hybrid => write!(f, "METRICX_24_HYBRID"),
            NeuralVariant::Metricx24Xl => write!(f, "METRICX_24_XL"),
            NeuralVariant::Metricx24Xxl => write!(f, "METRICX_24_XXL"),
        }
    }
}

impl std::str::FromStr for NeuralVariant {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "METRICX_24_HYBRID" => Ok(NeuralVariant::Metricx24Hybrid),
            "METRICX_24_XL" => Ok(NeuralVariant::Metricx24Xl),
            "METRICX_24_XXL" => Ok(NeuralVariant::Metricx24Xxl),
            _ => Err(anyhow::anyhow!("Invalid neural variant: {}", s)),
        }
    }
}

/// Reconciliation rule that produced a label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LabelSource {
    NeuralLabel,
    ClassicalLabel,
    NeuralScore,
    Default,
}

impl fmt::Display for LabelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelSource::NeuralLabel => write!(f, "NEURAL_LABEL"),
            LabelSource::ClassicalLabel => write!(f, "CLASSICAL_LABEL"),
            LabelSource::NeuralScore => write!(f, "NEURAL_SCORE"),
            LabelSource::Default => write!(f, "DEFAULT"),
        }
    }
}

impl std::str::FromStr for LabelSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEURAL_LABEL" => Ok(LabelSource::NeuralLabel),
            "CLASSICAL_LABEL" => Ok(LabelSource::ClassicalLabel),
            "NEURAL_SCORE" => Ok(LabelSource::NeuralScore),
            "DEFAULT" => Ok(LabelSource::Default),
            _ => Err(anyhow::anyhow!("Invalid label source: {}", s)),
        }
    }
}

/// Signals available to the reconciliation policy
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LabelSignals {
    /// Recognized label from the neural evaluator
    pub neural_label: Option<QualityLabel>,
    /// Recognized label from the classical evaluator (only when it ran)
    pub classical_label: Option<QualityLabel>,
    /// Numeric neural score
    pub neural_score: Option<f64>,
}

/// Apply the reconciliation rules in order; the first matching rule wins.
pub fn reconcile(signals: &LabelSignals) -> (QualityLabel, LabelSource) {
    if let Some(label) = signals.neural_label {
        return (label, LabelSource::NeuralLabel);
    }
    if let Some(label) = signals.classical_label {
        return (label, LabelSource::ClassicalLabel);
    }
    if let Some(score) = signals.neural_score.filter(|s| s.is_finite()) {
        return (QualityLabel::from_neural_score(score), LabelSource::NeuralScore);
    }
    (QualityLabel::DEFAULT, LabelSource::Default)
}

/// Confidence derived from a neural score when the evaluator does not report one
pub fn derived_confidence(score: f64) -> f64 {
    (1.0 - score / NEURAL_SCORE_RANGE).clamp(0.7, 0.95)
}
