/*!
 * Database entity models.
 *
 * These structures map directly to database tables and provide
 * type-safe access to persisted data.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::quality::label::{EvaluationMode, LabelSource, NeuralVariant, QualityLabel};
use crate::registry::EngineType;

/// Lifecycle status of a translation request (a batch)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    /// Created, not submitted yet
    Draft,
    /// Units are being translated
    InProgress,
    /// Every unit reached a terminal status
    Completed,
    /// Unrecoverable precondition failure
    Failed,
}

impl RequestStatus {
    /// Whether the request can no longer change status
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Completed | RequestStatus::Failed)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestStatus::Draft => write!(f, "DRAFT"),
            RequestStatus::InProgress => write!(f, "IN_PROGRESS"),
            RequestStatus::Completed => write!(f, "COMPLETED"),
            RequestStatus::Failed => write!(f, "FAILED"),
        }
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "DRAFT" => Ok(RequestStatus::Draft),
            "IN_PROGRESS" => Ok(RequestStatus::InProgress),
            "COMPLETED" => Ok(RequestStatus::Completed),
            "FAILED" => Ok(RequestStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid request status: {}", s)),
        }
    }
}

/// Status of an individual translation unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitStatus {
    /// Awaiting translation
    Draft,
    /// Handed to the execution engine
    InProgress,
    /// Translated and awaiting approval
    Reviewed,
    /// Approved by a reviewer
    Approved,
    /// Translation failed
    Failed,
}

impl UnitStatus {
    /// Terminal per-unit statuses for the batch run
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UnitStatus::Reviewed | UnitStatus::Approved | UnitStatus::Failed
        )
    }

    /// Statuses that require a non-empty translation
    pub fn requires_translation(&self) -> bool {
        matches!(self, UnitStatus::Reviewed | UnitStatus::Approved)
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitStatus::Draft => write!(f, "DRAFT"),
            UnitStatus::InProgress => write!(f, "IN_PROGRESS"),
            UnitStatus::Reviewed => write!(f, "REVIEWED"),
            UnitStatus::Approved => write!(f, "APPROVED"),
            UnitStatus::Failed => write!(f, "FAILED"),
        }
    }
}

impl std::str::FromStr for UnitStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "DRAFT" => Ok(UnitStatus::Draft),
            "IN_PROGRESS" => Ok(UnitStatus::InProgress),
            "REVIEWED" => Ok(UnitStatus::Reviewed),
            "APPROVED" => Ok(UnitStatus::Approved),
            "FAILED" => Ok(UnitStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid unit status: {}", s)),
        }
    }
}

/// A batch of units sharing a source language and an engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationRequest {
    /// Unique request identifier (UUID)
    pub id: String,
    /// Source language code
    pub source_language: String,
    /// Ordered target language codes
    pub target_languages: Vec<String>,
    /// Selected translation engine
    pub engine_type: EngineType,
    /// Lifecycle status
    pub status: RequestStatus,
    /// Number of whitespace-separated words across the source texts
    pub word_count: i64,
    /// Number of characters across the source texts
    pub char_count: i64,
    /// Name of the file the texts came from, if any
    pub file_name: Option<String>,
    /// Creation timestamp (RFC 3339)
    pub created_at: String,
    /// Last update timestamp (RFC 3339)
    pub updated_at: String,
    /// Completion timestamp, set when the request reaches a terminal status
    pub completed_at: Option<String>,
}

impl TranslationRequest {
    /// Create a new DRAFT request
    pub fn new(
        source_language: String,
        target_languages: Vec<String>,
        engine_type: EngineType,
        source_texts: &[String],
        file_name: Option<String>,
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source_language,
            target_languages,
            engine_type,
            status: RequestStatus::Draft,
            word_count: source_texts
                .iter()
                .map(|t| t.split_whitespace().count() as i64)
                .sum(),
            char_count: source_texts.iter().map(|t| t.chars().count() as i64).sum(),
            file_name,
            created_at: now.clone(),
            updated_at: now,
            completed_at: None,
        }
    }

    /// Short identifier for log lines
    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }
}

/// One source segment bound to one target language
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationUnit {
    /// Unique unit identifier (UUID)
    pub id: String,
    /// Owning request
    pub request_id: String,
    /// Position inside the request
    pub seq_num: i64,
    /// Source text
    pub source_text: String,
    /// Translated text, empty until processed; holds the post-edit once a reviewer edits it
    pub translated_text: String,
    /// Machine output preserved when a reviewer first replaced it
    pub original_translation: Option<String>,
    /// Target language code
    pub target_language: String,
    /// Unit status
    pub status: UnitStatus,
    /// Wall-clock duration of the last translation call
    pub processing_time_ms: Option<i64>,
    /// Reason of the last failure, if any
    pub error_message: Option<String>,
    /// Number of translation attempts
    pub attempt_count: i64,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

impl TranslationUnit {
    /// Create a new DRAFT unit
    pub fn new(
        request_id: String,
        seq_num: i64,
        source_text: String,
        target_language: String,
    ) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            request_id,
            seq_num,
            source_text,
            translated_text: String::new(),
            original_translation: None,
            target_language,
            status: UnitStatus::Draft,
            processing_time_ms: None,
            error_message: None,
            attempt_count: 0,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn has_translation(&self) -> bool {
        !self.translated_text.trim().is_empty()
    }

    /// Text produced by the engine, before any post-editing
    pub fn machine_translation(&self) -> &str {
        self.original_translation
            .as_deref()
            .unwrap_or(&self.translated_text)
    }

    /// Reviewer's post-edit, when it differs from the machine output
    pub fn post_edit(&self) -> Option<&str> {
        let original = self.original_translation.as_deref()?;
        let edited = self.translated_text.trim();
        if edited.is_empty() || edited == original.trim() || !self.status.requires_translation() {
            return None;
        }
        Some(edited)
    }

    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }
}

/// Outcome of one translation attempt, written back onto the unit
#[derive(Debug, Clone)]
pub struct UnitResult {
    /// New unit status (REVIEWED or FAILED)
    pub status: UnitStatus,
    /// Translated text; `None` leaves the stored text untouched
    pub translated_text: Option<String>,
    /// Duration of the call
    pub processing_time_ms: i64,
    /// Failure reason
    pub error_message: Option<String>,
}

/// Three opaque numeric outputs of the classical evaluator
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ClassicalScores {
    pub bleu: Option<f64>,
    pub chrf: Option<f64>,
    pub ter: Option<f64>,
}

impl ClassicalScores {
    pub fn is_empty(&self) -> bool {
        self.bleu.is_none() && self.chrf.is_none() && self.ter.is_none()
    }
}

/// Immutable result of one quality evaluation run for a unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityRecord {
    /// Unique record identifier (UUID)
    pub id: String,
    /// Evaluated unit
    pub unit_id: String,
    /// Whether a reference translation was supplied
    pub has_reference: bool,
    /// Classical metrics, present only when the classical evaluator ran successfully
    pub classical: Option<ClassicalScores>,
    /// Label reported by the classical evaluator
    pub classical_label: Option<QualityLabel>,
    /// Neural score (lower is better, 0-25 nominal)
    pub neural_score: Option<f64>,
    /// Neural confidence (0-1)
    pub neural_confidence: Option<f64>,
    /// Whether the neural evaluator used the reference
    pub evaluation_mode: Option<EvaluationMode>,
    /// Neural model variant
    pub neural_variant: Option<NeuralVariant>,
    /// Label reported by the neural evaluator
    pub neural_label: Option<QualityLabel>,
    /// Unified verdict
    pub quality_label: QualityLabel,
    /// Reconciliation rule that produced the verdict
    pub label_source: LabelSource,
    /// Creation timestamp
    pub created_at: String,
}

/// A translation engine known to the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineRegistration {
    /// Engine type identifier
    pub engine_type: EngineType,
    /// Human-readable name
    pub name: String,
    /// Source language code
    pub source_language: String,
    /// Target language code
    pub target_language: String,
    /// Whether the engine can currently be used
    pub is_available: bool,
    /// Local resource handle (model path or endpoint)
    pub resource_handle: String,
    /// Last update timestamp
    pub updated_at: String,
}

impl EngineRegistration {
    /// Create an available registration using the engine's catalogue defaults
    pub fn new(engine_type: EngineType, resource_handle: impl Into<String>) -> Self {
        let (source_language, target_language) = engine_type.default_language_pair();
        Self {
            engine_type,
            name: engine_type.display_name().to_string(),
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
            is_available: true,
            resource_handle: resource_handle.into(),
            updated_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
