/*!
 * Batch lifecycle management.
 *
 * Owns the state machine of a translation request:
 *
 * ```text
 * DRAFT --submit--> IN_PROGRESS --(all units terminal)--> COMPLETED
 * DRAFT --submit, engine unavailable or wrong language pair--> FAILED
 * IN_PROGRESS --(store failure stops the run)--> FAILED
 * ```
 *
 * Units are translated on a bounded worker pool. A unit failure is recorded
 * against that unit and never stops the batch.
 */

use futures::stream::{self, StreamExt};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;

use super::concurrency::{effective_concurrency, CancellationFlag, ProgressCounter};
use super::engine::ExecutionEngine;
use super::formatting::OutputCleaner;
use crate::database::models::{
    EngineRegistration, RequestStatus, TranslationRequest, TranslationUnit, UnitResult, UnitStatus,
};
use crate::database::store::Store;
use crate::errors::{PipelineError, UnitFailure, UnitFailureReason};
use crate::language_utils;
use crate::quality::label::QualityLabel;
use crate::registry::{EngineType, ModelRegistry};

/// Scheduling options of the lifecycle manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleOptions {
    /// Upper bound on units translated at the same time
    pub max_concurrent_units: usize,
    /// Extra passes over units that failed during the same run
    pub retry_failed_units: usize,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_concurrent_units: 4,
            retry_failed_units: 0,
        }
    }
}

/// Input for creating a DRAFT request
#[derive(Debug, Clone)]
pub struct NewTranslationRequest {
    pub source_language: String,
    pub target_languages: Vec<String>,
    pub engine_type: EngineType,
    pub source_texts: Vec<String>,
    pub file_name: Option<String>,
}

/// Result of one unit within a run
#[derive(Debug, Clone, PartialEq)]
pub enum UnitOutcome {
    Translated {
        unit_id: String,
        duration: Duration,
    },
    Failed(UnitFailure),
    /// Never dispatched because the run was cancelled
    Cancelled { unit_id: String },
}

impl UnitOutcome {
    pub fn unit_id(&self) -> &str {
        match self {
            UnitOutcome::Translated { unit_id, .. } => unit_id,
            UnitOutcome::Failed(failure) => &failure.unit_id,
            UnitOutcome::Cancelled { unit_id } => unit_id,
        }
    }
}

/// What happened during a `submit` run
#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub request_id: String,
    pub status: RequestStatus,
    pub total_units: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Failures of the units that are still FAILED at the end of the run
    pub failures: Vec<UnitFailure>,
    pub elapsed: Duration,
}

/// Per-unit line of a status report
#[derive(Debug, Clone)]
pub struct UnitReport {
    pub unit: TranslationUnit,
    pub latest_label: Option<QualityLabel>,
}

/// Read-only view of a request and its units
#[derive(Debug, Clone)]
pub struct BatchStatusReport {
    pub request: TranslationRequest,
    pub units: Vec<UnitReport>,
}

impl BatchStatusReport {
    /// Number of units with the given status
    pub fn count(&self, status: UnitStatus) -> usize {
        self.units.iter().filter(|u| u.unit.status == status).count()
    }

    pub fn counts(&self) -> HashMap<UnitStatus, usize> {
        let mut counts = HashMap::new();
        for report in &self.units {
            *counts.entry(report.unit.status).or_insert(0) += 1;
        }
        counts
    }

    /// Number of units per quality label, over units that have been evaluated
    pub fn label_counts(&self) -> HashMap<QualityLabel, usize> {
        let mut counts = HashMap::new();
        for label in self.units.iter().filter_map(|u| u.latest_label) {
            *counts.entry(label).or_insert(0) += 1;
        }
        counts
    }
}

/// Drives translation requests through their lifecycle
pub struct BatchLifecycleManager {
    store: Arc<dyn Store>,
    registry: Arc<ModelRegistry>,
    engine: ExecutionEngine,
    options: LifecycleOptions,
}

impl BatchLifecycleManager {
    pub fn new(
        store: Arc<dyn Store>,
        registry: Arc<ModelRegistry>,
        engine: ExecutionEngine,
        options: LifecycleOptions,
    ) -> Self {
        Self {
            store,
            registry,
            engine,
            options,
        }
    }

    /// Create a DRAFT request with one unit per (target language, source text)
    pub async fn create_request(
        &self,
        input: NewTranslationRequest,
    ) -> Result<TranslationRequest, PipelineError> {
        let source_language = language_utils::normalize_language_code(&input.source_language)
            .map_err(|e| PipelineError::InvalidRequest(e.to_string()))?;

        let mut target_languages: Vec<String> = Vec::new();
        for code in &input.target_languages {
            let normalized = language_utils::normalize_language_code(code)
                .map_err(|e| PipelineError::InvalidRequest(e.to_string()))?;
            if !target_languages.contains(&normalized) {
                target_languages.push(normalized);
            }
        }
        if target_languages.is_empty() {
            return Err(PipelineError::InvalidRequest(
                "at least one target language is required".to_string(),
            ));
        }

        let source_texts: Vec<String> = input
            .source_texts
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if source_texts.is_empty() {
            return Err(PipelineError::InvalidRequest(
                "at least one non-empty source text is required".to_string(),
            ));
        }

        let request = TranslationRequest::new(
            source_language,
            target_languages,
            input.engine_type,
            &source_texts,
            input.file_name,
        );

        let mut units = Vec::with_capacity(source_texts.len() * request.target_languages.len());
        for target in &request.target_languages {
            for text in &source_texts {
                units.push(TranslationUnit::new(
                    request.id.clone(),
                    units.len() as i64 + 1,
                    text.clone(),
                    target.clone(),
                ));
            }
        }

        self.store.create_request(&request, &units).await?;
        info!(
            "Created request {} ({} units, {} words, engine {})",
            request.short_id(),
            units.len(),
            request.word_count,
            request.engine_type
        );

        Ok(request)
    }

    /// Submit a DRAFT request and translate all of its units
    pub async fn submit(&self, request_id: &str) -> Result<BatchSummary, PipelineError> {
        self.submit_with_progress(request_id, &CancellationFlag::new(), |_, _| {})
            .await
    }

    /// Submit a DRAFT request, reporting progress and honoring cancellation.
    ///
    /// Fails with `EngineUnavailable` or `LanguagePairMismatch` (after
    /// persisting FAILED) when the request's engine cannot serve it; no unit
    /// is attempted in that case. A store failure that stops the run also
    /// leaves the request FAILED.
    pub async fn submit_with_progress<F>(
        &self,
        request_id: &str,
        cancel: &CancellationFlag,
        progress: F,
    ) -> Result<BatchSummary, PipelineError>
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        let started = Instant::now();
        let request = self.load_request(request_id).await?;

        if request.status != RequestStatus::Draft {
            return Err(PipelineError::InvalidTransition {
                from: request.status,
                to: RequestStatus::InProgress,
            });
        }

        let resolved = self
            .registry
            .resolve(request.engine_type)
            .await
            .and_then(|registration| Self::check_language_pair(&request, registration));
        let registration = match resolved {
            Ok(registration) => registration,
            Err(
                e @ (PipelineError::EngineUnavailable(_)
                | PipelineError::LanguagePairMismatch { .. }),
            ) => {
                error!(
                    "{}, request {} marked FAILED before any unit ran",
                    e,
                    request.short_id()
                );
                self.store
                    .update_request_status(&request.id, RequestStatus::Failed)
                    .await?;
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        self.store
            .update_request_status(&request.id, RequestStatus::InProgress)
            .await?;

        match self
            .run(&request, &registration, cancel, progress, started)
            .await
        {
            Ok(summary) => Ok(summary),
            Err(e) => {
                error!("Request {} aborted: {}", request.short_id(), e);
                if let Err(mark_error) = self
                    .store
                    .update_request_status(&request.id, RequestStatus::Failed)
                    .await
                {
                    error!(
                        "Could not mark request {} FAILED: {}",
                        request.short_id(),
                        mark_error
                    );
                }
                Err(e)
            }
        }
    }

    /// Fixed-pair engines only serve their registered source and target language
    fn check_language_pair(
        request: &TranslationRequest,
        registration: EngineRegistration,
    ) -> Result<EngineRegistration, PipelineError> {
        if !registration.engine_type.has_fixed_language_pair() {
            return Ok(registration);
        }

        let source_matches = language_utils::language_codes_match(
            &request.source_language,
            &registration.source_language,
        );
        let targets_match = request
            .target_languages
            .iter()
            .all(|t| language_utils::language_codes_match(t, &registration.target_language));
        if source_matches && targets_match {
            return Ok(registration);
        }

        let requested_targets = request
            .target_languages
            .iter()
            .map(|t| language_label(t))
            .collect::<Vec<_>>()
            .join(", ");
        Err(PipelineError::LanguagePairMismatch {
            engine: registration.engine_type,
            supported: format!(
                "{} to {}",
                language_label(&registration.source_language),
                language_label(&registration.target_language)
            ),
            requested: format!(
                "{} to {}",
                language_label(&request.source_language),
                requested_targets
            ),
        })
    }

    /// Translate the pending units of an IN_PROGRESS request and close it
    async fn run<F>(
        &self,
        request: &TranslationRequest,
        registration: &EngineRegistration,
        cancel: &CancellationFlag,
        progress: F,
        started: Instant,
    ) -> Result<BatchSummary, PipelineError>
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        let units: Vec<TranslationUnit> = self
            .store
            .get_units(&request.id)
            .await?
            .into_iter()
            .filter(|u| !u.status.is_terminal())
            .collect();

        info!(
            "Starting request {}: {} units with {} ({} workers)",
            request.short_id(),
            units.len(),
            registration.engine_type,
            effective_concurrency(self.options.max_concurrent_units, units.len())
        );

        let progress = ProgressCounter::new(units.len(), progress);
        let mut outcomes = self
            .run_pass(request, registration, units, cancel, Some(&progress))
            .await;

        for pass in 1..=self.options.retry_failed_units {
            let retry_ids: Vec<String> = outcomes
                .values()
                .filter_map(|o| match o {
                    UnitOutcome::Failed(f) => Some(f.unit_id.clone()),
                    _ => None,
                })
                .collect();
            if retry_ids.is_empty() || cancel.is_cancelled() {
                break;
            }

            info!(
                "Retry pass {} for request {}: {} failed units",
                pass,
                request.short_id(),
                retry_ids.len()
            );

            let mut retry_units = Vec::with_capacity(retry_ids.len());
            for id in &retry_ids {
                if let Some(unit) = self.store.get_unit(id).await? {
                    retry_units.push(unit);
                }
            }

            let retried = self
                .run_pass(request, registration, retry_units, cancel, None)
                .await;
            outcomes.extend(retried);
        }

        self.finish(request, outcomes, started).await
    }

    /// Translate a set of units on the worker pool
    async fn run_pass(
        &self,
        request: &TranslationRequest,
        registration: &EngineRegistration,
        units: Vec<TranslationUnit>,
        cancel: &CancellationFlag,
        progress: Option<&ProgressCounter>,
    ) -> HashMap<String, UnitOutcome> {
        let workers = effective_concurrency(self.options.max_concurrent_units, units.len());
        let semaphore = Arc::new(Semaphore::new(workers));

        let outcomes = stream::iter(units)
            .map(|unit| {
                let semaphore = semaphore.clone();
                async move {
                    // The semaphore is never closed
                    let _permit = semaphore.acquire().await.ok();

                    let outcome = if cancel.is_cancelled() {
                        self.skip_unit(&unit).await
                    } else {
                        self.translate_unit(&request.source_language, registration, &unit)
                            .await
                    };

                    if let Some(progress) = progress {
                        progress.tick();
                    }
                    outcome
                }
            })
            .buffer_unordered(workers)
            .collect::<Vec<_>>()
            .await;

        outcomes
            .into_iter()
            .map(|outcome| (outcome.unit_id().to_string(), outcome))
            .collect()
    }

    /// Mark a unit that was never dispatched because the run was cancelled
    async fn skip_unit(&self, unit: &TranslationUnit) -> UnitOutcome {
        if let Err(e) = self.store.update_unit_status(&unit.id, UnitStatus::Failed).await {
            error!("Could not mark cancelled unit {} FAILED: {}", unit.short_id(), e);
        }
        debug!("Unit {} not dispatched, run cancelled", unit.short_id());
        UnitOutcome::Cancelled {
            unit_id: unit.id.clone(),
        }
    }

    /// Translate one unit and persist the outcome
    async fn translate_unit(
        &self,
        source_language: &str,
        registration: &EngineRegistration,
        unit: &TranslationUnit,
    ) -> UnitOutcome {
        if let Err(e) = self
            .store
            .update_unit_status(&unit.id, UnitStatus::InProgress)
            .await
        {
            return self.store_failure(unit, e).await;
        }

        let start = Instant::now();
        let (result, outcome) = match self.engine.translate(unit, source_language, registration).await {
            Ok(translated) => (
                UnitResult {
                    status: UnitStatus::Reviewed,
                    translated_text: Some(translated.text),
                    processing_time_ms: translated.duration.as_millis() as i64,
                    error_message: None,
                },
                UnitOutcome::Translated {
                    unit_id: unit.id.clone(),
                    duration: translated.duration,
                },
            ),
            Err(failure) => {
                warn!("Unit {} (#{}) failed: {}", unit.short_id(), unit.seq_num, failure.reason);
                (
                    UnitResult {
                        status: UnitStatus::Failed,
                        translated_text: None,
                        processing_time_ms: start.elapsed().as_millis() as i64,
                        error_message: Some(failure.reason.to_string()),
                    },
                    UnitOutcome::Failed(failure),
                )
            }
        };

        match self.store.record_unit_result(&unit.id, &result).await {
            Ok(()) => outcome,
            Err(e) => self.store_failure(unit, e).await,
        }
    }

    /// Turn a failed unit write into a failure of that unit alone
    async fn store_failure(&self, unit: &TranslationUnit, error: anyhow::Error) -> UnitOutcome {
        error!("Could not persist unit {}: {}", unit.short_id(), error);
        if let Err(e) = self.store.update_unit_status(&unit.id, UnitStatus::Failed).await {
            error!("Could not mark unit {} FAILED: {}", unit.short_id(), e);
        }
        UnitOutcome::Failed(UnitFailure::new(
            unit.id.clone(),
            UnitFailureReason::Store(error.to_string()),
        ))
    }

    /// Close the run: COMPLETED once every unit is terminal, FAILED otherwise
    async fn finish(
        &self,
        request: &TranslationRequest,
        outcomes: HashMap<String, UnitOutcome>,
        started: Instant,
    ) -> Result<BatchSummary, PipelineError> {
        let units = self.store.get_units(&request.id).await?;
        let status = if units.iter().all(|u| u.status.is_terminal()) {
            RequestStatus::Completed
        } else {
            warn!(
                "Request {} still has non-terminal units, marking it FAILED",
                request.short_id()
            );
            RequestStatus::Failed
        };
        self.store.update_request_status(&request.id, status).await?;

        let mut summary = BatchSummary {
            request_id: request.id.clone(),
            status,
            total_units: units.len(),
            succeeded: 0,
            failed: 0,
            cancelled: 0,
            failures: Vec::new(),
            elapsed: started.elapsed(),
        };

        for outcome in outcomes.into_values() {
            match outcome {
                UnitOutcome::Translated { .. } => summary.succeeded += 1,
                UnitOutcome::Failed(failure) => {
                    summary.failed += 1;
                    summary.failures.push(failure);
                }
                UnitOutcome::Cancelled { .. } => summary.cancelled += 1,
            }
        }

        info!(
            "Request {} {} in {:.1}s: {} translated, {} failed, {} cancelled",
            request.short_id(),
            summary.status,
            summary.elapsed.as_secs_f64(),
            summary.succeeded,
            summary.failed,
            summary.cancelled
        );

        Ok(summary)
    }

    /// Move a translated unit to REVIEWED or APPROVED, optionally replacing its
    /// text with a reviewer's post-edit.
    ///
    /// The first machine output is kept on the unit, and later evaluations use
    /// the post-edit as their reference.
    pub async fn review_unit(
        &self,
        unit_id: &str,
        status: UnitStatus,
        edited_text: Option<&str>,
    ) -> Result<TranslationUnit, PipelineError> {
        let unit = self
            .store
            .get_unit(unit_id)
            .await?
            .ok_or_else(|| PipelineError::UnitNotFound(unit_id.to_string()))?;

        let reject = |reason: &str| PipelineError::ReviewRejected {
            unit_id: unit.id.clone(),
            status,
            reason: reason.to_string(),
        };

        if !status.requires_translation() {
            return Err(reject("only REVIEWED and APPROVED are review statuses"));
        }
        if !unit.has_translation() {
            return Err(reject("unit has no translated text"));
        }

        match edited_text.map(str::trim) {
            Some("") => return Err(reject("edited text is empty")),
            Some(edited) => {
                let edited = if language_utils::language_codes_match(&unit.target_language, "ja") {
                    OutputCleaner::detokenize_japanese(edited)
                } else {
                    edited.to_string()
                };
                self.store.record_post_edit(&unit.id, status, &edited).await?;
                info!("Unit {} post-edited and moved to {}", unit.short_id(), status);
            }
            None => {
                self.store.update_unit_status(&unit.id, status).await?;
                info!("Unit {} moved to {}", unit.short_id(), status);
            }
        }

        self.store
            .get_unit(&unit.id)
            .await?
            .ok_or_else(|| PipelineError::UnitNotFound(unit.id.clone()))
    }

    /// Request, units and the latest quality label of each unit
    pub async fn get_status(&self, request_id: &str) -> Result<BatchStatusReport, PipelineError> {
        let request = self.load_request(request_id).await?;
        let units = self.store.get_units(&request.id).await?;

        let mut reports = Vec::with_capacity(units.len());
        for unit in units {
            let latest_label = self
                .store
                .latest_quality_record(&unit.id)
                .await?
                .map(|record| record.quality_label);
            reports.push(UnitReport { unit, latest_label });
        }

        Ok(BatchStatusReport {
            request,
            units: reports,
        })
    }

    pub async fn list_requests(
        &self,
        status: Option<RequestStatus>,
    ) -> Result<Vec<TranslationRequest>, PipelineError> {
        Ok(self.store.list_requests(status).await?)
    }

    async fn load_request(&self, request_id: &str) -> Result<TranslationRequest, PipelineError> {
        self.store
            .get_request(request_id)
            .await?
            .ok_or_else(|| PipelineError::RequestNotFound(request_id.to_string()))
    }
}

/// English language name for messages, falling back to the code itself
fn language_label(code: &str) -> String {
    language_utils::get_language_name(code).unwrap_or_else(|_| code.to_string())
}
