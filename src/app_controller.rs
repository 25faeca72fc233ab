use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::collections::HashMap;
use std::sync::Arc;

use crate::app_config::Config;
use crate::backends::process::ProcessBackend;
use crate::backends::{ClassicalScorer, NeuralScorer, TranslationBackend};
use crate::database::connection::DatabaseStats;
use crate::database::models::{
    EngineRegistration, QualityRecord, RequestStatus, TranslationRequest, TranslationUnit,
    UnitStatus,
};
use crate::database::{DatabaseConnection, Repository, Store};
use crate::quality::{BatchEvaluation, QualityAggregator, ScoringAdapter};
use crate::registry::{EngineType, ModelRegistry};
use crate::translation::concurrency::CancellationFlag;
use crate::translation::{
    BatchLifecycleManager, BatchStatusReport, BatchSummary, ExecutionEngine, LifecycleOptions,
    NewTranslationRequest,
};

/// Main application controller: one store, one registry, one set of backends
pub struct Controller {
    config: Config,
    repository: Arc<Repository>,
    registry: Arc<ModelRegistry>,
    lifecycle: BatchLifecycleManager,
    aggregator: QualityAggregator,
}

impl Controller {
    /// Create a controller backed by the configured database and external programs
    pub fn with_config(config: Config) -> Result<Self> {
        let path = config.database_path()?;
        let connection = DatabaseConnection::new(&path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        info!("Using database {}", path.display());

        let translator = Arc::new(ProcessBackend::from_config(&config.backends.translator));
        let classical = Arc::new(ProcessBackend::from_config(&config.backends.classical_scorer));
        let neural = Arc::new(ProcessBackend::from_config(&config.backends.neural_scorer));

        Ok(Self::with_components(
            config,
            Arc::new(Repository::new(connection)),
            translator,
            classical,
            neural,
        ))
    }

    /// Create a controller from already-built parts
    pub fn with_components(
        config: Config,
        repository: Arc<Repository>,
        translator: Arc<dyn TranslationBackend>,
        classical: Arc<dyn ClassicalScorer>,
        neural: Arc<dyn NeuralScorer>,
    ) -> Self {
        let registry = Arc::new(ModelRegistry::new(
            repository.clone(),
            config.registry.cache_ttl(),
        ));

        let engine = ExecutionEngine::new(translator, config.pipeline.unit_timeout());
        let lifecycle = BatchLifecycleManager::new(
            repository.clone(),
            registry.clone(),
            engine,
            LifecycleOptions {
                max_concurrent_units: config.pipeline.max_concurrent_units,
                retry_failed_units: config.pipeline.retry_failed_units as usize,
            },
        );

        let adapter = ScoringAdapter::new(
            classical,
            neural,
            config.quality.classical_timeout(),
            config.quality.neural_timeout(),
        );
        let aggregator = QualityAggregator::new(
            repository.clone(),
            adapter,
            config.quality.max_concurrent_evaluations,
        );

        Self {
            config,
            repository,
            registry,
            lifecycle,
            aggregator,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn create_request(&self, request: NewTranslationRequest) -> Result<TranslationRequest> {
        Ok(self.lifecycle.create_request(request).await?)
    }

    /// Submit a request with a progress bar on the terminal
    pub async fn submit(&self, request_id: &str, cancel: &CancellationFlag) -> Result<BatchSummary> {
        let units = self.repository_units(request_id).await?;
        let pending = units.iter().filter(|u| !u.status.is_terminal()).count();

        let progress_bar = ProgressBar::new(pending as u64);
        let template_result = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} units ({percent}%) {msg} {eta}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(template_result.progress_chars("█▓▒░"));

        let bar = progress_bar.clone();
        let result = self
            .lifecycle
            .submit_with_progress(request_id, cancel, move |done, _total| {
                bar.set_position(done as u64);
            })
            .await;

        match &result {
            Ok(summary) => progress_bar.finish_with_message(format!(
                "{} translated, {} failed",
                summary.succeeded, summary.failed
            )),
            Err(_) => progress_bar.abandon_with_message("aborted"),
        }
        let summary = result?;

        if self.config.pipeline.auto_evaluate && summary.status == RequestStatus::Completed {
            match self.evaluate_batch(request_id, &HashMap::new()).await {
                Ok(evaluation) => info!(
                    "Evaluated {} units after completion ({} skipped)",
                    evaluation.records.len(),
                    evaluation.skipped_unit_ids.len()
                ),
                Err(e) => warn!(
                    "Request {} completed but automatic evaluation failed: {:#}",
                    request_id, e
                ),
            }
        }

        Ok(summary)
    }

    pub async fn status(&self, request_id: &str) -> Result<BatchStatusReport> {
        Ok(self.lifecycle.get_status(request_id).await?)
    }

    pub async fn list_requests(&self, status: Option<RequestStatus>) -> Result<Vec<TranslationRequest>> {
        Ok(self.lifecycle.list_requests(status).await?)
    }

    /// Review a unit, optionally replacing its text with a post-edit
    pub async fn review_unit(
        &self,
        unit_id: &str,
        status: UnitStatus,
        edited_text: Option<&str>,
    ) -> Result<TranslationUnit> {
        Ok(self.lifecycle.review_unit(unit_id, status, edited_text).await?)
    }

    pub async fn evaluate_unit(&self, unit_id: &str, reference: Option<&str>) -> Result<QualityRecord> {
        Ok(self.aggregator.evaluate(unit_id, reference).await?)
    }

    pub async fn evaluate_batch(
        &self,
        request_id: &str,
        references: &HashMap<String, String>,
    ) -> Result<BatchEvaluation> {
        Ok(self.aggregator.evaluate_batch(request_id, references).await?)
    }

    pub async fn quality_history(&self, unit_id: &str) -> Result<Vec<QualityRecord>> {
        Ok(self.aggregator.history(unit_id).await?)
    }

    pub async fn list_engines(&self) -> Result<Vec<EngineRegistration>> {
        Ok(self.registry.list().await?)
    }

    pub async fn register_engine(&self, engine_type: EngineType, resource_handle: &str) -> Result<()> {
        if resource_handle.trim().is_empty() {
            warn!("Registering engine {} without a resource handle", engine_type);
        }
        Ok(self
            .registry
            .register(EngineRegistration::new(engine_type, resource_handle))
            .await?)
    }

    pub async fn set_engine_availability(&self, engine_type: EngineType, available: bool) -> Result<()> {
        Ok(self.registry.set_availability(engine_type, available).await?)
    }

    pub fn database_stats(&self) -> Result<DatabaseStats> {
        self.repository.connection().stats()
    }

    async fn repository_units(&self, request_id: &str) -> Result<Vec<TranslationUnit>> {
        Ok(self.repository.get_units(request_id).await?)
    }
}
