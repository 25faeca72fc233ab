/*!
 * Common test utilities for the transqa test suite
 */

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use transqa::backends::mock::{MockClassicalScorer, MockNeuralScorer, MockTranslator};
use transqa::database::models::{
    EngineRegistration, QualityRecord, RequestStatus, TranslationRequest, TranslationUnit,
    UnitResult, UnitStatus,
};
use transqa::database::{Repository, Store};
use transqa::quality::{QualityAggregator, ScoringAdapter};
use transqa::registry::{EngineType, ModelRegistry};
use transqa::translation::{
    BatchLifecycleManager, ExecutionEngine, LifecycleOptions, NewTranslationRequest,
};

/// Route library logs to the test output
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Fresh in-memory repository
pub fn repository() -> Arc<Repository> {
    Arc::new(Repository::new_in_memory().expect("in-memory database"))
}

/// Registry over `repo` with `engines` registered and available
pub async fn registry_with(repo: &Arc<Repository>, engines: &[EngineType]) -> Arc<ModelRegistry> {
    let registry = Arc::new(ModelRegistry::new(repo.clone(), Duration::from_secs(30)));
    for engine in engines {
        registry
            .register(EngineRegistration::new(*engine, format!("/models/{}", engine.id())))
            .await
            .expect("register engine");
    }
    registry
}

/// Lifecycle manager over a mock translator
pub fn lifecycle(
    repo: &Arc<Repository>,
    registry: Arc<ModelRegistry>,
    translator: MockTranslator,
    unit_timeout: Duration,
    options: LifecycleOptions,
) -> BatchLifecycleManager {
    let engine = ExecutionEngine::new(Arc::new(translator), unit_timeout);
    BatchLifecycleManager::new(repo.clone(), registry, engine, options)
}

/// Quality aggregator over mock evaluators
pub fn aggregator(
    repo: &Arc<Repository>,
    classical: MockClassicalScorer,
    neural: MockNeuralScorer,
) -> QualityAggregator {
    let adapter = ScoringAdapter::new(
        Arc::new(classical),
        Arc::new(neural),
        Duration::from_millis(500),
        Duration::from_millis(500),
    );
    QualityAggregator::new(repo.clone(), adapter, 2)
}

/// English to French request over the given texts
pub fn en_fr_request(texts: &[&str]) -> NewTranslationRequest {
    NewTranslationRequest {
        source_language: "en".to_string(),
        target_languages: vec!["fr".to_string()],
        engine_type: EngineType::MarianMtEnFr,
        source_texts: texts.iter().map(|t| t.to_string()).collect(),
        file_name: None,
    }
}

/// Store over a repository that fails selected writes
pub struct FaultyStore {
    inner: Arc<Repository>,
    /// Unit results for this source text cannot be written
    fail_results_for: Option<String>,
    /// The request cannot be moved to COMPLETED
    fail_completion: bool,
}

impl FaultyStore {
    pub fn new(inner: Arc<Repository>) -> Self {
        Self {
            inner,
            fail_results_for: None,
            fail_completion: false,
        }
    }

    pub fn failing_results_for(mut self, source_text: &str) -> Self {
        self.fail_results_for = Some(source_text.to_string());
        self
    }

    pub fn failing_completion(mut self) -> Self {
        self.fail_completion = true;
        self
    }
}

#[async_trait]
impl Store for FaultyStore {
    async fn create_request(
        &self,
        request: &TranslationRequest,
        units: &[TranslationUnit],
    ) -> Result<()> {
        self.inner.create_request(request, units).await
    }

    async fn get_request(&self, request_id: &str) -> Result<Option<TranslationRequest>> {
        self.inner.get_request(request_id).await
    }

    async fn list_requests(&self, status: Option<RequestStatus>) -> Result<Vec<TranslationRequest>> {
        self.inner.list_requests(status).await
    }

    async fn update_request_status(&self, request_id: &str, status: RequestStatus) -> Result<()> {
        if self.fail_completion && status == RequestStatus::Completed {
            anyhow::bail!("database is locked");
        }
        self.inner.update_request_status(request_id, status).await
    }

    async fn get_unit(&self, unit_id: &str) -> Result<Option<TranslationUnit>> {
        self.inner.get_unit(unit_id).await
    }

    async fn get_units(&self, request_id: &str) -> Result<Vec<TranslationUnit>> {
        self.inner.get_units(request_id).await
    }

    async fn update_unit_status(&self, unit_id: &str, status: UnitStatus) -> Result<()> {
        self.inner.update_unit_status(unit_id, status).await
    }

    async fn record_unit_result(&self, unit_id: &str, result: &UnitResult) -> Result<()> {
        if let Some(text) = &self.fail_results_for {
            let unit = self.inner.get_unit(unit_id).await?;
            if unit.is_some_and(|u| &u.source_text == text) {
                anyhow::bail!("database is locked");
            }
        }
        self.inner.record_unit_result(unit_id, result).await
    }

    async fn record_post_edit(
        &self,
        unit_id: &str,
        status: UnitStatus,
        edited_text: &str,
    ) -> Result<()> {
        self.inner.record_post_edit(unit_id, status, edited_text).await
    }

    async fn insert_quality_record(&self, record: &QualityRecord) -> Result<()> {
        self.inner.insert_quality_record(record).await
    }

    async fn latest_quality_record(&self, unit_id: &str) -> Result<Option<QualityRecord>> {
        self.inner.latest_quality_record(unit_id).await
    }

    async fn quality_records(&self, unit_id: &str) -> Result<Vec<QualityRecord>> {
        self.inner.quality_records(unit_id).await
    }

    async fn upsert_engine(&self, registration: &EngineRegistration) -> Result<()> {
        self.inner.upsert_engine(registration).await
    }

    async fn get_engine(&self, engine_type: EngineType) -> Result<Option<EngineRegistration>> {
        self.inner.get_engine(engine_type).await
    }

    async fn list_engines(&self) -> Result<Vec<EngineRegistration>> {
        self.inner.list_engines().await
    }

    async fn set_engine_availability(&self, engine_type: EngineType, available: bool) -> Result<bool> {
        self.inner.set_engine_availability(engine_type, available).await
    }
}

/// Lifecycle manager over an arbitrary store
pub fn lifecycle_over(
    store: Arc<dyn Store>,
    registry: Arc<ModelRegistry>,
    translator: MockTranslator,
    options: LifecycleOptions,
) -> BatchLifecycleManager {
    let engine = ExecutionEngine::new(Arc::new(translator), Duration::from_secs(2));
    BatchLifecycleManager::new(store, registry, engine, options)
}
