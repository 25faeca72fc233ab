/*!
 * Persistence seam used by the pipeline.
 *
 * The lifecycle manager, registry and quality aggregator only talk to this
 * trait, so they can be driven against the SQLite `Repository` or any other
 * backing store.
 */

use anyhow::Result;
use async_trait::async_trait;

use super::models::{
    EngineRegistration, QualityRecord, RequestStatus, TranslationRequest, TranslationUnit,
    UnitResult, UnitStatus,
};
use crate::registry::EngineType;

#[async_trait]
pub trait Store: Send + Sync {
    /// Persist a new request together with its units, atomically
    async fn create_request(
        &self,
        request: &TranslationRequest,
        units: &[TranslationUnit],
    ) -> Result<()>;

    async fn get_request(&self, request_id: &str) -> Result<Option<TranslationRequest>>;

    /// Requests ordered newest first, optionally filtered by status
    async fn list_requests(&self, status: Option<RequestStatus>)
        -> Result<Vec<TranslationRequest>>;

    /// Set the request status; terminal statuses also stamp `completed_at`
    async fn update_request_status(&self, request_id: &str, status: RequestStatus) -> Result<()>;

    async fn get_unit(&self, unit_id: &str) -> Result<Option<TranslationUnit>>;

    /// Units of a request ordered by sequence number
    async fn get_units(&self, request_id: &str) -> Result<Vec<TranslationUnit>>;

    async fn update_unit_status(&self, unit_id: &str, status: UnitStatus) -> Result<()>;

    /// Write the outcome of a translation attempt and bump the attempt counter
    async fn record_unit_result(&self, unit_id: &str, result: &UnitResult) -> Result<()>;

    /// Replace the translated text with a reviewer's edit and set the review status.
    /// The first machine output is kept in `original_translation` when the text changes.
    async fn record_post_edit(&self, unit_id: &str, status: UnitStatus, edited_text: &str)
        -> Result<()>;

    /// Append a quality record; records are never overwritten
    async fn insert_quality_record(&self, record: &QualityRecord) -> Result<()>;

    /// Most recently inserted quality record of a unit
    async fn latest_quality_record(&self, unit_id: &str) -> Result<Option<QualityRecord>>;

    /// Every quality record of a unit in insertion order
    async fn quality_records(&self, unit_id: &str) -> Result<Vec<QualityRecord>>;

    async fn upsert_engine(&self, registration: &EngineRegistration) -> Result<()>;

    async fn get_engine(&self, engine_type: EngineType) -> Result<Option<EngineRegistration>>;

    async fn list_engines(&self) -> Result<Vec<EngineRegistration>>;

    /// Flip the availability flag; returns false when the engine is not registered
    async fn set_engine_availability(&self, engine_type: EngineType, available: bool)
        -> Result<bool>;
}
