/*!
 * Translation execution engine.
 *
 * Translates one unit through a `TranslationBackend`, bounded by a timeout.
 * Every failure is returned as a `UnitFailure`; nothing here touches the store.
 */

use log::{debug, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::formatting::OutputCleaner;
use crate::backends::{with_timeout, TranslateRequest, TranslationBackend, PROTOCOL_VERSION};
use crate::database::models::{EngineRegistration, TranslationUnit};
use crate::errors::{BackendError, UnitFailure, UnitFailureReason};

/// A successful translation of one unit
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedText {
    pub text: String,
    pub duration: Duration,
}

/// Runs single-unit translations against a backend
#[derive(Debug, Clone)]
pub struct ExecutionEngine {
    backend: Arc<dyn TranslationBackend>,
    timeout: Duration,
}

impl ExecutionEngine {
    pub fn new(backend: Arc<dyn TranslationBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Translate one unit with the resolved engine.
    ///
    /// Returns the cleaned translation and the wall-clock duration of the call.
    /// A timeout, a backend failure, or an empty answer yields a `UnitFailure`.
    pub async fn translate(
        &self,
        unit: &TranslationUnit,
        source_language: &str,
        registration: &EngineRegistration,
    ) -> Result<TranslatedText, UnitFailure> {
        let request = TranslateRequest {
            version: PROTOCOL_VERSION,
            source_text: unit.source_text.clone(),
            engine: registration.engine_type,
            resource_handle: registration.resource_handle.clone(),
            source_language: source_language.to_string(),
            target_language: unit.target_language.clone(),
        };

        let start = Instant::now();
        let outcome = with_timeout(self.timeout, self.backend.translate(request)).await;
        let duration = start.elapsed();

        let response = outcome.map_err(|e| {
            warn!("Unit {} failed after {:?}: {}", unit.short_id(), duration, e);
            UnitFailure::new(unit.id.clone(), e)
        })?;

        if let Some(message) = response.error.filter(|m| !m.trim().is_empty()) {
            warn!("Backend reported an error for unit {}: {}", unit.short_id(), message);
            return Err(UnitFailure::new(unit.id.clone(), BackendError::Reported(message)));
        }

        let text = OutputCleaner::clean(
            registration.engine_type,
            &unit.target_language,
            &response.translation,
        );
        if text.is_empty() {
            warn!("Backend returned an empty translation for unit {}", unit.short_id());
            return Err(UnitFailure::new(
                unit.id.clone(),
                UnitFailureReason::EmptyTranslation,
            ));
        }

        debug!(
            "Unit {} translated to {} in {:?}",
            unit.short_id(),
            unit.target_language,
            duration
        );

        Ok(TranslatedText { text, duration })
    }
}
