/*!
 * Model registry.
 *
 * Two concerns live here:
 * - `EngineType`: the closed catalogue of translation engines, with alias
 *   normalization for legacy identifiers
 * - `ModelRegistry`: resolves an engine to its persisted registration through a
 *   short-lived cached snapshot of the registration table
 */

use log::{debug, info, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::database::models::EngineRegistration;
use crate::database::store::Store;
use crate::errors::PipelineError;

/// Translation engines known to the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngineType {
    MarianMtEnFr,
    MarianMtFrEn,
    MarianMtEnJp,
    ElanMtJpEn,
    T5Base,
    Nllb200,
    PivotJpEnFr,
    CustomModel,
}

impl EngineType {
    /// Engine used when an identifier cannot be resolved
    pub const DEFAULT: EngineType = EngineType::MarianMtEnFr;

    pub const ALL: [EngineType; 8] = [
        EngineType::MarianMtEnFr,
        EngineType::MarianMtFrEn,
        EngineType::MarianMtEnJp,
        EngineType::ElanMtJpEn,
        EngineType::T5Base,
        EngineType::Nllb200,
        EngineType::PivotJpEnFr,
        EngineType::CustomModel,
    ];

    /// Canonical identifier as stored and exchanged
    pub fn id(&self) -> &'static str {
        match self {
            EngineType::MarianMtEnFr => "MARIAN_MT_EN_FR",
            EngineType::MarianMtFrEn => "MARIAN_MT_FR_EN",
            EngineType::MarianMtEnJp => "MARIAN_MT_EN_JP",
            EngineType::ElanMtJpEn => "ELAN_MT_JP_EN",
            EngineType::T5Base => "T5_BASE",
            EngineType::Nllb200 => "NLLB_200",
            EngineType::PivotJpEnFr => "PIVOT_JP_EN_FR",
            EngineType::CustomModel => "CUSTOM_MODEL",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            EngineType::MarianMtEnFr => "MarianMT English to French",
            EngineType::MarianMtFrEn => "MarianMT French to English",
            EngineType::MarianMtEnJp => "MarianMT English to Japanese",
            EngineType::ElanMtJpEn => "ELAN-MT Japanese to English",
            EngineType::T5Base => "T5 Base",
            EngineType::Nllb200 => "NLLB-200",
            EngineType::PivotJpEnFr => "Pivot Japanese to French (via English)",
            EngineType::CustomModel => "Custom Model",
        }
    }

    /// Source and target language a fresh registration starts with
    pub fn default_language_pair(&self) -> (&'static str, &'static str) {
        match self {
            EngineType::MarianMtEnFr => ("en", "fr"),
            EngineType::MarianMtFrEn => ("fr", "en"),
            EngineType::MarianMtEnJp => ("en", "ja"),
            EngineType::ElanMtJpEn => ("ja", "en"),
            EngineType::T5Base => ("en", "fr"),
            EngineType::Nllb200 => ("en", "fr"),
            EngineType::PivotJpEnFr => ("ja", "fr"),
            EngineType::CustomModel => ("en", "fr"),
        }
    }

    /// Whether the engine only serves its registered language pair
    pub fn has_fixed_language_pair(&self) -> bool {
        !matches!(
            self,
            EngineType::T5Base | EngineType::Nllb200 | EngineType::CustomModel
        )
    }

    /// Whether the engine emits sentinel tokens that need stripping
    pub fn needs_output_cleanup(&self) -> bool {
        matches!(self, EngineType::T5Base | EngineType::Nllb200)
    }

    /// Resolve a canonical identifier or a legacy alias
    pub fn from_alias(value: &str) -> Option<Self> {
        let normalized = value.trim().to_uppercase().replace(['-', ' '], "_");
        if let Some(engine) = Self::ALL.iter().find(|e| e.id() == normalized) {
            return Some(*engine);
        }

        match normalized.as_str() {
            "HELSINKI_EN_FR" | "OPUS_MT_EN_FR" | "MARIAN_EN_FR" => Some(EngineType::MarianMtEnFr),
            "HELSINKI_FR_EN" | "OPUS_MT_FR_EN" | "MARIAN_FR_EN" => Some(EngineType::MarianMtFrEn),
            "HELSINKI_EN_JP" | "HELSINKI_EN_JA" | "MARIAN_MT_EN_JA" => Some(EngineType::MarianMtEnJp),
            "ELAN_MT_JA_EN" | "ELAN_JP_EN" | "OPUS_JA_EN" | "OPUS_MT_JA_EN" => {
                Some(EngineType::ElanMtJpEn)
            }
            "T5" | "T5_SMALL" | "T5_MULTILINGUAL" => Some(EngineType::T5Base),
            "NLLB" | "NLLB_200_DISTILLED" => Some(EngineType::Nllb200),
            "PIVOT" | "PIVOT_JA_EN_FR" => Some(EngineType::PivotJpEnFr),
            "CUSTOM" => Some(EngineType::CustomModel),
            _ => None,
        }
    }

    /// Resolve an identifier, falling back to the default engine
    pub fn resolve_alias(value: &str) -> Self {
        Self::from_alias(value).unwrap_or_else(|| {
            warn!(
                "Unknown engine identifier '{}', falling back to {}",
                value,
                Self::DEFAULT
            );
            Self::DEFAULT
        })
    }
}

impl fmt::Display for EngineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl std::str::FromStr for EngineType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_alias(s).ok_or_else(|| anyhow::anyhow!("Invalid engine type: {}", s))
    }
}

struct Snapshot {
    taken_at: Instant,
    engines: HashMap<EngineType, EngineRegistration>,
}

/// Resolves engines against the persisted registration table
pub struct ModelRegistry {
    store: Arc<dyn Store>,
    snapshot: RwLock<Option<Snapshot>>,
    ttl: Duration,
}

impl ModelRegistry {
    pub fn new(store: Arc<dyn Store>, ttl: Duration) -> Self {
        Self {
            store,
            snapshot: RwLock::new(None),
            ttl,
        }
    }

    /// Find the registration for an engine.
    ///
    /// Fails with `EngineUnavailable` when the engine is not registered or
    /// is registered but marked unavailable.
    pub async fn resolve(&self, engine_type: EngineType) -> Result<EngineRegistration, PipelineError> {
        let engines = self.engines().await?;

        match engines.get(&engine_type) {
            Some(registration) if registration.is_available => {
                debug!(
                    "Resolved engine {} to '{}'",
                    engine_type, registration.resource_handle
                );
                Ok(registration.clone())
            }
            Some(_) => {
                warn!("Engine {} is registered but marked unavailable", engine_type);
                Err(PipelineError::EngineUnavailable(engine_type))
            }
            None => {
                warn!("Engine {} is not registered", engine_type);
                Err(PipelineError::EngineUnavailable(engine_type))
            }
        }
    }

    /// All registrations, available or not, ordered by engine type
    pub async fn list(&self) -> Result<Vec<EngineRegistration>, PipelineError> {
        let mut engines: Vec<EngineRegistration> = self.engines().await?.into_values().collect();
        engines.sort_by_key(|e| e.engine_type);
        Ok(engines)
    }

    /// Create or replace a registration
    pub async fn register(&self, registration: EngineRegistration) -> Result<(), PipelineError> {
        info!(
            "Registering engine {} at '{}'",
            registration.engine_type, registration.resource_handle
        );
        self.store.upsert_engine(&registration).await?;
        self.invalidate();
        Ok(())
    }

    /// Mark an engine available or unavailable
    pub async fn set_availability(
        &self,
        engine_type: EngineType,
        available: bool,
    ) -> Result<(), PipelineError> {
        let updated = self.store.set_engine_availability(engine_type, available).await?;
        self.invalidate();

        if !updated {
            return Err(PipelineError::EngineUnavailable(engine_type));
        }
        info!(
            "Engine {} is now {}",
            engine_type,
            if available { "available" } else { "unavailable" }
        );
        Ok(())
    }

    /// Drop the cached snapshot so the next lookup reads the store
    pub fn invalidate(&self) {
        *self.snapshot.write() = None;
    }

    async fn engines(&self) -> Result<HashMap<EngineType, EngineRegistration>, PipelineError> {
        {
            let guard = self.snapshot.read();
            if let Some(snapshot) = guard.as_ref() {
                if snapshot.taken_at.elapsed() < self.ttl {
                    return Ok(snapshot.engines.clone());
                }
            }
        }

        let engines: HashMap<EngineType, EngineRegistration> = self
            .store
            .list_engines()
            .await?
            .into_iter()
            .map(|e| (e.engine_type, e))
            .collect();

        debug!("Refreshed engine registry snapshot ({} engines)", engines.len());

        *self.snapshot.write() = Some(Snapshot {
            taken_at: Instant::now(),
            engines: engines.clone(),
        });

        Ok(engines)
    }
}
