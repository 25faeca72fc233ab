/*!
 * Tests for the engine catalogue and the model registry
 */

use std::time::Duration;

use transqa::database::models::EngineRegistration;
use transqa::database::Store;
use transqa::errors::PipelineError;
use transqa::registry::{EngineType, ModelRegistry};

use crate::common;

#[test]
fn test_fromAlias_withLegacyNames_shouldMapToCatalogue() {
    assert_eq!(EngineType::from_alias("HELSINKI_EN_FR"), Some(EngineType::MarianMtEnFr));
    assert_eq!(EngineType::from_alias("opus-ja-en"), Some(EngineType::ElanMtJpEn));
    assert_eq!(EngineType::from_alias("t5_multilingual"), Some(EngineType::T5Base));
    assert_eq!(EngineType::from_alias("NLLB_200"), Some(EngineType::Nllb200));
    assert_eq!(EngineType::from_alias("GPT_4"), None);
}

#[test]
fn test_resolveAlias_withUnknownName_shouldFallBackToDefault() {
    assert_eq!(EngineType::resolve_alias("SOMETHING_ELSE"), EngineType::DEFAULT);
    assert_eq!(EngineType::resolve_alias("PIVOT"), EngineType::PivotJpEnFr);
}

#[test]
fn test_display_shouldRoundTripThroughFromStr() {
    for engine in EngineType::ALL {
        assert_eq!(engine.to_string().parse::<EngineType>().unwrap(), engine);
    }
}

#[tokio::test]
async fn test_resolve_withCachedSnapshot_shouldIgnoreDirectStoreChangesUntilExpiry() {
    let repo = common::repository();
    let registry = ModelRegistry::new(repo.clone(), Duration::from_secs(60));
    registry
        .register(EngineRegistration::new(EngineType::MarianMtEnFr, "/models/en-fr"))
        .await
        .unwrap();
    assert!(registry.resolve(EngineType::MarianMtEnFr).await.is_ok());

    // Bypass the registry so the cached snapshot goes stale
    repo.set_engine_availability(EngineType::MarianMtEnFr, false)
        .await
        .unwrap();
    assert!(registry.resolve(EngineType::MarianMtEnFr).await.is_ok());

    registry.invalidate();
    assert!(matches!(
        registry.resolve(EngineType::MarianMtEnFr).await,
        Err(PipelineError::EngineUnavailable(EngineType::MarianMtEnFr))
    ));
}

#[tokio::test]
async fn test_resolve_withExpiredSnapshot_shouldReloadFromStore() {
    let repo = common::repository();
    let registry = ModelRegistry::new(repo.clone(), Duration::from_millis(50));
    assert!(registry.resolve(EngineType::T5Base).await.is_err());

    repo.upsert_engine(&EngineRegistration::new(EngineType::T5Base, "t5-base"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let registration = registry.resolve(EngineType::T5Base).await.unwrap();
    assert_eq!(registration.resource_handle, "t5-base");
}

#[tokio::test]
async fn test_setAvailability_withUnknownEngine_shouldFail() {
    let repo = common::repository();
    let registry = ModelRegistry::new(repo, Duration::from_secs(30));

    let result = registry.set_availability(EngineType::CustomModel, true).await;
    assert!(matches!(result, Err(PipelineError::EngineUnavailable(_))));
}
