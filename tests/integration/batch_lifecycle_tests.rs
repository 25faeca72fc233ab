/*!
 * Integration tests for the batch lifecycle
 */

use std::time::Duration;

use transqa::backends::mock::{MockBehavior, MockTranslator};
use transqa::database::models::{RequestStatus, UnitStatus};
use transqa::database::Store;
use transqa::errors::PipelineError;
use transqa::registry::EngineType;
use transqa::translation::LifecycleOptions;

use crate::common;

#[tokio::test]
async fn test_submit_withOneSlowUnit_shouldCompleteWithThatUnitFailed() {
    common::init_logging();
    let repo = common::repository();
    let registry = common::registry_with(&repo, &[EngineType::MarianMtEnFr]).await;
    let translator = MockTranslator::working()
        .with_override("Two", MockBehavior::Slow { delay_ms: 3_000 });
    let manager = common::lifecycle(
        &repo,
        registry,
        translator.clone(),
        Duration::from_millis(200),
        LifecycleOptions::default(),
    );

    let request = manager
        .create_request(common::en_fr_request(&["One", "Two", "Three"]))
        .await
        .unwrap();
    let summary = manager.submit(&request.id).await.unwrap();

    assert_eq!(summary.status, RequestStatus::Completed);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
    assert!(summary.failures[0].is_timeout());

    let units = repo.get_units(&request.id).await.unwrap();
    assert_eq!(units[0].status, UnitStatus::Reviewed);
    assert_eq!(units[0].translated_text, MockTranslator::expected_translation("One", "fr"));
    assert_eq!(units[1].status, UnitStatus::Failed);
    assert!(units[1].translated_text.is_empty());
    assert!(units[1].error_message.as_deref().unwrap().contains("timed out"));
    assert_eq!(units[2].status, UnitStatus::Reviewed);

    let stored = repo.get_request(&request.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RequestStatus::Completed);
    assert!(stored.completed_at.is_some());
}

#[tokio::test]
async fn test_submit_withDisabledEngine_shouldFailWithoutTranslating() {
    common::init_logging();
    let repo = common::repository();
    let registry = common::registry_with(&repo, &[EngineType::MarianMtEnFr]).await;
    registry
        .set_availability(EngineType::MarianMtEnFr, false)
        .await
        .unwrap();
    let translator = MockTranslator::working();
    let manager = common::lifecycle(
        &repo,
        registry,
        translator.clone(),
        Duration::from_secs(1),
        LifecycleOptions::default(),
    );

    let request = manager
        .create_request(common::en_fr_request(&["One", "Two"]))
        .await
        .unwrap();
    let result = manager.submit(&request.id).await;

    assert!(matches!(
        result,
        Err(PipelineError::EngineUnavailable(EngineType::MarianMtEnFr))
    ));
    assert_eq!(translator.request_count(), 0);

    let stored = repo.get_request(&request.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RequestStatus::Failed);
    let units = repo.get_units(&request.id).await.unwrap();
    assert!(units.iter().all(|u| u.status == UnitStatus::Draft));
}

#[tokio::test]
async fn test_submit_withUnregisteredEngine_shouldFailRequest() {
    let repo = common::repository();
    let registry = common::registry_with(&repo, &[EngineType::MarianMtFrEn]).await;
    let translator = MockTranslator::working();
    let manager = common::lifecycle(
        &repo,
        registry,
        translator.clone(),
        Duration::from_secs(1),
        LifecycleOptions::default(),
    );

    let request = manager
        .create_request(common::en_fr_request(&["One"]))
        .await
        .unwrap();

    assert!(manager.submit(&request.id).await.is_err());
    assert_eq!(translator.request_count(), 0);
    let report = manager.get_status(&request.id).await.unwrap();
    assert_eq!(report.request.status, RequestStatus::Failed);
}

#[tokio::test]
async fn test_submit_withFailingBackend_shouldStillCompleteOnceAllUnitsAreTerminal() {
    let repo = common::repository();
    let registry = common::registry_with(&repo, &[EngineType::MarianMtEnFr]).await;
    let manager = common::lifecycle(
        &repo,
        registry,
        MockTranslator::failing(),
        Duration::from_secs(1),
        LifecycleOptions::default(),
    );

    let request = manager
        .create_request(common::en_fr_request(&["One", "Two", "Three", "Four"]))
        .await
        .unwrap();
    let summary = manager.submit(&request.id).await.unwrap();

    assert_eq!(summary.status, RequestStatus::Completed);
    assert_eq!(summary.failed, 4);
    let report = manager.get_status(&request.id).await.unwrap();
    assert_eq!(report.count(UnitStatus::Failed), 4);
    assert_eq!(report.count(UnitStatus::Reviewed), 0);
}

#[tokio::test]
async fn test_submit_withRetries_shouldAttemptFailedUnitsAgain() {
    let repo = common::repository();
    let registry = common::registry_with(&repo, &[EngineType::MarianMtEnFr]).await;
    let translator = MockTranslator::failing();
    let manager = common::lifecycle(
        &repo,
        registry,
        translator.clone(),
        Duration::from_secs(1),
        LifecycleOptions {
            max_concurrent_units: 2,
            retry_failed_units: 2,
        },
    );

    let request = manager
        .create_request(common::en_fr_request(&["One"]))
        .await
        .unwrap();
    let summary = manager.submit(&request.id).await.unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(translator.request_count(), 3);
    let units = repo.get_units(&request.id).await.unwrap();
    assert_eq!(units[0].attempt_count, 3);
}

#[tokio::test]
async fn test_submit_withEmptyTranslation_shouldFailUnit() {
    let repo = common::repository();
    let registry = common::registry_with(&repo, &[EngineType::MarianMtEnFr]).await;
    let translator = MockTranslator::working().with_override("Blank", MockBehavior::Empty);
    let manager = common::lifecycle(
        &repo,
        registry,
        translator,
        Duration::from_secs(1),
        LifecycleOptions::default(),
    );

    let request = manager
        .create_request(common::en_fr_request(&["Blank", "Hello"]))
        .await
        .unwrap();
    let summary = manager.submit(&request.id).await.unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);
    let units = repo.get_units(&request.id).await.unwrap();
    assert_eq!(units[0].status, UnitStatus::Failed);
    assert_eq!(units[1].status, UnitStatus::Reviewed);
}

#[tokio::test]
async fn test_submit_withNllbArtifacts_shouldStoreCleanedText() {
    let repo = common::repository();
    let registry = common::registry_with(&repo, &[EngineType::Nllb200]).await;
    let manager = common::lifecycle(
        &repo,
        registry,
        MockTranslator::new(MockBehavior::Noisy),
        Duration::from_secs(1),
        LifecycleOptions::default(),
    );

    let mut new_request = common::en_fr_request(&["Hello"]);
    new_request.engine_type = EngineType::Nllb200;
    let request = manager.create_request(new_request).await.unwrap();
    manager.submit(&request.id).await.unwrap();

    let units = repo.get_units(&request.id).await.unwrap();
    assert_eq!(units[0].translated_text, "[fr] Hello");
}

#[tokio::test]
async fn test_submit_withManyUnits_shouldProgressThroughEveryUnit() {
    let repo = common::repository();
    let registry = common::registry_with(&repo, &[EngineType::MarianMtEnFr]).await;
    let manager = common::lifecycle(
        &repo,
        registry,
        MockTranslator::slow(20),
        Duration::from_secs(2),
        LifecycleOptions {
            max_concurrent_units: 3,
            retry_failed_units: 0,
        },
    );

    let texts: Vec<String> = (0..10).map(|i| format!("Line {}", i)).collect();
    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
    let request = manager
        .create_request(common::en_fr_request(&refs))
        .await
        .unwrap();

    let seen = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counter = seen.clone();
    let summary = manager
        .submit_with_progress(
            &request.id,
            &transqa::translation::concurrency::CancellationFlag::new(),
            move |done, total| {
                assert_eq!(total, 10);
                counter.fetch_max(done, std::sync::atomic::Ordering::SeqCst);
            },
        )
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 10);
    assert_eq!(seen.load(std::sync::atomic::Ordering::SeqCst), 10);
    let units = repo.get_units(&request.id).await.unwrap();
    let seqs: Vec<i64> = units.iter().map(|u| u.seq_num).collect();
    assert_eq!(seqs, (1..=10).collect::<Vec<i64>>());
}

#[tokio::test]
async fn test_submit_withUnitWriteFailure_shouldFailOnlyThatUnit() {
    common::init_logging();
    let repo = common::repository();
    let registry = common::registry_with(&repo, &[EngineType::MarianMtEnFr]).await;
    let store = std::sync::Arc::new(common::FaultyStore::new(repo.clone()).failing_results_for("Two"));
    let manager = common::lifecycle_over(
        store,
        registry,
        MockTranslator::working(),
        LifecycleOptions::default(),
    );

    let request = manager
        .create_request(common::en_fr_request(&["One", "Two", "Three"]))
        .await
        .unwrap();
    let summary = manager.submit(&request.id).await.unwrap();

    assert_eq!(summary.status, RequestStatus::Completed);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
    assert!(summary.failures[0].to_string().contains("database is locked"));

    let statuses: Vec<UnitStatus> = repo
        .get_units(&request.id)
        .await
        .unwrap()
        .iter()
        .map(|u| u.status)
        .collect();
    assert_eq!(
        statuses,
        vec![UnitStatus::Reviewed, UnitStatus::Failed, UnitStatus::Reviewed]
    );
    let stored = repo.get_request(&request.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RequestStatus::Completed);
}

#[tokio::test]
async fn test_submit_withCompletionWriteFailure_shouldLeaveRequestFailed() {
    common::init_logging();
    let repo = common::repository();
    let registry = common::registry_with(&repo, &[EngineType::MarianMtEnFr]).await;
    let store = std::sync::Arc::new(common::FaultyStore::new(repo.clone()).failing_completion());
    let manager = common::lifecycle_over(
        store,
        registry,
        MockTranslator::working(),
        LifecycleOptions::default(),
    );

    let request = manager
        .create_request(common::en_fr_request(&["One", "Two"]))
        .await
        .unwrap();
    let result = manager.submit(&request.id).await;

    assert!(matches!(result, Err(PipelineError::Store(_))));
    let stored = repo.get_request(&request.id).await.unwrap().unwrap();
    assert_eq!(stored.status, RequestStatus::Failed);
    assert!(stored.completed_at.is_some());
}

#[tokio::test]
async fn test_submit_cancelledMidRun_shouldLetInFlightUnitsFinish() {
    common::init_logging();
    let repo = common::repository();
    let registry = common::registry_with(&repo, &[EngineType::MarianMtEnFr]).await;
    let translator = MockTranslator::working()
        .with_override("One", MockBehavior::Slow { delay_ms: 20 })
        .with_override("Two", MockBehavior::Slow { delay_ms: 150 });
    let manager = common::lifecycle(
        &repo,
        registry,
        translator.clone(),
        Duration::from_secs(2),
        LifecycleOptions {
            max_concurrent_units: 2,
            retry_failed_units: 0,
        },
    );

    let request = manager
        .create_request(common::en_fr_request(&["One", "Two", "Three"]))
        .await
        .unwrap();

    let cancel = transqa::translation::concurrency::CancellationFlag::new();
    let trigger = cancel.clone();
    let summary = manager
        .submit_with_progress(&request.id, &cancel, move |done, _total| {
            if done == 1 {
                trigger.cancel();
            }
        })
        .await
        .unwrap();

    assert_eq!(summary.status, RequestStatus::Completed);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.cancelled, 1);
    assert_eq!(translator.request_count(), 2);

    let units = repo.get_units(&request.id).await.unwrap();
    assert_eq!(units[0].status, UnitStatus::Reviewed);
    assert_eq!(units[1].status, UnitStatus::Reviewed);
    assert_eq!(units[1].translated_text, MockTranslator::expected_translation("Two", "fr"));
    assert_eq!(units[2].status, UnitStatus::Failed);
    assert_eq!(units[2].attempt_count, 0);
}
