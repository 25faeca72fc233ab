/*!
 * Integration tests for quality evaluation
 */

use std::collections::HashMap;
use std::time::Duration;

use transqa::backends::mock::{MockClassicalScorer, MockNeuralScorer, MockTranslator};
use transqa::backends::NeuralResponse;
use transqa::database::models::UnitStatus;
use transqa::database::Store;
use transqa::errors::BackendError;
use transqa::quality::label::EvaluationMode;
use transqa::quality::{LabelSource, QualityLabel};
use transqa::registry::EngineType;
use transqa::translation::LifecycleOptions;

use crate::common;

/// Create and translate a request, returning its id and unit ids in order
async fn translated_request(
    repo: &std::sync::Arc<transqa::database::Repository>,
    texts: &[&str],
    translator: MockTranslator,
) -> (String, Vec<String>) {
    let registry = common::registry_with(repo, &[EngineType::MarianMtEnFr]).await;
    let manager = common::lifecycle(
        repo,
        registry,
        translator,
        Duration::from_secs(1),
        LifecycleOptions::default(),
    );
    let request = manager
        .create_request(common::en_fr_request(texts))
        .await
        .unwrap();
    manager.submit(&request.id).await.unwrap();

    let unit_ids = repo
        .get_units(&request.id)
        .await
        .unwrap()
        .into_iter()
        .map(|u| u.id)
        .collect();
    (request.id, unit_ids)
}

#[tokio::test]
async fn test_evaluate_withoutReference_shouldNeverCallClassical() {
    common::init_logging();
    let repo = common::repository();
    let (_, units) = translated_request(&repo, &["Hello"], MockTranslator::working()).await;
    let classical = MockClassicalScorer::with_label("EXCELLENT");
    let neural = MockNeuralScorer::with_score(4.0, None);
    let aggregator = common::aggregator(&repo, classical.clone(), neural.clone());

    let record = aggregator.evaluate(&units[0], None).await.unwrap();

    assert_eq!(classical.request_count(), 0);
    assert_eq!(neural.request_count(), 1);
    assert!(record.classical.is_none());
    assert_eq!(record.evaluation_mode, Some(EvaluationMode::ReferenceFree));
}

#[tokio::test]
async fn test_evaluate_withBothLabels_shouldPreferNeural() {
    let repo = common::repository();
    let (_, units) = translated_request(&repo, &["Hello"], MockTranslator::working()).await;
    let aggregator = common::aggregator(
        &repo,
        MockClassicalScorer::with_label("EXCELLENT"),
        MockNeuralScorer::with_score(11.0, Some("GOOD")),
    );

    let record = aggregator.evaluate(&units[0], Some("Bonjour")).await.unwrap();

    assert_eq!(record.quality_label, QualityLabel::Good);
    assert_eq!(record.label_source, LabelSource::NeuralLabel);
    assert_eq!(record.classical_label, Some(QualityLabel::Excellent));
    assert!(record.has_reference);
}

#[tokio::test]
async fn test_evaluate_withOnlyNeuralScore_shouldDeriveLabelFromScore() {
    let repo = common::repository();
    let (_, units) = translated_request(&repo, &["Hello"], MockTranslator::working()).await;
    let aggregator = common::aggregator(
        &repo,
        MockClassicalScorer::with_label("NO_REFERENCE"),
        MockNeuralScorer::with_score(9.0, None),
    );

    let record = aggregator.evaluate(&units[0], Some("Bonjour")).await.unwrap();

    assert_eq!(record.quality_label, QualityLabel::Good);
    assert_eq!(record.label_source, LabelSource::NeuralScore);
    assert_eq!(record.neural_score, Some(9.0));
}

#[tokio::test]
async fn test_evaluate_withBothEvaluatorsFailing_shouldRecordPoor() {
    let repo = common::repository();
    let (_, units) = translated_request(&repo, &["Hello"], MockTranslator::working()).await;
    let aggregator = common::aggregator(
        &repo,
        MockClassicalScorer::failing(BackendError::Spawn("sacrebleu not installed".to_string())),
        MockNeuralScorer::failing(BackendError::NonZeroExit {
            code: Some(2),
            stderr: "CUDA out of memory".to_string(),
        }),
    );

    let record = aggregator.evaluate(&units[0], Some("Bonjour")).await.unwrap();

    assert_eq!(record.quality_label, QualityLabel::Poor);
    assert_eq!(record.label_source, LabelSource::Default);
    assert!(record.neural_score.is_none());
    assert!(record.classical.is_none());
    assert_eq!(repo.quality_records(&units[0]).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_evaluate_withSlowNeural_shouldFallBackToClassical() {
    let repo = common::repository();
    let (_, units) = translated_request(&repo, &["Hello"], MockTranslator::working()).await;
    let aggregator = common::aggregator(
        &repo,
        MockClassicalScorer::with_label("FAIR"),
        MockNeuralScorer::with_score(2.0, Some("EXCELLENT")).with_delay(Duration::from_secs(5)),
    );

    let record = aggregator.evaluate(&units[0], Some("Bonjour")).await.unwrap();

    assert_eq!(record.quality_label, QualityLabel::Fair);
    assert_eq!(record.label_source, LabelSource::ClassicalLabel);
}

#[tokio::test]
async fn test_evaluate_twice_shouldAppendRecords() {
    let repo = common::repository();
    let (_, units) = translated_request(&repo, &["Hello"], MockTranslator::working()).await;
    let aggregator = common::aggregator(
        &repo,
        MockClassicalScorer::with_label("GOOD"),
        MockNeuralScorer::with_score(20.0, None),
    );

    let first = aggregator.evaluate(&units[0], None).await.unwrap();
    let second = aggregator.evaluate(&units[0], Some("Bonjour")).await.unwrap();

    let history = aggregator.history(&units[0]).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, first.id);
    assert_eq!(history[1].id, second.id);
    assert_eq!(first.quality_label, QualityLabel::Poor);
    assert_eq!(first.label_source, LabelSource::NeuralScore);

    let latest = aggregator.latest(&units[0]).await.unwrap().unwrap();
    assert_eq!(latest.id, second.id);
}

#[tokio::test]
async fn test_evaluate_withExplicitNeuralError_shouldTreatAsFailure() {
    let repo = common::repository();
    let (_, units) = translated_request(&repo, &["Hello"], MockTranslator::working()).await;
    let aggregator = common::aggregator(
        &repo,
        MockClassicalScorer::with_label("GOOD"),
        MockNeuralScorer::returning(NeuralResponse {
            score: Some(1.0),
            quality_level: Some("EXCELLENT".to_string()),
            error: Some("model not loaded".to_string()),
            ..Default::default()
        }),
    );

    let record = aggregator.evaluate(&units[0], Some("Bonjour")).await.unwrap();

    assert_eq!(record.quality_label, QualityLabel::Good);
    assert_eq!(record.label_source, LabelSource::ClassicalLabel);
    assert!(record.neural_score.is_none());
}

#[tokio::test]
async fn test_evaluateBatch_shouldSkipUntranslatedUnitsAndUseReferences() {
    let repo = common::repository();
    let translator = MockTranslator::working()
        .with_override("Broken", transqa::backends::mock::MockBehavior::Failing);
    let (request_id, units) = translated_request(&repo, &["Hello", "Broken", "Bye"], translator).await;

    let classical = MockClassicalScorer::with_label("GOOD");
    let neural = MockNeuralScorer::with_score(6.0, None);
    let aggregator = common::aggregator(&repo, classical.clone(), neural.clone());

    let mut references = HashMap::new();
    references.insert(units[2].clone(), "Au revoir".to_string());
    let evaluation = aggregator.evaluate_batch(&request_id, &references).await.unwrap();

    assert_eq!(evaluation.skipped_unit_ids, vec![units[1].clone()]);
    assert_eq!(evaluation.records.len(), 2);
    assert_eq!(evaluation.records[0].unit_id, units[0]);
    assert_eq!(evaluation.records[1].unit_id, units[2]);
    assert!(!evaluation.records[0].has_reference);
    assert!(evaluation.records[1].has_reference);
    assert_eq!(classical.request_count(), 1);
    assert_eq!(neural.request_count(), 2);

    let failed = repo.get_unit(&units[1]).await.unwrap().unwrap();
    assert_eq!(failed.status, UnitStatus::Failed);
}

#[tokio::test]
async fn test_evaluateBatch_withPostEditedUnit_shouldUseEditAsReference() {
    let repo = common::repository();
    let (request_id, units) =
        translated_request(&repo, &["Hello", "Bye"], MockTranslator::working()).await;
    repo.record_post_edit(&units[0], UnitStatus::Approved, "Bonjour")
        .await
        .unwrap();

    let classical = MockClassicalScorer::with_label("FAIR");
    let neural = MockNeuralScorer::with_score(6.0, None);
    let aggregator = common::aggregator(&repo, classical.clone(), neural.clone());

    let evaluation = aggregator
        .evaluate_batch(&request_id, &HashMap::new())
        .await
        .unwrap();

    assert_eq!(evaluation.records.len(), 2);
    assert!(evaluation.records[0].has_reference);
    assert_eq!(evaluation.records[0].quality_label, QualityLabel::Fair);
    assert_eq!(evaluation.records[0].label_source, LabelSource::ClassicalLabel);
    assert!(!evaluation.records[1].has_reference);
    assert_eq!(classical.request_count(), 1);

    let unit = repo.get_unit(&units[0]).await.unwrap().unwrap();
    assert_eq!(unit.machine_translation(), "[fr] Hello");
    assert_eq!(unit.post_edit(), Some("Bonjour"));
}
