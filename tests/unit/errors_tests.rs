/*!
 * Tests for the error taxonomy
 */

use std::time::Duration;

use transqa::database::models::RequestStatus;
use transqa::errors::{
    AppError, BackendError, EvaluatorFailure, EvaluatorKind, PipelineError, UnitFailure,
    UnitFailureReason,
};
use transqa::registry::EngineType;

#[test]
fn test_unitFailure_fromTimeout_shouldReportTimeout() {
    let failure = UnitFailure::new(
        "unit-1",
        BackendError::Timeout {
            after: Duration::from_secs(2),
        },
    );
    assert!(failure.is_timeout());
    assert!(failure.to_string().contains("unit-1"));

    let empty = UnitFailure::new("unit-2", UnitFailureReason::EmptyTranslation);
    assert!(!empty.is_timeout());
}

#[test]
fn test_evaluatorFailure_shouldNameEvaluator() {
    let failure = EvaluatorFailure::neural(BackendError::Reported("oom".to_string()));
    assert_eq!(failure.evaluator, EvaluatorKind::Neural);
    assert!(failure.to_string().starts_with("neural evaluator failed"));
}

#[test]
fn test_pipelineError_shouldFormatTransitions() {
    let error = PipelineError::InvalidTransition {
        from: RequestStatus::Completed,
        to: RequestStatus::InProgress,
    };
    assert_eq!(
        error.to_string(),
        "Invalid request transition from COMPLETED to IN_PROGRESS"
    );

    let unavailable = PipelineError::EngineUnavailable(EngineType::Nllb200);
    assert!(unavailable.to_string().contains("NLLB_200"));
}

#[test]
fn test_appError_conversions_shouldWrapSources() {
    let from_anyhow: AppError = anyhow::anyhow!("boom").into();
    assert!(matches!(from_anyhow, AppError::Unknown(_)));

    let from_io: AppError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
    assert!(matches!(from_io, AppError::File(_)));

    let from_pipeline: AppError = PipelineError::RequestNotFound("r1".to_string()).into();
    assert!(matches!(from_pipeline, AppError::Pipeline(_)));
}

#[test]
fn test_languagePairMismatch_shouldNameBothPairs() {
    let error = PipelineError::LanguagePairMismatch {
        engine: EngineType::MarianMtEnFr,
        supported: "English to French".to_string(),
        requested: "English to German".to_string(),
    };
    assert_eq!(
        error.to_string(),
        "Engine MARIAN_MT_EN_FR translates English to French, request asks for English to German"
    );

    let failure = UnitFailure::new("unit-3", UnitFailureReason::Store("disk full".to_string()));
    assert!(!failure.is_timeout());
    assert!(failure.to_string().ends_with("Failed to persist unit outcome: disk full"));
}
