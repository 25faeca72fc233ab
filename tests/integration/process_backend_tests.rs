/*!
 * Integration tests for the process adapter, driven by small shell scripts
 */

#![cfg(unix)]

use std::path::PathBuf;
use std::time::Duration;

use tempfile::TempDir;
use transqa::backends::process::ProcessBackend;
use transqa::backends::{
    ClassicalRequest, ClassicalScorer, NeuralRequest, NeuralScorer, TranslateRequest,
    TranslationBackend, PROTOCOL_VERSION,
};
use transqa::database::models::{EngineRegistration, TranslationUnit};
use transqa::errors::BackendError;
use transqa::registry::EngineType;
use transqa::translation::ExecutionEngine;

/// Write a shell script and return a backend running it with `sh`
fn script_backend(dir: &TempDir, name: &str, body: &str) -> ProcessBackend {
    let path: PathBuf = dir.path().join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    ProcessBackend::new("sh", vec![path.to_string_lossy().to_string()])
}

fn translate_request(text: &str) -> TranslateRequest {
    TranslateRequest {
        version: PROTOCOL_VERSION,
        source_text: text.to_string(),
        engine: EngineType::MarianMtEnFr,
        resource_handle: "/models/en-fr".to_string(),
        source_language: "en".to_string(),
        target_language: "fr".to_string(),
    }
}

#[tokio::test]
async fn test_translate_withWellFormedAnswer_shouldDecodeIt() {
    let dir = tempfile::tempdir().unwrap();
    let backend = script_backend(
        &dir,
        "translate.sh",
        r#"cat > /dev/null
echo '{"version": 1, "translation": "Bonjour", "error": null}'"#,
    );

    let response = backend.translate(translate_request("Hello")).await.unwrap();
    assert_eq!(response.translation, "Bonjour");
    assert_eq!(response.error, None);
}

#[tokio::test]
async fn test_translate_shouldReceiveRequestOnStdin() {
    let dir = tempfile::tempdir().unwrap();
    let backend = script_backend(
        &dir,
        "echo.sh",
        r#"input=$(cat)
case "$input" in
  *'"source_text":"Good morning"'*) echo '{"version": 1, "translation": "matched"}' ;;
  *) echo '{"version": 1, "translation": "unmatched"}' ;;
esac"#,
    );

    let response = backend.translate(translate_request("Good morning")).await.unwrap();
    assert_eq!(response.translation, "matched");
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_translate_shouldRunChildInItsOwnProcessGroup() {
    let dir = tempfile::tempdir().unwrap();
    let backend = script_backend(
        &dir,
        "pgrp.sh",
        r#"cat > /dev/null
set -- $(cat /proc/$$/stat)
echo "{\"version\": 1, \"translation\": \"$1:$5\"}""#,
    );

    let response = backend.translate(translate_request("Hello")).await.unwrap();
    let (pid, pgrp) = response.translation.split_once(':').unwrap();
    assert_eq!(pid, pgrp);
}

#[tokio::test]
async fn test_translate_withLogLinesBeforeJson_shouldDecodeLastLine() {
    let dir = tempfile::tempdir().unwrap();
    let backend = script_backend(
        &dir,
        "chatty.sh",
        r#"cat > /dev/null
echo 'Loading checkpoint shards...'
echo '{"version": 1, "translation": "Salut"}'"#,
    );

    let response = backend.translate(translate_request("Hi")).await.unwrap();
    assert_eq!(response.translation, "Salut");
}

#[tokio::test]
async fn test_translate_withNonZeroExit_shouldCaptureStderr() {
    let dir = tempfile::tempdir().unwrap();
    let backend = script_backend(
        &dir,
        "crash.sh",
        r#"cat > /dev/null
echo 'model weights missing' >&2
exit 3"#,
    );

    let error = backend.translate(translate_request("Hello")).await.unwrap_err();
    match error {
        BackendError::NonZeroExit { code, stderr } => {
            assert_eq!(code, Some(3));
            assert!(stderr.contains("model weights missing"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_translate_withGarbageOutput_shouldBeMalformed() {
    let dir = tempfile::tempdir().unwrap();
    let backend = script_backend(&dir, "garbage.sh", "cat > /dev/null\necho 'definitely not json'");

    let error = backend.translate(translate_request("Hello")).await.unwrap_err();
    assert!(matches!(error, BackendError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_translate_withUnsupportedVersion_shouldBeMalformed() {
    let dir = tempfile::tempdir().unwrap();
    let backend = script_backend(
        &dir,
        "future.sh",
        r#"cat > /dev/null
echo '{"version": 7, "translation": "Bonjour"}'"#,
    );

    let error = backend.translate(translate_request("Hello")).await.unwrap_err();
    assert!(matches!(error, BackendError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_translate_withMissingProgram_shouldFailToSpawn() {
    let backend = ProcessBackend::new("/nonexistent/transqa-translator", Vec::new());

    let error = backend.translate(translate_request("Hello")).await.unwrap_err();
    assert!(matches!(error, BackendError::Spawn(_)));
}

#[tokio::test]
async fn test_classicalScore_shouldDecodeMetricsAndLabel() {
    let dir = tempfile::tempdir().unwrap();
    let backend = script_backend(
        &dir,
        "classical.sh",
        r#"cat > /dev/null
echo '{"bleu_score": 41.5, "chrf_score": 63.0, "ter_score": 38.2, "quality_label": "GOOD"}'"#,
    );

    let response = ClassicalScorer::score(
        &backend,
        ClassicalRequest {
            version: PROTOCOL_VERSION,
            hypothesis: "Bonjour".to_string(),
            reference: "Bonjour".to_string(),
        },
    )
    .await
    .unwrap();

    assert_eq!(response.bleu_score, Some(41.5));
    assert_eq!(response.quality_label.as_deref(), Some("GOOD"));
}

#[tokio::test]
async fn test_neuralScore_withErrorField_shouldPassItThrough() {
    let dir = tempfile::tempdir().unwrap();
    let backend = script_backend(
        &dir,
        "neural.sh",
        r#"cat > /dev/null
echo '{"version": 1, "score": null, "error": "checkpoint not found"}'"#,
    );

    let response = NeuralScorer::score(
        &backend,
        NeuralRequest {
            version: PROTOCOL_VERSION,
            source: "Hello".to_string(),
            hypothesis: "Bonjour".to_string(),
            reference: None,
        },
    )
    .await
    .unwrap();

    assert_eq!(response.score, None);
    assert_eq!(response.error.as_deref(), Some("checkpoint not found"));
}

#[tokio::test]
async fn test_executionEngine_withHangingProcess_shouldTimeOut() {
    let dir = tempfile::tempdir().unwrap();
    let backend = script_backend(&dir, "hang.sh", "cat > /dev/null\nsleep 10");
    let engine = ExecutionEngine::new(std::sync::Arc::new(backend), Duration::from_millis(300));

    let unit = TranslationUnit::new("request".to_string(), 1, "Hello".to_string(), "fr".to_string());
    let registration = EngineRegistration::new(EngineType::MarianMtEnFr, "/models/en-fr");

    let started = std::time::Instant::now();
    let failure = engine.translate(&unit, "en", &registration).await.unwrap_err();

    assert!(failure.is_timeout());
    assert_eq!(failure.unit_id, unit.id);
    assert!(started.elapsed() < Duration::from_secs(5));
}
