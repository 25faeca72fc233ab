/*!
 * Tests for quality labels and the reconciliation policy
 */

use transqa::quality::label::{EvaluationMode, NeuralVariant};
use transqa::quality::{reconcile, LabelSignals, LabelSource, QualityLabel};

#[test]
fn test_reconcile_withNothing_shouldDefaultToPoor() {
    let (label, source) = reconcile(&LabelSignals::default());
    assert_eq!(label, QualityLabel::Poor);
    assert_eq!(source, LabelSource::Default);
}

#[test]
fn test_reconcile_shouldFollowPriorityOrder() {
    let all = LabelSignals {
        neural_label: Some(QualityLabel::Fair),
        classical_label: Some(QualityLabel::Excellent),
        neural_score: Some(1.0),
    };
    assert_eq!(reconcile(&all), (QualityLabel::Fair, LabelSource::NeuralLabel));

    let no_neural_label = LabelSignals {
        neural_label: None,
        ..all
    };
    assert_eq!(
        reconcile(&no_neural_label),
        (QualityLabel::Excellent, LabelSource::ClassicalLabel)
    );

    let score_only = LabelSignals {
        neural_score: Some(13.0),
        ..LabelSignals::default()
    };
    assert_eq!(reconcile(&score_only), (QualityLabel::Fair, LabelSource::NeuralScore));
}

#[test]
fn test_fromNeuralScore_shouldUseInclusiveUpperBounds() {
    assert_eq!(QualityLabel::from_neural_score(0.0), QualityLabel::Excellent);
    assert_eq!(QualityLabel::from_neural_score(7.0), QualityLabel::Excellent);
    assert_eq!(QualityLabel::from_neural_score(7.01), QualityLabel::Good);
    assert_eq!(QualityLabel::from_neural_score(12.0), QualityLabel::Good);
    assert_eq!(QualityLabel::from_neural_score(18.0), QualityLabel::Fair);
    assert_eq!(QualityLabel::from_neural_score(18.5), QualityLabel::Poor);
    assert_eq!(QualityLabel::from_neural_score(-3.0), QualityLabel::Excellent);
}

#[test]
fn test_fromTag_shouldIgnoreNonLabelTags() {
    assert_eq!(QualityLabel::from_tag("excellent"), Some(QualityLabel::Excellent));
    assert_eq!(QualityLabel::from_tag("NO_REFERENCE"), None);
    assert_eq!(QualityLabel::from_tag("EMPTY_HYPOTHESIS"), None);
    assert_eq!(QualityLabel::from_tag("ERROR"), None);
}

#[test]
fn test_evaluationTags_shouldNormalize() {
    assert_eq!(EvaluationMode::from_tag("reference-based"), EvaluationMode::ReferenceBased);
    assert_eq!(EvaluationMode::from_tag("qe"), EvaluationMode::ReferenceFree);
    assert_eq!(NeuralVariant::from_tag("metricx-24-xxl"), NeuralVariant::Metricx24Xxl);
    assert_eq!(NeuralVariant::from_tag("unknown"), NeuralVariant::Metricx24Hybrid);
}
