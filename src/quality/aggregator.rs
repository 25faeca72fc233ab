/*!
 * Quality aggregator.
 *
 * Calls the scoring adapter for one unit, reconciles the two evaluators into
 * a single label and appends a quality record. Evaluator failures never reach
 * the caller; only store and lookup failures do.
 */

use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;

use super::label::{reconcile, LabelSignals, LabelSource, QualityLabel};
use super::scoring::ScoringAdapter;
use crate::database::models::{QualityRecord, TranslationUnit};
use crate::database::store::Store;
use crate::errors::PipelineError;
use crate::translation::concurrency::effective_concurrency;

/// Outcome of evaluating every translated unit of a request
#[derive(Debug, Clone, Default)]
pub struct BatchEvaluation {
    pub records: Vec<QualityRecord>,
    /// Units skipped because they have no translated text
    pub skipped_unit_ids: Vec<String>,
}

pub struct QualityAggregator {
    store: Arc<dyn Store>,
    adapter: ScoringAdapter,
    max_concurrent_evaluations: usize,
}

impl QualityAggregator {
    pub fn new(store: Arc<dyn Store>, adapter: ScoringAdapter, max_concurrent_evaluations: usize) -> Self {
        Self {
            store,
            adapter,
            max_concurrent_evaluations,
        }
    }

    /// Evaluate one unit and persist a new quality record.
    ///
    /// The machine output is scored. A blank reference counts as no reference;
    /// the reviewer's post-edit then stands in when there is one, otherwise the
    /// classical evaluator is not called.
    pub async fn evaluate(
        &self,
        unit_id: &str,
        reference: Option<&str>,
    ) -> Result<QualityRecord, PipelineError> {
        let unit = self
            .store
            .get_unit(unit_id)
            .await?
            .ok_or_else(|| PipelineError::UnitNotFound(unit_id.to_string()))?;

        self.evaluate_unit(&unit, reference).await
    }

    async fn evaluate_unit(
        &self,
        unit: &TranslationUnit,
        reference: Option<&str>,
    ) -> Result<QualityRecord, PipelineError> {
        let reference = match reference.map(str::trim).filter(|r| !r.is_empty()) {
            Some(reference) => Some(reference),
            None => {
                let post_edit = unit.post_edit();
                if post_edit.is_some() {
                    debug!("Using the post-edit of unit {} as reference", unit.short_id());
                }
                post_edit
            }
        };
        let hypothesis = unit.machine_translation().trim();

        let mut record = QualityRecord {
            id: uuid::Uuid::new_v4().to_string(),
            unit_id: unit.id.clone(),
            has_reference: reference.is_some(),
            classical: None,
            classical_label: None,
            neural_score: None,
            neural_confidence: None,
            evaluation_mode: None,
            neural_variant: None,
            neural_label: None,
            quality_label: QualityLabel::DEFAULT,
            label_source: LabelSource::Default,
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        if hypothesis.is_empty() {
            warn!(
                "Unit {} has no translated text, recording default label",
                unit.short_id()
            );
        } else {
            let classical = async {
                match reference {
                    Some(reference) => Some(self.adapter.score_classical(hypothesis, reference).await),
                    None => None,
                }
            };
            let neural = self
                .adapter
                .score_neural(&unit.source_text, hypothesis, reference);

            let (classical, neural) = tokio::join!(classical, neural);

            if let Some(Ok(signal)) = classical {
                record.classical = Some(signal.scores);
                record.classical_label = signal.label;
            }
            if let Ok(signal) = neural {
                record.neural_score = signal.score;
                record.neural_confidence = signal.confidence;
                record.evaluation_mode = Some(signal.mode);
                record.neural_variant = Some(signal.variant);
                record.neural_label = signal.label;
            }

            let (label, source) = reconcile(&LabelSignals {
                neural_label: record.neural_label,
                classical_label: record.classical_label,
                neural_score: record.neural_score,
            });
            record.quality_label = label;
            record.label_source = source;
        }

        self.store.insert_quality_record(&record).await?;
        debug!(
            "Persisted quality record {} for unit {}: {} ({})",
            record.id,
            unit.short_id(),
            record.quality_label,
            record.label_source
        );

        Ok(record)
    }

    /// Evaluate every translated unit of a request.
    ///
    /// `references` maps unit ids to reference translations; post-edited
    /// units without an entry are scored against their post-edit.
    pub async fn evaluate_batch(
        &self,
        request_id: &str,
        references: &HashMap<String, String>,
    ) -> Result<BatchEvaluation, PipelineError> {
        if self.store.get_request(request_id).await?.is_none() {
            return Err(PipelineError::RequestNotFound(request_id.to_string()));
        }

        let (translated, untranslated): (Vec<TranslationUnit>, Vec<TranslationUnit>) = self
            .store
            .get_units(request_id)
            .await?
            .into_iter()
            .partition(|u| u.has_translation());

        let skipped_unit_ids: Vec<String> = untranslated.into_iter().map(|u| u.id).collect();
        if !skipped_unit_ids.is_empty() {
            info!(
                "Skipping {} untranslated units of request {}",
                skipped_unit_ids.len(),
                request_id
            );
        }

        let workers = effective_concurrency(self.max_concurrent_evaluations, translated.len());
        let results = stream::iter(translated.iter())
            .map(|unit| {
                let reference = references.get(&unit.id).map(String::as_str);
                self.evaluate_unit(unit, reference)
            })
            .buffer_unordered(workers)
            .collect::<Vec<_>>()
            .await;

        let mut records = results.into_iter().collect::<Result<Vec<_>, _>>()?;
        let order: HashMap<&str, i64> = translated
            .iter()
            .map(|u| (u.id.as_str(), u.seq_num))
            .collect();
        records.sort_by_key(|r| order.get(r.unit_id.as_str()).copied().unwrap_or(i64::MAX));

        info!(
            "Evaluated {} units of request {}",
            records.len(),
            request_id
        );

        Ok(BatchEvaluation {
            records,
            skipped_unit_ids,
        })
    }

    /// Latest quality record of a unit
    pub async fn latest(&self, unit_id: &str) -> Result<Option<QualityRecord>, PipelineError> {
        Ok(self.store.latest_quality_record(unit_id).await?)
    }

    /// Every quality record of a unit, oldest first
    pub async fn history(&self, unit_id: &str) -> Result<Vec<QualityRecord>, PipelineError> {
        Ok(self.store.quality_records(unit_id).await?)
    }
}
