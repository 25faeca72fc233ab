/*!
 * Quality evaluation.
 *
 * - `label`: quality labels, tag normalization and the reconciliation policy
 * - `scoring`: adapter over the classical and neural evaluators
 * - `aggregator`: evaluates units and persists quality records
 */

pub mod aggregator;
pub mod label;
pub mod scoring;

pub use aggregator::{BatchEvaluation, QualityAggregator};
pub use label::{reconcile, LabelSignals, LabelSource, QualityLabel};
pub use scoring::ScoringAdapter;
