/*!
 * Translation of batches.
 *
 * - `engine`: translates one unit through a backend, bounded by a timeout
 * - `lifecycle`: request state machine and the bounded worker pool over units
 * - `formatting`: cleanup of raw engine output
 * - `concurrency`: cancellation and progress primitives
 */

pub use self::engine::{ExecutionEngine, TranslatedText};
pub use self::lifecycle::{
    BatchLifecycleManager, BatchStatusReport, BatchSummary, LifecycleOptions,
    NewTranslationRequest, UnitOutcome,
};

pub mod concurrency;
pub mod engine;
pub mod formatting;
pub mod lifecycle;
