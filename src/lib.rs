/*!
 * # transqa - batch translation with quality evaluation
 *
 * A Rust library that translates batches of text units through pluggable
 * machine-translation engines and scores the results with two external
 * quality evaluators.
 *
 * ## Features
 *
 * - Translation requests with per-unit lifecycle tracking in SQLite
 * - Bounded concurrent translation with per-unit timeouts
 * - Engine registry with a cached availability snapshot
 * - Classical (reference-based) and neural (reference-free or reference-based)
 *   quality scoring reconciled into a single label
 * - External programs reached through a JSON-over-stdio process adapter
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `database`: Persistence behind the `Store` trait
 * - `registry`: Engine catalogue and registration lookup
 * - `backends`: Process boundary to translators and evaluators
 * - `translation`: Execution engine and batch lifecycle:
 *   - `translation::engine`: Single-unit translation with timeout
 *   - `translation::lifecycle`: Request state machine and worker pool
 *   - `translation::formatting`: Engine output cleanup
 * - `quality`: Labels, scoring adapter and quality aggregator
 * - `app_controller`: Main application controller
 * - `language_utils`: ISO language code utilities
 * - `errors`: Custom error types for the application
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod backends;
pub mod database;
pub mod errors;
pub mod language_utils;
pub mod quality;
pub mod registry;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use app_controller::Controller;
pub use errors::{AppError, BackendError, EvaluatorFailure, PipelineError, UnitFailure};
pub use language_utils::{get_language_name, language_codes_match, normalize_language_code};
pub use quality::QualityLabel;
pub use registry::{EngineType, ModelRegistry};
