/*!
 * Database module for persistent storage of the pipeline.
 *
 * SQLite-backed persistence for:
 * - Translation requests and their units
 * - Quality records (append-only, one per evaluation run)
 * - Engine registrations read by the model registry
 */

pub mod connection;
pub mod models;
pub mod repository;
pub mod schema;
pub mod store;

pub use connection::DatabaseConnection;
pub use repository::Repository;
pub use store::Store;
