/*!
 * Database schema definitions and migrations.
 *
 * This module contains the SQL schema for all database tables
 * and handles schema migrations for version upgrades.
 */

use anyhow::{Context, Result};
use log::{debug, info};
use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Initialize the database schema
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    // Pragmas are per-connection, so they are applied on every open
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;

    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Initializing database schema v{}", SCHEMA_VERSION);
        create_all_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!(
            "Migrating database schema from v{} to v{}",
            current_version, SCHEMA_VERSION
        );
        migrate_schema(conn, current_version)?;
    } else {
        debug!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

fn get_schema_version(conn: &Connection) -> Result<i32> {
    let table_exists: bool = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='schema_version'",
            [],
            |row| row.get(0),
        )
        .context("Failed to check schema_version table existence")?;

    if !table_exists {
        return Ok(0);
    }

    let version: i32 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .unwrap_or(0);

    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_version (id, version, updated_at) VALUES (1, ?1, datetime('now'))",
        [version],
    )?;
    Ok(())
}

fn create_all_tables(conn: &Connection) -> Result<()> {
    // WAL for crash recovery; in-memory databases silently keep "memory"
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS engine_registrations (
            engine_type TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            source_language TEXT NOT NULL,
            target_language TEXT NOT NULL,
            is_available INTEGER NOT NULL DEFAULT 1,
            resource_handle TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS translation_requests (
            id TEXT PRIMARY KEY,
            source_language TEXT NOT NULL,
            target_languages TEXT NOT NULL,
            engine_type TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'DRAFT',
            word_count INTEGER NOT NULL DEFAULT 0,
            char_count INTEGER NOT NULL DEFAULT 0,
            file_name TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            completed_at TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_requests_status ON translation_requests(status);
        "#,
    )?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS translation_units (
            id TEXT PRIMARY KEY,
            request_id TEXT NOT NULL REFERENCES translation_requests(id) ON DELETE CASCADE,
            seq_num INTEGER NOT NULL,
            source_text TEXT NOT NULL,
            translated_text TEXT NOT NULL DEFAULT '',
            target_language TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'DRAFT',
            processing_time_ms INTEGER,
            error_message TEXT,
            attempt_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            original_translation TEXT,
            UNIQUE(request_id, seq_num)
        );

        CREATE INDEX IF NOT EXISTS idx_units_request ON translation_units(request_id);
        CREATE INDEX IF NOT EXISTS idx_units_status ON translation_units(status);
        "#,
    )?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS quality_records (
            id TEXT PRIMARY KEY,
            unit_id TEXT NOT NULL REFERENCES translation_units(id) ON DELETE CASCADE,
            seq INTEGER NOT NULL,
            has_reference INTEGER NOT NULL,
            bleu_score REAL,
            chrf_score REAL,
            ter_score REAL,
            classical_ran INTEGER NOT NULL DEFAULT 0,
            classical_label TEXT,
            neural_score REAL,
            neural_confidence REAL,
            evaluation_mode TEXT,
            neural_variant TEXT,
            neural_label TEXT,
            quality_label TEXT NOT NULL,
            label_source TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE(unit_id, seq)
        );

        CREATE INDEX IF NOT EXISTS idx_quality_unit ON quality_records(unit_id);
        "#,
    )?;

    info!("Database schema created successfully");
    Ok(())
}

fn migrate_schema(conn: &Connection, from_version: i32) -> Result<()> {
    if from_version < 1 {
        return Err(anyhow::anyhow!(
            "Unknown schema version: {}. Cannot migrate.",
            from_version
        ));
    }

    if from_version < 2 {
        debug!("Adding translation_units.original_translation");
        conn.execute_batch("ALTER TABLE translation_units ADD COLUMN original_translation TEXT;")
            .context("Failed to add original_translation column")?;
    }

    set_schema_version(conn, SCHEMA_VERSION)?;
    info!("Schema migration completed to v{}", SCHEMA_VERSION);
    Ok(())
}
