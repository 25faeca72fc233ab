/*!
 * Repository layer for database operations.
 *
 * SQLite implementation of the `Store` trait. All SQL lives here; callers
 * only see typed records.
 */

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::str::FromStr;

use super::connection::DatabaseConnection;
use super::models::{
    ClassicalScores, EngineRegistration, QualityRecord, RequestStatus, TranslationRequest,
    TranslationUnit, UnitResult, UnitStatus,
};
use super::store::Store;
use crate::registry::EngineType;

const REQUEST_COLUMNS: &str = "id, source_language, target_languages, engine_type, status, \
     word_count, char_count, file_name, created_at, updated_at, completed_at";

const UNIT_COLUMNS: &str = "id, request_id, seq_num, source_text, translated_text, \
     target_language, status, processing_time_ms, error_message, attempt_count, \
     created_at, updated_at, original_translation";

const QUALITY_COLUMNS: &str = "id, unit_id, has_reference, bleu_score, chrf_score, ter_score, \
     classical_ran, classical_label, neural_score, neural_confidence, evaluation_mode, \
     neural_variant, neural_label, quality_label, label_source, created_at";

const ENGINE_COLUMNS: &str =
    "engine_type, name, source_language, target_language, is_available, resource_handle, updated_at";

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    db: DatabaseConnection,
}

impl Repository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a repository with an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        Ok(Self::new(DatabaseConnection::new_in_memory()?))
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    fn get_request_sync(conn: &Connection, request_id: &str) -> Result<Option<TranslationRequest>> {
        let sql = format!("SELECT {} FROM translation_requests WHERE id = ?1", REQUEST_COLUMNS);
        Ok(conn.query_row(&sql, [request_id], request_from_row).optional()?)
    }

    fn get_unit_sync(conn: &Connection, unit_id: &str) -> Result<Option<TranslationUnit>> {
        let sql = format!("SELECT {} FROM translation_units WHERE id = ?1", UNIT_COLUMNS);
        Ok(conn.query_row(&sql, [unit_id], unit_from_row).optional()?)
    }
}

/// Parse a TEXT column through the type's `FromStr`
fn parse_column<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = anyhow::Error>,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e: anyhow::Error| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

fn parse_optional_column<T>(row: &Row, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr<Err = anyhow::Error>,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|value| {
        value.parse().map_err(|e: anyhow::Error| {
            rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into())
        })
    })
    .transpose()
}

fn request_from_row(row: &Row) -> rusqlite::Result<TranslationRequest> {
    let targets_json: String = row.get(2)?;
    let target_languages: Vec<String> = serde_json::from_str(&targets_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

    Ok(TranslationRequest {
        id: row.get(0)?,
        source_language: row.get(1)?,
        target_languages,
        engine_type: parse_column(row, 3)?,
        status: parse_column(row, 4)?,
        word_count: row.get(5)?,
        char_count: row.get(6)?,
        file_name: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
        completed_at: row.get(10)?,
    })
}

fn unit_from_row(row: &Row) -> rusqlite::Result<TranslationUnit> {
    Ok(TranslationUnit {
        id: row.get(0)?,
        request_id: row.get(1)?,
        seq_num: row.get(2)?,
        source_text: row.get(3)?,
        translated_text: row.get(4)?,
        target_language: row.get(5)?,
        status: parse_column(row, 6)?,
        processing_time_ms: row.get(7)?,
        error_message: row.get(8)?,
        attempt_count: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
        original_translation: row.get(12)?,
    })
}

fn quality_from_row(row: &Row) -> rusqlite::Result<QualityRecord> {
    let classical_ran: bool = row.get(6)?;
    let classical = if classical_ran {
        Some(ClassicalScores {
            bleu: row.get(3)?,
            chrf: row.get(4)?,
            ter: row.get(5)?,
        })
    } else {
        None
    };

    Ok(QualityRecord {
        id: row.get(0)?,
        unit_id: row.get(1)?,
        has_reference: row.get(2)?,
        classical,
        classical_label: parse_optional_column(row, 7)?,
        neural_score: row.get(8)?,
        neural_confidence: row.get(9)?,
        evaluation_mode: parse_optional_column(row, 10)?,
        neural_variant: parse_optional_column(row, 11)?,
        neural_label: parse_optional_column(row, 12)?,
        quality_label: parse_column(row, 13)?,
        label_source: parse_column(row, 14)?,
        created_at: row.get(15)?,
    })
}

fn engine_from_row(row: &Row) -> rusqlite::Result<EngineRegistration> {
    Ok(EngineRegistration {
        engine_type: parse_column(row, 0)?,
        name: row.get(1)?,
        source_language: row.get(2)?,
        target_language: row.get(3)?,
        is_available: row.get(4)?,
        resource_handle: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

#[async_trait]
impl Store for Repository {
    async fn create_request(
        &self,
        request: &TranslationRequest,
        units: &[TranslationUnit],
    ) -> Result<()> {
        let request = request.clone();
        let units = units.to_vec();
        let targets_json =
            serde_json::to_string(&request.target_languages).context("Failed to encode targets")?;

        debug!(
            "Persisting request {} with {} units",
            request.short_id(),
            units.len()
        );

        self.db
            .transaction_async(move |tx| {
                tx.execute(
                    r#"
                    INSERT INTO translation_requests (
                        id, source_language, target_languages, engine_type, status,
                        word_count, char_count, file_name, created_at, updated_at, completed_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                    "#,
                    params![
                        request.id,
                        request.source_language,
                        targets_json,
                        request.engine_type.to_string(),
                        request.status.to_string(),
                        request.word_count,
                        request.char_count,
                        request.file_name,
                        request.created_at,
                        request.updated_at,
                        request.completed_at,
                    ],
                )?;

                for unit in units {
                    tx.execute(
                        r#"
                        INSERT INTO translation_units (
                            id, request_id, seq_num, source_text, translated_text, target_language,
                            status, processing_time_ms, error_message, attempt_count,
                            created_at, updated_at, original_translation
                        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                        "#,
                        params![
                            unit.id,
                            unit.request_id,
                            unit.seq_num,
                            unit.source_text,
                            unit.translated_text,
                            unit.target_language,
                            unit.status.to_string(),
                            unit.processing_time_ms,
                            unit.error_message,
                            unit.attempt_count,
                            unit.created_at,
                            unit.updated_at,
                            unit.original_translation,
                        ],
                    )?;
                }
                Ok(())
            })
            .await
    }

    async fn get_request(&self, request_id: &str) -> Result<Option<TranslationRequest>> {
        let request_id = request_id.to_string();

        self.db
            .execute_async(move |conn| Self::get_request_sync(conn, &request_id))
            .await
    }

    async fn list_requests(
        &self,
        status: Option<RequestStatus>,
    ) -> Result<Vec<TranslationRequest>> {
        self.db
            .execute_async(move |conn| {
                let requests = match status {
                    Some(status) => {
                        let sql = format!(
                            "SELECT {} FROM translation_requests WHERE status = ?1 ORDER BY created_at DESC",
                            REQUEST_COLUMNS
                        );
                        let mut stmt = conn.prepare(&sql)?;
                        stmt.query_map([status.to_string()], request_from_row)?
                            .collect::<rusqlite::Result<Vec<_>>>()?
                    }
                    None => {
                        let sql = format!(
                            "SELECT {} FROM translation_requests ORDER BY created_at DESC",
                            REQUEST_COLUMNS
                        );
                        let mut stmt = conn.prepare(&sql)?;
                        stmt.query_map([], request_from_row)?
                            .collect::<rusqlite::Result<Vec<_>>>()?
                    }
                };
                Ok(requests)
            })
            .await
    }

    async fn update_request_status(&self, request_id: &str, status: RequestStatus) -> Result<()> {
        let request_id = request_id.to_string();
        let now = chrono::Utc::now().to_rfc3339();

        self.db
            .execute_async(move |conn| {
                let completed_at = if status.is_terminal() {
                    Some(now.clone())
                } else {
                    None
                };

                let changed = conn.execute(
                    r#"
                    UPDATE translation_requests
                    SET status = ?1, updated_at = ?2, completed_at = COALESCE(?3, completed_at)
                    WHERE id = ?4
                    "#,
                    params![status.to_string(), now, completed_at, request_id],
                )?;

                if changed == 0 {
                    return Err(anyhow::anyhow!("Translation request not found: {}", request_id));
                }
                Ok(())
            })
            .await
    }

    async fn get_unit(&self, unit_id: &str) -> Result<Option<TranslationUnit>> {
        let unit_id = unit_id.to_string();

        self.db
            .execute_async(move |conn| Self::get_unit_sync(conn, &unit_id))
            .await
    }

    async fn get_units(&self, request_id: &str) -> Result<Vec<TranslationUnit>> {
        let request_id = request_id.to_string();

        self.db
            .execute_async(move |conn| {
                let sql = format!(
                    "SELECT {} FROM translation_units WHERE request_id = ?1 ORDER BY seq_num",
                    UNIT_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let units = stmt
                    .query_map([&request_id], unit_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(units)
            })
            .await
    }

    async fn update_unit_status(&self, unit_id: &str, status: UnitStatus) -> Result<()> {
        let unit_id = unit_id.to_string();
        let now = chrono::Utc::now().to_rfc3339();

        self.db
            .execute_async(move |conn| {
                let changed = conn.execute(
                    "UPDATE translation_units SET status = ?1, updated_at = ?2 WHERE id = ?3",
                    params![status.to_string(), now, unit_id],
                )?;

                if changed == 0 {
                    return Err(anyhow::anyhow!("Translation unit not found: {}", unit_id));
                }
                Ok(())
            })
            .await
    }

    async fn record_unit_result(&self, unit_id: &str, result: &UnitResult) -> Result<()> {
        let unit_id = unit_id.to_string();
        let result = result.clone();
        let now = chrono::Utc::now().to_rfc3339();

        self.db
            .execute_async(move |conn| {
                let changed = conn.execute(
                    r#"
                    UPDATE translation_units
                    SET status = ?1,
                        translated_text = COALESCE(?2, translated_text),
                        processing_time_ms = ?3,
                        error_message = ?4,
                        attempt_count = attempt_count + 1,
                        updated_at = ?5
                    WHERE id = ?6
                    "#,
                    params![
                        result.status.to_string(),
                        result.translated_text,
                        result.processing_time_ms,
                        result.error_message,
                        now,
                        unit_id,
                    ],
                )?;

                if changed == 0 {
                    return Err(anyhow::anyhow!("Translation unit not found: {}", unit_id));
                }
                Ok(())
            })
            .await
    }

    async fn record_post_edit(
        &self,
        unit_id: &str,
        status: UnitStatus,
        edited_text: &str,
    ) -> Result<()> {
        let unit_id = unit_id.to_string();
        let edited_text = edited_text.to_string();
        let now = chrono::Utc::now().to_rfc3339();

        self.db
            .execute_async(move |conn| {
                let changed = conn.execute(
                    r#"
                    UPDATE translation_units
                    SET original_translation = CASE
                            WHEN original_translation IS NULL AND translated_text <> ?2
                            THEN translated_text
                            ELSE original_translation
                        END,
                        translated_text = ?2,
                        status = ?1,
                        updated_at = ?3
                    WHERE id = ?4
                    "#,
                    params![status.to_string(), edited_text, now, unit_id],
                )?;

                if changed == 0 {
                    return Err(anyhow::anyhow!("Translation unit not found: {}", unit_id));
                }
                debug!("Recorded post-edit for unit {}", unit_id);
                Ok(())
            })
            .await
    }

    async fn insert_quality_record(&self, record: &QualityRecord) -> Result<()> {
        let record = record.clone();

        self.db
            .transaction_async(move |tx| {
                let next_seq: i64 = tx.query_row(
                    "SELECT COALESCE(MAX(seq), 0) + 1 FROM quality_records WHERE unit_id = ?1",
                    [&record.unit_id],
                    |row| row.get(0),
                )?;

                let scores = record.classical.unwrap_or_default();

                tx.execute(
                    r#"
                    INSERT INTO quality_records (
                        id, unit_id, seq, has_reference, bleu_score, chrf_score, ter_score,
                        classical_ran, classical_label, neural_score, neural_confidence,
                        evaluation_mode, neural_variant, neural_label, quality_label,
                        label_source, created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
                    "#,
                    params![
                        record.id,
                        record.unit_id,
                        next_seq,
                        record.has_reference,
                        scores.bleu,
                        scores.chrf,
                        scores.ter,
                        record.classical.is_some(),
                        record.classical_label.map(|l| l.to_string()),
                        record.neural_score,
                        record.neural_confidence,
                        record.evaluation_mode.map(|m| m.to_string()),
                        record.neural_variant.map(|v| v.to_string()),
                        record.neural_label.map(|l| l.to_string()),
                        record.quality_label.to_string(),
                        record.label_source.to_string(),
                        record.created_at,
                    ],
                )?;
                Ok(())
            })
            .await
    }

    async fn latest_quality_record(&self, unit_id: &str) -> Result<Option<QualityRecord>> {
        let unit_id = unit_id.to_string();

        self.db
            .execute_async(move |conn| {
                let sql = format!(
                    "SELECT {} FROM quality_records WHERE unit_id = ?1 ORDER BY seq DESC LIMIT 1",
                    QUALITY_COLUMNS
                );
                Ok(conn.query_row(&sql, [&unit_id], quality_from_row).optional()?)
            })
            .await
    }

    async fn quality_records(&self, unit_id: &str) -> Result<Vec<QualityRecord>> {
        let unit_id = unit_id.to_string();

        self.db
            .execute_async(move |conn| {
                let sql = format!(
                    "SELECT {} FROM quality_records WHERE unit_id = ?1 ORDER BY seq",
                    QUALITY_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let records = stmt
                    .query_map([&unit_id], quality_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(records)
            })
            .await
    }

    async fn upsert_engine(&self, registration: &EngineRegistration) -> Result<()> {
        let registration = registration.clone();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO engine_registrations (
                        engine_type, name, source_language, target_language,
                        is_available, resource_handle, updated_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    ON CONFLICT(engine_type) DO UPDATE SET
                        name = excluded.name,
                        source_language = excluded.source_language,
                        target_language = excluded.target_language,
                        is_available = excluded.is_available,
                        resource_handle = excluded.resource_handle,
                        updated_at = excluded.updated_at
                    "#,
                    params![
                        registration.engine_type.to_string(),
                        registration.name,
                        registration.source_language,
                        registration.target_language,
                        registration.is_available,
                        registration.resource_handle,
                        registration.updated_at,
                    ],
                )?;
                Ok(())
            })
            .await
    }

    async fn get_engine(&self, engine_type: EngineType) -> Result<Option<EngineRegistration>> {
        self.db
            .execute_async(move |conn| {
                let sql = format!(
                    "SELECT {} FROM engine_registrations WHERE engine_type = ?1",
                    ENGINE_COLUMNS
                );
                Ok(conn
                    .query_row(&sql, [engine_type.to_string()], engine_from_row)
                    .optional()?)
            })
            .await
    }

    async fn list_engines(&self) -> Result<Vec<EngineRegistration>> {
        self.db
            .execute_async(move |conn| {
                let sql = format!(
                    "SELECT {} FROM engine_registrations ORDER BY engine_type",
                    ENGINE_COLUMNS
                );
                let mut stmt = conn.prepare(&sql)?;
                let engines = stmt
                    .query_map([], engine_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(engines)
            })
            .await
    }

    async fn set_engine_availability(
        &self,
        engine_type: EngineType,
        available: bool,
    ) -> Result<bool> {
        let now = chrono::Utc::now().to_rfc3339();

        self.db
            .execute_async(move |conn| {
                let changed = conn.execute(
                    "UPDATE engine_registrations SET is_available = ?1, updated_at = ?2 WHERE engine_type = ?3",
                    params![available, now, engine_type.to_string()],
                )?;
                Ok(changed > 0)
            })
            .await
    }
}
