use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{get_json, get_time, to_db_time, DbError, DbResult};
use crate::engine::repository::{ContentRepository, RepoResult, ValidationRecordRepository};
use crate::models::content_models::{ContentItem, ContentPayload, NewValidationRecord, ValidationRecord, ValidationState};
use crate::models::ContentRef;

const CONTENT_COLUMNS: &str =
    "id, content_type, author_id, validation_state, locked, payload, created_at, updated_at, version";

const RECORD_COLUMNS: &str =
    "id, content_type, content_id, from_state, to_state, actor_id, comment, occurred_at";

fn map_content(row: &Row<'_>) -> rusqlite::Result<ContentItem> {
    Ok(ContentItem {
        id: row.get(0)?,
        content_type: row.get(1)?,
        author_id: row.get(2)?,
        validation_state: row.get(3)?,
        locked: row.get(4)?,
        payload: get_json(row, 5)?,
        created_at: get_time(row, 6)?,
        updated_at: get_time(row, 7)?,
        version: row.get(8)?,
    })
}

fn map_record(row: &Row<'_>) -> rusqlite::Result<ValidationRecord> {
    Ok(ValidationRecord {
        id: row.get(0)?,
        content: ContentRef::new(row.get(1)?, row.get(2)?),
        from_state: row.get(3)?,
        to_state: row.get(4)?,
        actor_id: row.get(5)?,
        comment: row.get(6)?,
        occurred_at: get_time(row, 7)?,
    })
}

pub fn read_content(conn: &Connection, content: ContentRef) -> DbResult<Option<ContentItem>> {
    let item = conn
        .query_row(
            &format!("SELECT {} FROM content_items WHERE id = ?1 AND content_type = ?2", CONTENT_COLUMNS),
            params![content.content_id, content.content_type],
            map_content,
        )
        .optional()?;
    Ok(item)
}

pub fn create_content(
    conn: &Connection,
    author_id: i64,
    payload: &ContentPayload,
    now: DateTime<Utc>,
) -> DbResult<ContentItem> {
    let content_type = payload.content_type();
    let now = to_db_time(&now);
    conn.execute(
        "INSERT INTO content_items (content_type, author_id, validation_state, payload, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![content_type, author_id, ValidationState::Pending, serde_json::to_string(payload)?, now],
    )?;
    let content = ContentRef::new(content_type, conn.last_insert_rowid());
    read_content(conn, content)?.ok_or_else(|| DbError::not_found("content", content))
}

pub fn update_content(conn: &Connection, item: &ContentItem) -> DbResult<ContentItem> {
    let content = item.content_ref();
    let updated = conn.execute(
        "UPDATE content_items
         SET validation_state = ?1, locked = ?2, payload = ?3, updated_at = ?4, version = version + 1
         WHERE id = ?5 AND content_type = ?6 AND version = ?7",
        params![
            item.validation_state,
            item.locked,
            serde_json::to_string(&item.payload)?,
            to_db_time(&item.updated_at),
            item.id,
            item.content_type,
            item.version
        ],
    )?;
    if updated == 0 {
        return Err(DbError::stale("content", content));
    }
    read_content(conn, content)?.ok_or_else(|| DbError::not_found("content", content))
}

pub fn create_validation_record(conn: &Connection, record: &NewValidationRecord) -> DbResult<ValidationRecord> {
    conn.execute(
        "INSERT INTO validation_records (content_type, content_id, from_state, to_state, actor_id, comment, occurred_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            record.content.content_type,
            record.content.content_id,
            record.from_state,
            record.to_state,
            record.actor_id,
            record.comment,
            to_db_time(&record.occurred_at)
        ],
    )?;
    let id = conn.last_insert_rowid();
    let record = conn.query_row(
        &format!("SELECT {} FROM validation_records WHERE id = ?1", RECORD_COLUMNS),
        [id],
        map_record,
    )?;
    Ok(record)
}

pub fn read_validation_records(conn: &Connection, content: ContentRef) -> DbResult<Vec<ValidationRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM validation_records WHERE content_type = ?1 AND content_id = ?2 ORDER BY id",
        RECORD_COLUMNS
    ))?;
    let records = stmt
        .query_map(params![content.content_type, content.content_id], map_record)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(records)
}

impl ContentRepository for Connection {
    fn get_content(&self, content: ContentRef) -> RepoResult<Option<ContentItem>> {
        Ok(read_content(self, content)?)
    }

    fn insert_content(&self, author_id: i64, payload: &ContentPayload, now: DateTime<Utc>) -> RepoResult<ContentItem> {
        Ok(create_content(self, author_id, payload, now)?)
    }

    fn save_content(&self, item: &ContentItem) -> RepoResult<ContentItem> {
        Ok(update_content(self, item)?)
    }
}

impl ValidationRecordRepository for Connection {
    fn append_record(&self, record: &NewValidationRecord) -> RepoResult<ValidationRecord> {
        Ok(create_validation_record(self, record)?)
    }

    fn records_for(&self, content: ContentRef) -> RepoResult<Vec<ValidationRecord>> {
        Ok(read_validation_records(self, content)?)
    }
}
