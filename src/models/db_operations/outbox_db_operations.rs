use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{get_json, to_db_time, DbResult};
use crate::engine::events::DomainEvent;
use crate::engine::repository::{EventOutbox, RepoResult};

pub fn create_outbox_entry(conn: &Connection, event: &DomainEvent) -> DbResult<i64> {
    conn.execute(
        "INSERT INTO event_outbox (event_id, event_name, payload, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            event.event_id.to_string(),
            event.name(),
            serde_json::to_string(event)?,
            to_db_time(&event.occurred_at)
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Oldest undelivered events first.
pub fn read_undelivered(conn: &Connection, limit: u32) -> DbResult<Vec<(i64, DomainEvent)>> {
    let mut stmt = conn.prepare(
        "SELECT id, payload FROM event_outbox WHERE delivered_at IS NULL ORDER BY id LIMIT ?1",
    )?;
    let events: Vec<(i64, DomainEvent)> = stmt
        .query_map([limit], |row| Ok((row.get(0)?, get_json(row, 1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(events)
}

pub fn mark_delivered(conn: &Connection, outbox_id: i64, delivered_at: DateTime<Utc>) -> DbResult<()> {
    conn.execute(
        "UPDATE event_outbox SET delivered_at = ?1 WHERE id = ?2 AND delivered_at IS NULL",
        params![to_db_time(&delivered_at), outbox_id],
    )?;
    Ok(())
}

impl EventOutbox for Connection {
    fn enqueue_event(&self, event: &DomainEvent) -> RepoResult<i64> {
        Ok(create_outbox_entry(self, event)?)
    }

    fn pending_events(&self, limit: u32) -> RepoResult<Vec<(i64, DomainEvent)>> {
        Ok(read_undelivered(self, limit)?)
    }

    fn mark_delivered(&self, outbox_id: i64, delivered_at: DateTime<Utc>) -> RepoResult<()> {
        Ok(mark_delivered(self, outbox_id, delivered_at)?)
    }
}
