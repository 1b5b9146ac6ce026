use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{get_json, get_opt_time, get_time, opt_db_time, to_db_time, DbError, DbResult};
use crate::engine::repository::{ModeratorActionRepository, RepoResult};
use crate::models::moderation_models::{ActionStatus, ActionTarget, ModeratorAction, TargetType};
use crate::models::{ContentRef, ContentType};

const ACTION_COLUMNS: &str = "id, moderator_id, action_type, target_type, target_id, content_type, \
     target_user_id, reason, severity, status, previous_state, new_state, is_reversible, is_reversed, \
     reversed_by, reversed_at, reversal_reason, duration_secs, expires_at, decided_by, decided_at, \
     decision_note, created_at, version";

fn map_action(row: &Row<'_>) -> rusqlite::Result<ModeratorAction> {
    let target_type: TargetType = row.get(3)?;
    let target_id: i64 = row.get(4)?;
    let content_type: Option<ContentType> = row.get(5)?;
    let target = match (target_type, content_type) {
        (TargetType::User, _) => ActionTarget::User { user_id: target_id },
        (TargetType::Content, Some(content_type)) => {
            ActionTarget::Content { content: ContentRef::new(content_type, target_id) }
        }
        (TargetType::Content, None) => {
            return Err(rusqlite::Error::InvalidColumnType(5, "content_type".to_string(), Type::Null))
        }
    };

    Ok(ModeratorAction {
        id: row.get(0)?,
        moderator_id: row.get(1)?,
        action_type: row.get(2)?,
        target,
        target_user_id: row.get(6)?,
        reason: row.get(7)?,
        severity: row.get(8)?,
        status: row.get(9)?,
        previous_state: get_json(row, 10)?,
        new_state: get_json(row, 11)?,
        is_reversible: row.get(12)?,
        is_reversed: row.get(13)?,
        reversed_by: row.get(14)?,
        reversed_at: get_opt_time(row, 15)?,
        reversal_reason: row.get(16)?,
        duration_secs: row.get(17)?,
        expires_at: get_opt_time(row, 18)?,
        decided_by: row.get(19)?,
        decided_at: get_opt_time(row, 20)?,
        decision_note: row.get(21)?,
        created_at: get_time(row, 22)?,
        version: row.get(23)?,
    })
}

pub fn read_action(conn: &Connection, action_id: i64) -> DbResult<Option<ModeratorAction>> {
    let action = conn
        .query_row(
            &format!("SELECT {} FROM moderator_actions WHERE id = ?1", ACTION_COLUMNS),
            [action_id],
            map_action,
        )
        .optional()?;
    Ok(action)
}

pub fn create_action(conn: &Connection, action: &ModeratorAction) -> DbResult<ModeratorAction> {
    let (target_type, target_id, content_type) = action.target_columns();
    conn.execute(
        "INSERT INTO moderator_actions (moderator_id, action_type, target_type, target_id, content_type,
            target_user_id, reason, severity, status, previous_state, new_state, is_reversible,
            duration_secs, expires_at, decided_by, decided_at, decision_note, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
        params![
            action.moderator_id,
            action.action_type,
            target_type,
            target_id,
            content_type,
            action.target_user_id,
            action.reason,
            action.severity,
            action.status,
            serde_json::to_string(&action.previous_state)?,
            serde_json::to_string(&action.new_state)?,
            action.is_reversible,
            action.duration_secs,
            opt_db_time(&action.expires_at),
            action.decided_by,
            opt_db_time(&action.decided_at),
            action.decision_note,
            to_db_time(&action.created_at)
        ],
    )?;
    let id = conn.last_insert_rowid();
    read_action(conn, id)?.ok_or_else(|| DbError::not_found("moderator action", id))
}

/// Persists an approval decision. Reversal goes through `claim_reversal` only.
pub fn update_action(conn: &Connection, action: &ModeratorAction) -> DbResult<ModeratorAction> {
    let updated = conn.execute(
        "UPDATE moderator_actions
         SET status = ?1, previous_state = ?2, new_state = ?3, expires_at = ?4, decided_by = ?5,
             decided_at = ?6, decision_note = ?7, version = version + 1
         WHERE id = ?8 AND version = ?9",
        params![
            action.status,
            serde_json::to_string(&action.previous_state)?,
            serde_json::to_string(&action.new_state)?,
            opt_db_time(&action.expires_at),
            action.decided_by,
            opt_db_time(&action.decided_at),
            action.decision_note,
            action.id,
            action.version
        ],
    )?;
    if updated == 0 {
        return Err(DbError::stale("moderator action", action.id));
    }
    read_action(conn, action.id)?.ok_or_else(|| DbError::not_found("moderator action", action.id))
}

/// Flips `is_reversed` only if nobody has yet. Returns whether this call won.
pub fn claim_reversal(
    conn: &Connection,
    action_id: i64,
    reversed_by: i64,
    reversed_at: DateTime<Utc>,
    reason: &str,
) -> DbResult<bool> {
    let updated = conn.execute(
        "UPDATE moderator_actions
         SET is_reversed = 1, reversed_by = ?2, reversed_at = ?3, reversal_reason = ?4, version = version + 1
         WHERE id = ?1 AND is_reversed = 0 AND is_reversible = 1 AND status = ?5",
        params![action_id, reversed_by, to_db_time(&reversed_at), reason, ActionStatus::Applied],
    )?;
    Ok(updated == 1)
}

pub fn read_expired_unreversed(conn: &Connection, now: DateTime<Utc>, limit: u32) -> DbResult<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT id FROM moderator_actions
         WHERE status = ?1 AND is_reversed = 0 AND is_reversible = 1
           AND expires_at IS NOT NULL AND expires_at < ?2
         ORDER BY expires_at, id
         LIMIT ?3",
    )?;
    let ids = stmt
        .query_map(params![ActionStatus::Applied, to_db_time(&now), limit], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<i64>>>()?;
    Ok(ids)
}

impl ModeratorActionRepository for Connection {
    fn get_action(&self, action_id: i64) -> RepoResult<Option<ModeratorAction>> {
        Ok(read_action(self, action_id)?)
    }

    fn insert_action(&self, action: &ModeratorAction) -> RepoResult<ModeratorAction> {
        Ok(create_action(self, action)?)
    }

    fn save_action(&self, action: &ModeratorAction) -> RepoResult<ModeratorAction> {
        Ok(update_action(self, action)?)
    }

    fn claim_reversal(
        &self,
        action_id: i64,
        reversed_by: i64,
        reversed_at: DateTime<Utc>,
        reason: &str,
    ) -> RepoResult<bool> {
        Ok(claim_reversal(self, action_id, reversed_by, reversed_at, reason)?)
    }

    fn expired_unreversed(&self, now: DateTime<Utc>, limit: u32) -> RepoResult<Vec<i64>> {
        Ok(read_expired_unreversed(self, now, limit)?)
    }
}
