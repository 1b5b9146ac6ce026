use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{get_opt_time, get_time, opt_db_time, to_db_time, DbError, DbResult};
use crate::engine::repository::{ContributionRepository, RepoResult};
use crate::models::contribution_models::{
    ContributionEntry, ContributionStatus, ContributionType, LeaderboardEntry, LeaderboardWindow, NewContribution,
};
use crate::models::{ContentRef, ContentType};

const CONTRIBUTION_COLUMNS: &str = "id, user_id, contribution_type, content_type, content_id, base_points, \
     points_earned, quality_score, status, reviewer_id, reviewed_at, created_at, version";

// Open-ended leaderboard bounds; every stored timestamp sorts between them.
const EARLIEST: &str = "0000";
const LATEST: &str = "9999";

fn content_ref(content_type: Option<ContentType>, content_id: Option<i64>) -> Option<ContentRef> {
    match (content_type, content_id) {
        (Some(content_type), Some(content_id)) => Some(ContentRef::new(content_type, content_id)),
        _ => None,
    }
}

fn map_contribution(row: &Row<'_>) -> rusqlite::Result<ContributionEntry> {
    Ok(ContributionEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        contribution_type: row.get(2)?,
        content: content_ref(row.get(3)?, row.get(4)?),
        base_points: row.get(5)?,
        points_earned: row.get(6)?,
        quality_score: row.get(7)?,
        status: row.get(8)?,
        reviewer_id: row.get(9)?,
        reviewed_at: get_opt_time(row, 10)?,
        created_at: get_time(row, 11)?,
        version: row.get(12)?,
    })
}

pub fn read_contribution(conn: &Connection, entry_id: i64) -> DbResult<Option<ContributionEntry>> {
    let entry = conn
        .query_row(
            &format!("SELECT {} FROM contributions WHERE id = ?1", CONTRIBUTION_COLUMNS),
            [entry_id],
            map_contribution,
        )
        .optional()?;
    Ok(entry)
}

pub fn create_contribution(conn: &Connection, entry: &NewContribution) -> DbResult<ContributionEntry> {
    conn.execute(
        "INSERT INTO contributions (user_id, contribution_type, content_type, content_id, base_points,
            points_earned, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5, ?6, ?7)",
        params![
            entry.user_id,
            entry.contribution_type,
            entry.content.map(|c| c.content_type),
            entry.content.map(|c| c.content_id),
            entry.base_points,
            ContributionStatus::Pending,
            to_db_time(&entry.created_at)
        ],
    )?;
    let id = conn.last_insert_rowid();
    read_contribution(conn, id)?.ok_or_else(|| DbError::not_found("contribution", id))
}

pub fn update_contribution(conn: &Connection, entry: &ContributionEntry) -> DbResult<ContributionEntry> {
    let updated = conn.execute(
        "UPDATE contributions
         SET points_earned = ?1, quality_score = ?2, status = ?3, reviewer_id = ?4, reviewed_at = ?5,
             version = version + 1
         WHERE id = ?6 AND version = ?7",
        params![
            entry.points_earned,
            entry.quality_score,
            entry.status,
            entry.reviewer_id,
            opt_db_time(&entry.reviewed_at),
            entry.id,
            entry.version
        ],
    )?;
    if updated == 0 {
        return Err(DbError::stale("contribution", entry.id));
    }
    read_contribution(conn, entry.id)?.ok_or_else(|| DbError::not_found("contribution", entry.id))
}

pub fn read_creation_entry(
    conn: &Connection,
    content: ContentRef,
    author_id: i64,
) -> DbResult<Option<ContributionEntry>> {
    let entry = conn
        .query_row(
            &format!(
                "SELECT {} FROM contributions
                 WHERE content_type = ?1 AND content_id = ?2 AND user_id = ?3 AND contribution_type = ?4
                 ORDER BY id LIMIT 1",
                CONTRIBUTION_COLUMNS
            ),
            params![
                content.content_type,
                content.content_id,
                author_id,
                ContributionType::creation_for(content.content_type)
            ],
            map_contribution,
        )
        .optional()?;
    Ok(entry)
}

/// Approved points per user, reviewed within `[from, to)`.
pub fn read_leaderboard(conn: &Connection, window: LeaderboardWindow, limit: u32) -> DbResult<Vec<LeaderboardEntry>> {
    let from = window.from.map(|t| to_db_time(&t)).unwrap_or_else(|| EARLIEST.to_string());
    let to = window.to.map(|t| to_db_time(&t)).unwrap_or_else(|| LATEST.to_string());
    let mut stmt = conn.prepare(
        "SELECT user_id, SUM(points_earned) AS total, COUNT(*) FROM contributions
         WHERE status = ?1 AND reviewed_at >= ?2 AND reviewed_at < ?3
         GROUP BY user_id
         ORDER BY total DESC, user_id ASC
         LIMIT ?4",
    )?;
    let entries = stmt
        .query_map(params![ContributionStatus::Approved, from, to, limit], |row| {
            Ok(LeaderboardEntry { user_id: row.get(0)?, points: row.get(1)?, contributions: row.get(2)? })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(entries)
}

impl ContributionRepository for Connection {
    fn get_contribution(&self, entry_id: i64) -> RepoResult<Option<ContributionEntry>> {
        Ok(read_contribution(self, entry_id)?)
    }

    fn insert_contribution(&self, entry: &NewContribution) -> RepoResult<ContributionEntry> {
        Ok(create_contribution(self, entry)?)
    }

    fn save_contribution(&self, entry: &ContributionEntry) -> RepoResult<ContributionEntry> {
        Ok(update_contribution(self, entry)?)
    }

    fn find_creation_entry(&self, content: ContentRef, author_id: i64) -> RepoResult<Option<ContributionEntry>> {
        Ok(read_creation_entry(self, content, author_id)?)
    }

    fn leaderboard(&self, window: LeaderboardWindow, limit: u32) -> RepoResult<Vec<LeaderboardEntry>> {
        Ok(read_leaderboard(self, window, limit)?)
    }
}
