use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{get_time, to_db_time, DbError, DbResult};
use crate::engine::repository::{RepoResult, UserRepository};
use crate::models::{Role, UserAccount};

const USER_COLUMNS: &str =
    "id, username, role, is_active, warning_count, points, contribution_count, created_at, version";

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserAccount> {
    Ok(UserAccount {
        id: row.get(0)?,
        username: row.get(1)?,
        role: row.get(2)?,
        is_active: row.get(3)?,
        warning_count: row.get(4)?,
        points: row.get(5)?,
        contribution_count: row.get(6)?,
        created_at: get_time(row, 7)?,
        version: row.get(8)?,
    })
}

pub fn create_user(conn: &Connection, username: &str, role: Role, now: DateTime<Utc>) -> DbResult<UserAccount> {
    conn.execute(
        "INSERT INTO users (username, role, created_at) VALUES (?1, ?2, ?3)",
        params![username, role, to_db_time(&now)],
    )?;
    let id = conn.last_insert_rowid();
    read_user(conn, id)?.ok_or_else(|| DbError::not_found("user", id))
}

pub fn read_user(conn: &Connection, user_id: i64) -> DbResult<Option<UserAccount>> {
    let user = conn
        .query_row(&format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS), [user_id], map_user)
        .optional()?;
    Ok(user)
}

pub fn read_user_by_username(conn: &Connection, username: &str) -> DbResult<Option<UserAccount>> {
    let user = conn
        .query_row(&format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS), [username], map_user)
        .optional()?;
    Ok(user)
}

pub fn read_all_users(conn: &Connection) -> DbResult<Vec<UserAccount>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS))?;
    let users = stmt.query_map([], map_user)?.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(users)
}

pub fn update_user(conn: &Connection, user: &UserAccount) -> DbResult<UserAccount> {
    let updated = conn.execute(
        "UPDATE users SET role = ?1, is_active = ?2, warning_count = ?3, version = version + 1
         WHERE id = ?4 AND version = ?5",
        params![user.role, user.is_active, user.warning_count, user.id, user.version],
    )?;
    if updated == 0 {
        return Err(DbError::stale("user", user.id));
    }
    read_user(conn, user.id)?.ok_or_else(|| DbError::not_found("user", user.id))
}

pub fn credit_user(conn: &Connection, user_id: i64, points: i64) -> DbResult<()> {
    let updated = conn.execute(
        "UPDATE users SET points = points + ?1, contribution_count = contribution_count + 1,
            version = version + 1
         WHERE id = ?2",
        params![points, user_id],
    )?;
    if updated == 0 {
        return Err(DbError::not_found("user", user_id));
    }
    Ok(())
}

impl UserRepository for Connection {
    fn get_user(&self, user_id: i64) -> RepoResult<Option<UserAccount>> {
        Ok(read_user(self, user_id)?)
    }

    fn save_user(&self, user: &UserAccount) -> RepoResult<UserAccount> {
        Ok(update_user(self, user)?)
    }

    fn credit_user(&self, user_id: i64, points: i64) -> RepoResult<()> {
        Ok(credit_user(self, user_id, points)?)
    }
}
