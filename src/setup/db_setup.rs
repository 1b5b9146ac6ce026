use rusqlite::Connection;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
}

const TABLES: &[(&str, &str)] = &[
    (
        "users",
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            role TEXT NOT NULL CHECK(role IN ('admin', 'moderator', 'expert', 'contributor', 'user')),
            is_active INTEGER NOT NULL DEFAULT 1,
            warning_count INTEGER NOT NULL DEFAULT 0,
            points INTEGER NOT NULL DEFAULT 0,
            contribution_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1
        )",
    ),
    (
        "content_items",
        "CREATE TABLE IF NOT EXISTS content_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            content_type TEXT NOT NULL CHECK(content_type IN ('word', 'phrase', 'proverb', 'comment', 'forum_post')),
            author_id INTEGER NOT NULL,
            validation_state TEXT NOT NULL CHECK(validation_state IN ('pending', 'validated', 'rejected', 'archived')),
            locked INTEGER NOT NULL DEFAULT 0,
            payload TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1
        )",
    ),
    (
        "validation_records",
        "CREATE TABLE IF NOT EXISTS validation_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            content_type TEXT NOT NULL,
            content_id INTEGER NOT NULL,
            from_state TEXT,
            to_state TEXT NOT NULL,
            actor_id INTEGER NOT NULL,
            comment TEXT,
            occurred_at TEXT NOT NULL
        )",
    ),
    (
        "contributions",
        "CREATE TABLE IF NOT EXISTS contributions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            contribution_type TEXT NOT NULL,
            content_type TEXT,
            content_id INTEGER,
            base_points INTEGER NOT NULL,
            points_earned INTEGER NOT NULL,
            quality_score REAL,
            status TEXT NOT NULL CHECK(status IN ('pending', 'approved', 'rejected', 'needs_review')),
            reviewer_id INTEGER,
            reviewed_at TEXT,
            created_at TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1
        )",
    ),
    (
        "moderator_actions",
        "CREATE TABLE IF NOT EXISTS moderator_actions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            moderator_id INTEGER NOT NULL,
            action_type TEXT NOT NULL,
            target_type TEXT NOT NULL CHECK(target_type IN ('user', 'content')),
            target_id INTEGER NOT NULL,
            content_type TEXT,
            target_user_id INTEGER,
            reason TEXT NOT NULL,
            severity TEXT NOT NULL CHECK(severity IN ('low', 'medium', 'high', 'critical')),
            status TEXT NOT NULL CHECK(status IN ('pending_approval', 'applied', 'denied')),
            previous_state TEXT NOT NULL,
            new_state TEXT NOT NULL,
            is_reversible INTEGER NOT NULL,
            is_reversed INTEGER NOT NULL DEFAULT 0 CHECK(is_reversed = 0 OR is_reversible = 1),
            reversed_by INTEGER,
            reversed_at TEXT,
            reversal_reason TEXT,
            duration_secs INTEGER,
            expires_at TEXT,
            decided_by INTEGER,
            decided_at TEXT,
            decision_note TEXT,
            created_at TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1
        )",
    ),
    (
        "reports",
        "CREATE TABLE IF NOT EXISTS reports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            reporter_id INTEGER NOT NULL,
            content_type TEXT NOT NULL,
            content_id INTEGER NOT NULL,
            content_author_id INTEGER,
            reason TEXT NOT NULL,
            details TEXT,
            evidence TEXT,
            severity TEXT NOT NULL,
            status TEXT NOT NULL CHECK(status IN ('pending', 'under_review', 'investigating', 'resolved', 'dismissed', 'escalated', 'duplicate')),
            assigned_to INTEGER,
            escalated_to INTEGER,
            escalation_reason TEXT,
            resolved_by INTEGER,
            resolved_at TEXT,
            action_taken TEXT,
            resolution_note TEXT,
            moderator_action_id INTEGER REFERENCES moderator_actions(id),
            duplicate_of INTEGER REFERENCES reports(id),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 1,
            CHECK(duplicate_of IS NULL OR status = 'duplicate'),
            CHECK(resolved_at IS NULL OR status IN ('resolved', 'dismissed'))
        )",
    ),
    (
        "event_outbox",
        "CREATE TABLE IF NOT EXISTS event_outbox (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT NOT NULL UNIQUE,
            event_name TEXT NOT NULL,
            payload TEXT NOT NULL,
            created_at TEXT NOT NULL,
            delivered_at TEXT
        )",
    ),
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_validation_records_content
        ON validation_records (content_type, content_id, id)",
    "CREATE INDEX IF NOT EXISTS idx_contributions_content
        ON contributions (content_type, content_id, user_id)",
    "CREATE INDEX IF NOT EXISTS idx_contributions_leaderboard
        ON contributions (status, reviewed_at)",
    "CREATE INDEX IF NOT EXISTS idx_moderator_actions_expiry
        ON moderator_actions (expires_at) WHERE is_reversed = 0 AND expires_at IS NOT NULL",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_reports_one_open_per_reporter
        ON reports (reporter_id, content_type, content_id)
        WHERE status IN ('pending', 'under_review', 'investigating')",
    "CREATE INDEX IF NOT EXISTS idx_reports_duplicate_of ON reports (duplicate_of)",
    "CREATE INDEX IF NOT EXISTS idx_event_outbox_pending ON event_outbox (id) WHERE delivered_at IS NULL",
];

/// Creates every moderation table and index. Safe to run on an existing database.
pub fn setup_moderation_db(conn: &mut Connection) -> Result<(), SetupError> {
    let tx = conn.transaction()?;
    for (name, ddl) in TABLES {
        log::debug!("- Creating '{}' table...", name);
        tx.execute(ddl, [])?;
    }
    for ddl in INDEXES {
        tx.execute(ddl, [])?;
    }
    tx.commit()?;
    Ok(())
}

pub fn table_names() -> impl Iterator<Item = &'static str> {
    TABLES.iter().map(|(name, _)| *name)
}
