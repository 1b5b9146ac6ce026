use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{get_opt_time, get_time, opt_db_time, to_db_time, DbError, DbResult};
use crate::engine::repository::{RepoResult, ReportRepository};
use crate::models::report_models::{NewReport, Report, ReportStatus};
use crate::models::ContentRef;

const REPORT_COLUMNS: &str = "id, reporter_id, content_type, content_id, content_author_id, reason, details, \
     evidence, severity, status, assigned_to, escalated_to, escalation_reason, resolved_by, resolved_at, \
     action_taken, resolution_note, moderator_action_id, duplicate_of, created_at, updated_at, version";

fn map_report(row: &Row<'_>) -> rusqlite::Result<Report> {
    Ok(Report {
        id: row.get(0)?,
        reporter_id: row.get(1)?,
        content: ContentRef::new(row.get(2)?, row.get(3)?),
        content_author_id: row.get(4)?,
        reason: row.get(5)?,
        details: row.get(6)?,
        evidence: row.get(7)?,
        severity: row.get(8)?,
        status: row.get(9)?,
        assigned_to: row.get(10)?,
        escalated_to: row.get(11)?,
        escalation_reason: row.get(12)?,
        resolved_by: row.get(13)?,
        resolved_at: get_opt_time(row, 14)?,
        action_taken: row.get(15)?,
        resolution_note: row.get(16)?,
        moderator_action_id: row.get(17)?,
        duplicate_of: row.get(18)?,
        created_at: get_time(row, 19)?,
        updated_at: get_time(row, 20)?,
        version: row.get(21)?,
    })
}

pub fn read_report(conn: &Connection, report_id: i64) -> DbResult<Option<Report>> {
    let report = conn
        .query_row(&format!("SELECT {} FROM reports WHERE id = ?1", REPORT_COLUMNS), [report_id], map_report)
        .optional()?;
    Ok(report)
}

pub fn create_report(conn: &Connection, report: &NewReport) -> DbResult<Report> {
    let now = to_db_time(&report.created_at);
    conn.execute(
        "INSERT INTO reports (reporter_id, content_type, content_id, content_author_id, reason, details,
            evidence, severity, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
        params![
            report.reporter_id,
            report.content.content_type,
            report.content.content_id,
            report.content_author_id,
            report.reason,
            report.details,
            report.evidence,
            report.severity,
            ReportStatus::Pending,
            now
        ],
    )?;
    let id = conn.last_insert_rowid();
    read_report(conn, id)?.ok_or_else(|| DbError::not_found("report", id))
}

pub fn update_report(conn: &Connection, report: &Report) -> DbResult<Report> {
    let updated = conn.execute(
        "UPDATE reports
         SET status = ?1, assigned_to = ?2, escalated_to = ?3, escalation_reason = ?4, resolved_by = ?5,
             resolved_at = ?6, action_taken = ?7, resolution_note = ?8, moderator_action_id = ?9,
             duplicate_of = ?10, updated_at = ?11, version = version + 1
         WHERE id = ?12 AND version = ?13",
        params![
            report.status,
            report.assigned_to,
            report.escalated_to,
            report.escalation_reason,
            report.resolved_by,
            opt_db_time(&report.resolved_at),
            report.action_taken,
            report.resolution_note,
            report.moderator_action_id,
            report.duplicate_of,
            to_db_time(&report.updated_at),
            report.id,
            report.version
        ],
    )?;
    if updated == 0 {
        return Err(DbError::stale("report", report.id));
    }
    read_report(conn, report.id)?.ok_or_else(|| DbError::not_found("report", report.id))
}

pub fn read_open_report(conn: &Connection, reporter_id: i64, content: ContentRef) -> DbResult<Option<Report>> {
    let report = conn
        .query_row(
            &format!(
                "SELECT {} FROM reports
                 WHERE reporter_id = ?1 AND content_type = ?2 AND content_id = ?3 AND status IN (?4, ?5, ?6)
                 ORDER BY id LIMIT 1",
                REPORT_COLUMNS
            ),
            params![
                reporter_id,
                content.content_type,
                content.content_id,
                ReportStatus::OPEN[0],
                ReportStatus::OPEN[1],
                ReportStatus::OPEN[2]
            ],
            map_report,
        )
        .optional()?;
    Ok(report)
}

pub fn read_duplicates_of(conn: &Connection, report_id: i64) -> DbResult<Vec<Report>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM reports WHERE duplicate_of = ?1 ORDER BY id",
        REPORT_COLUMNS
    ))?;
    let reports = stmt.query_map([report_id], map_report)?.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(reports)
}

impl ReportRepository for Connection {
    fn get_report(&self, report_id: i64) -> RepoResult<Option<Report>> {
        Ok(read_report(self, report_id)?)
    }

    fn insert_report(&self, report: &NewReport) -> RepoResult<Report> {
        Ok(create_report(self, report)?)
    }

    fn save_report(&self, report: &Report) -> RepoResult<Report> {
        Ok(update_report(self, report)?)
    }

    fn find_open_report(&self, reporter_id: i64, content: ContentRef) -> RepoResult<Option<Report>> {
        Ok(read_open_report(self, reporter_id, content)?)
    }

    fn reports_duplicating(&self, report_id: i64) -> RepoResult<Vec<Report>> {
        Ok(read_duplicates_of(self, report_id)?)
    }
}
