//! Report triage: intake, assignment, escalation and resolution of user reports.

use super::action_log::{self, ApplyRequest};
use super::error::EngineError;
use super::events::EventKind;
use super::{ledger, TxContext};
use crate::helper::sanitization_helpers::clean_optional_text;
use crate::models::contribution_models::ContributionType;
use crate::models::moderation_models::{ActionOptions, ActionTarget, TargetType};
use crate::models::report_models::{ActionTaken, NewReport, Report, ReportReason, ReportStatus};
use crate::models::{ContentRef, Role, Severity};

use ReportStatus::*;

#[derive(Debug, Clone)]
pub struct ReportSubmission {
    pub content: ContentRef,
    pub reason: ReportReason,
    pub severity: Severity,
    pub details: Option<String>,
    pub evidence: Option<String>,
}

/// Result of `submit`: either a new report or the reporter's open one.
#[derive(Debug, Clone, PartialEq)]
pub enum Submitted {
    Created(Report),
    Existing(Report),
}

fn load(ctx: &TxContext<'_>, report_id: i64) -> Result<Report, EngineError> {
    ctx.repos
        .get_report(report_id)?
        .ok_or_else(|| EngineError::not_found("report", report_id))
}

fn require_status(report: &Report, allowed: &[ReportStatus], to: ReportStatus) -> Result<(), EngineError> {
    if allowed.contains(&report.status) {
        Ok(())
    } else {
        Err(EngineError::invalid_transition("report", report.status, to))
    }
}

/// Assignees and escalation targets must be moderators or admins.
fn load_staff(ctx: &TxContext<'_>, user_id: i64) -> Result<Role, EngineError> {
    let user = ctx
        .repos
        .get_user(user_id)?
        .ok_or_else(|| EngineError::not_found("user", user_id))?;
    if !matches!(user.role, Role::Admin | Role::Moderator) || !user.is_active {
        return Err(EngineError::invalid_input(format!("user {} cannot handle reports", user_id)));
    }
    Ok(user.role)
}

fn save(ctx: &mut TxContext<'_>, mut report: Report) -> Result<Report, EngineError> {
    report.updated_at = ctx.now;
    ctx.repos.save_report(&report)
}

pub(crate) fn submit(ctx: &mut TxContext<'_>, submission: ReportSubmission) -> Result<Submitted, EngineError> {
    ctx.require_active_actor()?;
    let reporter_id = ctx.actor.user_id;

    if let Some(existing) = ctx.repos.find_open_report(reporter_id, submission.content)? {
        log::debug!("user {} already has open report {} on {}", reporter_id, existing.id, submission.content);
        return Ok(Submitted::Existing(existing));
    }

    let item = ctx
        .repos
        .get_content(submission.content)?
        .ok_or_else(|| EngineError::not_found("content", submission.content))?;

    let report = ctx.repos.insert_report(&NewReport {
        reporter_id,
        content: submission.content,
        content_author_id: Some(item.author_id),
        reason: submission.reason,
        details: clean_optional_text(submission.details.as_deref()),
        evidence: clean_optional_text(submission.evidence.as_deref()),
        severity: submission.severity,
        created_at: ctx.now,
    })?;

    log::info!("report {} filed by user {} against {}", report.id, reporter_id, report.content);
    ctx.emit(EventKind::ReportSubmitted { report_id: report.id, content: report.content });
    Ok(Submitted::Created(report))
}

pub(crate) fn assign(ctx: &mut TxContext<'_>, report_id: i64, moderator_id: i64) -> Result<Report, EngineError> {
    let mut report = load(ctx, report_id)?;
    require_status(&report, &[Pending, UnderReview, Escalated], UnderReview)?;
    load_staff(ctx, moderator_id)?;

    report.status = UnderReview;
    report.assigned_to = Some(moderator_id);
    let saved = save(ctx, report)?;

    log::info!("report {} assigned to user {}", saved.id, moderator_id);
    ctx.emit(EventKind::ReportAssigned { report_id: saved.id, assigned_to: moderator_id });
    Ok(saved)
}

pub(crate) fn investigate(ctx: &mut TxContext<'_>, report_id: i64) -> Result<Report, EngineError> {
    let mut report = load(ctx, report_id)?;
    require_status(&report, &[UnderReview], Investigating)?;

    report.status = Investigating;
    let saved = save(ctx, report)?;
    ctx.emit(EventKind::ReportInvestigating { report_id: saved.id });
    Ok(saved)
}

/// Hands the report to someone of higher standing than the escalating actor.
pub(crate) fn escalate(
    ctx: &mut TxContext<'_>,
    report_id: i64,
    escalated_to: i64,
    reason: &str,
) -> Result<Report, EngineError> {
    let mut report = load(ctx, report_id)?;
    require_status(&report, &[UnderReview, Investigating], Escalated)?;
    let reason = action_log::validate_reason(reason)?;

    let role = load_staff(ctx, escalated_to)?;
    if escalated_to == ctx.actor.user_id || (role != Role::Admin && role.rank() <= ctx.actor.role.rank()) {
        return Err(EngineError::invalid_input(format!(
            "user {} is not a higher authority than user {}",
            escalated_to, ctx.actor.user_id
        )));
    }

    report.status = Escalated;
    report.escalated_to = Some(escalated_to);
    report.assigned_to = Some(escalated_to);
    report.escalation_reason = Some(reason);
    let saved = save(ctx, report)?;

    log::info!("report {} escalated to user {} by user {}", saved.id, escalated_to, ctx.actor.user_id);
    ctx.emit(EventKind::ReportEscalated { report_id: saved.id, escalated_to });
    Ok(saved)
}

/// Closes the report. Any action it implies is applied in the same
/// transaction, so a failed action leaves the report untouched. Actions the
/// resolver could only queue for approval are refused.
pub(crate) fn resolve(
    ctx: &mut TxContext<'_>,
    report_id: i64,
    action_taken: ActionTaken,
    note: Option<&str>,
) -> Result<Report, EngineError> {
    let mut report = load(ctx, report_id)?;
    require_status(&report, &[UnderReview, Investigating, Escalated], Resolved)?;
    let note = clean_optional_text(note);

    if let Some(action_type) = action_taken.moderator_action() {
        // A report only closes on an action that takes effect now.
        if ctx.policy.needs_approval(action_type, &ctx.actor) {
            return Err(EngineError::forbidden(format!(
                "{} needs approval; escalate report {} to an admin to resolve it",
                action_type, report.id
            )));
        }
        let target = match action_type.target_type() {
            TargetType::Content => ActionTarget::Content { content: report.content },
            TargetType::User => match report.content_author_id {
                Some(user_id) => ActionTarget::User { user_id },
                None => {
                    return Err(EngineError::invalid_input(format!(
                        "report {} has no known author to act on",
                        report.id
                    )))
                }
            },
        };
        let reason = note
            .clone()
            .unwrap_or_else(|| format!("report #{} upheld: {}", report.id, report.reason));
        let action = action_log::apply(
            ctx,
            ApplyRequest {
                action_type,
                target,
                reason,
                severity: report.severity,
                options: ActionOptions::default(),
            },
        )?;
        report.moderator_action_id = Some(action.id);

        ledger::record(ctx, report.reporter_id, ContributionType::ReportConfirmed, Some(report.content), None)?;
    }

    report.status = Resolved;
    report.resolved_by = Some(ctx.actor.user_id);
    report.resolved_at = Some(ctx.now);
    report.action_taken = Some(action_taken);
    report.resolution_note = note;
    let saved = save(ctx, report)?;

    let notify_author = if action_taken == ActionTaken::NoAction {
        None
    } else {
        if saved.content_author_id.is_none() {
            log::debug!("report {}: no content author to notify", saved.id);
        }
        saved.content_author_id
    };

    log::info!("report {} resolved by user {} ({})", saved.id, ctx.actor.user_id, action_taken);
    ctx.emit(EventKind::ReportResolved { report_id: saved.id, action_taken, notify_author });
    Ok(saved)
}

pub(crate) fn dismiss(ctx: &mut TxContext<'_>, report_id: i64, note: Option<&str>) -> Result<Report, EngineError> {
    let mut report = load(ctx, report_id)?;
    require_status(&report, &[UnderReview, Investigating, Escalated], Dismissed)?;

    report.status = Dismissed;
    report.resolved_by = Some(ctx.actor.user_id);
    report.resolved_at = Some(ctx.now);
    report.resolution_note = clean_optional_text(note);
    let saved = save(ctx, report)?;

    log::info!("report {} dismissed by user {}", saved.id, ctx.actor.user_id);
    ctx.emit(EventKind::ReportDismissed { report_id: saved.id });
    Ok(saved)
}

/// Links `report_id` to `original_id`. Reports already pointing at
/// `report_id` are moved to `original_id` so no chain is ever two hops long.
pub(crate) fn mark_duplicate(
    ctx: &mut TxContext<'_>,
    report_id: i64,
    original_id: i64,
) -> Result<Report, EngineError> {
    if report_id == original_id {
        return Err(EngineError::invalid_input("a report cannot duplicate itself"));
    }
    let mut report = load(ctx, report_id)?;
    require_status(&report, &[Pending, UnderReview, Investigating, Escalated], Duplicate)?;

    let original = load(ctx, original_id)?;
    if original.status == Duplicate {
        return Err(EngineError::invalid_input(format!(
            "report {} is itself a duplicate of report {}",
            original_id,
            original.duplicate_of.unwrap_or_default()
        )));
    }
    if original.content != report.content {
        return Err(EngineError::invalid_input(format!(
            "report {} concerns {}, not {}",
            original_id, original.content, report.content
        )));
    }

    for mut child in ctx.repos.reports_duplicating(report_id)? {
        log::debug!("report {} re-pointed from {} to {}", child.id, report_id, original_id);
        child.duplicate_of = Some(original_id);
        save(ctx, child)?;
    }

    report.status = Duplicate;
    report.duplicate_of = Some(original_id);
    let saved = save(ctx, report)?;

    log::info!("report {} marked duplicate of {}", saved.id, original_id);
    ctx.emit(EventKind::ReportMarkedDuplicate { report_id: saved.id, duplicate_of: original_id });
    Ok(saved)
}
