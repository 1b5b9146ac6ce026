//! Contribution ledger: records point-earning actions and credits them once approved.

use super::error::EngineError;
use super::events::EventKind;
use super::TxContext;
use crate::models::content_models::{ContentItem, ValidationState};
use crate::models::contribution_models::{
    ContributionEntry, ContributionStatus, ContributionType, NewContribution, ReviewDecision,
};
use crate::models::ContentRef;

pub const MAX_QUALITY_SCORE: f64 = 2.0;

/// Caller-supplied points are only a hint; the table bounds always win.
pub fn clamp_points(contribution_type: ContributionType, requested: Option<i64>) -> i64 {
    let range = contribution_type.point_range();
    requested.unwrap_or(range.default).clamp(range.min, range.max)
}

pub fn points_for(base_points: i64, quality_score: Option<f64>) -> i64 {
    match quality_score {
        Some(score) => (base_points as f64 * score).round() as i64,
        None => base_points,
    }
}

pub fn validate_quality(quality_score: Option<f64>) -> Result<(), EngineError> {
    match quality_score {
        Some(score) if !score.is_finite() || !(0.0..=MAX_QUALITY_SCORE).contains(&score) => Err(
            EngineError::invalid_input(format!("quality score must be between 0 and {}", MAX_QUALITY_SCORE)),
        ),
        _ => Ok(()),
    }
}

pub(crate) fn record(
    ctx: &mut TxContext<'_>,
    user_id: i64,
    contribution_type: ContributionType,
    content: Option<ContentRef>,
    base_points: Option<i64>,
) -> Result<ContributionEntry, EngineError> {
    if let Some(content) = content {
        if ctx.repos.get_content(content)?.is_none() {
            return Err(EngineError::not_found("content", content));
        }
    }

    let entry = ctx.repos.insert_contribution(&NewContribution {
        user_id,
        contribution_type,
        content,
        base_points: clamp_points(contribution_type, base_points),
        created_at: ctx.now,
    })?;

    log::debug!(
        "recorded {} contribution {} for user {} ({} points pending)",
        contribution_type, entry.id, user_id, entry.base_points
    );
    ctx.emit(EventKind::ContributionRecorded { entry_id: entry.id, user_id, contribution_type });
    Ok(entry)
}

/// Entry point for contributions reported by the actor themselves. Creation
/// and report entries are only written by the engine.
pub(crate) fn record_own(
    ctx: &mut TxContext<'_>,
    contribution_type: ContributionType,
    content: Option<ContentRef>,
    base_points: Option<i64>,
) -> Result<ContributionEntry, EngineError> {
    if contribution_type.is_creation() || contribution_type == ContributionType::ReportConfirmed {
        return Err(EngineError::invalid_input(format!(
            "{} contributions are recorded automatically",
            contribution_type
        )));
    }
    ctx.require_active_actor()?;
    let user_id = ctx.actor.user_id;
    record(ctx, user_id, contribution_type, content, base_points)
}

pub(crate) fn review(
    ctx: &mut TxContext<'_>,
    entry_id: i64,
    decision: ReviewDecision,
    quality_score: Option<f64>,
) -> Result<ContributionEntry, EngineError> {
    validate_quality(quality_score)?;
    let entry = ctx
        .repos
        .get_contribution(entry_id)?
        .ok_or_else(|| EngineError::not_found("contribution", entry_id))?;

    if !entry.status.is_reviewable()
        || (entry.status == ContributionStatus::NeedsReview && decision == ReviewDecision::NeedsReview)
    {
        return Err(EngineError::AlreadyReviewed(entry_id));
    }
    if entry.user_id == ctx.actor.user_id && !ctx.actor.is_system() {
        return Err(EngineError::forbidden("reviewers may not review their own contributions"));
    }

    if decision == ReviewDecision::Approve && entry.contribution_type.is_creation() {
        if let Some(content) = entry.content {
            let state = ctx
                .repos
                .get_content(content)?
                .map(|item| item.validation_state)
                .ok_or_else(|| EngineError::not_found("content", content))?;
            if state != ValidationState::Validated {
                return Err(EngineError::invalid_transition(
                    "contribution",
                    format!("{} (content {})", entry.status, state),
                    ContributionStatus::Approved,
                ));
            }
        }
    }

    finalize(ctx, entry, decision, quality_score)
}

/// Applies a decision. Approval credits the user in the same transaction
/// as the status change.
fn finalize(
    ctx: &mut TxContext<'_>,
    mut entry: ContributionEntry,
    decision: ReviewDecision,
    quality_score: Option<f64>,
) -> Result<ContributionEntry, EngineError> {
    entry.status = match decision {
        ReviewDecision::Approve => ContributionStatus::Approved,
        ReviewDecision::Reject => ContributionStatus::Rejected,
        ReviewDecision::NeedsReview => ContributionStatus::NeedsReview,
    };
    entry.reviewer_id = Some(ctx.actor.user_id);
    entry.reviewed_at = Some(ctx.now);
    if quality_score.is_some() {
        entry.quality_score = quality_score;
    }
    entry.points_earned = match entry.status {
        ContributionStatus::Approved => points_for(entry.base_points, entry.quality_score),
        ContributionStatus::Rejected => 0,
        _ => entry.points_earned,
    };

    let saved = ctx.repos.save_contribution(&entry)?;

    let points_credited = if saved.status == ContributionStatus::Approved {
        ctx.repos.credit_user(saved.user_id, saved.points_earned)?;
        saved.points_earned
    } else {
        0
    };

    log::info!(
        "contribution {} {} by user {} ({} points credited)",
        saved.id, saved.status, ctx.actor.user_id, points_credited
    );
    ctx.emit(EventKind::ContributionReviewed {
        entry_id: saved.id,
        user_id: saved.user_id,
        status: saved.status,
        points_credited,
    });
    Ok(saved)
}

/// Called when content first becomes validated. The creation entry becomes
/// reviewable, and is approved right away when the policy auto-credits.
pub(crate) fn on_content_validated(ctx: &mut TxContext<'_>, item: &ContentItem) -> Result<(), EngineError> {
    let entry = match ctx.repos.find_creation_entry(item.content_ref(), item.author_id)? {
        Some(entry) => entry,
        None => {
            log::debug!("{} has no creation entry to credit", item.content_ref());
            return Ok(());
        }
    };

    if ctx.policy.auto_credit_on_validation && entry.status.is_reviewable() {
        finalize(ctx, entry, ReviewDecision::Approve, None)?;
    }
    Ok(())
}
