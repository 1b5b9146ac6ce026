//! Moderator action log: privileged interventions with snapshots for reversal.

use chrono::Duration;
use serde_json::{json, Value};

use super::error::EngineError;
use super::events::EventKind;
use super::{validation, TxContext};
use crate::helper::sanitization_helpers::{clean_optional_text, strip_all_html};
use crate::models::content_models::{ContentItem, ValidationState};
use crate::models::moderation_models::{
    ActionOptions, ActionStatus, ActionTarget, ActionType, ModeratorAction,
};
use crate::models::{Severity, UserAccount};

pub const MIN_REASON_CHARS: usize = 5;
pub const MAX_REASON_CHARS: usize = 2000;

pub const EXPIRY_REASON: &str = "temporary action expired";

#[derive(Debug, Clone)]
pub struct ApplyRequest {
    pub action_type: ActionType,
    pub target: ActionTarget,
    pub reason: String,
    pub severity: Severity,
    pub options: ActionOptions,
}

/// Returns the stored form of a reason: trimmed plain text of 5 to 2000 characters.
pub fn validate_reason(reason: &str) -> Result<String, EngineError> {
    let cleaned = strip_all_html(reason.trim()).trim().to_string();
    let len = cleaned.chars().count();
    if !(MIN_REASON_CHARS..=MAX_REASON_CHARS).contains(&len) {
        return Err(EngineError::invalid_input(format!(
            "reason must be between {} and {} characters, got {}",
            MIN_REASON_CHARS, MAX_REASON_CHARS, len
        )));
    }
    Ok(cleaned)
}

fn user_snapshot(user: &UserAccount) -> Value {
    json!({ "is_active": user.is_active, "warning_count": user.warning_count })
}

fn content_snapshot(item: &ContentItem) -> Value {
    json!({ "validation_state": item.validation_state, "locked": item.locked })
}

fn snapshot_bool(snapshot: &Value, field: &str) -> Option<bool> {
    snapshot.get(field).and_then(Value::as_bool)
}

fn snapshot_i64(snapshot: &Value, field: &str) -> Option<i64> {
    snapshot.get(field).and_then(Value::as_i64)
}

fn snapshot_state(snapshot: &Value, field: &str) -> Option<ValidationState> {
    snapshot.get(field).and_then(Value::as_str).and_then(|s| s.parse().ok())
}

fn load_user(ctx: &TxContext<'_>, user_id: i64) -> Result<UserAccount, EngineError> {
    ctx.repos.get_user(user_id)?.ok_or_else(|| EngineError::not_found("user", user_id))
}

pub(crate) fn apply(ctx: &mut TxContext<'_>, request: ApplyRequest) -> Result<ModeratorAction, EngineError> {
    let ApplyRequest { action_type, target, reason, severity, options } = request;

    if action_type.target_type() != target.target_type() {
        return Err(EngineError::invalid_input(format!(
            "{} applies to a {} target, not a {}",
            action_type,
            action_type.target_type(),
            target.target_type()
        )));
    }
    let reason = validate_reason(&reason)?;

    let duration_secs = match action_type {
        ActionType::SuspendUser => Some(options.duration_secs.unwrap_or(ctx.policy.default_suspension_secs)),
        _ => options.duration_secs,
    };
    if matches!(duration_secs, Some(secs) if secs <= 0) {
        return Err(EngineError::invalid_input("duration must be positive"));
    }
    let is_reversible = options.is_reversible && action_type.can_be_reversed();
    if duration_secs.is_some() && !is_reversible {
        return Err(EngineError::invalid_input(format!("a temporary {} must be reversible", action_type)));
    }

    let target_user_id = match target {
        ActionTarget::User { user_id } => {
            let user = load_user(ctx, user_id)?;
            if user.id == ctx.actor.user_id {
                return Err(EngineError::forbidden("moderators may not act on their own account"));
            }
            if !ctx.actor.is_system() && user.role.rank() >= ctx.actor.role.rank() {
                return Err(EngineError::forbidden(format!(
                    "{} may not act on a {} account",
                    ctx.actor.role, user.role
                )));
            }
            Some(user.id)
        }
        ActionTarget::Content { content } => {
            let item = ctx
                .repos
                .get_content(content)?
                .ok_or_else(|| EngineError::not_found("content", content))?;
            Some(item.author_id)
        }
    };

    let mut action = ModeratorAction {
        id: 0,
        moderator_id: ctx.actor.user_id,
        action_type,
        target,
        target_user_id,
        reason,
        severity,
        status: ActionStatus::PendingApproval,
        previous_state: Value::Null,
        new_state: Value::Null,
        is_reversible,
        is_reversed: false,
        reversed_by: None,
        reversed_at: None,
        reversal_reason: None,
        duration_secs,
        expires_at: None,
        decided_by: None,
        decided_at: None,
        decision_note: None,
        created_at: ctx.now,
        version: 0,
    };

    if ctx.policy.needs_approval(action_type, &ctx.actor) {
        let saved = ctx.repos.insert_action(&action)?;
        log::info!("{} action {} by user {} awaits approval", action_type, saved.id, ctx.actor.user_id);
        ctx.emit(EventKind::ModeratorActionAwaitingApproval { action_id: saved.id, action_type });
        return Ok(saved);
    }

    execute(ctx, &mut action)?;
    let saved = ctx.repos.insert_action(&action)?;
    log_applied(ctx, &saved);
    Ok(saved)
}

fn log_applied(ctx: &mut TxContext<'_>, action: &ModeratorAction) {
    log::info!(
        "{} action {} applied to {:?} by user {}",
        action.action_type, action.id, action.target, ctx.actor.user_id
    );
    ctx.emit(EventKind::ModeratorActionApplied {
        action_id: action.id,
        action_type: action.action_type,
        target: action.target,
        target_user_id: action.target_user_id,
    });
}

/// Performs the effect and fills in both snapshots and the expiry.
fn execute(ctx: &mut TxContext<'_>, action: &mut ModeratorAction) -> Result<(), EngineError> {
    let (previous_state, new_state) = match action.target {
        ActionTarget::User { user_id } => {
            let mut user = load_user(ctx, user_id)?;
            let before = user_snapshot(&user);
            match action.action_type {
                ActionType::BanUser | ActionType::SuspendUser => {
                    if !user.is_active {
                        return Err(EngineError::invalid_transition("user", "inactive", "inactive"));
                    }
                    user.is_active = false;
                }
                ActionType::WarnUser => user.warning_count += 1,
                other => return Err(EngineError::invalid_input(format!("{} does not apply to users", other))),
            }
            let saved = ctx.repos.save_user(&user)?;
            (before, user_snapshot(&saved))
        }
        ActionTarget::Content { content } => {
            let mut item = ctx
                .repos
                .get_content(content)?
                .ok_or_else(|| EngineError::not_found("content", content))?;
            let before = content_snapshot(&item);
            let reason = action.reason.clone();
            let saved = match action.action_type {
                ActionType::LockContent | ActionType::UnlockContent => {
                    let lock = action.action_type == ActionType::LockContent;
                    if item.locked == lock {
                        let state = if lock { "locked" } else { "unlocked" };
                        return Err(EngineError::invalid_transition("content", state, state));
                    }
                    item.locked = lock;
                    item.updated_at = ctx.now;
                    ctx.repos.save_content(&item)?
                }
                ActionType::DeleteContent => {
                    validation::apply_transition(ctx, item, ValidationState::Archived, Some(&reason))?
                }
                ActionType::ApproveContent => {
                    validation::apply_transition(ctx, item, ValidationState::Validated, Some(&reason))?
                }
                other => return Err(EngineError::invalid_input(format!("{} does not apply to content", other))),
            };
            (before, content_snapshot(&saved))
        }
    };

    action.previous_state = previous_state;
    action.new_state = new_state;
    action.status = ActionStatus::Applied;
    action.expires_at = action.duration_secs.map(|secs| ctx.now + Duration::seconds(secs));
    Ok(())
}

fn load_action(ctx: &TxContext<'_>, action_id: i64) -> Result<ModeratorAction, EngineError> {
    ctx.repos
        .get_action(action_id)?
        .ok_or_else(|| EngineError::not_found("moderator action", action_id))
}

fn require_pending(action: &ModeratorAction, to: ActionStatus) -> Result<(), EngineError> {
    if action.status != ActionStatus::PendingApproval {
        return Err(EngineError::invalid_transition("moderator action", action.status, to));
    }
    Ok(())
}

pub(crate) fn approve(ctx: &mut TxContext<'_>, action_id: i64) -> Result<ModeratorAction, EngineError> {
    let mut action = load_action(ctx, action_id)?;
    require_pending(&action, ActionStatus::Applied)?;

    execute(ctx, &mut action)?;
    action.decided_by = Some(ctx.actor.user_id);
    action.decided_at = Some(ctx.now);
    let saved = ctx.repos.save_action(&action)?;
    log_applied(ctx, &saved);
    Ok(saved)
}

pub(crate) fn deny(
    ctx: &mut TxContext<'_>,
    action_id: i64,
    note: Option<&str>,
) -> Result<ModeratorAction, EngineError> {
    let mut action = load_action(ctx, action_id)?;
    require_pending(&action, ActionStatus::Denied)?;

    action.status = ActionStatus::Denied;
    action.decided_by = Some(ctx.actor.user_id);
    action.decided_at = Some(ctx.now);
    action.decision_note = clean_optional_text(note);
    let saved = ctx.repos.save_action(&action)?;

    log::info!("{} action {} denied by user {}", saved.action_type, saved.id, ctx.actor.user_id);
    ctx.emit(EventKind::ModeratorActionDenied { action_id: saved.id });
    Ok(saved)
}

/// Undoes an applied action. The `is_reversed` flag is claimed with a
/// conditional update so concurrent callers cannot both restore the target.
pub(crate) fn reverse(
    ctx: &mut TxContext<'_>,
    action_id: i64,
    reason: &str,
    automatic: bool,
) -> Result<ModeratorAction, EngineError> {
    let action = load_action(ctx, action_id)?;
    if action.status != ActionStatus::Applied {
        return Err(EngineError::invalid_transition("moderator action", action.status, "reversed"));
    }
    if !action.is_reversible {
        return Err(EngineError::NotReversible(action_id));
    }
    if action.is_reversed {
        return Err(EngineError::AlreadyReversed(action_id));
    }
    let reason = validate_reason(reason)?;

    if !ctx.repos.claim_reversal(action_id, ctx.actor.user_id, ctx.now, &reason)? {
        return Err(EngineError::AlreadyReversed(action_id));
    }
    restore(ctx, &action, &reason)?;

    let reversed = load_action(ctx, action_id)?;
    log::info!(
        "{} action {} reversed by user {}{}",
        reversed.action_type,
        reversed.id,
        ctx.actor.user_id,
        if automatic { " (expired)" } else { "" }
    );
    ctx.emit(EventKind::ActionReversed { action_id, action_type: reversed.action_type, automatic });
    Ok(reversed)
}

/// Puts back every snapshot field that still holds the action's new value.
/// Fields changed since by someone else are left as they are.
fn restore(ctx: &mut TxContext<'_>, action: &ModeratorAction, reason: &str) -> Result<(), EngineError> {
    let before = &action.previous_state;
    let after = &action.new_state;

    match action.target {
        ActionTarget::User { user_id } => {
            let mut user = load_user(ctx, user_id)?;
            let mut changed = false;

            if let (Some(prev), Some(next)) = (snapshot_bool(before, "is_active"), snapshot_bool(after, "is_active")) {
                if prev != next {
                    if user.is_active == next {
                        user.is_active = prev;
                        changed = true;
                    } else {
                        log::warn!("action {}: is_active of user {} changed since, left as is", action.id, user_id);
                    }
                }
            }
            if let (Some(prev), Some(next)) =
                (snapshot_i64(before, "warning_count"), snapshot_i64(after, "warning_count"))
            {
                if prev != next {
                    if user.warning_count == next {
                        user.warning_count = prev;
                        changed = true;
                    } else {
                        log::warn!("action {}: warning_count of user {} changed since, left as is", action.id, user_id);
                    }
                }
            }

            if changed {
                ctx.repos.save_user(&user)?;
            }
        }
        ActionTarget::Content { content } => {
            let mut item = ctx
                .repos
                .get_content(content)?
                .ok_or_else(|| EngineError::not_found("content", content))?;

            if let (Some(prev), Some(next)) = (snapshot_bool(before, "locked"), snapshot_bool(after, "locked")) {
                if prev != next {
                    if item.locked == next {
                        item.locked = prev;
                        item.updated_at = ctx.now;
                        item = ctx.repos.save_content(&item)?;
                    } else {
                        log::warn!("action {}: lock on {} changed since, left as is", action.id, content);
                    }
                }
            }
            if let (Some(prev), Some(next)) =
                (snapshot_state(before, "validation_state"), snapshot_state(after, "validation_state"))
            {
                if prev != next {
                    if item.validation_state == next {
                        validation::apply_transition(ctx, item, prev, Some(reason))?;
                    } else {
                        log::warn!("action {}: state of {} changed since, left as is", action.id, content);
                    }
                }
            }
        }
    }
    Ok(())
}

/// Sweep step for one expired action. `None` when another caller got there first.
pub(crate) fn revert_expired(
    ctx: &mut TxContext<'_>,
    action_id: i64,
) -> Result<Option<ModeratorAction>, EngineError> {
    match reverse(ctx, action_id, EXPIRY_REASON, true) {
        Ok(action) => Ok(Some(action)),
        Err(EngineError::AlreadyReversed(_)) => Ok(None),
        Err(e) => Err(e),
    }
}
