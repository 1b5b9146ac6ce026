//! Validation state machine shared by every content type.

use super::error::EngineError;
use super::events::EventKind;
use super::{ledger, policy, TxContext};
use crate::helper::sanitization_helpers::clean_optional_text;
use crate::models::content_models::{
    ContentItem, ContentPayload, Moderatable, NewValidationRecord, ValidationState,
};
use crate::models::contribution_models::ContributionType;
use crate::models::ContentRef;

use ValidationState::*;

pub const TRANSITIONS: &[(ValidationState, ValidationState)] = &[
    (Pending, Validated),
    (Pending, Rejected),
    (Validated, Archived),
    (Archived, Validated),
    (Rejected, Pending),
];

pub fn is_allowed(from: ValidationState, to: ValidationState) -> bool {
    TRANSITIONS.contains(&(from, to))
}

/// Creates a pending item with its creation record and the author's creation entry.
pub(crate) fn submit(ctx: &mut TxContext<'_>, payload: &ContentPayload) -> Result<ContentItem, EngineError> {
    ctx.require_active_actor()?;
    let item = ctx.repos.insert_content(ctx.actor.user_id, payload, ctx.now)?;
    let content = item.content_ref();

    ctx.repos.append_record(&NewValidationRecord {
        content,
        from_state: None,
        to_state: Pending,
        actor_id: ctx.actor.user_id,
        comment: None,
        occurred_at: ctx.now,
    })?;

    let contribution_type = ContributionType::creation_for(item.content_type);
    ledger::record(ctx, item.author_id, contribution_type, Some(content), None)?;

    log::info!("{} submitted by user {}", content, item.author_id);
    ctx.emit(EventKind::ContentSubmitted { content, author_id: item.author_id });
    Ok(item)
}

/// Moves `content` to `to`. Repeating the current state is reported as
/// `AlreadyInState` and writes nothing, provided the actor could have made the move.
pub(crate) fn transition(
    ctx: &mut TxContext<'_>,
    content: ContentRef,
    to: ValidationState,
    comment: Option<&str>,
    expected_version: Option<i64>,
) -> Result<ContentItem, EngineError> {
    let item = ctx
        .repos
        .get_content(content)?
        .ok_or_else(|| EngineError::not_found("content", content))?;

    if item.validation_state() == to {
        policy::may_enter(&ctx.actor, item.author_id, to)?;
        return Err(EngineError::AlreadyInState { content, state: to });
    }
    if let Some(expected) = expected_version {
        if expected != item.version {
            return Err(EngineError::version_conflict("content", content));
        }
    }

    apply_transition(ctx, item, to, comment)
}

/// The unconditional part of a transition, also used by moderator actions.
/// The record and the cached state are written in the caller's transaction.
pub(crate) fn apply_transition(
    ctx: &mut TxContext<'_>,
    mut item: ContentItem,
    to: ValidationState,
    comment: Option<&str>,
) -> Result<ContentItem, EngineError> {
    let from = item.validation_state();
    let content = Moderatable::content_ref(&item);

    if !is_allowed(from, to) {
        return Err(EngineError::invalid_transition("content", from, to));
    }
    policy::may_transition(&ctx.actor, Moderatable::author_id(&item), from, to)?;
    if item.locked && (from, to) == (Rejected, Pending) && !ctx.actor.role.is_privileged() {
        return Err(EngineError::forbidden(format!("{} is locked", content)));
    }

    let comment = clean_optional_text(comment);
    item.set_validation_state(to);
    item.updated_at = ctx.now;
    let saved = ctx.repos.save_content(&item)?;

    ctx.repos.append_record(&NewValidationRecord {
        content,
        from_state: Some(from),
        to_state: to,
        actor_id: ctx.actor.user_id,
        comment: comment.clone(),
        occurred_at: ctx.now,
    })?;

    log::info!("{} moved {} -> {} by user {}", content, from, to, ctx.actor.user_id);

    let author_id = saved.author_id;
    match (from, to) {
        (Pending, Validated) => {
            ledger::on_content_validated(ctx, &saved)?;
            ctx.emit(EventKind::ContentValidated { content, author_id });
        }
        (Pending, Rejected) => ctx.emit(EventKind::ContentRejected { content, author_id, comment }),
        (Rejected, Pending) => ctx.emit(EventKind::ContentResubmitted { content }),
        (Validated, Archived) => ctx.emit(EventKind::ContentArchived { content }),
        (Archived, Validated) => ctx.emit(EventKind::ContentRestored { content }),
        _ => {}
    }

    Ok(saved)
}
