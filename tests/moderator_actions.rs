mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use common::{action, Harness};
use lexicon_backend::engine::policy::ModerationPolicy;
use lexicon_backend::engine::{EngineError, Intent, NoOp, SweepReport};
use lexicon_backend::models::content_models::ValidationState;
use lexicon_backend::models::moderation_models::{ActionOptions, ActionStatus, ActionTarget, ActionType};
use lexicon_backend::models::{ActorContext, Role, Severity, SYSTEM_ACTOR_ID};

fn act(action_type: ActionType, target: ActionTarget, options: ActionOptions) -> Intent {
    Intent::ApplyModeratorAction {
        action_type,
        target,
        reason: "violates community guidelines".into(),
        severity: Severity::High,
        options,
    }
}

fn reverse(action_id: i64) -> Intent {
    Intent::ReverseAction { action_id, reason: "appeal upheld".into() }
}

#[test]
fn moderator_ban_waits_for_admin_and_can_be_reversed() {
    let h = Harness::new();
    let admin = h.user("zola", Role::Admin);
    let moderator = h.user("kofi", Role::Moderator);
    let offender = h.user("spammer", Role::Contributor);
    let target = ActionTarget::User { user_id: offender.user_id };

    let pending = action(h.engine.handle(act(ActionType::BanUser, target, ActionOptions::default()), moderator).unwrap());
    assert_eq!(pending.status, ActionStatus::PendingApproval);
    assert!(h.engine.user(offender.user_id).unwrap().is_active);

    // Moderators cannot approve their own request.
    let err = h
        .engine
        .handle(Intent::ApproveModeratorAction { action_id: pending.id }, moderator)
        .unwrap_err();
    assert_matches!(err, EngineError::Forbidden(_));

    let applied = action(h.engine.handle(Intent::ApproveModeratorAction { action_id: pending.id }, admin).unwrap());
    assert_eq!(applied.status, ActionStatus::Applied);
    assert_eq!(applied.decided_by, Some(admin.user_id));
    assert_eq!(applied.previous_state["is_active"], true);
    assert_eq!(applied.new_state["is_active"], false);
    assert!(!h.engine.user(offender.user_id).unwrap().is_active);

    let reversed = action(h.engine.handle(reverse(applied.id), moderator).unwrap());
    assert!(reversed.is_reversed);
    assert_eq!(reversed.reversed_by, Some(moderator.user_id));
    assert_eq!(reversed.reversal_reason.as_deref(), Some("appeal upheld"));
    assert!(h.engine.user(offender.user_id).unwrap().is_active);

    let again = h.engine.handle(reverse(applied.id), admin).unwrap();
    assert_eq!(again.no_op, Some(NoOp::AlreadyReversed));
    assert!(again.events.is_empty());

    let names = h.event_names();
    assert_eq!(
        names.iter().filter(|n| n.starts_with("moderator_action") || **n == "action_reversed").count(),
        3
    );
}

#[test]
fn admins_apply_bans_directly() {
    let h = Harness::new();
    let admin = h.user("zola", Role::Admin);
    let offender = h.user("troll", Role::User);

    let applied = action(
        h.engine
            .handle(act(ActionType::BanUser, ActionTarget::User { user_id: offender.user_id }, ActionOptions::default()), admin)
            .unwrap(),
    );
    assert_eq!(applied.status, ActionStatus::Applied);
    assert!(!h.engine.user(offender.user_id).unwrap().is_active);

    // Banning an already inactive account is refused.
    let err = h
        .engine
        .handle(act(ActionType::SuspendUser, ActionTarget::User { user_id: offender.user_id }, ActionOptions::default()), admin)
        .unwrap_err();
    assert_matches!(err, EngineError::InvalidTransition { .. });
}

#[test]
fn denied_actions_never_take_effect() {
    let h = Harness::new();
    let admin = h.user("zola", Role::Admin);
    let moderator = h.user("kofi", Role::Moderator);
    let offender = h.user("spammer", Role::Contributor);

    let pending = action(
        h.engine
            .handle(act(ActionType::BanUser, ActionTarget::User { user_id: offender.user_id }, ActionOptions::default()), moderator)
            .unwrap(),
    );
    let denied = action(
        h.engine
            .handle(Intent::DenyModeratorAction { action_id: pending.id, note: Some("first offence".into()) }, admin)
            .unwrap(),
    );
    assert_eq!(denied.status, ActionStatus::Denied);
    assert_eq!(denied.decision_note.as_deref(), Some("first offence"));
    assert!(h.engine.user(offender.user_id).unwrap().is_active);

    let err = h
        .engine
        .handle(Intent::ApproveModeratorAction { action_id: pending.id }, admin)
        .unwrap_err();
    assert_matches!(err, EngineError::InvalidTransition { .. });
    let err = h.engine.handle(reverse(pending.id), admin).unwrap_err();
    assert_matches!(err, EngineError::InvalidTransition { .. });
}

#[test]
fn staff_cannot_act_on_peers_or_themselves() {
    let h = Harness::new();
    let moderator = h.user("kofi", Role::Moderator);
    let other_moderator = h.user("ayo", Role::Moderator);

    let err = h
        .engine
        .handle(act(ActionType::WarnUser, ActionTarget::User { user_id: other_moderator.user_id }, ActionOptions::default()), moderator)
        .unwrap_err();
    assert_matches!(err, EngineError::Forbidden(_));

    let err = h
        .engine
        .handle(act(ActionType::WarnUser, ActionTarget::User { user_id: moderator.user_id }, ActionOptions::default()), moderator)
        .unwrap_err();
    assert_matches!(err, EngineError::Forbidden(_));

    let expert = h.user("nia", Role::Expert);
    let err = h
        .engine
        .handle(act(ActionType::WarnUser, ActionTarget::User { user_id: moderator.user_id }, ActionOptions::default()), expert)
        .unwrap_err();
    assert_matches!(err, EngineError::Forbidden(_));
}

#[test]
fn the_reserved_actor_id_grants_no_system_privileges() {
    let h = Harness::new();
    let admin = h.user("zola", Role::Admin);
    let impostor = ActorContext::new(SYSTEM_ACTOR_ID, Role::Moderator);

    let err = h
        .engine
        .handle(act(ActionType::WarnUser, ActionTarget::User { user_id: admin.user_id }, ActionOptions::default()), impostor)
        .unwrap_err();
    assert_matches!(err, EngineError::Forbidden(_));
    assert_eq!(h.engine.user(admin.user_id).unwrap().warning_count, 0);
}

#[test]
fn invalid_requests_are_rejected_before_any_effect() {
    let h = Harness::new();
    let moderator = h.user("kofi", Role::Moderator);
    let offender = h.user("spammer", Role::Contributor);
    let user_target = ActionTarget::User { user_id: offender.user_id };

    let short_reason = Intent::ApplyModeratorAction {
        action_type: ActionType::WarnUser,
        target: user_target,
        reason: " <b>no</b> ".into(),
        severity: Severity::Low,
        options: ActionOptions::default(),
    };
    assert_matches!(h.engine.handle(short_reason, moderator).unwrap_err(), EngineError::InvalidInput(_));

    let item = h.submit_word(offender, "spam");
    let mismatched = act(ActionType::WarnUser, ActionTarget::Content { content: item.content_ref() }, ActionOptions::default());
    assert_matches!(h.engine.handle(mismatched, moderator).unwrap_err(), EngineError::InvalidInput(_));

    let permanent_but_temporary = act(
        ActionType::SuspendUser,
        user_target,
        ActionOptions { is_reversible: false, duration_secs: Some(3600) },
    );
    assert_matches!(h.engine.handle(permanent_but_temporary, moderator).unwrap_err(), EngineError::InvalidInput(_));

    let user = h.engine.user(offender.user_id).unwrap();
    assert!(user.is_active);
    assert_eq!(user.warning_count, 0);
}

#[test]
fn apply_then_reverse_restores_the_target() {
    let h = Harness::new();
    let author = h.user("amara", Role::Contributor);
    let moderator = h.user("kofi", Role::Moderator);
    let item = h.submit_word(author, "mzungu");
    let item = h.move_to(moderator, &item, ValidationState::Validated);
    let target = ActionTarget::Content { content: item.content_ref() };

    let locked = action(h.engine.handle(act(ActionType::LockContent, target, ActionOptions::default()), moderator).unwrap());
    assert_eq!(locked.target_user_id, Some(author.user_id));
    assert!(h.engine.content(item.content_ref()).unwrap().locked);
    h.engine.handle(reverse(locked.id), moderator).unwrap();
    assert!(!h.engine.content(item.content_ref()).unwrap().locked);

    let deleted = action(h.engine.handle(act(ActionType::DeleteContent, target, ActionOptions::default()), moderator).unwrap());
    assert_eq!(h.engine.content(item.content_ref()).unwrap().validation_state, ValidationState::Archived);
    h.engine.handle(reverse(deleted.id), moderator).unwrap();
    let restored = h.engine.content(item.content_ref()).unwrap();
    assert_eq!(restored.validation_state, ValidationState::Validated);

    let history = h.engine.validation_history(item.content_ref()).unwrap();
    let tail: Vec<_> = history.iter().rev().take(2).map(|r| r.to_state).collect();
    assert_eq!(tail, vec![ValidationState::Validated, ValidationState::Archived]);

    let warned = action(
        h.engine
            .handle(act(ActionType::WarnUser, ActionTarget::User { user_id: author.user_id }, ActionOptions::default()), moderator)
            .unwrap(),
    );
    assert_eq!(h.engine.user(author.user_id).unwrap().warning_count, 1);
    h.engine.handle(reverse(warned.id), moderator).unwrap();
    assert_eq!(h.engine.user(author.user_id).unwrap().warning_count, 0);
}

#[test]
fn irreversible_actions_refuse_reversal() {
    let h = Harness::new();
    let moderator = h.user("kofi", Role::Moderator);
    let author = h.user("amara", Role::Contributor);
    let item = h.submit_word(author, "jambo");

    let approved = action(
        h.engine
            .handle(act(ActionType::ApproveContent, ActionTarget::Content { content: item.content_ref() }, ActionOptions::default()), moderator)
            .unwrap(),
    );
    assert!(!approved.is_reversible);
    assert_eq!(h.engine.content(item.content_ref()).unwrap().validation_state, ValidationState::Validated);
    assert_matches!(h.engine.handle(reverse(approved.id), moderator).unwrap_err(), EngineError::NotReversible(_));

    let warned = action(
        h.engine
            .handle(
                act(
                    ActionType::WarnUser,
                    ActionTarget::User { user_id: author.user_id },
                    ActionOptions { is_reversible: false, duration_secs: None },
                ),
                moderator,
            )
            .unwrap(),
    );
    assert_matches!(h.engine.handle(reverse(warned.id), moderator).unwrap_err(), EngineError::NotReversible(_));
}

#[test]
fn reversal_leaves_later_changes_alone() {
    let h = Harness::new();
    let admin = h.user("zola", Role::Admin);
    let moderator = h.user("kofi", Role::Moderator);
    let offender = h.user("spammer", Role::Contributor);
    let target = ActionTarget::User { user_id: offender.user_id };

    let suspended = action(h.engine.handle(act(ActionType::SuspendUser, target, ActionOptions::default()), moderator).unwrap());
    let warned = action(h.engine.handle(act(ActionType::WarnUser, target, ActionOptions::default()), admin).unwrap());
    assert_eq!(warned.previous_state["is_active"], false);

    // The suspension never touched the warning count, so undoing it keeps the warning.
    h.engine.handle(reverse(suspended.id), moderator).unwrap();
    let user = h.engine.user(offender.user_id).unwrap();
    assert!(user.is_active);
    assert_eq!(user.warning_count, 1);
}

fn suspend_for(h: &Harness, moderator: ActorContext, user_id: i64, secs: i64) -> i64 {
    action(
        h.engine
            .handle(
                act(ActionType::SuspendUser, ActionTarget::User { user_id }, ActionOptions { is_reversible: true, duration_secs: Some(secs) }),
                moderator,
            )
            .unwrap(),
    )
    .id
}

#[test]
fn sweep_reverts_expired_suspensions_once() {
    let h = Harness::new();
    let moderator = h.user("kofi", Role::Moderator);
    let short = h.user("short", Role::Contributor);
    let long = h.user("long", Role::Contributor);

    let short_id = suspend_for(&h, moderator, short.user_id, 60);
    let long_id = suspend_for(&h, moderator, long.user_id, 30 * 24 * 3600);

    assert_eq!(h.engine.sweep_expired().unwrap(), SweepReport::default());

    let later = Utc::now() + Duration::hours(1);
    let report = h.engine.sweep_expired_at(later).unwrap();
    assert_eq!(report, SweepReport { expired: 1, reverted: 1, skipped: 0, failed: 0 });

    let reverted = h.engine.moderator_action(short_id).unwrap();
    assert!(reverted.is_reversed);
    assert_eq!(reverted.reversed_by, Some(0));
    assert!(h.engine.user(short.user_id).unwrap().is_active);
    assert!(!h.engine.moderator_action(long_id).unwrap().is_reversed);
    assert!(!h.engine.user(long.user_id).unwrap().is_active);

    assert_eq!(h.engine.sweep_expired_at(later).unwrap().expired, 0);
}

#[test]
fn concurrent_sweeps_revert_each_action_once() {
    let h = Harness::new();
    let moderator = h.user("kofi", Role::Moderator);
    let mut suspended = Vec::new();
    for i in 0..4 {
        let user = h.user(&format!("member{}", i), Role::Contributor);
        suspend_for(&h, moderator, user.user_id, 60);
        suspended.push(user.user_id);
    }

    let later = Utc::now() + Duration::hours(1);
    let barrier = Arc::new(Barrier::new(2));
    let sweeps: Vec<_> = (0..2)
        .map(|_| {
            let engine = h.engine.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                engine.sweep_expired_at(later)
            })
        })
        .collect();
    let reports: Vec<SweepReport> = sweeps.into_iter().map(|t| t.join().unwrap().unwrap()).collect();

    assert_eq!(reports.iter().map(|r| r.reverted).sum::<usize>(), 4);
    assert_eq!(reports.iter().map(|r| r.failed).sum::<usize>(), 0);
    for user_id in suspended {
        assert!(h.engine.user(user_id).unwrap().is_active);
    }
    assert_eq!(h.event_names().iter().filter(|n| **n == "action_reversed").count(), 4);
}

#[test]
fn suspensions_use_the_configured_default_duration() {
    let policy = ModerationPolicy { default_suspension_secs: 120, ..ModerationPolicy::default() };
    let h = Harness::with_policy(policy);
    let moderator = h.user("kofi", Role::Moderator);
    let offender = h.user("spammer", Role::Contributor);

    let applied = action(
        h.engine
            .handle(act(ActionType::SuspendUser, ActionTarget::User { user_id: offender.user_id }, ActionOptions::default()), moderator)
            .unwrap(),
    );
    assert_eq!(applied.duration_secs, Some(120));
    let expires_at = applied.expires_at.unwrap();
    assert_eq!((expires_at - applied.created_at).num_seconds(), 120);
}
