//! Central capability table. Every intent is checked here before it reaches a
//! component; components only add entity-specific checks (own content, rank).

use serde::{Deserialize, Serialize};

use super::error::EngineError;
use super::validation::TRANSITIONS;
use crate::models::content_models::ValidationState;
use crate::models::moderation_models::ActionType;
use crate::models::{ActorContext, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntentKind {
    SubmitDictionaryContent,
    SubmitDiscussionContent,
    ValidateContent,
    RecordContribution,
    ReviewContribution,
    ApplyModeratorAction,
    ApproveModeratorAction,
    DenyModeratorAction,
    ReverseAction,
    SubmitReport,
    AssignReport,
    InvestigateReport,
    EscalateReport,
    ResolveReport,
    DismissReport,
    MarkDuplicateReport,
    RunMaintenance,
}

const ADMINS: &[Role] = &[Role::Admin];
const STAFF: &[Role] = &[Role::Admin, Role::Moderator];
const REVIEWERS: &[Role] = &[Role::Admin, Role::Moderator, Role::Expert];
const CONTRIBUTORS: &[Role] = &[Role::Admin, Role::Moderator, Role::Expert, Role::Contributor];
const EVERYONE: &[Role] = Role::ALL;

pub fn allowed_roles(kind: IntentKind) -> &'static [Role] {
    match kind {
        IntentKind::SubmitDictionaryContent => CONTRIBUTORS,
        IntentKind::SubmitDiscussionContent => EVERYONE,
        // Per-transition rules are enforced by `may_transition`.
        IntentKind::ValidateContent => EVERYONE,
        IntentKind::RecordContribution => EVERYONE,
        IntentKind::ReviewContribution => REVIEWERS,
        IntentKind::ApplyModeratorAction => STAFF,
        IntentKind::ApproveModeratorAction => ADMINS,
        IntentKind::DenyModeratorAction => ADMINS,
        IntentKind::ReverseAction => STAFF,
        IntentKind::SubmitReport => EVERYONE,
        IntentKind::AssignReport => STAFF,
        IntentKind::InvestigateReport => STAFF,
        IntentKind::EscalateReport => STAFF,
        IntentKind::ResolveReport => STAFF,
        IntentKind::DismissReport => STAFF,
        IntentKind::MarkDuplicateReport => STAFF,
        IntentKind::RunMaintenance => ADMINS,
    }
}

pub fn authorize(actor: &ActorContext, kind: IntentKind) -> Result<(), EngineError> {
    if allowed_roles(kind).contains(&actor.role) {
        Ok(())
    } else {
        Err(EngineError::forbidden(format!("role {} may not perform {:?}", actor.role, kind)))
    }
}

/// Whether `actor` may move an item written by `author_id` from `from` to `to`.
/// Only called for transitions the state machine allows.
pub fn may_transition(
    actor: &ActorContext,
    author_id: i64,
    from: ValidationState,
    to: ValidationState,
) -> Result<(), EngineError> {
    use ValidationState::*;

    let own = actor.user_id == author_id;
    let allowed = match (from, to) {
        (Pending, Validated) | (Pending, Rejected) => {
            actor.role.is_privileged() && (!own || actor.role == Role::Admin)
        }
        (Validated, Archived) => actor.role.is_privileged(),
        (Archived, Validated) => STAFF.contains(&actor.role),
        (Rejected, Pending) => own || actor.role.is_privileged(),
        _ => false,
    };

    if allowed {
        Ok(())
    } else if own && actor.role.is_privileged() {
        Err(EngineError::forbidden(format!("{} may not judge their own content", actor.role)))
    } else {
        Err(EngineError::forbidden(format!("role {} may not move content {} -> {}", actor.role, from, to)))
    }
}

/// Whether `actor` could have moved the item into `to` by any allowed edge.
/// Guards idempotent repeats, which never reach `may_transition`.
pub fn may_enter(actor: &ActorContext, author_id: i64, to: ValidationState) -> Result<(), EngineError> {
    let mut denied = None;
    for (from, _) in TRANSITIONS.iter().filter(|(_, target)| *target == to) {
        match may_transition(actor, author_id, *from, to) {
            Ok(()) => return Ok(()),
            Err(e) => denied = Some(e),
        }
    }
    Err(denied.unwrap_or_else(|| EngineError::forbidden(format!("no transition leads to {}", to))))
}

/// Tunable moderation rules, loaded from the `[moderation]` config table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModerationPolicy {
    /// Action types that wait for an admin before taking effect.
    pub requires_approval: Vec<ActionType>,
    /// Credit the creation entry as soon as the content is validated.
    pub auto_credit_on_validation: bool,
    pub default_suspension_secs: i64,
    pub storage_retry_attempts: u32,
    pub storage_retry_backoff_ms: u64,
    pub outbox_batch_size: u32,
    pub sweep_batch_size: u32,
}

impl Default for ModerationPolicy {
    fn default() -> Self {
        Self {
            requires_approval: vec![ActionType::BanUser],
            auto_credit_on_validation: true,
            default_suspension_secs: 7 * 24 * 60 * 60,
            storage_retry_attempts: 3,
            storage_retry_backoff_ms: 25,
            outbox_batch_size: 100,
            sweep_batch_size: 500,
        }
    }
}

impl ModerationPolicy {
    /// Admins bypass the approval queue.
    pub fn needs_approval(&self, action_type: ActionType, actor: &ActorContext) -> bool {
        actor.role != Role::Admin && self.requires_approval.contains(&action_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn only_admins_approve_pending_actions() {
        let moderator = ActorContext::new(2, Role::Moderator);
        let admin = ActorContext::new(1, Role::Admin);
        assert_matches!(authorize(&moderator, IntentKind::ApproveModeratorAction), Err(EngineError::Forbidden(_)));
        assert!(authorize(&admin, IntentKind::ApproveModeratorAction).is_ok());
    }

    #[test]
    fn plain_users_cannot_submit_dictionary_content() {
        let user = ActorContext::new(9, Role::User);
        assert!(authorize(&user, IntentKind::SubmitDictionaryContent).is_err());
        assert!(authorize(&user, IntentKind::SubmitDiscussionContent).is_ok());
        assert!(authorize(&user, IntentKind::SubmitReport).is_ok());
        assert!(authorize(&user, IntentKind::ReviewContribution).is_err());
    }

    #[test]
    fn experts_judge_content_but_not_their_own() {
        use ValidationState::*;
        let expert = ActorContext::new(5, Role::Expert);
        assert!(may_transition(&expert, 7, Pending, Validated).is_ok());
        assert!(may_transition(&expert, 5, Pending, Validated).is_err());
        let admin = ActorContext::new(1, Role::Admin);
        assert!(may_transition(&admin, 1, Pending, Rejected).is_ok());
    }

    #[test]
    fn resubmission_is_open_to_the_author() {
        use ValidationState::*;
        let author = ActorContext::new(7, Role::Contributor);
        assert!(may_transition(&author, 7, Rejected, Pending).is_ok());
        assert!(may_transition(&ActorContext::new(8, Role::Contributor), 7, Rejected, Pending).is_err());
    }

    #[test]
    fn repeats_need_the_same_capability_as_the_move() {
        use ValidationState::*;
        let user = ActorContext::new(9, Role::User);
        assert_matches!(may_enter(&user, 7, Validated), Err(EngineError::Forbidden(_)));
        assert_matches!(may_enter(&user, 7, Archived), Err(EngineError::Forbidden(_)));
        assert!(may_enter(&ActorContext::new(7, Role::Contributor), 7, Pending).is_ok());
        assert!(may_enter(&ActorContext::new(5, Role::Expert), 7, Validated).is_ok());
        assert!(may_enter(&ActorContext::new(5, Role::Expert), 5, Validated).is_err());
    }

    #[test]
    fn restore_requires_staff() {
        use ValidationState::*;
        assert!(may_transition(&ActorContext::new(5, Role::Expert), 7, Archived, Validated).is_err());
        assert!(may_transition(&ActorContext::new(2, Role::Moderator), 7, Archived, Validated).is_ok());
    }

    #[test]
    fn admins_bypass_approval() {
        let policy = ModerationPolicy::default();
        assert!(policy.needs_approval(ActionType::BanUser, &ActorContext::new(2, Role::Moderator)));
        assert!(!policy.needs_approval(ActionType::BanUser, &ActorContext::new(1, Role::Admin)));
        assert!(!policy.needs_approval(ActionType::WarnUser, &ActorContext::new(2, Role::Moderator)));
    }
}
