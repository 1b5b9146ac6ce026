mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use assert_matches::assert_matches;
use common::{content, contribution, Harness};
use lexicon_backend::engine::{EngineError, Intent, NoOp};
use lexicon_backend::models::content_models::ValidationState;
use lexicon_backend::models::contribution_models::{
    ContributionStatus, ContributionType, LeaderboardWindow, ReviewDecision,
};
use lexicon_backend::models::moderation_models::{ActionOptions, ActionTarget, ActionType};
use lexicon_backend::models::{Role, Severity};

#[test]
fn validating_a_word_credits_its_author_once() {
    let h = Harness::new();
    let author = h.user("amara", Role::Contributor);
    let moderator = h.user("kofi", Role::Moderator);

    let item = h.submit_word(author, "ubuntu");
    assert_eq!(item.validation_state, ValidationState::Pending);
    assert!(!item.is_public());

    let outcome = h
        .engine
        .handle(
            Intent::ValidateContent {
                content: item.content_ref(),
                to_state: ValidationState::Validated,
                comment: Some("<b>Accurate</b> entry".into()),
                expected_version: Some(item.version),
            },
            moderator,
        )
        .unwrap();
    let names: Vec<_> = outcome.events.iter().map(|e| e.name()).collect();
    assert!(names.contains(&"content_validated"));
    assert!(names.contains(&"contribution_reviewed"));
    let validated = content(outcome);
    assert!(validated.is_public());

    let history = h.engine.validation_history(item.content_ref()).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].from_state, None);
    assert_eq!(history[1].from_state, Some(ValidationState::Pending));
    assert_eq!(history[1].actor_id, moderator.user_id);
    assert_eq!(history[1].comment.as_deref(), Some("Accurate entry"));

    let entry = h.engine.contribution(1).unwrap();
    assert_eq!(entry.contribution_type, ContributionType::WordCreation);
    assert_eq!(entry.status, ContributionStatus::Approved);
    assert_eq!(entry.points_earned, 10);
    assert_eq!(h.engine.user(author.user_id).unwrap().points, 10);

    // A second approval of the same entry changes nothing.
    let again = h
        .engine
        .handle(
            Intent::ReviewContribution { entry_id: entry.id, decision: ReviewDecision::Approve, quality_score: None },
            moderator,
        )
        .unwrap();
    assert_eq!(again.no_op, Some(NoOp::AlreadyReviewed));
    assert!(again.events.is_empty());
    assert_eq!(h.engine.user(author.user_id).unwrap().points, 10);

    let board = h.engine.leaderboard(LeaderboardWindow::default(), 10).unwrap();
    assert_eq!(board.len(), 1);
    assert_eq!(board[0].user_id, author.user_id);
    assert_eq!(board[0].points, 10);
}

#[test]
fn repeating_the_current_state_is_a_no_op() {
    let h = Harness::new();
    let author = h.user("amara", Role::Contributor);
    let moderator = h.user("kofi", Role::Moderator);
    let item = h.submit_word(author, "sankofa");
    h.move_to(moderator, &item, ValidationState::Validated);
    let seen = h.event_names().len();

    let outcome = h
        .engine
        .handle(
            Intent::ValidateContent {
                content: item.content_ref(),
                to_state: ValidationState::Validated,
                comment: None,
                expected_version: None,
            },
            moderator,
        )
        .unwrap();
    assert_eq!(outcome.no_op, Some(NoOp::AlreadyInState));
    assert_eq!(h.event_names().len(), seen);
    assert_eq!(h.engine.validation_history(item.content_ref()).unwrap().len(), 2);
}

#[test]
fn repeats_are_forbidden_to_actors_who_could_not_make_the_move() {
    let h = Harness::new();
    let author = h.user("amara", Role::Contributor);
    let moderator = h.user("kofi", Role::Moderator);
    let bystander = h.user("tumi", Role::User);
    let item = h.submit_word(author, "ujamaa");
    let item = h.move_to(moderator, &item, ValidationState::Validated);

    let repeat = |actor, to_state| {
        h.engine.handle(
            Intent::ValidateContent { content: item.content_ref(), to_state, comment: None, expected_version: None },
            actor,
        )
    };

    assert_matches!(repeat(bystander, ValidationState::Validated), Err(EngineError::Forbidden(_)));
    assert_matches!(repeat(bystander, ValidationState::Archived), Err(EngineError::Forbidden(_)));
    // The author may not validate their own word, so a repeat is refused too.
    assert_matches!(repeat(author, ValidationState::Validated), Err(EngineError::Forbidden(_)));
    assert_eq!(repeat(moderator, ValidationState::Validated).unwrap().no_op, Some(NoOp::AlreadyInState));
}

#[test]
fn cached_state_always_matches_the_latest_record() {
    let h = Harness::new();
    let author = h.user("amara", Role::Contributor);
    let moderator = h.user("kofi", Role::Moderator);
    let item = h.submit_word(author, "harambee");

    let rejected = h.move_to(moderator, &item, ValidationState::Rejected);
    let resubmitted = h.move_to(author, &rejected, ValidationState::Pending);
    let validated = h.move_to(moderator, &resubmitted, ValidationState::Validated);
    let archived = h.move_to(moderator, &validated, ValidationState::Archived);
    let restored = h.move_to(moderator, &archived, ValidationState::Validated);

    let history = h.engine.validation_history(item.content_ref()).unwrap();
    let states: Vec<_> = history.iter().map(|r| r.to_state).collect();
    assert_eq!(
        states,
        vec![
            ValidationState::Pending,
            ValidationState::Rejected,
            ValidationState::Pending,
            ValidationState::Validated,
            ValidationState::Archived,
            ValidationState::Validated,
        ]
    );
    for pair in history.windows(2) {
        assert_eq!(pair[1].from_state, Some(pair[0].to_state));
    }
    let current = h.engine.content(item.content_ref()).unwrap();
    assert_eq!(current.validation_state, history.last().unwrap().to_state);
    assert_eq!(current, restored);

    // Restoring from the archive does not credit the author a second time.
    assert_eq!(h.engine.user(author.user_id).unwrap().points, 10);
}

#[test]
fn forbidden_transitions_leave_no_trace() {
    let h = Harness::new();
    let author = h.user("amara", Role::Contributor);
    let expert = h.user("nia", Role::Expert);
    let item = h.submit_word(author, "jabari");

    let err = h
        .engine
        .handle(
            Intent::ValidateContent {
                content: item.content_ref(),
                to_state: ValidationState::Validated,
                comment: None,
                expected_version: None,
            },
            author,
        )
        .unwrap_err();
    assert_matches!(err, EngineError::Forbidden(_));

    let err = h
        .engine
        .handle(
            Intent::ValidateContent {
                content: item.content_ref(),
                to_state: ValidationState::Archived,
                comment: None,
                expected_version: None,
            },
            expert,
        )
        .unwrap_err();
    assert_matches!(err, EngineError::InvalidTransition { .. });

    let err = h
        .engine
        .handle(
            Intent::ValidateContent {
                content: item.content_ref(),
                to_state: ValidationState::Validated,
                comment: None,
                expected_version: Some(item.version + 1),
            },
            expert,
        )
        .unwrap_err();
    assert_matches!(err, EngineError::VersionConflict { .. });

    assert_eq!(h.engine.validation_history(item.content_ref()).unwrap().len(), 1);
    assert_eq!(h.engine.content(item.content_ref()).unwrap().validation_state, ValidationState::Pending);
}

#[test]
fn moderators_cannot_validate_their_own_words() {
    let h = Harness::new();
    let moderator = h.user("kofi", Role::Moderator);
    let admin = h.user("zola", Role::Admin);

    let own = h.submit_word(moderator, "imani");
    let err = h
        .engine
        .handle(
            Intent::ValidateContent {
                content: own.content_ref(),
                to_state: ValidationState::Validated,
                comment: None,
                expected_version: None,
            },
            moderator,
        )
        .unwrap_err();
    assert_matches!(err, EngineError::Forbidden(_));

    let admin_own = h.submit_word(admin, "baraka");
    let validated = h.move_to(admin, &admin_own, ValidationState::Validated);
    assert_eq!(validated.validation_state, ValidationState::Validated);
}

#[test]
fn plain_users_may_only_submit_discussion_content() {
    let h = Harness::new();
    let user = h.user("tumi", Role::User);

    let err = h
        .engine
        .handle(Intent::SubmitContent { payload: common::word("lekker") }, user)
        .unwrap_err();
    assert_matches!(err, EngineError::Forbidden(_));

    let outcome = h
        .engine
        .handle(
            Intent::SubmitContent {
                payload: lexicon_backend::models::content_models::ContentPayload::ForumPost {
                    title: "Greetings".into(),
                    body: "Which words mean <i>hello</i>?".into(),
                },
            },
            user,
        )
        .unwrap();
    assert_eq!(content(outcome).validation_state, ValidationState::Pending);
}

#[test]
fn locked_rejected_content_cannot_be_resubmitted_by_its_author() {
    let h = Harness::new();
    let author = h.user("amara", Role::Contributor);
    let moderator = h.user("kofi", Role::Moderator);
    let item = h.submit_word(author, "wahala");
    let rejected = h.move_to(moderator, &item, ValidationState::Rejected);

    h.engine
        .handle(
            Intent::ApplyModeratorAction {
                action_type: ActionType::LockContent,
                target: ActionTarget::Content { content: rejected.content_ref() },
                reason: "repeated resubmission of spam".into(),
                severity: Severity::Medium,
                options: ActionOptions::default(),
            },
            moderator,
        )
        .unwrap();

    let err = h
        .engine
        .handle(
            Intent::ValidateContent {
                content: item.content_ref(),
                to_state: ValidationState::Pending,
                comment: None,
                expected_version: None,
            },
            author,
        )
        .unwrap_err();
    assert_matches!(err, EngineError::Forbidden(_));
}

#[test]
fn contributors_record_their_own_entries_for_review() {
    let h = Harness::new();
    let author = h.user("amara", Role::Contributor);
    let expert = h.user("nia", Role::Expert);
    let item = h.submit_word(author, "ujamaa");

    let recorded = contribution(
        h.engine
            .handle(
                Intent::RecordContribution {
                    contribution_type: ContributionType::ExampleAddition,
                    content: Some(item.content_ref()),
                    base_points: Some(500),
                },
                author,
            )
            .unwrap(),
    );
    assert_eq!(recorded.status, ContributionStatus::Pending);
    assert_eq!(recorded.base_points, 10);

    let err = h
        .engine
        .handle(
            Intent::RecordContribution {
                contribution_type: ContributionType::WordCreation,
                content: Some(item.content_ref()),
                base_points: None,
            },
            author,
        )
        .unwrap_err();
    assert_matches!(err, EngineError::InvalidInput(_));

    let err = h
        .engine
        .handle(
            Intent::ReviewContribution { entry_id: recorded.id, decision: ReviewDecision::Approve, quality_score: Some(1.5) },
            author,
        )
        .unwrap_err();
    assert_matches!(err, EngineError::Forbidden(_));

    let reviewed = contribution(
        h.engine
            .handle(
                Intent::ReviewContribution {
                    entry_id: recorded.id,
                    decision: ReviewDecision::Approve,
                    quality_score: Some(1.5),
                },
                expert,
            )
            .unwrap(),
    );
    assert_eq!(reviewed.points_earned, 15);
    assert_eq!(h.engine.user(author.user_id).unwrap().points, 15);
}

#[test]
fn concurrent_validations_commit_exactly_once() {
    let h = Harness::new();
    let author = h.user("amara", Role::Contributor);
    let moderators = [h.user("kofi", Role::Moderator), h.user("ayo", Role::Moderator)];
    let item = h.submit_word(author, "asante");
    let barrier = Arc::new(Barrier::new(moderators.len()));

    let handles: Vec<_> = moderators
        .iter()
        .map(|moderator| {
            let engine = h.engine.clone();
            let barrier = barrier.clone();
            let moderator = *moderator;
            let content = item.content_ref();
            thread::spawn(move || {
                barrier.wait();
                engine.handle(
                    Intent::ValidateContent {
                        content,
                        to_state: ValidationState::Validated,
                        comment: None,
                        expected_version: None,
                    },
                    moderator,
                )
            })
        })
        .collect();

    let outcomes: Vec<_> = handles.into_iter().map(|t| t.join().unwrap().unwrap()).collect();
    assert_eq!(outcomes.iter().filter(|o| o.no_op.is_none()).count(), 1);
    assert_eq!(outcomes.iter().filter(|o| o.no_op == Some(NoOp::AlreadyInState)).count(), 1);

    let history = h.engine.validation_history(item.content_ref()).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(h.engine.user(author.user_id).unwrap().points, 10);
    assert_eq!(h.event_names().iter().filter(|n| **n == "content_validated").count(), 1);
}

#[test]
fn inactive_accounts_cannot_submit() {
    let h = Harness::new();
    let author = h.user("amara", Role::Contributor);
    let moderator = h.user("kofi", Role::Moderator);

    h.engine
        .handle(
            Intent::ApplyModeratorAction {
                action_type: ActionType::SuspendUser,
                target: ActionTarget::User { user_id: author.user_id },
                reason: "cooling off period".into(),
                severity: Severity::Medium,
                options: ActionOptions::default(),
            },
            moderator,
        )
        .unwrap();

    let err = h
        .engine
        .handle(Intent::SubmitContent { payload: common::word("pole") }, author)
        .unwrap_err();
    assert_matches!(err, EngineError::Forbidden(_));
}
