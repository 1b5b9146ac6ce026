//! The moderation engine: a single `handle` entry point that authorizes an
//! intent, runs the owning component inside one store transaction, and hands
//! the resulting domain events to the publisher after commit.

pub mod action_log;
pub mod error;
pub mod events;
pub mod ledger;
pub mod policy;
pub mod repository;
pub mod triage;
pub mod validation;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread;
use std::time::Duration as StdDuration;

use crate::models::content_models::{ContentItem, ContentPayload, ValidationRecord, ValidationState};
use crate::models::contribution_models::{
    ContributionEntry, ContributionType, LeaderboardEntry, LeaderboardWindow, ReviewDecision,
};
use crate::models::moderation_models::{ActionOptions, ActionTarget, ActionType, ModeratorAction};
use crate::models::report_models::{ActionTaken, Report, ReportReason};
use crate::models::{ActorContext, ContentRef, ContentType, Severity, UserAccount};

use self::action_log::ApplyRequest;
pub use self::error::EngineError;
use self::events::{DomainEvent, EventKind, EventPublisher};
use self::policy::{authorize, IntentKind, ModerationPolicy};
use self::repository::{Repositories, Store};
use self::triage::{ReportSubmission, Submitted};

/// A request to change moderation state, as received from the API layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Intent {
    SubmitContent {
        payload: ContentPayload,
    },
    /// Drives every validation transition: validate, reject, archive,
    /// restore and resubmit.
    ValidateContent {
        content: ContentRef,
        to_state: ValidationState,
        #[serde(default)]
        comment: Option<String>,
        #[serde(default)]
        expected_version: Option<i64>,
    },
    RecordContribution {
        contribution_type: ContributionType,
        #[serde(default)]
        content: Option<ContentRef>,
        #[serde(default)]
        base_points: Option<i64>,
    },
    ReviewContribution {
        entry_id: i64,
        decision: ReviewDecision,
        #[serde(default)]
        quality_score: Option<f64>,
    },
    ApplyModeratorAction {
        action_type: ActionType,
        target: ActionTarget,
        reason: String,
        severity: Severity,
        #[serde(default)]
        options: ActionOptions,
    },
    ApproveModeratorAction {
        action_id: i64,
    },
    DenyModeratorAction {
        action_id: i64,
        #[serde(default)]
        note: Option<String>,
    },
    ReverseAction {
        action_id: i64,
        reason: String,
    },
    SubmitReport {
        content: ContentRef,
        reason: ReportReason,
        severity: Severity,
        #[serde(default)]
        details: Option<String>,
        #[serde(default)]
        evidence: Option<String>,
    },
    AssignReport {
        report_id: i64,
        moderator_id: i64,
    },
    InvestigateReport {
        report_id: i64,
    },
    EscalateReport {
        report_id: i64,
        escalated_to: i64,
        reason: String,
    },
    ResolveReport {
        report_id: i64,
        action_taken: ActionTaken,
        #[serde(default)]
        note: Option<String>,
    },
    DismissReport {
        report_id: i64,
        #[serde(default)]
        note: Option<String>,
    },
    MarkDuplicateReport {
        report_id: i64,
        original_report_id: i64,
    },
}

impl Intent {
    pub fn kind(&self) -> IntentKind {
        match self {
            Intent::SubmitContent { payload } => match payload.content_type() {
                ContentType::Word | ContentType::Phrase | ContentType::Proverb => {
                    IntentKind::SubmitDictionaryContent
                }
                ContentType::Comment | ContentType::ForumPost => IntentKind::SubmitDiscussionContent,
            },
            Intent::ValidateContent { .. } => IntentKind::ValidateContent,
            Intent::RecordContribution { .. } => IntentKind::RecordContribution,
            Intent::ReviewContribution { .. } => IntentKind::ReviewContribution,
            Intent::ApplyModeratorAction { .. } => IntentKind::ApplyModeratorAction,
            Intent::ApproveModeratorAction { .. } => IntentKind::ApproveModeratorAction,
            Intent::DenyModeratorAction { .. } => IntentKind::DenyModeratorAction,
            Intent::ReverseAction { .. } => IntentKind::ReverseAction,
            Intent::SubmitReport { .. } => IntentKind::SubmitReport,
            Intent::AssignReport { .. } => IntentKind::AssignReport,
            Intent::InvestigateReport { .. } => IntentKind::InvestigateReport,
            Intent::EscalateReport { .. } => IntentKind::EscalateReport,
            Intent::ResolveReport { .. } => IntentKind::ResolveReport,
            Intent::DismissReport { .. } => IntentKind::DismissReport,
            Intent::MarkDuplicateReport { .. } => IntentKind::MarkDuplicateReport,
        }
    }
}

/// The entity an intent touched, as it stands after the intent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "entity", rename_all = "snake_case")]
pub enum Projection {
    Content(ContentItem),
    Contribution(ContributionEntry),
    ModeratorAction(ModeratorAction),
    Report(Report),
}

/// Why a successful outcome changed nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoOp {
    AlreadyInState,
    AlreadyReviewed,
    AlreadyReversed,
    ExistingOpenReport,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub projection: Projection,
    pub events: Vec<DomainEvent>,
    pub no_op: Option<NoOp>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub expired: usize,
    pub reverted: usize,
    /// Claimed by a concurrent sweep or reversed by hand in the meantime.
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    pub sweep: SweepReport,
    pub events_delivered: usize,
}

/// Per-transaction state handed to the components.
pub(crate) struct TxContext<'a> {
    pub repos: &'a dyn Repositories,
    pub actor: ActorContext,
    pub policy: &'a ModerationPolicy,
    pub now: DateTime<Utc>,
    events: Vec<EventKind>,
}

impl<'a> TxContext<'a> {
    pub fn emit(&mut self, kind: EventKind) {
        self.events.push(kind);
    }

    /// Suspended or banned accounts may not submit anything.
    pub fn require_active_actor(&self) -> Result<(), EngineError> {
        if self.actor.is_system() {
            return Ok(());
        }
        match self.repos.get_user(self.actor.user_id)? {
            Some(user) if user.is_active => Ok(()),
            Some(_) => Err(EngineError::forbidden(format!("account {} is not active", self.actor.user_id))),
            None => Err(EngineError::not_found("user", self.actor.user_id)),
        }
    }
}

type Dispatched = (Projection, Option<NoOp>);

pub struct ModerationEngine<S: Store> {
    store: S,
    publisher: Arc<dyn EventPublisher>,
    policy: ModerationPolicy,
}

impl<S: Store> ModerationEngine<S> {
    pub fn new(store: S, publisher: Arc<dyn EventPublisher>, policy: ModerationPolicy) -> Self {
        Self { store, publisher, policy }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn policy(&self) -> &ModerationPolicy {
        &self.policy
    }

    pub fn handle(&self, intent: Intent, actor: ActorContext) -> Result<Outcome, EngineError> {
        authorize(&actor, intent.kind())?;

        match self.run(actor, |ctx| dispatch(ctx, &intent)) {
            Ok(((projection, no_op), events)) => Ok(Outcome { projection, events, no_op }),
            Err(err) if err.is_noop() => self.noop_outcome(&intent, err),
            Err(err) => {
                log::debug!("intent {:?} by user {} failed: {}", intent.kind(), actor.user_id, err);
                Err(err)
            }
        }
    }

    /// Re-reads the unchanged entity for an idempotent repeat. Only the
    /// signal belonging to the intent's own entity counts as a no-op.
    fn noop_outcome(&self, intent: &Intent, err: EngineError) -> Result<Outcome, EngineError> {
        let found = match (intent, &err) {
            (Intent::ValidateContent { content, .. }, EngineError::AlreadyInState { .. }) => {
                Some((Projection::Content(self.content(*content)?), NoOp::AlreadyInState))
            }
            (Intent::ReviewContribution { entry_id, .. }, EngineError::AlreadyReviewed(_)) => {
                Some((Projection::Contribution(self.contribution(*entry_id)?), NoOp::AlreadyReviewed))
            }
            (Intent::ReverseAction { action_id, .. }, EngineError::AlreadyReversed(_)) => {
                Some((Projection::ModeratorAction(self.moderator_action(*action_id)?), NoOp::AlreadyReversed))
            }
            _ => None,
        };
        let (projection, no_op) = match found {
            Some(found) => found,
            None => return Err(err),
        };
        log::debug!("{}; returning current state", err);
        Ok(Outcome { projection, events: Vec::new(), no_op: Some(no_op) })
    }

    /// Runs `work` in a store transaction, retrying transient store failures
    /// with jittered exponential backoff. Events raised by `work` go to the
    /// outbox in the same transaction and are published once it commits.
    fn run<T>(
        &self,
        actor: ActorContext,
        mut work: impl FnMut(&mut TxContext<'_>) -> Result<T, EngineError>,
    ) -> Result<(T, Vec<DomainEvent>), EngineError> {
        let mut attempt = 0;
        let (value, queued) = loop {
            let now = Utc::now();
            let result = self.store.transaction(&mut |repos| {
                let mut ctx = TxContext { repos, actor, policy: &self.policy, now, events: Vec::new() };
                let value = work(&mut ctx)?;
                let mut queued = Vec::with_capacity(ctx.events.len());
                for kind in ctx.events {
                    let event = DomainEvent::new(kind, actor.user_id, now);
                    let outbox_id = repos.enqueue_event(&event)?;
                    queued.push((outbox_id, event));
                }
                Ok((value, queued))
            });

            match result {
                Err(err) if err.is_transient() && attempt < self.policy.storage_retry_attempts => {
                    attempt += 1;
                    let delay = self.backoff(attempt);
                    log::warn!("{}; retrying in {:?} (attempt {})", err, delay, attempt);
                    thread::sleep(delay);
                }
                other => break other?,
            }
        };

        let events = queued.iter().map(|(_, event)| event.clone()).collect();
        self.deliver(queued);
        Ok((value, events))
    }

    fn backoff(&self, attempt: u32) -> StdDuration {
        let base = self.policy.storage_retry_backoff_ms.saturating_mul(1u64 << attempt.min(10));
        let jitter = rand::thread_rng().gen_range(0..=base / 2);
        StdDuration::from_millis(base + jitter)
    }

    /// Publishes committed events. Failures leave them in the outbox.
    fn deliver(&self, queued: Vec<(i64, DomainEvent)>) -> usize {
        let mut delivered = 0;
        for (outbox_id, event) in queued {
            if let Err(e) = self.publisher.publish(&event) {
                log::warn!("event {} ({}) left in outbox: {}", event.name(), event.event_id, e);
                continue;
            }
            match self.store.transaction(&mut |repos| repos.mark_delivered(outbox_id, Utc::now())) {
                Ok(()) => delivered += 1,
                Err(e) => log::warn!("event {} published but not marked delivered: {}", event.event_id, e),
            }
        }
        delivered
    }

    /// Retries publication of events still in the outbox.
    pub fn flush_outbox(&self) -> Result<usize, EngineError> {
        let limit = self.policy.outbox_batch_size;
        let pending = self.store.transaction(&mut |repos| repos.pending_events(limit))?;
        if pending.is_empty() {
            return Ok(0);
        }
        let total = pending.len();
        let delivered = self.deliver(pending);
        log::info!("outbox flush delivered {} of {} events", delivered, total);
        Ok(delivered)
    }

    pub fn sweep_expired(&self) -> Result<SweepReport, EngineError> {
        self.sweep_expired_at(Utc::now())
    }

    /// Reverts every applied temporary action that expired before `now`.
    /// Safe to run concurrently: each action is claimed before it is restored.
    pub fn sweep_expired_at(&self, now: DateTime<Utc>) -> Result<SweepReport, EngineError> {
        let limit = self.policy.sweep_batch_size;
        let expired = self.store.transaction(&mut |repos| repos.expired_unreversed(now, limit))?;
        let mut report = SweepReport { expired: expired.len(), ..SweepReport::default() };

        for action_id in expired {
            match self.run(ActorContext::system(), |ctx| action_log::revert_expired(ctx, action_id)) {
                Ok((Some(_), _)) => report.reverted += 1,
                Ok((None, _)) => report.skipped += 1,
                Err(e) => {
                    log::warn!("sweep could not revert moderator action {}: {}", action_id, e);
                    report.failed += 1;
                }
            }
        }

        if report.expired > 0 {
            log::info!(
                "sweep: {} expired, {} reverted, {} skipped, {} failed",
                report.expired, report.reverted, report.skipped, report.failed
            );
        }
        Ok(report)
    }

    /// One scheduler tick: expiry sweep followed by an outbox flush.
    pub fn run_maintenance(&self) -> Result<MaintenanceReport, EngineError> {
        let sweep = self.sweep_expired()?;
        let events_delivered = self.flush_outbox()?;
        Ok(MaintenanceReport { sweep, events_delivered })
    }

    /// `run_maintenance` on behalf of an API caller.
    pub fn run_maintenance_as(&self, actor: &ActorContext) -> Result<MaintenanceReport, EngineError> {
        authorize(actor, IntentKind::RunMaintenance)?;
        self.run_maintenance()
    }

    pub fn content(&self, content: ContentRef) -> Result<ContentItem, EngineError> {
        self.store
            .transaction(&mut |repos| repos.get_content(content))?
            .ok_or_else(|| EngineError::not_found("content", content))
    }

    pub fn validation_history(&self, content: ContentRef) -> Result<Vec<ValidationRecord>, EngineError> {
        self.content(content)?;
        self.store.transaction(&mut |repos| repos.records_for(content))
    }

    pub fn contribution(&self, entry_id: i64) -> Result<ContributionEntry, EngineError> {
        self.store
            .transaction(&mut |repos| repos.get_contribution(entry_id))?
            .ok_or_else(|| EngineError::not_found("contribution", entry_id))
    }

    pub fn moderator_action(&self, action_id: i64) -> Result<ModeratorAction, EngineError> {
        self.store
            .transaction(&mut |repos| repos.get_action(action_id))?
            .ok_or_else(|| EngineError::not_found("moderator action", action_id))
    }

    pub fn report(&self, report_id: i64) -> Result<Report, EngineError> {
        self.store
            .transaction(&mut |repos| repos.get_report(report_id))?
            .ok_or_else(|| EngineError::not_found("report", report_id))
    }

    pub fn user(&self, user_id: i64) -> Result<UserAccount, EngineError> {
        self.store
            .transaction(&mut |repos| repos.get_user(user_id))?
            .ok_or_else(|| EngineError::not_found("user", user_id))
    }

    pub fn leaderboard(&self, window: LeaderboardWindow, limit: u32) -> Result<Vec<LeaderboardEntry>, EngineError> {
        self.store.transaction(&mut |repos| repos.leaderboard(window, limit))
    }
}

fn dispatch(ctx: &mut TxContext<'_>, intent: &Intent) -> Result<Dispatched, EngineError> {
    let dispatched = match intent {
        Intent::SubmitContent { payload } => (Projection::Content(validation::submit(ctx, payload)?), None),
        Intent::ValidateContent { content, to_state, comment, expected_version } => {
            let item = validation::transition(ctx, *content, *to_state, comment.as_deref(), *expected_version)?;
            (Projection::Content(item), None)
        }
        Intent::RecordContribution { contribution_type, content, base_points } => {
            let entry = ledger::record_own(ctx, *contribution_type, *content, *base_points)?;
            (Projection::Contribution(entry), None)
        }
        Intent::ReviewContribution { entry_id, decision, quality_score } => {
            let entry = ledger::review(ctx, *entry_id, *decision, *quality_score)?;
            (Projection::Contribution(entry), None)
        }
        Intent::ApplyModeratorAction { action_type, target, reason, severity, options } => {
            let action = action_log::apply(
                ctx,
                ApplyRequest {
                    action_type: *action_type,
                    target: *target,
                    reason: reason.clone(),
                    severity: *severity,
                    options: options.clone(),
                },
            )?;
            (Projection::ModeratorAction(action), None)
        }
        Intent::ApproveModeratorAction { action_id } => {
            (Projection::ModeratorAction(action_log::approve(ctx, *action_id)?), None)
        }
        Intent::DenyModeratorAction { action_id, note } => {
            (Projection::ModeratorAction(action_log::deny(ctx, *action_id, note.as_deref())?), None)
        }
        Intent::ReverseAction { action_id, reason } => {
            (Projection::ModeratorAction(action_log::reverse(ctx, *action_id, reason, false)?), None)
        }
        Intent::SubmitReport { content, reason, severity, details, evidence } => {
            let submission = ReportSubmission {
                content: *content,
                reason: *reason,
                severity: *severity,
                details: details.clone(),
                evidence: evidence.clone(),
            };
            match triage::submit(ctx, submission)? {
                Submitted::Created(report) => (Projection::Report(report), None),
                Submitted::Existing(report) => (Projection::Report(report), Some(NoOp::ExistingOpenReport)),
            }
        }
        Intent::AssignReport { report_id, moderator_id } => {
            (Projection::Report(triage::assign(ctx, *report_id, *moderator_id)?), None)
        }
        Intent::InvestigateReport { report_id } => (Projection::Report(triage::investigate(ctx, *report_id)?), None),
        Intent::EscalateReport { report_id, escalated_to, reason } => {
            (Projection::Report(triage::escalate(ctx, *report_id, *escalated_to, reason)?), None)
        }
        Intent::ResolveReport { report_id, action_taken, note } => {
            (Projection::Report(triage::resolve(ctx, *report_id, *action_taken, note.as_deref())?), None)
        }
        Intent::DismissReport { report_id, note } => {
            (Projection::Report(triage::dismiss(ctx, *report_id, note.as_deref())?), None)
        }
        Intent::MarkDuplicateReport { report_id, original_report_id } => {
            (Projection::Report(triage::mark_duplicate(ctx, *report_id, *original_report_id)?), None)
        }
    };
    Ok(dispatched)
}
