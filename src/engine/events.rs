//! Domain events handed to external collaborators (notifications, search
//! reindexing, statistics) once a transaction has committed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{mpsc, Mutex};
use thiserror::Error;
use uuid::Uuid;

use crate::models::contribution_models::{ContributionStatus, ContributionType};
use crate::models::moderation_models::{ActionTarget, ActionType};
use crate::models::report_models::ActionTaken;
use crate::models::ContentRef;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventKind {
    ContentSubmitted { content: ContentRef, author_id: i64 },
    ContentValidated { content: ContentRef, author_id: i64 },
    ContentRejected { content: ContentRef, author_id: i64, comment: Option<String> },
    ContentResubmitted { content: ContentRef },
    ContentArchived { content: ContentRef },
    ContentRestored { content: ContentRef },
    ContributionRecorded { entry_id: i64, user_id: i64, contribution_type: ContributionType },
    ContributionReviewed {
        entry_id: i64,
        user_id: i64,
        status: ContributionStatus,
        points_credited: i64,
    },
    ModeratorActionApplied {
        action_id: i64,
        action_type: ActionType,
        target: ActionTarget,
        target_user_id: Option<i64>,
    },
    ModeratorActionAwaitingApproval { action_id: i64, action_type: ActionType },
    ModeratorActionDenied { action_id: i64 },
    ActionReversed { action_id: i64, action_type: ActionType, automatic: bool },
    ReportSubmitted { report_id: i64, content: ContentRef },
    ReportAssigned { report_id: i64, assigned_to: i64 },
    ReportInvestigating { report_id: i64 },
    ReportEscalated { report_id: i64, escalated_to: i64 },
    ReportResolved { report_id: i64, action_taken: ActionTaken, notify_author: Option<i64> },
    ReportDismissed { report_id: i64 },
    ReportMarkedDuplicate { report_id: i64, duplicate_of: i64 },
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::ContentSubmitted { .. } => "content_submitted",
            EventKind::ContentValidated { .. } => "content_validated",
            EventKind::ContentRejected { .. } => "content_rejected",
            EventKind::ContentResubmitted { .. } => "content_resubmitted",
            EventKind::ContentArchived { .. } => "content_archived",
            EventKind::ContentRestored { .. } => "content_restored",
            EventKind::ContributionRecorded { .. } => "contribution_recorded",
            EventKind::ContributionReviewed { .. } => "contribution_reviewed",
            EventKind::ModeratorActionApplied { .. } => "moderator_action_applied",
            EventKind::ModeratorActionAwaitingApproval { .. } => "moderator_action_awaiting_approval",
            EventKind::ModeratorActionDenied { .. } => "moderator_action_denied",
            EventKind::ActionReversed { .. } => "action_reversed",
            EventKind::ReportSubmitted { .. } => "report_submitted",
            EventKind::ReportAssigned { .. } => "report_assigned",
            EventKind::ReportInvestigating { .. } => "report_investigating",
            EventKind::ReportEscalated { .. } => "report_escalated",
            EventKind::ReportResolved { .. } => "report_resolved",
            EventKind::ReportDismissed { .. } => "report_dismissed",
            EventKind::ReportMarkedDuplicate { .. } => "report_marked_duplicate",
        }
    }
}

/// An event as delivered. `event_id` is stable across redeliveries so
/// consumers can drop duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub event_id: Uuid,
    pub actor_id: i64,
    pub occurred_at: DateTime<Utc>,
    pub kind: EventKind,
}

impl DomainEvent {
    pub fn new(kind: EventKind, actor_id: i64, occurred_at: DateTime<Utc>) -> Self {
        Self { event_id: Uuid::new_v4(), actor_id, occurred_at, kind }
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

#[derive(Error, Debug)]
#[error("event publish failed: {0}")]
pub struct PublishError(pub String);

/// Outbound side of the notification collaborator. A failed publish leaves
/// the event in the outbox for the next flush.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: &DomainEvent) -> Result<(), PublishError>;
}

/// Writes every event to the log. Used when no downstream consumer is wired.
#[derive(Debug, Default)]
pub struct LogPublisher;

impl EventPublisher for LogPublisher {
    fn publish(&self, event: &DomainEvent) -> Result<(), PublishError> {
        let body = serde_json::to_string(&event.kind).map_err(|e| PublishError(e.to_string()))?;
        log::info!("event {} ({}) by actor {}: {}", event.name(), event.event_id, event.actor_id, body);
        Ok(())
    }
}

/// Forwards events to an in-process consumer such as a search reindex worker.
pub struct ChannelPublisher {
    sender: Mutex<mpsc::Sender<DomainEvent>>,
}

impl ChannelPublisher {
    pub fn new() -> (Self, mpsc::Receiver<DomainEvent>) {
        let (sender, receiver) = mpsc::channel();
        (Self { sender: Mutex::new(sender) }, receiver)
    }
}

impl EventPublisher for ChannelPublisher {
    fn publish(&self, event: &DomainEvent) -> Result<(), PublishError> {
        let sender = self
            .sender
            .lock()
            .map_err(|_| PublishError("channel publisher lock poisoned".to_string()))?;
        sender
            .send(event.clone())
            .map_err(|_| PublishError("event consumer has gone away".to_string()))
    }
}

/// Keeps every published event in memory.
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    events: Mutex<Vec<DomainEvent>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(DomainEvent::name).collect()
    }
}

impl EventPublisher for MemoryPublisher {
    fn publish(&self, event: &DomainEvent) -> Result<(), PublishError> {
        self.events
            .lock()
            .map_err(|_| PublishError("memory publisher lock poisoned".to_string()))?
            .push(event.clone());
        Ok(())
    }
}
