use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::moderation_models::ActionType;
use super::{ContentRef, Severity};

string_enum! {
    pub enum ReportStatus {
        Pending => "pending",
        UnderReview => "under_review",
        Investigating => "investigating",
        Resolved => "resolved",
        Dismissed => "dismissed",
        Escalated => "escalated",
        Duplicate => "duplicate",
    }
}

impl ReportStatus {
    /// Statuses that block a second report from the same reporter on the same content.
    pub const OPEN: &'static [ReportStatus] =
        &[ReportStatus::Pending, ReportStatus::UnderReview, ReportStatus::Investigating];
}

string_enum! {
    pub enum ReportReason {
        Spam => "spam",
        Offensive => "offensive",
        Inaccurate => "inaccurate",
        Copyright => "copyright",
        Harassment => "harassment",
        Other => "other",
    }
}

string_enum! {
    pub enum ActionTaken {
        NoAction => "no_action",
        ContentRemoved => "content_removed",
        ContentLocked => "content_locked",
        UserWarned => "user_warned",
        UserSuspended => "user_suspended",
        UserBanned => "user_banned",
    }
}

impl ActionTaken {
    /// The moderator action a resolution implies, if any.
    pub fn moderator_action(&self) -> Option<ActionType> {
        match self {
            ActionTaken::NoAction => None,
            ActionTaken::ContentRemoved => Some(ActionType::DeleteContent),
            ActionTaken::ContentLocked => Some(ActionType::LockContent),
            ActionTaken::UserWarned => Some(ActionType::WarnUser),
            ActionTaken::UserSuspended => Some(ActionType::SuspendUser),
            ActionTaken::UserBanned => Some(ActionType::BanUser),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: i64,
    pub reporter_id: i64,
    pub content: ContentRef,
    pub content_author_id: Option<i64>,
    pub reason: ReportReason,
    pub details: Option<String>,
    pub evidence: Option<String>,
    pub severity: Severity,
    pub status: ReportStatus,
    pub assigned_to: Option<i64>,
    pub escalated_to: Option<i64>,
    pub escalation_reason: Option<String>,
    pub resolved_by: Option<i64>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub action_taken: Option<ActionTaken>,
    pub resolution_note: Option<String>,
    pub moderator_action_id: Option<i64>,
    pub duplicate_of: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

#[derive(Debug, Clone)]
pub struct NewReport {
    pub reporter_id: i64,
    pub content: ContentRef,
    pub content_author_id: Option<i64>,
    pub reason: ReportReason,
    pub details: Option<String>,
    pub evidence: Option<String>,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
}
