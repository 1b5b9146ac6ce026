use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ContentRef, ContentType, Severity};

string_enum! {
    pub enum ActionType {
        BanUser => "ban_user",
        SuspendUser => "suspend_user",
        WarnUser => "warn_user",
        LockContent => "lock_content",
        UnlockContent => "unlock_content",
        DeleteContent => "delete_content",
        ApproveContent => "approve_content",
    }
}

impl ActionType {
    pub fn target_type(&self) -> TargetType {
        match self {
            ActionType::BanUser | ActionType::SuspendUser | ActionType::WarnUser => TargetType::User,
            _ => TargetType::Content,
        }
    }

    /// Approving content cannot be undone without breaking the validation state machine.
    pub fn can_be_reversed(&self) -> bool {
        !matches!(self, ActionType::ApproveContent)
    }
}

string_enum! {
    pub enum TargetType {
        User => "user",
        Content => "content",
    }
}

string_enum! {
    pub enum ActionStatus {
        PendingApproval => "pending_approval",
        Applied => "applied",
        Denied => "denied",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionTarget {
    User { user_id: i64 },
    Content { content: ContentRef },
}

impl ActionTarget {
    pub fn target_type(&self) -> TargetType {
        match self {
            ActionTarget::User { .. } => TargetType::User,
            ActionTarget::Content { .. } => TargetType::Content,
        }
    }
}

/// Caller-supplied knobs for `apply`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionOptions {
    #[serde(default = "default_reversible")]
    pub is_reversible: bool,
    /// Makes the action temporary; the sweep reverts it once elapsed.
    #[serde(default)]
    pub duration_secs: Option<i64>,
}

fn default_reversible() -> bool {
    true
}

impl Default for ActionOptions {
    fn default() -> Self {
        Self { is_reversible: true, duration_secs: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeratorAction {
    pub id: i64,
    pub moderator_id: i64,
    pub action_type: ActionType,
    pub target: ActionTarget,
    pub target_user_id: Option<i64>,
    pub reason: String,
    pub severity: Severity,
    pub status: ActionStatus,
    pub previous_state: Value,
    pub new_state: Value,
    pub is_reversible: bool,
    pub is_reversed: bool,
    pub reversed_by: Option<i64>,
    pub reversed_at: Option<DateTime<Utc>>,
    pub reversal_reason: Option<String>,
    pub duration_secs: Option<i64>,
    pub expires_at: Option<DateTime<Utc>>,
    pub decided_by: Option<i64>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decision_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub version: i64,
}

impl ModeratorAction {
    pub fn target_type(&self) -> TargetType {
        self.target.target_type()
    }

    /// `(target_type, target_id, content_type)` as persisted.
    pub fn target_columns(&self) -> (TargetType, i64, Option<ContentType>) {
        match self.target {
            ActionTarget::User { user_id } => (TargetType::User, user_id, None),
            ActionTarget::Content { content } => {
                (TargetType::Content, content.content_id, Some(content.content_type))
            }
        }
    }
}
