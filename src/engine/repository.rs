//! Persistence contracts the engine runs against.
//!
//! Each entity has its own repository trait. A [`Store`] hands all of them out
//! together, scoped to one transaction, so a component call and its
//! cross-component side effects commit or roll back as a unit.

use chrono::{DateTime, Utc};

use super::error::EngineError;
use super::events::DomainEvent;
use crate::models::content_models::{ContentItem, ContentPayload, NewValidationRecord, ValidationRecord};
use crate::models::contribution_models::{
    ContributionEntry, LeaderboardEntry, LeaderboardWindow, NewContribution,
};
use crate::models::moderation_models::ModeratorAction;
use crate::models::report_models::{NewReport, Report};
use crate::models::{ContentRef, UserAccount};

pub type RepoResult<T> = Result<T, EngineError>;

pub trait ContentRepository {
    fn get_content(&self, content: ContentRef) -> RepoResult<Option<ContentItem>>;
    fn insert_content(
        &self,
        author_id: i64,
        payload: &ContentPayload,
        now: DateTime<Utc>,
    ) -> RepoResult<ContentItem>;
    /// Writes state, lock and payload. Fails with `VersionConflict` when
    /// `item.version` is stale; returns the row with its new version.
    fn save_content(&self, item: &ContentItem) -> RepoResult<ContentItem>;
}

pub trait ValidationRecordRepository {
    fn append_record(&self, record: &NewValidationRecord) -> RepoResult<ValidationRecord>;
    fn records_for(&self, content: ContentRef) -> RepoResult<Vec<ValidationRecord>>;
}

pub trait UserRepository {
    fn get_user(&self, user_id: i64) -> RepoResult<Option<UserAccount>>;
    fn save_user(&self, user: &UserAccount) -> RepoResult<UserAccount>;
    /// Adds to the running point total and bumps the contribution counter.
    fn credit_user(&self, user_id: i64, points: i64) -> RepoResult<()>;
}

pub trait ContributionRepository {
    fn get_contribution(&self, entry_id: i64) -> RepoResult<Option<ContributionEntry>>;
    fn insert_contribution(&self, entry: &NewContribution) -> RepoResult<ContributionEntry>;
    fn save_contribution(&self, entry: &ContributionEntry) -> RepoResult<ContributionEntry>;
    fn find_creation_entry(
        &self,
        content: ContentRef,
        author_id: i64,
    ) -> RepoResult<Option<ContributionEntry>>;
    fn leaderboard(
        &self,
        window: LeaderboardWindow,
        limit: u32,
    ) -> RepoResult<Vec<LeaderboardEntry>>;
}

pub trait ModeratorActionRepository {
    fn get_action(&self, action_id: i64) -> RepoResult<Option<ModeratorAction>>;
    /// Persists a new action; the `id` and `version` of the argument are ignored.
    fn insert_action(&self, action: &ModeratorAction) -> RepoResult<ModeratorAction>;
    fn save_action(&self, action: &ModeratorAction) -> RepoResult<ModeratorAction>;
    /// Conditionally flips `is_reversed`. Returns `false` when another caller
    /// already reversed the action.
    fn claim_reversal(
        &self,
        action_id: i64,
        reversed_by: i64,
        reversed_at: DateTime<Utc>,
        reason: &str,
    ) -> RepoResult<bool>;
    fn expired_unreversed(&self, now: DateTime<Utc>, limit: u32) -> RepoResult<Vec<i64>>;
}

pub trait ReportRepository {
    fn get_report(&self, report_id: i64) -> RepoResult<Option<Report>>;
    fn insert_report(&self, report: &NewReport) -> RepoResult<Report>;
    fn save_report(&self, report: &Report) -> RepoResult<Report>;
    fn find_open_report(&self, reporter_id: i64, content: ContentRef) -> RepoResult<Option<Report>>;
    fn reports_duplicating(&self, report_id: i64) -> RepoResult<Vec<Report>>;
}

/// Durable queue of domain events written inside the same transaction as the
/// change that produced them.
pub trait EventOutbox {
    fn enqueue_event(&self, event: &DomainEvent) -> RepoResult<i64>;
    fn pending_events(&self, limit: u32) -> RepoResult<Vec<(i64, DomainEvent)>>;
    fn mark_delivered(&self, outbox_id: i64, delivered_at: DateTime<Utc>) -> RepoResult<()>;
}

pub trait Repositories:
    ContentRepository
    + ValidationRecordRepository
    + UserRepository
    + ContributionRepository
    + ModeratorActionRepository
    + ReportRepository
    + EventOutbox
{
}

impl<T> Repositories for T where
    T: ContentRepository
        + ValidationRecordRepository
        + UserRepository
        + ContributionRepository
        + ModeratorActionRepository
        + ReportRepository
        + EventOutbox
{
}

/// Transaction boundary over the backing store.
pub trait Store: Send + Sync {
    /// Runs `work` in one atomic transaction: commits when it returns `Ok`,
    /// rolls back otherwise. Store timeouts surface as `StorageUnavailable`.
    fn transaction<T>(
        &self,
        work: &mut dyn FnMut(&dyn Repositories) -> Result<T, EngineError>,
    ) -> Result<T, EngineError>;
}
