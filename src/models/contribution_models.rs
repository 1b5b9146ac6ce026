use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ContentRef, ContentType};

string_enum! {
    pub enum ContributionType {
        WordCreation => "word_creation",
        PhraseCreation => "phrase_creation",
        ProverbCreation => "proverb_creation",
        CommentCreation => "comment_creation",
        ForumPostCreation => "forum_post_creation",
        ExampleAddition => "example_addition",
        TranslationAddition => "translation_addition",
        VerifiedCorrection => "verified_correction",
        ReportConfirmed => "report_confirmed",
    }
}

/// Bounds for the points a contribution type may award.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointRange {
    pub default: i64,
    pub min: i64,
    pub max: i64,
}

impl ContributionType {
    pub fn point_range(&self) -> PointRange {
        let (default, min, max) = match self {
            ContributionType::WordCreation => (10, 5, 20),
            ContributionType::PhraseCreation => (8, 4, 16),
            ContributionType::ProverbCreation => (8, 4, 16),
            ContributionType::CommentCreation => (1, 0, 2),
            ContributionType::ForumPostCreation => (2, 1, 4),
            ContributionType::ExampleAddition => (5, 2, 10),
            ContributionType::TranslationAddition => (5, 2, 10),
            ContributionType::VerifiedCorrection => (3, 1, 6),
            ContributionType::ReportConfirmed => (2, 1, 4),
        };
        PointRange { default, min, max }
    }

    /// The entry recorded when an item of `content_type` is first submitted.
    pub fn creation_for(content_type: ContentType) -> Self {
        match content_type {
            ContentType::Word => ContributionType::WordCreation,
            ContentType::Phrase => ContributionType::PhraseCreation,
            ContentType::Proverb => ContributionType::ProverbCreation,
            ContentType::Comment => ContributionType::CommentCreation,
            ContentType::ForumPost => ContributionType::ForumPostCreation,
        }
    }

    pub fn is_creation(&self) -> bool {
        matches!(
            self,
            ContributionType::WordCreation
                | ContributionType::PhraseCreation
                | ContributionType::ProverbCreation
                | ContributionType::CommentCreation
                | ContributionType::ForumPostCreation
        )
    }
}

string_enum! {
    pub enum ContributionStatus {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
        NeedsReview => "needs_review",
    }
}

impl ContributionStatus {
    /// Whether a reviewer may still change the status.
    pub fn is_reviewable(&self) -> bool {
        matches!(self, ContributionStatus::Pending | ContributionStatus::NeedsReview)
    }
}

string_enum! {
    pub enum ReviewDecision {
        Approve => "approve",
        Reject => "reject",
        NeedsReview => "needs_review",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributionEntry {
    pub id: i64,
    pub user_id: i64,
    pub contribution_type: ContributionType,
    pub content: Option<ContentRef>,
    pub base_points: i64,
    pub points_earned: i64,
    pub quality_score: Option<f64>,
    pub status: ContributionStatus,
    pub reviewer_id: Option<i64>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub version: i64,
}

#[derive(Debug, Clone)]
pub struct NewContribution {
    pub user_id: i64,
    pub contribution_type: ContributionType,
    pub content: Option<ContentRef>,
    pub base_points: i64,
    pub created_at: DateTime<Utc>,
}

/// Half-open time window `[from, to)` over review time; `None` is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardWindow {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user_id: i64,
    pub points: i64,
    pub contributions: i64,
}
