use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ContentRef, ContentType};

string_enum! {
    /// Lifecycle stage of a moderatable item. Only `Validated` is publicly visible.
    pub enum ValidationState {
        Pending => "pending",
        Validated => "validated",
        Rejected => "rejected",
        Archived => "archived",
    }
}

/// Type-specific fields carried by each kind of content. The engine never
/// inspects these beyond deriving the content type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentPayload {
    Word {
        headword: String,
        definition: String,
        #[serde(default)]
        translations: Vec<String>,
    },
    Phrase {
        text: String,
        meaning: String,
    },
    Proverb {
        text: String,
        meaning: String,
        #[serde(default)]
        origin: Option<String>,
    },
    Comment {
        body: String,
        #[serde(default)]
        parent: Option<ContentRef>,
    },
    ForumPost {
        title: String,
        body: String,
    },
}

impl ContentPayload {
    pub fn content_type(&self) -> ContentType {
        match self {
            ContentPayload::Word { .. } => ContentType::Word,
            ContentPayload::Phrase { .. } => ContentType::Phrase,
            ContentPayload::Proverb { .. } => ContentType::Proverb,
            ContentPayload::Comment { .. } => ContentType::Comment,
            ContentPayload::ForumPost { .. } => ContentType::ForumPost,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: i64,
    pub content_type: ContentType,
    pub author_id: i64,
    pub validation_state: ValidationState,
    pub locked: bool,
    pub payload: ContentPayload,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i64,
}

impl ContentItem {
    pub fn content_ref(&self) -> ContentRef {
        ContentRef::new(self.content_type, self.id)
    }

    pub fn is_public(&self) -> bool {
        self.validation_state == ValidationState::Validated
    }
}

/// The capability set the validation state machine needs from any content.
pub trait Moderatable {
    fn content_ref(&self) -> ContentRef;
    fn validation_state(&self) -> ValidationState;
    fn set_validation_state(&mut self, state: ValidationState);
    fn author_id(&self) -> i64;
}

impl Moderatable for ContentItem {
    fn content_ref(&self) -> ContentRef {
        ContentItem::content_ref(self)
    }

    fn validation_state(&self) -> ValidationState {
        self.validation_state
    }

    fn set_validation_state(&mut self, state: ValidationState) {
        self.validation_state = state;
    }

    fn author_id(&self) -> i64 {
        self.author_id
    }
}

/// Append-only entry in a content item's validation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub id: i64,
    pub content: ContentRef,
    /// `None` only for the record written when the item is created.
    pub from_state: Option<ValidationState>,
    pub to_state: ValidationState,
    pub actor_id: i64,
    pub comment: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// A validation record before the store assigns its id.
#[derive(Debug, Clone)]
pub struct NewValidationRecord {
    pub content: ContentRef,
    pub from_state: Option<ValidationState>,
    pub to_state: ValidationState,
    pub actor_id: i64,
    pub comment: Option<String>,
    pub occurred_at: DateTime<Utc>,
}
