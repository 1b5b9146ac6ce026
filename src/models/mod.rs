use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Raised when a stored or submitted string does not name a known enum variant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind} value '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Declares a closed, string-backed enum that round-trips through serde and
/// SQLite TEXT columns using the same snake_case spelling.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $text)] $variant ),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $text ),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::models::UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $text => Ok($name::$variant), )+
                    other => Err($crate::models::UnknownVariant {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl rusqlite::types::ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(self.as_str().into())
            }
        }

        impl rusqlite::types::FromSql for $name {
            fn column_result(value: rusqlite::types::ValueRef<'_>) -> rusqlite::types::FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e| rusqlite::types::FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

/// Identity used for actions the engine performs on its own behalf (expiry sweeps).
pub const SYSTEM_ACTOR_ID: i64 = 0;

string_enum! {
    /// Authorization level supplied by the external auth collaborator.
    pub enum Role {
        Admin => "admin",
        Moderator => "moderator",
        Expert => "expert",
        Contributor => "contributor",
        User => "user",
    }
}

impl Role {
    /// Ordering used for "higher-privileged" comparisons.
    pub fn rank(&self) -> u8 {
        match self {
            Role::Admin => 4,
            Role::Moderator => 3,
            Role::Expert => 2,
            Role::Contributor => 1,
            Role::User => 0,
        }
    }

    /// Roles allowed to pass judgement on content.
    pub fn is_privileged(&self) -> bool {
        matches!(self, Role::Admin | Role::Moderator | Role::Expert)
    }
}

string_enum! {
    pub enum ContentType {
        Word => "word",
        Phrase => "phrase",
        Proverb => "proverb",
        Comment => "comment",
        ForumPost => "forum_post",
    }
}

string_enum! {
    pub enum Severity {
        Low => "low",
        Medium => "medium",
        High => "high",
        Critical => "critical",
    }
}

/// The caller on whose behalf an intent runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorContext {
    pub user_id: i64,
    pub role: Role,
    /// Set only by [`ActorContext::system`]; never taken from a request.
    #[serde(skip)]
    system: bool,
}

impl ActorContext {
    pub fn new(user_id: i64, role: Role) -> Self {
        Self { user_id, role, system: false }
    }

    /// The engine's own identity, used by the expiry sweep.
    pub fn system() -> Self {
        Self { user_id: SYSTEM_ACTOR_ID, role: Role::Admin, system: true }
    }

    pub fn is_system(&self) -> bool {
        self.system
    }
}

/// Polymorphic pointer at any moderatable entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentRef {
    pub content_type: ContentType,
    pub content_id: i64,
}

impl ContentRef {
    pub fn new(content_type: ContentType, content_id: i64) -> Self {
        Self { content_type, content_id }
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.content_type, self.content_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub is_active: bool,
    pub warning_count: i64,
    pub points: i64,
    pub contribution_count: i64,
    pub created_at: DateTime<Utc>,
    pub version: i64,
}

pub mod content_models;
pub mod contribution_models;
pub mod moderation_models;
pub mod report_models;
pub mod db_operations;
