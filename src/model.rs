use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub username: String,
    #[serde(default, rename = "img", alias = "avatarUrl", skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// A comment as the server stores it. Never mutated locally; the only way
/// one changes is a delete followed by a re-fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(rename = "desc", alias = "body")]
    pub body: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "user", alias = "author")]
    pub author: Author,
}

/// Locally built stand-in for a comment whose create request is in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingComment {
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub author: Author,
}

impl PendingComment {
    pub fn new(body: impl Into<String>, viewer: &Viewer, now: DateTime<Utc>) -> Self {
        Self {
            body: body.into(),
            created_at: now,
            author: viewer.as_author(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEntry {
    Pending(PendingComment),
    Server(Comment),
}

impl FeedEntry {
    pub fn is_pending(&self) -> bool {
        matches!(self, FeedEntry::Pending(_))
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            FeedEntry::Pending(_) => None,
            FeedEntry::Server(comment) => Some(comment.id.as_str()),
        }
    }

    pub fn body(&self) -> &str {
        match self {
            FeedEntry::Pending(pending) => &pending.body,
            FeedEntry::Server(comment) => &comment.body,
        }
    }

    pub fn author(&self) -> &Author {
        match self {
            FeedEntry::Pending(pending) => &pending.author,
            FeedEntry::Server(comment) => &comment.author,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            FeedEntry::Pending(pending) => pending.created_at,
            FeedEntry::Server(comment) => comment.created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    #[default]
    Member,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = std::convert::Infallible;

    // Anything that is not explicitly "admin" is a member.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim().eq_ignore_ascii_case("admin") {
            Ok(Role::Admin)
        } else {
            Ok(Role::Member)
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_default()
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    pub username: String,
    pub role: Role,
    pub avatar_url: Option<String>,
}

impl Viewer {
    pub fn new(username: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            role,
            avatar_url: None,
        }
    }

    pub fn with_avatar(mut self, avatar_url: impl Into<String>) -> Self {
        self.avatar_url = Some(avatar_url.into());
        self
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn as_author(&self) -> Author {
        Author {
            username: self.username.clone(),
            avatar_url: self.avatar_url.clone(),
        }
    }
}

/// Whether `viewer` may delete `comment`: the author may, an admin may,
/// nobody else may. Signed-out viewers never can.
pub fn can_delete(viewer: Option<&Viewer>, comment: &Comment) -> bool {
    match viewer {
        Some(viewer) => viewer.username == comment.author.username || viewer.is_admin(),
        None => false,
    }
}
