//! Identity and conversation-turn domain types.
//!
//! These are the value objects that flow through the request pipeline:
//! a user (identified by [`Identity`]) sends a question, the bot answers,
//! and both are stored as a pair of [`ConversationTurn`]s.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque key identifying a requester (the chat platform's user id).
///
/// Partition key for both rate limiting and conversation history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity(pub u64);

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Identity {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// The role of a turn's author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person talking to the bot
    User,
    /// The bot itself
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// A single stored message of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Who the conversation belongs to
    pub identity: Identity,

    /// When the turn was written
    pub timestamp: DateTime<Utc>,

    /// Who authored the content
    pub role: Role,

    /// The text content
    pub content: String,
}

impl ConversationTurn {
    /// Create a user turn stamped now.
    pub fn user(identity: Identity, content: impl Into<String>) -> Self {
        Self {
            identity,
            timestamp: Utc::now(),
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant turn stamped now.
    pub fn assistant(identity: Identity, content: impl Into<String>) -> Self {
        Self {
            identity,
            timestamp: Utc::now(),
            role: Role::Assistant,
            content: content.into(),
        }
    }
}
