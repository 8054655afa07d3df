//! Turn results and durable conversation records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::completion::CompletionResponse;
use super::message::{ContentPart, Message, Role};

/// Outcome of one exchange. `user_id` is the caller: a user email or a service name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnReply {
    pub user_id: String,
    pub content: String,
    pub response: CompletionResponse,
}

/// Caller-controlled exchange for pre-authorized backend services.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServiceTurnRequest {
    #[serde(default)]
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub messages: Vec<Message>,
}

/// One exchange queued for the durable store.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditRecord {
    pub user_id: String,
    pub messages: Vec<Message>,
    pub summary: Option<Message>,
    pub recorded_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(user_id: impl Into<String>, messages: Vec<Message>, summary: Option<Message>) -> Self {
        Self {
            user_id: user_id.into(),
            messages,
            summary,
            recorded_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredMessage {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub role: Role,
    pub content: Vec<ContentPart>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conversation {
    pub id: Uuid,
    pub user_id: String,
    pub summaries: Vec<Message>,
    pub messages: Vec<StoredMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn open(user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            summaries: Vec::new(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Appends the record's messages and optional summary and bumps `updated_at`.
    pub fn append(&mut self, record: &AuditRecord) {
        for message in &record.messages {
            self.messages.push(StoredMessage {
                id: Uuid::new_v4(),
                conversation_id: self.id,
                role: message.role,
                content: message.content.clone(),
                created_at: record.recorded_at,
            });
        }
        if let Some(summary) = &record.summary {
            self.summaries.push(summary.clone());
        }
        self.updated_at = Utc::now();
    }
}
