//! PostgreSQL conversation store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::{debug, error};
use uuid::Uuid;

use aiproxy_core::domain::{AuditRecord, ContentPart, Conversation, Message, StoredMessage};
use aiproxy_core::repositories::{ConversationStore, StoreError};

pub struct PgConversationStore {
    pool: PgPool,
}

impl PgConversationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ConversationRow {
    id: Uuid,
    user_id: String,
    summaries: Json<Vec<Message>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct MessageRow {
    id: Uuid,
    conversation_id: Uuid,
    role: String,
    content: Json<Vec<ContentPart>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<MessageRow> for StoredMessage {
    type Error = StoreError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        Ok(StoredMessage {
            id: row.id,
            conversation_id: row.conversation_id,
            role: row.role.parse().map_err(StoreError::Database)?,
            content: row.content.0,
            created_at: row.created_at,
        })
    }
}

fn db_error(context: &'static str) -> impl Fn(sqlx::Error) -> StoreError {
    move |e| {
        error!("Database error {}: {}", context, e);
        StoreError::Database(e.to_string())
    }
}

#[async_trait]
impl ConversationStore for PgConversationStore {
    async fn append_exchange(&self, record: &AuditRecord) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_error("opening transaction"))?;

        // 1. Latest conversation of the user, or a new one
        let existing: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM conversations
            WHERE user_id = $1
            ORDER BY updated_at DESC
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(&record.user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error("finding latest conversation"))?;

        let conversation_id = match existing {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4();
                sqlx::query(
                    r#"
                    INSERT INTO conversations (id, user_id, summaries, created_at, updated_at)
                    VALUES ($1, $2, '[]'::jsonb, now(), now())
                    "#,
                )
                .bind(id)
                .bind(&record.user_id)
                .execute(&mut *tx)
                .await
                .map_err(db_error("creating conversation"))?;
                debug!(user_id = %record.user_id, conversation_id = %id, "Opened conversation");
                id
            }
        };

        // 2. Messages
        for message in &record.messages {
            sqlx::query(
                r#"
                INSERT INTO conversation_messages (id, conversation_id, role, content, created_at)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(conversation_id)
            .bind(message.role.as_str())
            .bind(Json(&message.content))
            .bind(record.recorded_at)
            .execute(&mut *tx)
            .await
            .map_err(db_error("inserting message"))?;
        }

        // 3. Touch, and push the summary if one was produced
        match &record.summary {
            Some(summary) => {
                sqlx::query(
                    r#"
                    UPDATE conversations
                    SET updated_at = now(), summaries = summaries || jsonb_build_array($2::jsonb)
                    WHERE id = $1
                    "#,
                )
                .bind(conversation_id)
                .bind(Json(summary))
                .execute(&mut *tx)
                .await
                .map_err(db_error("appending summary"))?;
            }
            None => {
                sqlx::query("UPDATE conversations SET updated_at = now() WHERE id = $1")
                    .bind(conversation_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_error("touching conversation"))?;
            }
        }

        tx.commit().await.map_err(db_error("committing exchange"))?;
        Ok(())
    }

    async fn latest_conversation(&self, user_id: &str) -> Result<Option<Conversation>, StoreError> {
        let row: Option<ConversationRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, summaries, created_at, updated_at
            FROM conversations
            WHERE user_id = $1
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("finding latest conversation"))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let messages: Vec<MessageRow> = sqlx::query_as(
            r#"
            SELECT id, conversation_id, role, content, created_at
            FROM conversation_messages
            WHERE conversation_id = $1
            ORDER BY seq
            "#,
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("loading messages"))?;

        Ok(Some(Conversation {
            id: row.id,
            user_id: row.user_id,
            summaries: row.summaries.0,
            messages: messages
                .into_iter()
                .map(StoredMessage::try_from)
                .collect::<Result<_, _>>()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }))
    }
}
