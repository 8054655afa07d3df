//! In-memory conversation store

use async_trait::async_trait;
use dashmap::DashMap;

use crate::domain::{AuditRecord, Conversation};
use crate::repositories::{ConversationStore, StoreError};

#[derive(Default)]
pub struct MemoryConversationStore {
    conversations: DashMap<String, Vec<Conversation>>,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversation_count(&self, user_id: &str) -> usize {
        self.conversations.get(user_id).map_or(0, |list| list.len())
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn append_exchange(&self, record: &AuditRecord) -> Result<(), StoreError> {
        let mut list = self.conversations.entry(record.user_id.clone()).or_default();
        let latest = list
            .iter_mut()
            .max_by_key(|conversation| conversation.updated_at);

        match latest {
            Some(conversation) => conversation.append(record),
            None => {
                let mut conversation = Conversation::open(&record.user_id);
                conversation.append(record);
                list.push(conversation);
            }
        }
        Ok(())
    }

    async fn latest_conversation(&self, user_id: &str) -> Result<Option<Conversation>, StoreError> {
        Ok(self.conversations.get(user_id).and_then(|list| {
            list.iter()
                .max_by_key(|conversation| conversation.updated_at)
                .cloned()
        }))
    }
}
