//! Conversation engine: quota, rolling context, summarization, audit

use std::sync::Arc;
use std::time::Duration;

use aiproxy_shared::AppConfig;
use serde::de::DeserializeOwned;
use tracing::{info, instrument, warn};

use crate::domain::{
    AuditRecord, CompletionRequest, CompletionResponse, ContentPart, Message, Role,
    ServiceTurnRequest, TokenUsage, TurnReply,
};
use crate::error::EngineError;
use crate::repositories::{CacheStore, Expiry};
use crate::services::audit::AuditWriter;
use crate::services::completion::{CompletionBackend, CompletionError};

/// Context length at which the window is folded into the summary.
pub const SUMMARY_THRESHOLD: usize = 10;

const USER_TEMPERATURE: f32 = 0.7;
const USER_TOP_P: f32 = 0.95;
const USER_MAX_TOKENS: u32 = 4096;

const SUMMARY_TEMPERATURE: f32 = 0.4;
const SUMMARY_TOP_P: f32 = 0.65;
const SUMMARY_MAX_TOKENS: u32 = 100;
const SUMMARY_BRIEF: &str = "Summarize this conversation into key points, keeping essential details without repeating previously given information.";

pub fn context_key(user_id: &str) -> String {
    format!("context-{}", user_id)
}

pub fn summary_key(user_id: &str) -> String {
    format!("summary-{}", user_id)
}

pub fn token_usage_key(user_id: &str) -> String {
    format!("token-usage-{}", user_id)
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub token_limit: u64,
    /// Quota window, applied on the first budget write only.
    pub token_lifetime: Duration,
    /// Bound on one turn including a chained summarization call.
    pub turn_deadline: Duration,
    pub model: Option<String>,
}

impl EngineConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            token_limit: config.openai.token_limit,
            token_lifetime: Duration::from_secs(config.openai.token_lifetime_secs),
            turn_deadline: Duration::from_secs(config.engine.turn_deadline_secs),
            model: config.openai.model.clone(),
        }
    }
}

/// Executes user and service exchanges against the completion backend.
///
/// Per-user state lives in the cache only. Concurrent turns from one user are
/// not serialized: each does its own read-modify-write and the last write wins.
pub struct ConversationEngine {
    cache: Arc<dyn CacheStore>,
    backend: Arc<dyn CompletionBackend>,
    audit: AuditWriter,
    config: EngineConfig,
}

impl ConversationEngine {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        backend: Arc<dyn CompletionBackend>,
        audit: AuditWriter,
        config: EngineConfig,
    ) -> Self {
        Self {
            cache,
            backend,
            audit,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[instrument(skip_all, fields(user_id = %user_id))]
    pub async fn handle_user_turn(
        &self,
        user_id: &str,
        content: Vec<ContentPart>,
    ) -> Result<TurnReply, EngineError> {
        let deadline = self.config.turn_deadline;
        tokio::time::timeout(deadline, self.run_user_turn(user_id, content))
            .await
            .map_err(|_| {
                warn!("User turn exceeded deadline of {:?}", deadline);
                EngineError::DeadlineExceeded(deadline)
            })?
    }

    #[instrument(skip_all, fields(service = %service))]
    pub async fn handle_service_turn(
        &self,
        service: &str,
        request: ServiceTurnRequest,
    ) -> Result<TurnReply, EngineError> {
        let deadline = self.config.turn_deadline;
        let payload = CompletionRequest {
            model: request.model.or_else(|| self.config.model.clone()),
            messages: request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            top_p: request.top_p,
        };

        let response = tokio::time::timeout(deadline, self.backend.complete(payload))
            .await
            .map_err(|_| EngineError::DeadlineExceeded(deadline))??;
        let content = reply_content(&response)?;

        info!(
            user_id = %service,
            token_usage = response.usage.total_tokens,
            "Token usage"
        );

        Ok(TurnReply {
            user_id: service.to_string(),
            content,
            response,
        })
    }

    #[instrument(skip_all, fields(user_id = %user_id))]
    pub async fn get_usage(&self, user_id: &str) -> Result<TokenUsage, EngineError> {
        let used = self.read_usage(&token_usage_key(user_id)).await?.unwrap_or(0);
        Ok(TokenUsage::new(self.config.token_limit, used))
    }

    #[instrument(skip_all, fields(user_id = %user_id))]
    pub async fn clear_context(&self, user_id: &str) -> Result<(), EngineError> {
        self.cache.delete(&context_key(user_id)).await?;
        self.cache.delete(&summary_key(user_id)).await?;
        info!("Conversation context cleared");
        Ok(())
    }

    async fn run_user_turn(
        &self,
        user_id: &str,
        content: Vec<ContentPart>,
    ) -> Result<TurnReply, EngineError> {
        let context_key = context_key(user_id);
        let summary_key = summary_key(user_id);
        let usage_key = token_usage_key(user_id);

        // 1. Quota gate
        let previous_usage = self.read_usage(&usage_key).await?;
        if let Some(used) = previous_usage {
            if used > self.config.token_limit {
                let retry_after = self.cache.ttl(&usage_key).await?.unwrap_or_default();
                self.cache.delete(&context_key).await?;
                warn!(used, limit = self.config.token_limit, "Token usage limit reached");
                return Err(EngineError::QuotaExceeded { used, retry_after });
            }
        }

        // 2. Context assembly: summary, then context, then the new turn
        let user_message = Message::new(Role::User, content);
        let mut context: Vec<Message> = self.read_json(&context_key).await?.unwrap_or_default();
        context.push(user_message.clone());
        let mut summary: Vec<Message> = self.read_json(&summary_key).await?.unwrap_or_default();

        let mut messages = Vec::with_capacity(summary.len() + context.len());
        messages.extend(summary.iter().cloned());
        messages.extend(context.iter().cloned());

        // 3. Completion
        let request = CompletionRequest {
            model: self.config.model.clone(),
            messages,
            temperature: USER_TEMPERATURE,
            max_tokens: USER_MAX_TOKENS,
            top_p: USER_TOP_P,
        };
        let response = self.backend.complete(request).await?;
        let reply = reply_content(&response)?;

        // 4. Assistant reply joins the window
        let assistant_message = Message::text(Role::Assistant, reply.clone());
        context.push(assistant_message.clone());

        // 5. Fold the window into the summary once it is full
        let mut consumed = response.usage.total_tokens;
        let mut new_summary = None;
        if context.len() >= SUMMARY_THRESHOLD {
            let (entry, summary_tokens) = self.summarize(&context).await?;
            consumed += summary_tokens;
            summary.push(entry.clone());
            self.write_json(&summary_key, &summary).await?;
            self.cache.delete(&context_key).await?;
            info!(summary_entries = summary.len(), "Conversation window summarized");
            new_summary = Some(entry);
        } else {
            self.write_json(&context_key, &context).await?;
        }

        // 6. Budget: the window's clock starts on the first write only
        let expiry = match previous_usage {
            Some(_) => Expiry::KeepExisting,
            None => Expiry::After(self.config.token_lifetime),
        };
        let total = previous_usage.unwrap_or(0) + consumed;
        self.cache.set(&usage_key, total.to_string(), expiry).await?;

        info!(
            prompt_tokens = response.usage.prompt_tokens,
            completion_tokens = response.usage.completion_tokens,
            token_usage = consumed,
            total_usage = total,
            "Token usage"
        );

        // 7. Durable copy, off the request path
        self.audit.submit(AuditRecord::new(
            user_id,
            vec![user_message, assistant_message],
            new_summary,
        ));

        Ok(TurnReply {
            user_id: user_id.to_string(),
            content: reply,
            response,
        })
    }

    async fn summarize(&self, conversation: &[Message]) -> Result<(Message, u64), EngineError> {
        let prompt = format!("{} conversation: {}", SUMMARY_BRIEF, format_conversation(conversation));
        let request = CompletionRequest {
            model: self.config.model.clone(),
            messages: vec![Message::text(Role::System, prompt)],
            temperature: SUMMARY_TEMPERATURE,
            max_tokens: SUMMARY_MAX_TOKENS,
            top_p: SUMMARY_TOP_P,
        };
        let response = self.backend.complete(request).await?;
        let content = reply_content(&response)?;
        Ok((Message::text(Role::System, content), response.usage.total_tokens))
    }

    async fn read_usage(&self, key: &str) -> Result<Option<u64>, EngineError> {
        match self.cache.get(key).await? {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Some)
                .map_err(|e| EngineError::CorruptCacheEntry {
                    key: key.to_string(),
                    reason: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, EngineError> {
        match self.cache.get(key).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| EngineError::CorruptCacheEntry {
                    key: key.to_string(),
                    reason: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    async fn write_json(&self, key: &str, messages: &[Message]) -> Result<(), EngineError> {
        let raw = serde_json::to_string(messages).map_err(|e| EngineError::CorruptCacheEntry {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        self.cache.set(key, raw, Expiry::Never).await?;
        Ok(())
    }
}

fn reply_content(response: &CompletionResponse) -> Result<String, EngineError> {
    response
        .first_content()
        .map(str::to_string)
        .ok_or(EngineError::CompletionBackend(CompletionError::EmptyChoices))
}

/// `role: text` lines, first text part of each entry.
fn format_conversation(conversation: &[Message]) -> String {
    conversation
        .iter()
        .map(|entry| format!("{}: {}\n", entry.role.as_str(), entry.first_text().unwrap_or_default()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Choice, ChoiceMessage, Conversation, TokenCounts};
    use crate::memory::{MemoryCache, MemoryConversationStore};
    use crate::repositories::{ConversationStore, StoreError};
    use crate::services::completion::MockCompletionBackend;

    const USER: &str = "ana@example.com";

    fn response(content: &str, total_tokens: u64) -> CompletionResponse {
        CompletionResponse {
            id: "chatcmpl-1".into(),
            object: "chat.completion".into(),
            created: 1_717_000_000.0,
            model: "gpt-4o".into(),
            choices: vec![Choice {
                index: 0,
                message: ChoiceMessage {
                    role: "assistant".into(),
                    content: content.into(),
                },
                finish_reason: Some("stop".into()),
            }],
            usage: TokenCounts {
                completion_tokens: total_tokens / 2,
                prompt_tokens: total_tokens - total_tokens / 2,
                total_tokens,
            },
        }
    }

    fn config() -> EngineConfig {
        EngineConfig {
            token_limit: 1_000,
            token_lifetime: Duration::from_secs(3_600),
            turn_deadline: Duration::from_secs(5),
            model: None,
        }
    }

    struct Harness {
        engine: ConversationEngine,
        cache: Arc<MemoryCache>,
        store: Arc<MemoryConversationStore>,
    }

    fn harness(backend: MockCompletionBackend) -> Harness {
        let cache = Arc::new(MemoryCache::new());
        let store = Arc::new(MemoryConversationStore::new());
        let audit = AuditWriter::spawn(store.clone(), 1);
        let engine = ConversationEngine::new(cache.clone(), Arc::new(backend), audit, config());
        Harness { engine, cache, store }
    }

    fn text(body: &str) -> Vec<ContentPart> {
        vec![ContentPart::text(body)]
    }

    async fn cached_messages(cache: &MemoryCache, key: &str) -> Option<Vec<Message>> {
        cache
            .get(key)
            .await
            .unwrap()
            .map(|raw| serde_json::from_str(&raw).unwrap())
    }

    #[tokio::test]
    async fn test_first_turn_creates_context_and_budget() {
        let mut backend = MockCompletionBackend::new();
        backend
            .expect_complete()
            .times(1)
            .withf(|req| {
                req.messages.len() == 1
                    && req.temperature == USER_TEMPERATURE
                    && req.top_p == USER_TOP_P
                    && req.max_tokens == USER_MAX_TOKENS
            })
            .returning(|_| Ok(response("hello there", 42)));
        let h = harness(backend);

        let reply = h.engine.handle_user_turn(USER, text("hi")).await.unwrap();

        assert_eq!(reply.content, "hello there");
        assert_eq!(reply.user_id, USER);
        assert_eq!(reply.response.usage.total_tokens, 42);

        let context = cached_messages(&h.cache, &context_key(USER)).await.unwrap();
        assert_eq!(context.len(), 2);
        assert_eq!(context[0], Message::text(Role::User, "hi"));
        assert_eq!(context[1], Message::text(Role::Assistant, "hello there"));

        let usage = h.cache.get(&token_usage_key(USER)).await.unwrap();
        assert_eq!(usage.as_deref(), Some("42"));
        let ttl = h.cache.ttl(&token_usage_key(USER)).await.unwrap().unwrap();
        assert!(ttl > Duration::from_secs(3_590));
    }

    #[tokio::test]
    async fn test_over_limit_rejects_and_drops_context() {
        let mut backend = MockCompletionBackend::new();
        backend.expect_complete().times(0);
        let h = harness(backend);

        h.cache
            .set(&token_usage_key(USER), "1001".into(), Expiry::After(Duration::from_secs(120)))
            .await
            .unwrap();
        h.cache
            .set(&context_key(USER), "[]".into(), Expiry::Never)
            .await
            .unwrap();

        let err = h.engine.handle_user_turn(USER, text("hi")).await.unwrap_err();

        match err {
            EngineError::QuotaExceeded { used, retry_after } => {
                assert_eq!(used, 1001);
                assert!(retry_after <= Duration::from_secs(120));
                assert!(retry_after > Duration::from_secs(110));
            }
            other => panic!("expected QuotaExceeded, got {:?}", other),
        }
        assert_eq!(h.cache.get(&context_key(USER)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_budget_at_limit_still_allowed() {
        let mut backend = MockCompletionBackend::new();
        backend
            .expect_complete()
            .times(1)
            .returning(|_| Ok(response("ok", 5)));
        let h = harness(backend);
        h.cache
            .set(&token_usage_key(USER), "1000".into(), Expiry::After(Duration::from_secs(300)))
            .await
            .unwrap();

        h.engine.handle_user_turn(USER, text("hi")).await.unwrap();

        assert_eq!(
            h.cache.get(&token_usage_key(USER)).await.unwrap().as_deref(),
            Some("1005")
        );
        // window clock untouched by the update
        let ttl = h.cache.ttl(&token_usage_key(USER)).await.unwrap().unwrap();
        assert!(ttl <= Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_payload_orders_summary_then_context_then_turn() {
        let mut backend = MockCompletionBackend::new();
        backend
            .expect_complete()
            .times(1)
            .withf(|req| {
                let roles: Vec<Role> = req.messages.iter().map(|m| m.role).collect();
                roles == vec![Role::System, Role::User, Role::Assistant, Role::User]
                    && req.messages[3].first_text() == Some("third")
            })
            .returning(|_| Ok(response("fourth", 10)));
        let h = harness(backend);

        let summary = vec![Message::text(Role::System, "earlier points")];
        let context = vec![
            Message::text(Role::User, "first"),
            Message::text(Role::Assistant, "second"),
        ];
        h.cache
            .set(&summary_key(USER), serde_json::to_string(&summary).unwrap(), Expiry::Never)
            .await
            .unwrap();
        h.cache
            .set(&context_key(USER), serde_json::to_string(&context).unwrap(), Expiry::Never)
            .await
            .unwrap();

        h.engine.handle_user_turn(USER, text("third")).await.unwrap();

        let context = cached_messages(&h.cache, &context_key(USER)).await.unwrap();
        assert_eq!(context.len(), 4);
    }

    #[tokio::test]
    async fn test_full_window_is_summarized() {
        let mut backend = MockCompletionBackend::new();
        let mut seq = mockall::Sequence::new();
        backend
            .expect_complete()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(response("reply five", 30)));
        backend
            .expect_complete()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|req| {
                req.messages.len() == 1
                    && req.messages[0].role == Role::System
                    && req.temperature == SUMMARY_TEMPERATURE
                    && req.top_p == SUMMARY_TOP_P
                    && req.max_tokens == SUMMARY_MAX_TOKENS
                    && req.messages[0]
                        .first_text()
                        .is_some_and(|t| t.starts_with(SUMMARY_BRIEF) && t.contains("user: question 5\n"))
            })
            .returning(|_| Ok(response("condensed", 7)));
        let h = harness(backend);

        let mut context = Vec::new();
        for i in 1..=4 {
            context.push(Message::text(Role::User, format!("question {}", i)));
            context.push(Message::text(Role::Assistant, format!("reply {}", i)));
        }
        h.cache
            .set(&context_key(USER), serde_json::to_string(&context).unwrap(), Expiry::Never)
            .await
            .unwrap();

        h.engine.handle_user_turn(USER, text("question 5")).await.unwrap();

        assert_eq!(h.cache.get(&context_key(USER)).await.unwrap(), None);
        let summary = cached_messages(&h.cache, &summary_key(USER)).await.unwrap();
        assert_eq!(summary, vec![Message::text(Role::System, "condensed")]);
        assert_eq!(
            h.cache.get(&token_usage_key(USER)).await.unwrap().as_deref(),
            Some("37")
        );
    }

    #[tokio::test]
    async fn test_upstream_rate_limit_is_distinct_and_leaves_state() {
        let mut backend = MockCompletionBackend::new();
        backend
            .expect_complete()
            .times(1)
            .returning(|_| Err(CompletionError::RateLimited));
        let h = harness(backend);

        let err = h.engine.handle_user_turn(USER, text("hi")).await.unwrap_err();

        assert!(matches!(err, EngineError::UpstreamRateLimited));
        assert_eq!(h.cache.get(&context_key(USER)).await.unwrap(), None);
        assert_eq!(h.cache.get(&token_usage_key(USER)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_backend_failure_is_wrapped() {
        let mut backend = MockCompletionBackend::new();
        backend.expect_complete().returning(|_| {
            Err(CompletionError::Status {
                status: 500,
                body: "boom".into(),
            })
        });
        let h = harness(backend);

        let err = h.engine.handle_user_turn(USER, text("hi")).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::CompletionBackend(CompletionError::Status { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_corrupt_budget_entry_surfaces() {
        let mut backend = MockCompletionBackend::new();
        backend.expect_complete().times(0);
        let h = harness(backend);
        h.cache
            .set(&token_usage_key(USER), "lots".into(), Expiry::Never)
            .await
            .unwrap();

        let err = h.engine.handle_user_turn(USER, text("hi")).await.unwrap_err();
        assert!(matches!(err, EngineError::CorruptCacheEntry { .. }));
    }

    #[tokio::test]
    async fn test_exchange_reaches_durable_store() {
        let mut backend = MockCompletionBackend::new();
        backend
            .expect_complete()
            .returning(|_| Ok(response("stored reply", 3)));
        let h = harness(backend);

        h.engine.handle_user_turn(USER, text("remember me")).await.unwrap();

        let mut conversation = None;
        for _ in 0..50 {
            conversation = h.store.latest_conversation(USER).await.unwrap();
            if conversation.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let conversation = conversation.expect("audit record was not persisted");
        assert_eq!(conversation.messages.len(), 2);
        assert_eq!(conversation.messages[0].role, Role::User);
        assert_eq!(conversation.messages[1].role, Role::Assistant);
        assert!(conversation.summaries.is_empty());
    }

    /// Store that rejects every write and counts the attempts.
    #[derive(Default)]
    struct FailingStore {
        attempts: std::sync::atomic::AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ConversationStore for FailingStore {
        async fn append_exchange(&self, _record: &AuditRecord) -> Result<(), StoreError> {
            self.attempts
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Err(StoreError::Database("connection reset".into()))
        }

        async fn latest_conversation(&self, _user_id: &str) -> Result<Option<Conversation>, StoreError> {
            Err(StoreError::Database("connection reset".into()))
        }
    }

    #[tokio::test]
    async fn test_store_failure_never_reaches_the_caller() {
        let mut backend = MockCompletionBackend::new();
        backend
            .expect_complete()
            .times(1)
            .returning(|_| Ok(response("still answered", 12)));
        let cache = Arc::new(MemoryCache::new());
        let store = Arc::new(FailingStore::default());
        let engine = ConversationEngine::new(
            cache.clone(),
            Arc::new(backend),
            AuditWriter::spawn(store.clone(), 1),
            config(),
        );

        let reply = engine.handle_user_turn(USER, text("hi")).await.unwrap();
        assert_eq!(reply.content, "still answered");

        for _ in 0..50 {
            if store.attempts.load(std::sync::atomic::Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(store.attempts.load(std::sync::atomic::Ordering::SeqCst), 1);

        let context = cached_messages(&cache, &context_key(USER)).await.unwrap();
        assert_eq!(context.len(), 2);
        assert_eq!(
            cache.get(&token_usage_key(USER)).await.unwrap().as_deref(),
            Some("12")
        );
    }

    fn service_request() -> ServiceTurnRequest {
        ServiceTurnRequest {
            model: None,
            temperature: 0.2,
            max_tokens: 32,
            top_p: 0.9,
            messages: vec![Message::text(Role::User, "ping")],
        }
    }

    #[tokio::test]
    async fn test_service_turn_wraps_backend_status() {
        let mut backend = MockCompletionBackend::new();
        backend.expect_complete().times(1).returning(|_| {
            Err(CompletionError::Status {
                status: 500,
                body: "upstream exploded".into(),
            })
        });
        let h = harness(backend);

        let err = h
            .engine
            .handle_service_turn("billing", service_request())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::CompletionBackend(CompletionError::Status { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_service_turn_rate_limit_is_distinct() {
        let mut backend = MockCompletionBackend::new();
        backend
            .expect_complete()
            .times(1)
            .returning(|_| Err(CompletionError::RateLimited));
        let h = harness(backend);

        let err = h
            .engine
            .handle_service_turn("billing", service_request())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::UpstreamRateLimited));
        assert!(h.cache.is_empty());
    }

    #[tokio::test]
    async fn test_service_turn_uses_caller_parameters_and_skips_cache() {
        let mut backend = MockCompletionBackend::new();
        backend
            .expect_complete()
            .times(1)
            .withf(|req| {
                req.temperature == 0.1
                    && req.max_tokens == 64
                    && req.top_p == 0.5
                    && req.model.as_deref() == Some("gpt-4o-mini")
            })
            .returning(|_| Ok(response("service reply", 9)));
        let h = harness(backend);

        let reply = h
            .engine
            .handle_service_turn(
                "billing",
                ServiceTurnRequest {
                    model: Some("gpt-4o-mini".into()),
                    temperature: 0.1,
                    max_tokens: 64,
                    top_p: 0.5,
                    messages: vec![Message::text(Role::User, "classify this")],
                },
            )
            .await
            .unwrap();

        assert_eq!(reply.user_id, "billing");
        assert_eq!(reply.content, "service reply");
        assert!(h.cache.is_empty());
    }

    #[tokio::test]
    async fn test_usage_reports_zero_on_miss_and_warns_past_half() {
        let h = harness(MockCompletionBackend::new());

        let usage = h.engine.get_usage(USER).await.unwrap();
        assert_eq!(usage, TokenUsage { token_limit: 1_000, token_usage: 0, warning: false });

        h.cache
            .set(&token_usage_key(USER), "600".into(), Expiry::Never)
            .await
            .unwrap();
        let usage = h.engine.get_usage(USER).await.unwrap();
        assert_eq!(usage.token_usage, 600);
        assert!(usage.warning);
    }

    #[tokio::test]
    async fn test_clear_context_removes_context_and_summary() {
        let h = harness(MockCompletionBackend::new());
        h.cache.set(&context_key(USER), "[]".into(), Expiry::Never).await.unwrap();
        h.cache.set(&summary_key(USER), "[]".into(), Expiry::Never).await.unwrap();
        h.cache.set(&token_usage_key(USER), "5".into(), Expiry::Never).await.unwrap();

        h.engine.clear_context(USER).await.unwrap();
        // idempotent
        h.engine.clear_context(USER).await.unwrap();

        assert_eq!(h.cache.get(&context_key(USER)).await.unwrap(), None);
        assert_eq!(h.cache.get(&summary_key(USER)).await.unwrap(), None);
        assert_eq!(h.cache.get(&token_usage_key(USER)).await.unwrap().as_deref(), Some("5"));
    }

    #[test]
    fn test_format_conversation_lines() {
        let conversation = vec![
            Message::text(Role::User, "hi"),
            Message::new(Role::User, vec![ContentPart::image("https://img.example/x.png")]),
            Message::text(Role::Assistant, "hello"),
        ];
        assert_eq!(
            format_conversation(&conversation),
            "user: hi\nuser: \nassistant: hello\n"
        );
    }
}
