//! Request and response bodies

use serde::{Deserialize, Serialize};
use validator::Validate;

use aiproxy_core::domain::{
    ContentPart, Message, ServiceTurnRequest, TokenCounts, TokenUsage, TurnReply,
};
use aiproxy_security::VerifiedIdentity;

#[derive(Debug, Deserialize, Validate)]
pub struct PromptRequest {
    #[validate(length(min = 1, message = "content must not be empty"))]
    pub content: Vec<ContentPart>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ServiceTurnDto {
    #[serde(default)]
    pub model: Option<String>,
    #[validate(range(min = 0.0, max = 2.0))]
    pub temperature: f32,
    #[validate(range(min = 1))]
    pub max_tokens: u32,
    #[validate(range(min = 0.0, max = 1.0))]
    pub top_p: f32,
    #[validate(length(min = 1, message = "messages must not be empty"))]
    pub messages: Vec<Message>,
}

impl From<ServiceTurnDto> for ServiceTurnRequest {
    fn from(dto: ServiceTurnDto) -> Self {
        Self {
            model: dto.model,
            temperature: dto.temperature,
            max_tokens: dto.max_tokens,
            top_p: dto.top_p,
            messages: dto.messages,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub identity: VerifiedIdentity,
    pub usage: TokenUsage,
}

#[derive(Debug, Serialize)]
pub struct PromptResponse {
    pub user_id: String,
    pub content: String,
    pub id: String,
    pub created: f64,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    pub usage: TokenCounts,
}

impl From<TurnReply> for PromptResponse {
    fn from(reply: TurnReply) -> Self {
        let response = reply.response;
        let finish_reason = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.finish_reason);
        Self {
            user_id: reply.user_id,
            content: reply.content,
            id: response.id,
            created: response.created,
            model: response.model,
            finish_reason,
            usage: response.usage,
        }
    }
}
