use async_trait::async_trait;

use crate::llm::LLMError;
use crate::schemas::{Message, TokenUsage, ToolCall};
use crate::session::Tool;

/// What comes back from one inference call: assistant text, zero or more
/// structured tool invocations, and token accounting.
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: TokenUsage,
}

impl ChatResponse {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// The inference seam. The orchestration loop only ever sees this trait, so
/// provider wire shapes stay out of the control flow.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn generate(
        &self,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<ChatResponse, LLMError>;
}

impl<M> From<M> for Box<dyn ChatModel>
where
    M: 'static + ChatModel,
{
    fn from(model: M) -> Self {
        Box::new(model)
    }
}
