use async_openai::{
    config::{Config, OpenAIConfig},
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestMessageContentPartImageArgs,
        ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContentPart,
        ChatCompletionTool, ChatCompletionToolArgs, ChatCompletionToolType,
        CreateChatCompletionRequestArgs, FunctionObjectArgs, ImageUrlArgs,
    },
    Client,
};
use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::llm::{ChatModel, ChatResponse, LLMError};
use crate::schemas::{Message, MessageContent, MessageType, TokenUsage, ToolCall};
use crate::session::Tool;

/// [`ChatModel`] backed by the OpenAI chat-completions API. With a custom
/// api base this also covers OpenAI-compatible local endpoints.
#[derive(Clone)]
pub struct OpenAiChat<C: Config = OpenAIConfig> {
    config: C,
    model: String,
}

impl<C: Config> OpenAiChat<C> {
    pub fn new(config: C) -> Self {
        Self {
            config,
            model: "gpt-4o-mini".to_string(),
        }
    }

    pub fn with_model<S: Into<String>>(mut self, model: S) -> Self {
        self.model = model.into();
        self
    }

    fn build_messages(
        &self,
        messages: &[Message],
    ) -> Result<Vec<ChatCompletionRequestMessage>, LLMError> {
        messages.iter().map(to_request_message).collect()
    }

    fn build_tools(&self, tools: &[Tool]) -> Result<Vec<ChatCompletionTool>, LLMError> {
        tools
            .iter()
            .map(|tool| {
                let function = FunctionObjectArgs::default()
                    .name(tool.name.replace(' ', "_"))
                    .description(tool.description.clone())
                    .parameters(tool.parameters.clone())
                    .build()?;
                Ok(ChatCompletionToolArgs::default()
                    .r#type(ChatCompletionToolType::Function)
                    .function(function)
                    .build()?)
            })
            .collect()
    }
}

impl Default for OpenAiChat<OpenAIConfig> {
    fn default() -> Self {
        Self::new(OpenAIConfig::default())
    }
}

#[async_trait]
impl<C: Config + Send + Sync + 'static + Clone> ChatModel for OpenAiChat<C> {
    async fn generate(
        &self,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<ChatResponse, LLMError> {
        let client = Client::with_config(self.config.clone());

        let mut request = CreateChatCompletionRequestArgs::default();
        request
            .model(&self.model)
            .messages(self.build_messages(messages)?)
            // Deterministic output so runs are comparable.
            .temperature(0.0);
        if !tools.is_empty() {
            request.tools(self.build_tools(tools)?);
        }

        let response = client.chat().create(request.build()?).await?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or(LLMError::ContentNotFound)?;

        let text = choice.message.content.unwrap_or_default();
        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| {
                let arguments = parse_arguments(&call.function.arguments);
                ToolCall::new(call.function.name, arguments).with_id(call.id)
            })
            .collect();

        let usage = response
            .usage
            .map(|usage| TokenUsage::new(usage.prompt_tokens, usage.completion_tokens))
            .unwrap_or_default();

        Ok(ChatResponse {
            text,
            tool_calls,
            usage,
        })
    }
}

fn parse_arguments(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str(raw).unwrap_or_else(|error| {
        warn!("Malformed tool-call arguments ({error}): {raw}");
        Value::Object(Default::default())
    })
}

fn to_request_message(message: &Message) -> Result<ChatCompletionRequestMessage, LLMError> {
    let request_message = match (&message.message_type, &message.content) {
        (MessageType::System, content) => ChatCompletionRequestSystemMessageArgs::default()
            .content(content.text().to_string())
            .build()?
            .into(),
        (MessageType::Ai, content) => ChatCompletionRequestAssistantMessageArgs::default()
            .content(content.text().to_string())
            .build()?
            .into(),
        (MessageType::Human, MessageContent::Text(text)) => {
            ChatCompletionRequestUserMessageArgs::default()
                .content(text.clone())
                .build()?
                .into()
        }
        (MessageType::Human, MessageContent::Multimodal { text, image }) => {
            let parts: Vec<ChatCompletionRequestUserMessageContentPart> = vec![
                ChatCompletionRequestMessageContentPartTextArgs::default()
                    .text(text.clone())
                    .build()?
                    .into(),
                ChatCompletionRequestMessageContentPartImageArgs::default()
                    .image_url(ImageUrlArgs::default().url(image.to_data_url()).build()?)
                    .build()?
                    .into(),
            ];
            ChatCompletionRequestUserMessageArgs::default()
                .content(parts)
                .build()?
                .into()
        }
    };
    Ok(request_message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::ImageData;
    use serde_json::json;

    fn chat_completion_body(message: Value) -> String {
        json!({
            "id": "chatcmpl-test",
            "object": "chat.completion",
            "created": 1700000000,
            "model": "gpt-4o-mini",
            "choices": [{
                "index": 0,
                "message": message,
                "finish_reason": "stop",
                "logprobs": null
            }],
            "usage": {
                "prompt_tokens": 120,
                "completion_tokens": 15,
                "total_tokens": 135
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn generate_parses_text_and_usage() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(chat_completion_body(json!({
                "role": "assistant",
                "content": "Looking at the page now."
            })))
            .create_async()
            .await;

        let model = OpenAiChat::new(
            OpenAIConfig::new()
                .with_api_base(server.url())
                .with_api_key("test-key"),
        );
        let response = model
            .generate(&[Message::new_human_message("Page State:\nhello")], &[])
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.text, "Looking at the page now.");
        assert!(!response.has_tool_calls());
        assert_eq!(response.usage.prompt_tokens, 120);
        assert_eq!(response.usage.completion_tokens, 15);
        assert_eq!(response.usage.total_tokens, 135);
    }

    #[tokio::test]
    async fn generate_parses_structured_tool_calls() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(chat_completion_body(json!({
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {
                        "name": "browser_click",
                        "arguments": "{\"selector\": \"#next\"}"
                    }
                }]
            })))
            .create_async()
            .await;

        let model = OpenAiChat::new(
            OpenAIConfig::new()
                .with_api_base(server.url())
                .with_api_key("test-key"),
        );
        let tools = vec![Tool::new(
            "browser_click",
            "Click an element",
            json!({
                "type": "object",
                "properties": { "selector": { "type": "string" } },
                "required": ["selector"]
            }),
        )];
        let response = model
            .generate(&[Message::new_human_message("Page State:\nhello")], &tools)
            .await
            .unwrap();

        assert_eq!(response.tool_calls.len(), 1);
        let call = &response.tool_calls[0];
        assert_eq!(call.name, "browser_click");
        assert_eq!(call.arguments, json!({ "selector": "#next" }));
        assert_eq!(call.id.as_deref(), Some("call_1"));
    }

    #[test]
    fn malformed_tool_arguments_degrade_to_empty_object() {
        assert_eq!(parse_arguments("not json"), json!({}));
        assert_eq!(parse_arguments(""), json!({}));
        assert_eq!(parse_arguments("{\"a\": 1}"), json!({ "a": 1 }));
    }

    #[test]
    fn multimodal_turns_become_image_parts() {
        let message = Message::new_human_message_with_image(
            "Page State",
            ImageData::new("aGVsbG8=", "image/png"),
        );
        let converted = to_request_message(&message).unwrap();
        let serialized = serde_json::to_value(&converted).unwrap();

        assert_eq!(serialized["role"], "user");
        let parts = serialized["content"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["type"], "text");
        assert_eq!(parts[1]["type"], "image_url");
        assert_eq!(
            parts[1]["image_url"]["url"],
            "data:image/png;base64,aGVsbG8="
        );
    }
}
