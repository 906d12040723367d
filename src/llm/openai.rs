//! OpenAI chat-completions backend for [`LanguageModel`].

use super::{
    ContentBlock, LanguageModel, Message, MessageContent, ModelRequest, ModelResponse, Role,
    StopReason, ToolChoice,
};
use crate::config::Settings;
use crate::error::{Result, SyllabusError};
use crate::openai::create_client_with_timeout;
use crate::tools::ToolDefinition;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs, ChatCompletionTool,
    ChatCompletionToolChoiceOption, ChatCompletionToolType, CreateChatCompletionRequestArgs,
    FinishReason, FunctionCall, FunctionObject,
};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Chat model served by the OpenAI API.
pub struct OpenAIModel {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
}

impl OpenAIModel {
    /// Create a model client from application settings.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(
            &settings.model.name,
            Duration::from_secs(settings.model.timeout_seconds),
        )
    }

    /// Create a model client for `model` with a request timeout.
    pub fn new(model: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: create_client_with_timeout(timeout)?,
            model: model.to_string(),
        })
    }
}

fn build_err(e: impl std::fmt::Display) -> SyllabusError {
    SyllabusError::Model(e.to_string())
}

/// Map tool definitions onto OpenAI function tools.
fn to_openai_tools(tools: &[ToolDefinition]) -> Vec<ChatCompletionTool> {
    tools
        .iter()
        .map(|tool| ChatCompletionTool {
            r#type: ChatCompletionToolType::Function,
            function: FunctionObject {
                name: tool.name.clone(),
                description: Some(tool.description.clone()),
                parameters: Some(tool.input_schema.clone()),
                strict: None,
            },
        })
        .collect()
}

/// Flatten the system text and block-structured turns into OpenAI messages.
///
/// Tool results become one `tool` message each, in the order they appear,
/// so every result directly follows the assistant turn that requested it.
fn to_openai_messages(system: &str, messages: &[Message]) -> Result<Vec<ChatCompletionRequestMessage>> {
    let mut out: Vec<ChatCompletionRequestMessage> = vec![
        ChatCompletionRequestSystemMessageArgs::default()
            .content(system)
            .build()
            .map_err(build_err)?
            .into(),
    ];

    for message in messages {
        match (&message.role, &message.content) {
            (Role::User, MessageContent::Text(text)) => {
                out.push(
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(text.clone())
                        .build()
                        .map_err(build_err)?
                        .into(),
                );
            }
            (Role::Assistant, MessageContent::Text(text)) => {
                out.push(
                    ChatCompletionRequestAssistantMessageArgs::default()
                        .content(text.clone())
                        .build()
                        .map_err(build_err)?
                        .into(),
                );
            }
            (Role::Assistant, MessageContent::Blocks(blocks)) => {
                let mut text = String::new();
                let mut tool_calls = Vec::new();

                for block in blocks {
                    match block {
                        ContentBlock::Text { text: t } => text.push_str(t),
                        ContentBlock::ToolUse { id, name, input } => {
                            tool_calls.push(ChatCompletionMessageToolCall {
                                id: id.clone(),
                                r#type: ChatCompletionToolType::Function,
                                function: FunctionCall {
                                    name: name.clone(),
                                    arguments: input.to_string(),
                                },
                            });
                        }
                        ContentBlock::ToolResult { .. } => {
                            warn!("Dropping tool result found in an assistant turn");
                        }
                    }
                }

                let mut builder = ChatCompletionRequestAssistantMessageArgs::default();
                if !text.is_empty() {
                    builder.content(text);
                }
                if !tool_calls.is_empty() {
                    builder.tool_calls(tool_calls);
                }
                out.push(builder.build().map_err(build_err)?.into());
            }
            (Role::User, MessageContent::Blocks(blocks)) => {
                for block in blocks {
                    match block {
                        ContentBlock::ToolResult {
                            tool_use_id,
                            content,
                            ..
                        } => {
                            out.push(
                                ChatCompletionRequestToolMessageArgs::default()
                                    .tool_call_id(tool_use_id.clone())
                                    .content(content.clone())
                                    .build()
                                    .map_err(build_err)?
                                    .into(),
                            );
                        }
                        ContentBlock::Text { text } => {
                            out.push(
                                ChatCompletionRequestUserMessageArgs::default()
                                    .content(text.clone())
                                    .build()
                                    .map_err(build_err)?
                                    .into(),
                            );
                        }
                        ContentBlock::ToolUse { .. } => {
                            warn!("Dropping tool invocation found in a user turn");
                        }
                    }
                }
            }
        }
    }

    Ok(out)
}

#[async_trait]
impl LanguageModel for OpenAIModel {
    #[instrument(skip(self, request), fields(model = %self.model, messages = request.messages.len()))]
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse> {
        let messages = to_openai_messages(&request.system, &request.messages)?;

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(&self.model)
            .messages(messages)
            .temperature(request.temperature)
            .max_completion_tokens(request.max_tokens);

        if let Some(tools) = &request.tools {
            builder.tools(to_openai_tools(tools));
        }
        if let Some(ToolChoice::Auto) = request.tool_choice {
            builder.tool_choice(ChatCompletionToolChoiceOption::Auto);
        }

        let chat_request = builder.build().map_err(build_err)?;

        let response = self
            .client
            .chat()
            .create(chat_request)
            .await
            .map_err(|e| SyllabusError::OpenAI(format!("Chat API error: {}", e)))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| SyllabusError::Model("No response from model".to_string()))?;

        let mut content = Vec::new();
        if let Some(text) = choice.message.content.filter(|t| !t.is_empty()) {
            content.push(ContentBlock::Text { text });
        }

        let tool_calls = choice.message.tool_calls.unwrap_or_default();
        let requested_tools = !tool_calls.is_empty();
        for call in tool_calls {
            // Unparseable arguments are passed through as a string; the tool
            // rejects them and the model sees the error.
            let input = serde_json::from_str(&call.function.arguments)
                .unwrap_or(serde_json::Value::String(call.function.arguments));
            content.push(ContentBlock::ToolUse {
                id: call.id,
                name: call.function.name,
                input,
            });
        }

        let stop_reason = match choice.finish_reason {
            Some(FinishReason::ToolCalls) => StopReason::ToolUse,
            _ if requested_tools => StopReason::ToolUse,
            Some(FinishReason::Length) => StopReason::MaxTokens,
            _ => StopReason::EndTurn,
        };

        debug!("Model stopped with {:?} ({} blocks)", stop_reason, content.len());

        Ok(ModelResponse {
            stop_reason,
            content,
        })
    }
}
