//! Bounded tool-calling loop.

use crate::error::Result;
use crate::llm::{
    ContentBlock, LanguageModel, Message, ModelRequest, ModelResponse, StopReason, ToolChoice,
};
use crate::tools::{ToolDefinition, ToolDispatcher};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Default number of tool rounds before the answer is forced.
pub const DEFAULT_MAX_ROUNDS: usize = 2;

/// Decoding temperature for every call.
const TEMPERATURE: f32 = 0.0;

/// Drives the model through at most `max_rounds` tool rounds.
///
/// Each round sends the accumulated messages with the tool catalog. A round
/// that ends without tool invocations returns its text. When every round asks
/// for tools, one last call is made without the catalog so the model has to
/// answer in text.
pub struct Agent {
    model: Arc<dyn LanguageModel>,
    system_prompt: String,
    max_rounds: usize,
    max_tokens: u32,
}

impl Agent {
    pub fn new(model: Arc<dyn LanguageModel>, system_prompt: impl Into<String>) -> Self {
        Self {
            model,
            system_prompt: system_prompt.into(),
            max_rounds: DEFAULT_MAX_ROUNDS,
            max_tokens: 800,
        }
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// System text for a call: the preamble plus any earlier conversation.
    fn system_text(&self, history: Option<&str>) -> String {
        match history {
            Some(history) if !history.is_empty() => {
                format!("{}\n\nPrevious conversation:\n{}", self.system_prompt, history)
            }
            _ => self.system_prompt.clone(),
        }
    }

    fn request(&self, system: &str, messages: &[Message], tools: Option<&[ToolDefinition]>) -> ModelRequest {
        ModelRequest {
            system: system.to_string(),
            messages: messages.to_vec(),
            tools: tools.map(<[ToolDefinition]>::to_vec),
            tool_choice: tools.map(|_| ToolChoice::Auto),
            temperature: TEMPERATURE,
            max_tokens: self.max_tokens,
        }
    }

    /// Answer `query`, letting the model call tools through `dispatcher`.
    ///
    /// Only a failing model call is returned as an error. Tool faults reach
    /// the model as error results.
    #[instrument(skip_all, fields(rounds = self.max_rounds, tools = tools.len()))]
    pub async fn generate_response(
        &self,
        query: &str,
        history: Option<&str>,
        tools: &[ToolDefinition],
        dispatcher: Option<&dyn ToolDispatcher>,
    ) -> Result<AgentResponse> {
        let system = self.system_text(history);
        let catalog = (!tools.is_empty()).then_some(tools);
        let mut messages = vec![Message::user(query)];
        let mut model_calls = 0;
        let mut tool_calls = Vec::new();

        for round in 1..=self.max_rounds {
            debug!("Tool round {}", round);

            let response = self
                .model
                .complete(&self.request(&system, &messages, catalog))
                .await?;
            model_calls += 1;

            if !requests_tools(&response) {
                return Ok(AgentResponse {
                    content: response.text(),
                    model_calls,
                    tool_calls,
                });
            }

            let Some(dispatcher) = dispatcher else {
                debug!("Model requested tools but no dispatcher is available");
                return Ok(AgentResponse {
                    content: response.text(),
                    model_calls,
                    tool_calls,
                });
            };

            let mut results = Vec::new();
            for (id, name, input) in response.tool_uses() {
                info!("Calling tool {} ({})", name, id);
                let output = dispatcher.dispatch(name, input).await;

                results.push(ContentBlock::ToolResult {
                    tool_use_id: id.to_string(),
                    content: output.content.clone(),
                    is_error: output.is_error,
                });
                tool_calls.push(ToolCallRecord {
                    id: id.to_string(),
                    name: name.to_string(),
                    input: input.clone(),
                    output: output.content,
                    is_error: output.is_error,
                });
            }

            messages.push(Message::assistant(response.content));
            messages.push(Message::tool_results(results));
        }

        debug!("Round limit reached, forcing a text answer");
        let response = self
            .model
            .complete(&self.request(&system, &messages, None))
            .await?;
        model_calls += 1;

        Ok(AgentResponse {
            content: response.text(),
            model_calls,
            tool_calls,
        })
    }
}

fn requests_tools(response: &ModelResponse) -> bool {
    response.stop_reason == StopReason::ToolUse && response.tool_uses().next().is_some()
}

/// Outcome of one [`Agent::generate_response`] run.
#[derive(Debug)]
pub struct AgentResponse {
    /// Final answer text, possibly empty.
    pub content: String,
    /// Number of model calls made, including a forced final call.
    pub model_calls: usize,
    /// Every tool invocation in dispatch order.
    pub tool_calls: Vec<ToolCallRecord>,
}

/// A dispatched tool invocation and what it returned.
#[derive(Debug, Clone)]
pub struct ToolCallRecord {
    pub id: String,
    pub name: String,
    pub input: serde_json::Value,
    pub output: String,
    pub is_error: bool,
}

impl std::fmt::Display for ToolCallRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.input)
    }
}
