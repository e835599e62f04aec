use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use super::{ChatCompletion, ChatMessage, ChatModel, ChatRequest, ChatRole, ToolCall, ToolSpec};
use crate::config::LlmConfig;
use crate::{SecretValue, StratAiError};

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OpenAiTool<'a>>,
    temperature: f32,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct OpenAiMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct OpenAiToolCall {
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: OpenAiFunctionCall,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct OpenAiFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Serialize)]
struct OpenAiTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: OpenAiFunction<'a>,
}

#[derive(Serialize)]
struct OpenAiFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
    finish_reason: Option<String>,
}

fn function_kind() -> String {
    "function".to_string()
}

/// Client for OpenAI-compatible `/chat/completions` endpoints with function calling.
pub struct OpenAiChatModel {
    base_url: String,
    model: String,
    temperature: f32,
    api_key: SecretValue,
    http_client: reqwest::Client,
}

impl OpenAiChatModel {
    pub fn new(config: &LlmConfig, api_key: SecretValue) -> Result<Self, StratAiError> {
        if api_key.is_blank() {
            return Err(StratAiError::Configuration(
                "generation model API key is missing".into(),
            ));
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| {
                StratAiError::Configuration(format!("failed to build model HTTP client: {err}"))
            })?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            api_key,
            http_client,
        })
    }

    fn role_to_string(role: ChatRole) -> &'static str {
        match role {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
            ChatRole::Tool => "tool",
        }
    }

    fn build_messages(messages: &[ChatMessage]) -> Vec<OpenAiMessage> {
        messages
            .iter()
            .map(|message| OpenAiMessage {
                role: Self::role_to_string(message.role).to_string(),
                content: message.content.clone(),
                tool_calls: (!message.tool_calls.is_empty()).then(|| {
                    message
                        .tool_calls
                        .iter()
                        .map(|call| OpenAiToolCall {
                            id: call.id.clone(),
                            kind: function_kind(),
                            function: OpenAiFunctionCall {
                                name: call.name.clone(),
                                arguments: call.arguments.clone(),
                            },
                        })
                        .collect()
                }),
                tool_call_id: message.tool_call_id.clone(),
            })
            .collect()
    }

    fn build_tools(tools: &[ToolSpec]) -> Vec<OpenAiTool<'_>> {
        tools
            .iter()
            .map(|tool| OpenAiTool {
                kind: "function",
                function: OpenAiFunction {
                    name: &tool.name,
                    description: &tool.description,
                    parameters: &tool.parameters,
                },
            })
            .collect()
    }

    fn build_request_body<'a>(&'a self, request: &'a ChatRequest) -> OpenAiRequest<'a> {
        OpenAiRequest {
            model: &self.model,
            messages: Self::build_messages(&request.messages),
            tools: Self::build_tools(&request.tools),
            temperature: self.temperature,
        }
    }

    fn parse_response(response: OpenAiResponse) -> Result<ChatCompletion, StratAiError> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| StratAiError::orchestration("no choices in model response"))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolCall {
                id: call.id,
                name: call.function.name,
                arguments: call.function.arguments,
            })
            .collect();

        Ok(ChatCompletion {
            content: choice.message.content,
            tool_calls,
            finish_reason: choice.finish_reason,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    #[instrument(name = "llm.complete", skip_all, fields(model = %self.model, messages = request.messages.len()))]
    async fn complete(&self, request: ChatRequest) -> Result<ChatCompletion, StratAiError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_request_body(&request);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(self.api_key.expose())
            .json(&body)
            .send()
            .await
            .map_err(|err| StratAiError::orchestration(format!("model request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(StratAiError::orchestration(format!(
                "model API error {status}: {body_text}"
            )));
        }

        let parsed: OpenAiResponse = response.json().await.map_err(|err| {
            StratAiError::orchestration(format!("failed to parse model response: {err}"))
        })?;

        let completion = Self::parse_response(parsed)?;
        debug!(
            tool_calls = completion.tool_calls.len(),
            finish_reason = completion.finish_reason.as_deref().unwrap_or("unknown"),
            "model turn completed"
        );
        Ok(completion)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
