//! In-process fakes for the network collaborators.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::llm::{ChatCompletion, ChatModel, ChatRequest, ToolCall};
use crate::tools::{AgentTool, SearchToolProvider};
use crate::{StratAiError, ToolError};

pub(crate) struct StubTool {
    name: &'static str,
    reply: String,
    calls: AtomicUsize,
}

impl StubTool {
    pub(crate) fn new(name: &'static str, reply: impl Into<String>) -> Self {
        Self {
            name,
            reply: reply.into(),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentTool for StubTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "stub"
    }

    fn parameters(&self) -> Value {
        json!({"type": "object"})
    }

    async fn call(&self, _args: Value) -> Result<String, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }
}

pub(crate) fn stub_tools() -> (SearchToolProvider, Arc<StubTool>, Arc<StubTool>) {
    let keyword = Arc::new(StubTool::new(
        "search_the_internet",
        "Title: Tata Motors EV plan\nLink: https://example.com\nSnippet: ten new EVs",
    ));
    let website = Arc::new(StubTool::new(
        "search_website_content",
        "Relevant content from https://example.com:\n\nbattery analytics",
    ));
    let provider = SearchToolProvider::from_tools(keyword.clone(), website.clone());
    (provider, keyword, website)
}

pub(crate) fn stub_provider() -> SearchToolProvider {
    stub_tools().0
}

/// Replays queued completions and records every request it receives.
#[derive(Default)]
pub(crate) struct ScriptedModel {
    replies: Mutex<VecDeque<Result<ChatCompletion, String>>>,
    fallback: Option<ChatCompletion>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    pub(crate) fn new(replies: Vec<ChatCompletion>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(Ok).collect()),
            ..Self::default()
        }
    }

    /// Answers every request with the same completion.
    pub(crate) fn repeating(reply: ChatCompletion) -> Self {
        Self {
            fallback: Some(reply),
            ..Self::default()
        }
    }

    pub(crate) fn push_failure(&self, reason: &str) {
        self.replies.lock().unwrap().push_back(Err(reason.to_string()));
    }

    pub(crate) fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, request: ChatRequest) -> Result<ChatCompletion, StratAiError> {
        self.requests.lock().unwrap().push(request);
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(reason)) => Err(StratAiError::orchestration(reason)),
            None => self
                .fallback
                .clone()
                .ok_or_else(|| StratAiError::orchestration("scripted model exhausted")),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

pub(crate) fn tool_call(id: &str, name: &str, arguments: Value) -> ToolCall {
    ToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments: arguments.to_string(),
    }
}
