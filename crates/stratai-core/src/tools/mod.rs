//! Search capabilities bound to every agent.

mod serper;
mod website;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{error, info};

use crate::config::SearchConfig;
use crate::llm::ToolSpec;
use crate::{SecretValue, StratAiError, ToolError};

pub use serper::SerperSearchTool;
pub use website::WebsiteSearchTool;

/// A capability an agent may invoke through function calling.
#[async_trait]
pub trait AgentTool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the argument object.
    fn parameters(&self) -> Value;

    async fn call(&self, args: Value) -> Result<String, ToolError>;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Ordered collection of tools shared by the agents of one run.
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: Vec<Arc<dyn AgentTool>>,
}

impl ToolSet {
    pub fn new(tools: Vec<Arc<dyn AgentTool>>) -> Self {
        Self { tools }
    }

    pub fn find(&self, name: &str) -> Option<&Arc<dyn AgentTool>> {
        self.tools.iter().find(|tool| tool.name() == name)
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|tool| tool.spec()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|tool| tool.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Holds the keyword-search and website-search tools.
///
/// Initialisation failures are logged and leave the provider empty; the
/// failure surfaces as a configuration error when agents are created.
#[derive(Clone, Default)]
pub struct SearchToolProvider {
    keyword: Option<Arc<dyn AgentTool>>,
    website: Option<Arc<dyn AgentTool>>,
    init_error: Option<String>,
}

impl SearchToolProvider {
    pub fn initialize(config: &SearchConfig, search_api_key: &SecretValue) -> Self {
        let keyword = match SerperSearchTool::new(config, search_api_key.clone()) {
            Ok(tool) => tool,
            Err(err) => return Self::failed(err),
        };
        let website = match WebsiteSearchTool::new(config) {
            Ok(tool) => tool,
            Err(err) => return Self::failed(err),
        };

        info!("search tools initialised");
        Self::from_tools(Arc::new(keyword), Arc::new(website))
    }

    pub fn from_tools(keyword: Arc<dyn AgentTool>, website: Arc<dyn AgentTool>) -> Self {
        Self {
            keyword: Some(keyword),
            website: Some(website),
            init_error: None,
        }
    }

    fn failed(err: StratAiError) -> Self {
        error!(error = %err, "error initializing search tools");
        Self {
            keyword: None,
            website: None,
            init_error: Some(err.to_string()),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.keyword.is_some() && self.website.is_some()
    }

    pub fn init_error(&self) -> Option<&str> {
        self.init_error.as_deref()
    }

    /// Both tools, keyword search first.
    pub fn tool_set(&self) -> Result<ToolSet, StratAiError> {
        match (&self.keyword, &self.website) {
            (Some(keyword), Some(website)) => {
                Ok(ToolSet::new(vec![keyword.clone(), website.clone()]))
            }
            _ => Err(StratAiError::Configuration(
                "Search tools not properly initialized. Check API keys.".into(),
            )),
        }
    }
}

/// Pull a required string argument out of a tool-call argument object.
pub(crate) fn required_str<'a>(
    tool: &str,
    args: &'a Value,
    key: &str,
) -> Result<&'a str, ToolError> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ToolError::new(tool, format!("missing required argument `{key}`")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blank_search_key_leaves_provider_uninitialised() {
        let provider =
            SearchToolProvider::initialize(&SearchConfig::default(), &SecretValue::new(""));
        assert!(!provider.is_ready());
        assert!(provider.init_error().is_some());
        let err = provider.tool_set().unwrap_err();
        assert!(matches!(err, StratAiError::Configuration(_)));
    }

    #[test]
    fn initialised_provider_exposes_both_tools_in_order() {
        let provider = SearchToolProvider::initialize(
            &SearchConfig::default(),
            &SecretValue::new("serper-key"),
        );
        let tools = provider.tool_set().unwrap();
        assert_eq!(
            tools.names(),
            vec!["search_the_internet", "search_website_content"]
        );
        assert_eq!(tools.specs().len(), 2);
    }

    #[test]
    fn required_str_rejects_blank_values() {
        let args = json!({"search_query": "  "});
        assert!(required_str("t", &args, "search_query").is_err());
        let args = json!({"search_query": " ev makers "});
        assert_eq!(
            required_str("t", &args, "search_query").unwrap(),
            "ev makers"
        );
    }
}
