use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, instrument};

use super::{AgentTool, required_str};
use crate::config::SearchConfig;
use crate::{SecretValue, StratAiError, ToolError};

const NAME: &str = "search_the_internet";
const DESCRIPTION: &str = "Search the internet with a keyword query and return the top results \
    (title, link and snippet). Use it to find news, market data, competitors and sources.";

#[derive(Serialize)]
struct SerperRequest<'a> {
    q: &'a str,
    num: u8,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct SerperResponse {
    #[serde(default)]
    knowledge_graph: Option<KnowledgeGraph>,
    #[serde(default)]
    organic: Vec<OrganicResult>,
}

#[derive(Debug, Deserialize)]
struct KnowledgeGraph {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: Option<String>,
}

/// Keyword search backed by the Serper Google-search API.
pub struct SerperSearchTool {
    endpoint: String,
    api_key: SecretValue,
    results_per_query: u8,
    http_client: reqwest::Client,
}

impl SerperSearchTool {
    pub fn new(config: &SearchConfig, api_key: SecretValue) -> Result<Self, StratAiError> {
        if api_key.is_blank() {
            return Err(StratAiError::Configuration(
                "search API key is missing".into(),
            ));
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.website_timeout_secs))
            .build()
            .map_err(|err| {
                StratAiError::Configuration(format!("failed to build search HTTP client: {err}"))
            })?;

        Ok(Self {
            endpoint: config.serper_url.clone(),
            api_key,
            results_per_query: config.results_per_query.max(1),
            http_client,
        })
    }

    async fn search(&self, query: &str) -> Result<SerperResponse, ToolError> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .header("X-API-KEY", self.api_key.expose())
            .json(&SerperRequest {
                q: query,
                num: self.results_per_query,
            })
            .send()
            .await
            .map_err(|err| ToolError::new(NAME, format!("search request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::new(
                NAME,
                format!("search API error {status}: {body}"),
            ));
        }

        response
            .json()
            .await
            .map_err(|err| ToolError::new(NAME, format!("failed to parse search results: {err}")))
    }
}

fn format_results(query: &str, response: &SerperResponse) -> String {
    let mut blocks = Vec::new();

    if let Some(graph) = &response.knowledge_graph
        && let Some(title) = graph.title.as_deref()
    {
        let description = graph.description.as_deref().unwrap_or_default();
        blocks.push(format!("Knowledge Graph: {title}\n{description}"));
    }

    for result in &response.organic {
        blocks.push(format!(
            "Title: {}\nLink: {}\nSnippet: {}",
            result.title,
            result.link,
            result.snippet.as_deref().unwrap_or("")
        ));
    }

    if blocks.is_empty() {
        return format!("No results found for \"{query}\".");
    }

    format!("Search results for \"{query}\":\n\n{}", blocks.join("\n---\n"))
}

#[async_trait]
impl AgentTool for SerperSearchTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "search_query": {
                    "type": "string",
                    "description": "Keyword query to search the internet for"
                }
            },
            "required": ["search_query"]
        })
    }

    #[instrument(name = "tool.serper", skip_all)]
    async fn call(&self, args: Value) -> Result<String, ToolError> {
        let query = required_str(NAME, &args, "search_query")?;
        debug!(%query, "keyword search");
        let response = self.search(query).await?;
        Ok(format_results(query, &response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_knowledge_graph_and_organic_results() {
        let response: SerperResponse = serde_json::from_value(json!({
            "knowledgeGraph": {"title": "Tata Motors", "description": "Indian automaker"},
            "organic": [
                {"title": "Tata EV strategy", "link": "https://example.com/ev", "snippet": "Plans for 10 EVs"},
                {"title": "Annual report", "link": "https://example.com/ar"}
            ]
        }))
        .unwrap();

        let text = format_results("Tata Motors", &response);
        assert!(text.starts_with("Search results for \"Tata Motors\""));
        assert!(text.contains("Knowledge Graph: Tata Motors\nIndian automaker"));
        assert!(text.contains("Title: Tata EV strategy\nLink: https://example.com/ev"));
        assert!(text.contains("Snippet: Plans for 10 EVs"));
        assert_eq!(text.matches("\n---\n").count(), 2);
    }

    #[test]
    fn empty_response_reports_no_results() {
        let text = format_results("nothing", &SerperResponse::default());
        assert_eq!(text, "No results found for \"nothing\".");
    }

    #[tokio::test]
    async fn missing_query_is_a_tool_error() {
        let tool =
            SerperSearchTool::new(&SearchConfig::default(), SecretValue::new("key")).unwrap();
        let err = tool.call(json!({})).await.unwrap_err();
        assert_eq!(err.tool, NAME);
        assert!(err.reason.contains("search_query"));
    }
}
