use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::CONTENT_TYPE;
use scraper::Html;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use super::{AgentTool, required_str};
use crate::config::SearchConfig;
use crate::{StratAiError, ToolError};

const NAME: &str = "search_website_content";
const DESCRIPTION: &str = "Fetch a web page and return the passages most relevant to a query. \
    Use it to read company sites, reports and articles found through internet search.";
const MAX_BYTES: usize = 2 * 1024 * 1024;
const CHUNK_WORDS: usize = 120;

static TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\p{L}\p{N}]+").expect("invalid token regex"));

/// Fetches a page and ranks its text passages against the query.
pub struct WebsiteSearchTool {
    max_chunks: usize,
    http_client: reqwest::Client,
}

impl WebsiteSearchTool {
    pub fn new(config: &SearchConfig) -> Result<Self, StratAiError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.website_timeout_secs))
            .user_agent("stratai/0.1")
            .build()
            .map_err(|err| {
                StratAiError::Configuration(format!("failed to build website HTTP client: {err}"))
            })?;

        Ok(Self {
            max_chunks: config.website_max_chunks.max(1),
            http_client,
        })
    }

    async fn fetch(&self, url: &str) -> Result<String, ToolError> {
        let mut response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|err| ToolError::new(NAME, format!("failed to fetch {url}: {err}")))?;

        if !response.status().is_success() {
            return Err(ToolError::new(
                NAME,
                format!("request for {url} failed with status {}", response.status()),
            ));
        }

        let is_html = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.to_ascii_lowercase().contains("text/html"));

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|err| ToolError::new(NAME, format!("failed to read {url}: {err}")))?
        {
            let remaining = MAX_BYTES.saturating_sub(body.len());
            let end = remaining.min(chunk.len());
            body.extend_from_slice(&chunk[..end]);
            if end < chunk.len() {
                break;
            }
        }

        let content = String::from_utf8_lossy(&body).to_string();
        Ok(if is_html {
            extract_text(&content)
        } else {
            collapse_whitespace(&content)
        })
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Visible text of an HTML document; script and style contents are dropped.
fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut parts = Vec::new();

    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|parent| parent.value().as_element().map(|element| element.name()))
            .is_some_and(|name| matches!(name, "script" | "style" | "noscript" | "template"));
        if !hidden {
            let text: &str = text;
            parts.push(text);
        }
    }

    collapse_whitespace(&parts.join(" "))
}

fn chunk_words(text: &str, size: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    words
        .chunks(size.max(1))
        .map(|chunk| chunk.join(" "))
        .collect()
}

fn query_terms(query: &str) -> HashSet<String> {
    TOKEN
        .find_iter(query)
        .map(|token| token.as_str().to_lowercase())
        .filter(|token| token.chars().count() > 2)
        .collect()
}

fn score(chunk: &str, terms: &HashSet<String>) -> usize {
    TOKEN
        .find_iter(chunk)
        .filter(|token| terms.contains(&token.as_str().to_lowercase()))
        .count()
}

/// Pick the `limit` best-scoring passages and return them in page order.
/// Pages with no matching passage yield their opening passages.
fn rank_chunks(chunks: &[String], query: &str, limit: usize) -> Vec<String> {
    let terms = query_terms(query);
    let mut scored: Vec<(usize, usize)> = chunks
        .iter()
        .enumerate()
        .map(|(index, chunk)| (index, score(chunk, &terms)))
        .filter(|(_, score)| *score > 0)
        .collect();

    if scored.is_empty() {
        return chunks.iter().take(limit).cloned().collect();
    }

    scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    let mut picked: Vec<usize> = scored.into_iter().take(limit).map(|(index, _)| index).collect();
    picked.sort_unstable();
    picked.into_iter().map(|index| chunks[index].clone()).collect()
}

#[async_trait]
impl AgentTool for WebsiteSearchTool {
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
                    "description": "What to look for in the page content"
                },
                "website": {
                    "type": "string",
                    "description": "Absolute http(s) URL of the page to search"
                }
            },
            "required": ["search_query", "website"]
        })
    }

    #[instrument(name = "tool.website", skip_all)]
    async fn call(&self, args: Value) -> Result<String, ToolError> {
        let query = required_str(NAME, &args, "search_query")?;
        let website = required_str(NAME, &args, "website")?;

        if !website.starts_with("http://") && !website.starts_with("https://") {
            return Err(ToolError::new(
                NAME,
                "website must start with http:// or https://",
            ));
        }

        let text = self.fetch(website).await?;
        let chunks = chunk_words(&text, CHUNK_WORDS);
        debug!(%website, chunks = chunks.len(), "website fetched");

        if chunks.is_empty() {
            return Ok(format!("No readable content found at {website}."));
        }

        let relevant = rank_chunks(&chunks, query, self.max_chunks);
        Ok(format!(
            "Relevant content from {website}:\n\n{}",
            relevant.join("\n\n")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_text_skips_scripts_and_styles() {
        let html = r#"<html><head><style>body { color: red }</style>
            <script>var secret = 1;</script></head>
            <body><h1>Tata Motors</h1><p>Electric   vehicle
            roadmap</p></body></html>"#;
        let text = extract_text(html);
        assert_eq!(text, "Tata Motors Electric vehicle roadmap");
    }

    #[test]
    fn chunk_words_splits_on_word_boundaries() {
        let chunks = chunk_words("a b c d e", 2);
        assert_eq!(chunks, vec!["a b", "c d", "e"]);
        assert!(chunk_words("   ", 2).is_empty());
    }

    #[test]
    fn rank_chunks_prefers_matches_and_keeps_page_order() {
        let chunks = vec![
            "company history and founders".to_string(),
            "battery supply chain for electric vehicles".to_string(),
            "canteen menu".to_string(),
            "electric vehicle battery analytics with machine learning".to_string(),
        ];
        let ranked = rank_chunks(&chunks, "electric battery", 2);
        assert_eq!(ranked, vec![chunks[1].clone(), chunks[3].clone()]);
    }

    #[test]
    fn rank_chunks_falls_back_to_opening_passages() {
        let chunks = vec!["one".to_string(), "two".to_string(), "three".to_string()];
        let ranked = rank_chunks(&chunks, "unrelated", 2);
        assert_eq!(ranked, vec!["one".to_string(), "two".to_string()]);
    }

    #[tokio::test]
    async fn rejects_non_http_urls() {
        let tool = WebsiteSearchTool::new(&SearchConfig::default()).unwrap();
        let err = tool
            .call(json!({"search_query": "ai", "website": "file:///etc/passwd"}))
            .await
            .unwrap_err();
        assert!(err.reason.contains("http"));
    }
}
