//! StratAI core: a three-agent research crew built on `graph_flow`.
//!
//! A run takes a company and an industry, executes the research, use-case
//! and resource tasks in order, and yields per-task text that the report
//! formatter and PDF exporter turn into a document.

pub mod agents;
pub mod config;
pub mod crew;
pub mod error;
pub mod export;
pub mod llm;
pub mod metrics;
pub mod orchestrator;
pub mod output;
pub mod rate_limit;
pub mod report;
pub mod security;
pub mod tasks;
pub mod telemetry;
pub mod tools;

#[cfg(test)]
pub(crate) mod testing;

pub use agents::{Agent, AgentFactory, AgentKind, AgentRoster};
pub use config::{Config, ConfigLoader, CrewConfig, LlmConfig, LoggingConfig, SearchConfig};
pub use crew::{Crew, CrewRuntime, GraphFlowRuntime, ModelSource};
pub use error::{StratAiError, ToolError};
pub use export::{PDF_MIME, download_file_name, render_document};
pub use orchestrator::{ResearchOrchestrator, ResearchRequest};
pub use output::{RunResult, TaskOutput};
pub use report::{PLACEHOLDER, ReportSection, SectionLevel, format_report, report_sections};
pub use security::{Credentials, SecretValue, require_env};
pub use tasks::{Task, create_tasks};
pub use telemetry::{TelemetryOptions, init_telemetry};
