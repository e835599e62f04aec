//! Sequential crew execution on top of `graph-flow`.
//!
//! Every task becomes one graph node; nodes are chained in task order and
//! share a session context holding the outputs produced so far. Each node
//! drives its agent through a tool-calling loop against the chat model.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use graph_flow::{
    Context, ExecutionStatus, FlowRunner, GraphBuilder, InMemorySessionStorage, NextAction,
    Session, SessionStorage, Task as GraphTask, TaskResult,
};
use serde_json::{Value, json};
use tracing::{debug, error, info, instrument, warn};

use crate::agents::{Agent, AgentRoster};
use crate::config::{Config, CrewConfig, LlmConfig};
use crate::llm::{ChatMessage, ChatModel, ChatRequest, OpenAiChatModel, ToolCall, ToolSpec};
use crate::output::{RunResult, TaskOutput};
use crate::rate_limit::RequestRateLimiter;
use crate::security::Credentials;
use crate::tasks::Task;
use crate::StratAiError;

const OUTPUTS_KEY: &str = "crew.outputs";
const FAILURE_KEY: &str = "crew.failure";

const DELEGATE_WORK: &str = "delegate_work";
const ASK_QUESTION: &str = "ask_question";

const EMPTY_ANSWER_NUDGE: &str =
    "Your last reply was empty. Reply with your complete final answer now.";

/// Agents plus the ordered tasks they execute.
#[derive(Debug, Clone)]
pub struct Crew {
    pub agents: AgentRoster,
    pub tasks: Vec<Arc<Task>>,
}

impl Crew {
    pub fn new(agents: AgentRoster, tasks: impl IntoIterator<Item = Task>) -> Self {
        Self {
            agents,
            tasks: tasks.into_iter().map(Arc::new).collect(),
        }
    }
}

/// Executes a crew to completion.
#[async_trait]
pub trait CrewRuntime: Send + Sync {
    async fn kickoff(&self, crew: Crew, credentials: &Credentials)
    -> Result<RunResult, StratAiError>;
}

/// Where the runtime obtains its chat model.
#[derive(Clone)]
pub enum ModelSource {
    /// A fresh OpenAI client per run, keyed with the run's credentials.
    OpenAi(LlmConfig),
    Fixed(Arc<dyn ChatModel>),
}

/// Production runtime: graph-flow sequencing plus a shared request ceiling.
pub struct GraphFlowRuntime {
    models: ModelSource,
    limiter: Arc<RequestRateLimiter>,
    max_iterations: usize,
}

impl GraphFlowRuntime {
    pub fn new(config: &Config) -> Self {
        Self::with_source(ModelSource::OpenAi(config.llm.clone()), &config.crew)
    }

    pub fn with_model(model: Arc<dyn ChatModel>, crew: &CrewConfig) -> Self {
        Self::with_source(ModelSource::Fixed(model), crew)
    }

    fn with_source(models: ModelSource, crew: &CrewConfig) -> Self {
        Self {
            models,
            limiter: Arc::new(RequestRateLimiter::per_minute(crew.max_rpm)),
            max_iterations: crew.max_iterations.max(1),
        }
    }

    pub fn limiter(&self) -> &Arc<RequestRateLimiter> {
        &self.limiter
    }

    fn model(&self, credentials: &Credentials) -> Result<Arc<dyn ChatModel>, StratAiError> {
        match &self.models {
            ModelSource::OpenAi(config) => Ok(Arc::new(OpenAiChatModel::new(
                config,
                credentials.llm_api_key.clone(),
            )?)),
            ModelSource::Fixed(model) => Ok(model.clone()),
        }
    }
}

#[async_trait]
impl CrewRuntime for GraphFlowRuntime {
    #[instrument(name = "crew.kickoff", skip_all, fields(tasks = crew.tasks.len()))]
    async fn kickoff(
        &self,
        crew: Crew,
        credentials: &Credentials,
    ) -> Result<RunResult, StratAiError> {
        let model = self.model(credentials)?;
        info!(
            model = model.model_name(),
            tasks = crew.tasks.len(),
            "crew kickoff"
        );
        let executor = Arc::new(AgentExecutor {
            model,
            limiter: self.limiter.clone(),
            max_iterations: self.max_iterations,
            roster: crew.agents.clone(),
        });

        let last = crew.tasks.len().saturating_sub(1);
        let nodes: Vec<Arc<CrewTaskNode>> = crew
            .tasks
            .iter()
            .enumerate()
            .map(|(index, task)| {
                Arc::new(CrewTaskNode {
                    task: task.clone(),
                    executor: executor.clone(),
                    is_last: index == last,
                })
            })
            .collect();

        let Some(first) = nodes.first() else {
            return Ok(RunResult::Empty);
        };

        let mut builder = GraphBuilder::new("stratai_crew");
        for node in &nodes {
            builder = builder.add_task(node.clone());
        }
        for pair in nodes.windows(2) {
            builder = builder.add_edge(pair[0].id(), pair[1].id());
        }
        let graph = Arc::new(builder.set_start_task(first.id()).build());

        let storage = Arc::new(InMemorySessionStorage::new());
        let runner = FlowRunner::new(graph, storage.clone());

        let session_id = format!("crew-{}", uuid::Uuid::new_v4());
        let session = Session::new_from_task(session_id.clone(), first.id());
        session
            .context
            .set(OUTPUTS_KEY, Vec::<TaskOutput>::new())
            .await;
        storage.save(session).await.map_err(|err| {
            StratAiError::orchestration(format!("failed to persist crew session: {err}"))
        })?;

        loop {
            let result = runner.run(&session_id).await.map_err(|err| {
                StratAiError::orchestration(format!("graph execution failure: {err}"))
            })?;

            match result.status {
                ExecutionStatus::Completed => break,
                ExecutionStatus::Error(message) => {
                    return Err(StratAiError::orchestration(message));
                }
                _ => continue,
            }
        }

        let session = storage
            .get(&session_id)
            .await
            .map_err(|err| StratAiError::orchestration(format!("failed to reload session: {err}")))?
            .ok_or_else(|| StratAiError::orchestration("crew session missing after execution"))?;

        if let Some(reason) = session.context.get::<String>(FAILURE_KEY).await {
            return Err(StratAiError::orchestration(reason));
        }

        let outputs: Vec<TaskOutput> = session.context.get(OUTPUTS_KEY).await.unwrap_or_default();
        info!(outputs = outputs.len(), "crew finished");
        Ok(RunResult::from_outputs(outputs))
    }
}

/// Graph node running one crew task.
struct CrewTaskNode {
    task: Arc<Task>,
    executor: Arc<AgentExecutor>,
    is_last: bool,
}

#[async_trait]
impl GraphTask for CrewTaskNode {
    fn id(&self) -> &str {
        self.task.id
    }

    #[instrument(name = "crew.task", skip_all)]
    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let mut outputs: Vec<TaskOutput> = context.get(OUTPUTS_KEY).await.unwrap_or_default();
        let prompt = self.task.prompt(&outputs);
        debug!(task_id = self.task.id, agent = %self.task.agent.role, "task started");

        match self.executor.execute(&self.task.agent, prompt, true).await {
            Ok(raw) => {
                info!(task_id = self.task.id, chars = raw.len(), "task completed");
                outputs.push(TaskOutput {
                    task_id: self.task.id.to_string(),
                    agent: self.task.agent.kind,
                    agent_role: self.task.agent.role.clone(),
                    description: self.task.description.clone(),
                    raw,
                });
                context.set(OUTPUTS_KEY, &outputs).await;

                let next = if self.is_last {
                    NextAction::End
                } else {
                    NextAction::ContinueAndExecute
                };
                Ok(TaskResult::new(
                    Some(format!("Task {} completed", self.task.id)),
                    next,
                ))
            }
            Err(err) => {
                error!(task_id = self.task.id, error = %err, "task failed");
                let reason = match err {
                    StratAiError::Orchestration(reason) => reason,
                    other => other.to_string(),
                };
                context
                    .set(FAILURE_KEY, format!("task `{}`: {reason}", self.task.id))
                    .await;
                Ok(TaskResult::new(
                    Some(format!("Task {} failed", self.task.id)),
                    NextAction::End,
                ))
            }
        }
    }
}

type AnswerFuture<'a> = Pin<Box<dyn Future<Output = Result<String, StratAiError>> + Send + 'a>>;

/// Tool-calling loop shared by every node of one run.
struct AgentExecutor {
    model: Arc<dyn ChatModel>,
    limiter: Arc<RequestRateLimiter>,
    max_iterations: usize,
    roster: AgentRoster,
}

impl AgentExecutor {
    /// Run `agent` on `prompt` until the model gives a final text answer.
    /// Coworkers reached through delegation run with `delegate = false`.
    fn execute<'a>(&'a self, agent: &'a Agent, prompt: String, delegate: bool) -> AnswerFuture<'a> {
        Box::pin(async move {
            let delegate = delegate && agent.allow_delegation;
            let mut tools = agent.tools.specs();
            if delegate {
                tools.extend(delegation_specs(&self.coworkers(agent)));
            }

            let mut messages = vec![
                ChatMessage::system(agent.system_prompt()),
                ChatMessage::user(prompt),
            ];

            for iteration in 1..=self.max_iterations {
                self.limiter.acquire().await;
                let completion = self
                    .model
                    .complete(ChatRequest {
                        messages: messages.clone(),
                        tools: tools.clone(),
                    })
                    .await?;

                if completion.tool_calls.is_empty() {
                    let answer = completion.content.unwrap_or_default();
                    if !answer.trim().is_empty() {
                        debug!(agent = %agent.role, iteration, "final answer");
                        return Ok(answer);
                    }
                    messages.push(ChatMessage::assistant(Some(answer), Vec::new()));
                    messages.push(ChatMessage::user(EMPTY_ANSWER_NUDGE));
                    continue;
                }

                messages.push(ChatMessage::assistant(
                    completion.content.clone(),
                    completion.tool_calls.clone(),
                ));
                for call in &completion.tool_calls {
                    let observation = self.invoke(agent, call, delegate).await?;
                    messages.push(ChatMessage::tool_result(&call.id, observation));
                }
            }

            Err(StratAiError::orchestration(format!(
                "{} did not reach a final answer within {} iterations",
                agent.role, self.max_iterations
            )))
        })
    }

    fn coworkers<'a>(&'a self, agent: &Agent) -> Vec<&'a Arc<Agent>> {
        self.roster
            .agents()
            .into_iter()
            .filter(|coworker| coworker.kind != agent.kind)
            .collect()
    }

    /// Tool failures are returned to the model as observations; only model
    /// failures inside a delegated run abort the task.
    async fn invoke(
        &self,
        agent: &Agent,
        call: &ToolCall,
        delegate: bool,
    ) -> Result<String, StratAiError> {
        let raw_args = if call.arguments.trim().is_empty() {
            "{}"
        } else {
            call.arguments.as_str()
        };
        let args: Value = match serde_json::from_str(raw_args) {
            Ok(args) => args,
            Err(err) => {
                return Ok(format!(
                    "Error: arguments for `{}` are not valid JSON: {err}",
                    call.name
                ));
            }
        };

        self.limiter.acquire().await;

        let name = call.name.as_str();
        if delegate && (name == DELEGATE_WORK || name == ASK_QUESTION) {
            return self.delegate(agent, name, &args).await;
        }

        let Some(tool) = agent.tools.find(name) else {
            warn!(agent = %agent.role, tool = name, "model requested an unknown tool");
            return Ok(format!(
                "Error: unknown tool `{name}`. Available tools: {}",
                agent.tools.names().join(", ")
            ));
        };

        match tool.call(args).await {
            Ok(observation) => Ok(observation),
            Err(err) => {
                warn!(agent = %agent.role, error = %err, "tool call failed");
                Ok(format!("Error: {err}"))
            }
        }
    }

    async fn delegate(&self, agent: &Agent, tool: &str, args: &Value) -> Result<String, StratAiError> {
        let field = if tool == DELEGATE_WORK { "task" } else { "question" };
        let Some(ask) = string_arg(args, field) else {
            return Ok(format!("Error: `{tool}` requires a `{field}` argument"));
        };
        let coworker_role = string_arg(args, "coworker").unwrap_or_default();
        let context = string_arg(args, "context").unwrap_or_default();

        let Some(coworker) = self
            .roster
            .by_role(coworker_role)
            .filter(|coworker| coworker.kind != agent.kind)
        else {
            return Ok(format!(
                "Error: `{coworker_role}` is not one of your coworkers. Choose one of: {}",
                role_list(&self.coworkers(agent))
            ));
        };

        info!(from = %agent.role, to = %coworker.role, tool, "delegating");
        let mut prompt = format!(
            "{ask}\n\nThis is the expected criteria for your final answer: Your best answer to \
             your coworker asking you this, accounting for the context shared.\n\
             You MUST return the actual complete content as the final answer, not a summary."
        );
        if !context.is_empty() {
            prompt.push_str("\n\nThis is the context you're working with:\n");
            prompt.push_str(context);
        }

        self.execute(coworker, prompt, false).await
    }
}

fn string_arg<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn role_list(agents: &[&Arc<Agent>]) -> String {
    agents
        .iter()
        .map(|agent| agent.role.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn delegation_specs(coworkers: &[&Arc<Agent>]) -> Vec<ToolSpec> {
    let roles = role_list(coworkers);
    let role_enum: Vec<&str> = coworkers.iter().map(|agent| agent.role.as_str()).collect();

    vec![
        ToolSpec {
            name: DELEGATE_WORK.to_string(),
            description: format!(
                "Delegate a specific task to one of the following coworkers: {roles}\n\
                 The input to this tool should be the coworker, the task you want them to do, \
                 and ALL necessary context to execute the task, they know nothing about the \
                 task, so share absolutely everything you know, don't reference things but \
                 instead explain them."
            ),
            parameters: json!({
                "type": "object",
                "properties": {
                    "task": {"type": "string", "description": "The task to delegate"},
                    "context": {"type": "string", "description": "The context for the task"},
                    "coworker": {"type": "string", "enum": role_enum, "description": "The role of the coworker to delegate to"}
                },
                "required": ["task", "context", "coworker"]
            }),
        },
        ToolSpec {
            name: ASK_QUESTION.to_string(),
            description: format!(
                "Ask a specific question to one of the following coworkers: {roles}\n\
                 The input to this tool should be the coworker, the question you have for \
                 them, and ALL necessary context to ask the question properly, they know \
                 nothing about the question, so share absolutely everything you know, don't \
                 reference things but instead explain them."
            ),
            parameters: json!({
                "type": "object",
                "properties": {
                    "question": {"type": "string", "description": "The question to ask"},
                    "context": {"type": "string", "description": "The context for the question"},
                    "coworker": {"type": "string", "enum": role_enum, "description": "The role of the coworker to ask"}
                },
                "required": ["question", "context", "coworker"]
            }),
        },
    ]
}
