//! Entry point of a research run: tools, agents, tasks, crew, memo cache.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;

use lru::LruCache;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::agents::AgentFactory;
use crate::config::Config;
use crate::crew::{Crew, CrewRuntime, GraphFlowRuntime};
use crate::metrics;
use crate::output::RunResult;
use crate::security::Credentials;
use crate::tasks::create_tasks;
use crate::tools::SearchToolProvider;
use crate::StratAiError;

type CacheKey = (String, String);

/// Inputs of one research run.
#[derive(Debug, Clone)]
pub struct ResearchRequest {
    pub company: String,
    pub industry: String,
    pub credentials: Credentials,
}

impl ResearchRequest {
    pub fn new(
        company: impl Into<String>,
        industry: impl Into<String>,
        credentials: Credentials,
    ) -> Self {
        Self {
            company: company.into(),
            industry: industry.into(),
            credentials,
        }
    }

    fn cache_key(&self) -> CacheKey {
        (self.company.clone(), self.industry.clone())
    }
}

/// Runs the three-task pipeline and memoises successful results per
/// (company, industry). Failures are never cached.
pub struct ResearchOrchestrator {
    config: Config,
    runtime: Arc<dyn CrewRuntime>,
    cache: Mutex<LruCache<CacheKey, Arc<RunResult>>>,
}

impl ResearchOrchestrator {
    pub fn new(config: Config) -> Self {
        let runtime = Arc::new(GraphFlowRuntime::new(&config));
        Self::with_runtime(config, runtime)
    }

    pub fn with_runtime(config: Config, runtime: Arc<dyn CrewRuntime>) -> Self {
        let capacity = NonZeroUsize::new(config.crew.cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            config,
            runtime,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    #[instrument(
        name = "research.run",
        skip_all,
        fields(company = %request.company, industry = %request.industry)
    )]
    pub async fn run(&self, request: &ResearchRequest) -> Result<Arc<RunResult>, StratAiError> {
        let key = request.cache_key();
        if let Some(cached) = self.cache.lock().await.get(&key) {
            info!("returning memoised research result");
            metrics::record_cache_hit();
            return Ok(cached.clone());
        }

        let started = Instant::now();
        let outcome = self.execute(request).await;
        let status = if outcome.is_ok() { "success" } else { "failure" };
        metrics::record_research_run(status, started.elapsed());

        let result = Arc::new(outcome?);
        self.cache.lock().await.put(key, result.clone());
        info!(
            outputs = result.outputs().len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "research completed"
        );
        Ok(result)
    }

    async fn execute(&self, request: &ResearchRequest) -> Result<RunResult, StratAiError> {
        let tools = SearchToolProvider::initialize(
            &self.config.search,
            &request.credentials.search_api_key,
        );
        if !tools.is_ready() {
            warn!(
                reason = tools.init_error().unwrap_or("unknown"),
                "search tools unavailable"
            );
        }
        let roster = AgentFactory::new(&tools).create_agents(&request.company, &request.industry)?;
        let tasks = create_tasks(&roster, &request.company, &request.industry);

        self.runtime
            .kickoff(Crew::new(roster, tasks), &request.credentials)
            .await
    }

    /// Number of memoised results currently held.
    pub async fn cached_entries(&self) -> usize {
        self.cache.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::config::CrewConfig;
    use crate::output::TaskOutput;
    use crate::security::SecretValue;

    #[derive(Default)]
    struct CountingRuntime {
        invocations: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl CrewRuntime for CountingRuntime {
        async fn kickoff(
            &self,
            crew: Crew,
            _credentials: &Credentials,
        ) -> Result<RunResult, StratAiError> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(StratAiError::orchestration("model unavailable"));
            }
            let outputs = crew
                .tasks
                .iter()
                .map(|task| TaskOutput {
                    task_id: task.id.to_string(),
                    agent: task.agent.kind,
                    agent_role: task.agent.role.clone(),
                    description: task.description.clone(),
                    raw: format!("### {}", task.description),
                })
                .collect();
            Ok(RunResult::from_outputs(outputs))
        }
    }

    fn request(company: &str, industry: &str, search_key: &str) -> ResearchRequest {
        ResearchRequest::new(
            company,
            industry,
            Credentials::new(SecretValue::new(search_key), SecretValue::new("sk-test")),
        )
    }

    fn orchestrator(runtime: Arc<CountingRuntime>, capacity: usize) -> ResearchOrchestrator {
        let config = Config {
            crew: CrewConfig {
                cache_capacity: capacity,
                ..CrewConfig::default()
            },
            ..Config::default()
        };
        ResearchOrchestrator::with_runtime(config, runtime)
    }

    #[tokio::test]
    async fn repeated_pair_hits_the_memo() {
        let runtime = Arc::new(CountingRuntime::default());
        let orchestrator = orchestrator(runtime.clone(), 100);

        let first = orchestrator.run(&request("Tata", "Automotive", "key")).await.unwrap();
        let second = orchestrator.run(&request("Tata", "Automotive", "key")).await.unwrap();

        assert_eq!(runtime.invocations.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.outputs().len(), 3);
    }

    #[tokio::test]
    async fn distinct_pairs_run_separately() {
        let runtime = Arc::new(CountingRuntime::default());
        let orchestrator = orchestrator(runtime.clone(), 100);

        orchestrator.run(&request("Tata", "Automotive", "key")).await.unwrap();
        orchestrator.run(&request("Tata", "Steel", "key")).await.unwrap();

        assert_eq!(runtime.invocations.load(Ordering::SeqCst), 2);
        assert_eq!(orchestrator.cached_entries().await, 2);
    }

    #[tokio::test]
    async fn least_recently_used_entry_is_evicted() {
        let runtime = Arc::new(CountingRuntime::default());
        let orchestrator = orchestrator(runtime.clone(), 2);

        orchestrator.run(&request("a", "x", "key")).await.unwrap();
        orchestrator.run(&request("b", "x", "key")).await.unwrap();
        orchestrator.run(&request("a", "x", "key")).await.unwrap();
        orchestrator.run(&request("c", "x", "key")).await.unwrap();
        assert_eq!(runtime.invocations.load(Ordering::SeqCst), 3);

        orchestrator.run(&request("a", "x", "key")).await.unwrap();
        assert_eq!(runtime.invocations.load(Ordering::SeqCst), 3);
        orchestrator.run(&request("b", "x", "key")).await.unwrap();
        assert_eq!(runtime.invocations.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn missing_search_key_fails_before_the_runtime() {
        let runtime = Arc::new(CountingRuntime::default());
        let orchestrator = orchestrator(runtime.clone(), 100);

        let err = orchestrator
            .run(&request("Tata", "Automotive", ""))
            .await
            .unwrap_err();

        assert!(matches!(err, StratAiError::Configuration(_)));
        assert_eq!(runtime.invocations.load(Ordering::SeqCst), 0);
        assert_eq!(orchestrator.cached_entries().await, 0);
    }

    #[tokio::test]
    async fn failures_are_not_memoised() {
        let runtime = Arc::new(CountingRuntime {
            fail: true,
            ..CountingRuntime::default()
        });
        let orchestrator = orchestrator(runtime.clone(), 100);

        for _ in 0..2 {
            let err = orchestrator
                .run(&request("Tata", "Automotive", "key"))
                .await
                .unwrap_err();
            assert!(matches!(err, StratAiError::Orchestration(_)));
        }
        assert_eq!(runtime.invocations.load(Ordering::SeqCst), 2);
        assert_eq!(orchestrator.cached_entries().await, 0);
    }
}
