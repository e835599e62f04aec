use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use stratai_core::{
    Credentials, ResearchOrchestrator, ResearchRequest, RunResult, SecretValue, StratAiError,
};
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use crate::config::AppConfig;
use crate::metrics;

#[derive(Clone)]
pub struct AppState {
    research: Arc<ResearchService>,
    sessions: Arc<SessionStore>,
    auth_token: Option<Arc<String>>,
}

impl AppState {
    pub fn try_new(config: &AppConfig) -> Result<Self> {
        let orchestrator = ResearchOrchestrator::new(config.core.clone());
        Ok(Self::with_orchestrator(config, Arc::new(orchestrator)))
    }

    pub fn with_orchestrator(config: &AppConfig, orchestrator: Arc<ResearchOrchestrator>) -> Self {
        Self {
            research: Arc::new(ResearchService::new(orchestrator, config.max_concurrency)),
            sessions: Arc::new(SessionStore::new(
                Duration::seconds(config.session_ttl_secs as i64),
                config.max_sessions,
            )),
            auth_token: config
                .auth_token
                .as_ref()
                .map(|token| Arc::new(token.to_string())),
        }
    }

    pub fn research(&self) -> Arc<ResearchService> {
        self.research.clone()
    }

    pub fn sessions(&self) -> Arc<SessionStore> {
        self.sessions.clone()
    }

    pub fn auth_token(&self) -> Option<Arc<String>> {
        self.auth_token.clone()
    }
}

/// Runs research on behalf of browser sessions and API callers, bounded by
/// a semaphore.
pub struct ResearchService {
    orchestrator: Arc<ResearchOrchestrator>,
    semaphore: Arc<Semaphore>,
    max_concurrency: usize,
    running: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
}

impl ResearchService {
    pub fn new(orchestrator: Arc<ResearchOrchestrator>, max_concurrency: usize) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            orchestrator,
            semaphore: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
            running: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        }
    }

    /// Keys typed into the form win; blank fields fall back to the
    /// environment variables named in the core configuration.
    pub fn resolve_credentials(
        &self,
        search_api_key: Option<&str>,
        llm_api_key: Option<&str>,
    ) -> Option<Credentials> {
        let config = self.orchestrator.config();
        let search = SecretValue::from_input_or_env(search_api_key, &config.search.api_key_env).ok()?;
        let llm = SecretValue::from_input_or_env(llm_api_key, &config.llm.api_key_env).ok()?;
        Some(Credentials::new(search, llm))
    }

    pub async fn research(
        &self,
        session_id: &str,
        request: ResearchRequest,
    ) -> Result<Arc<RunResult>, StratAiError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|err| StratAiError::orchestration(err.to_string()))?;

        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::research_started(session_id, running, self.semaphore.available_permits());

        let outcome = self.orchestrator.run(&request).await;
        let running = self.running.fetch_sub(1, Ordering::SeqCst) - 1;
        let available = self.semaphore.available_permits();

        match &outcome {
            Ok(result) => {
                self.completed.fetch_add(1, Ordering::SeqCst);
                info!(%session_id, company = %request.company, "research completed");
                metrics::research_completed(session_id, result.outputs().len(), running, available);
            }
            Err(err) => {
                self.failed.fetch_add(1, Ordering::SeqCst);
                error!(%session_id, error = %err, "research failed");
                metrics::research_failed(session_id, running, available, &err.to_string());
            }
        }

        outcome
    }

    pub fn metrics(&self) -> ServiceMetrics {
        ServiceMetrics {
            max_concurrency: self.max_concurrency,
            available_permits: self.semaphore.available_permits(),
            running_runs: self.running.load(Ordering::SeqCst),
            completed_runs: self.completed.load(Ordering::SeqCst),
            failed_runs: self.failed.load(Ordering::SeqCst),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ServiceMetrics {
    pub max_concurrency: usize,
    pub available_permits: usize,
    pub running_runs: usize,
    pub completed_runs: usize,
    pub failed_runs: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlashKind {
    Warning,
    Error,
}

#[derive(Clone, Debug)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

impl Flash {
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Error,
            message: message.into(),
        }
    }
}

/// Everything one browser session remembers between requests.
#[derive(Clone, Debug)]
pub struct SessionContext {
    pub company: String,
    pub industry: String,
    /// Latest research result; replaced by every new run.
    pub result: Option<Arc<RunResult>>,
    pub flashes: Vec<Flash>,
    pub updated_at: DateTime<Utc>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self {
            company: String::new(),
            industry: String::new(),
            result: None,
            flashes: Vec::new(),
            updated_at: Utc::now(),
        }
    }
}

/// In-memory session contexts. Contexts idle longer than `idle_ttl` are
/// dropped, and the least recently updated one is evicted once the store
/// holds `max_sessions`.
pub struct SessionStore {
    sessions: DashMap<String, SessionContext>,
    idle_ttl: Duration,
    max_sessions: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(
            Duration::seconds(AppConfig::DEFAULT_SESSION_TTL_SECS as i64),
            AppConfig::DEFAULT_MAX_SESSIONS,
        )
    }
}

impl SessionStore {
    pub fn new(idle_ttl: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            idle_ttl,
            max_sessions: max_sessions.max(1),
        }
    }

    fn is_live(&self, context: &SessionContext, now: DateTime<Utc>) -> bool {
        now - context.updated_at < self.idle_ttl
    }

    pub fn get(&self, session_id: &str) -> Option<SessionContext> {
        let now = Utc::now();
        self.sessions
            .get(session_id)
            .filter(|context| self.is_live(context.value(), now))
            .map(|context| context.value().clone())
    }

    pub fn update(&self, session_id: &str, apply: impl FnOnce(&mut SessionContext)) {
        if !self.sessions.contains_key(session_id) {
            self.make_room();
        }
        let now = Utc::now();
        let mut entry = self.sessions.entry(session_id.to_string()).or_default();
        if !self.is_live(entry.value(), now) {
            *entry.value_mut() = SessionContext::default();
        }
        apply(entry.value_mut());
        entry.updated_at = now;
    }

    /// Snapshot of the session with its flash messages consumed.
    pub fn take_for_render(&self, session_id: &str) -> Option<SessionContext> {
        let now = Utc::now();
        let mut context = self.sessions.get_mut(session_id)?;
        if !self.is_live(context.value(), now) {
            drop(context);
            self.sessions.remove(session_id);
            return None;
        }
        let snapshot = context.clone();
        context.flashes.clear();
        context.updated_at = now;
        Some(snapshot)
    }

    /// Drop idle contexts, then evict the stalest ones until a new session fits.
    fn make_room(&self) {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, context| now - context.updated_at < self.idle_ttl);

        while self.sessions.len() >= self.max_sessions {
            let oldest = self
                .sessions
                .iter()
                .min_by_key(|entry| entry.value().updated_at)
                .map(|entry| entry.key().clone());
            match oldest {
                Some(key) => {
                    self.sessions.remove(&key);
                }
                None => break,
            }
        }

        let evicted = before - self.sessions.len();
        if evicted > 0 {
            debug!(evicted, remaining = self.sessions.len(), "sessions evicted");
        }
    }

    pub fn remove(&self, session_id: &str) -> bool {
        self.sessions.remove(session_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flashes_are_shown_once() {
        let store = SessionStore::default();
        store.update("s1", |context| {
            context.company = "Tata".into();
            context.flashes.push(Flash::warning("missing"));
        });

        let first = store.take_for_render("s1").unwrap();
        assert_eq!(first.flashes.len(), 1);
        assert_eq!(first.company, "Tata");

        let second = store.take_for_render("s1").unwrap();
        assert!(second.flashes.is_empty());
        assert_eq!(second.company, "Tata");
    }

    #[test]
    fn remove_forgets_the_session() {
        let store = SessionStore::default();
        store.update("s1", |_| {});
        assert_eq!(store.len(), 1);
        assert!(store.remove("s1"));
        assert!(store.get("s1").is_none());
        assert!(!store.remove("s1"));
    }

    fn age(store: &SessionStore, session_id: &str, by: Duration) {
        store.sessions.get_mut(session_id).unwrap().updated_at = Utc::now() - by;
    }

    #[test]
    fn store_is_capped_by_evicting_the_stalest_session() {
        let store = SessionStore::new(Duration::hours(1), 3);
        for id in ["s1", "s2", "s3"] {
            store.update(id, |context| context.company = id.into());
        }
        age(&store, "s1", Duration::minutes(1));
        age(&store, "s2", Duration::minutes(3));
        age(&store, "s3", Duration::minutes(2));

        store.update("s4", |_| {});
        assert_eq!(store.len(), 3);
        assert!(store.get("s2").is_none());
        assert_eq!(store.get("s1").unwrap().company, "s1");
        assert!(store.get("s4").is_some());

        for index in 0..200 {
            store.update(&format!("anon-{index}"), |_| {});
        }
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn idle_sessions_expire() {
        let store = SessionStore::new(Duration::zero(), 10);
        store.update("s1", |context| context.company = "Tata".into());
        assert!(store.get("s1").is_none());
        assert!(store.take_for_render("s1").is_none());

        store.update("s2", |_| {});
        store.update("s3", |_| {});
        assert!(store.get("s1").is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn expired_context_is_reset_before_reuse() {
        let store = SessionStore::new(Duration::hours(1), 10);
        store.update("s1", |context| {
            context.company = "Tata".into();
            context.flashes.push(Flash::warning("missing"));
        });
        age(&store, "s1", Duration::hours(2));

        store.update("s1", |_| {});
        let context = store.get("s1").unwrap();
        assert_eq!(context.company, "");
        assert!(context.flashes.is_empty());
    }
}
