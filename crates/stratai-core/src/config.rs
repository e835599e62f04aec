use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::StratAiError;

const DEFAULT_CONFIG_PATH: &str = "config.toml";
const CONFIG_PATH_ENV: &str = "STRATAI_CONFIG";

/// Top-level configuration structure. Every section has defaults, so an
/// empty file (or no file at all) is a valid configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub crew: CrewConfig,
    pub logging: LoggingConfig,
}

/// Helper to load configuration with guard rails.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a provided path or discoverable defaults.
    ///
    /// Resolution order:
    /// 1. Explicit `path` argument.
    /// 2. `STRATAI_CONFIG` environment variable.
    /// 3. `config.toml` in the current working directory.
    pub fn load(path: Option<PathBuf>) -> Result<Config, StratAiError> {
        let candidate = resolve_path(path);
        Self::load_file(&candidate)
    }

    /// Like [`ConfigLoader::load`], but an absent default `config.toml` yields
    /// [`Config::default`]. Explicitly requested files must exist.
    pub fn load_or_default(path: Option<PathBuf>) -> Result<Config, StratAiError> {
        let explicit = path.is_some() || env_path().is_some();
        let candidate = resolve_path(path);
        if !explicit && !candidate.exists() {
            let config = Config::default();
            Self::validate(&config)?;
            return Ok(config);
        }
        Self::load_file(&candidate)
    }

    pub fn from_toml_str(raw: &str) -> Result<Config, StratAiError> {
        let config: Config = toml::from_str(raw)
            .map_err(|err| StratAiError::InvalidConfiguration(err.to_string()))?;
        Self::validate(&config)?;
        Ok(config)
    }

    fn load_file(candidate: &Path) -> Result<Config, StratAiError> {
        let raw = fs::read_to_string(candidate)
            .map_err(|err| StratAiError::config_io(candidate.to_path_buf(), err))?;
        Self::from_toml_str(&raw)
    }

    fn validate(config: &Config) -> Result<(), StratAiError> {
        if config.crew.max_rpm == 0 {
            return Err(StratAiError::InvalidConfiguration(
                "crew.max_rpm must be greater than zero".into(),
            ));
        }
        if config.crew.max_iterations == 0 {
            return Err(StratAiError::InvalidConfiguration(
                "crew.max_iterations must be greater than zero".into(),
            ));
        }
        if config.crew.cache_capacity == 0 {
            return Err(StratAiError::InvalidConfiguration(
                "crew.cache_capacity must be greater than zero".into(),
            ));
        }
        if config.llm.model.trim().is_empty() {
            return Err(StratAiError::InvalidConfiguration(
                "llm.model must not be empty".into(),
            ));
        }
        Ok(())
    }
}

fn env_path() -> Option<PathBuf> {
    env::var(CONFIG_PATH_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
}

fn resolve_path(path: Option<PathBuf>) -> PathBuf {
    if let Some(path) = path {
        return path;
    }

    if let Some(from_env) = env_path() {
        return from_env;
    }

    Path::new(DEFAULT_CONFIG_PATH).to_path_buf()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub serper_url: String,
    pub api_key_env: String,
    pub results_per_query: u8,
    pub website_timeout_secs: u64,
    pub website_max_chunks: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            serper_url: "https://google.serper.dev/search".to_string(),
            api_key_env: "SERPER_API_KEY".to_string(),
            results_per_query: 10,
            website_timeout_secs: 30,
            website_max_chunks: 4,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrewConfig {
    /// Ceiling on model and tool requests per minute, shared by every run.
    pub max_rpm: u32,
    pub max_iterations: usize,
    pub cache_capacity: usize,
}

impl Default for CrewConfig {
    fn default() -> Self {
        Self {
            max_rpm: 8,
            max_iterations: 15,
            cache_capacity: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_uses_defaults() {
        let config = ConfigLoader::from_toml_str("").expect("defaults are valid");
        assert_eq!(config.crew.max_rpm, 8);
        assert_eq!(config.crew.cache_capacity, 100);
        assert_eq!(config.search.serper_url, "https://google.serper.dev/search");
        assert_eq!(config.llm.api_key_env, "OPENAI_API_KEY");
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = ConfigLoader::from_toml_str(
            r#"
            [llm]
            model = "gpt-4o"

            [crew]
            max_rpm = 20
            "#,
        )
        .unwrap();
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.llm.base_url, "https://api.openai.com/v1");
        assert_eq!(config.crew.max_rpm, 20);
        assert_eq!(config.crew.max_iterations, 15);
    }

    #[test]
    fn zero_rpm_is_rejected() {
        let err = ConfigLoader::from_toml_str("[crew]\nmax_rpm = 0\n").unwrap_err();
        assert!(matches!(err, StratAiError::InvalidConfiguration(_)));
    }

    #[test]
    fn explicit_missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        let err = ConfigLoader::load_or_default(Some(missing)).unwrap_err();
        assert!(matches!(err, StratAiError::ConfigIo { .. }));
    }

    #[test]
    fn loads_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[search]\nresults_per_query = 5").unwrap();
        let config = ConfigLoader::load(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.search.results_per_query, 5);
    }
}
