use std::env;

use crate::StratAiError;

/// Wrapper around sensitive values to reduce accidental logging.
#[derive(Clone)]
pub struct SecretValue(String);

impl SecretValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Use the value typed by the user when present, otherwise fall back to `var`.
    pub fn from_input_or_env(input: Option<&str>, var: &str) -> Result<Self, StratAiError> {
        match input.map(str::trim).filter(|value| !value.is_empty()) {
            Some(value) => Ok(Self::new(value)),
            None => require_env(var),
        }
    }
}

impl std::fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "***redacted***")
    }
}

/// Require that a given environment variable is set and non-empty.
pub fn require_env(var: &str) -> Result<SecretValue, StratAiError> {
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(SecretValue(value)),
        _ => Err(StratAiError::MissingSecret(var.to_string())),
    }
}

/// API keys for one research run. They are handed to the search and model
/// clients directly; nothing is written back into the process environment.
#[derive(Clone, Debug)]
pub struct Credentials {
    pub search_api_key: SecretValue,
    pub llm_api_key: SecretValue,
}

impl Credentials {
    pub fn new(search_api_key: SecretValue, llm_api_key: SecretValue) -> Self {
        Self {
            search_api_key,
            llm_api_key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_env_success() {
        unsafe {
            std::env::set_var("STRATAI_TEST_SECRET", "value");
        }
        let secret = require_env("STRATAI_TEST_SECRET").expect("secret should load");
        assert_eq!(secret.expose(), "value");
    }

    #[test]
    fn require_env_missing() {
        unsafe {
            std::env::remove_var("STRATAI_TEST_SECRET_MISSING");
        }
        let err = require_env("STRATAI_TEST_SECRET_MISSING").unwrap_err();
        assert!(matches!(err, StratAiError::MissingSecret(_)));
    }

    #[test]
    fn typed_input_wins_over_environment() {
        let secret =
            SecretValue::from_input_or_env(Some("  typed-key "), "STRATAI_TEST_UNUSED").unwrap();
        assert_eq!(secret.expose(), "typed-key");
    }

    #[test]
    fn blank_input_falls_back_to_environment() {
        unsafe {
            std::env::set_var("STRATAI_TEST_FALLBACK", "from-env");
        }
        let secret = SecretValue::from_input_or_env(Some("   "), "STRATAI_TEST_FALLBACK").unwrap();
        assert_eq!(secret.expose(), "from-env");
    }

    #[test]
    fn debug_output_is_redacted() {
        let credentials = Credentials::new(SecretValue::new("serper"), SecretValue::new("sk-1"));
        let printed = format!("{credentials:?}");
        assert!(!printed.contains("serper"));
        assert!(!printed.contains("sk-1"));
        assert!(printed.contains("***redacted***"));
    }
}
