use anyhow::{anyhow, Context, Result};

use crate::patch::UndoPolicy;

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    /// What undo does to a field that did not exist before the suggestion.
    pub undo_policy: UndoPolicy,
    pub max_sessions: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            undo_policy: parse_undo_policy(std::env::var("UNDO_UNSET_POLICY").ok().as_deref())?,
            max_sessions: std::env::var("MAX_SESSIONS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse::<usize>()
                .context("MAX_SESSIONS must be a positive integer")?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_undo_policy(raw: Option<&str>) -> Result<UndoPolicy> {
    match raw {
        None => Ok(UndoPolicy::default()),
        Some(value) => value
            .parse()
            .map_err(|e| anyhow!("UNDO_UNSET_POLICY: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undo_policy_defaults_to_keep() {
        assert_eq!(parse_undo_policy(None).unwrap(), UndoPolicy::KeepSuggested);
    }

    #[test]
    fn test_undo_policy_values() {
        assert_eq!(parse_undo_policy(Some("remove")).unwrap(), UndoPolicy::RemoveField);
        assert_eq!(parse_undo_policy(Some("keep")).unwrap(), UndoPolicy::KeepSuggested);
        assert!(parse_undo_policy(Some("sometimes")).is_err());
    }
}
