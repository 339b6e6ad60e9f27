//! Runtime configuration from environment variables

use std::env;
use std::str::FromStr;

use mirror_embedding::batcher::DEFAULT_TOKEN_BUDGET;
use mirror_embedding::store::DEFAULT_INDEX_THRESHOLD;
use mirror_manifold::session::DEFAULT_WS_URL;
use mirror_manifold::types::MANIFOLD_API_BASE;

/// Mirror configuration
///
/// Reads:
/// - MANIFOLD_WS_URL, MANIFOLD_API_URL: endpoints
/// - OPENAI_API_KEY: needed for the bulk import only
/// - MIRROR_DB_PATH: SQLite file (default `data/markets.db`)
/// - EMBEDDING_TOKEN_BUDGET, INDEX_THRESHOLD: numeric overrides
/// - SKIP_IMPORT: `1`/`true` to go straight to live sync
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    pub ws_url: String,
    pub api_url: String,
    pub openai_api_key: Option<String>,
    pub db_path: String,
    pub token_budget: usize,
    pub index_threshold: usize,
    pub skip_import: bool,
}

impl MirrorConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let skip_import = match lookup("SKIP_IMPORT") {
            Some(value) => parse_flag("SKIP_IMPORT", &value)?,
            None => false,
        };

        Ok(Self {
            ws_url: lookup("MANIFOLD_WS_URL").unwrap_or_else(|| DEFAULT_WS_URL.to_string()),
            api_url: lookup("MANIFOLD_API_URL").unwrap_or_else(|| MANIFOLD_API_BASE.to_string()),
            openai_api_key: lookup("OPENAI_API_KEY").filter(|k| !k.is_empty()),
            db_path: lookup("MIRROR_DB_PATH").unwrap_or_else(|| "data/markets.db".to_string()),
            token_budget: parse_number(&lookup, "EMBEDDING_TOKEN_BUDGET", DEFAULT_TOKEN_BUDGET)?,
            index_threshold: parse_number(&lookup, "INDEX_THRESHOLD", DEFAULT_INDEX_THRESHOLD)?,
            skip_import,
        })
    }
}

fn parse_number<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    field: &str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(field) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::InvalidValue {
            field: field.to_string(),
            value,
        }),
        None => Ok(default),
    }
}

fn parse_flag(field: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value:?}")]
    InvalidValue { field: String, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<MirrorConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        MirrorConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.ws_url, "wss://api.manifold.markets/ws");
        assert_eq!(config.api_url, "https://api.manifold.markets");
        assert_eq!(config.db_path, "data/markets.db");
        assert_eq!(config.token_budget, 30_000);
        assert_eq!(config.index_threshold, 10_000);
        assert!(config.openai_api_key.is_none());
        assert!(!config.skip_import);
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("EMBEDDING_TOKEN_BUDGET", "8000"),
            ("INDEX_THRESHOLD", " 500 "),
            ("SKIP_IMPORT", "true"),
            ("OPENAI_API_KEY", "sk-test"),
        ])
        .unwrap();
        assert_eq!(config.token_budget, 8000);
        assert_eq!(config.index_threshold, 500);
        assert!(config.skip_import);
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn test_invalid_number() {
        let err = config(&[("INDEX_THRESHOLD", "lots")]).unwrap_err();
        assert!(err.to_string().contains("INDEX_THRESHOLD"));
    }

    #[test]
    fn test_invalid_flag() {
        assert!(config(&[("SKIP_IMPORT", "maybe")]).is_err());
    }
}
