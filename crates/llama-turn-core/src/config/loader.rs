//! Configuration loader for YAML files and environment resolution

use std::env;
use std::path::Path;

use tokio::fs;

use crate::config::types::*;
use crate::errors::TurnError;

/// Environment variable overriding `server.base_url`.
pub const BASE_URL_ENV: &str = "LLAMA_STACK_BASE_URL";
/// Environment variable consulted for the API key when none is configured.
pub const API_KEY_ENV: &str = "LLAMA_STACK_API_KEY";

/// Configuration loader with environment resolution
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a YAML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<LlamaTurnConfig, TurnError> {
        let path = path.as_ref();

        let content = fs::read_to_string(path).await.map_err(|e| {
            TurnError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::from_str(&content).await
    }

    /// Load configuration from a file, using defaults when the file does not exist
    pub async fn from_file_or_default<P: AsRef<Path>>(
        path: P,
    ) -> Result<LlamaTurnConfig, TurnError> {
        let path = path.as_ref();
        if fs::try_exists(path).await.unwrap_or(false) {
            return Self::from_file(path).await;
        }

        log::debug!(
            "Config file {} not found, using defaults",
            path.display()
        );
        let mut config = LlamaTurnConfig::default();
        Self::resolve_environment(&mut config, |key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML string
    pub async fn from_str(content: &str) -> Result<LlamaTurnConfig, TurnError> {
        let mut config = Self::parse(content)?;

        Self::resolve_environment(&mut config, |key| env::var(key).ok());

        config.validate()?;

        Ok(config)
    }

    fn parse(content: &str) -> Result<LlamaTurnConfig, TurnError> {
        // An empty document parses as null, which serde_yaml rejects for a struct.
        if content.trim().is_empty() {
            return Ok(LlamaTurnConfig::default());
        }

        serde_yaml::from_str(content)
            .map_err(|e| TurnError::Config(format!("Failed to parse YAML config: {}", e)))
    }

    /// Apply environment overrides using `lookup` to read variables.
    pub fn resolve_environment<F>(config: &mut LlamaTurnConfig, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(base_url) = lookup(BASE_URL_ENV).filter(|v| !v.is_empty()) {
            log::debug!("Overriding server base_url from {}", BASE_URL_ENV);
            config.server.base_url = base_url;
        }

        Self::resolve_server_auth(&mut config.server.auth, &lookup);
    }

    fn resolve_server_auth<F>(auth: &mut ServerAuth, lookup: &F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(env_var) = &auth.api_key_env {
            if let Some(api_key) = lookup(env_var) {
                auth.api_key = Some(api_key);
            }
        }

        if auth.api_key.is_none() {
            auth.api_key = lookup(API_KEY_ENV);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_empty_document_yields_defaults() {
        let config = ConfigLoader::parse("").unwrap();
        assert_eq!(config.server.base_url, "http://localhost:8321");
        assert_eq!(config.server.timeout_secs, 120);
        assert_eq!(config.turn.max_rounds, 10);
        assert_eq!(config.turn.max_rounds, crate::driver::DEFAULT_MAX_ROUNDS);
        assert_eq!(config.rag.vector_db_ids, vec!["my-documents"]);
        assert_eq!(config.rag.tool_markers, vec!["rag", "knowledge_search"]);
        assert_eq!(config.rag.empty_result_text, EMPTY_RAG_RESULT);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = ConfigLoader::parse(
            r#"
server:
  base_url: http://stack:9000
turn:
  max_rounds: 3
rag:
  vector_db_ids: [pets]
  query_config:
    max_chunks: 5
    mode: vector
"#,
        )
        .unwrap();

        assert_eq!(config.server.base_url, "http://stack:9000");
        assert_eq!(config.server.timeout_secs, 120);
        assert_eq!(config.turn.max_rounds, 3);
        assert_eq!(config.rag.vector_db_ids, vec!["pets"]);
        assert_eq!(config.rag.tool_markers.len(), 2);

        let query_config = config.rag.query_config.unwrap();
        assert_eq!(query_config.max_chunks, Some(5));
        assert_eq!(query_config.max_tokens_in_context, None);
        assert_eq!(query_config.mode.as_deref(), Some("vector"));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = LlamaTurnConfig::default();
        config.turn.max_rounds = 0;
        assert!(matches!(config.validate(), Err(TurnError::Config(_))));

        let mut config = LlamaTurnConfig::default();
        config.server.base_url = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = LlamaTurnConfig::default();
        config.server.timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = LlamaTurnConfig::default();
        config.rag.tool_markers.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_environment_overrides_base_url_and_key() {
        let mut config = LlamaTurnConfig::default();
        ConfigLoader::resolve_environment(
            &mut config,
            lookup_from(&[
                (BASE_URL_ENV, "http://remote:8321"),
                (API_KEY_ENV, "secret"),
            ]),
        );

        assert_eq!(config.server.base_url, "http://remote:8321");
        assert_eq!(config.server.auth.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn test_api_key_env_takes_precedence() {
        let mut config = LlamaTurnConfig::default();
        config.server.auth.api_key_env = Some("MY_STACK_KEY".to_string());

        ConfigLoader::resolve_environment(
            &mut config,
            lookup_from(&[("MY_STACK_KEY", "mine"), (API_KEY_ENV, "fallback")]),
        );
        assert_eq!(config.server.auth.api_key.as_deref(), Some("mine"));

        let mut config = LlamaTurnConfig::default();
        config.server.auth.api_key_env = Some("UNSET_KEY".to_string());
        ConfigLoader::resolve_environment(&mut config, lookup_from(&[(API_KEY_ENV, "fallback")]));
        assert_eq!(config.server.auth.api_key.as_deref(), Some("fallback"));

        let mut config = LlamaTurnConfig::default();
        config.server.auth.api_key = Some("literal".to_string());
        ConfigLoader::resolve_environment(&mut config, lookup_from(&[(API_KEY_ENV, "fallback")]));
        assert_eq!(config.server.auth.api_key.as_deref(), Some("literal"));
    }

    #[tokio::test]
    async fn test_from_file_reads_yaml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "turn:\n  max_rounds: 4\nlogging:\n  level: debug\nagent:\n  name: Pets"
        )
        .unwrap();

        let config = ConfigLoader::from_file(file.path()).await.unwrap();
        assert_eq!(config.turn.max_rounds, 4);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.agent.name, "Pets");
        assert_eq!(config.agent.max_infer_iters, 10);
    }

    #[tokio::test]
    async fn test_from_file_rejects_invalid_yaml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "turn: [not, a, map").unwrap();

        let err = ConfigLoader::from_file(file.path()).await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse YAML config"));
    }

    #[tokio::test]
    async fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigLoader::from_file_or_default(dir.path().join("absent.yaml"))
            .await
            .unwrap();
        assert_eq!(config.turn.max_rounds, 10);

        assert!(ConfigLoader::from_file(dir.path().join("absent.yaml"))
            .await
            .is_err());
    }
}
