use crate::infrastructure::error::InfraError;
use crate::infrastructure::http::HttpSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const CONSOLE_JSON: &str = "console.json";
pub const API_URL_ENV: &str = "LAB_CONSOLE_API_URL";
const SUPPORTED_SCHEMA: u64 = 1;
const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/scheduling/";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct ConsoleConfig {
    pub schema: u64,
    pub base_url: String,
    pub poll_interval_ms: u64,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub retry: RetrySettings,
    pub active_only: bool,
    pub log_filter: String,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            schema: SUPPORTED_SCHEMA,
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval_ms: 5_000,
            connect_timeout_ms: 5_000,
            request_timeout_ms: 15_000,
            retry: RetrySettings::default(),
            active_only: false,
            log_filter: "info".to_string(),
        }
    }
}

impl ConsoleConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            base_url: self.base_url.clone(),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }

    fn validate(&self, path: &Path) -> Result<(), InfraError> {
        if self.base_url.trim().is_empty() {
            return Err(InfraError::InvalidConfig(format!(
                "baseUrl must not be empty in {}",
                path.display()
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(InfraError::InvalidConfig(format!(
                "pollIntervalMs must be > 0 in {}",
                path.display()
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(InfraError::InvalidConfig(format!(
                "retry.maxAttempts must be > 0 in {}",
                path.display()
            )));
        }
        Ok(())
    }
}

pub fn ensure_default_config(config_dir: &Path) -> Result<(), InfraError> {
    let path = config_dir.join(CONSOLE_JSON);
    if path.exists() {
        return Ok(());
    }
    fs::create_dir_all(config_dir)?;
    let formatted = serde_json::to_string_pretty(&ConsoleConfig::default())?;
    fs::write(path, format!("{formatted}\n"))?;
    Ok(())
}

fn read_config(path: &Path) -> Result<ConsoleConfig, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != SUPPORTED_SCHEMA {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    let config: ConsoleConfig = serde_json::from_value(parsed)?;
    config.validate(path)?;
    Ok(config)
}

pub fn load_config(config_dir: &Path) -> Result<ConsoleConfig, InfraError> {
    let override_url = std::env::var(API_URL_ENV).ok();
    load_config_with_override(config_dir, override_url.as_deref())
}

fn load_config_with_override(
    config_dir: &Path,
    base_url_override: Option<&str>,
) -> Result<ConsoleConfig, InfraError> {
    let mut config = read_config(&config_dir.join(CONSOLE_JSON))?;
    if let Some(base_url) = base_url_override
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        config.base_url = base_url.to_string();
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_DIR: AtomicUsize = AtomicUsize::new(0);

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "labconsole-config-{}-{}",
            std::process::id(),
            NEXT_DIR.fetch_add(1, Ordering::SeqCst)
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn default_config_is_written_once_and_loads() {
        let dir = scratch_dir();
        ensure_default_config(&dir).expect("write defaults");
        let path = dir.join(CONSOLE_JSON);
        fs::write(
            &path,
            r#"{"schema": 1, "baseUrl": "http://robot-pc:9000/api/", "pollIntervalMs": 2000}"#,
        )
        .expect("customize");
        ensure_default_config(&dir).expect("second call keeps file");

        let config = load_config_with_override(&dir, None).expect("load");
        assert_eq!(config.base_url, "http://robot-pc:9000/api/");
        assert_eq!(config.poll_interval(), Duration::from_secs(2));
        assert_eq!(config.retry, RetrySettings::default());
        assert_eq!(config.log_filter, "info");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn unsupported_schema_is_rejected() {
        let dir = scratch_dir();
        fs::create_dir_all(&dir).expect("dir");
        fs::write(dir.join(CONSOLE_JSON), r#"{"schema": 2}"#).expect("write");
        let error = load_config_with_override(&dir, None).expect_err("schema 2");
        assert!(matches!(error, InfraError::InvalidConfig(message) if message.contains("unsupported schema 2")));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn env_override_replaces_base_url_unless_blank() {
        let dir = scratch_dir();
        ensure_default_config(&dir).expect("defaults");
        let config = load_config_with_override(&dir, Some(" http://override/api/ ")).expect("load");
        assert_eq!(config.base_url, "http://override/api/");
        let config = load_config_with_override(&dir, Some("  ")).expect("load");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn zero_poll_interval_is_invalid() {
        let dir = scratch_dir();
        fs::create_dir_all(&dir).expect("dir");
        fs::write(dir.join(CONSOLE_JSON), r#"{"schema": 1, "pollIntervalMs": 0}"#).expect("write");
        assert!(matches!(
            load_config_with_override(&dir, None),
            Err(InfraError::InvalidConfig(_))
        ));
        let _ = fs::remove_dir_all(&dir);
    }
}
