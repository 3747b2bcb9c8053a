//! Core configuration loaded from environment variables.
//!
//! Every setting has a default, so an embedding app can start the core with
//! zero configuration and override only what it needs.

use std::time::Duration;

use spark_shared::constants::{MAX_UPLOAD_SIZE, PUSH_TIMEOUT_MS, REQUEST_TIMEOUT_MS, TYPING_WINDOW_MS};

/// Capacity of the render-layer update channel.
const UPDATE_BUFFER: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub struct CoreConfig {
    /// Base URL of the REST API.
    /// Env: `SPARK_API_URL`
    /// Default: `http://localhost:5000/api`
    pub api_url: String,

    /// Bearer token sent with REST requests.
    /// Env: `SPARK_API_TOKEN`
    /// Default: none.
    pub api_token: Option<String>,

    /// How long a push emit may wait for its acknowledgement before the
    /// send falls back to the API.
    /// Env: `SPARK_PUSH_TIMEOUT_MS`
    pub push_timeout: Duration,

    /// A typing signal older than this is no longer shown.
    /// Env: `SPARK_TYPING_WINDOW_MS`
    pub typing_window: Duration,

    /// Largest attachment accepted by `send_file`.  Can be lowered, never
    /// raised above the protocol cap of 5 MiB.
    /// Env: `SPARK_MAX_UPLOAD_BYTES`
    pub max_upload_bytes: usize,

    /// Per-request timeout of the HTTP client.
    /// Env: `SPARK_REQUEST_TIMEOUT_MS`
    pub request_timeout: Duration,

    pub update_buffer: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:5000/api".to_string(),
            api_token: None,
            push_timeout: Duration::from_millis(PUSH_TIMEOUT_MS),
            typing_window: Duration::from_millis(TYPING_WINDOW_MS),
            max_upload_bytes: MAX_UPLOAD_SIZE,
            request_timeout: Duration::from_millis(REQUEST_TIMEOUT_MS),
            update_buffer: UPDATE_BUFFER,
        }
    }
}

impl CoreConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("SPARK_API_URL") {
            if url.trim().is_empty() {
                tracing::warn!("Empty SPARK_API_URL, using default");
            } else {
                config.api_url = url.trim().trim_end_matches('/').to_string();
            }
        }

        if let Some(token) = lookup("SPARK_API_TOKEN") {
            if !token.is_empty() {
                config.api_token = Some(token);
            }
        }

        if let Some(ms) = millis(&lookup, "SPARK_PUSH_TIMEOUT_MS") {
            config.push_timeout = ms;
        }

        if let Some(ms) = millis(&lookup, "SPARK_TYPING_WINDOW_MS") {
            config.typing_window = ms;
        }

        if let Some(ms) = millis(&lookup, "SPARK_REQUEST_TIMEOUT_MS") {
            config.request_timeout = ms;
        }

        if let Some(val) = lookup("SPARK_MAX_UPLOAD_BYTES") {
            match val.trim().parse::<usize>() {
                Ok(n) if n > MAX_UPLOAD_SIZE => {
                    tracing::warn!(value = n, max = MAX_UPLOAD_SIZE, "SPARK_MAX_UPLOAD_BYTES above cap, clamping");
                    config.max_upload_bytes = MAX_UPLOAD_SIZE;
                }
                Ok(n) if n > 0 => config.max_upload_bytes = n,
                _ => tracing::warn!(value = %val, "Invalid SPARK_MAX_UPLOAD_BYTES, using default"),
            }
        }

        config
    }
}

/// Parse a positive millisecond duration.  Invalid values are logged and
/// ignored.
fn millis<F>(lookup: &F, key: &str) -> Option<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let val = lookup(key)?;
    match val.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Some(Duration::from_millis(ms)),
        _ => {
            tracing::warn!(key, value = %val, "Invalid duration, using default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = CoreConfig::default();
        assert_eq!(config.push_timeout, Duration::from_millis(4_000));
        assert_eq!(config.typing_window, Duration::from_millis(3_000));
        assert_eq!(config.max_upload_bytes, 5 * 1024 * 1024);
        assert!(config.api_token.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = CoreConfig::from_lookup(lookup(&[
            ("SPARK_API_URL", "https://chat.example.com/api/"),
            ("SPARK_API_TOKEN", "secret"),
            ("SPARK_PUSH_TIMEOUT_MS", "1500"),
            ("SPARK_MAX_UPLOAD_BYTES", "1024"),
        ]));
        assert_eq!(config.api_url, "https://chat.example.com/api");
        assert_eq!(config.api_token.as_deref(), Some("secret"));
        assert_eq!(config.push_timeout, Duration::from_millis(1500));
        assert_eq!(config.max_upload_bytes, 1024);
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = CoreConfig::from_lookup(lookup(&[
            ("SPARK_PUSH_TIMEOUT_MS", "soon"),
            ("SPARK_TYPING_WINDOW_MS", "0"),
            ("SPARK_MAX_UPLOAD_BYTES", "-3"),
            ("SPARK_API_TOKEN", ""),
        ]));
        assert_eq!(config, CoreConfig::default());
    }

    #[test]
    fn test_upload_cap_cannot_be_raised() {
        let config = CoreConfig::from_lookup(lookup(&[("SPARK_MAX_UPLOAD_BYTES", "104857600")]));
        assert_eq!(config.max_upload_bytes, MAX_UPLOAD_SIZE);
    }
}
