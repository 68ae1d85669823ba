//! Transport settings read from the environment.

use std::time::Duration;

use thiserror::Error;

pub const BASE_URL_VAR: &str = "TYPED_QUERY_BASE_URL";
pub const TIMEOUT_VAR: &str = "TYPED_QUERY_TIMEOUT_MS";
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("TYPED_QUERY_TIMEOUT_MS must be a whole number of milliseconds, got {0:?}")]
    InvalidTimeout(String),
}

/// Base URL and default timeout shared by every request of an
/// [`HttpTransport`](crate::HttpTransport).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    pub base_url: String,
    pub timeout: Option<Duration>,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: None,
        }
    }
}

impl TransportSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env) but reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = lookup(BASE_URL_VAR)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let timeout = match lookup(TIMEOUT_VAR) {
            Some(raw) => {
                let millis: u64 = raw
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidTimeout(raw.clone()))?;
                Some(Duration::from_millis(millis))
            }
            None => None,
        };
        Ok(Self { base_url, timeout })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let settings = TransportSettings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings, TransportSettings::default());
    }

    #[test]
    fn reads_base_url_and_timeout() {
        let settings = TransportSettings::from_lookup(lookup(&[
            (BASE_URL_VAR, "http://api.internal:8080/"),
            (TIMEOUT_VAR, "2500"),
        ]))
        .unwrap();
        assert_eq!(settings.base_url, "http://api.internal:8080/");
        assert_eq!(settings.timeout, Some(Duration::from_millis(2500)));
    }

    #[test]
    fn blank_base_url_falls_back() {
        let settings = TransportSettings::from_lookup(lookup(&[(BASE_URL_VAR, "  ")])).unwrap();
        assert_eq!(settings.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn rejects_bad_timeout() {
        let err = TransportSettings::from_lookup(lookup(&[(TIMEOUT_VAR, "soon")])).unwrap_err();
        assert_eq!(err, ConfigError::InvalidTimeout("soon".to_string()));
    }
}
