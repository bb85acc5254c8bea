//! Client configuration.
//!
//! Values are fixed at construction; nothing here is reconfigurable at runtime.

use std::time::Duration;

/// Document creation endpoint of the CRPT "true API".
pub const DEFAULT_ENDPOINT: &str = "https://ismp.crpt.ru/api/v3/lk/documents/create";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("request limit must be greater than zero")]
    ZeroLimit,
    #[error("window period must be greater than zero")]
    ZeroPeriod,
    #[error("invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("invalid value for {var}: '{value}'")]
    InvalidEnv { var: &'static str, value: String },
    #[error("permit pool needs a running tokio runtime")]
    NoRuntime,
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Admission gate parameters: at most `limit` submissions start per `period`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateConfig {
    pub limit: usize,
    pub period: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            limit: 1,
            period: Duration::from_secs(1),
        }
    }
}

impl GateConfig {
    pub fn new(limit: usize, period: Duration) -> Self {
        Self { limit, period }
    }

    /// `limit` submissions per second.
    pub fn per_second(limit: usize) -> Self {
        Self::new(limit, Duration::from_secs(1))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limit == 0 {
            return Err(ConfigError::ZeroLimit);
        }
        if self.period.is_zero() {
            return Err(ConfigError::ZeroPeriod);
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: String,
    pub request_timeout: Duration,
    pub gate: GateConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout: Duration::from_secs(30),
            gate: GateConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `CRPT_API_URL`, `CRPT_REQUEST_LIMIT`,
    /// `CRPT_WINDOW_MS` and `CRPT_REQUEST_TIMEOUT_MS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(url) = lookup("CRPT_API_URL") {
            config.endpoint = url;
        }
        if let Some(limit) = parse_var(&lookup, "CRPT_REQUEST_LIMIT")? {
            config.gate.limit = limit;
        }
        if let Some(ms) = parse_var(&lookup, "CRPT_WINDOW_MS")? {
            config.gate.period = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var(&lookup, "CRPT_REQUEST_TIMEOUT_MS")? {
            config.request_timeout = Duration::from_millis(ms);
        }

        Ok(config)
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_gate(mut self, gate: GateConfig) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.gate.validate()?;
        reqwest::Url::parse(&self.endpoint).map_err(|e| ConfigError::InvalidEndpoint {
            endpoint: self.endpoint.clone(),
            reason: e.to_string(),
        })?;
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.gate, GateConfig::per_second(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_limit_rejected() {
        let gate = GateConfig::new(0, Duration::from_secs(1));
        assert!(matches!(gate.validate(), Err(ConfigError::ZeroLimit)));
    }

    #[test]
    fn zero_period_rejected() {
        let gate = GateConfig::new(3, Duration::ZERO);
        assert!(matches!(gate.validate(), Err(ConfigError::ZeroPeriod)));
    }

    #[test]
    fn bad_endpoint_rejected() {
        let config = ClientConfig::default().with_endpoint("not a url");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn env_overrides() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("CRPT_API_URL", "http://localhost:8080/api/v3/lk/documents/create"),
            ("CRPT_REQUEST_LIMIT", "5"),
            ("CRPT_WINDOW_MS", "250"),
            ("CRPT_REQUEST_TIMEOUT_MS", "1500"),
        ]))
        .unwrap();

        assert_eq!(
            config.endpoint,
            "http://localhost:8080/api/v3/lk/documents/create"
        );
        assert_eq!(config.gate.limit, 5);
        assert_eq!(config.gate.period, Duration::from_millis(250));
        assert_eq!(config.request_timeout, Duration::from_millis(1500));
    }

    #[test]
    fn env_unparseable_value() {
        let err = ClientConfig::from_lookup(lookup_from(&[("CRPT_REQUEST_LIMIT", "many")]))
            .unwrap_err();
        match err {
            ConfigError::InvalidEnv { var, value } => {
                assert_eq!(var, "CRPT_REQUEST_LIMIT");
                assert_eq!(value, "many");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
