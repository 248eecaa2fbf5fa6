//! Network configuration for the gateway server.

use std::time::Duration;

/// Top-level network configuration.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Bind address for the server.
    pub host: String,
    /// Port to listen on. 0 means OS-assigned.
    pub port: u16,
    /// Allowed CORS origins. `"*"` allows any origin.
    pub cors_origins: Vec<String>,
    /// Maximum time to wait for a request to complete.
    pub request_timeout: Duration,
    /// Maximum accepted request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 0,
            cors_origins: vec!["*".to_string()],
            request_timeout: Duration::from_secs(30),
            max_body_bytes: 1_048_576, // 1 MiB
        }
    }
}

impl NetworkConfig {
    /// Builds a config from defaults with `FUNCGATE_HOST` / `FUNCGATE_PORT`
    /// environment overrides. Unparseable ports fall back to the default.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(host) = std::env::var("FUNCGATE_HOST") {
            if !host.is_empty() {
                config.host = host;
            }
        }
        if let Some(port) = std::env::var("FUNCGATE_PORT")
            .ok()
            .and_then(|value| value.parse().ok())
        {
            config.port = port;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = NetworkConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 0);
        assert_eq!(config.cors_origins, vec!["*"]);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.max_body_bytes, 1_048_576);
    }
}
