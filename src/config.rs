//! Bridge configuration

use crate::engine::{Environment, SdkConfig};

const DEFAULT_LOG_FILTER: &str = "avatar_bridge=info";

/// Configuration read from the process environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    pub environment: Environment,
    pub session_token: Option<String>,
    /// `EnvFilter` directive
    pub log_filter: String,
    pub log_json: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            session_token: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            log_json: false,
        }
    }
}

impl BridgeConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unparseable values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let environment = match lookup("AVATAR_BRIDGE_ENVIRONMENT") {
            Some(raw) => raw.parse().unwrap_or_else(|e: String| {
                tracing::warn!(error = %e, "Ignoring AVATAR_BRIDGE_ENVIRONMENT");
                Environment::default()
            }),
            None => Environment::default(),
        };

        Self {
            environment,
            session_token: lookup("AVATAR_BRIDGE_SESSION_TOKEN").filter(|t| !t.is_empty()),
            log_filter: lookup("AVATAR_BRIDGE_LOG")
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            log_json: lookup("AVATAR_BRIDGE_LOG_JSON")
                .is_some_and(|v| matches!(v.as_str(), "1" | "true" | "yes")),
        }
    }

    /// Initial engine configuration derived from this config
    pub fn sdk_config(&self) -> SdkConfig {
        SdkConfig {
            environment: self.environment,
            session_token: self.session_token.clone().unwrap_or_default(),
        }
    }
}
