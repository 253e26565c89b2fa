//! Machine configuration.
//!
//! Everything a deployment may want to tune without touching the machine
//! definition: the action handshake bound, the retry policy action clients
//! start with, how many transitions are kept for introspection, and a free
//! form parameter map states read through `StateContext::param` and update
//! through `StateContext::set_param`.

use crate::action::RetryPolicy;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_LOG_CAPACITY: usize = 256;

/// Errors raised while loading configuration or reading parameters.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid machine configuration: {0}")]
    Parse(String),

    #[error("Parameter '{name}' has the wrong shape: {message}")]
    InvalidParam { name: String, message: String },
}

/// # Example
///
/// ```rust
/// use orthos::runtime::MachineConfig;
/// use std::time::Duration;
///
/// let config = MachineConfig::from_json(
///     r#"{
///         "connect_timeout_ms": 2000,
///         "retry": { "max_attempts": 5 },
///         "params": { "radial_motion": { "rays": 8 } }
///     }"#,
/// )
/// .unwrap();
///
/// assert_eq!(config.connect_timeout(), Duration::from_secs(2));
/// assert_eq!(config.retry.limit(), Some(5));
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Bound on the blocking handshake of action clients.
    pub connect_timeout_ms: u64,
    /// Policy action clients are created with.
    pub retry: RetryPolicy,
    /// Transitions kept in the transition log.
    pub transition_log_capacity: usize,
    pub params: HashMap<String, serde_json::Value>,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            retry: RetryPolicy::default(),
            transition_log_capacity: DEFAULT_LOG_CAPACITY,
            params: HashMap::new(),
        }
    }
}

impl MachineConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.transition_log_capacity = capacity;
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    /// Typed parameter lookup; `None` if unset.
    pub fn param<T: DeserializeOwned>(&self, name: &str) -> Option<Result<T, ConfigError>> {
        self.params.get(name).map(|value| {
            T::deserialize(value).map_err(|e| ConfigError::InvalidParam {
                name: name.to_string(),
                message: e.to_string(),
            })
        })
    }

    /// Store `value` as parameter `name`, replacing any previous value.
    pub fn set_param<T: Serialize>(&mut self, name: &str, value: T) -> Result<(), ConfigError> {
        let value = serde_json::to_value(value).map_err(|e| ConfigError::InvalidParam {
            name: name.to_string(),
            message: e.to_string(),
        })?;
        self.params.insert(name.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_json_yields_defaults() {
        let config = MachineConfig::from_json("{}").unwrap();
        assert_eq!(config, MachineConfig::default());
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = MachineConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn params_are_typed_on_read() {
        let config = MachineConfig::default()
            .with_param("rays", json!(8))
            .with_param("frame", json!("odom"));

        assert_eq!(config.param::<u32>("rays"), Some(Ok(8)));
        assert_eq!(
            config.param::<String>("frame"),
            Some(Ok("odom".to_string()))
        );
        assert!(config.param::<u32>("missing").is_none());
        assert!(matches!(
            config.param::<u32>("frame"),
            Some(Err(ConfigError::InvalidParam { .. }))
        ));
    }

    #[test]
    fn set_param_replaces_previous_value() {
        let mut config = MachineConfig::default().with_param("rays", json!(8));
        config.set_param("rays", 12u32).unwrap();
        config.set_param("frames", vec!["odom", "map"]).unwrap();

        assert_eq!(config.param::<u32>("rays"), Some(Ok(12)));
        assert_eq!(
            config.param::<Vec<String>>("frames"),
            Some(Ok(vec!["odom".to_string(), "map".to_string()]))
        );
    }

    #[test]
    fn unserializable_param_is_rejected() {
        let mut config = MachineConfig::default();
        let mut keyed = HashMap::new();
        keyed.insert((1, 2), "pose");

        assert!(matches!(
            config.set_param("poses", keyed),
            Err(ConfigError::InvalidParam { name, .. }) if name == "poses"
        ));
        assert!(config.params.is_empty());
    }
}
