//! Bridge configuration.
//!
//! The C ABI builds its process-wide [`crate::Bridge`] once, on first use,
//! from [`BridgeConfig::from_env`]. Embedders using the Rust API can build a
//! config directly or load it from JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};

/// Environment variable selecting the engine backend.
pub const ENGINE_ENV: &str = "GMJ_ENGINE";
/// Environment variable holding a tracing filter directive.
pub const LOG_ENV: &str = "GMJ_LOG";

/// Which engine backend the bridge should select at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnginePreference {
    /// MuJoCo when compiled in, otherwise the availability shim.
    #[default]
    Auto,
    Mujoco,
    Reference,
    Unavailable,
}

impl EnginePreference {
    /// Parse a preference name, case-insensitively.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "mujoco" => Some(Self::Mujoco),
            "reference" => Some(Self::Reference),
            "unavailable" | "none" => Some(Self::Unavailable),
            _ => None,
        }
    }
}

/// Smallest diagnostic buffer that still holds one byte of message.
pub const MIN_LOAD_ERROR_CAPACITY: usize = 2;

/// Configuration for the bridge runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Engine backend to select.
    pub engine: EnginePreference,
    /// Tracing filter directive (e.g. `godot_mujoco_bridge=debug`).
    pub log_filter: Option<String>,
    /// Size in bytes of the diagnostic buffer handed to the engine loader,
    /// terminator included. Values below [`MIN_LOAD_ERROR_CAPACITY`] are
    /// raised to it at load time.
    pub load_error_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            engine: EnginePreference::Auto,
            log_filter: None,
            load_error_capacity: 1024,
        }
    }
}

impl BridgeConfig {
    /// Config with an explicit engine preference and defaults elsewhere.
    pub fn with_engine(engine: EnginePreference) -> Self {
        Self {
            engine,
            ..Self::default()
        }
    }

    /// Read `GMJ_ENGINE` and `GMJ_LOG`. Unknown engine names fall back to
    /// `Auto`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(name) = std::env::var(ENGINE_ENV) {
            match EnginePreference::parse(&name) {
                Some(engine) => config.engine = engine,
                None => tracing::warn!("Unknown {}={:?}, using auto", ENGINE_ENV, name),
            }
        }
        config.log_filter = std::env::var(LOG_ENV).ok();
        config
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| BridgeError::Config(e.to_string()))?;
        config.validated()
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| BridgeError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| BridgeError::Config(e.to_string()))
    }

    fn validated(self) -> Result<Self> {
        if self.load_error_capacity < MIN_LOAD_ERROR_CAPACITY {
            return Err(BridgeError::Config(format!(
                "load_error_capacity must be at least {MIN_LOAD_ERROR_CAPACITY}"
            )));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();
        assert_eq!(config.engine, EnginePreference::Auto);
        assert_eq!(config.load_error_capacity, 1024);
        assert!(config.log_filter.is_none());
    }

    #[test]
    fn test_parse_preference() {
        assert_eq!(EnginePreference::parse("MuJoCo"), Some(EnginePreference::Mujoco));
        assert_eq!(EnginePreference::parse(" reference "), Some(EnginePreference::Reference));
        assert_eq!(EnginePreference::parse("none"), Some(EnginePreference::Unavailable));
        assert_eq!(EnginePreference::parse("bullet"), None);
    }

    #[test]
    fn test_json_partial_uses_defaults() {
        let config = BridgeConfig::from_json_str(r#"{ "engine": "reference" }"#).unwrap();
        assert_eq!(config.engine, EnginePreference::Reference);
        assert_eq!(config.load_error_capacity, 1024);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = BridgeConfig {
            engine: EnginePreference::Unavailable,
            log_filter: Some("godot_mujoco_bridge=debug".to_string()),
            load_error_capacity: 256,
        };
        let json = config.to_json().unwrap();
        assert_eq!(BridgeConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_json_rejects_bad_input() {
        let err = BridgeConfig::from_json_str(r#"{ "engine": "bullet" }"#).unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));

        for capacity in [0, 1] {
            let json = format!(r#"{{ "load_error_capacity": {capacity} }}"#);
            let err = BridgeConfig::from_json_str(&json).unwrap_err();
            assert!(matches!(err, BridgeError::Config(_)), "capacity {capacity} accepted");
        }
        assert!(BridgeConfig::from_json_str(r#"{ "load_error_capacity": 2 }"#).is_ok());
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.json");
        std::fs::write(&path, r#"{ "engine": "mujoco", "log_filter": "warn" }"#).unwrap();

        let config = BridgeConfig::from_json_file(&path).unwrap();
        assert_eq!(config.engine, EnginePreference::Mujoco);
        assert_eq!(config.log_filter.as_deref(), Some("warn"));

        assert!(BridgeConfig::from_json_file(dir.path().join("missing.json")).is_err());
    }
}
