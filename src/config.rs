//! Configuration management

use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;

use crate::sandbox::PrivilegeDrop;

/// Registry configuration
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Skills root containing the category directories and
    /// `manifest-schema.json`
    pub root: PathBuf,

    /// Timeout substituted when a manifest declares none
    pub default_timeout: Duration,

    /// Hard ceiling on captured bytes per output stream
    pub max_output_bytes: usize,

    /// Mode flag passed to skills as `SKILLBOX_ENV`
    pub env_mode: String,

    /// Privilege drop applied when the host runs as root; `None`
    /// disables the drop entirely
    pub privilege_drop: Option<PrivilegeDrop>,
}

impl RegistryConfig {
    /// Configuration with defaults for a given skills root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            default_timeout: Duration::from_secs(60),
            max_output_bytes: 256 * 1024 * 1024,
            env_mode: "production".to_string(),
            privilege_drop: Some(PrivilegeDrop::default()),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let root = std::env::var("SKILLBOX_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("skills"));

        let default_timeout = std::env::var("SKILLBOX_DEFAULT_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(60));

        let max_output_bytes = std::env::var("SKILLBOX_MAX_OUTPUT_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(256 * 1024 * 1024);

        let env_mode =
            std::env::var("SKILLBOX_ENV").unwrap_or_else(|_| "production".to_string());

        let privilege_drop = match std::env::var("SKILLBOX_SANDBOX_USER") {
            Ok(v) if v.is_empty() || v == "none" => None,
            Ok(account) => Some(PrivilegeDrop {
                account,
                ..PrivilegeDrop::default()
            }),
            Err(_) => Some(PrivilegeDrop::default()),
        };

        Ok(Self {
            root,
            default_timeout,
            max_output_bytes,
            env_mode,
            privilege_drop,
        })
    }
}
