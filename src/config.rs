//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration file (config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub instance: InstanceConfig,
    pub federation: FederationConfig,
    pub policy: PolicyConfig,
    pub logging: LoggingConfig,
}

/// Local instance metadata
#[derive(Debug, Clone, Deserialize)]
pub struct InstanceConfig {
    /// Public domain of this instance (e.g., "social.example.com")
    ///
    /// Traffic attributed to this host bypasses the host policy gate.
    pub domain: String,
}

/// Federation client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FederationConfig {
    /// Timeout for a single remote object fetch, in seconds
    ///
    /// Every outbound fetch of an authentication attempt carries this
    /// timeout so a slow remote cannot stall the caller.
    pub fetch_timeout_secs: u64,
    /// User-Agent sent on remote fetches
    pub user_agent: String,
}

/// Host policy configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConfig {
    /// How long a host policy snapshot may be served from cache, in seconds
    ///
    /// Admin changes to the allow/block lists take effect after at most
    /// this long, or immediately via `HostPolicyGate::invalidate`.
    pub snapshot_ttl_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (FEDGATE_*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            // Start with default values
            .set_default("federation.fetch_timeout_secs", 10)?
            .set_default("federation.user_agent", "FedGate/0.1.0")?
            .set_default("policy.snapshot_ttl_secs", 30)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load from config/default.toml if it exists
            .add_source(File::with_name("config/default").required(false))
            // Load from config/local.toml if it exists (overrides default)
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables (FEDGATE_*)
            .add_source(
                Environment::with_prefix("FEDGATE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    fn validate(&self) -> Result<(), crate::error::AppError> {
        if self.instance.domain.trim().is_empty() {
            return Err(crate::error::AppError::Config(
                "instance.domain must not be empty".to_string(),
            ));
        }

        if url::Url::parse(&format!("https://{}", self.instance.domain.trim())).is_err() {
            return Err(crate::error::AppError::Config(format!(
                "instance.domain is not a valid host: {}",
                self.instance.domain
            )));
        }

        if self.federation.fetch_timeout_secs == 0 {
            return Err(crate::error::AppError::Config(
                "federation.fetch_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.policy.snapshot_ttl_secs == 0 {
            return Err(crate::error::AppError::Config(
                "policy.snapshot_ttl_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
