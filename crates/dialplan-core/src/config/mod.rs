//! Configuration for dialplan-core

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::normalize::PhoneNormalizer;
use crate::{DialplanError, Result};

/// Environment variable prefix, e.g. `DIALPLAN__DATABASE_URL`
pub const ENV_PREFIX: &str = "DIALPLAN";

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DialplanConfig {
    /// `development` switches logging to human-readable output
    pub env: String,
    pub log_level: String,
    pub http_bind_address: String,
    pub database_url: String,
    pub database_max_connections: u32,
    pub database_min_connections: u32,
    pub database_connect_timeout_secs: u64,
    pub identity_service_url: String,
    /// Hard ceiling for a single remote identity lookup
    pub identity_timeout_ms: u64,
    pub identity_cache_ttl_secs: u64,
    pub identity_cache_capacity: u64,
    pub resolution: ResolutionConfig,
}

/// Reserved plan ids and canonicalization settings used by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    pub system_failsafe_plan_id: String,
    pub guest_welcome_plan_id: String,
    pub recognized_caller_plan_id: String,
    pub system_tenant_id: String,
    pub default_language_code: String,
    pub country_code: String,
    pub trunk_prefix: String,
    /// Overall budget for one call-leg resolution
    pub resolution_deadline_ms: u64,
}

impl DialplanConfig {
    /// Load configuration from defaults, an optional TOML file and the
    /// environment, in increasing order of precedence.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&DialplanConfig::default())?);

        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config: DialplanConfig = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.database_url.trim().is_empty() {
            return Err(DialplanError::config("database_url must not be empty"));
        }
        self.http_bind_address
            .parse::<SocketAddr>()
            .map_err(|e| DialplanError::config(format!("invalid http_bind_address '{}': {}", self.http_bind_address, e)))?;
        if self.identity_timeout_ms == 0 {
            return Err(DialplanError::config("identity_timeout_ms must be greater than zero"));
        }
        if self.identity_cache_ttl_secs == 0 {
            return Err(DialplanError::config("identity_cache_ttl_secs must be greater than zero"));
        }
        if self.database_min_connections > self.database_max_connections {
            return Err(DialplanError::config("database_min_connections exceeds database_max_connections"));
        }
        self.resolution.validate()
    }

    pub fn identity_timeout(&self) -> Duration {
        Duration::from_millis(self.identity_timeout_ms)
    }

    pub fn identity_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.identity_cache_ttl_secs)
    }

    pub fn database_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.database_connect_timeout_secs)
    }

    pub fn is_development(&self) -> bool {
        self.env == "development"
    }
}

impl ResolutionConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, id) in [
            ("system_failsafe_plan_id", &self.system_failsafe_plan_id),
            ("guest_welcome_plan_id", &self.guest_welcome_plan_id),
            ("recognized_caller_plan_id", &self.recognized_caller_plan_id),
        ] {
            crate::validation::validate_plan_id(id)
                .map_err(|_| DialplanError::config(format!("{} '{}' is not a valid plan id", name, id)))?;
        }
        if self.system_tenant_id.is_empty() {
            return Err(DialplanError::config("system_tenant_id must not be empty"));
        }
        if self.country_code.is_empty() || !self.country_code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DialplanError::config(format!("invalid country_code '{}'", self.country_code)));
        }
        if !self.trunk_prefix.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DialplanError::config(format!("invalid trunk_prefix '{}'", self.trunk_prefix)));
        }
        if self.resolution_deadline_ms == 0 {
            return Err(DialplanError::config("resolution_deadline_ms must be greater than zero"));
        }
        Ok(())
    }

    pub fn normalizer(&self) -> PhoneNormalizer {
        PhoneNormalizer::new(self.country_code.clone(), self.trunk_prefix.clone())
    }

    pub fn resolution_deadline(&self) -> Duration {
        Duration::from_millis(self.resolution_deadline_ms)
    }

    /// Reserved plans may not be removed through the admin surface
    pub fn is_reserved_plan(&self, id: &str) -> bool {
        id == self.system_failsafe_plan_id
            || id == self.guest_welcome_plan_id
            || id == self.recognized_caller_plan_id
    }
}

impl Default for DialplanConfig {
    fn default() -> Self {
        Self {
            env: "production".to_string(),
            log_level: "info".to_string(),
            http_bind_address: "0.0.0.0:12020".to_string(),
            database_url: "postgres://localhost/dialplan".to_string(),
            database_max_connections: 10,
            database_min_connections: 2,
            database_connect_timeout_secs: 15,
            identity_service_url: "http://localhost:12011".to_string(),
            identity_timeout_ms: 3000,
            identity_cache_ttl_secs: 300, // 5 minutes
            identity_cache_capacity: 10_000,
            resolution: ResolutionConfig::default(),
        }
    }
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            system_failsafe_plan_id: "DP_SYSTEM_FAILSAFE".to_string(),
            guest_welcome_plan_id: "DP_GUEST_ENTRY".to_string(),
            recognized_caller_plan_id: "DP_DEFAULT_USER".to_string(),
            system_tenant_id: "system".to_string(),
            default_language_code: "tr".to_string(),
            country_code: crate::normalize::DEFAULT_COUNTRY_CODE.to_string(),
            trunk_prefix: crate::normalize::DEFAULT_TRUNK_PREFIX.to_string(),
            resolution_deadline_ms: 5000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = DialplanConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.identity_timeout(), Duration::from_secs(3));
        assert_eq!(config.identity_cache_ttl(), Duration::from_secs(300));
        assert_eq!(config.resolution.system_failsafe_plan_id, "DP_SYSTEM_FAILSAFE");
        assert!(!config.is_development());
    }

    #[test]
    fn test_reserved_plans() {
        let resolution = ResolutionConfig::default();
        assert!(resolution.is_reserved_plan("DP_GUEST_ENTRY"));
        assert!(resolution.is_reserved_plan("DP_DEFAULT_USER"));
        assert!(!resolution.is_reserved_plan("DP_ACME_MAIN"));
    }

    #[test]
    fn test_validation_failures() {
        let mut config = DialplanConfig::default();
        config.http_bind_address = "not-an-address".to_string();
        assert!(matches!(config.validate(), Err(DialplanError::Config(_))));

        let mut config = DialplanConfig::default();
        config.identity_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = DialplanConfig::default();
        config.resolution.guest_welcome_plan_id = "lower-case".to_string();
        assert!(config.validate().is_err());

        let mut config = DialplanConfig::default();
        config.resolution.country_code = "+90".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("dialplan.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
env = "development"
identity_timeout_ms = 1500

[resolution]
country_code = "44"
"#
        )
        .unwrap();

        let config = DialplanConfig::load(Some(&path)).unwrap();
        assert!(config.is_development());
        assert_eq!(config.identity_timeout(), Duration::from_millis(1500));
        assert_eq!(config.resolution.country_code, "44");
        // Untouched keys keep their defaults
        assert_eq!(config.resolution.guest_welcome_plan_id, "DP_GUEST_ENTRY");
        assert_eq!(config.database_max_connections, 10);
    }
}
