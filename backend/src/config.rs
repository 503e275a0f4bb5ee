//! Configuration management for the PharmaCare backend
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with PHARMA_ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production, test)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Which store backs the ledgers
    pub storage: StorageConfig,

    /// JWT authentication configuration
    pub jwt: JwtConfig,

    /// Password hashing configuration
    pub password: PasswordConfig,

    /// Order fulfillment retry policy
    pub fulfillment: FulfillmentConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    /// Seed the sample medicine catalogue on an empty in-memory store
    pub seed_sample_data: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret key for signing JWT tokens
    pub secret: String,

    /// Access token expiration in seconds
    pub access_token_expiry: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PasswordConfig {
    /// bcrypt work factor
    pub bcrypt_cost: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FulfillmentConfig {
    /// Attempts before a contended order surfaces as a conflict
    pub max_attempts: u32,

    /// Linear backoff step between attempts, in milliseconds
    pub retry_backoff_ms: u64,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("PHARMA_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 8000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.url", "postgres://localhost/pharmacare")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("storage.backend", "postgres")?
            .set_default("storage.seed_sample_data", false)?
            .set_default("jwt.secret", "development-secret-key")?
            .set_default("jwt.access_token_expiry", 86400)?
            .set_default("password.bcrypt_cost", i64::from(bcrypt::DEFAULT_COST))?
            .set_default("fulfillment.max_attempts", 5)?
            .set_default("fulfillment.retry_backoff_ms", 20)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (PHARMA_ prefix)
            .add_source(
                Environment::with_prefix("PHARMA")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            storage: StorageConfig::default(),
            jwt: JwtConfig::default(),
            password: PasswordConfig::default(),
            fulfillment: FulfillmentConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            host: "0.0.0.0".to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/pharmacare".to_string(),
            max_connections: 10,
            min_connections: 2,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Postgres,
            seed_sample_data: false,
        }
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: "development-secret-key".to_string(),
            access_token_expiry: 86400,
        }
    }
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl Default for FulfillmentConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_backoff_ms: 20,
        }
    }
}
