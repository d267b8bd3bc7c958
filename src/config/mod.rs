use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("JWT_SECRET_KEY must be set in {0:?}")]
    MissingJwtSecret(Environment),

    #[error("DATABASE_URL must be set when STORAGE_BACKEND=postgres")]
    MissingDatabaseUrl,

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub bootstrap: BootstrapConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: StorageBackend,
    #[serde(skip_serializing)]
    pub url: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: u64,
    pub idle_timeout: u64,
    pub max_lifetime: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enable_rate_limiting: bool,
    pub rate_limit_requests: u32,
    pub rate_limit_window_secs: u64,
    pub max_request_size_bytes: usize,
    pub default_page_limit: u32,
    pub max_page_limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub cors_origins: Vec<String>,
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    #[serde(skip_serializing)]
    pub jwt_refresh_secret: String,
    pub jwt_expiry_hours: u64,
    pub refresh_expiry_days: u64,
    pub issuer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    pub admin_username: String,
    pub admin_email: String,
    #[serde(skip_serializing)]
    pub admin_password: String,
    pub seed_demo_data: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()?
        .validate()
    }

    fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        // Server overrides
        if let Ok(v) = env::var("SERVER_HOST") {
            self.server.host = v;
        }
        if let Ok(v) = env::var("PORT") {
            self.server.port = v
                .parse()
                .map_err(|_| ConfigError::InvalidValue { key: "PORT", value: v })?;
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            if !v.trim().is_empty() {
                self.database.url = Some(v);
                self.database.backend = StorageBackend::Postgres;
            }
        }
        if let Ok(v) = env::var("STORAGE_BACKEND") {
            self.database.backend = match v.to_ascii_lowercase().as_str() {
                "postgres" | "postgresql" => StorageBackend::Postgres,
                "memory" => StorageBackend::Memory,
                _ => return Err(ConfigError::InvalidValue { key: "STORAGE_BACKEND", value: v }),
            };
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_MIN_CONNECTIONS") {
            self.database.min_connections = v.parse().unwrap_or(self.database.min_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Ok(v) = env::var("DATABASE_IDLE_TIMEOUT") {
            self.database.idle_timeout = v.parse().unwrap_or(self.database.idle_timeout);
        }
        if let Ok(v) = env::var("DATABASE_MAX_LIFETIME") {
            self.database.max_lifetime = v.parse().unwrap_or(self.database.max_lifetime);
        }

        // API overrides
        if let Ok(v) = env::var("API_ENABLE_RATE_LIMITING") {
            self.api.enable_rate_limiting = v.parse().unwrap_or(self.api.enable_rate_limiting);
        }
        if let Ok(v) = env::var("API_RATE_LIMIT_REQUESTS") {
            self.api.rate_limit_requests = v.parse().unwrap_or(self.api.rate_limit_requests);
        }
        if let Ok(v) = env::var("API_RATE_LIMIT_WINDOW_SECS") {
            self.api.rate_limit_window_secs = v.parse().unwrap_or(self.api.rate_limit_window_secs);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        }
        if let Ok(v) = env::var("JWT_SECRET_KEY") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("JWT_REFRESH_SECRET_KEY") {
            self.security.jwt_refresh_secret = v;
        }
        if let Ok(v) = env::var("JWT_EXPIRATION_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("JWT_REFRESH_EXPIRATION_DAYS") {
            self.security.refresh_expiry_days = v.parse().unwrap_or(self.security.refresh_expiry_days);
        }

        // Bootstrap overrides
        if let Ok(v) = env::var("ADMIN_USERNAME") {
            self.bootstrap.admin_username = v;
        }
        if let Ok(v) = env::var("ADMIN_EMAIL") {
            self.bootstrap.admin_email = v;
        }
        if let Ok(v) = env::var("ADMIN_PASSWORD") {
            self.bootstrap.admin_password = v;
        }
        if let Ok(v) = env::var("SEED_TEST_DATA") {
            self.bootstrap.seed_demo_data = v.parse().unwrap_or(self.bootstrap.seed_demo_data);
        }

        Ok(self)
    }

    /// Fills derived secrets and rejects combinations that cannot boot.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        if self.security.jwt_secret.is_empty() {
            if self.environment != Environment::Development {
                return Err(ConfigError::MissingJwtSecret(self.environment));
            }
            tracing::warn!("JWT_SECRET_KEY not set, generating an ephemeral development secret");
            self.security.jwt_secret = format!("dev-{}", uuid::Uuid::new_v4());
        }
        if self.security.jwt_refresh_secret.is_empty() {
            self.security.jwt_refresh_secret = format!("refresh-{}", self.security.jwt_secret);
        }
        if self.database.backend == StorageBackend::Postgres && self.database.url.is_none() {
            return Err(ConfigError::MissingDatabaseUrl);
        }
        Ok(self)
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                backend: StorageBackend::Memory,
                url: None,
                max_connections: 10,
                min_connections: 1,
                connection_timeout: 30,
                idle_timeout: 300,
                max_lifetime: 3600,
            },
            api: ApiConfig {
                enable_rate_limiting: false,
                rate_limit_requests: 1000,
                rate_limit_window_secs: 60,
                max_request_size_bytes: 10 * 1024 * 1024, // 10MB
                default_page_limit: 10,
                max_page_limit: 100,
            },
            security: SecurityConfig {
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                jwt_secret: String::new(),
                jwt_refresh_secret: String::new(),
                jwt_expiry_hours: 24,
                refresh_expiry_days: 7,
                issuer: "mini-crm-api".to_string(),
            },
            bootstrap: BootstrapConfig {
                admin_username: "admin".to_string(),
                admin_email: "admin@example.com".to_string(),
                admin_password: "admin123".to_string(),
                seed_demo_data: false,
            },
        }
    }

    fn staging() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Staging;
        config.database.backend = StorageBackend::Postgres;
        config.database.max_connections = 20;
        config.database.connection_timeout = 10;
        config.api.enable_rate_limiting = true;
        config.api.rate_limit_requests = 100;
        config.api.max_request_size_bytes = 5 * 1024 * 1024; // 5MB
        config.security.cors_origins = vec!["https://staging.example.com".to_string()];
        config
    }

    fn production() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Production;
        config.database.backend = StorageBackend::Postgres;
        config.database.max_connections = 50;
        config.database.connection_timeout = 5;
        config.api.enable_rate_limiting = true;
        config.api.rate_limit_requests = 60;
        config.api.max_request_size_bytes = 2 * 1024 * 1024; // 2MB
        config.security.cors_origins = vec!["https://app.example.com".to_string()];
        config.security.jwt_expiry_hours = 4;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert!(!config.api.enable_rate_limiting);
        assert_eq!(config.api.default_page_limit, 10);
        assert_eq!(config.api.max_page_limit, 100);
        assert_eq!(config.database.backend, StorageBackend::Memory);
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert!(config.api.enable_rate_limiting);
        assert_eq!(config.security.jwt_expiry_hours, 4);
    }

    #[test]
    fn production_requires_a_secret() {
        let result = AppConfig::production().validate();
        assert!(matches!(result, Err(ConfigError::MissingJwtSecret(Environment::Production))));
    }

    #[test]
    fn refresh_secret_derives_from_access_secret() {
        let mut config = AppConfig::development();
        config.security.jwt_secret = "s3cret".to_string();
        let config = config.validate().unwrap();
        assert_eq!(config.security.jwt_refresh_secret, "refresh-s3cret");
    }

    #[test]
    fn postgres_backend_needs_url() {
        let mut config = AppConfig::development();
        config.security.jwt_secret = "s3cret".to_string();
        config.database.backend = StorageBackend::Postgres;
        assert!(matches!(config.validate(), Err(ConfigError::MissingDatabaseUrl)));
    }

    #[test]
    fn production_defaults_to_postgres() {
        let mut config = AppConfig::production();
        config.security.jwt_secret = "s3cret".to_string();
        assert_eq!(config.database.backend, StorageBackend::Postgres);
        assert!(matches!(config.validate(), Err(ConfigError::MissingDatabaseUrl)));
    }

    #[test]
    fn secrets_are_not_serialized() {
        let mut config = AppConfig::development();
        config.security.jwt_secret = "do-not-leak".to_string();
        let rendered = serde_json::to_string(&config).unwrap();
        assert!(!rendered.contains("do-not-leak"));
    }
}
