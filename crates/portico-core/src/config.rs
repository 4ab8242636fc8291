//! Configuration module
//!
//! Server, database, session, invitation, rate-limit and SMTP settings read from the
//! environment. Parsing goes through a lookup function so tests can feed a map instead
//! of mutating process-wide environment variables.

use std::env;
use std::time::Duration;

// Common constants
const DEFAULT_PORT: u16 = 4000;
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const HTTP_RATE_LIMIT_PER_MINUTE: u32 = 100;
const HTTP_ORG_RATE_LIMIT_PER_MINUTE: u32 = 200;
const RATE_LIMITER_SHARD_COUNT: usize = 16;
const TRUSTED_PROXY_COUNT: usize = 1;
const INVITATION_TTL_HOURS: i64 = 168;
const INVITATION_REDEEM_TIMEOUT_MS: u64 = 5000;
const SMTP_PORT: u16 = 587;
const SESSION_COOKIE_NAME: &str = "portico_session";
const APP_BASE_URL: &str = "http://localhost:3000";

/// Server-level settings shared by every component
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub http_rate_limit_per_minute: u32,
    pub http_org_rate_limit_per_minute: u32,
    pub rate_limiter_shard_count: usize,
    pub trusted_proxy_count: usize,
    pub environment: String,
}

/// Full application configuration
#[derive(Clone, Debug)]
pub struct PorticoConfig {
    pub base: BaseConfig,
    pub database_url: String,
    // Session verification
    pub jwt_secret: String,
    pub session_cookie_name: String,
    // Invitations
    pub invitation_ttl_hours: i64,
    pub invitation_redeem_timeout_ms: u64,
    pub app_base_url: String,
    // Email delivery
    pub email_enabled: bool,
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: Option<String>,
    pub smtp_tls: bool,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<PorticoConfig>);

impl Config {
    fn inner(&self) -> &PorticoConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        is_production_env(&self.inner().base.environment)
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup and validate it.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = PorticoConfig::from_lookup(lookup)?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }

    pub fn server_port(&self) -> u16 {
        self.inner().base.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.inner().base.cors_origins
    }

    pub fn environment(&self) -> &str {
        &self.inner().base.environment
    }

    pub fn database_url(&self) -> &str {
        &self.inner().database_url
    }

    pub fn db_max_connections(&self) -> u32 {
        self.inner().base.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.inner().base.db_timeout_seconds
    }

    pub fn jwt_secret(&self) -> &str {
        &self.inner().jwt_secret
    }

    pub fn session_cookie_name(&self) -> &str {
        &self.inner().session_cookie_name
    }

    pub fn invitation_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.inner().invitation_ttl_hours)
    }

    pub fn invitation_redeem_timeout(&self) -> Duration {
        Duration::from_millis(self.inner().invitation_redeem_timeout_ms)
    }

    pub fn app_base_url(&self) -> &str {
        &self.inner().app_base_url
    }

    pub fn http_rate_limit_per_minute(&self) -> u32 {
        self.inner().base.http_rate_limit_per_minute
    }

    pub fn http_org_rate_limit_per_minute(&self) -> u32 {
        self.inner().base.http_org_rate_limit_per_minute
    }

    pub fn rate_limiter_shard_count(&self) -> usize {
        self.inner().base.rate_limiter_shard_count
    }

    pub fn trusted_proxy_count(&self) -> usize {
        self.inner().base.trusted_proxy_count
    }

    pub fn email_enabled(&self) -> bool {
        self.inner().email_enabled
    }

    pub fn smtp_host(&self) -> Option<&str> {
        self.inner().smtp_host.as_deref()
    }

    pub fn smtp_port(&self) -> u16 {
        self.inner().smtp_port
    }

    pub fn smtp_user(&self) -> Option<&str> {
        self.inner().smtp_user.as_deref()
    }

    pub fn smtp_password(&self) -> Option<&str> {
        self.inner().smtp_password.as_deref()
    }

    pub fn smtp_from(&self) -> Option<&str> {
        self.inner().smtp_from.as_deref()
    }

    pub fn smtp_tls(&self) -> bool {
        self.inner().smtp_tls
    }
}

fn is_production_env(environment: &str) -> bool {
    let environment = environment.to_lowercase();
    environment == "production" || environment == "prod"
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_bool_or<F>(lookup: &F, key: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|value| value.trim().to_lowercase().parse().ok())
        .unwrap_or(default)
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|s| !s.trim().is_empty())
}

impl PorticoConfig {
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("ENVIRONMENT")
            .or_else(|| lookup("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let cors_origins_str = lookup("CORS_ORIGINS").unwrap_or_else(|| "*".to_string());
        if is_production_env(&environment) && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let server_port = match lookup("PORT") {
            Some(port) => port
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            None => DEFAULT_PORT,
        };

        let base = BaseConfig {
            server_port,
            cors_origins,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", MAX_CONNECTIONS),
            db_timeout_seconds: parse_or(&lookup, "DB_TIMEOUT_SECONDS", CONNECTION_TIMEOUT_SECS),
            http_rate_limit_per_minute: parse_or(
                &lookup,
                "HTTP_RATE_LIMIT_PER_MINUTE",
                HTTP_RATE_LIMIT_PER_MINUTE,
            ),
            http_org_rate_limit_per_minute: parse_or(
                &lookup,
                "HTTP_ORG_RATE_LIMIT_PER_MINUTE",
                HTTP_ORG_RATE_LIMIT_PER_MINUTE,
            ),
            rate_limiter_shard_count: parse_or(
                &lookup,
                "RATE_LIMITER_SHARD_COUNT",
                RATE_LIMITER_SHARD_COUNT,
            ),
            trusted_proxy_count: parse_or(&lookup, "TRUSTED_PROXY_COUNT", TRUSTED_PROXY_COUNT),
            environment,
        };

        let config = PorticoConfig {
            base,
            database_url: lookup("DATABASE_URL")
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))?,
            jwt_secret: lookup("JWT_SECRET")
                .ok_or_else(|| anyhow::anyhow!("JWT_SECRET must be set for authentication"))?,
            session_cookie_name: non_empty(&lookup, "SESSION_COOKIE_NAME")
                .unwrap_or_else(|| SESSION_COOKIE_NAME.to_string()),
            invitation_ttl_hours: parse_or(&lookup, "INVITATION_TTL_HOURS", INVITATION_TTL_HOURS),
            invitation_redeem_timeout_ms: parse_or(
                &lookup,
                "INVITATION_REDEEM_TIMEOUT_MS",
                INVITATION_REDEEM_TIMEOUT_MS,
            ),
            app_base_url: non_empty(&lookup, "APP_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| APP_BASE_URL.to_string()),
            email_enabled: parse_bool_or(&lookup, "EMAIL_ENABLED", false),
            smtp_host: non_empty(&lookup, "SMTP_HOST"),
            smtp_port: lookup("SMTP_PORT")
                .and_then(|s| s.trim().parse().ok())
                .filter(|&p| p > 0)
                .unwrap_or(SMTP_PORT),
            smtp_user: non_empty(&lookup, "SMTP_USER"),
            smtp_password: non_empty(&lookup, "SMTP_PASSWORD"),
            smtp_from: non_empty(&lookup, "SMTP_FROM"),
            smtp_tls: parse_bool_or(&lookup, "SMTP_TLS", true),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.jwt_secret.len() < 32 {
            return Err(anyhow::anyhow!(
                "JWT_SECRET must be at least 32 characters long"
            ));
        }

        if !self.database_url.starts_with("postgresql://")
            && !self.database_url.starts_with("postgres://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if self.invitation_ttl_hours <= 0 {
            return Err(anyhow::anyhow!("INVITATION_TTL_HOURS must be positive"));
        }

        if self.invitation_redeem_timeout_ms == 0 {
            return Err(anyhow::anyhow!(
                "INVITATION_REDEEM_TIMEOUT_MS must be greater than zero"
            ));
        }

        if self.base.rate_limiter_shard_count == 0 {
            return Err(anyhow::anyhow!(
                "RATE_LIMITER_SHARD_COUNT must be greater than zero"
            ));
        }

        if self.email_enabled && (self.smtp_host.is_none() || self.smtp_from.is_none()) {
            return Err(anyhow::anyhow!(
                "EMAIL_ENABLED=true requires SMTP_HOST and SMTP_FROM to be set"
            ));
        }

        Ok(())
    }
}
