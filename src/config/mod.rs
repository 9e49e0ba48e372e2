pub mod rate_limits;

use anyhow::{anyhow, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::net::SocketAddr;
use std::str::FromStr;
use url::Url;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub http_addr: String,
    pub app_mode: String,
    pub database_url: String,
    pub redis_url: String,
    pub db_max_connections: u32,
    pub db_connect_timeout_seconds: u64,
    pub db_idle_timeout_seconds: u64,
    pub db_max_lifetime_seconds: u64,
    pub paseto_access_key: [u8; 32],
    pub paseto_refresh_key: [u8; 32],
    pub access_ttl_minutes: u64,
    pub refresh_ttl_days: u64,
    pub campus_email_domain: String,
    pub oracle_url: Url,
    pub oracle_model: String,
    pub oracle_api_key: Option<String>,
    pub oracle_timeout_seconds: u64,
    pub auth_ip_rate_limit_per_hour: u32,
    pub cors_allow_origin: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let http_addr = env_or("HTTP_ADDR", "0.0.0.0:8080");
        let _parsed_http_addr = SocketAddr::from_str(&http_addr)
            .map_err(|err| anyhow!("invalid HTTP_ADDR: {}", err))?;
        let app_mode = env_or("APP_MODE", "api");

        let oracle_url = env_or("ORACLE_URL", "https://generativelanguage.googleapis.com");
        let oracle_url =
            Url::parse(&oracle_url).map_err(|err| anyhow!("invalid ORACLE_URL: {}", err))?;

        let campus_email_domain = env_or("CAMPUS_EMAIL_DOMAIN", "university.edu")
            .trim()
            .trim_start_matches('@')
            .to_ascii_lowercase();
        if campus_email_domain.is_empty() {
            return Err(anyhow!("invalid CAMPUS_EMAIL_DOMAIN: must not be empty"));
        }

        Ok(Self {
            http_addr,
            app_mode,
            database_url: env_or_err("DATABASE_URL")?,
            redis_url: env_or("REDIS_URL", "redis://127.0.0.1/"),
            db_max_connections: env_or_parse("DB_MAX_CONNECTIONS", "25")?,
            db_connect_timeout_seconds: env_or_parse("DB_CONNECT_TIMEOUT_SECONDS", "5")?,
            db_idle_timeout_seconds: env_or_parse("DB_IDLE_TIMEOUT_SECONDS", "300")?,
            db_max_lifetime_seconds: env_or_parse("DB_MAX_LIFETIME_SECONDS", "1800")?,
            paseto_access_key: env_key_32("PASETO_ACCESS_KEY")?,
            paseto_refresh_key: env_key_32("PASETO_REFRESH_KEY")?,
            access_ttl_minutes: env_or_parse("ACCESS_TTL_MINUTES", "15")?,
            refresh_ttl_days: env_or_parse("REFRESH_TTL_DAYS", "30")?,
            campus_email_domain,
            oracle_url,
            oracle_model: env_or("ORACLE_MODEL", "gemini-3-flash-preview"),
            oracle_api_key: std::env::var("ORACLE_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            oracle_timeout_seconds: env_or_parse("ORACLE_TIMEOUT_SECONDS", "15")?,
            auth_ip_rate_limit_per_hour: env_or_parse("AUTH_IP_RATE_LIMIT_PER_HOUR", "20")?,
            cors_allow_origin: std::env::var("CORS_ALLOW_ORIGIN").ok(),
        })
    }
}

/// Settings read only by `APP_MODE=seed-admin`.
#[derive(Clone, Debug)]
pub struct AdminSeedConfig {
    pub email: String,
    pub name: String,
    pub password: Option<String>,
}

impl AdminSeedConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            email: env_or_err("ADMIN_EMAIL")?,
            name: env_or("ADMIN_NAME", "System Admin"),
            password: std::env::var("ADMIN_PASSWORD").ok(),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_err(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| anyhow!("missing required env var: {}", key))
}

fn env_or_parse<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    let value = std::env::var(key).unwrap_or_else(|_| default.to_string());
    value
        .parse::<T>()
        .map_err(|err| anyhow!("invalid {}: {}", key, err))
}

fn env_key_32(key: &str) -> Result<[u8; 32]> {
    let value = env_or_err(key)?;
    decode_key_32(key, &value)
}

fn decode_key_32(key: &str, value: &str) -> Result<[u8; 32]> {
    let decoded = STANDARD
        .decode(value.as_bytes())
        .map_err(|err| anyhow!("invalid {}: {}", key, err))?;
    if decoded.len() != 32 {
        return Err(anyhow!("invalid {}: expected 32 bytes", key));
    }
    let mut key_bytes = [0u8; 32];
    key_bytes.copy_from_slice(&decoded);
    Ok(key_bytes)
}
