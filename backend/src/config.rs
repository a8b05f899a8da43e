use anyhow::{Context, Result};
use std::env;

const BYTES_PER_MB: usize = 1024 * 1024;

/// Runtime settings read from the environment (after `.env` is loaded).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,
    pub bind_addr: String,
    pub cors_allowed_origin: String,
    pub max_request_body_mb: usize,
    pub db_max_connections: u32,
    pub static_dir: Option<String>,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup, so tests need not touch the process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL must be set")?;
        let jwt_secret = lookup("JWT_SECRET").context("JWT_SECRET must be set")?;
        if jwt_secret.len() < 16 {
            anyhow::bail!("JWT_SECRET must be at least 16 characters");
        }

        let jwt_expiry_hours = parse_or(&lookup, "JWT_EXPIRY_HOURS", 24)?;
        if jwt_expiry_hours <= 0 {
            anyhow::bail!("JWT_EXPIRY_HOURS must be positive");
        }

        let max_request_body_mb: usize = parse_or(&lookup, "MAX_REQUEST_BODY_MB", 10)?;
        if max_request_body_mb == 0 || max_request_body_mb.checked_mul(BYTES_PER_MB).is_none() {
            anyhow::bail!("MAX_REQUEST_BODY_MB is out of range: {}", max_request_body_mb);
        }

        Ok(Self {
            database_url,
            jwt_secret,
            jwt_expiry_hours,
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8000".to_string()),
            cors_allowed_origin: lookup("CORS_ALLOWED_ORIGIN")
                .unwrap_or_else(|| "http://localhost:3000".to_string()),
            max_request_body_mb,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 10)?,
            static_dir: lookup("STATIC_DIR").filter(|s| !s.is_empty()),
            admin_username: lookup("ADMIN_USERNAME").filter(|s| !s.is_empty()),
            admin_password: lookup("ADMIN_PASSWORD").filter(|s| !s.is_empty()),
        })
    }

    pub fn max_request_body_bytes(&self) -> usize {
        self.max_request_body_mb.saturating_mul(BYTES_PER_MB)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{} has an invalid value: {}", key, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/school"),
            ("JWT_SECRET", "0123456789abcdef0123"),
        ]))
        .unwrap();

        assert_eq!(config.jwt_expiry_hours, 24);
        assert_eq!(config.bind_addr, "0.0.0.0:8000");
        assert_eq!(config.cors_allowed_origin, "http://localhost:3000");
        assert_eq!(config.max_request_body_mb, 10);
        assert_eq!(config.db_max_connections, 10);
        assert!(config.static_dir.is_none());
        assert!(config.admin_username.is_none());
    }

    #[test]
    fn missing_secret_fails() {
        let err = Config::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://x")]))
            .unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn short_secret_fails() {
        let result = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://x"),
            ("JWT_SECRET", "short"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn oversized_body_limit_fails() {
        let huge = usize::MAX.to_string();
        let result = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://x"),
            ("JWT_SECRET", "0123456789abcdef0123"),
            ("MAX_REQUEST_BODY_MB", huge.as_str()),
        ]));
        assert!(result.is_err());

        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://x"),
            ("JWT_SECRET", "0123456789abcdef0123"),
            ("MAX_REQUEST_BODY_MB", "25"),
        ]))
        .unwrap();
        assert_eq!(config.max_request_body_bytes(), 25 * 1024 * 1024);
    }

    #[test]
    fn bad_number_fails() {
        let result = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://x"),
            ("JWT_SECRET", "0123456789abcdef0123"),
            ("JWT_EXPIRY_HOURS", "soon"),
        ]));
        assert!(result.is_err());
    }
}
