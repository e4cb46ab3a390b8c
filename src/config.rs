use std::{env, fmt::Display, str::FromStr};

use thiserror::Error;
use tracing::info;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid {key} value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Ten years.
pub const SESSION_TTL_MAX_SECS: i64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub db_pool_size: u32,
    pub run_migrations: bool,
    pub session_ttl_secs: i64,
    pub session_cleanup_secs: u64,
    pub session_cookie_secure: bool,
    pub staff_account: Option<StaffAccount>,
}

#[derive(Debug, Clone)]
pub struct StaffAccount {
    pub email: String,
    pub password: String,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let staff_account = match (lookup("STAFF_EMAIL"), lookup("STAFF_PASSWORD")) {
            (Some(email), Some(password)) => Some(StaffAccount { email, password }),
            _ => None,
        };

        let session_ttl_secs = try_load(&lookup, "SESSION_TTL_SECS", "1209600")?;
        if !(1..=SESSION_TTL_MAX_SECS).contains(&session_ttl_secs) {
            return Err(ConfigError::Invalid {
                key: "SESSION_TTL_SECS",
                value: session_ttl_secs.to_string(),
                reason: format!("must be between 1 and {SESSION_TTL_MAX_SECS} seconds"),
            });
        }

        Ok(Self {
            host: try_load(&lookup, "HOST", "127.0.0.1")?,
            port: try_load(&lookup, "PORT", "3000")?,
            database_url,
            db_pool_size: try_load(&lookup, "DB_POOL_SIZE", "10")?,
            run_migrations: try_load(&lookup, "RUN_MIGRATIONS", "true")?,
            session_ttl_secs,
            session_cleanup_secs: try_load(&lookup, "SESSION_CLEANUP_SECS", "300")?,
            session_cookie_secure: try_load(&lookup, "SESSION_COOKIE_SECURE", "false")?,
            staff_account,
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn try_load<T, F>(lookup: &F, key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_owned()
    });

    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_database_url_is_set() {
        let config = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://db/store")])).unwrap();

        assert_eq!(config.address(), "127.0.0.1:3000");
        assert_eq!(config.db_pool_size, 10);
        assert!(config.run_migrations);
        assert_eq!(config.session_ttl_secs, 1_209_600);
        assert!(!config.session_cookie_secure);
        assert!(config.staff_account.is_none());
    }

    #[test]
    fn missing_database_url_is_an_error() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("DATABASE_URL"));
    }

    #[test]
    fn invalid_port_is_reported_with_its_key() {
        let err = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db/store"),
            ("PORT", "eighty"),
        ]))
        .unwrap_err();

        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));
    }

    #[test]
    fn session_ttl_must_be_positive_and_bounded() {
        for ttl in ["0", "-5", "100000000000000"] {
            let err = Config::from_lookup(lookup(&[
                ("DATABASE_URL", "postgres://db/store"),
                ("SESSION_TTL_SECS", ttl),
            ]))
            .unwrap_err();

            assert!(
                matches!(err, ConfigError::Invalid { key: "SESSION_TTL_SECS", .. }),
                "{ttl}"
            );
        }

        let max = SESSION_TTL_MAX_SECS.to_string();
        let longest = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db/store"),
            ("SESSION_TTL_SECS", max.as_str()),
        ]))
        .unwrap();
        assert_eq!(longest.session_ttl_secs, SESSION_TTL_MAX_SECS);
    }

    #[test]
    fn staff_account_needs_both_variables() {
        let only_email = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db/store"),
            ("STAFF_EMAIL", "admin@example.com"),
        ]))
        .unwrap();
        assert!(only_email.staff_account.is_none());

        let both = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db/store"),
            ("STAFF_EMAIL", "admin@example.com"),
            ("STAFF_PASSWORD", "secret-password"),
        ]))
        .unwrap();
        assert_eq!(both.staff_account.unwrap().email, "admin@example.com");
    }
}
