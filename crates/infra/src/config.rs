//! Process configuration read from the environment.
//!
//! Any missing or out-of-range value aborts startup.

use std::net::IpAddr;
use std::sync::Arc;

use chrono::Duration;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_LISTEN_IP: &str = "0.0.0.0";
pub const DEFAULT_JWT_DURATION_MINUTES: i64 = 60;
pub const MAX_JWT_DURATION_MINUTES: i64 = 14_400;
pub const DEFAULT_ADMIN_USER: &str = "goadmin";
pub const DEFAULT_ADMIN_EMAIL: &str = "goadmin@yourdomain.org";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {reason}")]
    Invalid { name: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            name,
            reason: reason.into(),
        }
    }
}

/// Bootstrap administrator account settings.
#[derive(Clone, PartialEq, Eq)]
pub struct AdminAccount {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for AdminAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminAccount")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub listen_ip: IpAddr,
    pub port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    /// Shared, immutable signing key.
    pub jwt_secret: Arc<[u8]>,
    pub jwt_validity: Duration,
    pub admin: AdminAccount,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("listen_ip", &self.listen_ip)
            .field("port", &self.port)
            .field("db_max_connections", &self.db_max_connections)
            .field("jwt_validity_minutes", &self.jwt_validity.num_minutes())
            .field("admin", &self.admin)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from any name → value lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = match get("PORT") {
            None => DEFAULT_PORT,
            Some(raw) => {
                let port: u16 = raw
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::invalid("PORT", format!("'{raw}' is not a port number")))?;
                if port == 0 {
                    return Err(ConfigError::invalid("PORT", "must be between 1 and 65535"));
                }
                port
            }
        };

        let listen_ip = get("LISTEN_IP")
            .unwrap_or_else(|| DEFAULT_LISTEN_IP.to_string())
            .trim()
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::invalid("LISTEN_IP", e.to_string()))?;

        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let db_max_connections = match get("DB_MAX_CONNECTIONS") {
            None => std::thread::available_parallelism()
                .map(|n| n.get() as u32)
                .unwrap_or(1),
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| *n >= 1)
                .ok_or_else(|| {
                    ConfigError::invalid("DB_MAX_CONNECTIONS", format!("'{raw}' is not a positive integer"))
                })?,
        };

        // Not trimmed: whitespace is part of the key.
        let jwt_secret = lookup("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let jwt_minutes = match get("JWT_DURATION_MINUTES") {
            None => DEFAULT_JWT_DURATION_MINUTES,
            Some(raw) => {
                let minutes: i64 = raw.trim().parse().map_err(|_| {
                    ConfigError::invalid("JWT_DURATION_MINUTES", format!("'{raw}' is not an integer"))
                })?;
                if !(1..=MAX_JWT_DURATION_MINUTES).contains(&minutes) {
                    return Err(ConfigError::invalid(
                        "JWT_DURATION_MINUTES",
                        format!("must be between 1 and {MAX_JWT_DURATION_MINUTES}, got {minutes}"),
                    ));
                }
                minutes
            }
        };

        let admin = AdminAccount {
            username: get("ADMIN_USER").unwrap_or_else(|| DEFAULT_ADMIN_USER.to_string()),
            email: get("ADMIN_EMAIL").unwrap_or_else(|| DEFAULT_ADMIN_EMAIL.to_string()),
            password: lookup("ADMIN_PASSWORD")
                .filter(|s| !s.is_empty())
                .ok_or(ConfigError::Missing("ADMIN_PASSWORD"))?,
        };

        Ok(Self {
            listen_ip,
            port,
            database_url,
            db_max_connections,
            jwt_secret: Arc::from(jwt_secret.into_bytes()),
            jwt_validity: Duration::minutes(jwt_minutes),
            admin,
        })
    }

    pub fn listen_addr(&self) -> std::net::SocketAddr {
        std::net::SocketAddr::new(self.listen_ip, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("DATABASE_URL", "postgres://localhost/usergroup"),
        ("JWT_SECRET", "s3cret"),
        ("ADMIN_PASSWORD", "admin-pass"),
    ];

    fn with(extra: &[(&'static str, &'static str)]) -> Vec<(&'static str, &'static str)> {
        let mut v = REQUIRED.to_vec();
        v.extend_from_slice(extra);
        v
    }

    #[test]
    fn defaults_apply() {
        let cfg = AppConfig::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.listen_addr().to_string(), "0.0.0.0:8080");
        assert_eq!(cfg.jwt_validity, Duration::minutes(60));
        assert_eq!(cfg.admin.username, "goadmin");
        assert_eq!(cfg.admin.email, "goadmin@yourdomain.org");
        assert_eq!(&*cfg.jwt_secret, b"s3cret");
        assert!(cfg.db_max_connections >= 1);
    }

    #[test]
    fn missing_secret_aborts() {
        let err = AppConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://x"),
            ("ADMIN_PASSWORD", "p"),
        ]))
        .unwrap_err();
        assert_eq!(err, ConfigError::Missing("JWT_SECRET"));
    }

    #[test]
    fn empty_admin_password_aborts() {
        let vars = [
            ("DATABASE_URL", "postgres://x"),
            ("JWT_SECRET", "k"),
            ("ADMIN_PASSWORD", ""),
        ];
        assert_eq!(
            AppConfig::from_lookup(lookup(&vars)).unwrap_err(),
            ConfigError::Missing("ADMIN_PASSWORD")
        );
    }

    #[test]
    fn jwt_duration_bounds() {
        for bad in ["0", "14401", "-5", "sixty"] {
            let vars = with(&[("JWT_DURATION_MINUTES", bad)]);
            assert!(
                AppConfig::from_lookup(lookup(&vars)).is_err(),
                "{bad} should be rejected"
            );
        }
        for good in ["1", "14400"] {
            let vars = with(&[("JWT_DURATION_MINUTES", good)]);
            assert!(AppConfig::from_lookup(lookup(&vars)).is_ok());
        }
    }

    #[test]
    fn port_bounds() {
        assert!(AppConfig::from_lookup(lookup(&with(&[("PORT", "0")]))).is_err());
        assert!(AppConfig::from_lookup(lookup(&with(&[("PORT", "65536")]))).is_err());
        let cfg = AppConfig::from_lookup(lookup(&with(&[("PORT", "9090")]))).unwrap();
        assert_eq!(cfg.port, 9090);
    }

    #[test]
    fn debug_output_hides_secrets() {
        let cfg = AppConfig::from_lookup(lookup(&REQUIRED)).unwrap();
        let shown = format!("{cfg:?}");
        assert!(!shown.contains("s3cret"));
        assert!(!shown.contains("admin-pass"));
        assert!(!shown.contains("postgres://"));
    }
}
