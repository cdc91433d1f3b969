//! Runtime configuration read from environment variables.
//!
//! Blank variables count as unset. [`Config::from_lookup`] takes the lookup
//! function so loading can be exercised without touching the process
//! environment.

use crate::error::AppError;
use crate::mailer::Branding;
use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_SMTP_HOST: &str = "smtp-relay.brevo.com";
pub const DEFAULT_SMTP_PORT: u16 = 587;
pub const DEFAULT_MAIL_FROM: &str = "\"Beta Testing Team\" <no-reply@yourdomain.com>";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Hosted PostgREST backend (Supabase project).
#[derive(Debug, Clone, PartialEq)]
pub struct BackendConfig {
    pub url: String,
    pub anon_key: String,
}

/// Authenticated SMTP relay.
#[derive(Clone, PartialEq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Sender mailbox, e.g. `"Beta Testing Team" <no-reply@example.com>`.
    pub from: String,
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("from", &self.from)
            .finish_non_exhaustive()
    }
}

/// How the admin password is supplied.
#[derive(Clone, PartialEq)]
pub enum AdminPassword {
    /// Plaintext, hashed once at startup.
    Plain(String),
    /// Argon2 PHC string.
    Hash(String),
}

impl fmt::Debug for AdminPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(_) => f.write_str("Plain(..)"),
            Self::Hash(_) => f.write_str("Hash(..)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdminConfig {
    pub email: String,
    pub password: AdminPassword,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    /// Origin used in links sent to testers, e.g. `https://beta.example.com`.
    pub public_url: String,
    pub static_dir: PathBuf,
    /// Directory for the JSON store when no backend is configured.
    pub data_dir: PathBuf,
    pub backend: Option<BackendConfig>,
    pub smtp: Option<SmtpConfig>,
    /// HTTP mail endpoint used when SMTP is not configured.
    pub mail_endpoint: Option<String>,
    pub admin: Option<AdminConfig>,
    pub branding: Branding,
    /// Require iCloud/Gmail addresses matching the tester's device.
    pub strict_platform_emails: bool,
    pub http_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup
    ///
    /// # Arguments
    /// * `lookup` - Returns the raw value of a variable, if set
    ///
    /// # Returns
    /// * `Result<Config, AppError>` - The configuration, or a config error for
    ///   malformed numbers or half-configured integrations
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bind_addr = get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let public_url = get("PUBLIC_URL")
            .unwrap_or_else(|| format!("http://{}", bind_addr))
            .trim_end_matches('/')
            .to_string();

        let backend = match (get("SUPABASE_URL"), get("SUPABASE_ANON_KEY")) {
            (Some(url), Some(anon_key)) => Some(BackendConfig { url, anon_key }),
            (None, None) => None,
            _ => {
                return Err(AppError::config(
                    "SUPABASE_URL and SUPABASE_ANON_KEY must be set together",
                ));
            }
        };

        let username = get("SMTP_USERNAME").or_else(|| get("BREVO_EMAIL"));
        let password = get("SMTP_PASSWORD").or_else(|| get("BREVO_PASSWORD"));
        let smtp = match (username, password) {
            (Some(username), Some(password)) => Some(SmtpConfig {
                host: get("SMTP_HOST").unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string()),
                port: parse_number(get("SMTP_PORT"), "SMTP_PORT", DEFAULT_SMTP_PORT)?,
                username,
                password,
                from: get("MAIL_FROM").unwrap_or_else(|| DEFAULT_MAIL_FROM.to_string()),
            }),
            _ => None,
        };

        let admin = match get("ADMIN_EMAIL") {
            Some(email) => {
                let password = match (get("ADMIN_PASSWORD_HASH"), get("ADMIN_PASSWORD")) {
                    (Some(hash), _) => AdminPassword::Hash(hash),
                    (None, Some(plain)) => AdminPassword::Plain(plain),
                    (None, None) => {
                        return Err(AppError::config(
                            "ADMIN_EMAIL is set but neither ADMIN_PASSWORD nor ADMIN_PASSWORD_HASH is",
                        ));
                    }
                };
                Some(AdminConfig { email, password })
            }
            None => None,
        };

        let defaults = Branding::default();
        let branding = Branding {
            app_name: get("APP_NAME").unwrap_or(defaults.app_name),
            team_name: get("TEAM_NAME").unwrap_or(defaults.team_name),
            support_email: get("SUPPORT_EMAIL"),
            testing_start_date: get("TESTING_START_DATE"),
        };

        Ok(Self {
            bind_addr,
            public_url,
            static_dir: get("STATIC_DIR").unwrap_or_else(|| "static".to_string()).into(),
            data_dir: get("DATA_DIR").unwrap_or_else(|| "database".to_string()).into(),
            backend,
            smtp,
            mail_endpoint: get("MAIL_ENDPOINT"),
            admin,
            branding,
            strict_platform_emails: get("STRICT_PLATFORM_EMAILS")
                .is_some_and(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on")),
            http_timeout_secs: parse_number(
                get("HTTP_TIMEOUT_SECS"),
                "HTTP_TIMEOUT_SECS",
                DEFAULT_HTTP_TIMEOUT_SECS,
            )?,
        })
    }
}

fn parse_number<T: std::str::FromStr>(value: Option<String>, key: &str, default: T) -> Result<T, AppError> {
    match value {
        None => Ok(default),
        Some(v) => v
            .parse()
            .map_err(|_| AppError::config(format!("{} must be a number, got {:?}", key, v))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, AppError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:3000");
        assert_eq!(config.public_url, "http://127.0.0.1:3000");
        assert_eq!(config.data_dir, PathBuf::from("database"));
        assert!(config.backend.is_none());
        assert!(config.smtp.is_none());
        assert!(config.admin.is_none());
        assert!(!config.strict_platform_emails);
        assert_eq!(config.http_timeout_secs, 30);
        assert_eq!(config.branding.app_name, "MCCI Tax Refund System");
    }

    #[test]
    fn test_brevo_fallback_for_smtp() {
        let config = load(&[
            ("BREVO_EMAIL", "relay-user"),
            ("BREVO_PASSWORD", "relay-pass"),
            ("SMTP_PORT", "2525"),
            ("PUBLIC_URL", "https://beta.example.com/"),
        ])
        .unwrap();
        let smtp = config.smtp.unwrap();
        assert_eq!(smtp.host, "smtp-relay.brevo.com");
        assert_eq!(smtp.port, 2525);
        assert_eq!(smtp.username, "relay-user");
        assert_eq!(smtp.from, DEFAULT_MAIL_FROM);
        assert_eq!(config.public_url, "https://beta.example.com");
    }

    #[test]
    fn test_bad_port_is_config_error() {
        let err = load(&[
            ("SMTP_USERNAME", "u"),
            ("SMTP_PASSWORD", "p"),
            ("SMTP_PORT", "smtp"),
        ])
        .unwrap_err();
        assert!(matches!(err, AppError::Config { .. }));
    }

    #[test]
    fn test_backend_requires_both_values() {
        assert!(load(&[("SUPABASE_URL", "https://x.supabase.co")]).is_err());
        let config = load(&[
            ("SUPABASE_URL", "https://x.supabase.co"),
            ("SUPABASE_ANON_KEY", "anon"),
        ])
        .unwrap();
        assert_eq!(config.backend.unwrap().anon_key, "anon");
    }

    #[test]
    fn test_admin_password_sources() {
        let config = load(&[
            ("ADMIN_EMAIL", "admin@example.com"),
            ("ADMIN_PASSWORD", "pw"),
            ("ADMIN_PASSWORD_HASH", "$argon2id$v=19$..."),
        ])
        .unwrap();
        assert!(matches!(
            config.admin.unwrap().password,
            AdminPassword::Hash(_)
        ));
        assert!(load(&[("ADMIN_EMAIL", "admin@example.com")]).is_err());
    }

    #[test]
    fn test_blank_values_are_unset() {
        let config = load(&[("MAIL_ENDPOINT", "  "), ("STRICT_PLATFORM_EMAILS", "true")]).unwrap();
        assert!(config.mail_endpoint.is_none());
        assert!(config.strict_platform_emails);
    }
}
