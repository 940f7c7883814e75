use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use zeroize::Zeroizing;

/// Application-level constants
pub const APP_NAME: &str = "Paydesk";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default hosted extraction endpoint (Gemini `generateContent` API).
pub const DEFAULT_EXTRACTION_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_EXTRACTION_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_DASHBOARD_ADDR: &str = "127.0.0.1:8787";

/// Upper bound for one extraction request (PDF upload plus model time).
pub const EXTRACTION_TIMEOUT_SECS: u64 = 120;

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "paydesk_lib=info,paydesk=info,chromiumoxide=warn"
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Required secret {0} is not configured")]
    MissingSecret(&'static str),

    #[error("Required setting {0} is not configured")]
    MissingSetting(&'static str),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Cannot read portal layout file {path}: {reason}")]
    Layout { path: String, reason: String },
}

/// Portal login pair. The password is wiped on drop.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: Zeroizing<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Bounded waits used by every strategy.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub step: Duration,
    pub login: Duration,
    pub download: Duration,
    /// Interval between visibility/download polls.
    pub poll: Duration,
    /// Pause after clicks so page scripts can settle.
    pub settle: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            step: Duration::from_secs(15),
            login: Duration::from_secs(30),
            download: Duration::from_secs(30),
            poll: Duration::from_millis(250),
            settle: Duration::from_millis(800),
        }
    }
}

#[derive(Clone)]
pub struct ExtractionSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: Zeroizing<String>,
}

impl fmt::Debug for ExtractionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionSettings")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Everything the program reads from its environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub portal_url: String,
    pub credentials: Credentials,
    pub extraction: ExtractionSettings,
    pub output_dir: PathBuf,
    pub dashboard_addr: SocketAddr,
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
    pub layout_file: Option<PathBuf>,
    pub timeouts: Timeouts,
}

impl Settings {
    /// Read settings from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary lookup. Blank values count as unset.
    ///
    /// Secrets have no fallback: a missing username, password or API key is an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let portal_url =
            get("PAYDESK_PORTAL_URL").ok_or(ConfigError::MissingSetting("PAYDESK_PORTAL_URL"))?;
        if !(portal_url.starts_with("https://") || portal_url.starts_with("http://")) {
            return Err(ConfigError::InvalidValue {
                key: "PAYDESK_PORTAL_URL",
                value: portal_url,
            });
        }

        let username = get("PAYDESK_PORTAL_USERNAME")
            .ok_or(ConfigError::MissingSecret("PAYDESK_PORTAL_USERNAME"))?;
        // Passwords keep their surrounding whitespace.
        let password = lookup("PAYDESK_PORTAL_PASSWORD")
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::MissingSecret("PAYDESK_PORTAL_PASSWORD"))?;
        let api_key = get("PAYDESK_EXTRACTION_API_KEY")
            .ok_or(ConfigError::MissingSecret("PAYDESK_EXTRACTION_API_KEY"))?;

        let dashboard_raw =
            get("PAYDESK_DASHBOARD_ADDR").unwrap_or_else(|| DEFAULT_DASHBOARD_ADDR.to_string());
        let dashboard_addr: SocketAddr =
            dashboard_raw
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    key: "PAYDESK_DASHBOARD_ADDR",
                    value: dashboard_raw.clone(),
                })?;

        let headless = match get("PAYDESK_HEADLESS") {
            None => true,
            Some(v) => parse_bool(&v).ok_or(ConfigError::InvalidValue {
                key: "PAYDESK_HEADLESS",
                value: v,
            })?,
        };

        let defaults = Timeouts::default();
        let timeouts = Timeouts {
            step: secs_or(get("PAYDESK_STEP_TIMEOUT_SECS"), "PAYDESK_STEP_TIMEOUT_SECS", defaults.step)?,
            login: secs_or(get("PAYDESK_LOGIN_TIMEOUT_SECS"), "PAYDESK_LOGIN_TIMEOUT_SECS", defaults.login)?,
            download: secs_or(
                get("PAYDESK_DOWNLOAD_TIMEOUT_SECS"),
                "PAYDESK_DOWNLOAD_TIMEOUT_SECS",
                defaults.download,
            )?,
            ..defaults
        };

        Ok(Self {
            portal_url,
            credentials: Credentials {
                username,
                password: Zeroizing::new(password),
            },
            extraction: ExtractionSettings {
                base_url: get("PAYDESK_EXTRACTION_URL")
                    .unwrap_or_else(|| DEFAULT_EXTRACTION_URL.to_string())
                    .trim_end_matches('/')
                    .to_string(),
                model: get("PAYDESK_EXTRACTION_MODEL")
                    .unwrap_or_else(|| DEFAULT_EXTRACTION_MODEL.to_string()),
                api_key: Zeroizing::new(api_key),
            },
            output_dir: get("PAYDESK_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            dashboard_addr,
            headless,
            chrome_path: get("PAYDESK_CHROME_PATH").map(PathBuf::from),
            layout_file: get("PAYDESK_LAYOUT_FILE").map(PathBuf::from),
            timeouts,
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn secs_or(
    value: Option<String>,
    key: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match value {
        None => Ok(default),
        Some(v) => v
            .parse::<u64>()
            .ok()
            .filter(|n| *n > 0)
            .map(Duration::from_secs)
            .ok_or(ConfigError::InvalidValue { key, value: v }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn complete() -> HashMap<String, String> {
        env(&[
            ("PAYDESK_PORTAL_URL", "https://hr.example.com/portal"),
            ("PAYDESK_PORTAL_USERNAME", "mrossi"),
            ("PAYDESK_PORTAL_PASSWORD", "s3cret"),
            ("PAYDESK_EXTRACTION_API_KEY", "key-123"),
        ])
    }

    fn load(map: &HashMap<String, String>) -> Result<Settings, ConfigError> {
        Settings::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn complete_environment_uses_defaults() {
        let settings = load(&complete()).unwrap();
        assert_eq!(settings.portal_url, "https://hr.example.com/portal");
        assert_eq!(settings.credentials.username, "mrossi");
        assert_eq!(settings.credentials.password.as_str(), "s3cret");
        assert_eq!(settings.extraction.model, DEFAULT_EXTRACTION_MODEL);
        assert_eq!(settings.extraction.base_url, DEFAULT_EXTRACTION_URL);
        assert_eq!(settings.output_dir, PathBuf::from("."));
        assert_eq!(settings.dashboard_addr.to_string(), DEFAULT_DASHBOARD_ADDR);
        assert!(settings.headless);
        assert_eq!(settings.timeouts.step, Duration::from_secs(15));
    }

    #[test]
    fn missing_password_fails_closed() {
        let mut map = complete();
        map.remove("PAYDESK_PORTAL_PASSWORD");
        assert_eq!(
            load(&map).unwrap_err(),
            ConfigError::MissingSecret("PAYDESK_PORTAL_PASSWORD")
        );
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let mut map = complete();
        map.insert("PAYDESK_EXTRACTION_API_KEY".into(), "   ".into());
        assert_eq!(
            load(&map).unwrap_err(),
            ConfigError::MissingSecret("PAYDESK_EXTRACTION_API_KEY")
        );
    }

    #[test]
    fn portal_url_must_be_http() {
        let mut map = complete();
        map.insert("PAYDESK_PORTAL_URL".into(), "ftp://hr.example.com".into());
        assert!(matches!(
            load(&map),
            Err(ConfigError::InvalidValue { key: "PAYDESK_PORTAL_URL", .. })
        ));
    }

    #[test]
    fn overrides_are_applied() {
        let mut map = complete();
        map.insert("PAYDESK_HEADLESS".into(), "no".into());
        map.insert("PAYDESK_STEP_TIMEOUT_SECS".into(), "5".into());
        map.insert("PAYDESK_OUTPUT_DIR".into(), "/tmp/payroll".into());
        map.insert("PAYDESK_EXTRACTION_URL".into(), "http://localhost:9000/".into());
        let settings = load(&map).unwrap();
        assert!(!settings.headless);
        assert_eq!(settings.timeouts.step, Duration::from_secs(5));
        assert_eq!(settings.output_dir, PathBuf::from("/tmp/payroll"));
        assert_eq!(settings.extraction.base_url, "http://localhost:9000");
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut map = complete();
        map.insert("PAYDESK_LOGIN_TIMEOUT_SECS".into(), "0".into());
        assert!(matches!(
            load(&map),
            Err(ConfigError::InvalidValue { key: "PAYDESK_LOGIN_TIMEOUT_SECS", .. })
        ));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let settings = load(&complete()).unwrap();
        let debug = format!("{settings:?}");
        assert!(!debug.contains("s3cret"));
        assert!(!debug.contains("key-123"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn app_name_is_paydesk() {
        assert_eq!(APP_NAME, "Paydesk");
    }
}
