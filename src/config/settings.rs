//! Application settings and configuration types.
//!
//! Settings are persisted to `~/.config/pulse/settings.json` (or the XDG
//! equivalent) and loaded once at process start. Secrets (OAuth client
//! credentials, refresh tokens, the SMTP password) are never written to the
//! settings file; they come from the environment at runtime.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level application settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Report window and threshold policy.
    pub report: ReportSettings,
    /// CRM connection settings.
    pub crm: CrmSettings,
    /// Mail transport settings.
    pub mail: MailSettings,
    /// Recipient routing settings.
    pub delivery: DeliverySettings,
}

impl Settings {
    /// Default settings file path inside the platform config directory.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "pulse")
            .map(|dirs| dirs.config_dir().join("settings.json"))
    }

    /// Loads settings from the given path, then applies environment
    /// overrides for the recipient lists.
    ///
    /// A missing file yields defaults; a malformed file is an error, since
    /// silently falling back could mis-route reports.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let mut settings = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| SettingsError::Io(path.display().to_string(), e))?;
            serde_json::from_str(&raw)
                .map_err(|e| SettingsError::Parse(path.display().to_string(), e))?
        } else {
            Self::default()
        };
        settings.delivery.apply_env_overrides();
        Ok(settings)
    }
}

/// Errors that can occur while loading settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// The settings file could not be read.
    #[error("failed to read settings file {0}: {1}")]
    Io(String, #[source] std::io::Error),

    /// The settings file is not valid JSON.
    #[error("failed to parse settings file {0}: {1}")]
    Parse(String, #[source] serde_json::Error),
}

/// Report window and threshold policy.
///
/// These thresholds are read once at startup and passed into the core by
/// reference; nothing in the pipeline reads ambient configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    /// Trailing creation window: only deals created within this many days
    /// are eligible.
    pub creation_window_days: i64,
    /// A deal whose last human touch is older than this many days is
    /// high priority.
    pub staleness_window_days: i64,
    /// Minimum human-touch count for a deal to appear in any report.
    pub min_touch_count: u32,
    /// Segment whose deals are excluded from reporting.
    pub excluded_segment: Option<String>,
    /// Whether a touch exactly at the staleness boundary counts as stale.
    pub stale_boundary: StalenessBoundary,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            creation_window_days: 180,
            staleness_window_days: 60,
            min_touch_count: 2,
            excluded_segment: Some("TVG".to_string()),
            stale_boundary: StalenessBoundary::Exclusive,
        }
    }
}

/// Staleness boundary comparison policy.
///
/// Controls how a last touch exactly at `now - staleness_window` is
/// classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StalenessBoundary {
    /// Strictly-older-than: a touch exactly at the boundary is still
    /// considered recent (tier normal).
    Exclusive,
    /// Older-or-equal: a touch exactly at the boundary is stale (tier high).
    Inclusive,
}

/// CRM connection settings (non-secret parts).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrmSettings {
    /// Login domain prefix for the OAuth token endpoint, e.g. "login" or
    /// "test".
    pub domain: String,
    /// Instance base URL, e.g. "https://example.my.salesforce.com".
    /// Overridable via `SF_INSTANCE_URL`.
    pub instance_url: Option<String>,
}

impl Default for CrmSettings {
    fn default() -> Self {
        Self {
            domain: "login".to_string(),
            instance_url: None,
        }
    }
}

/// Mail transport selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailTransport {
    /// Send through the Gmail REST API.
    Gmail,
    /// Send through an SMTP relay.
    Smtp,
}

/// Mail transport settings (non-secret parts).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailSettings {
    /// Which transport to deliver through.
    pub transport: MailTransport,
    /// From address for outgoing reports.
    pub sender: String,
    /// SMTP relay settings, used when `transport` is `smtp`.
    pub smtp: SmtpSettings,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            transport: MailTransport::Gmail,
            sender: String::new(),
            smtp: SmtpSettings::default(),
        }
    }
}

/// SMTP relay settings. The password comes from `SMTP_PASSWORD`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpSettings {
    /// Relay hostname.
    pub host: String,
    /// Relay port (typically 465 for TLS, 587 for STARTTLS).
    pub port: u16,
    /// Whether to use direct TLS (true) or STARTTLS (false).
    pub use_tls: bool,
    /// Username for relay authentication.
    pub username: String,
}

impl Default for SmtpSettings {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 465,
            use_tls: true,
            username: String::new(),
        }
    }
}

/// Recipient routing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliverySettings {
    /// Allow-list of owner emails eligible to receive a report. Owners with
    /// deals but not on this list are silently skipped.
    pub subscribers: Vec<String>,
    /// CC list applied uniformly to every delivery.
    pub cc: Vec<String>,
}

impl DeliverySettings {
    /// Applies `SUBSCRIBERS` and `REPORT_CC` environment overrides
    /// (comma-separated), then normalizes subscriber emails to lowercase.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(raw) = std::env::var("SUBSCRIBERS") {
            self.subscribers = split_email_list(&raw);
        }
        if let Ok(raw) = std::env::var("REPORT_CC") {
            self.cc = split_email_list(&raw);
        }
        for email in &mut self.subscribers {
            *email = email.to_lowercase();
        }
    }

    /// Returns true if the given (lowercased) owner email may receive a
    /// report.
    pub fn is_subscribed(&self, owner_email: &str) -> bool {
        self.subscribers.iter().any(|s| s == owner_email)
    }
}

/// Splits a comma-separated email list, trimming whitespace and dropping
/// empty entries.
fn split_email_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .collect()
}
