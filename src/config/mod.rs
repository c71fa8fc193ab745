//! Configuration and settings management.
//!
//! This module provides application settings types and persistence.
//! Settings are stored in the user's config directory as JSON; secrets are
//! read from the environment and never persisted.

mod settings;

pub use settings::{
    CrmSettings, DeliverySettings, MailSettings, MailTransport, ReportSettings, Settings,
    SettingsError, SmtpSettings, StalenessBoundary,
};
