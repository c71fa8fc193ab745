//! Report sink trait definition.
//!
//! This module defines the [`ReportSink`] trait which abstracts over mail
//! transports (Gmail API, SMTP). The orchestrator calls it once per owner
//! report; presentation is the sink's concern, so the core only ever hands
//! over structured [`OwnerReport`] values.

use async_trait::async_trait;

use crate::domain::OwnerReport;

/// Result type alias for report sink operations.
pub type Result<T> = std::result::Result<T, SinkError>;

/// Errors that can occur during report delivery.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Authentication failed or credentials expired.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Network or connection error.
    #[error("connection error: {0}")]
    Connection(String),

    /// The transport rejected the message or an address.
    #[error("message rejected: {0}")]
    Rejected(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Delivery seam for owner reports.
///
/// A failed delivery for one owner must not prevent delivery to others;
/// the orchestrator catches the error, logs it, and moves on.
#[async_trait]
pub trait ReportSink: Send + Sync {
    /// Renders and delivers one owner report, CCing the given addresses.
    /// Returns the transport's message id.
    async fn deliver(&self, report: &OwnerReport, cc: &[String]) -> Result<String>;
}
