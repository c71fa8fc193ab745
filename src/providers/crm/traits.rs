//! CRM provider trait definition.
//!
//! This module defines the [`CrmProvider`] trait which abstracts over the
//! record store the reporter reads from. The core calls it through two
//! narrow fetch operations and never sees transport details.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{ActivityRecord, Deal, DealId};

/// Result type alias for CRM provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Errors that can occur during CRM provider operations.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Authentication failed or credentials expired.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Network or connection error.
    #[error("connection error: {0}")]
    Connection(String),

    /// A fetched record is missing required fields. Aborts the run: a
    /// miscount directly misleads a human recipient.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// The CRM API rejected or failed the request.
    #[error("API error: {0}")]
    Api(String),
}

/// Read access to the deal and activity record store.
///
/// Implementations perform all transport, pagination, and reference
/// resolution (including the user-to-license lookup that tags each activity
/// with its creator's account-class token).
#[async_trait]
pub trait CrmProvider: Send + Sync {
    /// Fetches open deals created after the given timestamp, excluding the
    /// given segment server-side where possible. Callers still re-validate
    /// both invariants defensively.
    async fn fetch_open_deals(
        &self,
        created_after: DateTime<Utc>,
        excluded_segment: Option<&str>,
    ) -> Result<Vec<Deal>>;

    /// Fetches all activity records linked to the given deals, each tagged
    /// with its creator's account-class token.
    async fn fetch_activities(&self, deal_ids: &[DealId]) -> Result<Vec<ActivityRecord>>;
}
