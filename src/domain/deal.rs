//! Deal domain types.
//!
//! Represents open sales opportunities and their owners as fetched from the
//! CRM. A deal is immutable for the duration of a run; all derived state
//! (engagement, tier) lives in separate types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DealId, UserId};

/// The CRM user who owns a deal and receives its report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    /// Owner's user identifier.
    pub id: UserId,
    /// Display name (e.g., "Alice Smith").
    pub name: Option<String>,
    /// Email address, the routing key for report delivery.
    pub email: String,
}

impl Owner {
    /// Creates an owner with just an id and email.
    pub fn new(id: impl Into<UserId>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            email: email.into(),
        }
    }

    /// Creates an owner with id, email, and display name.
    pub fn with_name(
        id: impl Into<UserId>,
        email: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
            email: email.into(),
        }
    }

    /// Returns the owner's email lowercased, the stable grouping key used
    /// for partitioning and allow-list matching.
    pub fn routing_email(&self) -> String {
        self.email.to_lowercase()
    }
}

/// An open sales opportunity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    /// Unique, stable identifier.
    pub id: DealId,
    /// Deal name.
    pub name: String,
    /// Current pipeline stage.
    pub stage: Option<String>,
    /// Deal amount in the org currency.
    pub amount: Option<f64>,
    /// Owning user.
    pub owner: Owner,
    /// Name of the associated account, if any.
    pub account_name: Option<String>,
    /// Contact email on the associated account.
    pub account_email: Option<String>,
    /// When the deal was created.
    pub created_at: DateTime<Utc>,
    /// Segment marker; deals in the configured excluded segment are never
    /// reported.
    pub segment: Option<String>,
}

impl Deal {
    /// Returns true if this deal belongs to the given segment
    /// (ASCII-case-insensitive).
    pub fn in_segment(&self, segment: &str) -> bool {
        self.segment
            .as_deref()
            .map(|s| s.eq_ignore_ascii_case(segment))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn deal(segment: Option<&str>) -> Deal {
        Deal {
            id: DealId::from("006X1"),
            name: "Acme Renewal".to_string(),
            stage: Some("Negotiation".to_string()),
            amount: Some(12_000.0),
            owner: Owner::with_name("005X1", "Alice@Example.com", "Alice Smith"),
            account_name: Some("Acme".to_string()),
            account_email: None,
            created_at: Utc.with_ymd_and_hms(2026, 7, 1, 9, 0, 0).unwrap(),
            segment: segment.map(|s| s.to_string()),
        }
    }

    #[test]
    fn routing_email_is_lowercased() {
        let owner = Owner::new("005X1", "Alice@Example.com");
        assert_eq!(owner.routing_email(), "alice@example.com");
    }

    #[test]
    fn in_segment_matches_case_insensitively() {
        let d = deal(Some("TVG"));
        assert!(d.in_segment("tvg"));
        assert!(!d.in_segment("enterprise"));
    }

    #[test]
    fn in_segment_without_marker_is_false() {
        let d = deal(None);
        assert!(!d.in_segment("tvg"));
    }
}
