//! Activity record domain types.
//!
//! An activity record is one logged interaction (a CRM task) linked to
//! exactly one deal. Records are immutable once fetched; the provider tags
//! each record with its creator's account-class token before handing it to
//! the core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ActivityId, DealId, UserId};

/// A logged interaction associated with one deal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Unique identifier.
    pub id: ActivityId,
    /// The deal this activity belongs to (many-to-one).
    pub deal_id: DealId,
    /// User who created the activity.
    pub created_by: UserId,
    /// The creator's account-class token (license name), resolved by the
    /// provider via a user lookup. `None` when the lookup could not resolve
    /// the creator; such records never count as human touches.
    pub creator_license: Option<String>,
    /// When the activity was logged.
    pub created_at: DateTime<Utc>,
    /// Whether the activity is marked completed in the CRM.
    pub completed: bool,
}
