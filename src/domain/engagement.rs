//! Derived engagement types.
//!
//! Everything in this module is computed fresh on each run from the current
//! deal and activity snapshot, and discarded once reports are delivered.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Deal, DealId};

/// Per-deal aggregate of genuine human engagement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementSummary {
    /// The summarized deal.
    pub deal_id: DealId,
    /// Number of human touches recorded against the deal.
    pub touch_count: u32,
    /// Timestamp of the most recent human touch. `None` iff `touch_count`
    /// is zero.
    pub last_touch: Option<DateTime<Utc>>,
}

impl EngagementSummary {
    /// Creates an empty summary (no human touches yet).
    pub fn empty(deal_id: DealId) -> Self {
        Self {
            deal_id,
            touch_count: 0,
            last_touch: None,
        }
    }

    /// Folds one human touch timestamp into the summary.
    ///
    /// Commutative: the order touches are recorded in does not affect the
    /// final count or maximum.
    pub fn record_touch(&mut self, at: DateTime<Utc>) {
        self.touch_count += 1;
        self.last_touch = Some(match self.last_touch {
            Some(existing) => existing.max(at),
            None => at,
        });
    }
}

/// Priority tier assigned to a qualifying deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Last human touch is older than the staleness window; the deal needs
    /// attention.
    High,
    /// Recent human engagement exists.
    Normal,
}

/// A deal that met the engagement threshold, enriched with its summary and
/// priority tier.
///
/// `last_touch` is non-optional: a deal only reaches this type with a touch
/// count at or above the threshold, which implies at least one recorded
/// timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedDeal {
    /// The underlying deal.
    pub deal: Deal,
    /// Human touches recorded against the deal.
    pub touch_count: u32,
    /// Most recent human touch.
    pub last_touch: DateTime<Utc>,
    /// Assigned priority tier.
    pub tier: Tier,
}
