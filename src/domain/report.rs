//! Owner report domain types.

use serde::{Deserialize, Serialize};

use super::ClassifiedDeal;

/// The per-owner bundle of classified deals handed to the delivery sink.
///
/// Constructed once per run by the owner grouper; owners with no classified
/// deals never get a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerReport {
    /// Owner email, lowercased. The stable grouping and delivery key.
    pub owner_email: String,
    /// Owner display name, taken from the first grouped deal.
    pub owner_name: Option<String>,
    /// High-tier deals, in scorer order.
    pub high_priority: Vec<ClassifiedDeal>,
    /// Normal-tier deals, in scorer order.
    pub active: Vec<ClassifiedDeal>,
}

impl OwnerReport {
    /// Total number of deals across both tiers.
    pub fn total(&self) -> usize {
        self.high_priority.len() + self.active.len()
    }

    /// Returns true if the report carries no deals at all.
    pub fn is_empty(&self) -> bool {
        self.high_priority.is_empty() && self.active.is_empty()
    }
}
