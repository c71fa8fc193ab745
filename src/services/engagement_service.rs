//! Touch classification and engagement aggregation.
//!
//! This is the leaf of the reporting pipeline: given the raw activity
//! stream, decide which records represent genuine human engagement and fold
//! them into per-deal summaries. Everything here is a pure function of its
//! inputs, with no I/O and no error cases.

use std::collections::{HashMap, HashSet};

use crate::domain::{ActivityRecord, DealId, EngagementSummary};

/// Classification of an account-class token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LicenseClass {
    /// A standard interactive user license.
    Human,
    /// An integration, API-only, or process-automation license.
    Automated,
    /// A license the table has no opinion on.
    Unknown,
}

/// Classification table mapping account-class tokens to [`LicenseClass`].
///
/// Injectable so tests can supply synthetic taxonomies; the shipped
/// [`StandardLicenseTable`] carries the real Salesforce license names.
pub trait LicenseTable: Send + Sync {
    /// Classifies one account-class token.
    fn classify(&self, account_class: &str) -> LicenseClass;
}

/// The Salesforce license taxonomy.
#[derive(Debug, Clone)]
pub struct StandardLicenseTable {
    interactive: HashSet<&'static str>,
    automated: HashSet<&'static str>,
}

/// License names that indicate a standard interactive user.
const INTERACTIVE_LICENSES: &[&str] = &["Salesforce", "Salesforce Platform"];

/// License names that indicate automated or non-human users.
const AUTOMATED_LICENSES: &[&str] = &[
    "Salesforce Integration",
    "Salesforce API Only System Integrations",
    "Identity",
    "Automated Process",
];

impl Default for StandardLicenseTable {
    fn default() -> Self {
        Self {
            interactive: INTERACTIVE_LICENSES.iter().copied().collect(),
            automated: AUTOMATED_LICENSES.iter().copied().collect(),
        }
    }
}

impl LicenseTable for StandardLicenseTable {
    fn classify(&self, account_class: &str) -> LicenseClass {
        if self.interactive.contains(account_class) {
            LicenseClass::Human
        } else if self.automated.contains(account_class) {
            LicenseClass::Automated
        } else {
            LicenseClass::Unknown
        }
    }
}

/// Decides whether one activity record represents genuine human engagement.
///
/// A touch is human iff its creator's account-class token classifies as
/// [`LicenseClass::Human`]. A missing token, an automated class, and an
/// unknown class all count as non-human: ambiguity under-counts engagement,
/// it never inflates it.
pub fn is_human_touch(record: &ActivityRecord, table: &dyn LicenseTable) -> bool {
    match record.creator_license.as_deref() {
        Some(token) => table.classify(token) == LicenseClass::Human,
        None => false,
    }
}

/// Folds the full activity stream into per-deal engagement summaries.
///
/// Single pass; input order is irrelevant (commutative count and max). Deals
/// whose records are all non-human get a summary with a zero count and no
/// last-touch timestamp; the engagement threshold drops them downstream,
/// together with deals that have no records at all.
pub fn summarize_engagement(
    records: &[ActivityRecord],
    table: &dyn LicenseTable,
) -> HashMap<DealId, EngagementSummary> {
    let mut summaries: HashMap<DealId, EngagementSummary> = HashMap::new();

    for record in records {
        let summary = summaries
            .entry(record.deal_id.clone())
            .or_insert_with(|| EngagementSummary::empty(record.deal_id.clone()));
        if is_human_touch(record, table) {
            summary.record_touch(record.created_at);
        }
    }

    summaries
}
