//! Owner grouping and run orchestration.
//!
//! [`group_by_owner`] is the last pure stage of the pipeline; around it,
//! [`ReportService`] coordinates the CRM provider, the classification
//! pipeline, and the delivery sink for one complete run.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::config::DeliverySettings;
use crate::domain::{ActivityRecord, ClassifiedDeal, Deal, OwnerReport, Tier};
use crate::providers::crm::{CrmProvider, ProviderError};
use crate::providers::mail::ReportSink;
use crate::services::engagement_service::{summarize_engagement, LicenseTable};
use crate::services::triage_service::{classify_deals, TriagePolicy};

/// Errors that abort a report run.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Fetching the snapshot failed; nothing was delivered.
    #[error("fetch failed: {0}")]
    Fetch(#[from] ProviderError),
}

/// Result type for report runs.
pub type ReportResult<T> = Result<T, ReportError>;

/// One delivery that failed. Recorded, never fatal to the run.
#[derive(Debug, Clone)]
pub struct DeliveryFailure {
    /// Owner whose report could not be delivered.
    pub owner_email: String,
    /// Rendered sink error.
    pub error: String,
}

/// Outcome of one report run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Run identifier, carried through all log lines for this run.
    pub run_id: String,
    /// Open deals fetched from the CRM.
    pub deals_fetched: usize,
    /// Activity records fetched from the CRM.
    pub activities_fetched: usize,
    /// Deals that survived eligibility and the engagement threshold.
    pub deals_classified: usize,
    /// Owner reports built (one per owner with at least one deal).
    pub reports_built: usize,
    /// Reports successfully delivered.
    pub delivered: usize,
    /// Reports skipped because the owner is not on the allow-list.
    pub skipped_unsubscribed: usize,
    /// Per-owner delivery failures.
    pub failures: Vec<DeliveryFailure>,
}

/// Partitions classified deals into one report per owner.
///
/// The grouping key is the lowercased owner email. Within each report the
/// tiers are split into `high_priority` and `active`, preserving the scorer
/// order; the report collection itself is ordered by owner email so a run
/// over the same snapshot always produces the same output. Owners with no
/// classified deals get no report.
pub fn group_by_owner(classified: Vec<ClassifiedDeal>) -> Vec<OwnerReport> {
    let mut reports: BTreeMap<String, OwnerReport> = BTreeMap::new();

    for deal in classified {
        let key = deal.deal.owner.routing_email();
        let report = reports.entry(key.clone()).or_insert_with(|| OwnerReport {
            owner_email: key,
            owner_name: deal.deal.owner.name.clone(),
            high_priority: Vec::new(),
            active: Vec::new(),
        });
        match deal.tier {
            Tier::High => report.high_priority.push(deal),
            Tier::Normal => report.active.push(deal),
        }
    }

    reports.into_values().collect()
}

/// Runs the pure pipeline over one snapshot: aggregate, triage, group.
pub fn build_owner_reports(
    deals: Vec<Deal>,
    activities: &[ActivityRecord],
    table: &dyn LicenseTable,
    policy: &TriagePolicy,
    now: DateTime<Utc>,
) -> Vec<OwnerReport> {
    let summaries = summarize_engagement(activities, table);
    let classified = classify_deals(deals, &summaries, now, policy);
    group_by_owner(classified)
}

/// Orchestrates one report run: fetch, classify, group, deliver.
pub struct ReportService<C> {
    crm: C,
    sink: Arc<dyn ReportSink>,
    license_table: Arc<dyn LicenseTable>,
    policy: TriagePolicy,
    delivery: DeliverySettings,
}

impl<C: CrmProvider> ReportService<C> {
    /// Creates a new report service.
    pub fn new(
        crm: C,
        sink: Arc<dyn ReportSink>,
        license_table: Arc<dyn LicenseTable>,
        policy: TriagePolicy,
        delivery: DeliverySettings,
    ) -> Self {
        Self {
            crm,
            sink,
            license_table,
            policy,
            delivery,
        }
    }

    /// Executes one run against the snapshot visible at `now`.
    ///
    /// Fetch errors abort the run; delivery errors are isolated per owner
    /// and recorded in the summary.
    pub async fn run(&self, now: DateTime<Utc>) -> ReportResult<RunSummary> {
        let mut summary = RunSummary {
            run_id: Uuid::new_v4().to_string(),
            ..RunSummary::default()
        };
        let run_id = summary.run_id.clone();

        if self.delivery.subscribers.is_empty() {
            tracing::warn!(run_id = %run_id, "no subscribers configured; skipping run");
            return Ok(summary);
        }

        let created_after = now - self.policy.created_within;
        let deals = self
            .crm
            .fetch_open_deals(created_after, self.policy.excluded_segment.as_deref())
            .await?;
        summary.deals_fetched = deals.len();

        let deal_ids: Vec<_> = deals.iter().map(|d| d.id.clone()).collect();
        let activities = self.crm.fetch_activities(&deal_ids).await?;
        summary.activities_fetched = activities.len();
        tracing::info!(
            run_id = %run_id,
            deals = summary.deals_fetched,
            activities = summary.activities_fetched,
            "snapshot fetched"
        );

        let reports = build_owner_reports(
            deals,
            &activities,
            self.license_table.as_ref(),
            &self.policy,
            now,
        );
        summary.deals_classified = reports.iter().map(OwnerReport::total).sum();
        summary.reports_built = reports.len();

        for report in &reports {
            if !self.delivery.is_subscribed(&report.owner_email) {
                tracing::debug!(
                    run_id = %run_id,
                    owner = %report.owner_email,
                    "owner not on allow-list; skipping"
                );
                summary.skipped_unsubscribed += 1;
                continue;
            }

            match self.sink.deliver(report, &self.delivery.cc).await {
                Ok(message_id) => {
                    tracing::info!(
                        run_id = %run_id,
                        owner = %report.owner_email,
                        message_id = %message_id,
                        deals = report.total(),
                        "report delivered"
                    );
                    summary.delivered += 1;
                }
                Err(e) => {
                    tracing::error!(
                        run_id = %run_id,
                        owner = %report.owner_email,
                        error = %e,
                        "report delivery failed"
                    );
                    summary.failures.push(DeliveryFailure {
                        owner_email: report.owner_email.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            run_id = %run_id,
            reports = summary.reports_built,
            delivered = summary.delivered,
            skipped = summary.skipped_unsubscribed,
            failed = summary.failures.len(),
            "run complete"
        );
        Ok(summary)
    }
}
