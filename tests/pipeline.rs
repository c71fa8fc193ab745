//! Integration tests for the reporting pipeline.
//!
//! These tests drive the pure pipeline stages (aggregate, triage, group)
//! together over realistic fixtures. Each service module contains its own
//! unit tests for detailed logic testing.

use chrono::{DateTime, Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;

use pulse::config::ReportSettings;
use pulse::domain::{ActivityId, ActivityRecord, Deal, DealId, Owner, Tier, UserId};
use pulse::services::{build_owner_reports, StandardLicenseTable, TriagePolicy};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap()
}

fn policy() -> TriagePolicy {
    TriagePolicy::from_settings(&ReportSettings::default())
}

fn deal(id: &str, owner_email: &str, created_days_ago: i64) -> Deal {
    Deal {
        id: DealId::from(id),
        name: format!("Deal {id}"),
        stage: Some("Prospecting".to_string()),
        amount: Some(10_000.0),
        owner: Owner::with_name("005X1", owner_email, "Casey Jordan"),
        account_name: Some("Acme".to_string()),
        account_email: None,
        created_at: now() - Duration::days(created_days_ago),
        segment: None,
    }
}

fn touch(id: &str, deal_id: &str, license: &str, days_ago: i64) -> ActivityRecord {
    ActivityRecord {
        id: ActivityId::from(id),
        deal_id: DealId::from(deal_id),
        created_by: UserId::from("005X1"),
        creator_license: Some(license.to_string()),
        created_at: now() - Duration::days(days_ago),
        completed: true,
    }
}

fn human_touches(deal_id: &str, count: usize, most_recent_days_ago: i64) -> Vec<ActivityRecord> {
    (0..count)
        .map(|i| {
            touch(
                &format!("00T-{deal_id}-{i}"),
                deal_id,
                "Salesforce",
                most_recent_days_ago + i as i64,
            )
        })
        .collect()
}

fn automated_touches(deal_id: &str, count: usize) -> Vec<ActivityRecord> {
    (0..count)
        .map(|i| {
            touch(
                &format!("00T-auto-{deal_id}-{i}"),
                deal_id,
                "Automated Process",
                1,
            )
        })
        .collect()
}

// ============================================================================
// Classification Scenarios
// ============================================================================

#[test]
fn stale_deal_with_automated_noise_is_high_priority_with_human_count() {
    // D1: created 10 days ago, 3 human touches (most recent 70 days ago)
    // plus 5 automated touches logged yesterday.
    let deals = vec![deal("006D1", "casey@example.com", 10)];
    let mut activities = human_touches("006D1", 3, 70);
    activities.extend(automated_touches("006D1", 5));

    let table = StandardLicenseTable::default();
    let reports = build_owner_reports(deals, &activities, &table, &policy(), now());

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].high_priority.len(), 1);
    assert_eq!(reports[0].active.len(), 0);
    let d1 = &reports[0].high_priority[0];
    assert_eq!(d1.tier, Tier::High);
    assert_eq!(d1.touch_count, 3);
}

#[test]
fn single_touch_deal_produces_no_report() {
    // D2: created 10 days ago, 1 human touch only.
    let deals = vec![deal("006D2", "casey@example.com", 10)];
    let activities = human_touches("006D2", 1, 2);

    let table = StandardLicenseTable::default();
    let reports = build_owner_reports(deals, &activities, &table, &policy(), now());

    assert!(reports.is_empty());
}

#[test]
fn old_deal_produces_no_report_regardless_of_engagement() {
    // D3: created 8 months ago, 5 human touches.
    let deals = vec![deal("006D3", "casey@example.com", 240)];
    let activities = human_touches("006D3", 5, 2);

    let table = StandardLicenseTable::default();
    let reports = build_owner_reports(deals, &activities, &table, &policy(), now());

    assert!(reports.is_empty());
}

#[test]
fn owner_report_splits_tiers_in_order() {
    // Owner O has D1 (high) and D4 (normal).
    let deals = vec![
        deal("006D1", "o@example.com", 10),
        deal("006D4", "o@example.com", 10),
    ];
    let mut activities = human_touches("006D1", 3, 70);
    activities.extend(human_touches("006D4", 2, 5));

    let table = StandardLicenseTable::default();
    let reports = build_owner_reports(deals, &activities, &table, &policy(), now());

    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    let high: Vec<&str> = report.high_priority.iter().map(|c| c.deal.id.0.as_str()).collect();
    let active: Vec<&str> = report.active.iter().map(|c| c.deal.id.0.as_str()).collect();
    assert_eq!(high, vec!["006D1"]);
    assert_eq!(active, vec!["006D4"]);
}

#[test]
fn touch_exactly_at_staleness_boundary_is_active() {
    let p = policy();
    let deals = vec![deal("006A", "casey@example.com", 10)];
    let boundary_days = p.staleness_window.num_days();
    let activities = vec![
        touch("00T1", "006A", "Salesforce", boundary_days),
        touch("00T2", "006A", "Salesforce", boundary_days + 30),
    ];

    let table = StandardLicenseTable::default();
    let reports = build_owner_reports(deals, &activities, &table, &p, now());

    assert_eq!(reports.len(), 1);
    assert!(reports[0].high_priority.is_empty());
    assert_eq!(reports[0].active.len(), 1);
}

// ============================================================================
// Cross-Owner Behavior
// ============================================================================

#[test]
fn owners_are_partitioned_independently() {
    let deals = vec![
        deal("006A", "zoe@example.com", 10),
        deal("006B", "alice@example.com", 10),
        deal("006C", "zoe@example.com", 10),
    ];
    let mut activities = human_touches("006A", 2, 5);
    activities.extend(human_touches("006B", 4, 80));
    activities.extend(human_touches("006C", 3, 8));

    let table = StandardLicenseTable::default();
    let reports = build_owner_reports(deals, &activities, &table, &policy(), now());

    let owners: Vec<&str> = reports.iter().map(|r| r.owner_email.as_str()).collect();
    assert_eq!(owners, vec!["alice@example.com", "zoe@example.com"]);

    let alice = &reports[0];
    assert_eq!(alice.high_priority.len(), 1);
    assert!(alice.active.is_empty());

    let zoe = &reports[1];
    assert!(zoe.high_priority.is_empty());
    // Most-touched first within the tier.
    let ids: Vec<&str> = zoe.active.iter().map(|c| c.deal.id.0.as_str()).collect();
    assert_eq!(ids, vec!["006C", "006A"]);
}

#[test]
fn owner_with_only_subthreshold_deals_gets_no_report() {
    let deals = vec![
        deal("006A", "alice@example.com", 10),
        deal("006B", "bob@example.com", 10),
    ];
    let mut activities = human_touches("006A", 2, 5);
    activities.extend(human_touches("006B", 1, 5));

    let table = StandardLicenseTable::default();
    let reports = build_owner_reports(deals, &activities, &table, &policy(), now());

    let owners: Vec<&str> = reports.iter().map(|r| r.owner_email.as_str()).collect();
    assert_eq!(owners, vec!["alice@example.com"]);
}

// ============================================================================
// Determinism
// ============================================================================

#[test]
fn pipeline_is_idempotent_over_one_snapshot() {
    let deals = vec![
        deal("006A", "zoe@example.com", 10),
        deal("006B", "alice@example.com", 30),
        deal("006C", "zoe@example.com", 100),
    ];
    let mut activities = human_touches("006A", 2, 61);
    activities.extend(human_touches("006B", 6, 3));
    activities.extend(human_touches("006C", 2, 59));
    activities.extend(automated_touches("006A", 4));

    let table = StandardLicenseTable::default();
    let first = build_owner_reports(deals.clone(), &activities, &table, &policy(), now());
    let second = build_owner_reports(deals, &activities, &table, &policy(), now());

    let first_bytes = serde_json::to_vec(&first).unwrap();
    let second_bytes = serde_json::to_vec(&second).unwrap();
    assert_eq!(first_bytes, second_bytes);
}

#[test]
fn activity_order_does_not_affect_the_output() {
    let deals = vec![deal("006A", "alice@example.com", 10)];
    let mut activities = human_touches("006A", 5, 10);

    let table = StandardLicenseTable::default();
    let forward = build_owner_reports(deals.clone(), &activities, &table, &policy(), now());
    activities.reverse();
    let backward = build_owner_reports(deals, &activities, &table, &policy(), now());

    assert_eq!(forward, backward);
}
