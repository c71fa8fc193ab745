//! Deal eligibility, engagement threshold, and priority tiering.
//!
//! Takes the raw deal snapshot plus the per-deal engagement summaries and
//! produces the ordered classified deal list the owner grouper consumes.
//! Pure transformation over already-validated in-memory data; malformed
//! records are the provider's responsibility and never reach this module.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::config::{ReportSettings, StalenessBoundary};
use crate::domain::{ClassifiedDeal, Deal, DealId, EngagementSummary, Tier};

/// Triage thresholds, constructed once per run from settings and passed by
/// reference into the pipeline.
#[derive(Debug, Clone)]
pub struct TriagePolicy {
    /// Trailing creation window.
    pub created_within: Duration,
    /// Staleness window for tier assignment.
    pub staleness_window: Duration,
    /// Minimum human-touch count for a deal to be reported.
    pub min_touch_count: u32,
    /// Segment excluded from reporting.
    pub excluded_segment: Option<String>,
    /// How a last touch exactly at the staleness boundary is classified.
    pub boundary: StalenessBoundary,
}

impl TriagePolicy {
    /// Builds a policy from the persisted report settings.
    pub fn from_settings(settings: &ReportSettings) -> Self {
        Self {
            created_within: Duration::days(settings.creation_window_days),
            staleness_window: Duration::days(settings.staleness_window_days),
            min_touch_count: settings.min_touch_count,
            excluded_segment: settings.excluded_segment.clone(),
            boundary: settings.stale_boundary,
        }
    }
}

/// Checks the eligibility invariant on raw deal attributes alone: created
/// within the trailing window and not in the excluded segment. Evaluated
/// independently of engagement.
pub fn is_eligible(deal: &Deal, now: DateTime<Utc>, policy: &TriagePolicy) -> bool {
    if deal.created_at < now - policy.created_within {
        return false;
    }
    match policy.excluded_segment.as_deref() {
        Some(segment) => !deal.in_segment(segment),
        None => true,
    }
}

/// Assigns the priority tier from the most recent human touch.
pub fn assign_tier(last_touch: DateTime<Utc>, now: DateTime<Utc>, policy: &TriagePolicy) -> Tier {
    let cutoff = now - policy.staleness_window;
    let stale = match policy.boundary {
        StalenessBoundary::Exclusive => last_touch < cutoff,
        StalenessBoundary::Inclusive => last_touch <= cutoff,
    };
    if stale {
        Tier::High
    } else {
        Tier::Normal
    }
}

/// Produces the ordered classified deal list.
///
/// Steps, in order: eligibility filter on raw attributes, unified engagement
/// threshold (a missing summary is the same as a zero count), tier
/// assignment, then a total order: high tier first, and within a tier by
/// touch count descending, last touch descending, deal id ascending.
pub fn classify_deals(
    deals: Vec<Deal>,
    summaries: &HashMap<DealId, EngagementSummary>,
    now: DateTime<Utc>,
    policy: &TriagePolicy,
) -> Vec<ClassifiedDeal> {
    let mut classified: Vec<ClassifiedDeal> = deals
        .into_iter()
        .filter(|deal| is_eligible(deal, now, policy))
        .filter_map(|deal| {
            let summary = summaries.get(&deal.id)?;
            if summary.touch_count < policy.min_touch_count {
                return None;
            }
            // A count at or above the threshold implies at least one
            // recorded touch, so a timestamp always exists here.
            let last_touch = summary.last_touch?;
            Some(ClassifiedDeal {
                tier: assign_tier(last_touch, now, policy),
                touch_count: summary.touch_count,
                last_touch,
                deal,
            })
        })
        .collect();

    classified.sort_by(|a, b| {
        tier_rank(a.tier)
            .cmp(&tier_rank(b.tier))
            .then(b.touch_count.cmp(&a.touch_count))
            .then(b.last_touch.cmp(&a.last_touch))
            .then(a.deal.id.cmp(&b.deal.id))
    });
    classified
}

fn tier_rank(tier: Tier) -> u8 {
    match tier {
        Tier::High => 0,
        Tier::Normal => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Owner;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap()
    }

    fn policy() -> TriagePolicy {
        TriagePolicy::from_settings(&ReportSettings::default())
    }

    fn deal(id: &str, created_days_ago: i64, segment: Option<&str>) -> Deal {
        Deal {
            id: DealId::from(id),
            name: format!("Deal {id}"),
            stage: Some("Prospecting".to_string()),
            amount: Some(5_000.0),
            owner: Owner::with_name("005X1", "alice@example.com", "Alice Smith"),
            account_name: Some("Acme".to_string()),
            account_email: None,
            created_at: now() - Duration::days(created_days_ago),
            segment: segment.map(|s| s.to_string()),
        }
    }

    fn summary(id: &str, count: u32, last_touch_days_ago: Option<i64>) -> EngagementSummary {
        EngagementSummary {
            deal_id: DealId::from(id),
            touch_count: count,
            last_touch: last_touch_days_ago.map(|d| now() - Duration::days(d)),
        }
    }

    fn summaries(entries: Vec<EngagementSummary>) -> HashMap<DealId, EngagementSummary> {
        entries.into_iter().map(|s| (s.deal_id.clone(), s)).collect()
    }

    #[test]
    fn eligibility_requires_creation_window() {
        let p = policy();
        assert!(is_eligible(&deal("006A", 10, None), now(), &p));
        assert!(!is_eligible(&deal("006B", 240, None), now(), &p));
    }

    #[test]
    fn eligibility_excludes_segment() {
        let p = policy();
        assert!(!is_eligible(&deal("006A", 10, Some("TVG")), now(), &p));
        assert!(is_eligible(&deal("006A", 10, Some("Enterprise")), now(), &p));
    }

    #[test]
    fn membership_is_window_and_segment_and_threshold() {
        let p = policy();
        let deals = vec![
            deal("006A", 10, None),         // all conditions hold
            deal("006B", 240, None),        // outside creation window
            deal("006C", 10, Some("TVG")),  // excluded segment
            deal("006D", 10, None),         // below threshold
            deal("006E", 10, None),         // no activity at all
        ];
        let sums = summaries(vec![
            summary("006A", 2, Some(5)),
            summary("006B", 5, Some(5)),
            summary("006C", 4, Some(5)),
            summary("006D", 1, Some(5)),
        ]);

        let out = classify_deals(deals, &sums, now(), &p);
        let ids: Vec<&str> = out.iter().map(|c| c.deal.id.0.as_str()).collect();
        assert_eq!(ids, vec!["006A"]);
    }

    #[test]
    fn zero_count_summary_is_dropped_like_a_missing_one() {
        let p = policy();
        let deals = vec![deal("006A", 10, None), deal("006B", 10, None)];
        let sums = summaries(vec![summary("006A", 0, None)]);
        assert!(classify_deals(deals, &sums, now(), &p).is_empty());
    }

    #[test]
    fn stale_touch_assigns_high_tier() {
        let p = policy();
        assert_eq!(assign_tier(now() - Duration::days(70), now(), &p), Tier::High);
        assert_eq!(assign_tier(now() - Duration::days(10), now(), &p), Tier::Normal);
    }

    #[test]
    fn boundary_timestamp_is_normal_under_exclusive_policy() {
        let p = policy();
        let exactly_at_boundary = now() - p.staleness_window;
        assert_eq!(assign_tier(exactly_at_boundary, now(), &p), Tier::Normal);
    }

    #[test]
    fn boundary_timestamp_is_high_under_inclusive_policy() {
        let mut p = policy();
        p.boundary = StalenessBoundary::Inclusive;
        let exactly_at_boundary = now() - p.staleness_window;
        assert_eq!(assign_tier(exactly_at_boundary, now(), &p), Tier::High);
    }

    #[test]
    fn output_orders_high_tier_first_then_count_touch_id() {
        let p = policy();
        let deals = vec![
            deal("006A", 10, None),
            deal("006B", 10, None),
            deal("006C", 10, None),
            deal("006D", 10, None),
            deal("006E", 10, None),
        ];
        let sums = summaries(vec![
            summary("006A", 3, Some(10)), // normal, most touched
            summary("006B", 2, Some(5)),  // normal, fresher tie-break
            summary("006C", 2, Some(15)), // normal
            summary("006D", 4, Some(90)), // high
            summary("006E", 2, Some(80)), // high
        ]);

        let out = classify_deals(deals, &sums, now(), &p);
        let ids: Vec<&str> = out.iter().map(|c| c.deal.id.0.as_str()).collect();
        assert_eq!(ids, vec!["006D", "006E", "006A", "006B", "006C"]);
    }

    #[test]
    fn equal_count_and_touch_tie_breaks_on_id() {
        let p = policy();
        let deals = vec![deal("006B", 10, None), deal("006A", 10, None)];
        let sums = summaries(vec![
            summary("006A", 2, Some(5)),
            summary("006B", 2, Some(5)),
        ]);

        let out = classify_deals(deals, &sums, now(), &p);
        let ids: Vec<&str> = out.iter().map(|c| c.deal.id.0.as_str()).collect();
        assert_eq!(ids, vec!["006A", "006B"]);
    }

    #[test]
    fn ordering_property_holds_pairwise_within_tiers() {
        let p = policy();
        let deals = (0..8).map(|i| deal(&format!("006{i}"), 10, None)).collect();
        let sums = summaries(vec![
            summary("0060", 2, Some(5)),
            summary("0061", 7, Some(40)),
            summary("0062", 3, Some(5)),
            summary("0063", 3, Some(12)),
            summary("0064", 9, Some(61)),
            summary("0065", 2, Some(75)),
            summary("0066", 2, Some(75)),
            summary("0067", 5, Some(1)),
        ]);

        let out = classify_deals(deals, &sums, now(), &p);
        for pair in out.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            if a.tier != b.tier {
                continue;
            }
            assert!(
                a.touch_count > b.touch_count
                    || (a.touch_count == b.touch_count && a.last_touch >= b.last_touch)
                    || (a.touch_count == b.touch_count
                        && a.last_touch == b.last_touch
                        && a.deal.id < b.deal.id),
                "ordering violated between {} and {}",
                a.deal.id,
                b.deal.id
            );
        }
    }

    #[test]
    fn recent_deal_with_stale_human_touches_is_high_priority() {
        // 3 human touches (most recent 70 days ago) + automated noise that
        // was already excluded upstream: count 3, tier high.
        let p = policy();
        let deals = vec![deal("006D1", 10, None)];
        let sums = summaries(vec![summary("006D1", 3, Some(70))]);

        let out = classify_deals(deals, &sums, now(), &p);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].tier, Tier::High);
        assert_eq!(out[0].touch_count, 3);
    }

    #[test]
    fn single_touch_deal_is_excluded_entirely() {
        let p = policy();
        let deals = vec![deal("006D2", 10, None)];
        let sums = summaries(vec![summary("006D2", 1, Some(2))]);
        assert!(classify_deals(deals, &sums, now(), &p).is_empty());
    }

    #[test]
    fn old_deal_is_excluded_regardless_of_engagement() {
        let p = policy();
        let deals = vec![deal("006D3", 240, None)];
        let sums = summaries(vec![summary("006D3", 5, Some(2))]);
        assert!(classify_deals(deals, &sums, now(), &p).is_empty());
    }
}
