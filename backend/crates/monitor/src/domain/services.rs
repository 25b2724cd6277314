//! Domain Services
//!
//! Pure aggregation over buffered records. Callers pass the already
//! time-filtered slice so these functions never read the clock.

use super::entities::{
    RateLimitStats, RiskLevel, SecurityEvent, SecuritySummary, Severity, SuspiciousActivity,
    Timeframe, ViolationRecord,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

/// Group violations by IP and flag every IP with more than `threshold` of them.
///
/// More than `2 * threshold` is `high`, otherwise `medium`. Output is sorted
/// by count descending, then IP ascending.
pub fn suspicious_activity<'a>(
    violations: impl IntoIterator<Item = &'a ViolationRecord>,
    threshold: u32,
) -> Vec<SuspiciousActivity> {
    #[derive(Default)]
    struct Acc {
        count: u64,
        endpoints: BTreeSet<String>,
        types: BTreeSet<String>,
    }

    let mut by_ip: BTreeMap<&str, Acc> = BTreeMap::new();
    for v in violations {
        let acc = by_ip.entry(v.ip.as_str()).or_default();
        acc.count += 1;
        acc.endpoints.insert(v.endpoint.clone());
        acc.types.insert(v.policy_class.clone());
    }

    let threshold = u64::from(threshold);
    let mut flagged: Vec<SuspiciousActivity> = by_ip
        .into_iter()
        .filter(|(_, acc)| acc.count > threshold)
        .map(|(ip, acc)| SuspiciousActivity {
            ip: ip.to_string(),
            violation_count: acc.count,
            risk_level: if acc.count > threshold.saturating_mul(2) {
                RiskLevel::High
            } else {
                RiskLevel::Medium
            },
            endpoints: acc.endpoints.into_iter().collect(),
            violation_types: acc.types.into_iter().collect(),
        })
        .collect();

    flagged.sort_by(|a, b| {
        b.violation_count
            .cmp(&a.violation_count)
            .then_with(|| a.ip.cmp(&b.ip))
    });
    flagged
}

pub fn rate_limit_stats<'a>(
    violations: impl IntoIterator<Item = &'a ViolationRecord>,
    timeframe: Timeframe,
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
) -> RateLimitStats {
    let mut stats = RateLimitStats {
        total_violations: 0,
        timeframe,
        period_start,
        period_end,
        violations_by_type: BTreeMap::new(),
        violations_by_endpoint: BTreeMap::new(),
        violations_by_ip: BTreeMap::new(),
        violations_by_user: BTreeMap::new(),
        hourly_breakdown: BTreeMap::new(),
    };

    for v in violations {
        stats.total_violations += 1;
        bump(&mut stats.violations_by_type, &v.policy_class);
        bump(&mut stats.violations_by_endpoint, &v.endpoint);
        bump(&mut stats.violations_by_ip, &v.ip);
        if let Some(user) = &v.user_id {
            bump(&mut stats.violations_by_user, user);
        }
        let hour = v.timestamp.format("%Y-%m-%d %H:00").to_string();
        *stats.hourly_breakdown.entry(hour).or_insert(0) += 1;
    }

    stats
}

pub fn security_summary<'a>(
    events: impl IntoIterator<Item = &'a SecurityEvent>,
    period_hours: u32,
) -> SecuritySummary {
    let mut by_severity: BTreeMap<Severity, u64> =
        Severity::ALL.iter().map(|s| (*s, 0)).collect();
    let mut by_type = BTreeMap::new();
    let mut total_events = 0;

    for e in events {
        total_events += 1;
        *by_severity.entry(e.severity).or_insert(0) += 1;
        bump(&mut by_type, &e.event_type);
    }

    SecuritySummary {
        total_events,
        by_severity,
        by_type,
        period_hours,
    }
}

fn bump(map: &mut BTreeMap<String, u64>, key: &str) {
    match map.get_mut(key) {
        Some(count) => *count += 1,
        None => {
            map.insert(key.to_string(), 1);
        }
    }
}
