//! Domain Services
//!
//! Period arithmetic and quota evaluation. All boundaries are UTC.

use crate::domain::entities::{PlanQuota, QuotaDecision, UsageQuota, UsageReport};
use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc};

/// Midnight UTC at the start of `now`'s day.
pub fn day_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// Midnight UTC on the first of `now`'s month.
pub fn month_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or_else(|| day_start(now))
}

pub fn next_utc_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    day_start(now) + Duration::days(1)
}

/// Zero the counters whose period ended since the last request.
pub fn rollover(mut usage: UsageQuota, now: DateTime<Utc>) -> UsageQuota {
    let Some(last) = usage.last_request else {
        return usage;
    };
    if last < day_start(now) {
        usage.requests_today = 0;
        usage.tokens_used_today = 0;
    }
    if last < month_start(now) {
        usage.requests_this_month = 0;
        usage.tokens_used_this_month = 0;
    }
    usage.rate_limit_reset = next_utc_midnight(now);
    usage
}

/// Daily requests are checked before monthly tokens.
pub fn evaluate(usage: &UsageQuota, plan: &PlanQuota) -> QuotaDecision {
    if usage.requests_today >= plan.daily_request_quota {
        QuotaDecision::DailyExceeded {
            quota: plan.daily_request_quota,
        }
    } else if usage.tokens_used_this_month >= plan.monthly_token_quota {
        QuotaDecision::MonthlyExceeded {
            quota: plan.monthly_token_quota,
        }
    } else {
        QuotaDecision::Pass
    }
}

pub fn remaining_requests(plan: &PlanQuota, requests_today: i64) -> i64 {
    (plan.daily_request_quota - requests_today.max(0)).max(0)
}

/// Percentage of the daily quota used, rounded to two decimals.
pub fn percentage_used(plan: &PlanQuota, requests_today: i64) -> f64 {
    if plan.daily_request_quota <= 0 {
        return 0.0;
    }
    let pct = requests_today.max(0) as f64 / plan.daily_request_quota as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}

pub fn report(usage: UsageQuota, plan: PlanQuota, now: DateTime<Utc>) -> UsageReport {
    let requests_today = usage.requests_today.max(0);
    UsageReport {
        user_id: usage.user_id,
        requests_today,
        requests_this_month: usage.requests_this_month.max(0),
        tokens_used_today: usage.tokens_used_today.max(0),
        tokens_used_this_month: usage.tokens_used_this_month.max(0),
        rate_limit_remaining: remaining_requests(&plan, requests_today),
        rate_limit_reset: next_utc_midnight(now),
        last_request: usage.last_request,
        quota_percentage_used: percentage_used(&plan, requests_today),
        plan_name: plan.plan_name,
        daily_request_quota: plan.daily_request_quota,
        monthly_token_quota: plan.monthly_token_quota,
    }
}
