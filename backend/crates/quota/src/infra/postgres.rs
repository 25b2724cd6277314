//! PostgreSQL Repository Implementations

use crate::domain::entities::{PlanQuota, UsageDelta, UsageQuota};
use crate::domain::repository::{LedgerRepository, PlanLookup};
use crate::domain::services::{day_start, month_start, next_utc_midnight};
use crate::error::QuotaResult;
use chrono::{DateTime, Utc};
use kernel::id::UserId;
use sqlx::PgPool;
use uuid::Uuid;

const UNIQUE_VIOLATION: &str = "23505";

/// PostgreSQL-backed usage ledger and plan lookup
#[derive(Clone)]
pub struct PgQuotaRepository {
    pool: PgPool,
}

impl PgQuotaRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl LedgerRepository for PgQuotaRepository {
    async fn find(&self, user_id: UserId) -> QuotaResult<Option<UsageQuota>> {
        let row = sqlx::query_as::<_, UsageRow>(
            r#"
            SELECT
                user_id,
                requests_today,
                requests_this_month,
                tokens_used_today,
                tokens_used_this_month,
                rate_limit_remaining,
                rate_limit_reset,
                last_request,
                updated_at
            FROM ai_usage_stats
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.into_uuid())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(UsageRow::into_usage))
    }

    async fn create_if_absent(&self, user_id: UserId, now: DateTime<Utc>) -> QuotaResult<()> {
        let zeroed = UsageQuota::zeroed(user_id, now);
        let result = sqlx::query(
            r#"
            INSERT INTO ai_usage_stats (
                user_id,
                rate_limit_remaining,
                rate_limit_reset,
                updated_at
            ) VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id.into_uuid())
        .bind(zeroed.rate_limit_remaining)
        .bind(zeroed.rate_limit_reset)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => {
                if done.rows_affected() > 0 {
                    tracing::info!(user_id = %user_id, "Usage ledger row created");
                }
                Ok(())
            }
            // Another creator won the race
            Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                tracing::debug!(user_id = %user_id, "Usage ledger row already exists");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn increment(
        &self,
        user_id: UserId,
        delta: UsageDelta,
        daily_quota: i64,
        now: DateTime<Utc>,
    ) -> QuotaResult<UsageQuota> {
        // $6 = start of today, $7 = start of this month
        let row = sqlx::query_as::<_, UsageRow>(
            r#"
            INSERT INTO ai_usage_stats AS s (
                user_id,
                requests_today,
                requests_this_month,
                tokens_used_today,
                tokens_used_this_month,
                rate_limit_remaining,
                rate_limit_reset,
                last_request,
                updated_at
            ) VALUES ($1, $2, $2, $3, $3, GREATEST(0, $4 - $2), $8, $5, $5)
            ON CONFLICT (user_id) DO UPDATE SET
                requests_today = CASE
                    WHEN s.last_request IS NULL OR s.last_request < $6 THEN 0
                    ELSE s.requests_today
                END + EXCLUDED.requests_today,
                tokens_used_today = CASE
                    WHEN s.last_request IS NULL OR s.last_request < $6 THEN 0
                    ELSE s.tokens_used_today
                END + EXCLUDED.tokens_used_today,
                requests_this_month = CASE
                    WHEN s.last_request IS NULL OR s.last_request < $7 THEN 0
                    ELSE s.requests_this_month
                END + EXCLUDED.requests_this_month,
                tokens_used_this_month = CASE
                    WHEN s.last_request IS NULL OR s.last_request < $7 THEN 0
                    ELSE s.tokens_used_this_month
                END + EXCLUDED.tokens_used_this_month,
                rate_limit_remaining = GREATEST(0, $4 - (CASE
                    WHEN s.last_request IS NULL OR s.last_request < $6 THEN 0
                    ELSE s.requests_today
                END + EXCLUDED.requests_today)),
                rate_limit_reset = EXCLUDED.rate_limit_reset,
                last_request = EXCLUDED.last_request,
                updated_at = EXCLUDED.updated_at
            RETURNING
                user_id,
                requests_today,
                requests_this_month,
                tokens_used_today,
                tokens_used_this_month,
                rate_limit_remaining,
                rate_limit_reset,
                last_request,
                updated_at
            "#,
        )
        .bind(user_id.into_uuid())
        .bind(delta.requests)
        .bind(delta.tokens)
        .bind(daily_quota)
        .bind(now)
        .bind(day_start(now))
        .bind(month_start(now))
        .bind(next_utc_midnight(now))
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(
            user_id = %user_id,
            requests_today = row.requests_today,
            tokens_used_this_month = row.tokens_used_this_month,
            "Usage incremented"
        );

        Ok(row.into_usage())
    }
}

impl PlanLookup for PgQuotaRepository {
    async fn plan_for(&self, user_id: UserId) -> QuotaResult<Option<PlanQuota>> {
        let row = sqlx::query_as::<_, PlanRow>(
            r#"
            SELECT
                pl.name AS plan_name,
                pl.daily_request_quota,
                pl.monthly_token_quota
            FROM user_profiles p
            JOIN user_plans pl ON pl.id = p.plan_id
            WHERE p.user_id = $1
            "#,
        )
        .bind(user_id.into_uuid())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| {
            PlanQuota::from_lookup(
                r.plan_name,
                r.daily_request_quota,
                r.monthly_token_quota,
            )
        }))
    }
}

// ============================================================================
// Row types
// ============================================================================

#[derive(sqlx::FromRow)]
struct UsageRow {
    user_id: Uuid,
    requests_today: i64,
    requests_this_month: i64,
    tokens_used_today: i64,
    tokens_used_this_month: i64,
    rate_limit_remaining: i64,
    rate_limit_reset: DateTime<Utc>,
    last_request: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl UsageRow {
    fn into_usage(self) -> UsageQuota {
        UsageQuota {
            user_id: UserId::from_uuid(self.user_id),
            requests_today: self.requests_today,
            requests_this_month: self.requests_this_month,
            tokens_used_today: self.tokens_used_today,
            tokens_used_this_month: self.tokens_used_this_month,
            rate_limit_remaining: self.rate_limit_remaining,
            rate_limit_reset: self.rate_limit_reset,
            last_request: self.last_request,
            updated_at: self.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PlanRow {
    plan_name: Option<String>,
    daily_request_quota: Option<i64>,
    monthly_token_quota: Option<i64>,
}
