//! Shared counter backend (Redis/Dragonfly)
//!
//! Every check runs as one Lua script, so prune, count, record and expiry
//! are a single atomic step per key across all callers.

use crate::domain::entities::WindowSnapshot;
use crate::domain::repository::CounterBackend;
use crate::error::{RateLimitError, RateLimitResult};
use redis::Script;
use redis::aio::ConnectionManager;
use uuid::Uuid;

const RECORD_SCRIPT: &str = r#"
local key = KEYS[1]
local floor = ARGV[1]
local now = ARGV[2]
local window = tonumber(ARGV[3])
local ceiling = tonumber(ARGV[4])
local member = ARGV[5]

redis.call('ZREMRANGEBYSCORE', key, '-inf', '(' .. floor)
local count = redis.call('ZCARD', key)
if count < ceiling then
    redis.call('ZADD', key, now, member)
    redis.call('EXPIRE', key, window)
end

local oldest = redis.call('ZRANGE', key, 0, 0, 'WITHSCORES')
if oldest[2] then
    return {count + 1, oldest[2]}
end
return {count + 1, false}
"#;

const PEEK_SCRIPT: &str = r#"
local key = KEYS[1]
local floor = ARGV[1]

local count = redis.call('ZCOUNT', key, floor, '+inf')
local oldest = redis.call('ZRANGEBYSCORE', key, floor, '+inf', 'WITHSCORES', 'LIMIT', 0, 1)
if oldest[2] then
    return {count, oldest[2]}
end
return {count, false}
"#;

const SCAN_BATCH: u32 = 200;

#[derive(Clone)]
pub struct RedisCounterBackend {
    conn: ConnectionManager,
    record: Script,
    peek: Script,
}

impl RedisCounterBackend {
    /// Connect and verify with `PING`.
    pub async fn connect(url: &str) -> RateLimitResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;

        let mut ping = conn.clone();
        redis::cmd("PING").query_async::<String>(&mut ping).await?;

        tracing::debug!("Connected to shared counter store");

        Ok(Self {
            conn,
            record: Script::new(RECORD_SCRIPT),
            peek: Script::new(PEEK_SCRIPT),
        })
    }
}

fn parse_reply(count: i64, oldest: Option<String>) -> RateLimitResult<WindowSnapshot> {
    let oldest = oldest
        .map(|raw| {
            raw.parse::<f64>()
                .map_err(|_| RateLimitError::MalformedReply(format!("score '{}'", raw)))
        })
        .transpose()?;
    Ok(WindowSnapshot::from_raw(count, oldest))
}

impl CounterBackend for RedisCounterBackend {
    async fn count_and_record(
        &self,
        key: &str,
        now: f64,
        window_secs: u64,
        ceiling: u64,
    ) -> RateLimitResult<WindowSnapshot> {
        let mut conn = self.conn.clone();
        let member = format!("{:.6}-{}", now, Uuid::new_v4());

        let (count, oldest): (i64, Option<String>) = self
            .record
            .key(key)
            .arg(now - window_secs as f64)
            .arg(now)
            .arg(window_secs)
            .arg(ceiling)
            .arg(member)
            .invoke_async(&mut conn)
            .await?;

        parse_reply(count, oldest)
    }

    async fn peek(&self, key: &str, now: f64, window_secs: u64) -> RateLimitResult<WindowSnapshot> {
        let mut conn = self.conn.clone();

        let (count, oldest): (i64, Option<String>) = self
            .peek
            .key(key)
            .arg(now - window_secs as f64)
            .invoke_async(&mut conn)
            .await?;

        parse_reply(count, oldest)
    }

    async fn invalidate(&self, pattern: &str) -> RateLimitResult<u64> {
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut removed: u64 = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                removed += redis::cmd("DEL")
                    .arg(&keys)
                    .query_async::<u64>(&mut conn)
                    .await?;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(removed)
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
