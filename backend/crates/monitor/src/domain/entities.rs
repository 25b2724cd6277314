//! Domain Entities
//!
//! Records kept by the monitor and the reports derived from them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Free-form key/value context attached to a record.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Anything stored in a [`BoundedLog`](super::buffer::BoundedLog).
pub trait Timestamped {
    fn timestamp(&self) -> DateTime<Utc>;
}

/// What the admission path knows about a rejected request.
#[derive(Debug, Clone)]
pub struct ViolationReport {
    pub policy_class: String,
    /// Authenticated subject, if any
    pub user_id: Option<String>,
    pub ip: String,
    pub endpoint: String,
    pub method: String,
    pub metadata: Metadata,
}

/// A rejected request as stored in the violation buffer.
#[derive(Debug, Clone, Serialize)]
pub struct ViolationRecord {
    pub policy_class: String,
    pub user_id: Option<String>,
    pub ip: String,
    pub endpoint: String,
    pub method: String,
    pub timestamp: DateTime<Utc>,
    pub metadata: Metadata,
}

impl ViolationRecord {
    pub fn from_report(report: ViolationReport, timestamp: DateTime<Utc>) -> Self {
        Self {
            policy_class: report.policy_class,
            user_id: report.user_id,
            ip: report.ip,
            endpoint: report.endpoint,
            method: report.method,
            timestamp,
            metadata: report.metadata,
        }
    }
}

impl Timestamped for ViolationRecord {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Security event severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input for [`Monitor::log_security_event`](crate::Monitor::log_security_event).
#[derive(Debug, Clone)]
pub struct SecurityEventReport {
    pub event_type: String,
    pub severity: Severity,
    pub description: String,
    pub user_id: Option<String>,
    pub ip: String,
    pub metadata: Metadata,
}

impl SecurityEventReport {
    pub fn new(
        event_type: impl Into<String>,
        severity: Severity,
        description: impl Into<String>,
        ip: impl Into<String>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            severity,
            description: description.into(),
            user_id: None,
            ip: ip.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_user(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SecurityEvent {
    pub event_type: String,
    pub severity: Severity,
    pub description: String,
    pub user_id: Option<String>,
    pub ip: String,
    pub timestamp: DateTime<Utc>,
    pub metadata: Metadata,
}

impl SecurityEvent {
    pub fn from_report(report: SecurityEventReport, timestamp: DateTime<Utc>) -> Self {
        Self {
            event_type: report.event_type,
            severity: report.severity,
            description: report.description,
            user_id: report.user_id,
            ip: report.ip,
            timestamp,
            metadata: report.metadata,
        }
    }
}

impl Timestamped for SecurityEvent {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Advisory risk classification of an IP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize)]
pub struct SuspiciousActivity {
    pub ip: String,
    pub violation_count: u64,
    pub risk_level: RiskLevel,
    pub endpoints: Vec<String>,
    pub violation_types: Vec<String>,
}

/// Statistics window for violation reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Timeframe {
    #[serde(rename = "1h")]
    OneHour,
    #[default]
    #[serde(rename = "24h")]
    OneDay,
    #[serde(rename = "7d")]
    SevenDays,
}

impl Timeframe {
    pub fn duration(&self) -> chrono::Duration {
        match self {
            Timeframe::OneHour => chrono::Duration::hours(1),
            Timeframe::OneDay => chrono::Duration::hours(24),
            Timeframe::SevenDays => chrono::Duration::days(7),
        }
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1h" => Ok(Timeframe::OneHour),
            "24h" => Ok(Timeframe::OneDay),
            "7d" => Ok(Timeframe::SevenDays),
            other => Err(format!("unknown timeframe '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RateLimitStats {
    pub total_violations: u64,
    pub timeframe: Timeframe,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub violations_by_type: BTreeMap<String, u64>,
    pub violations_by_endpoint: BTreeMap<String, u64>,
    pub violations_by_ip: BTreeMap<String, u64>,
    pub violations_by_user: BTreeMap<String, u64>,
    /// Keyed `YYYY-MM-DD HH:00`
    pub hourly_breakdown: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SecuritySummary {
    pub total_events: u64,
    pub by_severity: BTreeMap<Severity, u64>,
    pub by_type: BTreeMap<String, u64>,
    pub period_hours: u32,
}
