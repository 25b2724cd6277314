//! Monitor
//!
//! Owned, injected holder of the violation and security event buffers.
//! Construct one at startup and hand an `Arc<Monitor>` to whatever needs it.

use crate::application::config::MonitorConfig;
use crate::application::maintenance::Sweep;
use crate::domain::buffer::BoundedLog;
use crate::domain::entities::{
    RateLimitStats, SecurityEvent, SecurityEventReport, SecuritySummary, Severity,
    SuspiciousActivity, Timeframe, ViolationRecord, ViolationReport,
};
use crate::domain::services;
use crate::error::{MonitorError, MonitorResult};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use platform::clock::SharedClock;
use std::time::Duration;

pub struct Monitor {
    config: MonitorConfig,
    clock: SharedClock,
    violations: Mutex<BoundedLog<ViolationRecord>>,
    security_events: Mutex<BoundedLog<SecurityEvent>>,
}

impl Monitor {
    pub fn new(config: MonitorConfig, clock: SharedClock) -> Self {
        Self {
            violations: Mutex::new(BoundedLog::new(config.max_violations)),
            security_events: Mutex::new(BoundedLog::new(config.max_security_events)),
            config,
            clock,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Record a rejected request.
    pub fn log_violation(&self, report: ViolationReport) {
        let record = ViolationRecord::from_report(report, self.clock.now());

        tracing::warn!(
            policy_class = %record.policy_class,
            user_id = record.user_id.as_deref().unwrap_or("-"),
            ip = %record.ip,
            endpoint = %record.endpoint,
            method = %record.method,
            "Rate limit violation"
        );

        let evicted = self.violations.lock().push(record);
        if evicted > 0 {
            tracing::debug!(evicted, "Violation buffer full, dropped oldest");
        }
    }

    /// Record a security signal. Log level follows severity.
    pub fn log_security_event(&self, report: SecurityEventReport) {
        let event = SecurityEvent::from_report(report, self.clock.now());
        let user_id = event.user_id.as_deref().unwrap_or("-");

        match event.severity {
            Severity::Critical | Severity::High => tracing::error!(
                event_type = %event.event_type,
                severity = %event.severity,
                user_id,
                ip = %event.ip,
                "Security event: {}",
                event.description
            ),
            Severity::Medium => tracing::warn!(
                event_type = %event.event_type,
                severity = %event.severity,
                user_id,
                ip = %event.ip,
                "Security event: {}",
                event.description
            ),
            Severity::Low => tracing::info!(
                event_type = %event.event_type,
                severity = %event.severity,
                user_id,
                ip = %event.ip,
                "Security event: {}",
                event.description
            ),
        }

        self.security_events.lock().push(event);
    }

    /// IPs with more than `threshold` violations in the last hour.
    pub fn get_suspicious_activity(&self, threshold: u32) -> MonitorResult<Vec<SuspiciousActivity>> {
        let cutoff = self.cutoff(self.config.suspicious_lookback)?;
        let log = self.violations.lock();
        Ok(services::suspicious_activity(log.since(cutoff), threshold))
    }

    pub fn get_rate_limit_stats(&self, timeframe: Timeframe) -> MonitorResult<RateLimitStats> {
        let now = self.clock.now();
        let start = now
            .checked_sub_signed(timeframe.duration())
            .ok_or(MonitorError::ClockOutOfRange)?;
        let log = self.violations.lock();
        Ok(services::rate_limit_stats(
            log.since(start),
            timeframe,
            start,
            now,
        ))
    }

    pub fn get_security_summary(&self, hours: u32) -> MonitorResult<SecuritySummary> {
        let cutoff = self.cutoff(Duration::from_secs(u64::from(hours) * 3600))?;
        let log = self.security_events.lock();
        Ok(services::security_summary(log.since(cutoff), hours))
    }

    /// Drop records older than the retention period from both buffers.
    pub fn purge_expired(&self) -> MonitorResult<usize> {
        let cutoff = self.cutoff(self.config.retention)?;
        let violations = self.violations.lock().purge_older_than(cutoff);
        let events = self.security_events.lock().purge_older_than(cutoff);

        if violations + events > 0 {
            tracing::info!(violations, events, "Purged expired monitor records");
        }
        Ok(violations + events)
    }

    pub fn violation_count(&self) -> usize {
        self.violations.lock().len()
    }

    pub fn security_event_count(&self) -> usize {
        self.security_events.lock().len()
    }

    fn cutoff(&self, age: Duration) -> MonitorResult<DateTime<Utc>> {
        let age = chrono::Duration::from_std(age).map_err(|_| MonitorError::ClockOutOfRange)?;
        self.clock
            .now()
            .checked_sub_signed(age)
            .ok_or(MonitorError::ClockOutOfRange)
    }
}

impl Sweep for Monitor {
    fn name(&self) -> &'static str {
        "monitor"
    }

    fn sweep(&self) -> MonitorResult<usize> {
        self.purge_expired()
    }
}
