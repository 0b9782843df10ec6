//! Deterministic audit logging for the FRVE
//!
//! The audit log is a plain value collected alongside results. It never
//! touches the outside world, and every timestamp comes from the
//! [`ValidationContext`](crate::context::ValidationContext), so two runs over
//! the same inputs produce identical logs. Runtime diagnostics go through
//! `tracing` instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{
    CrossEntityCheck, OverallStatus, RecordId, ReconciliationReport, RuleCheck, Severity,
    ValidationReport,
};

/// Log level for audit entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<Severity> for LogLevel {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Critical => LogLevel::Error,
            Severity::Warning => LogLevel::Warn,
            Severity::Advisory => LogLevel::Info,
        }
    }
}

/// One audit log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    /// Timestamp from the validation context
    pub timestamp: DateTime<Utc>,
    pub record_id: Option<RecordId>,
    pub rule_id: Option<String>,
    pub message: String,
    /// Additional structured data
    pub metadata: Vec<(String, String)>,
}

impl LogEntry {
    pub fn new(level: LogLevel, timestamp: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self {
            level,
            timestamp,
            record_id: None,
            rule_id: None,
            message: message.into(),
            metadata: Vec::new(),
        }
    }

    pub fn with_record(mut self, record_id: RecordId) -> Self {
        self.record_id = Some(record_id);
        self
    }

    pub fn with_rule(mut self, rule_id: impl Into<String>) -> Self {
        self.rule_id = Some(rule_id.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }
}

/// Collects audit entries at or above a minimum level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationLog {
    entries: Vec<LogEntry>,
    min_level: LogLevel,
}

impl ValidationLog {
    pub fn new(min_level: LogLevel) -> Self {
        Self {
            entries: Vec::new(),
            min_level,
        }
    }

    /// Capture every level
    pub fn all() -> Self {
        Self::new(LogLevel::Trace)
    }

    pub fn with_info_level() -> Self {
        Self::new(LogLevel::Info)
    }

    pub fn min_level(&self) -> LogLevel {
        self.min_level
    }

    pub fn log(&mut self, entry: LogEntry) {
        if entry.level >= self.min_level {
            self.entries.push(entry);
        }
    }

    pub fn debug(&mut self, timestamp: DateTime<Utc>, message: impl Into<String>) {
        self.log(LogEntry::new(LogLevel::Debug, timestamp, message));
    }

    pub fn info(&mut self, timestamp: DateTime<Utc>, message: impl Into<String>) {
        self.log(LogEntry::new(LogLevel::Info, timestamp, message));
    }

    pub fn warn(&mut self, timestamp: DateTime<Utc>, message: impl Into<String>) {
        self.log(LogEntry::new(LogLevel::Warn, timestamp, message));
    }

    /// One entry per failing check, plus a debug summary
    pub fn record_report(
        &mut self,
        timestamp: DateTime<Utc>,
        record_id: RecordId,
        report: &ValidationReport,
    ) {
        for check in report.failures() {
            self.log(rule_entry(timestamp, record_id, check));
        }
        self.log(
            LogEntry::new(
                LogLevel::Debug,
                timestamp,
                format!(
                    "evaluated {} rules: {} critical, {} warning, {} advisory",
                    report.checks().len(),
                    report.critical_count(),
                    report.warning_count(),
                    report.advisory_count()
                ),
            )
            .with_record(record_id)
            .with_metadata("registry_version", report.registry_version().to_string()),
        );
    }

    /// One entry per failing cross-entity check, attributed to each subject
    pub fn record_reconciliation(
        &mut self,
        timestamp: DateTime<Utc>,
        report: &ReconciliationReport,
    ) {
        for check in report.failures() {
            for subject in &check.subjects {
                self.log(cross_entry(timestamp, *subject, check));
            }
        }
        self.log(
            LogEntry::new(
                LogLevel::Info,
                timestamp,
                format!(
                    "reconciled {} records: {} checks, {} failing",
                    report.records_examined,
                    report.checks.len(),
                    report.failures().count()
                ),
            )
            .with_metadata("snapshot", report.snapshot.to_string()),
        );
    }

    pub fn record_status(
        &mut self,
        timestamp: DateTime<Utc>,
        record_id: RecordId,
        status: OverallStatus,
    ) {
        let level = match status {
            OverallStatus::Passed => LogLevel::Debug,
            OverallStatus::Warnings => LogLevel::Info,
            OverallStatus::Failed => LogLevel::Warn,
        };
        self.log(
            LogEntry::new(level, timestamp, format!("overall status {}", status))
                .with_record(record_id),
        );
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Move every entry of `other` into this log, respecting the level filter
    pub fn absorb(&mut self, other: ValidationLog) {
        for entry in other.entries {
            self.log(entry);
        }
    }

    pub fn filter_by_level(&self, level: LogLevel) -> Vec<&LogEntry> {
        self.entries.iter().filter(|e| e.level == level).collect()
    }

    pub fn filter_by_record(&self, record_id: RecordId) -> Vec<&LogEntry> {
        self.entries
            .iter()
            .filter(|e| e.record_id == Some(record_id))
            .collect()
    }
}

impl Default for ValidationLog {
    fn default() -> Self {
        Self::with_info_level()
    }
}

fn rule_entry(timestamp: DateTime<Utc>, record_id: RecordId, check: &RuleCheck) -> LogEntry {
    LogEntry::new(check.severity.into(), timestamp, check.message.clone())
        .with_record(record_id)
        .with_rule(check.rule_id.clone())
        .with_metadata("fields", check.fields_involved.join(","))
}

fn cross_entry(
    timestamp: DateTime<Utc>,
    record_id: RecordId,
    check: &CrossEntityCheck,
) -> LogEntry {
    LogEntry::new(check.severity.into(), timestamp, check.message.clone())
        .with_record(record_id)
        .with_rule(check.rule_id.clone())
        .with_metadata("scope", check.scope.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Version;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_level_filter() {
        let mut log = ValidationLog::with_info_level();
        log.debug(at(), "dropped");
        log.info(at(), "kept");

        assert_eq!(log.len(), 1);
        assert_eq!(log.entries()[0].message, "kept");
    }

    #[test]
    fn test_record_report_logs_failures_by_severity() {
        let failing = RuleCheck {
            rule_id: "SIGN-distributions".to_string(),
            rule_name: "distributions non-negative".to_string(),
            severity: Severity::Critical,
            passed: false,
            applicable: true,
            message: "distributions = -5.00".to_string(),
            fields_involved: vec!["distributions".to_string()],
        };
        let report = ValidationReport::from_checks(Version::new(1, 0, 0), vec![failing]);

        let mut log = ValidationLog::all();
        log.record_report(at(), RecordId(7), &report);

        let errors = log.filter_by_level(LogLevel::Error);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].rule_id.as_deref(), Some("SIGN-distributions"));
        assert_eq!(log.filter_by_record(RecordId(7)).len(), 2);
    }

    #[test]
    fn test_absorb_respects_filter() {
        let mut detailed = ValidationLog::all();
        detailed.debug(at(), "noise");
        detailed.warn(at(), "signal");

        let mut log = ValidationLog::with_info_level();
        log.absorb(detailed);
        assert_eq!(log.len(), 1);
    }
}
