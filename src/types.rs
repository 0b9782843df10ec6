//! Core data types for the FRVE

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SchemaError;

/// Semantic version for rule registries
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    /// Create a new version
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    /// Check if this version is compatible with another version
    pub fn is_compatible_with(&self, other: &Version) -> bool {
        self.major == other.major
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Severity of a failing check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Definitively wrong
    Critical,
    /// Strongly suspicious, exceptions exist
    Warning,
    /// Unusual, informational
    Advisory,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Critical => write!(f, "critical"),
            Severity::Warning => write!(f, "warning"),
            Severity::Advisory => write!(f, "advisory"),
        }
    }
}

/// Identifier assigned to a record when it enters the accumulation store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rec-{}", self.0)
    }
}

/// BLAKE3 fingerprint of a record's content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub [u8; 32]);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Hash chain over the fingerprints of a store snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotHash(pub [u8; 32]);

impl fmt::Display for SnapshotHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Outcome of one single-record rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleCheck {
    pub rule_id: String,
    pub rule_name: String,
    pub severity: Severity,
    pub passed: bool,
    /// False when the rule's inputs were absent and it passed vacuously
    pub applicable: bool,
    /// Empty when passed
    pub message: String,
    pub fields_involved: Vec<String>,
}

impl RuleCheck {
    pub fn is_failure(&self, severity: Severity) -> bool {
        !self.passed && self.severity == severity
    }
}

/// Complete deterministic report for one record.
///
/// Counts and `passed` are derived from `checks` at construction and again on
/// deserialization, so a report read back from the wire can never disagree
/// with its own checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ReportWire")]
pub struct ValidationReport {
    registry_version: Version,
    checks: Vec<RuleCheck>,
    critical_count: usize,
    warning_count: usize,
    advisory_count: usize,
    passed: bool,
}

#[derive(Deserialize)]
struct ReportWire {
    registry_version: Version,
    checks: Vec<RuleCheck>,
    #[serde(default)]
    #[allow(dead_code)]
    critical_count: usize,
    #[serde(default)]
    #[allow(dead_code)]
    warning_count: usize,
    #[serde(default)]
    #[allow(dead_code)]
    advisory_count: usize,
    #[serde(default)]
    #[allow(dead_code)]
    passed: bool,
}

impl From<ReportWire> for ValidationReport {
    fn from(wire: ReportWire) -> Self {
        ValidationReport::from_checks(wire.registry_version, wire.checks)
    }
}

impl ValidationReport {
    /// Build a report, deriving the failure counts from the checks
    pub fn from_checks(registry_version: Version, checks: Vec<RuleCheck>) -> Self {
        let count = |severity| checks.iter().filter(|c| c.is_failure(severity)).count();
        let critical_count = count(Severity::Critical);
        let warning_count = count(Severity::Warning);
        let advisory_count = count(Severity::Advisory);

        Self {
            registry_version,
            checks,
            critical_count,
            warning_count,
            advisory_count,
            passed: critical_count == 0,
        }
    }

    pub fn registry_version(&self) -> &Version {
        &self.registry_version
    }

    pub fn checks(&self) -> &[RuleCheck] {
        &self.checks
    }

    pub fn critical_count(&self) -> usize {
        self.critical_count
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    pub fn advisory_count(&self) -> usize {
        self.advisory_count
    }

    /// True iff no critical check failed
    pub fn passed(&self) -> bool {
        self.passed
    }

    /// Look up a check by rule id
    pub fn check(&self, rule_id: &str) -> Option<&RuleCheck> {
        self.checks.iter().find(|c| c.rule_id == rule_id)
    }

    /// All failing checks, in registry order
    pub fn failures(&self) -> impl Iterator<Item = &RuleCheck> {
        self.checks.iter().filter(|c| !c.passed)
    }
}

/// (entity identifier, period): same-period cross-entity grouping
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityGroupKey {
    pub entity_id: String,
    pub period: u16,
}

impl fmt::Display for EntityGroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.entity_id, self.period)
    }
}

/// (entity identifier, sub-entity identifier): one relationship across periods
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContinuityKey {
    pub entity_id: String,
    pub sub_entity_id: String,
}

impl fmt::Display for ContinuityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_id, mask_identifier(&self.sub_entity_id))
    }
}

/// (entity identifier, sub-entity identifier, period): duplicate/amendment key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompositeKey {
    pub entity_id: String,
    pub sub_entity_id: String,
    pub period: u16,
}

impl CompositeKey {
    pub fn group_key(&self) -> EntityGroupKey {
        EntityGroupKey {
            entity_id: self.entity_id.clone(),
            period: self.period,
        }
    }

    pub fn continuity_key(&self) -> ContinuityKey {
        ContinuityKey {
            entity_id: self.entity_id.clone(),
            sub_entity_id: self.sub_entity_id.clone(),
        }
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}/{}",
            self.entity_id,
            mask_identifier(&self.sub_entity_id),
            self.period
        )
    }
}

/// Render a recipient tax id with all but the first four characters hidden
pub fn mask_identifier(id: &str) -> String {
    let visible: String = id.chars().take(4).collect();
    format!("{}***", visible)
}

/// The key a cross-entity check was evaluated against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckScope {
    Group(EntityGroupKey),
    Pair {
        key: ContinuityKey,
        prior_period: u16,
        current_period: u16,
    },
    Composite(CompositeKey),
}

impl fmt::Display for CheckScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckScope::Group(key) => write!(f, "group {}", key),
            CheckScope::Pair { key, prior_period, current_period } => {
                write!(f, "pair {} {}->{}", key, prior_period, current_period)
            }
            CheckScope::Composite(key) => write!(f, "composite {}", key),
        }
    }
}

/// Outcome of one reconciliation check over a group, pair or composite key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossEntityCheck {
    pub rule_id: String,
    pub rule_name: String,
    pub severity: Severity,
    pub passed: bool,
    pub applicable: bool,
    pub message: String,
    pub fields_involved: Vec<String>,
    pub scope: CheckScope,
    /// Records this check is about
    pub subjects: Vec<RecordId>,
}

impl CrossEntityCheck {
    pub fn is_failure(&self, severity: Severity) -> bool {
        !self.passed && self.severity == severity
    }

    pub fn touches(&self, record_id: RecordId) -> bool {
        self.subjects.contains(&record_id)
    }
}

/// Result of a reconciliation pass over one store snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub snapshot: SnapshotHash,
    pub records_examined: usize,
    pub checks: Vec<CrossEntityCheck>,
}

impl ReconciliationReport {
    /// Checks that involve the given record
    pub fn touching(&self, record_id: RecordId) -> impl Iterator<Item = &CrossEntityCheck> {
        self.checks.iter().filter(move |c| c.touches(record_id))
    }

    pub fn failures(&self) -> impl Iterator<Item = &CrossEntityCheck> {
        self.checks.iter().filter(|c| !c.passed)
    }
}

/// Output of the external judgment collaborator, consumed read-only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgmentInput {
    pub coherence_score: f64,
    #[serde(default)]
    pub narrative: String,
    #[serde(default)]
    pub flagged_fields: Vec<String>,
}

impl JudgmentInput {
    pub fn new(coherence_score: f64, narrative: impl Into<String>) -> Self {
        Self {
            coherence_score,
            narrative: narrative.into(),
            flagged_fields: Vec::new(),
        }
    }

    pub fn with_flagged_field(mut self, field: impl Into<String>) -> Self {
        self.flagged_fields.push(field.into());
        self
    }

    /// Reject scores outside [0, 1]
    pub fn validate(&self) -> Result<(), SchemaError> {
        if !self.coherence_score.is_finite() || !(0.0..=1.0).contains(&self.coherence_score) {
            return Err(SchemaError::InvalidJudgment {
                reason: format!(
                    "coherence_score {} must be within [0, 1]",
                    self.coherence_score
                ),
            });
        }
        Ok(())
    }

    /// Parse and validate a judgment document
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let judgment: JudgmentInput =
            serde_json::from_str(json).map_err(|e| SchemaError::InvalidJudgment {
                reason: e.to_string(),
            })?;
        judgment.validate()?;
        Ok(judgment)
    }
}

/// Overall status of a combined result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Passed,
    Warnings,
    Failed,
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverallStatus::Passed => write!(f, "passed"),
            OverallStatus::Warnings => write!(f, "warnings"),
            OverallStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Deterministic report, the cross-entity checks touching the record and the
/// optional judgment, fused into one status. Built only by the combiner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedResult {
    pub(crate) record_id: RecordId,
    pub(crate) composite_key: Option<CompositeKey>,
    pub(crate) report: ValidationReport,
    pub(crate) cross_entity_checks: Vec<CrossEntityCheck>,
    pub(crate) judgment: Option<JudgmentInput>,
    pub(crate) overall_status: OverallStatus,
    pub(crate) snapshot: Option<SnapshotHash>,
    pub(crate) revision: u32,
    pub(crate) validated_at: DateTime<Utc>,
}

impl CombinedResult {
    pub fn record_id(&self) -> RecordId {
        self.record_id
    }

    pub fn composite_key(&self) -> Option<&CompositeKey> {
        self.composite_key.as_ref()
    }

    pub fn report(&self) -> &ValidationReport {
        &self.report
    }

    pub fn cross_entity_checks(&self) -> &[CrossEntityCheck] {
        &self.cross_entity_checks
    }

    pub fn judgment(&self) -> Option<&JudgmentInput> {
        self.judgment.as_ref()
    }

    /// None when the judgment step did not run
    pub fn coherence_score(&self) -> Option<f64> {
        self.judgment.as_ref().map(|j| j.coherence_score)
    }

    pub fn overall_status(&self) -> OverallStatus {
        self.overall_status
    }

    /// Snapshot the cross-entity checks were computed against, if any
    pub fn snapshot(&self) -> Option<SnapshotHash> {
        self.snapshot
    }

    /// Incremented each time a record is re-validated; higher supersedes lower
    pub fn revision(&self) -> u32 {
        self.revision
    }

    pub fn validated_at(&self) -> DateTime<Utc> {
        self.validated_at
    }

    /// Whether this result replaces `other` for the same record
    pub fn supersedes(&self, other: &CombinedResult) -> bool {
        self.record_id == other.record_id && self.revision > other.revision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(id: &str, severity: Severity, passed: bool) -> RuleCheck {
        RuleCheck {
            rule_id: id.to_string(),
            rule_name: id.to_string(),
            severity,
            passed,
            applicable: true,
            message: if passed { String::new() } else { "failed".to_string() },
            fields_involved: Vec::new(),
        }
    }

    #[test]
    fn test_report_counts_derived() {
        let report = ValidationReport::from_checks(
            Version::new(1, 0, 0),
            vec![
                check("a", Severity::Critical, true),
                check("b", Severity::Warning, false),
                check("c", Severity::Advisory, false),
                check("d", Severity::Advisory, false),
            ],
        );

        assert_eq!(report.critical_count(), 0);
        assert_eq!(report.warning_count(), 1);
        assert_eq!(report.advisory_count(), 2);
        assert!(report.passed());
    }

    #[test]
    fn test_report_deserialization_recomputes_counts() {
        let json = r#"{
            "registry_version": {"major": 1, "minor": 0, "patch": 0},
            "checks": [{
                "rule_id": "X", "rule_name": "X", "severity": "critical",
                "passed": false, "applicable": true, "message": "bad",
                "fields_involved": []
            }],
            "critical_count": 0,
            "passed": true
        }"#;

        let report: ValidationReport = serde_json::from_str(json).unwrap();
        assert_eq!(report.critical_count(), 1);
        assert!(!report.passed());
    }

    #[test]
    fn test_judgment_validation() {
        assert!(JudgmentInput::new(0.0, "").validate().is_ok());
        assert!(JudgmentInput::new(1.0, "").validate().is_ok());
        assert!(JudgmentInput::new(1.2, "").validate().is_err());
        assert!(JudgmentInput::new(f64::NAN, "").validate().is_err());
    }

    #[test]
    fn test_mask_identifier() {
        assert_eq!(mask_identifier("123-45-6789"), "123-***");
        assert_eq!(mask_identifier("12"), "12***");
    }
}
