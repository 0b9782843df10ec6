//! Fuses the deterministic report, the cross-entity checks touching a record
//! and an optional judgment score into one [`CombinedResult`].
//!
//! Status precedence: any critical failure is `Failed`; otherwise any warning
//! failure, or a coherence score under the threshold, is `Warnings`;
//! otherwise `Passed`. Advisory failures never change the status, and a
//! missing judgment is never itself a failure.

use crate::config::CombinerConfig;
use crate::context::ValidationContext;
use crate::error::SchemaError;
use crate::types::{
    CombinedResult, CompositeKey, CrossEntityCheck, JudgmentInput, OverallStatus, RecordId,
    Severity, SnapshotHash, ValidationReport,
};

/// Inputs for one combined result
#[derive(Debug, Clone)]
pub struct CombineInput {
    pub record_id: RecordId,
    pub composite_key: Option<CompositeKey>,
    pub report: ValidationReport,
    pub cross_entity_checks: Vec<CrossEntityCheck>,
    pub judgment: Option<JudgmentInput>,
    pub snapshot: Option<SnapshotHash>,
    pub revision: u32,
}

impl CombineInput {
    pub fn new(record_id: RecordId, report: ValidationReport) -> Self {
        Self {
            record_id,
            composite_key: None,
            report,
            cross_entity_checks: Vec::new(),
            judgment: None,
            snapshot: None,
            revision: 1,
        }
    }

    pub fn with_composite_key(mut self, key: Option<CompositeKey>) -> Self {
        self.composite_key = key;
        self
    }

    pub fn with_cross_checks(
        mut self,
        checks: Vec<CrossEntityCheck>,
        snapshot: SnapshotHash,
    ) -> Self {
        self.cross_entity_checks = checks;
        self.snapshot = Some(snapshot);
        self
    }

    pub fn with_judgment(mut self, judgment: Option<JudgmentInput>) -> Self {
        self.judgment = judgment;
        self
    }

    pub fn with_revision(mut self, revision: u32) -> Self {
        self.revision = revision;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultCombiner {
    coherence_threshold: f64,
}

impl ResultCombiner {
    pub fn new(config: &CombinerConfig) -> Self {
        Self {
            coherence_threshold: config.coherence_threshold,
        }
    }

    pub fn coherence_threshold(&self) -> f64 {
        self.coherence_threshold
    }

    /// Status for a report plus cross-entity checks plus optional score
    pub fn status(
        &self,
        report: &ValidationReport,
        cross_checks: &[CrossEntityCheck],
        coherence_score: Option<f64>,
    ) -> OverallStatus {
        let cross_critical = cross_checks.iter().any(|c| c.is_failure(Severity::Critical));
        if report.critical_count() > 0 || cross_critical {
            return OverallStatus::Failed;
        }

        let cross_warning = cross_checks.iter().any(|c| c.is_failure(Severity::Warning));
        let incoherent = coherence_score.map_or(false, |s| s < self.coherence_threshold);
        if report.warning_count() > 0 || cross_warning || incoherent {
            return OverallStatus::Warnings;
        }

        OverallStatus::Passed
    }

    /// Build the combined result.
    ///
    /// Only checks that touch the record are kept; a judgment with a score
    /// outside [0, 1] is rejected.
    pub fn combine(
        &self,
        input: CombineInput,
        context: &ValidationContext,
    ) -> Result<CombinedResult, SchemaError> {
        if let Some(judgment) = &input.judgment {
            judgment.validate()?;
        }

        let record_id = input.record_id;
        let mut cross_entity_checks = input.cross_entity_checks;
        cross_entity_checks.retain(|c| c.touches(record_id));

        let overall_status = self.status(
            &input.report,
            &cross_entity_checks,
            input.judgment.as_ref().map(|j| j.coherence_score),
        );

        Ok(CombinedResult {
            record_id,
            composite_key: input.composite_key,
            report: input.report,
            cross_entity_checks,
            judgment: input.judgment,
            overall_status,
            snapshot: input.snapshot,
            revision: input.revision,
            validated_at: context.now(),
        })
    }
}

impl Default for ResultCombiner {
    fn default() -> Self {
        Self::new(&CombinerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CheckScope, EntityGroupKey, RuleCheck, Version};
    use chrono::{TimeZone, Utc};

    fn rule_check(severity: Severity, passed: bool) -> RuleCheck {
        RuleCheck {
            rule_id: "R".to_string(),
            rule_name: "r".to_string(),
            severity,
            passed,
            applicable: true,
            message: if passed { String::new() } else { "failed".to_string() },
            fields_involved: Vec::new(),
        }
    }

    fn report(checks: Vec<RuleCheck>) -> ValidationReport {
        ValidationReport::from_checks(Version::new(1, 0, 0), checks)
    }

    fn cross(severity: Severity, subject: u64) -> CrossEntityCheck {
        CrossEntityCheck {
            rule_id: "XE".to_string(),
            rule_name: "xe".to_string(),
            severity,
            passed: false,
            applicable: true,
            message: "failed".to_string(),
            fields_involved: Vec::new(),
            scope: CheckScope::Group(EntityGroupKey {
                entity_id: "12-3456789".to_string(),
                period: 2024,
            }),
            subjects: vec![RecordId(subject)],
        }
    }

    fn context() -> ValidationContext {
        ValidationContext::new(Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn test_status_precedence() {
        let combiner = ResultCombiner::default();
        let clean = report(vec![rule_check(Severity::Critical, true)]);

        assert_eq!(combiner.status(&clean, &[], None), OverallStatus::Passed);
        assert_eq!(combiner.status(&clean, &[], Some(0.9)), OverallStatus::Passed);
        assert_eq!(combiner.status(&clean, &[], Some(0.2)), OverallStatus::Warnings);
        assert_eq!(
            combiner.status(&report(vec![rule_check(Severity::Advisory, false)]), &[], None),
            OverallStatus::Passed
        );
        assert_eq!(
            combiner.status(&report(vec![rule_check(Severity::Warning, false)]), &[], Some(1.0)),
            OverallStatus::Warnings
        );
        assert_eq!(
            combiner.status(&clean, &[cross(Severity::Critical, 1)], Some(1.0)),
            OverallStatus::Failed
        );
        assert_eq!(
            combiner.status(&report(vec![rule_check(Severity::Critical, false)]), &[], Some(1.0)),
            OverallStatus::Failed
        );
    }

    #[test]
    fn test_combine_keeps_only_touching_checks() {
        let input = CombineInput::new(RecordId(1), report(Vec::new()))
            .with_cross_checks(
                vec![cross(Severity::Critical, 2), cross(Severity::Warning, 1)],
                SnapshotHash([0u8; 32]),
            );

        let result = ResultCombiner::default().combine(input, &context()).unwrap();
        assert_eq!(result.cross_entity_checks().len(), 1);
        assert_eq!(result.overall_status(), OverallStatus::Warnings);
        assert_eq!(result.coherence_score(), None);
        assert_eq!(result.validated_at(), context().now());
    }

    #[test]
    fn test_combine_rejects_out_of_range_score() {
        let input = CombineInput::new(RecordId(1), report(Vec::new()))
            .with_judgment(Some(JudgmentInput::new(1.5, "")));
        let result = ResultCombiner::default().combine(input, &context());
        assert!(matches!(result, Err(SchemaError::InvalidJudgment { .. })));
    }

    #[test]
    fn test_later_revision_supersedes() {
        let combiner = ResultCombiner::default();
        let first = combiner
            .combine(CombineInput::new(RecordId(7), report(Vec::new())), &context())
            .unwrap();
        let second = combiner
            .combine(
                CombineInput::new(RecordId(7), report(Vec::new())).with_revision(2),
                &context(),
            )
            .unwrap();
        assert!(second.supersedes(&first));
        assert!(!first.supersedes(&second));
    }
}
