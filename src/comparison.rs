//! Comparison of validation output across runs, registry versions and
//! amendments

use serde::{Deserialize, Serialize};

use crate::record::{MonetaryField, Record};
use crate::types::{CombinedResult, OverallStatus, RuleCheck, ValidationReport, Version};

/// Difference between the two outcomes of one rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckDifference {
    pub rule_id: String,
    /// `None` when the rule is absent from that report
    pub baseline_passed: Option<bool>,
    pub comparison_passed: Option<bool>,
    pub baseline_message: String,
    pub comparison_message: String,
}

impl CheckDifference {
    /// Rule passed before and fails now
    pub fn is_regression(&self) -> bool {
        self.baseline_passed == Some(true) && self.comparison_passed == Some(false)
    }
}

/// Comparison of two validation reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportComparison {
    pub baseline_version: Version,
    pub comparison_version: Version,
    pub identical: bool,
    pub passed_matches: bool,
    pub differences: Vec<CheckDifference>,
}

impl ReportComparison {
    pub fn regressions(&self) -> impl Iterator<Item = &CheckDifference> {
        self.differences.iter().filter(|d| d.is_regression())
    }

    pub fn summary(&self) -> String {
        if self.identical {
            return "Reports are identical".to_string();
        }
        let mut parts = Vec::new();
        if self.baseline_version != self.comparison_version {
            parts.push(format!(
                "registry {} -> {}",
                self.baseline_version, self.comparison_version
            ));
        }
        if !self.passed_matches {
            parts.push("pass/fail verdict changed".to_string());
        }
        if !self.differences.is_empty() {
            parts.push(format!("{} checks changed", self.differences.len()));
        }
        format!("Reports differ: {}", parts.join(", "))
    }
}

/// Comparison of two combined results for the same record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultComparison {
    pub report: ReportComparison,
    pub baseline_status: OverallStatus,
    pub comparison_status: OverallStatus,
    pub cross_checks_match: bool,
    pub coherence_matches: bool,
}

impl ResultComparison {
    pub fn status_changed(&self) -> bool {
        self.baseline_status != self.comparison_status
    }

    /// Same deterministic content; revision and timestamp are ignored
    pub fn are_identical(&self) -> bool {
        self.report.identical
            && !self.status_changed()
            && self.cross_checks_match
            && self.coherence_matches
    }
}

/// Monetary difference between two revisions of a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmountDifference {
    pub field: MonetaryField,
    pub baseline: Option<f64>,
    pub comparison: Option<f64>,
}

impl AmountDifference {
    /// Absent amounts count as zero
    pub fn delta(&self) -> f64 {
        self.comparison.unwrap_or(0.0) - self.baseline.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReportComparator;

impl ReportComparator {
    pub fn new() -> Self {
        Self
    }

    pub fn compare_reports(
        &self,
        baseline: &ValidationReport,
        comparison: &ValidationReport,
    ) -> ReportComparison {
        let differences = self.check_differences(baseline.checks(), comparison.checks());
        ReportComparison {
            baseline_version: baseline.registry_version().clone(),
            comparison_version: comparison.registry_version().clone(),
            identical: baseline == comparison,
            passed_matches: baseline.passed() == comparison.passed(),
            differences,
        }
    }

    pub fn compare_results(
        &self,
        baseline: &CombinedResult,
        comparison: &CombinedResult,
    ) -> ResultComparison {
        ResultComparison {
            report: self.compare_reports(baseline.report(), comparison.report()),
            baseline_status: baseline.overall_status(),
            comparison_status: comparison.overall_status(),
            cross_checks_match: baseline.cross_entity_checks() == comparison.cross_entity_checks(),
            coherence_matches: baseline.coherence_score() == comparison.coherence_score(),
        }
    }

    /// Checks whose outcome or message differ, in baseline order followed
    /// by rules only the comparison has
    fn check_differences(
        &self,
        baseline: &[RuleCheck],
        comparison: &[RuleCheck],
    ) -> Vec<CheckDifference> {
        let mut differences = Vec::new();

        for b in baseline {
            match comparison.iter().find(|c| c.rule_id == b.rule_id) {
                Some(c) if c.passed == b.passed && c.message == b.message => {}
                Some(c) => differences.push(CheckDifference {
                    rule_id: b.rule_id.clone(),
                    baseline_passed: Some(b.passed),
                    comparison_passed: Some(c.passed),
                    baseline_message: b.message.clone(),
                    comparison_message: c.message.clone(),
                }),
                None => differences.push(CheckDifference {
                    rule_id: b.rule_id.clone(),
                    baseline_passed: Some(b.passed),
                    comparison_passed: None,
                    baseline_message: b.message.clone(),
                    comparison_message: String::new(),
                }),
            }
        }

        for c in comparison {
            if !baseline.iter().any(|b| b.rule_id == c.rule_id) {
                differences.push(CheckDifference {
                    rule_id: c.rule_id.clone(),
                    baseline_passed: None,
                    comparison_passed: Some(c.passed),
                    baseline_message: String::new(),
                    comparison_message: c.message.clone(),
                });
            }
        }

        differences
    }

    /// Field-by-field monetary changes from one revision to the next
    pub fn amount_differences(baseline: &Record, comparison: &Record) -> Vec<AmountDifference> {
        baseline
            .differing_amounts(comparison)
            .into_iter()
            .map(|field| AmountDifference {
                field,
                baseline: baseline.amount(field),
                comparison: comparison.amount(field),
            })
            .collect()
    }

    /// Largest absolute changes first
    pub fn largest_changes(
        differences: &[AmountDifference],
        limit: usize,
    ) -> Vec<AmountDifference> {
        let mut sorted = differences.to_vec();
        sorted.sort_by(|a, b| b.delta().abs().total_cmp(&a.delta().abs()));
        sorted.into_iter().take(limit).collect()
    }
}
