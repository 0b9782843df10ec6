//! Deterministic evaluator: runs a whole registry against one record
//!
//! Evaluation is a pure function of the record and the registry, so batches
//! are evaluated in parallel with `rayon` and still come back in input order.

use rayon::prelude::*;
use std::sync::Arc;

use crate::config::ValidatorConfig;
use crate::catalog::standard_registry;
use crate::error::{FRVEError, SchemaError};
use crate::record::Record;
use crate::rules::RuleRegistry;
use crate::types::{RuleCheck, ValidationReport};

/// Applies an injected registry to records
#[derive(Debug, Clone)]
pub struct Evaluator {
    registry: Arc<RuleRegistry>,
}

impl Evaluator {
    pub fn new(registry: RuleRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// Evaluator over the standard catalog for a configuration
    pub fn standard(config: &ValidatorConfig) -> Result<Self, FRVEError> {
        Ok(Self::new(standard_registry(config)?))
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Exactly one check per registered rule, in registry order. Each check
    /// carries the id the rule was registered under.
    pub fn evaluate(&self, record: &Record) -> ValidationReport {
        let checks: Vec<RuleCheck> = self
            .registry
            .rules()
            .map(|rule| {
                let mut check = rule.evaluate(record);
                if check.rule_id != rule.id() {
                    check.rule_id = rule.id().to_string();
                }
                check
            })
            .collect();

        ValidationReport::from_checks(self.registry.version().clone(), checks)
    }

    /// Reject structurally invalid JSON, then evaluate
    pub fn evaluate_json(&self, json: &str) -> Result<(Record, ValidationReport), SchemaError> {
        let record = Record::from_json(json)?;
        let report = self.evaluate(&record);
        Ok((record, report))
    }

    /// Evaluate independent records concurrently; output order matches input
    pub fn evaluate_batch(&self, records: &[Record]) -> Vec<ValidationReport> {
        records.par_iter().map(|r| self.evaluate(r)).collect()
    }

    /// Sequential variant of [`evaluate_batch`](Self::evaluate_batch)
    pub fn evaluate_sequential(&self, records: &[Record]) -> Vec<ValidationReport> {
        records.iter().map(|r| self.evaluate(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{MonetaryField, Role};
    use crate::rules::{FnRule, RegistryMetadata, RuleDescriptor};
    use crate::types::{Severity, Version};

    fn evaluator() -> Evaluator {
        Evaluator::standard(&ValidatorConfig::default()).unwrap()
    }

    fn clean_record() -> Record {
        Record::builder()
            .period("2024")
            .entity("12-3456789", "Granite Peak Partners LP")
            .sub_entity("123-45-6789")
            .role(Role::LimitedParticipant)
            .share(25.0)
            .amount(MonetaryField::OrdinaryBusinessIncome, 40_000.0)
            .amount(MonetaryField::InterestIncome, 1_200.0)
            .amount(MonetaryField::Distributions, 10_000.0)
            .amount(MonetaryField::CapitalAccountBeginning, 250_000.0)
            .amount(MonetaryField::CapitalAccountEnding, 281_200.0)
            .build()
    }

    #[test]
    fn test_one_check_per_rule() {
        let evaluator = evaluator();
        let report = evaluator.evaluate(&Record::default());
        assert_eq!(report.checks().len(), evaluator.registry().len());

        let ids: Vec<_> = report.checks().iter().map(|c| c.rule_id.as_str()).collect();
        let registered: Vec<_> = evaluator.registry().rules().map(|r| r.id()).collect();
        assert_eq!(ids, registered);
    }

    #[test]
    fn test_clean_record_passes() {
        let report = evaluator().evaluate(&clean_record());
        assert!(report.passed(), "{:?}", report.failures().collect::<Vec<_>>());
        assert_eq!(report.warning_count(), 0);
    }

    #[test]
    fn test_empty_record_fails_presence_only_critically() {
        let report = evaluator().evaluate(&Record::default());
        assert!(!report.passed());
        assert_eq!(report.critical_count(), 4);
        assert!(report
            .failures()
            .all(|c| c.rule_id.starts_with("REQ-") && c.severity == Severity::Critical));
    }

    #[test]
    fn test_subset_violation_is_critical() {
        let mut record = clean_record();
        record.set_amount(MonetaryField::OrdinaryDividends, Some(4_000.0));
        record.set_amount(MonetaryField::QualifiedDividends, Some(5_000.0));

        let report = evaluator().evaluate(&record);
        let check = report.check("SUBSET-qualified_dividends").unwrap();
        assert!(!check.passed);
        assert!(!report.passed());
    }

    #[test]
    fn test_evaluate_json_rejects_wrong_types() {
        let result = evaluator().evaluate_json(r#"{"distributions": "ten"}"#);
        assert!(matches!(result, Err(SchemaError::Malformed { .. })));
    }

    #[test]
    fn test_batch_matches_sequential() {
        let evaluator = evaluator();
        let records = vec![clean_record(), Record::default(), clean_record()];
        assert_eq!(
            evaluator.evaluate_batch(&records),
            evaluator.evaluate_sequential(&records)
        );
    }

    #[test]
    fn test_custom_registry_injected() {
        let registry = RuleRegistry::new(
            Version::new(2, 0, 0),
            RegistryMetadata::new("custom", "single rule"),
        )
        .with_rule(FnRule::new(
            RuleDescriptor::new("CUSTOM-001", "distributions reported", Severity::Warning)
                .with_field(MonetaryField::Distributions),
            |d: &RuleDescriptor, r: &Record| {
                d.outcome(r.distributions.is_some(), || "no distributions".to_string())
            },
        ))
        .unwrap();

        let report = Evaluator::new(registry).evaluate(&Record::default());
        assert_eq!(report.registry_version(), &Version::new(2, 0, 0));
        assert_eq!(report.warning_count(), 1);
        assert!(report.passed());
    }

    #[test]
    fn test_check_takes_registered_rule_id() {
        let registry = RuleRegistry::new(
            Version::new(2, 0, 0),
            RegistryMetadata::new("custom", "mislabelled rule"),
        )
        .with_rule(FnRule::new(
            RuleDescriptor::new("CUSTOM-002", "interest reported", Severity::Advisory),
            |_: &RuleDescriptor, _: &Record| {
                RuleDescriptor::new("OTHER-999", "interest reported", Severity::Advisory)
                    .fail("no interest")
            },
        ))
        .unwrap();

        let report = Evaluator::new(registry).evaluate(&Record::default());
        assert_eq!(report.checks().len(), 1);
        assert_eq!(report.checks()[0].rule_id, "CUSTOM-002");
        assert!(report.check("CUSTOM-002").is_some());
        assert_eq!(report.advisory_count(), 1);
    }
}
