//! Validation pipeline: evaluate, store, reconcile, combine
//!
//! A record submitted alone is reconciled against its entity's snapshot
//! right after it is appended. A batch is evaluated in parallel, appended in
//! input order, and reconciled once against the whole store.
//!
//! The pipeline keeps the latest combined result for every record id.
//! Re-validating a record produces a new result with a higher revision; a
//! result already handed out is never modified.

use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::combiner::{CombineInput, ResultCombiner};
use crate::config::ValidatorConfig;
use crate::context::ValidationContext;
use crate::error::{FRVEError, StoreError};
use crate::evaluator::Evaluator;
use crate::logging::{LogLevel, ValidationLog};
use crate::reconciler::Reconciler;
use crate::record::Record;
use crate::rules::RuleRegistry;
use crate::store::{EntityStore, RecordAccessor};
use crate::types::{
    CombinedResult, JudgmentInput, OverallStatus, RecordId, ReconciliationReport,
};

/// End-to-end validation over an in-process store
pub struct ValidationPipeline {
    config: ValidatorConfig,
    evaluator: Evaluator,
    store: EntityStore,
    reconciler: Reconciler,
    combiner: ResultCombiner,
    context: ValidationContext,
    results: RwLock<BTreeMap<RecordId, CombinedResult>>,
    log: Mutex<ValidationLog>,
}

impl ValidationPipeline {
    pub fn builder() -> ValidationPipelineBuilder {
        ValidationPipelineBuilder::new()
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn context(&self) -> &ValidationContext {
        &self.context
    }

    /// Validate one record.
    ///
    /// A record without an entity identifier or period still gets its
    /// deterministic report and a result; it just cannot take part in
    /// cross-entity checks.
    pub fn submit(
        &self,
        record: Record,
        judgment: Option<JudgmentInput>,
    ) -> Result<CombinedResult, FRVEError> {
        if let Some(judgment) = &judgment {
            judgment.validate()?;
        }

        let report = self.evaluator.evaluate(&record);
        let composite_key = record.composite_key();
        let entity = record.entity().map(str::to_string);

        let (id, stored) = match self.store.append(record, report.clone()) {
            Ok(id) => (id, true),
            Err(StoreError::MissingKey { key }) => {
                debug!(missing = %key, "validating without cross-entity checks");
                (self.store.allocate_id(), false)
            }
            Err(e) => return Err(e.into()),
        };
        self.log.lock().record_report(self.context.now(), id, &report);

        let mut input = CombineInput::new(id, report)
            .with_composite_key(composite_key)
            .with_judgment(judgment);

        if let (true, Some(entity)) = (stored, entity) {
            let snapshot = self.store.entity_snapshot(&entity);
            let checks = self.reconciler.reconcile_for(&snapshot, id);
            input = input.with_cross_checks(checks, snapshot.snapshot_hash());
        }

        self.finish(input)
    }

    /// Parse, then [`submit`](Self::submit). Malformed input is rejected
    /// before anything is stored.
    pub fn submit_json(
        &self,
        json: &str,
        judgment: Option<JudgmentInput>,
    ) -> Result<CombinedResult, FRVEError> {
        let record = Record::from_json(json)?;
        self.submit(record, judgment)
    }

    /// Validate a batch: parallel evaluation, ordered append, one
    /// reconciliation pass. Results come back in input order.
    pub fn validate_batch(
        &self,
        batch: Vec<(Record, Option<JudgmentInput>)>,
    ) -> Result<Vec<CombinedResult>, FRVEError> {
        for (_, judgment) in &batch {
            if let Some(judgment) = judgment {
                judgment.validate()?;
            }
        }

        let records: Vec<Record> = batch.iter().map(|(r, _)| r.clone()).collect();
        let reports = self.evaluator.evaluate_batch(&records);
        info!(records = records.len(), "batch evaluated");

        let mut pending = Vec::with_capacity(batch.len());
        for ((record, judgment), report) in batch.into_iter().zip(reports) {
            let composite_key = record.composite_key();
            let (id, stored) = match self.store.append(record, report.clone()) {
                Ok(id) => (id, true),
                Err(StoreError::MissingKey { .. }) => (self.store.allocate_id(), false),
                Err(e) => return Err(e.into()),
            };
            self.log.lock().record_report(self.context.now(), id, &report);
            pending.push((id, stored, composite_key, report, judgment));
        }

        let reconciliation = self.reconcile_all();

        pending
            .into_iter()
            .map(|(id, stored, composite_key, report, judgment)| {
                let mut input = CombineInput::new(id, report)
                    .with_composite_key(composite_key)
                    .with_judgment(judgment);
                if stored {
                    let checks = reconciliation.touching(id).cloned().collect();
                    input = input.with_cross_checks(checks, reconciliation.snapshot);
                }
                self.finish(input)
            })
            .collect()
    }

    /// Reconcile the whole store as it stands now
    pub fn reconcile_all(&self) -> ReconciliationReport {
        let snapshot = self.store.snapshot();
        let report = self.reconciler.reconcile(&snapshot);
        info!(
            records = report.records_examined,
            checks = report.checks.len(),
            failing = report.failures().count(),
            snapshot = %report.snapshot,
            "reconciliation complete"
        );
        self.log.lock().record_reconciliation(self.context.now(), &report);
        report
    }

    /// Re-run a stored record against the current store, e.g. after the
    /// rest of its group has arrived. The new result supersedes the old.
    pub fn revalidate(
        &self,
        id: RecordId,
        judgment: Option<JudgmentInput>,
    ) -> Result<CombinedResult, FRVEError> {
        let stored = self.store.get(id)?;
        let report = self.evaluator.evaluate(&stored.record);

        let judgment = match judgment {
            Some(judgment) => {
                judgment.validate()?;
                Some(judgment)
            }
            None => self.result(id).and_then(|r| r.judgment().cloned()),
        };

        let mut input = CombineInput::new(id, report)
            .with_composite_key(stored.composite_key())
            .with_judgment(judgment);
        if let Some(entity) = stored.record.entity() {
            let snapshot = self.store.entity_snapshot(entity);
            let checks = self.reconciler.reconcile_for(&snapshot, id);
            input = input.with_cross_checks(checks, snapshot.snapshot_hash());
        }

        self.finish(input)
    }

    /// Re-validate every stored record; ids in ascending order
    pub fn revalidate_all(&self) -> Result<Vec<CombinedResult>, FRVEError> {
        let ids: Vec<RecordId> = self.store.snapshot().records().map(|s| s.id).collect();
        ids.into_iter().map(|id| self.revalidate(id, None)).collect()
    }

    /// Latest result for a record
    pub fn result(&self, id: RecordId) -> Option<CombinedResult> {
        self.results.read().get(&id).cloned()
    }

    /// Latest result for every record, by id
    pub fn results(&self) -> Vec<CombinedResult> {
        self.results.read().values().cloned().collect()
    }

    pub fn status_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for result in self.results.read().values() {
            *counts.entry(result.overall_status().to_string()).or_insert(0) += 1;
        }
        counts
    }

    /// Drain the audit log
    pub fn take_log(&self) -> ValidationLog {
        let mut log = self.log.lock();
        let fresh = ValidationLog::new(log.min_level());
        std::mem::replace(&mut *log, fresh)
    }

    fn finish(&self, input: CombineInput) -> Result<CombinedResult, FRVEError> {
        let id = input.record_id;
        let mut results = self.results.write();
        let revision = results.get(&id).map_or(1, |r| r.revision() + 1);

        let result = self.combiner.combine(input.with_revision(revision), &self.context)?;
        match result.overall_status() {
            OverallStatus::Failed => warn!(record_id = %id, revision, "record failed validation"),
            status => debug!(record_id = %id, revision, %status, "record validated"),
        }
        self.log
            .lock()
            .record_status(self.context.now(), id, result.overall_status());

        results.insert(id, result.clone());
        Ok(result)
    }
}

impl std::fmt::Debug for ValidationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationPipeline")
            .field("registry_version", self.evaluator.registry().version())
            .field("rules", &self.evaluator.registry().len())
            .field("records", &self.store.len())
            .field("context", &self.context)
            .finish()
    }
}

/// Builder for [`ValidationPipeline`]
#[derive(Debug, Default)]
pub struct ValidationPipelineBuilder {
    config: Option<ValidatorConfig>,
    registry: Option<RuleRegistry>,
    context: Option<ValidationContext>,
    log_level: Option<LogLevel>,
}

impl ValidationPipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: ValidatorConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replace the standard catalog
    pub fn with_registry(mut self, registry: RuleRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_context(mut self, context: ValidationContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = Some(level);
        self
    }

    /// Validates the configuration and builds the standard catalog unless
    /// a registry was supplied
    pub fn build(self) -> Result<ValidationPipeline, FRVEError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let evaluator = match self.registry {
            Some(registry) => Evaluator::new(registry),
            None => Evaluator::standard(&config)?,
        };
        let context = self
            .context
            .unwrap_or_else(|| ValidationContext::builder().build());

        Ok(ValidationPipeline {
            reconciler: Reconciler::new(&config),
            combiner: ResultCombiner::new(&config.combiner),
            evaluator,
            store: EntityStore::new(),
            context,
            results: RwLock::new(BTreeMap::new()),
            log: Mutex::new(ValidationLog::new(self.log_level.unwrap_or(LogLevel::Info))),
            config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{MonetaryField, Role};
    use chrono::{TimeZone, Utc};

    fn pipeline() -> ValidationPipeline {
        ValidationPipeline::builder()
            .with_context(ValidationContext::new(
                Utc.with_ymd_and_hms(2025, 4, 15, 0, 0, 0).unwrap(),
            ))
            .build()
            .unwrap()
    }

    fn member(sub: &str, share: f64, income: f64) -> Record {
        Record::builder()
            .period("2024")
            .entity("12-3456789", "Granite Peak Partners LP")
            .sub_entity(sub)
            .role(Role::LimitedParticipant)
            .share(share)
            .amount(MonetaryField::OrdinaryBusinessIncome, income)
            .build()
    }

    #[test]
    fn test_submit_reconciles_against_entity() {
        let pipeline = pipeline();
        let first = pipeline.submit(member("A", 60.0, 6_000.0), None).unwrap();
        assert!(first.snapshot().is_some());
        // Alone in its group the share sum falls short, which is advisory.
        assert_eq!(first.overall_status(), OverallStatus::Passed);

        let second = pipeline.submit(member("B", 60.0, 6_000.0), None).unwrap();
        assert_eq!(second.overall_status(), OverallStatus::Failed);
        assert!(second
            .cross_entity_checks()
            .iter()
            .any(|c| c.rule_id == "XE-SUM-001" && !c.passed));
    }

    #[test]
    fn test_unkeyed_record_still_gets_result() {
        let pipeline = pipeline();
        let result = pipeline.submit(Record::default(), None).unwrap();
        assert_eq!(result.overall_status(), OverallStatus::Failed);
        assert!(result.snapshot().is_none());
        assert!(result.cross_entity_checks().is_empty());
        assert_eq!(pipeline.store().len(), 0);
    }

    #[test]
    fn test_malformed_json_not_stored() {
        let pipeline = pipeline();
        let result = pipeline.submit_json(r#"{"tax_year": 2024, "distributions": "x"}"#, None);
        assert!(matches!(result, Err(FRVEError::Schema(_))));
        assert!(pipeline.store().is_empty());
    }

    #[test]
    fn test_revalidate_supersedes() {
        let pipeline = pipeline();
        let first = pipeline.submit(member("A", 60.0, 6_000.0), None).unwrap();
        pipeline.submit(member("B", 60.0, 6_000.0), None).unwrap();

        let again = pipeline.revalidate(first.record_id(), None).unwrap();
        assert_eq!(again.revision(), 2);
        assert!(again.supersedes(&first));
        assert_eq!(again.overall_status(), OverallStatus::Failed);
        assert_eq!(pipeline.result(first.record_id()), Some(again));
        assert_eq!(first.revision(), 1);
    }

    #[test]
    fn test_batch_in_input_order() {
        let pipeline = pipeline();
        let results = pipeline
            .validate_batch(vec![
                (member("A", 60.0, 6_000.0), None),
                (member("B", 25.0, 2_500.0), Some(JudgmentInput::new(0.9, "consistent"))),
                (member("C", 15.0, 1_500.0), Some(JudgmentInput::new(0.2, "odd narrative"))),
            ])
            .unwrap();

        let ids: Vec<_> = results.iter().map(|r| r.record_id()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);

        assert_eq!(results[0].overall_status(), OverallStatus::Passed);
        assert_eq!(results[1].overall_status(), OverallStatus::Passed);
        assert_eq!(results[2].overall_status(), OverallStatus::Warnings);
        assert_eq!(pipeline.status_counts().get("passed"), Some(&2));
    }

    #[test]
    fn test_invalid_judgment_rejected_before_store() {
        let pipeline = pipeline();
        let result = pipeline.submit(member("A", 100.0, 1.0), Some(JudgmentInput::new(-0.1, "")));
        assert!(matches!(result, Err(FRVEError::Schema(_))));
        assert!(pipeline.store().is_empty());
    }

    #[test]
    fn test_log_collects_statuses() {
        let pipeline = pipeline();
        pipeline.submit(Record::default(), None).unwrap();
        let log = pipeline.take_log();
        assert!(!log.filter_by_level(LogLevel::Warn).is_empty());
        assert!(pipeline.take_log().is_empty());
    }
}
