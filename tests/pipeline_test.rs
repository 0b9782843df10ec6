//! End-to-end tests: configuration file, pipeline, combiner and codecs

use chrono::{TimeZone, Utc};
use frve::{
    BincodeCodec, CombinedResult, ConfigError, CorpusGenerator, CorpusShape, FRVEError, Fault,
    JsonCodec, JudgmentInput, LogLevel, MonetaryField, OverallStatus, Record, ReportCodec,
    ReportComparator, ResultCombiner, Role, ValidationContext, ValidationPipeline,
    ValidatorConfig,
};
use proptest::prelude::*;
use std::io::Write;

fn context() -> ValidationContext {
    ValidationContext::builder()
        .with_time(Utc.with_ymd_and_hms(2025, 4, 15, 12, 0, 0).unwrap())
        .with_run_id("integration")
        .build()
}

fn pipeline_with(config: ValidatorConfig) -> ValidationPipeline {
    ValidationPipeline::builder()
        .with_config(config)
        .with_context(context())
        .with_log_level(LogLevel::Debug)
        .build()
        .unwrap()
}

const RECORD_JSON: &str = r#"{
    "tax_year": "2024",
    "partnership_ein": "12-3456789",
    "partnership_name": "Granite Peak Partners LP",
    "partner_tin": "123-45-6789",
    "partner_type": "Limited Partner",
    "entity_type": "Individual",
    "partner_share_percentage": 100.0,
    "ordinary_business_income": 40000.0,
    "interest_income": 1200.0,
    "distributions": 10000.0,
    "capital_account_beginning": 250000.0,
    "capital_account_ending": 281200.0
}"#;

#[test]
fn test_config_loaded_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
        [reconciliation]
        income_tolerance = 0.2
        name_similarity = 0.9

        [combiner]
        coherence_threshold = 0.8
        "#
    )
    .unwrap();

    let config = ValidatorConfig::from_path(file.path()).unwrap();
    assert_eq!(config.reconciliation.income_tolerance, 0.2);
    assert_eq!(config.combiner.coherence_threshold, 0.8);

    let pipeline = pipeline_with(config);
    let result = pipeline
        .submit_json(RECORD_JSON, Some(JudgmentInput::new(0.75, "plausible")))
        .unwrap();
    assert_eq!(result.overall_status(), OverallStatus::Warnings);
}

#[test]
fn test_missing_and_invalid_config_files() {
    let dir = tempfile::tempdir().unwrap();
    let missing = ValidatorConfig::from_path(dir.path().join("absent.toml"));
    assert!(matches!(missing, Err(ConfigError::Io { .. })));

    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[reconciliation]\noutlier_min_group = 1\n").unwrap();
    assert!(matches!(
        ValidatorConfig::from_path(&path),
        Err(ConfigError::Invalid { .. })
    ));

    std::fs::write(&path, "[combiner]\nthreshold = 0.5\n").unwrap();
    assert!(matches!(
        ValidatorConfig::from_path(&path),
        Err(ConfigError::Parse { .. })
    ));
}

#[test]
fn test_json_record_passes_end_to_end() {
    let pipeline = pipeline_with(ValidatorConfig::default());
    let result = pipeline.submit_json(RECORD_JSON, None).unwrap();

    assert_eq!(result.overall_status(), OverallStatus::Passed);
    assert_eq!(result.coherence_score(), None);
    assert_eq!(result.validated_at(), context().now());
    assert!(result.snapshot().is_some());
    assert_eq!(result.composite_key().map(|k| k.period), Some(2024));
}

#[test]
fn test_faulty_corpus_surfaces_failures() {
    let mut generator = CorpusGenerator::new(99);
    let mut records = generator.corpus(&CorpusShape::default());
    let injected = generator
        .inject(&mut records, Fault::ContinuityBreak { delta: 60_315.0 })
        .unwrap();

    let pipeline = pipeline_with(ValidatorConfig::default());
    let results = pipeline
        .validate_batch(records.into_iter().map(|r| (r, None)).collect())
        .unwrap();

    let broken = &results[injected.index];
    assert_eq!(broken.overall_status(), OverallStatus::Failed);
    assert!(broken
        .cross_entity_checks()
        .iter()
        .any(|c| c.rule_id == "XE-CONT-001" && !c.passed));

    let log = pipeline.take_log();
    assert!(!log.filter_by_record(broken.record_id()).is_empty());
}

#[test]
fn test_results_survive_codecs() {
    let pipeline = pipeline_with(ValidatorConfig::default());
    let result = pipeline.submit_json(RECORD_JSON, Some(JudgmentInput::new(0.9, "ok"))).unwrap();

    let json = JsonCodec::new_pretty();
    let decoded: CombinedResult = json.decode(&json.encode(&result).unwrap()).unwrap();
    assert_eq!(decoded, result);

    let text = json.to_string(&result).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["overall_status"], "passed");
    assert_eq!(value["judgment"]["coherence_score"], 0.9);

    let bincode = BincodeCodec::new();
    let decoded: CombinedResult = bincode.decode(&bincode.encode(&result).unwrap()).unwrap();
    assert!(ReportComparator::new().compare_results(&result, &decoded).are_identical());
}

#[test]
fn test_submission_errors() {
    let pipeline = pipeline_with(ValidatorConfig::default());
    assert!(matches!(
        pipeline.submit_json("{", None),
        Err(FRVEError::Schema(_))
    ));
    assert!(matches!(
        pipeline.revalidate(frve::RecordId(404), None),
        Err(FRVEError::Store(_))
    ));
}

fn arbitrary_severity_failures() -> impl Strategy<Value = (bool, bool, bool)> {
    (any::<bool>(), any::<bool>(), any::<bool>())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// **Property: Status Precedence**
    /// Critical failures dominate; then warnings or a low coherence score;
    /// advisory failures and a missing score never change the status.
    #[test]
    fn property_status_precedence(
        (critical, warning, advisory) in arbitrary_severity_failures(),
        score in prop::option::of(0.0f64..=1.0),
    ) {
        let mut record = Record::builder()
            .period("2024")
            .entity("12-3456789", "Granite Peak Partners LP")
            .sub_entity("123-45-6789")
            .role(Role::LimitedParticipant)
            .share(100.0)
            .build();
        if critical {
            record.set_amount(MonetaryField::Distributions, Some(-1.0));
        }
        if warning {
            record.set_amount(MonetaryField::ForeignTaxesPaid, Some(250.0));
        }
        if advisory {
            record.set_amount(MonetaryField::CapitalAccountBeginning, Some(600_000_000.0));
        }

        let pipeline = pipeline_with(ValidatorConfig::default());
        let judgment = score.map(|s| JudgmentInput::new(s, "generated"));
        let result = pipeline.submit(record, judgment).unwrap();

        let report = result.report();
        prop_assert_eq!(report.critical_count() > 0, critical);
        prop_assert_eq!(report.warning_count() > 0, warning);

        let threshold = ResultCombiner::default().coherence_threshold();
        let expected = if critical {
            OverallStatus::Failed
        } else if warning || score.map_or(false, |s| s < threshold) {
            OverallStatus::Warnings
        } else {
            OverallStatus::Passed
        };
        prop_assert_eq!(result.overall_status(), expected);
        prop_assert_eq!(report.advisory_count() > 0, advisory || critical);
    }

    /// **Property: Re-validation Is Idempotent**
    /// Re-validating unchanged input gives the same content under a higher
    /// revision.
    #[test]
    fn property_revalidation_idempotent(seed in any::<u64>()) {
        let pipeline = pipeline_with(ValidatorConfig::default());
        let shape = CorpusShape { entities: 1, ..CorpusShape::default() };
        let records = CorpusGenerator::new(seed).corpus(&shape);
        let first = pipeline
            .validate_batch(records.into_iter().map(|r| (r, None)).collect())
            .unwrap();

        let comparator = ReportComparator::new();
        for result in first {
            let again = pipeline.revalidate(result.record_id(), None).unwrap();
            prop_assert!(again.supersedes(&result));
            prop_assert!(comparator.compare_results(&result, &again).are_identical());
        }
    }
}
