//! Partnership Review Example
//!
//! This example demonstrates:
//! - Loading a validator configuration from TOML
//! - Validating a synthetic multi-year partnership corpus in one batch
//! - Injected faults surfacing as cross-entity failures
//! - Re-validation after an amended record arrives
//! - Exporting combined results as JSON

use chrono::{TimeZone, Utc};

use frve::{
    CorpusGenerator, CorpusShape, Fault, JsonCodec, JudgmentInput, OverallStatus, ReportComparator,
    ValidationContext, ValidationPipeline, ValidatorConfig,
};

const CONFIG: &str = r#"
[reconciliation]
income_tolerance = 0.10
name_similarity = 0.85

[combiner]
coherence_threshold = 0.6
"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Partnership Review Example ===\n");

    let config = ValidatorConfig::from_toml_str(CONFIG)?;
    let context = ValidationContext::builder()
        .with_time(Utc.with_ymd_and_hms(2025, 4, 15, 9, 0, 0).unwrap())
        .with_run_id("partnership-review")
        .build();
    let pipeline = ValidationPipeline::builder()
        .with_config(config)
        .with_context(context)
        .build()?;

    let shape = CorpusShape {
        entities: 2,
        members: 3,
        periods: 2,
        first_period: 2023,
    };
    let mut generator = CorpusGenerator::new(2025);
    let mut records = generator.corpus(&shape);

    println!("Injected faults:");
    for fault in [
        Fault::DuplicateIngest,
        Fault::ContinuityBreak { delta: 60_315.0 },
        Fault::DisproportionateIncome { factor: 5.0 },
    ] {
        if let Some(injected) = generator.inject(&mut records, fault) {
            println!("  {:?} at record #{}", injected.fault, injected.index);
        }
    }
    println!();

    let batch = records
        .into_iter()
        .enumerate()
        .map(|(i, record)| {
            let judgment =
                (i % 4 == 0).then(|| JudgmentInput::new(0.55, "narrative partly consistent"));
            (record, judgment)
        })
        .collect();
    let results = pipeline.validate_batch(batch)?;

    println!("=== Results ===");
    for result in &results {
        let failing: Vec<&str> = result
            .report()
            .failures()
            .map(|c| c.rule_id.as_str())
            .chain(
                result
                    .cross_entity_checks()
                    .iter()
                    .filter(|c| !c.passed)
                    .map(|c| c.rule_id.as_str()),
            )
            .collect();
        let key = result
            .composite_key()
            .map_or_else(|| "unkeyed".to_string(), |k| k.to_string());
        println!(
            "  {} {:<32} {:<8} {}",
            result.record_id(),
            key,
            result.overall_status(),
            failing.join(", ")
        );
    }
    println!();

    println!("Status counts: {:?}\n", pipeline.status_counts());

    let reconciliation = pipeline.reconcile_all();
    println!("=== Cross-entity failures ===");
    for check in reconciliation.failures() {
        println!("  [{}] {} {}: {}", check.severity, check.rule_id, check.scope, check.message);
    }
    println!();

    if let Some(failed) = results
        .iter()
        .find(|r| r.overall_status() == OverallStatus::Failed)
    {
        let again = pipeline.revalidate(failed.record_id(), None)?;
        let comparison = ReportComparator::new().compare_results(failed, &again);
        println!(
            "Re-validated {}: revision {} -> {}, identical content: {}\n",
            failed.record_id(),
            failed.revision(),
            again.revision(),
            comparison.are_identical()
        );

        println!("=== JSON export ===");
        println!("{}", JsonCodec::new_pretty().to_string(&again)?);
    }

    Ok(())
}
