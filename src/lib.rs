//! Financial Record Validation Engine (FRVE)
//!
//! Validates per-recipient tax records in two deterministic layers: a
//! versioned registry of single-record rules, and a reconciler that checks
//! records against each other (same-period groups, consecutive periods of
//! one relationship, and revisions under one composite key). A combiner
//! fuses both layers, plus an optional externally computed coherence score,
//! into one overall status per record.

pub mod catalog;
pub mod combiner;
pub mod comparison;
pub mod config;
pub mod context;
pub mod error;
pub mod evaluator;
pub mod hasher;
pub mod logging;
pub mod pipeline;
pub mod reconciler;
pub mod record;
pub mod rules;
pub mod serialization;
pub mod stats;
pub mod store;
pub mod synthetic;
pub mod types;

// Re-export core types and traits
pub use catalog::standard_registry;
pub use combiner::{CombineInput, ResultCombiner};
pub use comparison::{ReportComparator, ReportComparison, ResultComparison};
pub use config::{
    CombinerConfig, LimitTable, MagnitudeRange, ReconciliationConfig, RuleTolerances, SharePolicy,
    ValidatorConfig,
};
pub use context::{DeterministicTime, ValidationContext, ValidationContextBuilder};
pub use error::{ConfigError, FRVEError, RuleError, SchemaError, SerializationError, StoreError};
pub use evaluator::Evaluator;
pub use hasher::RecordHasher;
pub use logging::{LogEntry, LogLevel, ValidationLog};
pub use pipeline::{ValidationPipeline, ValidationPipelineBuilder};
pub use reconciler::Reconciler;
pub use record::{MonetaryField, RecipientKind, Record, RecordBuilder, Role, ShareBasis};
pub use rules::{FnRule, RegistryMetadata, Rule, RuleDescriptor, RuleRegistry};
pub use serialization::{BincodeCodec, JsonCodec, ReportCodec};
pub use store::{EntityStore, RecordAccessor, StoreSnapshot, StoredRecord};
pub use synthetic::{CorpusGenerator, CorpusShape, Fault};
pub use types::{
    CheckScope, CombinedResult, CompositeKey, ContinuityKey, CrossEntityCheck, EntityGroupKey,
    JudgmentInput, OverallStatus, RecordId, ReconciliationReport, RuleCheck, Severity,
    SnapshotHash, ValidationReport, Version,
};
