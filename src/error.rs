//! Error types for the FRVE
//!
//! Rule findings are never errors. These types cover the cases where no
//! complete report can be produced at all: malformed input, bad
//! configuration, registry construction and store indexing failures.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FRVEError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Rule error: {0}")]
    Rule(#[from] RuleError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),
}

/// Structural rejection of an input before any rule runs
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Malformed record: {reason}")]
    Malformed { reason: String },

    #[error("Invalid judgment input: {reason}")]
    InvalidJudgment { reason: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config parse failed: {reason}")]
    Parse { reason: String },

    #[error("Invalid config value for {key}: {reason}")]
    Invalid { key: String, reason: String },

    #[error("Config IO error: {reason}")]
    Io { reason: String },
}

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("Duplicate rule id: {rule_id}")]
    DuplicateRule { rule_id: String },

    #[error("Rule registration failed: {reason}")]
    RegistrationFailed { reason: String },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record cannot be indexed: missing {key}")]
    MissingKey { key: String },

    #[error("Unknown record: {record_id}")]
    UnknownRecord { record_id: u64 },
}

#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("Serialization failed: {reason}")]
    SerializationFailed { reason: String },

    #[error("Deserialization failed: {reason}")]
    DeserializationFailed { reason: String },
}
