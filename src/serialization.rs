//! Pluggable codecs for validation output
//!
//! JSON is the wire contract for downstream report consumers; bincode is a
//! compact archival format for results kept alongside the store.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::SerializationError;

/// Trait for pluggable output serialization
pub trait ReportCodec: Send + Sync {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, SerializationError>;

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, SerializationError>;

    fn name(&self) -> &str;

    fn version(&self) -> &str;
}

/// Bincode backend
#[derive(Debug, Clone, Default)]
pub struct BincodeCodec;

impl BincodeCodec {
    pub fn new() -> Self {
        Self
    }
}

impl ReportCodec for BincodeCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, SerializationError> {
        bincode::serialize(value).map_err(|e| SerializationError::SerializationFailed {
            reason: format!("Bincode serialization failed: {}", e),
        })
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, SerializationError> {
        bincode::deserialize(bytes).map_err(|e| SerializationError::DeserializationFailed {
            reason: format!("Bincode deserialization failed: {}", e),
        })
    }

    fn name(&self) -> &str {
        "bincode"
    }

    fn version(&self) -> &str {
        "1.3"
    }
}

/// JSON backend
#[derive(Debug, Clone, Default)]
pub struct JsonCodec {
    pretty: bool,
}

impl JsonCodec {
    pub fn new() -> Self {
        Self { pretty: false }
    }

    pub fn new_pretty() -> Self {
        Self { pretty: true }
    }

    /// Encode straight to a string
    pub fn to_string<T: Serialize>(&self, value: &T) -> Result<String, SerializationError> {
        let result = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        result.map_err(|e| SerializationError::SerializationFailed {
            reason: format!("JSON serialization failed: {}", e),
        })
    }
}

impl ReportCodec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, SerializationError> {
        self.to_string(value).map(String::into_bytes)
    }

    fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, SerializationError> {
        serde_json::from_slice(bytes).map_err(|e| SerializationError::DeserializationFailed {
            reason: format!("JSON deserialization failed: {}", e),
        })
    }

    fn name(&self) -> &str {
        "json"
    }

    fn version(&self) -> &str {
        "1.0"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RuleCheck, Severity, ValidationReport, Version};

    fn report() -> ValidationReport {
        ValidationReport::from_checks(
            Version::new(1, 0, 0),
            vec![RuleCheck {
                rule_id: "SUBSET-qualified_dividends".to_string(),
                rule_name: "qualified_dividends <= ordinary_dividends".to_string(),
                severity: Severity::Critical,
                passed: false,
                applicable: true,
                message: "qualified_dividends (5000.00) exceeds ordinary_dividends (4000.00)"
                    .to_string(),
                fields_involved: vec![
                    "qualified_dividends".to_string(),
                    "ordinary_dividends".to_string(),
                ],
            }],
        )
    }

    #[test]
    fn test_json_wire_shape() {
        let text = JsonCodec::new().to_string(&report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["critical_count"], 1);
        assert_eq!(value["passed"], false);
        assert_eq!(value["checks"][0]["severity"], "critical");
        assert_eq!(value["checks"][0]["fields_involved"][1], "ordinary_dividends");
    }

    #[test]
    fn test_bincode_codec_decodes_report() {
        let codec = BincodeCodec::new();
        let bytes = codec.encode(&report()).unwrap();
        let decoded: ValidationReport = codec.decode(&bytes).unwrap();
        assert_eq!(decoded.critical_count(), 1);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let result: Result<ValidationReport, _> = JsonCodec::new().decode(b"{not json");
        assert!(matches!(result, Err(SerializationError::DeserializationFailed { .. })));
    }
}
