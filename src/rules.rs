//! Rule registry and versioning
//!
//! A registry is an explicit, ordered table of single-record rules. It is
//! built once, then injected into an [`Evaluator`](crate::evaluator::Evaluator);
//! any number of registries with different configurations can coexist.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::RuleError;
use crate::record::{MonetaryField, Record};
use crate::types::{RuleCheck, Severity, Version};

/// A single-record rule.
///
/// `evaluate` is total: when the fields a rule needs are absent it returns a
/// passed, not-applicable check rather than skipping the record.
pub trait Rule: Send + Sync {
    fn descriptor(&self) -> &RuleDescriptor;

    fn evaluate(&self, record: &Record) -> RuleCheck;

    fn id(&self) -> &str {
        &self.descriptor().id
    }
}

/// Identity of a rule and the fields it inspects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDescriptor {
    pub id: String,
    pub name: String,
    pub severity: Severity,
    pub fields: Vec<String>,
}

impl RuleDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, severity: Severity) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            severity,
            fields: Vec::new(),
        }
    }

    /// Inspects a non-monetary attribute
    pub fn with_attribute(mut self, attribute: &str) -> Self {
        self.fields.push(attribute.to_string());
        self
    }

    pub fn with_field(mut self, field: MonetaryField) -> Self {
        self.fields.push(field.name().to_string());
        self
    }

    pub fn with_fields(mut self, fields: &[MonetaryField]) -> Self {
        self.fields.extend(fields.iter().map(|f| f.name().to_string()));
        self
    }

    pub fn pass(&self) -> RuleCheck {
        self.check(true, true, String::new())
    }

    /// Inputs absent: passes vacuously
    pub fn not_applicable(&self) -> RuleCheck {
        self.check(true, false, String::new())
    }

    pub fn fail(&self, message: impl Into<String>) -> RuleCheck {
        self.check(false, true, message.into())
    }

    /// Pass when `ok`, otherwise fail with the lazily built message
    pub fn outcome(&self, ok: bool, message: impl FnOnce() -> String) -> RuleCheck {
        if ok {
            self.pass()
        } else {
            self.fail(message())
        }
    }

    fn check(&self, passed: bool, applicable: bool, message: String) -> RuleCheck {
        RuleCheck {
            rule_id: self.id.clone(),
            rule_name: self.name.clone(),
            severity: self.severity,
            passed,
            applicable,
            message,
            fields_involved: self.fields.clone(),
        }
    }
}

/// Rule backed by a closure, for rules registered outside the standard
/// catalog
pub struct FnRule<F> {
    descriptor: RuleDescriptor,
    check: F,
}

impl<F> FnRule<F>
where
    F: Fn(&RuleDescriptor, &Record) -> RuleCheck + Send + Sync,
{
    pub fn new(descriptor: RuleDescriptor, check: F) -> Self {
        Self { descriptor, check }
    }
}

impl<F> Rule for FnRule<F>
where
    F: Fn(&RuleDescriptor, &Record) -> RuleCheck + Send + Sync,
{
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn evaluate(&self, record: &Record) -> RuleCheck {
        (self.check)(&self.descriptor, record)
    }
}

/// Metadata about a registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryMetadata {
    pub name: String,
    pub description: String,
    pub author: Option<String>,
}

impl RegistryMetadata {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            author: None,
        }
    }
}

/// Versioned, ordered table of rules. Rule ids are unique.
pub struct RuleRegistry {
    version: Version,
    metadata: RegistryMetadata,
    rules: Vec<Box<dyn Rule>>,
    ids: HashSet<String>,
}

impl RuleRegistry {
    /// Create an empty registry
    pub fn new(version: Version, metadata: RegistryMetadata) -> Self {
        Self {
            version,
            metadata,
            rules: Vec::new(),
            ids: HashSet::new(),
        }
    }

    /// Append a rule; its check is reported after every rule registered
    /// before it
    pub fn register<R: Rule + 'static>(&mut self, rule: R) -> Result<(), RuleError> {
        self.register_boxed(Box::new(rule))
    }

    pub fn register_boxed(&mut self, rule: Box<dyn Rule>) -> Result<(), RuleError> {
        let descriptor = rule.descriptor();
        if descriptor.id.trim().is_empty() {
            return Err(RuleError::RegistrationFailed {
                reason: format!("rule '{}' has an empty id", descriptor.name),
            });
        }
        if self.ids.contains(&descriptor.id) {
            return Err(RuleError::DuplicateRule {
                rule_id: descriptor.id.clone(),
            });
        }

        self.ids.insert(descriptor.id.clone());
        self.rules.push(rule);
        Ok(())
    }

    /// Builder-style `register`
    pub fn with_rule<R: Rule + 'static>(mut self, rule: R) -> Result<Self, RuleError> {
        self.register(rule)?;
        Ok(self)
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn metadata(&self) -> &RegistryMetadata {
        &self.metadata
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn contains(&self, rule_id: &str) -> bool {
        self.ids.contains(rule_id)
    }

    pub fn get(&self, rule_id: &str) -> Option<&dyn Rule> {
        self.rules
            .iter()
            .find(|r| r.id() == rule_id)
            .map(|r| r.as_ref())
    }

    /// Rules in registration order
    pub fn rules(&self) -> impl Iterator<Item = &dyn Rule> {
        self.rules.iter().map(|r| r.as_ref())
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &RuleDescriptor> {
        self.rules.iter().map(|r| r.descriptor())
    }

    pub fn is_compatible_with(&self, other: &Version) -> bool {
        self.version.is_compatible_with(other)
    }
}

impl fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("version", &self.version)
            .field("metadata", &self.metadata)
            .field("rules", &self.rules.iter().map(|r| r.id()).collect::<Vec<_>>())
            .finish()
    }
}
