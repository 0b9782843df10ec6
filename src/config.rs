//! Validator configuration
//!
//! Statutory limit tables, typical magnitude ranges and every tolerance the
//! rules and reconciler use. Loaded from TOML; any section left out falls
//! back to the reference defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::ConfigError;
use crate::record::{MonetaryField, ShareBasis};
use crate::types::{Severity, Version};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidatorConfig {
    /// Version stamped on every report produced by the standard registry
    pub registry_version: Version,
    /// Capped field name -> year-indexed limit table
    pub limits: BTreeMap<String, LimitTable>,
    /// Field name -> typical range; outside values are advisory
    pub magnitude: BTreeMap<String, MagnitudeRange>,
    pub tolerances: RuleTolerances,
    pub shares: SharePolicy,
    pub reconciliation: ReconciliationConfig,
    pub combiner: CombinerConfig,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        let mut limits = BTreeMap::new();
        limits.insert(
            MonetaryField::Section179Deduction.name().to_string(),
            LimitTable::section_179(),
        );

        let magnitude = default_magnitudes()
            .into_iter()
            .map(|(field, min, max)| (field.name().to_string(), MagnitudeRange { min, max }))
            .collect();

        Self {
            registry_version: Version::new(1, 0, 0),
            limits,
            magnitude,
            tolerances: RuleTolerances::default(),
            shares: SharePolicy::default(),
            reconciliation: ReconciliationConfig::default(),
            combiner: CombinerConfig::default(),
        }
    }
}

impl ValidatorConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: ValidatorConfig = toml::from_str(source).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            reason: format!("{}: {}", path.display(), e),
        })?;
        Self::from_toml_str(&source)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })
    }

    /// Check every table and tolerance
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, table) in &self.limits {
            let field = field_by_name(name, "limits")?;
            if !field.sign_policy().requires_non_negative() {
                return Err(invalid(
                    format!("limits.{}", name),
                    "only non-negative fields can carry a statutory limit",
                ));
            }
            table.validate(name)?;
        }

        for (name, range) in &self.magnitude {
            field_by_name(name, "magnitude")?;
            if !(range.min <= range.max) {
                return Err(invalid(
                    format!("magnitude.{}", name),
                    format!("min {} exceeds max {}", range.min, range.max),
                ));
            }
        }

        self.tolerances.validate()?;
        self.reconciliation.validate()?;
        self.combiner.validate()?;
        Ok(())
    }

    /// Limit table for a capped field
    pub fn limit_table(&self, field: MonetaryField) -> Option<&LimitTable> {
        self.limits.get(field.name())
    }

    /// Fields that carry a statutory limit table, in schema order
    pub fn capped_fields(&self) -> Vec<MonetaryField> {
        MonetaryField::ALL
            .iter()
            .copied()
            .filter(|f| self.limits.contains_key(f.name()))
            .collect()
    }

    pub fn magnitude_range(&self, field: MonetaryField) -> Option<MagnitudeRange> {
        self.magnitude.get(field.name()).copied()
    }

    /// Replace the limit table for one field
    pub fn with_limit_table(mut self, field: MonetaryField, table: LimitTable) -> Self {
        self.limits.insert(field.name().to_string(), table);
        self
    }
}

fn field_by_name(name: &str, section: &str) -> Result<MonetaryField, ConfigError> {
    MonetaryField::ALL
        .iter()
        .copied()
        .find(|f| f.name() == name)
        .ok_or_else(|| invalid(format!("{}.{}", section, name), "unknown monetary field"))
}

fn invalid(key: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key: key.into(),
        reason: reason.into(),
    }
}

fn check_fraction(key: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(key, format!("{} must be within [0, 1]", value)))
    }
}

fn check_non_negative(key: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(key, format!("{} must be a non-negative number", value)))
    }
}

// ---------------------------------------------------------------------------
// Limit tables
// ---------------------------------------------------------------------------

/// Year-indexed statutory limit. Years not in the table use `fallback`; with
/// no fallback the cap rule does not apply to that year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitTable {
    #[serde(default)]
    pub by_period: BTreeMap<String, f64>,
    #[serde(default)]
    pub fallback: Option<f64>,
}

impl LimitTable {
    pub fn new(fallback: Option<f64>) -> Self {
        Self {
            by_period: BTreeMap::new(),
            fallback,
        }
    }

    pub fn with_limit(mut self, year: u16, limit: f64) -> Self {
        self.by_period.insert(year.to_string(), limit);
        self
    }

    /// Reference section 179 limits, 2020-2025
    pub fn section_179() -> Self {
        LimitTable::new(Some(1_250_000.0))
            .with_limit(2020, 1_040_000.0)
            .with_limit(2021, 1_050_000.0)
            .with_limit(2022, 1_080_000.0)
            .with_limit(2023, 1_160_000.0)
            .with_limit(2024, 1_220_000.0)
            .with_limit(2025, 1_250_000.0)
    }

    /// Limit in force for a period
    pub fn limit_for(&self, year: Option<u16>) -> Option<f64> {
        year.and_then(|y| self.by_period.get(&y.to_string()).copied())
            .or(self.fallback)
    }

    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        for (period, limit) in &self.by_period {
            if period.len() != 4 || !period.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid(
                    format!("limits.{}.by_period.{}", name, period),
                    "period keys must be four-digit years",
                ));
            }
            check_non_negative(&format!("limits.{}.by_period.{}", name, period), *limit)?;
        }
        if let Some(fallback) = self.fallback {
            check_non_negative(&format!("limits.{}.fallback", name), fallback)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Magnitudes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MagnitudeRange {
    pub min: f64,
    pub max: f64,
}

impl MagnitudeRange {
    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }
}

fn default_magnitudes() -> Vec<(MonetaryField, f64, f64)> {
    vec![
        (MonetaryField::OrdinaryBusinessIncome, -50_000_000.0, 100_000_000.0),
        (MonetaryField::RentalRealEstateIncome, -20_000_000.0, 20_000_000.0),
        (MonetaryField::GuaranteedPayments, 0.0, 5_000_000.0),
        (MonetaryField::InterestIncome, 0.0, 10_000_000.0),
        (MonetaryField::OrdinaryDividends, 0.0, 50_000_000.0),
        (MonetaryField::QualifiedDividends, 0.0, 50_000_000.0),
        (MonetaryField::ShortTermCapitalGains, -50_000_000.0, 100_000_000.0),
        (MonetaryField::LongTermCapitalGains, -50_000_000.0, 500_000_000.0),
        (MonetaryField::Section179Deduction, 0.0, 1_500_000.0),
        (MonetaryField::Distributions, 0.0, 100_000_000.0),
        (MonetaryField::CapitalAccountBeginning, -50_000_000.0, 500_000_000.0),
        (MonetaryField::CapitalAccountEnding, -50_000_000.0, 500_000_000.0),
        (MonetaryField::SelfEmploymentEarnings, -10_000_000.0, 10_000_000.0),
        (MonetaryField::ForeignTaxesPaid, 0.0, 1_000_000.0),
        (MonetaryField::QbiDeduction, -50_000_000.0, 100_000_000.0),
    ]
}

// ---------------------------------------------------------------------------
// Single-record tolerances
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuleTolerances {
    /// Running-balance reconstruction: relative share of |actual ending|
    pub balance_relative: f64,
    pub balance_floor: f64,
    /// Unexplained balance change beyond this multiple of the account size
    pub balance_directional_multiple: f64,
    /// General roles: self-employment vs trade income + compensation
    pub general_se_relative: f64,
    pub general_se_floor: f64,
    /// Limited roles: self-employment may exceed compensation by this much
    pub limited_se_absolute: f64,
    pub qbi_relative: f64,
    pub qbi_floor: f64,
    /// Capped deduction beyond this multiple of positive trade income
    pub capped_deduction_income_multiple: f64,
}

impl Default for RuleTolerances {
    fn default() -> Self {
        Self {
            balance_relative: 0.25,
            balance_floor: 10_000.0,
            balance_directional_multiple: 2.0,
            general_se_relative: 0.15,
            general_se_floor: 1_000.0,
            limited_se_absolute: 100.0,
            qbi_relative: 0.25,
            qbi_floor: 5_000.0,
            capped_deduction_income_multiple: 5.0,
        }
    }
}

impl RuleTolerances {
    fn validate(&self) -> Result<(), ConfigError> {
        check_fraction("tolerances.balance_relative", self.balance_relative)?;
        check_non_negative("tolerances.balance_floor", self.balance_floor)?;
        check_non_negative(
            "tolerances.balance_directional_multiple",
            self.balance_directional_multiple,
        )?;
        check_fraction("tolerances.general_se_relative", self.general_se_relative)?;
        check_non_negative("tolerances.general_se_floor", self.general_se_floor)?;
        check_non_negative("tolerances.limited_se_absolute", self.limited_se_absolute)?;
        check_fraction("tolerances.qbi_relative", self.qbi_relative)?;
        check_non_negative("tolerances.qbi_floor", self.qbi_floor)?;
        check_non_negative(
            "tolerances.capped_deduction_income_multiple",
            self.capped_deduction_income_multiple,
        )
    }
}

// ---------------------------------------------------------------------------
// Share policy
// ---------------------------------------------------------------------------

/// How share percentages are interpreted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SharePolicy {
    /// Severity for a share of exactly zero; unset means zero is valid
    pub zero_share_severity: Option<Severity>,
    /// Basis summed by the percentage-sum check
    pub sum_basis: ShareBasis,
    /// Basis income proportionality and outliers are measured against
    pub income_basis: ShareBasis,
    /// Basis ending balances are measured against
    pub balance_basis: ShareBasis,
}

impl Default for SharePolicy {
    fn default() -> Self {
        Self {
            zero_share_severity: None,
            sum_basis: ShareBasis::Profit,
            income_basis: ShareBasis::Profit,
            balance_basis: ShareBasis::Capital,
        }
    }
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconciliationConfig {
    /// Slack around 100 for the percentage-sum check
    pub sum_epsilon: f64,
    /// Relative deviation allowed on income shares
    pub income_tolerance: f64,
    /// Absolute deviation allowed on ending-balance shares
    pub balance_tolerance: f64,
    /// Minimum bigram similarity for entity names to count as the same
    pub name_similarity: f64,
    /// Largest prior-ending vs current-beginning gap treated as rounding
    pub continuity_tolerance: f64,
    pub outlier_mad_multiple: f64,
    pub outlier_min_group: usize,
    /// Deviations below this fraction of |median| are never outliers
    pub outlier_relative_floor: f64,
    /// Group distributions beyond this multiple of group income
    pub distribution_income_multiple: f64,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            sum_epsilon: 0.01,
            income_tolerance: 0.10,
            balance_tolerance: 0.15,
            name_similarity: 0.85,
            continuity_tolerance: 0.01,
            outlier_mad_multiple: 3.0,
            outlier_min_group: 3,
            outlier_relative_floor: 0.01,
            distribution_income_multiple: 3.0,
        }
    }
}

impl ReconciliationConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        check_non_negative("reconciliation.sum_epsilon", self.sum_epsilon)?;
        check_fraction("reconciliation.income_tolerance", self.income_tolerance)?;
        check_fraction("reconciliation.balance_tolerance", self.balance_tolerance)?;
        check_fraction("reconciliation.name_similarity", self.name_similarity)?;
        check_non_negative("reconciliation.continuity_tolerance", self.continuity_tolerance)?;
        check_non_negative("reconciliation.outlier_mad_multiple", self.outlier_mad_multiple)?;
        if self.outlier_min_group < 3 {
            return Err(invalid(
                "reconciliation.outlier_min_group",
                "median/MAD needs at least 3 records",
            ));
        }
        check_fraction("reconciliation.outlier_relative_floor", self.outlier_relative_floor)?;
        check_non_negative(
            "reconciliation.distribution_income_multiple",
            self.distribution_income_multiple,
        )
    }
}

// ---------------------------------------------------------------------------
// Combiner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CombinerConfig {
    /// Coherence scores below this downgrade a clean result to warnings
    pub coherence_threshold: f64,
}

impl Default for CombinerConfig {
    fn default() -> Self {
        Self {
            coherence_threshold: 0.5,
        }
    }
}

impl CombinerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        check_fraction("combiner.coherence_threshold", self.coherence_threshold)
    }
}
