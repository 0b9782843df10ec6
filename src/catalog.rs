//! Standard single-record rule catalog
//!
//! Every rule is a field selector plus a constraint. Thresholds and limit
//! tables come from [`ValidatorConfig`]; nothing here is keyed by a field
//! name looked up at runtime.

use crate::config::{LimitTable, MagnitudeRange, RuleTolerances, ValidatorConfig};
use crate::error::RuleError;
use crate::record::{FieldCategory, MonetaryField, Record, ShareBasis};
use crate::rules::{RegistryMetadata, Rule, RuleDescriptor, RuleRegistry};
use crate::types::{RuleCheck, Severity};

const TRADE_INCOME: MonetaryField = MonetaryField::OrdinaryBusinessIncome;
const COMPENSATION: MonetaryField = MonetaryField::GuaranteedPayments;
const SELF_EMPLOYMENT: MonetaryField = MonetaryField::SelfEmploymentEarnings;

/// (subset, superset) pairs: the qualified portion can never exceed the whole
pub const SUBSET_PAIRS: &[(MonetaryField, MonetaryField)] = &[(
    MonetaryField::QualifiedDividends,
    MonetaryField::OrdinaryDividends,
)];

/// Build the standard registry for a configuration.
///
/// Rule order is fixed: presence, format, share range, sign, subset, cap,
/// balance, role-conditional, plausibility, magnitude.
pub fn standard_registry(config: &ValidatorConfig) -> Result<RuleRegistry, RuleError> {
    let mut registry = RuleRegistry::new(
        config.registry_version.clone(),
        RegistryMetadata::new(
            "standard",
            "Presence, range, sign, subset, cap, balance, role and magnitude rules",
        ),
    );

    for attribute in RequiredAttribute::ALL {
        registry.register(PresenceRule::new(attribute))?;
    }
    registry.register(PeriodFormatRule::new())?;
    registry.register(RoleRecognitionRule::new())?;

    registry.register(ShareRangeRule::new())?;
    registry.register(ZeroShareRule::new(
        config.shares.zero_share_severity,
        config.shares.sum_basis,
    ))?;

    for field in MonetaryField::ALL {
        if field.sign_policy().requires_non_negative() {
            registry.register(SignRule::new(field))?;
        }
    }

    for &(subset, superset) in SUBSET_PAIRS {
        registry.register(SubsetRule::new(subset, superset))?;
        registry.register(SupersetPresenceRule::new(subset, superset))?;
    }

    for field in config.capped_fields() {
        if let Some(table) = config.limit_table(field) {
            registry.register(StatutoryCapRule::new(field, table.clone()))?;
        }
    }

    registry.register(BalanceReconciliationRule::new(&config.tolerances))?;
    registry.register(BalanceDirectionRule::new(&config.tolerances))?;

    registry.register(GeneralSelfEmploymentRule::new(&config.tolerances))?;
    registry.register(LimitedSelfEmploymentRule::new(&config.tolerances))?;
    registry.register(EntitySelfEmploymentRule::new())?;

    registry.register(QbiPlausibilityRule::new(&config.tolerances))?;
    registry.register(ForeignTaxContextRule::new())?;
    for field in config.capped_fields() {
        registry.register(CappedDeductionReasonablenessRule::new(
            field,
            config.tolerances.capped_deduction_income_multiple,
        ))?;
    }

    for field in MonetaryField::ALL {
        if let Some(range) = config.magnitude_range(field) {
            registry.register(MagnitudeRule::new(field, range))?;
        }
    }

    Ok(registry)
}

fn fields_in(category: FieldCategory) -> impl Iterator<Item = MonetaryField> {
    MonetaryField::ALL
        .into_iter()
        .filter(move |f| f.category() == category)
}

fn sum_present(record: &Record, fields: impl Iterator<Item = MonetaryField>) -> f64 {
    fields.filter_map(|f| record.amount(f)).sum()
}

fn income_total(record: &Record) -> f64 {
    sum_present(record, MonetaryField::ALL.into_iter().filter(|f| f.is_income()))
}

/// (beginning, ending) balance fields
fn balance_fields() -> (Vec<MonetaryField>, Vec<MonetaryField>) {
    (
        fields_in(FieldCategory::BalanceBeginning).collect(),
        fields_in(FieldCategory::BalanceEnding).collect(),
    )
}

fn balance_pair(record: &Record) -> Option<(f64, f64)> {
    let (beginning, ending) = balance_fields();
    let beginning = beginning.first().and_then(|f| record.amount(*f))?;
    let ending = ending.first().and_then(|f| record.amount(*f))?;
    Some((beginning, ending))
}

// ---------------------------------------------------------------------------
// Presence and format
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredAttribute {
    Period,
    EntityId,
    Role,
    EntityName,
}

impl RequiredAttribute {
    pub const ALL: [RequiredAttribute; 4] = [
        RequiredAttribute::Period,
        RequiredAttribute::EntityId,
        RequiredAttribute::Role,
        RequiredAttribute::EntityName,
    ];

    fn name(&self) -> &'static str {
        match self {
            RequiredAttribute::Period => "period",
            RequiredAttribute::EntityId => "entity_id",
            RequiredAttribute::Role => "role",
            RequiredAttribute::EntityName => "entity_name",
        }
    }

    fn rule_id(&self) -> &'static str {
        match self {
            RequiredAttribute::Period => "REQ-001",
            RequiredAttribute::EntityId => "REQ-002",
            RequiredAttribute::Role => "REQ-003",
            RequiredAttribute::EntityName => "REQ-004",
        }
    }

    fn is_present(&self, record: &Record) -> bool {
        let value = match self {
            RequiredAttribute::Period => record.period.as_deref(),
            RequiredAttribute::EntityId => record.entity_id.as_deref(),
            RequiredAttribute::Role => record.role_text.as_deref(),
            RequiredAttribute::EntityName => record.entity_name.as_deref(),
        };
        value.map_or(false, |v| !v.trim().is_empty())
    }
}

/// A required attribute must be non-empty
pub struct PresenceRule {
    descriptor: RuleDescriptor,
    attribute: RequiredAttribute,
}

impl PresenceRule {
    pub fn new(attribute: RequiredAttribute) -> Self {
        Self {
            descriptor: RuleDescriptor::new(
                attribute.rule_id(),
                format!("{} present", attribute.name()),
                Severity::Critical,
            )
            .with_attribute(attribute.name()),
            attribute,
        }
    }
}

impl Rule for PresenceRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn evaluate(&self, record: &Record) -> RuleCheck {
        self.descriptor.outcome(self.attribute.is_present(record), || {
            format!("{} is missing or empty", self.attribute.name())
        })
    }
}

/// A present period must be a four-digit year
pub struct PeriodFormatRule {
    descriptor: RuleDescriptor,
}

impl PeriodFormatRule {
    pub fn new() -> Self {
        Self {
            descriptor: RuleDescriptor::new(
                "FMT-001",
                "period is a four-digit year",
                Severity::Critical,
            )
            .with_attribute("period"),
        }
    }
}

impl Default for PeriodFormatRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for PeriodFormatRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn evaluate(&self, record: &Record) -> RuleCheck {
        match record.period.as_deref().map(str::trim) {
            None | Some("") => self.descriptor.not_applicable(),
            Some(period) => self.descriptor.outcome(record.period_year().is_some(), || {
                format!("period {:?} is not a four-digit year", period)
            }),
        }
    }
}

/// Present role text must map to a known role
pub struct RoleRecognitionRule {
    descriptor: RuleDescriptor,
}

impl RoleRecognitionRule {
    pub fn new() -> Self {
        Self {
            descriptor: RuleDescriptor::new("FMT-002", "role is recognized", Severity::Critical)
                .with_attribute("role"),
        }
    }
}

impl Default for RoleRecognitionRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for RoleRecognitionRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn evaluate(&self, record: &Record) -> RuleCheck {
        match record.role_text.as_deref().map(str::trim) {
            None | Some("") => self.descriptor.not_applicable(),
            Some(text) => self.descriptor.outcome(record.role.is_some(), || {
                format!("role {:?} does not map to a known role", text)
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Share percentages
// ---------------------------------------------------------------------------

fn present_shares(record: &Record) -> Vec<(&'static str, f64)> {
    [
        ("share_percentage", record.share_percentage),
        ("profit_share", record.shares.profit),
        ("loss_share", record.shares.loss),
        ("capital_share", record.shares.capital),
    ]
    .into_iter()
    .filter_map(|(label, value)| value.map(|v| (label, v)))
    .collect()
}

/// Every present share percentage lies in [0, 100]
pub struct ShareRangeRule {
    descriptor: RuleDescriptor,
}

impl ShareRangeRule {
    pub fn new() -> Self {
        Self {
            descriptor: RuleDescriptor::new(
                "RANGE-001",
                "share percentage in [0, 100]",
                Severity::Critical,
            )
            .with_attribute("share_percentage"),
        }
    }
}

impl Default for ShareRangeRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for ShareRangeRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn evaluate(&self, record: &Record) -> RuleCheck {
        let shares = present_shares(record);
        if shares.is_empty() {
            return self.descriptor.not_applicable();
        }

        let out_of_range: Vec<String> = shares
            .iter()
            .filter(|(_, v)| !(0.0..=100.0).contains(v))
            .map(|(label, v)| format!("{} = {}", label, v))
            .collect();

        self.descriptor.outcome(out_of_range.is_empty(), || {
            format!("outside [0, 100]: {}", out_of_range.join(", "))
        })
    }
}

/// Zero share: valid by default, flagged with the configured severity
/// otherwise
pub struct ZeroShareRule {
    descriptor: RuleDescriptor,
    flag: bool,
    basis: ShareBasis,
}

impl ZeroShareRule {
    pub fn new(severity: Option<Severity>, basis: ShareBasis) -> Self {
        Self {
            descriptor: RuleDescriptor::new(
                "RANGE-002",
                "zero share percentage",
                severity.unwrap_or(Severity::Advisory),
            )
            .with_attribute("share_percentage"),
            flag: severity.is_some(),
            basis,
        }
    }
}

impl Rule for ZeroShareRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn evaluate(&self, record: &Record) -> RuleCheck {
        match record.share(self.basis) {
            None => self.descriptor.not_applicable(),
            Some(share) => self.descriptor.outcome(!self.flag || share != 0.0, || {
                "share percentage is zero; relationship may have fully exited".to_string()
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Sign, subset, cap
// ---------------------------------------------------------------------------

/// A non-negative field, when present, is not negative
pub struct SignRule {
    descriptor: RuleDescriptor,
    field: MonetaryField,
}

impl SignRule {
    pub fn new(field: MonetaryField) -> Self {
        Self {
            descriptor: RuleDescriptor::new(
                format!("SIGN-{}", field.name()),
                format!("{} non-negative", field.name()),
                Severity::Critical,
            )
            .with_field(field),
            field,
        }
    }
}

impl Rule for SignRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn evaluate(&self, record: &Record) -> RuleCheck {
        match record.amount(self.field) {
            None => self.descriptor.not_applicable(),
            Some(value) => self.descriptor.outcome(value >= 0.0, || {
                format!(
                    "{} ({}) = {:.2}, must be >= 0",
                    self.field,
                    self.field.box_label(),
                    value
                )
            }),
        }
    }
}

/// subset <= superset when both are present
pub struct SubsetRule {
    descriptor: RuleDescriptor,
    subset: MonetaryField,
    superset: MonetaryField,
}

impl SubsetRule {
    pub fn new(subset: MonetaryField, superset: MonetaryField) -> Self {
        Self {
            descriptor: RuleDescriptor::new(
                format!("SUBSET-{}", subset.name()),
                format!("{} <= {}", subset.name(), superset.name()),
                Severity::Critical,
            )
            .with_fields(&[subset, superset]),
            subset,
            superset,
        }
    }
}

impl Rule for SubsetRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn evaluate(&self, record: &Record) -> RuleCheck {
        match (record.amount(self.subset), record.amount(self.superset)) {
            (Some(part), Some(whole)) => self.descriptor.outcome(part <= whole, || {
                format!(
                    "{} ({:.2}) exceeds {} ({:.2})",
                    self.subset, part, self.superset, whole
                )
            }),
            _ => self.descriptor.not_applicable(),
        }
    }
}

/// A positive subset requires its superset to be reported
pub struct SupersetPresenceRule {
    descriptor: RuleDescriptor,
    subset: MonetaryField,
    superset: MonetaryField,
}

impl SupersetPresenceRule {
    pub fn new(subset: MonetaryField, superset: MonetaryField) -> Self {
        Self {
            descriptor: RuleDescriptor::new(
                format!("SUPERSET-{}", superset.name()),
                format!("{} present when {} reported", superset.name(), subset.name()),
                Severity::Critical,
            )
            .with_fields(&[subset, superset]),
            subset,
            superset,
        }
    }
}

impl Rule for SupersetPresenceRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn evaluate(&self, record: &Record) -> RuleCheck {
        match record.amount(self.subset) {
            Some(part) if part > 0.0 => {
                self.descriptor
                    .outcome(record.amount(self.superset).is_some(), || {
                        format!(
                            "{} reported ({:.2}) but {} missing",
                            self.subset, part, self.superset
                        )
                    })
            }
            _ => self.descriptor.not_applicable(),
        }
    }
}

/// Capped field within the limit in force for the record's period
pub struct StatutoryCapRule {
    descriptor: RuleDescriptor,
    field: MonetaryField,
    table: LimitTable,
}

impl StatutoryCapRule {
    pub fn new(field: MonetaryField, table: LimitTable) -> Self {
        Self {
            descriptor: RuleDescriptor::new(
                format!("CAP-{}", field.name()),
                format!("{} statutory limit", field.name()),
                Severity::Critical,
            )
            .with_field(field)
            .with_attribute("period"),
            field,
            table,
        }
    }
}

impl Rule for StatutoryCapRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn evaluate(&self, record: &Record) -> RuleCheck {
        let value = match record.amount(self.field) {
            Some(value) => value,
            None => return self.descriptor.not_applicable(),
        };
        let year = record.period_year();
        let limit = match self.table.limit_for(year) {
            Some(limit) => limit,
            None => return self.descriptor.not_applicable(),
        };

        self.descriptor.outcome(value <= limit, || {
            let period = year.map_or_else(|| "unknown period".to_string(), |y| y.to_string());
            format!(
                "{} ({:.2}) exceeds statutory limit ({:.2}) for {}",
                self.field, value, limit, period
            )
        })
    }
}

// ---------------------------------------------------------------------------
// Running balance
// ---------------------------------------------------------------------------

/// Reconstructs the ending balance from beginning, income, deductions and
/// distributions
pub struct BalanceReconciliationRule {
    descriptor: RuleDescriptor,
    relative: f64,
    floor: f64,
}

impl BalanceReconciliationRule {
    pub fn new(tolerances: &RuleTolerances) -> Self {
        let (beginning, ending) = balance_fields();
        Self {
            descriptor: RuleDescriptor::new(
                "BAL-001",
                "running balance reconciliation",
                Severity::Warning,
            )
            .with_fields(&beginning)
            .with_fields(&ending)
            .with_fields(&[TRADE_INCOME, MonetaryField::Distributions]),
            relative: tolerances.balance_relative,
            floor: tolerances.balance_floor,
        }
    }
}

impl Rule for BalanceReconciliationRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn evaluate(&self, record: &Record) -> RuleCheck {
        let (beginning, ending) = match balance_pair(record) {
            Some(pair) => pair,
            None => return self.descriptor.not_applicable(),
        };

        let deductions = sum_present(record, fields_in(FieldCategory::Deduction));
        let distributions = sum_present(record, fields_in(FieldCategory::Distribution));
        let expected = beginning + income_total(record) - deductions - distributions;
        let discrepancy = (ending - expected).abs();
        let tolerance = (ending.abs() * self.relative).max(self.floor);

        self.descriptor.outcome(discrepancy <= tolerance, || {
            format!(
                "balance discrepancy: expected ~{:.2}, actual {:.2} (difference {:.2})",
                expected, ending, discrepancy
            )
        })
    }
}

/// Unexplained balance movement far larger than the account itself
pub struct BalanceDirectionRule {
    descriptor: RuleDescriptor,
    multiple: f64,
}

impl BalanceDirectionRule {
    pub fn new(tolerances: &RuleTolerances) -> Self {
        let (beginning, ending) = balance_fields();
        Self {
            descriptor: RuleDescriptor::new(
                "BAL-002",
                "balance directional plausibility",
                Severity::Advisory,
            )
            .with_fields(&beginning)
            .with_fields(&ending),
            multiple: tolerances.balance_directional_multiple,
        }
    }
}

impl Rule for BalanceDirectionRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn evaluate(&self, record: &Record) -> RuleCheck {
        let (beginning, ending) = match balance_pair(record) {
            Some(pair) => pair,
            None => return self.descriptor.not_applicable(),
        };

        let distributions = sum_present(record, fields_in(FieldCategory::Distribution));
        let unexplained = (ending - beginning) - (income_total(record) - distributions);
        let magnitude = beginning.abs().max(ending.abs()).max(1.0);

        self.descriptor.outcome(unexplained.abs() <= magnitude * self.multiple, || {
            format!(
                "large unexplained balance change of {:.2}; \
                 contributions or adjustments may be missing",
                unexplained
            )
        })
    }
}

// ---------------------------------------------------------------------------
// Role-conditional self-employment
// ---------------------------------------------------------------------------

/// General roles: self-employment ~ trade income + compensation
pub struct GeneralSelfEmploymentRule {
    descriptor: RuleDescriptor,
    relative: f64,
    floor: f64,
}

impl GeneralSelfEmploymentRule {
    pub fn new(tolerances: &RuleTolerances) -> Self {
        Self {
            descriptor: RuleDescriptor::new(
                "SE-001",
                "general role self-employment plausibility",
                Severity::Warning,
            )
            .with_fields(&[SELF_EMPLOYMENT, TRADE_INCOME, COMPENSATION])
            .with_attribute("role"),
            relative: tolerances.general_se_relative,
            floor: tolerances.general_se_floor,
        }
    }
}

impl Rule for GeneralSelfEmploymentRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn evaluate(&self, record: &Record) -> RuleCheck {
        let is_general = record.role.map_or(false, |r| r.is_general());
        let is_entity = record.recipient_kind.map_or(false, |k| k.is_entity());
        let (se, trade) = match (record.amount(SELF_EMPLOYMENT), record.amount(TRADE_INCOME)) {
            (Some(se), Some(trade)) if is_general && !is_entity => (se, trade),
            _ => return self.descriptor.not_applicable(),
        };

        let expected = trade + record.amount(COMPENSATION).unwrap_or(0.0);
        let tolerance = (expected.abs() * self.relative).max(self.floor);

        self.descriptor.outcome((se - expected).abs() <= tolerance, || {
            format!(
                "self-employment earnings ({:.2}) differ from trade income + compensation ({:.2})",
                se, expected
            )
        })
    }
}

/// Limited roles: self-employment limited to compensation
pub struct LimitedSelfEmploymentRule {
    descriptor: RuleDescriptor,
    absolute: f64,
}

impl LimitedSelfEmploymentRule {
    pub fn new(tolerances: &RuleTolerances) -> Self {
        Self {
            descriptor: RuleDescriptor::new(
                "SE-002",
                "limited role self-employment constraint",
                Severity::Warning,
            )
            .with_fields(&[SELF_EMPLOYMENT, COMPENSATION])
            .with_attribute("role"),
            absolute: tolerances.limited_se_absolute,
        }
    }
}

impl Rule for LimitedSelfEmploymentRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn evaluate(&self, record: &Record) -> RuleCheck {
        let is_limited = record.role.map_or(false, |r| r.is_limited());
        match (record.amount(SELF_EMPLOYMENT), record.amount(COMPENSATION)) {
            (Some(se), Some(compensation)) if is_limited => {
                self.descriptor.outcome(se <= compensation + self.absolute, || {
                    format!(
                        "self-employment earnings ({:.2}) exceed compensation ({:.2})",
                        se, compensation
                    )
                })
            }
            _ => self.descriptor.not_applicable(),
        }
    }
}

/// Entity recipients have no self-employment earnings
pub struct EntitySelfEmploymentRule {
    descriptor: RuleDescriptor,
}

impl EntitySelfEmploymentRule {
    pub fn new() -> Self {
        Self {
            descriptor: RuleDescriptor::new(
                "SE-003",
                "entity recipient self-employment is zero",
                Severity::Critical,
            )
            .with_field(SELF_EMPLOYMENT)
            .with_attribute("recipient_kind"),
        }
    }
}

impl Default for EntitySelfEmploymentRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for EntitySelfEmploymentRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn evaluate(&self, record: &Record) -> RuleCheck {
        match (record.recipient_kind, record.amount(SELF_EMPLOYMENT)) {
            (Some(kind), Some(se)) if kind.is_entity() => self.descriptor.outcome(se == 0.0, || {
                format!("self-employment earnings ({:.2}) reported for an entity recipient", se)
            }),
            _ => self.descriptor.not_applicable(),
        }
    }
}

// ---------------------------------------------------------------------------
// Plausibility
// ---------------------------------------------------------------------------

/// QBI deduction vs trade income less compensation
pub struct QbiPlausibilityRule {
    descriptor: RuleDescriptor,
    relative: f64,
    floor: f64,
}

impl QbiPlausibilityRule {
    pub fn new(tolerances: &RuleTolerances) -> Self {
        Self {
            descriptor: RuleDescriptor::new(
                "PLAUS-001",
                "QBI deduction plausibility",
                Severity::Advisory,
            )
            .with_fields(&[MonetaryField::QbiDeduction, TRADE_INCOME, COMPENSATION]),
            relative: tolerances.qbi_relative,
            floor: tolerances.qbi_floor,
        }
    }
}

impl Rule for QbiPlausibilityRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn evaluate(&self, record: &Record) -> RuleCheck {
        let qbi = record.amount(MonetaryField::QbiDeduction);
        let (qbi, trade) = match (qbi, record.amount(TRADE_INCOME)) {
            (Some(qbi), Some(trade)) => (qbi, trade),
            _ => return self.descriptor.not_applicable(),
        };

        let estimated = trade - record.amount(COMPENSATION).unwrap_or(0.0);
        let tolerance = (trade.abs() * self.relative).max(self.floor);

        self.descriptor.outcome((qbi - estimated).abs() <= tolerance, || {
            format!(
                "QBI ({:.2}) differs from trade income less compensation ({:.2})",
                qbi, estimated
            )
        })
    }
}

/// Positive foreign taxes need some non-zero income to relate to
pub struct ForeignTaxContextRule {
    descriptor: RuleDescriptor,
}

impl ForeignTaxContextRule {
    pub fn new() -> Self {
        Self {
            descriptor: RuleDescriptor::new(
                "PLAUS-002",
                "foreign taxes require income context",
                Severity::Warning,
            )
            .with_field(MonetaryField::ForeignTaxesPaid),
        }
    }
}

impl Default for ForeignTaxContextRule {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule for ForeignTaxContextRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn evaluate(&self, record: &Record) -> RuleCheck {
        match record.amount(MonetaryField::ForeignTaxesPaid) {
            None => self.descriptor.not_applicable(),
            Some(taxes) if taxes > 0.0 => {
                let has_income = MonetaryField::ALL
                    .iter()
                    .filter(|f| f.is_income())
                    .any(|f| record.amount(*f).map_or(false, |v| v != 0.0));
                self.descriptor.outcome(has_income, || {
                    format!("foreign taxes paid ({:.2}) but no income reported", taxes)
                })
            }
            Some(_) => self.descriptor.pass(),
        }
    }
}

/// Capped deduction far larger than positive trade income
pub struct CappedDeductionReasonablenessRule {
    descriptor: RuleDescriptor,
    field: MonetaryField,
    multiple: f64,
}

impl CappedDeductionReasonablenessRule {
    pub fn new(field: MonetaryField, multiple: f64) -> Self {
        Self {
            descriptor: RuleDescriptor::new(
                format!("PLAUS-{}", field.name()),
                format!("{} reasonableness", field.name()),
                Severity::Advisory,
            )
            .with_fields(&[field, TRADE_INCOME]),
            field,
            multiple,
        }
    }
}

impl Rule for CappedDeductionReasonablenessRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn evaluate(&self, record: &Record) -> RuleCheck {
        match (record.amount(self.field), record.amount(TRADE_INCOME)) {
            (Some(deduction), Some(trade)) if deduction > 0.0 && trade > 0.0 => {
                self.descriptor.outcome(deduction <= trade * self.multiple, || {
                    format!(
                        "{} ({:.2}) is much larger than trade income ({:.2})",
                        self.field, deduction, trade
                    )
                })
            }
            (Some(_), Some(_)) => self.descriptor.pass(),
            _ => self.descriptor.not_applicable(),
        }
    }
}

// ---------------------------------------------------------------------------
// Magnitude
// ---------------------------------------------------------------------------

/// Value within the field's typical range
pub struct MagnitudeRule {
    descriptor: RuleDescriptor,
    field: MonetaryField,
    range: MagnitudeRange,
}

impl MagnitudeRule {
    pub fn new(field: MonetaryField, range: MagnitudeRange) -> Self {
        Self {
            descriptor: RuleDescriptor::new(
                format!("MAG-{}", field.name()),
                format!("{} magnitude", field.name()),
                Severity::Advisory,
            )
            .with_field(field),
            field,
            range,
        }
    }
}

impl Rule for MagnitudeRule {
    fn descriptor(&self) -> &RuleDescriptor {
        &self.descriptor
    }

    fn evaluate(&self, record: &Record) -> RuleCheck {
        match record.amount(self.field) {
            None => self.descriptor.not_applicable(),
            Some(value) => self.descriptor.outcome(self.range.contains(value), || {
                format!(
                    "{} = {:.2}, outside typical range [{:.0}, {:.0}]",
                    self.field, value, self.range.min, self.range.max
                )
            }),
        }
    }
}
