//! Record schema: the typed contract for one extracted financial record
//!
//! Raw extracted text (role labels, recipient kinds) is resolved to closed
//! enums once, here, at the schema boundary. Monetary fields are addressed
//! through [`MonetaryField`], whose `select` is a plain match over struct
//! fields.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SchemaError;
use crate::types::{CompositeKey, ContinuityKey, EntityGroupKey};

/// How a monetary field's sign is constrained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignPolicy {
    /// May be negative (a loss)
    Unconstrained,
    NonNegative,
    /// Non-negative and subject to a year-indexed statutory limit
    StatutoryCapped,
}

impl SignPolicy {
    pub fn requires_non_negative(&self) -> bool {
        !matches!(self, SignPolicy::Unconstrained)
    }
}

/// What a monetary field represents in balance and proportionality math
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldCategory {
    /// Trade or business income
    TradeIncome,
    /// Other allocable income
    Income,
    /// Participant-specific payments for services or capital
    Compensation,
    /// Qualified portion of another income field
    SubsetIncome,
    Deduction,
    Distribution,
    BalanceBeginning,
    BalanceEnding,
    SelfEmployment,
    Derived,
}

/// The closed set of monetary fields on a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonetaryField {
    OrdinaryBusinessIncome,
    RentalRealEstateIncome,
    GuaranteedPayments,
    InterestIncome,
    OrdinaryDividends,
    QualifiedDividends,
    ShortTermCapitalGains,
    LongTermCapitalGains,
    #[serde(rename = "section_179_deduction")]
    Section179Deduction,
    Distributions,
    CapitalAccountBeginning,
    CapitalAccountEnding,
    SelfEmploymentEarnings,
    ForeignTaxesPaid,
    QbiDeduction,
}

impl MonetaryField {
    pub const ALL: [MonetaryField; 15] = [
        MonetaryField::OrdinaryBusinessIncome,
        MonetaryField::RentalRealEstateIncome,
        MonetaryField::GuaranteedPayments,
        MonetaryField::InterestIncome,
        MonetaryField::OrdinaryDividends,
        MonetaryField::QualifiedDividends,
        MonetaryField::ShortTermCapitalGains,
        MonetaryField::LongTermCapitalGains,
        MonetaryField::Section179Deduction,
        MonetaryField::Distributions,
        MonetaryField::CapitalAccountBeginning,
        MonetaryField::CapitalAccountEnding,
        MonetaryField::SelfEmploymentEarnings,
        MonetaryField::ForeignTaxesPaid,
        MonetaryField::QbiDeduction,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MonetaryField::OrdinaryBusinessIncome => "ordinary_business_income",
            MonetaryField::RentalRealEstateIncome => "rental_real_estate_income",
            MonetaryField::GuaranteedPayments => "guaranteed_payments",
            MonetaryField::InterestIncome => "interest_income",
            MonetaryField::OrdinaryDividends => "ordinary_dividends",
            MonetaryField::QualifiedDividends => "qualified_dividends",
            MonetaryField::ShortTermCapitalGains => "short_term_capital_gains",
            MonetaryField::LongTermCapitalGains => "long_term_capital_gains",
            MonetaryField::Section179Deduction => "section_179_deduction",
            MonetaryField::Distributions => "distributions",
            MonetaryField::CapitalAccountBeginning => "capital_account_beginning",
            MonetaryField::CapitalAccountEnding => "capital_account_ending",
            MonetaryField::SelfEmploymentEarnings => "self_employment_earnings",
            MonetaryField::ForeignTaxesPaid => "foreign_taxes_paid",
            MonetaryField::QbiDeduction => "qbi_deduction",
        }
    }

    /// Form box the value is read from
    pub fn box_label(&self) -> &'static str {
        match self {
            MonetaryField::OrdinaryBusinessIncome => "Box 1",
            MonetaryField::RentalRealEstateIncome => "Box 2",
            MonetaryField::GuaranteedPayments => "Box 4",
            MonetaryField::InterestIncome => "Box 5",
            MonetaryField::OrdinaryDividends => "Box 6a",
            MonetaryField::QualifiedDividends => "Box 6b",
            MonetaryField::ShortTermCapitalGains => "Box 8",
            MonetaryField::LongTermCapitalGains => "Box 9a",
            MonetaryField::Section179Deduction => "Box 12",
            MonetaryField::Distributions => "Box 19",
            MonetaryField::CapitalAccountBeginning => "Item L beginning",
            MonetaryField::CapitalAccountEnding => "Item L ending",
            MonetaryField::SelfEmploymentEarnings => "Box 14",
            MonetaryField::ForeignTaxesPaid => "Box 16",
            MonetaryField::QbiDeduction => "Box 20 Z",
        }
    }

    pub fn sign_policy(&self) -> SignPolicy {
        match self {
            MonetaryField::GuaranteedPayments
            | MonetaryField::InterestIncome
            | MonetaryField::OrdinaryDividends
            | MonetaryField::QualifiedDividends
            | MonetaryField::Distributions
            | MonetaryField::ForeignTaxesPaid => SignPolicy::NonNegative,
            MonetaryField::Section179Deduction => SignPolicy::StatutoryCapped,
            MonetaryField::OrdinaryBusinessIncome
            | MonetaryField::RentalRealEstateIncome
            | MonetaryField::ShortTermCapitalGains
            | MonetaryField::LongTermCapitalGains
            | MonetaryField::CapitalAccountBeginning
            | MonetaryField::CapitalAccountEnding
            | MonetaryField::SelfEmploymentEarnings
            | MonetaryField::QbiDeduction => SignPolicy::Unconstrained,
        }
    }

    pub fn category(&self) -> FieldCategory {
        match self {
            MonetaryField::OrdinaryBusinessIncome => FieldCategory::TradeIncome,
            MonetaryField::RentalRealEstateIncome
            | MonetaryField::InterestIncome
            | MonetaryField::OrdinaryDividends
            | MonetaryField::ShortTermCapitalGains
            | MonetaryField::LongTermCapitalGains => FieldCategory::Income,
            MonetaryField::GuaranteedPayments => FieldCategory::Compensation,
            MonetaryField::QualifiedDividends => FieldCategory::SubsetIncome,
            MonetaryField::Section179Deduction | MonetaryField::ForeignTaxesPaid => {
                FieldCategory::Deduction
            }
            MonetaryField::Distributions => FieldCategory::Distribution,
            MonetaryField::CapitalAccountBeginning => FieldCategory::BalanceBeginning,
            MonetaryField::CapitalAccountEnding => FieldCategory::BalanceEnding,
            MonetaryField::SelfEmploymentEarnings => FieldCategory::SelfEmployment,
            MonetaryField::QbiDeduction => FieldCategory::Derived,
        }
    }

    /// Flows into the running balance as income
    pub fn is_income(&self) -> bool {
        matches!(
            self.category(),
            FieldCategory::TradeIncome | FieldCategory::Income | FieldCategory::Compensation
        )
    }

    /// Allocated across members by share percentage
    pub fn is_proportional(&self) -> bool {
        matches!(
            self.category(),
            FieldCategory::TradeIncome | FieldCategory::Income
        )
    }

    /// Read this field from a record
    pub fn select(&self, record: &Record) -> Option<f64> {
        match self {
            MonetaryField::OrdinaryBusinessIncome => record.ordinary_business_income,
            MonetaryField::RentalRealEstateIncome => record.rental_real_estate_income,
            MonetaryField::GuaranteedPayments => record.guaranteed_payments,
            MonetaryField::InterestIncome => record.interest_income,
            MonetaryField::OrdinaryDividends => record.ordinary_dividends,
            MonetaryField::QualifiedDividends => record.qualified_dividends,
            MonetaryField::ShortTermCapitalGains => record.short_term_capital_gains,
            MonetaryField::LongTermCapitalGains => record.long_term_capital_gains,
            MonetaryField::Section179Deduction => record.section_179_deduction,
            MonetaryField::Distributions => record.distributions,
            MonetaryField::CapitalAccountBeginning => record.capital_account_beginning,
            MonetaryField::CapitalAccountEnding => record.capital_account_ending,
            MonetaryField::SelfEmploymentEarnings => record.self_employment_earnings,
            MonetaryField::ForeignTaxesPaid => record.foreign_taxes_paid,
            MonetaryField::QbiDeduction => record.qbi_deduction,
        }
    }

    fn slot<'a>(&self, record: &'a mut Record) -> &'a mut Option<f64> {
        match self {
            MonetaryField::OrdinaryBusinessIncome => &mut record.ordinary_business_income,
            MonetaryField::RentalRealEstateIncome => &mut record.rental_real_estate_income,
            MonetaryField::GuaranteedPayments => &mut record.guaranteed_payments,
            MonetaryField::InterestIncome => &mut record.interest_income,
            MonetaryField::OrdinaryDividends => &mut record.ordinary_dividends,
            MonetaryField::QualifiedDividends => &mut record.qualified_dividends,
            MonetaryField::ShortTermCapitalGains => &mut record.short_term_capital_gains,
            MonetaryField::LongTermCapitalGains => &mut record.long_term_capital_gains,
            MonetaryField::Section179Deduction => &mut record.section_179_deduction,
            MonetaryField::Distributions => &mut record.distributions,
            MonetaryField::CapitalAccountBeginning => &mut record.capital_account_beginning,
            MonetaryField::CapitalAccountEnding => &mut record.capital_account_ending,
            MonetaryField::SelfEmploymentEarnings => &mut record.self_employment_earnings,
            MonetaryField::ForeignTaxesPaid => &mut record.foreign_taxes_paid,
            MonetaryField::QbiDeduction => &mut record.qbi_deduction,
        }
    }
}

impl fmt::Display for MonetaryField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Closed role classification of the recipient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    GeneralParticipant,
    LimitedParticipant,
    ManagerMember,
    OtherMember,
}

/// Normalized extracted label -> role. Combined checkbox labels resolve to
/// the first alternative printed on the form.
const ROLE_TABLE: &[(&str, Role)] = &[
    ("general partner", Role::GeneralParticipant),
    ("general", Role::GeneralParticipant),
    ("gp", Role::GeneralParticipant),
    ("general partner or llc member-manager", Role::GeneralParticipant),
    ("limited partner", Role::LimitedParticipant),
    ("limited", Role::LimitedParticipant),
    ("lp", Role::LimitedParticipant),
    ("limited partner or other llc member", Role::LimitedParticipant),
    ("llc member-manager", Role::ManagerMember),
    ("member-manager", Role::ManagerMember),
    ("manager-member", Role::ManagerMember),
    ("llc member", Role::OtherMember),
    ("other llc member", Role::OtherMember),
    ("member", Role::OtherMember),
];

impl Role {
    /// Resolve raw extracted text through the mapping table
    pub fn resolve(raw: &str) -> Option<Role> {
        let normalized = normalize_label(raw);
        ROLE_TABLE
            .iter()
            .find(|(label, _)| *label == normalized)
            .map(|(_, role)| *role)
    }

    /// Manages the entity; self-employment follows trade income
    pub fn is_general(&self) -> bool {
        matches!(self, Role::GeneralParticipant | Role::ManagerMember)
    }

    /// Passive; self-employment limited to compensation
    pub fn is_limited(&self) -> bool {
        matches!(self, Role::LimitedParticipant | Role::OtherMember)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::GeneralParticipant => write!(f, "general participant"),
            Role::LimitedParticipant => write!(f, "limited participant"),
            Role::ManagerMember => write!(f, "manager-member"),
            Role::OtherMember => write!(f, "other member"),
        }
    }
}

/// What kind of taxpayer the recipient is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientKind {
    Individual,
    Corporation,
    SCorporation,
    Partnership,
    LimitedLiabilityCompany,
    Trust,
    Estate,
    ExemptOrganization,
}

const RECIPIENT_KIND_TABLE: &[(&str, RecipientKind)] = &[
    ("individual", RecipientKind::Individual),
    ("corporation", RecipientKind::Corporation),
    ("c corporation", RecipientKind::Corporation),
    ("s corporation", RecipientKind::SCorporation),
    ("s corp", RecipientKind::SCorporation),
    ("partnership", RecipientKind::Partnership),
    ("llc", RecipientKind::LimitedLiabilityCompany),
    ("limited liability company", RecipientKind::LimitedLiabilityCompany),
    ("trust", RecipientKind::Trust),
    ("estate", RecipientKind::Estate),
    ("exempt organization", RecipientKind::ExemptOrganization),
];

impl RecipientKind {
    pub fn resolve(raw: &str) -> Option<RecipientKind> {
        let normalized = normalize_label(raw);
        RECIPIENT_KIND_TABLE
            .iter()
            .find(|(label, _)| *label == normalized)
            .map(|(_, kind)| *kind)
    }

    /// Anything other than a natural person
    pub fn is_entity(&self) -> bool {
        !matches!(self, RecipientKind::Individual)
    }
}

fn normalize_label(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Which percentage a share value stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareBasis {
    Profit,
    Loss,
    Capital,
}

/// Separately extracted profit/loss/capital percentages, when the source
/// distinguishes them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShareBreakdown {
    pub profit: Option<f64>,
    pub loss: Option<f64>,
    pub capital: Option<f64>,
}

/// One extracted financial document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Reporting year as extracted; must be four digits to be usable as a key
    pub period: Option<String>,
    pub entity_id: Option<String>,
    pub entity_name: Option<String>,
    pub sub_entity_id: Option<String>,
    /// Role label as extracted
    pub role_text: Option<String>,
    /// Role resolved from `role_text`
    pub role: Option<Role>,
    pub recipient_kind: Option<RecipientKind>,
    /// Single share value; stands in for any basis not given in `shares`
    pub share_percentage: Option<f64>,
    pub shares: ShareBreakdown,

    pub ordinary_business_income: Option<f64>,
    pub rental_real_estate_income: Option<f64>,
    pub guaranteed_payments: Option<f64>,
    pub interest_income: Option<f64>,
    pub ordinary_dividends: Option<f64>,
    pub qualified_dividends: Option<f64>,
    pub short_term_capital_gains: Option<f64>,
    pub long_term_capital_gains: Option<f64>,
    pub section_179_deduction: Option<f64>,
    pub distributions: Option<f64>,
    pub capital_account_beginning: Option<f64>,
    pub capital_account_ending: Option<f64>,
    pub self_employment_earnings: Option<f64>,
    pub foreign_taxes_paid: Option<f64>,
    pub qbi_deduction: Option<f64>,
}

impl Record {
    /// Start building a record in code
    pub fn builder() -> RecordBuilder {
        RecordBuilder::default()
    }

    /// Parse a record from the extraction collaborator's JSON.
    ///
    /// Unknown keys are ignored. A value of the wrong type is a structural
    /// error; nothing is coerced.
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let raw: RawRecord = serde_json::from_str(json).map_err(|e| SchemaError::Malformed {
            reason: e.to_string(),
        })?;
        raw.into_record()
    }

    /// Parse a record from an already-decoded JSON value
    pub fn from_value(value: serde_json::Value) -> Result<Self, SchemaError> {
        let raw: RawRecord =
            serde_json::from_value(value).map_err(|e| SchemaError::Malformed {
                reason: e.to_string(),
            })?;
        raw.into_record()
    }

    pub fn amount(&self, field: MonetaryField) -> Option<f64> {
        field.select(self)
    }

    pub fn set_amount(&mut self, field: MonetaryField, value: Option<f64>) {
        *field.slot(self) = value;
    }

    /// Present monetary fields, in schema order
    pub fn present_amounts(&self) -> impl Iterator<Item = (MonetaryField, f64)> + '_ {
        MonetaryField::ALL
            .iter()
            .filter_map(move |f| f.select(self).map(|v| (*f, v)))
    }

    /// The period as a year, when it is exactly four ASCII digits
    pub fn period_year(&self) -> Option<u16> {
        let period = self.period.as_deref()?.trim();
        if period.len() == 4 && period.bytes().all(|b| b.is_ascii_digit()) {
            period.parse().ok()
        } else {
            None
        }
    }

    pub fn entity(&self) -> Option<&str> {
        non_empty(self.entity_id.as_deref())
    }

    pub fn sub_entity(&self) -> Option<&str> {
        non_empty(self.sub_entity_id.as_deref())
    }

    pub fn name(&self) -> Option<&str> {
        non_empty(self.entity_name.as_deref())
    }

    /// Share for the given basis, falling back to the single share value
    pub fn share(&self, basis: ShareBasis) -> Option<f64> {
        let specific = match basis {
            ShareBasis::Profit => self.shares.profit,
            ShareBasis::Loss => self.shares.loss,
            ShareBasis::Capital => self.shares.capital,
        };
        specific.or(self.share_percentage)
    }

    pub fn group_key(&self) -> Option<EntityGroupKey> {
        Some(EntityGroupKey {
            entity_id: self.entity()?.to_string(),
            period: self.period_year()?,
        })
    }

    pub fn continuity_key(&self) -> Option<ContinuityKey> {
        Some(ContinuityKey {
            entity_id: self.entity()?.to_string(),
            sub_entity_id: self.sub_entity()?.to_string(),
        })
    }

    pub fn composite_key(&self) -> Option<CompositeKey> {
        Some(CompositeKey {
            entity_id: self.entity()?.to_string(),
            sub_entity_id: self.sub_entity()?.to_string(),
            period: self.period_year()?,
        })
    }

    /// Monetary fields whose values differ between two records. Absent and
    /// present are different; two absences are equal.
    pub fn differing_amounts(&self, other: &Record) -> Vec<MonetaryField> {
        MonetaryField::ALL
            .iter()
            .copied()
            .filter(|f| f.select(self) != f.select(other))
            .collect()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Fluent construction of records for callers that already hold typed data
#[derive(Debug, Clone, Default)]
pub struct RecordBuilder {
    record: Record,
}

impl RecordBuilder {
    pub fn period(mut self, period: impl Into<String>) -> Self {
        self.record.period = Some(period.into());
        self
    }

    pub fn entity(mut self, entity_id: impl Into<String>, name: impl Into<String>) -> Self {
        self.record.entity_id = Some(entity_id.into());
        self.record.entity_name = Some(name.into());
        self
    }

    pub fn entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.record.entity_id = Some(entity_id.into());
        self
    }

    pub fn sub_entity(mut self, sub_entity_id: impl Into<String>) -> Self {
        self.record.sub_entity_id = Some(sub_entity_id.into());
        self
    }

    /// Set the raw role label and resolve it
    pub fn role_text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.record.role = Role::resolve(&text);
        self.record.role_text = Some(text);
        self
    }

    pub fn role(mut self, role: Role) -> Self {
        self.record.role_text = Some(role.to_string());
        self.record.role = Some(role);
        self
    }

    pub fn recipient_kind(mut self, kind: RecipientKind) -> Self {
        self.record.recipient_kind = Some(kind);
        self
    }

    pub fn share(mut self, percentage: f64) -> Self {
        self.record.share_percentage = Some(percentage);
        self
    }

    pub fn share_for(mut self, basis: ShareBasis, percentage: f64) -> Self {
        match basis {
            ShareBasis::Profit => self.record.shares.profit = Some(percentage),
            ShareBasis::Loss => self.record.shares.loss = Some(percentage),
            ShareBasis::Capital => self.record.shares.capital = Some(percentage),
        }
        self
    }

    pub fn amount(mut self, field: MonetaryField, value: f64) -> Self {
        self.record.set_amount(field, Some(value));
        self
    }

    pub fn build(self) -> Record {
        self.record
    }
}

/// Wire shape of an extracted record. Field aliases accept the extraction
/// collaborator's form-specific names.
#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(default, alias = "tax_year")]
    period: Option<PeriodValue>,
    #[serde(default, alias = "partnership_ein")]
    entity_id: Option<String>,
    #[serde(default, alias = "partnership_name")]
    entity_name: Option<String>,
    #[serde(default, alias = "partner_tin")]
    sub_entity_id: Option<String>,
    #[serde(default, alias = "partner_type")]
    role: Option<String>,
    #[serde(default, alias = "entity_type")]
    recipient_kind: Option<String>,
    #[serde(default, alias = "partner_share_percentage")]
    share_percentage: Option<f64>,
    #[serde(default, alias = "profit_share_percentage")]
    profit_share: Option<f64>,
    #[serde(default, alias = "loss_share_percentage")]
    loss_share: Option<f64>,
    #[serde(default, alias = "capital_share_percentage")]
    capital_share: Option<f64>,

    #[serde(default)]
    ordinary_business_income: Option<f64>,
    #[serde(default)]
    rental_real_estate_income: Option<f64>,
    #[serde(default)]
    guaranteed_payments: Option<f64>,
    #[serde(default)]
    interest_income: Option<f64>,
    #[serde(default)]
    ordinary_dividends: Option<f64>,
    #[serde(default)]
    qualified_dividends: Option<f64>,
    #[serde(default)]
    short_term_capital_gains: Option<f64>,
    #[serde(default)]
    long_term_capital_gains: Option<f64>,
    #[serde(default)]
    section_179_deduction: Option<f64>,
    #[serde(default)]
    distributions: Option<f64>,
    #[serde(default)]
    capital_account_beginning: Option<f64>,
    #[serde(default)]
    capital_account_ending: Option<f64>,
    #[serde(default)]
    self_employment_earnings: Option<f64>,
    #[serde(default)]
    foreign_taxes_paid: Option<f64>,
    #[serde(default)]
    qbi_deduction: Option<f64>,
}

/// Periods arrive either as text ("2024") or as a bare integer
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PeriodValue {
    Text(String),
    Year(u64),
}

impl RawRecord {
    fn into_record(self) -> Result<Record, SchemaError> {
        let period = match self.period {
            Some(PeriodValue::Text(text)) => Some(text),
            Some(PeriodValue::Year(year)) => Some(year.to_string()),
            None => None,
        };

        // An unmapped kind is unknown, not malformed; kind-dependent rules
        // treat it as not applicable.
        let recipient_kind = self.recipient_kind.as_deref().and_then(RecipientKind::resolve);

        Ok(Record {
            period,
            entity_id: self.entity_id,
            entity_name: self.entity_name,
            sub_entity_id: self.sub_entity_id,
            role: self.role.as_deref().and_then(Role::resolve),
            role_text: self.role,
            recipient_kind,
            share_percentage: self.share_percentage,
            shares: ShareBreakdown {
                profit: self.profit_share,
                loss: self.loss_share,
                capital: self.capital_share,
            },
            ordinary_business_income: self.ordinary_business_income,
            rental_real_estate_income: self.rental_real_estate_income,
            guaranteed_payments: self.guaranteed_payments,
            interest_income: self.interest_income,
            ordinary_dividends: self.ordinary_dividends,
            qualified_dividends: self.qualified_dividends,
            short_term_capital_gains: self.short_term_capital_gains,
            long_term_capital_gains: self.long_term_capital_gains,
            section_179_deduction: self.section_179_deduction,
            distributions: self.distributions,
            capital_account_beginning: self.capital_account_beginning,
            capital_account_ending: self.capital_account_ending,
            self_employment_earnings: self.self_employment_earnings,
            foreign_taxes_paid: self.foreign_taxes_paid,
            qbi_deduction: self.qbi_deduction,
        })
    }
}
