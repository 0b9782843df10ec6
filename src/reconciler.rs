//! Cross-entity reconciler
//!
//! Runs group, pair and composite-key checks over a [`RecordAccessor`]. The
//! reconciler only reads: the same snapshot always yields the same report,
//! in the same order (groups, then relationships, then composite keys, each
//! in key order).
//!
//! Group and pair math uses the latest revision of each member so an
//! amendment is not counted twice; duplicate and amendment detection looks
//! at every revision.

use std::collections::{BTreeMap, BTreeSet};

use crate::comparison::ReportComparator;
use crate::config::{ReconciliationConfig, SharePolicy, ValidatorConfig};
use crate::record::MonetaryField;
use crate::stats::{bigram_similarity, median, median_absolute_deviation};
use crate::store::{RecordAccessor, StoredRecord};
use crate::types::{
    mask_identifier, CheckScope, CompositeKey, ContinuityKey, CrossEntityCheck, EntityGroupKey,
    RecordId, ReconciliationReport, Severity,
};

/// Identity of one cross-entity check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckKind {
    pub id: &'static str,
    pub name: &'static str,
    pub severity: Severity,
}

pub const PERCENT_SUM_OVER: CheckKind = CheckKind {
    id: "XE-SUM-001",
    name: "share percentages do not exceed 100",
    severity: Severity::Critical,
};
pub const PERCENT_SUM_UNDER: CheckKind = CheckKind {
    id: "XE-SUM-002",
    name: "share percentages reach 100",
    severity: Severity::Advisory,
};
pub const INCOME_PROPORTIONALITY: CheckKind = CheckKind {
    id: "XE-PROP-001",
    name: "income allocated in proportion to share",
    severity: Severity::Warning,
};
pub const BALANCE_PROPORTIONALITY: CheckKind = CheckKind {
    id: "XE-PROP-002",
    name: "ending balance in proportion to capital share",
    severity: Severity::Warning,
};
pub const ENTITY_IDENTITY: CheckKind = CheckKind {
    id: "XE-ID-001",
    name: "entity name consistent within group",
    severity: Severity::Warning,
};
pub const DISTRIBUTION_REASONABLENESS: CheckKind = CheckKind {
    id: "XE-DIST-001",
    name: "group distributions reasonable against income",
    severity: Severity::Warning,
};
pub const INCOME_OUTLIER: CheckKind = CheckKind {
    id: "XE-OUT-001",
    name: "income per share point within group spread",
    severity: Severity::Warning,
};
pub const SELF_EMPLOYMENT_CONSISTENCY: CheckKind = CheckKind {
    id: "XE-SE-001",
    name: "self-employment earnings consistent with role",
    severity: Severity::Warning,
};
pub const BALANCE_CONTINUITY: CheckKind = CheckKind {
    id: "XE-CONT-001",
    name: "prior ending balance equals current beginning balance",
    severity: Severity::Critical,
};
pub const ROLE_CONTINUITY: CheckKind = CheckKind {
    id: "XE-CONT-002",
    name: "role unchanged across periods",
    severity: Severity::Warning,
};
pub const NAME_CONTINUITY: CheckKind = CheckKind {
    id: "XE-CONT-003",
    name: "entity name consistent across periods",
    severity: Severity::Warning,
};
pub const EXACT_DUPLICATE: CheckKind = CheckKind {
    id: "XE-DUP-001",
    name: "no exact duplicate records",
    severity: Severity::Critical,
};
pub const POSSIBLE_AMENDMENT: CheckKind = CheckKind {
    id: "XE-DUP-002",
    name: "possible amendment",
    severity: Severity::Warning,
};

enum Verdict {
    Pass,
    NotApplicable,
    Fail(String),
}

fn emit(
    kind: CheckKind,
    scope: &CheckScope,
    subjects: Vec<RecordId>,
    fields: Vec<String>,
    verdict: Verdict,
) -> CrossEntityCheck {
    let (passed, applicable, message) = match verdict {
        Verdict::Pass => (true, true, String::new()),
        Verdict::NotApplicable => (true, false, String::new()),
        Verdict::Fail(message) => (false, true, message),
    };
    CrossEntityCheck {
        rule_id: kind.id.to_string(),
        rule_name: kind.name.to_string(),
        severity: kind.severity,
        passed,
        applicable,
        message,
        fields_involved: fields,
        scope: scope.clone(),
        subjects,
    }
}

fn ids(records: &[&StoredRecord]) -> Vec<RecordId> {
    records.iter().map(|s| s.id).collect()
}

fn names(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|f| f.to_string()).collect()
}

/// How a member is named in messages: masked sub-entity id, else record id
fn member_label(stored: &StoredRecord) -> String {
    stored
        .record
        .sub_entity()
        .map(mask_identifier)
        .unwrap_or_else(|| stored.id.to_string())
}

fn proportional_fields() -> impl Iterator<Item = MonetaryField> {
    MonetaryField::ALL.into_iter().filter(|f| f.is_proportional())
}

/// Runs every cross-entity check over an accessor
#[derive(Debug, Clone)]
pub struct Reconciler {
    config: ReconciliationConfig,
    shares: SharePolicy,
}

impl Reconciler {
    pub fn new(config: &ValidatorConfig) -> Self {
        Self {
            config: config.reconciliation.clone(),
            shares: config.shares.clone(),
        }
    }

    pub fn config(&self) -> &ReconciliationConfig {
        &self.config
    }

    /// Every check over every group, relationship and composite key
    pub fn reconcile<A: RecordAccessor + ?Sized>(&self, accessor: &A) -> ReconciliationReport {
        let mut checks = Vec::new();

        for key in accessor.group_keys() {
            checks.extend(self.reconcile_group(accessor, &key));
        }
        for key in accessor.continuity_keys() {
            checks.extend(self.reconcile_history(accessor, &key));
        }
        for key in accessor.composite_keys() {
            checks.extend(self.reconcile_composite(&key, &accessor.composite(&key)));
        }

        ReconciliationReport {
            snapshot: accessor.snapshot_hash(),
            records_examined: accessor.len(),
            checks,
        }
    }

    /// Only the checks touching one record, computing just the scopes it
    /// belongs to
    pub fn reconcile_for<A: RecordAccessor + ?Sized>(
        &self,
        accessor: &A,
        record_id: RecordId,
    ) -> Vec<CrossEntityCheck> {
        let stored = match accessor.record(record_id) {
            Some(stored) => stored,
            None => return Vec::new(),
        };

        let mut checks = Vec::new();
        if let Some(key) = stored.group_key() {
            checks.extend(self.reconcile_group(accessor, &key));
        }
        if let Some(key) = stored.continuity_key() {
            checks.extend(self.reconcile_history(accessor, &key));
        }
        if let Some(key) = stored.composite_key() {
            checks.extend(self.reconcile_composite(&key, &accessor.composite(&key)));
        }
        checks.retain(|c| c.touches(record_id));
        checks
    }

    // -----------------------------------------------------------------------
    // Same-period group scope
    // -----------------------------------------------------------------------

    pub fn reconcile_group<A: RecordAccessor + ?Sized>(
        &self,
        accessor: &A,
        key: &EntityGroupKey,
    ) -> Vec<CrossEntityCheck> {
        let scope = CheckScope::Group(key.clone());
        let members = accessor.latest_in_group(key);
        if members.is_empty() {
            return Vec::new();
        }

        let mut checks = self.percentage_sum(&scope, &members);
        checks.extend(self.income_proportionality(&scope, &members));
        checks.push(self.balance_proportionality(&scope, &members));
        checks.push(self.entity_identity(&scope, &accessor.group(key)));
        checks.push(self.distribution_reasonableness(&scope, &members));
        checks.extend(self.income_outliers(&scope, &members));
        checks.extend(self.self_employment_consistency(&scope, &members));
        checks
    }

    fn percentage_sum(
        &self,
        scope: &CheckScope,
        members: &[&StoredRecord],
    ) -> Vec<CrossEntityCheck> {
        let shares: Vec<&StoredRecord> = members
            .iter()
            .copied()
            .filter(|m| m.record.share(self.shares.sum_basis).is_some())
            .collect();
        let fields = names(&["share_percentage"]);

        if shares.is_empty() {
            return vec![
                emit(PERCENT_SUM_OVER, scope, ids(members), fields.clone(), Verdict::NotApplicable),
                emit(PERCENT_SUM_UNDER, scope, ids(members), fields, Verdict::NotApplicable),
            ];
        }

        let total: f64 = shares
            .iter()
            .filter_map(|m| m.record.share(self.shares.sum_basis))
            .sum();
        let epsilon = self.config.sum_epsilon;
        let subjects = ids(&shares);

        let over = if total > 100.0 + epsilon {
            Verdict::Fail(format!(
                "share percentages sum to {:.2}, exceeding 100 ({} members)",
                total,
                shares.len()
            ))
        } else {
            Verdict::Pass
        };
        let under = if total < 100.0 - epsilon {
            Verdict::Fail(format!(
                "share percentages sum to {:.2}; {:.2} unaccounted for, members may be missing",
                total,
                100.0 - total
            ))
        } else {
            Verdict::Pass
        };

        vec![
            emit(PERCENT_SUM_OVER, scope, subjects.clone(), fields.clone(), over),
            emit(PERCENT_SUM_UNDER, scope, subjects, fields, under),
        ]
    }

    /// One failing check per (member, field) out of proportion; a single
    /// passing check when none are
    fn income_proportionality(
        &self,
        scope: &CheckScope,
        members: &[&StoredRecord],
    ) -> Vec<CrossEntityCheck> {
        let basis = self.shares.income_basis;
        let shared: Vec<(&StoredRecord, f64)> = members
            .iter()
            .filter_map(|m| m.record.share(basis).filter(|p| *p > 0.0).map(|p| (*m, p)))
            .collect();

        let mut fields: Vec<String> = proportional_fields().map(|f| f.name().to_string()).collect();
        fields.push("share_percentage".to_string());

        if shared.len() < 2 {
            let verdict = Verdict::NotApplicable;
            return vec![emit(INCOME_PROPORTIONALITY, scope, ids(members), fields, verdict)];
        }

        let mut failures = Vec::new();
        let mut compared = false;
        for field in proportional_fields() {
            let values: Vec<(&StoredRecord, f64, f64)> = shared
                .iter()
                .filter_map(|(m, p)| m.record.amount(field).map(|v| (*m, *p, v)))
                .collect();
            if values.len() < 2 {
                continue;
            }
            let total_value: f64 = values.iter().map(|(_, _, v)| v).sum();
            let total_share: f64 = values.iter().map(|(_, p, _)| p).sum();
            if total_value == 0.0 || total_share == 0.0 {
                continue;
            }
            compared = true;

            for (member, share, value) in &values {
                let expected = share / total_share;
                let actual = value / total_value;
                let deviation = (actual - expected).abs() / expected;
                if deviation > self.config.income_tolerance {
                    failures.push(emit(
                        INCOME_PROPORTIONALITY,
                        scope,
                        vec![member.id],
                        vec![field.name().to_string(), "share_percentage".to_string()],
                        Verdict::Fail(format!(
                            "{}'s {} deviates {:.1}% from its pro-rata share \
                             (expected {:.1}%, actual {:.1}%)",
                            member_label(member),
                            field,
                            deviation * 100.0,
                            expected * 100.0,
                            actual * 100.0
                        )),
                    ));
                }
            }
        }

        if !failures.is_empty() {
            return failures;
        }
        let verdict = if compared { Verdict::Pass } else { Verdict::NotApplicable };
        vec![emit(INCOME_PROPORTIONALITY, scope, ids(members), fields, verdict)]
    }

    /// Absolute deviation of each member's share of the group's ending
    /// balance from its capital share
    fn balance_proportionality(
        &self,
        scope: &CheckScope,
        members: &[&StoredRecord],
    ) -> CrossEntityCheck {
        let ending = MonetaryField::CapitalAccountEnding;
        let basis = self.shares.balance_basis;
        let fields = vec![ending.name().to_string(), "capital_share".to_string()];

        let values: Vec<(&StoredRecord, f64, f64)> = members
            .iter()
            .filter_map(|m| {
                let share = m.record.share(basis).filter(|p| *p > 0.0)?;
                Some((*m, share, m.record.amount(ending)?))
            })
            .collect();

        let total_share: f64 = values.iter().map(|(_, p, _)| p).sum();
        let total_ending: f64 = values.iter().map(|(_, _, v)| v).sum();
        if values.len() < 2 || total_share == 0.0 || total_ending == 0.0 {
            let verdict = Verdict::NotApplicable;
            return emit(BALANCE_PROPORTIONALITY, scope, ids(members), fields, verdict);
        }

        let outliers: Vec<(&StoredRecord, f64, f64)> = values
            .iter()
            .map(|(m, share, value)| (*m, share / total_share, value / total_ending))
            .filter(|(_, expected, actual)| {
                (actual - expected).abs() > self.config.balance_tolerance
            })
            .collect();

        if outliers.is_empty() {
            return emit(BALANCE_PROPORTIONALITY, scope, ids(members), fields, Verdict::Pass);
        }

        let detail: Vec<String> = outliers
            .iter()
            .map(|(m, expected, actual)| {
                format!(
                    "{} holds {:.1}% of ending balances against a {:.1}% capital share",
                    member_label(m),
                    actual * 100.0,
                    expected * 100.0
                )
            })
            .collect();
        let subjects = outliers.iter().map(|(m, _, _)| m.id).collect();
        emit(BALANCE_PROPORTIONALITY, scope, subjects, fields, Verdict::Fail(detail.join("; ")))
    }

    fn entity_identity(&self, scope: &CheckScope, records: &[&StoredRecord]) -> CrossEntityCheck {
        let fields = names(&["entity_name"]);
        let distinct: BTreeSet<&str> = records.iter().filter_map(|r| r.record.name()).collect();
        if distinct.is_empty() {
            return emit(ENTITY_IDENTITY, scope, ids(records), fields, Verdict::NotApplicable);
        }

        let distinct: Vec<&str> = distinct.into_iter().collect();
        let mut mismatches = Vec::new();
        for (i, a) in distinct.iter().enumerate() {
            for b in &distinct[i + 1..] {
                let similarity = bigram_similarity(a, b);
                if similarity < self.config.name_similarity {
                    mismatches.push(format!(
                        "'{}' vs '{}' ({:.0}% similar)",
                        a,
                        b,
                        similarity * 100.0
                    ));
                }
            }
        }

        let verdict = if mismatches.is_empty() {
            Verdict::Pass
        } else {
            Verdict::Fail(format!("inconsistent entity names: {}", mismatches.join("; ")))
        };
        emit(ENTITY_IDENTITY, scope, ids(records), fields, verdict)
    }

    fn distribution_reasonableness(
        &self,
        scope: &CheckScope,
        members: &[&StoredRecord],
    ) -> CrossEntityCheck {
        let mut fields: Vec<String> = vec![MonetaryField::Distributions.name().to_string()];
        fields.extend(proportional_fields().map(|f| f.name().to_string()));

        if members.len() < 2 {
            let verdict = Verdict::NotApplicable;
            return emit(DISTRIBUTION_REASONABLENESS, scope, ids(members), fields, verdict);
        }

        let distributions: f64 = members
            .iter()
            .filter_map(|m| m.record.amount(MonetaryField::Distributions))
            .sum();
        let income: f64 = members
            .iter()
            .flat_map(|m| proportional_fields().filter_map(move |f| m.record.amount(f)))
            .sum();

        let multiple = self.config.distribution_income_multiple;
        let verdict = if income > 0.0 && distributions > income * multiple {
            Verdict::Fail(format!(
                "group distributions ({:.2}) exceed {}x group income ({:.2}); \
                 possible liquidation or extraction error",
                distributions, multiple, income
            ))
        } else {
            Verdict::Pass
        };
        emit(DISTRIBUTION_REASONABLENESS, scope, ids(members), fields, verdict)
    }

    /// Median/MAD outliers of income per share point
    fn income_outliers(
        &self,
        scope: &CheckScope,
        members: &[&StoredRecord],
    ) -> Vec<CrossEntityCheck> {
        let basis = self.shares.income_basis;
        let min_group = self.config.outlier_min_group;
        let mut fields: Vec<String> = proportional_fields().map(|f| f.name().to_string()).collect();
        fields.push("share_percentage".to_string());

        let shared: Vec<(&StoredRecord, f64)> = members
            .iter()
            .filter_map(|m| m.record.share(basis).filter(|p| *p > 0.0).map(|p| (*m, p)))
            .collect();
        if shared.len() < min_group {
            return vec![emit(INCOME_OUTLIER, scope, ids(members), fields, Verdict::NotApplicable)];
        }

        let mut failures = Vec::new();
        let mut compared = false;
        for field in proportional_fields() {
            let normalized: Vec<(&StoredRecord, f64)> = shared
                .iter()
                .filter_map(|(m, p)| m.record.amount(field).map(|v| (*m, v / p)))
                .collect();
            if normalized.len() < min_group {
                continue;
            }
            let values: Vec<f64> = normalized.iter().map(|(_, v)| *v).collect();
            let (center, mad) = match median(&values)
                .and_then(|c| median_absolute_deviation(&values, c).map(|d| (c, d)))
            {
                Some(stats) => stats,
                None => continue,
            };
            compared = true;

            let floor = self.config.outlier_relative_floor * center.abs();
            for (member, value) in &normalized {
                let deviation = (value - center).abs();
                if deviation > self.config.outlier_mad_multiple * mad && deviation > floor {
                    failures.push(emit(
                        INCOME_OUTLIER,
                        scope,
                        vec![member.id],
                        vec![field.name().to_string(), "share_percentage".to_string()],
                        Verdict::Fail(format!(
                            "{}'s {} per share point ({:.2}) is an outlier against \
                             the group median ({:.2}, MAD {:.2})",
                            member_label(member),
                            field,
                            value,
                            center,
                            mad
                        )),
                    ));
                }
            }
        }

        if !failures.is_empty() {
            return failures;
        }
        let verdict = if compared { Verdict::Pass } else { Verdict::NotApplicable };
        vec![emit(INCOME_OUTLIER, scope, ids(members), fields, verdict)]
    }

    /// General individuals with trade income report self-employment
    /// earnings; limited members report them only against compensation.
    /// Entity recipients and members without a resolved role are skipped.
    fn self_employment_consistency(
        &self,
        scope: &CheckScope,
        members: &[&StoredRecord],
    ) -> Vec<CrossEntityCheck> {
        let earnings = MonetaryField::SelfEmploymentEarnings;
        let trade = MonetaryField::OrdinaryBusinessIncome;
        let compensation = MonetaryField::GuaranteedPayments;

        let mut failures = Vec::new();
        let mut compared = false;
        for member in members {
            let record = &member.record;
            let role = match record.role {
                Some(role) => role,
                None => continue,
            };

            if role.is_general() {
                if record.recipient_kind.map_or(false, |k| k.is_entity()) {
                    continue;
                }
                compared = true;
                if let (Some(income), None) = (record.amount(trade), record.amount(earnings)) {
                    if income > 0.0 {
                        failures.push(emit(
                            SELF_EMPLOYMENT_CONSISTENCY,
                            scope,
                            vec![member.id],
                            vec![earnings.name().to_string(), trade.name().to_string()],
                            Verdict::Fail(format!(
                                "{} ({}) has trade income ({:.2}) but no self-employment earnings",
                                member_label(member),
                                role,
                                income
                            )),
                        ));
                    }
                }
            } else if role.is_limited() {
                compared = true;
                let reported = record.amount(earnings).filter(|v| *v > 0.0);
                let paid = record.amount(compensation).filter(|v| *v != 0.0);
                if let (Some(se), None) = (reported, paid) {
                    failures.push(emit(
                        SELF_EMPLOYMENT_CONSISTENCY,
                        scope,
                        vec![member.id],
                        vec![earnings.name().to_string(), compensation.name().to_string()],
                        Verdict::Fail(format!(
                            "{} ({}) has self-employment earnings ({:.2}) but no compensation",
                            member_label(member),
                            role,
                            se
                        )),
                    ));
                }
            }
        }

        if !failures.is_empty() {
            return failures;
        }
        let fields = vec![
            earnings.name().to_string(),
            trade.name().to_string(),
            compensation.name().to_string(),
            "role".to_string(),
        ];
        let verdict = if compared { Verdict::Pass } else { Verdict::NotApplicable };
        vec![emit(SELF_EMPLOYMENT_CONSISTENCY, scope, ids(members), fields, verdict)]
    }

    // -----------------------------------------------------------------------
    // Cross-period pair scope
    // -----------------------------------------------------------------------

    /// Pair checks for every period of a relationship. A period with no
    /// record for the year before gets not-applicable pair checks.
    pub fn reconcile_history<A: RecordAccessor + ?Sized>(
        &self,
        accessor: &A,
        key: &ContinuityKey,
    ) -> Vec<CrossEntityCheck> {
        let pairs = accessor.consecutive_pairs(key);
        let paired: BTreeSet<RecordId> = pairs.iter().map(|(_, current)| current.id).collect();

        let mut latest_by_period: BTreeMap<u16, &StoredRecord> = BTreeMap::new();
        for stored in accessor.history(key) {
            if let Some(period) = stored.record.period_year() {
                latest_by_period.insert(period, stored);
            }
        }

        let mut checks = Vec::new();
        for (period, current) in latest_by_period {
            if paired.contains(&current.id) {
                continue;
            }
            let scope = CheckScope::Pair {
                key: key.clone(),
                prior_period: period.saturating_sub(1),
                current_period: period,
            };
            for kind in [BALANCE_CONTINUITY, ROLE_CONTINUITY, NAME_CONTINUITY] {
                let verdict = Verdict::NotApplicable;
                checks.push(emit(kind, &scope, vec![current.id], Vec::new(), verdict));
            }
        }

        for (prior, current) in pairs {
            checks.extend(self.reconcile_pair(key, prior, current));
        }
        checks
    }

    /// Continuity checks for one (prior, current) pair
    pub fn reconcile_pair(
        &self,
        key: &ContinuityKey,
        prior: &StoredRecord,
        current: &StoredRecord,
    ) -> Vec<CrossEntityCheck> {
        let prior_period = prior.record.period_year().unwrap_or_default();
        let current_period = current.record.period_year().unwrap_or_default();
        let scope = CheckScope::Pair {
            key: key.clone(),
            prior_period,
            current_period,
        };
        let subjects = vec![prior.id, current.id];
        let periods = (prior_period, current_period);

        vec![
            self.balance_continuity(&scope, subjects.clone(), prior, current, periods),
            self.role_continuity(&scope, subjects.clone(), prior, current, periods),
            self.name_continuity(&scope, subjects, prior, current, periods),
        ]
    }

    fn balance_continuity(
        &self,
        scope: &CheckScope,
        subjects: Vec<RecordId>,
        prior: &StoredRecord,
        current: &StoredRecord,
        (prior_period, current_period): (u16, u16),
    ) -> CrossEntityCheck {
        let ending = MonetaryField::CapitalAccountEnding;
        let beginning = MonetaryField::CapitalAccountBeginning;
        let fields = vec![ending.name().to_string(), beginning.name().to_string()];

        let verdict = match (prior.record.amount(ending), current.record.amount(beginning)) {
            (Some(end), Some(begin)) => {
                let difference = (end - begin).abs();
                if difference <= self.config.continuity_tolerance {
                    Verdict::Pass
                } else {
                    Verdict::Fail(format!(
                        "{} ending balance ({:.2}) does not match {} beginning balance ({:.2}): \
                         difference of {:.2}",
                        prior_period, end, current_period, begin, difference
                    ))
                }
            }
            _ => Verdict::NotApplicable,
        };
        emit(BALANCE_CONTINUITY, scope, subjects, fields, verdict)
    }

    fn role_continuity(
        &self,
        scope: &CheckScope,
        subjects: Vec<RecordId>,
        prior: &StoredRecord,
        current: &StoredRecord,
        (prior_period, current_period): (u16, u16),
    ) -> CrossEntityCheck {
        let verdict = match (prior.record.role, current.record.role) {
            (Some(before), Some(after)) if before != after => Verdict::Fail(format!(
                "role changed from {} ({}) to {} ({})",
                before, prior_period, after, current_period
            )),
            (Some(_), Some(_)) => Verdict::Pass,
            _ => Verdict::NotApplicable,
        };
        emit(ROLE_CONTINUITY, scope, subjects, names(&["role"]), verdict)
    }

    fn name_continuity(
        &self,
        scope: &CheckScope,
        subjects: Vec<RecordId>,
        prior: &StoredRecord,
        current: &StoredRecord,
        (prior_period, current_period): (u16, u16),
    ) -> CrossEntityCheck {
        let verdict = match (prior.record.name(), current.record.name()) {
            (Some(before), Some(after)) => {
                let similarity = bigram_similarity(before, after);
                if similarity >= self.config.name_similarity {
                    Verdict::Pass
                } else {
                    Verdict::Fail(format!(
                        "entity name changed from '{}' ({}) to '{}' ({})",
                        before, prior_period, after, current_period
                    ))
                }
            }
            _ => Verdict::NotApplicable,
        };
        emit(NAME_CONTINUITY, scope, subjects, names(&["entity_name"]), verdict)
    }

    // -----------------------------------------------------------------------
    // Composite-key scope
    // -----------------------------------------------------------------------

    /// Every pair of revisions under one composite key is either an exact
    /// duplicate or a possible amendment. Equal monetary fingerprints settle
    /// the duplicate case without a field walk.
    pub fn reconcile_composite(
        &self,
        key: &CompositeKey,
        revisions: &[&StoredRecord],
    ) -> Vec<CrossEntityCheck> {
        let scope = CheckScope::Composite(key.clone());
        let mut checks = Vec::new();

        for (i, earlier) in revisions.iter().enumerate() {
            for later in &revisions[i + 1..] {
                let subjects = vec![earlier.id, later.id];
                let differences = if earlier.amounts_fingerprint == later.amounts_fingerprint {
                    Vec::new()
                } else {
                    ReportComparator::amount_differences(&earlier.record, &later.record)
                };

                if differences.is_empty() {
                    checks.push(emit(
                        EXACT_DUPLICATE,
                        &scope,
                        subjects,
                        MonetaryField::ALL.iter().map(|f| f.name().to_string()).collect(),
                        Verdict::Fail(format!(
                            "{} and {} are exact duplicates for {}",
                            earlier.id, later.id, key
                        )),
                    ));
                } else {
                    let fields: Vec<String> =
                        differences.iter().map(|d| d.field.name().to_string()).collect();
                    let message = format!(
                        "{} may amend {} for {}; differing fields: {}",
                        later.id,
                        earlier.id,
                        key,
                        fields.join(", ")
                    );
                    checks.push(emit(
                        POSSIBLE_AMENDMENT,
                        &scope,
                        subjects,
                        fields,
                        Verdict::Fail(message),
                    ));
                }
            }
        }
        checks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{RecipientKind, Record, Role};
    use crate::store::EntityStore;
    use crate::types::{ValidationReport, Version};

    fn report() -> ValidationReport {
        ValidationReport::from_checks(Version::new(1, 0, 0), Vec::new())
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

    fn reconciler() -> Reconciler {
        Reconciler::new(&ValidatorConfig::default())
    }

    fn failing<'a>(report: &'a ReconciliationReport, id: &str) -> Vec<&'a CrossEntityCheck> {
        report.failures().filter(|c| c.rule_id == id).collect()
    }

    #[test]
    fn test_proportional_group_is_clean() {
        let store = EntityStore::new();
        store.append(member("111-11-1111", 60.0, 600_000.0), report()).unwrap();
        store.append(member("222-22-2222", 25.0, 250_000.0), report()).unwrap();
        store.append(member("333-33-3333", 15.0, 150_000.0), report()).unwrap();

        let result = reconciler().reconcile(&store.snapshot());
        assert_eq!(result.failures().count(), 0, "{:?}", result.failures().collect::<Vec<_>>());
        assert!(result.checks.iter().any(|c| c.rule_id == "XE-SUM-001" && c.applicable));
    }

    #[test]
    fn test_disproportionate_member_flagged() {
        let store = EntityStore::new();
        store.append(member("111-11-1111", 60.0, 600_000.0), report()).unwrap();
        store.append(member("222-22-2222", 25.0, 250_000.0), report()).unwrap();
        let heavy = store.append(member("333-33-3333", 15.0, 750_000.0), report()).unwrap();

        let result = reconciler().reconcile(&store.snapshot());
        let flagged = failing(&result, "XE-PROP-001");
        let heavy_check = flagged.iter().find(|c| c.touches(heavy)).unwrap();
        assert!(heavy_check.message.contains("ordinary_business_income"));
        assert!(heavy_check.message.contains("333-***"));
    }

    #[test]
    fn test_percentage_sum_bounds() {
        let store = EntityStore::new();
        store.append(member("A", 70.0, 1.0), report()).unwrap();
        store.append(member("B", 40.0, 1.0), report()).unwrap();
        let result = reconciler().reconcile(&store.snapshot());
        assert_eq!(failing(&result, "XE-SUM-001").len(), 1);
        assert!(failing(&result, "XE-SUM-002").is_empty());

        let store = EntityStore::new();
        store.append(member("A", 40.0, 1.0), report()).unwrap();
        let result = reconciler().reconcile(&store.snapshot());
        let under = failing(&result, "XE-SUM-002");
        assert_eq!(under.len(), 1);
        assert_eq!(under[0].severity, Severity::Advisory);
    }

    #[test]
    fn test_amendment_not_double_counted_in_sum() {
        let store = EntityStore::new();
        store.append(member("A", 60.0, 600.0), report()).unwrap();
        store.append(member("A", 60.0, 610.0), report()).unwrap();
        store.append(member("B", 40.0, 400.0), report()).unwrap();

        let result = reconciler().reconcile(&store.snapshot());
        assert!(failing(&result, "XE-SUM-001").is_empty());
        assert_eq!(failing(&result, "XE-DUP-002").len(), 1);
    }

    #[test]
    fn test_duplicate_and_amendment() {
        let store = EntityStore::new();
        let mut first = member("A", 100.0, 1_000.0);
        first.set_amount(MonetaryField::InterestIncome, Some(42_315.0));
        let mut amended = first.clone();
        amended.set_amount(MonetaryField::InterestIncome, Some(38_200.0));

        store.append(first.clone(), report()).unwrap();
        store.append(first, report()).unwrap();
        store.append(amended, report()).unwrap();

        let result = reconciler().reconcile(&store.snapshot());
        assert_eq!(failing(&result, "XE-DUP-001").len(), 1);
        let amendments = failing(&result, "XE-DUP-002");
        assert_eq!(amendments.len(), 2);
        assert!(amendments
            .iter()
            .all(|c| c.fields_involved == vec!["interest_income".to_string()]));
    }

    #[test]
    fn test_balance_continuity_reports_gap() {
        let store = EntityStore::new();
        let prior = Record::builder()
            .period("2023")
            .entity("12-3456789", "Granite Peak Partners LP")
            .sub_entity("A")
            .amount(MonetaryField::CapitalAccountEnding, 258_185.0)
            .build();
        let current = Record::builder()
            .period("2024")
            .entity("12-3456789", "Granite Peak Partners LP")
            .sub_entity("A")
            .amount(MonetaryField::CapitalAccountBeginning, 318_500.0)
            .build();
        store.append(prior, report()).unwrap();
        store.append(current, report()).unwrap();

        let result = reconciler().reconcile(&store.snapshot());
        let breaks = failing(&result, "XE-CONT-001");
        assert_eq!(breaks.len(), 1);
        assert_eq!(breaks[0].severity, Severity::Critical);
        assert!(breaks[0].message.contains("60315.00"));
    }

    #[test]
    fn test_first_period_pair_checks_not_applicable() {
        let store = EntityStore::new();
        let id = store.append(member("A", 100.0, 1.0), report()).unwrap();

        let checks = reconciler().reconcile_for(&store.snapshot(), id);
        let continuity: Vec<_> = checks
            .iter()
            .filter(|c| c.rule_id.starts_with("XE-CONT"))
            .collect();
        assert_eq!(continuity.len(), 3);
        assert!(continuity.iter().all(|c| c.passed && !c.applicable));
    }

    #[test]
    fn test_role_change_warns() {
        let store = EntityStore::new();
        let prior = member("A", 100.0, 1.0);
        let mut current = member("A", 100.0, 1.0);
        current.period = Some("2025".to_string());
        current.role = Some(Role::GeneralParticipant);
        store.append(prior, report()).unwrap();
        store.append(current, report()).unwrap();

        let result = reconciler().reconcile(&store.snapshot());
        let changes = failing(&result, "XE-CONT-002");
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].severity, Severity::Warning);
    }

    #[test]
    fn test_identity_mismatch_warns() {
        let store = EntityStore::new();
        store.append(member("A", 50.0, 1.0), report()).unwrap();
        let mut other = member("B", 50.0, 1.0);
        other.entity_name = Some("Harbor Light Capital".to_string());
        store.append(other, report()).unwrap();

        let result = reconciler().reconcile(&store.snapshot());
        assert_eq!(failing(&result, "XE-ID-001").len(), 1);
    }

    #[test]
    fn test_outlier_needs_three_members() {
        let store = EntityStore::new();
        store.append(member("A", 50.0, 500.0), report()).unwrap();
        store.append(member("B", 50.0, 5_000.0), report()).unwrap();
        let result = reconciler().reconcile(&store.snapshot());
        let outlier = result.checks.iter().find(|c| c.rule_id == "XE-OUT-001").unwrap();
        assert!(!outlier.applicable);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let store = EntityStore::new();
        store.append(member("A", 60.0, 600.0), report()).unwrap();
        store.append(member("B", 30.0, 900.0), report()).unwrap();
        let snapshot = store.snapshot();

        let r = reconciler();
        assert_eq!(r.reconcile(&snapshot), r.reconcile(&snapshot));
    }

    fn equal_share_group(incomes: &[f64]) -> (EntityStore, Vec<RecordId>) {
        let store = EntityStore::new();
        let share = 100.0 / incomes.len() as f64;
        let ids = incomes
            .iter()
            .enumerate()
            .map(|(i, income)| {
                store
                    .append(member(&format!("{}00-00-000{}", i + 1, i), share, *income), report())
                    .unwrap()
            })
            .collect();
        (store, ids)
    }

    #[test]
    fn test_outlier_flags_only_the_outlying_member() {
        let (store, ids) = equal_share_group(&[100_000.0, 100_000.0, 101_000.0, 500_000.0]);

        let result = reconciler().reconcile(&store.snapshot());
        let outliers = failing(&result, "XE-OUT-001");
        assert_eq!(outliers.len(), 1, "{:?}", outliers);
        assert_eq!(outliers[0].subjects, vec![ids[3]]);
        assert_eq!(outliers[0].severity, Severity::Warning);
        assert!(outliers[0].message.contains("ordinary_business_income"));
        assert!(outliers[0].message.contains("400-***"));
    }

    #[test]
    fn test_outlier_floor_ignores_small_deviation_with_zero_spread() {
        // Three identical members make the MAD zero
        let (store, _) = equal_share_group(&[100_000.0, 100_000.0, 100_000.0, 100_200.0]);
        let result = reconciler().reconcile(&store.snapshot());
        assert!(failing(&result, "XE-OUT-001").is_empty());
        assert!(result
            .checks
            .iter()
            .any(|c| c.rule_id == "XE-OUT-001" && c.passed && c.applicable));

        let (store, ids) = equal_share_group(&[100_000.0, 100_000.0, 100_000.0, 104_000.0]);
        let result = reconciler().reconcile(&store.snapshot());
        let outliers = failing(&result, "XE-OUT-001");
        assert_eq!(outliers.len(), 1);
        assert!(outliers[0].touches(ids[3]));
    }

    #[test]
    fn test_general_member_without_self_employment_warns() {
        let store = EntityStore::new();
        let mut general = member("111-11-1111", 60.0, 600_000.0);
        general.role = Some(Role::GeneralParticipant);
        let general = store.append(general, report()).unwrap();
        store.append(member("222-22-2222", 40.0, 400_000.0), report()).unwrap();

        let result = reconciler().reconcile(&store.snapshot());
        let flagged = failing(&result, "XE-SE-001");
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].subjects, vec![general]);
        assert_eq!(flagged[0].severity, Severity::Warning);
        assert!(flagged[0].message.contains("111-***"));
    }

    #[test]
    fn test_general_entity_member_needs_no_self_employment() {
        let store = EntityStore::new();
        let mut general = member("111-11-1111", 60.0, 600_000.0);
        general.role = Some(Role::GeneralParticipant);
        general.recipient_kind = Some(RecipientKind::Partnership);
        store.append(general, report()).unwrap();
        store.append(member("222-22-2222", 40.0, 400_000.0), report()).unwrap();

        let result = reconciler().reconcile(&store.snapshot());
        assert!(failing(&result, "XE-SE-001").is_empty());
    }

    #[test]
    fn test_limited_member_self_employment_needs_compensation() {
        let store = EntityStore::new();
        let mut limited = member("222-22-2222", 40.0, 400_000.0);
        limited.set_amount(MonetaryField::SelfEmploymentEarnings, Some(50_000.0));
        let limited_id = store.append(limited.clone(), report()).unwrap();
        store.append(member("111-11-1111", 60.0, 600_000.0), report()).unwrap();

        let result = reconciler().reconcile(&store.snapshot());
        let flagged = failing(&result, "XE-SE-001");
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].subjects, vec![limited_id]);
        assert!(flagged[0].message.contains("50000.00"));

        let store = EntityStore::new();
        limited.set_amount(MonetaryField::GuaranteedPayments, Some(0.0));
        store.append(limited.clone(), report()).unwrap();
        let result = reconciler().reconcile(&store.snapshot());
        assert_eq!(failing(&result, "XE-SE-001").len(), 1);

        let store = EntityStore::new();
        limited.set_amount(MonetaryField::GuaranteedPayments, Some(60_000.0));
        store.append(limited, report()).unwrap();
        let result = reconciler().reconcile(&store.snapshot());
        assert!(failing(&result, "XE-SE-001").is_empty());
    }

    #[test]
    fn test_continuity_tolerance_is_inclusive() {
        let mut config = ValidatorConfig::default();
        config.reconciliation.continuity_tolerance = 0.25;
        let reconciler = Reconciler::new(&config);

        let history = |beginning: f64| {
            let store = EntityStore::new();
            let prior = Record::builder()
                .period("2023")
                .entity("12-3456789", "Granite Peak Partners LP")
                .sub_entity("A")
                .amount(MonetaryField::CapitalAccountEnding, 100.0)
                .build();
            let current = Record::builder()
                .period("2024")
                .entity("12-3456789", "Granite Peak Partners LP")
                .sub_entity("A")
                .amount(MonetaryField::CapitalAccountBeginning, beginning)
                .build();
            store.append(prior, report()).unwrap();
            store.append(current, report()).unwrap();
            store
        };

        let at_tolerance = reconciler.reconcile(&history(100.25).snapshot());
        assert!(failing(&at_tolerance, "XE-CONT-001").is_empty());

        let beyond = reconciler.reconcile(&history(100.5).snapshot());
        assert_eq!(failing(&beyond, "XE-CONT-001").len(), 1);
    }

    #[test]
    fn test_signed_zero_revisions_are_duplicates() {
        let store = EntityStore::new();
        let mut first = member("A", 100.0, 1_000.0);
        first.set_amount(MonetaryField::Distributions, Some(0.0));
        let mut second = first.clone();
        second.set_amount(MonetaryField::Distributions, Some(-0.0));
        store.append(first, report()).unwrap();
        store.append(second, report()).unwrap();

        let result = reconciler().reconcile(&store.snapshot());
        assert_eq!(failing(&result, "XE-DUP-001").len(), 1);
        assert!(failing(&result, "XE-DUP-002").is_empty());
    }
}
