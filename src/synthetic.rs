//! Seeded synthetic corpus
//!
//! Generates internally consistent entity groups: shares are whole
//! percentages summing to 100, every income field is split exactly by
//! share, ending balances roll forward from beginning balances, and each
//! period's beginning balance is the prior period's ending balance. Faults
//! can then be injected one at a time. The same seed always yields the same
//! corpus.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::record::{MonetaryField, RecipientKind, Record, Role};

/// Shape of a generated corpus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusShape {
    pub entities: usize,
    pub members: usize,
    pub periods: usize,
    pub first_period: u16,
}

impl Default for CorpusShape {
    fn default() -> Self {
        Self {
            entities: 3,
            members: 4,
            periods: 2,
            first_period: 2023,
        }
    }
}

/// A deliberate inconsistency to inject into a generated corpus
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fault {
    /// Same record ingested twice
    DuplicateIngest,
    /// Second revision with a changed interest amount
    Amendment,
    /// Beginning balance shifted away from the prior ending balance
    ContinuityBreak { delta: f64 },
    /// One member's trade income multiplied
    DisproportionateIncome { factor: f64 },
    /// One member's share raised so the group exceeds 100
    ShareOverflow { extra: f64 },
    /// Every allocated income amount of one member multiplied
    IncomeOutlier { factor: f64 },
}

/// Where a fault landed
#[derive(Debug, Clone, PartialEq)]
pub struct InjectedFault {
    pub fault: Fault,
    /// Index of the record that was modified or added
    pub index: usize,
}

/// Deterministic record generator
#[derive(Debug, Clone)]
pub struct CorpusGenerator {
    rng: ChaCha8Rng,
    seed: u64,
}

impl CorpusGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Records ordered by entity, then period, then member
    pub fn corpus(&mut self, shape: &CorpusShape) -> Vec<Record> {
        (0..shape.entities)
            .flat_map(|entity| self.entity(entity, shape))
            .collect()
    }

    /// Every period of one entity's members
    pub fn entity(&mut self, index: usize, shape: &CorpusShape) -> Vec<Record> {
        let serial = self.rng.gen_range(1_000_000..10_000_000);
        let entity_id = format!("{:02}-{:07}", 10 + index % 90, serial);
        let prefix = pick(&mut self.rng, PREFIXES);
        let suffix = pick(&mut self.rng, SUFFIXES);
        let entity_name = format!("{} {} Partners LP", prefix, suffix);
        let members: Vec<String> = (0..shape.members)
            .map(|m| {
                let serial = self.rng.gen_range(1000..10000);
                format!("{:03}-{:02}-{:04}", 100 + index, m + 10, serial)
            })
            .collect();
        let shares = self.shares(shape.members);

        let mut beginning = f64::from(self.rng.gen_range(100u32..2_000u32)) * 1_000.0;
        let mut records = Vec::with_capacity(shape.members * shape.periods);

        for p in 0..shape.periods {
            let period = shape.first_period + p as u16;
            let obi = f64::from(self.rng.gen_range(50u32..800u32)) * 1_000.0;
            let interest = f64::from(self.rng.gen_range(1u32..50u32)) * 1_000.0;
            let dividends = f64::from(self.rng.gen_range(0u32..40u32)) * 1_000.0;
            let qualified = (dividends * self.rng.gen_range(0.0..1.0)).floor();
            let distributions = ((obi + interest) * self.rng.gen_range(0.1..0.6)).floor();
            let ending = beginning + obi + interest + dividends - distributions;

            for (m, (member, share)) in members.iter().zip(&shares).enumerate() {
                let portion = |total: f64| total * share / 100.0;
                let (role, kind) = if m == 0 {
                    (Role::GeneralParticipant, RecipientKind::Partnership)
                } else {
                    (Role::LimitedParticipant, RecipientKind::Individual)
                };

                records.push(
                    Record::builder()
                        .period(period.to_string())
                        .entity(entity_id.clone(), entity_name.clone())
                        .sub_entity(member.clone())
                        .role(role)
                        .recipient_kind(kind)
                        .share(*share)
                        .amount(MonetaryField::OrdinaryBusinessIncome, portion(obi))
                        .amount(MonetaryField::InterestIncome, portion(interest))
                        .amount(MonetaryField::OrdinaryDividends, portion(dividends))
                        .amount(MonetaryField::QualifiedDividends, portion(qualified))
                        .amount(MonetaryField::Distributions, portion(distributions))
                        .amount(MonetaryField::CapitalAccountBeginning, portion(beginning))
                        .amount(MonetaryField::CapitalAccountEnding, portion(ending))
                        .build(),
                );
            }
            beginning = ending;
        }
        records
    }

    /// Whole percentages, each at least 1, summing to 100
    fn shares(&mut self, members: usize) -> Vec<f64> {
        if members == 0 {
            return Vec::new();
        }
        let weights: Vec<u32> = (0..members).map(|_| self.rng.gen_range(1..10)).collect();
        let total: u32 = weights.iter().sum();
        let spare = 100u32.saturating_sub(members as u32);

        let mut shares: Vec<u32> = weights.iter().map(|w| 1 + w * spare / total).collect();
        let assigned: u32 = shares.iter().sum();
        shares[0] += 100u32.saturating_sub(assigned);
        shares.into_iter().map(f64::from).collect()
    }

    /// Apply a fault to a random eligible record. Returns `None` when the
    /// corpus has nothing the fault can apply to.
    pub fn inject(&mut self, records: &mut Vec<Record>, fault: Fault) -> Option<InjectedFault> {
        if records.is_empty() {
            return None;
        }

        let index = match fault {
            Fault::DuplicateIngest => {
                let source = self.rng.gen_range(0..records.len());
                records.push(records[source].clone());
                records.len() - 1
            }
            Fault::Amendment => {
                let source = self.rng.gen_range(0..records.len());
                let mut amended = records[source].clone();
                let interest = amended.amount(MonetaryField::InterestIncome).unwrap_or(0.0);
                let revised = (interest * self.rng.gen_range(0.8..0.95)).floor();
                amended.set_amount(MonetaryField::InterestIncome, Some(revised));
                shift_ending(&mut amended, revised - interest);
                records.push(amended);
                records.len() - 1
            }
            Fault::ContinuityBreak { delta } => {
                let first = records.iter().filter_map(|r| r.period_year()).min()?;
                let candidates: Vec<usize> = records
                    .iter()
                    .enumerate()
                    .filter(|(_, r)| r.period_year().map_or(false, |p| p > first))
                    .map(|(i, _)| i)
                    .collect();
                if candidates.is_empty() {
                    return None;
                }
                let index = candidates[self.rng.gen_range(0..candidates.len())];
                let record = &mut records[index];
                let field = MonetaryField::CapitalAccountBeginning;
                let beginning = record.amount(field).unwrap_or(0.0);
                record.set_amount(field, Some(beginning + delta));
                shift_ending(record, delta);
                index
            }
            Fault::DisproportionateIncome { factor } => {
                let index = self.rng.gen_range(0..records.len());
                let record = &mut records[index];
                let obi = record.amount(MonetaryField::OrdinaryBusinessIncome).unwrap_or(0.0);
                record.set_amount(MonetaryField::OrdinaryBusinessIncome, Some(obi * factor));
                shift_ending(record, obi * factor - obi);
                index
            }
            Fault::IncomeOutlier { factor } => {
                let index = self.rng.gen_range(0..records.len());
                let record = &mut records[index];
                let mut added = 0.0;
                for field in MonetaryField::ALL.into_iter().filter(|f| f.is_proportional()) {
                    if let Some(value) = record.amount(field) {
                        record.set_amount(field, Some(value * factor));
                        added += value * factor - value;
                    }
                }
                shift_ending(record, added);
                index
            }
            Fault::ShareOverflow { extra } => {
                let index = self.rng.gen_range(0..records.len());
                let record = &mut records[index];
                let share = record.share_percentage.unwrap_or(0.0);
                record.share_percentage = Some((share + extra).min(100.0));
                index
            }
        };

        Some(InjectedFault { fault, index })
    }
}

fn shift_ending(record: &mut Record, delta: f64) {
    if let Some(ending) = record.amount(MonetaryField::CapitalAccountEnding) {
        record.set_amount(MonetaryField::CapitalAccountEnding, Some(ending + delta));
    }
}

const PREFIXES: &[&str] = &["Granite", "Harbor", "Cedar", "Summit", "Prairie", "Northwind"];
const SUFFIXES: &[&str] = &["Peak", "Light", "Ridge", "Creek", "Valley", "Point"];

fn pick<'a>(rng: &mut ChaCha8Rng, options: &[&'a str]) -> &'a str {
    options[rng.gen_range(0..options.len())]
}
