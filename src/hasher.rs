//! Content hashing using Blake3
//!
//! Records are hashed over an explicit canonical encoding rather than a
//! serializer's output, so the fingerprint depends only on field values:
//! absence is encoded distinctly from zero, and `-0.0` hashes like `0.0`.

use blake3::Hasher as Blake3Hasher;

use crate::record::{MonetaryField, Record};
use crate::types::{Fingerprint, SnapshotHash};

/// Computes record fingerprints and snapshot hash chains
#[derive(Debug, Clone, Default)]
pub struct RecordHasher;

impl RecordHasher {
    pub fn new() -> Self {
        Self
    }

    /// Fingerprint over every field of the record
    pub fn fingerprint(&self, record: &Record) -> Fingerprint {
        let mut hasher = Blake3Hasher::new();
        hasher.update(b"frve/record/v1");

        update_text(&mut hasher, record.period.as_deref());
        update_text(&mut hasher, record.entity_id.as_deref());
        update_text(&mut hasher, record.entity_name.as_deref());
        update_text(&mut hasher, record.sub_entity_id.as_deref());
        update_text(&mut hasher, record.role_text.as_deref());
        update_text(
            &mut hasher,
            record.recipient_kind.map(|k| format!("{:?}", k)).as_deref(),
        );
        update_amount(&mut hasher, record.share_percentage);
        update_amount(&mut hasher, record.shares.profit);
        update_amount(&mut hasher, record.shares.loss);
        update_amount(&mut hasher, record.shares.capital);
        update_amounts(&mut hasher, record);

        Fingerprint(*hasher.finalize().as_bytes())
    }

    /// Fingerprint over the monetary fields only. Equal for exact duplicates.
    pub fn monetary_fingerprint(&self, record: &Record) -> Fingerprint {
        let mut hasher = Blake3Hasher::new();
        hasher.update(b"frve/amounts/v1");
        update_amounts(&mut hasher, record);
        Fingerprint(*hasher.finalize().as_bytes())
    }

    /// Single hash for an ordered sequence of fingerprints
    pub fn hash_chain(&self, fingerprints: &[Fingerprint]) -> SnapshotHash {
        fingerprints
            .iter()
            .fold(self.genesis(), |chain, next| self.extend_chain(&chain, next))
    }

    /// Chain value before any fingerprint is added
    fn genesis(&self) -> SnapshotHash {
        SnapshotHash(*blake3::hash(b"frve/chain/v1").as_bytes())
    }

    /// Extend a chain by one fingerprint without rehashing what came before
    pub fn extend_chain(&self, previous: &SnapshotHash, next: &Fingerprint) -> SnapshotHash {
        let mut hasher = Blake3Hasher::new();
        hasher.update(&previous.0);
        hasher.update(&next.0);
        SnapshotHash(*hasher.finalize().as_bytes())
    }
}

fn update_text(hasher: &mut Blake3Hasher, value: Option<&str>) {
    match value {
        Some(text) => {
            hasher.update(&[1]);
            hasher.update(&(text.len() as u64).to_le_bytes());
            hasher.update(text.as_bytes());
        }
        None => {
            hasher.update(&[0]);
        }
    }
}

fn update_amount(hasher: &mut Blake3Hasher, value: Option<f64>) {
    match value {
        Some(v) => {
            let v = if v == 0.0 { 0.0 } else { v };
            hasher.update(&[1]);
            hasher.update(&v.to_bits().to_le_bytes());
        }
        None => {
            hasher.update(&[0]);
        }
    }
}

fn update_amounts(hasher: &mut Blake3Hasher, record: &Record) {
    for field in MonetaryField::ALL {
        update_amount(hasher, record.amount(field));
    }
}
