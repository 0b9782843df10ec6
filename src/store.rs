//! Accumulation store for evaluated records
//!
//! Appends are serialized per entity identifier: each entity has its own
//! writer lock, so writers on different entities never contend. Committed
//! records live behind an `Arc`ed vector that writers replace wholesale;
//! readers clone the `Arc` and never wait on a writer. Stored records are
//! immutable; an amendment is a new record.

use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::hasher::RecordHasher;
use crate::record::Record;
use crate::types::{
    CompositeKey, ContinuityKey, EntityGroupKey, Fingerprint, RecordId, SnapshotHash,
    ValidationReport,
};

/// A record as committed to the store, with its deterministic report
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub id: RecordId,
    pub record: Record,
    pub report: ValidationReport,
    pub fingerprint: Fingerprint,
    /// Monetary-only fingerprint; equal for exact duplicates
    pub amounts_fingerprint: Fingerprint,
}

impl StoredRecord {
    pub fn group_key(&self) -> Option<EntityGroupKey> {
        self.record.group_key()
    }

    pub fn continuity_key(&self) -> Option<ContinuityKey> {
        self.record.continuity_key()
    }

    pub fn composite_key(&self) -> Option<CompositeKey> {
        self.record.composite_key()
    }
}

/// Query contract the reconciler runs against
pub trait RecordAccessor {
    /// Identifies the exact contents being queried
    fn snapshot_hash(&self) -> SnapshotHash;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn record(&self, id: RecordId) -> Option<&StoredRecord>;

    fn group_keys(&self) -> Vec<EntityGroupKey>;

    /// Every record in a same-period group, in append order
    fn group(&self, key: &EntityGroupKey) -> Vec<&StoredRecord>;

    fn continuity_keys(&self) -> Vec<ContinuityKey>;

    /// Every record of one relationship, ordered by period then append order
    fn history(&self, key: &ContinuityKey) -> Vec<&StoredRecord>;

    fn composite_keys(&self) -> Vec<CompositeKey>;

    /// Every revision filed under a composite key, in append order
    fn composite(&self, key: &CompositeKey) -> Vec<&StoredRecord>;

    /// One record per member of a group: the latest revision for each
    /// sub-entity. Records without a sub-entity identifier are all kept.
    fn latest_in_group(&self, key: &EntityGroupKey) -> Vec<&StoredRecord> {
        let records = self.group(key);
        let mut latest: BTreeMap<&str, &StoredRecord> = BTreeMap::new();
        let mut anonymous = Vec::new();
        for stored in records {
            match stored.record.sub_entity() {
                Some(sub) => {
                    latest.insert(sub, stored);
                }
                None => anonymous.push(stored),
            }
        }
        let mut members: Vec<&StoredRecord> = latest.into_values().chain(anonymous).collect();
        members.sort_by_key(|s| s.id);
        members
    }

    /// (prior, current) pairs for consecutive periods of one relationship,
    /// using the latest revision in each period
    fn consecutive_pairs(&self, key: &ContinuityKey) -> Vec<(&StoredRecord, &StoredRecord)> {
        let mut by_period: BTreeMap<u16, &StoredRecord> = BTreeMap::new();
        for stored in self.history(key) {
            if let Some(period) = stored.record.period_year() {
                by_period.insert(period, stored);
            }
        }
        let periods: Vec<(u16, &StoredRecord)> = by_period.into_iter().collect();
        periods
            .windows(2)
            .filter(|w| u32::from(w[1].0) == u32::from(w[0].0) + 1)
            .map(|w| (w[0].1, w[1].1))
            .collect()
    }
}

struct EntityShard {
    writer: Mutex<()>,
    committed: RwLock<Arc<Vec<Arc<StoredRecord>>>>,
}

impl EntityShard {
    fn new() -> Self {
        Self {
            writer: Mutex::new(()),
            committed: RwLock::new(Arc::new(Vec::new())),
        }
    }

    fn committed(&self) -> Arc<Vec<Arc<StoredRecord>>> {
        self.committed.read().clone()
    }
}

/// In-process store, sharded by entity identifier
pub struct EntityStore {
    shards: RwLock<HashMap<String, Arc<EntityShard>>>,
    next_id: AtomicU64,
    hasher: RecordHasher,
}

impl EntityStore {
    pub fn new() -> Self {
        Self {
            shards: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            hasher: RecordHasher::new(),
        }
    }

    /// Reserve an id for a record that cannot be stored
    pub fn allocate_id(&self) -> RecordId {
        RecordId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Commit an evaluated record.
    ///
    /// The record must carry an entity identifier and a four-digit period;
    /// without them it cannot join any group.
    pub fn append(&self, record: Record, report: ValidationReport) -> Result<RecordId, StoreError> {
        let key = match record.group_key() {
            Some(key) => key,
            None => {
                let missing = if record.entity().is_none() {
                    "entity identifier"
                } else {
                    "four-digit period"
                };
                warn!(missing, "record cannot be indexed");
                return Err(StoreError::MissingKey {
                    key: missing.to_string(),
                });
            }
        };

        let shard = self.shard(&key.entity_id);
        let _guard = shard.writer.lock();

        let id = self.allocate_id();
        let stored = Arc::new(StoredRecord {
            id,
            fingerprint: self.hasher.fingerprint(&record),
            amounts_fingerprint: self.hasher.monetary_fingerprint(&record),
            record,
            report,
        });

        let mut next = Vec::clone(&shard.committed());
        next.push(stored);
        *shard.committed.write() = Arc::new(next);

        debug!(record_id = %id, group = %key, "record appended");
        Ok(id)
    }

    fn shard(&self, entity_id: &str) -> Arc<EntityShard> {
        if let Some(shard) = self.shards.read().get(entity_id) {
            return Arc::clone(shard);
        }
        let mut shards = self.shards.write();
        Arc::clone(
            shards
                .entry(entity_id.to_string())
                .or_insert_with(|| Arc::new(EntityShard::new())),
        )
    }

    /// Number of committed records
    pub fn len(&self) -> usize {
        self.shards.read().values().map(|s| s.committed().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: RecordId) -> Result<Arc<StoredRecord>, StoreError> {
        self.shards
            .read()
            .values()
            .flat_map(|s| s.committed().iter().cloned().collect::<Vec<_>>())
            .find(|s| s.id == id)
            .ok_or(StoreError::UnknownRecord { record_id: id.0 })
    }

    /// Records committed for one entity, in append order
    pub fn entity_records(&self, entity_id: &str) -> Vec<Arc<StoredRecord>> {
        self.shards
            .read()
            .get(entity_id)
            .map(|s| s.committed().iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Point-in-time view over every committed record
    pub fn snapshot(&self) -> StoreSnapshot {
        let records: Vec<Arc<StoredRecord>> = self
            .shards
            .read()
            .values()
            .flat_map(|s| s.committed().iter().cloned().collect::<Vec<_>>())
            .collect();
        StoreSnapshot::build(records, &self.hasher)
    }

    /// Snapshot restricted to one entity
    pub fn entity_snapshot(&self, entity_id: &str) -> StoreSnapshot {
        StoreSnapshot::build(self.entity_records(entity_id), &self.hasher)
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStore")
            .field("entities", &self.shards.read().len())
            .field("records", &self.len())
            .finish()
    }
}

/// Immutable, indexed view of the store at one moment
#[derive(Debug, Clone)]
pub struct StoreSnapshot {
    records: Vec<Arc<StoredRecord>>,
    by_id: HashMap<RecordId, usize>,
    groups: BTreeMap<EntityGroupKey, Vec<usize>>,
    histories: BTreeMap<ContinuityKey, Vec<usize>>,
    composites: BTreeMap<CompositeKey, Vec<usize>>,
    hash: SnapshotHash,
}

impl StoreSnapshot {
    /// Index a set of stored records. Order of the input does not matter.
    pub fn build(mut records: Vec<Arc<StoredRecord>>, hasher: &RecordHasher) -> Self {
        records.sort_by_key(|s| s.id);

        let mut by_id = HashMap::with_capacity(records.len());
        let mut groups: BTreeMap<EntityGroupKey, Vec<usize>> = BTreeMap::new();
        let mut histories: BTreeMap<ContinuityKey, Vec<usize>> = BTreeMap::new();
        let mut composites: BTreeMap<CompositeKey, Vec<usize>> = BTreeMap::new();

        for (index, stored) in records.iter().enumerate() {
            by_id.insert(stored.id, index);
            if let Some(key) = stored.group_key() {
                groups.entry(key).or_default().push(index);
            }
            if let Some(key) = stored.continuity_key() {
                histories.entry(key).or_default().push(index);
            }
            if let Some(key) = stored.composite_key() {
                composites.entry(key).or_default().push(index);
            }
        }

        for indexes in histories.values_mut() {
            indexes.sort_by_key(|i| (records[*i].record.period_year(), records[*i].id));
        }

        let fingerprints: Vec<Fingerprint> = records.iter().map(|s| s.fingerprint).collect();
        let hash = hasher.hash_chain(&fingerprints);

        Self {
            records,
            by_id,
            groups,
            histories,
            composites,
            hash,
        }
    }

    /// Snapshot over records that were never appended to a store
    pub fn from_records(records: Vec<StoredRecord>) -> Self {
        Self::build(records.into_iter().map(Arc::new).collect(), &RecordHasher::new())
    }

    pub fn records(&self) -> impl Iterator<Item = &StoredRecord> {
        self.records.iter().map(|s| s.as_ref())
    }

    fn resolve(&self, indexes: Option<&Vec<usize>>) -> Vec<&StoredRecord> {
        indexes
            .map(|idx| idx.iter().map(|i| self.records[*i].as_ref()).collect())
            .unwrap_or_default()
    }
}

impl RecordAccessor for StoreSnapshot {
    fn snapshot_hash(&self) -> SnapshotHash {
        self.hash
    }

    fn len(&self) -> usize {
        self.records.len()
    }

    fn record(&self, id: RecordId) -> Option<&StoredRecord> {
        self.by_id.get(&id).map(|i| self.records[*i].as_ref())
    }

    fn group_keys(&self) -> Vec<EntityGroupKey> {
        self.groups.keys().cloned().collect()
    }

    fn group(&self, key: &EntityGroupKey) -> Vec<&StoredRecord> {
        self.resolve(self.groups.get(key))
    }

    fn continuity_keys(&self) -> Vec<ContinuityKey> {
        self.histories.keys().cloned().collect()
    }

    fn history(&self, key: &ContinuityKey) -> Vec<&StoredRecord> {
        self.resolve(self.histories.get(key))
    }

    fn composite_keys(&self) -> Vec<CompositeKey> {
        self.composites.keys().cloned().collect()
    }

    fn composite(&self, key: &CompositeKey) -> Vec<&StoredRecord> {
        self.resolve(self.composites.get(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::MonetaryField;
    use crate::types::Version;

    fn report() -> ValidationReport {
        ValidationReport::from_checks(Version::new(1, 0, 0), Vec::new())
    }

    fn record(entity: &str, sub: &str, period: &str, ending: f64) -> Record {
        Record::builder()
            .period(period)
            .entity(entity, "Granite Peak Partners LP")
            .sub_entity(sub)
            .share(50.0)
            .amount(MonetaryField::CapitalAccountEnding, ending)
            .build()
    }

    #[test]
    fn test_append_requires_group_key() {
        let store = EntityStore::new();
        let no_entity = Record::builder().period("2024").build();
        assert!(matches!(
            store.append(no_entity, report()),
            Err(StoreError::MissingKey { .. })
        ));

        let bad_period = Record::builder().entity_id("12-3456789").period("FY24").build();
        assert!(store.append(bad_period, report()).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_snapshot_indexes() {
        let store = EntityStore::new();
        store.append(record("E1", "P1", "2023", 100.0), report()).unwrap();
        store.append(record("E1", "P1", "2024", 110.0), report()).unwrap();
        store.append(record("E1", "P2", "2024", 90.0), report()).unwrap();
        store.append(record("E2", "P1", "2024", 5.0), report()).unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 4);
        assert_eq!(snapshot.group_keys().len(), 3);

        let group = snapshot.group(&EntityGroupKey {
            entity_id: "E1".to_string(),
            period: 2024,
        });
        assert_eq!(group.len(), 2);

        let key = ContinuityKey {
            entity_id: "E1".to_string(),
            sub_entity_id: "P1".to_string(),
        };
        let pairs = snapshot.consecutive_pairs(&key);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].0.record.period_year(), Some(2023));
        assert_eq!(pairs[0].1.record.period_year(), Some(2024));
    }

    #[test]
    fn test_latest_revision_wins() {
        let store = EntityStore::new();
        store.append(record("E1", "P1", "2024", 100.0), report()).unwrap();
        let amended = store.append(record("E1", "P1", "2024", 120.0), report()).unwrap();
        store.append(record("E1", "P2", "2024", 80.0), report()).unwrap();

        let snapshot = store.snapshot();
        let key = EntityGroupKey {
            entity_id: "E1".to_string(),
            period: 2024,
        };
        let members = snapshot.latest_in_group(&key);
        assert_eq!(members.len(), 2);
        assert!(members.iter().any(|m| m.id == amended));

        let composite = snapshot.composite(&CompositeKey {
            entity_id: "E1".to_string(),
            sub_entity_id: "P1".to_string(),
            period: 2024,
        });
        assert_eq!(composite.len(), 2);
    }

    #[test]
    fn test_gap_years_are_not_paired() {
        let store = EntityStore::new();
        store.append(record("E1", "P1", "2021", 100.0), report()).unwrap();
        store.append(record("E1", "P1", "2023", 100.0), report()).unwrap();

        let key = ContinuityKey {
            entity_id: "E1".to_string(),
            sub_entity_id: "P1".to_string(),
        };
        assert!(store.snapshot().consecutive_pairs(&key).is_empty());
    }

    #[test]
    fn test_snapshot_hash_tracks_contents() {
        let store = EntityStore::new();
        store.append(record("E1", "P1", "2024", 100.0), report()).unwrap();
        let first = store.snapshot().snapshot_hash();
        assert_eq!(first, store.snapshot().snapshot_hash());

        store.append(record("E1", "P2", "2024", 100.0), report()).unwrap();
        assert_ne!(first, store.snapshot().snapshot_hash());
    }

    #[test]
    fn test_concurrent_appends() {
        let store = Arc::new(EntityStore::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        let entity = format!("E{}", i % 3);
                        let sub = format!("P{}-{}", t, i);
                        store.append(record(&entity, &sub, "2024", 1.0), report()).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 100);
        let mut ids: Vec<_> = snapshot.records().map(|s| s.id).collect();
        ids.dedup();
        assert_eq!(ids.len(), 100);
    }
}
