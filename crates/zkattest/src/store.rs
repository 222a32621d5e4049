//! Verification record store
//!
//! One record per digest, never overwritten, ordered by a store-wide
//! sequence that grows by exactly one per insert.
//!
//! Layout over a byte key-value store:
//!
//! ```text
//! "vr/" || digest   -> bincode(VerificationRecord)
//! "meta/seq"        -> u64 LE, last assigned sequence
//! ```
//!
//! A record and the counter it advances are written in one batch.

use std::collections::BTreeMap;

use bincode::Options;
use thiserror::Error;

use crate::types::{Sequence, VerificationDigest, VerificationRecord};

const RECORD_PREFIX: &[u8] = b"vr/";
const SEQUENCE_KEY: &[u8] = b"meta/seq";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("record sequence {got} out of order, expected {expected}")]
    OutOfOrder { expected: Sequence, got: Sequence },
    #[error("corrupt store entry: {0}")]
    Corrupt(String),
    #[error("storage backend: {0}")]
    Backend(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PutOutcome {
    Inserted,
    AlreadyExists(VerificationRecord),
}

pub trait RecordStore {
    fn get(&self, digest: &VerificationDigest) -> Result<Option<VerificationRecord>, StoreError>;

    /// Insert unless a record for the digest exists. The record must carry
    /// `last_sequence() + 1`.
    fn put_if_absent(&mut self, record: VerificationRecord) -> Result<PutOutcome, StoreError>;

    /// 0 for an empty store
    fn last_sequence(&self) -> Sequence;

    /// Every record ordered by sequence
    fn records(&self) -> Result<Vec<VerificationRecord>, StoreError>;
}

// ============================================================================
// Key-value contract
// ============================================================================

/// Synchronous byte key-value storage
pub trait KvStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;
    fn put(&mut self, key: &[u8], value: Vec<u8>) -> Result<(), StoreError>;
    /// Write every entry or none of them
    fn write_batch(&mut self, entries: Vec<(Vec<u8>, Vec<u8>)>) -> Result<(), StoreError>;
    /// Entries whose key starts with `prefix`, in key order
    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryKv {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KvStore for MemoryKv {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: &[u8], value: Vec<u8>) -> Result<(), StoreError> {
        self.entries.insert(key.to_vec(), value);
        Ok(())
    }

    fn write_batch(&mut self, entries: Vec<(Vec<u8>, Vec<u8>)>) -> Result<(), StoreError> {
        self.entries.extend(entries);
        Ok(())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        Ok(self
            .entries
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

// ============================================================================
// Record store over a KvStore
// ============================================================================

fn record_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .reject_trailing_bytes()
}

fn record_key(digest: &VerificationDigest) -> Vec<u8> {
    let mut key = Vec::with_capacity(RECORD_PREFIX.len() + 32);
    key.extend_from_slice(RECORD_PREFIX);
    key.extend_from_slice(digest.as_bytes());
    key
}

fn decode_record(bytes: &[u8]) -> Result<VerificationRecord, StoreError> {
    record_options()
        .deserialize(bytes)
        .map_err(|e| StoreError::Corrupt(format!("record: {}", e)))
}

#[derive(Debug, Clone)]
pub struct KvRecordStore<K: KvStore> {
    kv: K,
    last_sequence: Sequence,
}

/// In-memory record store for tests and simulation
pub type MemoryStore = KvRecordStore<MemoryKv>;

impl<K: KvStore> KvRecordStore<K> {
    /// Open over existing storage, recovering the sequence counter.
    /// The counter must match the highest stored record sequence.
    pub fn open(kv: K) -> Result<Self, StoreError> {
        let last_sequence = match kv.get(SEQUENCE_KEY)? {
            None => 0,
            Some(bytes) => {
                let raw: [u8; 8] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| StoreError::Corrupt(format!("sequence of {} bytes", bytes.len())))?;
                u64::from_le_bytes(raw)
            }
        };

        let mut highest = 0;
        for (_, bytes) in kv.scan_prefix(RECORD_PREFIX)? {
            highest = highest.max(decode_record(&bytes)?.sequence);
        }
        if highest != last_sequence {
            return Err(StoreError::Corrupt(format!(
                "sequence counter {} but highest record {}",
                last_sequence, highest
            )));
        }

        Ok(Self { kv, last_sequence })
    }

    pub fn kv(&self) -> &K {
        &self.kv
    }

    pub fn into_inner(self) -> K {
        self.kv
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self { kv: MemoryKv::new(), last_sequence: 0 }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: KvStore> RecordStore for KvRecordStore<K> {
    fn get(&self, digest: &VerificationDigest) -> Result<Option<VerificationRecord>, StoreError> {
        match self.kv.get(&record_key(digest))? {
            None => Ok(None),
            Some(bytes) => {
                let record = decode_record(&bytes)?;
                if record.digest != *digest {
                    return Err(StoreError::Corrupt(format!("record under {} names {}", digest, record.digest)));
                }
                Ok(Some(record))
            }
        }
    }

    fn put_if_absent(&mut self, record: VerificationRecord) -> Result<PutOutcome, StoreError> {
        if let Some(existing) = self.get(&record.digest)? {
            return Ok(PutOutcome::AlreadyExists(existing));
        }

        let expected = self.last_sequence + 1;
        if record.sequence != expected {
            return Err(StoreError::OutOfOrder { expected, got: record.sequence });
        }

        let bytes = record_options()
            .serialize(&record)
            .map_err(|e| StoreError::Corrupt(format!("encode record: {}", e)))?;
        self.kv.write_batch(vec![
            (record_key(&record.digest), bytes),
            (SEQUENCE_KEY.to_vec(), expected.to_le_bytes().to_vec()),
        ])?;
        self.last_sequence = expected;
        Ok(PutOutcome::Inserted)
    }

    fn last_sequence(&self) -> Sequence {
        self.last_sequence
    }

    fn records(&self) -> Result<Vec<VerificationRecord>, StoreError> {
        let mut records = self
            .kv
            .scan_prefix(RECORD_PREFIX)?
            .into_iter()
            .map(|(_, bytes)| decode_record(&bytes))
            .collect::<Result<Vec<_>, _>>()?;
        records.sort_by_key(|r| r.sequence);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AccountId, ProofSystemId};

    fn record(tag: u8, sequence: Sequence) -> VerificationRecord {
        VerificationRecord {
            digest: VerificationDigest::from_bytes([tag; 32]),
            proof_system: ProofSystemId::Sp1,
            verified: tag % 2 == 0,
            submitter: AccountId::new(vec![tag]).unwrap(),
            height: 10 + sequence,
            sequence,
        }
    }

    #[test]
    fn test_insert_and_get() {
        let mut store = MemoryStore::new();
        assert_eq!(store.last_sequence(), 0);
        assert_eq!(store.get(&record(1, 1).digest).unwrap(), None);

        assert_eq!(store.put_if_absent(record(1, 1)).unwrap(), PutOutcome::Inserted);
        assert_eq!(store.last_sequence(), 1);
        assert_eq!(store.get(&record(1, 1).digest).unwrap(), Some(record(1, 1)));
    }

    #[test]
    fn test_never_overwrites() {
        let mut store = MemoryStore::new();
        store.put_if_absent(record(1, 1)).unwrap();

        let mut other = record(1, 2);
        other.verified = !other.verified;
        assert_eq!(
            store.put_if_absent(other).unwrap(),
            PutOutcome::AlreadyExists(record(1, 1))
        );
        assert_eq!(store.last_sequence(), 1);
    }

    #[test]
    fn test_sequence_enforced() {
        let mut store = MemoryStore::new();
        assert_eq!(
            store.put_if_absent(record(1, 2)),
            Err(StoreError::OutOfOrder { expected: 1, got: 2 })
        );
        store.put_if_absent(record(1, 1)).unwrap();
        assert_eq!(
            store.put_if_absent(record(2, 1)),
            Err(StoreError::OutOfOrder { expected: 2, got: 1 })
        );
        assert_eq!(store.last_sequence(), 1);
    }

    #[test]
    fn test_records_ordered_by_sequence() {
        let mut store = MemoryStore::new();
        // digest order differs from insertion order
        for (seq, tag) in [9u8, 3, 7, 1].into_iter().enumerate() {
            store.put_if_absent(record(tag, seq as u64 + 1)).unwrap();
        }
        let sequences: Vec<_> = store.records().unwrap().iter().map(|r| r.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_reopen_recovers_sequence() {
        let mut store = MemoryStore::new();
        store.put_if_absent(record(1, 1)).unwrap();
        store.put_if_absent(record(2, 2)).unwrap();

        let reopened = KvRecordStore::open(store.into_inner()).unwrap();
        assert_eq!(reopened.last_sequence(), 2);
        assert_eq!(reopened.records().unwrap().len(), 2);
    }

    #[test]
    fn test_corrupt_entries_reported() {
        let mut kv = MemoryKv::new();
        kv.put(SEQUENCE_KEY, vec![1, 2, 3]).unwrap();
        assert!(matches!(KvRecordStore::open(kv), Err(StoreError::Corrupt(_))));

        let mut kv = MemoryKv::new();
        let digest = VerificationDigest::from_bytes([5; 32]);
        kv.put(&record_key(&digest), vec![0xff; 3]).unwrap();
        assert!(matches!(KvRecordStore::open(kv.clone()), Err(StoreError::Corrupt(_))));
        let store = MemoryStore { kv, last_sequence: 0 };
        assert!(matches!(store.get(&digest), Err(StoreError::Corrupt(_))));
    }

    /// Memory storage whose batches fail on demand, or land only their
    /// first entry
    #[derive(Default)]
    struct FlakyKv {
        inner: MemoryKv,
        fail_batches: bool,
        torn_batches: bool,
    }

    impl KvStore for FlakyKv {
        fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
            self.inner.get(key)
        }

        fn put(&mut self, key: &[u8], value: Vec<u8>) -> Result<(), StoreError> {
            self.inner.put(key, value)
        }

        fn write_batch(&mut self, mut entries: Vec<(Vec<u8>, Vec<u8>)>) -> Result<(), StoreError> {
            if self.fail_batches {
                return Err(StoreError::Backend("disk full".into()));
            }
            if self.torn_batches {
                entries.truncate(1);
            }
            self.inner.write_batch(entries)
        }

        fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
            self.inner.scan_prefix(prefix)
        }
    }

    #[test]
    fn test_failed_write_leaves_store_unchanged() {
        let mut store = KvRecordStore::open(FlakyKv::default()).unwrap();
        store.put_if_absent(record(1, 1)).unwrap();

        store.kv.fail_batches = true;
        assert_eq!(
            store.put_if_absent(record(2, 2)),
            Err(StoreError::Backend("disk full".into()))
        );
        assert_eq!(store.last_sequence(), 1);
        assert_eq!(store.get(&record(2, 2).digest).unwrap(), None);

        // the next record still takes sequence 2, before and after reopening
        let mut kv = store.into_inner();
        kv.fail_batches = false;
        let mut reopened = KvRecordStore::open(kv).unwrap();
        assert_eq!(reopened.last_sequence(), 1);
        assert_eq!(reopened.put_if_absent(record(3, 2)).unwrap(), PutOutcome::Inserted);
        let sequences: Vec<_> = reopened.records().unwrap().iter().map(|r| r.sequence).collect();
        assert_eq!(sequences, vec![1, 2]);
    }

    #[test]
    fn test_torn_write_detected_on_open() {
        let kv = FlakyKv { torn_batches: true, ..FlakyKv::default() };
        let mut store = KvRecordStore::open(kv).unwrap();
        store.put_if_absent(record(1, 1)).unwrap();

        // record landed without its counter
        assert!(matches!(
            KvRecordStore::open(store.into_inner()),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn test_scan_prefix_bounds() {
        let mut kv = MemoryKv::new();
        kv.put(b"vq", vec![0]).unwrap();
        kv.put(b"vr/a", vec![1]).unwrap();
        kv.put(b"vr/b", vec![2]).unwrap();
        kv.put(b"vs", vec![3]).unwrap();
        let found: Vec<_> = kv.scan_prefix(b"vr/").unwrap().into_iter().map(|(_, v)| v[0]).collect();
        assert_eq!(found, vec![1, 2]);
    }
}
