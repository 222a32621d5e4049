//! Genesis import and export
//!
//! The module's genesis is its params plus every verification record, so
//! a chain snapshot can be exported from one node and replayed into a
//! fresh store with identical sequences.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::params::{Params, ParamsError};
use crate::registry::RegistryError;
use crate::store::{PutOutcome, RecordStore, StoreError};
use crate::types::{Sequence, VerificationDigest, VerificationRecord};

#[derive(Debug, Error)]
pub enum GenesisError {
    #[error("genesis json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("genesis params: {0}")]
    Params(#[from] ParamsError),
    #[error("genesis registry: {0}")]
    Registry(RegistryError),
    #[error("genesis record {got} out of order, expected sequence {expected}")]
    Gap { expected: Sequence, got: Sequence },
    #[error("genesis record {0} listed twice")]
    Duplicate(VerificationDigest),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisState {
    pub params: Params,
    #[serde(default)]
    pub records: Vec<VerificationRecord>,
}

impl GenesisState {
    pub fn new(params: Params) -> Self {
        Self { params, records: Vec::new() }
    }

    pub fn from_json(json: &str) -> Result<Self, GenesisError> {
        let genesis: GenesisState = serde_json::from_str(json)?;
        genesis.params.validate()?;
        Ok(genesis)
    }

    pub fn to_json_pretty(&self) -> Result<String, GenesisError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Validate params and load records into `store` in sequence order.
/// Records must continue the store's sequence without gaps. Nothing is
/// written unless every record is accepted.
pub fn init_genesis<S: RecordStore>(store: &mut S, genesis: &GenesisState) -> Result<(), GenesisError> {
    genesis.params.validate()?;

    let mut records = genesis.records.clone();
    records.sort_by_key(|r| r.sequence);

    let mut seen = BTreeSet::new();
    let mut expected = store.last_sequence() + 1;
    for record in &records {
        if record.sequence != expected {
            return Err(GenesisError::Gap { expected, got: record.sequence });
        }
        if !seen.insert(record.digest) || store.get(&record.digest)?.is_some() {
            return Err(GenesisError::Duplicate(record.digest));
        }
        expected += 1;
    }

    for record in records {
        let digest = record.digest;
        if let PutOutcome::AlreadyExists(_) = store.put_if_absent(record)? {
            return Err(GenesisError::Duplicate(digest));
        }
    }

    info!(
        records = genesis.records.len(),
        last_sequence = store.last_sequence(),
        "initialized verification genesis"
    );
    Ok(())
}

pub fn export_genesis<S: RecordStore>(params: &Params, store: &S) -> Result<GenesisState, StoreError> {
    Ok(GenesisState { params: params.clone(), records: store.records()? })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::{AccountId, ProofSystemId};

    fn record(tag: u8, sequence: Sequence) -> VerificationRecord {
        VerificationRecord {
            digest: VerificationDigest::from_bytes([tag; 32]),
            proof_system: ProofSystemId::Groth16,
            verified: true,
            submitter: AccountId::new(vec![tag]).unwrap(),
            height: 1,
            sequence,
        }
    }

    #[test]
    fn test_init_then_export() {
        let genesis = GenesisState {
            params: Params::default(),
            // unordered on purpose
            records: vec![record(2, 2), record(1, 1), record(3, 3)],
        };
        let mut store = MemoryStore::new();
        init_genesis(&mut store, &genesis).unwrap();
        assert_eq!(store.last_sequence(), 3);

        let exported = export_genesis(&genesis.params, &store).unwrap();
        assert_eq!(exported.records, vec![record(1, 1), record(2, 2), record(3, 3)]);
    }

    #[test]
    fn test_gap_rejected() {
        let genesis = GenesisState { params: Params::default(), records: vec![record(1, 1), record(2, 3)] };
        let err = init_genesis(&mut MemoryStore::new(), &genesis).unwrap_err();
        assert!(matches!(err, GenesisError::Gap { expected: 2, got: 3 }));
    }

    #[test]
    fn test_duplicate_digest_rejected() {
        let genesis = GenesisState { params: Params::default(), records: vec![record(1, 1), record(1, 2)] };
        let err = init_genesis(&mut MemoryStore::new(), &genesis).unwrap_err();
        assert!(matches!(err, GenesisError::Duplicate(_)));
    }

    #[test]
    fn test_failed_genesis_writes_nothing() {
        let gap = GenesisState {
            params: Params::default(),
            records: vec![record(1, 1), record(2, 2), record(3, 4)],
        };
        let mut store = MemoryStore::new();
        assert!(matches!(init_genesis(&mut store, &gap), Err(GenesisError::Gap { expected: 3, got: 4 })));
        assert_eq!(store.last_sequence(), 0);
        assert!(store.records().unwrap().is_empty());

        let duplicate = GenesisState {
            params: Params::default(),
            records: vec![record(1, 1), record(2, 2), record(1, 3)],
        };
        assert!(matches!(init_genesis(&mut store, &duplicate), Err(GenesisError::Duplicate(_))));
        assert_eq!(store.last_sequence(), 0);
        assert!(store.records().unwrap().is_empty());
    }

    #[test]
    fn test_digest_already_in_store_rejected() {
        let mut store = MemoryStore::new();
        store.put_if_absent(record(1, 1)).unwrap();

        let genesis = GenesisState { params: Params::default(), records: vec![record(2, 2), record(1, 3)] };
        assert!(matches!(init_genesis(&mut store, &genesis), Err(GenesisError::Duplicate(_))));
        assert_eq!(store.last_sequence(), 1);
    }

    #[test]
    fn test_invalid_params_rejected() {
        let genesis = GenesisState::new(Params { max_public_input_bytes: 0, ..Params::default() });
        let err = init_genesis(&mut MemoryStore::new(), &genesis).unwrap_err();
        assert!(matches!(err, GenesisError::Params(_)));
    }

    #[test]
    fn test_json_round_trip() {
        let genesis = GenesisState { params: Params::default(), records: vec![record(9, 1)] };
        let json = genesis.to_json_pretty().unwrap();
        assert!(json.contains("\"groth16\""));
        assert_eq!(GenesisState::from_json(&json).unwrap(), genesis);
    }

    #[test]
    fn test_minimal_json() {
        let genesis = GenesisState::from_json(r#"{ "params": {} }"#).unwrap();
        assert_eq!(genesis, GenesisState::default());
    }
}
