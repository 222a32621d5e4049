//! Result events emitted once per processed submission

use serde::{Deserialize, Serialize};

use crate::types::{AccountId, Height, ProofSystemId, Sequence, VerificationDigest, VerificationRecord};

pub const EVENT_KIND: &str = "proof_verified";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationEvent {
    pub digest: VerificationDigest,
    pub proof_system: ProofSystemId,
    pub verified: bool,
    /// Account that sent this transaction, not necessarily the recorded one
    pub submitter: AccountId,
    pub height: Height,
    pub sequence: Sequence,
    pub replayed: bool,
}

impl VerificationEvent {
    /// Event for a record as seen by `submitter`
    pub fn new(record: &VerificationRecord, submitter: AccountId, height: Height, replayed: bool) -> Self {
        Self {
            digest: record.digest,
            proof_system: record.proof_system,
            verified: record.verified,
            submitter,
            height,
            sequence: record.sequence,
            replayed,
        }
    }

    pub fn kind(&self) -> &'static str {
        EVENT_KIND
    }

    /// Flat string attributes for indexers
    pub fn attributes(&self) -> Vec<(&'static str, String)> {
        vec![
            ("digest", self.digest.to_string()),
            ("proof_system", self.proof_system.to_string()),
            ("verified", self.verified.to_string()),
            ("submitter", self.submitter.to_string()),
            ("height", self.height.to_string()),
            ("sequence", self.sequence.to_string()),
            ("replayed", self.replayed.to_string()),
        ]
    }
}
