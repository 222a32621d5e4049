//! Core types for the verification module

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// 32-byte hash
pub type Hash = [u8; 32];

/// Host block height
pub type Height = u64;

/// Store-wide record ordinal, starting at 1
pub type Sequence = u64;

pub const ZERO_HASH: Hash = [0u8; 32];

/// Longest accepted submitter identifier
pub const MAX_ACCOUNT_ID_BYTES: usize = 64;

const DIGEST_DOMAIN: &[u8] = b"zkattest/submission/v1";

// ============================================================================
// Proof systems
// ============================================================================

/// Supported proof systems. Tag 0 and every tag not listed here are unknown.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofSystemId {
    /// RISC-style zkVM execution proofs
    Sp1,
    /// Transition-polynomial STARKs over Goldilocks
    Cairo,
    /// Groth16 over BN254
    Groth16,
}

impl ProofSystemId {
    pub const ALL: [ProofSystemId; 3] = [ProofSystemId::Sp1, ProofSystemId::Cairo, ProofSystemId::Groth16];

    /// Wire tag
    pub fn tag(self) -> u8 {
        match self {
            ProofSystemId::Sp1 => 1,
            ProofSystemId::Cairo => 2,
            ProofSystemId::Groth16 => 3,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(ProofSystemId::Sp1),
            2 => Some(ProofSystemId::Cairo),
            3 => Some(ProofSystemId::Groth16),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ProofSystemId::Sp1 => "sp1",
            ProofSystemId::Cairo => "cairo",
            ProofSystemId::Groth16 => "groth16",
        }
    }
}

impl std::fmt::Display for ProofSystemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Accounts
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountIdError {
    #[error("account id is empty")]
    Empty,
    #[error("account id of {0} bytes exceeds 64")]
    TooLong(usize),
    #[error("account id is not valid hex: {0}")]
    Hex(String),
}

/// Opaque submitter identity, 1..=64 bytes. Hex in JSON.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(Vec<u8>);

impl AccountId {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, AccountIdError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(AccountIdError::Empty);
        }
        if bytes.len() > MAX_ACCOUNT_ID_BYTES {
            return Err(AccountIdError::TooLong(bytes.len()));
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<String> for AccountId {
    type Error = AccountIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let bytes = hex::decode(s).map_err(|e| AccountIdError::Hex(e.to_string()))?;
        Self::new(bytes)
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> String {
        hex::encode(id.0)
    }
}

impl std::fmt::Debug for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AccountId({})", hex::encode(&self.0))
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

// ============================================================================
// Submissions and records
// ============================================================================

/// Content address of a submission: system, proof, artifact and inputs.
/// The submitter is not hashed: the same proof from two accounts maps to
/// one record.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VerificationDigest(Hash);

impl VerificationDigest {
    pub fn compute(
        system: ProofSystemId,
        proof: &[u8],
        artifact: &[u8],
        public_inputs: &[Vec<u8>],
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(DIGEST_DOMAIN);
        hasher.update([system.tag()]);
        hasher.update((proof.len() as u64).to_le_bytes());
        hasher.update(proof);
        hasher.update((artifact.len() as u64).to_le_bytes());
        hasher.update(artifact);
        hasher.update((public_inputs.len() as u64).to_le_bytes());
        for input in public_inputs {
            hasher.update((input.len() as u64).to_le_bytes());
            hasher.update(input);
        }
        Self(hasher.finalize().into())
    }

    pub fn from_bytes(bytes: Hash) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &Hash {
        &self.0
    }
}

impl TryFrom<String> for VerificationDigest {
    type Error = hex::FromHexError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        let mut bytes = ZERO_HASH;
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl From<VerificationDigest> for String {
    fn from(digest: VerificationDigest) -> String {
        hex::encode(digest.0)
    }
}

impl std::fmt::Debug for VerificationDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VerificationDigest({})", hex::encode(self.0))
    }
}

impl std::fmt::Display for VerificationDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// A decoded proof submission. Never mutated after decode.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofSubmission {
    pub proof_system: ProofSystemId,
    pub proof_bytes: Vec<u8>,
    pub program_artifact: Vec<u8>,
    pub public_inputs: Vec<Vec<u8>>,
    pub submitter: AccountId,
}

impl ProofSubmission {
    pub fn digest(&self) -> VerificationDigest {
        VerificationDigest::compute(
            self.proof_system,
            &self.proof_bytes,
            &self.program_artifact,
            &self.public_inputs,
        )
    }
}

/// Consensus-visible result of one verification. Created once per digest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub digest: VerificationDigest,
    pub proof_system: ProofSystemId,
    pub verified: bool,
    /// First account to submit this digest
    pub submitter: AccountId,
    pub height: Height,
    pub sequence: Sequence,
}
