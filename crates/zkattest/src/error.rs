//! Transaction errors surfaced to the host application
//!
//! None of these mutate state. Rejected proofs are not errors: they are
//! recorded outcomes.

use thiserror::Error;
use zkattest_verifiers::MalformedInput;

use crate::codec::DecodeError;
use crate::registry::UnsupportedSystem;
use crate::store::StoreError;
use crate::types::ProofSystemId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxError {
    #[error("decode: {0}")]
    Decode(#[from] DecodeError),

    #[error("unsupported proof system {0}")]
    UnsupportedSystem(ProofSystemId),

    #[error("malformed {system} input: {source}")]
    MalformedInput {
        system: ProofSystemId,
        source: MalformedInput,
    },

    #[error("store: {0}")]
    Store(#[from] StoreError),
}

impl TxError {
    /// Stable numeric code for the host application.
    ///
    /// A wire tag naming no known system is caught while decoding but
    /// reports the unsupported-system code, like a known system that is
    /// disabled.
    pub fn code(&self) -> u32 {
        match self {
            TxError::Decode(DecodeError::UnknownProofSystem(_)) => 2,
            TxError::Decode(_) => 1,
            TxError::UnsupportedSystem(_) => 2,
            TxError::MalformedInput { .. } => 3,
            TxError::Store(_) => 4,
        }
    }
}

impl From<UnsupportedSystem> for TxError {
    fn from(e: UnsupportedSystem) -> Self {
        TxError::UnsupportedSystem(e.0)
    }
}
