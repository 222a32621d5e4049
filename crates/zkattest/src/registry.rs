//! Backend registry - maps ProofSystemId to a verifier
//!
//! Built once from [`Params`] and never mutated. Unknown or disabled
//! systems fail closed.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use thiserror::Error;
use tracing::{debug, warn};
use zkattest_verifiers::groth16::KeyError;
use zkattest_verifiers::{Groth16Verifier, MalformedInput, Outcome, ProofVerifier, StarkVerifier, ZkvmVerifier};

use crate::params::{Params, ParamsError};
use crate::types::{ProofSubmission, ProofSystemId};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Params(#[from] ParamsError),
    #[error("groth16 verifying key {index}: {source}")]
    Groth16Key { index: usize, source: KeyError },
}

/// Proof system is known but has no registered backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("proof system {0} is not enabled")]
pub struct UnsupportedSystem(pub ProofSystemId);

/// Closed set of verification backends
#[derive(Debug, Clone)]
pub enum Backend {
    Zkvm(ZkvmVerifier),
    Stark(StarkVerifier),
    Groth16(Groth16Verifier),
}

impl Backend {
    pub fn system(&self) -> ProofSystemId {
        match self {
            Backend::Zkvm(_) => ProofSystemId::Sp1,
            Backend::Stark(_) => ProofSystemId::Cairo,
            Backend::Groth16(_) => ProofSystemId::Groth16,
        }
    }

    /// Verify with panics contained. A backend that panics has met input
    /// it cannot interpret.
    pub fn verify_guarded(
        &self,
        proof: &[u8],
        program_artifact: &[u8],
        public_inputs: &[Vec<u8>],
    ) -> Result<Outcome, MalformedInput> {
        guarded(|| self.verify(proof, program_artifact, public_inputs))
    }

    pub fn verify_submission(&self, submission: &ProofSubmission) -> Result<Outcome, MalformedInput> {
        self.verify_guarded(
            &submission.proof_bytes,
            &submission.program_artifact,
            &submission.public_inputs,
        )
    }
}

impl ProofVerifier for Backend {
    fn verify(
        &self,
        proof: &[u8],
        program_artifact: &[u8],
        public_inputs: &[Vec<u8>],
    ) -> Result<Outcome, MalformedInput> {
        match self {
            Backend::Zkvm(v) => v.verify(proof, program_artifact, public_inputs),
            Backend::Stark(v) => v.verify(proof, program_artifact, public_inputs),
            Backend::Groth16(v) => v.verify(proof, program_artifact, public_inputs),
        }
    }
}

pub(crate) fn guarded<F>(f: F) -> Result<Outcome, MalformedInput>
where
    F: FnOnce() -> Result<Outcome, MalformedInput>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(_) => {
            warn!("backend panicked, treating input as malformed");
            Err(MalformedInput::Panicked)
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BackendRegistry {
    backends: BTreeMap<ProofSystemId, Backend>,
}

impl BackendRegistry {
    pub fn from_params(params: &Params) -> Result<Self, RegistryError> {
        params.validate()?;

        let mut backends = BTreeMap::new();
        for &id in &params.enabled_systems {
            let backend = match id {
                ProofSystemId::Sp1 => Backend::Zkvm(ZkvmVerifier::new()),
                ProofSystemId::Cairo => Backend::Stark(StarkVerifier::new()),
                ProofSystemId::Groth16 => Backend::Groth16(load_groth16_keys(&params.groth16_verifying_keys)?),
            };
            backends.insert(id, backend);
        }

        if !params.is_enabled(ProofSystemId::Groth16) && !params.groth16_verifying_keys.is_empty() {
            warn!(
                keys = params.groth16_verifying_keys.len(),
                "groth16 disabled, ignoring configured verifying keys"
            );
        }
        debug!(systems = ?backends.keys().collect::<Vec<_>>(), "backend registry ready");

        Ok(Self { backends })
    }

    pub fn resolve(&self, id: ProofSystemId) -> Result<&Backend, UnsupportedSystem> {
        self.backends.get(&id).ok_or(UnsupportedSystem(id))
    }

    /// Enabled systems in tag order
    pub fn systems(&self) -> impl Iterator<Item = ProofSystemId> + '_ {
        self.backends.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

fn load_groth16_keys(keys: &[String]) -> Result<Groth16Verifier, RegistryError> {
    let mut verifier = Groth16Verifier::new();
    for (index, key) in keys.iter().enumerate() {
        let loaded = hex::decode(key.trim())
            .map_err(KeyError::from)
            .and_then(|bytes| verifier.add_key(&bytes));
        let id = loaded.map_err(|source| RegistryError::Groth16Key { index, source })?;
        debug!(vk_id = %hex::encode(id), "registered groth16 verifying key");
    }
    Ok(verifier)
}
