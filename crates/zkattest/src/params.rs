//! Module parameters
//!
//! Read-only to the handler. Loaded from JSON (directly or as part of
//! [`GenesisState`](crate::genesis::GenesisState)) and validated before use.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ProofSystemId;

pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 4 * 1024 * 1024;
pub const DEFAULT_MAX_PUBLIC_INPUTS: usize = 64;
pub const DEFAULT_MAX_PUBLIC_INPUT_BYTES: usize = 4 * 1024;

/// Hard ceiling for `max_payload_bytes`, matching the backend proof limit
pub const PAYLOAD_CEILING: usize = zkattest_verifiers::codec::MAX_PROOF_BYTES as usize;

#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("invalid params json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("proof system {0} listed twice")]
    DuplicateSystem(ProofSystemId),
    #[error("max_payload_bytes must be in 1..=16777216, got {0}")]
    PayloadLimit(usize),
    #[error("max_public_inputs must be at most 65535, got {0}")]
    InputCountLimit(usize),
    #[error("max_public_input_bytes must be in 1..=max_payload_bytes, got {0}")]
    InputSizeLimit(usize),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Params {
    pub enabled_systems: Vec<ProofSystemId>,
    /// Cap on a raw submission, checked before any parsing
    pub max_payload_bytes: usize,
    pub max_public_inputs: usize,
    pub max_public_input_bytes: usize,
    /// Hex-encoded compressed Groth16 verifying keys
    pub groth16_verifying_keys: Vec<String>,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            enabled_systems: ProofSystemId::ALL.to_vec(),
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            max_public_inputs: DEFAULT_MAX_PUBLIC_INPUTS,
            max_public_input_bytes: DEFAULT_MAX_PUBLIC_INPUT_BYTES,
            groth16_verifying_keys: Vec::new(),
        }
    }
}

impl Params {
    pub fn from_json(json: &str) -> Result<Self, ParamsError> {
        let params: Params = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    pub fn to_json_pretty(&self) -> Result<String, ParamsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ParamsError> {
        for (i, id) in self.enabled_systems.iter().enumerate() {
            if self.enabled_systems[..i].contains(id) {
                return Err(ParamsError::DuplicateSystem(*id));
            }
        }
        if self.max_payload_bytes == 0 || self.max_payload_bytes > PAYLOAD_CEILING {
            return Err(ParamsError::PayloadLimit(self.max_payload_bytes));
        }
        if self.max_public_inputs > u16::MAX as usize {
            return Err(ParamsError::InputCountLimit(self.max_public_inputs));
        }
        if self.max_public_input_bytes == 0 || self.max_public_input_bytes > self.max_payload_bytes {
            return Err(ParamsError::InputSizeLimit(self.max_public_input_bytes));
        }
        Ok(())
    }

    pub fn is_enabled(&self, id: ProofSystemId) -> bool {
        self.enabled_systems.contains(&id)
    }

    /// Builder-style restriction to a subset of systems
    pub fn with_systems(mut self, systems: &[ProofSystemId]) -> Self {
        self.enabled_systems = systems.to_vec();
        self
    }

    pub fn with_groth16_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groth16_verifying_keys = keys.into_iter().map(Into::into).collect();
        self
    }
}
