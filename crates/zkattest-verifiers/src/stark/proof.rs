use serde::{Deserialize, Serialize};
use zkattest_merkle::{Hash, MerklePath};

pub const PROOF_VERSION: u8 = 1;

/// A committed field element (raw u64, must be canonical) and its path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueOpening {
    pub value: u64,
    pub path: MerklePath,
}

/// The queried position of one FRI layer and its folding sibling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerOpening {
    pub value: ValueOpening,
    pub sibling: ValueOpening,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOpening {
    /// trace LDE at the query position
    pub trace: ValueOpening,
    /// trace LDE one trace row later
    pub trace_next: ValueOpening,
    /// one entry per FRI round, layer 0 is the composition polynomial
    pub layers: Vec<LayerOpening>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StarkProof {
    pub version: u8,
    /// transition polynomial coefficients, lowest degree first
    pub program: Vec<u64>,
    pub log_trace_len: u8,
    pub trace_root: Hash,
    pub layer_roots: Vec<Hash>,
    pub final_value: u64,
    pub queries: Vec<QueryOpening>,
}
