use serde::{Deserialize, Serialize};
use zkattest_merkle::{Hash, MerklePath};

use super::image::VerifyingKey;
use super::machine::MachineState;

pub const PROOF_VERSION: u8 = 1;

/// Transitions opened in the proof, fewer when the trace is shorter
pub const SPOT_CHECKS: usize = 64;

/// Largest accepted trace, 2^20 rows. Bounds the verifier's re-execution.
pub const MAX_LOG_TRACE_LEN: u8 = 20;

/// A trace row together with its authentication path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowOpening {
    pub row: MachineState,
    pub path: MerklePath,
}

/// Rows `i` and `i + 1` for one sampled step `i`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOpening {
    pub current: RowOpening,
    pub next: RowOpening,
}

/// Execution proof for one run of a zkVM program.
///
/// Commits to the full padded trace and opens the first row, the last row,
/// and one transition per sampled step. Private input travels in the clear.
/// `log_trace_len` must be the smallest that fits the execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZkvmProof {
    pub version: u8,
    pub vk: VerifyingKey,
    pub stdin: Vec<u32>,
    pub log_trace_len: u8,
    pub trace_root: Hash,
    pub first: RowOpening,
    pub last: RowOpening,
    pub transitions: Vec<TransitionOpening>,
}
