//! zkattest - deterministic proof verification module
//!
//! Embedded in a host chain as a state-transition component. Accepts proof
//! submissions from heterogeneous proof systems, verifies each against its
//! claimed program and public inputs, and records a result every
//! validating node computes identically.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      HOST TRANSACTION                        │
//! │             raw bytes  |  typed Msg  |  block batch          │
//! └───────────────────────────────┬──────────────────────────────┘
//!                                 ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │  codec        "ZKAS" wire format, limits from Params         │
//! │  registry     ProofSystemId -> Backend (fail closed)         │
//! │  backends     zkVM re-execution | Goldilocks STARK | Groth16 │
//! │  store        digest -> VerificationRecord, sequenced        │
//! │  handler      decode -> dispatch -> judge -> record          │
//! └───────────────────────────────┬──────────────────────────────┘
//!                                 ▼
//!                   VerificationEvent ("proof_verified")
//! ```
//!
//! A digest is verified at most once. Later submissions of the same
//! proof replay the stored outcome without running a backend.

pub mod codec;
pub mod error;
pub mod events;
pub mod genesis;
pub mod handler;
pub mod msgs;
pub mod params;
pub mod registry;
pub mod store;
pub mod types;

pub use codec::{DecodeError, EncodeError};
pub use error::TxError;
pub use events::{VerificationEvent, EVENT_KIND};
pub use genesis::{export_genesis, init_genesis, GenesisError, GenesisState};
pub use handler::{HandlerStats, TxContext, TxResponse, VerificationHandler};
pub use msgs::Msg;
pub use params::{Params, ParamsError};
pub use registry::{Backend, BackendRegistry, RegistryError, UnsupportedSystem};
pub use store::{KvRecordStore, KvStore, MemoryKv, MemoryStore, PutOutcome, RecordStore, StoreError};
pub use types::*;

pub use zkattest_verifiers::{MalformedInput, Outcome, RejectReason};
