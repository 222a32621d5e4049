//! State transition handler
//!
//! Per transaction: decode, dispatch to a backend, judge, record. Each
//! stage is its own type, so a record can only be built from a verdict
//! and a verdict only from a resolved backend.
//!
//! ```text
//! raw bytes ──decode──▶ Decoded ──resolve──▶ Dispatched ──verify──▶ Judged ──put──▶ Recorded
//!                                    │
//!                                    └─ digest already stored: replay, no backend runs
//! ```
//!
//! Decode failures, unsupported systems and malformed input are `TxError`s
//! and leave the store untouched.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use zkattest_verifiers::{MalformedInput, Outcome};

use crate::codec;
use crate::error::TxError;
use crate::events::VerificationEvent;
use crate::genesis::{self, GenesisError, GenesisState};
use crate::msgs::Msg;
use crate::params::Params;
use crate::registry::{Backend, BackendRegistry, RegistryError};
use crate::store::{PutOutcome, RecordStore, StoreError};
use crate::types::{AccountId, Height, ProofSubmission, VerificationDigest, VerificationRecord};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Host-supplied context of the transaction being executed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxContext {
    pub height: Height,
}

impl TxContext {
    pub fn at(height: Height) -> Self {
        Self { height }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxResponse {
    pub record: VerificationRecord,
    pub event: VerificationEvent,
    /// The digest was already recorded; no backend ran
    pub replayed: bool,
}

/// Observability counters, no influence on results
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HandlerStats {
    pub backend_invocations: u64,
    pub replays: u64,
    pub recorded: u64,
    pub failed: u64,
}

// ============================================================================
// Stages
// ============================================================================

/// Structurally valid submission with its content address
#[derive(Clone, Debug)]
pub struct Decoded {
    submission: ProofSubmission,
    digest: VerificationDigest,
}

impl Decoded {
    pub fn new(submission: ProofSubmission) -> Self {
        let digest = submission.digest();
        Self { submission, digest }
    }

    pub fn submission(&self) -> &ProofSubmission {
        &self.submission
    }

    pub fn digest(&self) -> VerificationDigest {
        self.digest
    }
}

/// Submission paired with the backend that will judge it
pub struct Dispatched<'r> {
    decoded: Decoded,
    backend: &'r Backend,
}

impl<'r> Dispatched<'r> {
    pub fn resolve(registry: &'r BackendRegistry, decoded: Decoded) -> Result<Self, TxError> {
        let backend = registry.resolve(decoded.submission.proof_system)?;
        Ok(Self { decoded, backend })
    }

    fn run(&self) -> Result<Outcome, MalformedInput> {
        self.backend.verify_submission(&self.decoded.submission)
    }

    /// Turn a backend verdict into a judgement. Malformed input stops here.
    fn judge(self, verdict: Result<Outcome, MalformedInput>) -> Result<Judged, TxError> {
        let system = self.decoded.submission.proof_system;
        match verdict {
            Ok(outcome) => Ok(Judged { decoded: self.decoded, outcome }),
            Err(source) => {
                warn!(digest = %self.decoded.digest, %system, error = %source, "malformed proof input");
                Err(TxError::MalformedInput { system, source })
            }
        }
    }
}

/// Verification ran to completion
pub struct Judged {
    decoded: Decoded,
    outcome: Outcome,
}

impl Judged {
    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    fn record<S: RecordStore>(self, ctx: &TxContext, store: &mut S) -> Result<Recorded, TxError> {
        let record = VerificationRecord {
            digest: self.decoded.digest,
            proof_system: self.decoded.submission.proof_system,
            verified: self.outcome.is_verified(),
            submitter: self.decoded.submission.submitter.clone(),
            height: ctx.height,
            sequence: store.last_sequence() + 1,
        };
        match store.put_if_absent(record.clone())? {
            PutOutcome::Inserted => Ok(Recorded { record, replayed: false }),
            // only reachable if the store changed between lookup and insert
            PutOutcome::AlreadyExists(existing) => Ok(Recorded { record: existing, replayed: true }),
        }
    }
}

/// Outcome persisted (or found persisted)
pub struct Recorded {
    record: VerificationRecord,
    replayed: bool,
}

// ============================================================================
// Handler
// ============================================================================

pub struct VerificationHandler<S: RecordStore> {
    params: Params,
    registry: BackendRegistry,
    store: S,
    stats: HandlerStats,
}

impl<S: RecordStore> VerificationHandler<S> {
    pub fn new(params: Params, registry: BackendRegistry, store: S) -> Self {
        Self { params, registry, store, stats: HandlerStats::default() }
    }

    /// Build the registry from the genesis params and load its records
    pub fn from_genesis(genesis: &GenesisState, mut store: S) -> Result<Self, GenesisError> {
        let registry = BackendRegistry::from_params(&genesis.params).map_err(|e| match e {
            RegistryError::Params(p) => GenesisError::Params(p),
            other => GenesisError::Registry(other),
        })?;
        genesis::init_genesis(&mut store, genesis)?;
        Ok(Self::new(genesis.params.clone(), registry, store))
    }

    pub fn export_genesis(&self) -> Result<GenesisState, StoreError> {
        genesis::export_genesis(&self.params, &self.store)
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn stats(&self) -> HandlerStats {
        self.stats
    }

    pub fn handle_raw(&mut self, ctx: &TxContext, raw: &[u8]) -> Result<TxResponse, TxError> {
        let result = self.decode_raw(raw).and_then(|decoded| self.process(ctx, decoded, None));
        self.tally(result)
    }

    pub fn handle_msg(&mut self, ctx: &TxContext, msg: Msg) -> Result<TxResponse, TxError> {
        self.handle_submission(ctx, msg.into_submission())
    }

    pub fn handle_submission(&mut self, ctx: &TxContext, submission: ProofSubmission) -> Result<TxResponse, TxError> {
        let result = codec::check_limits(&submission, &self.params)
            .map_err(TxError::from)
            .and_then(|()| self.process(ctx, Decoded::new(submission), None));
        self.tally(result)
    }

    /// Execute an ordered batch. Verdicts for new digests are computed up
    /// front (in parallel with the `parallel` feature), then committed in
    /// transaction order. Results equal processing the batch one by one.
    pub fn execute_block(&mut self, ctx: &TxContext, txs: Vec<Vec<u8>>) -> Vec<Result<TxResponse, TxError>> {
        let decoded: Vec<Result<Decoded, TxError>> = txs.iter().map(|raw| self.decode_raw(raw)).collect();

        let verdicts = self.precompute_verdicts(&decoded);
        self.stats.backend_invocations += verdicts.len() as u64;
        debug!(height = ctx.height, txs = txs.len(), verified = verdicts.len(), "executing block");

        decoded
            .into_iter()
            .map(|entry| {
                let result = entry.and_then(|d| {
                    let verdict = verdicts.get(&d.digest).cloned();
                    self.process(ctx, d, verdict)
                });
                self.tally(result)
            })
            .collect()
    }

    fn decode_raw(&self, raw: &[u8]) -> Result<Decoded, TxError> {
        let submission = codec::decode(raw, &self.params).map_err(|e| {
            debug!(error = %e, len = raw.len(), "rejecting undecodable submission");
            TxError::Decode(e)
        })?;
        Ok(Decoded::new(submission))
    }

    /// Verdicts for the first occurrence of every digest that has a backend
    /// and no record yet
    fn precompute_verdicts(
        &self,
        decoded: &[Result<Decoded, TxError>],
    ) -> BTreeMap<VerificationDigest, Result<Outcome, MalformedInput>> {
        let mut seen = BTreeSet::new();
        let mut jobs = Vec::new();
        for d in decoded.iter().flatten() {
            if !seen.insert(d.digest) {
                continue;
            }
            let Ok(backend) = self.registry.resolve(d.submission.proof_system) else {
                continue;
            };
            // store errors resurface when the transaction is committed
            if !matches!(self.store.get(&d.digest), Ok(None)) {
                continue;
            }
            jobs.push((d, backend));
        }

        #[cfg(feature = "parallel")]
        let iter = jobs.par_iter();
        #[cfg(not(feature = "parallel"))]
        let iter = jobs.iter();

        iter.map(|(d, backend)| (d.digest, backend.verify_submission(&d.submission)))
            .collect()
    }

    fn process(
        &mut self,
        ctx: &TxContext,
        decoded: Decoded,
        precomputed: Option<Result<Outcome, MalformedInput>>,
    ) -> Result<TxResponse, TxError> {
        let dispatched = Dispatched::resolve(&self.registry, decoded)?;
        let digest = dispatched.decoded.digest;
        let submitter = dispatched.decoded.submission.submitter.clone();

        if let Some(existing) = self.store.get(&digest)? {
            self.stats.replays += 1;
            debug!(%digest, system = %existing.proof_system, sequence = existing.sequence, "replayed submission");
            return Ok(respond(ctx, Recorded { record: existing, replayed: true }, submitter));
        }

        let verdict = match precomputed {
            Some(verdict) => verdict,
            None => {
                self.stats.backend_invocations += 1;
                dispatched.run()
            }
        };
        let judged = dispatched.judge(verdict)?;
        if let Outcome::Rejected(reason) = judged.outcome {
            debug!(%digest, %reason, "proof rejected");
        }

        let recorded = judged.record(ctx, &mut self.store)?;
        if recorded.replayed {
            self.stats.replays += 1;
        } else {
            self.stats.recorded += 1;
            info!(
                %digest,
                system = %recorded.record.proof_system,
                height = recorded.record.height,
                sequence = recorded.record.sequence,
                verified = recorded.record.verified,
                "verification recorded"
            );
        }
        Ok(respond(ctx, recorded, submitter))
    }

    fn tally(&mut self, result: Result<TxResponse, TxError>) -> Result<TxResponse, TxError> {
        if result.is_err() {
            self.stats.failed += 1;
        }
        result
    }
}

fn respond(ctx: &TxContext, recorded: Recorded, submitter: AccountId) -> TxResponse {
    let event = VerificationEvent::new(&recorded.record, submitter, ctx.height, recorded.replayed);
    TxResponse { record: recorded.record, event, replayed: recorded.replayed }
}
