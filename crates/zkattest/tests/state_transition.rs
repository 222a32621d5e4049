//! End-to-end state transitions over all three backends

use proptest::prelude::*;
use zkattest::codec;
use zkattest::{
    AccountId, BackendRegistry, GenesisState, HandlerStats, KvRecordStore, MemoryStore, Msg, Params,
    ProofSubmission, ProofSystemId, RecordStore, TxContext, TxError, TxResponse, VerificationHandler,
};
use zkattest_field::Goldilocks;
use zkattest_verifiers::groth16::prover::SquareFixture;
use zkattest_verifiers::stark::{prover as stark_prover, TransitionProgram};
use zkattest_verifiers::zkvm::prover::{fibonacci_program, prove};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn account(name: &str) -> AccountId {
    AccountId::new(name.as_bytes().to_vec()).unwrap()
}

fn handler(params: Params) -> VerificationHandler<MemoryStore> {
    let registry = BackendRegistry::from_params(&params).unwrap();
    VerificationHandler::new(params, registry, MemoryStore::new())
}

fn word(v: u32) -> Vec<u8> {
    v.to_le_bytes().to_vec()
}

fn fib_msg(n: u32, submitter: &str) -> Msg {
    let program = fibonacci_program();
    let proven = prove(&program, &[n]).unwrap();
    Msg::VerifySp1 {
        submitter: account(submitter),
        proof: proven.proof_bytes().unwrap(),
        elf: program.to_bytes(),
        public_values: proven.public_inputs(),
    }
}

fn stark_msg(input: u64, steps: u64, submitter: &str) -> Msg {
    let program = TransitionProgram::new(&[1, 0, 1]).unwrap();
    let proven = stark_prover::prove(&program, Goldilocks::new(input), steps).unwrap();
    Msg::VerifyCairo {
        submitter: account(submitter),
        proof: proven.proof_bytes().unwrap(),
        program_hash: proven.program_hash,
        public_inputs: proven.public_inputs(),
    }
}

fn raw(msg: Msg) -> Vec<u8> {
    codec::encode(&msg.into_submission()).unwrap()
}

// ============================================================================
// Fibonacci scenario
// ============================================================================

#[test]
fn test_fibonacci_valid_proof_verified() {
    init_tracing();
    let mut h = handler(Params::default());
    let resp = h.handle_msg(&TxContext::at(100), fib_msg(10, "alice")).unwrap();

    assert!(resp.record.verified);
    assert!(resp.event.verified);
    assert_eq!(resp.record.proof_system, ProofSystemId::Sp1);
    assert_eq!(resp.record.sequence, 1);
    assert_eq!(resp.record.height, 100);
}

#[test]
fn test_fibonacci_wrong_output_rejected() {
    let mut h = handler(Params::default());
    let Msg::VerifySp1 { submitter, proof, elf, .. } = fib_msg(10, "alice") else { unreachable!() };
    let claimed = Msg::VerifySp1 {
        submitter,
        proof,
        elf,
        public_values: vec![word(10), word(55), word(90)],
    };

    let resp = h.handle_msg(&TxContext::at(1), claimed).unwrap();
    assert!(!resp.record.verified);
    assert_eq!(h.store().last_sequence(), 1);
}

#[test]
fn test_long_fibonacci_wrong_output_rejected() {
    let mut h = handler(Params::default());
    let Msg::VerifySp1 { submitter, proof, elf, mut public_values } = fib_msg(300, "alice") else {
        unreachable!()
    };
    public_values[2][0] ^= 1;
    let claimed = Msg::VerifySp1 { submitter, proof, elf, public_values };

    let resp = h.handle_msg(&TxContext::at(1), claimed).unwrap();
    assert!(!resp.record.verified);
    assert_eq!(h.stats().backend_invocations, 1);
}

#[test]
fn test_fibonacci_flipped_byte_never_verifies() {
    let sub = fib_msg(1, "alice").into_submission();

    for i in 0..sub.proof_bytes.len() {
        let mut tampered = sub.clone();
        tampered.proof_bytes[i] ^= 0x04;

        let mut h = handler(Params::default());
        match h.handle_submission(&TxContext::at(1), tampered) {
            Ok(resp) => assert!(!resp.record.verified, "flip at byte {} verified", i),
            Err(TxError::MalformedInput { system, .. }) => assert_eq!(system, ProofSystemId::Sp1),
            Err(other) => panic!("unexpected error {:?}", other),
        }
    }
}

// ============================================================================
// Determinism and idempotence
// ============================================================================

#[test]
fn test_two_nodes_agree() {
    let txs = vec![
        raw(fib_msg(10, "alice")),
        raw(stark_msg(2, 5, "bob")),
        b"garbage".to_vec(),
        raw(fib_msg(3, "carol")),
    ];

    let mut a = handler(Params::default());
    let mut b = handler(Params::default());
    for (height, tx) in txs.iter().enumerate() {
        let ctx = TxContext::at(height as u64 + 1);
        assert_eq!(a.handle_raw(&ctx, tx), b.handle_raw(&ctx, tx));
    }
    assert_eq!(a.store().records().unwrap(), b.store().records().unwrap());
    assert_eq!(a.stats(), b.stats());
}

#[test]
fn test_replay_runs_no_backend() {
    let mut h = handler(Params::default());
    let first = h.handle_msg(&TxContext::at(1), stark_msg(3, 7, "alice")).unwrap();
    let invocations = h.stats().backend_invocations;

    let again = h.handle_msg(&TxContext::at(2), stark_msg(3, 7, "bob")).unwrap();
    assert!(again.replayed);
    assert!(again.event.replayed);
    assert_eq!(again.record, first.record);
    assert_eq!(h.stats().backend_invocations, invocations);
    assert_eq!(h.store().last_sequence(), 1);
}

#[test]
fn test_tampered_inputs_get_new_digest() {
    let mut h = handler(Params::default());
    let good = stark_msg(2, 3, "alice").into_submission();
    let mut bad = good.clone();
    bad.public_inputs[1] = 678u64.to_le_bytes().to_vec();

    let r1 = h.handle_submission(&TxContext::at(1), good).unwrap();
    let r2 = h.handle_submission(&TxContext::at(1), bad).unwrap();
    assert!(r1.record.verified);
    assert!(!r2.record.verified);
    assert_ne!(r1.record.digest, r2.record.digest);
    assert_eq!(r2.record.sequence, 2);
}

#[test]
fn test_program_binding() {
    let mut h = handler(Params::default());
    let mut sub = stark_msg(2, 3, "alice").into_submission();
    sub.program_artifact = TransitionProgram::new(&[2, 0, 1]).unwrap().hash().to_vec();

    let resp = h.handle_submission(&TxContext::at(1), sub).unwrap();
    assert!(!resp.record.verified);
}

#[test]
fn test_unsupported_system() {
    let mut h = handler(Params::default().with_systems(&[ProofSystemId::Sp1]));
    let err = h.handle_msg(&TxContext::at(1), stark_msg(2, 3, "alice")).unwrap_err();
    assert_eq!(err, TxError::UnsupportedSystem(ProofSystemId::Cairo));
    assert_eq!(err.code(), 2);
    assert_eq!(h.store().last_sequence(), 0);

    // unknown tag never reaches the registry
    let mut bytes = raw(fib_msg(3, "alice"));
    bytes[5] = 9;
    let err = h.handle_raw(&TxContext::at(1), &bytes).unwrap_err();
    assert_eq!(err, TxError::Decode(codec::DecodeError::UnknownProofSystem(9)));
    assert_eq!(err.code(), 2);
}

// ============================================================================
// Groth16 through params
// ============================================================================

#[test]
fn test_groth16_keys_from_params() {
    let fixture = SquareFixture::setup(11).unwrap();
    let params = Params::default().with_groth16_keys([fixture.vk_hex()]);
    let mut h = handler(params);

    let (proof, inputs) = fixture.prove(9, 1).unwrap();
    let ok = Msg::VerifyGroth16 {
        submitter: account("alice"),
        proof: proof.clone(),
        vk_id: fixture.vk_id,
        public_inputs: inputs,
    };
    assert!(h.handle_msg(&TxContext::at(1), ok).unwrap().record.verified);

    let (_, other_inputs) = fixture.prove(10, 2).unwrap();
    let wrong = Msg::VerifyGroth16 {
        submitter: account("alice"),
        proof: proof.clone(),
        vk_id: fixture.vk_id,
        public_inputs: other_inputs,
    };
    assert!(!h.handle_msg(&TxContext::at(2), wrong).unwrap().record.verified);

    let unknown = Msg::VerifyGroth16 {
        submitter: account("alice"),
        proof,
        vk_id: [0u8; 32],
        public_inputs: vec![vec![0u8; 32]],
    };
    let err = h.handle_msg(&TxContext::at(3), unknown).unwrap_err();
    assert!(matches!(err, TxError::MalformedInput { system: ProofSystemId::Groth16, .. }));
    assert_eq!(h.store().last_sequence(), 2);
}

// ============================================================================
// Blocks
// ============================================================================

fn mixed_block() -> Vec<Vec<u8>> {
    let fib = raw(fib_msg(8, "alice"));
    let mut malformed = fib_msg(5, "bob").into_submission();
    malformed.program_artifact.truncate(3);
    let mut wrong = stark_msg(2, 4, "carol").into_submission();
    wrong.public_inputs[1] = 1u64.to_le_bytes().to_vec();

    vec![
        fib.clone(),
        raw(stark_msg(2, 4, "dave")),
        codec::encode(&malformed).unwrap(),
        codec::encode(&wrong).unwrap(),
        b"ZKAS".to_vec(),
        fib,
        codec::encode(&malformed).unwrap(),
    ]
}

#[test]
fn test_block_equals_sequential() {
    init_tracing();
    let ctx = TxContext::at(42);

    let mut sequential = handler(Params::default());
    let expected: Vec<Result<TxResponse, TxError>> =
        mixed_block().iter().map(|tx| sequential.handle_raw(&ctx, tx)).collect();

    let mut batched = handler(Params::default());
    let got = batched.execute_block(&ctx, mixed_block());

    assert_eq!(got, expected);
    assert_eq!(batched.store().records().unwrap(), sequential.store().records().unwrap());

    let seq_stats = sequential.stats();
    let batch_stats = batched.stats();
    assert_eq!(batch_stats.recorded, seq_stats.recorded);
    assert_eq!(batch_stats.replays, seq_stats.replays);
    assert_eq!(batch_stats.failed, seq_stats.failed);
}

#[test]
fn test_block_outcomes() {
    let mut h = handler(Params::default());
    let results = h.execute_block(&TxContext::at(5), mixed_block());

    assert!(results[0].as_ref().unwrap().record.verified);
    assert!(results[1].as_ref().unwrap().record.verified);
    assert!(matches!(results[2], Err(TxError::MalformedInput { .. })));
    assert!(!results[3].as_ref().unwrap().record.verified);
    assert!(matches!(results[4], Err(TxError::Decode(_))));
    assert!(results[5].as_ref().unwrap().replayed);
    assert!(matches!(results[6], Err(TxError::MalformedInput { .. })));

    let sequences: Vec<_> = results.iter().flatten().map(|r| r.record.sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3, 1]);
    assert_eq!(
        h.stats(),
        HandlerStats { backend_invocations: 4, replays: 1, recorded: 3, failed: 3 }
    );
}

#[test]
fn test_block_after_prior_records() {
    let mut h = handler(Params::default());
    h.handle_raw(&TxContext::at(1), &raw(fib_msg(8, "alice"))).unwrap();

    let results = h.execute_block(&TxContext::at(2), vec![raw(fib_msg(8, "bob")), raw(fib_msg(9, "bob"))]);
    let first = results[0].as_ref().unwrap();
    assert!(first.replayed);
    assert_eq!(first.record.height, 1);
    assert_eq!(results[1].as_ref().unwrap().record.sequence, 2);
}

// ============================================================================
// Genesis and store
// ============================================================================

#[test]
fn test_genesis_round_trip() {
    let mut h = handler(Params::default());
    h.handle_msg(&TxContext::at(1), fib_msg(6, "alice")).unwrap();
    h.handle_msg(&TxContext::at(2), stark_msg(5, 9, "bob")).unwrap();

    let exported = h.export_genesis().unwrap();
    let json = exported.to_json_pretty().unwrap();
    let imported = GenesisState::from_json(&json).unwrap();
    assert_eq!(imported, exported);

    let mut restored = VerificationHandler::from_genesis(&imported, MemoryStore::new()).unwrap();
    assert_eq!(restored.store().records().unwrap(), h.store().records().unwrap());

    // restored node replays known digests and continues the sequence
    let replay = restored.handle_msg(&TxContext::at(3), fib_msg(6, "carol")).unwrap();
    assert!(replay.replayed);
    assert_eq!(restored.stats().backend_invocations, 0);
    let next = restored.handle_msg(&TxContext::at(3), fib_msg(7, "carol")).unwrap();
    assert_eq!(next.record.sequence, 3);
}

#[test]
fn test_reopened_store_keeps_sequence() {
    let mut h = handler(Params::default());
    h.handle_msg(&TxContext::at(1), fib_msg(6, "alice")).unwrap();
    let kv = h.into_store().into_inner();

    let store = KvRecordStore::open(kv).unwrap();
    let params = Params::default();
    let registry = BackendRegistry::from_params(&params).unwrap();
    let mut h = VerificationHandler::new(params, registry, store);
    let resp = h.handle_msg(&TxContext::at(2), fib_msg(7, "alice")).unwrap();
    assert_eq!(resp.record.sequence, 2);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_handle_raw_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        let mut h = handler(Params::default());
        let _ = h.handle_raw(&TxContext::at(1), &bytes);
    }

    #[test]
    fn test_arbitrary_payloads_never_verify(
        tag in 1u8..=3,
        proof in proptest::collection::vec(any::<u8>(), 0..200),
        artifact in proptest::collection::vec(any::<u8>(), 0..64),
    ) {
        let sub = ProofSubmission {
            proof_system: ProofSystemId::from_tag(tag).unwrap(),
            proof_bytes: proof,
            program_artifact: artifact,
            public_inputs: vec![vec![0u8; 8]; 3],
            submitter: account("fuzz"),
        };
        let mut h = handler(Params::default());
        if let Ok(resp) = h.handle_submission(&TxContext::at(1), sub) {
            prop_assert!(!resp.record.verified);
        }
    }
}
