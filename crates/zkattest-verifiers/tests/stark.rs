//! End-to-end STARK proving and verification

use zkattest_field::Goldilocks;
use zkattest_verifiers::codec;
use zkattest_verifiers::stark::prover::{prove, ProvenStatement};
use zkattest_verifiers::stark::{StarkProof, TransitionProgram};
use zkattest_verifiers::{MalformedInput, Outcome, ProofVerifier, RejectReason, StarkVerifier};

fn square_plus_one() -> TransitionProgram {
    // f(x) = x^2 + 1
    TransitionProgram::new(&[1, 0, 1]).unwrap()
}

fn fixture(program: &TransitionProgram, input: u64, steps: u64) -> ProvenStatement {
    prove(program, Goldilocks::new(input), steps).unwrap()
}

fn verify(proof: &StarkProof, artifact: &[u8], inputs: &[Vec<u8>]) -> Result<Outcome, MalformedInput> {
    StarkVerifier::new().verify(&codec::encode(proof).unwrap(), artifact, inputs)
}

#[test]
fn test_valid_proofs_verify_for_each_degree() {
    for coeffs in [vec![5u64, 3], vec![1, 0, 1], vec![2, 0, 0, 1]] {
        let program = TransitionProgram::new(&coeffs).unwrap();
        for steps in [1u64, 6, 7, 20] {
            let proven = fixture(&program, 3, steps);
            let outcome = verify(&proven.proof, &proven.program_hash, &proven.public_inputs());
            assert_eq!(outcome, Ok(Outcome::Verified), "degree {} steps {}", program.degree(), steps);
        }
    }
}

#[test]
fn test_output_matches_iteration() {
    let program = square_plus_one();
    let proven = fixture(&program, 2, 3);
    // 2 -> 5 -> 26 -> 677
    assert_eq!(proven.statement.output, Goldilocks::new(677));
}

#[test]
fn test_wrong_output_rejected() {
    let program = square_plus_one();
    let proven = fixture(&program, 2, 3);
    let mut inputs = proven.public_inputs();
    inputs[1] = 678u64.to_le_bytes().to_vec();

    let outcome = verify(&proven.proof, &proven.program_hash, &inputs).unwrap();
    assert!(matches!(
        outcome,
        Outcome::Rejected(RejectReason::MerklePath | RejectReason::Composition)
    ));
}

#[test]
fn test_wrong_input_rejected() {
    let program = square_plus_one();
    let proven = fixture(&program, 2, 3);
    let mut inputs = proven.public_inputs();
    inputs[0] = 3u64.to_le_bytes().to_vec();

    let outcome = verify(&proven.proof, &proven.program_hash, &inputs).unwrap();
    assert!(matches!(outcome, Outcome::Rejected(_)));
}

#[test]
fn test_other_program_hash_rejected() {
    let proven = fixture(&square_plus_one(), 2, 3);
    let other = TransitionProgram::new(&[2, 0, 1]).unwrap().hash();

    let outcome = verify(&proven.proof, &other, &proven.public_inputs()).unwrap();
    assert_eq!(outcome, Outcome::Rejected(RejectReason::ProgramMismatch));
}

#[test]
fn test_substituted_program_rejected() {
    // proof carries a different program than the one the artifact names
    let proven = fixture(&square_plus_one(), 2, 3);
    let mut proof = proven.proof.clone();
    proof.program = vec![2, 0, 1];

    let outcome = verify(&proof, &proven.program_hash, &proven.public_inputs()).unwrap();
    assert_eq!(outcome, Outcome::Rejected(RejectReason::ProgramMismatch));
}

#[test]
fn test_step_count_changes_trace_shape() {
    let proven = fixture(&square_plus_one(), 2, 3);
    let mut inputs = proven.public_inputs();
    inputs[2] = 20u64.to_le_bytes().to_vec();

    let result = verify(&proven.proof, &proven.program_hash, &inputs);
    assert!(matches!(result, Err(MalformedInput::ProofShape(_))));
}

#[test]
fn test_tampered_final_value_rejected() {
    let proven = fixture(&square_plus_one(), 2, 10);
    let mut proof = proven.proof.clone();
    proof.final_value = (Goldilocks::new(proof.final_value) + Goldilocks::ONE).value();

    let outcome = verify(&proof, &proven.program_hash, &proven.public_inputs()).unwrap();
    assert!(matches!(outcome, Outcome::Rejected(_)));
}

#[test]
fn test_non_canonical_value_is_malformed() {
    let proven = fixture(&square_plus_one(), 2, 3);
    let mut proof = proven.proof.clone();
    proof.final_value = u64::MAX;

    let result = verify(&proof, &proven.program_hash, &proven.public_inputs());
    assert!(matches!(result, Err(MalformedInput::ProofShape(_))));
}

#[test]
fn test_flipped_bytes_never_verify() {
    let proven = fixture(&square_plus_one(), 2, 3);
    let bytes = proven.proof_bytes().unwrap();
    let inputs = proven.public_inputs();
    let verifier = StarkVerifier::new();

    for i in (0..bytes.len()).step_by(97) {
        let mut tampered = bytes.clone();
        tampered[i] ^= 0x80;
        let result = verifier.verify(&tampered, &proven.program_hash, &inputs);
        assert_ne!(result, Ok(Outcome::Verified), "flip at byte {} still verifies", i);
    }
}
