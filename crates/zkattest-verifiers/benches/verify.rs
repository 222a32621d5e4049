//! Backend verification benchmarks
//!
//! Usage:
//!   cargo bench -p zkattest-verifiers --features prover             # everything
//!   cargo bench -p zkattest-verifiers --features prover -- zkvm     # one backend

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use zkattest_field::Goldilocks;
use zkattest_verifiers::groth16::prover::SquareFixture;
use zkattest_verifiers::stark::{prover as stark_prover, TransitionProgram};
use zkattest_verifiers::zkvm::prover as zkvm_prover;
use zkattest_verifiers::{Groth16Verifier, ProofVerifier, StarkVerifier, ZkvmVerifier};

fn bench_zkvm(c: &mut Criterion) {
    let mut group = c.benchmark_group("zkvm");
    let program = zkvm_prover::fibonacci_program();
    let image = program.to_bytes();

    for n in [10u32, 1000] {
        let proven = zkvm_prover::prove(&program, &[n]).unwrap();
        let proof = proven.proof_bytes().unwrap();
        let inputs = proven.public_inputs();
        println!("zkvm fib({}) proof size: {} bytes", n, proof.len());

        group.bench_function(BenchmarkId::new("verify", n), |b| {
            b.iter(|| {
                let outcome = ZkvmVerifier::new().verify(black_box(&proof), &image, &inputs);
                black_box(outcome)
            });
        });
    }

    group.finish();
}

fn bench_stark(c: &mut Criterion) {
    let mut group = c.benchmark_group("stark");
    group.sample_size(20);
    let program = TransitionProgram::new(&[1, 0, 1]).unwrap();

    for steps in [63u64, 4095] {
        let proven = stark_prover::prove(&program, Goldilocks::new(2), steps).unwrap();
        let proof = proven.proof_bytes().unwrap();
        let inputs = proven.public_inputs();
        println!("stark {} steps proof size: {} bytes", steps, proof.len());

        group.bench_function(BenchmarkId::new("verify", steps), |b| {
            b.iter(|| {
                let outcome = StarkVerifier::new().verify(black_box(&proof), &proven.program_hash, &inputs);
                black_box(outcome)
            });
        });
    }

    group.bench_function("prove/4095", |b| {
        b.iter(|| stark_prover::prove(&program, black_box(Goldilocks::new(2)), 4095).unwrap());
    });

    group.finish();
}

fn bench_groth16(c: &mut Criterion) {
    let mut group = c.benchmark_group("groth16");
    let fixture = SquareFixture::setup(1).unwrap();
    let verifier = Groth16Verifier::from_hex_keys([fixture.vk_hex()]).unwrap();
    let (proof, inputs) = fixture.prove(3, 2).unwrap();

    group.bench_function("verify", |b| {
        b.iter(|| {
            let outcome = verifier.verify(black_box(&proof), &fixture.vk_id, &inputs);
            black_box(outcome)
        });
    });

    group.finish();
}

criterion_group!(benches, bench_zkvm, bench_stark, bench_groth16);
criterion_main!(benches);
