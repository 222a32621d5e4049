// src/lib.rs
//! Goldilocks prime field GF(p), p = 2^64 - 2^32 + 1
//!
//! All arithmetic is integer-only and branch-deterministic so that every
//! validator derives bit-identical values from the same proof.

mod goldilocks;
pub mod ntt;

pub use goldilocks::{Goldilocks, GENERATOR, MODULUS, TWO_ADICITY};
pub use ntt::{batch_inverse, evaluate_on_coset, fft, ifft, interpolate};
