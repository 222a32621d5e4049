//! Fiat-Shamir transcript over SHA-256
//!
//! Prover and verifier drive identical sequences of absorb and challenge
//! calls. Every absorbed message is labeled and length prefixed, and each
//! squeeze feeds a counter back into the running state.

use std::collections::BTreeSet;

use sha2::{Digest, Sha256};
use zkattest_field::{Goldilocks, MODULUS};
use zkattest_merkle::Hash;

#[derive(Clone)]
pub struct Transcript {
    hasher: Sha256,
    counter: u32,
}

impl Transcript {
    pub fn new(domain: &[u8]) -> Self {
        let mut transcript = Self {
            hasher: Sha256::new(),
            counter: 0,
        };
        transcript.absorb(b"domain", domain);
        transcript
    }

    pub fn absorb(&mut self, label: &[u8], data: &[u8]) {
        self.hasher.update((label.len() as u32).to_le_bytes());
        self.hasher.update(label);
        self.hasher.update((data.len() as u64).to_le_bytes());
        self.hasher.update(data);
    }

    pub fn absorb_u64(&mut self, label: &[u8], value: u64) {
        self.absorb(label, &value.to_le_bytes());
    }

    pub fn absorb_root(&mut self, root: &Hash) {
        self.absorb(b"merkle_root", root);
    }

    pub fn absorb_field(&mut self, label: &[u8], value: Goldilocks) {
        self.absorb(label, &value.to_le_bytes());
    }

    fn squeeze(&mut self) -> [u8; 32] {
        self.hasher.update(self.counter.to_le_bytes());
        self.counter += 1;
        self.hasher.clone().finalize().into()
    }

    pub fn challenge_u64(&mut self) -> u64 {
        let digest = self.squeeze();
        let mut word = [0u8; 8];
        word.copy_from_slice(&digest[..8]);
        u64::from_le_bytes(word)
    }

    /// Uniform field element; values >= p are rejected and redrawn
    pub fn challenge_field(&mut self) -> Goldilocks {
        loop {
            let candidate = self.challenge_u64();
            if candidate < MODULUS {
                return Goldilocks::new(candidate);
            }
        }
    }

    /// Index in `0..max` (0-based)
    pub fn challenge_index(&mut self, max: usize) -> usize {
        assert!(max > 0, "challenge range must be non-empty");
        (self.challenge_u64() % max as u64) as usize
    }

    /// `min(count, max)` distinct indices in `0..max`, sorted ascending
    pub fn challenge_distinct_indices(&mut self, max: usize, count: usize) -> Vec<usize> {
        let target = count.min(max);
        let mut picked = BTreeSet::new();
        while picked.len() < target {
            picked.insert(self.challenge_index(max));
        }
        picked.into_iter().collect()
    }
}
