// src/lib.rs
//! Binary SHA-256 Merkle tree with single-leaf openings
//!
//! Leaves are arbitrary byte strings. Leaf and interior hashes are domain
//! separated so an interior node can never be passed off as a leaf.

use sha2::{Digest, Sha256};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

pub type Hash = [u8; 32];

const LEAF_PREFIX: u8 = 0x00;
const NODE_PREFIX: u8 = 0x01;

/// Below this many nodes per layer hashing stays on the calling thread
#[cfg(feature = "parallel")]
const PARALLEL_THRESHOLD: usize = 64;

pub struct CompleteMerkleTree {
    pub layers: Vec<Vec<Hash>>,
}

/// Sibling hashes from the leaf level up to (excluding) the root
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MerklePath {
    pub siblings: Vec<Hash>,
}

impl MerklePath {
    pub fn len(&self) -> usize {
        self.siblings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.siblings.is_empty()
    }
}

pub fn is_power_of_two(n: usize) -> bool {
    n > 0 && (n & (n - 1)) == 0
}

pub fn hash_leaf(leaf: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update([LEAF_PREFIX]);
    hasher.update(leaf);
    hasher.finalize().into()
}

pub fn hash_siblings(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update([NODE_PREFIX]);
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

fn hash_leaves<T: AsRef<[u8]> + Sync>(leaves: &[T]) -> Vec<Hash> {
    #[cfg(feature = "parallel")]
    {
        if leaves.len() >= PARALLEL_THRESHOLD {
            return leaves.par_iter().map(|l| hash_leaf(l.as_ref())).collect();
        }
    }
    leaves.iter().map(|l| hash_leaf(l.as_ref())).collect()
}

fn hash_layer(layer: &[Hash]) -> Vec<Hash> {
    #[cfg(feature = "parallel")]
    {
        if layer.len() >= PARALLEL_THRESHOLD {
            return layer
                .par_chunks_exact(2)
                .map(|pair| hash_siblings(&pair[0], &pair[1]))
                .collect();
        }
    }
    layer
        .chunks_exact(2)
        .map(|pair| hash_siblings(&pair[0], &pair[1]))
        .collect()
}

/// Build a tree over `leaves`.
///
/// Panics if the number of leaves is not a power of two. Callers pad their
/// data before committing.
pub fn build_merkle_tree<T: AsRef<[u8]> + Sync>(leaves: &[T]) -> CompleteMerkleTree {
    if leaves.is_empty() {
        return CompleteMerkleTree { layers: vec![] };
    }

    if !is_power_of_two(leaves.len()) {
        panic!("Number of leaves must be a power of 2");
    }

    let mut current = hash_leaves(leaves);
    let mut layers = Vec::with_capacity(leaves.len().trailing_zeros() as usize + 1);

    while current.len() > 1 {
        let next = hash_layer(&current);
        layers.push(current);
        current = next;
    }
    layers.push(current);

    CompleteMerkleTree { layers }
}

impl CompleteMerkleTree {
    pub fn get_root(&self) -> Option<Hash> {
        self.layers.last().and_then(|layer| layer.first()).copied()
    }

    pub fn get_depth(&self) -> usize {
        self.layers.len().saturating_sub(1)
    }

    pub fn num_leaves(&self) -> usize {
        self.layers.first().map_or(0, Vec::len)
    }

    /// Authentication path for the leaf at `index`, bottom to top
    pub fn open(&self, index: usize) -> MerklePath {
        let num_leaves = self.num_leaves();
        if index >= num_leaves {
            panic!("Index {} out of range (tree has {} leaves)", index, num_leaves);
        }

        let mut siblings = Vec::with_capacity(self.get_depth());
        let mut current = index;
        for layer in &self.layers[..self.layers.len() - 1] {
            siblings.push(layer[current ^ 1]);
            current >>= 1;
        }

        MerklePath { siblings }
    }
}

/// Check that `leaf` sits at `index` under `root` in a tree of `depth`.
///
/// Never panics: a path of the wrong length or an index outside the tree
/// simply fails.
pub fn verify_path(root: &Hash, leaf: &[u8], index: usize, path: &MerklePath, depth: usize) -> bool {
    if path.siblings.len() != depth {
        return false;
    }
    if depth < usize::BITS as usize && index >> depth != 0 {
        return false;
    }

    let mut current = hash_leaf(leaf);
    let mut position = index;
    for sibling in &path.siblings {
        current = if position & 1 == 0 {
            hash_siblings(&current, sibling)
        } else {
            hash_siblings(sibling, &current)
        };
        position >>= 1;
    }

    current == *root
}
