//! Radix-2 number theoretic transform over Goldilocks
//!
//! Only the prover side (trace interpolation, low degree extension) runs
//! these; verification evaluates single points and never needs an NTT.

use crate::goldilocks::Goldilocks;

fn reverse_bits(index: usize, log_n: u32) -> usize {
    if log_n == 0 {
        0
    } else {
        index.reverse_bits() >> (usize::BITS - log_n)
    }
}

/// In-place evaluation of the polynomial with coefficients `values` over
/// the subgroup generated by `root`.
///
/// Panics if the length is not a power of two.
pub fn fft(values: &mut [Goldilocks], root: Goldilocks) {
    let n = values.len();
    assert!(n.is_power_of_two(), "NTT size must be a power of 2");
    let log_n = n.trailing_zeros();

    for i in 0..n {
        let j = reverse_bits(i, log_n);
        if i < j {
            values.swap(i, j);
        }
    }

    let mut len = 2;
    while len <= n {
        let half = len / 2;
        let step = root.pow((n / len) as u64);
        for start in (0..n).step_by(len) {
            let mut w = Goldilocks::ONE;
            for k in 0..half {
                let u = values[start + k];
                let v = values[start + k + half] * w;
                values[start + k] = u + v;
                values[start + k + half] = u - v;
                w *= step;
            }
        }
        len <<= 1;
    }
}

/// Inverse of [`fft`]: evaluations over `<root>` back to coefficients
pub fn ifft(values: &mut [Goldilocks], root: Goldilocks) {
    let n = values.len();
    let root_inv = root.inverse().expect("root of unity is never zero");
    fft(values, root_inv);

    let n_inv = Goldilocks::new(n as u64)
        .inverse()
        .expect("NTT size is non-zero in the field");
    for v in values.iter_mut() {
        *v *= n_inv;
    }
}

/// Coefficients of the unique polynomial of degree < n taking `evals` on
/// the canonical subgroup of order n
pub fn interpolate(evals: &[Goldilocks]) -> Vec<Goldilocks> {
    let n = evals.len();
    assert!(n.is_power_of_two(), "NTT size must be a power of 2");
    let root = Goldilocks::root_of_unity(n.trailing_zeros()).expect("domain too large");
    let mut coeffs = evals.to_vec();
    ifft(&mut coeffs, root);
    coeffs
}

/// Evaluate `coeffs` over the coset `offset * <w>` where `w` has order
/// 2^log_size. Element `i` of the result corresponds to `offset * w^i`.
pub fn evaluate_on_coset(
    coeffs: &[Goldilocks],
    offset: Goldilocks,
    log_size: u32,
) -> Vec<Goldilocks> {
    let size = 1usize << log_size;
    assert!(coeffs.len() <= size, "polynomial does not fit the domain");
    let root = Goldilocks::root_of_unity(log_size).expect("domain too large");

    let mut values = vec![Goldilocks::ZERO; size];
    let mut shift = Goldilocks::ONE;
    for (slot, c) in values.iter_mut().zip(coeffs) {
        *slot = *c * shift;
        shift *= offset;
    }
    fft(&mut values, root);
    values
}

/// Montgomery batch inversion; zeros stay zero
pub fn batch_inverse(values: &[Goldilocks]) -> Vec<Goldilocks> {
    let mut prefix = Vec::with_capacity(values.len());
    let mut acc = Goldilocks::ONE;
    for v in values {
        prefix.push(acc);
        if !v.is_zero() {
            acc *= *v;
        }
    }

    let mut inv = acc.inverse().unwrap_or(Goldilocks::ZERO);
    let mut out = vec![Goldilocks::ZERO; values.len()];
    for i in (0..values.len()).rev() {
        if values[i].is_zero() {
            continue;
        }
        out[i] = prefix[i] * inv;
        inv *= values[i];
    }
    out
}
