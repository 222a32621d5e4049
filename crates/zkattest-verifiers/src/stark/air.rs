//! Algebraic statement of an iterated polynomial map
//!
//! A program is a transition polynomial `f` of degree 1..=3 over
//! Goldilocks. The public statement `(input, output, steps)` claims
//! `f^steps(input) = output`. The execution trace `t` has `t[0] = input` and
//! `t[k + 1] = f(t[k])` on every row but the last; `t[steps]` is the output.

use thiserror::Error;
use zkattest_field::{Goldilocks, GENERATOR};

use crate::MalformedInput;

/// LDE blowup, the coset is eight times the trace length
pub const LOG_BLOWUP: u32 = 3;
pub const BLOWUP: usize = 1 << LOG_BLOWUP;

/// Offset of the evaluation coset, outside every power-of-two subgroup
pub const COSET_OFFSET: Goldilocks = GENERATOR;

pub const MIN_TRACE_LEN: usize = 8;
pub const MAX_STEPS: u64 = 1 << 20;
pub const NUM_QUERIES: usize = 32;
pub const MAX_DEGREE: usize = 3;

const PROGRAM_DOMAIN: &[u8] = b"zkattest/stark/program/v1";

pub type ProgramHash = [u8; 32];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProgramError {
    #[error("transition polynomial must have 2..=4 coefficients, got {0}")]
    Degree(usize),
    #[error("coefficient {0} is not a canonical field element")]
    NonCanonical(usize),
    #[error("leading coefficient is zero")]
    ZeroLeading,
}

/// Transition polynomial `f(x) = sum c_i x^i`, lowest degree first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionProgram {
    coeffs: Vec<Goldilocks>,
}

impl TransitionProgram {
    pub fn new(words: &[u64]) -> Result<Self, ProgramError> {
        if words.len() < 2 || words.len() > MAX_DEGREE + 1 {
            return Err(ProgramError::Degree(words.len()));
        }
        let coeffs = words
            .iter()
            .enumerate()
            .map(|(i, w)| Goldilocks::from_canonical(*w).ok_or(ProgramError::NonCanonical(i)))
            .collect::<Result<Vec<_>, _>>()?;
        if coeffs.last().map_or(true, Goldilocks::is_zero) {
            return Err(ProgramError::ZeroLeading);
        }
        Ok(Self { coeffs })
    }

    pub fn degree(&self) -> usize {
        self.coeffs.len() - 1
    }

    pub fn to_words(&self) -> Vec<u64> {
        self.coeffs.iter().map(Goldilocks::value).collect()
    }

    pub fn eval(&self, x: Goldilocks) -> Goldilocks {
        self.coeffs
            .iter()
            .rev()
            .fold(Goldilocks::ZERO, |acc, c| acc * x + *c)
    }

    /// BLAKE3 over a domain tag, the coefficient count and the coefficients
    pub fn hash(&self) -> ProgramHash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(PROGRAM_DOMAIN);
        hasher.update(&(self.coeffs.len() as u32).to_le_bytes());
        for c in &self.coeffs {
            hasher.update(&c.to_le_bytes());
        }
        *hasher.finalize().as_bytes()
    }
}

/// Public statement `f^steps(input) = output`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Statement {
    pub input: Goldilocks,
    pub output: Goldilocks,
    pub steps: u64,
}

impl Statement {
    /// Exactly three 8-byte little-endian words: input, output, steps
    pub fn parse(public_inputs: &[Vec<u8>]) -> Result<Self, MalformedInput> {
        if public_inputs.len() != 3 {
            return Err(MalformedInput::PublicInputs(format!(
                "expected 3 inputs, got {}",
                public_inputs.len()
            )));
        }

        let mut words = [0u64; 3];
        for (i, input) in public_inputs.iter().enumerate() {
            let bytes: [u8; 8] = input.as_slice().try_into().map_err(|_| {
                MalformedInput::PublicInputs(format!("input {} is {} bytes, expected 8", i, input.len()))
            })?;
            words[i] = u64::from_le_bytes(bytes);
        }

        let field = |i: usize| {
            Goldilocks::from_canonical(words[i]).ok_or_else(|| {
                MalformedInput::PublicInputs(format!("input {} is not a canonical field element", i))
            })
        };
        let input = field(0)?;
        let output = field(1)?;

        let steps = words[2];
        if steps == 0 || steps > MAX_STEPS {
            return Err(MalformedInput::PublicInputs(format!(
                "step count {} outside 1..={}",
                steps, MAX_STEPS
            )));
        }

        Ok(Self { input, output, steps })
    }

    pub fn to_public_inputs(&self) -> Vec<Vec<u8>> {
        vec![
            self.input.to_le_bytes().to_vec(),
            self.output.to_le_bytes().to_vec(),
            self.steps.to_le_bytes().to_vec(),
        ]
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_public_inputs().concat()
    }

    /// `max(8, next_pow2(steps + 1))`
    pub fn trace_len(&self) -> usize {
        ((self.steps + 1) as usize).next_power_of_two().max(MIN_TRACE_LEN)
    }

    pub fn log_trace_len(&self) -> u32 {
        self.trace_len().trailing_zeros()
    }
}

/// Trace domain `<omega>` of size n and LDE coset `s * <psi>` of size 8n
#[derive(Debug, Clone, Copy)]
pub struct Domain {
    pub log_n: u32,
    pub omega: Goldilocks,
    pub psi: Goldilocks,
}

impl Domain {
    pub fn new(log_n: u32) -> Option<Self> {
        Some(Self {
            log_n,
            omega: Goldilocks::root_of_unity(log_n)?,
            psi: Goldilocks::root_of_unity(log_n + LOG_BLOWUP)?,
        })
    }

    pub fn trace_len(&self) -> usize {
        1 << self.log_n
    }

    pub fn log_lde_size(&self) -> u32 {
        self.log_n + LOG_BLOWUP
    }

    pub fn lde_size(&self) -> usize {
        1 << self.log_lde_size()
    }

    /// `s * psi^j`
    pub fn lde_point(&self, j: usize) -> Goldilocks {
        COSET_OFFSET * self.psi.pow(j as u64)
    }

    /// LDE index of `omega * x` for `x` at index j
    pub fn next_row_index(&self, j: usize) -> usize {
        (j + BLOWUP) % self.lde_size()
    }

    /// FRI folding rounds: log2 of the composition degree bound
    pub fn fri_rounds(&self, program_degree: usize) -> usize {
        if program_degree >= 3 {
            self.log_n as usize + 1
        } else {
            self.log_n as usize
        }
    }
}

/// Random linear combination of the three constraint quotients at `x`:
///
/// ```text
/// a0 * (T(wx) - f(T(x))) * (x - w^(n-1)) / (x^n - 1)
/// + a1 * (T(x) - input) / (x - 1)
/// + a2 * (T(x) - output) / (x - w^steps)
/// ```
pub fn composition_at(
    program: &TransitionProgram,
    statement: &Statement,
    domain: &Domain,
    alphas: &[Goldilocks; 3],
    x: Goldilocks,
    t: Goldilocks,
    t_next: Goldilocks,
) -> Goldilocks {
    let n = domain.trace_len() as u64;
    let last_row = domain.omega.pow(n - 1);
    let output_row = domain.omega.pow(statement.steps);

    let transition = (t_next - program.eval(t)) * (x - last_row) / (x.pow(n) - Goldilocks::ONE);
    let first = (t - statement.input) / (x - Goldilocks::ONE);
    let last = (t - statement.output) / (x - output_row);

    alphas[0] * transition + alphas[1] * first + alphas[2] * last
}

/// One FRI fold of the pair `f(x)`, `f(-x)` into `g(x^2)`.
///
/// `(a + b) / 2 + beta * (a - b) / (2x)`; swapping the pair together with
/// the sign of `x` gives the same value.
pub fn fold(a: Goldilocks, b: Goldilocks, x: Goldilocks, beta: Goldilocks) -> Goldilocks {
    let two = Goldilocks::TWO;
    (a + b) / two + beta * (a - b) / (two * x)
}
