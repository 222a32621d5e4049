//! Submission wire format
//!
//! ```text
//! magic        4 bytes  "ZKAS"
//! version      u8       = 1
//! proof_system u8       wire tag
//! submitter    u16 len  + bytes   (1..=64)
//! proof        u32 len  + bytes
//! artifact     u32 len  + bytes
//! inputs       u16 count, then per input: u32 len + bytes
//! ```
//!
//! All integers little endian. Decoding is structural only: no hashing,
//! no cryptography, and never an allocation larger than the input.

use thiserror::Error;

use crate::params::Params;
use crate::types::{AccountId, AccountIdError, ProofSubmission, ProofSystemId, MAX_ACCOUNT_ID_BYTES};

pub const MAGIC: [u8; 4] = *b"ZKAS";
pub const WIRE_VERSION: u8 = 1;

/// magic + version + tag + submitter len + proof len + artifact len + input count
const FIXED_HEADER_BYTES: usize = 4 + 1 + 1 + 2 + 4 + 4 + 2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("payload of {size} bytes exceeds limit of {limit}")]
    PayloadTooLarge { size: usize, limit: usize },
    #[error("bad magic")]
    BadMagic,
    #[error("unsupported wire version {0}")]
    UnsupportedVersion(u8),
    #[error("truncated {0}")]
    Truncated(&'static str),
    #[error("unknown proof system tag {0}")]
    UnknownProofSystem(u8),
    #[error("submitter: {0}")]
    Submitter(#[from] AccountIdError),
    #[error("{count} public inputs exceed limit of {limit}")]
    TooManyPublicInputs { count: usize, limit: usize },
    #[error("public input {index} of {size} bytes exceeds limit of {limit}")]
    InputTooLarge { index: usize, size: usize, limit: usize },
    #[error("{0} trailing bytes")]
    TrailingBytes(usize),
}

/// A submission field too long for its length prefix
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field} of length {len} does not fit its length prefix")]
pub struct EncodeError {
    pub field: &'static str,
    pub len: usize,
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize, field: &'static str) -> Result<&'a [u8], DecodeError> {
        let remaining = self.buf.len() - self.pos;
        if n > remaining {
            return Err(DecodeError::Truncated(field));
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn u8(&mut self, field: &'static str) -> Result<u8, DecodeError> {
        Ok(self.take(1, field)?[0])
    }

    fn u16(&mut self, field: &'static str) -> Result<u16, DecodeError> {
        let b = self.take(2, field)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self, field: &'static str) -> Result<u32, DecodeError> {
        let b = self.take(4, field)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }
}

pub fn decode(raw: &[u8], params: &Params) -> Result<ProofSubmission, DecodeError> {
    if raw.len() > params.max_payload_bytes {
        return Err(DecodeError::PayloadTooLarge { size: raw.len(), limit: params.max_payload_bytes });
    }

    let mut r = Reader::new(raw);
    if r.take(4, "magic")? != MAGIC {
        return Err(DecodeError::BadMagic);
    }
    let version = r.u8("version")?;
    if version != WIRE_VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }
    let tag = r.u8("proof system")?;
    let proof_system = ProofSystemId::from_tag(tag).ok_or(DecodeError::UnknownProofSystem(tag))?;

    let submitter_len = r.u16("submitter length")? as usize;
    if submitter_len > MAX_ACCOUNT_ID_BYTES {
        return Err(AccountIdError::TooLong(submitter_len).into());
    }
    let submitter = AccountId::new(r.take(submitter_len, "submitter")?)?;

    let proof_len = r.u32("proof length")? as usize;
    let proof_bytes = r.take(proof_len, "proof")?.to_vec();

    let artifact_len = r.u32("artifact length")? as usize;
    let program_artifact = r.take(artifact_len, "artifact")?.to_vec();

    let count = r.u16("input count")? as usize;
    if count > params.max_public_inputs {
        return Err(DecodeError::TooManyPublicInputs { count, limit: params.max_public_inputs });
    }
    let mut public_inputs = Vec::with_capacity(count);
    for index in 0..count {
        let len = r.u32("input length")? as usize;
        if len > params.max_public_input_bytes {
            return Err(DecodeError::InputTooLarge { index, size: len, limit: params.max_public_input_bytes });
        }
        public_inputs.push(r.take(len, "input")?.to_vec());
    }

    if r.remaining() != 0 {
        return Err(DecodeError::TrailingBytes(r.remaining()));
    }

    Ok(ProofSubmission { proof_system, proof_bytes, program_artifact, public_inputs, submitter })
}

fn length_prefix<T: TryFrom<usize>>(field: &'static str, len: usize) -> Result<T, EncodeError> {
    T::try_from(len).map_err(|_| EncodeError { field, len })
}

pub fn encode(submission: &ProofSubmission) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::with_capacity(encoded_len(submission));
    out.extend_from_slice(&MAGIC);
    out.push(WIRE_VERSION);
    out.push(submission.proof_system.tag());

    let submitter = submission.submitter.as_bytes();
    out.extend_from_slice(&length_prefix::<u16>("submitter", submitter.len())?.to_le_bytes());
    out.extend_from_slice(submitter);

    out.extend_from_slice(&length_prefix::<u32>("proof", submission.proof_bytes.len())?.to_le_bytes());
    out.extend_from_slice(&submission.proof_bytes);

    out.extend_from_slice(&length_prefix::<u32>("artifact", submission.program_artifact.len())?.to_le_bytes());
    out.extend_from_slice(&submission.program_artifact);

    let count = length_prefix::<u16>("public inputs", submission.public_inputs.len())?;
    out.extend_from_slice(&count.to_le_bytes());
    for input in &submission.public_inputs {
        out.extend_from_slice(&length_prefix::<u32>("public input", input.len())?.to_le_bytes());
        out.extend_from_slice(input);
    }
    Ok(out)
}

/// Size of the wire encoding without building it
pub fn encoded_len(submission: &ProofSubmission) -> usize {
    FIXED_HEADER_BYTES
        + submission.submitter.as_bytes().len()
        + submission.proof_bytes.len()
        + submission.program_artifact.len()
        + submission.public_inputs.iter().map(|i| 4 + i.len()).sum::<usize>()
}

/// Apply the decode-time limits to an already typed submission, so typed
/// messages and raw bytes are held to the same bounds.
pub fn check_limits(submission: &ProofSubmission, params: &Params) -> Result<(), DecodeError> {
    let size = encoded_len(submission);
    if size > params.max_payload_bytes {
        return Err(DecodeError::PayloadTooLarge { size, limit: params.max_payload_bytes });
    }
    let count = submission.public_inputs.len();
    if count > params.max_public_inputs {
        return Err(DecodeError::TooManyPublicInputs { count, limit: params.max_public_inputs });
    }
    for (index, input) in submission.public_inputs.iter().enumerate() {
        if input.len() > params.max_public_input_bytes {
            return Err(DecodeError::InputTooLarge {
                index,
                size: input.len(),
                limit: params.max_public_input_bytes,
            });
        }
    }
    Ok(())
}
