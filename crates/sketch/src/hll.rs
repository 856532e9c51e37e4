use std::hash::{BuildHasher, Hash, Hasher};

use ahash::RandomState;
use once_cell::sync::Lazy;

use crate::datum::Datum;
use crate::error::CorruptSketch;

/// Fixed precision shared by every sketch in the mesh. A node gossiping a
/// sketch built with a different precision is not a case this system needs
/// to handle: all nodes run the same binary with the same constant.
pub const LOG_K: u8 = 21;

/// Fixed hash seeds. HLL union only dedups correctly if every node maps the
/// same logical item to the same register via the same hash function, so
/// this MUST NOT vary per-process (ahash's default `RandomState` reseeds on
/// every process start, which would silently break cross-node convergence).
static HASHER: Lazy<RandomState> = Lazy::new(|| {
    RandomState::with_seeds(
        0x9E3779B97F4A7C15,
        0xC2B2AE3D27D4EB4F,
        0x165667B19E3779F9,
        0x27D4EB2F165667C5,
    )
});

const MAGIC: u8 = 0xA1;
const HEADER_LEN: usize = 2;

fn register_count(log_k: u8) -> usize {
    1usize << log_k
}

fn hash_one(datum: &Datum) -> u64 {
    let mut hasher = HASHER.build_hasher();
    match datum {
        Datum::Int(v) => {
            0u8.hash(&mut hasher);
            v.hash(&mut hasher);
        }
        Datum::Float(v) => {
            1u8.hash(&mut hasher);
            v.to_bits().hash(&mut hasher);
        }
        Datum::Bytes(v) => {
            2u8.hash(&mut hasher);
            v.hash(&mut hasher);
        }
    }
    hasher.finish()
}

/// A HyperLogLog-style cardinality sketch at the mesh's fixed precision.
///
/// `registers[i]` holds the largest run of leading zeros (plus one) seen
/// among the hashes that mapped to bucket `i`. Two sketches are considered
/// the same set estimate iff [`Sketch::serialize_compact`] produces
/// byte-identical output.
#[derive(Debug, Clone)]
pub struct Sketch {
    log_k: u8,
    registers: Vec<u8>,
}

impl Sketch {
    /// A fresh, empty sketch at the mesh's fixed precision.
    pub fn new() -> Self {
        Self {
            log_k: LOG_K,
            registers: vec![0u8; register_count(LOG_K)],
        }
    }

    pub fn log_k(&self) -> u8 {
        self.log_k
    }

    /// Fold one item into the sketch. Does not track dirtiness; that is the
    /// [`crate::engine::SketchEngine`]'s job.
    pub fn update(&mut self, datum: &Datum) {
        let hash = hash_one(datum);
        let index = (hash >> (64 - self.log_k)) as usize;
        let rest = hash << self.log_k;
        let rho = if rest == 0 {
            (64 - self.log_k + 1) as u8
        } else {
            (rest.leading_zeros() as u8) + 1
        };
        if rho > self.registers[index] {
            self.registers[index] = rho;
        }
    }

    /// The standard HyperLogLog cardinality estimator, with small-range
    /// linear-counting correction.
    pub fn estimate(&self) -> f64 {
        let m = self.registers.len() as f64;
        let alpha_m = match self.registers.len() {
            16 => 0.673,
            32 => 0.697,
            64 => 0.709,
            _ => 0.7213 / (1.0 + 1.079 / m),
        };
        let sum: f64 = self.registers.iter().map(|&r| 2f64.powi(-(r as i32))).sum();
        let raw_estimate = alpha_m * m * m / sum;

        let zeros = self.registers.iter().filter(|&&r| r == 0).count();
        if raw_estimate <= 2.5 * m && zeros > 0 {
            m * (m / zeros as f64).ln()
        } else {
            raw_estimate
        }
    }

    /// The union of `self` and `other`, computed register-wise. Both
    /// sketches must share the mesh's fixed precision; since `LOG_K` is a
    /// compile-time constant this can never fail in this binary, but inbound
    /// bytes are still validated at deserialization time (see
    /// [`Sketch::deserialize_compact`]).
    pub fn union(&self, other: &Sketch) -> Sketch {
        debug_assert_eq!(self.log_k, other.log_k);
        let registers = self
            .registers
            .iter()
            .zip(other.registers.iter())
            .map(|(&a, &b)| a.max(b))
            .collect();
        Sketch {
            log_k: self.log_k,
            registers,
        }
    }

    /// The canonical on-wire/on-disk byte form, and the equality oracle for
    /// "two sketches are the same": `[magic, log_k, registers...]`.
    pub fn serialize_compact(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.registers.len());
        out.push(MAGIC);
        out.push(self.log_k);
        out.extend_from_slice(&self.registers);
        out
    }

    pub fn deserialize_compact(bytes: &[u8]) -> Result<Sketch, CorruptSketch> {
        if bytes.len() < HEADER_LEN {
            return Err(CorruptSketch::TooShort {
                len: bytes.len(),
                min: HEADER_LEN,
            });
        }
        let magic = bytes[0];
        if magic != MAGIC {
            return Err(CorruptSketch::BadMagic(magic));
        }
        let log_k = bytes[1];
        if log_k != LOG_K {
            return Err(CorruptSketch::PrecisionMismatch {
                expected: LOG_K,
                found: log_k,
            });
        }
        let expected = register_count(log_k);
        let registers = &bytes[HEADER_LEN..];
        if registers.len() != expected {
            return Err(CorruptSketch::BadRegisterLen {
                len: registers.len(),
                expected,
            });
        }
        Ok(Sketch {
            log_k,
            registers: registers.to_vec(),
        })
    }
}

impl Default for Sketch {
    fn default() -> Self {
        Self::new()
    }
}
