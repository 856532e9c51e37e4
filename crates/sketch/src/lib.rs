//! The sketch engine: a HyperLogLog-style cardinality sketch plus the
//! single critical section through which every mutation of it and its
//! dirty flag must pass.

mod datum;
mod engine;
mod error;
mod hll;

pub use datum::Datum;
pub use engine::{FlushSnapshot, SketchEngine};
pub use error::CorruptSketch;
pub use hll::{Sketch, LOG_K};
