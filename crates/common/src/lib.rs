//! Error kinds and protocol definitions shared across `enveloper` crates.

pub mod error;
pub mod protocol;

pub use error::EnvelopeError;
