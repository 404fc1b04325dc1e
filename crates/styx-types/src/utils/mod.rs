//! EIP-712 hashing helpers.

pub mod eip712;

pub use eip712::{compute_domain_hash, compute_final_digest, Eip712AbiEncoder};
