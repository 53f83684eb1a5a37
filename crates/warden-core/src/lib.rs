//! Warden Core - identity types and cryptographic primitives
//!
//! This crate provides the shared vocabulary of the Warden smart-account
//! security core: addresses, digests, capability selectors, keccak hashing,
//! and secp256k1 signature recovery.

pub mod crypto;
pub mod error;
pub mod types;

pub use crypto::{
    address_from_public_key, is_signed_by, keccak256, keccak256_multi, personal_message_hash,
    recover_address, LocalSigner,
};
pub use error::{Error, Result};
pub use types::{Address, Bytes32, ChainId, ModuleId, Selector};

/// Seconds per hour
pub const HOUR: u64 = 3600;

/// Seconds per day
pub const DAY: u64 = 86400;
