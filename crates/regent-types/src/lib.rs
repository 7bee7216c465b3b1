//! Regent Types - Core type definitions for the REGENT treasury engine.
//!
//! This crate provides the fundamental types used throughout the treasury:
//! - Addresses (20-byte, Bech32m encoded)
//! - Hashes (32-byte, blake3 digests)
//! - U256 (256-bit unsigned integer with checked arithmetic)
//! - Ed25519 signature and public key wrappers

pub mod address;
pub mod hash;
pub mod u256;
pub mod signature;
pub mod error;

#[cfg(feature = "serde")]
mod serialization;

pub use address::Address;
pub use hash::Hash;
pub use u256::U256;
pub use signature::{Ed25519PublicKey, Ed25519Signature};
pub use error::TypesError;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{Address, Ed25519PublicKey, Ed25519Signature, Hash, TypesError, U256};
}
