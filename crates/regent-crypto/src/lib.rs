//! Regent Crypto - Cryptographic primitives for the REGENT treasury.
//!
//! This crate provides:
//! - Ed25519 signatures (permit signing, account keys)
//! - The domain-separated permit digest scheme used by the token ledgers

pub mod ed25519;
pub mod permit;
pub mod error;

pub use ed25519::{verify as ed25519_verify, Keypair};
pub use permit::{Permit, PermitDomain};
pub use error::CryptoError;
