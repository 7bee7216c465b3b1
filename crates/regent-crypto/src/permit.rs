//! Domain-separated permit digests (signature-based approvals).
//!
//! A permit binds `(owner, spender, value, nonce, deadline)` to a digest
//! that also commits to the chain id and the verifying ledger's address,
//! so a signature for one ledger can never be replayed against another.
//!
//! Layout, over 32-byte words:
//!
//! ```text
//! domain_separator = H(DOMAIN_TYPEHASH || chain_id || verifying_contract)
//! struct_hash      = H(PERMIT_TYPEHASH || owner || spender || value || nonce || deadline)
//! digest           = H(0x19 0x01 || domain_separator || struct_hash)
//! ```

use crate::error::CryptoError;
use once_cell::sync::Lazy;
use regent_types::{Address, Ed25519PublicKey, Ed25519Signature, Hash, U256};

static DOMAIN_TYPEHASH: Lazy<Hash> = Lazy::new(|| {
    Hash::compute(b"EIP712Domain(uint256 chainId,address verifyingContract)")
});

static PERMIT_TYPEHASH: Lazy<Hash> = Lazy::new(|| {
    Hash::compute(
        b"Permit(address owner,address spender,uint256 value,uint256 nonce,uint256 deadline)",
    )
});

fn address_word(addr: &Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(addr.as_bytes());
    word
}

fn u64_word(val: u64) -> [u8; 32] {
    U256::from(val).to_be_bytes()
}

/// The signing domain of one token ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermitDomain {
    pub chain_id: u64,
    pub verifying_contract: Address,
}

impl PermitDomain {
    pub fn new(chain_id: u64, verifying_contract: Address) -> Self {
        Self {
            chain_id,
            verifying_contract,
        }
    }

    /// The domain separator committing to chain id and ledger address.
    pub fn separator(&self) -> Hash {
        Hash::compute_multi(&[
            DOMAIN_TYPEHASH.as_bytes(),
            &u64_word(self.chain_id),
            &address_word(&self.verifying_contract),
        ])
    }
}

/// An unsigned permit message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permit {
    pub owner: Address,
    pub spender: Address,
    pub value: U256,
    pub nonce: u64,
    pub deadline: u64,
}

impl Permit {
    /// The struct hash of this permit's fields.
    pub fn struct_hash(&self) -> Hash {
        Hash::compute_multi(&[
            PERMIT_TYPEHASH.as_bytes(),
            &address_word(&self.owner),
            &address_word(&self.spender),
            &self.value.to_be_bytes(),
            &u64_word(self.nonce),
            &u64_word(self.deadline),
        ])
    }

    /// The final signing digest under the given domain.
    pub fn digest(&self, domain: &PermitDomain) -> Hash {
        Hash::compute_multi(&[
            &[0x19, 0x01],
            domain.separator().as_bytes(),
            self.struct_hash().as_bytes(),
        ])
    }

    /// Verify a signed permit.
    ///
    /// The supplied public key must both produce a valid signature over
    /// the digest and derive to the claimed owner address; either failure
    /// is indistinguishable to the caller.
    pub fn verify(
        &self,
        domain: &PermitDomain,
        public_key: &Ed25519PublicKey,
        signature: &Ed25519Signature,
    ) -> Result<(), CryptoError> {
        if public_key.to_address() != self.owner {
            return Err(CryptoError::VerificationFailed);
        }
        crate::ed25519::verify(public_key, self.digest(domain).as_bytes(), signature)
    }
}
