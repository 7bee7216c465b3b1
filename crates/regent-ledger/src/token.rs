//! The token ledger: balances, allowances, and signature-based approval.

use crate::error::LedgerError;
use regent_crypto::{Permit, PermitDomain};
use regent_types::{Address, Ed25519PublicKey, Ed25519Signature, Hash, U256};
use std::collections::HashMap;
use tracing::debug;

/// An observable ledger state change, recorded in submission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenEvent {
    Transfer {
        from: Address,
        to: Address,
        value: U256,
    },
    Approval {
        owner: Address,
        spender: Address,
        value: U256,
    },
}

/// ERC20-shaped balance and allowance bookkeeping with permit support.
///
/// One authority object owns all balances; every mutation is atomic and
/// either fully applies or returns an error with nothing changed.
/// Mint and burn record transfers against the zero address. An allowance
/// of `U256::MAX` is an infinite sentinel and is never decremented.
#[derive(Debug)]
pub struct TokenLedger {
    name: String,
    symbol: String,
    domain: PermitDomain,
    balances: HashMap<Address, U256>,
    allowances: HashMap<Address, HashMap<Address, U256>>,
    nonces: HashMap<Address, u64>,
    total_supply: U256,
    events: Vec<TokenEvent>,
}

impl TokenLedger {
    /// Create an empty ledger with its own permit signing domain.
    pub fn new(name: &str, symbol: &str, chain_id: u64, ledger_address: Address) -> Self {
        Self {
            name: name.to_string(),
            symbol: symbol.to_string(),
            domain: PermitDomain::new(chain_id, ledger_address),
            balances: HashMap::new(),
            allowances: HashMap::new(),
            nonces: HashMap::new(),
            total_supply: U256::ZERO,
            events: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn total_supply(&self) -> U256 {
        self.total_supply
    }

    pub fn balance_of(&self, account: &Address) -> U256 {
        self.balances.get(account).copied().unwrap_or(U256::ZERO)
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> U256 {
        self.allowances
            .get(owner)
            .and_then(|m| m.get(spender))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    pub fn nonce_of(&self, owner: &Address) -> u64 {
        self.nonces.get(owner).copied().unwrap_or(0)
    }

    pub fn domain(&self) -> &PermitDomain {
        &self.domain
    }

    pub fn domain_separator(&self) -> Hash {
        self.domain.separator()
    }

    /// Move `value` from `from` to `to`.
    ///
    /// Zero-value transfers and transfers to self succeed (and are
    /// recorded); transfers to the zero address are rejected.
    pub fn transfer(
        &mut self,
        from: Address,
        to: Address,
        value: U256,
    ) -> Result<(), LedgerError> {
        if to.is_zero() {
            return Err(LedgerError::ZeroAddress);
        }

        let from_balance = self
            .balance_of(&from)
            .checked_sub(&value)
            .ok_or(LedgerError::LowBalance)?;
        let to_balance = if from == to {
            from_balance
        } else {
            self.balance_of(&to)
                .checked_add(&value)
                .ok_or(LedgerError::Overflow)?
        };

        self.balances.insert(from, from_balance);
        self.balances.insert(to, to_balance);

        debug!(%from, %to, %value, token = %self.symbol, "transfer");
        self.events.push(TokenEvent::Transfer { from, to, value });
        Ok(())
    }

    /// Set `spender`'s allowance over `owner`'s balance.
    pub fn approve(&mut self, owner: Address, spender: Address, value: U256) {
        self.allowances
            .entry(owner)
            .or_default()
            .insert(spender, value);

        debug!(%owner, %spender, %value, token = %self.symbol, "approve");
        self.events.push(TokenEvent::Approval {
            owner,
            spender,
            value,
        });
    }

    /// Consume `value` of `spender`'s allowance over `owner`.
    ///
    /// A spender moving its own funds never needs an allowance, and the
    /// `U256::MAX` sentinel is treated as infinite.
    pub fn spend_allowance(
        &mut self,
        owner: Address,
        spender: Address,
        value: U256,
    ) -> Result<(), LedgerError> {
        if owner == spender {
            return Ok(());
        }

        let current = self.allowance(&owner, &spender);
        if current == U256::MAX {
            return Ok(());
        }

        let remaining = current
            .checked_sub(&value)
            .ok_or(LedgerError::LowAllowance)?;
        self.allowances
            .entry(owner)
            .or_default()
            .insert(spender, remaining);
        Ok(())
    }

    /// Move `value` from `from` to `to`, spending `spender`'s allowance.
    pub fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        value: U256,
    ) -> Result<(), LedgerError> {
        if to.is_zero() {
            return Err(LedgerError::ZeroAddress);
        }
        // Balance is checked before the allowance is consumed so that a
        // failed transfer leaves the allowance intact.
        if self.balance_of(&from) < value {
            return Err(LedgerError::LowBalance);
        }
        self.spend_allowance(from, spender, value)?;
        self.transfer(from, to, value)
    }

    /// Signature-based approval.
    ///
    /// The signature must cover the owner's current nonce under this
    /// ledger's domain; each nonce is usable exactly once, so a replayed
    /// signature fails with `InvalidSig`.
    #[allow(clippy::too_many_arguments)]
    pub fn permit(
        &mut self,
        owner: Address,
        spender: Address,
        value: U256,
        deadline: u64,
        public_key: &Ed25519PublicKey,
        signature: &Ed25519Signature,
        now: u64,
    ) -> Result<(), LedgerError> {
        if owner.is_zero() {
            return Err(LedgerError::ZeroOwner);
        }
        if now > deadline {
            return Err(LedgerError::Expired);
        }

        let permit = Permit {
            owner,
            spender,
            value,
            nonce: self.nonce_of(&owner),
            deadline,
        };
        permit
            .verify(&self.domain, public_key, signature)
            .map_err(|_| LedgerError::InvalidSig)?;

        *self.nonces.entry(owner).or_insert(0) += 1;
        self.approve(owner, spender, value);
        Ok(())
    }

    /// Create `value` new units credited to `to`.
    pub fn mint(&mut self, to: Address, value: U256) -> Result<(), LedgerError> {
        if to.is_zero() {
            return Err(LedgerError::ZeroAddress);
        }

        let supply = self
            .total_supply
            .checked_add(&value)
            .ok_or(LedgerError::Overflow)?;
        let balance = self
            .balance_of(&to)
            .checked_add(&value)
            .ok_or(LedgerError::Overflow)?;

        self.total_supply = supply;
        self.balances.insert(to, balance);

        debug!(%to, %value, token = %self.symbol, "mint");
        self.events.push(TokenEvent::Transfer {
            from: Address::ZERO,
            to,
            value,
        });
        Ok(())
    }

    /// Destroy `value` units held by `from`.
    pub fn burn(&mut self, from: Address, value: U256) -> Result<(), LedgerError> {
        let balance = self
            .balance_of(&from)
            .checked_sub(&value)
            .ok_or(LedgerError::LowBalance)?;
        let supply = self
            .total_supply
            .checked_sub(&value)
            .ok_or(LedgerError::LowBalance)?;

        self.balances.insert(from, balance);
        self.total_supply = supply;

        debug!(%from, %value, token = %self.symbol, "burn");
        self.events.push(TokenEvent::Transfer {
            from,
            to: Address::ZERO,
            value,
        });
        Ok(())
    }

    /// Events recorded so far, in submission order.
    pub fn events(&self) -> &[TokenEvent] {
        &self.events
    }

    /// Drain the event feed.
    pub fn take_events(&mut self) -> Vec<TokenEvent> {
        std::mem::take(&mut self.events)
    }
}
