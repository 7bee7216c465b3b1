//! The staking vault: treasury tokens in, yield-bearing shares out.
//!
//! Shares are a full token in their own right (transfer, approve,
//! permit), with two extra rules layered on top: a sender-side lock for
//! `LOCK_PERIOD` after every mint, and synchronous vote-registry updates
//! on every balance change. The share price is the ratio of the vault's
//! held token balance to the share supply; a bare token transfer to the
//! vault address ("tribute") raises it for every holder at once.

use crate::error::GovernanceError;
use crate::votes::{VoteTally, VotingRegistry};
use regent_ledger::{TokenEvent, TokenLedger};
use regent_types::{Address, Ed25519PublicKey, Ed25519Signature, U256};
use std::collections::HashMap;
use tracing::debug;

/// Vault parameters.
#[derive(Debug, Clone)]
pub struct VaultParams {
    /// Seconds a holder's shares stay locked after each mint.
    pub lock_period: u64,
}

impl Default for VaultParams {
    fn default() -> Self {
        Self {
            lock_period: 24 * 3600,
        }
    }
}

/// Share-based staking vault over a token ledger.
#[derive(Debug)]
pub struct StakingVault {
    params: VaultParams,
    /// The vault's account in the underlying token ledger.
    address: Address,
    shares: TokenLedger,
    registry: VotingRegistry,
    locked_until: HashMap<Address, u64>,
}

impl StakingVault {
    pub fn new(
        name: &str,
        symbol: &str,
        chain_id: u64,
        address: Address,
        params: VaultParams,
    ) -> Self {
        Self {
            params,
            address,
            shares: TokenLedger::new(name, symbol, chain_id, address),
            registry: VotingRegistry::new(),
            locked_until: HashMap::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Read access to the share ledger (balances, allowances, domain).
    pub fn shares(&self) -> &TokenLedger {
        &self.shares
    }

    pub fn total_shares(&self) -> U256 {
        self.shares.total_supply()
    }

    pub fn balance_of(&self, holder: &Address) -> U256 {
        self.shares.balance_of(holder)
    }

    pub fn delegate_of(&self, holder: &Address) -> Address {
        self.registry.delegate_of(holder)
    }

    pub fn votes_for(&self, delegate: &Address) -> U256 {
        self.registry.votes_for(delegate)
    }

    /// Timestamp before which `holder` cannot transfer or burn.
    pub fn locked_until(&self, holder: &Address) -> u64 {
        self.locked_until.get(holder).copied().unwrap_or(0)
    }

    fn check_unlocked(&self, holder: &Address, now: u64) -> Result<(), GovernanceError> {
        if now < self.locked_until(holder) {
            return Err(GovernanceError::Locked);
        }
        Ok(())
    }

    /// Stake `amount` of the underlying token for freshly minted shares.
    ///
    /// The token is pulled with the vault as spender, so the caller must
    /// have approved the vault's address. Shares are priced against the
    /// held balance before the pull: `amount * total_shares / held`
    /// (1:1 for the first mint). The caller's lock is restamped and
    /// their entire weight — previous balance plus the new shares — is
    /// redelegated to `vote_delegate`, whatever they had chosen before.
    pub fn mint(
        &mut self,
        token: &mut TokenLedger,
        caller: Address,
        amount: U256,
        vote_delegate: Address,
        now: u64,
    ) -> Result<U256, GovernanceError> {
        let held = token.balance_of(&self.address);
        let total = self.shares.total_supply();
        let minted = if total.is_zero() {
            amount
        } else {
            amount
                .checked_mul_div(&total, &held)
                .ok_or(GovernanceError::Overflow)?
        };

        token.transfer_from(self.address, caller, self.address, amount)?;

        self.registry
            .set_delegate(caller, vote_delegate, self.shares.balance_of(&caller))?;
        self.shares.mint(caller, minted)?;
        self.registry.add_weight(vote_delegate, minted)?;
        self.locked_until
            .insert(caller, now + self.params.lock_period);

        debug!(%caller, %amount, %minted, %vote_delegate, "vault mint");
        Ok(minted)
    }

    fn redeem_value(&self, token: &TokenLedger, share_amount: U256) -> Result<U256, GovernanceError> {
        let held = token.balance_of(&self.address);
        share_amount
            .checked_mul_div(&held, &self.shares.total_supply())
            .ok_or(GovernanceError::Overflow)
    }

    /// Burn the caller's shares and pay the underlying to `recipient`.
    pub fn burn(
        &mut self,
        token: &mut TokenLedger,
        caller: Address,
        recipient: Address,
        share_amount: U256,
        now: u64,
    ) -> Result<U256, GovernanceError> {
        self.check_unlocked(&caller, now)?;
        if recipient.is_zero() {
            return Err(GovernanceError::ZeroAddress);
        }

        let amount = self.redeem_value(token, share_amount)?;
        self.shares.burn(caller, share_amount)?;
        self.registry
            .remove_weight(self.registry.delegate_of(&caller), share_amount)?;
        token.transfer(self.address, recipient, amount)?;

        debug!(%caller, %recipient, %share_amount, %amount, "vault burn");
        Ok(amount)
    }

    /// As [`burn`](Self::burn), spending `spender`'s share allowance
    /// over `owner`. The lock applies to `owner`.
    #[allow(clippy::too_many_arguments)]
    pub fn burn_from(
        &mut self,
        token: &mut TokenLedger,
        spender: Address,
        owner: Address,
        recipient: Address,
        share_amount: U256,
        now: u64,
    ) -> Result<U256, GovernanceError> {
        self.check_unlocked(&owner, now)?;
        if recipient.is_zero() {
            return Err(GovernanceError::ZeroAddress);
        }
        // Balance first, so a doomed burn does not eat the allowance
        if self.shares.balance_of(&owner) < share_amount {
            return Err(regent_ledger::LedgerError::LowBalance.into());
        }
        self.shares.spend_allowance(owner, spender, share_amount)?;

        let amount = self.redeem_value(token, share_amount)?;
        self.shares.burn(owner, share_amount)?;
        self.registry
            .remove_weight(self.registry.delegate_of(&owner), share_amount)?;
        token.transfer(self.address, recipient, amount)?;

        debug!(%spender, %owner, %recipient, %share_amount, %amount, "vault burn_from");
        Ok(amount)
    }

    /// Transfer shares. Only the sender's lock matters; receiving is
    /// never locked, and the moved weight follows each side's existing
    /// delegate choice.
    pub fn transfer(
        &mut self,
        caller: Address,
        to: Address,
        value: U256,
        now: u64,
    ) -> Result<(), GovernanceError> {
        self.check_unlocked(&caller, now)?;
        self.shares.transfer(caller, to, value)?;
        self.registry.move_weight(&caller, &to, value)?;
        Ok(())
    }

    /// Transfer shares on an allowance.
    pub fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        value: U256,
        now: u64,
    ) -> Result<(), GovernanceError> {
        self.check_unlocked(&from, now)?;
        self.shares.transfer_from(spender, from, to, value)?;
        self.registry.move_weight(&from, &to, value)?;
        Ok(())
    }

    /// Redirect the caller's whole current balance to `delegate`.
    /// Always permitted, even while the balance is locked.
    pub fn vote(&mut self, caller: Address, delegate: Address) -> Result<(), GovernanceError> {
        self.registry
            .set_delegate(caller, delegate, self.shares.balance_of(&caller))?;
        debug!(%caller, %delegate, "vote");
        Ok(())
    }

    /// Approve a spender over the caller's shares.
    pub fn approve(&mut self, owner: Address, spender: Address, value: U256) {
        self.shares.approve(owner, spender, value);
    }

    /// Signature-based share approval under the vault's own domain.
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
    ) -> Result<(), GovernanceError> {
        self.shares
            .permit(owner, spender, value, deadline, public_key, signature, now)?;
        Ok(())
    }

    /// Drain the share ledger's event feed.
    pub fn take_share_events(&mut self) -> Vec<TokenEvent> {
        self.shares.take_events()
    }
}

impl VoteTally for StakingVault {
    fn votes_for(&self, delegate: &Address) -> U256 {
        self.registry.votes_for(delegate)
    }

    fn total_weight(&self) -> U256 {
        self.shares.total_supply()
    }
}
