//! The treasury composition.
//!
//! [`Dao`] owns the token ledger, the auction, the staking vault and the
//! timelock, and exposes the whole public surface as `&mut self` methods.
//! Execution is transaction-serial: each call is one atomic state
//! transition, ordered by the sequence in which calls reach this object.
//! Hosts with real concurrency wrap it in [`SharedDao`] so all mutations
//! serialize behind one writer lock.

use crate::error::GovernanceError;
use crate::timelock::{CallTarget, OperatorTransition, Timelock, TimelockEvent, TimelockParams};
use crate::vault::{StakingVault, VaultParams};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use regent_auction::{Auction, AuctionParams};
use regent_ledger::{TokenEvent, TokenLedger};
use regent_types::{Address, Ed25519PublicKey, Ed25519Signature, Hash, U256};
use std::sync::Arc;
use tracing::info;

/// Treasury-wide parameters.
#[derive(Debug, Clone)]
pub struct DaoParams {
    pub chain_id: u64,
    pub token_name: String,
    pub token_symbol: String,
    pub share_name: String,
    pub share_symbol: String,
    /// Weeks of auction issuance pre-funded into the sale pool.
    pub funded_weeks: u64,
    pub auction: AuctionParams,
    pub vault: VaultParams,
    pub timelock: TimelockParams,
}

impl Default for DaoParams {
    fn default() -> Self {
        Self {
            chain_id: 1,
            token_name: "Regent".to_string(),
            token_symbol: "RGT".to_string(),
            share_name: "Staked Regent".to_string(),
            share_symbol: "xRGT".to_string(),
            funded_weeks: 16,
            auction: AuctionParams::default(),
            vault: VaultParams::default(),
            timelock: TimelockParams::default(),
        }
    }
}

/// The assembled treasury.
#[derive(Debug)]
pub struct Dao {
    token: TokenLedger,
    auction: Auction,
    vault: StakingVault,
    timelock: Timelock,
}

impl Dao {
    /// Assemble the treasury with `operator` in the seat and the sale
    /// pool funded for `funded_weeks` of issuance.
    pub fn new(
        params: DaoParams,
        operator: Address,
        start_time: u64,
    ) -> Result<Self, GovernanceError> {
        let token_address = Address::from_label("regent/token");
        let auction_address = Address::from_label("regent/auction");
        let vault_address = Address::from_label("regent/vault");

        let mut token = TokenLedger::new(
            &params.token_name,
            &params.token_symbol,
            params.chain_id,
            token_address,
        );
        let funding = params
            .auction
            .weekly_tokens
            .checked_mul(&U256::from(params.funded_weeks))
            .ok_or(GovernanceError::Overflow)?;
        token.mint(auction_address, funding)?;

        let auction = Auction::new(params.auction, auction_address, start_time);
        let vault = StakingVault::new(
            &params.share_name,
            &params.share_symbol,
            params.chain_id,
            vault_address,
            params.vault,
        );
        let timelock = Timelock::new(params.timelock, operator);

        info!(%operator, start_time, "treasury assembled");
        Ok(Self {
            token,
            auction,
            vault,
            timelock,
        })
    }

    // --- Auction surface ---

    pub fn auction(&self) -> &Auction {
        &self.auction
    }

    pub fn price(&self, now: u64) -> U256 {
        self.auction.price_at(now)
    }

    pub fn buy(
        &mut self,
        week: u64,
        recipient: Address,
        payment: U256,
        now: u64,
    ) -> Result<U256, GovernanceError> {
        Ok(self.auction.buy(week, recipient, payment, now)?)
    }

    pub fn next_week(&mut self, now: u64) -> Result<u64, GovernanceError> {
        Ok(self.auction.next_week(now)?)
    }

    pub fn claim_purchase(
        &mut self,
        week: u64,
        recipient: Address,
    ) -> Result<U256, GovernanceError> {
        Ok(self
            .auction
            .claim_purchase(&mut self.token, week, recipient)?)
    }

    // --- Token surface ---

    pub fn token(&self) -> &TokenLedger {
        &self.token
    }

    pub fn transfer_token(
        &mut self,
        from: Address,
        to: Address,
        value: U256,
    ) -> Result<(), GovernanceError> {
        Ok(self.token.transfer(from, to, value)?)
    }

    pub fn approve_token(&mut self, owner: Address, spender: Address, value: U256) {
        self.token.approve(owner, spender, value);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn permit_token(
        &mut self,
        owner: Address,
        spender: Address,
        value: U256,
        deadline: u64,
        public_key: &Ed25519PublicKey,
        signature: &Ed25519Signature,
        now: u64,
    ) -> Result<(), GovernanceError> {
        Ok(self
            .token
            .permit(owner, spender, value, deadline, public_key, signature, now)?)
    }

    /// A bare token deposit into the vault: raises the share price for
    /// every holder without minting shares.
    pub fn tribute(&mut self, from: Address, amount: U256) -> Result<(), GovernanceError> {
        Ok(self.token.transfer(from, self.vault.address(), amount)?)
    }

    // --- Staking surface ---

    pub fn vault(&self) -> &StakingVault {
        &self.vault
    }

    pub fn mint(
        &mut self,
        caller: Address,
        amount: U256,
        vote_delegate: Address,
        now: u64,
    ) -> Result<U256, GovernanceError> {
        self.vault
            .mint(&mut self.token, caller, amount, vote_delegate, now)
    }

    pub fn burn(
        &mut self,
        caller: Address,
        recipient: Address,
        share_amount: U256,
        now: u64,
    ) -> Result<U256, GovernanceError> {
        self.vault
            .burn(&mut self.token, caller, recipient, share_amount, now)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn burn_from(
        &mut self,
        spender: Address,
        owner: Address,
        recipient: Address,
        share_amount: U256,
        now: u64,
    ) -> Result<U256, GovernanceError> {
        self.vault.burn_from(
            &mut self.token,
            spender,
            owner,
            recipient,
            share_amount,
            now,
        )
    }

    pub fn transfer_shares(
        &mut self,
        caller: Address,
        to: Address,
        value: U256,
        now: u64,
    ) -> Result<(), GovernanceError> {
        self.vault.transfer(caller, to, value, now)
    }

    pub fn transfer_shares_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        value: U256,
        now: u64,
    ) -> Result<(), GovernanceError> {
        self.vault.transfer_from(spender, from, to, value, now)
    }

    pub fn approve_shares(&mut self, owner: Address, spender: Address, value: U256) {
        self.vault.approve(owner, spender, value);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn permit_shares(
        &mut self,
        owner: Address,
        spender: Address,
        value: U256,
        deadline: u64,
        public_key: &Ed25519PublicKey,
        signature: &Ed25519Signature,
        now: u64,
    ) -> Result<(), GovernanceError> {
        self.vault
            .permit(owner, spender, value, deadline, public_key, signature, now)
    }

    pub fn vote(&mut self, caller: Address, delegate: Address) -> Result<(), GovernanceError> {
        self.vault.vote(caller, delegate)
    }

    pub fn votes(&self, delegate: &Address) -> U256 {
        self.vault.votes_for(delegate)
    }

    // --- Timelock surface ---

    pub fn timelock(&self) -> &Timelock {
        &self.timelock
    }

    pub fn operator(&self) -> Address {
        self.timelock.operator()
    }

    pub fn queue_transaction(
        &mut self,
        caller: Address,
        target: Address,
        value: U256,
        data: &[u8],
        now: u64,
    ) -> Result<(Hash, u64), GovernanceError> {
        self.timelock
            .queue_transaction(caller, target, value, data, &self.vault, now)
    }

    pub fn cancel_transaction(
        &mut self,
        caller: Address,
        target: Address,
        value: U256,
        data: &[u8],
    ) -> Result<Hash, GovernanceError> {
        self.timelock.cancel_transaction(caller, target, value, data)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn execute_transaction(
        &mut self,
        caller: Address,
        target: Address,
        value: U256,
        data: &[u8],
        attached: U256,
        target_impl: &mut dyn CallTarget,
        now: u64,
    ) -> Result<Hash, GovernanceError> {
        self.timelock.execute_transaction(
            caller,
            target,
            value,
            data,
            attached,
            target_impl,
            &self.vault,
            now,
        )
    }

    pub fn set_operator(
        &mut self,
        candidate: Address,
        now: u64,
    ) -> Result<OperatorTransition, GovernanceError> {
        self.timelock.set_operator(candidate, &self.vault, now)
    }

    // --- Event feeds ---

    pub fn take_token_events(&mut self) -> Vec<TokenEvent> {
        self.token.take_events()
    }

    pub fn take_share_events(&mut self) -> Vec<TokenEvent> {
        self.vault.take_share_events()
    }

    pub fn take_timelock_events(&mut self) -> Vec<TimelockEvent> {
        self.timelock.take_events()
    }
}

/// A `Dao` behind a writer lock, for multi-threaded hosts.
///
/// Mutating calls go through [`write`](Self::write) one at a time;
/// readers get a consistent snapshot.
#[derive(Clone)]
pub struct SharedDao {
    inner: Arc<RwLock<Dao>>,
}

impl SharedDao {
    pub fn new(dao: Dao) -> Self {
        Self {
            inner: Arc::new(RwLock::new(dao)),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Dao> {
        self.inner.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Dao> {
        self.inner.write()
    }
}
