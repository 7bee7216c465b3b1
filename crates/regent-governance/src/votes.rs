//! Delegated vote tally.
//!
//! Every share holder directs their whole balance at one delegate (the
//! zero address by default, a tracked but never-electable sink). The
//! registry is updated synchronously by the vault on every mint, burn and
//! transfer, so `votes[d]` always equals the summed balances of the
//! holders currently delegating to `d`.

use crate::error::GovernanceError;
use regent_types::{Address, U256};
use std::collections::HashMap;

/// Read access to vote weights, as consumed by the timelock.
pub trait VoteTally {
    /// Current weight delegated to `delegate`.
    fn votes_for(&self, delegate: &Address) -> U256;

    /// Total outstanding weight, including the zero-address sink.
    fn total_weight(&self) -> U256;

    /// Strict majority: `votes[candidate] * 2 > total_weight`.
    ///
    /// The zero address holds weight in the denominator but can never be
    /// a candidate.
    fn has_majority(&self, candidate: &Address) -> bool {
        if candidate.is_zero() {
            return false;
        }
        match self.votes_for(candidate).checked_mul(&U256::from(2u64)) {
            Some(doubled) => doubled > self.total_weight(),
            // Doubling overflowed 256 bits; the weight trivially exceeds
            // any possible total
            None => true,
        }
    }
}

/// holder -> delegate and delegate -> weight bookkeeping.
#[derive(Debug, Default)]
pub struct VotingRegistry {
    delegates: HashMap<Address, Address>,
    votes: HashMap<Address, U256>,
}

impl VotingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The holder's current delegate (zero if never set).
    pub fn delegate_of(&self, holder: &Address) -> Address {
        self.delegates.get(holder).copied().unwrap_or(Address::ZERO)
    }

    /// Weight currently delegated to `delegate`.
    pub fn votes_for(&self, delegate: &Address) -> U256 {
        self.votes.get(delegate).copied().unwrap_or(U256::ZERO)
    }

    /// Add `amount` of weight under `delegate`.
    pub fn add_weight(
        &mut self,
        delegate: Address,
        amount: U256,
    ) -> Result<(), GovernanceError> {
        let total = self
            .votes_for(&delegate)
            .checked_add(&amount)
            .ok_or(GovernanceError::Overflow)?;
        self.votes.insert(delegate, total);
        Ok(())
    }

    /// Remove `amount` of weight from `delegate`.
    pub fn remove_weight(
        &mut self,
        delegate: Address,
        amount: U256,
    ) -> Result<(), GovernanceError> {
        let total = self
            .votes_for(&delegate)
            .checked_sub(&amount)
            .ok_or(GovernanceError::Overflow)?;
        self.votes.insert(delegate, total);
        Ok(())
    }

    /// Point `holder` at `new_delegate`, moving `balance` of weight from
    /// the previous delegate. Always permitted, locked shares included.
    pub fn set_delegate(
        &mut self,
        holder: Address,
        new_delegate: Address,
        balance: U256,
    ) -> Result<(), GovernanceError> {
        let old_delegate = self.delegate_of(&holder);
        if old_delegate != new_delegate {
            self.remove_weight(old_delegate, balance)?;
            self.add_weight(new_delegate, balance)?;
        }
        self.delegates.insert(holder, new_delegate);
        Ok(())
    }

    /// Move `amount` of weight between two holders' current delegates,
    /// as happens on a share transfer. Neither holder's delegate choice
    /// changes.
    pub fn move_weight(
        &mut self,
        from_holder: &Address,
        to_holder: &Address,
        amount: U256,
    ) -> Result<(), GovernanceError> {
        let from_delegate = self.delegate_of(from_holder);
        let to_delegate = self.delegate_of(to_holder);
        if from_delegate != to_delegate {
            self.remove_weight(from_delegate, amount)?;
            self.add_weight(to_delegate, amount)?;
        }
        Ok(())
    }
}
