//! Vote-gated timelock queue and operator succession.
//!
//! The operator — and only the operator, and only while holding a strict
//! majority of share votes — may queue a call, execute it inside its
//! `[eta, eta + MAX_DELAY]` window, or cancel it. Succession to a new
//! operator is two-phase with its own delay, and a pending successor who
//! loses the majority is evicted instead of promoted.

use crate::error::GovernanceError;
use crate::votes::VoteTally;
use regent_types::{Address, Hash, U256};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Timelock parameters.
#[derive(Debug, Clone)]
pub struct TimelockParams {
    /// Seconds between queuing a call and its earliest execution.
    pub min_delay: u64,
    /// Seconds past eta after which a queued call goes stale.
    pub max_delay: u64,
    /// Seconds between proposing a successor and their confirmation.
    pub succession_delay: u64,
}

impl Default for TimelockParams {
    fn default() -> Self {
        Self {
            min_delay: 2 * 24 * 3600,
            max_delay: 14 * 24 * 3600,
            succession_delay: 7 * 24 * 3600,
        }
    }
}

/// Failure reported by a forwarded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallError(pub String);

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A target the timelock can forward a queued call to.
///
/// The queue only needs the capability contract: an invocation may fail,
/// and on failure the queue entry is preserved for retry.
pub trait CallTarget {
    fn invoke(&mut self, data: &[u8], value: U256) -> Result<(), CallError>;
}

/// Key of a queued call: `hash(target || value || data)`.
pub fn call_hash(target: &Address, value: &U256, data: &[u8]) -> Hash {
    Hash::compute_multi(&[target.as_bytes(), &value.to_be_bytes(), data])
}

/// An observable timelock state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimelockEvent {
    Queued {
        hash: Hash,
        target: Address,
        value: U256,
        data: Vec<u8>,
        eta: u64,
    },
    Cancelled {
        hash: Hash,
    },
    Executed {
        hash: Hash,
    },
    OperatorProposed {
        candidate: Address,
        confirmable_at: u64,
    },
    OperatorChanged {
        operator: Address,
    },
    PendingEvicted {
        candidate: Address,
    },
}

/// Outcome of a `set_operator` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorTransition {
    /// A succession was proposed; confirmable from the given time.
    Proposed { confirmable_at: u64 },
    /// The pending candidate was promoted to operator.
    Promoted,
    /// The pending candidate lost its majority and was evicted.
    Evicted,
}

/// The timelocked transaction queue.
#[derive(Debug)]
pub struct Timelock {
    params: TimelockParams,
    operator: Address,
    pending_operator: Address,
    pending_operator_time: u64,
    /// call hash -> eta; absent means not queued
    queued: HashMap<Hash, u64>,
    events: Vec<TimelockEvent>,
}

impl Timelock {
    pub fn new(params: TimelockParams, operator: Address) -> Self {
        Self {
            params,
            operator,
            pending_operator: Address::ZERO,
            pending_operator_time: 0,
            queued: HashMap::new(),
            events: Vec::new(),
        }
    }

    pub fn operator(&self) -> Address {
        self.operator
    }

    pub fn pending_operator(&self) -> Address {
        self.pending_operator
    }

    pub fn pending_operator_time(&self) -> u64 {
        self.pending_operator_time
    }

    /// Eta of a queued call, zero if not queued.
    pub fn eta_of(&self, hash: &Hash) -> u64 {
        self.queued.get(hash).copied().unwrap_or(0)
    }

    fn check_operator(&self, caller: &Address) -> Result<(), GovernanceError> {
        if *caller != self.operator {
            return Err(GovernanceError::OperatorOnly);
        }
        Ok(())
    }

    fn check_majority(&self, tally: &dyn VoteTally) -> Result<(), GovernanceError> {
        if !tally.has_majority(&self.operator) {
            return Err(GovernanceError::NotEnoughVotes);
        }
        Ok(())
    }

    /// Queue a call for execution no earlier than `now + MIN_DELAY`.
    ///
    /// Queuing the same `(target, value, data)` again overwrites the
    /// prior eta.
    pub fn queue_transaction(
        &mut self,
        caller: Address,
        target: Address,
        value: U256,
        data: &[u8],
        tally: &dyn VoteTally,
        now: u64,
    ) -> Result<(Hash, u64), GovernanceError> {
        self.check_operator(&caller)?;
        self.check_majority(tally)?;

        let hash = call_hash(&target, &value, data);
        let eta = now + self.params.min_delay;
        self.queued.insert(hash, eta);

        debug!(%hash, %target, %value, eta, "queue transaction");
        self.events.push(TimelockEvent::Queued {
            hash,
            target,
            value,
            data: data.to_vec(),
            eta,
        });
        Ok((hash, eta))
    }

    /// Drop a queued call. No vote check; the operator may always walk
    /// back their own queue.
    pub fn cancel_transaction(
        &mut self,
        caller: Address,
        target: Address,
        value: U256,
        data: &[u8],
    ) -> Result<Hash, GovernanceError> {
        self.check_operator(&caller)?;

        let hash = call_hash(&target, &value, data);
        self.queued.remove(&hash);

        debug!(%hash, "cancel transaction");
        self.events.push(TimelockEvent::Cancelled { hash });
        Ok(hash)
    }

    /// Execute a queued call inside its window, forwarding `value` of the
    /// attached payment to the target.
    ///
    /// The majority is re-checked here: an operator who lost it after
    /// queuing cannot execute. A failing inner call (including an
    /// underfunded one) reports `CallReverted` but leaves the entry
    /// queued — the intended retry path. Success clears the entry.
    #[allow(clippy::too_many_arguments)]
    pub fn execute_transaction(
        &mut self,
        caller: Address,
        target: Address,
        value: U256,
        data: &[u8],
        attached: U256,
        target_impl: &mut dyn CallTarget,
        tally: &dyn VoteTally,
        now: u64,
    ) -> Result<Hash, GovernanceError> {
        self.check_operator(&caller)?;
        self.check_majority(tally)?;

        let hash = call_hash(&target, &value, data);
        let eta = self.eta_of(&hash);
        if now < eta {
            return Err(GovernanceError::TooEarly);
        }
        if eta == 0 || now > eta + self.params.max_delay {
            return Err(GovernanceError::TxStale);
        }

        if attached < value {
            return Err(GovernanceError::CallReverted("underfunded".to_string()));
        }
        if let Err(err) = target_impl.invoke(data, value) {
            debug!(%hash, %err, "forwarded call failed, entry kept");
            return Err(GovernanceError::CallReverted(err.0));
        }

        self.queued.remove(&hash);
        debug!(%hash, %target, %value, "execute transaction");
        self.events.push(TimelockEvent::Executed { hash });
        Ok(hash)
    }

    /// Two-phase operator succession.
    ///
    /// Naming a majority-holding candidate proposes them (or, once their
    /// delay has passed, promotes a previously proposed one). Naming the
    /// pending candidate after they lost their majority evicts the
    /// proposal without error; naming anyone else without a majority
    /// fails.
    pub fn set_operator(
        &mut self,
        candidate: Address,
        tally: &dyn VoteTally,
        now: u64,
    ) -> Result<OperatorTransition, GovernanceError> {
        if candidate.is_zero() {
            return Err(GovernanceError::ZeroOperator);
        }

        if candidate == self.pending_operator {
            if !tally.has_majority(&candidate) {
                // The proposed successor fell out of favor; clear the
                // slot rather than fail the call
                self.pending_operator = Address::ZERO;
                self.pending_operator_time = 0;
                debug!(%candidate, "pending operator evicted");
                self.events.push(TimelockEvent::PendingEvicted { candidate });
                return Ok(OperatorTransition::Evicted);
            }
            if now < self.pending_operator_time {
                return Err(GovernanceError::WaitLonger);
            }

            self.operator = candidate;
            self.pending_operator = Address::ZERO;
            self.pending_operator_time = 0;
            debug!(%candidate, "operator changed");
            self.events.push(TimelockEvent::OperatorChanged {
                operator: candidate,
            });
            return Ok(OperatorTransition::Promoted);
        }

        if !tally.has_majority(&candidate) {
            return Err(GovernanceError::NotEnoughVotes);
        }

        let confirmable_at = now + self.params.succession_delay;
        self.pending_operator = candidate;
        self.pending_operator_time = confirmable_at;
        debug!(%candidate, confirmable_at, "operator proposed");
        self.events.push(TimelockEvent::OperatorProposed {
            candidate,
            confirmable_at,
        });
        Ok(OperatorTransition::Proposed { confirmable_at })
    }

    /// Events recorded so far, in submission order.
    pub fn events(&self) -> &[TimelockEvent] {
        &self.events
    }

    /// Drain the event feed.
    pub fn take_events(&mut self) -> Vec<TimelockEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const DELAY: u64 = 2 * 24 * 3600;
    const EXPIRATION: u64 = 14 * 24 * 3600;

    fn addr(n: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[19] = n;
        Address::from_bytes(bytes)
    }

    struct FixedTally {
        votes: HashMap<Address, U256>,
        total: U256,
    }

    impl FixedTally {
        fn majority_for(delegate: Address) -> Self {
            let mut votes = HashMap::new();
            votes.insert(delegate, U256::from(1000u64));
            Self {
                votes,
                total: U256::from(1000u64),
            }
        }

        fn split() -> Self {
            let mut votes = HashMap::new();
            votes.insert(addr(2), U256::from(1000u64));
            votes.insert(addr(5), U256::from(1000u64));
            Self {
                votes,
                total: U256::from(2000u64),
            }
        }
    }

    impl VoteTally for FixedTally {
        fn votes_for(&self, delegate: &Address) -> U256 {
            self.votes.get(delegate).copied().unwrap_or(U256::ZERO)
        }

        fn total_weight(&self) -> U256 {
            self.total
        }
    }

    /// A target that records updates to one number, refusing odd inputs.
    struct Settings {
        magic_number: u64,
    }

    impl CallTarget for Settings {
        fn invoke(&mut self, data: &[u8], _value: U256) -> Result<(), CallError> {
            let bytes: [u8; 8] = data
                .try_into()
                .map_err(|_| CallError("bad calldata".to_string()))?;
            self.magic_number = u64::from_be_bytes(bytes);
            Ok(())
        }
    }

    /// A target that always reverts.
    struct Reverting;

    impl CallTarget for Reverting {
        fn invoke(&mut self, _data: &[u8], _value: U256) -> Result<(), CallError> {
            Err(CallError("nope".to_string()))
        }
    }

    fn operator_timelock() -> (Timelock, FixedTally, Address) {
        let bob = addr(2);
        let timelock = Timelock::new(TimelockParams::default(), bob);
        let tally = FixedTally::majority_for(bob);
        (timelock, tally, bob)
    }

    #[test]
    fn test_queue_sets_eta() {
        let (mut timelock, tally, bob) = operator_timelock();
        let target = addr(4);
        let value = U256::from(1_000_000u64);

        let (hash, eta) = timelock
            .queue_transaction(bob, target, value, &[], &tally, 1)
            .unwrap();

        assert_eq!(eta, 1 + DELAY);
        assert_eq!(hash, call_hash(&target, &value, &[]));
        assert_eq!(timelock.eta_of(&hash), eta);
        assert_eq!(
            timelock.events().last().unwrap(),
            &TimelockEvent::Queued {
                hash,
                target,
                value,
                data: vec![],
                eta
            }
        );
    }

    #[test]
    fn test_queue_is_operator_only() {
        let (mut timelock, tally, _) = operator_timelock();
        assert_eq!(
            timelock.queue_transaction(addr(1), addr(4), U256::ONE, &[], &tally, 1),
            Err(GovernanceError::OperatorOnly)
        );
    }

    #[test]
    fn test_queue_requires_majority() {
        let (mut timelock, _, bob) = operator_timelock();
        let split = FixedTally::split();
        assert_eq!(
            timelock.queue_transaction(bob, addr(4), U256::ONE, &[], &split, 1),
            Err(GovernanceError::NotEnoughVotes)
        );
    }

    #[test]
    fn test_requeue_overwrites_eta() {
        let (mut timelock, tally, bob) = operator_timelock();
        let (hash, _) = timelock
            .queue_transaction(bob, addr(4), U256::ONE, &[], &tally, 1)
            .unwrap();
        let (hash2, eta2) = timelock
            .queue_transaction(bob, addr(4), U256::ONE, &[], &tally, 500)
            .unwrap();

        assert_eq!(hash, hash2);
        assert_eq!(timelock.eta_of(&hash), eta2);
        assert_eq!(eta2, 500 + DELAY);
    }

    #[test]
    fn test_cancel_is_operator_only() {
        let (mut timelock, tally, bob) = operator_timelock();
        timelock
            .queue_transaction(bob, addr(6), U256::from(1337u64), &[], &tally, 1)
            .unwrap();

        assert_eq!(
            timelock.cancel_transaction(addr(1), addr(6), U256::from(1337u64), &[]),
            Err(GovernanceError::OperatorOnly)
        );

        let hash = timelock
            .cancel_transaction(bob, addr(6), U256::from(1337u64), &[])
            .unwrap();
        assert_eq!(timelock.eta_of(&hash), 0);
    }

    #[test]
    fn test_execute_too_early() {
        let (mut timelock, tally, bob) = operator_timelock();
        timelock
            .queue_transaction(bob, addr(6), U256::ZERO, &[0u8; 8], &tally, 1)
            .unwrap();

        let mut settings = Settings { magic_number: 0 };
        assert_eq!(
            timelock.execute_transaction(
                bob,
                addr(6),
                U256::ZERO,
                &[0u8; 8],
                U256::ZERO,
                &mut settings,
                &tally,
                DELAY
            ),
            Err(GovernanceError::TooEarly)
        );
    }

    #[test]
    fn test_execute_past_expiration_is_stale() {
        let (mut timelock, tally, bob) = operator_timelock();
        timelock
            .queue_transaction(bob, addr(6), U256::ZERO, &[0u8; 8], &tally, 1)
            .unwrap();

        let mut settings = Settings { magic_number: 0 };
        assert_eq!(
            timelock.execute_transaction(
                bob,
                addr(6),
                U256::ZERO,
                &[0u8; 8],
                U256::ZERO,
                &mut settings,
                &tally,
                1 + DELAY + EXPIRATION + 1
            ),
            Err(GovernanceError::TxStale)
        );
    }

    #[test]
    fn test_execute_unqueued_is_stale() {
        let (mut timelock, tally, bob) = operator_timelock();
        let mut settings = Settings { magic_number: 0 };
        assert_eq!(
            timelock.execute_transaction(
                bob,
                addr(2),
                U256::ZERO,
                &[0u8; 8],
                U256::ZERO,
                &mut settings,
                &tally,
                100
            ),
            Err(GovernanceError::TxStale)
        );
    }

    #[test]
    fn test_execute_forwards_the_call() {
        let (mut timelock, tally, bob) = operator_timelock();
        let data = 42u64.to_be_bytes();
        timelock
            .queue_transaction(bob, addr(6), U256::ZERO, &data, &tally, 1)
            .unwrap();

        let mut settings = Settings { magic_number: 0 };
        let hash = timelock
            .execute_transaction(
                bob,
                addr(6),
                U256::ZERO,
                &data,
                U256::ZERO,
                &mut settings,
                &tally,
                1 + DELAY,
            )
            .unwrap();

        assert_eq!(settings.magic_number, 42);
        // Entry cleared: running it again reads as stale
        assert_eq!(timelock.eta_of(&hash), 0);
    }

    #[test]
    fn test_underfunded_execute_keeps_entry() {
        let (mut timelock, tally, bob) = operator_timelock();
        let value = U256::from(1337u64);
        let (hash, eta) = timelock
            .queue_transaction(bob, addr(6), value, &[0u8; 8], &tally, 1)
            .unwrap();

        let mut settings = Settings { magic_number: 0 };

        // Not enough money attached
        let result = timelock.execute_transaction(
            bob,
            addr(6),
            value,
            &[0u8; 8],
            U256::ZERO,
            &mut settings,
            &tally,
            eta,
        );
        assert!(matches!(result, Err(GovernanceError::CallReverted(_))));
        assert_eq!(timelock.eta_of(&hash), eta);

        // Retry with the payment attached succeeds
        timelock
            .execute_transaction(
                bob,
                addr(6),
                value,
                &[0u8; 8],
                value,
                &mut settings,
                &tally,
                eta + 10,
            )
            .unwrap();
        assert_eq!(timelock.eta_of(&hash), 0);
    }

    #[test]
    fn test_reverting_call_keeps_entry() {
        let (mut timelock, tally, bob) = operator_timelock();
        let (hash, eta) = timelock
            .queue_transaction(bob, addr(6), U256::ZERO, &[], &tally, 1)
            .unwrap();

        let result = timelock.execute_transaction(
            bob,
            addr(6),
            U256::ZERO,
            &[],
            U256::ZERO,
            &mut Reverting,
            &tally,
            eta,
        );
        assert_eq!(
            result,
            Err(GovernanceError::CallReverted("nope".to_string()))
        );
        assert_eq!(timelock.eta_of(&hash), eta);
    }

    #[test]
    fn test_execute_requires_majority() {
        let (mut timelock, tally, bob) = operator_timelock();
        let (_, eta) = timelock
            .queue_transaction(bob, addr(6), U256::ZERO, &[0u8; 8], &tally, 1)
            .unwrap();

        // The electorate shifted after queuing
        let split = FixedTally::split();
        let mut settings = Settings { magic_number: 0 };
        assert_eq!(
            timelock.execute_transaction(
                bob,
                addr(6),
                U256::ZERO,
                &[0u8; 8],
                U256::ZERO,
                &mut settings,
                &split,
                eta
            ),
            Err(GovernanceError::NotEnoughVotes)
        );
    }

    #[test]
    fn test_set_operator_rejects_zero() {
        let (mut timelock, tally, _) = operator_timelock();
        assert_eq!(
            timelock.set_operator(Address::ZERO, &tally, 1),
            Err(GovernanceError::ZeroOperator)
        );
    }

    #[test]
    fn test_succession_two_phase() {
        let (mut timelock, _, bob) = operator_timelock();
        let erin = addr(5);
        let tally = FixedTally::majority_for(erin);

        let transition = timelock.set_operator(erin, &tally, 100).unwrap();
        assert_eq!(
            transition,
            OperatorTransition::Proposed {
                confirmable_at: 100 + 7 * 24 * 3600
            }
        );
        assert_eq!(timelock.operator(), bob);
        assert_eq!(timelock.pending_operator(), erin);

        // Too soon
        assert_eq!(
            timelock.set_operator(erin, &tally, 100 + 7 * 24 * 3600 - 1),
            Err(GovernanceError::WaitLonger)
        );

        // After the delay the succession completes
        let transition = timelock
            .set_operator(erin, &tally, 100 + 7 * 24 * 3600)
            .unwrap();
        assert_eq!(transition, OperatorTransition::Promoted);
        assert_eq!(timelock.operator(), erin);
        assert_eq!(timelock.pending_operator(), Address::ZERO);
        assert_eq!(timelock.pending_operator_time(), 0);
    }

    #[test]
    fn test_succession_requires_candidate_majority() {
        let (mut timelock, _, _) = operator_timelock();
        let split = FixedTally::split();
        assert_eq!(
            timelock.set_operator(addr(9), &split, 1),
            Err(GovernanceError::NotEnoughVotes)
        );
    }

    #[test]
    fn test_pending_candidate_losing_majority_is_evicted() {
        let (mut timelock, _, bob) = operator_timelock();
        let erin = addr(5);
        let tally = FixedTally::majority_for(erin);
        timelock.set_operator(erin, &tally, 100).unwrap();

        // Erin's support evaporates; naming them again clears the slot
        // without reverting
        let split = FixedTally::split();
        let transition = timelock.set_operator(erin, &split, 200).unwrap();
        assert_eq!(transition, OperatorTransition::Evicted);
        assert_eq!(timelock.operator(), bob);
        assert_eq!(timelock.pending_operator(), Address::ZERO);
        assert_eq!(
            timelock.events().last().unwrap(),
            &TimelockEvent::PendingEvicted { candidate: erin }
        );
    }

    #[test]
    fn test_naming_other_candidate_while_pending() {
        let (mut timelock, _, _) = operator_timelock();
        let (erin, fred) = (addr(5), addr(6));
        let tally = FixedTally::majority_for(erin);
        timelock.set_operator(erin, &tally, 100).unwrap();

        // Fred has no majority while erin is pending
        assert_eq!(
            timelock.set_operator(fred, &tally, 200),
            Err(GovernanceError::NotEnoughVotes)
        );

        // With a majority, fred replaces erin as the pending candidate
        let fred_tally = FixedTally::majority_for(fred);
        timelock.set_operator(fred, &fred_tally, 300).unwrap();
        assert_eq!(timelock.pending_operator(), fred);
    }
}
