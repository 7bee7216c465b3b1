//! Regent Governance - staking, voting and timelocked execution.
//!
//! This crate provides:
//! - The staking vault: wraps the treasury token into shares whose price
//!   floats with tribute deposits, with a 24 h withdrawal lock
//! - The voting registry: per-holder delegation and per-delegate weight,
//!   kept consistent with every share balance change
//! - The timelock: a vote-gated queue of privileged calls and the
//!   two-phase operator succession
//! - The [`Dao`] composition tying the whole treasury together

pub mod votes;
pub mod vault;
pub mod timelock;
pub mod dao;
pub mod error;

pub use votes::{VoteTally, VotingRegistry};
pub use vault::{StakingVault, VaultParams};
pub use timelock::{
    call_hash, CallError, CallTarget, OperatorTransition, Timelock, TimelockEvent, TimelockParams,
};
pub use dao::{Dao, DaoParams, SharedDao};
pub use error::GovernanceError;
