//! Regent Ledger - Commodity token bookkeeping.
//!
//! A [`TokenLedger`] is the ERC20-shaped balance/allowance store used in
//! two places by the treasury: the auctioned token itself, and the staking
//! vault's share token. All mutations are typed operations returning
//! `Result`; there is no silent clamping anywhere.

pub mod token;
pub mod error;

pub use token::{TokenEvent, TokenLedger};
pub use error::LedgerError;
