use regent_auction::AuctionError;
use regent_ledger::LedgerError;
use thiserror::Error;

/// Errors that can occur in governance operations.
///
/// Every failure leaves the treasury wholly unchanged, with one
/// deliberate exception: a `CallReverted` from `execute_transaction`
/// keeps the queue entry so the call stays retryable until stale.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GovernanceError {
    /// The caller's shares are still inside the withdrawal lock window.
    #[error("Locked")]
    Locked,

    #[error("Zero address")]
    ZeroAddress,

    #[error("Operator only")]
    OperatorOnly,

    #[error("Not enough votes")]
    NotEnoughVotes,

    #[error("Too early")]
    TooEarly,

    #[error("Tx stale")]
    TxStale,

    #[error("Wait longer")]
    WaitLonger,

    #[error("Zero operator")]
    ZeroOperator,

    /// The forwarded call failed; the queue entry survives for retry.
    #[error("Tx reverted: {0}")]
    CallReverted(String),

    #[error("Arithmetic overflow")]
    Overflow,

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Auction(#[from] AuctionError),
}
