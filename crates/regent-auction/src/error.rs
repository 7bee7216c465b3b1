use regent_ledger::LedgerError;
use thiserror::Error;

/// Errors that can occur in auction operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuctionError {
    /// The named week is not the active, unfinalized sale week.
    #[error("Stale week")]
    StaleWeek,

    /// The purchase would entitle claimants to more than the week's supply.
    #[error("Oversold")]
    Oversold,

    /// The week can only advance once sold out or past its end time.
    #[error("Not fully sold")]
    NotFullySold,

    /// Claims open only once the week is finalized.
    #[error("Not finished")]
    NotFinished,

    #[error("Arithmetic overflow")]
    Overflow,

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
