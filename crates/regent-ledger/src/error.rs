use thiserror::Error;

/// Errors that can occur in ledger operations.
///
/// Every failure leaves the ledger wholly unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Zero address")]
    ZeroAddress,

    #[error("Zero owner")]
    ZeroOwner,

    #[error("Low balance")]
    LowBalance,

    #[error("Low allowance")]
    LowAllowance,

    #[error("Expired")]
    Expired,

    #[error("Invalid signature")]
    InvalidSig,

    #[error("Balance overflow")]
    Overflow,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(LedgerError::LowBalance.to_string(), "Low balance");
        assert_eq!(LedgerError::InvalidSig.to_string(), "Invalid signature");
    }
}
