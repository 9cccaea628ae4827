//! Error taxonomy for ledger operations.

use thiserror::Error;

use crate::Amount;
use crate::model::{AccountId, UserId};

/// Rejection returned by [`Ledger`](super::Ledger) operations and by the
/// store contract.
///
/// Every kind except [`ConflictAbort`](LedgerError::ConflictAbort) is a
/// business-rule rejection and will fail the same way on retry. A
/// `ConflictAbort` means the unit of work could not commit against
/// concurrent mutation; the whole operation may be retried from scratch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("amount must be positive, got {0}")]
    InvalidAmount(Amount),

    #[error("account {0} not found")]
    AccountNotFound(AccountId),

    #[error("account {0} is not owned by user {1}")]
    AccessDenied(AccountId, UserId),

    #[error("insufficient funds in account {0}: balance {1}, requested {2}")]
    InsufficientFunds(AccountId, Amount, Amount),

    #[error("cannot transfer from account {0} to itself")]
    SameAccount(AccountId),

    #[error("transfer destination account {0} not found")]
    InvalidDestination(AccountId),

    #[error("unit of work aborted due to a concurrent conflict")]
    ConflictAbort,
}

impl LedgerError {
    /// Whether retrying the whole operation can succeed without any
    /// input changing.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::ConflictAbort)
    }
}
