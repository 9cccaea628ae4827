//! Core domain types for the wallet ledger.

use chrono::{DateTime, Utc};

use crate::Amount;

/// User identifier, issued by the authentication layer.
pub type UserId = u64;

/// Account identifier.
pub type AccountId = u64;

/// Transaction identifier.
pub type TxId = u64;

/// A wallet account: a balance owned by exactly one user.
///
/// The id and owner are fixed at creation. The balance is mutated only
/// through the ledger engine and never drops below zero in committed
/// state. Accounts are never deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub owner: UserId,
    pub balance: Amount,
}

/// The kind of money movement a transaction records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    /// Funds entering the wallet from outside.
    Deposit,
    /// Funds leaving the wallet.
    Withdraw,
    /// Funds moving between two wallet accounts.
    Transfer,
}

/// Outcome recorded on a committed transaction.
///
/// Rejected operations never produce a log row, so `Success` is the only
/// status that is ever persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionStatus {
    #[default]
    Success,
}

/// One committed row of the transaction log, immutable once written.
///
/// Deposits carry only a destination, withdrawals only a source, and
/// transfers carry both (always distinct).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    pub id: TxId,
    pub kind: TransactionKind,
    pub from_account: Option<AccountId>,
    pub to_account: Option<AccountId>,
    pub amount: Amount,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

impl TransactionRecord {
    /// Whether `account` appears as source or destination.
    pub fn involves(&self, account: AccountId) -> bool {
        self.from_account == Some(account) || self.to_account == Some(account)
    }
}
