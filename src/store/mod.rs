//! Account store and transaction log contracts consumed by the engine.
//!
//! [`Store`] is the persistence seam: a point-lookup account table, an
//! append-only transaction log, and [`Store::run_atomic`], which scopes
//! a group of store calls into one all-or-nothing unit of work. The
//! in-memory implementation lives in [`MemoryStore`]; the engine only
//! ever talks to the traits.

mod memory;
pub use memory::MemoryStore;

use crate::Amount;
use crate::engine::LedgerError;
use crate::model::{Account, AccountId, TransactionKind, TransactionRecord, UserId};

/// A staged, not-yet-committed transaction row.
///
/// The constructors are the only way to build one, so the row shape
/// invariant (one side set for deposits and withdrawals, both sides set
/// for transfers) holds by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionDraft {
    kind: TransactionKind,
    from_account: Option<AccountId>,
    to_account: Option<AccountId>,
    amount: Amount,
}

impl TransactionDraft {
    pub fn deposit(to: AccountId, amount: Amount) -> Self {
        Self {
            kind: TransactionKind::Deposit,
            from_account: None,
            to_account: Some(to),
            amount,
        }
    }

    pub fn withdraw(from: AccountId, amount: Amount) -> Self {
        Self {
            kind: TransactionKind::Withdraw,
            from_account: Some(from),
            to_account: None,
            amount,
        }
    }

    pub fn transfer(from: AccountId, to: AccountId, amount: Amount) -> Self {
        Self {
            kind: TransactionKind::Transfer,
            from_account: Some(from),
            to_account: Some(to),
            amount,
        }
    }

    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    pub fn from_account(&self) -> Option<AccountId> {
        self.from_account
    }

    pub fn to_account(&self) -> Option<AccountId> {
        self.to_account
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }
}

/// Persistent account store plus transaction log.
///
/// Implementations must guarantee that two concurrent `run_atomic` units
/// touching a common account serialize against each other, while units
/// over disjoint accounts may proceed in parallel.
pub trait Store: Send + Sync {
    /// Create an account for `owner` with a non-negative opening balance.
    fn create_account(
        &self,
        owner: UserId,
        initial_balance: Amount,
    ) -> Result<Account, LedgerError>;

    /// Committed snapshot of one account, if it exists.
    fn account(&self, id: AccountId) -> Option<Account>;

    /// Committed snapshots of every account, ordered by id.
    fn accounts(&self) -> Vec<Account>;

    /// All committed rows where `account` appears as source or
    /// destination, most recent first, optionally restricted to `kind`.
    fn find_transactions(
        &self,
        account: AccountId,
        kind: Option<TransactionKind>,
    ) -> Vec<TransactionRecord>;

    /// Run `work` as one unit: every store call made through the
    /// [`UnitOfWork`] handle commits together on `Ok`, and none of them
    /// commit on `Err`. The unit is isolated from concurrent units
    /// touching any of the accounts in `ids`.
    fn run_atomic<T, F>(&self, ids: &[AccountId], work: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut dyn UnitOfWork) -> Result<T, LedgerError>;
}

/// Scoped handle for the store calls inside one unit of work.
///
/// Reads through the handle observe the unit's own staged writes.
/// Accounts outside the unit's scope are not reachable.
pub trait UnitOfWork {
    /// Snapshot of an in-scope account as of this unit.
    fn account(&self, id: AccountId) -> Result<Account, LedgerError>;

    /// Apply a signed balance delta. Fails the unit if the resulting
    /// balance would be negative.
    fn update_balance(&mut self, id: AccountId, delta: Amount) -> Result<Account, LedgerError>;

    /// Stage an insert-only log row. The returned record carries its
    /// assigned id and commit timestamp.
    fn append(&mut self, draft: TransactionDraft) -> Result<TransactionRecord, LedgerError>;
}

impl<S: Store> Store for std::sync::Arc<S> {
    fn create_account(
        &self,
        owner: UserId,
        initial_balance: Amount,
    ) -> Result<Account, LedgerError> {
        (**self).create_account(owner, initial_balance)
    }

    fn account(&self, id: AccountId) -> Option<Account> {
        (**self).account(id)
    }

    fn accounts(&self) -> Vec<Account> {
        (**self).accounts()
    }

    fn find_transactions(
        &self,
        account: AccountId,
        kind: Option<TransactionKind>,
    ) -> Vec<TransactionRecord> {
        (**self).find_transactions(account, kind)
    }

    fn run_atomic<T, F>(&self, ids: &[AccountId], work: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut dyn UnitOfWork) -> Result<T, LedgerError>,
    {
        (**self).run_atomic(ids, work)
    }
}
