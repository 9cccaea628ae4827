//! Read-only projections over the ledger store.

use crate::Amount;
use crate::engine::LedgerError;
use crate::model::{Account, AccountId, TransactionKind, TransactionRecord, UserId};
use crate::policy;
use crate::store::Store;

/// Read side of the wallet: balances, account listings, history.
///
/// Shares the store with the engine and enforces the same access policy
/// on every per-account read. Never mutates.
pub struct QueryService<S> {
    store: S,
}

impl<S: Store> QueryService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Current committed balance of an account owned by `caller`.
    pub fn balance(&self, caller: UserId, account: AccountId) -> Result<Amount, LedgerError> {
        Ok(policy::authorize(&self.store, caller, account)?.balance)
    }

    /// All accounts owned by `owner`, ordered by id.
    pub fn accounts_of(&self, owner: UserId) -> Vec<Account> {
        self.store
            .accounts()
            .into_iter()
            .filter(|account| account.owner == owner)
            .collect()
    }

    /// Transaction history of an account owned by `caller`, most recent
    /// first, optionally restricted to one kind.
    pub fn history(
        &self,
        caller: UserId,
        account: AccountId,
        kind: Option<TransactionKind>,
    ) -> Result<Vec<TransactionRecord>, LedgerError> {
        policy::authorize(&self.store, caller, account)?;
        Ok(self.store.find_transactions(account, kind))
    }
}
