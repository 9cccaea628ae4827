//! Ledger engine: validated, atomic money movement.
//!
//! The engine owns the only code path that mutates balances. Every
//! operation checks the access policy, then performs its balance
//! mutation and log append inside a single unit of work on the store.
//! A call has exactly two outcomes: it commits fully and returns the
//! created transaction row, or it rejects with a [`LedgerError`] and
//! leaves the store untouched.

use tracing::info;

use crate::Amount;
use crate::model::{AccountId, TransactionKind, TransactionRecord, UserId};
use crate::policy;
use crate::store::{Store, TransactionDraft};

mod error;
pub use error::LedgerError;

/// The ledger engine.
///
/// Generic over the [`Store`] contract. Operations take `&self`, so one
/// engine can be shared across request handlers behind an `Arc`.
pub struct Ledger<S> {
    store: S,
}

/// Public API
impl<S: Store> Ledger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The underlying store, for read-side consumers.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Credit `amount` to an account owned by `caller`.
    pub fn deposit(
        &self,
        caller: UserId,
        account: AccountId,
        amount: Amount,
    ) -> Result<TransactionRecord, LedgerError> {
        let result = self.apply_deposit(caller, account, amount);
        Self::log_outcome("deposit", caller, account, amount, &result);
        result
    }

    /// Debit `amount` from an account owned by `caller`.
    pub fn withdraw(
        &self,
        caller: UserId,
        account: AccountId,
        amount: Amount,
    ) -> Result<TransactionRecord, LedgerError> {
        let result = self.apply_withdraw(caller, account, amount);
        Self::log_outcome("withdraw", caller, account, amount, &result);
        result
    }

    /// Move `amount` from an account owned by `caller` to any other
    /// existing account.
    pub fn transfer(
        &self,
        caller: UserId,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<TransactionRecord, LedgerError> {
        let result = self.apply_transfer(caller, from, to, amount);
        match &result {
            Ok(record) => {
                info!(caller, from, to, amount = %amount, tx = record.id, "transfer committed");
            }
            Err(reason) => {
                info!(caller, from, to, amount = %amount, reason = %reason, "transfer rejected");
            }
        }
        result
    }

    /// All transactions touching an account owned by `caller`, most
    /// recent first, optionally restricted to one kind.
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

/// Private API
impl<S: Store> Ledger<S> {
    fn require_positive(amount: Amount) -> Result<(), LedgerError> {
        if amount.is_positive() {
            Ok(())
        } else {
            Err(LedgerError::InvalidAmount(amount))
        }
    }

    /// Apply a deposit:
    /// - amount must be positive
    /// - account must exist and be owned by the caller
    /// - credit and log append commit as one unit
    fn apply_deposit(
        &self,
        caller: UserId,
        account: AccountId,
        amount: Amount,
    ) -> Result<TransactionRecord, LedgerError> {
        Self::require_positive(amount)?;
        policy::authorize(&self.store, caller, account)?;

        self.store.run_atomic(&[account], |unit| {
            unit.update_balance(account, amount)?;
            unit.append(TransactionDraft::deposit(account, amount))
        })
    }

    /// Apply a withdrawal:
    /// - amount must be positive
    /// - account must exist and be owned by the caller
    /// - the sufficiency check and the debit share one unit, so a
    ///   concurrent debit cannot slip between them
    fn apply_withdraw(
        &self,
        caller: UserId,
        account: AccountId,
        amount: Amount,
    ) -> Result<TransactionRecord, LedgerError> {
        Self::require_positive(amount)?;
        policy::authorize(&self.store, caller, account)?;

        self.store.run_atomic(&[account], |unit| {
            let snapshot = unit.account(account)?;
            if snapshot.balance < amount {
                return Err(LedgerError::InsufficientFunds(
                    account,
                    snapshot.balance,
                    amount,
                ));
            }

            unit.update_balance(account, -amount)?;
            unit.append(TransactionDraft::withdraw(account, amount))
        })
    }

    /// Apply a transfer. Precondition order: amount, distinct accounts,
    /// source ownership, destination existence, source funds. The debit,
    /// credit and log append commit as one unit over both accounts.
    fn apply_transfer(
        &self,
        caller: UserId,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<TransactionRecord, LedgerError> {
        Self::require_positive(amount)?;
        if from == to {
            return Err(LedgerError::SameAccount(from));
        }
        policy::authorize(&self.store, caller, from)?;
        if self.store.account(to).is_none() {
            return Err(LedgerError::InvalidDestination(to));
        }

        self.store.run_atomic(&[from, to], |unit| {
            let source = unit.account(from)?;
            if source.balance < amount {
                return Err(LedgerError::InsufficientFunds(from, source.balance, amount));
            }

            unit.update_balance(from, -amount)?;
            unit.update_balance(to, amount)?;
            unit.append(TransactionDraft::transfer(from, to, amount))
        })
    }

    /// Small helper to log single-account operation outcomes
    fn log_outcome(
        op: &'static str,
        caller: UserId,
        account: AccountId,
        amount: Amount,
        result: &Result<TransactionRecord, LedgerError>,
    ) {
        match result {
            Ok(record) => {
                info!(op, caller, account, amount = %amount, tx = record.id, "operation committed");
            }
            Err(reason) => {
                info!(op, caller, account, amount = %amount, reason = %reason, "operation rejected");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Account, TransactionStatus};
    use crate::store::{MemoryStore, UnitOfWork};

    // test utils

    fn amt(value: i64) -> Amount {
        Amount::from_scaled(value)
    }

    fn ledger() -> Ledger<MemoryStore> {
        Ledger::new(MemoryStore::new())
    }

    fn open(ledger: &Ledger<MemoryStore>, owner: UserId, balance: i64) -> AccountId {
        ledger
            .store()
            .create_account(owner, amt(balance))
            .unwrap()
            .id
    }

    fn balance_of(ledger: &Ledger<MemoryStore>, account: AccountId) -> Amount {
        ledger.store().account(account).unwrap().balance
    }

    // Deposit

    #[test]
    fn deposit_credits_balance_and_logs_row() {
        let ledger = ledger();
        let account = open(&ledger, 1, 100);

        let record = ledger.deposit(1, account, amt(50)).unwrap();

        assert_eq!(record.kind, TransactionKind::Deposit);
        assert_eq!(record.from_account, None);
        assert_eq!(record.to_account, Some(account));
        assert_eq!(record.amount, amt(50));
        assert_eq!(record.status, TransactionStatus::Success);
        assert_eq!(balance_of(&ledger, account), amt(150));
    }

    #[test]
    fn deposit_of_zero_is_invalid() {
        let ledger = ledger();
        let account = open(&ledger, 1, 100);

        let result = ledger.deposit(1, account, Amount::ZERO);

        assert_eq!(result, Err(LedgerError::InvalidAmount(Amount::ZERO)));
        assert_eq!(balance_of(&ledger, account), amt(100));
        assert!(ledger.store().find_transactions(account, None).is_empty());
    }

    #[test]
    fn deposit_of_negative_amount_is_invalid() {
        let ledger = ledger();
        let account = open(&ledger, 1, 100);

        let result = ledger.deposit(1, account, amt(-10));
        assert_eq!(result, Err(LedgerError::InvalidAmount(amt(-10))));
    }

    #[test]
    fn deposit_to_missing_account_is_not_found() {
        let ledger = ledger();
        let result = ledger.deposit(1, 99, amt(10));
        assert_eq!(result, Err(LedgerError::AccountNotFound(99)));
    }

    #[test]
    fn deposit_to_foreign_account_is_denied() {
        let ledger = ledger();
        let account = open(&ledger, 1, 100);

        let result = ledger.deposit(2, account, amt(10));

        assert_eq!(result, Err(LedgerError::AccessDenied(account, 2)));
        assert_eq!(balance_of(&ledger, account), amt(100));
    }

    #[test]
    fn amount_is_checked_before_ownership() {
        let ledger = ledger();
        let account = open(&ledger, 1, 100);

        // An invalid amount wins over the ownership rejection.
        let result = ledger.deposit(2, account, amt(-10));
        assert_eq!(result, Err(LedgerError::InvalidAmount(amt(-10))));
    }

    // Withdraw

    #[test]
    fn withdraw_debits_balance_and_logs_row() {
        let ledger = ledger();
        let account = open(&ledger, 1, 100);

        let record = ledger.withdraw(1, account, amt(30)).unwrap();

        assert_eq!(record.kind, TransactionKind::Withdraw);
        assert_eq!(record.from_account, Some(account));
        assert_eq!(record.to_account, None);
        assert_eq!(balance_of(&ledger, account), amt(70));
    }

    #[test]
    fn withdraw_of_exact_balance_succeeds() {
        let ledger = ledger();
        let account = open(&ledger, 1, 100);

        ledger.withdraw(1, account, amt(100)).unwrap();
        assert_eq!(balance_of(&ledger, account), Amount::ZERO);
    }

    #[test]
    fn withdraw_with_insufficient_funds_is_rejected() {
        let ledger = ledger();
        let account = open(&ledger, 1, 400);

        let result = ledger.withdraw(1, account, amt(500));

        assert_eq!(
            result,
            Err(LedgerError::InsufficientFunds(account, amt(400), amt(500)))
        );
        assert_eq!(balance_of(&ledger, account), amt(400));
        assert!(ledger.store().find_transactions(account, None).is_empty());
    }

    #[test]
    fn withdraw_from_foreign_account_is_denied_regardless_of_balance() {
        let ledger = ledger();
        let account = open(&ledger, 1, 100);

        // Denied before funds are even considered.
        let small = ledger.withdraw(2, account, amt(10));
        let large = ledger.withdraw(2, account, amt(1_000));

        assert_eq!(small, Err(LedgerError::AccessDenied(account, 2)));
        assert_eq!(large, Err(LedgerError::AccessDenied(account, 2)));
        assert_eq!(balance_of(&ledger, account), amt(100));
    }

    #[test]
    fn withdraw_from_missing_account_is_not_found() {
        let ledger = ledger();
        let result = ledger.withdraw(1, 99, amt(10));
        assert_eq!(result, Err(LedgerError::AccountNotFound(99)));
    }

    // Transfer

    #[test]
    fn transfer_moves_funds_between_accounts() {
        let ledger = ledger();
        let source = open(&ledger, 1, 10_000_000); // 1000.0
        let destination = open(&ledger, 2, 5_000_000); // 500.0

        let record = ledger
            .transfer(1, source, destination, amt(5_000_000))
            .unwrap();

        assert_eq!(record.kind, TransactionKind::Transfer);
        assert_eq!(record.from_account, Some(source));
        assert_eq!(record.to_account, Some(destination));
        assert_eq!(record.amount, amt(5_000_000));
        assert_eq!(record.status, TransactionStatus::Success);
        assert_eq!(balance_of(&ledger, source), amt(5_000_000));
        assert_eq!(balance_of(&ledger, destination), amt(10_000_000));
    }

    #[test]
    fn transfer_conserves_total_balance() {
        let ledger = ledger();
        let source = open(&ledger, 1, 700);
        let destination = open(&ledger, 2, 300);

        let before = balance_of(&ledger, source) + balance_of(&ledger, destination);
        ledger.transfer(1, source, destination, amt(250)).unwrap();
        let after = balance_of(&ledger, source) + balance_of(&ledger, destination);

        assert_eq!(before, after);
    }

    #[test]
    fn transfer_to_same_account_is_rejected() {
        let ledger = ledger();
        let account = open(&ledger, 1, 100);

        let result = ledger.transfer(1, account, account, amt(100));

        assert_eq!(result, Err(LedgerError::SameAccount(account)));
        assert_eq!(balance_of(&ledger, account), amt(100));
        assert!(ledger.store().find_transactions(account, None).is_empty());
    }

    #[test]
    fn transfer_amount_is_checked_before_same_account() {
        let ledger = ledger();
        let account = open(&ledger, 1, 100);

        let result = ledger.transfer(1, account, account, Amount::ZERO);
        assert_eq!(result, Err(LedgerError::InvalidAmount(Amount::ZERO)));
    }

    #[test]
    fn transfer_from_foreign_source_is_denied() {
        let ledger = ledger();
        let source = open(&ledger, 1, 100);
        let destination = open(&ledger, 2, 100);

        // Caller 2 owns the destination but not the source.
        let result = ledger.transfer(2, source, destination, amt(50));

        assert_eq!(result, Err(LedgerError::AccessDenied(source, 2)));
        assert_eq!(balance_of(&ledger, source), amt(100));
        assert_eq!(balance_of(&ledger, destination), amt(100));
    }

    #[test]
    fn transfer_from_missing_source_is_not_found() {
        let ledger = ledger();
        let destination = open(&ledger, 2, 100);

        let result = ledger.transfer(1, 99, destination, amt(50));
        assert_eq!(result, Err(LedgerError::AccountNotFound(99)));
    }

    #[test]
    fn transfer_to_missing_destination_is_rejected() {
        let ledger = ledger();
        let source = open(&ledger, 1, 100);

        let result = ledger.transfer(1, source, 99, amt(50));

        assert_eq!(result, Err(LedgerError::InvalidDestination(99)));
        assert_eq!(balance_of(&ledger, source), amt(100));
    }

    #[test]
    fn transfer_with_insufficient_funds_leaves_both_accounts_untouched() {
        let ledger = ledger();
        let source = open(&ledger, 1, 100);
        let destination = open(&ledger, 2, 100);

        let result = ledger.transfer(1, source, destination, amt(101));

        assert_eq!(
            result,
            Err(LedgerError::InsufficientFunds(source, amt(100), amt(101)))
        );
        assert_eq!(balance_of(&ledger, source), amt(100));
        assert_eq!(balance_of(&ledger, destination), amt(100));
    }

    #[test]
    fn transfer_to_foreign_destination_is_allowed() {
        let ledger = ledger();
        let source = open(&ledger, 1, 100);
        let destination = open(&ledger, 2, 0);

        ledger.transfer(1, source, destination, amt(40)).unwrap();
        assert_eq!(balance_of(&ledger, destination), amt(40));
    }

    // History

    #[test]
    fn history_returns_rows_most_recent_first() {
        let ledger = ledger();
        let account = open(&ledger, 1, 100);

        ledger.deposit(1, account, amt(10)).unwrap();
        ledger.withdraw(1, account, amt(5)).unwrap();
        ledger.deposit(1, account, amt(20)).unwrap();

        let rows = ledger.history(1, account, None).unwrap();
        let amounts: Vec<Amount> = rows.iter().map(|row| row.amount).collect();
        assert_eq!(amounts, vec![amt(20), amt(5), amt(10)]);
    }

    #[test]
    fn history_filters_by_kind() {
        let ledger = ledger();
        let source = open(&ledger, 1, 10_000_000);
        let destination = open(&ledger, 2, 5_000_000);

        ledger.deposit(1, source, amt(100)).unwrap();
        ledger
            .transfer(1, source, destination, amt(5_000_000))
            .unwrap();

        let transfers = ledger
            .history(1, source, Some(TransactionKind::Transfer))
            .unwrap();
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].kind, TransactionKind::Transfer);
        assert_eq!(transfers[0].amount, amt(5_000_000));
    }

    #[test]
    fn history_of_foreign_account_is_denied() {
        let ledger = ledger();
        let account = open(&ledger, 1, 100);

        let result = ledger.history(2, account, None);
        assert_eq!(result, Err(LedgerError::AccessDenied(account, 2)));
    }

    #[test]
    fn history_reads_are_repeatable() {
        let ledger = ledger();
        let account = open(&ledger, 1, 100);
        ledger.deposit(1, account, amt(10)).unwrap();
        ledger.withdraw(1, account, amt(5)).unwrap();

        let first = ledger.history(1, account, None).unwrap();
        let second = ledger.history(1, account, None).unwrap();
        assert_eq!(first, second);
    }

    // Atomicity against a store whose log refuses appends

    struct FailingAppend(MemoryStore);

    impl Store for FailingAppend {
        fn create_account(
            &self,
            owner: UserId,
            initial_balance: Amount,
        ) -> Result<Account, LedgerError> {
            self.0.create_account(owner, initial_balance)
        }

        fn account(&self, id: AccountId) -> Option<Account> {
            self.0.account(id)
        }

        fn accounts(&self) -> Vec<Account> {
            self.0.accounts()
        }

        fn find_transactions(
            &self,
            account: AccountId,
            kind: Option<TransactionKind>,
        ) -> Vec<TransactionRecord> {
            self.0.find_transactions(account, kind)
        }

        fn run_atomic<T, F>(&self, ids: &[AccountId], work: F) -> Result<T, LedgerError>
        where
            F: FnOnce(&mut dyn UnitOfWork) -> Result<T, LedgerError>,
        {
            self.0
                .run_atomic(ids, |unit| work(&mut RefusingLog { inner: unit }))
        }
    }

    struct RefusingLog<'a> {
        inner: &'a mut dyn UnitOfWork,
    }

    impl UnitOfWork for RefusingLog<'_> {
        fn account(&self, id: AccountId) -> Result<Account, LedgerError> {
            self.inner.account(id)
        }

        fn update_balance(&mut self, id: AccountId, delta: Amount) -> Result<Account, LedgerError> {
            self.inner.update_balance(id, delta)
        }

        fn append(&mut self, _draft: TransactionDraft) -> Result<TransactionRecord, LedgerError> {
            Err(LedgerError::ConflictAbort)
        }
    }

    #[test]
    fn failed_append_rolls_back_the_balance_update() {
        let ledger = Ledger::new(FailingAppend(MemoryStore::new()));
        let account = ledger.store().create_account(1, amt(100)).unwrap().id;

        let result = ledger.deposit(1, account, amt(50));

        assert_eq!(result, Err(LedgerError::ConflictAbort));
        assert_eq!(ledger.store().account(account).unwrap().balance, amt(100));
        assert!(ledger.store().find_transactions(account, None).is_empty());
    }

    #[test]
    fn failed_append_rolls_back_both_sides_of_a_transfer() {
        let ledger = Ledger::new(FailingAppend(MemoryStore::new()));
        let source = ledger.store().create_account(1, amt(100)).unwrap().id;
        let destination = ledger.store().create_account(2, amt(0)).unwrap().id;

        let result = ledger.transfer(1, source, destination, amt(60));

        assert_eq!(result, Err(LedgerError::ConflictAbort));
        assert_eq!(ledger.store().account(source).unwrap().balance, amt(100));
        assert_eq!(ledger.store().account(destination).unwrap().balance, Amount::ZERO);
    }
}
