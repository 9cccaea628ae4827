//! In-memory store with per-account locking.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::Utc;

use super::{Store, TransactionDraft, UnitOfWork};
use crate::Amount;
use crate::engine::LedgerError;
use crate::model::{
    Account, AccountId, TransactionKind, TransactionRecord, TransactionStatus, UserId,
};

/// In-memory [`Store`]: a table of independently locked account rows
/// plus an append-only transaction log.
///
/// `run_atomic` acquires the row locks of the accounts it touches in
/// ascending id order. The fixed global order means two units locking
/// the same pair of accounts from opposite directions cannot deadlock,
/// and units over disjoint accounts never contend. Staged writes are
/// published through the held guards only after the unit's closure
/// returns `Ok`, so an aborted unit leaves no trace.
pub struct MemoryStore {
    accounts: RwLock<HashMap<AccountId, Arc<Mutex<Account>>>>,
    log: RwLock<Vec<TransactionRecord>>,
    next_account_id: AtomicU64,
    next_tx_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            log: RwLock::new(Vec::new()),
            next_account_id: AtomicU64::new(1),
            next_tx_id: AtomicU64::new(1),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    fn create_account(
        &self,
        owner: UserId,
        initial_balance: Amount,
    ) -> Result<Account, LedgerError> {
        if initial_balance.is_negative() {
            return Err(LedgerError::InvalidAmount(initial_balance));
        }

        let id = self.next_account_id.fetch_add(1, Ordering::Relaxed);
        let account = Account {
            id,
            owner,
            balance: initial_balance,
        };

        let mut table = self.accounts.write().map_err(|_| LedgerError::ConflictAbort)?;
        table.insert(id, Arc::new(Mutex::new(account.clone())));

        Ok(account)
    }

    fn account(&self, id: AccountId) -> Option<Account> {
        let row = {
            let table = self.accounts.read().ok()?;
            Arc::clone(table.get(&id)?)
        };
        let guard = row.lock().ok()?;
        Some(guard.clone())
    }

    fn accounts(&self) -> Vec<Account> {
        let rows: Vec<Arc<Mutex<Account>>> = match self.accounts.read() {
            Ok(table) => table.values().map(Arc::clone).collect(),
            Err(_) => return Vec::new(),
        };

        let mut snapshots: Vec<Account> = rows
            .iter()
            .filter_map(|row| row.lock().ok().map(|guard| guard.clone()))
            .collect();
        snapshots.sort_by_key(|account| account.id);
        snapshots
    }

    fn find_transactions(
        &self,
        account: AccountId,
        kind: Option<TransactionKind>,
    ) -> Vec<TransactionRecord> {
        let Ok(log) = self.log.read() else {
            return Vec::new();
        };

        let mut rows: Vec<TransactionRecord> = log
            .iter()
            .filter(|row| row.involves(account))
            .filter(|row| kind.map_or(true, |k| row.kind == k))
            .cloned()
            .collect();

        // Most recent first; ids break same-timestamp ties.
        rows.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        rows
    }

    fn run_atomic<T, F>(&self, ids: &[AccountId], work: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut dyn UnitOfWork) -> Result<T, LedgerError>,
    {
        let mut scope: Vec<AccountId> = ids.to_vec();
        scope.sort_unstable();
        scope.dedup();

        // Resolve row handles under the table lock, then release it
        // before blocking on any row lock.
        let rows: Vec<(AccountId, Arc<Mutex<Account>>)> = {
            let table = self.accounts.read().map_err(|_| LedgerError::ConflictAbort)?;
            scope
                .iter()
                .map(|id| {
                    table
                        .get(id)
                        .map(|row| (*id, Arc::clone(row)))
                        .ok_or(LedgerError::AccountNotFound(*id))
                })
                .collect::<Result<_, _>>()?
        };

        // Ascending id order; `scope` is sorted, so iteration order is
        // the lock order.
        let mut guards: BTreeMap<AccountId, MutexGuard<'_, Account>> = BTreeMap::new();
        for (id, row) in &rows {
            let guard = row.lock().map_err(|_| LedgerError::ConflictAbort)?;
            guards.insert(*id, guard);
        }

        let mut unit = MemoryUnit {
            store: self,
            staged: guards.iter().map(|(id, g)| (*id, (**g).clone())).collect(),
            appended: Vec::new(),
        };

        let out = work(&mut unit)?;
        let MemoryUnit { staged, appended, .. } = unit;

        // Take the log lock before touching balances so the commit is
        // all-or-nothing even if the log lock is poisoned.
        let mut log = self.log.write().map_err(|_| LedgerError::ConflictAbort)?;
        for (id, guard) in guards.iter_mut() {
            **guard = staged[id].clone();
        }
        log.extend(appended);

        Ok(out)
    }
}

/// Staging buffer for one unit of work.
///
/// Holds copies of the locked account rows; mutations land here and are
/// written back through the guards only on commit.
struct MemoryUnit<'a> {
    store: &'a MemoryStore,
    staged: HashMap<AccountId, Account>,
    appended: Vec<TransactionRecord>,
}

impl UnitOfWork for MemoryUnit<'_> {
    fn account(&self, id: AccountId) -> Result<Account, LedgerError> {
        self.staged
            .get(&id)
            .cloned()
            .ok_or(LedgerError::AccountNotFound(id))
    }

    fn update_balance(&mut self, id: AccountId, delta: Amount) -> Result<Account, LedgerError> {
        let account = self
            .staged
            .get_mut(&id)
            .ok_or(LedgerError::AccountNotFound(id))?;

        let next = account.balance + delta;
        if next.is_negative() {
            return Err(LedgerError::InsufficientFunds(id, account.balance, -delta));
        }

        account.balance = next;
        Ok(account.clone())
    }

    fn append(&mut self, draft: TransactionDraft) -> Result<TransactionRecord, LedgerError> {
        // Ids are taken from the shared counter at staging time; a unit
        // that later aborts burns them, leaving a sequence gap.
        let record = TransactionRecord {
            id: self.store.next_tx_id.fetch_add(1, Ordering::Relaxed),
            kind: draft.kind(),
            from_account: draft.from_account(),
            to_account: draft.to_account(),
            amount: draft.amount(),
            status: TransactionStatus::Success,
            created_at: Utc::now(),
        };
        self.appended.push(record.clone());
        Ok(record)
    }
}
