//! Replay a stream of wallet operations against a ledger.
//!
//! Used by the CLI to drive the engine from an operations file. A
//! rejected operation is logged and skipped; the replay never stops
//! early.

use tokio_stream::{Stream, StreamExt};
use tracing::{info, warn};

use crate::Amount;
use crate::engine::{Ledger, LedgerError};
use crate::model::{AccountId, UserId};
use crate::store::Store;

/// One wallet operation, as produced by an external driver.
#[derive(Debug, Clone)]
pub enum Operation {
    /// Open a new account for `owner` with an opening balance.
    Open { owner: UserId, initial_balance: Amount },
    Deposit {
        caller: UserId,
        account: AccountId,
        amount: Amount,
    },
    Withdraw {
        caller: UserId,
        account: AccountId,
        amount: Amount,
    },
    Transfer {
        caller: UserId,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    },
}

/// Counts of applied and rejected operations after a replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub applied: u64,
    pub rejected: u64,
}

/// Drive the ledger with every operation from `stream`.
pub async fn run<S: Store>(
    ledger: &Ledger<S>,
    mut stream: impl Stream<Item = Operation> + Unpin,
) -> ReplaySummary {
    let mut summary = ReplaySummary::default();

    while let Some(op) = stream.next().await {
        match apply(ledger, &op) {
            Ok(()) => summary.applied += 1,
            Err(reason) => {
                summary.rejected += 1;
                warn!(?op, %reason, "operation rejected");
            }
        }
    }

    summary
}

fn apply<S: Store>(ledger: &Ledger<S>, op: &Operation) -> Result<(), LedgerError> {
    match *op {
        Operation::Open {
            owner,
            initial_balance,
        } => {
            let account = ledger.store().create_account(owner, initial_balance)?;
            info!(owner, account = account.id, balance = %account.balance, "account opened");
        }
        Operation::Deposit {
            caller,
            account,
            amount,
        } => {
            ledger.deposit(caller, account, amount)?;
        }
        Operation::Withdraw {
            caller,
            account,
            amount,
        } => {
            ledger.withdraw(caller, account, amount)?;
        }
        Operation::Transfer {
            caller,
            from,
            to,
            amount,
        } => {
            ledger.transfer(caller, from, to, amount)?;
        }
    }
    Ok(())
}
