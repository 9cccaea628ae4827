//! Access policy binding a caller identity to the accounts it may use.

use crate::engine::LedgerError;
use crate::model::{Account, AccountId, UserId};
use crate::store::Store;

/// Resolve `account` and require that `caller` owns it.
///
/// Returns the committed snapshot on success. A missing account and a
/// foreign account are distinct rejections: [`LedgerError::AccountNotFound`]
/// and [`LedgerError::AccessDenied`].
pub fn authorize<S: Store>(
    store: &S,
    caller: UserId,
    account: AccountId,
) -> Result<Account, LedgerError> {
    let snapshot = store
        .account(account)
        .ok_or(LedgerError::AccountNotFound(account))?;

    if snapshot.owner != caller {
        return Err(LedgerError::AccessDenied(account, caller));
    }

    Ok(snapshot)
}
