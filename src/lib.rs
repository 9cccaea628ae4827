pub mod amount;
pub mod csv;
pub mod engine;
pub mod model;
pub mod policy;
pub mod query;
pub mod replay;
pub mod store;

pub use amount::Amount;
pub use engine::{Ledger, LedgerError};
pub use model::{Account, AccountId, TransactionKind, TransactionRecord, TxId, UserId};
pub use query::QueryService;
pub use replay::Operation;
pub use store::{MemoryStore, Store};
