use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::model::{Account, AccountId, UserId};
use crate::replay::Operation;
use crate::Amount;

/// Errors that can occur when parsing csv rows
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized operation '{op}'")]
    UnrecognizedOperation { line: usize, op: String },

    #[error("line {line}: {op} missing required field '{field}'")]
    MissingField {
        line: usize,
        op: String,
        field: &'static str,
    },
}

#[derive(Debug, Deserialize)]
struct InputRow {
    op: String,
    user: UserId,
    account: Option<AccountId>,
    to: Option<AccountId>,
    amount: Option<f64>,
}

#[derive(Debug, Serialize)]
struct OutputRow {
    account: AccountId,
    owner: UserId,
    balance: String,
}

/// Read wallet operations from a csv file
pub fn read_operations(
    path: impl AsRef<Path>,
) -> impl Iterator<Item = Result<Operation, CsvError>> {
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .expect("failed to open csv file");

    reader
        .into_deserialize::<InputRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            parse_row(line, row)
        })
}

fn parse_row(line: usize, row: InputRow) -> Result<Operation, CsvError> {
    let missing = |op: &str, field: &'static str| CsvError::MissingField {
        line,
        op: op.to_string(),
        field,
    };

    match row.op.as_str() {
        "open" => {
            let amount = row.amount.ok_or_else(|| missing("open", "amount"))?;
            Ok(Operation::Open {
                owner: row.user,
                initial_balance: Amount::from_float(amount),
            })
        }
        "deposit" => {
            let account = row.account.ok_or_else(|| missing("deposit", "account"))?;
            let amount = row.amount.ok_or_else(|| missing("deposit", "amount"))?;
            Ok(Operation::Deposit {
                caller: row.user,
                account,
                amount: Amount::from_float(amount),
            })
        }
        "withdraw" => {
            let account = row.account.ok_or_else(|| missing("withdraw", "account"))?;
            let amount = row.amount.ok_or_else(|| missing("withdraw", "amount"))?;
            Ok(Operation::Withdraw {
                caller: row.user,
                account,
                amount: Amount::from_float(amount),
            })
        }
        "transfer" => {
            let from = row.account.ok_or_else(|| missing("transfer", "account"))?;
            let to = row.to.ok_or_else(|| missing("transfer", "to"))?;
            let amount = row.amount.ok_or_else(|| missing("transfer", "amount"))?;
            Ok(Operation::Transfer {
                caller: row.user,
                from,
                to,
                amount: Amount::from_float(amount),
            })
        }
        other => Err(CsvError::UnrecognizedOperation {
            line,
            op: other.to_string(),
        }),
    }
}

/// write accounts to stdout in csv format
pub fn write_accounts(accounts: impl IntoIterator<Item = Account>) {
    let stdout = io::stdout();
    let mut writer = csv::Writer::from_writer(stdout.lock());

    for account in accounts {
        let row = OutputRow {
            account: account.id,
            owner: account.owner,
            balance: account.balance.to_string(),
        };
        writer.serialize(&row).expect("failed to write csv row");
    }

    writer.flush().expect("failed to flush csv writer");
}
