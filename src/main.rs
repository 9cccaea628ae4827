use std::env;
use std::sync::Arc;

use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use wallet_ledger::csv::{read_operations, write_accounts};
use wallet_ledger::{Ledger, MemoryStore, Store, replay};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse().unwrap()))
        .with_writer(std::io::stderr)
        .init();

    let path = env::args()
        .nth(1)
        .expect("usage: wallet-ledger <operations.csv>");

    if !path.ends_with(".csv") {
        warn!(path, "input file seems to not be a csv file");
    }

    let store = Arc::new(MemoryStore::new());
    let ledger = Ledger::new(Arc::clone(&store));
    let (op_sender, op_receiver) = tokio::sync::mpsc::channel(16);

    tokio::spawn(async move {
        for result in read_operations(&path) {
            match result {
                Ok(op) => {
                    op_sender.send(op).await.unwrap();
                }
                Err(e) => {
                    warn!("{e}");
                }
            }
        }
    });

    replay::run(&ledger, ReceiverStream::new(op_receiver)).await;

    write_accounts(store.accounts());
}
