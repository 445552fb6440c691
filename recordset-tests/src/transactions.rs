use crate::setup;
use recordset::{Connection, Dataset, Table, Value};
use std::sync::{Arc, LazyLock};
use tokio::sync::Mutex;

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub async fn transactions<C: Connection>(connection: &Arc<C>) {
    let _lock = MUTEX.lock().await;

    setup(
        connection.as_ref(),
        &[
            "DROP TABLE IF EXISTS tx_account",
            "CREATE TABLE tx_account (id INTEGER PRIMARY KEY, owner VARCHAR(64), balance INTEGER)",
            "INSERT INTO tx_account (id, owner, balance) VALUES (1, 'alice', 100)",
        ],
    )
    .await;

    let mut table = Table::with_connection(connection.clone(), "tx_account");
    table.open().await.expect("Failed to open the accounts");

    // Rolled back
    connection.begin().await.expect("Failed to begin");
    table.set_field("balance", 50).expect("Failed to set the balance");
    table.post().await.expect("Failed to post the balance");
    table.insert().expect("Failed to enter Insert");
    table.set_field("owner", "bob").expect("Failed to set the owner");
    table.post().await.expect("Failed to post the account");
    assert!(
        !connection
            .complete_transaction(false)
            .await
            .expect("Failed to roll back")
    );
    table.refresh().await.expect("Failed to refresh the accounts");
    assert_eq!(table.record_count(), 1);
    assert_eq!(table.value("balance"), Some(Value::Integer(100)));

    // Committed
    connection.begin().await.expect("Failed to begin");
    table.set_field("balance", 75).expect("Failed to set the balance");
    table.post().await.expect("Failed to post the balance");
    assert!(
        connection
            .complete_transaction(true)
            .await
            .expect("Failed to commit")
    );
    table.close();
    table.open().await.expect("Failed to reopen the accounts");
    assert_eq!(table.value("balance"), Some(Value::Integer(75)));
}
