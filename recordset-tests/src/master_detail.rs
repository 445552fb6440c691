use crate::setup;
use recordset::{Connection, DataSource, Dataset, MasterLink, Table, Value};
use std::sync::{Arc, LazyLock};
use tokio::sync::Mutex;

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub async fn master_detail<C: Connection + 'static>(connection: &Arc<C>) {
    let _lock = MUTEX.lock().await;

    setup(
        connection.as_ref(),
        &[
            "DROP TABLE IF EXISTS md_order_item",
            "DROP TABLE IF EXISTS md_product",
            "CREATE TABLE md_product (id INTEGER PRIMARY KEY, name VARCHAR(64))",
            "CREATE TABLE md_order_item (id INTEGER PRIMARY KEY, product_id INTEGER, quantity INTEGER)",
            "INSERT INTO md_product (id, name) VALUES (1, 'Laptop'), (2, 'Phone'), (3, 'Tablet')",
            "INSERT INTO md_order_item (id, product_id, quantity) VALUES (1, 1, 2), (2, 1, 1), (3, 2, 5)",
        ],
    )
    .await;

    let master = Arc::new(Mutex::new(Table::with_connection(
        connection.clone(),
        "md_product",
    )));
    master.lock().await.set_order_field("id");
    let source = DataSource::new();
    assert!(!source.is_bound());

    let mut detail = Table::with_connection(connection.clone(), "md_order_item");
    detail.set_order_field("id");
    detail.set_master(Some(MasterLink::new(
        source.clone(),
        [("product_id", "id")],
    )));

    // Binding the source after configuring the detail
    source.set_dataset(master.clone());
    assert!(source.is_bound());

    // The master is opened on demand
    assert!(!master.lock().await.is_active());
    detail.open().await.expect("Failed to open the detail");
    {
        let master = master.lock().await;
        assert!(master.is_active());
        assert_eq!(master.value("name"), Some("Laptop".into()));
    }
    assert_eq!(detail.record_count(), 2);
    assert!(
        detail
            .records()
            .all(|r| r.get("product_id") == Some(&Value::Integer(1)))
    );

    // Following the master
    master.lock().await.next();
    detail.open().await.expect("Failed to reopen the detail");
    assert_eq!(detail.record_count(), 1);
    assert_eq!(detail.value("quantity"), Some(Value::Integer(5)));

    master.lock().await.next();
    detail.open().await.expect("Failed to reopen the detail");
    assert!(detail.is_empty());

    // A new detail row references the current master explicitly
    master.lock().await.first();
    detail.open().await.expect("Failed to reopen the detail");
    detail.insert().expect("Failed to enter Insert");
    detail.set_field("product_id", 1).expect("Failed to set the product");
    detail.set_field("quantity", 7).expect("Failed to set the quantity");
    detail.post().await.expect("Failed to post the detail row");
    detail.refresh().await.expect("Failed to refresh the detail");
    assert_eq!(detail.record_count(), 3);

    // Unbound source means no restriction
    source.clear();
    detail.open().await.expect("Failed to open the unrestricted detail");
    assert_eq!(detail.record_count(), 4);
}
