use crate::setup;
use recordset::{Connection, Dataset, DatasetState, Order, Query, Value};
use std::sync::{Arc, LazyLock};
use tokio::sync::Mutex;

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub async fn navigation<C: Connection>(connection: &Arc<C>) {
    let _lock = MUTEX.lock().await;

    setup(
        connection.as_ref(),
        &[
            "DROP TABLE IF EXISTS nav_person",
            "CREATE TABLE nav_person (id INTEGER PRIMARY KEY, name VARCHAR(64), status VARCHAR(16))",
            "INSERT INTO nav_person (id, name, status) VALUES (1, 'alice', 'active'), (2, 'bob', 'active'), (3, 'charlie', 'inactive')",
        ],
    )
    .await;

    let mut query = Query::with_connection(connection.clone());
    query.set_sql("SELECT * FROM nav_person");
    query.set_order_field("id");
    assert_eq!(query.state(), DatasetState::Inactive);
    query.open().await.expect("Failed to open the query");
    assert_eq!(query.state(), DatasetState::Browse);
    assert_eq!(query.record_count(), 3);

    // Forward walk
    assert!(query.bof());
    assert!(!query.eof());
    assert_eq!(query.value("name"), Some("alice".into()));
    query.next();
    assert_eq!(query.recno(), 1);
    assert_eq!(query.value("name"), Some("bob".into()));
    assert!(!query.bof());
    query.next();
    assert_eq!(query.value("name"), Some("charlie".into()));
    assert!(query.eof());

    // Relative moves undo each other when nothing gets clamped
    query.first();
    query.move_by(2);
    assert_eq!(query.recno(), 2);
    query.move_by(-2);
    assert_eq!(query.recno(), 0);
    assert_eq!(query.value("name"), Some("alice".into()));

    // Past the end the buffer is empty
    query.move_by(10);
    assert!(query.eof());
    assert_eq!(query.current(), None);
    query.prior();
    assert_eq!(query.value("name"), Some("charlie".into()));
    query.move_by(-10);
    assert!(query.bof());
    assert_eq!(query.value("name"), Some("alice".into()));

    // Descending order
    query.set_order(" desc ");
    assert_eq!(query.order(), Order::Desc);
    query.refresh().await.expect("Failed to refresh the query");
    assert_eq!(query.value("name"), Some("charlie".into()));
    query.last();
    assert_eq!(query.value("name"), Some("alice".into()));
    assert!(query.locate("name", "bob"));
    assert_eq!(query.recno(), 1);
    assert!(!query.locate("name", "dave"));
    assert_eq!(query.recno(), 1);

    // Structural attributes
    assert_eq!(query.value("record_count"), Some(Value::Integer(3)));
    assert_eq!(query.value("order"), Some("DESC".into()));
    assert_eq!(query.value("state"), Some("Browse".into()));

    // Pagination window
    query.set_order(Order::Asc);
    query.set_limit_count(2).expect("Failed to set the limit");
    query.set_limit_start(1);
    query.open().await.expect("Failed to open the paged query");
    assert_eq!(query.record_count(), 2);
    assert_eq!(query.value("name"), Some("bob".into()));
    query.last();
    assert_eq!(query.value("name"), Some("charlie".into()));

    // Empty window
    let mut empty = Query::with_connection(connection.clone());
    empty.set_sql("SELECT * FROM nav_person WHERE id < 0");
    empty.open().await.expect("Failed to open the empty query");
    assert_eq!(empty.state(), DatasetState::Browse);
    assert!(empty.is_empty());
    assert!(empty.bof());
    assert!(empty.eof());
    assert_eq!(empty.current(), None);
    empty.next();
    empty.prior();
    assert!(empty.bof() && empty.eof());

    query.close();
    assert_eq!(query.state(), DatasetState::Inactive);
    assert_eq!(query.record_count(), 0);
}
