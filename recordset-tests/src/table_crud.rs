use crate::{setup, silent_logs};
use recordset::{
    Connection, Dataset, DatasetError, DatasetEvent, DatasetState, QueryBuilder, Table, Value,
};
use std::sync::{
    Arc, LazyLock,
    atomic::{AtomicUsize, Ordering},
};
use tokio::sync::Mutex;

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

async fn count<C: Connection>(connection: &Arc<C>, table: &str) -> i64 {
    QueryBuilder::new(connection.clone())
        .select(["COUNT(*)"])
        .from(table)
        .fetch_scalar()
        .await
        .expect("Failed to count the rows")
        .and_then(|v| v.as_i64())
        .expect("The count must be an integer")
}

pub async fn table_crud<C: Connection>(connection: &Arc<C>) {
    let _lock = MUTEX.lock().await;

    setup(
        connection.as_ref(),
        &[
            "DROP TABLE IF EXISTS crud_person",
            "DROP TABLE IF EXISTS crud_audit",
            "CREATE TABLE crud_person (id INTEGER PRIMARY KEY, name VARCHAR(64), status VARCHAR(16))",
            "CREATE TABLE crud_audit (person_id INTEGER)",
            "INSERT INTO crud_person (id, name, status) VALUES (1, 'alice', 'active'), (2, 'bob', 'active'), (3, 'charlie', 'inactive')",
        ],
    )
    .await;
    #[cfg(not(feature = "disable-triggers"))]
    setup(
        connection.as_ref(),
        &[
            "CREATE TRIGGER crud_person_audit AFTER UPDATE ON crud_person BEGIN INSERT INTO crud_audit (person_id) VALUES (NEW.id); END",
            "CREATE TRIGGER crud_person_guard BEFORE DELETE ON crud_person WHEN OLD.name = 'guarded' BEGIN SELECT RAISE(ABORT, 'guarded row'); END",
        ],
    )
    .await;

    let mut table = Table::with_connection(connection.clone(), "crud_person");
    table.set_order_field("id");
    table.open().await.expect("Failed to open the table");
    assert_eq!(table.key_fields(), ["id"]);
    assert_eq!(table.record_count(), 3);
    assert_eq!(table.field_names(), ["id", "name", "status"]);

    // Filter
    table.set_filter("status = 'active'");
    table.open().await.expect("Failed to open the filtered table");
    assert_eq!(table.record_count(), 2);
    assert!(
        table
            .records()
            .all(|r| r.get("status") == Some(&Value::from("active")))
    );
    table.set_filter("");
    table.open().await.expect("Failed to reopen the table");

    // Insert then post
    let posted = Arc::new(AtomicUsize::new(0));
    {
        let posted = posted.clone();
        table.on(DatasetEvent::AfterPost, move |_, _| {
            posted.fetch_add(1, Ordering::Relaxed);
        });
    }
    table.insert().expect("Failed to enter Insert");
    assert_eq!(table.state(), DatasetState::Insert);
    table.set_field("name", "dave").expect("Failed to set the name");
    table.set_field("status", "active").expect("Failed to set the status");
    table.post().await.expect("Failed to post the new row");
    assert_eq!(table.state(), DatasetState::Browse);
    assert_eq!(table.record_count(), 4);
    assert_eq!(table.recno(), 3);
    assert_eq!(table.value("name"), Some("dave".into()));
    assert_eq!(table.value("id"), Some(Value::Integer(4)));
    assert_eq!(
        connection
            .last_insert_id()
            .await
            .expect("Failed to read the last insert id"),
        Some(4)
    );
    assert_eq!(count(connection, "crud_person").await, 4);
    assert_eq!(posted.load(Ordering::Relaxed), 1);

    // Insert then cancel leaves nothing behind
    table.insert().expect("Failed to enter Insert");
    table.set_field("name", "nobody").expect("Failed to set the name");
    table.cancel();
    assert_eq!(table.record_count(), 4);
    assert_eq!(table.value("name"), Some("dave".into()));

    // Edit then cancel
    table.first();
    table.edit().expect("Failed to enter Edit");
    table.set_field("name", "zed").expect("Failed to set the name");
    assert!(table.is_modified());
    table.cancel();
    assert_eq!(table.state(), DatasetState::Browse);
    assert_eq!(table.value("name"), Some("alice".into()));
    assert!(!table.is_modified());

    // Edit without changes does not reach the database
    table.edit().expect("Failed to enter Edit");
    table.post().await.expect("Failed to post the unchanged row");
    assert_eq!(table.state(), DatasetState::Browse);
    #[cfg(not(feature = "disable-triggers"))]
    assert_eq!(count(connection, "crud_audit").await, 0);

    // Edit with changes
    table.set_field("status", "inactive").expect("Failed to set the status");
    assert_eq!(table.state(), DatasetState::Edit);
    table.post().await.expect("Failed to post the change");
    #[cfg(not(feature = "disable-triggers"))]
    assert_eq!(count(connection, "crud_audit").await, 1);
    let status = QueryBuilder::new(connection.clone())
        .select(["status"])
        .from("crud_person")
        .where_("id", "=", 1)
        .expect("Failed to add the condition")
        .fetch_scalar()
        .await
        .expect("Failed to read the status");
    assert_eq!(status, Some("inactive".into()));
    assert_eq!(table.value("status"), Some("inactive".into()));
    assert_eq!(posted.load(Ordering::Relaxed), 3);

    // Delete of the last row ends at eof
    table.last();
    table.delete().await.expect("Failed to delete the last row");
    assert_eq!(table.record_count(), 3);
    assert!(table.eof());
    assert_eq!(table.value("name"), Some("charlie".into()));
    assert_eq!(count(connection, "crud_person").await, 3);

    // Delete while inserting only drops the pending row
    table.insert().expect("Failed to enter Insert");
    table.delete().await.expect("Failed to cancel the insert");
    assert_eq!(table.state(), DatasetState::Browse);
    assert_eq!(count(connection, "crud_person").await, 3);

    // A rejected delete leaves the window as it was
    #[cfg(not(feature = "disable-triggers"))]
    {
        table.insert().expect("Failed to enter Insert");
        table.set_field("name", "guarded").expect("Failed to set the name");
        table.post().await.expect("Failed to post the guarded row");
        let records = table.record_count();
        let recno = table.recno();
        let error = silent_logs! {
            table.delete().await.expect_err("The delete must be rejected")
        };
        assert!(matches!(
            error.downcast_ref::<DatasetError>(),
            Some(DatasetError::ExecutionFailure { .. })
        ));
        assert_eq!(table.record_count(), records);
        assert_eq!(table.recno(), recno);
        assert_eq!(table.value("name"), Some("guarded".into()));
        assert_eq!(count(connection, "crud_person").await, 4);
    }

    // Tables without any key cannot address rows
    setup(
        connection.as_ref(),
        &["INSERT INTO crud_audit (person_id) VALUES (42)"],
    )
    .await;
    let mut audit = Table::with_connection(connection.clone(), "crud_audit");
    audit.open().await.expect("Failed to open the audit table");
    assert!(audit.key_fields().is_empty());
    audit.locate("person_id", 42);
    let error = silent_logs! {
        audit.delete().await.expect_err("A table without keys cannot delete")
    };
    assert!(matches!(
        error.downcast_ref::<DatasetError>(),
        Some(DatasetError::MissingKeyFields(..))
    ));

    // Blank table name opens an empty dataset
    let mut blank = Table::with_connection(connection.clone(), "  ");
    blank.open().await.expect("Failed to open the blank table");
    assert_eq!(blank.state(), DatasetState::Browse);
    assert!(blank.is_empty());
    assert!(blank.bof() && blank.eof());
}
