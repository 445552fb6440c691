use crate::{setup, silent_logs};
use recordset::{
    Connection, Dataset, DatasetError, DatasetState, Query, QueryBuilder, StoredProc, Table,
    Value,
};
use std::sync::{Arc, LazyLock};
use tokio::sync::Mutex;

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

fn dataset_error(error: &recordset::Error) -> &DatasetError {
    error
        .downcast_ref::<DatasetError>()
        .unwrap_or_else(|| panic!("Expected a dataset error, got {:#}", error))
}

pub async fn errors<C: Connection>(connection: &Arc<C>) {
    let _lock = MUTEX.lock().await;

    setup(
        connection.as_ref(),
        &[
            "DROP TABLE IF EXISTS err_note",
            "CREATE TABLE err_note (id INTEGER PRIMARY KEY, body VARCHAR(128))",
            "INSERT INTO err_note (id, body) VALUES (1, 'first'), (2, 'second')",
        ],
    )
    .await;

    silent_logs! {
        // No connection
        let mut query = Query::<C>::new();
        query.set_sql("SELECT * FROM err_note");
        let error = query.open().await.expect_err("Open needs a connection");
        assert!(matches!(dataset_error(&error), DatasetError::NoConnection));
        let error = query.exec_sql().await.expect_err("Exec needs a connection");
        assert!(matches!(dataset_error(&error), DatasetError::NoConnection));
        let mut table = Table::<C>::new("err_note");
        let error = table.open().await.expect_err("Open needs a connection");
        assert!(matches!(dataset_error(&error), DatasetError::NoConnection));
        let mut procedure = StoredProc::<C>::new("refresh_totals");
        let error = procedure
            .execute_proc()
            .await
            .expect_err("A call needs a connection");
        assert!(matches!(dataset_error(&error), DatasetError::NoConnection));

        // Blank statements
        let mut query = Query::with_connection(connection.clone());
        query.set_sql("  ;  ");
        let error = query.open().await.expect_err("A blank statement cannot open");
        assert!(matches!(dataset_error(&error), DatasetError::EmptyStatement));
        let error = query.exec_sql().await.expect_err("A blank statement cannot run");
        assert!(matches!(dataset_error(&error), DatasetError::EmptyStatement));
        assert_eq!(query.state(), DatasetState::Inactive);
        let error = QueryBuilder::new(connection.clone())
            .select(["id"])
            .fetch_all()
            .await
            .expect_err("A select needs a table");
        assert!(matches!(dataset_error(&error), DatasetError::EmptyStatement));

        // State guards
        let error = query.edit().expect_err("Edit needs an active dataset");
        assert!(matches!(dataset_error(&error), DatasetError::NotActive));
        let error = query.post().await.expect_err("Post needs an active dataset");
        assert!(matches!(dataset_error(&error), DatasetError::NotActive));
        let error = query
            .set_limit_count(0)
            .expect_err("The page size must be positive");
        assert!(matches!(dataset_error(&error), DatasetError::InvalidArgument(..)));

        // Backend failure
        query.set_sql("SELECT * FROM err_missing_table");
        let error = query.open().await.expect_err("The table does not exist");
        let DatasetError::ExecutionFailure { sql, .. } = dataset_error(&error) else {
            panic!("Expected an execution failure, got {:#}", error);
        };
        assert!(sql.contains("err_missing_table"));
        assert_eq!(query.state(), DatasetState::Inactive);
    };

    // Parameters and fetch helpers
    let mut query = Query::with_connection(connection.clone());
    query.add_sql("SELECT id, body");
    query.add_sql("FROM err_note");
    query.add_sql("WHERE id >= :min_id;");
    query.set_param("min_id", 1);
    query.set_order_field("id");
    assert_eq!(query.value("sql"), Some(query.sql().into()));
    let first = query
        .fetch_one()
        .await
        .expect("Failed to fetch the first note")
        .expect("There must be a first note");
    assert_eq!(first.get("body"), Some(&Value::from("first")));
    let second = query
        .fetch_one()
        .await
        .expect("Failed to fetch the second note")
        .expect("There must be a second note");
    assert_eq!(second.get("body"), Some(&Value::from("second")));
    assert_eq!(
        query.fetch_one().await.expect("Failed to fetch past the end"),
        None
    );

    // Edits of a query stay in memory
    query.first();
    query.set_field("body", "changed").expect("Failed to set the body");
    assert_eq!(query.state(), DatasetState::Edit);
    query.post().await.expect("Failed to post in memory");
    assert_eq!(query.value("body"), Some("changed".into()));
    query.delete().await.expect("Failed to delete in memory");
    assert_eq!(query.record_count(), 1);
    let rows = query.fetch_all().await.expect("Failed to read the rows");
    assert_eq!(rows.len(), 1);
    query.close();
    let rows = query.fetch_all().await.expect("Failed to reopen the rows");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("body"), Some(&Value::from("first")));

    let mut update = Query::with_connection(connection.clone());
    update.set_sql("UPDATE err_note SET body = :body WHERE id = :id");
    update.set_param("body", "updated").set_param("id", 2);
    assert_eq!(update.exec_sql().await.expect("Failed to run the update"), 1);
}
