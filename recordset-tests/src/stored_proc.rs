use recordset::{CallStyle, Connection, Dataset, DatasetState, ProcOutcome, StoredProc, Value};
use std::sync::Arc;

/// Table valued functions stand in for procedures on backends calling them through `SELECT`.
pub async fn stored_proc<C: Connection>(connection: &Arc<C>) {
    let mut procedure = StoredProc::with_connection(connection.clone(), "json_each");
    if procedure.call_style().expect("Failed to read the call style") != CallStyle::TableFunction {
        log::warn!("Skipping the procedure scenario, the dialect does not call through SELECT");
        return;
    }
    procedure.add_arg("[10,20,30]");
    assert_eq!(
        procedure.build_sql().expect("Failed to build the call"),
        "SELECT * FROM json_each('[10,20,30]')"
    );

    let ProcOutcome::Rows(rows) = procedure
        .execute_proc()
        .await
        .expect("Failed to call the procedure")
    else {
        panic!("A table function must return rows");
    };
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].get("value"), Some(&Value::Integer(10)));
    assert_eq!(procedure.state(), DatasetState::Inactive);

    // Opened as a dataset, the selection applies on top of the call
    procedure.set_filter("value > 15");
    procedure.set_order_field("value");
    procedure.set_order("DESC");
    procedure.open().await.expect("Failed to open the procedure");
    assert_eq!(procedure.record_count(), 2);
    assert_eq!(procedure.value("value"), Some(Value::Integer(30)));
    assert_eq!(procedure.value("procedure_name"), Some("json_each".into()));
    procedure.close();

    procedure.clear_args();
    procedure.add_arg("[]");
    procedure.open().await.expect("Failed to open the empty call");
    assert!(procedure.is_empty());
    assert!(procedure.eof());
}
