use crate::{setup, silent_logs};
use recordset::{Connection, DatasetError, JoinType, Order, QueryBuilder, Value};
use std::sync::{Arc, LazyLock};
use tokio::sync::Mutex;

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub async fn query_builder<C: Connection>(connection: &Arc<C>) {
    let _lock = MUTEX.lock().await;

    setup(
        connection.as_ref(),
        &[
            "DROP TABLE IF EXISTS qb_user",
            "DROP TABLE IF EXISTS qb_role",
            "CREATE TABLE qb_role (id INTEGER PRIMARY KEY, title VARCHAR(32))",
            "CREATE TABLE qb_user (id INTEGER PRIMARY KEY, name VARCHAR(64), role_id INTEGER, email VARCHAR(64))",
            "INSERT INTO qb_role (id, title) VALUES (1, 'admin'), (2, 'guest')",
        ],
    )
    .await;

    let mut builder = QueryBuilder::new(connection.clone());

    // Insert through the builder
    for (name, role, email) in [
        ("alice", 1, Some("alice@example.com")),
        ("bob", 2, None),
        ("carol", 2, Some("carol@example.com")),
    ] {
        let result = builder
            .reset()
            .insert("qb_user")
            .set("name", name)
            .set("role_id", role)
            .set("email", email.map(Value::from).unwrap_or_default())
            .execute_statement()
            .await
            .expect("Failed to insert a user");
        assert_eq!(result.rows_affected, 1);
        assert_eq!(builder.parameters().len(), 3);
    }

    // Range condition
    let names = builder
        .reset()
        .select(["name"])
        .from("qb_user")
        .where_("id", "BETWEEN", [1, 2])
        .expect("Failed to add the range")
        .order_by("id", Order::Asc)
        .fetch_column()
        .await
        .expect("Failed to fetch the range");
    assert_eq!(names, [Value::from("alice"), Value::from("bob")]);
    assert!(builder.parameters().get("p1").is_some());
    assert!(builder.parameters().get("p2").is_some());

    // Null checks bind nothing
    let names = builder
        .reset()
        .select(["name"])
        .from("qb_user")
        .where_("email", "is null", ())
        .expect("Failed to add the null check")
        .fetch_column()
        .await
        .expect("Failed to fetch the users without email");
    assert_eq!(names, [Value::from("bob")]);
    assert!(builder.parameters().is_empty());

    // Lists, disjunctions and joins
    let rows = builder
        .reset()
        .select(["u.name", "r.title"])
        .from("qb_user u")
        .join(JoinType::Inner, "qb_role r", "r.id = u.role_id")
        .where_("u.name", "IN", vec!["alice", "carol"])
        .expect("Failed to add the list")
        .or_where("u.id", "=", 2)
        .expect("Failed to add the alternative")
        .order_by("u.name", "desc")
        .fetch_all()
        .await
        .expect("Failed to fetch the joined rows");
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].get("name"), Some(&Value::from("carol")));
    assert_eq!(rows[0].get("title"), Some(&Value::from("guest")));
    assert_eq!(rows[2].get("title"), Some(&Value::from("admin")));

    // Grouping with pagination
    let counts = builder
        .reset()
        .select(["role_id", "COUNT(*) AS total"])
        .from("qb_user")
        .group_by(["role_id"])
        .having("COUNT(*) > 0")
        .order_by("role_id", Order::Asc)
        .limit(1)
        .offset(1)
        .fetch_all()
        .await
        .expect("Failed to fetch the groups");
    assert_eq!(counts.len(), 1);
    assert_eq!(counts[0].get("total"), Some(&Value::Integer(2)));

    // Update and delete
    let result = builder
        .reset()
        .update("qb_user")
        .set("email", "bob@example.com")
        .where_("name", "=", "bob")
        .expect("Failed to add the condition")
        .execute_statement()
        .await
        .expect("Failed to update bob");
    assert_eq!(result.rows_affected, 1);
    let result = builder
        .reset()
        .delete("qb_user")
        .where_("role_id", "=", 2)
        .expect("Failed to add the condition")
        .and_where("email", "LIKE", "%@example.com")
        .expect("Failed to add the second condition")
        .execute_statement()
        .await
        .expect("Failed to delete the guests");
    assert_eq!(result.rows_affected, 2);
    let total = builder
        .reset()
        .select(["COUNT(*)"])
        .from("qb_user")
        .fetch_scalar()
        .await
        .expect("Failed to count the users");
    assert_eq!(total, Some(Value::Integer(1)));

    // Argument validation
    let error = silent_logs! {
        builder
            .reset()
            .select(["name"])
            .from("qb_user")
            .where_("id", "BETWEEN", [1])
            .map(|_| ())
            .expect_err("A range needs two bounds")
    };
    assert!(matches!(
        error.downcast_ref::<DatasetError>(),
        Some(DatasetError::InvalidArgument(..))
    ));
    let error = silent_logs! {
        builder
            .where_("id", "IN", Vec::<i64>::new())
            .map(|_| ())
            .expect_err("A list condition needs values")
    };
    assert!(matches!(
        error.downcast_ref::<DatasetError>(),
        Some(DatasetError::InvalidArgument(..))
    ));

    // Backend failures carry the statement
    let error = silent_logs! {
        builder
            .reset()
            .select(["missing_column"])
            .from("qb_user")
            .fetch_all()
            .await
            .expect_err("The column does not exist")
    };
    let Some(DatasetError::ExecutionFailure { sql, .. }) = error.downcast_ref::<DatasetError>()
    else {
        panic!("Expected an execution failure, got {:#}", error);
    };
    assert!(sql.contains("missing_column"));
}
