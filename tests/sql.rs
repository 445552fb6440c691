mod mock;

#[cfg(test)]
mod tests {
    use crate::mock::MockConnection;
    use indoc::indoc;
    use recordset::{
        CallStyle, Dataset, DatasetError, Dialect, GenericSqlWriter, JoinType, Order, Params,
        ProcOutcome, QueryBuilder, Record, SqlWriter, StoredProc, Value,
    };

    const WRITER: GenericSqlWriter = GenericSqlWriter::new();

    #[test]
    fn literals() {
        let mut out = String::new();
        WRITER.write_value(&mut out, &"it's".into());
        assert_eq!(out, "'it''s'");
        out.clear();
        WRITER.write_value(&mut out, &Value::Blob([0xCA, 0xFE].into()));
        assert_eq!(out, "X'CAFE'");
        out.clear();
        WRITER.write_value(&mut out, &f64::NEG_INFINITY.into());
        assert_eq!(out, "CAST('-Infinity' AS DOUBLE PRECISION)");
        out.clear();
        WRITER.write_identifier_quoted(&mut out, "main.odd\"name");
        assert_eq!(out, "\"main\".\"odd\"\"name\"");
    }

    #[test]
    fn conditions() {
        let mut out = String::from("SELECT * FROM t");
        WRITER.write_conditions(&mut out, &["a = 1".into(), "b = 2".into()]);
        assert_eq!(out, "SELECT * FROM t\nWHERE (a = 1) AND (b = 2)");

        let mut out = String::from("SELECT * FROM t WHERE a = 1");
        WRITER.write_conditions(&mut out, &["b = 2".into()]);
        assert_eq!(out, "SELECT * FROM t WHERE a = 1\nAND (b = 2)");

        // A quoted keyword is not a clause
        let mut out = String::from("SELECT 'where' AS w FROM t");
        WRITER.write_conditions(&mut out, &["b = 2".into()]);
        assert_eq!(out, "SELECT 'where' AS w FROM t\nWHERE b = 2");

        let mut out = String::from("SELECT * FROM t;  ");
        WRITER.write_limit(&mut out, Some(10), Some(20));
        assert_eq!(out, "SELECT * FROM t\nLIMIT 10\nOFFSET 20");
    }

    #[test]
    fn modify_statements() {
        let row: Record = [("name", Value::from("dave")), ("age", Value::Integer(40))]
            .into_iter()
            .collect();
        let keys: Record = [("id", 7)].into_iter().collect();
        let mut params = Params::new();
        let mut out = String::new();
        WRITER.write_update(&mut out, "person", &row, &keys, &mut params);
        assert_eq!(
            out,
            indoc! {r#"
                UPDATE "person"
                SET "name" = :p1, "age" = :p2
                WHERE "id" = :p3
            "#}
            .trim()
        );
        assert_eq!(params.get("p3"), Some(&Value::Integer(7)));

        let mut params = Params::new();
        let mut out = String::new();
        WRITER.write_insert(&mut out, "person", &row, &mut params);
        assert_eq!(
            out,
            "INSERT INTO \"person\" (\"name\", \"age\")\nVALUES (:p1, :p2)"
        );
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn call_styles() {
        assert_eq!(Dialect::Oracle.call_style(), CallStyle::Block);
        assert_eq!(Dialect::MySql.call_style(), CallStyle::Call);
        assert_eq!(Dialect::MariaDb.call_style(), CallStyle::Call);
        assert_eq!(Dialect::MsSql.call_style(), CallStyle::Call);
        assert_eq!(Dialect::Postgres.call_style(), CallStyle::TableFunction);
        assert_eq!(Dialect::Sqlite.call_style(), CallStyle::TableFunction);
    }

    #[tokio::test]
    async fn block_call() {
        let connection = MockConnection::new(&[], &[])
            .with_dialect(Dialect::Oracle)
            .arc();
        let mut procedure = StoredProc::with_connection(connection.clone(), "refresh_totals");
        procedure.add_arg(2024).add_arg("Q1");
        assert_eq!(
            procedure.build_sql().unwrap(),
            "BEGIN refresh_totals(2024, 'Q1'); END;"
        );
        let outcome = procedure.execute_proc().await.expect("Failed to call");
        assert!(matches!(outcome, ProcOutcome::Affected(..)));
        assert_eq!(connection.sql(), ["BEGIN refresh_totals(2024, 'Q1'); END;"]);
        assert!(!procedure.is_active());
    }

    #[tokio::test]
    async fn call_with_output_fetch() {
        let connection = MockConnection::new(&["@total"], &[])
            .with_dialect(Dialect::MySql)
            .with_row([Value::Integer(12)])
            .arc();
        let mut procedure = StoredProc::with_connection(connection.clone(), "compute_total");
        procedure.add_arg(3);
        procedure.set_extra_fetch("SELECT @total");
        assert_eq!(procedure.call_style().unwrap(), CallStyle::Call);
        procedure.open().await.expect("Failed to open");
        assert_eq!(
            connection.last_statement().0,
            "CALL compute_total(3); SELECT @total"
        );
        assert_eq!(procedure.value("sql"), Some("CALL compute_total(3); SELECT @total".into()));
    }

    #[tokio::test]
    async fn table_function_call() {
        let connection = MockConnection::new(&["item"], &[])
            .with_dialect(Dialect::Postgres)
            .with_row(["a".into()])
            .with_row(["b".into()])
            .arc();
        let mut procedure = StoredProc::with_connection(connection.clone(), "list_items");
        procedure.add_arg(Value::Null);
        let ProcOutcome::Rows(rows) = procedure.execute_proc().await.expect("Failed to call")
        else {
            panic!("Expected rows");
        };
        assert_eq!(rows.len(), 2);
        assert_eq!(connection.sql(), ["SELECT * FROM list_items(NULL)"]);
    }

    #[tokio::test]
    async fn blank_procedure_name() {
        let connection = MockConnection::new(&[], &[]).arc();
        let mut procedure = StoredProc::with_connection(connection.clone(), "   ");
        let error = procedure.execute_proc().await.expect_err("Nothing to call");
        assert!(matches!(
            error.downcast_ref::<DatasetError>(),
            Some(DatasetError::EmptyStatement)
        ));
        assert!(connection.statements().is_empty());
    }

    #[test]
    fn builder_select() {
        let connection = MockConnection::new(&[], &[]).arc();
        let mut builder = QueryBuilder::new(connection);
        builder
            .select(["u.id", "u.name", "r.title"])
            .from("users u")
            .join(JoinType::Left, "roles r", "r.id = u.role_id")
            .where_("u.id", "BETWEEN", [1, 2])
            .unwrap()
            .and_where("r.title", "in", vec!["admin", "owner"])
            .unwrap()
            .or_where("u.deleted_at", "IS NOT NULL", ())
            .unwrap()
            .order_by("u.name", Order::Asc)
            .order_by("u.id", "desc")
            .limit(20)
            .offset(40);
        assert_eq!(
            builder.sql(),
            indoc! {"
                SELECT u.id, u.name, r.title
                FROM users u
                LEFT JOIN roles r ON r.id = u.role_id
                WHERE (u.id BETWEEN :p1 AND :p2 AND r.title IN (:p3, :p4)) OR u.deleted_at IS NOT NULL
                ORDER BY u.name ASC, u.id DESC
                LIMIT 20
                OFFSET 40
            "}
            .trim()
        );
        let params: Vec<_> = builder.parameters().iter().map(|(k, _)| k).collect();
        assert_eq!(params, ["p1", "p2", "p3", "p4"]);
        assert_eq!(builder.parameters().get("p4"), Some(&Value::from("owner")));

        // where_ replaces the previous condition, the counter keeps going
        builder.where_("u.id", "=", 5).unwrap();
        assert!(builder.sql().contains("\nWHERE u.id = :p5\n"));
        let params: Vec<_> = builder.parameters().iter().collect();
        assert_eq!(params, [("p5", &Value::Integer(5))]);

        builder.reset();
        builder
            .select(["COUNT(*)"])
            .from("users")
            .group_by(["role_id"])
            .having("COUNT(*) > 1")
            .where_("active", "=", true)
            .unwrap();
        assert_eq!(
            builder.sql(),
            "SELECT COUNT(*)\nFROM users\nWHERE active = :p1\nGROUP BY role_id\nHAVING COUNT(*) > 1"
        );
    }

    #[test]
    fn builder_conjunctions() {
        let connection = MockConnection::new(&[], &[]).arc();
        let mut builder = QueryBuilder::new(connection);
        builder
            .select(["id"])
            .from("t")
            .where_("a", "=", 1)
            .unwrap()
            .or_where("b", "=", 2)
            .unwrap()
            .and_where("c", "=", 3)
            .unwrap();
        assert_eq!(
            builder.sql(),
            "SELECT id\nFROM t\nWHERE (a = :p1 OR b = :p2) AND c = :p3"
        );

        // Same conjunction, no extra grouping
        builder.and_where("d", "IS NULL", ()).unwrap();
        assert_eq!(
            builder.sql(),
            "SELECT id\nFROM t\nWHERE (a = :p1 OR b = :p2) AND c = :p3 AND d IS NULL"
        );
        builder.or_where("e", "=", 4).unwrap();
        assert_eq!(
            builder.sql(),
            "SELECT id\nFROM t\nWHERE ((a = :p1 OR b = :p2) AND c = :p3 AND d IS NULL) OR e = :p4"
        );
    }

    #[test]
    fn replaced_condition_drops_its_parameters() {
        let connection = MockConnection::new(&[], &[]).arc();
        let mut builder = QueryBuilder::new(connection);
        builder
            .update("t")
            .set("x", 0)
            .where_("a", "IN", vec![1, 2])
            .unwrap()
            .or_where("a", "IS NULL", ())
            .unwrap()
            .where_("b", "=", 3)
            .unwrap();
        assert_eq!(builder.sql(), "UPDATE t\nSET x = :p1\nWHERE b = :p4");
        let params: Vec<_> = builder.parameters().iter().collect();
        assert_eq!(
            params,
            [("p1", &Value::Integer(0)), ("p4", &Value::Integer(3))]
        );

        // A rejected replacement keeps the current clause
        builder.where_("b", "BETWEEN", 1).map(|_| ()).unwrap_err();
        assert_eq!(builder.sql(), "UPDATE t\nSET x = :p1\nWHERE b = :p4");
        assert_eq!(builder.parameters().len(), 2);

        builder.where_("c", "=", 5).unwrap().and_where("d", "=", 6).unwrap();
        let params: Vec<_> = builder.parameters().iter().map(|(k, _)| k).collect();
        assert_eq!(params, ["p1", "p5", "p6"]);
    }

    #[test]
    fn builder_modify() {
        let connection = MockConnection::new(&[], &[]).arc();
        let mut builder = QueryBuilder::new(connection);
        builder
            .insert("users")
            .set("name", "dave")
            .set("age", 40);
        assert_eq!(builder.sql(), "INSERT INTO users (name, age)\nVALUES (:p1, :p2)");

        builder
            .reset()
            .update("users")
            .set("age", 41)
            .where_("name", "=", "dave")
            .unwrap();
        assert_eq!(builder.sql(), "UPDATE users\nSET age = :p1\nWHERE name = :p2");

        builder
            .reset()
            .delete("users")
            .where_("age", "<", 18)
            .unwrap()
            .where_raw("name LIKE 'x%'");
        assert_eq!(
            builder.sql(),
            "DELETE FROM users\nWHERE age < :p1 AND (name LIKE 'x%')"
        );
    }

    #[test]
    fn builder_rejects_bad_arguments() {
        let connection = MockConnection::new(&[], &[]).arc();
        let mut builder = QueryBuilder::new(connection);
        builder.select(["id"]).from("users");
        for error in [
            builder.where_("id", "BETWEEN", 1).map(|_| ()).unwrap_err(),
            builder.where_("id", "NOT BETWEEN", vec![1]).map(|_| ()).unwrap_err(),
            builder.where_("id", "IN", Vec::<i64>::new()).map(|_| ()).unwrap_err(),
            builder.where_("id", "=", [1, 2]).map(|_| ()).unwrap_err(),
        ] {
            assert!(
                matches!(
                    error.downcast_ref::<DatasetError>(),
                    Some(DatasetError::InvalidArgument(..))
                ),
                "Unexpected error {:#}",
                error
            );
        }
        assert!(builder.parameters().is_empty());
        assert_eq!(builder.sql(), "SELECT id\nFROM users");
    }

    #[tokio::test]
    async fn builder_execution() {
        let connection = MockConnection::new(&["total"], &[])
            .with_row([Value::Integer(3)])
            .arc();
        let mut builder = QueryBuilder::new(connection.clone());
        let total = builder
            .select(["COUNT(*) AS total"])
            .from("users")
            .where_("age", ">=", 18)
            .unwrap()
            .fetch_scalar()
            .await
            .expect("Failed to fetch");
        assert_eq!(total, Some(Value::Integer(3)));
        let (sql, params) = connection.last_statement();
        assert_eq!(sql, "SELECT COUNT(*) AS total\nFROM users\nWHERE age >= :p1");
        assert_eq!(params.get("p1"), Some(&Value::Integer(18)));

        let result = builder
            .reset()
            .update("users")
            .set("active", false)
            .execute_statement()
            .await
            .expect("Failed to execute");
        assert_eq!(result.rows_affected, 1);

        let error = builder
            .reset()
            .select(["id"])
            .fetch_all()
            .await
            .expect_err("A statement without table cannot run");
        assert!(matches!(
            error.downcast_ref::<DatasetError>(),
            Some(DatasetError::EmptyStatement)
        ));
    }
}
