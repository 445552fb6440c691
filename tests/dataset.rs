mod mock;

#[cfg(test)]
mod tests {
    use crate::mock::MockConnection;
    use indoc::indoc;
    use recordset::{
        DataSource, Dataset, DatasetError, DatasetEvent, DatasetState, MasterLink, Order, Query,
        Table, Value,
    };
    use std::sync::{Arc, Mutex};

    fn people() -> MockConnection {
        MockConnection::new(&["id", "name", "status"], &["id"])
            .with_row([1.into(), "alice".into(), "active".into()])
            .with_row([2.into(), "bob".into(), "active".into()])
            .with_row([3.into(), "charlie".into(), "inactive".into()])
    }

    #[tokio::test]
    async fn table_select() {
        let connection = people().arc();
        let mut table = Table::with_connection(connection.clone(), "person");
        table.open().await.expect("Failed to open");
        assert_eq!(table.key_fields(), ["id"]);
        assert_eq!(connection.last_statement().0, "SELECT *\nFROM \"person\"");

        table.set_filter("status = 'active'");
        table.set_order_field("name");
        table.set_order("desc");
        table.set_limit_count(5).unwrap();
        table.set_limit_start(10);
        table.open().await.expect("Failed to open");
        assert_eq!(
            connection.last_statement().0,
            indoc! {r#"
                SELECT *
                FROM "person"
                WHERE status = 'active'
                ORDER BY "name" DESC
                LIMIT 5
                OFFSET 10
            "#}
            .trim()
        );
    }

    #[tokio::test]
    async fn query_keeps_its_where_clause() {
        let connection = people().arc();
        let mut query = Query::with_connection(connection.clone());
        query.add_sql("SELECT * FROM person");
        query.add_sql("WHERE id > :min_id;");
        query.set_param("min_id", 0);
        query.set_filter("status = 'active'");
        query.set_order_field("id");
        query.open().await.expect("Failed to open");
        let (sql, params) = connection.last_statement();
        assert_eq!(
            sql,
            indoc! {r#"
                SELECT * FROM person
                WHERE id > :min_id
                AND (status = 'active')
                ORDER BY "id" ASC
            "#}
            .trim()
        );
        assert_eq!(params.get("min_id"), Some(&Value::Integer(0)));
        // The configured text is left untouched
        assert_eq!(query.sql(), "SELECT * FROM person\nWHERE id > :min_id;");
    }

    #[tokio::test]
    async fn edit_post_updates_changed_columns() {
        let connection = people().arc();
        let mut table = Table::with_connection(connection.clone(), "person");
        table.open().await.expect("Failed to open");
        table.next();
        table.set_field("name", "robert").unwrap();
        table.set_field("status", "active").unwrap();
        table.post().await.expect("Failed to post");
        let (sql, params) = connection.last_statement();
        assert_eq!(
            sql,
            indoc! {r#"
                UPDATE "person"
                SET "name" = :p1
                WHERE "id" = :p2
            "#}
            .trim()
        );
        assert_eq!(params.get("p1"), Some(&Value::from("robert")));
        assert_eq!(params.get("p2"), Some(&Value::Integer(2)));
        assert_eq!(table.state(), DatasetState::Browse);
        assert_eq!(
            table.current().and_then(|r| r.get("name")),
            Some(&Value::from("robert"))
        );
    }

    #[tokio::test]
    async fn unchanged_edit_issues_no_statement() {
        let connection = people().arc();
        let mut table = Table::with_connection(connection.clone(), "person");
        table.open().await.expect("Failed to open");
        connection.forget();
        table.edit().unwrap();
        table.set_field("name", "alice").unwrap();
        table.post().await.expect("Failed to post");
        assert!(connection.statements().is_empty());
        assert_eq!(table.state(), DatasetState::Browse);
    }

    #[tokio::test]
    async fn insert_fills_generated_key() {
        let connection = people().arc();
        let mut table = Table::with_connection(connection.clone(), "person");
        table.open().await.expect("Failed to open");
        table.insert().unwrap();
        table.set_field("name", "dave").unwrap();
        table.set_field("status", "").unwrap();
        table.post().await.expect("Failed to post");
        let (sql, params) = connection.last_statement();
        assert_eq!(sql, "INSERT INTO \"person\" (\"name\")\nVALUES (:p1)");
        assert_eq!(params.len(), 1);
        assert_eq!(table.record_count(), 4);
        assert_eq!(table.recno(), 3);
        assert_eq!(table.value("id"), Some(Value::Integer(101)));

        // An explicit key is kept
        table.insert().unwrap();
        table.set_field("id", 7).unwrap();
        table.set_field("name", "erin").unwrap();
        table.post().await.expect("Failed to post");
        assert_eq!(
            connection.last_statement().0,
            "INSERT INTO \"person\" (\"id\", \"name\")\nVALUES (:p1, :p2)"
        );
        assert_eq!(table.value("id"), Some(Value::Integer(7)));

        // Nothing assigned
        table.set_auto_increment(false);
        table.insert().unwrap();
        table.post().await.expect("Failed to post");
        assert_eq!(
            connection.last_statement().0,
            "INSERT INTO \"person\" DEFAULT VALUES"
        );
        assert_eq!(table.value("id"), Some(Value::Null));
        assert_eq!(table.record_count(), 6);
    }

    #[tokio::test]
    async fn delete_by_key() {
        let connection = people().arc();
        let mut table = Table::with_connection(connection.clone(), "person");
        table.open().await.expect("Failed to open");
        table.last();
        table.delete().await.expect("Failed to delete");
        let (sql, params) = connection.last_statement();
        assert_eq!(sql, "DELETE FROM \"person\"\nWHERE \"id\" = :p1");
        assert_eq!(params.get("p1"), Some(&Value::Integer(3)));
        assert_eq!(table.record_count(), 2);
        assert!(table.eof());
        assert_eq!(table.value("name"), Some("bob".into()));

        // Delete while editing drops the changes first
        table.first();
        table.set_field("name", "changed").unwrap();
        table.delete().await.expect("Failed to delete");
        assert_eq!(
            connection.last_statement().1.get("p1"),
            Some(&Value::Integer(1))
        );
        assert_eq!(table.state(), DatasetState::Browse);
        assert_eq!(table.value("name"), Some("bob".into()));
    }

    #[tokio::test]
    async fn failed_delete_keeps_window() {
        let connection = people().failing_on("DELETE").arc();
        let mut table = Table::with_connection(connection.clone(), "person");
        table.open().await.expect("Failed to open");
        table.next();
        let error = table.delete().await.expect_err("The delete must fail");
        let Some(DatasetError::ExecutionFailure { sql, .. }) = error.downcast_ref::<DatasetError>()
        else {
            panic!("Unexpected error {:#}", error);
        };
        assert!(sql.starts_with("DELETE FROM \"person\""));
        assert_eq!(table.record_count(), 3);
        assert_eq!(table.recno(), 1);
        assert_eq!(table.value("name"), Some("bob".into()));
    }

    #[tokio::test]
    async fn null_keys_compare_with_is_null() {
        let connection = MockConnection::new(&["code", "label"], &["code"])
            .with_row([Value::Null, "none".into()])
            .arc();
        let mut table = Table::with_connection(connection.clone(), "tag");
        table.open().await.expect("Failed to open");
        table.delete().await.expect("Failed to delete");
        let (sql, params) = connection.last_statement();
        assert_eq!(sql, "DELETE FROM \"tag\"\nWHERE \"code\" IS NULL");
        assert!(params.is_empty());
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn events_follow_the_state_machine() {
        let connection = people().arc();
        let mut table = Table::with_connection(connection.clone(), "person");
        let events = Arc::new(Mutex::new(Vec::new()));
        {
            let events = events.clone();
            table
                .cursor_mut()
                .listeners()
                .on_any(move |event, _| events.lock().unwrap().push(event));
        }
        table.open().await.expect("Failed to open");
        table.next();
        table.edit().unwrap();
        table.set_field("name", "robert").unwrap();
        table.post().await.expect("Failed to post");
        table.insert().unwrap();
        table.cancel();
        table.close();
        assert_eq!(
            *events.lock().unwrap(),
            [
                DatasetEvent::BeforeOpen,
                DatasetEvent::AfterOpen,
                DatasetEvent::AfterScroll,
                DatasetEvent::BeforeEdit,
                DatasetEvent::AfterEdit,
                DatasetEvent::BeforePost,
                DatasetEvent::AfterPost,
                DatasetEvent::BeforeInsert,
                DatasetEvent::AfterInsert,
                DatasetEvent::BeforeCancel,
                DatasetEvent::AfterCancel,
                DatasetEvent::BeforeClose,
                DatasetEvent::AfterClose,
            ]
        );
    }

    #[tokio::test]
    async fn detail_follows_master() {
        let products = MockConnection::new(&["id", "name"], &["id"])
            .with_row([1.into(), "Laptop".into()])
            .with_row([2.into(), "Phone".into()])
            .arc();
        let items = MockConnection::new(&["id", "product_id"], &["id"]).arc();
        let master = Arc::new(tokio::sync::Mutex::new(Query::with_connection(
            products.clone(),
        )));
        master.lock().await.set_sql("SELECT * FROM product");
        let source = DataSource::with_dataset(master.clone());

        let mut detail = Table::with_connection(items.clone(), "order_item");
        detail.set_filter("quantity > 0");
        detail.set_master(Some(MasterLink::new(source, [("product_id", "id")])));
        detail.open().await.expect("Failed to open");
        assert!(master.lock().await.is_active());
        assert_eq!(products.sql(), ["SELECT * FROM product"]);
        assert_eq!(
            items.last_statement().0,
            indoc! {r#"
                SELECT *
                FROM "order_item"
                WHERE (quantity > 0) AND ("product_id" = 1)
            "#}
            .trim()
        );

        master.lock().await.next();
        detail.open().await.expect("Failed to open");
        assert!(items.last_statement().0.ends_with("(\"product_id\" = 2)"));
        // The master is not reopened
        assert_eq!(products.sql().len(), 1);
    }

    #[tokio::test]
    async fn fields_shadow_attributes() {
        let connection = MockConnection::new(&["id", "state"], &["id"])
            .with_row([1.into(), "shipped".into()])
            .with_row([2.into(), "pending".into()])
            .arc();
        let mut table = Table::with_connection(connection.clone(), "parcel");
        table.open().await.expect("Failed to open");
        assert_eq!(table.value("state"), Some("shipped".into()));
        assert_eq!(table.attribute("state"), Some("Browse".into()));

        table.set_field("state", "returned").unwrap();
        assert_eq!(table.state(), DatasetState::Edit);
        assert_eq!(table.value("state"), Some("returned".into()));
        table.cancel();

        table.last();
        assert_eq!(table.value("state"), Some("pending".into()));
        // Past the last row the buffer is empty
        table.next();
        assert!(table.current().is_none());
        assert_eq!(table.value("state"), Some("Browse".into()));
        assert_eq!(table.value("id"), None);
    }

    #[tokio::test]
    async fn moving_drops_unposted_assignment() {
        let connection = people().arc();
        let mut table = Table::with_connection(connection.clone(), "person");
        table.open().await.expect("Failed to open");
        connection.forget();
        table.set_field("name", "alicia").unwrap();
        table.next();
        assert_eq!(table.state(), DatasetState::Browse);
        table.prior();
        assert_eq!(table.value("name"), Some("alice".into()));
        assert!(connection.statements().is_empty());
    }

    #[tokio::test]
    async fn order_normalization() {
        let connection = people().arc();
        let mut query = Query::with_connection(connection.clone());
        query.set_sql("SELECT * FROM person");
        query.set_order_field("name");
        for (input, expected) in [
            ("desc", Order::Desc),
            (" DeSc ", Order::Desc),
            ("asc", Order::Asc),
            ("sideways", Order::Asc),
            ("", Order::Asc),
        ] {
            query.set_order(input);
            assert_eq!(query.order(), expected);
            assert_eq!(query.value("order"), Some(expected.as_str().into()));
        }
        query.set_order("DESC");
        query.open().await.expect("Failed to open");
        assert!(connection.last_statement().0.ends_with("ORDER BY \"name\" DESC"));
    }
}
