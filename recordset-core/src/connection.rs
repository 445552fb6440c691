use crate::{
    Dialect, Driver, Params, QueryResult, Result, RowLabeled, RowsAffected, SqlWriter, Value,
    stream::{Stream, StreamExt, TryStreamExt},
};
use std::{borrow::Cow, future::Future};

/// Index metadata reported by [`Connection::indexes`].
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Index {
    pub name: String,
    /// Indexed columns, in index order.
    pub columns: Vec<String>,
    pub primary: bool,
    pub unique: bool,
}

/// SQL execution backend shared by every dataset of a session.
///
/// Methods take `&self`: a connection is handed to datasets as `Arc<C>` and the
/// implementation serializes access to the underlying handle. Transactions are
/// scoped to the connection, datasets never open or close one on their own.
pub trait Connection: Send + Sync + Sized {
    type Driver: Driver;

    /// Establish a connection to the given URL (`<driver>://<location>`).
    fn connect(url: Cow<'static, str>) -> impl Future<Output = Result<Self>> + Send;

    fn driver(&self) -> &Self::Driver;

    fn dialect(&self) -> Dialect {
        <Self::Driver as Driver>::DIALECT
    }

    /// General method to send any statement and return any result type (either row or count).
    fn run(&self, sql: String, params: Params) -> impl Stream<Item = Result<QueryResult>> + Send;

    /// Execute the statement and return the rows.
    fn fetch(&self, sql: String, params: Params) -> impl Stream<Item = Result<RowLabeled>> + Send {
        self.run(sql, params).filter_map(|v| async move {
            match v {
                Ok(QueryResult::Row(v)) => Some(Ok(v)),
                Err(e) => Some(Err(e)),
                _ => None,
            }
        })
    }

    /// Execute the statement and return the total number of rows affected.
    fn execute(
        &self,
        sql: String,
        params: Params,
    ) -> impl Future<Output = Result<RowsAffected>> + Send {
        self.run(sql, params)
            .filter_map(|v| async move {
                match v {
                    Ok(QueryResult::Affected(v)) => Some(Ok(v)),
                    Err(e) => Some(Err(e)),
                    _ => None,
                }
            })
            .try_collect()
    }

    /// Execute the statement restricted to a window of rows, using the dialect pagination clause.
    fn fetch_limit(
        &self,
        mut sql: String,
        limit: Option<u64>,
        offset: Option<u64>,
        params: Params,
    ) -> impl Stream<Item = Result<RowLabeled>> + Send {
        self.driver()
            .sql_writer()
            .write_limit(&mut sql, limit, offset);
        self.fetch(sql, params)
    }

    fn begin(&self) -> impl Future<Output = Result<()>> + Send {
        let mut sql = String::new();
        self.driver().sql_writer().write_transaction_begin(&mut sql);
        async move { self.execute(sql, Params::new()).await.map(|_| ()) }
    }

    fn commit(&self) -> impl Future<Output = Result<()>> + Send {
        let mut sql = String::new();
        self.driver().sql_writer().write_transaction_commit(&mut sql);
        async move { self.execute(sql, Params::new()).await.map(|_| ()) }
    }

    fn rollback(&self) -> impl Future<Output = Result<()>> + Send {
        let mut sql = String::new();
        self.driver()
            .sql_writer()
            .write_transaction_rollback(&mut sql);
        async move { self.execute(sql, Params::new()).await.map(|_| ()) }
    }

    /// Commit when `commit` is true, roll back otherwise. Returns whether the changes were committed.
    fn complete_transaction(&self, commit: bool) -> impl Future<Output = Result<bool>> + Send {
        async move {
            if commit {
                self.commit().await?;
            } else {
                self.rollback().await?;
            }
            Ok(commit)
        }
    }

    /// Identifier generated by the most recent successful insert on this connection.
    fn last_insert_id(&self) -> impl Future<Output = Result<Option<i64>>> + Send;

    fn quote_identifier(&self, name: &str) -> String {
        let mut out = String::with_capacity(name.len() + 2);
        self.driver()
            .sql_writer()
            .write_identifier_quoted(&mut out, name);
        out
    }

    fn quote_string(&self, value: &str) -> String {
        let mut out = String::with_capacity(value.len() + 2);
        self.driver()
            .sql_writer()
            .write_value_string(&mut out, value);
        out
    }

    fn quote_value(&self, value: &Value) -> String {
        let mut out = String::new();
        self.driver().sql_writer().write_value(&mut out, value);
        out
    }

    /// Indexes defined on `table`, only the primary key one when `primary_only` is set.
    fn indexes(
        &self,
        table: &str,
        primary_only: bool,
    ) -> impl Future<Output = Result<Vec<Index>>> + Send;

    fn primary_key_columns(&self, table: &str) -> impl Future<Output = Result<Vec<String>>> + Send {
        let indexes = self.indexes(table, true);
        async move {
            Ok(indexes
                .await?
                .into_iter()
                .filter(|v| v.primary)
                .flat_map(|v| v.columns)
                .collect())
        }
    }

    /// Column names of `table` in declaration order.
    fn column_names(&self, table: &str) -> impl Future<Output = Result<Vec<String>>> + Send;
}
