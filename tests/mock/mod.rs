#![allow(dead_code)]
use recordset::{
    Connection, Dialect, Driver, Error, GenericSqlWriter, Index, Params, QueryResult, Result,
    RowLabeled, RowNames, RowsAffected, Value,
    stream::{self, Stream},
};
use std::{
    borrow::Cow,
    sync::{
        Arc, Mutex,
        atomic::{AtomicI64, Ordering},
    },
};

#[derive(Default, Debug, Clone, Copy)]
pub struct MockDriver;

impl Driver for MockDriver {
    type Connection = MockConnection;
    type SqlWriter = GenericSqlWriter;

    const NAME: &'static str = "mock";
    const DIALECT: Dialect = Dialect::Generic;

    fn sql_writer(&self) -> GenericSqlWriter {
        GenericSqlWriter::new()
    }
}

/// Connection answering every select with the same rows and recording every statement.
pub struct MockConnection {
    pub dialect: Dialect,
    pub columns: Vec<String>,
    pub keys: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    /// Statements containing this text fail.
    pub fail_on: Option<String>,
    last_id: AtomicI64,
    statements: Mutex<Vec<(String, Params)>>,
}

impl MockConnection {
    pub fn new(columns: &[&str], keys: &[&str]) -> Self {
        Self {
            dialect: Dialect::Generic,
            columns: columns.iter().map(|v| v.to_string()).collect(),
            keys: keys.iter().map(|v| v.to_string()).collect(),
            rows: Vec::new(),
            fail_on: None,
            last_id: AtomicI64::new(100),
            statements: Mutex::new(Vec::new()),
        }
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_row<const N: usize>(mut self, values: [Value; N]) -> Self {
        self.rows.push(values.into());
        self
    }

    pub fn failing_on(mut self, text: &str) -> Self {
        self.fail_on = Some(text.into());
        self
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Statements executed so far, oldest first.
    pub fn statements(&self) -> Vec<(String, Params)> {
        self.statements.lock().unwrap().clone()
    }

    pub fn sql(&self) -> Vec<String> {
        self.statements().into_iter().map(|(sql, _)| sql).collect()
    }

    pub fn last_statement(&self) -> (String, Params) {
        self.statements().pop().expect("No statement was executed")
    }

    pub fn forget(&self) {
        self.statements.lock().unwrap().clear();
    }

    fn respond(&self, sql: &str) -> Result<Vec<QueryResult>> {
        if let Some(text) = &self.fail_on
            && sql.contains(text.as_str())
        {
            return Err(Error::msg(format!("Mock failure on `{}`", text)));
        }
        let keyword = sql
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();
        Ok(match keyword.as_str() {
            "SELECT" => {
                let labels: RowNames = self.columns.clone().into();
                self.rows
                    .iter()
                    .map(|row| {
                        QueryResult::Row(RowLabeled::new(labels.clone(), row.clone().into()))
                    })
                    .collect()
            }
            "INSERT" => vec![QueryResult::Affected(RowsAffected {
                rows_affected: 1,
                last_affected_id: Some(self.last_id.fetch_add(1, Ordering::Relaxed) + 1),
            })],
            _ => vec![QueryResult::Affected(RowsAffected {
                rows_affected: 1,
                last_affected_id: None,
            })],
        })
    }
}

impl Connection for MockConnection {
    type Driver = MockDriver;

    async fn connect(_url: Cow<'static, str>) -> Result<Self> {
        Ok(Self::new(&[], &[]))
    }

    fn driver(&self) -> &MockDriver {
        &MockDriver
    }

    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn run(&self, sql: String, params: Params) -> impl Stream<Item = Result<QueryResult>> + Send {
        let response = self.respond(&sql);
        self.statements.lock().unwrap().push((sql, params));
        let items: Vec<Result<QueryResult>> = match response {
            Ok(results) => results.into_iter().map(Ok).collect(),
            Err(error) => vec![Err(error)],
        };
        stream::iter(items)
    }

    async fn last_insert_id(&self) -> Result<Option<i64>> {
        Ok(Some(self.last_id.load(Ordering::Relaxed)))
    }

    async fn indexes(&self, _table: &str, _primary_only: bool) -> Result<Vec<Index>> {
        if self.keys.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![Index {
            name: "primary".into(),
            columns: self.keys.clone(),
            primary: true,
            unique: true,
        }])
    }

    async fn column_names(&self, _table: &str) -> Result<Vec<String>> {
        Ok(self.columns.clone())
    }
}
