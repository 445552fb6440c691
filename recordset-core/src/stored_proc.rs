use crate::{
    CallStyle, Connection, Cursor, Dataset, DatasetError, Driver, Query, Record, Result,
    RowsAffected, Selection, SqlWriter, Value, base_attribute, dataset::execute_statement,
    error::fail,
};
use std::sync::Arc;

/// Result of [`StoredProc::execute_proc`].
#[derive(Debug, Clone, PartialEq)]
pub enum ProcOutcome {
    /// Block style call, executed without a result set.
    Affected(RowsAffected),
    /// Rows returned by the procedure.
    Rows(Vec<Record>),
}

/// Stored procedure invocation, rendered in the call syntax of the connection dialect.
#[derive(Debug)]
pub struct StoredProc<C: Connection> {
    query: Query<C>,
    procedure_name: String,
    args: Vec<Value>,
    extra_fetch: String,
}

impl<C: Connection> StoredProc<C> {
    pub fn new(procedure_name: impl Into<String>) -> Self {
        Self {
            query: Query::new(),
            procedure_name: procedure_name.into(),
            args: Vec::new(),
            extra_fetch: String::new(),
        }
    }

    pub fn with_connection(connection: Arc<C>, procedure_name: impl Into<String>) -> Self {
        Self {
            query: Query::with_connection(connection),
            ..Self::new(procedure_name)
        }
    }

    pub fn connection(&self) -> Option<&Arc<C>> {
        self.query.connection()
    }

    pub fn set_connection(&mut self, connection: Option<Arc<C>>) {
        self.query.set_connection(connection);
    }

    pub fn procedure_name(&self) -> &str {
        &self.procedure_name
    }

    pub fn set_procedure_name(&mut self, name: impl Into<String>) {
        self.procedure_name = name.into();
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Append a positional argument, rendered as a literal.
    pub fn add_arg(&mut self, value: impl Into<Value>) -> &mut Self {
        self.args.push(value.into());
        self
    }

    pub fn clear_args(&mut self) {
        self.args.clear();
    }

    /// Bind a named parameter, for procedure names or extra statements using `:name` placeholders.
    pub fn set_param(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        self.query.set_param(name, value);
        self
    }

    /// Statement run after a `CALL` to read output variables (`SELECT @out`).
    pub fn set_extra_fetch(&mut self, sql: impl Into<String>) {
        self.extra_fetch = sql.into();
    }

    fn bound_connection(&self) -> Result<Arc<C>> {
        match self.query.connection() {
            Some(connection) => Ok(connection.clone()),
            None => fail(DatasetError::NoConnection),
        }
    }

    pub fn call_style(&self) -> Result<CallStyle> {
        Ok(self.bound_connection()?.dialect().call_style())
    }

    /// The call statement for the dialect of the bound connection.
    pub fn build_sql(&self) -> Result<String> {
        let connection = self.bound_connection()?;
        let name = self.procedure_name.trim();
        if name.is_empty() {
            return fail(DatasetError::EmptyStatement);
        }
        let mut sql = String::with_capacity(64);
        connection.driver().sql_writer().write_procedure_call(
            &mut sql,
            connection.dialect().call_style(),
            name,
            &self.args,
            Some(self.extra_fetch.as_str()),
        );
        Ok(sql)
    }

    /// Run the procedure: block style dialects execute it directly, the others go
    /// through a full open and close cycle collecting the rows.
    pub async fn execute_proc(&mut self) -> Result<ProcOutcome> {
        let sql = self.build_sql()?;
        let connection = self.bound_connection()?;
        if connection.dialect().call_style() == CallStyle::Block {
            let result =
                execute_statement(connection.as_ref(), sql, self.query.params().clone()).await?;
            return Ok(ProcOutcome::Affected(result));
        }
        self.open().await?;
        let rows = self.records().cloned().collect();
        self.close();
        Ok(ProcOutcome::Rows(rows))
    }
}

impl<C: Connection> Dataset for StoredProc<C> {
    fn cursor(&self) -> &Cursor {
        self.query.cursor()
    }

    fn cursor_mut(&mut self) -> &mut Cursor {
        self.query.cursor_mut()
    }

    fn selection(&self) -> &Selection {
        self.query.selection()
    }

    fn selection_mut(&mut self) -> &mut Selection {
        self.query.selection_mut()
    }

    async fn open(&mut self) -> Result<()> {
        let sql = self.build_sql()?;
        self.query.set_sql(sql);
        self.query.open().await
    }

    async fn post(&mut self) -> Result<()> {
        self.query.post().await
    }

    async fn delete(&mut self) -> Result<()> {
        self.query.delete().await
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "procedure_name" => Some(self.procedure_name.as_str().into()),
            "sql" => Some(self.query.sql().into()),
            _ => base_attribute(self, name),
        }
    }
}
