use crate::{
    Connection, Context, Cursor, Dataset, DatasetError, DatasetEvent, DatasetState, Driver, Params,
    Record, Result, Selection, SqlWriter, Value, base_attribute,
    dataset::{execute_statement, materialize},
    error::fail,
    master_conditions,
    query::write_selection,
};
use std::sync::Arc;

/// Dataset bound to a single table, translating Insert, Edit and Delete into SQL.
///
/// Key fields are discovered on every open: the primary key columns, or the
/// columns of the first index when the table reports no primary key. They
/// address the row in UPDATE and DELETE statements.
#[derive(Debug)]
pub struct Table<C: Connection> {
    connection: Option<Arc<C>>,
    table_name: String,
    key_fields: Vec<String>,
    auto_increment: bool,
    cursor: Cursor,
    selection: Selection,
}

impl<C: Connection> Default for Table<C> {
    fn default() -> Self {
        Self {
            connection: None,
            table_name: String::new(),
            key_fields: Vec::new(),
            auto_increment: true,
            cursor: Cursor::new(),
            selection: Selection::new(),
        }
    }
}

impl<C: Connection> Table<C> {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            ..Default::default()
        }
    }

    pub fn with_connection(connection: Arc<C>, table_name: impl Into<String>) -> Self {
        Self {
            connection: Some(connection),
            table_name: table_name.into(),
            ..Default::default()
        }
    }

    pub fn connection(&self) -> Option<&Arc<C>> {
        self.connection.as_ref()
    }

    pub fn set_connection(&mut self, connection: Option<Arc<C>>) {
        self.connection = connection;
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn set_table_name(&mut self, table_name: impl Into<String>) {
        self.table_name = table_name.into();
    }

    /// Columns identifying a row, resolved by `open`.
    pub fn key_fields(&self) -> &[String] {
        &self.key_fields
    }

    pub fn auto_increment(&self) -> bool {
        self.auto_increment
    }

    /// When enabled, an empty first key column is left to the database on insert and
    /// filled afterwards with the generated identifier.
    pub fn set_auto_increment(&mut self, auto_increment: bool) {
        self.auto_increment = auto_increment;
    }

    fn bound_connection(&self) -> Result<Arc<C>> {
        match &self.connection {
            Some(connection) => Ok(connection.clone()),
            None => fail(DatasetError::NoConnection),
        }
    }

    fn is_key(&self, column: &str) -> bool {
        self.key_fields
            .iter()
            .any(|v| v.eq_ignore_ascii_case(column))
    }

    /// Key portion of `record`.
    fn key_values(&self, record: &Record) -> Record {
        self.key_fields
            .iter()
            .map(|k| (k.clone(), record.get(k).cloned().unwrap_or_default()))
            .collect()
    }

    async fn resolve_key_fields(connection: &C, table: &str) -> Result<Vec<String>> {
        let keys = connection
            .primary_key_columns(table)
            .await
            .with_context(|| format!("While reading the primary key of `{}`", table))?;
        if !keys.is_empty() {
            return Ok(keys);
        }
        let indexes = connection
            .indexes(table, false)
            .await
            .with_context(|| format!("While reading the indexes of `{}`", table))?;
        Ok(indexes
            .into_iter()
            .next()
            .map(|v| v.columns)
            .unwrap_or_default())
    }

    /// The select `open` executes.
    pub async fn build_sql(&self) -> Result<String> {
        let connection = self.bound_connection()?;
        let writer = connection.driver().sql_writer();
        let mut sql = String::with_capacity(128);
        writer.write_select_all(&mut sql, self.table_name.trim());
        let master = master_conditions(self.selection.master(), connection.as_ref()).await?;
        write_selection(&writer, &mut sql, &self.selection, master);
        Ok(sql)
    }

    async fn post_edit(&mut self, connection: &C) -> Result<()> {
        let before = self
            .cursor
            .snapshot()
            .cloned()
            .unwrap_or_else(|| self.cursor.buffer().clone());
        let keys = self.key_values(&before);
        let values: Record = self
            .cursor
            .buffer()
            .iter()
            .filter(|(column, value)| {
                !self.is_key(column) && before.get(column).is_none_or(|v| !v.same_as(value))
            })
            .map(|(column, value)| (column, value.clone()))
            .collect();
        if keys.is_empty() || values.is_empty() {
            log::debug!(
                "Nothing to update in `{}`, the edit is kept in memory only",
                self.table_name
            );
            return Ok(());
        }
        let mut sql = String::with_capacity(128);
        let mut params = Params::new();
        connection.driver().sql_writer().write_update(
            &mut sql,
            &self.table_name,
            &values,
            &keys,
            &mut params,
        );
        execute_statement(connection, sql, params).await?;
        Ok(())
    }

    async fn post_insert(&mut self, connection: &C) -> Result<()> {
        let mut row = self.cursor.buffer().clone();
        row.retain(|_, v| !v.is_empty());
        let mut sql = String::with_capacity(128);
        let mut params = Params::new();
        connection.driver().sql_writer().write_insert(
            &mut sql,
            &self.table_name,
            &row,
            &mut params,
        );
        let result = execute_statement(connection, sql, params).await?;
        if !self.auto_increment {
            return Ok(());
        }
        let Some(key) = self.key_fields.first().cloned() else {
            return Ok(());
        };
        if self.cursor.buffer().get(&key).is_some_and(|v| !v.is_empty()) {
            return Ok(());
        }
        let id = match result.last_affected_id {
            Some(id) => Some(id),
            None => connection.last_insert_id().await?,
        };
        if let Some(id) = id {
            self.cursor.buffer_mut().set(&key, id);
        }
        Ok(())
    }
}

impl<C: Connection> Dataset for Table<C> {
    fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    fn cursor_mut(&mut self) -> &mut Cursor {
        &mut self.cursor
    }

    fn selection(&self) -> &Selection {
        &self.selection
    }

    fn selection_mut(&mut self) -> &mut Selection {
        &mut self.selection
    }

    async fn open(&mut self) -> Result<()> {
        let connection = self.bound_connection()?;
        self.cursor.notify(DatasetEvent::BeforeOpen);
        let table = self.table_name.trim().to_owned();
        if table.is_empty() {
            log::debug!("Opening a table dataset with no table name, the result is empty");
            self.key_fields.clear();
            self.cursor.load(Vec::new(), Vec::new());
            self.cursor.notify(DatasetEvent::AfterOpen);
            return Ok(());
        }
        self.key_fields = Self::resolve_key_fields(connection.as_ref(), &table).await?;
        let columns = connection
            .column_names(&table)
            .await
            .with_context(|| format!("While reading the columns of `{}`", table))?;
        let sql = self.build_sql().await?;
        let rows = materialize(connection.as_ref(), sql, Params::new(), &self.selection).await?;
        self.cursor.load(rows, columns);
        self.cursor.notify(DatasetEvent::AfterOpen);
        Ok(())
    }

    async fn post(&mut self) -> Result<()> {
        let state = self.cursor.state();
        match state {
            DatasetState::Inactive => return fail(DatasetError::NotActive),
            DatasetState::Browse => return Ok(()),
            DatasetState::Edit | DatasetState::Insert => {}
        }
        let connection = self.bound_connection()?;
        self.cursor.notify(DatasetEvent::BeforePost);
        if state == DatasetState::Edit {
            self.post_edit(connection.as_ref()).await?;
            self.cursor.commit_edit();
        } else {
            self.post_insert(connection.as_ref()).await?;
            self.cursor.commit_insert();
        }
        self.cursor.notify(DatasetEvent::AfterPost);
        Ok(())
    }

    async fn delete(&mut self) -> Result<()> {
        match self.cursor.state() {
            DatasetState::Inactive => return fail(DatasetError::NotActive),
            DatasetState::Insert => {
                self.cursor.cancel();
                return Ok(());
            }
            DatasetState::Edit => self.cursor.cancel(),
            DatasetState::Browse => {}
        }
        let connection = self.bound_connection()?;
        let Some(current) = self.cursor.current() else {
            return fail(DatasetError::NoCurrentRecord);
        };
        if self.key_fields.is_empty() {
            return fail(DatasetError::MissingKeyFields(self.table_name.clone()));
        }
        let keys = self.key_values(current);
        self.cursor.notify(DatasetEvent::BeforeDelete);
        let mut sql = String::with_capacity(128);
        let mut params = Params::new();
        connection.driver().sql_writer().write_delete(
            &mut sql,
            &self.table_name,
            &keys,
            &mut params,
        );
        execute_statement(connection.as_ref(), sql, params).await?;
        self.cursor.remove_current();
        self.cursor.notify(DatasetEvent::AfterDelete);
        Ok(())
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "table_name" => Some(self.table_name.as_str().into()),
            "auto_increment" => Some(self.auto_increment.into()),
            _ => base_attribute(self, name),
        }
    }
}
