use crate::{
    Connection, Cursor, Dataset, DatasetError, DatasetEvent, DatasetState, Driver, Params, Record,
    Result, Selection, SqlWriter, Value, base_attribute,
    dataset::{execute_statement, materialize},
    error::fail,
    master_conditions,
};
use std::sync::Arc;

/// Append the filter, master predicates and ORDER BY of `selection` to `out`.
pub(crate) fn write_selection(
    writer: &impl SqlWriter,
    out: &mut String,
    selection: &Selection,
    master: Vec<String>,
) {
    let mut conditions = selection.conditions();
    conditions.extend(master);
    writer.write_conditions(out, &conditions);
    let order_field = selection.order_field().trim();
    if !order_field.is_empty() {
        writer.write_order(out, order_field, selection.order());
    }
}

/// Dataset over an arbitrary SQL statement.
///
/// The statement is kept as a list of fragments joined by newlines. Filter,
/// master predicates and order are injected at open time, so the configured
/// text is never modified. `post` and `delete` only touch the in memory window.
#[derive(Debug)]
pub struct Query<C: Connection> {
    connection: Option<Arc<C>>,
    sql: Vec<String>,
    params: Params,
    cursor: Cursor,
    selection: Selection,
}

impl<C: Connection> Default for Query<C> {
    fn default() -> Self {
        Self {
            connection: None,
            sql: Vec::new(),
            params: Params::new(),
            cursor: Cursor::new(),
            selection: Selection::new(),
        }
    }
}

impl<C: Connection> Query<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connection(connection: Arc<C>) -> Self {
        Self {
            connection: Some(connection),
            ..Default::default()
        }
    }

    pub fn connection(&self) -> Option<&Arc<C>> {
        self.connection.as_ref()
    }

    pub fn set_connection(&mut self, connection: Option<Arc<C>>) {
        self.connection = connection;
    }

    /// The configured statement, fragments joined by newlines.
    pub fn sql(&self) -> String {
        self.sql.join("\n")
    }

    /// Replace the statement.
    pub fn set_sql(&mut self, sql: impl Into<String>) {
        self.sql = vec![sql.into()];
    }

    /// Append a fragment to the statement.
    pub fn add_sql(&mut self, fragment: impl Into<String>) {
        self.sql.push(fragment.into());
    }

    pub fn clear_sql(&mut self) {
        self.sql.clear();
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Bind the named parameter `:name` for every following execution.
    pub fn set_param(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        self.params.set(name, value);
        self
    }

    fn bound_connection(&self) -> Result<Arc<C>> {
        match &self.connection {
            Some(connection) => Ok(connection.clone()),
            None => fail(DatasetError::NoConnection),
        }
    }

    fn statement(&self) -> Result<String> {
        let sql = self.sql();
        let sql = sql.trim_end().trim_end_matches(';').trim_end();
        if sql.trim().is_empty() {
            return fail(DatasetError::EmptyStatement);
        }
        Ok(sql.to_owned())
    }

    /// The statement that `open` executes: filter, master predicates and order applied.
    pub async fn build_sql(&self) -> Result<String> {
        let connection = self.bound_connection()?;
        let mut sql = self.statement()?;
        let master = master_conditions(self.selection.master(), connection.as_ref()).await?;
        write_selection(
            &connection.driver().sql_writer(),
            &mut sql,
            &self.selection,
            master,
        );
        Ok(sql)
    }

    /// Open when inactive and return every record.
    pub async fn fetch_all(&mut self) -> Result<Vec<Record>> {
        if !self.cursor.is_active() {
            self.open().await?;
        }
        Ok(self.cursor.rows().to_vec())
    }

    /// Open when inactive, return the current record and advance.
    pub async fn fetch_one(&mut self) -> Result<Option<Record>> {
        if !self.cursor.is_active() {
            self.open().await?;
        }
        let result = self.cursor.current().cloned();
        if result.is_some() {
            self.cursor.move_by(1);
        }
        Ok(result)
    }

    /// Execute the statement as is, without opening a cursor. Returns the affected row count.
    pub async fn exec_sql(&mut self) -> Result<u64> {
        let connection = self.bound_connection()?;
        let sql = self.statement()?;
        let result = execute_statement(connection.as_ref(), sql, self.params.clone()).await?;
        Ok(result.rows_affected)
    }
}

impl<C: Connection> Dataset for Query<C> {
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
        self.statement()?;
        self.cursor.notify(DatasetEvent::BeforeOpen);
        let sql = self.build_sql().await?;
        let rows = materialize(
            connection.as_ref(),
            sql,
            self.params.clone(),
            &self.selection,
        )
        .await?;
        self.cursor.load(rows, Vec::new());
        self.cursor.notify(DatasetEvent::AfterOpen);
        Ok(())
    }

    async fn post(&mut self) -> Result<()> {
        match self.cursor.state() {
            DatasetState::Inactive => return fail(DatasetError::NotActive),
            DatasetState::Browse => return Ok(()),
            DatasetState::Edit | DatasetState::Insert => {}
        }
        self.cursor.notify(DatasetEvent::BeforePost);
        if self.cursor.state() == DatasetState::Edit {
            self.cursor.commit_edit();
        } else {
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
        if self.cursor.current().is_none() {
            return fail(DatasetError::NoCurrentRecord);
        }
        self.cursor.notify(DatasetEvent::BeforeDelete);
        self.cursor.remove_current();
        self.cursor.notify(DatasetEvent::AfterDelete);
        Ok(())
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "sql" => Some(self.sql().into()),
            _ => base_attribute(self, name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GenericSqlWriter, Order};
    use indoc::indoc;

    #[test]
    fn selection_is_appended() {
        let writer = GenericSqlWriter::new();
        let mut selection = Selection::new();
        selection.set_filter("  status = 'active' ");
        selection.set_order_field("name");
        selection.set_order(Order::Desc);
        let mut sql = String::from("SELECT *\nFROM person");
        write_selection(&writer, &mut sql, &selection, vec!["\"team_id\" = 4".into()]);
        assert_eq!(
            sql,
            indoc! {r#"
                SELECT *
                FROM person
                WHERE (status = 'active') AND ("team_id" = 4)
                ORDER BY "name" DESC
            "#}
            .trim()
        );
    }

    #[test]
    fn blank_selection_leaves_statement() {
        let mut sql = String::from("SELECT 1");
        write_selection(&GenericSqlWriter::new(), &mut sql, &Selection::new(), Vec::new());
        assert_eq!(sql, "SELECT 1");
    }
}
