use crate::{
    Connection, Cursor, DatasetError, DatasetEvent, DatasetState, MasterLink, Order, Params,
    Record, Result, RowLabeled, RowsAffected, Selection, Value, error::fail,
    stream::TryStreamExt, truncate_long,
};
use std::future::Future;

/// Record oriented view over a materialized result set.
///
/// Implementors provide the cursor and selection storage plus `open`, `post` and
/// `delete`. Navigation, buffer access and the state machine are shared.
pub trait Dataset: Send {
    fn cursor(&self) -> &Cursor;
    fn cursor_mut(&mut self) -> &mut Cursor;
    fn selection(&self) -> &Selection;
    fn selection_mut(&mut self) -> &mut Selection;

    /// Build and execute the select, replacing the row window.
    fn open(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Persist the pending Edit or Insert.
    fn post(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Remove the current record.
    fn delete(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Structural attribute lookup, see [`base_attribute`].
    fn attribute(&self, name: &str) -> Option<Value> {
        base_attribute(self, name)
    }

    /// Discard rows, buffer and snapshot.
    fn close(&mut self) {
        let cursor = self.cursor_mut();
        if !cursor.is_active() {
            return;
        }
        cursor.notify(DatasetEvent::BeforeClose);
        cursor.clear();
        cursor.notify(DatasetEvent::AfterClose);
    }

    /// Open again, keeping the cursor position when the row is still there.
    fn refresh(&mut self) -> impl Future<Output = Result<()>> + Send {
        async move {
            let index = self.cursor().index();
            self.open().await?;
            let last = self.cursor().len().saturating_sub(1);
            if index > 0 {
                self.cursor_mut().move_to(index.min(last));
            }
            Ok(())
        }
    }

    fn state(&self) -> DatasetState {
        self.cursor().state()
    }

    fn is_active(&self) -> bool {
        self.cursor().is_active()
    }

    fn first(&mut self) {
        self.cursor_mut().first();
    }

    fn last(&mut self) {
        self.cursor_mut().last();
    }

    /// Step to the following row, or past the last one.
    ///
    /// Like every navigation method, moving while in Edit or Insert cancels the
    /// pending changes. Since [`set_field`](Dataset::set_field) enters Edit on its
    /// own, call [`post`](Dataset::post) before moving to keep an assignment.
    fn next(&mut self) {
        self.cursor_mut().move_by(1);
    }

    fn prior(&mut self) {
        self.cursor_mut().move_by(-1);
    }

    /// Move `distance` rows, clamped between the first row and one past the last.
    /// Pending Edit or Insert changes are cancelled, see [`next`](Dataset::next).
    fn move_by(&mut self, distance: isize) {
        self.cursor_mut().move_by(distance);
    }

    fn bof(&self) -> bool {
        self.cursor().bof()
    }

    fn eof(&self) -> bool {
        self.cursor().eof()
    }

    fn record_count(&self) -> usize {
        self.cursor().len()
    }

    /// Zero based cursor index.
    fn recno(&self) -> usize {
        self.cursor().index()
    }

    fn is_empty(&self) -> bool {
        self.cursor().is_empty()
    }

    fn is_modified(&self) -> bool {
        self.cursor().is_modified()
    }

    fn current(&self) -> Option<&Record> {
        self.cursor().current()
    }

    fn records(&self) -> impl Iterator<Item = &Record> {
        self.cursor().rows().iter()
    }

    fn field_names(&self) -> Vec<String> {
        let cursor = self.cursor();
        if cursor.buffer().is_empty() {
            cursor.columns().to_vec()
        } else {
            cursor.buffer().names().map(ToOwned::to_owned).collect()
        }
    }

    fn edit(&mut self) -> Result<()> {
        self.cursor_mut().edit()
    }

    fn insert(&mut self) -> Result<()> {
        self.cursor_mut().insert()
    }

    fn cancel(&mut self) {
        self.cursor_mut().cancel();
    }

    fn field_by_name(&self, name: &str) -> Option<&Value> {
        self.cursor().field(name)
    }

    /// Assign a field. In Browse the dataset enters Edit first.
    fn set_field(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.cursor_mut().set_field(name, value)
    }

    /// Buffer field `name`, or the structural attribute with that name when the buffer has none.
    fn value(&self, name: &str) -> Option<Value> {
        self.field_by_name(name)
            .cloned()
            .or_else(|| self.attribute(name))
    }

    /// Move to the first row where `column` equals `value`. Returns whether one was found.
    fn locate(&mut self, column: &str, value: impl Into<Value>) -> bool {
        let value = value.into();
        match self.cursor().find(column, &value, 0) {
            Some(index) => {
                self.cursor_mut().move_to(index);
                true
            }
            None => false,
        }
    }

    fn on<F>(&mut self, event: DatasetEvent, listener: F)
    where
        F: FnMut(DatasetEvent, &Record) + Send + Sync + 'static,
    {
        self.cursor_mut().listeners().on(event, listener);
    }

    fn filter(&self) -> &str {
        self.selection().filter()
    }

    fn set_filter(&mut self, filter: impl Into<String>) {
        self.selection_mut().set_filter(filter);
    }

    fn order_field(&self) -> &str {
        self.selection().order_field()
    }

    fn set_order_field(&mut self, field: impl Into<String>) {
        self.selection_mut().set_order_field(field);
    }

    fn order(&self) -> Order {
        self.selection().order()
    }

    fn set_order(&mut self, order: impl Into<Order>) {
        self.selection_mut().set_order(order);
    }

    fn limit_start(&self) -> u64 {
        self.selection().limit_start()
    }

    fn set_limit_start(&mut self, start: u64) {
        self.selection_mut().set_limit_start(start);
    }

    fn limit_count(&self) -> u64 {
        self.selection().limit_count()
    }

    fn set_limit_count(&mut self, count: u64) -> Result<()> {
        self.selection_mut().set_limit_count(count)
    }

    fn set_master(&mut self, master: Option<MasterLink>) {
        self.selection_mut().set_master(master);
    }
}

/// Attributes every dataset exposes by name.
pub fn base_attribute<D: Dataset + ?Sized>(dataset: &D, name: &str) -> Option<Value> {
    let cursor = dataset.cursor();
    let selection = dataset.selection();
    Some(match name {
        "state" => cursor.state().as_str().into(),
        "active" => cursor.is_active().into(),
        "record_count" => cursor.len().into(),
        "recno" => cursor.index().into(),
        "bof" => cursor.bof().into(),
        "eof" => cursor.eof().into(),
        "modified" => cursor.is_modified().into(),
        "filter" => selection.filter().into(),
        "order_field" => selection.order_field().into(),
        "order" => selection.order().as_str().into(),
        "limit_start" => selection.limit_start().into(),
        "limit_count" => selection.limit_count().into(),
        _ => return None,
    })
}

/// Execute `sql` and collect every row, honoring the pagination window of `selection`.
pub(crate) async fn materialize<C: Connection>(
    connection: &C,
    sql: String,
    params: Params,
    selection: &Selection,
) -> Result<Vec<Record>> {
    log::debug!("Opening dataset:\n{}", truncate_long!(sql));
    let rows: Result<Vec<RowLabeled>> = match selection.window() {
        None => connection.fetch(sql.clone(), params).try_collect().await,
        Some((limit, offset)) => {
            connection
                .fetch_limit(sql.clone(), Some(limit), offset, params)
                .try_collect()
                .await
        }
    };
    match rows {
        Ok(rows) => Ok(rows.into_iter().map(Record::from).collect()),
        Err(error) => fail(DatasetError::execution(sql, error)),
    }
}

/// Run a modifying statement, wrapping failures with the statement text.
pub(crate) async fn execute_statement<C: Connection>(
    connection: &C,
    sql: String,
    params: Params,
) -> Result<RowsAffected> {
    log::debug!("Executing:\n{}", truncate_long!(sql));
    match connection.execute(sql.clone(), params).await {
        Ok(result) => Ok(result),
        Err(error) => fail(DatasetError::execution(sql, error)),
    }
}
