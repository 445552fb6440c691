use crate::{DatasetError, DatasetEvent, Listeners, Record, Result, Value, error::fail};
use std::fmt::{self, Display};

/// Lifecycle state of a dataset.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasetState {
    #[default]
    Inactive,
    Browse,
    Edit,
    Insert,
}

impl DatasetState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetState::Inactive => "Inactive",
            DatasetState::Browse => "Browse",
            DatasetState::Edit => "Edit",
            DatasetState::Insert => "Insert",
        }
    }

    /// Edit or Insert: the field buffer holds pending changes.
    pub fn is_editing(&self) -> bool {
        matches!(self, DatasetState::Edit | DatasetState::Insert)
    }
}

impl Display for DatasetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// In memory row window with a field buffer and the state machine driving it.
///
/// The window holds every materialized row, `index` points into it and may
/// sit one past the last row (end of file), in which case the buffer is empty.
#[derive(Default, Debug)]
pub struct Cursor {
    rows: Vec<Record>,
    index: usize,
    buffer: Record,
    columns: Vec<String>,
    state: DatasetState,
    snapshot: Option<Record>,
    modified: bool,
    listeners: Listeners,
}

impl Cursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DatasetState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state != DatasetState::Inactive
    }

    pub fn listeners(&mut self) -> &mut Listeners {
        &mut self.listeners
    }

    pub fn notify(&mut self, event: DatasetEvent) {
        self.listeners.notify(event, &self.buffer);
    }

    /// Replace the window with `rows`, move to the first one and enter Browse.
    pub fn load(&mut self, rows: Vec<Record>, columns: Vec<String>) {
        self.columns = if columns.is_empty() {
            rows.first()
                .map(|v| v.names().map(ToOwned::to_owned).collect())
                .unwrap_or_default()
        } else {
            columns
        };
        self.rows = rows;
        self.snapshot = None;
        self.modified = false;
        self.state = DatasetState::Browse;
        self.load_buffer(0);
    }

    /// Drop rows, buffer and snapshot, back to Inactive.
    pub fn clear(&mut self) {
        self.rows.clear();
        self.index = 0;
        self.buffer = Record::new();
        self.snapshot = None;
        self.modified = false;
        self.state = DatasetState::Inactive;
    }

    fn load_buffer(&mut self, index: usize) {
        self.index = index.min(self.rows.len());
        self.buffer = self.rows.get(self.index).cloned().unwrap_or_default();
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn bof(&self) -> bool {
        self.index == 0
    }

    /// True at or past the last row, and always on an empty window.
    pub fn eof(&self) -> bool {
        self.rows.is_empty() || self.index + 1 >= self.rows.len()
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    /// Row under the cursor, `None` past the end.
    pub fn current(&self) -> Option<&Record> {
        self.rows.get(self.index)
    }

    pub fn buffer(&self) -> &Record {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut Record {
        &mut self.buffer
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn snapshot(&self) -> Option<&Record> {
        self.snapshot.as_ref()
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Move to `index`, clamped into `[0, len]`. Pending changes are discarded.
    pub fn move_to(&mut self, index: usize) {
        if self.state.is_editing() {
            log::warn!(
                "Navigating while in {} state, pending changes are discarded",
                self.state
            );
            self.cancel();
        }
        if !self.is_active() {
            return;
        }
        let previous = self.index;
        self.load_buffer(index);
        log::trace!("Cursor moved from {} to {}", previous, self.index);
        if previous != self.index {
            self.notify(DatasetEvent::AfterScroll);
        }
    }

    pub fn move_by(&mut self, distance: isize) {
        let target = (self.index as isize)
            .saturating_add(distance)
            .clamp(0, self.rows.len() as isize);
        self.move_to(target as usize);
    }

    pub fn first(&mut self) {
        if !self.rows.is_empty() {
            self.move_to(0);
        }
    }

    pub fn last(&mut self) {
        if !self.rows.is_empty() {
            self.move_to(self.rows.len() - 1);
        }
    }

    /// Snapshot the buffer and enter Edit.
    pub fn edit(&mut self) -> Result<()> {
        match self.state {
            DatasetState::Inactive => return fail(DatasetError::NotActive),
            DatasetState::Edit => return Ok(()),
            DatasetState::Insert => {
                return fail(DatasetError::InvalidState {
                    operation: "edit",
                    state: self.state,
                });
            }
            DatasetState::Browse => {}
        }
        if self.current().is_none() {
            return fail(DatasetError::NoCurrentRecord);
        }
        self.notify(DatasetEvent::BeforeEdit);
        self.snapshot = Some(self.buffer.clone());
        self.state = DatasetState::Edit;
        self.notify(DatasetEvent::AfterEdit);
        Ok(())
    }

    /// Start a new row shaped after the known columns, all Null.
    pub fn insert(&mut self) -> Result<()> {
        match self.state {
            DatasetState::Inactive => return fail(DatasetError::NotActive),
            DatasetState::Browse => {}
            state => {
                return fail(DatasetError::InvalidState {
                    operation: "insert",
                    state,
                });
            }
        }
        self.notify(DatasetEvent::BeforeInsert);
        self.buffer = Record::with_columns(self.columns.iter().cloned());
        self.modified = false;
        self.state = DatasetState::Insert;
        self.notify(DatasetEvent::AfterInsert);
        Ok(())
    }

    /// Restore the pre Edit snapshot or drop the new row. No effect outside Edit and Insert.
    pub fn cancel(&mut self) {
        if !self.state.is_editing() {
            return;
        }
        self.notify(DatasetEvent::BeforeCancel);
        match self.state {
            DatasetState::Edit => {
                if let Some(snapshot) = self.snapshot.take() {
                    self.buffer = snapshot;
                }
            }
            _ => self.buffer = self.rows.get(self.index).cloned().unwrap_or_default(),
        }
        self.snapshot = None;
        self.modified = false;
        self.state = DatasetState::Browse;
        self.notify(DatasetEvent::AfterCancel);
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.buffer.get(name)
    }

    /// Assign a field of the buffer, promoting Browse to Edit.
    pub fn set_field(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        match self.state {
            DatasetState::Inactive => return fail(DatasetError::NotActive),
            DatasetState::Browse => self.edit()?,
            DatasetState::Edit | DatasetState::Insert => {}
        }
        self.buffer.set(name, value);
        self.modified = true;
        Ok(())
    }

    /// Write the edited buffer back into the window and return to Browse.
    pub fn commit_edit(&mut self) {
        if let Some(row) = self.rows.get_mut(self.index) {
            *row = self.buffer.clone();
        }
        self.snapshot = None;
        self.modified = false;
        self.state = DatasetState::Browse;
    }

    /// Append the inserted buffer to the window, make it current and return to Browse.
    pub fn commit_insert(&mut self) {
        if self.columns.is_empty() {
            self.columns = self.buffer.names().map(ToOwned::to_owned).collect();
        }
        self.rows.push(self.buffer.clone());
        self.index = self.rows.len() - 1;
        self.snapshot = None;
        self.modified = false;
        self.state = DatasetState::Browse;
    }

    /// Splice the current row out of the window, then clamp to the new last row.
    pub fn remove_current(&mut self) -> Option<Record> {
        if self.index >= self.rows.len() {
            return None;
        }
        let removed = self.rows.remove(self.index);
        let index = self.index.min(self.rows.len().saturating_sub(1));
        self.load_buffer(index);
        Some(removed)
    }

    /// First row index at or after `from` where `column` matches `value`.
    pub fn find(&self, column: &str, value: &Value, from: usize) -> Option<usize> {
        self.rows
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, row)| row.get(column).is_some_and(|v| v.same_as(value)))
            .map(|(i, _)| i)
    }
}
