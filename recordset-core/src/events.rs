use crate::Record;
use std::fmt::{self, Debug};

/// Notifications a dataset sends to its listeners around every state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasetEvent {
    BeforeOpen,
    AfterOpen,
    BeforeClose,
    AfterClose,
    BeforeInsert,
    AfterInsert,
    BeforeEdit,
    AfterEdit,
    BeforePost,
    AfterPost,
    BeforeCancel,
    AfterCancel,
    BeforeDelete,
    AfterDelete,
    /// The cursor moved to a different row.
    AfterScroll,
}

pub type Listener = Box<dyn FnMut(DatasetEvent, &Record) + Send + Sync>;

/// Per dataset observer list, invoked synchronously in registration order.
#[derive(Default)]
pub struct Listeners {
    entries: Vec<(Option<DatasetEvent>, Listener)>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for `event`.
    pub fn on<F>(&mut self, event: DatasetEvent, listener: F)
    where
        F: FnMut(DatasetEvent, &Record) + Send + Sync + 'static,
    {
        self.entries.push((Some(event), Box::new(listener)));
    }

    /// Register `listener` for every event.
    pub fn on_any<F>(&mut self, listener: F)
    where
        F: FnMut(DatasetEvent, &Record) + Send + Sync + 'static,
    {
        self.entries.push((None, Box::new(listener)));
    }

    pub fn notify(&mut self, event: DatasetEvent, record: &Record) {
        for (filter, listener) in self.entries.iter_mut() {
            if filter.is_none_or(|v| v == event) {
                listener(event, record);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("len", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn listeners_run_in_registration_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut listeners = Listeners::new();
        let first = calls.clone();
        listeners.on(DatasetEvent::BeforePost, move |_, _| {
            first.lock().unwrap().push("first")
        });
        let any = calls.clone();
        listeners.on_any(move |_, _| any.lock().unwrap().push("any"));
        let last = calls.clone();
        listeners.on(DatasetEvent::BeforePost, move |_, _| {
            last.lock().unwrap().push("last")
        });
        listeners.notify(DatasetEvent::BeforePost, &Record::new());
        listeners.notify(DatasetEvent::AfterPost, &Record::new());
        assert_eq!(*calls.lock().unwrap(), ["first", "any", "last", "any"]);
    }
}
