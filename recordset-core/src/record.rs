use crate::{RowLabeled, Value};
use std::slice;

/// Ordered column name to value mapping: the "current record" of a dataset.
///
/// Lookups try an exact name match first and fall back to an ASCII case-insensitive
/// match, column names coming back from a backend do not always keep the case
/// they were declared with.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// A record holding every column in `names` set to `Value::Null`.
    pub fn with_columns<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: names.into_iter().map(|v| (v.into(), Value::Null)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|(k, _)| k == name)
            .or_else(|| {
                self.fields
                    .iter()
                    .position(|(k, _)| k.eq_ignore_ascii_case(name))
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.position(name).map(|i| &self.fields[i].1)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.position(name).map(|i| &mut self.fields[i].1)
    }

    /// Replace the value of `name` in place, or append the column. Returns the previous value.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Option<Value> {
        let value = value.into();
        match self.position(name) {
            Some(i) => Some(std::mem::replace(&mut self.fields[i].1, value)),
            None => {
                self.fields.push((name.to_owned(), value));
                None
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.position(name).map(|i| self.fields.remove(i).1)
    }

    pub fn retain(&mut self, mut f: impl FnMut(&str, &Value) -> bool) {
        self.fields.retain(|(k, v)| f(k, v));
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.fields.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl From<RowLabeled> for Record {
    fn from(value: RowLabeled) -> Self {
        Self {
            fields: value
                .labels
                .iter()
                .cloned()
                .zip(value.values.into_vec())
                .collect(),
        }
    }
}

impl<S: Into<String>, V: Into<Value>> FromIterator<(S, V)> for Record {
    fn from_iter<T: IntoIterator<Item = (S, V)>>(iter: T) -> Self {
        let mut result = Record::new();
        for (k, v) in iter {
            let k: String = k.into();
            result.set(&k, v);
        }
        result
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = &'a (String, Value);
    type IntoIter = slice::Iter<'a, (String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

/// Named statement parameters, kept in binding order.
///
/// Names are stored without the placeholder sigil, the [`SqlWriter`](crate::SqlWriter)
/// decides how a name is rendered inside the statement (`:name` by default).
#[derive(Default, Debug, Clone, PartialEq)]
pub struct Params {
    entries: Vec<(String, Value)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Set `name`, replacing any previous value bound to it.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| k == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name.to_owned(), value)),
        }
        self
    }

    /// Append a value under a freshly minted `p<n>` name and return that name.
    pub fn bind(&mut self, value: impl Into<Value>) -> String {
        let mut n = self.entries.len() + 1;
        while self.get(&format!("p{}", n)).is_some() {
            n += 1;
        }
        let name = format!("p{}", n);
        self.entries.push((name.clone(), value.into()));
        name
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let index = self.entries.iter().position(|(k, _)| k == name)?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<S: Into<String>, V: Into<Value>> FromIterator<(S, V)> for Params {
    fn from_iter<T: IntoIterator<Item = (S, V)>>(iter: T) -> Self {
        let mut result = Params::new();
        for (k, v) in iter {
            let k: String = k.into();
            result.set(&k, v);
        }
        result
    }
}
