use crate::{DataSource, DatasetError, Result, error::fail};
use std::fmt::{self, Display};

/// Page size used when no explicit `limit_count` was configured.
pub const DEFAULT_LIMIT_COUNT: u64 = 10;

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

impl Order {
    /// Lenient parse: anything other than `DESC` (any case, surrounding blanks ignored) is ascending.
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("DESC") {
            Order::Desc
        } else {
            Order::Asc
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }
}

impl Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Order {
    fn from(value: &str) -> Self {
        Order::parse(value)
    }
}

/// Master side of a master-detail relation.
#[derive(Debug, Clone)]
pub struct MasterLink {
    pub source: DataSource,
    /// Pairs of `(detail column, master column)`.
    pub fields: Vec<(String, String)>,
}

impl MasterLink {
    pub fn new<I, D, M>(source: DataSource, fields: I) -> Self
    where
        I: IntoIterator<Item = (D, M)>,
        D: Into<String>,
        M: Into<String>,
    {
        Self {
            source,
            fields: fields
                .into_iter()
                .map(|(d, m)| (d.into(), m.into()))
                .collect(),
        }
    }
}

/// Which rows a dataset asks for: filter, order, pagination window and master link.
#[derive(Debug, Clone)]
pub struct Selection {
    filter: String,
    order_field: String,
    order: Order,
    limit_start: u64,
    limit_count: u64,
    master: Option<MasterLink>,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            filter: String::new(),
            order_field: String::new(),
            order: Order::Asc,
            limit_start: 0,
            limit_count: DEFAULT_LIMIT_COUNT,
            master: None,
        }
    }
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn set_filter(&mut self, filter: impl Into<String>) {
        self.filter = filter.into();
    }

    pub fn order_field(&self) -> &str {
        &self.order_field
    }

    pub fn set_order_field(&mut self, field: impl Into<String>) {
        self.order_field = field.into();
    }

    pub fn order(&self) -> Order {
        self.order
    }

    pub fn set_order(&mut self, order: impl Into<Order>) {
        self.order = order.into();
    }

    pub fn limit_start(&self) -> u64 {
        self.limit_start
    }

    pub fn set_limit_start(&mut self, start: u64) {
        self.limit_start = start;
    }

    pub fn limit_count(&self) -> u64 {
        self.limit_count
    }

    pub fn set_limit_count(&mut self, count: u64) -> Result<()> {
        if count == 0 {
            return fail(DatasetError::InvalidArgument(
                "limit_count must be at least 1".into(),
            ));
        }
        self.limit_count = count;
        Ok(())
    }

    /// The `(limit, offset)` to apply, `None` when the window is left at its defaults.
    pub fn window(&self) -> Option<(u64, Option<u64>)> {
        if self.limit_start == 0 && self.limit_count == DEFAULT_LIMIT_COUNT {
            return None;
        }
        Some((
            self.limit_count,
            (self.limit_start > 0).then_some(self.limit_start),
        ))
    }

    pub fn master(&self) -> Option<&MasterLink> {
        self.master.as_ref()
    }

    pub fn set_master(&mut self, master: Option<MasterLink>) {
        self.master = master;
    }

    /// Non empty filter, wrapped into a condition list.
    pub(crate) fn conditions(&self) -> Vec<String> {
        let filter = self.filter.trim();
        if filter.is_empty() {
            Vec::new()
        } else {
            vec![filter.to_owned()]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_normalization() {
        assert_eq!(Order::parse("desc"), Order::Desc);
        assert_eq!(Order::parse(" DeSc "), Order::Desc);
        assert_eq!(Order::parse("descending"), Order::Asc);
        assert_eq!(Order::parse(""), Order::Asc);
        assert_eq!(Order::parse("random"), Order::Asc);
    }

    #[test]
    fn default_window_applies_no_limit() {
        let mut selection = Selection::new();
        assert_eq!(selection.window(), None);
        selection.set_limit_start(20);
        assert_eq!(selection.window(), Some((DEFAULT_LIMIT_COUNT, Some(20))));
        selection.set_limit_start(0);
        selection.set_limit_count(5).unwrap();
        assert_eq!(selection.window(), Some((5, None)));
        assert!(selection.set_limit_count(0).is_err());
        assert_eq!(selection.limit_count(), 5);
    }
}
