use crate::{Connection, Result, SqlWriter};
use std::{borrow::Cow, future::Future};

/// Syntax family of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
    MySql,
    MariaDb,
    Oracle,
    MsSql,
    DuckDb,
    Generic,
}

/// Shape of the statement used to invoke a stored procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStyle {
    /// `BEGIN name(args); END;`, returns no usable result set.
    Block,
    /// `CALL name(args)` optionally followed by a statement fetching output variables.
    Call,
    /// `SELECT * FROM name(args)`.
    TableFunction,
}

impl Dialect {
    pub fn call_style(&self) -> CallStyle {
        match self {
            Dialect::Oracle => CallStyle::Block,
            Dialect::MySql | Dialect::MariaDb | Dialect::MsSql => CallStyle::Call,
            Dialect::Sqlite | Dialect::Postgres | Dialect::DuckDb | Dialect::Generic => {
                CallStyle::TableFunction
            }
        }
    }
}

pub trait Driver: Send + Sync {
    type Connection: Connection<Driver = Self>;
    type SqlWriter: SqlWriter;

    const NAME: &'static str;
    const DIALECT: Dialect;

    fn sql_writer(&self) -> Self::SqlWriter;

    fn connect(&self, url: Cow<'static, str>) -> impl Future<Output = Result<Self::Connection>> {
        Self::Connection::connect(url)
    }
}
