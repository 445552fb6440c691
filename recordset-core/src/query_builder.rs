use crate::{
    Connection, DatasetError, Driver, Order, Params, Record, Result, RowsAffected, SqlWriter,
    Value, error::fail, separated_by, stream::TryStreamExt, truncate_long,
};
use std::{fmt::Write, sync::Arc};

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinType {
    #[default]
    Default,
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

/// Right hand side of a builder condition: nothing, one value or a list.
#[derive(Default, Debug, Clone, PartialEq)]
pub enum Argument {
    #[default]
    None,
    Single(Value),
    List(Vec<Value>),
}

impl Argument {
    /// Scalars become a one element list.
    fn into_list(self) -> Vec<Value> {
        match self {
            Argument::None => Vec::new(),
            Argument::Single(v) => vec![v],
            Argument::List(v) => v,
        }
    }
}

macro_rules! impl_argument_from {
    ($($source:ty),+ $(,)?) => {
        $(
            impl From<$source> for Argument {
                fn from(value: $source) -> Self {
                    Argument::Single(value.into())
                }
            }
        )+
    };
}

impl_argument_from!(
    bool, i8, i16, i32, i64, u8, u16, u32, u64, f32, f64, String, &str, Value
);

impl From<()> for Argument {
    fn from(_: ()) -> Self {
        Argument::None
    }
}

impl<T: Into<Value>> From<Vec<T>> for Argument {
    fn from(value: Vec<T>) -> Self {
        Argument::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>, const N: usize> From<[T; N]> for Argument {
    fn from(value: [T; N]) -> Self {
        Argument::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value> + Clone> From<&[T]> for Argument {
    fn from(value: &[T]) -> Self {
        Argument::List(value.iter().cloned().map(Into::into).collect())
    }
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
enum StatementKind {
    #[default]
    Select,
    Insert,
    Update,
    Delete,
}

#[derive(Default, Debug, Clone)]
struct Statement {
    kind: StatementKind,
    columns: Vec<String>,
    table: String,
    joins: Vec<(JoinType, String, String)>,
    condition: String,
    /// Conjunction joining the top level terms of `condition`, if more than one.
    conjunction: Option<&'static str>,
    /// Parameters minted by `condition`.
    condition_params: Vec<String>,
    group_by: Vec<String>,
    having: String,
    order_by: Vec<(String, Order)>,
    limit: Option<u64>,
    offset: Option<u64>,
    values: Vec<(String, String)>,
}

/// Fluent assembler of parameterized statements.
///
/// One builder is meant to be reused for many statements: `reset` drops every
/// clause and parameter, keeping the connection. Placeholders are minted from a
/// counter (`p1`, `p2`, ...) so repeated conditions never collide.
///
/// ```ignore
/// let rows = builder
///     .select(["id", "name"])
///     .from("users")
///     .where_("id", "BETWEEN", [1, 2])?
///     .order_by("id", Order::Asc)
///     .fetch_all()
///     .await?;
/// ```
#[derive(Debug)]
pub struct QueryBuilder<C: Connection> {
    connection: Arc<C>,
    statement: Statement,
    params: Params,
    counter: usize,
}

impl<C: Connection> QueryBuilder<C> {
    pub fn new(connection: Arc<C>) -> Self {
        Self {
            connection,
            statement: Default::default(),
            params: Params::new(),
            counter: 0,
        }
    }

    pub fn connection(&self) -> &Arc<C> {
        &self.connection
    }

    /// Back to an empty statement bound to the same connection.
    pub fn reset(&mut self) -> &mut Self {
        self.statement = Default::default();
        self.params.clear();
        self.counter = 0;
        self
    }

    fn mint(&mut self, value: Value) -> String {
        self.counter += 1;
        let name = format!("p{}", self.counter);
        self.params.set(&name, value);
        let mut placeholder = String::with_capacity(name.len() + 1);
        self.connection
            .driver()
            .sql_writer()
            .write_parameter(&mut placeholder, &name);
        placeholder
    }

    fn mint_condition(&mut self, value: Value) -> String {
        let placeholder = self.mint(value);
        self.statement
            .condition_params
            .push(format!("p{}", self.counter));
        placeholder
    }

    pub fn select<I>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.statement.kind = StatementKind::Select;
        self.statement.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn from(&mut self, table: impl Into<String>) -> &mut Self {
        self.statement.table = table.into();
        self
    }

    /// Join `table` on the raw condition `on` (ignored when blank).
    pub fn join(
        &mut self,
        join_type: JoinType,
        table: impl Into<String>,
        on: impl Into<String>,
    ) -> &mut Self {
        self.statement
            .joins
            .push((join_type, table.into(), on.into()));
        self
    }

    /// Render one condition, minting its placeholders.
    fn condition(&mut self, column: &str, operator: &str, value: Argument) -> Result<String> {
        let operator = operator
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_uppercase();
        match operator.as_str() {
            "IS NULL" | "IS NOT NULL" => Ok(format!("{} {}", column, operator)),
            "IN" | "NOT IN" => {
                let values = value.into_list();
                if values.is_empty() {
                    return fail(DatasetError::InvalidArgument(format!(
                        "{} on `{}` needs at least one value",
                        operator, column
                    )));
                }
                let mut result = format!("{} {} (", column, operator);
                let placeholders: Vec<String> =
                    values.into_iter().map(|v| self.mint_condition(v)).collect();
                separated_by(&mut result, placeholders, |out, v| out.push_str(&v), ", ");
                result.push(')');
                Ok(result)
            }
            "BETWEEN" | "NOT BETWEEN" => {
                let values = value.into_list();
                if values.len() < 2 {
                    return fail(DatasetError::InvalidArgument(format!(
                        "{} on `{}` needs two values, {} given",
                        operator,
                        column,
                        values.len()
                    )));
                }
                let mut values = values.into_iter();
                let low = values.next().unwrap_or_default();
                let high = values.next().unwrap_or_default();
                let low = self.mint_condition(low);
                let high = self.mint_condition(high);
                Ok(format!("{} {} {} AND {}", column, operator, low, high))
            }
            _ => {
                let value = match value {
                    Argument::None => Value::Null,
                    Argument::Single(v) => v,
                    Argument::List(..) => {
                        return fail(DatasetError::InvalidArgument(format!(
                            "Operator {} on `{}` takes a single value",
                            operator, column
                        )));
                    }
                };
                let placeholder = self.mint_condition(value);
                Ok(format!("{} {} {}", column, operator, placeholder))
            }
        }
    }

    /// Join `condition` to the accumulated clause. Switching conjunction groups
    /// everything before it, so `a OR b` followed by `AND c` is `(a OR b) AND c`.
    fn push_condition(&mut self, conjunction: &'static str, condition: String) {
        let statement = &mut self.statement;
        if statement.condition.is_empty() {
            statement.condition = condition;
            statement.conjunction = None;
            return;
        }
        if statement.conjunction.is_some_and(|v| v != conjunction) {
            statement.condition = format!("({})", statement.condition);
        }
        let _ = write!(statement.condition, " {} {}", conjunction, condition);
        statement.conjunction = Some(conjunction);
    }

    /// Replace the WHERE clause with `column operator value`, dropping the parameters
    /// of the replaced clause. The placeholder counter keeps going.
    pub fn where_(
        &mut self,
        column: &str,
        operator: &str,
        value: impl Into<Argument>,
    ) -> Result<&mut Self> {
        let replaced = self.statement.condition_params.len();
        let condition = self.condition(column, operator, value.into())?;
        for name in self.statement.condition_params.drain(..replaced) {
            self.params.remove(&name);
        }
        self.statement.condition = condition;
        self.statement.conjunction = None;
        Ok(self)
    }

    pub fn and_where(
        &mut self,
        column: &str,
        operator: &str,
        value: impl Into<Argument>,
    ) -> Result<&mut Self> {
        let condition = self.condition(column, operator, value.into())?;
        self.push_condition("AND", condition);
        Ok(self)
    }

    pub fn or_where(
        &mut self,
        column: &str,
        operator: &str,
        value: impl Into<Argument>,
    ) -> Result<&mut Self> {
        let condition = self.condition(column, operator, value.into())?;
        self.push_condition("OR", condition);
        Ok(self)
    }

    /// AND a raw predicate into the WHERE clause, used verbatim.
    pub fn where_raw(&mut self, condition: impl Into<String>) -> &mut Self {
        self.push_condition("AND", format!("({})", condition.into()));
        self
    }

    pub fn group_by<I>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.statement
            .group_by
            .extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn having(&mut self, condition: impl Into<String>) -> &mut Self {
        self.statement.having = condition.into();
        self
    }

    pub fn order_by(&mut self, column: impl Into<String>, order: impl Into<Order>) -> &mut Self {
        self.statement.order_by.push((column.into(), order.into()));
        self
    }

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.statement.limit = Some(limit);
        self
    }

    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.statement.offset = Some(offset);
        self
    }

    pub fn insert(&mut self, table: impl Into<String>) -> &mut Self {
        self.statement.kind = StatementKind::Insert;
        self.statement.table = table.into();
        self
    }

    pub fn update(&mut self, table: impl Into<String>) -> &mut Self {
        self.statement.kind = StatementKind::Update;
        self.statement.table = table.into();
        self
    }

    pub fn delete(&mut self, table: impl Into<String>) -> &mut Self {
        self.statement.kind = StatementKind::Delete;
        self.statement.table = table.into();
        self
    }

    /// Column value for INSERT or UPDATE. Every call mints a new placeholder, a column
    /// set twice appears twice.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let placeholder = self.mint(value.into());
        self.statement.values.push((column.into(), placeholder));
        self
    }

    fn write_where(&self, out: &mut String) {
        if !self.statement.condition.is_empty() {
            out.push_str("\nWHERE ");
            out.push_str(&self.statement.condition);
        }
    }

    /// The statement assembled so far.
    pub fn sql(&self) -> String {
        let writer = self.connection.driver().sql_writer();
        let statement = &self.statement;
        let mut out = String::with_capacity(128);
        match statement.kind {
            StatementKind::Select => {
                out.push_str("SELECT ");
                if statement.columns.is_empty() {
                    out.push('*');
                } else {
                    out.push_str(&statement.columns.join(", "));
                }
                out.push_str("\nFROM ");
                out.push_str(&statement.table);
                for (join_type, table, on) in &statement.joins {
                    out.push('\n');
                    writer.write_join_type(&mut out, *join_type);
                    out.push(' ');
                    out.push_str(table);
                    if !on.trim().is_empty() {
                        out.push_str(" ON ");
                        out.push_str(on);
                    }
                }
                self.write_where(&mut out);
                if !statement.group_by.is_empty() {
                    out.push_str("\nGROUP BY ");
                    out.push_str(&statement.group_by.join(", "));
                }
                if !statement.having.is_empty() {
                    out.push_str("\nHAVING ");
                    out.push_str(&statement.having);
                }
                if !statement.order_by.is_empty() {
                    out.push_str("\nORDER BY ");
                    separated_by(
                        &mut out,
                        &statement.order_by,
                        |out, (column, order)| {
                            let _ = write!(out, "{} {}", column, order);
                        },
                        ", ",
                    );
                }
                if statement.limit.is_some() || statement.offset.is_some() {
                    writer.write_limit(&mut out, statement.limit, statement.offset);
                }
            }
            StatementKind::Insert => {
                out.push_str("INSERT INTO ");
                out.push_str(&statement.table);
                out.push_str(" (");
                separated_by(
                    &mut out,
                    &statement.values,
                    |out, (column, _)| out.push_str(column),
                    ", ",
                );
                out.push_str(")\nVALUES (");
                separated_by(
                    &mut out,
                    &statement.values,
                    |out, (_, placeholder)| out.push_str(placeholder),
                    ", ",
                );
                out.push(')');
            }
            StatementKind::Update => {
                out.push_str("UPDATE ");
                out.push_str(&statement.table);
                out.push_str("\nSET ");
                separated_by(
                    &mut out,
                    &statement.values,
                    |out, (column, placeholder)| {
                        let _ = write!(out, "{} = {}", column, placeholder);
                    },
                    ", ",
                );
                self.write_where(&mut out);
            }
            StatementKind::Delete => {
                out.push_str("DELETE FROM ");
                out.push_str(&statement.table);
                self.write_where(&mut out);
            }
        }
        out
    }

    /// Parameters bound so far, in minting order.
    pub fn parameters(&self) -> &Params {
        &self.params
    }

    fn prepared(&self) -> Result<(String, Params)> {
        if self.statement.table.trim().is_empty() {
            return fail(DatasetError::EmptyStatement);
        }
        let sql = self.sql();
        log::debug!("Query builder statement:\n{}", truncate_long!(sql));
        Ok((sql, self.params.clone()))
    }

    pub async fn fetch_all(&self) -> Result<Vec<Record>> {
        let (sql, params) = self.prepared()?;
        match self
            .connection
            .fetch(sql.clone(), params)
            .map_ok(Record::from)
            .try_collect()
            .await
        {
            Ok(rows) => Ok(rows),
            Err(error) => fail(DatasetError::execution(sql, error)),
        }
    }

    pub async fn fetch_one(&self) -> Result<Option<Record>> {
        Ok(self.fetch_all().await?.into_iter().next())
    }

    /// First column of every row.
    pub async fn fetch_column(&self) -> Result<Vec<Value>> {
        Ok(self
            .fetch_all()
            .await?
            .into_iter()
            .filter_map(|row| row.into_iter().next().map(|(_, v)| v))
            .collect())
    }

    /// First column of the first row.
    pub async fn fetch_scalar(&self) -> Result<Option<Value>> {
        Ok(self.fetch_column().await?.into_iter().next())
    }

    pub async fn execute_statement(&self) -> Result<RowsAffected> {
        let (sql, params) = self.prepared()?;
        match self.connection.execute(sql.clone(), params).await {
            Ok(result) => Ok(result),
            Err(error) => fail(DatasetError::execution(sql, error)),
        }
    }
}
