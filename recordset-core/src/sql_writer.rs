use crate::{
    CallStyle, JoinType, Order, Params, Record, Value, contains_keyword, separated_by,
};
use std::fmt::Write;

macro_rules! write_integer {
    ($out:ident, $value:expr) => {{
        let mut buffer = itoa::Buffer::new();
        $out.push_str(buffer.format($value));
    }};
}

/// Dialect printer converting dataset operations into concrete SQL strings.
///
/// Every method has a default rendering close to standard SQL, drivers override
/// the fragments their backend spells differently.
pub trait SqlWriter: Send + Sync {
    /// Escape occurrences of `search` char with `replace` while copying into buffer.
    fn write_escaped(&self, out: &mut String, value: &str, search: char, replace: &str) {
        let mut position = 0;
        for (i, c) in value.char_indices() {
            if c == search {
                out.push_str(&value[position..i]);
                out.push_str(replace);
                position = i + c.len_utf8();
            }
        }
        out.push_str(&value[position..]);
    }

    /// Quote identifiers ("name") doubling inner quotes, each dot separated segment on its own.
    fn write_identifier_quoted(&self, out: &mut String, value: &str) {
        separated_by(
            out,
            value.split('.'),
            |out, segment| {
                out.push('"');
                self.write_escaped(out, segment, '"', "\"\"");
                out.push('"');
            },
            ".",
        );
    }

    /// Render a concrete value (including proper quoting / escaping).
    fn write_value(&self, out: &mut String, value: &Value) {
        match value {
            Value::Null => self.write_value_none(out),
            Value::Boolean(v) => self.write_value_bool(out, *v),
            Value::Integer(v) => write_integer!(out, *v),
            Value::Float(v) => self.write_value_float(out, *v),
            Value::Text(v) => self.write_value_string(out, v),
            Value::Blob(v) => self.write_value_blob(out, v),
        }
    }

    fn write_value_none(&self, out: &mut String) {
        out.push_str("NULL");
    }

    fn write_value_bool(&self, out: &mut String, value: bool) {
        out.push_str(["false", "true"][value as usize]);
    }

    fn write_value_float(&self, out: &mut String, value: f64) {
        if value.is_infinite() {
            self.write_value_infinity(out, value.is_sign_negative());
        } else if value.is_nan() {
            self.write_value_nan(out);
        } else {
            let mut buffer = ryu::Buffer::new();
            out.push_str(buffer.format(value));
        }
    }

    fn write_value_infinity(&self, out: &mut String, negative: bool) {
        out.push_str(if negative {
            "CAST('-Infinity' AS DOUBLE PRECISION)"
        } else {
            "CAST('Infinity' AS DOUBLE PRECISION)"
        });
    }

    fn write_value_nan(&self, out: &mut String) {
        out.push_str("CAST('NaN' AS DOUBLE PRECISION)");
    }

    /// Render and escape a string literal using single quotes.
    fn write_value_string(&self, out: &mut String, value: &str) {
        out.push('\'');
        self.write_escaped(out, value, '\'', "''");
        out.push('\'');
    }

    /// Render a blob literal using hex escapes.
    fn write_value_blob(&self, out: &mut String, value: &[u8]) {
        out.push_str("X'");
        out.push_str(&hex::encode_upper(value));
        out.push('\'');
    }

    /// Render the placeholder of the named parameter `name`.
    fn write_parameter(&self, out: &mut String, name: &str) {
        out.push(':');
        out.push_str(name);
    }

    /// Append the pagination clause, dropping any statement terminator first.
    fn write_limit(&self, out: &mut String, limit: Option<u64>, offset: Option<u64>) {
        let len = out
            .trim_end_matches(|c: char| c.is_whitespace() || c == ';')
            .len();
        out.truncate(len);
        if let Some(limit) = limit {
            out.push_str("\nLIMIT ");
            write_integer!(out, limit);
        }
        if let Some(offset) = offset {
            out.push_str("\nOFFSET ");
            write_integer!(out, offset);
        }
    }

    fn write_order(&self, out: &mut String, column: &str, order: Order) {
        out.push_str("\nORDER BY ");
        self.write_identifier_quoted(out, column);
        out.push(' ');
        out.push_str(order.as_str());
    }

    /// Merge `conditions` into the statement: as the WHERE clause, or ANDed onto the
    /// one the statement already has.
    fn write_conditions(&self, out: &mut String, conditions: &[String]) {
        if conditions.is_empty() {
            return;
        }
        if contains_keyword(out, "WHERE") {
            for condition in conditions {
                let _ = write!(out, "\nAND ({})", condition);
            }
            return;
        }
        out.push_str("\nWHERE ");
        if let [condition] = conditions {
            out.push_str(condition);
        } else {
            separated_by(
                out,
                conditions,
                |out, v| {
                    let _ = write!(out, "({})", v);
                },
                " AND ",
            );
        }
    }

    /// Render join keyword(s) for the given join type.
    fn write_join_type(&self, out: &mut String, join_type: JoinType) {
        out.push_str(match join_type {
            JoinType::Default => "JOIN",
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
            JoinType::Full => "FULL OUTER JOIN",
            JoinType::Cross => "CROSS JOIN",
        });
    }

    fn write_select_all(&self, out: &mut String, table: &str) {
        out.push_str("SELECT *\nFROM ");
        self.write_identifier_quoted(out, table);
    }

    /// Render `"column" = :pN` for every key, binding the values into `params`.
    fn write_key_condition(&self, out: &mut String, keys: &Record, params: &mut Params) {
        separated_by(
            out,
            keys.iter(),
            |out, (column, value)| {
                self.write_identifier_quoted(out, column);
                if value.is_null() {
                    out.push_str(" IS NULL");
                } else {
                    out.push_str(" = ");
                    let name = params.bind(value.clone());
                    self.write_parameter(out, &name);
                }
            },
            " AND ",
        );
    }

    fn write_insert(&self, out: &mut String, table: &str, row: &Record, params: &mut Params) {
        out.push_str("INSERT INTO ");
        self.write_identifier_quoted(out, table);
        if row.is_empty() {
            out.push_str(" DEFAULT VALUES");
            return;
        }
        out.push_str(" (");
        separated_by(
            out,
            row.names(),
            |out, v| self.write_identifier_quoted(out, v),
            ", ",
        );
        out.push_str(")\nVALUES (");
        separated_by(
            out,
            row.values(),
            |out, v| {
                let name = params.bind(v.clone());
                self.write_parameter(out, &name);
            },
            ", ",
        );
        out.push(')');
    }

    fn write_update(
        &self,
        out: &mut String,
        table: &str,
        values: &Record,
        keys: &Record,
        params: &mut Params,
    ) {
        out.push_str("UPDATE ");
        self.write_identifier_quoted(out, table);
        out.push_str("\nSET ");
        separated_by(
            out,
            values.iter(),
            |out, (column, value)| {
                self.write_identifier_quoted(out, column);
                out.push_str(" = ");
                let name = params.bind(value.clone());
                self.write_parameter(out, &name);
            },
            ", ",
        );
        out.push_str("\nWHERE ");
        self.write_key_condition(out, keys, params);
    }

    fn write_delete(&self, out: &mut String, table: &str, keys: &Record, params: &mut Params) {
        out.push_str("DELETE FROM ");
        self.write_identifier_quoted(out, table);
        out.push_str("\nWHERE ");
        self.write_key_condition(out, keys, params);
    }

    fn write_transaction_begin(&self, out: &mut String) {
        out.push_str("BEGIN;");
    }

    fn write_transaction_commit(&self, out: &mut String) {
        out.push_str("COMMIT;");
    }

    fn write_transaction_rollback(&self, out: &mut String) {
        out.push_str("ROLLBACK;");
    }

    /// Render the invocation of a stored procedure with literal arguments.
    fn write_procedure_call(
        &self,
        out: &mut String,
        style: CallStyle,
        name: &str,
        args: &[Value],
        extra_fetch: Option<&str>,
    ) {
        let write_args = |out: &mut String| {
            out.push_str(name);
            out.push('(');
            separated_by(out, args, |out, v| self.write_value(out, v), ", ");
            out.push(')');
        };
        match style {
            CallStyle::Block => {
                out.push_str("BEGIN ");
                write_args(out);
                out.push_str("; END;");
            }
            CallStyle::Call => {
                out.push_str("CALL ");
                write_args(out);
                if let Some(extra) = extra_fetch.map(str::trim).filter(|v| !v.is_empty()) {
                    out.push_str("; ");
                    out.push_str(extra);
                }
            }
            CallStyle::TableFunction => {
                out.push_str("SELECT * FROM ");
                write_args(out);
            }
        }
    }
}

/// Fallback generic SQL writer (closest to PostgreSQL conventions).
#[derive(Default, Debug, Clone, Copy)]
pub struct GenericSqlWriter;

impl GenericSqlWriter {
    pub const fn new() -> Self {
        Self {}
    }
}

impl SqlWriter for GenericSqlWriter {}
