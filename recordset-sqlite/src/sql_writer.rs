use recordset_core::SqlWriter;

#[derive(Default, Debug, Clone, Copy)]
pub struct SqliteSqlWriter {}

impl SqlWriter for SqliteSqlWriter {
    fn write_value_bool(&self, out: &mut String, value: bool) {
        out.push(if value { '1' } else { '0' });
    }

    fn write_value_infinity(&self, out: &mut String, negative: bool) {
        if negative {
            out.push('-');
        }
        out.push_str("1.0e+10000");
    }

    // Sqlite stores NaN as NULL
    fn write_value_nan(&self, out: &mut String) {
        out.push_str("NULL");
    }

    fn write_limit(&self, out: &mut String, limit: Option<u64>, offset: Option<u64>) {
        let len = out
            .trim_end_matches(|c: char| c.is_whitespace() || c == ';')
            .len();
        out.truncate(len);
        match (limit, offset) {
            (Some(limit), offset) => {
                out.push_str("\nLIMIT ");
                out.push_str(itoa::Buffer::new().format(limit));
                if let Some(offset) = offset {
                    out.push_str("\nOFFSET ");
                    out.push_str(itoa::Buffer::new().format(offset));
                }
            }
            (None, Some(offset)) => {
                out.push_str("\nLIMIT -1\nOFFSET ");
                out.push_str(itoa::Buffer::new().format(offset));
            }
            (None, None) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SqliteSqlWriter;
    use recordset_core::{SqlWriter, Value};

    const WRITER: SqliteSqlWriter = SqliteSqlWriter {};

    #[test]
    fn offset_without_limit() {
        let mut out = String::from("SELECT * FROM \"t\";");
        WRITER.write_limit(&mut out, None, Some(5));
        assert_eq!(out, "SELECT * FROM \"t\"\nLIMIT -1\nOFFSET 5");
        let mut out = String::from("SELECT 1");
        WRITER.write_limit(&mut out, Some(3), None);
        assert_eq!(out, "SELECT 1\nLIMIT 3");
    }

    #[test]
    fn special_values() {
        let mut out = String::new();
        WRITER.write_value(&mut out, &Value::Float(f64::NEG_INFINITY));
        out.push(' ');
        WRITER.write_value(&mut out, &Value::Float(f64::NAN));
        out.push(' ');
        WRITER.write_value(&mut out, &Value::Boolean(true));
        out.push(' ');
        WRITER.write_value(&mut out, &Value::Blob(vec![0x0A, 0xFF].into()));
        assert_eq!(out, "-1.0e+10000 NULL 1 X'0AFF'");
    }
}
