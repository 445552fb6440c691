pub fn separated_by<T, F>(
    out: &mut String,
    values: impl IntoIterator<Item = T>,
    mut f: F,
    separator: &str,
) where
    F: FnMut(&mut String, T),
{
    let mut len = out.len();
    for v in values {
        if out.len() > len {
            out.push_str(separator);
        }
        len = out.len();
        f(out, v);
    }
}

/// Whether `sql` contains `keyword` as a standalone word, ignoring case.
///
/// Quoted identifiers and string literals are skipped, so `WHERE` inside `'somewhere'`
/// or `"where"` does not count.
pub fn contains_keyword(sql: &str, keyword: &str) -> bool {
    let mut quote: Option<char> = None;
    let mut word = String::new();
    for c in sql.chars().chain(std::iter::once(' ')) {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        if c.is_alphanumeric() || c == '_' {
            word.push(c);
            continue;
        }
        if word.eq_ignore_ascii_case(keyword) {
            return true;
        }
        word.clear();
        if matches!(c, '\'' | '"' | '`') {
            quote = Some(c);
        }
    }
    false
}

/// Truncate the sql for log messages, keeping char boundaries.
pub fn truncate_sql(sql: &str) -> &str {
    const MAX: usize = 497;
    if sql.len() <= MAX {
        return sql.trim_end();
    }
    let mut end = MAX;
    while !sql.is_char_boundary(end) {
        end -= 1;
    }
    sql[..end].trim_end()
}

#[macro_export]
macro_rules! truncate_long {
    ($query:expr) => {
        format_args!(
            "{}{}\n",
            $crate::truncate_sql(&$query),
            if $query.len() > 497 { "..." } else { "" },
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_detection() {
        assert!(contains_keyword("SELECT * FROM t where id = 1", "WHERE"));
        assert!(contains_keyword("select *\nfrom t\nWHERE\tx", "where"));
        assert!(!contains_keyword("SELECT nowhere FROM t", "WHERE"));
        assert!(!contains_keyword("SELECT 'where' FROM t", "WHERE"));
        assert!(!contains_keyword("SELECT \"where\" FROM t", "WHERE"));
        assert!(!contains_keyword("SELECT where_clause FROM t", "WHERE"));
    }

    #[test]
    fn truncate_keeps_boundaries() {
        let sql = "é".repeat(400);
        let truncated = truncate_sql(&sql);
        assert!(truncated.len() <= 497);
        assert!(sql.starts_with(truncated));
    }
}
