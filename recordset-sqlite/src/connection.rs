use crate::{
    CBox, SqliteDriver, error_message_from_ptr,
    extract::{extract_name, extract_value},
};
use libsqlite3_sys::{
    SQLITE_BUSY, SQLITE_DONE, SQLITE_OK, SQLITE_OPEN_CREATE, SQLITE_OPEN_FULLMUTEX,
    SQLITE_OPEN_READWRITE, SQLITE_OPEN_URI, SQLITE_ROW, SQLITE_TRANSIENT, sqlite3,
    sqlite3_bind_blob, sqlite3_bind_double, sqlite3_bind_int64, sqlite3_bind_null,
    sqlite3_bind_parameter_index, sqlite3_bind_text, sqlite3_changes, sqlite3_close,
    sqlite3_column_count, sqlite3_errmsg, sqlite3_finalize, sqlite3_last_insert_rowid,
    sqlite3_open_v2, sqlite3_prepare_v2, sqlite3_sql, sqlite3_step, sqlite3_stmt,
    sqlite3_stmt_readonly, sqlite3_total_changes,
};
use recordset_core::{
    Connection, Context, Driver, Error, Index, Params, QueryResult, Result, RowLabeled,
    RowNames, RowsAffected, Value,
    future::TryFutureExt,
    stream::{self, Stream, TryStreamExt},
    truncate_long,
};
use std::{
    borrow::Cow,
    ffi::{CStr, CString, c_char, c_int, c_void},
    ptr,
    sync::{Arc, Mutex},
};
use tokio::task::spawn_blocking;

/// Connection to a sqlite database.
///
/// The handle is opened in serialized mode and guarded by a mutex, every
/// statement runs on the blocking thread pool.
pub struct SqliteConnection {
    pub(crate) connection: Arc<Mutex<CBox<*mut sqlite3>>>,
}

fn last_error(connection: *mut sqlite3) -> Error {
    Error::msg(error_message_from_ptr(unsafe { sqlite3_errmsg(connection) }))
}

/// Bind every parameter the statement declares, trying the `:`, `@` and `$` prefixes.
/// Parameters the statement does not reference are skipped.
unsafe fn bind_params(statement: *mut sqlite3_stmt, params: &Params) -> Result<()> {
    unsafe {
        for (name, value) in params.iter() {
            let candidates: Vec<String> = if name.starts_with([':', '@', '$']) {
                vec![name.to_owned()]
            } else {
                [':', '@', '$']
                    .iter()
                    .map(|prefix| format!("{}{}", prefix, name))
                    .collect()
            };
            let mut index = 0;
            for candidate in candidates {
                let candidate = CString::new(candidate)
                    .with_context(|| format!("Invalid parameter name `{}`", name))?;
                index = sqlite3_bind_parameter_index(statement, candidate.as_ptr());
                if index > 0 {
                    break;
                }
            }
            if index == 0 {
                continue;
            }
            let rc = match value {
                Value::Null => sqlite3_bind_null(statement, index),
                Value::Boolean(v) => sqlite3_bind_int64(statement, index, *v as i64),
                Value::Integer(v) => sqlite3_bind_int64(statement, index, *v),
                Value::Float(v) => sqlite3_bind_double(statement, index, *v),
                Value::Text(v) => sqlite3_bind_text(
                    statement,
                    index,
                    v.as_ptr() as *const c_char,
                    v.len() as c_int,
                    SQLITE_TRANSIENT(),
                ),
                Value::Blob(v) => sqlite3_bind_blob(
                    statement,
                    index,
                    v.as_ptr() as *const c_void,
                    v.len() as c_int,
                    SQLITE_TRANSIENT(),
                ),
            };
            if rc != SQLITE_OK {
                return Err(Error::msg(format!(
                    "Could not bind the parameter `{}` (error code {})",
                    name, rc
                )));
            }
        }
        Ok(())
    }
}

fn first_keyword(sql: &str) -> String {
    sql.trim_start()
        .split(|c: char| !c.is_ascii_alphabetic())
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase()
}

/// Run every statement of `sql` in order, collecting rows and modify effects.
unsafe fn execute_all(
    connection: *mut sqlite3,
    sql: &str,
    params: &Params,
) -> Result<Vec<QueryResult>> {
    unsafe {
        let sql = CString::new(sql).context("The statement contains a nul character")?;
        let mut tail: *const c_char = sql.as_ptr();
        let mut results = Vec::new();
        while *tail != 0 {
            let mut statement = CBox::new(ptr::null_mut(), |p| {
                sqlite3_finalize(p);
            });
            let mut next = ptr::null();
            let rc = sqlite3_prepare_v2(connection, tail, -1, &mut *statement, &mut next);
            if rc != SQLITE_OK {
                return Err(last_error(connection));
            }
            tail = next;
            if statement.is_null() {
                // Whitespace or comment only
                continue;
            }
            bind_params(*statement, params)?;
            let count = sqlite3_column_count(*statement);
            let labels = (0..count)
                .map(|i| extract_name(*statement, i))
                .collect::<Result<RowNames>>()?;
            let total_before = sqlite3_total_changes(connection);
            loop {
                match sqlite3_step(*statement) {
                    SQLITE_BUSY => continue,
                    SQLITE_DONE => break,
                    SQLITE_ROW => results.push(QueryResult::Row(RowLabeled::new(
                        labels.clone(),
                        (0..count)
                            .map(|i| extract_value(*statement, i))
                            .collect::<Result<_>>()?,
                    ))),
                    _ => return Err(last_error(connection)),
                }
            }
            if sqlite3_stmt_readonly(*statement) != 0 {
                continue;
            }
            let text = CStr::from_ptr(sqlite3_sql(*statement)).to_string_lossy();
            let keyword = first_keyword(&text);
            let rows_affected = match keyword.as_str() {
                "INSERT" | "UPDATE" | "DELETE" | "REPLACE" => sqlite3_changes(connection) as u64,
                _ => (sqlite3_total_changes(connection) - total_before).max(0) as u64,
            };
            let last_affected_id = (matches!(keyword.as_str(), "INSERT" | "REPLACE")
                && rows_affected > 0)
                .then(|| sqlite3_last_insert_rowid(connection));
            results.push(QueryResult::Affected(RowsAffected {
                rows_affected,
                last_affected_id,
            }));
        }
        Ok(results)
    }
}

impl SqliteConnection {
    async fn fetch_pragma(&self, sql: &str, value: &str) -> Result<Vec<Vec<Value>>> {
        let mut params = Params::new();
        params.set("p1", value);
        self.fetch(sql.to_owned(), params)
            .map_ok(|row| row.values.into_vec())
            .try_collect()
            .await
    }
}

impl Connection for SqliteConnection {
    type Driver = SqliteDriver;

    #[allow(refining_impl_trait)]
    async fn connect(url: Cow<'static, str>) -> Result<SqliteConnection> {
        let prefix = format!("{}://", <Self::Driver as Driver>::NAME);
        if !url.starts_with(&prefix) {
            let error = Error::msg(format!(
                "Expected sqlite connection url to start with `{}`",
                &prefix
            ));
            log::error!("{:#}", error);
            return Err(error);
        }
        let location = url.trim_start_matches(&prefix);
        let location = if location.starts_with("file:") {
            Cow::Borrowed(location)
        } else {
            Cow::Owned(format!("file:{}", location))
        };
        let context = || format!("Error while decoding connection URL: `{}`", url);
        let location = CString::new(location.as_bytes()).with_context(context)?;
        let mut connection = CBox::new(ptr::null_mut(), |p| {
            unsafe { sqlite3_close(p) };
        });
        let rc = unsafe {
            sqlite3_open_v2(
                location.as_ptr(),
                &mut *connection,
                SQLITE_OPEN_URI
                    | SQLITE_OPEN_READWRITE
                    | SQLITE_OPEN_CREATE
                    | SQLITE_OPEN_FULLMUTEX,
                ptr::null(),
            )
        };
        if rc != SQLITE_OK {
            let error = if connection.is_null() {
                Error::msg("Could not allocate the sqlite connection")
            } else {
                last_error(*connection)
            }
            .context(format!("While opening the database `{}`", url));
            log::error!("{:#}", error);
            return Err(error);
        }
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    fn driver(&self) -> &Self::Driver {
        &SqliteDriver {}
    }

    fn run(&self, sql: String, params: Params) -> impl Stream<Item = Result<QueryResult>> + Send {
        let connection = self.connection.clone();
        async move {
            let context = format!("While executing the query:\n{}", truncate_long!(sql));
            let results = spawn_blocking(move || {
                let connection = connection
                    .lock()
                    .map_err(|_| Error::msg("The sqlite connection mutex is poisoned"))?;
                unsafe { execute_all(**connection, &sql, &params) }
            })
            .await?
            .context(context)
            .inspect_err(|e| log::error!("{:#}", e))?;
            Ok::<_, Error>(stream::iter(results.into_iter().map(Ok)))
        }
        .try_flatten_stream()
    }

    async fn last_insert_id(&self) -> Result<Option<i64>> {
        let connection = self
            .connection
            .lock()
            .map_err(|_| Error::msg("The sqlite connection mutex is poisoned"))?;
        let id = unsafe { sqlite3_last_insert_rowid(**connection) };
        Ok((id != 0).then_some(id))
    }

    async fn indexes(&self, table: &str, primary_only: bool) -> Result<Vec<Index>> {
        let mut result = Vec::new();
        let list = self
            .fetch_pragma(
                "SELECT name, \"unique\", origin FROM pragma_index_list(:p1) ORDER BY seq",
                table,
            )
            .await?;
        for row in list {
            let [name, unique, origin] = row.as_slice() else {
                continue;
            };
            let name = name.to_string();
            let primary = origin.as_str() == Some("pk");
            if primary_only && !primary {
                continue;
            }
            let columns = self
                .fetch_pragma(
                    "SELECT name FROM pragma_index_info(:p1) ORDER BY seqno",
                    &name,
                )
                .await?
                .into_iter()
                .filter_map(|v| v.into_iter().next())
                .map(|v| v.to_string())
                .collect();
            result.push(Index {
                name,
                columns,
                primary,
                unique: unique.as_bool().unwrap_or(false),
            });
        }
        if !result.iter().any(|v| v.primary) {
            // A rowid alias (INTEGER PRIMARY KEY) has no index entry
            let columns: Vec<String> = self
                .fetch_pragma(
                    "SELECT name FROM pragma_table_info(:p1) WHERE pk > 0 ORDER BY pk",
                    table,
                )
                .await?
                .into_iter()
                .filter_map(|v| v.into_iter().next())
                .map(|v| v.to_string())
                .collect();
            if !columns.is_empty() {
                result.insert(
                    0,
                    Index {
                        name: "primary".into(),
                        columns,
                        primary: true,
                        unique: true,
                    },
                );
            }
        }
        Ok(result)
    }

    async fn column_names(&self, table: &str) -> Result<Vec<String>> {
        Ok(self
            .fetch_pragma(
                "SELECT name FROM pragma_table_info(:p1) ORDER BY cid",
                table,
            )
            .await?
            .into_iter()
            .filter_map(|v| v.into_iter().next())
            .map(|v| v.to_string())
            .collect())
    }
}
