use crate::DatasetState;
use thiserror::Error;

/// Failures raised by datasets and the query builder.
///
/// They travel inside an [`Error`](crate::Error) like every other failure of the
/// crate, match on them with `error.downcast_ref::<DatasetError>()`.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// An operation requiring SQL execution was invoked with no connection bound.
    #[error("No connection is bound to the dataset")]
    NoConnection,

    /// The statement resolved to a blank string.
    #[error("The statement to execute is empty")]
    EmptyStatement,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The backend rejected the statement.
    #[error("Error while executing the query:\n{sql}")]
    ExecutionFailure {
        sql: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("The dataset is not active")]
    NotActive,

    #[error("Cannot {operation} while the dataset is in {state} state")]
    InvalidState {
        operation: &'static str,
        state: DatasetState,
    },

    #[error("The dataset has no current record")]
    NoCurrentRecord,

    /// Updating or deleting a row needs key fields to address it.
    #[error("Table `{0}` has no key fields to identify the current record")]
    MissingKeyFields(String),
}

impl DatasetError {
    pub fn execution(sql: impl Into<String>, source: crate::Error) -> Self {
        DatasetError::ExecutionFailure {
            sql: sql.into(),
            source: source.into(),
        }
    }
}

/// Log `error` and return it wrapped.
pub(crate) fn fail<T>(error: DatasetError) -> crate::Result<T> {
    let error = crate::Error::new(error);
    log::error!("{:#}", error);
    Err(error)
}
