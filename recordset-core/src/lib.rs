mod connection;
mod cursor;
mod data_source;
mod dataset;
mod driver;
mod error;
mod events;
mod query;
mod query_builder;
mod record;
mod row;
mod selection;
mod sql_writer;
mod stored_proc;
mod table;
mod util;
mod value;

pub use ::anyhow::Context;
pub use connection::*;
pub use cursor::*;
pub use data_source::*;
pub use dataset::{Dataset, base_attribute};
pub use driver::*;
pub use error::DatasetError;
pub use events::*;
pub use query::Query;
pub use query_builder::*;
pub use record::*;
pub use row::*;
pub use selection::*;
pub use sql_writer::*;
pub use stored_proc::*;
pub use table::*;
pub use util::*;
pub use value::*;
pub mod stream {
    pub use ::futures::stream::*;
}
pub use ::futures::future;

pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;
