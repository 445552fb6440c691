mod errors;
mod master_detail;
mod navigation;
mod query_builder;
mod stored_proc;
mod table_crud;
mod transactions;

use crate::{
    errors::errors, master_detail::master_detail, navigation::navigation,
    query_builder::query_builder, table_crud::table_crud,
};
use log::LevelFilter;
use recordset::{Connection, Params};
use std::{env, sync::Arc};

#[cfg(not(feature = "disable-table-functions"))]
use stored_proc::stored_proc;
#[cfg(not(feature = "disable-transactions"))]
use transactions::transactions;

pub fn init_logs() {
    let mut logger = env_logger::builder();
    logger
        .is_test(true)
        .format_file(true)
        .format_line_number(true);
    if env::var("RUST_LOG").is_err() {
        logger.filter_level(LevelFilter::Warn);
    }
    let _ = logger.try_init();
}

pub async fn execute_tests<C: Connection + 'static>(connection: C) {
    let connection = Arc::new(connection);
    navigation(&connection).await;
    table_crud(&connection).await;
    master_detail(&connection).await;
    query_builder(&connection).await;
    errors(&connection).await;
    #[cfg(not(feature = "disable-table-functions"))]
    stored_proc(&connection).await;
    #[cfg(not(feature = "disable-transactions"))]
    transactions(&connection).await;
}

/// Run each statement in order, panicking on the first failure.
pub async fn setup<C: Connection>(connection: &C, statements: &[&str]) {
    for statement in statements {
        connection
            .execute((*statement).to_owned(), Params::new())
            .await
            .unwrap_or_else(|e| panic!("Failed to run setup statement `{}`: {:#}", statement, e));
    }
}

#[macro_export]
macro_rules! silent_logs {
    ($($code:tt)+) => {{
        let level = log::max_level();
        log::set_max_level(log::LevelFilter::Off);
        let result = { $($code)+ };
        log::set_max_level(level);
        result
    }};
}
