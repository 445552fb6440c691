//! Cursor based datasets over SQL connections.
//!
//! A [`Query`] wraps an arbitrary statement, a [`Table`] a single table with
//! Insert, Edit and Delete translated back into SQL, a [`StoredProc`] a procedure
//! call in the syntax of the connection dialect. All of them materialize the
//! whole result in memory and expose the classic record navigation API
//! (`first`, `next`, `prior`, `last`, `field_by_name`, `edit`, `post`, ...)
//! through the [`Dataset`] trait. [`QueryBuilder`] assembles parameterized
//! statements for ad hoc queries.
//!
//! Backends implement [`Connection`], [`Driver`] and [`SqlWriter`], see the
//! `recordset-sqlite` crate.
pub use recordset_core::*;
