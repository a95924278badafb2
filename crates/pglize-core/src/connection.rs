//! Database connection traits.
//!
//! - [`Connection`] is what a driver implements: run a statement, get rows
//!   or a row count.
//! - [`Database`] is the facade models talk to: `one`, `any` and `none`.
//!   It is object-safe so a model can hold `Arc<dyn Database>`; every
//!   `Connection` gets it through a blanket impl.
//!
//! SQL uses positional `$n` placeholders. All operations take the asupersync
//! `Cx` so cancellation reaches the driver.

use std::future::Future;
use std::pin::Pin;

use asupersync::{Cx, Outcome};

use crate::error::{Error, QueryError, QueryErrorKind};
use crate::row::Row;
use crate::value::Value;

/// A boxed, sendable future borrowing for `'a`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A database connection as seen by drivers.
pub trait Connection: Send + Sync {
    /// Execute a query and return all rows.
    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send;

    /// Execute a statement and return rows affected.
    fn execute(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send;
}

/// The three operations models depend on.
pub trait Database: Send + Sync {
    /// Run `sql` and return its single row. Zero or several rows is an error.
    fn one<'a>(
        &'a self,
        cx: &'a Cx,
        sql: &'a str,
        params: &'a [Value],
    ) -> BoxFuture<'a, Outcome<Row, Error>>;

    /// Run `sql` and return every row.
    fn any<'a>(
        &'a self,
        cx: &'a Cx,
        sql: &'a str,
        params: &'a [Value],
    ) -> BoxFuture<'a, Outcome<Vec<Row>, Error>>;

    /// Run `sql`, discarding any result.
    fn none<'a>(
        &'a self,
        cx: &'a Cx,
        sql: &'a str,
        params: &'a [Value],
    ) -> BoxFuture<'a, Outcome<(), Error>>;
}

/// Enforce the exactly-one-row contract of [`Database::one`].
pub fn expect_one(sql: &str, rows: Vec<Row>) -> Result<Row, Error> {
    let count = rows.len();
    let mut rows = rows.into_iter();
    match (rows.next(), count) {
        (Some(row), 1) => Ok(row),
        (None, _) => Err(Error::Query(QueryError::new(
            QueryErrorKind::RowCount,
            sql,
            "Expected one row, found none",
        ))),
        (Some(_), n) => Err(Error::Query(QueryError::new(
            QueryErrorKind::RowCount,
            sql,
            format!("Expected one row, found {}", n),
        ))),
    }
}

impl<C: Connection> Database for C {
    fn one<'a>(
        &'a self,
        cx: &'a Cx,
        sql: &'a str,
        params: &'a [Value],
    ) -> BoxFuture<'a, Outcome<Row, Error>> {
        Box::pin(async move {
            match self.query(cx, sql, params).await {
                Outcome::Ok(rows) => match expect_one(sql, rows) {
                    Ok(row) => Outcome::Ok(row),
                    Err(e) => {
                        tracing::debug!(sql = sql, error = %e, "one: row count mismatch");
                        Outcome::Err(e)
                    }
                },
                Outcome::Err(e) => Outcome::Err(e),
                Outcome::Cancelled(r) => Outcome::Cancelled(r),
                Outcome::Panicked(p) => Outcome::Panicked(p),
            }
        })
    }

    fn any<'a>(
        &'a self,
        cx: &'a Cx,
        sql: &'a str,
        params: &'a [Value],
    ) -> BoxFuture<'a, Outcome<Vec<Row>, Error>> {
        Box::pin(self.query(cx, sql, params))
    }

    fn none<'a>(
        &'a self,
        cx: &'a Cx,
        sql: &'a str,
        params: &'a [Value],
    ) -> BoxFuture<'a, Outcome<(), Error>> {
        Box::pin(async move { self.execute(cx, sql, params).await.map(|_| ()) })
    }
}
