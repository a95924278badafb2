//! Table generation and sync for pglize models.
//!
//! - `gen_table` renders a schema as `CREATE TABLE` with bound defaults
//! - `drop_table_sql` renders `DROP TABLE`
//! - `sync_table` drops and recreates a model's table on request

pub mod create;

pub use create::{CreateTable, GeneratedTable, gen_table};

use asupersync::{Cx, Outcome};
use pglize_core::{Database, Schema, quote_ident};

/// Generate DROP TABLE SQL.
pub fn drop_table_sql(table_name: &str, if_exists: bool) -> String {
    if if_exists {
        format!("DROP TABLE IF EXISTS {}", quote_ident(table_name))
    } else {
        format!("DROP TABLE {}", quote_ident(table_name))
    }
}

/// Drop a table.
pub async fn drop_table(
    cx: &Cx,
    db: &dyn Database,
    table_name: &str,
    if_exists: bool,
) -> Outcome<(), pglize_core::Error> {
    let sql = drop_table_sql(table_name, if_exists);
    tracing::debug!(table = table_name, sql = %sql, "dropping table");
    db.none(cx, &sql, &[]).await
}

/// Create a table from `schema`, binding column defaults as parameters.
///
/// PostgreSQL does not accept bind parameters in DDL, so the connection
/// must format `$k` defaults into the text client-side before sending it.
/// The table name is quoted here, which preserves its case; CRUD statements
/// use it verbatim and unquoted, so mixed-case names resolve differently.
pub async fn create_table(
    cx: &Cx,
    db: &dyn Database,
    table_name: &str,
    schema: &Schema,
) -> Outcome<(), pglize_core::Error> {
    let table = gen_table(table_name, schema);
    let params = table.params();
    tracing::debug!(
        table = table_name,
        sql = %table.query,
        defaults = params.len(),
        "creating table"
    );
    db.none(cx, &table.query, &params).await
}

/// Recreate a table when `force` is set; otherwise do nothing.
///
/// The `CREATE TABLE` step has the parameter and quoting caveats of
/// [`create_table`].
#[tracing::instrument(level = "debug", skip(cx, db, schema))]
pub async fn sync_table(
    cx: &Cx,
    db: &dyn Database,
    table_name: &str,
    schema: &Schema,
    force: bool,
) -> Outcome<(), pglize_core::Error> {
    if !force {
        return Outcome::Ok(());
    }

    match drop_table(cx, db, table_name, true).await {
        Outcome::Ok(()) => {}
        Outcome::Err(e) => return Outcome::Err(e),
        Outcome::Cancelled(r) => return Outcome::Cancelled(r),
        Outcome::Panicked(p) => return Outcome::Panicked(p),
    }
    create_table(cx, db, table_name, schema).await
}
