//! Shared helpers for the lifecycle tests: an in-memory connection that
//! understands the statements models generate.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use pglize::prelude::*;
use pglize_core::{QueryError, QueryErrorKind};

pub fn unwrap_outcome<T>(outcome: Outcome<T, Error>) -> T {
    match outcome {
        Outcome::Ok(v) => v,
        Outcome::Err(e) => panic!("unexpected error: {e}"),
        Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
        Outcome::Panicked(p) => panic!("panicked: {p:?}"),
    }
}

pub fn expect_err<T>(outcome: Outcome<T, Error>) -> Error {
    match outcome {
        Outcome::Err(e) => e,
        Outcome::Ok(_) => panic!("expected an error"),
        Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
        Outcome::Panicked(p) => panic!("panicked: {p:?}"),
    }
}

/// A failure to return from the next statement.
#[derive(Debug, Clone)]
pub struct ScriptedFailure {
    pub sqlstate: Option<String>,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct MockState {
    /// Every statement run, with its parameters.
    pub log: Vec<(String, Vec<Value>)>,
    /// Rows per table, in insertion order.
    pub tables: BTreeMap<String, Vec<Record>>,
    pub next_id: i32,
    pub fail_next: Option<ScriptedFailure>,
}

/// In-memory stand-in for PostgreSQL.
///
/// Handles `INSERT/UPDATE/DELETE ... RETURNING *`, `SELECT * ... WHERE "f"=$1`
/// and treats anything else as DDL.
#[derive(Debug, Clone, Default)]
pub struct MockConnection {
    pub state: Arc<Mutex<MockState>>,
}

impl MockConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> Vec<(String, Vec<Value>)> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn statements(&self) -> Vec<String> {
        self.log().into_iter().map(|(sql, _)| sql).collect()
    }

    pub fn rows(&self, table: &str) -> Vec<Record> {
        self.state
            .lock()
            .unwrap()
            .tables
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn fail_next(&self, sqlstate: Option<&str>, message: &str) {
        self.state.lock().unwrap().fail_next = Some(ScriptedFailure {
            sqlstate: sqlstate.map(str::to_string),
            message: message.to_string(),
        });
    }

    fn run(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let mut state = self.state.lock().unwrap();
        state.log.push((sql.to_string(), params.to_vec()));

        if let Some(failure) = state.fail_next.take() {
            let mut err = QueryError::new(QueryErrorKind::Constraint, sql, failure.message);
            err.sqlstate = failure.sqlstate;
            return Err(Error::Query(err));
        }

        if let Some(rest) = sql.strip_prefix("INSERT INTO ") {
            let (table, rest) = split_table(rest);
            let mut record = Record::new();
            if let Some(cols) = rest.strip_prefix("(") {
                let cols = cols.split(") VALUES").next().unwrap_or_default();
                for (col, value) in cols.split(", ").zip(params) {
                    record.set(col.trim_matches('"'), value.clone());
                }
            }
            if !record.contains("id") {
                state.next_id += 1;
                let id = state.next_id;
                let mut with_id = Record::new().with("id", id);
                for (k, v) in record.iter() {
                    with_id.set(k, v.clone());
                }
                record = with_id;
            }
            state.tables.entry(table).or_default().push(record.clone());
            return Ok(vec![to_row(&record)]);
        }

        if let Some(rest) = sql.strip_prefix("UPDATE ") {
            let (table, rest) = split_table(rest);
            let rest = rest.trim_start_matches("SET ");
            let assignments = rest.split(" WHERE").next().unwrap_or_default();
            let id = params.last().cloned().unwrap_or(Value::Null);
            let rows = state.tables.entry(table).or_default();
            let Some(record) = rows.iter_mut().find(|r| r.get("id") == Some(&id)) else {
                return Ok(Vec::new());
            };
            for (assignment, value) in assignments.split(", ").zip(params) {
                let col = assignment.split('=').next().unwrap_or_default();
                record.set(col.trim_matches('"'), value.clone());
            }
            return Ok(vec![to_row(record)]);
        }

        if let Some(rest) = sql.strip_prefix("DELETE FROM ") {
            let (table, _) = split_table(rest);
            let id = params.first().cloned().unwrap_or(Value::Null);
            let rows = state.tables.entry(table).or_default();
            let Some(pos) = rows.iter().position(|r| r.get("id") == Some(&id)) else {
                return Ok(Vec::new());
            };
            let record = rows.remove(pos);
            return Ok(vec![to_row(&record)]);
        }

        if let Some(rest) = sql.strip_prefix("SELECT * FROM ") {
            let (table, rest) = split_table(rest);
            let field = rest
                .trim_start_matches("WHERE \"")
                .split('"')
                .next()
                .unwrap_or_default();
            let needle = params.first().cloned().unwrap_or(Value::Null);
            let rows = state.tables.get(&table).cloned().unwrap_or_default();
            return Ok(rows
                .iter()
                .filter(|r| r.get(field) == Some(&needle))
                .map(to_row)
                .collect());
        }

        Ok(Vec::new())
    }
}

fn split_table(rest: &str) -> (String, &str) {
    match rest.split_once(' ') {
        Some((table, rest)) => (table.to_string(), rest),
        None => (rest.to_string(), ""),
    }
}

fn to_row(record: &Record) -> Row {
    Row::new(
        record.keys().map(str::to_string).collect(),
        record.values().cloned().collect(),
    )
}

impl Connection for MockConnection {
    fn query(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<Vec<Row>, Error>> + Send {
        let result = self.run(sql, params);
        async move {
            match result {
                Ok(rows) => Outcome::Ok(rows),
                Err(e) => Outcome::Err(e),
            }
        }
    }

    fn execute(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> impl Future<Output = Outcome<u64, Error>> + Send {
        let result = self.run(sql, params);
        async move {
            match result {
                Ok(rows) => Outcome::Ok(rows.len() as u64),
                Err(e) => Outcome::Err(e),
            }
        }
    }
}

/// `{email: varchar required unique, credit: integer default 100, >= 100}`
pub fn user_schema() -> Schema {
    use pglize::types::{INTEGER, VARCHAR};

    Schema::new()
        .field("email", FieldDef::new(VARCHAR).required().unique())
        .field(
            "credit",
            FieldDef::new(INTEGER)
                .default_value(100)
                .validate(|v| v.as_i64().is_some_and(|n| n >= 100)),
        )
}
