//! Entity instances and their persistence lifecycle.

use std::fmt;

use pglize_core::{
    Cx, Error, InstanceError, Outcome, Record, Result, Row, ValidationError, Value,
};

use crate::model::ModelType;
use crate::options::{DeleteOptions, Hook};

/// One entity of a [`ModelType`].
///
/// Holds the visible fields and, separately, the last row image confirmed by
/// the database. The instance counts as saved while that snapshot has an id.
pub struct Instance {
    model: ModelType,
    fields: Record,
    snapshot: Record,
}

impl Instance {
    pub(crate) fn new(model: ModelType, fields: Record) -> Self {
        Self {
            model,
            fields,
            snapshot: Record::new(),
        }
    }

    pub fn model(&self) -> &ModelType {
        &self.model
    }

    /// Visible fields.
    pub fn fields(&self) -> &Record {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Set a visible field, returning the previous value.
    ///
    /// Any key is accepted here; sanitizing only happens on construction and
    /// on `update`.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.set(name, value)
    }

    /// Whether the database has confirmed this instance under an id.
    pub fn is_saved(&self) -> bool {
        self.snapshot.get("id").is_some_and(|id| !id.is_null())
    }

    /// The persisted snapshot.
    pub fn selfie(&self) -> &Record {
        &self.snapshot
    }

    /// Visible fields as a JSON object.
    pub fn to_json(&self) -> serde_json::Value {
        self.fields.to_json()
    }

    /// Check `candidate` against the schema.
    ///
    /// Present values get the type check, then the custom check. Missing or
    /// null values are flagged only when `require_all` is set.
    pub fn validate(&self, candidate: &Record, require_all: bool) -> Result<()> {
        let mut errors = ValidationError::schema(self.model.name());
        for (name, def) in self.model.schema().iter() {
            match candidate.get(name) {
                Some(value) if !value.is_null() => {
                    if !def.field_type.validate(value) {
                        errors.add_type(name);
                    } else if let Some(check) = &def.validate {
                        if !check(value, &self.fields) {
                            errors.add_custom(name);
                        }
                    }
                }
                _ => {
                    if require_all && def.required {
                        errors.add_required(name);
                    }
                }
            }
        }

        if !errors.is_empty() {
            tracing::debug!(
                model = %self.model.name(),
                attr = ?errors.attr(),
                "validation failed"
            );
        }
        errors.into_result().map_err(Error::Validation)
    }

    /// Call a registered instance method.
    pub fn call(&mut self, name: &str, args: &[Value]) -> Result<Value> {
        let Some(method) = self.model.def().instance_methods.get(name).cloned() else {
            return Err(Error::Instance(
                InstanceError::new(self.model.name())
                    .with_message(format!("{} has no method {:?}", self.model.name(), name)),
            ));
        };
        method(self, args)
    }

    /// Copy every column of `row` into the visible fields and the snapshot.
    pub(crate) fn merge_row(&mut self, row: &Row) {
        self.fields.merge_row(row);
        self.snapshot.merge_row(row);
    }

    /// Forget the persisted snapshot. The visible fields are untouched.
    pub(crate) fn strip_snapshot(&mut self) {
        self.snapshot.clear();
    }

    fn persisted_id(&self) -> Result<Value> {
        match self.snapshot.get("id") {
            Some(id) if !id.is_null() => Ok(id.clone()),
            _ => Err(Error::Instance(InstanceError::not_saved(self.model.name()))),
        }
    }

    async fn run_hook(&mut self, stage: &'static str, hook: Option<Hook>) -> Result<()> {
        let Some(hook) = hook else {
            return Ok(());
        };
        tracing::debug!(model = %self.model.name(), hook = stage, "running hook");
        hook(self).await
    }

    /// Run `sql` through the facade expecting one row, and merge it.
    async fn persist(
        &mut self,
        cx: &Cx,
        operation: &str,
        sql: &str,
        params: &[Value],
    ) -> Outcome<(), Error> {
        tracing::debug!(
            model = %self.model.name(),
            sql = %sql,
            params = ?params,
            "executing"
        );
        let row = match self.model.database().one(cx, sql, params).await {
            Outcome::Ok(row) => row,
            Outcome::Err(e) => return Outcome::Err(self.model.execution_error(operation, e)),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        self.merge_row(&row);
        Outcome::Ok(())
    }

    /// Insert the instance.
    ///
    /// Order: `pre_save`, validation, timestamps, `INSERT ... RETURNING *`,
    /// merge, `post_save`. Every visible field is sent.
    #[tracing::instrument(level = "debug", skip(self, cx), fields(model = %self.model.name()))]
    pub async fn save(&mut self, cx: &Cx) -> Outcome<&mut Self, Error> {
        let hooks = self.model.def().hooks.clone();

        if let Err(e) = self.run_hook("pre_save", hooks.pre_save).await {
            return Outcome::Err(e);
        }
        if let Err(e) = self.validate(&self.fields, true) {
            return Outcome::Err(e);
        }
        if self.model.def().timestamps {
            let now = Value::now();
            self.fields.set("createdAt", now.clone());
            self.fields.set("updatedAt", now);
        }

        let (sql, params) = insert_statement(self.model.table_name(), &self.fields);
        match self.persist(cx, "save", &sql, &params).await {
            Outcome::Ok(()) => {}
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        }

        if let Err(e) = self.run_hook("post_save", hooks.post_save).await {
            return Outcome::Err(e);
        }
        Outcome::Ok(self)
    }

    /// Write `updates` to the saved row.
    ///
    /// Unknown keys are dropped before `pre_update` sees the map and again
    /// after it returns. Missing
    /// fields are never reported as required. An empty map runs the hooks
    /// but no statement.
    #[tracing::instrument(level = "debug", skip(self, cx, updates), fields(model = %self.model.name()))]
    pub async fn update(&mut self, cx: &Cx, updates: Record) -> Outcome<&mut Self, Error> {
        let id = match self.persisted_id() {
            Ok(id) => id,
            Err(e) => return Outcome::Err(e),
        };
        let hooks = self.model.def().hooks.clone();
        let mut updates = self.model.schema().sanitize(updates);

        if let Some(hook) = hooks.pre_update {
            tracing::debug!(model = %self.model.name(), hook = "pre_update", "running hook");
            if let Err(e) = hook(self, &mut updates).await {
                return Outcome::Err(e);
            }
            updates = self.model.schema().sanitize(updates);
        }
        if let Err(e) = self.validate(&updates, false) {
            return Outcome::Err(e);
        }

        if updates.is_empty() {
            tracing::debug!(model = %self.model.name(), "nothing to update");
        } else {
            let (sql, params) = update_statement(self.model.table_name(), &updates, id);
            match self.persist(cx, "update", &sql, &params).await {
                Outcome::Ok(()) => {}
                Outcome::Err(e) => return Outcome::Err(e),
                Outcome::Cancelled(r) => return Outcome::Cancelled(r),
                Outcome::Panicked(p) => return Outcome::Panicked(p),
            }
        }

        if let Err(e) = self.run_hook("post_update", hooks.post_update).await {
            return Outcome::Err(e);
        }
        Outcome::Ok(self)
    }

    /// Delete the row, or stamp `deletedAt` on it for a soft delete.
    ///
    /// Either way the snapshot is cleared afterwards, so the instance reports
    /// unsaved. The visible fields keep the returned row.
    #[tracing::instrument(level = "debug", skip(self, cx), fields(model = %self.model.name()))]
    pub async fn delete(&mut self, cx: &Cx, options: DeleteOptions) -> Outcome<&mut Self, Error> {
        let id = match self.persisted_id() {
            Ok(id) => id,
            Err(e) => return Outcome::Err(e),
        };
        let soft = options.resolve(self.model.def().soft_delete);
        let hooks = self.model.def().hooks.clone();

        if let Err(e) = self.run_hook("pre_delete", hooks.pre_delete).await {
            return Outcome::Err(e);
        }

        let table = self.model.table_name();
        let (sql, params) = if soft {
            (
                format!("UPDATE {table} SET \"deletedAt\"=$1 WHERE id=$2 RETURNING *"),
                vec![Value::now(), id],
            )
        } else {
            (format!("DELETE FROM {table} WHERE id=$1 RETURNING *"), vec![id])
        };
        match self.persist(cx, "delete", &sql, &params).await {
            Outcome::Ok(()) => {}
            Outcome::Err(e) => return Outcome::Err(e),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        }
        self.strip_snapshot();

        if let Err(e) = self.run_hook("post_delete", hooks.post_delete).await {
            return Outcome::Err(e);
        }
        Outcome::Ok(self)
    }
}

/// `INSERT INTO t ("a", "b") VALUES ($1, $2) RETURNING *`
fn insert_statement(table: &str, fields: &Record) -> (String, Vec<Value>) {
    if fields.is_empty() {
        return (format!("INSERT INTO {table} DEFAULT VALUES RETURNING *"), Vec::new());
    }
    let columns: Vec<String> = fields.keys().map(|k| format!("\"{k}\"")).collect();
    let placeholders: Vec<String> = (1..=fields.len()).map(|i| format!("${i}")).collect();
    let sql = format!(
        "INSERT INTO {table} ({}) VALUES ({}) RETURNING *",
        columns.join(", "),
        placeholders.join(", ")
    );
    (sql, fields.values().cloned().collect())
}

/// `UPDATE t SET "a"=$1, "b"=$2 WHERE id=$3 RETURNING *`
fn update_statement(table: &str, updates: &Record, id: Value) -> (String, Vec<Value>) {
    let assignments: Vec<String> = updates
        .keys()
        .enumerate()
        .map(|(i, k)| format!("\"{k}\"=${}", i + 1))
        .collect();
    let sql = format!(
        "UPDATE {table} SET {} WHERE id=${} RETURNING *",
        assignments.join(", "),
        updates.len() + 1
    );
    let mut params: Vec<Value> = updates.values().cloned().collect();
    params.push(id);
    (sql, params)
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("model", &self.model.name())
            .field("fields", &self.fields)
            .field("saved", &self.is_saved())
            .finish_non_exhaustive()
    }
}
