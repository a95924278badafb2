//! Model types: a name, a schema and options bound to a database.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use pglize_core::{
    Cx, Database, Error, Info, ModelError, Outcome, Record, Schema, Value, is_plain_identifier,
};

use crate::instance::Instance;
use crate::options::{Hooks, InstanceMethod, ModelMethod, ModelOptions};

/// Names an instance method may not take.
pub const RESERVED_INSTANCE_NAMES: &[&str] = &[
    "save",
    "update",
    "delete",
    "is_saved",
    "selfie",
    "validate",
    "set",
    "get",
    "call",
    "fields",
    "model",
    "strip_snapshot",
    "merge_row",
];

/// Names a model method may not take.
pub const RESERVED_MODEL_NAMES: &[&str] = &[
    "find_one",
    "sync_table",
    "build",
    "call",
    "name",
    "table_name",
    "schema",
];

pub(crate) struct ModelDef {
    pub(crate) name: String,
    pub(crate) table_name: String,
    pub(crate) schema: Schema,
    pub(crate) timestamps: bool,
    pub(crate) soft_delete: bool,
    pub(crate) hooks: Hooks,
    pub(crate) instance_methods: BTreeMap<String, InstanceMethod>,
    pub(crate) model_methods: BTreeMap<String, ModelMethod>,
    pub(crate) db: Arc<dyn Database>,
}

/// A schema-bound entity constructor produced by [`create_model`].
///
/// Cloning is cheap; clones share one definition.
#[derive(Clone)]
pub struct ModelType {
    inner: Arc<ModelDef>,
}

/// Drop methods whose names collide with built-in operations.
fn filter_reserved<M>(
    model: &str,
    kind: &'static str,
    methods: BTreeMap<String, M>,
    reserved: &[&str],
) -> BTreeMap<String, M> {
    methods
        .into_iter()
        .filter(|(name, _)| {
            let collides = reserved.contains(&name.as_str());
            if collides {
                tracing::warn!(
                    model = model,
                    method = %name,
                    kind = kind,
                    "method name is reserved, skipping"
                );
            }
            !collides
        })
        .collect()
}

/// Define a model named `name` over `schema`.
///
/// `id` is added to the schema as a serial primary key when not declared.
/// Hooks and methods are fixed here; methods with reserved names are
/// skipped with a warning.
pub fn create_model(
    db: Arc<dyn Database>,
    name: impl Into<String>,
    schema: Schema,
    options: ModelOptions,
) -> ModelType {
    let name = name.into();
    let table_name = options
        .table_name
        .unwrap_or_else(|| name.to_lowercase());
    let instance_methods = filter_reserved(
        &name,
        "instance",
        options.instance_methods,
        RESERVED_INSTANCE_NAMES,
    );
    let model_methods = filter_reserved(&name, "model", options.model_methods, RESERVED_MODEL_NAMES);

    tracing::debug!(
        model = %name,
        table = %table_name,
        fields = schema.len(),
        timestamps = options.timestamps,
        soft_delete = options.soft_delete,
        "model created"
    );

    ModelType {
        inner: Arc::new(ModelDef {
            name,
            table_name,
            schema: schema.with_id(),
            timestamps: options.timestamps,
            soft_delete: options.soft_delete,
            hooks: options.hooks,
            instance_methods,
            model_methods,
            db,
        }),
    }
}

impl ModelType {
    pub(crate) fn def(&self) -> &ModelDef {
        &self.inner
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn table_name(&self) -> &str {
        &self.inner.table_name
    }

    /// The schema, including the injected `id`.
    pub fn schema(&self) -> &Schema {
        &self.inner.schema
    }

    /// The database this model runs statements against.
    pub fn database(&self) -> &dyn Database {
        self.inner.db.as_ref()
    }

    pub fn has_instance_method(&self, name: &str) -> bool {
        self.inner.instance_methods.contains_key(name)
    }

    pub fn has_model_method(&self, name: &str) -> bool {
        self.inner.model_methods.contains_key(name)
    }

    /// Construct an unsaved instance from `data`.
    ///
    /// Unknown keys are dropped and schema defaults fill the gaps.
    pub fn build(&self, data: Record) -> Instance {
        let mut fields = self.inner.schema.sanitize(data);
        self.inner.schema.apply_defaults(&mut fields);
        Instance::new(self.clone(), fields)
    }

    /// Fetch the first row whose `field` equals `value`.
    ///
    /// The returned instance is already saved. Zero rows yields `None`.
    #[tracing::instrument(level = "debug", skip(self, cx, value), fields(model = %self.name()))]
    pub async fn find_one(
        &self,
        cx: &Cx,
        field: &str,
        value: impl Into<Value>,
    ) -> Outcome<Option<Instance>, Error> {
        let value = value.into();
        if !is_plain_identifier(field) {
            return Outcome::Err(Error::Model(self.usage_error(format!(
                "find_one needs a plain field name, got {:?}",
                field
            ))));
        }
        if value.is_null() {
            return Outcome::Err(Error::Model(
                self.usage_error("find_one needs a value to match"),
            ));
        }

        let sql = format!(
            "SELECT * FROM {} WHERE \"{}\"=$1",
            self.table_name(),
            field
        );
        tracing::debug!(model = %self.name(), sql = %sql, "find_one");

        let params = [value];
        let rows = match self.database().any(cx, &sql, &params).await {
            Outcome::Ok(rows) => rows,
            Outcome::Err(e) => return Outcome::Err(self.execution_error("find_one", e)),
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };

        let Some(row) = rows.into_iter().next() else {
            return Outcome::Ok(None);
        };
        let mut instance = Instance::new(self.clone(), Record::new());
        instance.merge_row(&row);
        Outcome::Ok(Some(instance))
    }

    /// Drop and recreate the table when `force` is set; otherwise a no-op.
    ///
    /// Column defaults are sent as `$k` parameters of the `CREATE TABLE`
    /// statement. PostgreSQL rejects bind parameters in DDL, so the
    /// connection has to format them into the text client-side.
    pub async fn sync_table(&self, cx: &Cx, force: bool) -> Outcome<(), Error> {
        match pglize_schema::sync_table(
            cx,
            self.database(),
            self.table_name(),
            self.schema(),
            force,
        )
        .await
        {
            Outcome::Ok(()) => Outcome::Ok(()),
            Outcome::Err(e) => Outcome::Err(self.execution_error("sync_table", e)),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    }

    /// Invoke a registered model method.
    pub async fn call(&self, cx: &Cx, name: &str, args: Vec<Value>) -> Outcome<Value, Error> {
        let Some(method) = self.inner.model_methods.get(name).cloned() else {
            return Outcome::Err(Error::Model(
                self.usage_error(format!("{} has no model method {:?}", self.name(), name)),
            ));
        };
        tracing::debug!(model = %self.name(), method = name, "calling model method");
        method(self, cx, args).await
    }

    fn usage_error(&self, message: impl Into<String>) -> ModelError {
        let mut info = Info::new();
        info.insert(
            "message".to_string(),
            serde_json::Value::String(message.into()),
        );
        ModelError::with_info(self.name(), info)
    }

    /// Wrap a database failure raised while running `operation`.
    pub(crate) fn execution_error(&self, operation: &str, err: Error) -> Error {
        let path = format!("{}.{}", self.name(), operation);
        tracing::debug!(model = %self.name(), path = %path, error = %err, "statement failed");
        Error::Model(ModelError::wrap(self.name(), path, err))
    }
}

impl fmt::Debug for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelType")
            .field("name", &self.inner.name)
            .field("table_name", &self.inner.table_name)
            .field("schema", &self.inner.schema)
            .field("timestamps", &self.inner.timestamps)
            .field("soft_delete", &self.inner.soft_delete)
            .field("hooks", &self.inner.hooks)
            .finish_non_exhaustive()
    }
}
