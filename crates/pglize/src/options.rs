//! Model options: table name, timestamps, soft delete, hooks and custom methods.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use pglize_core::{BoxFuture, Cx, Error, Outcome, Record, Result, Value};

use crate::instance::Instance;
use crate::model::ModelType;

/// A lifecycle hook. It runs against the instance and may mutate it.
pub type Hook = Arc<dyn for<'a> Fn(&'a mut Instance) -> BoxFuture<'a, Result<()>> + Send + Sync>;

/// The `pre_update` hook also receives the (sanitized) update map and may
/// rewrite it before the statement is built.
pub type UpdateHook =
    Arc<dyn for<'a> Fn(&'a mut Instance, &'a mut Record) -> BoxFuture<'a, Result<()>> + Send + Sync>;

/// A custom method callable on every instance via [`Instance::call`].
pub type InstanceMethod = Arc<dyn Fn(&mut Instance, &[Value]) -> Result<Value> + Send + Sync>;

/// A custom static method callable via [`ModelType::call`].
pub type ModelMethod = Arc<
    dyn for<'a> Fn(&'a ModelType, &'a Cx, Vec<Value>) -> BoxFuture<'a, Outcome<Value, Error>>
        + Send
        + Sync,
>;

/// Hook table, resolved once when the model is created.
#[derive(Clone, Default)]
pub struct Hooks {
    pub pre_save: Option<Hook>,
    pub post_save: Option<Hook>,
    pub pre_update: Option<UpdateHook>,
    pub post_update: Option<Hook>,
    pub pre_delete: Option<Hook>,
    pub post_delete: Option<Hook>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("pre_save", &self.pre_save.is_some())
            .field("post_save", &self.post_save.is_some())
            .field("pre_update", &self.pre_update.is_some())
            .field("post_update", &self.post_update.is_some())
            .field("pre_delete", &self.pre_delete.is_some())
            .field("post_delete", &self.post_delete.is_some())
            .finish()
    }
}

/// Options accepted by [`create_model`](crate::create_model).
///
/// ```ignore
/// let options = ModelOptions::new()
///     .table_name("users")
///     .timestamps(true)
///     .pre_save(|user| Box::pin(async move {
///         user.set("credit", 110);
///         Ok(())
///     }));
/// ```
#[derive(Clone, Default)]
pub struct ModelOptions {
    pub(crate) table_name: Option<String>,
    pub(crate) timestamps: bool,
    pub(crate) soft_delete: bool,
    pub(crate) hooks: Hooks,
    pub(crate) instance_methods: BTreeMap<String, InstanceMethod>,
    pub(crate) model_methods: BTreeMap<String, ModelMethod>,
}

impl ModelOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `name` instead of the lower-cased model name.
    ///
    /// The name is written into CRUD statements as-is and unquoted, while
    /// `sync_table` quotes it. PostgreSQL folds the unquoted form to lower
    /// case, so keep table names lower case to have both refer to one table.
    pub fn table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = Some(name.into());
        self
    }

    /// Stamp `createdAt` and `updatedAt` on save.
    pub fn timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }

    /// Make `delete` set `deletedAt` instead of removing the row, unless the
    /// call says otherwise.
    pub fn soft_delete(mut self, enabled: bool) -> Self {
        self.soft_delete = enabled;
        self
    }

    pub fn pre_save<F>(mut self, hook: F) -> Self
    where
        F: for<'a> Fn(&'a mut Instance) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
    {
        self.hooks.pre_save = Some(Arc::new(hook));
        self
    }

    pub fn post_save<F>(mut self, hook: F) -> Self
    where
        F: for<'a> Fn(&'a mut Instance) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
    {
        self.hooks.post_save = Some(Arc::new(hook));
        self
    }

    pub fn pre_update<F>(mut self, hook: F) -> Self
    where
        F: for<'a> Fn(&'a mut Instance, &'a mut Record) -> BoxFuture<'a, Result<()>>
            + Send
            + Sync
            + 'static,
    {
        self.hooks.pre_update = Some(Arc::new(hook));
        self
    }

    pub fn post_update<F>(mut self, hook: F) -> Self
    where
        F: for<'a> Fn(&'a mut Instance) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
    {
        self.hooks.post_update = Some(Arc::new(hook));
        self
    }

    pub fn pre_delete<F>(mut self, hook: F) -> Self
    where
        F: for<'a> Fn(&'a mut Instance) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
    {
        self.hooks.pre_delete = Some(Arc::new(hook));
        self
    }

    pub fn post_delete<F>(mut self, hook: F) -> Self
    where
        F: for<'a> Fn(&'a mut Instance) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
    {
        self.hooks.post_delete = Some(Arc::new(hook));
        self
    }

    /// Register a method callable on every instance.
    pub fn instance_method<F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(&mut Instance, &[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.instance_methods.insert(name.into(), Arc::new(method));
        self
    }

    /// Register a static method on the model.
    pub fn model_method<F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: for<'a> Fn(&'a ModelType, &'a Cx, Vec<Value>) -> BoxFuture<'a, Outcome<Value, Error>>
            + Send
            + Sync
            + 'static,
    {
        self.model_methods.insert(name.into(), Arc::new(method));
        self
    }
}

impl fmt::Debug for ModelOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelOptions")
            .field("table_name", &self.table_name)
            .field("timestamps", &self.timestamps)
            .field("soft_delete", &self.soft_delete)
            .field("hooks", &self.hooks)
            .field(
                "instance_methods",
                &self.instance_methods.keys().collect::<Vec<_>>(),
            )
            .field("model_methods", &self.model_methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Per-call delete options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    /// `None` falls back to the model's `soft_delete` option.
    pub soft_delete: Option<bool>,
}

impl DeleteOptions {
    /// Force a soft delete.
    pub const fn soft() -> Self {
        Self {
            soft_delete: Some(true),
        }
    }

    /// Force a hard delete.
    pub const fn hard() -> Self {
        Self {
            soft_delete: Some(false),
        }
    }

    /// Effective flag given the model default.
    pub const fn resolve(self, model_default: bool) -> bool {
        match self.soft_delete {
            Some(soft) => soft,
            None => model_default,
        }
    }
}
