//! pglize - schema-driven models over PostgreSQL.
//!
//! A model is declared at runtime from a name, a [`Schema`] and
//! [`ModelOptions`]. Instances of it validate themselves against the schema
//! and persist through generated, parameterized SQL:
//!
//! - construction drops unknown keys and applies defaults
//! - `save`, `update` and `delete` run `pre_*` hooks, validation, one
//!   statement with `RETURNING *`, then `post_*` hooks
//! - `find_one` and `sync_table` are available on the model
//!
//! # Quick Start
//!
//! ```ignore
//! use pglize::prelude::*;
//! use pglize::types::{INTEGER, VARCHAR};
//!
//! async fn example(cx: &Cx, conn: impl Connection + 'static) {
//!     let db = Pglize::new(conn);
//!     let user = db.create_model(
//!         "User",
//!         Schema::new()
//!             .field("email", FieldDef::new(VARCHAR).required().unique())
//!             .field(
//!                 "credit",
//!                 FieldDef::new(INTEGER)
//!                     .default_value(100)
//!                     .validate(|v| v.as_i64().is_some_and(|n| n >= 100)),
//!             ),
//!         ModelOptions::new().timestamps(true),
//!     );
//!
//!     user.sync_table(cx, true).await;
//!
//!     let mut bob = user.build(Record::new().with("email", "bob@mail.com"));
//!     bob.save(cx).await;
//!     bob.update(cx, Record::new().with("credit", 300)).await;
//!
//!     let found = user.find_one(cx, "email", "bob@mail.com").await;
//! }
//! ```
//!
//! Every persistence call takes the asupersync [`Cx`] and returns an
//! [`Outcome`]; database failures come back wrapped in a `ModelError` that
//! names the operation (`"User.save"`) and keeps the driver error as source.

pub mod instance;
pub mod model;
pub mod options;

use std::sync::Arc;

pub use pglize_core::types;
pub use pglize_core::{
    BoxFuture, Connection, Cx, Database, Error, FieldDef, FieldType, InstanceError, ModelError,
    Outcome, Record, Result, Row, Schema, ValidationError, Value, get_type_validate,
};
pub use pglize_schema::{GeneratedTable, gen_table};

pub use instance::Instance;
pub use model::{ModelType, RESERVED_INSTANCE_NAMES, RESERVED_MODEL_NAMES, create_model};
pub use options::{DeleteOptions, Hooks, ModelOptions};

/// A configured database that models are created against.
#[derive(Clone)]
pub struct Pglize {
    db: Arc<dyn Database>,
}

impl Pglize {
    /// Wrap a connection. Every model created from this handle shares it.
    pub fn new<C: Connection + 'static>(conn: C) -> Self {
        Self { db: Arc::new(conn) }
    }

    /// Use an already shared database.
    pub fn from_database(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Arc<dyn Database> {
        &self.db
    }

    /// Define a model bound to this database.
    pub fn create_model(
        &self,
        name: impl Into<String>,
        schema: Schema,
        options: ModelOptions,
    ) -> ModelType {
        create_model(Arc::clone(&self.db), name, schema, options)
    }
}

impl std::fmt::Debug for Pglize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pglize").finish_non_exhaustive()
    }
}

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        BoxFuture, Connection, Cx, Database, DeleteOptions, Error, FieldDef, Instance,
        ModelOptions, ModelType, Outcome, Pglize, Record, Result, Row, Schema, Value,
        create_model,
    };
}
