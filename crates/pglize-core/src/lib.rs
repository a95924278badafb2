//! Core types and traits for pglize.
//!
//! - `Value`, `Row` and `Record` for dynamically-shaped data
//! - `FieldType`, `FieldDef` and `Schema` for declaring models
//! - The error taxonomy (`InstanceError`, `ValidationError`, `ModelError`)
//! - `Connection` for drivers and the `Database` facade for models
//! - `Outcome` and `Cx` re-exported from asupersync

pub use asupersync::{Cx, Outcome};

pub mod connection;
pub mod error;
pub mod field;
pub mod identifiers;
pub mod record;
pub mod row;
pub mod types;
pub mod value;

pub use connection::{BoxFuture, Connection, Database, expect_one};
pub use error::{
    Error, FieldValidationError, Info, InstanceError, ModelError, QueryError, QueryErrorKind,
    Result, ValidationError, ValidationErrorKind,
};
pub use field::{FieldDef, FieldValidator, Schema};
pub use identifiers::{is_plain_identifier, quote_ident};
pub use record::Record;
pub use row::{ColumnInfo, Row};
pub use types::{FieldType, get_type_validate};
pub use value::Value;
