//! Error types for pglize operations.
//!
//! Three model-facing failure records carry a kind tag, a message and a map
//! of extra diagnostic info:
//!
//! - [`InstanceError`] for operations invalid in an instance's current state
//! - [`ValidationError`] for schema violations, partitioned into buckets
//! - [`ModelError`] for static-call misuse and wrapped execution failures
//!
//! Driver-side failures ([`QueryError`]) sit next to them in the crate-wide [`Error`] enum.

use std::collections::BTreeMap;
use std::fmt;

/// Extra diagnostic fields attached to a model-facing error.
pub type Info = BTreeMap<String, serde_json::Value>;

/// The primary error type for all pglize operations.
#[derive(Debug)]
pub enum Error {
    /// Operation invalid for the instance's lifecycle state
    Instance(InstanceError),
    /// Schema contract violated
    Validation(ValidationError),
    /// Malformed static call or wrapped execution failure
    Model(ModelError),
    /// Query execution errors
    Query(QueryError),
    /// Custom error with message
    Custom(String),
}

#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub sql: Option<String>,
    pub sqlstate: Option<String>,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Syntax error in SQL
    Syntax,
    /// Constraint violation (unique, foreign key, not null)
    Constraint,
    /// Table or column not found
    NotFound,
    /// Permission denied
    Permission,
    /// A statement expected exactly one row and got another count
    RowCount,
    /// Other database error
    Database,
}

/// Merge caller info into `target`, returning the `message` override if any.
///
/// The `name` key is dropped: the kind tag is fixed per error type.
fn merge_info(target: &mut Info, info: Info) -> Option<String> {
    let mut message = None;
    for (key, value) in info {
        match key.as_str() {
            "name" => {}
            "message" => {
                message = Some(match value {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                });
            }
            _ => {
                target.insert(key, value);
            }
        }
    }
    message
}

/// A per-instance failure, e.g. updating an instance that was never saved.
#[derive(Debug, Clone)]
pub struct InstanceError {
    model: String,
    message: String,
    info: Info,
}

impl InstanceError {
    pub const NAME: &'static str = "InstanceError";

    /// Create an error with the default message for `model`.
    pub fn new(model: impl Into<String>) -> Self {
        Self::with_info(model, Info::new())
    }

    /// Create an error carrying extra info. An info `message` replaces the default.
    pub fn with_info(model: impl Into<String>, info: Info) -> Self {
        let model = model.into();
        let mut merged = Info::new();
        let message = merge_info(&mut merged, info)
            .unwrap_or_else(|| format!("A {} instance error has occured", model));
        Self {
            model,
            message,
            info: merged,
        }
    }

    /// The error raised by `update`/`delete` on an unsaved instance.
    pub fn not_saved(model: impl Into<String>) -> Self {
        Self::new(model).with_message("This instance has not been saved yet")
    }

    /// Replace the message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Kind tag.
    pub fn name(&self) -> &'static str {
        Self::NAME
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn info(&self) -> &Info {
        &self.info
    }

    /// Look up one info field.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.info.get(key)
    }
}

/// Which check a field failed during validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Value has the wrong kind for the column type
    Type,
    /// Custom `validate` predicate returned false
    Custom,
    /// Required field is missing/null
    Required,
}

impl ValidationErrorKind {
    /// Info key holding the bucket for this kind.
    pub const fn bucket(self) -> &'static str {
        match self {
            ValidationErrorKind::Type => "typeValidation",
            ValidationErrorKind::Custom => "customValidation",
            ValidationErrorKind::Required => "requiredValidation",
        }
    }
}

/// A single validation failure for a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldValidationError {
    /// The field name that failed validation
    pub field: String,
    /// The kind of validation that failed
    pub kind: ValidationErrorKind,
}

/// Schema validation failure with per-kind buckets.
///
/// Each failing field is recorded once, under the first check it failed.
/// `attr()` is the union of all buckets in recording order.
#[derive(Debug, Clone)]
pub struct ValidationError {
    model: String,
    message: String,
    info: Info,
    errors: Vec<FieldValidationError>,
}

impl ValidationError {
    pub const NAME: &'static str = "ValidationError";

    /// Create an empty error with the default message for `model`.
    pub fn new(model: impl Into<String>) -> Self {
        Self::with_info(model, Info::new())
    }

    /// Create an empty error whose message names a schema failure.
    pub fn schema(model: impl Into<String>) -> Self {
        let model = model.into();
        let message = format!("{} schema validation error", model);
        Self::new(model).with_message(message)
    }

    /// Create an error from info.
    ///
    /// The bucket keys (`typeValidation`, `customValidation`,
    /// `requiredValidation`) are read as string arrays into the buckets;
    /// `attr` is always derived from them.
    pub fn with_info(model: impl Into<String>, mut info: Info) -> Self {
        let model = model.into();
        let mut errors = Vec::new();
        for kind in [
            ValidationErrorKind::Type,
            ValidationErrorKind::Custom,
            ValidationErrorKind::Required,
        ] {
            if let Some(serde_json::Value::Array(fields)) = info.remove(kind.bucket()) {
                errors.extend(fields.iter().filter_map(|f| f.as_str()).map(|field| {
                    FieldValidationError {
                        field: field.to_string(),
                        kind,
                    }
                }));
            }
        }
        info.remove("attr");

        let mut merged = Info::new();
        let message = merge_info(&mut merged, info)
            .unwrap_or_else(|| format!("A {} validation error has occured", model));
        Self {
            model,
            message,
            info: merged,
            errors,
        }
    }

    /// Replace the message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Record a failing field.
    pub fn add(&mut self, field: impl Into<String>, kind: ValidationErrorKind) {
        self.errors.push(FieldValidationError {
            field: field.into(),
            kind,
        });
    }

    /// Add a type mismatch.
    pub fn add_type(&mut self, field: impl Into<String>) {
        self.add(field, ValidationErrorKind::Type);
    }

    /// Add a failed custom check.
    pub fn add_custom(&mut self, field: impl Into<String>) {
        self.add(field, ValidationErrorKind::Custom);
    }

    /// Add a required field error.
    pub fn add_required(&mut self, field: impl Into<String>) {
        self.add(field, ValidationErrorKind::Required);
    }

    /// Check if there are any validation errors.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Convert to Result, returning Ok(()) if no errors, Err(self) otherwise.
    pub fn into_result(self) -> std::result::Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }

    pub fn name(&self) -> &'static str {
        Self::NAME
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn info(&self) -> &Info {
        &self.info
    }

    pub fn errors(&self) -> &[FieldValidationError] {
        &self.errors
    }

    fn bucket(&self, kind: ValidationErrorKind) -> Vec<&str> {
        self.errors
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.field.as_str())
            .collect()
    }

    /// Every failing field.
    pub fn attr(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.field.as_str()).collect()
    }

    pub fn type_validation(&self) -> Vec<&str> {
        self.bucket(ValidationErrorKind::Type)
    }

    pub fn custom_validation(&self) -> Vec<&str> {
        self.bucket(ValidationErrorKind::Custom)
    }

    pub fn required_validation(&self) -> Vec<&str> {
        self.bucket(ValidationErrorKind::Required)
    }
}

/// A per-model failure: bad arguments to a static helper, or a database
/// error raised while running a model operation.
#[derive(Debug)]
pub struct ModelError {
    model: String,
    message: String,
    info: Info,
    source: Option<Box<Error>>,
}

impl ModelError {
    pub const NAME: &'static str = "ModelError";

    /// Create an error with the default message for `model`.
    pub fn new(model: impl Into<String>) -> Self {
        Self::with_info(model, Info::new())
    }

    /// Create an error carrying extra info. An info `message` replaces the default.
    pub fn with_info(model: impl Into<String>, info: Info) -> Self {
        let model = model.into();
        let mut merged = Info::new();
        let message = merge_info(&mut merged, info)
            .unwrap_or_else(|| format!("A {} model error has occured", model));
        Self {
            model,
            message,
            info: merged,
            source: None,
        }
    }

    /// Wrap an execution failure raised at `path` (e.g. `User.save`).
    ///
    /// The original message is kept after the path and the original error
    /// becomes the source.
    pub fn wrap(model: impl Into<String>, path: impl Into<String>, source: Error) -> Self {
        let path = path.into();
        let mut err = Self::new(model).with_message(format!("{}: {}", path, source));
        err.info
            .insert("path".to_string(), serde_json::Value::String(path));
        err.source = Some(Box::new(source));
        err
    }

    /// Replace the message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn name(&self) -> &'static str {
        Self::NAME
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn info(&self) -> &Info {
        &self.info
    }

    /// The `path` info tag, set for wrapped execution failures.
    pub fn path(&self) -> Option<&str> {
        self.info.get("path").and_then(|v| v.as_str())
    }

    /// The wrapped error, if any.
    pub fn inner(&self) -> Option<&Error> {
        self.source.as_deref()
    }
}

impl Error {
    /// Kind tag for caller-side dispatch.
    pub fn name(&self) -> &'static str {
        match self {
            Error::Instance(_) => InstanceError::NAME,
            Error::Validation(_) => ValidationError::NAME,
            Error::Model(_) => ModelError::NAME,
            Error::Query(_) => "QueryError",
            Error::Custom(_) => "Error",
        }
    }

    /// Get SQLSTATE if available (e.g., "23505" for unique violation).
    ///
    /// Looks through a `ModelError` wrapper.
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sqlstate.as_deref(),
            Error::Model(m) => m.inner().and_then(Error::sqlstate),
            _ => None,
        }
    }

    /// Get the SQL that caused this error, if available.
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sql.as_deref(),
            Error::Model(m) => m.inner().and_then(Error::sql),
            _ => None,
        }
    }
}

impl QueryError {
    /// Build a query error of `kind` for `sql`.
    pub fn new(kind: QueryErrorKind, sql: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            sql: Some(sql.into()),
            sqlstate: None,
            message: message.into(),
            source: None,
        }
    }

    /// Is this a unique constraint violation?
    pub fn is_unique_violation(&self) -> bool {
        self.sqlstate.as_deref() == Some("23505")
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Instance(e) => write!(f, "{}", e),
            Error::Validation(e) => write!(f, "{}", e),
            Error::Model(e) => write!(f, "{}", e),
            Error::Query(e) => {
                if let Some(sqlstate) = &e.sqlstate {
                    write!(f, "Query error (SQLSTATE {}): {}", sqlstate, e.message)
                } else {
                    write!(f, "Query error: {}", e.message)
                }
            }
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Query(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Model(e) => e
                .inner()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl fmt::Display for InstanceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{} ({})", self.message, self.attr().join(", "))
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sqlstate) = &self.sqlstate {
            write!(f, "{} (SQLSTATE {})", self.message, sqlstate)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for InstanceError {}
impl std::error::Error for ValidationError {}

impl From<InstanceError> for Error {
    fn from(err: InstanceError) -> Self {
        Error::Instance(err)
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Error::Validation(err)
    }
}

impl From<ModelError> for Error {
    fn from(err: ModelError) -> Self {
        Error::Model(err)
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

/// Result type alias for pglize operations.
pub type Result<T> = std::result::Result<T, Error>;
