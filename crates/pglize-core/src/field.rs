//! Field descriptors and schemas.

use std::fmt;
use std::sync::Arc;

use crate::record::Record;
use crate::types::{FieldType, SERIAL};
use crate::value::Value;

/// Custom check for a field value.
///
/// Receives the candidate value and the instance's current visible fields.
pub type FieldValidator = Arc<dyn Fn(&Value, &Record) -> bool + Send + Sync>;

/// Declaration of one schema field.
#[derive(Clone)]
pub struct FieldDef {
    /// Column type
    pub field_type: FieldType,
    /// Must be present and non-null on save
    pub required: bool,
    /// Applied at construction when no value is supplied
    pub default: Option<Value>,
    /// `UNIQUE` constraint
    pub unique: bool,
    /// `PRIMARY KEY` constraint
    pub primary: bool,
    /// Custom check run after the type check passes
    pub validate: Option<FieldValidator>,
}

impl FieldDef {
    /// Create a field of the given type with no constraints.
    pub fn new(field_type: impl Into<FieldType>) -> Self {
        Self {
            field_type: field_type.into(),
            required: false,
            default: None,
            unique: false,
            primary: false,
            validate: None,
        }
    }

    /// Mark as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Mark as unique.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Mark as primary key.
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    /// Set the default value.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Attach a custom check on the value alone.
    pub fn validate<F>(mut self, check: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.validate = Some(Arc::new(move |value, _| check(value)));
        self
    }

    /// Attach a custom check that can also read the instance's fields.
    pub fn validate_with<F>(mut self, check: F) -> Self
    where
        F: Fn(&Value, &Record) -> bool + Send + Sync + 'static,
    {
        self.validate = Some(Arc::new(check));
        self
    }
}

impl fmt::Debug for FieldDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDef")
            .field("field_type", &self.field_type)
            .field("required", &self.required)
            .field("default", &self.default)
            .field("unique", &self.unique)
            .field("primary", &self.primary)
            .field("validate", &self.validate.is_some())
            .finish()
    }
}

/// Ordered mapping from field name to [`FieldDef`].
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<(String, FieldDef)>,
}

impl Schema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field. Redeclaring a name replaces it in place.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, def: FieldDef) -> Self {
        let name = name.into();
        if let Some(slot) = self.fields.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = def;
        } else {
            self.fields.push((name, def));
        }
        self
    }

    /// Inject `id` as a serial primary key at the front if it is not declared.
    #[must_use]
    pub fn with_id(mut self) -> Self {
        if !self.contains("id") {
            self.fields
                .insert(0, ("id".to_string(), FieldDef::new(SERIAL).primary()));
        }
        self
    }

    /// Look up a field.
    pub fn get(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, d)| d)
    }

    /// Whether `name` is declared.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    /// `(name, def)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldDef)> {
        self.fields.iter().map(|(n, d)| (n.as_str(), d))
    }

    /// Keep only declared keys of `data`. Unknown keys are dropped.
    pub fn sanitize(&self, mut data: Record) -> Record {
        data.retain(|key| self.contains(key));
        data
    }

    /// Fill in defaults for declared fields missing from `data`.
    ///
    /// A supplied value always wins, including an explicit `Null`.
    pub fn apply_defaults(&self, data: &mut Record) {
        for (name, def) in self.iter() {
            if let Some(default) = &def.default {
                if !data.contains(name) {
                    data.set(name, default.clone());
                }
            }
        }
    }
}
