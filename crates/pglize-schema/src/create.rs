//! CREATE TABLE generation from a [`Schema`].

use pglize_core::{FieldDef, Schema, Value, quote_ident};

/// A `CREATE TABLE` template plus its bound default values.
///
/// Defaults never appear in the SQL text: each one is a `$k` placeholder
/// and its value is kept here under the field name.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedTable {
    pub query: String,
    pub values: Vec<(String, Value)>,
}

impl GeneratedTable {
    /// Default value bound for `field`.
    pub fn value(&self, field: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    /// Parameters in placeholder order.
    pub fn params(&self) -> Vec<Value> {
        self.values.iter().map(|(_, value)| value.clone()).collect()
    }
}

/// Builder for CREATE TABLE statements.
#[derive(Debug)]
pub struct CreateTable<'s> {
    table: String,
    schema: &'s Schema,
}

impl<'s> CreateTable<'s> {
    /// Create a new CREATE TABLE builder.
    pub fn new(table: impl Into<String>, schema: &'s Schema) -> Self {
        Self {
            table: table.into(),
            schema,
        }
    }

    /// Build the statement.
    pub fn build(&self) -> GeneratedTable {
        let mut values = Vec::new();
        let columns: Vec<String> = self
            .schema
            .iter()
            .map(|(name, field)| column_definition(name, field, &mut values))
            .collect();

        let mut query = String::from("CREATE TABLE ");
        query.push_str(&quote_ident(&self.table));
        query.push_str(" (");
        query.push_str(&columns.join(", "));
        query.push(')');

        GeneratedTable { query, values }
    }
}

/// `"name" type [DEFAULT $k] [NOT NULL] [UNIQUE] [PRIMARY KEY]`
fn column_definition(name: &str, field: &FieldDef, values: &mut Vec<(String, Value)>) -> String {
    let mut def = quote_ident(name);
    def.push(' ');
    def.push_str(&field.field_type.sql_name());

    if let Some(default) = &field.default {
        values.push((name.to_string(), default.clone()));
        def.push_str(&format!(" DEFAULT ${}", values.len()));
    }
    if field.required {
        def.push_str(" NOT NULL");
    }
    if field.unique {
        def.push_str(" UNIQUE");
    }
    if field.primary {
        def.push_str(" PRIMARY KEY");
    }
    def
}

/// Generate the `CREATE TABLE` statement for `schema`.
pub fn gen_table(table: &str, schema: &Schema) -> GeneratedTable {
    CreateTable::new(table, schema).build()
}
