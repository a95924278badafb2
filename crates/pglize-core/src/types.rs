//! Column types and the per-type value check.
//!
//! [`FieldType`] is closed: each variant knows its DDL tag and which
//! [`Value`] kinds it accepts. Types without a check (timestamps, serial,
//! custom tags) accept anything.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::value::Value;

/// Column types a schema field can declare.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldType {
    Text,
    Boolean,
    SmallInt,
    Integer,
    BigInt,
    VarChar(u32),
    /// `numeric(p,s)`; a bare `numeric(p)` parses with scale 0.
    Numeric { precision: u16, scale: u16 },
    Timestamp,
    Serial,
    /// Any other tag, rendered verbatim and never type-checked.
    Custom(String),
}

pub const TEXT: FieldType = FieldType::Text;
pub const BOOLEAN: FieldType = FieldType::Boolean;
pub const SMALLINT: FieldType = FieldType::SmallInt;
pub const INTEGER: FieldType = FieldType::Integer;
pub const BIGINT: FieldType = FieldType::BigInt;
/// `varchar(255)`
pub const VARCHAR: FieldType = FieldType::VarChar(255);
/// `numeric(8,4)`
pub const NUMERIC: FieldType = FieldType::Numeric {
    precision: 8,
    scale: 4,
};
pub const TIMESTAMP: FieldType = FieldType::Timestamp;
pub const SERIAL: FieldType = FieldType::Serial;

/// `varchar(size)`
pub const fn varchar(size: u32) -> FieldType {
    FieldType::VarChar(size)
}

/// `numeric(precision,scale)`
pub const fn numeric(precision: u16, scale: u16) -> FieldType {
    FieldType::Numeric { precision, scale }
}

fn varchar_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(?:varchar|character varying)\s*\(\s*(\d+)\s*\)$").ok())
        .as_ref()
}

fn numeric_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(?:numeric|decimal)\s*\(\s*(\d+)\s*(?:,\s*(\d+)\s*)?\)$").ok())
        .as_ref()
}

impl FieldType {
    /// Parse a type tag such as `varchar(64)` or `integer`.
    ///
    /// Matching is case-insensitive. Unknown tags (and parameterized tags
    /// whose arguments overflow) become [`FieldType::Custom`].
    pub fn parse(tag: &str) -> Self {
        let normalized = tag.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "text" => return FieldType::Text,
            "boolean" | "bool" => return FieldType::Boolean,
            "smallint" => return FieldType::SmallInt,
            "integer" | "int" => return FieldType::Integer,
            "bigint" => return FieldType::BigInt,
            "varchar" | "character varying" => return VARCHAR,
            "numeric" | "decimal" => return NUMERIC,
            "timestamp with time zone" | "timestamptz" => return FieldType::Timestamp,
            "serial" => return FieldType::Serial,
            _ => {}
        }

        if let Some(caps) = varchar_pattern().and_then(|re| re.captures(&normalized)) {
            if let Ok(size) = caps[1].parse() {
                return FieldType::VarChar(size);
            }
        }
        if let Some(caps) = numeric_pattern().and_then(|re| re.captures(&normalized)) {
            let scale = caps.get(2).map_or(Ok(0), |m| m.as_str().parse());
            if let (Ok(precision), Ok(scale)) = (caps[1].parse(), scale) {
                return FieldType::Numeric { precision, scale };
            }
        }

        FieldType::Custom(tag.trim().to_string())
    }

    /// The tag written into `CREATE TABLE`.
    pub fn sql_name(&self) -> String {
        match self {
            FieldType::Text => "text".to_string(),
            FieldType::Boolean => "boolean".to_string(),
            FieldType::SmallInt => "smallint".to_string(),
            FieldType::Integer => "integer".to_string(),
            FieldType::BigInt => "bigint".to_string(),
            FieldType::VarChar(size) => format!("varchar({})", size),
            FieldType::Numeric { precision, scale } => format!("numeric({},{})", precision, scale),
            FieldType::Timestamp => "timestamp with time zone".to_string(),
            FieldType::Serial => "serial".to_string(),
            FieldType::Custom(tag) => tag.clone(),
        }
    }

    /// Check if this type is text-based.
    pub const fn is_text(&self) -> bool {
        matches!(self, FieldType::VarChar(_) | FieldType::Text)
    }

    /// Check if this type is numeric.
    pub const fn is_numeric(&self) -> bool {
        matches!(
            self,
            FieldType::Numeric { .. }
                | FieldType::SmallInt
                | FieldType::Integer
                | FieldType::BigInt
        )
    }

    /// Does `value` have the kind this column expects?
    pub fn validate(&self, value: &Value) -> bool {
        get_type_validate(self)(value)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql_name())
    }
}

impl From<&str> for FieldType {
    fn from(tag: &str) -> Self {
        FieldType::parse(tag)
    }
}

fn accepts_text(value: &Value) -> bool {
    value.is_text()
}

fn accepts_numeric(value: &Value) -> bool {
    value.is_numeric()
}

fn accepts_bool(value: &Value) -> bool {
    value.is_bool()
}

fn accepts_any(_: &Value) -> bool {
    true
}

/// Predicate checking that a value's kind matches `field_type`.
pub fn get_type_validate(field_type: &FieldType) -> fn(&Value) -> bool {
    if field_type.is_text() {
        accepts_text
    } else if field_type.is_numeric() {
        accepts_numeric
    } else if *field_type == FieldType::Boolean {
        accepts_bool
    } else {
        accepts_any
    }
}
