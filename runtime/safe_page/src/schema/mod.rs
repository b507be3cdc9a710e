//! The capability a schema must expose to validate route and query inputs.
//!
//! # Overview
//!
//! The pipeline only ever talks to schemas through the [`Schema`] trait: one `parse`
//! operation and, optionally, a description of the schema's [`Shape`].
//! Any validation library can be plugged in by implementing [`Schema`] for one of its types.
//!
//! Two adapters are provided out of the box:
//!
//! - [`ObjectSchema`]: a declarative schema, assembled field by field at runtime.
//! - [`Typed`]: deserialize the input straight into one of your types using `serde`.
//!
//! # Example
//!
//! ```rust
//! use safe_page::input::RawInput;
//! use safe_page::schema::{ObjectSchema, Schema, enumeration, string};
//!
//! let schema = ObjectSchema::new()
//!     .field("id", string())
//!     .field("theme", enumeration(["light", "dark"]).default("light"));
//!
//! let parsed = schema.parse(&RawInput::new().with("id", "42")).unwrap();
//! assert_eq!(parsed.get_str("id"), Some("42"));
//! assert_eq!(parsed.get_str("theme"), Some("light"));
//! ```
use std::sync::Arc;

pub use object::{FieldSchema, ObjectSchema, enumeration, string, string_array};
pub use typed::Typed;
pub use value::{ParsedInput, Value};

use crate::errors::{ConfigurationError, SchemaError};
use crate::input::RawInput;

mod deserializer;
mod object;
mod typed;
mod value;

/// Validate (and coerce) a [`RawInput`].
///
/// `parse` must not have side effects: the same input is always expected to produce the
/// same outcome.
pub trait Schema: Send + Sync + 'static {
    /// The validated output.
    type Output: Send + 'static;

    /// Validate the raw input.
    ///
    /// A [`SchemaError::Validation`] must be returned when the input doesn't satisfy the
    /// schema, a [`SchemaError::Configuration`] when the schema can never be satisfied by
    /// route or query inputs.
    fn parse(&self, raw: &RawInput) -> Result<Self::Output, SchemaError>;

    /// Describe the fields this schema expects, if known ahead of time.
    ///
    /// When a shape is available, configuration errors are detected as soon as the schema
    /// is attached to a [`PageBuilder`](crate::PageBuilder).
    /// Otherwise they surface the first time the schema is used to validate an input.
    fn shape(&self) -> Option<Shape> {
        None
    }
}

impl<S> Schema for Arc<S>
where
    S: Schema,
{
    type Output = S::Output;

    fn parse(&self, raw: &RawInput) -> Result<Self::Output, SchemaError> {
        S::parse(self, raw)
    }

    fn shape(&self) -> Option<Shape> {
        S::shape(self)
    }
}

/// The fields a [`Schema`] expects, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Shape {
    fields: Vec<FieldDescriptor>,
}

impl Shape {
    pub fn new(fields: Vec<FieldDescriptor>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// The description of a single field in a [`Shape`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    /// The value used when the field is missing from the raw input.
    pub default: Option<Value>,
}

/// The kind of value a field accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FieldKind {
    /// Any string.
    String,
    /// One string out of a closed set.
    Enumeration(Vec<String>),
    /// A list of strings.
    StringArray,
    /// The field exists, but its kind is only known when an input is parsed.
    Opaque,
    /// A kind that route and query inputs can never provide, e.g. a number or a nested object.
    Unsupported {
        /// The name of the requested type.
        type_name: String,
    },
}

impl FieldKind {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            FieldKind::String => "a string",
            FieldKind::Enumeration(_) => "an enumerated string",
            FieldKind::StringArray => "a list of strings",
            FieldKind::Opaque => "an opaque value",
            FieldKind::Unsupported { .. } => "an unsupported value",
        }
    }
}

/// Verify that every field in the shape can be satisfied by route or query inputs.
pub(crate) fn check_shape(shape: &Shape) -> Result<(), ConfigurationError> {
    for field in shape.fields() {
        if let FieldKind::Unsupported { type_name } = &field.kind {
            return Err(ConfigurationError::UnsupportedFieldKind {
                field: field.name.clone(),
                type_name: type_name.clone(),
            });
        }
        if let Some(default) = &field.default {
            check_default(field, default)?;
        }
    }
    Ok(())
}

fn check_default(field: &FieldDescriptor, default: &Value) -> Result<(), ConfigurationError> {
    let reason = match (&field.kind, default) {
        (_, Value::Absent) => "a default value can't be absent".to_owned(),
        (FieldKind::Opaque, _)
        | (FieldKind::String, Value::String(_))
        | (FieldKind::StringArray, Value::Array(_)) => return Ok(()),
        (FieldKind::Enumeration(variants), Value::String(s)) => {
            if variants.contains(s) {
                return Ok(());
            }
            format!("'{s}' is not one of {}", object::quoted_variants(variants))
        }
        (kind, _) => format!("the field expects {}", kind.label()),
    };
    Err(ConfigurationError::InvalidDefault {
        field: field.name.clone(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(kind: FieldKind, default: Option<Value>) -> FieldDescriptor {
        FieldDescriptor {
            name: "theme".into(),
            kind,
            default,
        }
    }

    #[test]
    fn unsupported_kinds_are_rejected() {
        let shape = Shape::new(vec![descriptor(
            FieldKind::Unsupported {
                type_name: "u32".into(),
            },
            None,
        )]);
        let err = check_shape(&shape).unwrap_err();
        insta::assert_snapshot!(err, @"`theme` asks for a `u32`, which can't be extracted from route or query parameters. Their values are always strings or lists of strings");
    }

    #[test]
    fn defaults_must_belong_to_the_enumeration() {
        let kind = FieldKind::Enumeration(vec!["light".into(), "dark".into()]);
        let ok = Shape::new(vec![descriptor(kind.clone(), Some("dark".into()))]);
        assert!(check_shape(&ok).is_ok());

        let err = check_shape(&Shape::new(vec![descriptor(kind, Some("blue".into()))]))
            .unwrap_err();
        insta::assert_snapshot!(err, @"The default value for `theme` is invalid: 'blue' is not one of 'light' | 'dark'");
    }

    #[test]
    fn defaults_must_match_the_field_kind() {
        let shape = Shape::new(vec![descriptor(
            FieldKind::StringArray,
            Some("general".into()),
        )]);
        let err = check_shape(&shape).unwrap_err();
        insta::assert_snapshot!(err, @"The default value for `theme` is invalid: the field expects a list of strings");
    }

    #[test]
    fn opaque_fields_accept_any_default() {
        let shape = Shape::new(vec![descriptor(FieldKind::Opaque, Some("x".into()))]);
        assert!(check_shape(&shape).is_ok());
    }
}
