use indexmap::IndexMap;

use super::value::{ParsedInput, Value};
use super::{FieldDescriptor, FieldKind, Schema, Shape};
use crate::errors::{Issue, SchemaError, ValidationError};
use crate::input::{RawInput, RawValue};

/// A declarative [`Schema`], assembled one field at a time.
///
/// Every field accepts either a string, a string out of a closed set, or a list of strings.
/// Use [`string`], [`enumeration`] and [`string_array`] to declare them.
///
/// Keys in the raw input that don't match a declared field are ignored.
///
/// # Example
///
/// ```rust
/// use safe_page::input::RawInput;
/// use safe_page::schema::{ObjectSchema, Schema, enumeration, string_array};
///
/// let schema = ObjectSchema::new()
///     .field("category", enumeration(["tech", "design", "business"]))
///     .field("tags", string_array().default(["general"]));
///
/// let parsed = schema.parse(&RawInput::new().with("category", "tech")).unwrap();
/// assert_eq!(parsed.get_array("tags"), Some(&["general".to_string()][..]));
///
/// let err = schema.parse(&RawInput::new().with("category", "invalid")).unwrap_err();
/// assert!(err.as_validation().unwrap().issue_at("category").is_some());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectSchema {
    fields: IndexMap<String, FieldSchema>,
}

impl ObjectSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field.
    ///
    /// Declaring the same field twice replaces the previous declaration.
    pub fn field(mut self, name: impl Into<String>, field: FieldSchema) -> Self {
        self.fields.insert(name.into(), field);
        self
    }
}

impl Schema for ObjectSchema {
    type Output = ParsedInput;

    fn parse(&self, raw: &RawInput) -> Result<ParsedInput, SchemaError> {
        let mut parsed = ParsedInput::default();
        let mut issues = Vec::new();
        for (name, field) in &self.fields {
            match field.parse(raw.get(name)) {
                Ok(value) => parsed.insert(name.clone(), value),
                Err(message) => issues.push(Issue::new(name.as_str(), message)),
            }
        }
        if issues.is_empty() {
            Ok(parsed)
        } else {
            Err(ValidationError::new(issues).into())
        }
    }

    fn shape(&self) -> Option<Shape> {
        let fields = self
            .fields
            .iter()
            .map(|(name, field)| FieldDescriptor {
                name: name.clone(),
                kind: field.kind.clone(),
                default: match &field.presence {
                    Presence::Default(value) => Some(value.clone()),
                    Presence::Required | Presence::Optional => None,
                },
            })
            .collect();
        Some(Shape::new(fields))
    }
}

/// The declaration of a single field in an [`ObjectSchema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    kind: FieldKind,
    presence: Presence,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Presence {
    Required,
    Optional,
    Default(Value),
}

/// A required string field.
pub fn string() -> FieldSchema {
    FieldSchema::required(FieldKind::String)
}

/// A required string field that only accepts one of the given values.
pub fn enumeration<I, S>(variants: I) -> FieldSchema
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    FieldSchema::required(FieldKind::Enumeration(
        variants.into_iter().map(Into::into).collect(),
    ))
}

/// A required field holding a list of strings.
///
/// A key that appears only once is accepted as a list with a single element.
pub fn string_array() -> FieldSchema {
    FieldSchema::required(FieldKind::StringArray)
}

impl FieldSchema {
    fn required(kind: FieldKind) -> Self {
        Self {
            kind,
            presence: Presence::Required,
        }
    }

    /// The field may be missing: it'll be set to [`Value::Absent`] if it is.
    ///
    /// It overrides a previously declared default.
    pub fn optional(mut self) -> Self {
        self.presence = Presence::Optional;
        self
    }

    /// Use `value` if the field is missing.
    ///
    /// The default must be compatible with the field kind. That is checked when the
    /// schema is attached to a [`PageBuilder`](crate::PageBuilder).
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.presence = Presence::Default(value.into());
        self
    }

    fn parse(&self, raw: Option<&RawValue>) -> Result<Value, String> {
        match (&self.kind, raw) {
            (_, None | Some(RawValue::Absent)) => match &self.presence {
                Presence::Required => Err("Required".to_owned()),
                Presence::Optional => Ok(Value::Absent),
                Presence::Default(value) => Ok(value.clone()),
            },
            (FieldKind::StringArray, Some(RawValue::Single(s))) => Ok(Value::Array(vec![s.clone()])),
            (FieldKind::StringArray, Some(RawValue::Multiple(values))) => {
                Ok(Value::Array(values.clone()))
            }
            (_, Some(RawValue::Multiple(values))) => Err(format!(
                "Expected a single value, received {} values",
                values.len()
            )),
            (FieldKind::Enumeration(variants), Some(RawValue::Single(s))) => {
                if variants.contains(s) {
                    Ok(Value::String(s.clone()))
                } else {
                    Err(format!(
                        "Invalid enum value. Expected {}, received '{s}'",
                        quoted_variants(variants)
                    ))
                }
            }
            (_, Some(RawValue::Single(s))) => Ok(Value::String(s.clone())),
        }
    }
}

pub(super) fn quoted_variants(variants: &[String]) -> String {
    variants
        .iter()
        .map(|v| format!("'{v}'"))
        .collect::<Vec<_>>()
        .join(" | ")
}
