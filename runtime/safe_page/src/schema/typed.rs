use std::marker::PhantomData;

use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::deserializer::{ErrorKind, InputDeserializer, struct_fields};
use super::{FieldDescriptor, FieldKind, Schema, Shape, check_shape};
use crate::errors::{ConfigurationError, Issue, SchemaError, ValidationError};
use crate::input::RawInput;

/// A [`Schema`] that deserializes the raw input into `T` using `serde`.
///
/// # Supported types
///
/// `T` must be a struct with named fields (or a map). Each field can be:
///
/// - a `String` (or a newtype around one);
/// - an enum with unit variants only, i.e. an enumerated string;
/// - a `Vec<String>`;
/// - an `Option` around one of the above.
///
/// Use `#[serde(default)]` to provide a default value for a missing field.
/// Keys that are present in the input with no value are treated as missing.
///
/// Any other field type (e.g. `u32` or `bool`) is a configuration error: route and query
/// parameters are always strings or lists of strings. It is reported when the schema is
/// attached to a [`PageBuilder`](crate::PageBuilder), whether or not requests ever carry
/// the field.
///
/// # Example
///
/// ```rust
/// use safe_page::input::RawInput;
/// use safe_page::schema::{Schema, Typed};
///
/// #[derive(serde::Deserialize)]
/// #[serde(rename_all = "lowercase")]
/// pub enum Theme {
///     Light,
///     Dark,
/// }
///
/// #[derive(serde::Deserialize)]
/// pub struct Search {
///     #[serde(default = "light")]
///     theme: Theme,
///     q: Option<String>,
/// }
///
/// fn light() -> Theme {
///     Theme::Light
/// }
///
/// let search = Typed::<Search>::new()
///     .parse(&RawInput::from_query("theme=dark"))
///     .unwrap();
/// assert!(matches!(search.theme, Theme::Dark));
/// assert!(search.q.is_none());
/// ```
pub struct Typed<T> {
    shape: Option<Shape>,
    // `fn() -> T` keeps `Typed<T>` `Send` and `Sync` regardless of `T`.
    _output: PhantomData<fn() -> T>,
}

impl<T> Typed<T>
where
    T: DeserializeOwned,
{
    pub fn new() -> Self {
        Self {
            shape: struct_fields::<T>().map(field_shape::<T>),
            _output: PhantomData,
        }
    }
}

/// Find out which fields ask for a type that inputs can't provide.
///
/// Each field is fed a synthetic value on its own, so that an optional or defaulted field
/// is inspected just like a required one.
fn field_shape<T: DeserializeOwned>(fields: &'static [&'static str]) -> Shape {
    let fields = fields
        .iter()
        .map(|name| {
            let raw = RawInput::new().with(*name, "");
            let kind = match <T as Deserialize>::deserialize(InputDeserializer::new(&raw)) {
                Err(e) => match e.kind {
                    ErrorKind::UnsupportedType { name: type_name } => FieldKind::Unsupported {
                        type_name: type_name.to_owned(),
                    },
                    _ => FieldKind::Opaque,
                },
                Ok(_) => FieldKind::Opaque,
            };
            FieldDescriptor {
                name: (*name).to_owned(),
                kind,
                default: None,
            }
        })
        .collect();
    Shape::new(fields)
}

impl<T> Default for Typed<T>
where
    T: DeserializeOwned,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Typed<T> {
    fn clone(&self) -> Self {
        Self {
            shape: self.shape.clone(),
            _output: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Typed<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Typed")
            .field("type", &std::any::type_name::<T>())
            .field("shape", &self.shape)
            .finish()
    }
}

impl<T> Schema for Typed<T>
where
    T: DeserializeOwned + Send + 'static,
{
    type Output = T;

    fn parse(&self, raw: &RawInput) -> Result<T, SchemaError> {
        // Unsupported fields that the input leaves out would otherwise look like missing ones.
        if let Some(shape) = &self.shape {
            check_shape(shape)?;
        }
        serde_path_to_error::deserialize(InputDeserializer::new(raw)).map_err(|e| {
            let path = e.path().to_string();
            // `serde_path_to_error` renders the root path as `.`.
            let path = if path == "." { String::new() } else { path };
            match e.into_inner().kind {
                ErrorKind::UnsupportedType { name } => {
                    ConfigurationError::UnsupportedFieldKind {
                        field: path,
                        type_name: name.to_owned(),
                    }
                    .into()
                }
                ErrorKind::MissingField { field } => {
                    let path = if path.is_empty() {
                        field.to_owned()
                    } else {
                        format!("{path}.{field}")
                    };
                    ValidationError::new(vec![Issue::new(path, "Required")]).into()
                }
                ErrorKind::Message(message) => {
                    ValidationError::new(vec![Issue::new(path, message)]).into()
                }
            }
        })
    }

    fn shape(&self) -> Option<Shape> {
        self.shape.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(serde::Deserialize, Debug, PartialEq)]
    #[serde(rename_all = "lowercase")]
    enum Category {
        Tech,
        Design,
        Business,
    }

    #[derive(serde::Deserialize, Debug, PartialEq)]
    struct PostParams {
        category: Category,
        slug: String,
    }

    #[derive(serde::Deserialize, Debug, PartialEq)]
    struct Filters {
        #[serde(default = "general")]
        tags: Vec<String>,
        sort: Option<String>,
    }

    fn general() -> Vec<String> {
        vec!["general".into()]
    }

    #[test]
    fn valid_input() {
        let raw = RawInput::new().with("category", "design").with("slug", "hello");
        let params = Typed::<PostParams>::new().parse(&raw).unwrap();
        assert_eq!(
            params,
            PostParams {
                category: Category::Design,
                slug: "hello".into()
            }
        );
    }

    #[test]
    fn unknown_enum_variants_are_reported_at_their_path() {
        let raw = RawInput::new().with("category", "invalid").with("slug", "x");
        let SchemaError::Validation(err) = Typed::<PostParams>::new().parse(&raw).unwrap_err()
        else {
            panic!("Expected a validation error");
        };
        insta::assert_snapshot!(err, @r"
        Invalid input.
        - `category`: unknown variant `invalid`, expected one of `tech`, `design`, `business`
        ");
    }

    #[test]
    fn missing_fields_are_required() {
        let raw = RawInput::new().with("category", "tech");
        let SchemaError::Validation(err) = Typed::<PostParams>::new().parse(&raw).unwrap_err()
        else {
            panic!("Expected a validation error");
        };
        assert_eq!(err.issues(), &[Issue::new("slug", "Required")]);
    }

    #[test]
    fn defaults_and_optional_fields() {
        let filters = Typed::<Filters>::new().parse(&RawInput::new()).unwrap();
        assert_eq!(
            filters,
            Filters {
                tags: vec!["general".into()],
                sort: None
            }
        );

        let raw = RawInput::new().with("sort", None::<String>);
        let filters = Typed::<Filters>::new().parse(&raw).unwrap();
        assert_eq!(filters.sort, None);
    }

    #[test]
    fn element_paths_are_tracked() {
        #[derive(serde::Deserialize, Debug)]
        struct Tags {
            #[allow(dead_code)]
            tags: Vec<Category>,
        }
        let raw = RawInput::from_query("tags=tech&tags=sports");
        let SchemaError::Validation(err) = Typed::<Tags>::new().parse(&raw).unwrap_err() else {
            panic!("Expected a validation error");
        };
        assert_eq!(err.issues()[0].path, "tags[1]");
    }

    #[test]
    fn non_string_fields_are_configuration_errors() {
        #[derive(serde::Deserialize, Debug)]
        struct Pagination {
            #[allow(dead_code)]
            page: u32,
        }
        let raw = RawInput::new().with("page", "2");
        let err = Typed::<Pagination>::new().parse(&raw).unwrap_err();
        assert!(!err.is_client_error());
        insta::assert_snapshot!(err, @"`page` asks for a `u32`, which can't be extracted from route or query parameters. Their values are always strings or lists of strings");
    }

    #[test]
    fn unsupported_fields_are_configuration_errors_even_when_missing() {
        #[derive(serde::Deserialize, Debug)]
        struct Pagination {
            #[allow(dead_code)]
            page: u32,
        }
        let err = Typed::<Pagination>::new()
            .parse(&RawInput::new())
            .unwrap_err();
        assert!(!err.is_client_error());
        assert!(matches!(
            err,
            SchemaError::Configuration(ConfigurationError::UnsupportedFieldKind { ref field, .. }) if field == "page"
        ));

        #[derive(serde::Deserialize, Debug)]
        struct Limit {
            #[allow(dead_code)]
            #[serde(default)]
            limit: Option<u32>,
        }
        let err = Typed::<Limit>::new().parse(&RawInput::new()).unwrap_err();
        insta::assert_snapshot!(err, @"`limit` asks for a `u32`, which can't be extracted from route or query parameters. Their values are always strings or lists of strings");
    }

    #[test]
    fn shape_flags_unsupported_fields() {
        #[derive(serde::Deserialize, Debug)]
        #[allow(dead_code)]
        struct Listing {
            category: Category,
            page: u32,
            ids: Vec<u64>,
            q: Option<String>,
        }
        let shape = Typed::<Listing>::new().shape().unwrap();
        let kinds: Vec<_> = shape
            .fields()
            .iter()
            .map(|f| (f.name.as_str(), f.kind.clone()))
            .collect();
        assert_eq!(
            kinds,
            [
                ("category", FieldKind::Opaque),
                (
                    "page",
                    FieldKind::Unsupported {
                        type_name: "u32".into()
                    }
                ),
                (
                    "ids",
                    FieldKind::Unsupported {
                        type_name: "u64".into()
                    }
                ),
                ("q", FieldKind::Opaque),
            ]
        );
    }

    #[test]
    fn shape_lists_the_struct_fields() {
        let shape = Typed::<PostParams>::new().shape().unwrap();
        let names: Vec<_> = shape.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["category", "slug"]);
        assert!(shape.fields().iter().all(|f| f.kind == FieldKind::Opaque));
    }
}
