//! Errors that can happen when configuring a page or validating its inputs.
use std::fmt::Write;
use std::str::Utf8Error;

/// The error returned by [`Schema::parse`] when the raw input can't be turned into the
/// schema's output.
///
/// See the documentation of each variant for more details.
///
/// [`Schema::parse`]: crate::schema::Schema::parse
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SchemaError {
    #[error(transparent)]
    /// See [`ValidationError`] for details.
    Validation(ValidationError),
    #[error(transparent)]
    /// See [`ConfigurationError`] for details.
    Configuration(ConfigurationError),
}

impl SchemaError {
    /// `true` if the failure was caused by the caller, i.e. the raw input doesn't
    /// satisfy the schema.
    /// `false` if the failure was caused by a programmer error (e.g. a field asking for a `u32`).
    ///
    /// Hosts usually map the former to a `400 Bad Request` and the latter to an
    /// opaque `500 Internal Server Error`.
    pub fn is_client_error(&self) -> bool {
        match self {
            SchemaError::Validation(_) => true,
            SchemaError::Configuration(_) => false,
        }
    }

    /// Returns the underlying [`ValidationError`], if this is a validation failure.
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            SchemaError::Validation(e) => Some(e),
            SchemaError::Configuration(_) => None,
        }
    }
}

impl From<ValidationError> for SchemaError {
    fn from(e: ValidationError) -> Self {
        SchemaError::Validation(e)
    }
}

impl From<ConfigurationError> for SchemaError {
    fn from(e: ConfigurationError) -> Self {
        SchemaError::Configuration(e)
    }
}

/// The raw input was delivered, but it doesn't satisfy the schema.
///
/// It carries one [`Issue`] for each field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    issues: Vec<Issue>,
}

impl ValidationError {
    pub(crate) fn new(issues: Vec<Issue>) -> Self {
        debug_assert!(!issues.is_empty());
        Self { issues }
    }

    /// All the issues that were detected, in field declaration order.
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    /// The first issue reported for the given field path, if any.
    pub fn issue_at(&self, path: &str) -> Option<&Issue> {
        self.issues.iter().find(|i| i.path == path)
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Invalid input.")?;
        for issue in &self.issues {
            f.write_char('\n')?;
            write!(f, "- {issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// A single validation failure, attached to the path of the offending field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    /// The path of the field that failed validation, e.g. `category` or `tags[1]`.
    ///
    /// It is empty if the failure is not tied to a specific field.
    pub path: String,
    /// A human-readable description of the failure.
    pub message: String,
}

impl Issue {
    pub(crate) fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "(root): {}", self.message)
        } else {
            write!(f, "`{}`: {}", self.path, self.message)
        }
    }
}

/// A schema (or a route declaration) can never be satisfied by route or query inputs.
///
/// These are programmer errors. They are detected when a schema is attached to a
/// [`PageBuilder`](crate::PageBuilder) whenever the schema exposes enough information
/// about its shape, otherwise the first time the corresponding input is validated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// A field asks for a kind of value that route and query inputs can't provide.
    #[error(
        "`{field}` asks for a `{type_name}`, which can't be extracted from route or query \
        parameters. Their values are always strings or lists of strings"
    )]
    UnsupportedFieldKind {
        /// The path of the offending field.
        field: String,
        /// The name of the requested type.
        type_name: String,
    },
    /// The default value of a field is not compatible with the field's kind.
    #[error("The default value for `{field}` is invalid: {reason}")]
    InvalidDefault {
        /// The name of the offending field.
        field: String,
        /// Why the default can't be used.
        reason: String,
    },
    /// The route was never declared in the [`RouteRegistry`](crate::route::RouteRegistry).
    #[error("`{route}` is not a registered route")]
    UnknownRoute {
        /// The route identifier.
        route: String,
    },
    /// A params schema is trying to extract a route parameter that doesn't exist.
    #[error("{}", unknown_route_parameter(.route, .field, .route_parameters))]
    UnknownRouteParameter {
        /// The route identifier.
        route: String,
        /// The field that has no matching route parameter.
        field: String,
        /// The parameters declared for the route.
        route_parameters: Vec<String>,
    },
    /// A route parameter has no corresponding field in the params schema.
    #[error(
        "`{route}` has a `{parameter}` route parameter, but the params schema doesn't declare it"
    )]
    MissingRouteParameter {
        /// The route identifier.
        route: String,
        /// The name of the route parameter.
        parameter: String,
    },
    /// A params schema field doesn't match the kind of the corresponding route parameter.
    #[error(
        "`{parameter}` in `{route}` is {expected}, but the params schema declares it as {actual}"
    )]
    RouteParameterKindMismatch {
        /// The route identifier.
        route: String,
        /// The name of the route parameter.
        parameter: String,
        /// The kind of value the route parameter carries.
        expected: &'static str,
        /// The kind of value the schema expects.
        actual: &'static str,
    },
    /// A route template can't be parsed.
    #[error("`{template}` is not a valid route template: {reason}")]
    InvalidRouteTemplate {
        /// The offending template.
        template: String,
        /// Why the template was rejected.
        reason: String,
    },
}

fn unknown_route_parameter(route: &str, field: &str, route_parameters: &[String]) -> String {
    if route_parameters.is_empty() {
        return format!(
            "The params schema is trying to extract `{field}`, \
            but there are no route parameters in `{route}`"
        );
    }
    let mut available = String::new();
    for (i, p) in route_parameters.iter().enumerate() {
        if i > 0 {
            available.push_str(", ");
        }
        let _ = write!(available, "`{p}`");
    }
    format!(
        "The params schema is trying to extract `{field}`, \
        but `{route}` doesn't have a route parameter with that name. \
        The available route parameters are: {available}"
    )
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
/// One of the percent-decoded route parameters is not a valid UTF8 string.
///
/// Route parameters must be percent-encoded whenever they contain characters that are not
/// URL safe, e.g. whitespaces.
/// [`RawInput::from_encoded_route_params`] percent-decodes them; this error is returned when
/// the decoded bytes are not a well-formed UTF8 string.
///
/// # Example
///
/// `/address/the%20street` decodes `address_id` into `the street`.
/// `/address/dirty%DE~%C7%1FY`, instead, decodes into a sequence of bytes that cannot be
/// interpreted as UTF8: this error is returned.
///
/// [`RawInput::from_encoded_route_params`]: crate::input::RawInput::from_encoded_route_params
#[error(
    "`{invalid_raw_segment}` cannot be used as `{invalid_key}` \
since it is not a well-formed UTF8 string when percent-decoded"
)]
pub struct InvalidUtf8InRouteParam {
    pub(crate) invalid_key: String,
    pub(crate) invalid_raw_segment: String,
    #[source]
    pub(crate) source: Utf8Error,
}

#[derive(Debug, thiserror::Error)]
#[error("Failed to load the route manifest")]
/// The error returned by [`RouteManifest::load`](crate::config::RouteManifest::load).
pub struct ManifestLoadError(#[source] pub(crate) anyhow::Error);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_lists_every_issue() {
        let err = ValidationError::new(vec![
            Issue::new("category", "Required"),
            Issue::new("", "Expected an object"),
        ]);
        insta::assert_snapshot!(err, @r"
        Invalid input.
        - `category`: Required
        - (root): Expected an object
        ");
        assert_eq!(err.issue_at("category").unwrap().message, "Required");
        assert!(err.issue_at("status").is_none());
    }

    #[test]
    fn unknown_route_parameter_lists_the_available_ones() {
        let err = ConfigurationError::UnknownRouteParameter {
            route: "/blog/[category]/[slug]".into(),
            field: "id".into(),
            route_parameters: vec!["category".into(), "slug".into()],
        };
        insta::assert_snapshot!(err, @"The params schema is trying to extract `id`, but `/blog/[category]/[slug]` doesn't have a route parameter with that name. The available route parameters are: `category`, `slug`");

        let err = ConfigurationError::UnknownRouteParameter {
            route: "/about".into(),
            field: "id".into(),
            route_parameters: vec![],
        };
        insta::assert_snapshot!(err, @"The params schema is trying to extract `id`, but there are no route parameters in `/about`");
    }

    #[test]
    fn only_validation_failures_are_client_errors() {
        let validation: SchemaError = ValidationError::new(vec![Issue::new("id", "Required")]).into();
        assert!(validation.is_client_error());
        assert!(validation.as_validation().is_some());

        let configuration: SchemaError = ConfigurationError::UnsupportedFieldKind {
            field: "page".into(),
            type_name: "u32".into(),
        }
        .into();
        assert!(!configuration.is_client_error());
        assert!(configuration.as_validation().is_none());
    }
}
