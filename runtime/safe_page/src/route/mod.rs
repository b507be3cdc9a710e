//! Route declarations, used to cross-check params schemas against the parameters each
//! route actually provides.
//!
//! A route template is a `/`-separated path where dynamic segments are wrapped in brackets:
//!
//! - `[slug]` matches a single segment;
//! - `[...path]` matches one or more segments;
//! - `[[...path]]` matches zero or more segments.
//!
//! ```rust
//! use safe_page::route::{ParameterKind, RouteParameters};
//!
//! let params = RouteParameters::parse_template("/docs/[version]/[...path]").unwrap();
//! assert_eq!(params.get("version"), Some(ParameterKind::Single));
//! assert_eq!(params.get("path"), Some(ParameterKind::CatchAll));
//! ```
use std::sync::Arc;

use indexmap::IndexMap;

use crate::errors::ConfigurationError;
use crate::schema::{FieldKind, Shape};

/// How many path segments a route parameter captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    /// Exactly one segment. Its value is a string.
    Single,
    /// One or more segments. Its value is a list of strings.
    CatchAll,
    /// Zero or more segments. Its value is a list of strings, possibly missing.
    OptionalCatchAll,
}

impl ParameterKind {
    fn label(self) -> &'static str {
        match self {
            ParameterKind::Single => "a single string",
            ParameterKind::CatchAll | ParameterKind::OptionalCatchAll => "a list of strings",
        }
    }

    fn accepts(self, kind: &FieldKind) -> bool {
        match self {
            ParameterKind::Single => matches!(
                kind,
                FieldKind::String | FieldKind::Enumeration(_) | FieldKind::Opaque
            ),
            ParameterKind::CatchAll | ParameterKind::OptionalCatchAll => {
                matches!(kind, FieldKind::StringArray | FieldKind::Opaque)
            }
        }
    }
}

/// The parameters of a route, in the order they appear in its template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteParameters(IndexMap<String, ParameterKind>);

impl RouteParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract the parameters from a route template, e.g. `/blog/[category]/[slug]`.
    pub fn parse_template(template: &str) -> Result<Self, ConfigurationError> {
        let invalid = |reason: String| ConfigurationError::InvalidRouteTemplate {
            template: template.to_owned(),
            reason,
        };

        let mut params = Self::new();
        let mut catch_all: Option<&str> = None;
        for segment in template.split('/').filter(|s| !s.is_empty()) {
            if let Some(previous) = catch_all {
                return Err(invalid(format!(
                    "the catch-all parameter `{previous}` must be the last segment"
                )));
            }
            // `[slug` is unterminated, `post-[id]` and `[id]x` mix static text in.
            let opened = segment.starts_with('[');
            let unterminated = opened && !segment.contains(']');
            let bracketed = opened && segment.ends_with(']');
            if !unterminated && !bracketed && segment.contains(['[', ']']) {
                return Err(invalid(format!(
                    "`{segment}` mixes static text and a route parameter"
                )));
            }
            let (name, kind) = if let Some(inner) = segment.strip_prefix("[[") {
                let inner = inner
                    .strip_suffix("]]")
                    .ok_or_else(|| invalid(format!("`{segment}` has an unterminated bracket")))?;
                let name = inner.strip_prefix("...").ok_or_else(|| {
                    invalid(format!(
                        "`{segment}` uses double brackets, but only catch-all parameters \
                        can be optional"
                    ))
                })?;
                (name, ParameterKind::OptionalCatchAll)
            } else if let Some(inner) = segment.strip_prefix('[') {
                let inner = inner
                    .strip_suffix(']')
                    .ok_or_else(|| invalid(format!("`{segment}` has an unterminated bracket")))?;
                match inner.strip_prefix("...") {
                    Some(name) => (name, ParameterKind::CatchAll),
                    None => (inner, ParameterKind::Single),
                }
            } else {
                continue;
            };

            if name.is_empty() {
                return Err(invalid("route parameters must have a name".into()));
            }
            if name.contains(['[', ']', '.']) {
                return Err(invalid(format!("`{name}` is not a valid parameter name")));
            }
            if params.0.insert(name.to_owned(), kind).is_some() {
                return Err(invalid(format!("`{name}` appears more than once")));
            }
            if kind != ParameterKind::Single {
                catch_all = Some(name);
            }
        }
        Ok(params)
    }

    /// Register an additional parameter.
    pub fn with(mut self, name: impl Into<String>, kind: ParameterKind) -> Self {
        self.0.insert(name.into(), kind);
        self
    }

    pub fn get(&self, name: &str) -> Option<ParameterKind> {
        self.0.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Verify that the fields in a params schema match the parameters of this route:
    /// every field maps to a parameter with a compatible kind, and every parameter
    /// has a field.
    ///
    /// Optional catch-all parameters can be left out, since the route may match without them.
    pub(crate) fn check_params_shape(
        &self,
        route: &str,
        shape: &Shape,
    ) -> Result<(), ConfigurationError> {
        for field in shape.fields() {
            let Some(kind) = self.get(&field.name) else {
                return Err(ConfigurationError::UnknownRouteParameter {
                    route: route.to_owned(),
                    field: field.name.clone(),
                    route_parameters: self.names().map(ToOwned::to_owned).collect(),
                });
            };
            if !kind.accepts(&field.kind) {
                return Err(ConfigurationError::RouteParameterKindMismatch {
                    route: route.to_owned(),
                    parameter: field.name.clone(),
                    expected: kind.label(),
                    actual: field.kind.label(),
                });
            }
        }
        let missing = self
            .0
            .iter()
            .filter(|(_, kind)| **kind != ParameterKind::OptionalCatchAll)
            .find(|(name, _)| shape.field(name).is_none());
        if let Some((name, _)) = missing {
            return Err(ConfigurationError::MissingRouteParameter {
                route: route.to_owned(),
                parameter: name.clone(),
            });
        }
        Ok(())
    }
}

/// Every parameter is assumed to capture a single segment.
impl<S> FromIterator<S> for RouteParameters
where
    S: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|name| (name.into(), ParameterKind::Single))
                .collect(),
        )
    }
}

/// The routes known to the application, keyed by route identifier.
///
/// Use it with [`PageBuilder::for_route`](crate::PageBuilder::for_route) to have params
/// schemas checked against the route they are meant for.
#[derive(Debug, Clone, Default)]
pub struct RouteRegistry {
    routes: IndexMap<String, Arc<RouteParameters>>,
}

impl RouteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route with an explicit set of parameters.
    ///
    /// Registering the same route twice replaces the previous declaration.
    pub fn register(&mut self, route: impl Into<String>, params: RouteParameters) -> &mut Self {
        let route = route.into();
        tracing::debug!(route = %route, parameters = params.len(), "Registered route");
        self.routes.insert(route, Arc::new(params));
        self
    }

    /// Register a route using its template as identifier.
    /// The parameters are extracted from the template.
    pub fn register_template(
        &mut self,
        template: impl Into<String>,
    ) -> Result<&mut Self, ConfigurationError> {
        let template = template.into();
        let params = RouteParameters::parse_template(&template)?;
        Ok(self.register(template, params))
    }

    pub fn get(&self, route: &str) -> Option<&RouteParameters> {
        self.routes.get(route).map(|p| p.as_ref())
    }

    pub(crate) fn get_shared(&self, route: &str) -> Option<Arc<RouteParameters>> {
        self.routes.get(route).cloned()
    }

    pub fn contains(&self, route: &str) -> bool {
        self.routes.contains_key(route)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
