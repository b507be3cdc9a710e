//! Load route declarations from configuration.
//!
//! [`RouteManifest`] is the key type in this module.
//!
//! # Format
//!
//! A manifest lists the application's routes under the `routes` key.
//! Each route is either a template, whose parameters are extracted from its
//! bracketed segments, or an explicit declaration with an identifier and
//! a list of parameter names:
//!
//! ```yaml
//! routes:
//!   - "/blog/[category]/[slug]"
//!   - "/docs/[...path]"
//!   - route: profile
//!     params: ["user_id"]
//! ```
//!
//! In an explicit declaration, a parameter name prefixed with `...` is a catch-all
//! parameter, while `[[...name]]` is an optional catch-all.
use std::path::Path;

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};

use crate::errors::{ConfigurationError, ManifestLoadError};
use crate::route::{ParameterKind, RouteParameters, RouteRegistry};

/// The prefix for environment variables that override the manifest file.
pub const ENV_PREFIX: &str = "SAFE_PAGE_";

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
/// The list of routes known to the application.
///
/// Check out the [module documentation](self) for the expected format.
///
/// # Example
///
/// ```rust
/// use safe_page::config::RouteManifest;
///
/// let manifest = RouteManifest::from_yaml_str(
///     r#"
/// routes:
///   - "/blog/[category]/[slug]"
///   - route: profile
///     params: ["user_id"]
/// "#,
/// )
/// .unwrap();
/// let registry = manifest.into_registry().unwrap();
/// assert!(registry.contains("profile"));
/// ```
pub struct RouteManifest {
    #[serde(default)]
    pub routes: Vec<RouteDeclaration>,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(untagged)]
/// A single entry in a [`RouteManifest`].
pub enum RouteDeclaration {
    /// A route template, e.g. `/blog/[category]/[slug]`.
    Template(String),
    /// A route identifier with its parameters.
    Explicit {
        route: String,
        #[serde(default)]
        params: Vec<String>,
    },
}

impl RouteManifest {
    /// Load the manifest from a YAML file.
    ///
    /// Values set via environment variables take precedence over the ones in the file.
    /// Environment variables must be prefixed with [`ENV_PREFIX`], and nested keys
    /// are separated by `__`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ManifestLoadError> {
        let path = path.as_ref();
        let span = tracing::info_span!(
            "Loading route manifest",
            manifest.path = %path.display(),
        );
        let _guard = span.enter();

        // `Yaml::file` silently yields an empty provider for missing files.
        if !path.is_file() {
            return Err(ManifestLoadError(anyhow::anyhow!(
                "`{}` doesn't exist or it isn't a file",
                path.display()
            )));
        }

        let figment = Figment::new()
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));
        let manifest: Self = figment
            .extract()
            .with_context(|| format!("Failed to parse the route manifest at `{}`", path.display()))
            .map_err(ManifestLoadError)?;
        tracing::info!(routes = manifest.routes.len(), "Loaded route manifest");
        Ok(manifest)
    }

    /// Parse the manifest from a YAML string.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ManifestLoadError> {
        Figment::new()
            .merge(Yaml::string(yaml))
            .extract()
            .context("Failed to parse the route manifest")
            .map_err(ManifestLoadError)
    }

    /// Register every route in a new [`RouteRegistry`].
    pub fn into_registry(self) -> Result<RouteRegistry, ConfigurationError> {
        let mut registry = RouteRegistry::new();
        for declaration in self.routes {
            match declaration {
                RouteDeclaration::Template(template) => {
                    registry.register_template(template)?;
                }
                RouteDeclaration::Explicit { route, params } => {
                    let parameters = params
                        .into_iter()
                        .map(|name| parse_parameter(&route, name))
                        .try_fold(RouteParameters::new(), |acc, param| {
                            param.map(|(name, kind)| acc.with(name, kind))
                        })?;
                    registry.register(route, parameters);
                }
            }
        }
        Ok(registry)
    }
}

fn parse_parameter(
    route: &str,
    name: String,
) -> Result<(String, ParameterKind), ConfigurationError> {
    let (bare, kind) = if let Some(inner) = name
        .strip_prefix("[[...")
        .and_then(|n| n.strip_suffix("]]"))
    {
        (inner, ParameterKind::OptionalCatchAll)
    } else if let Some(inner) = name.strip_prefix("...") {
        (inner, ParameterKind::CatchAll)
    } else {
        (name.as_str(), ParameterKind::Single)
    };
    if bare.is_empty() || bare.contains(['[', ']', '.', '/']) {
        return Err(ConfigurationError::InvalidRouteTemplate {
            template: route.to_owned(),
            reason: format!("`{name}` is not a valid parameter name"),
        });
    }
    Ok((bare.to_owned(), kind))
}
