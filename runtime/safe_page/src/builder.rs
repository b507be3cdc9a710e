use std::future::Future;
use std::sync::Arc;

use crate::errors::ConfigurationError;
use crate::page::{Page, PageOptions, Unconfigured};
use crate::route::{RouteParameters, RouteRegistry};
use crate::schema::{Schema, check_shape};

/// A schema slot with nothing attached to it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Unset;

/// A schema slot with a schema attached to it.
#[derive(Debug)]
pub struct Configured<S>(pub(crate) Arc<S>);

impl<S> Clone for Configured<S> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<S> Configured<S> {
    /// The attached schema.
    pub fn schema(&self) -> &S {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    Params,
    SearchParams,
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Slot::Params => f.write_str("params"),
            Slot::SearchParams => f.write_str("search_params"),
        }
    }
}

#[derive(Debug)]
pub(crate) struct RouteBinding {
    pub(crate) name: String,
    pub(crate) parameters: Arc<RouteParameters>,
}

/// Declare the schemas that a page's route and query parameters must satisfy.
///
/// A `PageBuilder` is immutable: [`params`](Self::params) and
/// [`search_params`](Self::search_params) return a new builder, leaving the original one
/// untouched. The slots that have been configured are tracked in the builder's type, so
/// that `page` can require the right handler signature.
///
/// # Example
///
/// ```rust
/// use safe_page::PageBuilder;
/// use safe_page::schema::{ObjectSchema, enumeration};
///
/// # fn main() -> Result<(), safe_page::errors::ConfigurationError> {
/// let page = PageBuilder::new()
///     .search_params(ObjectSchema::new().field("theme", enumeration(["light", "dark"]).default("light")))?
///     .page(|options| async move {
///         let query = options.search_params.expect("No query parameters").await?;
///         Ok::<_, safe_page::errors::SchemaError>(format!("Theme: {}", query.get_str("theme").unwrap()))
///     });
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PageBuilder<P = Unset, S = Unset> {
    pub(crate) route: Option<Arc<RouteBinding>>,
    pub(crate) params: P,
    pub(crate) search_params: S,
}

impl PageBuilder {
    /// A builder with no schemas and no route binding.
    pub fn new() -> Self {
        Self {
            route: None,
            params: Unset,
            search_params: Unset,
        }
    }

    /// A builder bound to a route in the registry.
    ///
    /// Any params schema with a known [`Shape`](crate::schema::Shape) will be checked
    /// against the parameters declared for the route.
    pub fn for_route(registry: &RouteRegistry, route: &str) -> Result<Self, ConfigurationError> {
        let parameters = registry
            .get_shared(route)
            .ok_or_else(|| ConfigurationError::UnknownRoute {
                route: route.to_owned(),
            })?;
        Ok(Self {
            route: Some(Arc::new(RouteBinding {
                name: route.to_owned(),
                parameters,
            })),
            params: Unset,
            search_params: Unset,
        })
    }
}

impl Default for PageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<P, S> PageBuilder<P, S> {
    /// The route this builder is bound to, if any.
    pub fn route(&self) -> Option<&str> {
        self.route.as_deref().map(|r| r.name.as_str())
    }

    /// Attach a schema for the route parameters.
    ///
    /// It replaces the params schema attached earlier, if any.
    /// The search params schema and the route binding are carried over.
    pub fn params<T>(&self, schema: T) -> Result<PageBuilder<Configured<T>, S>, ConfigurationError>
    where
        T: Schema,
        S: Clone,
    {
        if let Some(shape) = schema.shape() {
            check_shape(&shape)?;
            if let Some(route) = &self.route {
                route.parameters.check_params_shape(&route.name, &shape)?;
            }
        }
        tracing::debug!(slot = %Slot::Params, route = self.route(), "Attached a schema");
        Ok(PageBuilder {
            route: self.route.clone(),
            params: Configured(Arc::new(schema)),
            search_params: self.search_params.clone(),
        })
    }

    /// Attach a schema for the query parameters.
    ///
    /// It replaces the search params schema attached earlier, if any.
    /// The params schema and the route binding are carried over.
    pub fn search_params<T>(
        &self,
        schema: T,
    ) -> Result<PageBuilder<P, Configured<T>>, ConfigurationError>
    where
        T: Schema,
        P: Clone,
    {
        if let Some(shape) = schema.shape() {
            check_shape(&shape)?;
        }
        tracing::debug!(slot = %Slot::SearchParams, route = self.route(), "Attached a schema");
        Ok(PageBuilder {
            route: self.route.clone(),
            params: self.params.clone(),
            search_params: Configured(Arc::new(schema)),
        })
    }
}

impl PageBuilder<Unset, Unset> {
    /// Assemble the page.
    ///
    /// No schema has been attached, therefore the handler takes no arguments: whatever
    /// inputs are passed to [`Page::render`] are discarded.
    pub fn page<H, Fut>(&self, handler: H) -> Page<Unset, Unset, H>
    where
        H: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future,
    {
        Page::new(self.clone(), handler)
    }
}

impl<P> PageBuilder<Configured<P>, Unset>
where
    P: Schema,
{
    /// Assemble the page.
    ///
    /// The handler receives the validated route parameters, as a deferred value.
    pub fn page<H, Fut>(&self, handler: H) -> Page<Configured<P>, Unset, H>
    where
        H: Fn(PageOptions<P::Output, Unconfigured>) -> Fut + Send + Sync + 'static,
        Fut: Future,
    {
        Page::new(self.clone(), handler)
    }
}

impl<S> PageBuilder<Unset, Configured<S>>
where
    S: Schema,
{
    /// Assemble the page.
    ///
    /// The handler receives the validated query parameters, as a deferred value.
    pub fn page<H, Fut>(&self, handler: H) -> Page<Unset, Configured<S>, H>
    where
        H: Fn(PageOptions<Unconfigured, S::Output>) -> Fut + Send + Sync + 'static,
        Fut: Future,
    {
        Page::new(self.clone(), handler)
    }
}

impl<P, S> PageBuilder<Configured<P>, Configured<S>>
where
    P: Schema,
    S: Schema,
{
    /// Assemble the page.
    ///
    /// The handler receives both the validated route parameters and the validated query
    /// parameters, as two independent deferred values.
    pub fn page<H, Fut>(&self, handler: H) -> Page<Configured<P>, Configured<S>, H>
    where
        H: Fn(PageOptions<P::Output, S::Output>) -> Fut + Send + Sync + 'static,
        Fut: Future,
    {
        Page::new(self.clone(), handler)
    }
}
