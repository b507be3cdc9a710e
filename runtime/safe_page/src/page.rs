use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tracing_log_error::log_error;

use crate::builder::{Configured, PageBuilder, Slot, Unset};
use crate::errors::SchemaError;
use crate::input::{Deferred, RawInput};
use crate::schema::Schema;

/// The raw inputs handed over by the hosting framework for a single request.
///
/// Either input can be missing: a page with no dynamic route segments has no route
/// parameters, for example.
#[derive(Default)]
pub struct PageProps {
    /// The raw route parameters.
    pub params: Option<Deferred<RawInput>>,
    /// The raw query parameters.
    pub search_params: Option<Deferred<RawInput>>,
}

impl PageProps {
    /// No inputs at all.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params<F>(mut self, params: F) -> Self
    where
        F: Future<Output = RawInput> + Send + 'static,
    {
        self.params = Some(params.boxed());
        self
    }

    pub fn with_search_params<F>(mut self, search_params: F) -> Self
    where
        F: Future<Output = RawInput> + Send + 'static,
    {
        self.search_params = Some(search_params.boxed());
        self
    }
}

impl std::fmt::Debug for PageProps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageProps")
            .field("params", &self.params.as_ref().map(|_| "<deferred>"))
            .field("search_params", &self.search_params.as_ref().map(|_| "<deferred>"))
            .finish()
    }
}

/// What the handler receives when at least one schema has been attached.
///
/// A field is `None` when its schema was not attached or when the hosting framework
/// didn't supply the corresponding input.
pub struct PageOptions<P, S> {
    /// The validated route parameters.
    pub params: Option<Validated<P>>,
    /// The validated query parameters.
    pub search_params: Option<Validated<S>>,
}

/// The output type for a slot that has no schema attached.
///
/// It can't be constructed: the corresponding field in [`PageOptions`] is always `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unconfigured {}

/// A deferred input, validated against a schema once it becomes available.
///
/// It resolves to the schema's output or to the error returned by the schema, unchanged.
/// If the raw input never becomes available, neither does the validated one.
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Validated<T> {
    inner: BoxFuture<'static, Result<T, SchemaError>>,
}

impl<T> Validated<T> {
    pub(crate) fn new<S>(slot: Slot, schema: Arc<S>, raw: Deferred<RawInput>) -> Self
    where
        S: Schema<Output = T>,
    {
        tracing::trace!(slot = %slot, "Attached a validation continuation");
        let inner = async move {
            let raw = raw.await;
            schema.parse(&raw).inspect_err(|e| {
                log_error!(
                    e,
                    level: tracing::Level::DEBUG,
                    slot = %slot,
                    "Input failed validation"
                );
            })
        }
        .boxed();
        Self { inner }
    }
}

impl<T> Future for Validated<T> {
    type Output = Result<T, SchemaError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}

impl<T> std::fmt::Debug for Validated<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validated").finish_non_exhaustive()
    }
}

mod sealed {
    pub trait Sealed {}

    impl<P, S> Sealed for super::PageBuilder<P, S> {}
}

/// Turn the raw [`PageProps`] into the arguments the handler expects.
///
/// It is implemented for every valid combination of schema slots in a [`PageBuilder`].
/// It can't be implemented outside of this crate.
pub trait Assemble: sealed::Sealed {
    /// The arguments the handler is invoked with.
    type Args;

    #[doc(hidden)]
    fn arguments(&self, props: PageProps) -> Self::Args;
}

impl Assemble for PageBuilder<Unset, Unset> {
    type Args = ();

    fn arguments(&self, _props: PageProps) {}
}

impl<P> Assemble for PageBuilder<Configured<P>, Unset>
where
    P: Schema,
{
    type Args = PageOptions<P::Output, Unconfigured>;

    fn arguments(&self, props: PageProps) -> Self::Args {
        let params = props
            .params
            .map(|raw| Validated::new(Slot::Params, self.params.0.clone(), raw));
        PageOptions {
            params,
            search_params: None,
        }
    }
}

impl<S> Assemble for PageBuilder<Unset, Configured<S>>
where
    S: Schema,
{
    type Args = PageOptions<Unconfigured, S::Output>;

    fn arguments(&self, props: PageProps) -> Self::Args {
        let search_params = props
            .search_params
            .map(|raw| Validated::new(Slot::SearchParams, self.search_params.0.clone(), raw));
        PageOptions {
            params: None,
            search_params,
        }
    }
}

impl<P, S> Assemble for PageBuilder<Configured<P>, Configured<S>>
where
    P: Schema,
    S: Schema,
{
    type Args = PageOptions<P::Output, S::Output>;

    fn arguments(&self, props: PageProps) -> Self::Args {
        // Route parameters first, query parameters second.
        let params = props
            .params
            .map(|raw| Validated::new(Slot::Params, self.params.0.clone(), raw));
        let search_params = props
            .search_params
            .map(|raw| Validated::new(Slot::SearchParams, self.search_params.0.clone(), raw));
        PageOptions {
            params,
            search_params,
        }
    }
}

/// The function that renders a page, given the arguments assembled from its inputs.
///
/// It is implemented for every `Fn() -> impl Future` (pages with no schema) and for every
/// `Fn(PageOptions<P, S>) -> impl Future` (pages with at least one schema).
pub trait PageHandler<Args>: Send + Sync + 'static {
    /// The value the page renders to.
    type Output;
    /// The future returned by the handler.
    type Future: Future<Output = Self::Output>;

    fn call(&self, args: Args) -> Self::Future;
}

impl<F, Fut> PageHandler<()> for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future,
{
    type Output = Fut::Output;
    type Future = Fut;

    fn call(&self, _args: ()) -> Fut {
        self()
    }
}

impl<F, Fut, P, S> PageHandler<PageOptions<P, S>> for F
where
    F: Fn(PageOptions<P, S>) -> Fut + Send + Sync + 'static,
    Fut: Future,
{
    type Output = Fut::Output;
    type Future = Fut;

    fn call(&self, args: PageOptions<P, S>) -> Fut {
        self(args)
    }
}

/// A page, ready to be rendered.
///
/// It is built by [`PageBuilder`]'s `page` method and it holds no per-request state:
/// it can be cloned, shared across threads and rendered concurrently.
pub struct Page<P, S, H> {
    state: PageBuilder<P, S>,
    handler: Arc<H>,
}

impl<P, S, H> Page<P, S, H> {
    pub(crate) fn new(state: PageBuilder<P, S>, handler: H) -> Self {
        Self {
            state,
            handler: Arc::new(handler),
        }
    }

    /// The route this page is bound to, if any.
    pub fn route(&self) -> Option<&str> {
        self.state.route()
    }
}

impl<P, S, H> Clone for Page<P, S, H>
where
    P: Clone,
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<P, S, H> Page<P, S, H>
where
    PageBuilder<P, S>: Assemble,
    H: PageHandler<<PageBuilder<P, S> as Assemble>::Args>,
{
    /// Render the page for a single request.
    ///
    /// The handler is invoked right away: validation runs when the handler awaits the
    /// validated inputs, not before. The handler's future is returned as is.
    pub fn render(&self, props: PageProps) -> H::Future {
        let args = self.state.arguments(props);
        self.handler.call(args)
    }
}

impl<H> Page<Unset, Unset, H>
where
    H: PageHandler<()>,
{
    /// Render a page that has no schemas, without passing any input.
    pub fn render_without_props(&self) -> H::Future {
        self.handler.call(())
    }
}

impl<P, S, H> std::fmt::Debug for Page<P, S, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("route", &self.route())
            .field("handler", &std::any::type_name::<H>())
            .finish_non_exhaustive()
    }
}
