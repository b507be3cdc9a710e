//! # safe_page
//!
//! Declare the shape of a page's route parameters and query parameters ahead of time,
//! and have them validated before the page handler gets to use them.
//!
//! Hosting frameworks usually hand over route and query parameters as deferred,
//! untyped string maps. `safe_page` sits between delivery and use:
//!
//! 1. Attach a [`Schema`](schema::Schema) for each input you care about using a [`PageBuilder`].
//! 2. Assemble a [`Page`] with your handler.
//! 3. For every request, call [`Page::render`] with the raw inputs. The handler is invoked
//!    right away and receives [`Validated`] inputs: awaiting one yields either the schema's
//!    output or the schema's error, unchanged.
//!
//! A page with no schemas gets a handler that takes no arguments at all.
//!
//! # Example
//!
//! ```rust
//! use safe_page::input::RawInput;
//! use safe_page::schema::{ObjectSchema, enumeration, string};
//! use safe_page::{PageBuilder, PageProps};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let page = PageBuilder::new()
//!     .params(ObjectSchema::new().field("id", string()))
//!     .unwrap()
//!     .search_params(
//!         ObjectSchema::new().field("theme", enumeration(["light", "dark"]).default("light")),
//!     )
//!     .unwrap()
//!     .page(|options| async move {
//!         let params = options.params.unwrap().await?;
//!         let query = options.search_params.unwrap().await?;
//!         Ok::<_, safe_page::errors::SchemaError>(format!(
//!             "Post {} in {} mode",
//!             params.get_str("id").unwrap(),
//!             query.get_str("theme").unwrap()
//!         ))
//!     });
//!
//! let props = PageProps::new()
//!     .with_params(async { RawInput::new().with("id", "42") })
//!     .with_search_params(async { RawInput::from_query("") });
//! assert_eq!(page.render(props).await.unwrap(), "Post 42 in light mode");
//! # }
//! ```
pub use builder::{Configured, PageBuilder, Unset};
pub use page::{Assemble, Page, PageHandler, PageOptions, PageProps, Unconfigured, Validated};

mod builder;
pub mod config;
pub mod errors;
pub mod input;
mod page;
pub mod route;
pub mod schema;
