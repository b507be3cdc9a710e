use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use safe_page::errors::{ConfigurationError, SchemaError};
use safe_page::input::{RawInput, RawValue};
use safe_page::route::RouteRegistry;
use safe_page::schema::{
    ObjectSchema, ParsedInput, Schema, Typed, Value, enumeration, string, string_array,
};
use safe_page::{PageBuilder, PageOptions, PageProps, Unconfigured};
use tokio::sync::oneshot;

fn post_params() -> ObjectSchema {
    ObjectSchema::new().field("category", enumeration(["tech", "design", "business"]))
}

fn display_options() -> ObjectSchema {
    ObjectSchema::new()
        .field("theme", enumeration(["light", "dark"]).default("light"))
        .field("tags", string_array().default(["general"]))
        .field("sort", enumeration(["name", "date"]).optional())
}

fn ready(input: RawInput) -> impl Future<Output = RawInput> + Send + 'static {
    std::future::ready(input)
}

#[tokio::test]
async fn schema_less_pages_are_called_without_arguments() {
    let calls = Arc::new(AtomicUsize::new(0));
    let page = PageBuilder::new().page({
        let calls = calls.clone();
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { "<h1>About</h1>" }
        }
    });

    assert_eq!(page.render_without_props().await, "<h1>About</h1>");
    assert_eq!(page.render(PageProps::new()).await, "<h1>About</h1>");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn schema_less_pages_discard_their_inputs() {
    let validated = Arc::new(AtomicUsize::new(0));
    let page = PageBuilder::new().page(|| async { "<h1>About</h1>" });

    // The raw inputs are never awaited.
    let props = PageProps::new()
        .with_params({
            let validated = validated.clone();
            async move {
                validated.fetch_add(1, Ordering::SeqCst);
                RawInput::new().with("id", "42")
            }
        })
        .with_search_params(ready(RawInput::from_query("theme=dark")));
    assert_eq!(page.render(props).await, "<h1>About</h1>");
    assert_eq!(validated.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn valid_params_are_handed_over() {
    let page = PageBuilder::new()
        .params(ObjectSchema::new().field("id", string()))
        .unwrap()
        .page(|options| async move { options.params.unwrap().await });

    let props = PageProps::new().with_params(ready(RawInput::new().with("id", "42")));
    let params = page.render(props).await.unwrap();
    assert_eq!(params, ParsedInput::from_iter([("id", "42")]));
}

#[tokio::test]
async fn invalid_params_reject_with_the_schema_error() {
    let schema = post_params();
    let page = PageBuilder::new()
        .params(schema.clone())
        .unwrap()
        .page(|options| async move { options.params.unwrap().await });

    let raw = RawInput::new().with("category", "invalid");
    let props = PageProps::new().with_params(ready(raw.clone()));
    let err = page.render(props).await.unwrap_err();

    assert!(err.is_client_error());
    let issues = err.as_validation().unwrap();
    assert!(issues.issue_at("category").is_some());

    // The error is the one returned by the schema, untouched.
    let direct = schema.parse(&raw).unwrap_err();
    assert_eq!(issues, direct.as_validation().unwrap());
    insta::assert_snapshot!(err, @r"
    Invalid input.
    - `category`: Invalid enum value. Expected 'tech' | 'design' | 'business', received 'invalid'
    ");
}

#[tokio::test]
async fn defaults_are_materialized_for_missing_search_params() {
    let page = PageBuilder::new()
        .search_params(display_options())
        .unwrap()
        .page(|options| async move { options.search_params.unwrap().await.unwrap() });

    let query = page
        .render(PageProps::new().with_search_params(ready(RawInput::new())))
        .await;
    assert_eq!(query.get_str("theme"), Some("light"));
    assert_eq!(query.get_array("tags"), Some(&["general".to_string()][..]));
    insta::assert_snapshot!(
        serde_json::to_string(&query).unwrap(),
        @r#"{"theme":"light","tags":["general"],"sort":null}"#
    );
}

#[tokio::test]
async fn optional_fields_without_a_default_are_marked_absent() {
    let page = PageBuilder::new()
        .search_params(display_options())
        .unwrap()
        .page(|options| async move { options.search_params.unwrap().await.unwrap() });

    // Wholly missing.
    let query = page
        .render(PageProps::new().with_search_params(ready(RawInput::from_query("theme=dark"))))
        .await;
    assert_eq!(query.get("sort"), Some(&Value::Absent));

    // Present, but unset.
    let raw = RawInput::new().with("sort", RawValue::Absent);
    let query = page
        .render(PageProps::new().with_search_params(ready(raw)))
        .await;
    assert_eq!(query.get("sort"), Some(&Value::Absent));
}

#[tokio::test]
async fn repeated_query_keys_fill_array_fields() {
    let page = PageBuilder::new()
        .search_params(display_options())
        .unwrap()
        .page(|options| async move { options.search_params.unwrap().await.unwrap() });

    let raw = RawInput::from_query("tags=rust&tags=async&utm_source=feed");
    let query = page
        .render(PageProps::new().with_search_params(ready(raw)))
        .await;
    assert_eq!(
        query.get_array("tags"),
        Some(&["rust".to_string(), "async".to_string()][..])
    );
    assert!(!query.contains_key("utm_source"));
}

#[tokio::test]
async fn inputs_that_were_not_supplied_are_omitted() {
    let page = PageBuilder::new()
        .params(post_params())
        .unwrap()
        .search_params(display_options())
        .unwrap()
        .page(|options| async move { options });

    let props = PageProps::new().with_params(ready(RawInput::new().with("category", "tech")));
    let options = page.render(props).await;
    assert!(options.search_params.is_none());
    let params = options.params.unwrap().await.unwrap();
    assert_eq!(params.get_str("category"), Some("tech"));
}

#[tokio::test]
async fn attaching_the_same_schema_twice_is_the_same_as_once() {
    let once = PageBuilder::new()
        .params(post_params())
        .unwrap()
        .page(|options| async move { options.params.unwrap().await });
    let twice = PageBuilder::new()
        .params(post_params())
        .unwrap()
        .params(post_params())
        .unwrap()
        .page(|options| async move { options.params.unwrap().await });

    for category in ["tech", "design", "sports", ""] {
        let raw = RawInput::new().with("category", category);
        let a = once.render(PageProps::new().with_params(ready(raw.clone()))).await;
        let b = twice.render(PageProps::new().with_params(ready(raw))).await;
        match (a, b) {
            (Ok(a), Ok(b)) => assert_eq!(a, b),
            (Err(a), Err(b)) => assert_eq!(a.as_validation(), b.as_validation()),
            (a, b) => panic!("Different outcomes for `{category}`: {a:?} vs {b:?}"),
        }
    }
}

#[tokio::test]
async fn validated_inputs_resolve_independently() {
    let (params_tx, params_rx) = oneshot::channel::<RawInput>();
    let (query_tx, query_rx) = oneshot::channel::<RawInput>();

    let page = PageBuilder::new()
        .params(post_params())
        .unwrap()
        .search_params(display_options())
        .unwrap()
        .page(|options| async move { options });
    let props = PageProps::new()
        .with_params(async move { params_rx.await.unwrap() })
        .with_search_params(async move { query_rx.await.unwrap() });
    let PageOptions {
        params,
        search_params,
    } = page.render(props).await;
    let mut params = params.unwrap();

    // The query parameters are delivered first.
    query_tx.send(RawInput::from_query("theme=dark")).unwrap();
    let query = search_params.unwrap().await.unwrap();
    assert_eq!(query.get_str("theme"), Some("dark"));

    // The route parameters are still pending.
    assert!(
        tokio::time::timeout(Duration::from_millis(10), &mut params)
            .await
            .is_err()
    );

    params_tx.send(RawInput::new().with("category", "design")).unwrap();
    assert_eq!(params.await.unwrap().get_str("category"), Some("design"));
}

#[tokio::test]
async fn the_handler_runs_even_if_an_input_never_arrives() {
    let calls = Arc::new(AtomicUsize::new(0));
    let page = PageBuilder::new().params(post_params()).unwrap().page({
        let calls = calls.clone();
        move |options: PageOptions<ParsedInput, Unconfigured>| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { options }
        }
    });

    let options = page
        .render(PageProps::new().with_params(std::future::pending()))
        .await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let pending = tokio::time::timeout(Duration::from_millis(10), options.params.unwrap()).await;
    assert!(pending.is_err());
}

#[tokio::test]
async fn a_page_can_be_rendered_concurrently() {
    let page = PageBuilder::new()
        .params(ObjectSchema::new().field("id", string()))
        .unwrap()
        .page(|options| async move {
            let params = options.params.unwrap().await?;
            Ok::<_, SchemaError>(format!("Post #{}", params.get_str("id").unwrap()))
        });

    let (first, second) = futures_util::future::join(
        page.render(PageProps::new().with_params(ready(RawInput::new().with("id", "1")))),
        page.clone()
            .render(PageProps::new().with_params(ready(RawInput::new().with("id", "2")))),
    )
    .await;
    assert_eq!(first.unwrap(), "Post #1");
    assert_eq!(second.unwrap(), "Post #2");
}

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

#[tokio::test]
async fn typed_schemas_work_end_to_end() {
    let page = PageBuilder::new()
        .params(Typed::<PostParams>::new())
        .unwrap()
        .page(|options| async move { options.params.unwrap().await });

    let raw = RawInput::from_encoded_route_params([("category", "tech"), ("slug", "hello%20world")])
        .unwrap();
    let params = page.render(PageProps::new().with_params(ready(raw))).await.unwrap();
    assert_eq!(
        params,
        PostParams {
            category: Category::Tech,
            slug: "hello world".into()
        }
    );

    let raw = RawInput::new().with("category", "sports").with("slug", "x");
    let err = page
        .render(PageProps::new().with_params(ready(raw)))
        .await
        .unwrap_err();
    assert_eq!(err.as_validation().unwrap().issues()[0].path, "category");
}

#[test]
fn unsupported_typed_fields_are_rejected_when_attached() {
    #[derive(serde::Deserialize, Debug)]
    struct Pagination {
        #[allow(dead_code)]
        page: u64,
    }

    #[derive(serde::Deserialize, Debug)]
    struct Limit {
        #[allow(dead_code)]
        #[serde(default)]
        limit: Option<u64>,
    }

    let err = PageBuilder::new()
        .search_params(Typed::<Pagination>::new())
        .unwrap_err();
    assert!(matches!(err, ConfigurationError::UnsupportedFieldKind { ref field, .. } if field == "page"));

    let err = PageBuilder::new()
        .search_params(Typed::<Limit>::new())
        .unwrap_err();
    insta::assert_snapshot!(err, @"`limit` asks for a `u64`, which can't be extracted from route or query parameters. Their values are always strings or lists of strings");
}

#[test]
fn params_schemas_are_checked_against_registered_routes() {
    let mut registry = RouteRegistry::new();
    registry.register_template("/blog/[category]/[slug]").unwrap();

    let builder = PageBuilder::for_route(&registry, "/blog/[category]/[slug]").unwrap();
    assert!(builder.params(post_params().field("slug", string())).is_ok());

    // Leaving out a route parameter is as wrong as asking for one that doesn't exist.
    let err = builder.params(post_params()).unwrap_err();
    assert!(matches!(err, ConfigurationError::MissingRouteParameter { ref parameter, .. } if parameter == "slug"));

    let err = builder
        .params(ObjectSchema::new().field("id", string()))
        .unwrap_err();
    assert!(matches!(err, ConfigurationError::UnknownRouteParameter { .. }));

    let err = PageBuilder::for_route(&registry, "/missing").unwrap_err();
    assert!(matches!(err, ConfigurationError::UnknownRoute { .. }));
}
