//! Integration tests for scraping through the public API.
//!
//! These tests drive whole query trees against mock sites:
//! 1. Load a document through a scope
//! 2. Resolve nested object/collection queries
//! 3. Follow links and paginate across pages
//! 4. Check default substitution and error propagation

use quarry::query::{self, Max};
use quarry::retrieve::{MockClient, Request, UrlValidator, ValidatedClient};
use quarry::{pick, Configure, DocumentKind, Error, QueryExt, RetrieveOptions, Selector, Value};
use regex::Regex;
use serde_json::json;

const LISTING: &str = r#"
<html>
  <body>
    <h1>Catalog</h1>
    <ul class="products">
      <li class="product" data-sku="W-1">
        <a href="/p/widget">Widget</a>
        <span class="price">9.99</span>
      </li>
      <li class="product" data-sku="G-2">
        <a href="/p/gadget">Gadget</a>
        <span class="price">19.50</span>
      </li>
    </ul>
    <a class="next" href="/catalog?page=2">Next</a>
  </body>
</html>
"#;

const LISTING_PAGE_2: &str = r#"
<html>
  <body>
    <h1>Catalog</h1>
    <ul class="products">
      <li class="product" data-sku="S-3">
        <a href="/p/sprocket">Sprocket</a>
        <span class="price">4.25</span>
      </li>
    </ul>
  </body>
</html>
"#;

const WIDGET: &str = r#"<div class="detail"><p class="stock">12 in stock</p></div>"#;

fn shop() -> MockClient {
    MockClient::new()
        .with_page("https://shop.test/catalog", LISTING)
        .with_page("https://shop.test/catalog?page=2", LISTING_PAGE_2)
        .with_page("https://shop.test/p/widget", WIDGET)
        .with_failure("https://shop.test/p/gadget", 404)
        .with_failure("https://shop.test/p/sprocket", 500)
}

fn options(mock: &MockClient) -> RetrieveOptions {
    RetrieveOptions::default().with_client(mock.clone())
}

fn product() -> query::ObjectQuery {
    query::object(pick! {
        "name" => "a",
        "sku" => "/data-sku",
        "price" => query::number(".price"),
        "url" => query::uri("a", "https://shop.test"),
    })
}

#[tokio::test]
async fn test_collection_of_objects_from_a_request() {
    let mock = shop();
    let scope = quarry::request("https://shop.test/catalog", options(&mock));

    let products = scope.collection("li.product", product()).await.unwrap().unwrap();

    assert_eq!(
        products.into_json(),
        json!([
            { "name": "Widget", "sku": "W-1", "price": 9.99, "url": "https://shop.test/p/widget" },
            { "name": "Gadget", "sku": "G-2", "price": 19.5, "url": "https://shop.test/p/gadget" },
        ])
    );
}

#[tokio::test]
async fn test_scope_retrieves_the_document_once() {
    let mock = shop();
    let scope = quarry::request("https://shop.test/catalog", options(&mock));

    scope.string("h1").await.unwrap();
    scope.number(".price").await.unwrap();
    scope.collection("li", "a").await.unwrap();

    assert_eq!(mock.call_count(), 1);
}

#[tokio::test]
async fn test_follow_inside_collection_degrades_per_item() {
    let mock = shop();
    let scope = quarry::request("https://shop.test/catalog", options(&mock));

    let stock = query::follow(
        query::uri("a", "https://shop.test"),
        query::regex(".stock", Regex::new(r"(\d+) in stock").unwrap(), 1),
    )
    .with_retrieve(options(&mock))
    .with_default("unknown");

    let result = scope
        .collection("li.product", pick! { "name" => "a", "stock" => stock })
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        result.into_json(),
        json!([
            { "name": "Widget", "stock": "12" },
            { "name": "Gadget", "stock": "unknown" },
        ])
    );
}

#[tokio::test]
async fn test_paginate_across_listing_pages() {
    let mock = shop();
    let scope = quarry::request("https://shop.test/catalog", options(&mock));

    let names = scope
        .paginate(
            query::collection("li.product", "a"),
            query::uri("a.next", "https://shop.test"),
            0,
        )
        .await
        .unwrap();

    assert_eq!(names, Some(Value::from(vec!["Widget", "Gadget", "Sprocket"])));
    assert_eq!(
        mock.requested_uris(),
        vec!["https://shop.test/catalog", "https://shop.test/catalog?page=2"]
    );
}

#[tokio::test]
async fn test_paginate_json_pages() {
    let mock = MockClient::new().with_page(
        "https://api.test/u",
        json!({ "value": "second", "next": null }).to_string(),
    );
    let options = RetrieveOptions::new(DocumentKind::Json).with_client(mock.clone());
    let first = quarry::body(json!({ "value": "first", "next": "u" }), options.clone());
    let document = first.document().await.unwrap();

    let all = query::paginate("value", query::uri("next", "https://api.test/"), 0)
        .with_retrieve(options.clone());
    assert_eq!(
        all.on(&document).await.unwrap(),
        Some(Value::from(vec!["first", "second"]))
    );

    let one = query::paginate("value", query::uri("next", "https://api.test/"), 1)
        .with_retrieve(options);
    assert_eq!(one.on(&document).await.unwrap(), Some(Value::from(vec!["first"])));
}

#[tokio::test]
async fn test_paginate_with_predicate_and_merge() {
    let mock = shop();
    let scope = quarry::request("https://shop.test/catalog", options(&mock));

    let counts = query::paginate(
        query::collection("li.product", "a"),
        query::uri("a.next", "https://shop.test"),
        Max::when(|count, _pages| count < 5),
    )
    .with_merge(|pages| pages.into_iter().map(|page| page.as_array().map_or(0, Vec::len)).collect())
    .with_retrieve(options(&mock));

    assert_eq!(
        scope.execute(counts).await.unwrap(),
        Some(Value::from(vec![2usize, 1usize]))
    );
}

#[tokio::test]
async fn test_follow_failure_resolves_to_default() {
    let mock = MockClient::new();
    let scope = quarry::body(r#"<a href="https://down.test/">down</a>"#, options(&mock));

    let result = scope.follow(query::uri("a", ""), "h1").await.unwrap();
    assert_eq!(result, None);
    assert_eq!(mock.requested_uris(), vec!["https://down.test/"]);
}

#[tokio::test]
async fn test_follow_blocked_by_validator_resolves_to_default() {
    let mock = MockClient::new().with_page("http://10.0.0.1/admin", "<h1>secret</h1>");
    let guarded = RetrieveOptions::default().with_client(ValidatedClient::with_validator(
        mock.clone(),
        UrlValidator::new().block_host("internal.test"),
    ));
    let scope = quarry::body(
        r#"<a class="ip" href="http://10.0.0.1/admin">x</a><a class="host" href="http://internal.test/">y</a>"#,
        guarded,
    );

    assert_eq!(scope.follow(query::uri("a.ip", ""), "h1").await.unwrap(), None);
    assert_eq!(scope.follow(query::uri("a.host", ""), "h1").await.unwrap(), None);
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn test_link_resolution_and_malformed_links() {
    let scope = quarry::body(
        r#"<a class="ok" href="/path">ok</a><a class="bad" href="http://[oops">bad</a>"#,
        RetrieveOptions::default(),
    );

    assert_eq!(
        scope.uri("a.ok", "http://test.com").await.unwrap(),
        Some(Value::from("http://test.com/path"))
    );

    let err = scope.uri("a.bad", "").await.unwrap_err();
    assert!(matches!(err, Error::MalformedLink { .. }));
}

#[tokio::test]
async fn test_regex_groups() {
    let scope = quarry::body(json!({ "text": "matchme" }), RetrieveOptions::new(DocumentKind::Json));
    let pattern = Regex::new("(match)(me)").unwrap();

    assert_eq!(
        scope.regex("text", pattern.clone(), 1).await.unwrap(),
        Some(Value::from("match"))
    );
    assert_eq!(
        scope.regex("text", pattern.clone(), 2).await.unwrap(),
        Some(Value::from("me"))
    );
    assert_eq!(
        scope
            .execute(query::regex("text", pattern, 3).with_default("missing"))
            .await
            .unwrap(),
        Some(Value::from("missing"))
    );
}

#[tokio::test]
async fn test_context_and_callback_compose() {
    let scope = quarry::body(LISTING, RetrieveOptions::default());

    let first = scope
        .context(
            "li.product",
            query::callback(|item| async move {
                let name = item.string("a").await?.unwrap_or_default();
                let sku = item.value("/data-sku").await?.unwrap_or_default();
                Ok::<_, Error>(Some(Value::from(format!("{name} [{sku}]"))))
            }),
        )
        .await
        .unwrap();

    assert_eq!(first, Some(Value::from("Widget [W-1]")));
}

#[tokio::test]
async fn test_raw_escape_hatch_counts_nodes() {
    let scope = quarry::body(LISTING, RetrieveOptions::default());

    let count = scope
        .raw(|raw| match raw {
            quarry::Raw::Dom { html, .. } => {
                let selector = scraper::Selector::parse("li.product").ok()?;
                Some(Value::from(html.select(&selector).count()))
            }
            quarry::Raw::Json { .. } => None,
        })
        .await
        .unwrap();

    assert_eq!(count, Some(Value::from(2usize)));
}

#[tokio::test]
async fn test_missing_value_propagates_through_object() {
    let scope = quarry::body(LISTING, RetrieveOptions::default());

    let err = scope
        .object(pick! {
            "title" => "h1",
            "author" => query::string(".author").throw_on_missing(true),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, Error::MissingValue { .. }));
}

#[tokio::test]
async fn test_file_entry_point() {
    let path = std::env::temp_dir().join(format!("quarry-it-{}.json", std::process::id()));
    std::fs::write(&path, r#"{"items": [{"n": 1}, {"n": 2}]}"#).unwrap();

    let scope = quarry::file(path.clone(), RetrieveOptions::new(DocumentKind::Json));
    let total = scope
        .collection("items", query::number("n"))
        .await
        .unwrap()
        .and_then(|items| items.as_array().map(|items| items.iter().map(Value::to_number).sum::<f64>()));

    assert_eq!(total, Some(3.0));
    std::fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn test_failed_retrieval_rejects_scope_queries() {
    let scope = quarry::request(
        Request::new("https://shop.test/missing"),
        RetrieveOptions::default().with_client(MockClient::new()),
    );

    let err = scope.string("h1").await.unwrap_err();
    assert!(matches!(err, Error::Retrieve(_)));
}

#[test]
fn test_queries_resolve_on_a_blocking_executor() {
    let scope = quarry::body("<p>sync</p>", RetrieveOptions::default());
    let value = tokio_test::block_on(scope.execute(query::value(Selector::path("p"))));
    assert_eq!(value.unwrap(), Some(Value::from("sync")));
}
