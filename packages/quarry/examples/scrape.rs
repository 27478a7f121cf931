//! Scrape a listing page and print the result as JSON.
//!
//! Follows the `rel="next"` link up to a page limit, then prints every
//! title and link found along the way.
//!
//! ```bash
//! RUST_LOG=quarry=debug cargo run --example scrape -- https://news.ycombinator.com 2
//! ```

use anyhow::{Context, Result};
use quarry::query;
use quarry::retrieve::{HttpClient, RateLimitedClient, RetrieveOptions, ValidatedClient};
use quarry::{pick, DocumentKind};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,quarry=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let url = args.next().context("usage: scrape <url> [max-pages]")?;
    let max_pages: usize = args
        .next()
        .map(|n| n.parse())
        .transpose()
        .context("max-pages must be a number")?
        .unwrap_or(1);

    let client = RateLimitedClient::new(
        ValidatedClient::new(HttpClient::new().with_user_agent("QuarryExample/0.1")),
        2,
    );
    let options = RetrieveOptions::new(DocumentKind::Dom).with_client(client);

    tracing::info!(url = %url, max_pages, "Scraping");
    let scope = quarry::request(url.as_str(), options);

    let page = scope
        .object(pick! {
            "title" => "title",
            "items" => query::paginate(
                query::collection(
                    "a",
                    pick! {
                        "text" => query::string(quarry::Selector::None),
                        "href" => query::uri("/href", url.as_str()),
                    },
                )
                .with_filter(|item| item.get("text").is_some_and(|text| text.is_truthy())),
                query::uri(r#"a[rel="next"]"#, url.as_str()),
                max_pages,
            )
            .with_retrieve(scope.options().cloned().unwrap_or_default()),
        })
        .await?
        .unwrap_or_default();

    println!("{}", serde_json::to_string_pretty(&page)?);
    Ok(())
}
