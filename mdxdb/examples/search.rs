//! Search a collection of the database described by the environment.
//!
//! Usage: MDXDB_ROOT=content/example.com cargo run -p mdxdb --example search -- posts "query text"

use anyhow::Context;
use mdxdb::{MdxdbConfig, SearchOptions, connect};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let mut args = std::env::args().skip(1);
    let collection = args.next().context("usage: search <collection> <query>")?;
    let query = args.collect::<Vec<_>>().join(" ");

    let db = connect(MdxdbConfig::from_env()?).await?;
    let results = db
        .collection(&collection)
        .await?
        .search(&query, SearchOptions::default().with_threshold(0.0))
        .await?;

    println!("{} result(s) in {}/{collection}", results.len(), db.namespace());
    for result in results {
        println!("{:.4}  {}", result.score, result.document.id);
    }

    db.disconnect().await?;
    Ok(())
}
