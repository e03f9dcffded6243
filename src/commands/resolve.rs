//! `xrefs resolve`: page through references against a JSON fixture.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ResolverConfig;
use crate::metrics::{gather_metrics, MetricSnapshot};
use crate::resolver::{ResolvedPage, Resolver, Stores};
use crate::store::InMemoryStore;
use crate::types::{AdjustedLocation, SearchKind};

/// Arguments of the resolve command.
#[derive(Debug, Clone)]
pub struct ResolveArgs {
    pub fixture: PathBuf,
    pub repository: String,
    pub commit: String,
    pub path: String,
    pub line: u32,
    pub character: u32,
    pub limit: Option<usize>,
    pub cursor: String,
    pub all: bool,
    pub implementations: bool,
    pub json: bool,
    pub metrics: bool,
}

#[derive(Serialize)]
struct PageOutput<'a> {
    page: usize,
    locations: &'a [AdjustedLocation],
    next_cursor: &'a str,
}

/// Run the resolve command
///
/// Prints one page, or every page with `--all`. Ctrl-C cancels the request
/// in flight.
pub async fn run(args: ResolveArgs, config: &ResolverConfig) -> Result<()> {
    let store = InMemoryStore::load(&args.fixture)
        .with_context(|| format!("Failed to load fixture {}", args.fixture.display()))?;
    let resolver = Resolver::new(Stores::in_memory(Arc::new(store)), config.clone());

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling request");
            on_interrupt.cancel();
        }
    });

    let kind = if args.implementations {
        SearchKind::Implementations
    } else {
        SearchKind::References
    };
    let limit = config.page_size(args.limit);

    let mut session = resolver.session(&args.repository, &args.commit, &args.path, kind, cancel);
    let mut token = args.cursor.clone();
    let mut page_number = 0;
    let mut total = 0;

    loop {
        page_number += 1;
        let page = session
            .resolve(args.line, args.character, limit, &token)
            .await
            .with_context(|| format!("Failed to resolve page {}", page_number))?;

        total += page.locations.len();
        print_page(&args, page_number, &page)?;

        if page.is_last() || !args.all {
            break;
        }
        token = page.next_cursor;
    }

    info!(pages = page_number, locations = total, "resolve finished");

    if args.metrics {
        print_metrics();
    }

    Ok(())
}

fn print_page(args: &ResolveArgs, page_number: usize, page: &ResolvedPage) -> Result<()> {
    if args.json {
        let output = PageOutput {
            page: page_number,
            locations: &page.locations,
            next_cursor: &page.next_cursor,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if page.locations.is_empty() {
        println!("Page {}: no locations", page_number);
    } else {
        println!("Page {} ({} locations):", page_number, page.locations.len());
        for location in &page.locations {
            println!("  {}", format_location(location));
        }
    }

    if page.is_last() {
        println!("(end of results)");
    } else {
        println!("Next cursor: {}", page.next_cursor);
    }
    println!();

    Ok(())
}

fn format_location(location: &AdjustedLocation) -> String {
    format!(
        "{}@{} {}:{} (upload {}, {})",
        location.upload.repository,
        location.adjusted_commit,
        location.path,
        location.adjusted_range,
        location.upload.id,
        location.upload.indexer
    )
}

fn print_metrics() {
    let snapshot = MetricSnapshot::capture();

    println!("Resolver Metrics:");
    println!("  Requests:            {:.0}", snapshot.requests_total);
    println!("  Errors:              {:.0}", snapshot.errors_total);
    println!("  Avg latency:         {:.2}ms", snapshot.latency_avg * 1000.0);
    println!("  Avg locations/page:  {:.1}", snapshot.locations_avg);
    println!("  Remote batches:      {:.0}", snapshot.remote_batches_total);
    println!("  Candidates scanned:  {:.0}", snapshot.candidates_scanned_total);
    println!("  Filter hit ratio:    {:.1}%", snapshot.filter_hit_ratio() * 100.0);

    let exposition = gather_metrics();
    if !exposition.is_empty() {
        println!("\n{}", exposition);
    }
}
