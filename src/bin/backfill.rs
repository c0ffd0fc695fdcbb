//! One-off seeding tool: crawl the paged archive of an academic affairs board
//! and feed anything not yet on disk into the normal bounded store.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::collections::HashSet;
use std::path::PathBuf;

use notice_monitor::ingest::http_client;
use notice_monitor::ingest::providers::jwc::{JwcAdapter, JwcBoard};
use notice_monitor::{ArchiveStore, Notice, SourceAdapter};

#[derive(Debug, Parser)]
#[command(name = "backfill", about = "Seed a board's notice history from its paged archive")]
struct Args {
    /// Board slug: `gg` (公告) or `tz` (通知)
    #[arg(long, default_value = "gg")]
    board: String,

    /// Number of archive pages to crawl, starting from page 1
    #[arg(long)]
    pages: u32,

    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Active window size for the seeded store
    #[arg(long, default_value_t = 30)]
    max_notices: usize,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).init();
    let args = Args::parse();

    let board = JwcBoard::parse(&args.board)
        .ok_or_else(|| anyhow!("unknown board {:?}, expected gg or tz", args.board))?;
    let adapter = JwcAdapter::new(board, http_client()?);
    let store = ArchiveStore::new(&args.data_dir, adapter.name(), args.max_notices)?;

    // Pages list newest first.
    let mut crawled: Vec<Notice> = Vec::new();
    for page in 1..=args.pages {
        let url = adapter.page_url(page);
        tracing::info!(
            board = adapter.board().slug(),
            page,
            total = args.pages,
            %url,
            "fetching archive page"
        );
        match adapter.fetch_url(&url).await {
            Ok(html) => crawled.extend(JwcAdapter::parse_listing(&html)),
            Err(e) => tracing::warn!(page, error = %format!("{e:#}"), "page failed, skipping"),
        }
    }

    let key = adapter.identity_key();
    let mut known: HashSet<String> = store
        .load_archive()
        .iter()
        .chain(store.load_active().iter())
        .map(|n| key.of(n).to_string())
        .collect();

    let mut fresh: Vec<Notice> = crawled
        .into_iter()
        .filter(|n| known.insert(key.of(n).to_string()))
        .collect();
    fresh.reverse(); // oldest first, so the newest end up in the active window

    let archived = store.append(&fresh).context("seeding store")?;
    println!(
        "backfill {}: {} new notices stored, {} moved to archive",
        adapter.name(),
        fresh.len(),
        archived
    );
    Ok(())
}
