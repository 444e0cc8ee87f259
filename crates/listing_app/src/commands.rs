use std::cmp::Ordering;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use listing_core::{ChangeSet, ListingBook, ListingId, ListingPatch, ListingRecord};
use listing_engine::{
    change_channel, lock_book, spawn_flusher, CrawlSummary, Crawler, Flusher, HttpListingSource,
    ListingFiles, SharedBook,
};
use listing_logging::{listing_info, listing_warn};

use crate::config::AppConfig;

fn data_files(config: &AppConfig) -> ListingFiles {
    ListingFiles::new(&config.data_dir)
}

fn loading_context(config: &AppConfig) -> String {
    format!("loading listings from {}", config.data_dir.display())
}

/// Loads the book for a session that writes back, with a flusher that
/// already knows about any records dropped while reconciling the files.
fn open_for_update(config: &AppConfig) -> Result<(SharedBook, Flusher)> {
    let files = data_files(config);
    let (book, reconciled) = files
        .load_reconciled()
        .with_context(|| loading_context(config))?;
    let book: SharedBook = Arc::new(Mutex::new(book));
    let mut flusher = Flusher::new(book.clone(), files);
    flusher.observe(reconciled);
    Ok((book, flusher))
}

/// Crawls every configured place, flushing changes in the background.
pub async fn crawl(config: &AppConfig) -> Result<CrawlSummary> {
    if config.places.is_empty() {
        listing_warn!("No places configured, nothing to crawl");
    }
    let (book, flusher) = open_for_update(config)?;
    let source = HttpListingSource::new(&config.base_url, config.fetch_settings())
        .context("building the listing source")?;

    let (changes, receiver) = change_channel();
    let flusher = spawn_flusher(flusher, config.flush_interval(), receiver);

    let crawler = Crawler::new(Arc::new(source), book, changes, config.crawl_settings());
    let outcome = crawler.run().await;
    // Closing the channel lets the flusher write once more and stop.
    drop(crawler);
    let flusher = flusher.await.context("flusher task failed")?;

    let summary = outcome?;
    if flusher.stats().failures > 0 {
        listing_warn!(
            "{} writes failed during the crawl; the last flush may be stale",
            flusher.stats().failures
        );
    }
    Ok(summary)
}

/// Applies a single operator edit and writes it out immediately.
fn edit(
    config: &AppConfig,
    apply: impl FnOnce(&mut ListingBook) -> Result<ChangeSet>,
) -> Result<()> {
    let (book, mut flusher) = open_for_update(config)?;
    let change = apply(&mut lock_book(&book))?;
    if change.is_empty() {
        listing_info!("Nothing changed");
    }
    flusher.observe(change);
    // Writes nothing when neither the edit nor reconciliation changed anything.
    let report = flusher.flush_once();
    if report.failures > 0 {
        bail!("failed to save the change, see the log for details");
    }
    Ok(())
}

pub fn mark_contacted(config: &AppConfig, id: &str) -> Result<()> {
    edit(config, |book| {
        if book.get(id).is_none() {
            bail!("no stored listing with id {id}");
        }
        listing_info!("Marking {} as contacted", id);
        Ok(book.merge(id, &ListingPatch::contacted()))
    })
}

pub fn exclude(config: &AppConfig, id: &str) -> Result<()> {
    edit(config, |book| {
        listing_info!("Excluding {}", id);
        Ok(book.exclude(id))
    })
}

pub fn review(config: &AppConfig, all: bool) -> Result<String> {
    let book = data_files(config)
        .load()
        .with_context(|| loading_context(config))?;
    let mut rows: Vec<(&ListingId, &ListingRecord)> = book
        .store()
        .iter()
        .filter(|(_, record)| all || record.suitable() == Some(true))
        .collect();
    rows.sort_by(|(a_id, a), (b_id, b)| by_price(a, b).then_with(|| a_id.cmp(b_id)));
    Ok(render_review(&config.base_url, &rows))
}

/// Cheapest per occupant first; listings without a price go last.
fn by_price(a: &ListingRecord, b: &ListingRecord) -> Ordering {
    match (a.price_per_occupant(), b.price_per_occupant()) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn render_review(base_url: &str, rows: &[(&ListingId, &ListingRecord)]) -> String {
    let base = base_url.trim_end_matches('/');
    let mut out = String::new();
    for (id, record) in rows {
        let price = record
            .price_per_occupant()
            .map_or_else(|| "?".to_string(), |price| format!("{price:.0}"));
        let _ = writeln!(out, "{price} EUR/person  {base}{id}");
        let _ = writeln!(
            out,
            "    {} | {} | +{}km{}{}",
            record.title().unwrap_or("(untitled)"),
            record.contact_email().unwrap_or("no e-mail"),
            record.distance_tier(),
            if record.contacted() { " | contacted" } else { "" },
            match record.suitable() {
                Some(false) => " | too expensive",
                None => " | undecided",
                Some(true) => "",
            }
        );
        for flagged in record.flagged_matches() {
            let _ = writeln!(out, "    ! {}", flagged.sentence_text);
        }
    }
    if rows.is_empty() {
        out.push_str("No listings to review\n");
    }
    out
}
