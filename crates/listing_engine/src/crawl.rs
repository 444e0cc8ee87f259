use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use listing_core::{
    derive_occupancy, parse_bedroom_count, parse_price, ChangeSet, ClassifierConfig, ListingId,
    ListingPatch,
};
use listing_logging::{listing_debug, listing_info, listing_warn};

use crate::{
    lock_book, CandidateLink, ChangeSender, DetailPayload, FailureKind, FetchError, ListingSource,
    SharedBook, StatusHint,
};

/// A city to search, expanded one kilometre tier at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Place {
    pub city: String,
    pub max_distance_km: u32,
}

#[derive(Debug, Clone)]
pub struct CrawlSettings {
    pub places: Vec<Place>,
    /// Result pages fetched at once, after the first page of a tier.
    pub page_window: usize,
    /// Upper bound on any single source call.
    pub fetch_timeout: Duration,
    /// Attempts per page or detail before it is skipped for this run.
    pub max_fetch_attempts: u32,
    pub max_price_per_occupant: f64,
    /// Re-fetch details of listings that already have them.
    pub force_refresh: bool,
    pub classifier: ClassifierConfig,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            places: Vec::new(),
            page_window: 3,
            fetch_timeout: Duration::from_secs(3 * 60),
            max_fetch_attempts: 3,
            max_price_per_occupant: 600.0,
            force_refresh: false,
            classifier: ClassifierConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CrawlSummary {
    pub pages_scanned: usize,
    pub discovered: usize,
    pub details_resolved: usize,
    pub excluded_gone: usize,
    pub excluded_rejected: usize,
    pub too_expensive: usize,
    pub suitable: usize,
    /// Details fetched but missing price or occupancy; retried next run.
    pub undecided: usize,
    pub fetch_failures: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    #[error("crawl aborted, listing source refused access: {0}")]
    Aborted(FetchError),
}

/// Walks result pages, records new listings and classifies their details.
pub struct Crawler {
    source: Arc<dyn ListingSource>,
    book: SharedBook,
    changes: ChangeSender,
    settings: CrawlSettings,
}

impl Crawler {
    pub fn new(
        source: Arc<dyn ListingSource>,
        book: SharedBook,
        changes: ChangeSender,
        settings: CrawlSettings,
    ) -> Self {
        Self {
            source,
            book,
            changes,
            settings,
        }
    }

    /// Full pass over every configured place.
    ///
    /// Each place's tiers are scanned before its detail pass. A listing's
    /// details are fetched at most once per run.
    pub async fn run(&self) -> Result<CrawlSummary, CrawlError> {
        let mut summary = CrawlSummary::default();
        let mut attempted = HashSet::new();

        for place in &self.settings.places {
            listing_info!("Collecting links for {}...", place.city);
            for tier in 0..=place.max_distance_km {
                self.scan_tier(place, tier, &mut summary).await?;
            }
            self.resolve_details(&mut attempted, &mut summary).await?;
        }

        listing_info!("Finished scanning: {:?}", summary);
        Ok(summary)
    }

    async fn scan_tier(
        &self,
        place: &Place,
        tier: u32,
        summary: &mut CrawlSummary,
    ) -> Result<(), CrawlError> {
        let page_count = match self
            .with_retries(|| self.source.count_result_pages(&place.city, tier))
            .await
        {
            Ok(count) => count.max(1),
            Err(err) => {
                return self.give_up(&format!("{} +{}km page count", place.city, tier), err, summary)
            }
        };
        listing_info!(
            "{} radius +{}km: {} result pages",
            place.city,
            tier,
            page_count
        );

        self.scan_pages(place, tier, vec![1], 1, summary).await?;
        if page_count > 1 {
            let window = self.settings.page_window.max(1);
            self.scan_pages(place, tier, (2..=page_count).collect(), window, summary)
                .await?;
        }
        Ok(())
    }

    /// Fetches `pages` in batches of `window`, re-queuing transient failures.
    async fn scan_pages(
        &self,
        place: &Place,
        tier: u32,
        pages: Vec<u32>,
        window: usize,
        summary: &mut CrawlSummary,
    ) -> Result<(), CrawlError> {
        let mut queue: VecDeque<(u32, u32)> = pages.into_iter().map(|page| (page, 1)).collect();

        while !queue.is_empty() {
            let batch: Vec<_> = queue.drain(..window.min(queue.len())).collect();
            let results = join_all(batch.into_iter().map(|(page, attempt)| async move {
                let result = self
                    .timed(self.source.list_candidate_links(&place.city, tier, page))
                    .await;
                (page, attempt, result)
            }))
            .await;

            for (page, attempt, result) in results {
                match result {
                    Ok(links) => {
                        summary.pages_scanned += 1;
                        let added = self.register_links(tier, links);
                        listing_debug!("Page {} of {} +{}km: {} new", page, place.city, tier, added);
                        summary.discovered += added;
                    }
                    Err(err) if self.should_retry(&err, attempt) => {
                        listing_warn!("Page {} failed ({}), re-queued", page, err);
                        queue.push_back((page, attempt + 1));
                    }
                    Err(err) => {
                        self.give_up(&format!("page {page} of {}", place.city), err, summary)?
                    }
                }
            }
        }
        Ok(())
    }

    /// Records available links not seen before; returns how many were new.
    fn register_links(&self, tier: u32, links: Vec<CandidateLink>) -> usize {
        let mut added = 0;
        let mut change = ChangeSet::NONE;
        {
            let mut book = lock_book(&self.book);
            for link in links {
                if link.status != StatusHint::Available {
                    continue;
                }
                let inserted = book.upsert_discovered(&link.id, tier);
                if !inserted.is_empty() {
                    added += 1;
                }
                change = change.union(inserted);
            }
        }
        self.notify(change);
        added
    }

    async fn resolve_details(
        &self,
        attempted: &mut HashSet<ListingId>,
        summary: &mut CrawlSummary,
    ) -> Result<(), CrawlError> {
        let pending = lock_book(&self.book).pending_details(self.settings.force_refresh);
        let mut queue: VecDeque<(ListingId, u32)> = pending
            .into_iter()
            .filter(|id| attempted.insert(id.clone()))
            .map(|id| (id, 1))
            .collect();
        if queue.is_empty() {
            return Ok(());
        }
        listing_info!("Checking {} adverts...", queue.len());

        while let Some((id, attempt)) = queue.pop_front() {
            if lock_book(&self.book).get(&id).is_none() {
                continue;
            }
            match self.timed(self.source.fetch_detail(&id)).await {
                Ok(detail) => self.apply_detail(&id, detail, summary),
                Err(err) if self.should_retry(&err, attempt) => {
                    listing_warn!("Detail {} failed ({}), re-queued", id, err);
                    queue.push_back((id, attempt + 1));
                }
                Err(err) => self.give_up(&format!("detail {id}"), err, summary)?,
            }
        }
        Ok(())
    }

    fn apply_detail(&self, id: &str, detail: DetailPayload, summary: &mut CrawlSummary) {
        listing_info!("[AD] {}", id);
        let classifier = &self.settings.classifier;

        if !detail.found {
            listing_info!("\tRental not found, excluding");
            summary.excluded_gone += 1;
            self.exclude(id);
            return;
        }
        if classifier.is_rejected(&detail.description) {
            listing_info!("\tNot suitable for home sharers/students, excluding");
            summary.excluded_rejected += 1;
            self.exclude(id);
            return;
        }
        summary.details_resolved += 1;

        let mut book = lock_book(&self.book);
        let known_bedrooms = book.get(id).and_then(|record| record.bedroom_count());
        let bedroom_count =
            known_bedrooms.or_else(|| detail.bedroom_text.as_deref().and_then(parse_bedroom_count));
        let facts = ListingPatch {
            title: non_empty(detail.title),
            contact_email: non_empty(detail.contact_email),
            bedroom_count,
            occupancy_count: derive_occupancy(bedroom_count, &detail.occupant_hints),
            total_price: detail.price_text.as_deref().and_then(parse_price),
            flagged_matches: Some(classifier.flag_concerns(&detail.description)),
            ..ListingPatch::default()
        };
        let mut change = book.merge(id, &facts);

        let price_per_occupant = book.get(id).and_then(|record| record.price_per_occupant());
        match price_per_occupant {
            Some(price) => {
                let suitable = price <= self.settings.max_price_per_occupant;
                let verdict = ListingPatch {
                    suitable: Some(suitable),
                    has_details: true,
                    ..ListingPatch::default()
                };
                change = change.union(book.merge(id, &verdict));
                if suitable {
                    listing_info!("\tSuitable apartment, {:.0} per person", price);
                    summary.suitable += 1;
                } else {
                    listing_info!("\tRoom too expensive, {:.0} per person", price);
                    summary.too_expensive += 1;
                }
            }
            None => {
                listing_warn!("\tPrice or group size missing, will retry next run");
                summary.undecided += 1;
            }
        }
        drop(book);
        self.notify(change);
    }

    fn exclude(&self, id: &str) {
        let change = lock_book(&self.book).exclude(id);
        self.notify(change);
    }

    fn notify(&self, change: ChangeSet) {
        if !change.is_empty() {
            // A closed channel only means nobody is persisting.
            let _ = self.changes.send(change);
        }
    }

    fn should_retry(&self, err: &FetchError, attempt: u32) -> bool {
        err.is_transient() && attempt < self.settings.max_fetch_attempts
    }

    fn give_up(
        &self,
        what: &str,
        err: FetchError,
        summary: &mut CrawlSummary,
    ) -> Result<(), CrawlError> {
        summary.fetch_failures += 1;
        if err.kind == FailureKind::Authentication {
            return Err(CrawlError::Aborted(err));
        }
        listing_warn!("Giving up on {} for this run: {}", what, err);
        Ok(())
    }

    async fn timed<T>(
        &self,
        fetch: impl Future<Output = Result<T, FetchError>>,
    ) -> Result<T, FetchError> {
        let limit = self.settings.fetch_timeout;
        tokio::time::timeout(limit, fetch)
            .await
            .unwrap_or_else(|_| {
                Err(FetchError::new(
                    FailureKind::Timeout,
                    format!("no response within {limit:?}"),
                ))
            })
    }

    async fn with_retries<T, F, Fut>(&self, mut fetch: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut attempt = 1;
        loop {
            match self.timed(fetch()).await {
                Err(err) if self.should_retry(&err, attempt) => {
                    listing_warn!("Attempt {} failed ({}), retrying", attempt, err);
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}
