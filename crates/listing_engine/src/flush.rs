use std::time::Duration;

use listing_core::{ChangeSet, ListingBook};
use listing_logging::{listing_debug, listing_error, listing_info};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::{lock_book, ChangeReceiver, ListingFiles, SharedBook};

/// Dirty state for the two durable documents.
///
/// Records are tracked with an explicit flag because they change in place.
/// The exclusion set only grows, so a changed size is enough.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirtyTracker {
    records_dirty: bool,
    flushed_exclusions: usize,
}

/// What a flush would have to write right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PendingFlush {
    pub records: bool,
    pub exclusions: bool,
}

impl DirtyTracker {
    /// Tracker for a book whose exclusion file already holds `flushed_exclusions` ids.
    pub fn new(flushed_exclusions: usize) -> Self {
        Self {
            records_dirty: false,
            flushed_exclusions,
        }
    }

    pub fn observe(&mut self, change: ChangeSet) {
        self.records_dirty |= change.records;
    }

    pub fn pending(&self, book: &ListingBook) -> PendingFlush {
        PendingFlush {
            records: self.records_dirty,
            exclusions: book.exclusions().len() != self.flushed_exclusions,
        }
    }

    pub fn records_flushed(&mut self) {
        self.records_dirty = false;
    }

    pub fn exclusions_flushed(&mut self, count: usize) {
        self.flushed_exclusions = count;
    }
}

/// Outcome of one flush attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlushReport {
    pub records_written: bool,
    pub exclusions_written: bool,
    pub failures: usize,
}

/// Running totals over the flusher's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlushStats {
    pub record_writes: usize,
    pub exclusion_writes: usize,
    pub failures: usize,
}

/// Documents serialized under the lock, waiting to be written.
struct FlushJob {
    records: Option<String>,
    exclusions: Option<String>,
    exclusion_count: usize,
    serialize_failures: usize,
}

struct FlushResult {
    report: FlushReport,
    exclusion_count: usize,
}

impl FlushJob {
    fn is_empty(&self) -> bool {
        self.records.is_none() && self.exclusions.is_none()
    }

    fn skip(self) -> FlushResult {
        FlushResult {
            report: FlushReport {
                failures: self.serialize_failures,
                ..FlushReport::default()
            },
            exclusion_count: self.exclusion_count,
        }
    }

    fn write(self, files: &ListingFiles) -> FlushResult {
        let mut report = FlushReport {
            failures: self.serialize_failures,
            ..FlushReport::default()
        };

        if let Some(doc) = self.exclusions {
            listing_debug!("Saving {} excluded links", self.exclusion_count);
            match files.write_exclusions(&doc) {
                Ok(_) => report.exclusions_written = true,
                Err(err) => {
                    listing_error!("Failed to write excluded links: {}", err);
                    report.failures += 1;
                }
            }
        }

        if let Some(doc) = self.records {
            listing_debug!("Saving listing data");
            match files.write_records(&doc) {
                Ok(_) => report.records_written = true,
                Err(err) => {
                    listing_error!("Failed to write listing data: {}", err);
                    report.failures += 1;
                }
            }
        }

        FlushResult {
            report,
            exclusion_count: self.exclusion_count,
        }
    }
}

/// Writes the shared book to disk when, and only when, it has changed.
pub struct Flusher {
    book: SharedBook,
    files: ListingFiles,
    tracker: DirtyTracker,
    stats: FlushStats,
}

impl Flusher {
    /// The book is assumed to match what is on disk at this point.
    pub fn new(book: SharedBook, files: ListingFiles) -> Self {
        let flushed_exclusions = lock_book(&book).exclusions().len();
        Self {
            book,
            files,
            tracker: DirtyTracker::new(flushed_exclusions),
            stats: FlushStats::default(),
        }
    }

    pub fn observe(&mut self, change: ChangeSet) {
        self.tracker.observe(change);
    }

    pub fn stats(&self) -> FlushStats {
        self.stats
    }

    /// Serializes whatever is dirty and overwrites the matching files.
    ///
    /// A failed write leaves its dirty state untouched so the next call
    /// retries it.
    pub fn flush_once(&mut self) -> FlushReport {
        let job = self.prepare();
        let written = job.write(&self.files);
        self.complete(written)
    }

    /// Like [`Flusher::flush_once`], with the file writes moved to the
    /// blocking pool so a slow disk never stalls the runtime.
    pub async fn flush_off_runtime(&mut self) -> FlushReport {
        let job = self.prepare();
        if job.is_empty() {
            return self.complete(job.skip());
        }
        let files = self.files.clone();
        match tokio::task::spawn_blocking(move || job.write(&files)).await {
            Ok(written) => self.complete(written),
            Err(err) => {
                listing_error!("Flush task did not finish: {}", err);
                self.complete(FlushResult {
                    report: FlushReport {
                        failures: 1,
                        ..FlushReport::default()
                    },
                    exclusion_count: 0,
                })
            }
        }
    }

    /// Snapshots the dirty documents under the lock.
    fn prepare(&self) -> FlushJob {
        let book = lock_book(&self.book);
        let pending = self.tracker.pending(&book);
        let mut serialize_failures = 0;
        let records = if pending.records {
            match ListingFiles::records_document(&book) {
                Ok(doc) => Some(doc),
                Err(err) => {
                    listing_error!("Failed to serialize listing data: {}", err);
                    serialize_failures += 1;
                    None
                }
            }
        } else {
            None
        };
        FlushJob {
            records,
            exclusions: pending
                .exclusions
                .then(|| ListingFiles::exclusions_document(&book)),
            exclusion_count: book.exclusions().len(),
            serialize_failures,
        }
    }

    fn complete(&mut self, written: FlushResult) -> FlushReport {
        let report = written.report;
        if report.records_written {
            self.tracker.records_flushed();
        }
        if report.exclusions_written {
            self.tracker.exclusions_flushed(written.exclusion_count);
        }
        self.stats.record_writes += usize::from(report.records_written);
        self.stats.exclusion_writes += usize::from(report.exclusions_written);
        self.stats.failures += report.failures;
        report
    }

    fn drain(&mut self, changes: &mut ChangeReceiver) {
        while let Ok(change) = changes.try_recv() {
            self.observe(change);
        }
    }
}

/// Runs `flusher` on a fixed interval until every change sender is dropped.
///
/// A last flush runs after the channel closes; the handle yields the flusher
/// back so callers can inspect its stats.
pub fn spawn_flusher(
    mut flusher: Flusher,
    interval: Duration,
    mut changes: ChangeReceiver,
) -> JoinHandle<Flusher> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                change = changes.recv() => match change {
                    Some(change) => flusher.observe(change),
                    None => break,
                },
                _ = ticker.tick() => {
                    flusher.drain(&mut changes);
                    flusher.flush_off_runtime().await;
                }
            }
        }

        flusher.flush_off_runtime().await;
        let stats = flusher.stats();
        listing_info!(
            "Flusher stopped after {} record writes, {} exclusion writes, {} failures",
            stats.record_writes,
            stats.exclusion_writes,
            stats.failures
        );
        flusher
    })
}
