//! Listing engine: fetch collaborator, durable storage and crawl orchestration.
mod crawl;
mod flush;
mod http;
mod persist;
mod source;
mod types;

pub use crawl::{CrawlError, CrawlSettings, CrawlSummary, Crawler, Place};
pub use flush::{spawn_flusher, DirtyTracker, FlushReport, FlushStats, Flusher, PendingFlush};
pub use http::{
    parse_candidate_links, parse_detail, parse_page_count, FetchSettings, HttpListingSource,
};
pub use persist::{ListingFiles, PersistError, EXCLUSIONS_FILENAME, RECORDS_FILENAME};
pub use source::ListingSource;
pub use types::{
    change_channel, lock_book, CandidateLink, ChangeReceiver, ChangeSender, DetailPayload,
    FailureKind, FetchError, SharedBook, StatusHint,
};
