//! Listing core: pure record model, exclusion bookkeeping and text heuristics.
mod book;
mod change;
mod classify;
mod facts;
mod record;

pub use book::{ExclusionSet, ListingBook, ListingStore};
pub use change::ChangeSet;
pub use classify::{extract_flagged, is_rejected, ClassifierConfig};
pub use facts::{derive_occupancy, occupancy_candidates, parse_bedroom_count, parse_price};
pub use record::{FlaggedMatch, ListingId, ListingPatch, ListingRecord};
