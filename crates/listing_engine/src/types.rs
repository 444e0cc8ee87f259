use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use listing_core::{ChangeSet, ListingBook, ListingId};
use tokio::sync::mpsc;

/// The listing book shared between the crawler and the flusher.
pub type SharedBook = Arc<Mutex<ListingBook>>;

pub type ChangeSender = mpsc::UnboundedSender<ChangeSet>;
pub type ChangeReceiver = mpsc::UnboundedReceiver<ChangeSet>;

/// Channel carrying change notifications from mutating code to the flusher.
pub fn change_channel() -> (ChangeSender, ChangeReceiver) {
    mpsc::unbounded_channel()
}

/// Locks the shared book, recovering the data if a holder panicked.
pub fn lock_book(book: &SharedBook) -> MutexGuard<'_, ListingBook> {
    book.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Availability marker shown on a search result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusHint {
    Available,
    UnderOption,
    Rented,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateLink {
    pub id: ListingId,
    pub status: StatusHint,
}

impl CandidateLink {
    pub fn available(id: impl Into<ListingId>) -> Self {
        Self {
            id: id.into(),
            status: StatusHint::Available,
        }
    }
}

/// Raw, unparsed fields of a listing's detail page.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DetailPayload {
    /// False when the source reports the listing as gone.
    pub found: bool,
    pub description: String,
    pub bedroom_text: Option<String>,
    /// Free text searched for occupant counts; usually the description.
    pub occupant_hints: String,
    pub price_text: Option<String>,
    pub title: Option<String>,
    pub contact_email: Option<String>,
}

impl DetailPayload {
    pub fn not_found() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Whether retrying the same unit of work may succeed.
    pub fn is_transient(&self) -> bool {
        match self.kind {
            FailureKind::Timeout | FailureKind::Network => true,
            FailureKind::HttpStatus(code) => code >= 500 || code == 429,
            FailureKind::InvalidUrl | FailureKind::Authentication | FailureKind::Parse => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    Network,
    Authentication,
    Parse,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Authentication => write!(f, "authentication failed"),
            FailureKind::Parse => write!(f, "unparsable response"),
        }
    }
}
