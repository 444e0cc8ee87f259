use crate::{CandidateLink, DetailPayload, FetchError};

/// Everything the crawler needs from the listing site.
///
/// Implementations do the network and page-structure work; all parsing of
/// the returned text and every state decision stays with the crawler.
#[async_trait::async_trait]
pub trait ListingSource: Send + Sync {
    /// Number of result pages for a city at the given search radius.
    async fn count_result_pages(&self, city: &str, distance_tier: u32) -> Result<u32, FetchError>;

    async fn list_candidate_links(
        &self,
        city: &str,
        distance_tier: u32,
        page: u32,
    ) -> Result<Vec<CandidateLink>, FetchError>;

    async fn fetch_detail(&self, id: &str) -> Result<DetailPayload, FetchError>;
}
