use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use listing_logging::listing_debug;
use reqwest::StatusCode;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::{CandidateLink, DetailPayload, FailureKind, FetchError, ListingSource, StatusHint};

const LISTING_PATH_PREFIX: &str = "/appartement/huren/";
const BEDROOM_LABEL: &str = "Aantal slaapkamers:";

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(3 * 60),
            user_agent: format!("listing-harvester/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Plain-HTTP listing source for the huurstunt.nl page layout.
///
/// The first result page of a tier is fetched once: the body read for the
/// page count is kept and handed to the following links request.
#[derive(Debug)]
pub struct HttpListingSource {
    base: Url,
    client: reqwest::Client,
    first_page: Mutex<Option<(Url, String)>>,
}

impl HttpListingSource {
    pub fn new(base_url: &str, settings: FetchSettings) -> Result<Self, FetchError> {
        let base = Url::parse(base_url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .user_agent(settings.user_agent)
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self {
            base,
            client,
            first_page: Mutex::new(None),
        })
    }

    /// `{base}/huren/{city}/[+{tier}km/][p{page}/]`
    pub fn results_url(&self, city: &str, distance_tier: u32, page: u32) -> Result<Url, FetchError> {
        let mut path = format!("/huren/{}/", urlify(city));
        if distance_tier > 0 {
            path.push_str(&format!("+{distance_tier}km/"));
        }
        if page > 1 {
            path.push_str(&format!("p{page}/"));
        }
        self.join(&path)
    }

    fn join(&self, path: &str) -> Result<Url, FetchError> {
        self.base
            .join(path)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))
    }

    fn cached_first_page(&self) -> MutexGuard<'_, Option<(Url, String)>> {
        self.first_page
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    async fn get_html(&self, url: Url) -> Result<(StatusCode, String), FetchError> {
        listing_debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status();
        let body = response.text().await.map_err(map_reqwest_error)?;
        Ok((status, body))
    }

    async fn get_success_html(&self, url: Url) -> Result<String, FetchError> {
        let (status, body) = self.get_html(url).await?;
        check_status(status)?;
        Ok(body)
    }
}

#[async_trait::async_trait]
impl ListingSource for HttpListingSource {
    async fn count_result_pages(&self, city: &str, distance_tier: u32) -> Result<u32, FetchError> {
        let url = self.results_url(city, distance_tier, 1)?;
        let html = self.get_success_html(url.clone()).await?;
        let count = parse_page_count(&html);
        *self.cached_first_page() = Some((url, html));
        Ok(count)
    }

    async fn list_candidate_links(
        &self,
        city: &str,
        distance_tier: u32,
        page: u32,
    ) -> Result<Vec<CandidateLink>, FetchError> {
        let url = self.results_url(city, distance_tier, page)?;
        let cached = {
            let mut slot = self.cached_first_page();
            match slot.take() {
                Some((cached_url, html)) if cached_url == url => Some(html),
                other => {
                    *slot = other;
                    None
                }
            }
        };
        let html = match cached {
            Some(html) => html,
            None => self.get_success_html(url).await?,
        };
        Ok(parse_candidate_links(&html))
    }

    async fn fetch_detail(&self, id: &str) -> Result<DetailPayload, FetchError> {
        let url = self.join(id)?;
        let (status, body) = self.get_html(url).await?;
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Ok(DetailPayload::not_found());
        }
        check_status(status)?;
        Ok(parse_detail(&body))
    }
}

fn check_status(status: StatusCode) -> Result<(), FetchError> {
    if status.is_success() {
        return Ok(());
    }
    let kind = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FailureKind::Authentication,
        _ => FailureKind::HttpStatus(status.as_u16()),
    };
    Err(FetchError::new(kind, status.to_string()))
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_decode() {
        return FetchError::new(FailureKind::Parse, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}

fn urlify(city: &str) -> String {
    city.split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase()
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn first_text(doc: &Html, css: &str) -> Option<String> {
    let sel = selector(css)?;
    doc.select(&sel)
        .next()
        .map(element_text)
        .filter(|text| !text.is_empty())
}

/// Page count from the pagination bar; a page without one has a single page.
pub fn parse_page_count(html: &str) -> u32 {
    let doc = Html::parse_document(html);
    let Some(sel) = selector(".pagination-bar ul.pagination li") else {
        return 1;
    };
    let items: Vec<_> = doc.select(&sel).collect();
    // The last item is the "next" arrow.
    items
        .get(items.len().saturating_sub(2))
        .and_then(|item| element_text(*item).parse::<u32>().ok())
        .filter(|count| *count > 0)
        .unwrap_or(1)
}

/// Listing links on a result page, tagged with their availability marker.
pub fn parse_candidate_links(html: &str) -> Vec<CandidateLink> {
    let doc = Html::parse_document(html);
    let (Some(anchors), Some(rented), Some(option)) = (
        selector(".search-results a"),
        selector(".property-type.property--red"),
        selector(".property-type.property--orange"),
    ) else {
        return Vec::new();
    };

    doc.select(&anchors)
        .filter_map(|anchor| {
            let href = anchor.value().attr("href")?.trim();
            if !href.starts_with(LISTING_PATH_PREFIX) {
                return None;
            }
            let status = if anchor.select(&rented).next().is_some() {
                StatusHint::Rented
            } else if anchor.select(&option).next().is_some() {
                StatusHint::UnderOption
            } else {
                StatusHint::Available
            };
            Some(CandidateLink {
                id: href.to_string(),
                status,
            })
        })
        .collect()
}

/// Raw detail fields; a page carrying the "not found" marker yields `found: false`.
pub fn parse_detail(html: &str) -> DetailPayload {
    let doc = Html::parse_document(html);
    let gone = selector(".rental-not-found")
        .map(|sel| doc.select(&sel).next().is_some())
        .unwrap_or(false);
    if gone {
        return DetailPayload::not_found();
    }

    let description = first_text(&doc, ".rental-description .block-body").unwrap_or_default();
    let price_text = selector(".price h2")
        .and_then(|sel| doc.select(&sel).next().map(|el| el.inner_html()));

    DetailPayload {
        found: true,
        occupant_hints: description.clone(),
        description,
        bedroom_text: bedroom_text(&doc),
        price_text,
        title: first_text(&doc, ".rental-header .title__listing"),
        contact_email: first_text(&doc, ".agent__info__mail__show a"),
    }
}

fn bedroom_text(doc: &Html) -> Option<String> {
    let sel = selector(".rental-characteristics-long div.row")?;
    doc.select(&sel)
        .find(|row| element_text(*row).starts_with(BEDROOM_LABEL))
        .and_then(|row| row.children().filter_map(ElementRef::wrap).nth(1))
        .map(element_text)
}
