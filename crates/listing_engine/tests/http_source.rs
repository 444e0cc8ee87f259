use listing_engine::{
    parse_candidate_links, parse_detail, parse_page_count, CandidateLink, FailureKind,
    FetchSettings, HttpListingSource, ListingSource, StatusHint,
};
use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RESULTS_PAGE: &str = r#"
<html><body>
  <div class="search-results">
    <a href="/appartement/huren/den-haag/free-1">
      <span class="title">Free flat</span>
    </a>
    <a href="/appartement/huren/den-haag/rented-2">
      <span class="property-type property--red">Verhuurd</span>
    </a>
    <a href="/appartement/huren/den-haag/option-3">
      <span class="property-type property--orange">Onder optie</span>
    </a>
    <a href="/makelaars/some-agent">Agent</a>
  </div>
  <div class="pagination-bar">
    <ul class="pagination">
      <li><a href="/huren/den-haag/">1</a></li>
      <li><a href="/huren/den-haag/p2/">2</a></li>
      <li><a href="/huren/den-haag/p4/">4</a></li>
      <li><a href="/huren/den-haag/p2/">&rsaquo;</a></li>
    </ul>
  </div>
</body></html>
"#;

const DETAIL_PAGE: &str = r#"
<html><body>
  <div class="rental-header"><h1 class="title__listing"> Bright flat near the station </h1></div>
  <div class="price"><h2>€ 1.250 <small>p/m</small></h2></div>
  <div class="rental-characteristics-long">
    <div class="row"><div>Oppervlakte:</div><div>80 m2</div></div>
    <div class="row"><div>Aantal slaapkamers:</div><div>3</div></div>
  </div>
  <div class="rental-description">
    <div class="block-body">Spacious flat. Suitable for 3 persons. No pets.</div>
  </div>
  <div class="agent__info__mail__show"><a href="mailto:x">verhuur@example.nl</a></div>
</body></html>
"#;

fn source(server: &MockServer) -> HttpListingSource {
    HttpListingSource::new(&server.uri(), FetchSettings::default()).unwrap()
}

#[test]
fn page_count_comes_from_the_pagination_bar() {
    assert_eq!(parse_page_count(RESULTS_PAGE), 4);
    assert_eq!(parse_page_count("<html><body>No results</body></html>"), 1);
}

#[test]
fn candidate_links_carry_availability() {
    assert_eq!(
        parse_candidate_links(RESULTS_PAGE),
        vec![
            CandidateLink::available("/appartement/huren/den-haag/free-1"),
            CandidateLink {
                id: "/appartement/huren/den-haag/rented-2".to_string(),
                status: StatusHint::Rented,
            },
            CandidateLink {
                id: "/appartement/huren/den-haag/option-3".to_string(),
                status: StatusHint::UnderOption,
            },
        ]
    );
}

#[test]
fn detail_fields_are_extracted() {
    let detail = parse_detail(DETAIL_PAGE);

    assert!(detail.found);
    assert_eq!(
        detail.description,
        "Spacious flat. Suitable for 3 persons. No pets."
    );
    assert_eq!(detail.occupant_hints, detail.description);
    assert_eq!(detail.bedroom_text.as_deref(), Some("3"));
    assert!(detail.price_text.as_deref().unwrap().contains("€ 1.250"));
    assert_eq!(detail.title.as_deref(), Some("Bright flat near the station"));
    assert_eq!(detail.contact_email.as_deref(), Some("verhuur@example.nl"));
}

#[test]
fn not_found_marker_yields_missing_listing() {
    let detail = parse_detail(r#"<div class="rental-not-found">Deze woning is niet meer beschikbaar</div>"#);
    assert!(!detail.found);
}

#[tokio::test]
async fn result_pages_are_fetched_per_radius_and_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/huren/den-haag/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(RESULTS_PAGE))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/huren/den-haag/+2km/p3/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(RESULTS_PAGE))
        .expect(1)
        .mount(&server)
        .await;

    let source = source(&server);

    assert_eq!(source.count_result_pages("Den Haag", 0).await.unwrap(), 4);
    let links = source.list_candidate_links("Den Haag", 2, 3).await.unwrap();
    assert_eq!(links.len(), 3);
}

#[tokio::test]
async fn first_result_page_is_requested_once_per_tier() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/huren/delft/+1km/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(RESULTS_PAGE))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/huren/delft/+1km/p2/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(RESULTS_PAGE))
        .expect(1)
        .mount(&server)
        .await;

    let source = source(&server);

    assert_eq!(source.count_result_pages("Delft", 1).await.unwrap(), 4);
    let first = source.list_candidate_links("Delft", 1, 1).await.unwrap();
    let second = source.list_candidate_links("Delft", 1, 2).await.unwrap();

    assert_eq!(first, second);
    server.verify().await;
}

#[tokio::test]
async fn detail_page_is_parsed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/appartement/huren/den-haag/free-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(DETAIL_PAGE))
        .mount(&server)
        .await;

    let detail = source(&server)
        .fetch_detail("/appartement/huren/den-haag/free-1")
        .await
        .unwrap();

    assert!(detail.found);
    assert_eq!(detail.bedroom_text.as_deref(), Some("3"));
}

#[tokio::test]
async fn missing_detail_page_is_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/appartement/huren/den-haag/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let detail = source(&server)
        .fetch_detail("/appartement/huren/den-haag/gone")
        .await
        .unwrap();

    assert!(!detail.found);
}

#[tokio::test]
async fn http_failures_are_classified() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/huren/utrecht/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/appartement/huren/utrecht/private"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let source = source(&server);

    let busy = source.count_result_pages("Utrecht", 0).await.unwrap_err();
    assert_eq!(busy.kind, FailureKind::HttpStatus(503));
    assert!(busy.is_transient());

    let denied = source
        .fetch_detail("/appartement/huren/utrecht/private")
        .await
        .unwrap_err();
    assert_eq!(denied.kind, FailureKind::Authentication);
    assert!(!denied.is_transient());
}

#[test]
fn invalid_base_url_is_rejected() {
    let err = HttpListingSource::new("not a url", FetchSettings::default()).unwrap_err();
    assert_eq!(err.kind, FailureKind::InvalidUrl);
}
