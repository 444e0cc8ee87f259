use listing_core::{derive_occupancy, occupancy_candidates, parse_bedroom_count, parse_price};

#[test]
fn bedroom_count_takes_first_number() {
    assert_eq!(parse_bedroom_count("3"), Some(3));
    assert_eq!(parse_bedroom_count(" 2 slaapkamers"), Some(2));
    assert_eq!(parse_bedroom_count("onbekend"), None);
}

#[test]
fn occupancy_candidates_cover_dutch_and_english() {
    let hints = "Suitable for 2 persons, max 3 personen. 1 persoon! 4 people; 5 person ";
    assert_eq!(occupancy_candidates(hints), vec![2, 3, 1, 4, 5]);
}

#[test]
fn occupancy_is_minimum_of_candidates_and_bedrooms() {
    assert_eq!(derive_occupancy(Some(3), "max 2 personen."), Some(2));
    assert_eq!(derive_occupancy(Some(2), "up to 4 people."), Some(2));
}

#[test]
fn occupancy_falls_back_to_bedrooms_then_unset() {
    assert_eq!(derive_occupancy(Some(3), "no hints here"), Some(3));
    assert_eq!(derive_occupancy(Some(0), "no hints here"), None);
    assert_eq!(derive_occupancy(None, ""), None);
    assert_eq!(derive_occupancy(None, "0 persons, 2 persons."), Some(2));
}

#[test]
fn price_strips_thousands_separators() {
    assert_eq!(parse_price("<span>€ 1.250</span> /mnd"), Some(1250.0));
    assert_eq!(parse_price("€950"), Some(950.0));
    assert_eq!(parse_price("Prijs op aanvraag"), None);
    assert_eq!(parse_price("€ 0"), None);
}
