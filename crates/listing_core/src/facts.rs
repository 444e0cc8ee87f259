//! Parsers for the raw detail-page text fields.
//!
//! Each parser returns `None` when its pattern is absent; callers leave the
//! corresponding field unset rather than substituting a default.

use std::sync::LazyLock;

use regex::Regex;

static DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+").expect("digit pattern is valid"));

static OCCUPANTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9])\s(?:persons|personen|persoon|person|people)[^a-zA-Z]")
        .expect("occupant pattern is valid")
});

static PRICE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"€\s*([0-9.]+)").expect("price pattern is valid"));

/// First run of digits in the bedroom-count cell, e.g. `"3"` or `"3 kamers"`.
pub fn parse_bedroom_count(text: &str) -> Option<u32> {
    DIGITS.find(text)?.as_str().parse().ok()
}

/// Every occupant count mentioned as `"<digit> person(s)/people/persoon/personen"`.
pub fn occupancy_candidates(hints: &str) -> Vec<u32> {
    OCCUPANTS
        .captures_iter(hints)
        .filter_map(|caps| caps.get(1)?.as_str().parse().ok())
        .collect()
}

/// Smallest plausible occupant count.
///
/// Takes the minimum over the non-zero candidates in `hints` and the bedroom
/// count. With neither available the result is `None`.
pub fn derive_occupancy(bedroom_count: Option<u32>, hints: &str) -> Option<u32> {
    occupancy_candidates(hints)
        .into_iter()
        .chain(bedroom_count)
        .filter(|count| *count > 0)
        .min()
}

/// Total price from a currency amount such as `"€ 1.250 /mnd"`.
///
/// Dots are thousands separators and are dropped.
pub fn parse_price(text: &str) -> Option<f64> {
    let amount = PRICE.captures(text)?.get(1)?.as_str().replace('.', "");
    let price: f64 = amount.parse().ok()?;
    (price.is_finite() && price > 0.0).then_some(price)
}
