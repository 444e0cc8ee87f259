use serde::{Deserialize, Serialize};

/// Opaque listing identifier: the path fragment of the listing's detail page.
pub type ListingId = String;

/// One occurrence of a concerning word, with the sentence around it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlaggedMatch {
    /// Character offset of the match, relative to the start of `sentence_text`.
    #[serde(rename = "index")]
    pub offset_in_sentence: usize,
    /// The matched text, in its original case.
    #[serde(rename = "concerningText")]
    pub matched_word: String,
    #[serde(rename = "concerningSentence", default)]
    pub sentence_text: String,
}

/// Everything known about a single listing.
///
/// Fields are only written through [`ListingPatch`] so that the derived
/// `price_per_occupant` can never go stale. The serialized names match the
/// `data.json` layout written by earlier versions of the tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingRecord {
    #[serde(rename = "distance")]
    distance_tier: u32,
    has_details: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(rename = "email", default, skip_serializing_if = "Option::is_none")]
    contact_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bedroom_count: Option<u32>,
    #[serde(rename = "peopleCount", default, skip_serializing_if = "Option::is_none")]
    occupancy_count: Option<u32>,
    #[serde(rename = "price", default, skip_serializing_if = "Option::is_none")]
    total_price: Option<f64>,
    #[serde(rename = "roomPrice", default, skip_serializing_if = "Option::is_none")]
    price_per_occupant: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    suitable: Option<bool>,
    #[serde(
        rename = "concerningTexts",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    flagged_matches: Option<Vec<FlaggedMatch>>,
    #[serde(rename = "responded", default)]
    contacted: bool,
}

impl ListingRecord {
    /// A freshly discovered listing: only the distance tier is known.
    pub fn discovered(distance_tier: u32) -> Self {
        Self {
            distance_tier,
            has_details: false,
            title: None,
            contact_email: None,
            bedroom_count: None,
            occupancy_count: None,
            total_price: None,
            price_per_occupant: None,
            suitable: None,
            flagged_matches: None,
            contacted: false,
        }
    }

    pub fn distance_tier(&self) -> u32 {
        self.distance_tier
    }

    pub fn has_details(&self) -> bool {
        self.has_details
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn contact_email(&self) -> Option<&str> {
        self.contact_email.as_deref()
    }

    pub fn bedroom_count(&self) -> Option<u32> {
        self.bedroom_count
    }

    pub fn occupancy_count(&self) -> Option<u32> {
        self.occupancy_count
    }

    pub fn total_price(&self) -> Option<f64> {
        self.total_price
    }

    pub fn price_per_occupant(&self) -> Option<f64> {
        self.price_per_occupant
    }

    pub fn suitable(&self) -> Option<bool> {
        self.suitable
    }

    pub fn flagged_matches(&self) -> &[FlaggedMatch] {
        self.flagged_matches.as_deref().unwrap_or(&[])
    }

    pub fn contacted(&self) -> bool {
        self.contacted
    }

    /// Applies `patch` and reports whether anything changed.
    ///
    /// Descriptive fields are first-write-wins. Price and verdict follow the
    /// latest observation. `has_details` and `contacted` only ever go from
    /// false to true.
    pub(crate) fn apply(&mut self, patch: &ListingPatch) -> bool {
        let before = self.clone();

        fill(&mut self.title, &patch.title);
        fill(&mut self.contact_email, &patch.contact_email);
        fill(&mut self.bedroom_count, &patch.bedroom_count);
        fill(
            &mut self.occupancy_count,
            &patch.occupancy_count.filter(|count| *count > 0),
        );
        fill(&mut self.flagged_matches, &patch.flagged_matches);

        if let Some(price) = patch.total_price.filter(|p| p.is_finite() && *p > 0.0) {
            self.total_price = Some(price);
        }
        if let Some(suitable) = patch.suitable {
            self.suitable = Some(suitable);
        }
        self.has_details |= patch.has_details;
        self.contacted |= patch.contacted;

        self.recompute_derived();
        *self != before
    }

    /// Brings derived fields in line with their inputs.
    pub(crate) fn recompute_derived(&mut self) {
        if self.occupancy_count == Some(0) {
            self.occupancy_count = None;
        }
        self.price_per_occupant = match (self.total_price, self.occupancy_count) {
            (Some(price), Some(count)) => Some(price / f64::from(count)),
            _ => None,
        };
    }
}

fn fill<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
    if slot.is_none() {
        slot.clone_from(value);
    }
}

/// A partial set of listing fields to merge into a record.
///
/// `None` (or `false`) means "nothing observed" and never clears a value.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListingPatch {
    pub title: Option<String>,
    pub contact_email: Option<String>,
    pub bedroom_count: Option<u32>,
    pub occupancy_count: Option<u32>,
    pub total_price: Option<f64>,
    pub suitable: Option<bool>,
    pub flagged_matches: Option<Vec<FlaggedMatch>>,
    pub has_details: bool,
    pub contacted: bool,
}

impl ListingPatch {
    pub fn verdict(suitable: bool) -> Self {
        Self {
            suitable: Some(suitable),
            ..Self::default()
        }
    }

    pub fn contacted() -> Self {
        Self {
            contacted: true,
            ..Self::default()
        }
    }
}
