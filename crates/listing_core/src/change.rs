/// Which durable collections a mutation touched.
///
/// Every mutating [`crate::ListingBook`] operation returns one of these; the
/// persistence side owns the resulting dirty state.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChangeSet {
    pub records: bool,
    pub exclusions: bool,
}

impl ChangeSet {
    pub const NONE: ChangeSet = ChangeSet {
        records: false,
        exclusions: false,
    };

    pub fn records() -> Self {
        Self {
            records: true,
            exclusions: false,
        }
    }

    pub fn exclusions() -> Self {
        Self {
            records: false,
            exclusions: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.records && !self.exclusions
    }

    pub fn union(self, other: ChangeSet) -> ChangeSet {
        ChangeSet {
            records: self.records || other.records,
            exclusions: self.exclusions || other.exclusions,
        }
    }
}
