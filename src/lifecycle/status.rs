/// Lifecycle states for a listing
///
/// A listing is ACTIVE from first observation until the lifecycle tracker
/// has missed it in enough consecutive passes, at which point it becomes
/// DELISTED and is excluded from further reconciliation.
use std::fmt;

/// The market presence of a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListingStatus {
    /// The ad was present the last time its source was scraped
    Active,

    /// The ad disappeared from the source for consecutive passes
    Delisted,
}

impl ListingStatus {
    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Delisted => "delisted",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "delisted" => Some(Self::Delisted),
            _ => None,
        }
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
