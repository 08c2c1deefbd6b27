//! Core data types for the ETL pipeline
//! Pure data structures with no behavior

use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;

/// One untyped document as exported from the document store
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

/// The three raw collections, fully materialized
#[derive(Debug, Clone, Default)]
pub struct RawTables {
    pub listings: Vec<RawRecord>,
    pub reviews: Vec<RawRecord>,
    pub calendar: Vec<RawRecord>,
}

/// Cleaned listing fact row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Listing {
    pub id: i64,
    pub listing_url: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub neighborhood_overview: Option<String>,
    pub host_id: i64,
    pub neighbourhood_cleansed: Option<String>,
    pub latitude: Option<Decimal>,
    pub longitude: Option<Decimal>,
    pub property_type: Option<String>,
    pub room_type: Option<String>,
    pub accommodates: Option<i64>,
    pub bathrooms_count: i64,
    pub bedrooms: Option<i64>,
    pub beds: Option<i64>,
    pub price: Decimal,
    pub minimum_nights: Option<i64>,
    pub maximum_nights: Option<i64>,
    pub has_availability: Option<bool>,
    pub number_of_reviews: i64,
    pub estimated_occupancy_l365d: Option<i64>,
    pub estimated_revenue_l365d: Option<Decimal>,
    pub last_scraped: String,
    pub first_review: Option<String>,
    pub last_review: String,
    pub review_scores: ReviewScores,
}

/// Review score aggregates carried on each listing
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReviewScores {
    pub rating: Option<Decimal>,
    pub accuracy: Option<Decimal>,
    pub cleanliness: Option<Decimal>,
    pub checkin: Option<Decimal>,
    pub communication: Option<Decimal>,
    pub location: Option<Decimal>,
    pub value: Option<Decimal>,
}

/// Host dimension row, extracted from the listing documents
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Host {
    pub host_id: i64,
    pub host_url: Option<String>,
    pub host_name: String,
    pub host_since: Option<String>,
    pub host_location: String,
    pub host_about: Option<String>,
    pub host_is_superhost: Option<bool>,
    pub host_listings_count: Option<i64>,
    pub host_total_listings_count: Option<i64>,
    pub host_identity_verified: Option<bool>,
}

/// One identity-proof channel completed by a host
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostVerification {
    pub verification_id: i64,
    pub host_id: i64,
    pub method: String,
}

/// Catalog entry for one normalized amenity name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Amenity {
    pub amenities_id: i64,
    pub name: String,
}

/// Listing to amenity association
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ListingAmenity {
    pub listing_id: i64,
    pub amenities_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Review {
    pub id: Option<i64>,
    pub listing_id: i64,
    pub reviewer_id: i64,
    pub date: String,
    pub comments: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reviewer {
    pub reviewer_id: i64,
    pub reviewer_name: Option<String>,
}

/// One calendar day of a surviving listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Availability {
    pub listing_id: i64,
    pub date: String,
    pub available: Option<bool>,
}

/// Everything the listing stage produces
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListingTables {
    pub listings: Vec<Listing>,
    pub hosts: Vec<Host>,
    pub verifications: Vec<HostVerification>,
    pub amenities: Vec<Amenity>,
    pub listing_amenities: Vec<ListingAmenity>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReviewTables {
    pub reviews: Vec<Review>,
    pub reviewers: Vec<Reviewer>,
}

/// The eight output tables, returned as one loadable unit
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TableBundle {
    pub listing: Vec<Listing>,
    pub review: Vec<Review>,
    pub availability: Vec<Availability>,
    pub host: Vec<Host>,
    pub host_verification: Vec<HostVerification>,
    pub listing_amenity: Vec<ListingAmenity>,
    pub amenity: Vec<Amenity>,
    pub reviewer: Vec<Reviewer>,
}

impl TableBundle {
    pub fn row_counts(&self) -> [(&'static str, usize); 8] {
        [
            ("listing", self.listing.len()),
            ("review", self.review.len()),
            ("availability", self.availability.len()),
            ("host", self.host.len()),
            ("host_verification", self.host_verification.len()),
            ("listing_amenity", self.listing_amenity.len()),
            ("amenity", self.amenity.len()),
            ("reviewer", self.reviewer.len()),
        ]
    }
}

/// How equally frequent reviewer names are ranked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    /// Lowest name in byte order wins
    #[default]
    Alphabetical,
    /// Name seen earliest in the review rows wins
    FirstSeen,
}

impl FromStr for TieBreak {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "alphabetical" => Ok(TieBreak::Alphabetical),
            "first_seen" | "first-seen" => Ok(TieBreak::FirstSeen),
            other => Err(format!("unknown tie-break rule: {}", other)),
        }
    }
}

/// Write operation statistics for one table
#[derive(Debug, Clone)]
pub struct WriteStats {
    pub table: &'static str,
    pub inserted: usize,
    pub created: bool,
}

impl std::fmt::Display for WriteStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: inserted {} ({})",
            self.table,
            self.inserted,
            if self.created { "created" } else { "truncated" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tie_break_from_str() {
        assert_eq!("alphabetical".parse(), Ok(TieBreak::Alphabetical));
        assert_eq!(" First_Seen ".parse(), Ok(TieBreak::FirstSeen));
        assert!("random".parse::<TieBreak>().is_err());
    }

    #[test]
    fn test_row_counts_order() {
        let bundle = TableBundle {
            review: vec![Review {
                id: Some(1),
                listing_id: 10,
                reviewer_id: 42,
                date: "2024-01-01".to_string(),
                comments: None,
            }],
            ..Default::default()
        };

        let counts = bundle.row_counts();
        assert_eq!(counts[0], ("listing", 0));
        assert_eq!(counts[1], ("review", 1));
        assert_eq!(counts[7].0, "reviewer");
    }
}
