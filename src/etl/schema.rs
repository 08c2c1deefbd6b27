//! Destination schema inference for output tables

use crate::etl::types::{
    Amenity, Availability, Host, HostVerification, Listing, ListingAmenity, Review, Reviewer,
};
use chrono::NaiveDateTime;
use rust_decimal::Decimal;

/// One cell of an output row
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Int(i64),
    Decimal(Decimal),
    Bool(bool),
    Timestamp(NaiveDateTime),
    Text(String),
}

impl SqlValue {
    /// Storage type implied by this value; `None` for nulls
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            SqlValue::Null => None,
            SqlValue::Int(_) => Some(ColumnType::BigInt),
            SqlValue::Decimal(_) => Some(ColumnType::Decimal),
            SqlValue::Bool(_) => Some(ColumnType::Bool),
            SqlValue::Timestamp(_) => Some(ColumnType::Timestamp),
            SqlValue::Text(_) => Some(ColumnType::Text),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<Decimal> for SqlValue {
    fn from(v: Decimal) -> Self {
        SqlValue::Decimal(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(SqlValue::Null, Into::into)
    }
}

/// Storage types the loader can create
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    BigInt,
    Decimal,
    Bool,
    Timestamp,
    Text,
}

impl ColumnType {
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::BigInt => "BIGINT",
            ColumnType::Decimal => "NUMERIC(20,7)",
            ColumnType::Bool => "BOOLEAN",
            ColumnType::Timestamp => "TIMESTAMP",
            ColumnType::Text => "TEXT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub column_type: ColumnType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub table: &'static str,
    pub columns: Vec<ColumnDef>,
}

impl TableSchema {
    /// `CREATE TABLE` statement for this schema
    pub fn create_statement(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|c| format!("    {} {}", quote_ident(c.name), c.column_type.sql_type()))
            .collect::<Vec<_>>()
            .join(",\n");
        format!("CREATE TABLE {} (\n{}\n)", quote_ident(self.table), columns)
    }

    pub fn column_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| quote_ident(c.name))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// A typed output table that can be written to the relational sink
pub trait Table {
    const NAME: &'static str;
    const COLUMNS: &'static [&'static str];

    /// Cell values in `COLUMNS` order
    fn values(&self) -> Vec<SqlValue>;
}

/// Infer each column's storage type from the first non-null value in it;
/// columns that are null throughout (or tables with no rows) become text
pub fn infer_schema<T: Table>(rows: &[T]) -> TableSchema {
    let mut types: Vec<Option<ColumnType>> = vec![None; T::COLUMNS.len()];

    for row in rows {
        if types.iter().all(Option::is_some) {
            break;
        }
        for (slot, value) in types.iter_mut().zip(row.values()) {
            if slot.is_none() {
                *slot = value.column_type();
            }
        }
    }

    TableSchema {
        table: T::NAME,
        columns: T::COLUMNS
            .iter()
            .zip(types)
            .map(|(&name, column_type)| ColumnDef {
                name,
                column_type: column_type.unwrap_or(ColumnType::Text),
            })
            .collect(),
    }
}

impl Table for Listing {
    const NAME: &'static str = "listing";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "listing_url",
        "name",
        "description",
        "neighborhood_overview",
        "host_id",
        "neighbourhood_cleansed",
        "latitude",
        "longitude",
        "property_type",
        "room_type",
        "accommodates",
        "bathrooms_count",
        "bedrooms",
        "beds",
        "price",
        "minimum_nights",
        "maximum_nights",
        "has_availability",
        "number_of_reviews",
        "estimated_occupancy_l365d",
        "estimated_revenue_l365d",
        "last_scraped",
        "first_review",
        "last_review",
        "review_scores_rating",
        "review_scores_accuracy",
        "review_scores_cleanliness",
        "review_scores_checkin",
        "review_scores_communication",
        "review_scores_location",
        "review_scores_value",
    ];

    fn values(&self) -> Vec<SqlValue> {
        let scores = &self.review_scores;
        vec![
            self.id.into(),
            self.listing_url.clone().into(),
            self.name.clone().into(),
            self.description.clone().into(),
            self.neighborhood_overview.clone().into(),
            self.host_id.into(),
            self.neighbourhood_cleansed.clone().into(),
            self.latitude.into(),
            self.longitude.into(),
            self.property_type.clone().into(),
            self.room_type.clone().into(),
            self.accommodates.into(),
            self.bathrooms_count.into(),
            self.bedrooms.into(),
            self.beds.into(),
            self.price.into(),
            self.minimum_nights.into(),
            self.maximum_nights.into(),
            self.has_availability.into(),
            self.number_of_reviews.into(),
            self.estimated_occupancy_l365d.into(),
            self.estimated_revenue_l365d.into(),
            self.last_scraped.clone().into(),
            self.first_review.clone().into(),
            self.last_review.clone().into(),
            scores.rating.into(),
            scores.accuracy.into(),
            scores.cleanliness.into(),
            scores.checkin.into(),
            scores.communication.into(),
            scores.location.into(),
            scores.value.into(),
        ]
    }
}

impl Table for Host {
    const NAME: &'static str = "host";
    const COLUMNS: &'static [&'static str] = &[
        "host_id",
        "host_url",
        "host_name",
        "host_since",
        "host_location",
        "host_about",
        "host_is_superhost",
        "host_listings_count",
        "host_total_listings_count",
        "host_identity_verified",
    ];

    fn values(&self) -> Vec<SqlValue> {
        vec![
            self.host_id.into(),
            self.host_url.clone().into(),
            self.host_name.clone().into(),
            self.host_since.clone().into(),
            self.host_location.clone().into(),
            self.host_about.clone().into(),
            self.host_is_superhost.into(),
            self.host_listings_count.into(),
            self.host_total_listings_count.into(),
            self.host_identity_verified.into(),
        ]
    }
}

impl Table for HostVerification {
    const NAME: &'static str = "host_verification";
    const COLUMNS: &'static [&'static str] = &["verification_id", "host_id", "method"];

    fn values(&self) -> Vec<SqlValue> {
        vec![
            self.verification_id.into(),
            self.host_id.into(),
            self.method.clone().into(),
        ]
    }
}

impl Table for Amenity {
    const NAME: &'static str = "amenity";
    const COLUMNS: &'static [&'static str] = &["amenities_id", "name"];

    fn values(&self) -> Vec<SqlValue> {
        vec![self.amenities_id.into(), self.name.clone().into()]
    }
}

impl Table for ListingAmenity {
    const NAME: &'static str = "listing_amenity";
    const COLUMNS: &'static [&'static str] = &["listing_id", "amenities_id"];

    fn values(&self) -> Vec<SqlValue> {
        vec![self.listing_id.into(), self.amenities_id.into()]
    }
}

impl Table for Review {
    const NAME: &'static str = "review";
    const COLUMNS: &'static [&'static str] =
        &["id", "listing_id", "reviewer_id", "date", "comments"];

    fn values(&self) -> Vec<SqlValue> {
        vec![
            self.id.into(),
            self.listing_id.into(),
            self.reviewer_id.into(),
            self.date.clone().into(),
            self.comments.clone().into(),
        ]
    }
}

impl Table for Reviewer {
    const NAME: &'static str = "reviewer";
    const COLUMNS: &'static [&'static str] = &["reviewer_id", "reviewer_name"];

    fn values(&self) -> Vec<SqlValue> {
        vec![self.reviewer_id.into(), self.reviewer_name.clone().into()]
    }
}

impl Table for Availability {
    const NAME: &'static str = "availability";
    const COLUMNS: &'static [&'static str] = &["listing_id", "date", "available"];

    fn values(&self) -> Vec<SqlValue> {
        vec![
            self.listing_id.into(),
            self.date.clone().into(),
            self.available.into(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Reading {
        taken_at: Option<NaiveDateTime>,
        level: Option<Decimal>,
    }

    impl Table for Reading {
        const NAME: &'static str = "reading";
        const COLUMNS: &'static [&'static str] = &["taken_at", "level"];

        fn values(&self) -> Vec<SqlValue> {
            vec![self.taken_at.into(), self.level.into()]
        }
    }

    #[test]
    fn test_infer_schema_type_mapping() {
        let rows = vec![Availability {
            listing_id: 1,
            date: "2024-06-02".to_string(),
            available: Some(true),
        }];
        let schema = infer_schema(&rows);

        let types: Vec<&str> = schema.columns.iter().map(|c| c.column_type.sql_type()).collect();
        assert_eq!(types, vec!["BIGINT", "TEXT", "BOOLEAN"]);
    }

    #[test]
    fn test_infer_schema_skips_leading_nulls() {
        let taken_at = chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let rows = vec![
            Reading {
                taken_at: None,
                level: None,
            },
            Reading {
                taken_at: Some(taken_at),
                level: None,
            },
        ];
        let schema = infer_schema(&rows);

        assert_eq!(schema.columns[0].column_type, ColumnType::Timestamp);
        // Null throughout falls back to text
        assert_eq!(schema.columns[1].column_type, ColumnType::Text);
    }

    #[test]
    fn test_listing_values_match_columns() {
        let listing = Listing {
            id: 1,
            listing_url: None,
            name: Some("Casa".to_string()),
            description: None,
            neighborhood_overview: None,
            host_id: 2,
            neighbourhood_cleansed: None,
            latitude: Some(Decimal::new(1941, 2)),
            longitude: None,
            property_type: None,
            room_type: None,
            accommodates: Some(2),
            bathrooms_count: 1,
            bedrooms: Some(1),
            beds: None,
            price: Decimal::new(850, 0),
            minimum_nights: None,
            maximum_nights: None,
            has_availability: None,
            number_of_reviews: 4,
            estimated_occupancy_l365d: None,
            estimated_revenue_l365d: None,
            last_scraped: "2024-06-01".to_string(),
            first_review: None,
            last_review: "2024-05-01".to_string(),
            review_scores: Default::default(),
        };

        assert_eq!(listing.values().len(), Listing::COLUMNS.len());
        let schema = infer_schema(&[listing]);
        let price = schema.columns.iter().find(|c| c.name == "price").unwrap();
        assert_eq!(price.column_type.sql_type(), "NUMERIC(20,7)");
    }

    #[test]
    fn test_create_statement() {
        let schema = infer_schema(&[Amenity {
            amenities_id: 1,
            name: "wifi".to_string(),
        }]);

        assert_eq!(
            schema.create_statement(),
            "CREATE TABLE \"amenity\" (\n    \"amenities_id\" BIGINT,\n    \"name\" TEXT\n)"
        );
        assert_eq!(schema.column_list(), "\"amenities_id\", \"name\"");
    }

    #[test]
    fn test_empty_table_schema_is_text() {
        let schema = infer_schema::<Reviewer>(&[]);

        assert_eq!(schema.table, "reviewer");
        assert!(schema
            .columns
            .iter()
            .all(|c| c.column_type == ColumnType::Text));
    }
}
