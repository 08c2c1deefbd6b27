//! Raw document fixtures shared by the integration tests

use rental_etl::etl::{RawRecord, RawTables};
use serde_json::{json, Value};

pub fn record(value: Value) -> RawRecord {
    value.as_object().cloned().expect("fixture must be a JSON object")
}

/// A listing document with every field the pipeline reads, overridable per test
pub fn listing(id: i64, host_id: i64, overrides: Value) -> RawRecord {
    let mut base = record(json!({
        "_id": {"$oid": format!("65f0c0ffee{:04}", id)},
        "id": {"$numberLong": id.to_string()},
        "listing_url": format!("https://www.airbnb.com/rooms/{}", id),
        "scrape_id": 20240601000000_i64,
        "last_scraped": "2024-06-01",
        "source": "city scrape",
        "name": format!("Listing {}", id),
        "description": "Bright apartment",
        "neighborhood_overview": null,
        "picture_url": "https://a0.muscache.com/pictures/1.jpg",
        "license": null,
        "instant_bookable": "f",
    }));
    base.extend(host_fields(host_id));
    base.extend(place_fields());
    base.extend(review_fields());

    if let Value::Object(fields) = overrides {
        base.extend(fields);
    }
    base
}

fn host_fields(host_id: i64) -> RawRecord {
    record(json!({
        "host_id": host_id,
        "host_url": format!("https://www.airbnb.com/users/show/{}", host_id),
        "host_name": "Ana",
        "host_since": "2019-03-15",
        "host_location": "Mexico City, Mexico",
        "host_about": "",
        "host_response_time": "within an hour",
        "host_response_rate": "100%",
        "host_acceptance_rate": "98%",
        "host_is_superhost": "t",
        "host_thumbnail_url": "https://a0.muscache.com/im/users/1/small.jpg",
        "host_picture_url": "https://a0.muscache.com/im/users/1/large.jpg",
        "host_neighbourhood": "Roma",
        "host_listings_count": 3,
        "host_total_listings_count": 4,
        "host_verifications": "['email', 'phone']",
        "host_has_profile_pic": "t",
        "host_identity_verified": "t",
    }))
}

fn place_fields() -> RawRecord {
    record(json!({
        "neighbourhood_cleansed": "Cuauhtémoc",
        "latitude": 19.41,
        "longitude": -99.16,
        "property_type": "Entire rental unit",
        "room_type": "Entire home/apt",
        "accommodates": 4,
        "bathrooms_text": "1 bath",
        "bedrooms": 2,
        "beds": 2,
        "amenities": "[\"Kitchen\"]",
        "price": "$950.00",
        "minimum_nights": 2,
        "maximum_nights": 365,
        "has_availability": "t",
    }))
}

fn review_fields() -> RawRecord {
    record(json!({
        "number_of_reviews": 12,
        "first_review": "2021-01-10",
        "last_review": "2024-05-20",
        "review_scores_rating": 4.87,
        "review_scores_accuracy": 4.9,
        "review_scores_cleanliness": 4.8,
        "review_scores_checkin": 5.0,
        "review_scores_communication": 4.95,
        "review_scores_location": 4.7,
        "review_scores_value": 4.6,
    }))
}

pub fn review(id: i64, listing_id: i64, reviewer_id: i64, name: &str, date: &str) -> RawRecord {
    record(json!({
        "_id": {"$oid": format!("65f0beef{:06}", id)},
        "listing_id": listing_id,
        "id": id,
        "date": date,
        "reviewer_id": reviewer_id,
        "reviewer_name": name,
        "comments": "Muy buena ubicación",
    }))
}

pub fn calendar_day(listing_id: i64, date: &str, available: &str) -> RawRecord {
    record(json!({
        "_id": {"$oid": "65f0da7e0000"},
        "listing_id": listing_id,
        "date": date,
        "available": available,
        "price": "$950.00",
        "adjusted_price": "",
        "minimum_nights": 2,
        "maximum_nights": 365,
    }))
}

/// Six listings covering every listing-side exclusion rule.
///
/// Survivors: 101 and 102 (host 1). Dropped: 103 stale, 104 invalid host,
/// 105 blank price, 106 no reviews.
pub fn raw_tables() -> RawTables {
    let listings = vec![
        listing(
            101,
            1,
            json!({
                "price": "$1,234.50",
                "bathrooms_text": "1.5 baths",
                "last_review": "2023-07-01",
                "amenities": "[\"Wi-Fi\", \"Café access\", \"Kitchen\"]",
            }),
        ),
        listing(
            102,
            1,
            json!({
                "bathrooms_text": "",
                "amenities": "[\"wi fi \", \"WI-FI\"]",
            }),
        ),
        listing(
            103,
            2,
            json!({
                "host_name": "Luis",
                "host_verifications": "['email']",
                "last_review": "2023-05-01",
            }),
        ),
        listing(104, 3, json!({"host_name": "Marta", "host_location": ""})),
        listing(105, 1, json!({"price": ""})),
        listing(106, 2, json!({"host_name": "Luis", "host_verifications": "['email']", "number_of_reviews": 0})),
    ];

    let reviews = vec![
        review(1, 101, 42, "Ana", "2024-01-03"),
        review(2, 101, 42, "Anna", "2024-01-04"),
        review(3, 102, 42, "Ana", "2024-02-01"),
        review(4, 102, 42, "Ana", "2024-02-10T09:15:00Z"),
        review(5, 102, 7, "Zoe", "2024-03-01"),
        review(6, 103, 8, "Pedro", "2023-04-01"),
        review(7, 999, 9, "Orphan", "2024-01-01"),
    ];

    let calendar = vec![
        calendar_day(101, "2024-06-02", "t"),
        calendar_day(101, "2024-06-03", "f"),
        calendar_day(102, "2024-06-02", "t"),
        calendar_day(104, "2024-06-02", "t"),
        calendar_day(999, "2024-06-02", "f"),
    ];

    RawTables {
        listings,
        reviews,
        calendar,
    }
}
