//! Listing normalizer - split raw listing documents into the listing fact
//! table plus host, verification and amenity tables

use crate::etl::error::{EtlError, EtlResult};
use crate::etl::parse::{
    bathrooms_count, format_date, is_stale, parse_date_text, parse_flag, parse_list_literal,
    parse_price, repair_count, Fields,
};
use crate::etl::report::StageReport;
use crate::etl::types::{
    Amenity, Host, HostVerification, Listing, ListingAmenity, ListingTables, RawRecord,
    ReviewScores,
};
use crate::etl::utils::{dedup_stable, dedup_stable_by_key, is_blank, normalize_amenity_name};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

const STAGE: &str = "listings";
const COLLECTION: &str = "listings";

/// Host columns projected from one listing document
/// Compared as a whole row when de-duplicating hosts
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct HostDraft {
    host_id: i64,
    host_url: Option<String>,
    host_name: Option<String>,
    host_since: Option<String>,
    host_location: Option<String>,
    host_about: Option<String>,
    host_response_time: Option<String>,
    host_response_rate: Option<String>,
    host_acceptance_rate: Option<String>,
    host_is_superhost: Option<String>,
    host_thumbnail_url: Option<String>,
    host_picture_url: Option<String>,
    host_neighbourhood: Option<String>,
    host_listings_count: Option<i64>,
    host_total_listings_count: Option<i64>,
    host_verifications: Option<String>,
    host_has_profile_pic: Option<String>,
    host_identity_verified: Option<String>,
}

/// Listing columns kept past the boundary; dates, price and amenities stay
/// as source text until their own cleaning step
#[derive(Debug, Clone)]
struct RawListing {
    index: usize,
    id: i64,
    host_id: i64,
    listing_url: Option<String>,
    name: Option<String>,
    description: Option<String>,
    neighborhood_overview: Option<String>,
    neighbourhood_cleansed: Option<String>,
    latitude: Option<Decimal>,
    longitude: Option<Decimal>,
    property_type: Option<String>,
    room_type: Option<String>,
    accommodates: Option<i64>,
    bathrooms_text: Option<String>,
    bedrooms: Option<i64>,
    beds: Option<i64>,
    amenities: Option<String>,
    price: Option<String>,
    minimum_nights: Option<i64>,
    maximum_nights: Option<i64>,
    has_availability: Option<bool>,
    number_of_reviews: Option<i64>,
    estimated_occupancy_l365d: Option<i64>,
    estimated_revenue_l365d: Option<Decimal>,
    last_scraped: Option<String>,
    first_review: Option<String>,
    last_review: Option<String>,
    review_scores: ReviewScores,
}

/// Raw amenity list of one surviving listing
#[derive(Debug, Clone)]
struct AmenitySource {
    index: usize,
    listing_id: i64,
    amenities: Option<String>,
}

/// Normalize raw listing documents into the five listing-side tables
pub fn normalize_listings(raw: &[RawRecord], report: &mut StageReport) -> EtlResult<ListingTables> {
    info!("Normalizing {} raw listings", raw.len());

    let mut drafts = Vec::with_capacity(raw.len());
    let mut listings = Vec::with_capacity(raw.len());
    for (index, record) in raw.iter().enumerate() {
        let fields = Fields::new(COLLECTION, index, record);
        drafts.push((index, read_host_draft(&fields)?));
        listings.push(read_listing(&fields)?);
    }

    let (hosts, verifications) = extract_hosts(drafts, report)?;

    // Listings must point at a surviving host; hosts are never filtered by listings
    let host_ids: HashSet<i64> = hosts.iter().map(|h| h.host_id).collect();
    let before = listings.len();
    let listings: Vec<RawListing> = listings
        .into_iter()
        .filter(|l| host_ids.contains(&l.host_id))
        .collect();
    report.record(STAGE, "listings with a valid host", before, listings.len());

    let (listings, sources) = clean_listings(listings, report)?;
    let (amenities, listing_amenities) = extract_amenities(sources, report)?;

    info!(
        "Listing stage produced {} listings, {} hosts, {} verifications, {} amenities",
        listings.len(),
        hosts.len(),
        verifications.len(),
        amenities.len()
    );

    Ok(ListingTables {
        listings,
        hosts,
        verifications,
        amenities,
        listing_amenities,
    })
}

fn read_host_draft(fields: &Fields<'_>) -> EtlResult<HostDraft> {
    Ok(HostDraft {
        host_id: fields.required_int("host_id")?,
        host_url: fields.text("host_url"),
        host_name: fields.text("host_name"),
        host_since: fields.text("host_since"),
        host_location: fields.text("host_location"),
        host_about: fields.text("host_about"),
        host_response_time: fields.text("host_response_time"),
        host_response_rate: fields.text("host_response_rate"),
        host_acceptance_rate: fields.text("host_acceptance_rate"),
        host_is_superhost: fields.text("host_is_superhost"),
        host_thumbnail_url: fields.text("host_thumbnail_url"),
        host_picture_url: fields.text("host_picture_url"),
        host_neighbourhood: fields.text("host_neighbourhood"),
        host_listings_count: fields.int("host_listings_count")?,
        host_total_listings_count: fields.int("host_total_listings_count")?,
        host_verifications: fields.text("host_verifications"),
        host_has_profile_pic: fields.text("host_has_profile_pic"),
        host_identity_verified: fields.text("host_identity_verified"),
    })
}

fn read_listing(fields: &Fields<'_>) -> EtlResult<RawListing> {
    Ok(RawListing {
        index: fields.index(),
        id: fields.required_int("id")?,
        host_id: fields.required_int("host_id")?,
        listing_url: fields.text("listing_url"),
        name: fields.text("name"),
        description: fields.text("description"),
        neighborhood_overview: fields.text("neighborhood_overview"),
        neighbourhood_cleansed: fields.text("neighbourhood_cleansed"),
        latitude: fields.decimal("latitude")?,
        longitude: fields.decimal("longitude")?,
        property_type: fields.text("property_type"),
        room_type: fields.text("room_type"),
        accommodates: fields.int("accommodates")?,
        bathrooms_text: fields.text("bathrooms_text"),
        bedrooms: fields.int("bedrooms")?,
        beds: fields.int("beds")?,
        amenities: fields.text("amenities"),
        price: fields.text("price"),
        minimum_nights: fields.int("minimum_nights")?,
        maximum_nights: fields.int("maximum_nights")?,
        has_availability: fields.flag("has_availability")?,
        number_of_reviews: fields.int("number_of_reviews")?,
        estimated_occupancy_l365d: fields.int("estimated_occupancy_l365d")?,
        estimated_revenue_l365d: fields.decimal("estimated_revenue_l365d")?,
        last_scraped: fields.text("last_scraped"),
        first_review: fields.text("first_review"),
        last_review: fields.text("last_review"),
        review_scores: ReviewScores {
            rating: fields.decimal("review_scores_rating")?,
            accuracy: fields.decimal("review_scores_accuracy")?,
            cleanliness: fields.decimal("review_scores_cleanliness")?,
            checkin: fields.decimal("review_scores_checkin")?,
            communication: fields.decimal("review_scores_communication")?,
            location: fields.decimal("review_scores_location")?,
            value: fields.decimal("review_scores_value")?,
        },
    })
}

/// De-duplicate, filter and split host rows into hosts and their verifications
fn extract_hosts(
    drafts: Vec<(usize, HostDraft)>,
    report: &mut StageReport,
) -> EtlResult<(Vec<Host>, Vec<HostVerification>)> {
    let before = drafts.len();
    let drafts = dedup_stable_by_key(drafts, |(_, draft)| draft.clone());
    report.record(STAGE, "distinct host rows", before, drafts.len());

    let before = drafts.len();
    let drafts: Vec<_> = drafts
        .into_iter()
        .filter(|(_, draft)| is_valid_host(draft))
        .collect();
    report.record(STAGE, "hosts with name, location and verifications", before, drafts.len());

    let before = drafts.len();
    let drafts = dedup_stable_by_key(drafts, |(_, draft)| draft.host_id);
    if drafts.len() < before {
        warn!(
            "{} host rows repeat an earlier host_id with different details; keeping the first",
            before - drafts.len()
        );
    }
    report.record(STAGE, "unique host ids", before, drafts.len());

    let mut hosts = Vec::with_capacity(drafts.len());
    let mut verifications = Vec::new();
    for (index, draft) in drafts {
        let host = to_host(index, &draft)?;

        let methods = match draft.host_verifications.as_deref() {
            None => Vec::new(),
            Some(text) => parse_list_literal(text)
                .map_err(|reason| EtlError::shape(COLLECTION, index, "host_verifications", reason))?,
        };
        for method in methods {
            let verification_id = verifications.len() as i64 + 1;
            verifications.push(HostVerification {
                verification_id,
                host_id: host.host_id,
                method: method.trim().to_string(),
            });
        }

        hosts.push(host);
    }

    Ok((hosts, verifications))
}

fn is_valid_host(draft: &HostDraft) -> bool {
    !is_blank(draft.host_name.as_deref())
        && !is_blank(draft.host_location.as_deref())
        && draft.host_verifications.as_deref() != Some("None")
}

fn to_host(index: usize, draft: &HostDraft) -> EtlResult<Host> {
    let flag = |field: &'static str, text: &Option<String>| match text {
        None => Ok(None),
        Some(text) => {
            parse_flag(text).map_err(|reason| EtlError::shape(COLLECTION, index, field, reason))
        }
    };

    let host_since = parse_date_text(COLLECTION, index, "host_since", draft.host_since.as_deref())?;

    Ok(Host {
        host_id: draft.host_id,
        host_url: draft.host_url.clone(),
        host_name: draft.host_name.clone().unwrap_or_default(),
        host_since: host_since.map(format_date),
        host_location: draft.host_location.clone().unwrap_or_default(),
        host_about: draft.host_about.clone(),
        host_is_superhost: flag("host_is_superhost", &draft.host_is_superhost)?,
        host_listings_count: draft.host_listings_count,
        host_total_listings_count: draft.host_total_listings_count,
        host_identity_verified: flag("host_identity_verified", &draft.host_identity_verified)?,
    })
}

/// Review, staleness and price filters followed by categorical repair
fn clean_listings(
    listings: Vec<RawListing>,
    report: &mut StageReport,
) -> EtlResult<(Vec<Listing>, Vec<AmenitySource>)> {
    let before = listings.len();
    let listings: Vec<RawListing> = listings
        .into_iter()
        .filter(|l| l.number_of_reviews.unwrap_or(0) > 0)
        .collect();
    report.record(STAGE, "listings with at least one review", before, listings.len());

    let mut dated = Vec::with_capacity(listings.len());
    for listing in listings {
        let date = |field: &'static str, text: &Option<String>| {
            parse_date_text(COLLECTION, listing.index, field, text.as_deref())
        };
        let last_scraped = date("last_scraped", &listing.last_scraped)?;
        let first_review = date("first_review", &listing.first_review)?;
        let last_review = date("last_review", &listing.last_review)?;
        dated.push((listing, last_scraped, first_review, last_review));
    }

    let before = dated.len();
    let fresh: Vec<(RawListing, NaiveDate, Option<NaiveDate>, NaiveDate)> = dated
        .into_iter()
        .filter_map(|(listing, scraped, first, last)| match (scraped, last) {
            (Some(scraped), Some(last)) if !is_stale(scraped, last) => {
                Some((listing, scraped, first, last))
            }
            _ => None,
        })
        .collect();
    report.record(STAGE, "listings reviewed within a year of scraping", before, fresh.len());

    let before = fresh.len();
    let priced: Vec<_> = fresh
        .into_iter()
        .filter_map(|(listing, scraped, first, last)| {
            let price = listing.price.as_deref().and_then(parse_price)?;
            Some((listing, scraped, first, last, price))
        })
        .collect();
    report.record(STAGE, "listings with a valid price", before, priced.len());

    let mut cleaned = Vec::with_capacity(priced.len());
    let mut sources = Vec::with_capacity(priced.len());
    for (listing, scraped, first, last, price) in priced {
        sources.push(AmenitySource {
            index: listing.index,
            listing_id: listing.id,
            amenities: listing.amenities.clone(),
        });
        cleaned.push(Listing {
            id: listing.id,
            bathrooms_count: bathrooms_count(listing.bathrooms_text.as_deref()),
            bedrooms: repair_count(listing.bedrooms),
            beds: repair_count(listing.beds),
            price,
            number_of_reviews: listing.number_of_reviews.unwrap_or(0),
            last_scraped: format_date(scraped),
            first_review: first.map(format_date),
            last_review: format_date(last),
            listing_url: listing.listing_url,
            name: listing.name,
            description: listing.description,
            neighborhood_overview: listing.neighborhood_overview,
            host_id: listing.host_id,
            neighbourhood_cleansed: listing.neighbourhood_cleansed,
            latitude: listing.latitude,
            longitude: listing.longitude,
            property_type: listing.property_type,
            room_type: listing.room_type,
            accommodates: listing.accommodates,
            minimum_nights: listing.minimum_nights,
            maximum_nights: listing.maximum_nights,
            has_availability: listing.has_availability,
            estimated_occupancy_l365d: listing.estimated_occupancy_l365d,
            estimated_revenue_l365d: listing.estimated_revenue_l365d,
            review_scores: listing.review_scores,
        });
    }

    Ok((cleaned, sources))
}

/// Explode amenity lists, build the normalized catalog and resolve the
/// listing/amenity associations against it
fn extract_amenities(
    sources: Vec<AmenitySource>,
    report: &mut StageReport,
) -> EtlResult<(Vec<Amenity>, Vec<ListingAmenity>)> {
    let sources = dedup_stable_by_key(sources, |s| (s.listing_id, s.amenities.clone()));

    let mut exploded: Vec<(i64, String)> = Vec::new();
    for source in &sources {
        let Some(text) = source.amenities.as_deref() else {
            continue;
        };
        let items = parse_list_literal(text)
            .map_err(|reason| EtlError::shape(COLLECTION, source.index, "amenities", reason))?;
        exploded.extend(items.into_iter().map(|item| (source.listing_id, item)));
    }

    let normalized: HashMap<String, String> = dedup_stable(exploded.iter().map(|(_, raw)| raw.clone()))
        .into_iter()
        .map(|raw| {
            let name = normalize_amenity_name(&raw);
            (raw, name)
        })
        .collect();

    let before = exploded.len();
    let named: Vec<(i64, String)> = exploded
        .into_iter()
        .filter_map(|(listing_id, raw)| {
            normalized
                .get(&raw)
                .filter(|name| !name.is_empty())
                .map(|name| (listing_id, name.clone()))
        })
        .collect();
    report.record(STAGE, "amenity rows with a non-empty name", before, named.len());

    let mut catalog: HashMap<String, i64> = HashMap::new();
    let mut amenities = Vec::new();
    for (_, name) in &named {
        if let Entry::Vacant(slot) = catalog.entry(name.clone()) {
            let amenities_id = amenities.len() as i64 + 1;
            slot.insert(amenities_id);
            amenities.push(Amenity {
                amenities_id,
                name: name.clone(),
            });
        }
    }

    let before = named.len();
    let listing_amenities = dedup_stable(named.iter().filter_map(|(listing_id, name)| {
        catalog.get(name).map(|&amenities_id| ListingAmenity {
            listing_id: *listing_id,
            amenities_id,
        })
    }));
    report.record(STAGE, "distinct listing amenities", before, listing_amenities.len());

    Ok((amenities, listing_amenities))
}
