//! Transformation orchestrator - runs the listing, review and calendar
//! normalizers in order and assembles the eight-table bundle

use crate::etl::calendar::normalize_calendar;
use crate::etl::error::{EtlError, EtlResult};
use crate::etl::listings::normalize_listings;
use crate::etl::report::{separator, StageReport};
use crate::etl::reviews::normalize_reviews;
use crate::etl::types::{RawTables, TableBundle, TieBreak};
use std::collections::HashSet;
use tracing::info;

/// Knobs for one transformation run
#[derive(Debug, Clone, Copy, Default)]
pub struct TransformOptions {
    pub tie_break: TieBreak,
}

/// State handed from one stage to the next
///
/// Carries only the surviving listing ids (set once the listing stage has
/// finished filtering) and the row-count diagnostics.
#[derive(Debug, Default)]
pub struct TransformContext {
    pub surviving_listing_ids: HashSet<i64>,
    pub report: StageReport,
}

/// Transform raw collections into the eight output tables
pub fn transform(raw: &RawTables, options: &TransformOptions) -> EtlResult<TableBundle> {
    let mut ctx = TransformContext::default();
    transform_with(&mut ctx, raw, options)
}

/// Same as [`transform`], leaving the diagnostics in the caller's context
pub fn transform_with(
    ctx: &mut TransformContext,
    raw: &RawTables,
    options: &TransformOptions,
) -> EtlResult<TableBundle> {
    if raw.listings.is_empty() {
        return Err(EtlError::EmptyListings);
    }

    info!("Step 1/3: Normalizing listings...");
    let listing = normalize_listings(&raw.listings, &mut ctx.report)
        .map_err(|e| e.in_stage("listings"))?;
    ctx.surviving_listing_ids = listing.listings.iter().map(|l| l.id).collect();
    info!("✓ {} listings survived", ctx.surviving_listing_ids.len());
    separator();

    info!("Step 2/3: Normalizing reviews...");
    let reviews = normalize_reviews(
        &raw.reviews,
        &ctx.surviving_listing_ids,
        options.tie_break,
        &mut ctx.report,
    )
    .map_err(|e| e.in_stage("reviews"))?;
    info!("✓ {} reviews kept", reviews.reviews.len());
    separator();

    info!("Step 3/3: Normalizing calendar...");
    let availability = normalize_calendar(&raw.calendar, &ctx.surviving_listing_ids, &mut ctx.report)
        .map_err(|e| e.in_stage("calendar"))?;
    info!("✓ {} availability days kept", availability.len());

    let bundle = TableBundle {
        listing: listing.listings,
        review: reviews.reviews,
        availability,
        host: listing.hosts,
        host_verification: listing.verifications,
        listing_amenity: listing.listing_amenities,
        amenity: listing.amenities,
        reviewer: reviews.reviewers,
    };

    for (table, rows) in bundle.row_counts() {
        info!("  {}: {} rows", table, rows);
    }

    Ok(bundle)
}
