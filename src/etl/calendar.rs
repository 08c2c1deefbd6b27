//! Calendar normalizer - availability days of surviving listings

use crate::etl::error::EtlResult;
use crate::etl::parse::{format_date, parse_date_text, Fields};
use crate::etl::report::StageReport;
use crate::etl::types::{Availability, RawRecord};
use std::collections::HashSet;
use tracing::info;

const STAGE: &str = "calendar";
const COLLECTION: &str = "calendar";

/// Only the columns that survive projection; `price`, `adjusted_price`,
/// `minimum_nights` and `maximum_nights` are never read
struct RawCalendarDay {
    index: usize,
    listing_id: i64,
    date: String,
    available: Option<bool>,
}

pub fn normalize_calendar(
    raw: &[RawRecord],
    surviving_listing_ids: &HashSet<i64>,
    report: &mut StageReport,
) -> EtlResult<Vec<Availability>> {
    info!("Normalizing {} raw calendar days", raw.len());

    let days = raw
        .iter()
        .enumerate()
        .map(|(index, record)| read_day(&Fields::new(COLLECTION, index, record)))
        .collect::<EtlResult<Vec<_>>>()?;

    let before = days.len();
    let days: Vec<RawCalendarDay> = days
        .into_iter()
        .filter(|d| surviving_listing_ids.contains(&d.listing_id))
        .collect();
    report.record(STAGE, "calendar days of surviving listings", before, days.len());

    days.into_iter()
        .map(|day| -> EtlResult<Availability> {
            let date = parse_date_text(COLLECTION, day.index, "date", Some(day.date.as_str()))?
                .map(format_date)
                .unwrap_or_default();
            Ok(Availability {
                listing_id: day.listing_id,
                date,
                available: day.available,
            })
        })
        .collect()
}

fn read_day(fields: &Fields<'_>) -> EtlResult<RawCalendarDay> {
    Ok(RawCalendarDay {
        index: fields.index(),
        listing_id: fields.required_int("listing_id")?,
        date: fields.required_text("date")?,
        available: fields.flag("available")?,
    })
}
