//! Review normalizer - orphan filtering and reviewer extraction

use crate::etl::error::EtlResult;
use crate::etl::parse::{format_date, parse_date_text, Fields};
use crate::etl::report::StageReport;
use crate::etl::types::{RawRecord, Review, ReviewTables, Reviewer, TieBreak};
use crate::etl::utils::dedup_stable;
use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use tracing::info;

const STAGE: &str = "reviews";
const COLLECTION: &str = "reviews";

#[derive(Debug, Clone)]
struct RawReview {
    index: usize,
    id: Option<i64>,
    listing_id: i64,
    reviewer_id: i64,
    reviewer_name: Option<String>,
    date: String,
    comments: Option<String>,
}

/// How often one reviewer id appeared under one name
#[derive(Debug, Clone, PartialEq, Eq)]
struct NameTally {
    reviewer_id: i64,
    name: String,
    count: usize,
    first_seen: usize,
}

/// Keep reviews of surviving listings and resolve one name per reviewer
pub fn normalize_reviews(
    raw: &[RawRecord],
    surviving_listing_ids: &HashSet<i64>,
    tie_break: TieBreak,
    report: &mut StageReport,
) -> EtlResult<ReviewTables> {
    info!("Normalizing {} raw reviews", raw.len());

    let reviews = raw
        .iter()
        .enumerate()
        .map(|(index, record)| read_review(&Fields::new(COLLECTION, index, record)))
        .collect::<EtlResult<Vec<_>>>()?;

    let before = reviews.len();
    let reviews: Vec<RawReview> = reviews
        .into_iter()
        .filter(|r| surviving_listing_ids.contains(&r.listing_id))
        .collect();
    report.record(STAGE, "reviews of surviving listings", before, reviews.len());

    let reviewers = extract_reviewers(&reviews, tie_break);

    let mut cleaned = Vec::with_capacity(reviews.len());
    for review in reviews {
        let date = parse_date_text(COLLECTION, review.index, "date", Some(review.date.as_str()))?
            .map(format_date)
            .unwrap_or_default();
        cleaned.push(Review {
            id: review.id,
            listing_id: review.listing_id,
            reviewer_id: review.reviewer_id,
            date,
            comments: review.comments,
        });
    }

    info!(
        "Review stage produced {} reviews from {} reviewers",
        cleaned.len(),
        reviewers.len()
    );

    Ok(ReviewTables {
        reviews: cleaned,
        reviewers,
    })
}

fn read_review(fields: &Fields<'_>) -> EtlResult<RawReview> {
    Ok(RawReview {
        index: fields.index(),
        id: fields.int("id")?,
        listing_id: fields.required_int("listing_id")?,
        reviewer_id: fields.required_int("reviewer_id")?,
        reviewer_name: fields.text("reviewer_name"),
        date: fields.required_text("date")?,
        comments: fields.text("comments"),
    })
}

/// One row per distinct reviewer id, carrying its most frequent name
fn extract_reviewers(reviews: &[RawReview], tie_break: TieBreak) -> Vec<Reviewer> {
    let names = resolve_names(reviews, tie_break);

    dedup_stable(reviews.iter().map(|r| r.reviewer_id))
        .into_iter()
        .map(|reviewer_id| Reviewer {
            reviewer_id,
            reviewer_name: names.get(&reviewer_id).cloned(),
        })
        .collect()
}

/// Count every (reviewer, name) occurrence over all review rows and pick the
/// top-ranked name per reviewer
fn resolve_names(reviews: &[RawReview], tie_break: TieBreak) -> HashMap<i64, String> {
    let mut tallies: Vec<NameTally> = Vec::new();
    let mut positions: HashMap<(i64, &str), usize> = HashMap::new();

    for (row, review) in reviews.iter().enumerate() {
        let Some(name) = review.reviewer_name.as_deref() else {
            continue;
        };
        match positions.entry((review.reviewer_id, name)) {
            Entry::Occupied(slot) => tallies[*slot.get()].count += 1,
            Entry::Vacant(slot) => {
                slot.insert(tallies.len());
                tallies.push(NameTally {
                    reviewer_id: review.reviewer_id,
                    name: name.to_string(),
                    count: 1,
                    first_seen: row,
                });
            }
        }
    }

    tallies.sort_by(|a, b| rank(a, b, tie_break));

    let mut names = HashMap::new();
    for tally in tallies {
        names.entry(tally.reviewer_id).or_insert(tally.name);
    }
    names
}

/// Total order: reviewer id ascending, count descending, then the tie-break
fn rank(a: &NameTally, b: &NameTally, tie_break: TieBreak) -> Ordering {
    a.reviewer_id
        .cmp(&b.reviewer_id)
        .then_with(|| b.count.cmp(&a.count))
        .then_with(|| match tie_break {
            TieBreak::Alphabetical => a.name.cmp(&b.name),
            TieBreak::FirstSeen => a.first_seen.cmp(&b.first_seen),
        })
}
