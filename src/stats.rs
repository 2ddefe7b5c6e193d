//! Per-segment descriptive statistics

use std::collections::BTreeMap;

use serde::Serialize;

use crate::data::{columns, CustomerRecord, Dataset};
use crate::segment::{group_by_segment, SegmentLabel};

/// Mean of the values, `None` when there are none
pub fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Round to a fixed number of decimals.
///
/// Rounds the exact binary value, so only true ties are decided, and those
/// go to the even digit: `0.5625` becomes `0.562`.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let precision = decimals.max(0) as usize;
    format!("{:.*}", precision, value).parse().unwrap_or(value)
}

/// Share of `count` in `total` as a percentage, with the share rounded to 3 decimals first
fn percent_share(count: usize, total: usize) -> f64 {
    round_to(round_to(count as f64 / total.max(1) as f64, 3) * 100.0, 1)
}

fn distribution<'a>(
    values: impl Iterator<Item = Option<&'a str>>,
    total: usize,
) -> BTreeMap<String, f64> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for value in values.flatten() {
        *counts.entry(value.to_string()).or_default() += 1;
    }
    counts
        .into_iter()
        .map(|(name, count)| (name, percent_share(count, total)))
        .collect()
}

fn flag_rate(rows: &[&CustomerRecord], flag: impl Fn(&CustomerRecord) -> bool) -> f64 {
    let hits = rows.iter().filter(|r| flag(r)).count();
    round_to(hits as f64 / rows.len().max(1) as f64 * 100.0, 1)
}

/// Descriptive statistics of one non-empty segment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentStats {
    pub size: usize,
    pub avg_spend: f64,
    pub avg_rating: f64,
    pub avg_previous_purchases: f64,
    pub subscription_rate_pct: f64,
    pub discount_usage_pct: f64,
    pub promo_usage_pct: f64,
    /// Season → percent of the segment's purchases
    pub season_distribution: BTreeMap<String, f64>,
    /// Category → percent of the segment's purchases
    pub category_distribution: BTreeMap<String, f64>,
}

/// Statistics for every segment; `None` marks an empty segment
pub type SegmentStatsMap = BTreeMap<SegmentLabel, Option<SegmentStats>>;

pub fn segment_stats(dataset: &Dataset) -> SegmentStatsMap {
    let has_seasons = dataset.has_column(columns::SEASON);
    let has_categories = dataset.has_column(columns::CATEGORY);

    group_by_segment(dataset.records())
        .into_iter()
        .map(|(segment, rows)| {
            if rows.is_empty() {
                return (segment, None);
            }
            let size = rows.len();
            let average = |field: fn(&CustomerRecord) -> Option<f64>, decimals: i32| {
                round_to(mean(rows.iter().filter_map(|r| field(r))).unwrap_or(0.0), decimals)
            };

            let stats = SegmentStats {
                size,
                avg_spend: average(|r| r.purchase_amount, 2),
                avg_rating: average(|r| r.review_rating, 2),
                avg_previous_purchases: average(|r| r.previous_purchases, 1),
                subscription_rate_pct: flag_rate(&rows, CustomerRecord::subscribed),
                discount_usage_pct: flag_rate(&rows, CustomerRecord::discount),
                promo_usage_pct: flag_rate(&rows, CustomerRecord::promo),
                season_distribution: if has_seasons {
                    distribution(rows.iter().map(|r| r.season.as_deref()), size)
                } else {
                    BTreeMap::new()
                },
                category_distribution: if has_categories {
                    distribution(rows.iter().map(|r| r.category.as_deref()), size)
                } else {
                    BTreeMap::new()
                },
            };
            (segment, Some(stats))
        })
        .collect()
}
