//! Segment × category affinity and season share profiles

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::data::{columns, CustomerRecord, Dataset};
use crate::segment::{group_by_segment, SegmentLabel};
use crate::stats::{mean, round_to};

/// Spend assumed when a category or the spend column has no values
pub const DEFAULT_SPEND: f64 = 50.0;

const NORMALIZATION_EPSILON: f64 = 1e-9;

/// Category and season affinity of one segment
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AffinityProfile {
    /// Category → score relative to the segment's strongest category (which scores 1.0)
    pub category_affinity: BTreeMap<String, f64>,
    /// Season → fraction of the segment's purchases
    pub season_affinity: BTreeMap<String, f64>,
    /// Number of rows in the segment
    pub size: usize,
}

impl AffinityProfile {
    /// Category with the highest score, first alphabetically on ties
    pub fn top_category(&self) -> Option<&str> {
        self.category_affinity
            .iter()
            .fold(None, |best: Option<(&String, f64)>, (name, &score)| match best {
                Some((_, top)) if top >= score => best,
                _ => Some((name, score)),
            })
            .map(|(name, _)| name.as_str())
    }
}

pub type AffinityProfiles = BTreeMap<SegmentLabel, AffinityProfile>;

/// Compute per-segment affinity profiles.
///
/// A category's raw score is its purchase share in the segment times the
/// ratio of the segment's mean spend on it to the dataset-wide mean spend
/// on it. Raw scores are then divided by the segment maximum, so the
/// strongest category is exactly 1.0. Seasons are plain purchase shares.
///
/// Returns an empty map when the dataset has no `Category` column.
pub fn compute_affinities(dataset: &Dataset) -> AffinityProfiles {
    if !dataset.has_column(columns::CATEGORY) {
        warn!("dataset has no Category column, affinities unavailable");
        return AffinityProfiles::new();
    }

    let has_spend = dataset.has_column(columns::PURCHASE_AMOUNT);
    let has_seasons = dataset.has_column(columns::SEASON);
    let categories = dataset.categories();
    let seasons = if has_seasons {
        dataset.seasons()
    } else {
        Vec::new()
    };

    let baseline: BTreeMap<&str, f64> = categories
        .iter()
        .map(|category| {
            let rows: Vec<&CustomerRecord> = dataset
                .records()
                .iter()
                .filter(|r| r.category.as_deref() == Some(category.as_str()))
                .collect();
            (category.as_str(), category_spend(&rows, has_spend))
        })
        .collect();

    let profiles: AffinityProfiles = group_by_segment(dataset.records())
        .into_iter()
        .map(|(segment, rows)| {
            let total = rows.len().max(1) as f64;

            let raw: Vec<(&str, f64)> = categories
                .iter()
                .map(|category| {
                    let in_category: Vec<&CustomerRecord> = rows
                        .iter()
                        .copied()
                        .filter(|r| r.category.as_deref() == Some(category.as_str()))
                        .collect();
                    let share = in_category.len() as f64 / total;
                    let spend_ratio = category_spend(&in_category, has_spend)
                        / baseline[category.as_str()].max(1.0);
                    (category.as_str(), share * spend_ratio)
                })
                .collect();

            let max_raw = raw
                .iter()
                .map(|(_, score)| *score)
                .fold(0.0, f64::max)
                .max(NORMALIZATION_EPSILON);
            let category_affinity = raw
                .into_iter()
                .map(|(category, score)| (category.to_string(), round_to(score / max_raw, 3)))
                .collect();

            let season_affinity = seasons
                .iter()
                .map(|season| {
                    let count = rows
                        .iter()
                        .filter(|r| r.season.as_deref() == Some(season.as_str()))
                        .count();
                    (season.clone(), round_to(count as f64 / total, 3))
                })
                .collect();

            let profile = AffinityProfile {
                category_affinity,
                season_affinity,
                size: rows.len(),
            };
            (segment, profile)
        })
        .collect();

    debug!(
        categories = categories.len(),
        seasons = seasons.len(),
        "segment affinities computed"
    );
    profiles
}

/// Mean spend of the rows, or the default when unavailable
fn category_spend(rows: &[&CustomerRecord], has_spend: bool) -> f64 {
    if rows.is_empty() || !has_spend {
        return DEFAULT_SPEND;
    }
    mean(rows.iter().filter_map(|r| r.purchase_amount)).unwrap_or(DEFAULT_SPEND)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::FlagValue;
    use polars::prelude::*;

    fn purchase(
        discount: &str,
        subscription: &str,
        previous: f64,
        category: &str,
        season: &str,
        amount: f64,
    ) -> CustomerRecord {
        CustomerRecord {
            discount_applied: FlagValue::from(discount),
            subscription_status: FlagValue::from(subscription),
            previous_purchases: Some(previous),
            review_rating: Some(3.5),
            category: Some(category.to_string()),
            season: Some(season.to_string()),
            purchase_amount: Some(amount),
            ..Default::default()
        }
    }

    fn create_test_dataset() -> Dataset {
        Dataset::from_records(vec![
            purchase("Yes", "No", 2.0, "Clothing", "Spring", 30.0),
            purchase("Yes", "No", 3.0, "Clothing", "Spring", 40.0),
            purchase("Yes", "No", 5.0, "Accessories", "Winter", 20.0),
            purchase("No", "Yes", 30.0, "Clothing", "Fall", 80.0),
            purchase("No", "Yes", 25.0, "Footwear", "Fall", 90.0),
            purchase("No", "No", 10.0, "Accessories", "Summer", 60.0),
            purchase("No", "No", 12.0, "Outerwear", "Winter", 70.0),
        ])
    }

    #[test]
    fn test_top_category_scores_one() {
        let profiles = compute_affinities(&create_test_dataset());

        assert_eq!(profiles.len(), 4);
        for profile in profiles.values().filter(|p| p.size > 0) {
            let max = profile
                .category_affinity
                .values()
                .cloned()
                .fold(f64::MIN, f64::max);
            assert_eq!(max, 1.0);
            for &score in profile.category_affinity.values() {
                assert!((0.0..=1.0).contains(&score));
            }
        }
    }

    #[test]
    fn test_season_shares_sum_to_one() {
        let profiles = compute_affinities(&create_test_dataset());
        for profile in profiles.values().filter(|p| p.size > 0) {
            let total: f64 = profile.season_affinity.values().sum();
            assert!((total - 1.0).abs() < 0.01, "season shares sum to {}", total);
        }
    }

    #[test]
    fn test_discount_segment_scores() {
        let profiles = compute_affinities(&create_test_dataset());
        let discount = &profiles[&SegmentLabel::DiscountDrivenShoppers];

        assert_eq!(discount.size, 3);
        // Clothing: 2/3 × (35 / 50); Accessories: 1/3 × (20 / 40)
        let clothing = 2.0 / 3.0 * (35.0 / 50.0);
        let accessories = 1.0 / 3.0 * (20.0 / 40.0);
        assert_eq!(discount.category_affinity["Clothing"], 1.0);
        assert_eq!(
            discount.category_affinity["Accessories"],
            round_to(accessories / clothing, 3)
        );
        assert_eq!(discount.category_affinity["Footwear"], 0.0);
        assert_eq!(discount.season_affinity["Spring"], 0.667);
        assert_eq!(discount.top_category(), Some("Clothing"));
    }

    #[test]
    fn test_empty_segment_is_all_zero() {
        let profiles = compute_affinities(&create_test_dataset());
        let premium = &profiles[&SegmentLabel::PremiumUrgentBuyers];

        assert_eq!(premium.size, 0);
        assert!(premium.category_affinity.values().all(|&s| s == 0.0));
        assert!(premium.season_affinity.values().all(|&s| s == 0.0));
    }

    #[test]
    fn test_missing_category_column_degrades_to_empty() {
        let frame = df!(
            "Season" => &["Winter", "Summer"],
            "Purchase Amount (USD)" => &[10.0, 20.0]
        )
        .unwrap();
        let dataset = Dataset::from_frame(frame).unwrap();

        assert!(compute_affinities(&dataset).is_empty());
    }

    #[test]
    fn test_missing_spend_column_uses_share_only() {
        let frame = df!(
            "Category" => &["Clothing", "Clothing", "Footwear"],
            "Season" => &["Winter", "Summer", "Summer"]
        )
        .unwrap();
        let dataset = Dataset::from_frame(frame).unwrap();
        let profiles = compute_affinities(&dataset);
        let occasional = &profiles[&SegmentLabel::OccasionalBuyers];

        assert_eq!(occasional.category_affinity["Clothing"], 1.0);
        assert_eq!(occasional.category_affinity["Footwear"], 0.5);
    }
}
