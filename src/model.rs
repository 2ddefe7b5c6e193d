//! Segment centroids and nearest-centroid assignment for live predictions

use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::{CustomerRecord, Dataset};
use crate::segment::{classify, classify_signals, SegmentLabel, Signals, SEGMENT_COUNT};

/// Dimensions of the normalized feature space:
/// spend, frequency score, previous purchases, rating, discount flag
pub const FEATURE_COUNT: usize = 5;
/// Upper bound on reported confidence
pub const MAX_CONFIDENCE: f64 = 0.99;
/// Confidence reported when no centroids are available
pub const FALLBACK_CONFIDENCE: f64 = 0.5;

const FREQUENCY_SCALE: f64 = 5.0;
const RATING_SCALE: f64 = 5.0;
const DISTANCE_EPSILON: f64 = 1e-9;

/// Dataset-wide maxima used to bring spend and purchase history into [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Normalizers {
    pub max_spend: f64,
    pub max_previous_purchases: f64,
}

impl Default for Normalizers {
    fn default() -> Self {
        Self {
            max_spend: 1.0,
            max_previous_purchases: 1.0,
        }
    }
}

impl Normalizers {
    /// Compute maxima over the dataset, each floored at 1.0
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let records = dataset.records();
        Self {
            max_spend: max_or_one(records.iter().filter_map(|r| r.purchase_amount)),
            max_previous_purchases: max_or_one(records.iter().filter_map(|r| r.previous_purchases)),
        }
    }

    fn vector(
        &self,
        spend: f64,
        frequency_score: f64,
        previous_purchases: f64,
        review_rating: f64,
        discount: bool,
    ) -> Array1<f64> {
        Array1::from(vec![
            spend / self.max_spend,
            frequency_score / FREQUENCY_SCALE,
            previous_purchases / self.max_previous_purchases,
            review_rating / RATING_SCALE,
            if discount { 1.0 } else { 0.0 },
        ])
    }

    /// Feature vector of a dataset row
    pub fn normalize_record(&self, record: &CustomerRecord) -> Array1<f64> {
        self.vector(
            record.purchase_amount.unwrap_or(0.0),
            record.frequency_score(),
            record.previous_purchases_or_default(),
            record.review_rating_or_default(),
            record.discount(),
        )
    }

    /// Feature vector of a live customer profile
    pub fn normalize_profile(&self, profile: &CustomerProfile) -> Array1<f64> {
        self.vector(
            profile.purchase_amount,
            profile.frequency_score,
            profile.previous_purchases,
            profile.review_rating,
            profile.discount_applied,
        )
    }
}

/// A customer described directly by the caller rather than read from the dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CustomerProfile {
    pub age: f64,
    pub purchase_amount: f64,
    pub previous_purchases: f64,
    pub review_rating: f64,
    /// 1 (annually) to 5 (weekly)
    pub frequency_score: f64,
    pub discount_applied: bool,
    pub promo_code_used: bool,
    pub subscription_status: bool,
    pub category: String,
    pub season: String,
    pub gender: String,
}

impl Default for CustomerProfile {
    fn default() -> Self {
        Self {
            age: 30.0,
            purchase_amount: 60.0,
            previous_purchases: 10.0,
            review_rating: 4.0,
            frequency_score: 3.0,
            discount_applied: false,
            promo_code_used: false,
            subscription_status: false,
            category: "Clothing".to_string(),
            season: "Summer".to_string(),
            gender: "Female".to_string(),
        }
    }
}

impl CustomerProfile {
    pub fn signals(&self) -> Signals {
        Signals {
            discount_applied: self.discount_applied,
            subscribed: self.subscription_status,
            previous_purchases: self.previous_purchases,
            review_rating: self.review_rating,
        }
    }
}

/// Mean normalized features of one segment's members
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentCentroid {
    pub segment: SegmentLabel,
    pub size: usize,
    pub features: Array1<f64>,
}

/// Centroids of every non-empty segment plus the normalizers they were built with
#[derive(Debug, Clone, Default)]
pub struct CentroidModel {
    pub centroids: Vec<SegmentCentroid>,
    pub normalizers: Normalizers,
}

/// Serializable view of a centroid
#[derive(Debug, Clone, Serialize)]
pub struct CentroidSummary {
    pub segment: SegmentLabel,
    pub size: usize,
    pub features: Vec<f64>,
}

impl CentroidModel {
    pub fn is_empty(&self) -> bool {
        self.centroids.is_empty()
    }

    pub fn centroid(&self, segment: SegmentLabel) -> Option<&SegmentCentroid> {
        self.centroids.iter().find(|c| c.segment == segment)
    }

    pub fn summaries(&self) -> Vec<CentroidSummary> {
        self.centroids
            .iter()
            .map(|c| CentroidSummary {
                segment: c.segment,
                size: c.size,
                features: c.features.to_vec(),
            })
            .collect()
    }

    /// Assign a profile to the nearest centroid.
    ///
    /// Ties go to the segment that comes first in priority order. Returns
    /// `None` when the model has no centroids or the profile has a
    /// non-finite feature.
    pub fn assign(&self, profile: &CustomerProfile) -> Option<Assignment> {
        if self.centroids.is_empty() {
            return None;
        }

        let features = self.normalizers.normalize_profile(profile);
        if !features.iter().all(|value| value.is_finite()) {
            return None;
        }
        let distances: Vec<SegmentDistance> = self
            .centroids
            .iter()
            .map(|c| SegmentDistance {
                segment: c.segment,
                distance: euclidean_distance(&features.view(), &c.features.view()),
            })
            .collect();

        // Find nearest centroid
        let mut nearest = distances[0];
        for candidate in &distances[1..] {
            if candidate.distance < nearest.distance {
                nearest = *candidate;
            }
        }

        let total = distances.iter().map(|d| d.distance).sum::<f64>();
        let confidence = (1.0 - nearest.distance / total.max(DISTANCE_EPSILON))
            .clamp(0.0, MAX_CONFIDENCE);

        Some(Assignment {
            segment: nearest.segment,
            confidence,
            method: AssignmentMethod::Centroid,
            distances,
        })
    }
}

/// Distance from an input to one segment centroid
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SegmentDistance {
    pub segment: SegmentLabel,
    pub distance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentMethod {
    Centroid,
    RuleFallback,
}

/// Result of assigning a live profile to a segment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignment {
    pub segment: SegmentLabel,
    pub confidence: f64,
    pub method: AssignmentMethod,
    pub distances: Vec<SegmentDistance>,
}

/// Build per-segment centroids from the dataset
///
/// # Arguments
/// * `dataset` - Loaded dataset; every row is labeled with the rule classifier
///
/// # Returns
/// * `CentroidModel` with one centroid per non-empty segment, in priority order
pub fn build_centroids(dataset: &Dataset) -> CentroidModel {
    let normalizers = Normalizers::from_dataset(dataset);

    let mut sums: Vec<Array1<f64>> = vec![Array1::zeros(FEATURE_COUNT); SEGMENT_COUNT];
    let mut counts = [0usize; SEGMENT_COUNT];
    for record in dataset.records() {
        let index = classify(record) as usize;
        sums[index] += &normalizers.normalize_record(record);
        counts[index] += 1;
    }

    let centroids: Vec<SegmentCentroid> = SegmentLabel::ALL
        .into_iter()
        .zip(sums)
        .zip(counts)
        .filter(|(_, size)| *size > 0)
        .map(|((segment, sum), size)| SegmentCentroid {
            segment,
            size,
            features: sum / size as f64,
        })
        .collect();

    debug!(
        centroids = centroids.len(),
        max_spend = normalizers.max_spend,
        max_previous_purchases = normalizers.max_previous_purchases,
        "centroids built"
    );

    CentroidModel {
        centroids,
        normalizers,
    }
}

/// Assign a profile, falling back to the rule classifier without a usable model
pub fn assign_segment(profile: &CustomerProfile, model: Option<&CentroidModel>) -> Assignment {
    if let Some(assignment) = model.and_then(|m| m.assign(profile)) {
        return assignment;
    }

    Assignment {
        segment: classify_signals(&profile.signals()),
        confidence: FALLBACK_CONFIDENCE,
        method: AssignmentMethod::RuleFallback,
        distances: Vec::new(),
    }
}

fn max_or_one(values: impl Iterator<Item = f64>) -> f64 {
    values.fold(1.0, f64::max)
}

/// Calculate Euclidean distance between two points
fn euclidean_distance(point1: &ArrayView1<f64>, point2: &ArrayView1<f64>) -> f64 {
    point1
        .iter()
        .zip(point2.iter())
        .map(|(a, b)| (a - b).powi(2))
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::FlagValue;

    fn customer(
        discount: &str,
        subscription: &str,
        previous: f64,
        rating: f64,
        amount: f64,
        frequency: &str,
    ) -> CustomerRecord {
        CustomerRecord {
            discount_applied: FlagValue::from(discount),
            subscription_status: FlagValue::from(subscription),
            previous_purchases: Some(previous),
            review_rating: Some(rating),
            purchase_amount: Some(amount),
            frequency_of_purchases: Some(frequency.to_string()),
            ..Default::default()
        }
    }

    fn create_test_dataset() -> Dataset {
        Dataset::from_records(vec![
            customer("No", "No", 30.0, 4.8, 95.0, "Weekly"),
            customer("No", "Yes", 40.0, 3.5, 70.0, "Bi-Weekly"),
            customer("No", "Yes", 20.0, 3.9, 60.0, "Monthly"),
            customer("No", "No", 10.0, 3.0, 50.0, "Annually"),
            customer("Yes", "No", 2.0, 2.5, 20.0, "Quarterly"),
            customer("Yes", "No", 4.0, 3.5, 30.0, "Monthly"),
        ])
    }

    #[test]
    fn test_build_centroids() {
        let model = build_centroids(&create_test_dataset());

        assert_eq!(model.centroids.len(), 4);
        assert_eq!(model.normalizers.max_spend, 95.0);
        assert_eq!(model.normalizers.max_previous_purchases, 40.0);

        let loyal = model.centroid(SegmentLabel::LoyalFrequentBuyers).unwrap();
        assert_eq!(loyal.size, 2);
        assert!((loyal.features[0] - 65.0 / 95.0).abs() < 1e-12);
        assert!((loyal.features[2] - 30.0 / 40.0).abs() < 1e-12);

        let discount = model.centroid(SegmentLabel::DiscountDrivenShoppers).unwrap();
        assert_eq!(discount.features[4], 1.0);
    }

    #[test]
    fn test_centroid_dimensions_in_unit_range() {
        let model = build_centroids(&create_test_dataset());
        for centroid in &model.centroids {
            assert_eq!(centroid.features.len(), FEATURE_COUNT);
            for &value in centroid.features.iter() {
                assert!((0.0..=1.0).contains(&value), "{} out of range", value);
            }
        }
    }

    #[test]
    fn test_empty_segments_are_omitted() {
        let dataset =
            Dataset::from_records(vec![customer("Yes", "No", 1.0, 3.0, 10.0, "Weekly")]);
        let model = build_centroids(&dataset);

        assert_eq!(model.centroids.len(), 1);
        assert_eq!(
            model.centroids[0].segment,
            SegmentLabel::DiscountDrivenShoppers
        );
    }

    #[test]
    fn test_assign_on_centroid_is_clamped() {
        let model = build_centroids(&create_test_dataset());
        let profile = CustomerProfile {
            purchase_amount: 95.0,
            frequency_score: 5.0,
            previous_purchases: 30.0,
            review_rating: 4.8,
            discount_applied: false,
            ..Default::default()
        };

        let assignment = model.assign(&profile).unwrap();
        assert_eq!(assignment.segment, SegmentLabel::PremiumUrgentBuyers);
        assert_eq!(assignment.confidence, MAX_CONFIDENCE);
        assert_eq!(assignment.method, AssignmentMethod::Centroid);
        assert_eq!(assignment.distances.len(), 4);
    }

    #[test]
    fn test_tie_goes_to_priority_order() {
        let dataset = Dataset::from_records(vec![
            customer("No", "Yes", 20.0, 3.0, 100.0, "Monthly"),
            customer("No", "No", 20.0, 3.0, 0.0, "Monthly"),
        ]);
        let model = build_centroids(&dataset);
        let profile = CustomerProfile {
            purchase_amount: 50.0,
            frequency_score: 3.0,
            previous_purchases: 20.0,
            review_rating: 3.0,
            ..Default::default()
        };

        let assignment = model.assign(&profile).unwrap();
        assert_eq!(assignment.segment, SegmentLabel::LoyalFrequentBuyers);
        assert!((assignment.confidence - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_non_finite_profile_falls_back() {
        let model = build_centroids(&create_test_dataset());
        for profile in [
            CustomerProfile {
                previous_purchases: f64::NAN,
                ..Default::default()
            },
            CustomerProfile {
                purchase_amount: f64::INFINITY,
                ..Default::default()
            },
        ] {
            assert!(model.assign(&profile).is_none());

            let assignment = assign_segment(&profile, Some(&model));
            assert_eq!(assignment.method, AssignmentMethod::RuleFallback);
            assert_eq!(assignment.confidence, FALLBACK_CONFIDENCE);
        }
    }

    #[test]
    fn test_fallback_without_model() {
        let profile = CustomerProfile {
            discount_applied: true,
            previous_purchases: 3.0,
            ..Default::default()
        };

        let assignment = assign_segment(&profile, None);
        assert_eq!(assignment.segment, SegmentLabel::DiscountDrivenShoppers);
        assert_eq!(assignment.confidence, FALLBACK_CONFIDENCE);
        assert_eq!(assignment.method, AssignmentMethod::RuleFallback);

        let empty = build_centroids(&Dataset::default());
        assert!(empty.is_empty());
        let assignment = assign_segment(&profile, Some(&empty));
        assert_eq!(assignment.method, AssignmentMethod::RuleFallback);
    }

    #[test]
    fn test_confidence_bounds() {
        let model = build_centroids(&create_test_dataset());
        for amount in [0.0, 25.0, 60.0, 200.0] {
            for previous in [0.0, 12.0, 50.0] {
                let profile = CustomerProfile {
                    purchase_amount: amount,
                    previous_purchases: previous,
                    ..Default::default()
                };
                let assignment = model.assign(&profile).unwrap();
                assert!((0.0..=MAX_CONFIDENCE).contains(&assignment.confidence));
            }
        }
    }
}
