//! Heuristic revenue and subscription estimates plus live segment prediction

use serde::Serialize;
use tracing::debug;

use crate::knowledge::{KnowledgeBase, SegmentKnowledge};
use crate::model::{assign_segment, Assignment, CentroidModel, CustomerProfile};
use crate::segment::{classify_signals, SegmentLabel};
use crate::stats::round_to;

/// Spend assumed for a segment the knowledge file says nothing about
pub const DEFAULT_BASE_SPEND: f64 = 60.0;
/// Lowest revenue estimate ever reported
pub const MIN_REVENUE: f64 = 20.0;
/// Half-width of the reported revenue range, as a fraction of the estimate
pub const REVENUE_RANGE: f64 = 0.15;

const SUBSCRIPTION_FLOOR: f64 = 0.05;
const SUBSCRIPTION_CEILING: f64 = 0.95;
const MAX_DRIVERS: usize = 3;

const FEATURE_WEIGHTS: [(&str, f64); 7] = [
    ("Previous Purchases", 0.28),
    ("Frequency Score", 0.22),
    ("Review Rating", 0.18),
    ("Age", 0.12),
    ("Discount Applied", 0.10),
    ("Promo Code Used", 0.06),
    ("Subscription", 0.04),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureImportance {
    pub feature: &'static str,
    pub importance: f64,
    pub rank: usize,
}

/// Fixed relative weights of the revenue inputs, most important first
pub fn feature_importance() -> Vec<FeatureImportance> {
    FEATURE_WEIGHTS
        .iter()
        .enumerate()
        .map(|(i, &(feature, importance))| FeatureImportance {
            feature,
            importance,
            rank: i + 1,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenueEstimate {
    pub predicted_revenue: f64,
    pub segment: SegmentLabel,
    pub segment_avg_spend: f64,
    pub confidence_range: [f64; 2],
    pub feature_importance: Vec<FeatureImportance>,
    pub explanation: String,
}

/// Estimate the next order value of a customer.
///
/// Starts from the average spend of the customer's segment and adjusts it
/// for frequency, rating, discount and promo usage, age and purchase history.
pub fn estimate_revenue(profile: &CustomerProfile, knowledge: &KnowledgeBase) -> RevenueEstimate {
    let segment = classify_signals(&profile.signals());
    let base_spend = knowledge.avg_spend(segment).unwrap_or(DEFAULT_BASE_SPEND);

    let frequency = (profile.frequency_score - 3.0) * 4.0;
    let rating = (profile.review_rating - 3.5) * 3.0;
    let discount = if profile.discount_applied { -8.0 } else { 0.0 };
    let promo = if profile.promo_code_used { -4.0 } else { 0.0 };
    let age = (profile.age - 35.0) * 0.3;
    let history = (profile.previous_purchases * 0.5).min(12.0);

    let prediction = round_to(
        (base_spend + frequency + rating + discount + promo + age + history).max(MIN_REVENUE),
        2,
    );
    debug!(%segment, prediction, "revenue estimated");

    RevenueEstimate {
        predicted_revenue: prediction,
        segment,
        segment_avg_spend: round_to(base_spend, 2),
        confidence_range: [
            round_to(prediction * (1.0 - REVENUE_RANGE), 2),
            round_to(prediction * (1.0 + REVENUE_RANGE), 2),
        ],
        feature_importance: feature_importance(),
        explanation: format!(
            "Based on {}/5 purchase frequency and {} past orders, this customer resembles \
             the '{}' segment with avg spend of ${:.2}.",
            profile.frequency_score, profile.previous_purchases, segment, base_spend
        ),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Likelihood {
    High,
    Medium,
    Low,
}

impl Likelihood {
    pub fn from_probability(probability: f64) -> Self {
        if probability > 0.65 {
            Likelihood::High
        } else if probability > 0.35 {
            Likelihood::Medium
        } else {
            Likelihood::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriptionEstimate {
    pub subscription_probability: f64,
    pub probability_percent: f64,
    pub likelihood_label: Likelihood,
    pub key_drivers: Vec<&'static str>,
    pub explanation: String,
}

/// Estimate how likely a customer is to subscribe
pub fn estimate_subscription(profile: &CustomerProfile) -> SubscriptionEstimate {
    let signals = [
        (
            profile.previous_purchases > 15.0,
            0.20,
            0.05,
            Some("High purchase history"),
        ),
        (
            profile.frequency_score >= 4.0,
            0.15,
            0.03,
            Some("Frequent buyer pattern"),
        ),
        (
            profile.purchase_amount > 70.0,
            0.15,
            0.04,
            Some("High spend per order"),
        ),
        (
            profile.review_rating >= 4.0,
            0.10,
            0.02,
            Some("Positive review history"),
        ),
        (
            profile.discount_applied,
            0.08,
            0.01,
            Some("Discount usage habit"),
        ),
        (profile.promo_code_used, 0.05, 0.01, None),
    ];

    let mut score: f64 = 0.0;
    let mut drivers = Vec::new();
    for (present, weight, baseline, driver) in signals {
        if present {
            score += weight;
            drivers.extend(driver);
        } else {
            score += baseline;
        }
    }
    if drivers.is_empty() {
        drivers.push("Low engagement signals");
    }
    drivers.truncate(MAX_DRIVERS);

    let probability = score.clamp(SUBSCRIPTION_FLOOR, SUBSCRIPTION_CEILING);
    let percent = round_to(probability * 100.0, 1);
    let explanation = format!(
        "This customer has a {}% probability of subscribing. Key signals: {}.",
        percent,
        drivers
            .iter()
            .take(2)
            .copied()
            .collect::<Vec<_>>()
            .join(", ")
    );

    SubscriptionEstimate {
        subscription_probability: round_to(probability, 4),
        probability_percent: percent,
        likelihood_label: Likelihood::from_probability(probability),
        key_drivers: drivers,
        explanation,
    }
}

/// Segment assignment of a live profile with the segment's metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentPrediction {
    pub segment_id: &'static str,
    pub icon: &'static str,
    pub color: &'static str,
    #[serde(flatten)]
    pub assignment: Assignment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub knowledge: Option<SegmentKnowledge>,
}

pub fn predict_segment(
    profile: &CustomerProfile,
    model: Option<&CentroidModel>,
    knowledge: &KnowledgeBase,
) -> SegmentPrediction {
    let assignment = assign_segment(profile, model);
    let segment = assignment.segment;
    SegmentPrediction {
        segment_id: segment.id(),
        icon: segment.icon(),
        color: segment.color(),
        knowledge: knowledge.get(segment).cloned(),
        assignment,
    }
}
