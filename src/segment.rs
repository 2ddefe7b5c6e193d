//! Rule-based behavioral segmentation shared by every analytic

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::CustomerRecord;

/// Number of segments; also the fixed support denominator for rule mining
pub const SEGMENT_COUNT: usize = 4;

/// One of the four mutually exclusive customer segments.
///
/// Declaration order is the fixed priority order used for tie-breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SegmentLabel {
    #[serde(rename = "Premium Urgent Buyers")]
    PremiumUrgentBuyers,
    #[serde(rename = "Loyal Frequent Buyers")]
    LoyalFrequentBuyers,
    #[serde(rename = "Occasional Buyers")]
    OccasionalBuyers,
    #[serde(rename = "Discount-Driven Shoppers")]
    DiscountDrivenShoppers,
}

impl SegmentLabel {
    pub const ALL: [SegmentLabel; SEGMENT_COUNT] = [
        SegmentLabel::PremiumUrgentBuyers,
        SegmentLabel::LoyalFrequentBuyers,
        SegmentLabel::OccasionalBuyers,
        SegmentLabel::DiscountDrivenShoppers,
    ];

    /// Human-readable name
    pub fn label(self) -> &'static str {
        match self {
            SegmentLabel::PremiumUrgentBuyers => "Premium Urgent Buyers",
            SegmentLabel::LoyalFrequentBuyers => "Loyal Frequent Buyers",
            SegmentLabel::OccasionalBuyers => "Occasional Buyers",
            SegmentLabel::DiscountDrivenShoppers => "Discount-Driven Shoppers",
        }
    }

    /// Short identifier used on the command line
    pub fn id(self) -> &'static str {
        match self {
            SegmentLabel::PremiumUrgentBuyers => "premium",
            SegmentLabel::LoyalFrequentBuyers => "loyal",
            SegmentLabel::OccasionalBuyers => "occasional",
            SegmentLabel::DiscountDrivenShoppers => "discount",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            SegmentLabel::PremiumUrgentBuyers => "💎",
            SegmentLabel::LoyalFrequentBuyers => "⭐",
            SegmentLabel::OccasionalBuyers => "🛍️",
            SegmentLabel::DiscountDrivenShoppers => "🏷️",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            SegmentLabel::PremiumUrgentBuyers => "#6366f1",
            SegmentLabel::LoyalFrequentBuyers => "#10b981",
            SegmentLabel::OccasionalBuyers => "#f59e0b",
            SegmentLabel::DiscountDrivenShoppers => "#ef4444",
        }
    }

    /// Fixed 2-D position of the segment in the projection plot
    pub fn projection(self) -> (f64, f64) {
        match self {
            SegmentLabel::PremiumUrgentBuyers => (1.8, 0.9),
            SegmentLabel::LoyalFrequentBuyers => (-0.5, 1.4),
            SegmentLabel::OccasionalBuyers => (-1.2, -0.8),
            SegmentLabel::DiscountDrivenShoppers => (0.3, -1.6),
        }
    }

    /// Resolve a short id (case-insensitive) or a display name
    pub fn from_id(value: &str) -> Option<SegmentLabel> {
        let lowered = value.trim().to_lowercase();
        SegmentLabel::ALL
            .into_iter()
            .find(|segment| segment.id() == lowered || segment.label().to_lowercase() == lowered)
    }
}

impl fmt::Display for SegmentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The inputs the rule chain looks at
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Signals {
    pub discount_applied: bool,
    pub subscribed: bool,
    pub previous_purchases: f64,
    pub review_rating: f64,
}

impl From<&CustomerRecord> for Signals {
    fn from(record: &CustomerRecord) -> Self {
        Signals {
            discount_applied: record.discount(),
            subscribed: record.subscribed(),
            previous_purchases: record.previous_purchases_or_default(),
            review_rating: record.review_rating_or_default(),
        }
    }
}

/// Assign a segment to already coerced signals; first matching rule wins.
pub fn classify_signals(signals: &Signals) -> SegmentLabel {
    if signals.discount_applied && signals.previous_purchases < 8.0 {
        SegmentLabel::DiscountDrivenShoppers
    } else if signals.subscribed && signals.previous_purchases > 15.0 {
        SegmentLabel::LoyalFrequentBuyers
    } else if signals.review_rating >= 4.2 && signals.previous_purchases > 20.0 {
        SegmentLabel::PremiumUrgentBuyers
    } else {
        SegmentLabel::OccasionalBuyers
    }
}

/// Assign a dataset row to its segment
pub fn classify(record: &CustomerRecord) -> SegmentLabel {
    classify_signals(&Signals::from(record))
}

/// Label every row of a record slice, preserving order
pub fn label_all(records: &[CustomerRecord]) -> Vec<SegmentLabel> {
    records.iter().map(classify).collect()
}

/// Group rows by segment; every segment is present, possibly empty
pub fn group_by_segment(
    records: &[CustomerRecord],
) -> BTreeMap<SegmentLabel, Vec<&CustomerRecord>> {
    let mut groups: BTreeMap<SegmentLabel, Vec<&CustomerRecord>> =
        SegmentLabel::ALL.into_iter().map(|s| (s, Vec::new())).collect();
    for record in records {
        groups.entry(classify(record)).or_default().push(record);
    }
    groups
}
