//! Review-rating sentiment per segment, per category and overall

use serde::Serialize;
use tracing::{debug, warn};

use crate::data::{columns, CustomerRecord, Dataset, DEFAULT_REVIEW_RATING};
use crate::segment::{group_by_segment, SegmentLabel};
use crate::stats::{mean, round_to};

pub const POSITIVE_RATING: f64 = 4.0;
pub const NEUTRAL_RATING: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

pub fn rating_to_sentiment(rating: f64) -> Sentiment {
    if rating >= POSITIVE_RATING {
        Sentiment::Positive
    } else if rating >= NEUTRAL_RATING {
        Sentiment::Neutral
    } else {
        Sentiment::Negative
    }
}

/// Map a 1-5 average rating onto 0-1
fn sentiment_score(avg_rating: f64) -> f64 {
    round_to((avg_rating - 1.0) / 4.0, 3)
}

/// Sentiment counts of a group of rows and their percentages
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SentimentBreakdown {
    pub positive_count: usize,
    pub neutral_count: usize,
    pub negative_count: usize,
    pub positive_pct: f64,
    pub neutral_pct: f64,
    pub negative_pct: f64,
}

impl SentimentBreakdown {
    fn from_rows(rows: &[&CustomerRecord]) -> Self {
        let mut breakdown = SentimentBreakdown::default();
        for row in rows {
            match rating_to_sentiment(row.review_rating_or_default()) {
                Sentiment::Positive => breakdown.positive_count += 1,
                Sentiment::Neutral => breakdown.neutral_count += 1,
                Sentiment::Negative => breakdown.negative_count += 1,
            }
        }
        let total = rows.len().max(1) as f64;
        breakdown.positive_pct = round_to(breakdown.positive_count as f64 / total * 100.0, 1);
        breakdown.neutral_pct = round_to(breakdown.neutral_count as f64 / total * 100.0, 1);
        breakdown.negative_pct = round_to(breakdown.negative_count as f64 / total * 100.0, 1);
        breakdown
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentSentiment {
    pub segment: SegmentLabel,
    pub icon: &'static str,
    pub color: &'static str,
    pub size: usize,
    pub avg_rating: f64,
    pub avg_spend: f64,
    #[serde(flatten)]
    pub breakdown: SentimentBreakdown,
    pub sentiment_label: Sentiment,
    pub avg_sentiment_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySentiment {
    pub category: String,
    pub avg_rating: f64,
    pub total: usize,
    pub positive: usize,
    pub negative: usize,
    pub sentiment: Sentiment,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverallSentiment {
    pub avg_rating: f64,
    pub avg_score: f64,
    pub sentiment_label: Sentiment,
    #[serde(flatten)]
    pub breakdown: SentimentBreakdown,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentReport {
    pub per_segment: Vec<SegmentSentiment>,
    pub per_category: Vec<CategorySentiment>,
    pub overall: OverallSentiment,
}

impl SentimentReport {
    pub fn segment(&self, segment: SegmentLabel) -> Option<&SegmentSentiment> {
        self.per_segment.iter().find(|s| s.segment == segment)
    }
}

/// Average rating of rows that have one, the default rating otherwise
fn average_rating(rows: &[&CustomerRecord]) -> f64 {
    round_to(
        mean(rows.iter().filter_map(|r| r.review_rating)).unwrap_or(DEFAULT_REVIEW_RATING),
        3,
    )
}

/// Build the sentiment report.
///
/// Rows without a rating count with the default rating. Returns `None`
/// when the dataset has no `Review Rating` column.
pub fn analyze_sentiment(dataset: &Dataset) -> Option<SentimentReport> {
    if !dataset.has_column(columns::REVIEW_RATING) {
        warn!("dataset has no Review Rating column, sentiment unavailable");
        return None;
    }

    let per_segment: Vec<SegmentSentiment> = group_by_segment(dataset.records())
        .into_iter()
        .filter(|(_, rows)| !rows.is_empty())
        .map(|(segment, rows)| {
            let avg_rating = average_rating(&rows);
            SegmentSentiment {
                segment,
                icon: segment.icon(),
                color: segment.color(),
                size: rows.len(),
                avg_rating,
                avg_spend: round_to(
                    mean(rows.iter().filter_map(|r| r.purchase_amount)).unwrap_or(0.0),
                    2,
                ),
                breakdown: SentimentBreakdown::from_rows(&rows),
                sentiment_label: rating_to_sentiment(avg_rating),
                avg_sentiment_score: sentiment_score(avg_rating),
            }
        })
        .collect();

    let mut per_category: Vec<CategorySentiment> = dataset
        .categories()
        .into_iter()
        .map(|category| {
            let rows: Vec<&CustomerRecord> = dataset
                .records()
                .iter()
                .filter(|r| r.category.as_deref() == Some(category.as_str()))
                .collect();
            let avg_rating = average_rating(&rows);
            let breakdown = SentimentBreakdown::from_rows(&rows);
            CategorySentiment {
                category,
                avg_rating,
                total: rows.len(),
                positive: breakdown.positive_count,
                negative: breakdown.negative_count,
                sentiment: rating_to_sentiment(avg_rating),
                score: sentiment_score(avg_rating),
            }
        })
        .collect();
    per_category.sort_by(|a, b| b.avg_rating.total_cmp(&a.avg_rating));

    let all: Vec<&CustomerRecord> = dataset.records().iter().collect();
    let overall_rating = average_rating(&all);
    let overall = OverallSentiment {
        avg_rating: overall_rating,
        avg_score: sentiment_score(overall_rating),
        sentiment_label: rating_to_sentiment(overall_rating),
        breakdown: SentimentBreakdown::from_rows(&all),
        total: all.len(),
    };

    debug!(
        segments = per_segment.len(),
        categories = per_category.len(),
        "sentiment computed"
    );
    Some(SentimentReport {
        per_segment,
        per_category,
        overall,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::FlagValue;

    fn review(
        discount: &str,
        previous: f64,
        rating: Option<f64>,
        category: &str,
    ) -> CustomerRecord {
        CustomerRecord {
            discount_applied: FlagValue::from(discount),
            subscription_status: FlagValue::from("No"),
            previous_purchases: Some(previous),
            review_rating: rating,
            purchase_amount: Some(40.0),
            category: Some(category.to_string()),
            ..Default::default()
        }
    }

    fn create_test_dataset() -> Dataset {
        Dataset::from_records(vec![
            review("Yes", 2.0, Some(4.5), "Clothing"),
            review("Yes", 3.0, Some(2.0), "Footwear"),
            review("No", 10.0, Some(3.5), "Clothing"),
            review("No", 12.0, Some(4.0), "Accessories"),
        ])
    }

    #[test]
    fn test_rating_to_sentiment() {
        assert_eq!(rating_to_sentiment(4.0), Sentiment::Positive);
        assert_eq!(rating_to_sentiment(3.99), Sentiment::Neutral);
        assert_eq!(rating_to_sentiment(3.0), Sentiment::Neutral);
        assert_eq!(rating_to_sentiment(2.9), Sentiment::Negative);
    }

    #[test]
    fn test_segment_sentiment() {
        let report = analyze_sentiment(&create_test_dataset()).unwrap();

        assert_eq!(report.per_segment.len(), 2);
        let discount = report
            .segment(SegmentLabel::DiscountDrivenShoppers)
            .unwrap();
        assert_eq!(discount.size, 2);
        assert_eq!(discount.avg_rating, 3.25);
        assert_eq!(discount.avg_spend, 40.0);
        assert_eq!(discount.breakdown.positive_count, 1);
        assert_eq!(discount.breakdown.negative_count, 1);
        assert_eq!(discount.breakdown.positive_pct, 50.0);
        assert_eq!(discount.sentiment_label, Sentiment::Neutral);
        assert_eq!(discount.avg_sentiment_score, 0.562);
        assert!(report.segment(SegmentLabel::PremiumUrgentBuyers).is_none());
    }

    #[test]
    fn test_categories_sorted_by_rating() {
        let report = analyze_sentiment(&create_test_dataset()).unwrap();
        let order: Vec<&str> = report
            .per_category
            .iter()
            .map(|c| c.category.as_str())
            .collect();

        assert_eq!(order, vec!["Clothing", "Accessories", "Footwear"]);
        assert_eq!(report.per_category[0].avg_rating, 4.0);
        assert_eq!(report.per_category[0].total, 2);
        assert_eq!(report.per_category[2].sentiment, Sentiment::Negative);
    }

    #[test]
    fn test_overall_sentiment() {
        let report = analyze_sentiment(&create_test_dataset()).unwrap();

        assert_eq!(report.overall.total, 4);
        assert_eq!(report.overall.avg_rating, 3.5);
        assert_eq!(report.overall.avg_score, 0.625);
        assert_eq!(report.overall.breakdown.positive_count, 2);
        assert_eq!(report.overall.breakdown.neutral_count, 1);
        assert_eq!(report.overall.breakdown.negative_pct, 25.0);
    }

    #[test]
    fn test_missing_rating_counts_as_neutral() {
        let dataset = Dataset::from_records(vec![review("No", 10.0, None, "Clothing")]);
        let report = analyze_sentiment(&dataset).unwrap();

        assert_eq!(report.overall.breakdown.neutral_count, 1);
        assert_eq!(report.overall.avg_rating, DEFAULT_REVIEW_RATING);
    }

    #[test]
    fn test_missing_rating_column() {
        let frame = polars::df!("Category" => &["Clothing"]).unwrap();
        let dataset = Dataset::from_frame(frame).unwrap();
        assert!(analyze_sentiment(&dataset).is_none());
    }
}
