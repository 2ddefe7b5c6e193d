//! Memoized analytics over one dataset snapshot
//!
//! `Analytics` owns the dataset, configuration, knowledge and playbook and
//! computes every derived view at most once. Without a dataset every view
//! degrades to an empty result instead of failing.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::affinity::{compute_affinities, AffinityProfile, AffinityProfiles};
use crate::config::AnalyticsConfig;
use crate::data::Dataset;
use crate::error::{Error, Result};
use crate::knowledge::{KnowledgeBase, SegmentKnowledge};
use crate::model::{build_centroids, CentroidModel, CustomerProfile};
use crate::predict::{
    estimate_revenue, estimate_subscription, predict_segment, RevenueEstimate, SegmentPrediction,
    SubscriptionEstimate,
};
use crate::rules::{filter_rules, mine_rules, AssociationRule, RuleQuery};
use crate::segment::SegmentLabel;
use crate::sentiment::{analyze_sentiment, SegmentSentiment, SentimentReport};
use crate::stats::{segment_stats, SegmentStats, SegmentStatsMap};
use crate::strategy::{Playbook, StrategyComparison, StrategyView};

/// Timestamped wrapper around any report
#[derive(Debug, Clone, Serialize)]
pub struct Report<T> {
    pub generated_at: DateTime<Utc>,
    pub dataset_rows: usize,
    pub data: T,
}

/// One row of the segment × category matrix
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AffinityRow {
    pub segment: SegmentLabel,
    #[serde(flatten)]
    pub scores: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AffinityOverview {
    pub segments: Vec<SegmentLabel>,
    pub categories: Vec<String>,
    pub affinity_matrix: Vec<AffinityRow>,
    pub association_rules: Vec<AssociationRule>,
    pub total_rules: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentAffinity {
    /// Display name when the id resolved, the id as given otherwise
    pub segment: String,
    #[serde(flatten)]
    pub profile: AffinityProfile,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentSummary {
    pub id: &'static str,
    pub label: SegmentLabel,
    pub icon: &'static str,
    pub color: &'static str,
    pub size: usize,
    pub avg_spend: f64,
    pub avg_rating: f64,
    pub subscription_rate_pct: f64,
    pub discount_usage_pct: f64,
    pub top_category: Option<String>,
    pub top_season: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProjectionPoint {
    pub label: SegmentLabel,
    pub x: f64,
    pub y: f64,
    pub color: &'static str,
}

impl From<SegmentLabel> for ProjectionPoint {
    fn from(label: SegmentLabel) -> Self {
        let (x, y) = label.projection();
        Self {
            label,
            x,
            y,
            color: label.color(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentDetail {
    pub id: &'static str,
    pub label: SegmentLabel,
    pub icon: &'static str,
    pub color: &'static str,
    /// `None` when the segment has no rows
    pub stats: Option<SegmentStats>,
    pub top_category: Option<String>,
    pub top_season: Option<String>,
    pub top_payment: Option<String>,
    pub top_shipping: Option<String>,
    pub avg_frequency: Option<f64>,
    pub projection: ProjectionPoint,
    pub knowledge: Option<SegmentKnowledge>,
}

pub struct Analytics {
    dataset: Option<Dataset>,
    config: AnalyticsConfig,
    knowledge: KnowledgeBase,
    playbook: Playbook,
    affinities: OnceLock<AffinityProfiles>,
    rules: OnceLock<Vec<AssociationRule>>,
    centroids: OnceLock<Option<CentroidModel>>,
    stats: OnceLock<SegmentStatsMap>,
    sentiment: OnceLock<Option<SentimentReport>>,
}

impl Analytics {
    /// Create the analytics root; `dataset` is `None` when loading failed
    pub fn new(
        dataset: Option<Dataset>,
        config: AnalyticsConfig,
        knowledge: KnowledgeBase,
    ) -> Result<Self> {
        config.validate()?;
        let playbook = Playbook::embedded()?;
        info!(
            dataset_rows = dataset.as_ref().map_or(0, Dataset::len),
            knowledge_segments = knowledge.len(),
            "analytics ready"
        );
        Ok(Self {
            dataset,
            config,
            knowledge,
            playbook,
            affinities: OnceLock::new(),
            rules: OnceLock::new(),
            centroids: OnceLock::new(),
            stats: OnceLock::new(),
            sentiment: OnceLock::new(),
        })
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    /// Wrap a report body with a timestamp and the dataset size
    pub fn report<T>(&self, data: T) -> Report<T> {
        Report {
            generated_at: Utc::now(),
            dataset_rows: self.dataset().map_or(0, Dataset::len),
            data,
        }
    }

    pub fn affinities(&self) -> &AffinityProfiles {
        self.affinities.get_or_init(|| {
            debug!("computing affinities");
            self.dataset()
                .map(compute_affinities)
                .unwrap_or_default()
        })
    }

    pub fn rules(&self) -> &[AssociationRule] {
        self.rules.get_or_init(|| {
            debug!("mining association rules");
            let params = self.config.rule_params();
            self.dataset()
                .map(|dataset| mine_rules(dataset, &params))
                .unwrap_or_default()
        })
    }

    pub fn centroids(&self) -> Option<&CentroidModel> {
        self.centroids
            .get_or_init(|| self.dataset().map(build_centroids))
            .as_ref()
    }

    pub fn segment_stats(&self) -> &SegmentStatsMap {
        self.stats
            .get_or_init(|| self.dataset().map(segment_stats).unwrap_or_default())
    }

    pub fn sentiment(&self) -> Option<&SentimentReport> {
        self.sentiment
            .get_or_init(|| self.dataset().and_then(analyze_sentiment))
            .as_ref()
    }

    /// Segment × category matrix over the sorted union of categories, with
    /// the leading rules and the total rule count
    pub fn overview(&self) -> AffinityOverview {
        let affinities = self.affinities();
        let categories: Vec<String> = affinities
            .values()
            .flat_map(|profile| profile.category_affinity.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let affinity_matrix = affinities
            .iter()
            .map(|(segment, profile)| AffinityRow {
                segment: *segment,
                scores: categories
                    .iter()
                    .map(|category| {
                        let score = profile
                            .category_affinity
                            .get(category)
                            .copied()
                            .unwrap_or(0.0);
                        (category.clone(), score)
                    })
                    .collect(),
            })
            .collect();

        let rules = self.rules();
        AffinityOverview {
            segments: affinities.keys().copied().collect(),
            categories,
            affinity_matrix,
            association_rules: rules
                .iter()
                .take(self.config.overview_rules)
                .cloned()
                .collect(),
            total_rules: rules.len(),
        }
    }

    pub fn query_rules(&self, min_lift: f64, limit: usize) -> RuleQuery {
        filter_rules(self.rules(), min_lift, limit)
    }

    /// Affinity profile of one segment; unknown ids get an empty profile
    pub fn segment_affinity(&self, id: &str) -> SegmentAffinity {
        let resolved = SegmentLabel::from_id(id)
            .and_then(|segment| Some((segment, self.affinities().get(&segment)?)));
        match resolved {
            Some((segment, profile)) => SegmentAffinity {
                segment: segment.label().to_string(),
                profile: profile.clone(),
            },
            None => SegmentAffinity {
                segment: id.to_string(),
                profile: AffinityProfile::default(),
            },
        }
    }

    /// Every segment with its key statistics, falling back to knowledge
    pub fn segments(&self) -> Vec<SegmentSummary> {
        SegmentLabel::ALL
            .into_iter()
            .map(|segment| {
                let stats = self.stats_for(segment);
                let facts = self.knowledge.get(segment);
                let known = |field: fn(&SegmentKnowledge) -> Option<f64>| {
                    facts.and_then(field).unwrap_or(0.0)
                };
                SegmentSummary {
                    id: segment.id(),
                    label: segment,
                    icon: segment.icon(),
                    color: segment.color(),
                    size: stats.map_or(0, |s| s.size),
                    avg_spend: stats.map_or_else(|| known(|k| k.avg_spend), |s| s.avg_spend),
                    avg_rating: stats.map_or_else(|| known(|k| k.avg_rating), |s| s.avg_rating),
                    subscription_rate_pct: stats.map_or(0.0, |s| s.subscription_rate_pct),
                    discount_usage_pct: stats.map_or_else(
                        || known(|k| k.discount_usage_percent),
                        |s| s.discount_usage_pct,
                    ),
                    top_category: facts.and_then(|k| k.top_category.clone()),
                    top_season: facts.and_then(|k| k.top_season.clone()),
                }
            })
            .collect()
    }

    pub fn segment_detail(&self, id: &str) -> Result<SegmentDetail> {
        let segment = resolve_segment(id)?;
        let facts = self.knowledge.get(segment);
        Ok(SegmentDetail {
            id: segment.id(),
            label: segment,
            icon: segment.icon(),
            color: segment.color(),
            stats: self.stats_for(segment).cloned(),
            top_category: facts.and_then(|k| k.top_category.clone()),
            top_season: facts.and_then(|k| k.top_season.clone()),
            top_payment: facts.and_then(|k| k.top_payment_method.clone()),
            top_shipping: facts.and_then(|k| k.top_shipping_type.clone()),
            avg_frequency: facts.and_then(|k| k.avg_frequency),
            projection: ProjectionPoint::from(segment),
            knowledge: facts.cloned(),
        })
    }

    pub fn projections(&self) -> Vec<ProjectionPoint> {
        SegmentLabel::ALL
            .into_iter()
            .map(ProjectionPoint::from)
            .collect()
    }

    pub fn segment_sentiment(&self, id: &str) -> Result<Option<&SegmentSentiment>> {
        let segment = resolve_segment(id)?;
        Ok(self.sentiment().and_then(|report| report.segment(segment)))
    }

    pub fn strategies(&self) -> Vec<StrategyView> {
        self.playbook.views(&self.knowledge)
    }

    pub fn strategy(&self, id: &str) -> Result<StrategyView> {
        let segment = resolve_segment(id)?;
        self.playbook
            .view(segment, &self.knowledge)
            .ok_or_else(|| Error::UnknownSegment(id.to_string()))
    }

    pub fn compare_strategies(&self, first: &str, second: &str) -> Result<StrategyComparison> {
        let left = resolve_segment(first)?;
        let right = resolve_segment(second)?;
        self.playbook
            .compare(left, right, &self.knowledge)
            .ok_or_else(|| Error::UnknownSegment(format!("{first}/{second}")))
    }

    pub fn predict_segment(&self, profile: &CustomerProfile) -> SegmentPrediction {
        predict_segment(profile, self.centroids(), &self.knowledge)
    }

    pub fn estimate_revenue(&self, profile: &CustomerProfile) -> RevenueEstimate {
        estimate_revenue(profile, &self.knowledge)
    }

    pub fn estimate_subscription(&self, profile: &CustomerProfile) -> SubscriptionEstimate {
        estimate_subscription(profile)
    }

    fn stats_for(&self, segment: SegmentLabel) -> Option<&SegmentStats> {
        self.segment_stats().get(&segment).and_then(Option::as_ref)
    }
}

fn resolve_segment(id: &str) -> Result<SegmentLabel> {
    SegmentLabel::from_id(id).ok_or_else(|| Error::UnknownSegment(id.to_string()))
}
