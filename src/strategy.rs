//! Static retention and pricing playbook per segment

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::knowledge::KnowledgeBase;
use crate::segment::SegmentLabel;

const EMBEDDED_PLAYBOOK: &str = include_str!("../assets/strategies.toml");

/// Number of actions shown side by side in a comparison
pub const COMPARED_ACTIONS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Level {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KpiTargets {
    pub clv_increase_pct: u32,
    pub retention_rate: u32,
    pub nps_target: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentStrategy {
    #[serde(skip_serializing)]
    pub segment: SegmentLabel,
    pub retention_priority: Level,
    pub churn_risk: Level,
    pub margin_risk: Level,
    pub pricing_intensity: String,
    pub recommended_discount_pct: u32,
    pub campaign_type: String,
    pub communication_frequency: String,
    pub channels: Vec<String>,
    pub actions: Vec<String>,
    pub upsell_ideas: Vec<String>,
    pub expected_roi: String,
    pub kpi_targets: KpiTargets,
    pub strategic_summary: String,
}

/// One strategy per segment, in segment priority order
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Playbook {
    segments: Vec<SegmentStrategy>,
}

impl Playbook {
    /// Parse a playbook and check that it covers every segment exactly once
    pub fn from_toml(text: &str) -> Result<Self> {
        let mut playbook: Playbook = toml::from_str(text)?;
        playbook.segments.sort_by_key(|s| s.segment);

        let covered: Vec<SegmentLabel> = playbook.segments.iter().map(|s| s.segment).collect();
        if covered != SegmentLabel::ALL {
            return Err(Error::Validation(format!(
                "playbook must define each segment exactly once, found {:?}",
                covered
            )));
        }
        Ok(playbook)
    }

    /// The playbook compiled into the binary
    pub fn embedded() -> Result<Self> {
        Self::from_toml(EMBEDDED_PLAYBOOK)
    }

    pub fn strategies(&self) -> &[SegmentStrategy] {
        &self.segments
    }

    pub fn strategy(&self, segment: SegmentLabel) -> Option<&SegmentStrategy> {
        self.segments.iter().find(|s| s.segment == segment)
    }

    /// A segment's strategy with presentation metadata and knowledge attached
    pub fn view(&self, segment: SegmentLabel, knowledge: &KnowledgeBase) -> Option<StrategyView> {
        let strategy = self.strategy(segment)?;
        let facts = knowledge.get(segment);
        Some(StrategyView {
            segment_id: segment.id(),
            segment_label: segment,
            icon: segment.icon(),
            color: segment.color(),
            avg_spend: knowledge.avg_spend(segment).unwrap_or(0.0),
            top_category: facts.and_then(|k| k.top_category.clone()),
            top_season: facts.and_then(|k| k.top_season.clone()),
            strategy: strategy.clone(),
        })
    }

    pub fn views(&self, knowledge: &KnowledgeBase) -> Vec<StrategyView> {
        SegmentLabel::ALL
            .into_iter()
            .filter_map(|segment| self.view(segment, knowledge))
            .collect()
    }

    /// Put the key metrics and leading actions of two segments side by side
    pub fn compare(
        &self,
        first: SegmentLabel,
        second: SegmentLabel,
        knowledge: &KnowledgeBase,
    ) -> Option<StrategyComparison> {
        Some(StrategyComparison {
            segment_1: self.comparison_side(first, knowledge)?,
            segment_2: self.comparison_side(second, knowledge)?,
        })
    }

    fn comparison_side(
        &self,
        segment: SegmentLabel,
        knowledge: &KnowledgeBase,
    ) -> Option<ComparisonSide> {
        let strategy = self.strategy(segment)?;
        Some(ComparisonSide {
            id: segment.id(),
            label: segment,
            icon: segment.icon(),
            color: segment.color(),
            avg_spend: knowledge.avg_spend(segment).unwrap_or(0.0),
            retention_priority: strategy.retention_priority,
            churn_risk: strategy.churn_risk,
            margin_risk: strategy.margin_risk,
            pricing_intensity: strategy.pricing_intensity.clone(),
            recommended_discount_pct: strategy.recommended_discount_pct,
            expected_roi: strategy.expected_roi.clone(),
            communication_frequency: strategy.communication_frequency.clone(),
            kpi_targets: strategy.kpi_targets,
            top_actions: strategy
                .actions
                .iter()
                .take(COMPARED_ACTIONS)
                .cloned()
                .collect(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyView {
    pub segment_id: &'static str,
    pub segment_label: SegmentLabel,
    pub icon: &'static str,
    pub color: &'static str,
    pub avg_spend: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_season: Option<String>,
    #[serde(flatten)]
    pub strategy: SegmentStrategy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonSide {
    pub id: &'static str,
    pub label: SegmentLabel,
    pub icon: &'static str,
    pub color: &'static str,
    pub avg_spend: f64,
    pub retention_priority: Level,
    pub churn_risk: Level,
    pub margin_risk: Level,
    pub pricing_intensity: String,
    pub recommended_discount_pct: u32,
    pub expected_roi: String,
    pub communication_frequency: String,
    pub kpi_targets: KpiTargets,
    pub top_actions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyComparison {
    pub segment_1: ComparisonSide,
    pub segment_2: ComparisonSide,
}
