//! Pairwise category association rules mined from segment co-occurrence
//!
//! Each row carries a single category, so there are no baskets to mine.
//! Two categories are treated as co-occurring when they are bought within
//! the same segment: support is the fraction of the four segments carrying
//! both, and confidence is an engineered proxy scaled by that support.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::Serialize;
use tracing::{debug, warn};

use crate::data::{columns, Dataset};
use crate::segment::{label_all, SegmentLabel, SEGMENT_COUNT};
use crate::stats::round_to;

/// Default minimum fraction of segments a rule must span
pub const DEFAULT_MIN_SUPPORT: f64 = 0.20;
/// Default cap on the number of mined rules
pub const DEFAULT_MAX_RULES: usize = 20;

const CONFIDENCE_FLOOR: f64 = 0.1;
const BASELINE_FLOOR: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleMiningParams {
    pub min_support: f64,
    pub max_rules: usize,
}

impl Default for RuleMiningParams {
    fn default() -> Self {
        Self {
            min_support: DEFAULT_MIN_SUPPORT,
            max_rules: DEFAULT_MAX_RULES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RuleStrength {
    Strong,
    Moderate,
    Weak,
}

impl RuleStrength {
    pub fn from_lift(lift: f64) -> Self {
        if lift >= 2.0 {
            RuleStrength::Strong
        } else if lift >= 1.3 {
            RuleStrength::Moderate
        } else {
            RuleStrength::Weak
        }
    }
}

/// `antecedent → consequent` with its support, confidence and lift
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssociationRule {
    pub antecedent: String,
    pub consequent: String,
    pub support: f64,
    pub confidence: f64,
    pub lift: f64,
    pub strength: RuleStrength,
}

impl AssociationRule {
    /// The unordered category pair, smaller name first
    pub fn pair(&self) -> (&str, &str) {
        if self.antecedent <= self.consequent {
            (&self.antecedent, &self.consequent)
        } else {
            (&self.consequent, &self.antecedent)
        }
    }
}

#[derive(Debug, Default)]
struct CategoryPresence {
    count: usize,
    segments: BTreeSet<SegmentLabel>,
}

/// Mine category association rules, highest lift first.
///
/// Rules are sorted by descending lift, ties by antecedent then consequent
/// name. Only the first rule of each unordered category pair is kept, and
/// the list is capped at `params.max_rules`.
pub fn mine_rules(dataset: &Dataset, params: &RuleMiningParams) -> Vec<AssociationRule> {
    if !dataset.has_column(columns::CATEGORY) {
        warn!("dataset has no Category column, association rules unavailable");
        return Vec::new();
    }

    let n_total = dataset.len() as f64;
    let labels = label_all(dataset.records());
    let mut presence: BTreeMap<&str, CategoryPresence> = BTreeMap::new();
    for (record, label) in dataset.records().iter().zip(&labels) {
        if let Some(category) = record.category.as_deref() {
            let entry = presence.entry(category).or_default();
            entry.count += 1;
            entry.segments.insert(*label);
        }
    }

    let categories = dataset.categories();
    let segment_total = SEGMENT_COUNT as f64;
    let mut candidates = Vec::new();
    for cat_a in &categories {
        for cat_b in &categories {
            if cat_a == cat_b {
                continue;
            }
            let a = &presence[cat_a.as_str()];
            let b = &presence[cat_b.as_str()];
            let shared = a.segments.intersection(&b.segments).count();
            if shared == 0 {
                continue;
            }

            let shared_fraction = shared as f64 / segment_total;
            let support = round_to(shared_fraction, 4);
            let confidence = round_to(
                (b.count as f64 / a.count as f64).min(1.0) * shared_fraction + CONFIDENCE_FLOOR,
                4,
            );
            let lift = round_to(confidence / (b.count as f64 / n_total).max(BASELINE_FLOOR), 4);

            if support >= params.min_support {
                candidates.push(AssociationRule {
                    antecedent: cat_a.clone(),
                    consequent: cat_b.clone(),
                    support,
                    confidence,
                    lift,
                    strength: RuleStrength::from_lift(lift),
                });
            }
        }
    }

    candidates.sort_by(|x, y| {
        y.lift
            .total_cmp(&x.lift)
            .then_with(|| x.antecedent.cmp(&y.antecedent))
            .then_with(|| x.consequent.cmp(&y.consequent))
    });

    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut rules: Vec<AssociationRule> = candidates
        .into_iter()
        .filter(|rule| {
            let (first, second) = rule.pair();
            seen.insert((first.to_string(), second.to_string()))
        })
        .collect();
    rules.truncate(params.max_rules);

    debug!(
        categories = categories.len(),
        rules = rules.len(),
        min_support = params.min_support,
        "association rules mined"
    );
    rules
}

/// Rules with lift at or above a threshold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleQuery {
    pub rules: Vec<AssociationRule>,
    /// Matching rules before the limit was applied
    pub total: usize,
    pub min_lift: f64,
}

pub fn filter_rules(rules: &[AssociationRule], min_lift: f64, limit: usize) -> RuleQuery {
    let matching: Vec<&AssociationRule> = rules.iter().filter(|r| r.lift >= min_lift).collect();
    RuleQuery {
        total: matching.len(),
        rules: matching.into_iter().take(limit).cloned().collect(),
        min_lift,
    }
}
