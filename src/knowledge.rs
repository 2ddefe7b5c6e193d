//! Optional per-segment knowledge file used to enrich reports

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::segment::SegmentLabel;

/// Precomputed facts about one segment.
///
/// Only the listed fields are interpreted; anything else in the file is
/// carried through untouched in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentKnowledge {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_spend: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_season: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_payment_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_shipping_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_frequency: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_usage_percent: Option<f64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Knowledge keyed by segment; empty when no file was given
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KnowledgeBase {
    segments: BTreeMap<SegmentLabel, SegmentKnowledge>,
}

impl KnowledgeBase {
    /// Parse knowledge JSON keyed by segment display name or short id.
    ///
    /// Entries for unknown segments are skipped with a warning.
    pub fn from_json(text: &str, path: &Path) -> Result<Self> {
        let raw: BTreeMap<String, SegmentKnowledge> =
            serde_json::from_str(text).map_err(|source| Error::Knowledge {
                path: path.to_path_buf(),
                source,
            })?;

        let mut segments = BTreeMap::new();
        for (key, knowledge) in raw {
            match SegmentLabel::from_id(&key) {
                Some(segment) => {
                    segments.insert(segment, knowledge);
                }
                None => warn!(segment = %key, "knowledge entry for unknown segment skipped"),
            }
        }
        Ok(Self { segments })
    }

    /// Load the knowledge file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| Error::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        let knowledge = Self::from_json(&text, path)?;
        info!(
            path = %path.display(),
            segments = knowledge.len(),
            "segment knowledge loaded"
        );
        Ok(knowledge)
    }

    pub fn get(&self, segment: SegmentLabel) -> Option<&SegmentKnowledge> {
        self.segments.get(&segment)
    }

    pub fn avg_spend(&self, segment: SegmentLabel) -> Option<f64> {
        self.get(segment).and_then(|k| k.avg_spend)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl FromIterator<(SegmentLabel, SegmentKnowledge)> for KnowledgeBase {
    fn from_iter<T: IntoIterator<Item = (SegmentLabel, SegmentKnowledge)>>(iter: T) -> Self {
        Self {
            segments: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"{
        "Premium Urgent Buyers": {
            "avg_spend": 81.2,
            "top_category": "Clothing",
            "top_season": "Fall",
            "top_payment_method": "Credit Card",
            "top_shipping_type": "Express",
            "avg_frequency": 3.4,
            "cluster_id": 0
        },
        "discount": {"avg_spend": 38.5},
        "Window Shoppers": {"avg_spend": 1.0}
    }"#;

    #[test]
    fn test_from_json() {
        let knowledge = KnowledgeBase::from_json(SAMPLE, Path::new("knowledge.json")).unwrap();

        assert_eq!(knowledge.len(), 2);
        let premium = knowledge.get(SegmentLabel::PremiumUrgentBuyers).unwrap();
        assert_eq!(premium.avg_spend, Some(81.2));
        assert_eq!(premium.top_shipping_type.as_deref(), Some("Express"));
        assert_eq!(premium.extra["cluster_id"], serde_json::json!(0));
        assert_eq!(
            knowledge.avg_spend(SegmentLabel::DiscountDrivenShoppers),
            Some(38.5)
        );
        assert_eq!(knowledge.avg_spend(SegmentLabel::OccasionalBuyers), None);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", SAMPLE).unwrap();

        let knowledge = KnowledgeBase::load(file.path()).unwrap();
        assert!(!knowledge.is_empty());
    }

    #[test]
    fn test_load_errors() {
        let missing = KnowledgeBase::load("/nonexistent/segment_knowledge.json");
        assert!(matches!(missing, Err(Error::ReadFile { .. })));

        let malformed = KnowledgeBase::from_json("{not json", Path::new("bad.json"));
        assert!(matches!(malformed, Err(Error::Knowledge { .. })));
    }
}
