//! ShopMind: customer segmentation and category affinity analytics
//!
//! Customers from a shopping trends snapshot are labelled into four fixed
//! behavioural segments. On top of those labels the library computes
//! segment × category affinity, segment-level association rules, review
//! sentiment, retention strategies and single-customer predictions.

pub mod affinity;
pub mod analytics;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod knowledge;
pub mod model;
pub mod predict;
pub mod rules;
pub mod segment;
pub mod sentiment;
pub mod stats;
pub mod strategy;
pub mod viz;

pub use analytics::{Analytics, Report};
pub use cli::Args;
pub use config::AnalyticsConfig;
pub use data::{load_dataset, CustomerRecord, Dataset};
pub use error::{Error, Result};
pub use knowledge::KnowledgeBase;
pub use model::{assign_segment, CustomerProfile};
pub use rules::{mine_rules, AssociationRule};
pub use segment::{classify, SegmentLabel};
