//! Command-line interface definitions and argument parsing

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::{ConfigOverrides, LoadOptions};
use crate::data::frequency_score;
use crate::error::{Error, Result};
use crate::model::CustomerProfile;

/// Customer segmentation, category affinity and association-rule analytics
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the shopping trends CSV file
    #[arg(short, long, global = true)]
    pub input: Option<PathBuf>,

    /// Path to the segment knowledge JSON file
    #[arg(short, long, global = true)]
    pub knowledge: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long, global = true, env = "SHOPMIND_CONFIG")]
    pub config: Option<PathBuf>,

    /// Minimum fraction of segments an association rule must span
    #[arg(long, global = true)]
    pub min_support: Option<f64>,

    /// Maximum number of association rules to keep
    #[arg(long, global = true)]
    pub max_rules: Option<usize>,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Segment × category affinity matrix with the leading association rules
    Affinity {
        /// Show a single segment (id or display name)
        segment: Option<String>,
    },

    /// Association rules filtered by lift
    Rules {
        /// Minimum lift of listed rules
        #[arg(long, default_value = "1.0")]
        min_lift: f64,

        /// Maximum number of rules to list
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Segment statistics, or the detail of one segment
    Segments {
        /// Segment id or display name
        segment: Option<String>,
    },

    /// Fixed 2-D segment positions for scatter plots
    Projection,

    /// Review-rating sentiment per segment, per category and overall
    Sentiment {
        /// Show a single segment
        segment: Option<String>,
    },

    /// Retention and pricing playbook
    Strategy {
        /// Show a single segment
        segment: Option<String>,

        /// Compare two segments side by side
        #[arg(long, num_args = 2, value_names = ["SEGMENT", "SEGMENT"], conflicts_with = "segment")]
        compare: Option<Vec<String>>,
    },

    /// Per-segment centroids in the normalized feature space
    Centroids,

    /// Predict for a single customer
    /// Example: --profile "age=42,amount=85,previous=22,rating=4.5,frequency=Weekly"
    Predict {
        /// Comma-separated key=value pairs or a JSON object
        #[arg(short, long)]
        profile: String,

        /// What to predict
        #[arg(short, long, value_enum, default_value = "segment")]
        target: PredictTarget,
    },

    /// Render the affinity heatmap and segment size chart
    Plot {
        /// Output path for the heatmap PNG
        #[arg(short, long, default_value = "segment_affinity.png")]
        output: PathBuf,
    },

    /// Print the effective configuration
    Config,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictTarget {
    Segment,
    Revenue,
    Subscription,
    All,
}

impl Args {
    /// Configuration sources named on the command line
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config.clone(),
            overrides: ConfigOverrides {
                dataset: self.input.clone(),
                knowledge: self.knowledge.clone(),
                min_support: self.min_support,
                max_rules: self.max_rules,
            },
        }
    }
}

/// Parse a customer profile from `key=value` pairs or a JSON object.
///
/// Unlisted fields keep their defaults. `frequency` accepts a 1-5 score or
/// a label such as `Weekly`; flags accept yes/no, true/false or 1/0.
pub fn parse_profile(input: &str) -> Result<CustomerProfile> {
    let input = input.trim();
    if input.starts_with('{') {
        return serde_json::from_str(input).map_err(|e| Error::InvalidProfile(e.to_string()));
    }

    let mut profile = CustomerProfile::default();
    for pair in input.split(',').filter(|p| !p.trim().is_empty()) {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| Error::InvalidProfile(format!("expected key=value, got `{}`", pair)))?;
        let (key, value) = (key.trim(), value.trim());
        match key {
            "age" => profile.age = parse_number(key, value)?,
            "amount" | "purchase_amount" => profile.purchase_amount = parse_number(key, value)?,
            "previous" | "previous_purchases" => {
                profile.previous_purchases = parse_number(key, value)?
            }
            "rating" | "review_rating" => profile.review_rating = parse_number(key, value)?,
            "frequency" | "frequency_score" => {
                profile.frequency_score = match value.parse::<f64>() {
                    Ok(_) => parse_number(key, value)?,
                    Err(_) => frequency_score(Some(value)),
                }
            }
            "discount" | "discount_applied" => profile.discount_applied = parse_flag(key, value)?,
            "promo" | "promo_code_used" => profile.promo_code_used = parse_flag(key, value)?,
            "subscribed" | "subscription_status" => {
                profile.subscription_status = parse_flag(key, value)?
            }
            "category" => profile.category = value.to_string(),
            "season" => profile.season = value.to_string(),
            "gender" => profile.gender = value.to_string(),
            _ => return Err(Error::InvalidProfile(format!("unknown field `{}`", key))),
        }
    }
    Ok(profile)
}

fn parse_number(key: &str, value: &str) -> Result<f64> {
    value
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
        .ok_or_else(|| Error::InvalidProfile(format!("invalid {} value: {}", key, value)))
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "yes" | "true" | "1" => Ok(true),
        "no" | "false" | "0" => Ok(false),
        _ => Err(Error::InvalidProfile(format!(
            "invalid {} value: {}",
            key, value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_profile_pairs() {
        let profile =
            parse_profile("age=42, amount=85.5,previous=22,rating=4.5,frequency=Weekly,discount=no")
                .unwrap();

        assert_eq!(profile.age, 42.0);
        assert_eq!(profile.purchase_amount, 85.5);
        assert_eq!(profile.previous_purchases, 22.0);
        assert_eq!(profile.review_rating, 4.5);
        assert_eq!(profile.frequency_score, 5.0);
        assert!(!profile.discount_applied);
        assert_eq!(profile.category, "Clothing");
    }

    #[test]
    fn test_parse_profile_json() {
        let profile =
            parse_profile(r#"{"previous_purchases": 3, "discount_applied": true}"#).unwrap();
        assert_eq!(profile.previous_purchases, 3.0);
        assert!(profile.discount_applied);
        assert_eq!(profile.review_rating, 4.0);
    }

    #[test]
    fn test_parse_profile_errors() {
        assert!(parse_profile("age").is_err());
        assert!(parse_profile("age=old").is_err());
        assert!(parse_profile("discount=maybe").is_err());
        assert!(parse_profile("height=180").is_err());
        assert!(parse_profile("{not json").is_err());
        assert!(parse_profile(r#"{"previous_purchase": 3}"#).is_err());
        assert_eq!(parse_profile("").unwrap(), CustomerProfile::default());
    }

    #[test]
    fn test_non_finite_numbers_rejected() {
        for input in ["previous=NaN", "amount=inf", "age=-inf", "frequency=NaN"] {
            assert!(
                matches!(parse_profile(input), Err(Error::InvalidProfile(_))),
                "{} should be rejected",
                input
            );
        }
    }

    #[test]
    fn test_frequency_score_or_label() {
        assert_eq!(parse_profile("frequency=2").unwrap().frequency_score, 2.0);
        assert_eq!(
            parse_profile("frequency=Fortnightly").unwrap().frequency_score,
            4.0
        );
    }

    #[test]
    fn test_subcommands() {
        let args = Args::try_parse_from([
            "shopmind",
            "rules",
            "--min-lift",
            "1.5",
            "--input",
            "trends.csv",
        ])
        .unwrap();
        assert_eq!(
            args.command,
            Command::Rules {
                min_lift: 1.5,
                limit: 20
            }
        );
        assert_eq!(args.input, Some(PathBuf::from("trends.csv")));

        let args =
            Args::try_parse_from(["shopmind", "strategy", "--compare", "premium", "discount"])
                .unwrap();
        assert_eq!(
            args.command,
            Command::Strategy {
                segment: None,
                compare: Some(vec!["premium".to_string(), "discount".to_string()])
            }
        );

        let args = Args::try_parse_from(["shopmind", "sentiment", "loyal"]).unwrap();
        assert_eq!(
            args.command,
            Command::Sentiment {
                segment: Some("loyal".to_string())
            }
        );

        assert!(Args::try_parse_from(["shopmind"]).is_err());
    }

    #[test]
    fn test_load_options() {
        let args =
            Args::try_parse_from(["shopmind", "--min-support", "0.3", "--max-rules", "5", "config"])
                .unwrap();
        let options = args.load_options();

        assert_eq!(options.config_path, None);
        assert_eq!(options.overrides.min_support, Some(0.3));
        assert_eq!(options.overrides.max_rules, Some(5));
        assert_eq!(args.command, Command::Config);
    }
}
