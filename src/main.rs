//! ShopMind: customer segmentation and category affinity analytics
//!
//! Entrypoint that resolves configuration, loads the dataset snapshot and
//! knowledge file, then dispatches one analytics command and prints JSON.

use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use shopmind::cli::{parse_profile, Command, PredictTarget};
use shopmind::predict::{RevenueEstimate, SegmentPrediction, SubscriptionEstimate};
use shopmind::{load_dataset, viz, Analytics, AnalyticsConfig, Args, Dataset, KnowledgeBase};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Serialize)]
struct CombinedPrediction {
    segment: SegmentPrediction,
    revenue: RevenueEstimate,
    subscription: SubscriptionEstimate,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args);

    let config = AnalyticsConfig::load(args.load_options()).context("invalid configuration")?;
    debug!(?config, "configuration resolved");

    let start_time = Instant::now();
    let dataset = load_dataset_or_degrade(&config.dataset);
    let knowledge = load_knowledge_or_degrade(config.knowledge.as_deref());
    let analytics = Analytics::new(dataset, config, knowledge)?;
    info!(
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "inputs loaded"
    );

    run_command(&analytics, &args)?;

    info!(
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "command complete"
    );
    Ok(())
}

/// Logs go to stderr so stdout carries only the JSON report
fn init_tracing(args: &Args) {
    let default_level = if args.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(filter);
    if args.json_logs {
        registry
            .with(fmt::layer().with_target(true).json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}

/// A missing or unreadable dataset leaves every view empty instead of aborting
fn load_dataset_or_degrade(path: &Path) -> Option<Dataset> {
    match load_dataset(path) {
        Ok(dataset) => Some(dataset),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "dataset unavailable, continuing without it");
            None
        }
    }
}

fn load_knowledge_or_degrade(path: Option<&Path>) -> KnowledgeBase {
    let Some(path) = path else {
        return KnowledgeBase::default();
    };
    KnowledgeBase::load(path).unwrap_or_else(|err| {
        warn!(path = %path.display(), error = %err, "knowledge unavailable, using defaults");
        KnowledgeBase::default()
    })
}

fn run_command(analytics: &Analytics, args: &Args) -> Result<()> {
    let pretty = args.pretty;
    match &args.command {
        Command::Affinity { segment: None } => {
            print_json(&analytics.report(analytics.overview()), pretty)
        }
        Command::Affinity {
            segment: Some(segment),
        } => print_json(&analytics.report(analytics.segment_affinity(segment)), pretty),
        Command::Rules { min_lift, limit } => print_json(
            &analytics.report(analytics.query_rules(*min_lift, *limit)),
            pretty,
        ),
        Command::Segments { segment: None } => {
            print_json(&analytics.report(analytics.segments()), pretty)
        }
        Command::Segments {
            segment: Some(segment),
        } => print_json(&analytics.report(analytics.segment_detail(segment)?), pretty),
        Command::Projection => print_json(&analytics.report(analytics.projections()), pretty),
        Command::Sentiment { segment: None } => {
            print_json(&analytics.report(analytics.sentiment()), pretty)
        }
        Command::Sentiment {
            segment: Some(segment),
        } => print_json(
            &analytics.report(analytics.segment_sentiment(segment)?),
            pretty,
        ),
        Command::Strategy {
            compare: Some(pair),
            ..
        } => match pair.as_slice() {
            [first, second] => print_json(
                &analytics.report(analytics.compare_strategies(first, second)?),
                pretty,
            ),
            _ => anyhow::bail!("--compare takes exactly two segments"),
        },
        Command::Strategy {
            segment: Some(segment),
            ..
        } => print_json(&analytics.report(analytics.strategy(segment)?), pretty),
        Command::Strategy { .. } => print_json(&analytics.report(analytics.strategies()), pretty),
        Command::Centroids => {
            let summaries = analytics
                .centroids()
                .map(|model| model.summaries())
                .unwrap_or_default();
            print_json(&analytics.report(summaries), pretty)
        }
        Command::Predict { profile, target } => {
            let profile = parse_profile(profile).context("failed to parse --profile")?;
            debug!(?profile, ?target, "running prediction");
            match target {
                PredictTarget::Segment => {
                    print_json(&analytics.report(analytics.predict_segment(&profile)), pretty)
                }
                PredictTarget::Revenue => {
                    print_json(&analytics.report(analytics.estimate_revenue(&profile)), pretty)
                }
                PredictTarget::Subscription => print_json(
                    &analytics.report(analytics.estimate_subscription(&profile)),
                    pretty,
                ),
                PredictTarget::All => {
                    let combined = CombinedPrediction {
                        segment: analytics.predict_segment(&profile),
                        revenue: analytics.estimate_revenue(&profile),
                        subscription: analytics.estimate_subscription(&profile),
                    };
                    print_json(&analytics.report(combined), pretty)
                }
            }
        }
        Command::Plot { output } => {
            let written = viz::generate_visualization_report(analytics, output)
                .with_context(|| format!("failed to render charts to {}", output.display()))?;
            print_json(&analytics.report(written), pretty)
        }
        Command::Config => print_json(analytics.config(), pretty),
    }
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", rendered);
    Ok(())
}
