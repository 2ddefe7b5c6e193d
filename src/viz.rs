//! Chart rendering with Plotters: affinity heatmap and segment sizes
//!
//! Charts carry no text so rendering needs no system fonts.

use std::path::{Path, PathBuf};

use plotters::prelude::*;
use tracing::info;

use crate::affinity::AffinityProfiles;
use crate::analytics::Analytics;
use crate::error::{Error, Result};
use crate::segment::SegmentLabel;

const HEATMAP_SIZE: (u32, u32) = (800, 400);
const SIZE_CHART_SIZE: (u32, u32) = (600, 400);

fn render_error(err: impl std::fmt::Display) -> Error {
    Error::Render(err.to_string())
}

/// Parse a `#rrggbb` color, black when malformed
fn hex_color(hex: &str) -> RGBColor {
    let digits = hex.trim_start_matches('#');
    let channel = |range: std::ops::Range<usize>| {
        digits
            .get(range)
            .and_then(|part| u8::from_str_radix(part, 16).ok())
    };
    match (channel(0..2), channel(2..4), channel(4..6)) {
        (Some(r), Some(g), Some(b)) if digits.len() == 6 => RGBColor(r, g, b),
        _ => BLACK,
    }
}

/// Blend from white towards `color` by `weight` in [0, 1]
fn shade(color: RGBColor, weight: f64) -> RGBColor {
    let weight = weight.clamp(0.0, 1.0);
    let mix = |channel: u8| (255.0 - (255.0 - channel as f64) * weight).round() as u8;
    RGBColor(mix(color.0), mix(color.1), mix(color.2))
}

/// Draw the segment × category affinity heatmap
///
/// # Arguments
/// * `profiles` - Affinity profiles keyed by segment
/// * `output_path` - Path to save the PNG
///
/// Rows are segments in priority order, columns are categories in name
/// order; each cell is shaded in its segment's color by the affinity score.
pub fn create_affinity_heatmap(profiles: &AffinityProfiles, output_path: &Path) -> Result<()> {
    let categories: Vec<&String> = profiles
        .values()
        .flat_map(|profile| profile.category_affinity.keys())
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect();
    let columns = categories.len().max(1) as f64;
    let rows = SegmentLabel::ALL.len() as f64;

    let root = BitMapBackend::new(output_path, HEATMAP_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(render_error)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .build_cartesian_2d(0f64..columns, 0f64..rows)
        .map_err(render_error)?;

    for (row, segment) in SegmentLabel::ALL.iter().enumerate() {
        let base = hex_color(segment.color());
        let profile = profiles.get(segment);
        let y = rows - row as f64;
        chart
            .draw_series(categories.iter().enumerate().map(|(column, category)| {
                let score = profile
                    .and_then(|p| p.category_affinity.get(*category))
                    .copied()
                    .unwrap_or(0.0);
                let x = column as f64;
                Rectangle::new(
                    [(x + 0.02, y - 0.98), (x + 0.98, y - 0.02)],
                    shade(base, score).filled(),
                )
            }))
            .map_err(render_error)?;
    }

    root.present().map_err(render_error)?;
    info!(path = %output_path.display(), "affinity heatmap saved");
    Ok(())
}

/// Draw one bar per segment, scaled to the largest segment
pub fn create_segment_size_chart(
    sizes: &[(SegmentLabel, usize)],
    output_path: &Path,
) -> Result<()> {
    let max_size = sizes.iter().map(|(_, size)| *size).max().unwrap_or(0).max(1) as f64;

    let root = BitMapBackend::new(output_path, SIZE_CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(render_error)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .build_cartesian_2d(0f64..sizes.len().max(1) as f64, 0f64..(max_size * 1.1))
        .map_err(render_error)?;

    chart
        .draw_series(sizes.iter().enumerate().map(|(i, (segment, size))| {
            Rectangle::new(
                [(i as f64 + 0.1, 0.0), (i as f64 + 0.9, *size as f64)],
                hex_color(segment.color()).filled(),
            )
        }))
        .map_err(render_error)?;

    root.present().map_err(render_error)?;
    info!(path = %output_path.display(), "segment size chart saved");
    Ok(())
}

/// Path of the size chart that accompanies a heatmap, e.g. `out.png` → `out_sizes.png`
pub fn size_chart_path(base_output_path: &Path) -> PathBuf {
    let stem = base_output_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "segments".to_string());
    base_output_path.with_file_name(format!("{}_sizes.png", stem))
}

/// Render both charts and return the written paths
pub fn generate_visualization_report(
    analytics: &Analytics,
    base_output_path: &Path,
) -> Result<Vec<PathBuf>> {
    create_affinity_heatmap(analytics.affinities(), base_output_path)?;

    let sizes: Vec<(SegmentLabel, usize)> = analytics
        .segments()
        .iter()
        .map(|summary| (summary.label, summary.size))
        .collect();
    let sizes_path = size_chart_path(base_output_path);
    create_segment_size_chart(&sizes, &sizes_path)?;

    Ok(vec![base_output_path.to_path_buf(), sizes_path])
}
