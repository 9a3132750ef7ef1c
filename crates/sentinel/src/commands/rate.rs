//! Rate a transfer size

use anyhow::Result;
use colored::Colorize;
use sentinel_lib::format::format_bytes;
use sentinel_lib::rating::THRESHOLDS_KB;
use sentinel_lib::{Rating, TotalFootprint};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{color_rating, print_json, print_table, OutputFormat};

/// Row of the rating scale table
#[derive(Tabled, Serialize)]
struct ScaleRow {
    #[tabled(rename = "Rating")]
    rating: String,
    #[tabled(rename = "Below")]
    below: String,
    #[tabled(rename = "Color")]
    color: &'static str,
    #[tabled(rename = "")]
    marker: String,
}

/// Print the rating of `bytes`, optionally with the full scale
pub fn rate(bytes: u64, show_scale: bool, format: OutputFormat) -> Result<()> {
    let footprint = TotalFootprint::from_bytes(bytes);

    if format == OutputFormat::Json {
        return print_json(&footprint);
    }

    println!(
        "{} {}  {}  {}",
        "Rating:".bold(),
        color_rating(footprint.rating, footprint.rating.label()),
        footprint.bytes_formatted,
        footprint.color.dimmed()
    );

    if show_scale {
        println!();
        print_table(&scale_rows(footprint.rating), "No ratings defined");
    }
    Ok(())
}

fn scale_rows(current: Rating) -> Vec<ScaleRow> {
    Rating::ALL
        .into_iter()
        .map(|rating| {
            let below = THRESHOLDS_KB
                .iter()
                .find(|(r, _)| *r == rating)
                .map(|(_, kb)| format_bytes((kb * 1024.0) as u64))
                .unwrap_or_else(|| "-".to_string());
            ScaleRow {
                rating: color_rating(rating, rating.label()).to_string(),
                below,
                color: rating.color(),
                marker: if rating == current {
                    "◀".to_string()
                } else {
                    String::new()
                },
            }
        })
        .collect()
}
