//! Library reports
//!
//! Artist power rankings plus coverage counts from the shadow state.
//! Report output goes to stdout; operational logging stays on tracing.

use crate::catalog::{Catalog, CatalogReader};
use crate::Result;
use rime_common::db::ownership;
use sqlx::SqlitePool;

/// Entries shown at each end of the power rankings
const RANKING_DEPTH: usize = 10;

/// Print the artist power rankings and library coverage.
pub async fn run_report(
    reader: &dyn CatalogReader,
    pool: &SqlitePool,
    library_id: i64,
) -> Result<()> {
    let catalog = reader.fetch_catalog().await?;

    print_power_rankings(&catalog);
    print_coverage(&catalog, pool, library_id).await?;
    Ok(())
}

fn print_power_rankings(catalog: &Catalog) {
    let mut rated: Vec<(&str, f32)> = catalog
        .artists()
        .iter()
        .filter_map(|a| a.rating.filter(|r| *r > 0.0).map(|r| (a.name.as_str(), r)))
        .collect();
    rated.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    println!("\nTOP {RANKING_DEPTH} ARTISTS");
    println!("{:<40} | {:<10}", "Artist Name", "Rating");
    println!("{}", "-".repeat(55));
    for (name, rating) in rated.iter().take(RANKING_DEPTH) {
        println!("{:<40} | {:.2} stars", truncate(name, 40), rating);
    }

    println!("\nBOTTOM {RANKING_DEPTH} ARTISTS");
    println!("{:<40} | {:<10}", "Artist Name", "Rating");
    println!("{}", "-".repeat(55));
    for (name, rating) in rated.iter().rev().take(RANKING_DEPTH).rev() {
        println!("{:<40} | {:.2} stars", truncate(name, 40), rating);
    }
}

async fn print_coverage(catalog: &Catalog, pool: &SqlitePool, library_id: i64) -> Result<()> {
    let (inferred, manual, twin_linked) = ownership::coverage_counts(pool, library_id).await?;
    let total = catalog.total_items() as i64;

    println!("\nLIBRARY COVERAGE");
    println!("{:<16} | {:>10} | {:>8}", "Metric", "Count", "Share");
    println!("{}", "-".repeat(42));
    print_coverage_row("Total items", total, total);
    print_coverage_row("Inferred", inferred, total);
    print_coverage_row("Manual", manual, total);
    print_coverage_row("Twin-linked", twin_linked, total);
    Ok(())
}

fn print_coverage_row(label: &str, value: i64, total: i64) {
    let share = if total > 0 {
        value as f64 / total as f64 * 100.0
    } else {
        0.0
    };
    println!("{label:<16} | {value:>10} | {share:>7.1}%");
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
