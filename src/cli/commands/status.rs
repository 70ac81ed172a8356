//! Run history command.

use std::collections::HashMap;

use console::style;

use crate::cli::helpers::truncate;
use crate::config::Config;
use crate::models::CategoryOutcome;
use crate::repository::DbContext;

/// Show recent per-category run outcomes.
pub async fn cmd_status(config: &Config, source: Option<&str>, limit: i64) -> anyhow::Result<()> {
    let ctx = DbContext::from_url(config.database_url())?;
    ctx.init_schema().await?;

    let sources = ctx.sources().get_all().await?;
    if sources.is_empty() {
        println!(
            "{} No sources registered. Run 'wongprime init' first.",
            style("!").yellow()
        );
        return Ok(());
    }

    let source_id = match source {
        Some(name) => match sources.iter().find(|s| s.name.eq_ignore_ascii_case(name)) {
            Some(s) => Some(s.id),
            None => anyhow::bail!("Unknown source '{}'", name),
        },
        None => None,
    };
    let names: HashMap<i32, &str> = sources.iter().map(|s| (s.id, s.name.as_str())).collect();

    let entries = ctx.run_log().recent(source_id, limit).await?;
    println!("\n{}", style("Recent runs").bold());
    println!("{}", "-".repeat(92));
    println!(
        "{:<17} {:<11} {:<24} {:>6} {:>5} {:>5} {:>6} {:>8}  Outcome",
        "When", "Source", "Category", "Found", "New", "Dup", "Errors", "Time"
    );
    println!("{}", "-".repeat(92));

    if entries.is_empty() {
        println!("  (no runs recorded)");
    }

    for entry in entries {
        let outcome = match entry.outcome {
            CategoryOutcome::Completed => style(entry.outcome.as_str()).green(),
            CategoryOutcome::Aborted => style(entry.outcome.as_str()).red(),
        };
        println!(
            "{:<17} {:<11} {:<24} {:>6} {:>5} {:>5} {:>6} {:>7.1}s  {}",
            entry.timestamp.format("%Y-%m-%d %H:%M"),
            truncate(names.get(&entry.source_id).copied().unwrap_or("?"), 11),
            truncate(&entry.category, 24),
            entry.stats.found,
            entry.stats.created,
            entry.stats.duplicate,
            entry.stats.errors,
            entry.duration_seconds,
            outcome
        );
    }

    let total = ctx.run_log().count().await?;
    println!("{}", "-".repeat(92));
    println!("{:<20} {}", "Total entries:", total);
    println!(
        "{:<20} {}",
        "Products:",
        ctx.catalog().count_products().await?
    );

    Ok(())
}
