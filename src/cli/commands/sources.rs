//! Source listing command.

use std::collections::HashMap;

use console::style;

use crate::cli::helpers::truncate;
use crate::config::Config;
use crate::repository::DbContext;

/// List configured sources alongside their stored ids.
pub async fn cmd_sources(config: &Config) -> anyhow::Result<()> {
    let ctx = DbContext::from_url(config.database_url())?;
    ctx.init_schema().await?;
    let stored: HashMap<String, i32> = ctx
        .sources()
        .get_all()
        .await?
        .into_iter()
        .map(|s| (s.name, s.id))
        .collect();

    println!("\n{}", style("Sources").bold());
    println!("{}", "-".repeat(78));
    println!(
        "{:<6} {:<14} {:<32} {:<10} {:<5} Enabled",
        "ID", "Name", "Base URL", "Strategy", "Cats"
    );
    println!("{}", "-".repeat(78));

    for source in &config.sources {
        let id = stored
            .get(&source.name)
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        let strategy = config
            .strategy_for(source)
            .map(|kind| kind.label())
            .unwrap_or("none");
        let enabled = if source.enabled {
            style("yes").green()
        } else {
            style("no").dim()
        };

        println!(
            "{:<6} {:<14} {:<32} {:<10} {:<5} {}",
            id,
            truncate(&source.name, 14),
            truncate(&source.base_url, 32),
            strategy,
            config.categories_for(source).len(),
            enabled
        );
    }

    if stored.is_empty() {
        println!(
            "\n{} No sources registered yet. Run 'wongprime init' first.",
            style("!").yellow()
        );
    }

    Ok(())
}
