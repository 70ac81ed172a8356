//! Initialize command.

use console::style;

use crate::config::Config;
use crate::repository::DbContext;

/// Create the schema and register configured sources and categories.
pub async fn cmd_init(config: &Config) -> anyhow::Result<()> {
    let ctx = DbContext::from_url(config.database_url())?;
    ctx.init_schema().await?;

    let source_repo = ctx.sources();
    for source in &config.sources {
        let stored = source_repo.ensure(&source.name, &source.base_url).await?;
        println!(
            "  {} Source: {} (id {})",
            style("✓").green(),
            stored.name,
            stored.id
        );
    }

    let categories = config.all_categories();
    for category in &categories {
        source_repo.ensure_category(category).await?;
    }
    println!(
        "  {} Registered {} categories",
        style("✓").green(),
        categories.len()
    );

    println!(
        "{} Initialized database at {}",
        style("✓").green(),
        config.database_url()
    );

    Ok(())
}
