//! Scrape command.

use std::collections::HashMap;
use std::sync::Arc;

use console::style;

use crate::browser::BrowserSession;
use crate::cli::helpers::format_secs;
use crate::config::{Config, SourceConfig};
use crate::engine::{CategoryResult, RunReport, Runner, ScraperEngine};
use crate::extract::StrategyKind;
use crate::fetch::PageFetcher;
use crate::models::Category;
use crate::repository::DbContext;

/// Everything needed to build one engine.
struct SourceJob {
    name: String,
    categories: Vec<Category>,
    strategy: StrategyKind,
}

/// Scrape the selected sources and print a summary per source.
pub async fn cmd_scrape(
    config: &Config,
    names: &[String],
    all: bool,
    workers: Option<usize>,
) -> anyhow::Result<()> {
    let selected: Vec<&SourceConfig> = if all || names.is_empty() {
        config.enabled_sources().collect()
    } else {
        names
            .iter()
            .map(|name| config.source(name))
            .collect::<Result<_, _>>()?
    };

    if selected.is_empty() {
        println!("{} No sources to scrape", style("!").yellow());
        return Ok(());
    }

    let mut jobs = HashMap::new();
    let mut order = Vec::new();
    for source in selected {
        let strategy = config.strategy_for(source)?;
        // surface bad selectors before any browser starts
        strategy.build()?;
        order.push(source.name.clone());
        jobs.insert(
            source.name.clone(),
            SourceJob {
                name: source.name.clone(),
                categories: config.categories_for(source),
                strategy,
            },
        );
    }

    let ctx = DbContext::from_url(config.database_url())?;
    ctx.init_schema().await?;

    let workers = workers.unwrap_or(config.runner.workers);
    println!(
        "{} Scraping {} source(s) with {} worker(s)",
        style("→").cyan(),
        order.len(),
        workers.max(1)
    );

    let jobs = Arc::new(jobs);
    let browser_config = config.browser.clone();
    let policy = config.retry_policy();
    let timing = config.load_timing();

    let runner = Runner::new(workers, config.min_run_interval());
    let reports = runner
        .run(order, move |name| {
            let jobs = jobs.clone();
            let browser_config = browser_config.clone();
            let ctx = ctx.clone();
            async move {
                let Some(job) = jobs.get(&name) else {
                    return RunReport::failed(&name, "source not scheduled");
                };
                let strategy = match job.strategy.build() {
                    Ok(strategy) => strategy,
                    Err(e) => return RunReport::failed(&job.name, e.to_string()),
                };
                let fetcher = PageFetcher::new(BrowserSession::new(browser_config), policy, timing);
                let mut engine = ScraperEngine::new(
                    job.name.clone(),
                    job.categories.clone(),
                    strategy,
                    fetcher,
                    ctx,
                );
                engine.run().await
            }
        })
        .await;

    let mut failed = 0;
    for report in &reports {
        print_report(report);
        if !report.is_success() {
            failed += 1;
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} runs failed", failed, reports.len());
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    println!("\n{}", style(&report.source).bold());

    for category in &report.categories {
        let marker = match category.result {
            CategoryResult::Completed => style("✓").green(),
            CategoryResult::Aborted(_) => style("!").yellow(),
            CategoryResult::FetchFailed(_) => style("✗").red(),
        };
        println!(
            "  {} {:<24} {} ({})",
            marker,
            category.category.name,
            category.stats,
            format_secs(category.duration)
        );
        match &category.result {
            CategoryResult::Aborted(reason) | CategoryResult::FetchFailed(reason) => {
                println!("      {}", style(reason).dim());
            }
            CategoryResult::Completed => {}
        }
    }

    match &report.error {
        Some(error) => println!("  {} {}", style("✗").red(), error),
        None => println!(
            "  {} Total {} in {}",
            style("→").cyan(),
            report.totals(),
            format_secs(report.elapsed)
        ),
    }
}
