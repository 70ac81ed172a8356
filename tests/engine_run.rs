//! End-to-end engine runs against a canned renderer and a temporary database.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use diesel_async::SimpleAsyncConnection;
use tempfile::TempDir;

use wongprime::engine::{CategoryResult, EngineState, ScraperEngine};
use wongprime::extract::StrategyKind;
use wongprime::fetch::{LoadTiming, PageFetcher, PageRenderer, RecordingSleeper, RetryPolicy};
use wongprime::models::{Category, CategoryOutcome, CategoryStats, ExtractedProduct, PriceInsert};
use wongprime::repository::DbContext;

const BASE_URL: &str = "https://www.wong.pe";
const SALUD: &str = "higiene-salud-y-belleza/salud";
const CUIDADO: &str = "higiene-salud-y-belleza/cuidado-personal";

#[derive(Clone, Default)]
struct RenderCalls {
    launched: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
    navigations: Arc<Mutex<Vec<String>>>,
}

impl RenderCalls {
    fn navigations_to(&self, url: &str) -> usize {
        self.navigations
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.as_str() == url)
            .count()
    }
}

/// Serves fixed HTML per URL; unknown URLs fail to navigate.
struct FakeRenderer {
    pages: HashMap<String, String>,
    fail_launch: bool,
    current: Option<String>,
    calls: RenderCalls,
}

impl FakeRenderer {
    fn new(calls: &RenderCalls) -> Self {
        Self {
            pages: HashMap::new(),
            fail_launch: false,
            current: None,
            calls: calls.clone(),
        }
    }

    fn page(mut self, path: &str, html: String) -> Self {
        self.pages.insert(format!("{BASE_URL}/{path}"), html);
        self
    }
}

#[async_trait]
impl PageRenderer for FakeRenderer {
    async fn launch(&mut self) -> anyhow::Result<()> {
        if self.fail_launch {
            anyhow::bail!("Chrome/Chromium not found");
        }
        self.calls.launched.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn navigate(&mut self, url: &str) -> anyhow::Result<()> {
        self.calls.navigations.lock().unwrap().push(url.to_string());
        if !self.pages.contains_key(url) {
            anyhow::bail!("net::ERR_NAME_NOT_RESOLVED");
        }
        self.current = Some(url.to_string());
        Ok(())
    }

    async fn scroll_by_fraction(&mut self, _fraction: f64) -> anyhow::Result<()> {
        Ok(())
    }

    async fn content(&mut self) -> anyhow::Result<String> {
        self.current
            .as_ref()
            .and_then(|url| self.pages.get(url))
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no page loaded"))
    }

    async fn close(&mut self) {
        self.calls.closed.store(true, Ordering::SeqCst);
    }
}

fn product_html(name: &str, price: Option<&str>, brand: Option<&str>) -> String {
    let slug = name.to_lowercase().replace(' ', "-");
    format!(
        r#"<div class="product-item">
             <a href="/{slug}/p"><img src="/img/{slug}.jpg"></a>
             <p class="product-title">{name}</p>
             {brand}
             {price}
           </div>"#,
        brand = brand
            .map(|b| format!(r#"<span class="brand">{b}</span>"#))
            .unwrap_or_default(),
        price = price
            .map(|p| format!(r#"<span class="product-prices__value">{p}</span>"#))
            .unwrap_or_default(),
    )
}

fn listing(products: &[String]) -> String {
    format!(
        "<html><body><div class=\"grid\">{}</div></body></html>",
        products.join("\n")
    )
}

async fn setup() -> (DbContext, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}", dir.path().join("catalog.db").display());
    let ctx = DbContext::from_url(&url).unwrap();
    ctx.init_schema().await.unwrap();
    ctx.sources().ensure("Wong", BASE_URL).await.unwrap();
    for path in [SALUD, CUIDADO] {
        ctx.sources()
            .ensure_category(&Category::from_path(path))
            .await
            .unwrap();
    }
    (ctx, dir)
}

fn engine(
    ctx: &DbContext,
    source: &str,
    categories: &[&str],
    renderer: FakeRenderer,
) -> ScraperEngine<FakeRenderer> {
    let policy = RetryPolicy {
        max_attempts: 3,
        min_delay: Duration::from_secs(2),
        max_delay: Duration::from_secs(10),
        attempt_timeout: Duration::from_secs(30),
    };
    let fetcher = PageFetcher::new(renderer, policy, LoadTiming::default())
        .with_sleeper(Arc::new(RecordingSleeper::new()));

    ScraperEngine::new(
        source,
        categories.iter().map(|p| Category::from_path(p)).collect(),
        StrategyKind::Wong.build().unwrap(),
        fetcher,
        ctx.clone(),
    )
}

#[tokio::test]
async fn new_and_already_seen_products_are_counted() {
    let (ctx, _dir) = setup().await;

    // a product whose price was already recorded today
    let known = ExtractedProduct::new("Alcohol Gel 1L", 15.9, "").with_brand("Family Doctor");
    let mut writer = ctx.catalog_writer().await.unwrap();
    let wong = writer.resolve_source("Wong").await.unwrap().unwrap();
    let product = writer.upsert_product(&known, "Salud").await.unwrap();
    assert_eq!(
        writer
            .insert_price(wong.id, product.id, &known, Utc::now())
            .await
            .unwrap(),
        PriceInsert::Inserted
    );
    drop(writer);

    let calls = RenderCalls::default();
    let renderer = FakeRenderer::new(&calls).page(
        SALUD,
        listing(&[
            product_html("Paracetamol 500mg", Some("S/ 12.50"), Some("Genfar")),
            product_html("Vitamina C 1g", Some("S/ 1,045.00"), None),
            product_html("Alcohol Gel 1L", Some("S/ 15.90"), Some("Family Doctor")),
        ]),
    );

    let mut engine = engine(&ctx, "Wong", &[SALUD], renderer);
    let report = engine.run().await;

    assert!(report.is_success(), "{:?}", report.error);
    assert_eq!(report.categories.len(), 1);
    let category = &report.categories[0];
    assert_eq!(category.result, CategoryResult::Completed);
    assert!(category.logged);
    assert_eq!(
        category.stats,
        CategoryStats {
            found: 3,
            created: 2,
            duplicate: 1,
            errors: 0
        }
    );

    assert_eq!(engine.state(), EngineState::Closed);
    assert!(calls.closed.load(Ordering::SeqCst));

    assert_eq!(ctx.catalog().count_products().await.unwrap(), 3);
    let vitamin = ctx
        .catalog()
        .find_product("Vitamina C 1g", None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(vitamin.category.as_deref(), Some("Salud"));
    assert_eq!(
        vitamin.image_url.as_deref(),
        Some("https://www.wong.pe/img/vitamina-c-1g.jpg")
    );
    let history = ctx.catalog().price_history(vitamin.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].price, 1045.0);
    assert_eq!(history[0].url, "https://www.wong.pe/vitamina-c-1g/p");

    let entries = ctx.run_log().recent(Some(wong.id), 10).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].category, "Salud");
    assert!(entries[0].category_id.is_some());
    assert_eq!(entries[0].stats, category.stats);
    assert_eq!(entries[0].outcome, CategoryOutcome::Completed);
}

#[tokio::test]
async fn rerun_on_same_day_only_reports_duplicates() {
    let (ctx, _dir) = setup().await;
    let html = listing(&[
        product_html("Shampoo Anticaspa", Some("S/ 18.00"), Some("H&S")),
        product_html("Jabón Líquido", Some("S/ 9.90"), None),
    ]);

    let calls = RenderCalls::default();
    let first = engine(
        &ctx,
        "Wong",
        &[CUIDADO],
        FakeRenderer::new(&calls).page(CUIDADO, html.clone()),
    )
    .run()
    .await;
    let second = engine(
        &ctx,
        "Wong",
        &[CUIDADO],
        FakeRenderer::new(&calls).page(CUIDADO, html),
    )
    .run()
    .await;

    assert_eq!(first.totals().created, 2);
    assert_eq!(second.totals().created, 0);
    assert_eq!(second.totals().duplicate, 2);
    assert_eq!(ctx.catalog().count_products().await.unwrap(), 2);
    assert_eq!(ctx.run_log().count().await.unwrap(), 2);
}

#[tokio::test]
async fn failed_fetch_only_skips_its_category() {
    let (ctx, _dir) = setup().await;
    let calls = RenderCalls::default();
    // no page for SALUD: every navigation fails
    let renderer = FakeRenderer::new(&calls).page(
        CUIDADO,
        listing(&[product_html("Crema Corporal", Some("S/ 22.00"), None)]),
    );

    let mut engine = engine(&ctx, "Wong", &[SALUD, CUIDADO], renderer);
    let report = engine.run().await;

    assert!(report.is_success());
    assert_eq!(report.categories.len(), 2);
    assert!(matches!(
        report.categories[0].result,
        CategoryResult::FetchFailed(_)
    ));
    assert!(!report.categories[0].logged);
    assert_eq!(report.categories[1].result, CategoryResult::Completed);
    assert_eq!(report.categories[1].stats.created, 1);

    assert_eq!(calls.navigations_to(&format!("{BASE_URL}/{SALUD}")), 3);
    assert!(calls.closed.load(Ordering::SeqCst));
    assert_eq!(engine.state(), EngineState::Closed);
    assert_eq!(ctx.run_log().count().await.unwrap(), 1);
}

#[tokio::test]
async fn container_without_price_counts_one_error() {
    let (ctx, _dir) = setup().await;
    let calls = RenderCalls::default();
    let renderer = FakeRenderer::new(&calls).page(
        SALUD,
        listing(&[
            product_html("Ibuprofeno 400mg", Some("S/ 7.50"), None),
            product_html("Termómetro Digital", None, None),
        ]),
    );

    let report = engine(&ctx, "Wong", &[SALUD], renderer).run().await;

    assert_eq!(
        report.categories[0].stats,
        CategoryStats {
            found: 2,
            created: 1,
            duplicate: 0,
            errors: 1
        }
    );
    assert!(ctx
        .catalog()
        .find_product("Termómetro Digital", None)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn unknown_source_fails_before_the_browser_starts() {
    let (ctx, _dir) = setup().await;
    let calls = RenderCalls::default();
    let renderer = FakeRenderer::new(&calls).page(SALUD, listing(&[]));

    let mut engine = engine(&ctx, "Tottus", &[SALUD], renderer);
    let report = engine.run().await;

    let error = report.error.clone().unwrap();
    assert!(error.contains("Tottus"), "{error}");
    assert!(report.categories.is_empty());
    assert!(!calls.launched.load(Ordering::SeqCst));
    assert!(calls.closed.load(Ordering::SeqCst));
    assert_eq!(engine.state(), EngineState::Closed);
    assert_eq!(ctx.run_log().count().await.unwrap(), 0);
}

#[tokio::test]
async fn browser_launch_failure_ends_the_run_cleanly() {
    let (ctx, _dir) = setup().await;
    let calls = RenderCalls::default();
    let mut renderer = FakeRenderer::new(&calls).page(SALUD, listing(&[]));
    renderer.fail_launch = true;

    let report = engine(&ctx, "Wong", &[SALUD], renderer).run().await;

    assert!(report.error.unwrap().contains("browser unavailable"));
    assert!(report.categories.is_empty());
    assert!(calls.closed.load(Ordering::SeqCst));
    assert!(calls.navigations.lock().unwrap().is_empty());
}

#[tokio::test]
async fn storage_failure_aborts_the_category_but_not_the_run() {
    let (ctx, _dir) = setup().await;
    {
        let mut conn = ctx.pool().get().await.unwrap();
        conn.batch_execute(
            "CREATE TRIGGER reject_expensive BEFORE INSERT ON price_snapshots
             WHEN NEW.price > 1000
             BEGIN SELECT RAISE(ABORT, 'price rejected'); END;",
        )
        .await
        .unwrap();
    }

    let calls = RenderCalls::default();
    let renderer = FakeRenderer::new(&calls)
        .page(
            SALUD,
            listing(&[
                product_html("Tensiómetro", Some("S/ 120.00"), None),
                product_html("Nebulizador", Some("S/ 1,500.00"), None),
                product_html("Oxímetro", Some("S/ 80.00"), None),
            ]),
        )
        .page(
            CUIDADO,
            listing(&[product_html("Desodorante", Some("S/ 11.00"), None)]),
        );

    let report = engine(&ctx, "Wong", &[SALUD, CUIDADO], renderer).run().await;

    assert!(report.is_success());
    let salud = &report.categories[0];
    assert!(matches!(salud.result, CategoryResult::Aborted(_)));
    assert_eq!(salud.stats.found, 3);
    // the batch stops at the failing record
    assert_eq!(salud.stats.created, 1);
    assert!(salud.logged);
    assert_eq!(report.categories[1].result, CategoryResult::Completed);

    let entries = ctx.run_log().recent(None, 10).await.unwrap();
    assert_eq!(entries.len(), 2);
    let aborted = entries.iter().find(|e| e.category == "Salud").unwrap();
    assert_eq!(aborted.outcome, CategoryOutcome::Aborted);
}

#[tokio::test]
async fn run_log_write_failure_does_not_stop_the_run() {
    let (ctx, _dir) = setup().await;
    {
        let mut conn = ctx.pool().get().await.unwrap();
        conn.batch_execute(
            "CREATE TRIGGER reject_run_log BEFORE INSERT ON run_log
             BEGIN SELECT RAISE(ABORT, 'run log unavailable'); END;",
        )
        .await
        .unwrap();
    }

    let calls = RenderCalls::default();
    let renderer = FakeRenderer::new(&calls)
        .page(
            SALUD,
            listing(&[product_html("Alcohol 70°", Some("S/ 6.50"), None)]),
        )
        .page(
            CUIDADO,
            listing(&[product_html("Hilo Dental", Some("S/ 8.20"), None)]),
        );

    let mut engine = engine(&ctx, "Wong", &[SALUD, CUIDADO], renderer);
    let report = engine.run().await;

    assert!(report.is_success(), "{:?}", report.error);
    assert_eq!(report.categories.len(), 2);
    for category in &report.categories {
        assert_eq!(category.result, CategoryResult::Completed);
        assert!(!category.logged);
        assert_eq!(category.stats.created, 1);
    }
    assert_eq!(engine.state(), EngineState::Closed);
    assert_eq!(ctx.catalog().count_products().await.unwrap(), 2);
    assert_eq!(ctx.run_log().count().await.unwrap(), 0);
}
