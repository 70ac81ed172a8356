//! Rendered page loading with retry.
//!
//! [`PageFetcher`] sequences one load attempt as navigate, settle, half-page
//! scroll, settle again, snapshot. The browser itself sits behind
//! [`PageRenderer`] so runs can be driven by a real Chrome session or by a
//! canned renderer in tests.

mod retry;

pub use retry::{RecordingSleeper, RetryPolicy, Sleeper, TokioSleeper};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use scraper::Html;
use thiserror::Error;
use tracing::{debug, info, warn};

/// A JavaScript-capable page session.
#[async_trait]
pub trait PageRenderer: Send {
    /// Start (or connect to) the browser and open the working page.
    async fn launch(&mut self) -> anyhow::Result<()>;

    /// Navigate the working page to `url`.
    async fn navigate(&mut self, url: &str) -> anyhow::Result<()>;

    /// Scroll to `fraction` of the document height.
    async fn scroll_by_fraction(&mut self, fraction: f64) -> anyhow::Result<()>;

    /// Serialized HTML of the current document.
    async fn content(&mut self) -> anyhow::Result<String>;

    /// Release the browser. Safe to call more than once.
    async fn close(&mut self);
}

/// Post-navigation waits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadTiming {
    /// Wait after navigation for dynamic content.
    pub settle_delay: Duration,
    /// How far down to scroll to trigger lazy loading.
    pub scroll_fraction: f64,
    /// Wait after scrolling.
    pub scroll_settle_delay: Duration,
}

impl Default for LoadTiming {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(8),
            scroll_fraction: 0.5,
            scroll_settle_delay: Duration::from_secs(2),
        }
    }
}

/// A rendered HTML snapshot.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub url: String,
    pub html: String,
}

impl RenderedDocument {
    pub fn parse(&self) -> Html {
        Html::parse_document(&self.html)
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to load {url} after {attempts} attempts: {last_error}")]
    Exhausted {
        url: String,
        attempts: u32,
        last_error: String,
    },
}

/// Loads pages through a [`PageRenderer`] with bounded retries.
pub struct PageFetcher<R: PageRenderer> {
    renderer: R,
    policy: RetryPolicy,
    timing: LoadTiming,
    sleeper: Arc<dyn Sleeper>,
}

impl<R: PageRenderer> PageFetcher<R> {
    pub fn new(renderer: R, policy: RetryPolicy, timing: LoadTiming) -> Self {
        Self {
            renderer,
            policy,
            timing,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Replace the sleeper used for settle waits and backoff.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Start the browser session.
    pub async fn launch(&mut self) -> anyhow::Result<()> {
        self.renderer.launch().await
    }

    /// Load `url`, retrying failed or timed-out attempts with backoff.
    pub async fn load(&mut self, url: &str) -> Result<RenderedDocument, FetchError> {
        let attempts = self.policy.attempts();
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            debug!(url, attempt, "Loading page");
            match tokio::time::timeout(self.policy.attempt_timeout, self.attempt(url)).await {
                Ok(Ok(html)) => {
                    info!(url, bytes = html.len(), "Page loaded");
                    return Ok(RenderedDocument {
                        url: url.to_string(),
                        html,
                    });
                }
                Ok(Err(e)) => last_error = format!("{e:#}"),
                Err(_) => {
                    last_error = format!(
                        "timed out after {}s",
                        self.policy.attempt_timeout.as_secs_f64()
                    )
                }
            }

            if attempt < attempts {
                let delay = self.policy.delay_before_retry(attempt);
                warn!(
                    url,
                    attempt,
                    error = %last_error,
                    "Load failed, retrying in {:?}",
                    delay
                );
                self.sleeper.sleep(delay).await;
            }
        }

        Err(FetchError::Exhausted {
            url: url.to_string(),
            attempts,
            last_error,
        })
    }

    async fn attempt(&mut self, url: &str) -> anyhow::Result<String> {
        self.renderer.navigate(url).await?;
        self.sleeper.sleep(self.timing.settle_delay).await;
        self.renderer
            .scroll_by_fraction(self.timing.scroll_fraction)
            .await?;
        self.sleeper.sleep(self.timing.scroll_settle_delay).await;
        self.renderer.content().await
    }

    /// Release the browser session.
    pub async fn close(&mut self) {
        self.renderer.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    /// Fails the first `failures` navigations, then serves `html`.
    struct FlakyRenderer {
        failures: u32,
        navigations: u32,
        scrolls: Vec<f64>,
        html: String,
    }

    impl FlakyRenderer {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                navigations: 0,
                scrolls: Vec::new(),
                html: "<html><body>ok</body></html>".to_string(),
            }
        }
    }

    #[async_trait]
    impl PageRenderer for FlakyRenderer {
        async fn launch(&mut self) -> anyhow::Result<()> {
            Ok(())
        }

        async fn navigate(&mut self, _url: &str) -> anyhow::Result<()> {
            self.navigations += 1;
            if self.navigations <= self.failures {
                return Err(anyhow!("net::ERR_CONNECTION_RESET"));
            }
            Ok(())
        }

        async fn scroll_by_fraction(&mut self, fraction: f64) -> anyhow::Result<()> {
            self.scrolls.push(fraction);
            Ok(())
        }

        async fn content(&mut self) -> anyhow::Result<String> {
            Ok(self.html.clone())
        }

        async fn close(&mut self) {}
    }

    fn fetcher(renderer: FlakyRenderer, max_attempts: u32) -> (PageFetcher<FlakyRenderer>, Arc<RecordingSleeper>) {
        let sleeper = Arc::new(RecordingSleeper::new());
        let policy = RetryPolicy {
            max_attempts,
            ..Default::default()
        };
        let fetcher = PageFetcher::new(renderer, policy, LoadTiming::default())
            .with_sleeper(sleeper.clone());
        (fetcher, sleeper)
    }

    #[tokio::test]
    async fn test_exhausts_exactly_max_attempts() {
        let (mut fetcher, sleeper) = fetcher(FlakyRenderer::new(u32::MAX), 3);

        let err = fetcher.load("https://www.wong.pe/salud").await.unwrap_err();

        assert_eq!(fetcher.renderer().navigations, 3);
        assert!(matches!(err, FetchError::Exhausted { attempts: 3, .. }));
        assert_eq!(
            sleeper.delays(),
            vec![Duration::from_secs(2), Duration::from_secs(4)]
        );
    }

    #[tokio::test]
    async fn test_backoff_is_capped() {
        let (mut fetcher, sleeper) = fetcher(FlakyRenderer::new(u32::MAX), 5);

        assert!(fetcher.load("https://www.wong.pe/salud").await.is_err());

        let secs: Vec<u64> = sleeper.delays().iter().map(|d| d.as_secs()).collect();
        assert_eq!(secs, vec![2, 4, 8, 10]);
    }

    #[tokio::test]
    async fn test_recovers_on_second_attempt() {
        let (mut fetcher, sleeper) = fetcher(FlakyRenderer::new(1), 3);

        let doc = fetcher.load("https://www.wong.pe/salud").await.unwrap();

        assert!(doc.html.contains("ok"));
        assert_eq!(fetcher.renderer().navigations, 2);
        assert_eq!(fetcher.renderer().scrolls, vec![0.5]);
        // one backoff, then the two settle waits of the successful attempt
        let secs: Vec<u64> = sleeper.delays().iter().map(|d| d.as_secs()).collect();
        assert_eq!(secs, vec![2, 8, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_attempt_times_out() {
        struct HangingRenderer;

        #[async_trait]
        impl PageRenderer for HangingRenderer {
            async fn launch(&mut self) -> anyhow::Result<()> {
                Ok(())
            }
            async fn navigate(&mut self, _url: &str) -> anyhow::Result<()> {
                std::future::pending::<()>().await;
                Ok(())
            }
            async fn scroll_by_fraction(&mut self, _fraction: f64) -> anyhow::Result<()> {
                Ok(())
            }
            async fn content(&mut self) -> anyhow::Result<String> {
                Ok(String::new())
            }
            async fn close(&mut self) {}
        }

        let policy = RetryPolicy {
            max_attempts: 2,
            ..Default::default()
        };
        let mut fetcher = PageFetcher::new(HangingRenderer, policy, LoadTiming::default())
            .with_sleeper(Arc::new(RecordingSleeper::new()));

        match fetcher.load("https://www.metro.pe/salud").await {
            Err(FetchError::Exhausted { last_error, .. }) => {
                assert!(last_error.contains("timed out"))
            }
            Ok(_) => panic!("expected timeout"),
        }
    }
}
