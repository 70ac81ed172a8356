//! Headless Chrome session for JavaScript-rendered catalog pages.
//!
//! Uses chromiumoxide (CDP). Product grids on the supported stores are
//! rendered client-side and sit behind bot detection, so the session masks
//! the usual automation fingerprints before any site script runs.

mod config;
mod stealth;

pub use config::{BrowserEngineConfig, DEFAULT_USER_AGENT};
pub use stealth::{STEALTH_ARGS, STEALTH_SCRIPTS};

#[cfg(feature = "browser")]
use std::path::PathBuf;
#[cfg(feature = "browser")]
use std::time::Duration;

#[cfg(feature = "browser")]
use anyhow::Context;
use anyhow::Result;
use async_trait::async_trait;
#[cfg(feature = "browser")]
use tokio::task::JoinHandle;
#[cfg(feature = "browser")]
use tracing::{debug, info, warn};

#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, NavigateParams,
};
#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig, Page};
#[cfg(feature = "browser")]
use futures::StreamExt;

use crate::fetch::PageRenderer;

/// A browser plus the single working page a run navigates.
#[cfg(feature = "browser")]
pub struct BrowserSession {
    config: BrowserEngineConfig,
    browser: Option<Browser>,
    page: Option<Page>,
    handler: Option<JoinHandle<()>>,
    remote: bool,
}

#[cfg(feature = "browser")]
impl BrowserSession {
    /// Well-known install locations, checked before `PATH`.
    const CHROME_PATHS: &'static [&'static str] = &[
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        "/opt/google/chrome/google-chrome",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
    ];

    const CHROME_COMMANDS: &'static [&'static str] = &[
        "google-chrome",
        "google-chrome-stable",
        "chromium",
        "chromium-browser",
    ];

    const READY_STATE_SCRIPT: &'static str = r#"
        new Promise((resolve) => {
            if (document.readyState === 'complete' || document.readyState === 'interactive') {
                resolve(document.readyState);
            } else {
                document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
                setTimeout(() => resolve('timeout'), 10000);
            }
        })
    "#;

    pub fn new(config: BrowserEngineConfig) -> Self {
        Self {
            config,
            browser: None,
            page: None,
            handler: None,
            remote: false,
        }
    }

    fn find_chrome(&self) -> Result<PathBuf> {
        if let Some(path) = &self.config.chrome_path {
            if path.exists() {
                return Ok(path.clone());
            }
            warn!(path = %path.display(), "browser.chrome_path does not exist, searching");
        }

        let found = Self::CHROME_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
            .or_else(|| Self::CHROME_COMMANDS.iter().find_map(|cmd| lookup_in_path(cmd)));

        match found {
            Some(path) => {
                debug!(path = %path.display(), "Using Chrome executable");
                Ok(path)
            }
            None => anyhow::bail!(
                "no Chrome or Chromium executable found; set browser.chrome_path \
                 or BROWSER_URL for a remote browser"
            ),
        }
    }

    async fn launch_local(&mut self) -> Result<()> {
        let chrome_path = self.find_chrome()?;
        info!(headless = self.config.headless, "Launching local browser");

        let proxy_arg = self
            .config
            .proxy
            .as_ref()
            .map(|proxy| format!("--proxy-server={proxy}"));
        let stealth_args: &[&str] = if self.config.stealth { STEALTH_ARGS } else { &[] };

        let mut builder = BrowserConfig::builder().chrome_executable(chrome_path);
        if !self.config.headless {
            builder = builder.with_head();
        }
        let builder = stealth_args
            .iter()
            .map(|arg| arg.to_string())
            .chain(proxy_arg)
            .chain(self.config.chrome_args.iter().cloned())
            .fold(builder, |builder, arg| builder.arg(arg));

        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("invalid browser configuration: {e}"))?;
        let (browser, handler) = Browser::launch(config)
            .await
            .context("browser process failed to start")?;

        self.handler = Some(drive_handler(handler));
        self.browser = Some(browser);
        self.remote = false;
        Ok(())
    }

    async fn connect_remote(&mut self, url: &str) -> Result<()> {
        let ws_url = devtools_socket_url(url).await?;
        info!(endpoint = url, "Attaching to remote browser");

        let handler_config = chromiumoxide::handler::HandlerConfig {
            request_timeout: Duration::from_secs(self.config.timeout),
            ..Default::default()
        };
        let (browser, handler) = Browser::connect_with_config(ws_url.as_str(), handler_config)
            .await
            .with_context(|| format!("cannot attach to browser at {ws_url}"))?;

        self.handler = Some(drive_handler(handler));
        self.browser = Some(browser);
        self.remote = true;
        Ok(())
    }

    async fn open_page(&mut self) -> Result<()> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Browser not launched"))?;
        let page = browser.new_page("about:blank").await?;

        // before any navigation
        page.execute(SetUserAgentOverrideParams::new(self.config.user_agent.clone()))
            .await?;

        if self.config.stealth {
            debug!("Registering {} stealth scripts", STEALTH_SCRIPTS.len());
            for script in STEALTH_SCRIPTS {
                page.execute(AddScriptToEvaluateOnNewDocumentParams::new(
                    script.to_string(),
                ))
                .await
                .context("Failed to register stealth script")?;
            }
        }

        self.page = Some(page);
        Ok(())
    }

    fn page(&self) -> Result<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Browser session not launched"))
    }
}

/// Poll CDP events until the connection drops.
#[cfg(feature = "browser")]
fn drive_handler(mut handler: chromiumoxide::Handler) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if event.is_err() {
                break;
            }
        }
    })
}

/// Resolve the browser WebSocket from a DevTools HTTP or WS endpoint.
#[cfg(feature = "browser")]
async fn devtools_socket_url(endpoint: &str) -> Result<String> {
    let base = endpoint
        .replacen("ws://", "http://", 1)
        .replacen("wss://", "https://", 1);
    let version_url = format!("{}/json/version", base.trim_end_matches('/'));

    let version: serde_json::Value = reqwest::get(&version_url)
        .await
        .and_then(|resp| resp.error_for_status())
        .with_context(|| format!("DevTools endpoint {version_url} unreachable"))?
        .json()
        .await
        .context("DevTools version response is not JSON")?;

    version["webSocketDebuggerUrl"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("{version_url} has no webSocketDebuggerUrl"))
}

#[cfg(feature = "browser")]
fn lookup_in_path(command: &str) -> Option<PathBuf> {
    let output = std::process::Command::new("which").arg(command).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!path.is_empty()).then(|| PathBuf::from(path))
}

#[cfg(feature = "browser")]
#[async_trait]
impl PageRenderer for BrowserSession {
    async fn launch(&mut self) -> Result<()> {
        if self.page.is_some() {
            return Ok(());
        }

        if let Some(remote_url) = self.config.remote_url.clone() {
            self.connect_remote(&remote_url).await?;
        } else {
            self.launch_local().await?;
        }

        if let Err(e) = self.open_page().await {
            self.close().await;
            return Err(e);
        }
        Ok(())
    }

    async fn navigate(&mut self, url: &str) -> Result<()> {
        let page = self.page()?;
        info!("Navigating to {}", url);

        let nav_params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(|e| anyhow::anyhow!("Invalid URL: {}", e))?;
        page.execute(nav_params).await?;

        let ready_timeout = Duration::from_secs(self.config.timeout);
        match tokio::time::timeout(
            ready_timeout,
            page.evaluate(Self::READY_STATE_SCRIPT.to_string()),
        )
        .await
        {
            Ok(Ok(result)) => {
                let state: String = result
                    .into_value()
                    .unwrap_or_else(|_| "unknown".to_string());
                debug!("Page ready state: {}", state);
            }
            Ok(Err(e)) => debug!("Could not check ready state: {}", e),
            Err(_) => warn!("Timeout waiting for page ready state"),
        }

        Ok(())
    }

    async fn scroll_by_fraction(&mut self, fraction: f64) -> Result<()> {
        let script = format!(
            "window.scrollTo(0, document.body.scrollHeight * {})",
            fraction
        );
        self.page()?.evaluate(script).await?;
        Ok(())
    }

    async fn content(&mut self) -> Result<String> {
        let content = self.page()?.content().await?;
        if content.contains("Access Denied") {
            warn!("Page may be blocked (contains 'Access Denied')");
        }
        Ok(content)
    }

    async fn close(&mut self) {
        if let Some(page) = self.page.take() {
            let _ = page.close().await;
        }

        if let Some(mut browser) = self.browser.take() {
            // a remote browser belongs to someone else
            if !self.remote {
                if let Err(e) = browser.close().await {
                    debug!("Browser close failed: {}", e);
                }
                let _ = browser.wait().await;
            }
        }

        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
    }
}

// Stub for when browser feature is disabled
#[cfg(not(feature = "browser"))]
pub struct BrowserSession {
    #[allow(dead_code)]
    config: BrowserEngineConfig,
}

#[cfg(not(feature = "browser"))]
impl BrowserSession {
    pub fn new(config: BrowserEngineConfig) -> Self {
        Self { config }
    }
}

#[cfg(not(feature = "browser"))]
fn not_compiled<T>() -> Result<T> {
    Err(anyhow::anyhow!(
        "Browser support not compiled. Rebuild with: cargo build --features browser"
    ))
}

#[cfg(not(feature = "browser"))]
#[async_trait]
impl PageRenderer for BrowserSession {
    async fn launch(&mut self) -> Result<()> {
        not_compiled()
    }

    async fn navigate(&mut self, _url: &str) -> Result<()> {
        not_compiled()
    }

    async fn scroll_by_fraction(&mut self, _fraction: f64) -> Result<()> {
        not_compiled()
    }

    async fn content(&mut self) -> Result<String> {
        not_compiled()
    }

    async fn close(&mut self) {}
}
