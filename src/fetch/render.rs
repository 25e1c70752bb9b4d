//! Headless browser transport for sites that only exist after scripts run.
//!
//! One [`RenderedSession`] is opened per site run and reused for every page
//! that run visits. The session owns the browser process and its CDP event
//! handler task; dropping it without [`RenderedSession::close`] leaks the
//! browser, so the pipeline closes it on every exit path.

use crate::config::SiteConfig;
use crate::error::ScrapeError;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// How long to poll for a DOM element before treating it as absent.
const DOM_WAIT: Duration = Duration::from_secs(10);
const POLL_INTERVAL: Duration = Duration::from_millis(250);
/// Upper bound on "load more" clicks, in case a site never exhausts.
const MAX_EXPANSIONS: usize = 50;

/// What clicking an interactive control produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    Clicked,
    /// The control is not in the DOM.
    Missing,
    /// The control is present but disabled.
    Disabled,
    /// The click itself failed, typically a stale node after a re-render.
    Failed,
}

/// A headless browser scoped to one site run.
pub struct RenderedSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl RenderedSession {
    pub async fn launch() -> Result<Self, ScrapeError> {
        let config = BrowserConfig::builder()
            .no_sandbox()
            .window_size(1366, 900)
            .build()
            .map_err(ScrapeError::Browser)?;
        let (browser, mut events) = Browser::launch(config)
            .await
            .map_err(|e| ScrapeError::Browser(format!("launch: {e}")))?;
        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(ScrapeError::Browser(format!("new page: {e}")));
            }
        };
        Ok(Self {
            browser,
            page,
            handler,
        })
    }

    /// Navigates the session's page and waits for the load to settle.
    pub async fn navigate(&self, url: &str) -> Result<(), ScrapeError> {
        self.page
            .goto(url)
            .await
            .map_err(|e| ScrapeError::Browser(format!("navigate {url}: {e}")))?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| ScrapeError::Browser(format!("settle {url}: {e}")))?;
        Ok(())
    }

    /// Polls until `css` matches something, up to `timeout`. Returns whether
    /// the element showed up.
    pub async fn wait_for(&self, css: &str, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.page.find_element(css).await.is_ok() {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Clicks the first match of `css`, reporting what actually happened
    /// instead of failing the run.
    pub async fn click(&self, css: &str) -> ClickOutcome {
        // Disabled controls match with an attribute selector, which spares
        // us a second round-trip to read attributes off the node.
        let disabled = format!("{css}[disabled]");
        if self.page.find_element(disabled.as_str()).await.is_ok() {
            return ClickOutcome::Disabled;
        }
        let element = match self.page.find_element(css).await {
            Ok(element) => element,
            Err(_) => return ClickOutcome::Missing,
        };
        match element.click().await {
            Ok(_) => ClickOutcome::Clicked,
            Err(e) => {
                debug!("click on {} failed: {}", css, e);
                ClickOutcome::Failed
            }
        }
    }

    /// Serialized DOM of the current page.
    pub async fn content(&self) -> Result<String, ScrapeError> {
        self.page
            .content()
            .await
            .map_err(|e| ScrapeError::Browser(format!("content: {e}")))
    }

    /// Fetches one rendered page body with sentinel semantics: navigation or
    /// serialization failure becomes `None`, mirroring the plain transport.
    /// A missed readiness wait is not a failure; extraction sees whatever
    /// DOM there is.
    pub async fn visit(&self, url: &str, ready: Option<&str>) -> Option<String> {
        if let Err(e) = self.navigate(url).await {
            warn!("rendered fetch of {} failed: {}", url, e);
            return None;
        }
        if let Some(css) = ready
            && !self.wait_for(css, DOM_WAIT).await
        {
            debug!("{} never showed {}, extracting current DOM", url, css);
        }
        match self.content().await {
            Ok(body) => Some(body),
            Err(e) => {
                warn!("could not read DOM of {}: {}", url, e);
                None
            }
        }
    }

    pub async fn close(self) {
        let Self {
            mut browser,
            page,
            handler,
        } = self;
        drop(page);
        if let Err(e) = browser.close().await {
            debug!("browser close: {}", e);
        }
        handler.abort();
    }
}

/// Drives an interactive listing to exhaustion: waits for the first cards,
/// then clicks "load more" until the control disappears, disables itself or
/// the click fails, and returns the fully expanded DOM.
pub async fn expand_listing(
    session: &RenderedSession,
    config: &SiteConfig,
) -> Result<String, ScrapeError> {
    let Some(load_more) = config.selectors.load_more else {
        return Err(ScrapeError::Config(format!(
            "{} uses interactive expansion but has no load_more selector",
            config.site
        )));
    };
    session.navigate(config.listing_url).await?;
    if let Some(ready) = config.selectors.listing_ready
        && !session.wait_for(ready, DOM_WAIT).await
    {
        warn!("{} listing never became ready, may yield no items", config.site);
    }
    let mut clicks = 0;
    loop {
        let outcome = session.click(load_more).await;
        if outcome == ClickOutcome::Clicked {
            clicks += 1;
        }
        if !click_again(outcome, clicks) {
            debug!(
                "{} expansion stopped after {} clicks: {:?}",
                config.site, clicks, outcome
            );
            break;
        }
        crate::fetch::pause(config.delay).await;
    }
    session.content().await
}

/// Whether the expansion loop should click once more. Only a successful
/// click earns another attempt, and never past [`MAX_EXPANSIONS`]; a
/// missing, disabled or stale control means the listing is exhausted.
fn click_again(outcome: ClickOutcome, clicks: usize) -> bool {
    outcome == ClickOutcome::Clicked && clicks < MAX_EXPANSIONS
}
