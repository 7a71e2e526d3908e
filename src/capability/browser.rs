//! [`PageLoader`] that renders the candidate page in headless Chromium.
//!
//! Social platforms render their posts client-side; a plain HTTP GET of an
//! `x.com` status URL returns an empty application shell. Driving a real
//! browser over CDP gets the same text a reader would see.
//!
//! After the `load` event the loader keeps listening to CDP lifecycle
//! events until the main frame reports `networkIdle`, so client-rendered
//! posts are in the DOM before `innerText` is read. Pages that never go
//! idle (long polling) are read once the idle budget runs out.
//!
//! Every `load` launches its own browser and tears it down before
//! returning, whether navigation succeeded, failed, or timed out. No
//! rendering session outlives a single audit.

use super::{CapabilityError, LoadedPage, PageLoader};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::EventLifecycleEvent;
use futures::StreamExt;
use std::time::Duration;
use tracing::{debug, warn};

/// Script returning the rendered, human-visible text of the page.
const VISIBLE_TEXT_JS: &str = "document.body ? document.body.innerText : ''";

/// Upper bound on the post-load wait for `networkIdle`.
const NETWORK_IDLE_WAIT: Duration = Duration::from_secs(10);

/// Headless Chromium page loader.
pub struct BrowserPageLoader {
    timeout: Duration,
}

impl BrowserPageLoader {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl PageLoader for BrowserPageLoader {
    async fn load(&self, url: &str) -> Result<LoadedPage, CapabilityError> {
        let config = BrowserConfig::builder()
            .arg("--no-sandbox") // Required for containerized environments
            .arg("--disable-dev-shm-usage")
            .build()
            .map_err(|e| CapabilityError::Unavailable(format!("browser config: {e}")))?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| CapabilityError::Unavailable(format!("failed to launch Chromium: {e}")))?;

        let handle = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        let outcome = tokio::time::timeout(
            self.timeout,
            render(&browser, url, idle_budget(self.timeout)),
        )
        .await;

        // Release the session on every path before looking at the outcome.
        if let Err(e) = browser.close().await {
            warn!("Closing browser failed: {}", e);
        }
        if let Err(e) = handle.await {
            debug!("Browser handler task ended abnormally: {}", e);
        }

        match outcome {
            Ok(result) => result,
            Err(_) => Err(CapabilityError::Timeout {
                secs: self.timeout.as_secs(),
            }),
        }
    }
}

/// Share of the page timeout spent waiting for the network to go idle.
fn idle_budget(timeout: Duration) -> Duration {
    NETWORK_IDLE_WAIT.min(timeout / 2)
}

/// Navigate, wait for the network to settle, and read title and text.
async fn render(
    browser: &Browser,
    url: &str,
    idle_wait: Duration,
) -> Result<LoadedPage, CapabilityError> {
    debug!("Navigating to {}", url);
    let page = browser
        .new_page("about:blank")
        .await
        .map_err(|e| CapabilityError::Unavailable(format!("opening tab: {e}")))?;

    // Subscribe before navigating so the new document's `init` is seen.
    let mut lifecycle = page
        .event_listener::<EventLifecycleEvent>()
        .await
        .map_err(|e| CapabilityError::Failed(format!("lifecycle events: {e}")))?;

    page.goto(url)
        .await
        .map_err(|e| CapabilityError::Navigation(e.to_string()))?;

    match page.mainframe().await.ok().flatten() {
        Some(frame) => {
            let mut watch = IdleWatch::new(frame.as_ref());
            let idle = tokio::time::timeout(idle_wait, async {
                while let Some(event) = lifecycle.next().await {
                    if watch.observe(event.frame_id.as_ref(), event.loader_id.as_ref(), &event.name) {
                        return true;
                    }
                }
                false
            })
            .await
            .unwrap_or(false);
            if idle {
                debug!("Network idle on {}", url);
            } else {
                debug!(
                    "No networkIdle within {}s on {}; reading page as rendered",
                    idle_wait.as_secs(),
                    url
                );
            }
        }
        None => {
            debug!("Main frame unknown; settling for {}s", idle_wait.as_secs());
            tokio::time::sleep(idle_wait).await;
        }
    }

    let title = page
        .get_title()
        .await
        .map_err(|e| CapabilityError::Failed(format!("reading title: {e}")))?
        .unwrap_or_default();

    let visible_text: String = page
        .evaluate(VISIBLE_TEXT_JS)
        .await
        .map_err(|e| CapabilityError::Failed(format!("reading page text: {e}")))?
        .into_value()
        .map_err(|e| CapabilityError::Failed(format!("page text is not a string: {e}")))?;

    let final_url = page.url().await.ok().flatten();
    debug!(len = visible_text.len(), "Got rendered page text");

    if let Err(e) = page.close().await {
        debug!("Closing page failed: {}", e);
    }

    Ok(LoadedPage {
        title,
        visible_text,
        final_url,
    })
}

/// Tracks lifecycle events of one frame until its current document idles.
///
/// `networkIdle` counts only for the loader announced by the latest `init`
/// on that frame; idles from the blank tab or from subframes are ignored.
struct IdleWatch {
    frame: String,
    loader: Option<String>,
}

impl IdleWatch {
    fn new(frame: &str) -> Self {
        Self {
            frame: frame.to_string(),
            loader: None,
        }
    }

    /// Feed one event; true once the watched document is network-idle.
    fn observe(&mut self, frame: &str, loader: &str, name: &str) -> bool {
        if frame != self.frame {
            return false;
        }
        match name {
            "init" => {
                self.loader = Some(loader.to_string());
                false
            }
            "networkIdle" => self.loader.as_deref() == Some(loader),
            _ => false,
        }
    }
}
