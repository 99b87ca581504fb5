//! Browser-driven resolution sessions against the mirror service.
//!
//! One isolated headless Chromium instance is launched per session, driven
//! through a fixed navigate / submit / wait protocol, and torn down on
//! every exit path. Nothing is shared between sessions.

use crate::config::{MirrorConfig, Settings};
use crate::resolver::error::SessionError;
use crate::resolver::RenderedMarkup;
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, BrowserConfig, Element, Page};
use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// Poll interval for bounded element waits
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Browser-driver options, passed in explicitly at construction.
#[derive(Debug, Clone)]
pub struct BrowserSettings {
    /// Run without a visible window
    pub headless: bool,
    /// Explicit Chrome/Chromium binary path; autodetected when unset
    pub chrome_path: Option<String>,
    /// Bound for landing-page load and input-control waits
    pub navigation_timeout: Duration,
    /// Bound for the post-submission success wait
    pub submission_timeout: Duration,
    /// Fixed diagnostic screenshot path, overwritten on each timeout
    pub screenshot_path: PathBuf,
}

impl BrowserSettings {
    /// Extract the browser-driver options from the application settings.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            headless: settings.headless,
            chrome_path: settings.chrome_path.clone(),
            navigation_timeout: Duration::from_secs(settings.navigation_timeout_secs),
            submission_timeout: Duration::from_secs(settings.submission_timeout_secs),
            screenshot_path: settings.screenshot_path.clone(),
        }
    }
}

/// One attempt to obtain rendered markup from the mirror for a link.
///
/// Implementations own the full session lifecycle; callers get either the
/// markup or a typed failure, never a half-open browser.
#[async_trait]
pub trait SessionDriver: Send + Sync {
    /// Drive one session for `link` and capture the rendered markup.
    async fn open(&self, link: &str) -> Result<RenderedMarkup, SessionError>;
}

/// [`SessionDriver`] backed by a real Chromium instance over CDP.
pub struct ChromeDriver {
    browser: BrowserSettings,
    mirror: MirrorConfig,
}

impl ChromeDriver {
    /// Create a driver for one mirror service.
    #[must_use]
    pub fn new(browser: BrowserSettings, mirror: MirrorConfig) -> Self {
        Self { browser, mirror }
    }
}

#[async_trait]
impl SessionDriver for ChromeDriver {
    async fn open(&self, link: &str) -> Result<RenderedMarkup, SessionError> {
        let session = ResolutionSession::launch(&self.browser).await?;
        let result = session.run_protocol(&self.mirror, link, &self.browser).await;

        if let Err(err) = &result {
            if err.is_timeout() {
                session.capture_diagnostics(&self.browser.screenshot_path).await;
            }
        }

        // Teardown runs on success and failure alike
        session.teardown().await;
        result
    }
}

/// A live browser instance plus its CDP event pump.
struct ResolutionSession {
    browser: Browser,
    page: Page,
    events: JoinHandle<()>,
}

impl ResolutionSession {
    /// Launch an isolated browser instance and open a blank page.
    async fn launch(settings: &BrowserSettings) -> Result<Self, SessionError> {
        let mut builder = BrowserConfig::builder();
        if !settings.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &settings.chrome_path {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(SessionError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| SessionError::Launch(e.to_string()))?;

        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                events.abort();
                return Err(SessionError::Launch(e.to_string()));
            }
        };

        Ok(Self {
            browser,
            page,
            events,
        })
    }

    /// The fixed navigation/submission/wait protocol, strictly sequential.
    async fn run_protocol(
        &self,
        mirror: &MirrorConfig,
        link: &str,
        settings: &BrowserSettings,
    ) -> Result<RenderedMarkup, SessionError> {
        debug!(mirror = mirror.id, "navigating to mirror landing page");
        timeout(settings.navigation_timeout, self.page.goto(&mirror.base_url))
            .await
            .map_err(|_| SessionError::NavigationTimeout)??;

        let input = self
            .wait_for_element(&mirror.input_selector, settings.navigation_timeout)
            .await
            .ok_or(SessionError::NavigationTimeout)?;
        input.click().await?;
        input.type_str(link).await?;
        self.page
            .find_element(mirror.submit_selector.as_str())
            .await?
            .click()
            .await?;
        debug!(mirror = mirror.id, "submitted link, waiting for success element");

        let success_selector = format!("a[class*=\"{}\"]", mirror.success_marker);
        self.wait_for_element(&success_selector, settings.submission_timeout)
            .await
            .ok_or(SessionError::SubmissionTimeout)?;

        let html = self.page.content().await?;
        Ok(RenderedMarkup { html })
    }

    /// Poll for an element until it exists or the bound expires.
    async fn wait_for_element(&self, selector: &str, bound: Duration) -> Option<Element> {
        timeout(bound, async {
            loop {
                if let Ok(element) = self.page.find_element(selector).await {
                    return element;
                }
                sleep(WAIT_POLL_INTERVAL).await;
            }
        })
        .await
        .ok()
    }

    /// Write the diagnostic screenshot to the fixed path, best effort.
    async fn capture_diagnostics(&self, path: &Path) {
        prepare_diagnostics_target(path).await;
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();
        match self.page.save_screenshot(params, path).await {
            Ok(_) => info!(path = %path.display(), "wrote diagnostic screenshot"),
            Err(e) => warn!(error = %e, "failed to capture diagnostic screenshot"),
        }
    }

    /// Release the browser instance and stop the event pump.
    async fn teardown(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "browser did not close cleanly");
        }
        self.events.abort();
    }
}

/// Make the fixed screenshot path writable: the parent directory must
/// exist, and a previous capture at the same path is simply overwritten.
async fn prepare_diagnostics_target(path: &Path) {
    if let Some(dir) = path.parent() {
        let _ = tokio::fs::create_dir_all(dir).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_diagnostics_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("relay-diag-{}", Uuid::new_v4().simple()))
            .join("diagnostics")
            .join("last_failure.png")
    }

    #[tokio::test]
    async fn test_prepare_diagnostics_creates_nested_parent() {
        let path = temp_diagnostics_path();
        assert!(!path.parent().expect("parent").exists());

        prepare_diagnostics_target(&path).await;
        assert!(path.parent().expect("parent").exists());
        tokio::fs::write(&path, b"first capture")
            .await
            .expect("write capture");
    }

    #[tokio::test]
    async fn test_diagnostics_path_is_fixed_and_overwritten() {
        let path = temp_diagnostics_path();
        prepare_diagnostics_target(&path).await;
        tokio::fs::write(&path, b"first capture")
            .await
            .expect("write first capture");

        // A later failure reuses the same path; the old capture is replaced
        prepare_diagnostics_target(&path).await;
        tokio::fs::write(&path, b"second capture")
            .await
            .expect("write second capture");

        let contents = tokio::fs::read(&path).await.expect("read capture");
        assert_eq!(contents, b"second capture");
        let siblings = std::fs::read_dir(path.parent().expect("parent"))
            .expect("read diagnostics dir")
            .count();
        assert_eq!(siblings, 1);
    }

    #[tokio::test]
    async fn test_only_timeouts_trigger_a_capture() {
        // ChromeDriver::open captures exactly when the session error is a
        // wait-bound expiry
        assert!(SessionError::NavigationTimeout.is_timeout());
        assert!(SessionError::SubmissionTimeout.is_timeout());
        assert!(!SessionError::Launch("no chrome binary".into()).is_timeout());
        assert!(!SessionError::Browser("tab crashed".into()).is_timeout());
    }
}
