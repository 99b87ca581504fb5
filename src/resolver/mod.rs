//! Lazy media resolution: one browser session per request, extraction,
//! and typed failure reporting.

/// Error types for sessions and resolution
pub mod error;
/// Pure markup-to-descriptor extraction
pub mod extract;
/// Browser session driver
pub mod session;

pub use error::{ResolveError, SessionError};
pub use extract::MediaDescriptor;
pub use session::{BrowserSettings, ChromeDriver, SessionDriver};

use crate::config::MirrorConfig;
use std::sync::Arc;
use tracing::{debug, warn};

/// Fully rendered page markup captured at the end of a session.
#[derive(Debug, Clone)]
pub struct RenderedMarkup {
    /// The rendered document
    pub html: String,
}

/// Turns a user-supplied link into a [`MediaDescriptor`].
///
/// Each call opens exactly one fresh session; resolutions are independent
/// and stateless with respect to prior ones — no caching, no retries.
pub struct MediaResolver {
    driver: Arc<dyn SessionDriver>,
    mirror: MirrorConfig,
}

impl MediaResolver {
    /// Create a resolver over a session driver for one mirror service.
    #[must_use]
    pub fn new(driver: Arc<dyn SessionDriver>, mirror: MirrorConfig) -> Self {
        Self { driver, mirror }
    }

    /// Resolve a link to a media descriptor.
    ///
    /// A session that renders a page without a video URL is still a
    /// failed resolution: the mirror found nothing for this link.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] with the failing step name, or with
    /// `"no-video-found"` when the page loaded but exposed no media URL.
    pub async fn resolve(&self, link: &str) -> Result<MediaDescriptor, ResolveError> {
        debug!(link, mirror = self.mirror.id, "starting resolution session");

        let markup = self.driver.open(link).await.map_err(|e| {
            warn!(link, error = %e, "resolution session failed");
            ResolveError::from(e)
        })?;

        let descriptor = extract::extract(&markup.html, &self.mirror);
        if descriptor.video_url.is_none() {
            warn!(link, "page rendered but exposed no video URL");
            return Err(ResolveError::new("no-video-found"));
        }

        debug!(
            link,
            title = descriptor.title.as_deref().unwrap_or_default(),
            "resolved media descriptor"
        );
        Ok(descriptor)
    }
}
