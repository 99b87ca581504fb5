//! End-to-end pipeline tests over the public library API: rendered markup
//! in, delivered media out, with the browser and the chat platform stubbed.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use teloxide::types::ChatId;
use tiktok_relay_bot::bot::delivery::{
    DeliveryAdapter, DeliveryContext, DeliveryOutcome, MediaSink,
};
use tiktok_relay_bot::config::{MirrorRegistry, Settings};
use tiktok_relay_bot::resolver::{
    MediaResolver, RenderedMarkup, SessionDriver, SessionError,
};
use tiktok_relay_bot::utils;
use uuid::Uuid;

fn test_settings() -> Settings {
    Settings {
        telegram_token: "dummy".to_string(),
        mirror_base_url: None,
        headless: true,
        chrome_path: None,
        navigation_timeout_secs: 30,
        submission_timeout_secs: 60,
        download_dir: std::env::temp_dir().join(format!("relay-it-{}", Uuid::new_v4().simple())),
        screenshot_path: PathBuf::from("diagnostics/last_failure.png"),
    }
}

/// Driver that returns canned markup instead of driving a browser.
struct CannedDriver {
    markup: String,
    opened: AtomicUsize,
}

impl CannedDriver {
    fn new(markup: &str) -> Self {
        Self {
            markup: markup.to_string(),
            opened: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SessionDriver for CannedDriver {
    async fn open(&self, _link: &str) -> Result<RenderedMarkup, SessionError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(RenderedMarkup {
            html: self.markup.clone(),
        })
    }
}

/// Sink recording every outbound operation.
#[derive(Default)]
struct RecordingSink {
    remote_sends: Mutex<Vec<(ChatId, String, String)>>,
    file_uploads: Mutex<Vec<(String, PathBuf)>>,
}

#[async_trait]
impl MediaSink for RecordingSink {
    async fn send_remote_video(
        &self,
        chat_id: ChatId,
        video_url: &str,
        caption: &str,
    ) -> anyhow::Result<()> {
        self.remote_sends.lock().expect("sends lock").push((
            chat_id,
            video_url.to_string(),
            caption.to_string(),
        ));
        Ok(())
    }

    async fn replace_with_video_file(
        &self,
        inline_message_id: &str,
        path: &Path,
    ) -> anyhow::Result<()> {
        assert!(path.exists(), "artifact must exist during upload");
        self.file_uploads
            .lock()
            .expect("uploads lock")
            .push((inline_message_id.to_string(), path.to_path_buf()));
        Ok(())
    }
}

const RENDERED_SUCCESS_PAGE: &str = r#"
<html><body>
  <div class="profile">
    <img class="user avatar" alt="Jane" src="https://cdn.example/jane.jpg">
  </div>
  <div class="results">
    <a class="btn success" href="/video/abc?mime_type=video_mp4">Download</a>
  </div>
</body></html>
"#;

#[tokio::test]
async fn direct_reply_pipeline_references_remote_url() {
    let settings = test_settings();
    let registry = MirrorRegistry::from_settings(&settings);
    let mirror = registry.default_mirror().clone();

    let driver = Arc::new(CannedDriver::new(RENDERED_SUCCESS_PAGE));
    let resolver = MediaResolver::new(driver.clone(), mirror);
    let sink = Arc::new(RecordingSink::default());
    let delivery = DeliveryAdapter::new(sink.clone(), settings.download_dir.clone());

    let descriptor = resolver
        .resolve("https://vm.tiktok.com/ZMdRSxBL7/")
        .await
        .expect("resolution should succeed");

    // Relative success href resolved against the mirror base and decoded
    assert_eq!(
        descriptor.video_url.as_deref(),
        Some("https://snaptik.app/video/abc?mime_type=video_mp4")
    );
    assert_eq!(descriptor.title.as_deref(), Some("Jane"));
    assert_eq!(
        descriptor.thumbnail_url.as_deref(),
        Some("https://cdn.example/jane.jpg")
    );
    assert_eq!(descriptor.mime_type.as_deref(), Some("video/mp4"));

    let outcome = delivery
        .deliver(&descriptor, &DeliveryContext::DirectReply { chat_id: ChatId(7) })
        .await;
    assert_eq!(outcome, DeliveryOutcome::Delivered);

    let sends = sink.remote_sends.lock().expect("sends lock");
    assert_eq!(sends.len(), 1);
    let (chat_id, url, caption) = &sends[0];
    assert_eq!(*chat_id, ChatId(7));
    assert_eq!(url, "https://snaptik.app/video/abc?mime_type=video_mp4");
    assert_eq!(caption, "Jane");
    // The remote reference needs no local artifact
    assert!(sink.file_uploads.lock().expect("uploads lock").is_empty());
    assert_eq!(driver.opened.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn repeated_resolutions_stay_independent() {
    let settings = test_settings();
    let registry = MirrorRegistry::from_settings(&settings);
    let driver = Arc::new(CannedDriver::new(RENDERED_SUCCESS_PAGE));
    let resolver = MediaResolver::new(driver.clone(), registry.default_mirror().clone());

    for _ in 0..3 {
        resolver
            .resolve("https://vm.tiktok.com/same-link/")
            .await
            .expect("each resolution should succeed");
    }
    // No caching across requests: every resolve opens its own session
    assert_eq!(driver.opened.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn missing_video_collapses_to_failed_resolution() {
    let settings = test_settings();
    let registry = MirrorRegistry::from_settings(&settings);
    let driver = Arc::new(CannedDriver::new(
        "<html><body><p>Nothing matched.</p></body></html>",
    ));
    let resolver = MediaResolver::new(driver, registry.default_mirror().clone());

    let err = resolver
        .resolve("https://vm.tiktok.com/removed/")
        .await
        .expect_err("page without a success link must fail");
    assert_eq!(err.reason, "no-video-found");
}

#[tokio::test]
async fn session_timeouts_carry_their_step_name() {
    struct SlowSubmission;

    #[async_trait]
    impl SessionDriver for SlowSubmission {
        async fn open(&self, _link: &str) -> Result<RenderedMarkup, SessionError> {
            Err(SessionError::SubmissionTimeout)
        }
    }

    let settings = test_settings();
    let registry = MirrorRegistry::from_settings(&settings);
    let resolver = MediaResolver::new(Arc::new(SlowSubmission), registry.default_mirror().clone());

    let err = resolver
        .resolve("https://vm.tiktok.com/slow/")
        .await
        .expect_err("timeout must surface as a failed resolution");
    assert_eq!(err.reason, "SubmissionTimeout");
    assert_eq!(err.to_string(), "resolution failed: SubmissionTimeout");
}

#[test]
fn suggestion_ids_correlate_phase_one_and_two() {
    // Phase 1 mints the id from the query text; phase 2 recomputes it from
    // the chosen event's query and drops the event on mismatch.
    let link = "https://vm.tiktok.com/ZMdRSxBL7/";
    let minted = utils::fingerprint(link);
    assert_eq!(minted, utils::fingerprint(link));
    assert_eq!(minted.len(), 32);
    assert!(minted.chars().all(|c| c.is_ascii_hexdigit()));
    assert_ne!(minted, utils::fingerprint("https://vm.tiktok.com/other/"));
}
