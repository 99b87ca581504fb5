//! Pure extraction of media metadata from rendered mirror-service markup.
//!
//! Extraction is best-effort: every rule tolerates its element being
//! absent, and a markup blob that matches nothing simply yields an empty
//! descriptor. No I/O happens here.

use crate::config::MirrorConfig;
use lazy_regex::regex;
use url::Url;

/// Normalized, best-effort metadata extracted from rendered markup.
///
/// All fields are optional; `video_url` being unset means the mirror found
/// nothing even though the page rendered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaDescriptor {
    /// Author/title text, from the avatar element's `alt`
    pub title: Option<String>,
    /// Thumbnail image URL, from the avatar element's `src`
    pub thumbnail_url: Option<String>,
    /// Direct media URL, percent-decoded and absolute
    pub video_url: Option<String>,
    /// Fixed output format of the mirror service
    pub mime_type: Option<String>,
}

/// Extract a [`MediaDescriptor`] from rendered markup.
///
/// Rules are evaluated independently: a missing avatar does not prevent
/// the success link from being read, and vice versa.
#[must_use]
pub fn extract(markup: &str, mirror: &MirrorConfig) -> MediaDescriptor {
    let mut descriptor = MediaDescriptor::default();

    if let Some(avatar) = find_marked_tag(markup, TagKind::Img, &mirror.avatar_marker) {
        descriptor.title = attr_value(avatar, "alt").filter(|v| !v.is_empty());
        descriptor.thumbnail_url = attr_value(avatar, "src").filter(|v| !v.is_empty());
    }

    if let Some(link) = find_marked_tag(markup, TagKind::Anchor, &mirror.success_marker) {
        if let Some(href) = attr_value(link, "href").filter(|v| !v.is_empty()) {
            descriptor.video_url = normalize_video_url(&href, &mirror.base_url);
        }
    }

    if descriptor.video_url.is_some() {
        descriptor.mime_type = Some(mirror.mime_type.clone());
    }

    descriptor
}

#[derive(Clone, Copy)]
enum TagKind {
    Anchor,
    Img,
}

/// First opening tag of the given kind whose `class` contains the marker.
fn find_marked_tag<'a>(markup: &'a str, kind: TagKind, marker: &str) -> Option<&'a str> {
    let tag_re = match kind {
        TagKind::Anchor => regex!(r"(?is)<a\b[^>]*>"),
        TagKind::Img => regex!(r"(?is)<img\b[^>]*>"),
    };
    tag_re.find_iter(markup).map(|m| m.as_str()).find(|tag| {
        attr_value(tag, "class")
            .map(|classes| classes.split_whitespace().any(|c| c.contains(marker)))
            .unwrap_or(false)
    })
}

/// Value of a named attribute within one opening tag.
///
/// Tolerates single or double quotes and arbitrary attribute order.
fn attr_value(tag: &str, name: &str) -> Option<String> {
    let attr_re = regex!(r#"([a-zA-Z][a-zA-Z0-9_-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#);
    for caps in attr_re.captures_iter(tag) {
        if caps[1].eq_ignore_ascii_case(name) {
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .map(|m| m.as_str().to_string());
            return value;
        }
    }
    None
}

/// Percent-decode the raw target, then resolve it against the mirror's
/// base URL when relative. Values arrive URL-escaped from the renderer.
fn normalize_video_url(raw: &str, base_url: &str) -> Option<String> {
    let decoded = urlencoding::decode(raw)
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|_| raw.to_string());

    match Url::parse(&decoded) {
        Ok(url) => Some(url.into()),
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(base_url)
            .ok()?
            .join(&decoded)
            .ok()
            .map(Into::into),
        Err(_) => None,
    }
}
