//! Canonicalization of CDN image references
//!
//! The listing CDN addresses resized renditions by appending a
//! `/<width>x<height>.<format>` segment to the source image URL. Stripping that
//! segment yields the canonical URL, so every rendition of one picture maps to
//! the same on-disk name.

use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

/// Matches a resize-and-format marker such as `/640x480.webp`
const RESIZE_SEGMENT_PATTERN: &str = r"/[0-9]+x[0-9]+\.[a-z]+";

fn resize_segment() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(RESIZE_SEGMENT_PATTERN).expect("resize segment pattern is a valid regex")
    })
}

/// Image URL normalizer
pub struct UrlNormalizer;

impl UrlNormalizer {
    /// Remove resize/format marker segments from an image URL
    ///
    /// The first marker is removed repeatedly until none is left, which keeps
    /// the operation idempotent even when removing one marker splices a new
    /// one together. URLs without a marker are returned unchanged.
    #[must_use]
    pub fn normalize(raw_url: &str) -> String {
        let mut current = raw_url.to_string();
        loop {
            match resize_segment().replace(&current, "") {
                Cow::Borrowed(_) => return current,
                Cow::Owned(next) => current = next,
            }
        }
    }

    /// Whether the URL carries no resize/format marker
    #[must_use]
    pub fn is_canonical(url: &str) -> bool {
        !resize_segment().is_match(url)
    }
}

/// Convenience wrapper around [`UrlNormalizer::normalize`]
#[must_use]
pub fn normalize_url(raw_url: &str) -> String {
    UrlNormalizer::normalize(raw_url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_resize_segment() {
        assert_eq!(
            normalize_url("https://img.cdn/x/640x480.jpg"),
            "https://img.cdn/x"
        );
        assert_eq!(
            normalize_url(
                "https://prod.pictures.autoscout24.net/listing-images/abc_def.jpg/250x188.webp"
            ),
            "https://prod.pictures.autoscout24.net/listing-images/abc_def.jpg"
        );
    }

    #[test]
    fn test_url_without_marker_is_unchanged() {
        let urls = [
            "https://img.cdn/listing/abc.jpg",
            "https://img.cdn/listing/x.jpg",
            "not a url at all",
            "",
            "https://img.cdn/640x480/abc.jpg",
        ];

        for url in urls {
            assert_eq!(normalize_url(url), url, "URL should pass through: {}", url);
        }
    }

    #[test]
    fn test_marker_in_middle_of_path() {
        assert_eq!(
            normalize_url("https://img.cdn/a/1024x768.jpg/tail"),
            "https://img.cdn/a/tail"
        );
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let urls = [
            "https://img.cdn/x/640x480.jpg",
            "https://img.cdn/a.jpg/1x1.png/2x2.webp",
            // Removing "/2x3.jpg" splices "/1x" and "2.jpg" into a new marker
            "https://img.cdn/1x/2x3.jpg2.jpg",
            "https://img.cdn/plain.jpg",
            "https://img.cdn/trailing/",
        ];

        for url in urls {
            let once = normalize_url(url);
            let twice = normalize_url(&once);
            assert_eq!(once, twice, "normalize must be idempotent for {}", url);
            assert!(UrlNormalizer::is_canonical(&once));
        }
    }

    #[test]
    fn test_is_canonical() {
        assert!(UrlNormalizer::is_canonical("https://img.cdn/abc.jpg"));
        assert!(!UrlNormalizer::is_canonical("https://img.cdn/abc.jpg/800x600.webp"));
    }
}
