//! Pure content rules: per-platform length validation, dispatch-time
//! formatting, and hashtag extraction.
//!
//! Everything in this module is a total function with no side effects.
//! Lengths are character counts, not bytes.

use crate::error::ValidationError;
use crate::types::Platform;

/// Check content against a platform's scheduling ceiling.
///
/// Accepts content exactly at the ceiling and rejects only strictly above it.
pub fn validate_length(content: &str, platform: Platform) -> Result<(), ValidationError> {
    let actual = content.chars().count();
    let limit = platform.max_length();
    if actual > limit {
        return Err(ValidationError::TooLong {
            platform,
            limit,
            actual,
        });
    }
    Ok(())
}

/// Platform-specific dispatch-time transform. Idempotent: applying it twice
/// yields the same result as once.
pub fn format_for_platform(content: &str, platform: Platform) -> String {
    match platform {
        Platform::Instagram => {
            // Prepend a marker emoji only when the content carries no
            // decorative non-ASCII character already.
            if content.chars().all(|c| c.is_ascii()) {
                format!("\u{2728} {}", content)
            } else {
                content.to_string()
            }
        }
        _ => match platform.format_limit() {
            Some(limit) => truncate_with_ellipsis(content, limit),
            None => content.to_string(),
        },
    }
}

/// Shape content for a whole fan-out set.
///
/// The publishing service accepts a single body per call, so the dispatcher
/// sends one shared body: the instagram marker is applied first when
/// instagram is targeted, then the body is clamped once to the tightest
/// targeted format limit. Additions before truncation, so the result never
/// exceeds any targeted limit regardless of the order platforms appear in.
/// Both steps are idempotent, so the whole transform is too.
pub fn format_for_dispatch(content: &str, platforms: &[Platform]) -> String {
    let body = if platforms.contains(&Platform::Instagram) {
        format_for_platform(content, Platform::Instagram)
    } else {
        content.to_string()
    };

    match platforms.iter().filter_map(|p| p.format_limit()).min() {
        Some(limit) => truncate_with_ellipsis(&body, limit),
        None => body,
    }
}

/// Truncate to `limit` characters, replacing the tail with `...` when over.
fn truncate_with_ellipsis(content: &str, limit: usize) -> String {
    if content.chars().count() <= limit {
        return content.to_string();
    }
    let kept: String = content.chars().take(limit.saturating_sub(3)).collect();
    format!("{}...", kept)
}

/// Extract all `#word` tokens in order of first appearance, duplicates
/// retained. Word characters are alphanumerics and underscore.
pub fn extract_hashtags(content: &str) -> Vec<String> {
    let mut tags = Vec::new();
    let mut chars = content.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '#' {
            continue;
        }
        let mut tag = String::from('#');
        while let Some(&next) = chars.peek() {
            if next.is_alphanumeric() || next == '_' {
                tag.push(next);
                chars.next();
            } else {
                break;
            }
        }
        if tag.len() > 1 {
            tags.push(tag);
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_length_accepts_at_ceiling() {
        let content = "a".repeat(280);
        assert!(validate_length(&content, Platform::Twitter).is_ok());
    }

    #[test]
    fn test_validate_length_rejects_above_ceiling() {
        let content = "a".repeat(300);
        let error = validate_length(&content, Platform::Twitter).unwrap_err();
        assert_eq!(
            error,
            ValidationError::TooLong {
                platform: Platform::Twitter,
                limit: 280,
                actual: 300,
            }
        );
        assert_eq!(
            error.to_string(),
            "twitter allows at most 280 characters (got 300)"
        );
    }

    #[test]
    fn test_validate_length_counts_characters_not_bytes() {
        // 280 multi-byte characters is exactly at the twitter ceiling.
        let content = "\u{00e8}".repeat(280);
        assert!(validate_length(&content, Platform::Twitter).is_ok());
    }

    #[test]
    fn test_validate_length_per_platform() {
        let content = "a".repeat(501);
        assert!(validate_length(&content, Platform::Pinterest).is_err());
        assert!(validate_length(&content, Platform::Facebook).is_ok());
        assert!(validate_length(&content, Platform::Linkedin).is_ok());
    }

    #[test]
    fn test_format_instagram_adds_marker_for_ascii() {
        let formatted = format_for_platform("plain ascii text", Platform::Instagram);
        assert_eq!(formatted, "\u{2728} plain ascii text");
    }

    #[test]
    fn test_format_instagram_skips_marker_when_non_ascii_present() {
        let content = "gi\u{00e0} decorato \u{2728}";
        assert_eq!(format_for_platform(content, Platform::Instagram), content);
    }

    #[test]
    fn test_format_twitter_truncates_with_ellipsis() {
        let content = "a".repeat(300);
        let formatted = format_for_platform(&content, Platform::Twitter);
        assert_eq!(formatted.chars().count(), 280);
        assert!(formatted.ends_with("..."));
        assert!(formatted.starts_with("aaa"));
    }

    #[test]
    fn test_format_pinterest_truncates_at_500() {
        let content = "b".repeat(600);
        let formatted = format_for_platform(&content, Platform::Pinterest);
        assert_eq!(formatted.chars().count(), 500);
        assert!(formatted.ends_with("..."));
    }

    #[test]
    fn test_format_passthrough_platforms() {
        let content = "c".repeat(5000);
        assert_eq!(format_for_platform(&content, Platform::Facebook), content);
        assert_eq!(format_for_platform(&content, Platform::Linkedin), content);
    }

    #[test]
    fn test_format_is_idempotent_for_every_platform() {
        let samples = [
            "short".to_string(),
            "a".repeat(300),
            "testo con \u{00e8} accentata ".repeat(30),
        ];
        for platform in Platform::ALL {
            for sample in &samples {
                let once = format_for_platform(sample, platform);
                let twice = format_for_platform(&once, platform);
                assert_eq!(once, twice, "not idempotent for {}", platform);
            }
        }
    }

    #[test]
    fn test_format_for_dispatch_composes_transforms() {
        let content = "a".repeat(300);
        let formatted = format_for_dispatch(
            &content,
            &[Platform::Instagram, Platform::Twitter],
        );
        // Marker added first, then clamped to the twitter limit.
        assert!(formatted.starts_with("\u{2728} "));
        assert_eq!(formatted.chars().count(), 280);
        assert!(formatted.ends_with("..."));
    }

    #[test]
    fn test_format_for_dispatch_is_order_independent() {
        let content = "a".repeat(300);
        let forward = format_for_dispatch(&content, &[Platform::Twitter, Platform::Instagram]);
        let reverse = format_for_dispatch(&content, &[Platform::Instagram, Platform::Twitter]);
        assert_eq!(forward, reverse);
        // Marker then clamp, never marker on top of an already clamped body.
        assert_eq!(forward.chars().count(), 280);
    }

    #[test]
    fn test_format_for_dispatch_clamps_to_tightest_limit() {
        let content = "b".repeat(600);
        let formatted = format_for_dispatch(
            &content,
            &[Platform::Pinterest, Platform::Twitter, Platform::Facebook],
        );
        assert_eq!(formatted.chars().count(), 280);
    }

    #[test]
    fn test_format_for_dispatch_is_idempotent() {
        let content = "a".repeat(300);
        let orderings = [
            [Platform::Instagram, Platform::Twitter, Platform::Pinterest],
            [Platform::Twitter, Platform::Instagram, Platform::Pinterest],
            [Platform::Pinterest, Platform::Twitter, Platform::Instagram],
        ];
        for fan_out in orderings {
            let once = format_for_dispatch(&content, &fan_out);
            let twice = format_for_dispatch(&once, &fan_out);
            assert_eq!(once, twice, "not idempotent for {:?}", fan_out);
        }
    }

    #[test]
    fn test_format_for_dispatch_empty_fan_out_is_identity() {
        assert_eq!(format_for_dispatch("anything", &[]), "anything");
    }

    #[test]
    fn test_extract_hashtags_in_order() {
        let tags = extract_hashtags("#rifiuti news #ambiente and #rifiuti again");
        assert_eq!(tags, vec!["#rifiuti", "#ambiente", "#rifiuti"]);
    }

    #[test]
    fn test_extract_hashtags_word_boundary() {
        let tags = extract_hashtags("end#tag, (#wrapped) #under_score #num1");
        assert_eq!(tags, vec!["#tag", "#wrapped", "#under_score", "#num1"]);
    }

    #[test]
    fn test_extract_hashtags_ignores_bare_hash() {
        assert!(extract_hashtags("just a # and ## nothing").is_empty());
    }

    #[test]
    fn test_extract_hashtags_unicode_words() {
        let tags = extract_hashtags("#sostenibilit\u{00e0} conta");
        assert_eq!(tags, vec!["#sostenibilit\u{00e0}"]);
    }

    #[test]
    fn test_extract_hashtags_none() {
        assert!(extract_hashtags("no tags here").is_empty());
    }
}
