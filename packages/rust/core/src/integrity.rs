//! Sanitizing and validating improved content.
//!
//! An AI answer that arrived without a transport error can still be
//! unusable: it may be a provider error message dressed up as content,
//! wrapped in chat preamble or a code fence, missing the frontmatter, or
//! much shorter than the input.

use std::sync::LazyLock;

use regex::{Regex, RegexSet};

use contentcurator_markdown::split_frontmatter;
use contentcurator_shared::{IntegrityError, IntegrityThresholds};

use crate::classify::classify_provider_error;

/// How much of the start of an answer is inspected for provider error text.
const PASSTHROUGH_WINDOW: usize = 400;

static PASSTHROUGH: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)^api error\b",
        r"(?i)^error:",
        r"(?i)^execution error",
        r"(?i)^claude ai usage limit reached",
        r"(?i)^usage limit reached",
        r"(?i)^invalid api key",
        r"(?i)^credit balance is too low",
        r"(?i)^request timed out",
        r"(?i)^rate limit",
        r#"(?i)^\{"type":\s*"error""#,
    ])
    .expect("valid regex")
});

static PREAMBLE: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)^(sure|certainly|of course|absolutely)\b[,!.]?",
        r"(?i)^(i'll|i will|i've|i have|let me)\b",
        r"(?i)^here(?:'s| is| are)\b.*\b(improved|revised|updated|rewritten|enhanced|version|content)\b",
    ])
    .expect("valid regex")
});

static OPENING_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(```|~~~)\s*(markdown|md|mdx)\s*$").expect("valid regex"));

// ---------------------------------------------------------------------------
// Sanitizing
// ---------------------------------------------------------------------------

/// Reject answers that start like a provider error message.
pub fn detect_error_passthrough(text: &str) -> Option<IntegrityError> {
    let head: String = text.trim_start().chars().take(PASSTHROUGH_WINDOW).collect();
    let first_line = head.lines().next().unwrap_or_default().trim();

    if !PASSTHROUGH.is_match(first_line) {
        return None;
    }

    Some(IntegrityError::ProviderErrorPassthrough {
        kind: classify_provider_error(&head),
        excerpt: first_line.chars().take(120).collect(),
    })
}

/// Remove chat preamble lines ("Here's the improved version:") from the
/// start of an answer.
pub fn strip_preamble(text: &str) -> &str {
    let mut rest = text.trim_start();
    loop {
        let (line, tail) = match rest.split_once('\n') {
            Some((line, tail)) => (line, tail),
            None => (rest, ""),
        };
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("---") {
            return rest;
        }
        if !PREAMBLE.is_match(line) {
            return rest;
        }
        rest = tail.trim_start();
    }
}

/// Unwrap an answer that is entirely one ```` ```markdown ```` block.
pub fn unwrap_markdown_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some((first, body)) = trimmed.split_once('\n') else {
        return text;
    };
    if !OPENING_FENCE.is_match(first.trim()) {
        return text;
    }
    let fence = &first.trim()[..3];
    match body.trim_end().strip_suffix(fence) {
        Some(inner) => inner.trim_end_matches([' ', '\t']),
        None => text,
    }
}

/// Put the original frontmatter back when the answer dropped it.
pub fn restore_frontmatter(original: &str, improved: &str) -> String {
    let (Some(fm), _) = split_frontmatter(original) else {
        return improved.to_string();
    };
    if split_frontmatter(improved).0.is_some() {
        return improved.to_string();
    }

    let mut out = String::with_capacity(fm.block.len() + improved.len() + 1);
    out.push_str(fm.block);
    if !fm.block.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(improved.trim_start_matches('\n'));
    out
}

/// Full sanitizing pass over an improvement answer.
pub fn sanitize_response(original: &str, response: &str) -> Result<String, IntegrityError> {
    if let Some(err) = detect_error_passthrough(response) {
        return Err(err);
    }

    let text = strip_preamble(response);
    let text = unwrap_markdown_fence(text).trim_end();
    if text.trim().is_empty() {
        return Err(IntegrityError::EmptyResponse);
    }

    let mut text = restore_frontmatter(original, text);
    if original.ends_with('\n') && !text.ends_with('\n') {
        text.push('\n');
    }
    Ok(text)
}

// ---------------------------------------------------------------------------
// Length validation
// ---------------------------------------------------------------------------

/// Non-fatal observation about an accepted length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LengthNote {
    /// Between the hard minimum and the warning ratio.
    Shorter { ratio: f64 },
    /// Above the maximum ratio.
    Longer { ratio: f64 },
}

impl std::fmt::Display for LengthNote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Shorter { ratio } => write!(
                f,
                "improved content is noticeably shorter ({:.0}% of original)",
                ratio * 100.0
            ),
            Self::Longer { ratio } => write!(
                f,
                "improved content is longer than requested ({:.0}% of original)",
                ratio * 100.0
            ),
        }
    }
}

/// Check `final_text` against the length of `original`.
///
/// Empty output and output below `min_ratio` are rejected. Returns the
/// ratio and an optional note otherwise.
pub fn validate_length(
    original: &str,
    final_text: &str,
    thresholds: &IntegrityThresholds,
) -> Result<(f64, Option<LengthNote>), IntegrityError> {
    let final_len = final_text.trim().chars().count();
    if final_len == 0 {
        return Err(IntegrityError::EmptyResponse);
    }

    let original_len = original.trim().chars().count();
    if original_len == 0 {
        return Ok((f64::INFINITY, Some(LengthNote::Longer { ratio: f64::INFINITY })));
    }

    let ratio = final_len as f64 / original_len as f64;
    if ratio < thresholds.min_ratio {
        return Err(IntegrityError::SuspiciouslyShort {
            original_len,
            final_len,
            ratio,
        });
    }

    let note = if ratio < thresholds.warn_ratio {
        Some(LengthNote::Shorter { ratio })
    } else if ratio > thresholds.max_ratio {
        Some(LengthNote::Longer { ratio })
    } else {
        None
    };
    Ok((ratio, note))
}

#[cfg(test)]
mod tests {
    use super::*;
    use contentcurator_shared::ProviderErrorKind;

    fn thresholds() -> IntegrityThresholds {
        IntegrityThresholds::default()
    }

    #[test]
    fn length_bands() {
        let original = "x".repeat(1000);

        let err = validate_length(&original, &"x".repeat(690), &thresholds()).unwrap_err();
        assert!(matches!(
            err,
            IntegrityError::SuspiciouslyShort {
                original_len: 1000,
                final_len: 690,
                ..
            }
        ));

        let (_, note) = validate_length(&original, &"x".repeat(800), &thresholds()).unwrap();
        assert!(matches!(note, Some(LengthNote::Shorter { .. })));

        for len in [850, 1000, 1200] {
            let (_, note) = validate_length(&original, &"x".repeat(len), &thresholds()).unwrap();
            assert_eq!(note, None, "len {len}");
        }

        let (ratio, note) = validate_length(&original, &"x".repeat(1300), &thresholds()).unwrap();
        assert!((ratio - 1.3).abs() < 1e-9);
        assert!(matches!(note, Some(LengthNote::Longer { .. })));
    }

    #[test]
    fn empty_output_always_fails() {
        let err = validate_length("abc", "  \n", &thresholds()).unwrap_err();
        assert!(matches!(err, IntegrityError::EmptyResponse));
    }

    #[test]
    fn passthrough_detection() {
        let err = detect_error_passthrough("Claude AI usage limit reached|1760000000").unwrap();
        let IntegrityError::ProviderErrorPassthrough { kind, .. } = err else {
            panic!("wrong error");
        };
        assert!(matches!(kind, ProviderErrorKind::UsageCap { .. }));

        let err = detect_error_passthrough("API Error: 401 Unauthorized").unwrap();
        assert!(matches!(
            err,
            IntegrityError::ProviderErrorPassthrough {
                kind: ProviderErrorKind::Auth,
                ..
            }
        ));

        assert!(detect_error_passthrough("# Handling API errors\n\nError: is a common prefix").is_none());
    }

    #[test]
    fn strips_preamble_lines() {
        let text = "Sure!\nHere's the improved version of your content:\n\n# Title\n\nBody";
        assert_eq!(strip_preamble(text), "# Title\n\nBody");

        let real = "Here is how to install the tool.\n\nRun the script.";
        assert_eq!(strip_preamble(real), real);
    }

    #[test]
    fn unwraps_whole_fence_only() {
        assert_eq!(unwrap_markdown_fence("```markdown\n# T\n\nBody\n```\n"), "# T\n\nBody\n");

        let inner = "# T\n\n```markdown\nexample\n```\n\nMore";
        assert_eq!(unwrap_markdown_fence(inner), inner);
    }

    #[test]
    fn frontmatter_is_restored() {
        let original = "---\ntitle: A\n---\n# A\n\nOld\n";
        assert_eq!(
            restore_frontmatter(original, "# A\n\nNew\n"),
            "---\ntitle: A\n---\n# A\n\nNew\n"
        );
        let kept = "---\ntitle: B\n---\n# A\n";
        assert_eq!(restore_frontmatter(original, kept), kept);
    }

    #[test]
    fn full_sanitize_pass() {
        let original = "---\ntitle: A\n---\n# A\n\nOld body text.\n";
        let response = "Here's the improved content:\n```markdown\n# A\n\nNew body text.\n```";
        assert_eq!(
            sanitize_response(original, response).unwrap(),
            "---\ntitle: A\n---\n# A\n\nNew body text.\n"
        );

        assert!(matches!(
            sanitize_response(original, "Sure!"),
            Err(IntegrityError::EmptyResponse)
        ));
    }
}
