//! Heuristic classification of AI provider failures.
//!
//! Providers report failures as free text: a process exit message, stderr, or
//! sometimes an error string returned as if it were the answer. The
//! classifier maps that text onto a [`ProviderErrorKind`] by signature
//! matching. Signatures change as providers change their wording, so the
//! table is versioned on its own via [`CLASSIFIER_VERSION`].

use std::sync::LazyLock;

use chrono::{DateTime, TimeZone, Utc};
use regex::{Regex, RegexSet};

use contentcurator_shared::{ModelOption, ProviderError, ProviderErrorKind};

/// Bumped whenever a signature is added, removed or reordered.
pub const CLASSIFIER_VERSION: u32 = 3;

static USAGE_CAP: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)usage limit",
        r"(?i)rate[ _-]?limit",
        r"(?i)quota",
        r"(?i)too many requests",
        r"(?i)credit balance is too low",
        r"\b429\b",
    ])
    .expect("valid regex")
});

static AUTH: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)invalid[ _-]?(api[ _-]?key|x-api-key)",
        r"(?i)authentication",
        r"(?i)unauthori[sz]ed",
        r"(?i)permission denied",
        r"(?i)please run /login",
        r"\b40[13]\b",
    ])
    .expect("valid regex")
});

static SERVER: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)timed? ?out",
        r"(?i)econn(reset|refused)",
        r"(?i)socket hang up",
        r"(?i)connection (error|reset|refused|closed)",
        r"(?i)network error",
        r"(?i)overloaded",
        r"(?i)internal server error",
        r"(?i)service unavailable",
        r"(?i)bad gateway",
        r"(?i)process exited with code",
        r"(?i)unexpected end of json",
        r"(?i)malformed",
        r"\b(500|502|503|504|529)\b",
    ])
    .expect("valid regex")
});

static RESUME_EPOCH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)usage limit reached\|(\d{9,13})").expect("valid regex"));

static RESUME_AT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)resets? at ([0-9T:\-+.Z ]+)").expect("valid regex"));

/// Classify provider failure text.
pub fn classify_provider_error(text: &str) -> ProviderErrorKind {
    if USAGE_CAP.is_match(text) {
        ProviderErrorKind::UsageCap {
            resume_at: parse_resume_at(text),
        }
    } else if AUTH.is_match(text) {
        ProviderErrorKind::Auth
    } else if SERVER.is_match(text) {
        ProviderErrorKind::Server
    } else {
        ProviderErrorKind::Unknown
    }
}

/// Build a classified [`ProviderError`] for a failed request to `model`.
pub fn provider_error(model: &ModelOption, message: impl Into<String>) -> ProviderError {
    let message = message.into();
    ProviderError {
        kind: classify_provider_error(&message),
        provider: model.provider.clone(),
        model: model.model.clone(),
        message,
    }
}

/// When a usage cap lifts, if the provider said so.
///
/// Understands `usage limit reached|<unix seconds or millis>` and
/// `resets at <RFC 3339 timestamp>`.
pub fn parse_resume_at(text: &str) -> Option<DateTime<Utc>> {
    if let Some(caps) = RESUME_EPOCH.captures(text) {
        let raw: i64 = caps[1].parse().ok()?;
        let secs = if caps[1].len() > 10 { raw / 1000 } else { raw };
        return Utc.timestamp_opt(secs, 0).single();
    }

    let caps = RESUME_AT.captures(text)?;
    let stamp = caps[1].trim().trim_end_matches('.');
    DateTime::parse_from_rfc3339(stamp)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_cap_with_epoch() {
        let kind = classify_provider_error("Claude AI usage limit reached|1760000000");
        let ProviderErrorKind::UsageCap { resume_at } = kind else {
            panic!("expected usage cap, got {kind:?}");
        };
        assert_eq!(resume_at.map(|t| t.timestamp()), Some(1_760_000_000));
    }

    #[test]
    fn usage_cap_with_reset_time() {
        let kind = classify_provider_error("Rate limit exceeded. Limit resets at 2025-06-01T12:00:00Z.");
        assert_eq!(
            kind,
            ProviderErrorKind::UsageCap {
                resume_at: DateTime::parse_from_rfc3339("2025-06-01T12:00:00Z")
                    .ok()
                    .map(|d| d.with_timezone(&Utc)),
            }
        );
    }

    #[test]
    fn auth_beats_process_exit() {
        let kind =
            classify_provider_error("claude process exited with code 1: Invalid API key · Please run /login");
        assert_eq!(kind, ProviderErrorKind::Auth);
    }

    #[test]
    fn server_failures() {
        for text in [
            "request timed out after 600s",
            "connect ECONNREFUSED 127.0.0.1:443",
            "API Error: 529 Overloaded",
            "claude process exited with code 137: ",
        ] {
            assert_eq!(classify_provider_error(text), ProviderErrorKind::Server, "{text}");
        }
    }

    #[test]
    fn unknown_text() {
        assert_eq!(
            classify_provider_error("something odd happened"),
            ProviderErrorKind::Unknown
        );
    }

    #[test]
    fn recoverability_by_kind() {
        assert!(classify_provider_error("429 Too Many Requests").is_recoverable());
        assert!(classify_provider_error("socket hang up").is_recoverable());
        assert!(!classify_provider_error("401 Unauthorized").is_recoverable());
        assert!(!classify_provider_error("???").is_recoverable());
    }
}
