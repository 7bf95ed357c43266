//! Markdown structure helpers and the large-document chunker.
//!
//! Documents sent to the AI provider must come back with their frontmatter,
//! headers and code blocks intact. This crate knows where those live in a
//! Markdown file and how to split an oversized document into header-bounded,
//! overlapping chunks that can be improved independently and put back together.

mod chunker;

use std::sync::LazyLock;

use regex::Regex;

pub use chunker::{BoundaryIssue, BoundaryIssueKind, Chunker, ContentChunk, overlap_length};

// ---------------------------------------------------------------------------
// Frontmatter
// ---------------------------------------------------------------------------

/// A YAML frontmatter block found at the very start of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frontmatter<'a> {
    /// The block itself, both `---` delimiters included, with the newline that
    /// ends the closing delimiter when there is one.
    pub block: &'a str,
    /// Number of lines the block spans.
    pub line_count: usize,
}

/// Split a document into its frontmatter block (if any) and the remaining body.
///
/// The document must open with a `---` line; the block runs to the next `---`
/// line. An unterminated block is not frontmatter.
pub fn split_frontmatter(text: &str) -> (Option<Frontmatter<'_>>, &str) {
    let mut offset = 0;
    for (index, line) in text.split_inclusive('\n').enumerate() {
        let bare = line.trim_end();
        if index == 0 {
            if bare != "---" {
                return (None, text);
            }
        } else if bare == "---" {
            let end = offset + line.len();
            let fm = Frontmatter {
                block: &text[..end],
                line_count: index + 1,
            };
            return (Some(fm), &text[end..]);
        }
        offset += line.len();
    }
    (None, text)
}

/// Whether a frontmatter block holds YAML-looking content (`key: value`
/// lines, list items, indented continuations). Used to tell a duplicated
/// frontmatter block apart from a horizontal rule pair.
pub fn looks_like_yaml(block: &str) -> bool {
    static KEY_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_\-]+\s*:").expect("valid regex"));

    let inner: Vec<&str> = block
        .lines()
        .map(str::trim_end)
        .filter(|l| *l != "---" && !l.trim().is_empty())
        .collect();

    !inner.is_empty()
        && inner.iter().all(|l| {
            KEY_RE.is_match(l) || l.starts_with(' ') || l.starts_with('\t') || l.starts_with("- ")
        })
}

// ---------------------------------------------------------------------------
// Line classification
// ---------------------------------------------------------------------------

/// Level of an ATX header line (`#` .. `######` followed by text).
pub fn header_level(line: &str) -> Option<u8> {
    static HEADER_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^(#{1,6})[ \t]+\S").expect("valid regex"));

    HEADER_RE
        .captures(line)
        .map(|caps| caps[1].len() as u8)
}

/// Whether a line opens or closes a fenced code block.
pub fn is_code_fence(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("```") || trimmed.starts_with("~~~")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_frontmatter_from_body() {
        let doc = "---\ntitle: \"Intro\"\ntags: [a, b]\n---\n# Intro\n\nBody\n";
        let (fm, body) = split_frontmatter(doc);
        let fm = fm.expect("frontmatter");
        assert_eq!(fm.block, "---\ntitle: \"Intro\"\ntags: [a, b]\n---\n");
        assert_eq!(fm.line_count, 4);
        assert_eq!(body, "# Intro\n\nBody\n");
    }

    #[test]
    fn no_frontmatter_when_not_first_line() {
        let doc = "# Title\n---\nkey: value\n---\n";
        let (fm, body) = split_frontmatter(doc);
        assert!(fm.is_none());
        assert_eq!(body, doc);
    }

    #[test]
    fn unterminated_frontmatter_is_ignored() {
        let doc = "---\ntitle: x\n# Heading\n";
        assert!(split_frontmatter(doc).0.is_none());
    }

    #[test]
    fn frontmatter_without_trailing_newline() {
        let doc = "---\na: 1\n---";
        let (fm, body) = split_frontmatter(doc);
        assert_eq!(fm.map(|f| f.block), Some(doc));
        assert_eq!(body, "");
    }

    #[test]
    fn yaml_detection() {
        assert!(looks_like_yaml("---\ntitle: x\ntags:\n  - a\n---\n"));
        assert!(!looks_like_yaml("---\nJust a paragraph between rules.\n---\n"));
        assert!(!looks_like_yaml("---\n---\n"));
    }

    #[test]
    fn header_levels() {
        assert_eq!(header_level("# Title"), Some(1));
        assert_eq!(header_level("### Deep"), Some(3));
        assert_eq!(header_level("###### Six"), Some(6));
        assert_eq!(header_level("####### Seven"), None);
        assert_eq!(header_level("#hashtag"), None);
        assert_eq!(header_level("  # indented"), None);
        assert_eq!(header_level("plain text"), None);
    }

    #[test]
    fn code_fences() {
        assert!(is_code_fence("```rust"));
        assert!(is_code_fence("  ~~~"));
        assert!(!is_code_fence("`inline`"));
    }
}
