//! Header-bounded chunking for documents too large for a single AI request.
//!
//! A chunk grows line by line until it is both past the minimum size and either
//! past the maximum size or about to swallow a split-level header. Each new
//! chunk repeats the last few lines of the previous one so the AI sees the
//! context across the boundary; reassembly drops that overlap again.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use contentcurator_shared::ChunkingConfig;

use crate::{header_level, is_code_fence, looks_like_yaml, split_frontmatter};

/// One contiguous slice of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentChunk {
    pub id: String,
    pub content: String,
    /// First line of the chunk (0-based, inclusive, whole-document numbering).
    pub start_line: usize,
    /// Last line of the chunk (inclusive).
    pub end_line: usize,
    /// Header lines this chunk introduces. Repeated overlap lines are not counted.
    pub headers: Vec<String>,
    /// Set on the first chunk when the document has frontmatter.
    pub preserve_frontmatter: bool,
    pub character_count: usize,
    pub is_first: bool,
    pub is_last: bool,
}

/// A suspicious boundary between two consecutive chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryIssue {
    /// Index of the later chunk of the pair.
    pub index: usize,
    pub kind: BoundaryIssueKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundaryIssueKind {
    /// Lines between the two chunks are not covered by either.
    Gap { lines: usize },
    /// The later chunk ends before its predecessor does.
    Regression,
}

impl std::fmt::Display for BoundaryIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            BoundaryIssueKind::Gap { lines } => {
                write!(f, "chunk {} starts {lines} lines after its predecessor ends", self.index)
            }
            BoundaryIssueKind::Regression => {
                write!(f, "chunk {} ends before its predecessor", self.index)
            }
        }
    }
}

/// Splits and reassembles documents according to a [`ChunkingConfig`].
#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Whether a document is large enough to need chunking.
    pub fn should_chunk(&self, text: &str) -> bool {
        text.chars().count() > self.config.max_chunk_size
    }

    /// Split a document into ordered, overlapping chunks.
    ///
    /// Line ranges cover the whole document. Header lines inside fenced code
    /// blocks do not count as headers, and no split happens inside the
    /// frontmatter block, which always belongs to the first chunk.
    pub fn chunk_by_headers(&self, text: &str) -> Vec<ContentChunk> {
        let cfg = &self.config;
        let lines: Vec<&str> = text.split('\n').collect();
        let frontmatter_lines = split_frontmatter(text).0.map_or(0, |fm| fm.line_count);

        let mut drafts: Vec<Draft<'_>> = Vec::new();
        let mut current = Draft::starting_at(0);
        let mut in_fence = false;

        for (i, line) in lines.iter().copied().enumerate() {
            let in_frontmatter = i < frontmatter_lines;
            let fence = !in_frontmatter && is_code_fence(line);
            let level = if in_frontmatter || in_fence || fence {
                None
            } else {
                header_level(line)
            };
            let at_split_header = level.is_some_and(|l| cfg.split_levels.contains(&l));

            if !in_frontmatter
                && current.fresh_lines > 0
                && current.size > cfg.min_chunk_size
                && (current.size > cfg.max_chunk_size || at_split_header)
            {
                let overlap = current.tail(cfg.overlap_lines);
                let start = i - overlap.len();
                drafts.push(std::mem::replace(&mut current, Draft::starting_at(start)));
                for carried in overlap {
                    current.push_overlap(carried);
                }
            }

            if fence {
                in_fence = !in_fence;
            }
            if level.is_some() {
                current.headers.push(line.to_string());
            }
            current.push(line);
        }
        drafts.push(current);

        let total = drafts.len();
        let chunks: Vec<ContentChunk> = drafts
            .into_iter()
            .enumerate()
            .map(|(index, draft)| draft.finish(index, total, frontmatter_lines > 0))
            .collect();

        debug!(
            chunks = chunks.len(),
            lines = lines.len(),
            chars = text.chars().count(),
            "document chunked"
        );
        chunks
    }

    /// Put chunks back together in order.
    ///
    /// Frontmatter duplicated into a later chunk is dropped, as are the lines
    /// a chunk repeats from the end of its predecessor.
    pub fn reassemble_chunks(&self, chunks: &[ContentChunk]) -> String {
        let max_check = self.config.overlap_lines * 2;
        let mut out: Vec<&str> = Vec::new();

        for (index, chunk) in chunks.iter().enumerate() {
            if chunk.content.trim().is_empty() {
                continue;
            }

            let mut body = chunk.content.as_str();
            if index > 0 && !chunk.preserve_frontmatter {
                if let (Some(fm), rest) = split_frontmatter(body) {
                    if looks_like_yaml(fm.block) {
                        body = rest;
                    }
                }
            }

            let lines: Vec<&str> = body.split('\n').collect();
            let skip = if out.is_empty() {
                0
            } else {
                overlap_length(&out, &lines, max_check)
            };
            out.extend_from_slice(&lines[skip..]);
        }

        out.join("\n")
    }

    /// Report gaps and regressions between consecutive chunk ranges.
    ///
    /// Purely diagnostic: issues are logged and returned, never raised.
    pub fn validate_chunk_boundaries(&self, chunks: &[ContentChunk]) -> Vec<BoundaryIssue> {
        let allowed_gap = self.config.overlap_lines + 1;
        let mut issues = Vec::new();

        for (index, pair) in chunks.windows(2).enumerate() {
            let (prev, next) = (&pair[0], &pair[1]);
            let index = index + 1;

            if next.start_line > prev.end_line && next.start_line - prev.end_line > allowed_gap {
                issues.push(BoundaryIssue {
                    index,
                    kind: BoundaryIssueKind::Gap {
                        lines: next.start_line - prev.end_line - 1,
                    },
                });
            }
            if next.end_line < prev.end_line {
                issues.push(BoundaryIssue {
                    index,
                    kind: BoundaryIssueKind::Regression,
                });
            }
        }

        for issue in &issues {
            warn!(%issue, "chunk boundary issue");
        }
        issues
    }
}

/// Number of leading lines of `next` that repeat the trailing lines of `prev`.
///
/// Looks for the longest match of at most `max_check` lines, comparing with
/// trailing whitespace ignored. A match made only of blank lines is rejected:
/// blank lines repeat everywhere and carry no evidence of overlap.
pub fn overlap_length(prev: &[&str], next: &[&str], max_check: usize) -> usize {
    let limit = max_check.min(prev.len()).min(next.len());

    (1..=limit)
        .rev()
        .find(|&k| {
            let tail = &prev[prev.len() - k..];
            let head = &next[..k];
            tail.iter().zip(head).all(|(a, b)| a.trim_end() == b.trim_end())
                && tail.iter().any(|l| !l.trim().is_empty())
        })
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Chunk under construction
// ---------------------------------------------------------------------------

struct Draft<'a> {
    lines: Vec<&'a str>,
    start_line: usize,
    size: usize,
    /// Lines added after the carried-over overlap.
    fresh_lines: usize,
    headers: Vec<String>,
}

impl<'a> Draft<'a> {
    fn starting_at(start_line: usize) -> Self {
        Self {
            lines: Vec::new(),
            start_line,
            size: 0,
            fresh_lines: 0,
            headers: Vec::new(),
        }
    }

    fn push(&mut self, line: &'a str) {
        self.push_overlap(line);
        self.fresh_lines += 1;
    }

    fn push_overlap(&mut self, line: &'a str) {
        self.size += line.chars().count() + 1;
        self.lines.push(line);
    }

    fn tail(&self, n: usize) -> Vec<&'a str> {
        let from = self.lines.len().saturating_sub(n);
        self.lines[from..].to_vec()
    }

    fn finish(self, index: usize, total: usize, has_frontmatter: bool) -> ContentChunk {
        let content = self.lines.join("\n");
        let end_line = self.start_line + self.lines.len().saturating_sub(1);
        ContentChunk {
            id: chunk_id(index, &content),
            character_count: content.chars().count(),
            content,
            start_line: self.start_line,
            end_line,
            headers: self.headers,
            preserve_frontmatter: index == 0 && has_frontmatter,
            is_first: index == 0,
            is_last: index + 1 == total,
        }
    }
}

fn chunk_id(index: usize, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(index.to_le_bytes());
    hasher.update(content.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("chunk-{index}-{}", &digest[..12])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker() -> Chunker {
        Chunker::new(ChunkingConfig::default())
    }

    /// A section of roughly `chars` characters of distinct prose lines.
    fn section(header: &str, tag: &str, chars: usize) -> String {
        let mut out = format!("{header}\n\n");
        let mut n = 0;
        while out.len() < chars {
            out.push_str(&format!(
                "Paragraph {tag}-{n} explains one more detail of the topic at a steady, readable length.\n"
            ));
            n += 1;
        }
        out.push('\n');
        out
    }

    fn three_sections() -> String {
        [
            section("## Installation", "a", 8_000),
            section("## Configuration", "b", 8_000),
            section("## Troubleshooting", "c", 8_000),
        ]
        .concat()
    }

    #[test]
    fn small_documents_are_not_chunked() {
        let c = chunker();
        assert!(!c.should_chunk("# Title\n\nShort body.\n"));
        assert!(c.should_chunk(&"x".repeat(20_001)));
        assert!(!c.should_chunk(&"x".repeat(20_000)));
    }

    #[test]
    fn three_h2_sections_make_three_chunks() {
        let c = chunker();
        let doc = three_sections();
        assert!(c.should_chunk(&doc));

        let chunks = c.chunk_by_headers(&doc);
        assert_eq!(chunks.len(), 3);
        assert!(chunks[0].headers[0].starts_with("## Installation"));
        assert!(chunks[1].headers[0].starts_with("## Configuration"));
        assert!(chunks[2].headers[0].starts_with("## Troubleshooting"));

        assert_eq!(chunks[0].start_line, 0);
        for pair in chunks.windows(2) {
            assert_eq!(pair[1].start_line, pair[0].end_line + 1 - 2);
        }
        let last_line = doc.split('\n').count() - 1;
        assert_eq!(chunks[2].end_line, last_line);

        assert!(chunks[0].is_first && !chunks[0].is_last);
        assert!(!chunks[1].is_first && !chunks[1].is_last);
        assert!(chunks[2].is_last);
        assert!(c.validate_chunk_boundaries(&chunks).is_empty());
    }

    #[test]
    fn chunk_contents_start_with_overlap() {
        let c = chunker();
        let doc = three_sections();
        let chunks = c.chunk_by_headers(&doc);
        let first_lines: Vec<&str> = chunks[0].content.split('\n').collect();
        let second_lines: Vec<&str> = chunks[1].content.split('\n').collect();
        assert_eq!(&second_lines[..2], &first_lines[first_lines.len() - 2..]);
        assert_eq!(second_lines[2], "## Configuration");
    }

    #[test]
    fn round_trip_restores_document() {
        let c = chunker();
        let doc = three_sections();
        let chunks = c.chunk_by_headers(&doc);
        assert_eq!(c.reassemble_chunks(&chunks), doc);
    }

    #[test]
    fn round_trip_length_within_overlap_tolerance() {
        let c = chunker();
        // Sections separated by pairs of blank lines: the blank-only overlap is
        // not recognised, so the blank lines may be duplicated.
        let doc = [
            section("# Guide", "p", 7_000),
            "\n".to_string(),
            section("## Part two", "q", 7_000),
            "\n".to_string(),
            section("### Part three", "r", 7_000),
        ]
        .concat();
        let chunks = c.chunk_by_headers(&doc);
        assert!(chunks.len() >= 2);
        let rebuilt = c.reassemble_chunks(&chunks);
        let tolerance = chunks.len() * (c.config().overlap_lines + 1);
        assert!(rebuilt.len() >= doc.len());
        assert!(rebuilt.len() - doc.len() <= tolerance);
    }

    #[test]
    fn size_limit_forces_split_without_headers() {
        let c = chunker();
        let doc: String = (0..600)
            .map(|i| format!("Line {i} of a long document that never uses a single header anywhere.\n"))
            .collect();
        let chunks = c.chunk_by_headers(&doc);
        assert!(chunks.len() >= 3);
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(chunk.character_count <= 20_000 + 200);
        }
        assert_eq!(c.reassemble_chunks(&chunks), doc);
    }

    #[test]
    fn frontmatter_stays_with_first_chunk() {
        let c = chunker();
        let doc = format!("---\ntitle: \"Guide\"\n---\n{}", three_sections());
        let chunks = c.chunk_by_headers(&doc);
        assert!(chunks[0].preserve_frontmatter);
        assert!(chunks[0].content.starts_with("---\ntitle"));
        assert!(chunks[1..].iter().all(|ch| !ch.preserve_frontmatter));
        assert_eq!(c.reassemble_chunks(&chunks), doc);
    }

    #[test]
    fn duplicated_frontmatter_is_stripped_on_reassembly() {
        let c = chunker();
        let doc = format!("---\ntitle: \"Guide\"\n---\n{}", three_sections());
        let mut chunks = c.chunk_by_headers(&doc);
        chunks[1].content = format!("---\ntitle: \"Guide\"\n---\n{}", chunks[1].content);
        assert_eq!(c.reassemble_chunks(&chunks), doc);
    }

    #[test]
    fn headers_inside_code_fences_do_not_split() {
        let c = chunker();
        let mut doc = section("## Shell usage", "s", 6_000);
        doc.push_str("```bash\n# Install dependencies\nnpm install\n```\n");
        doc.push_str(&section("## Next", "t", 16_000));
        let chunks = c.chunk_by_headers(&doc);
        assert!(chunks.iter().all(|ch| !ch.headers.iter().any(|h| h == "# Install dependencies")));
        assert!(chunks.iter().skip(1).all(|ch| !ch.content.starts_with("# Install")));
    }

    #[test]
    fn empty_document_is_one_chunk() {
        let chunks = chunker().chunk_by_headers("");
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].is_first && chunks[0].is_last);
        assert_eq!(chunks[0].start_line, 0);
        assert_eq!(chunks[0].end_line, 0);
    }

    #[test]
    fn chunk_ids_are_unique() {
        let chunks = chunker().chunk_by_headers(&three_sections());
        let mut ids: Vec<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
        ids.dedup();
        assert_eq!(ids.len(), chunks.len());
    }

    // --- Overlap matching ---

    #[test]
    fn overlap_finds_longest_match() {
        let prev = ["a", "b", "c", "d"];
        let next = ["c", "d", "e"];
        assert_eq!(overlap_length(&prev, &next, 4), 2);
    }

    #[test]
    fn overlap_respects_max_check() {
        let prev = ["a", "b", "c", "d"];
        let next = ["a", "b", "c", "d", "e"];
        assert_eq!(overlap_length(&prev, &next, 4), 4);
        assert_eq!(overlap_length(&prev, &next, 3), 0);
    }

    #[test]
    fn overlap_ignores_trailing_whitespace() {
        let prev = ["intro", "last line  "];
        let next = ["last line", "## Next"];
        assert_eq!(overlap_length(&prev, &next, 4), 1);
    }

    #[test]
    fn overlap_rejects_blank_only_match() {
        let prev = ["text", "", ""];
        let next = ["", "", "## Header"];
        assert_eq!(overlap_length(&prev, &next, 4), 0);
    }

    #[test]
    fn overlap_with_repeated_headers() {
        // The same header appears at the end of one chunk and the start of the
        // next, but only the real shared pair is dropped.
        let prev = ["## Example", "text one", "## Example", "shared"];
        let next = ["## Example", "shared", "## Example", "text two"];
        assert_eq!(overlap_length(&prev, &next, 4), 2);
    }

    #[test]
    fn overlap_with_empty_inputs() {
        assert_eq!(overlap_length(&[], &["a"], 4), 0);
        assert_eq!(overlap_length(&["a"], &[], 4), 0);
        assert_eq!(overlap_length(&["a"], &["a"], 0), 0);
    }

    #[test]
    fn empty_chunks_are_skipped() {
        let c = chunker();
        let mut chunks = c.chunk_by_headers(&three_sections());
        chunks[1].content.clear();
        let rebuilt = c.reassemble_chunks(&chunks);
        assert!(rebuilt.contains("## Installation"));
        assert!(!rebuilt.contains("## Configuration"));
        assert!(rebuilt.contains("## Troubleshooting"));
    }

    // --- Boundary validation ---

    fn fake_chunk(start_line: usize, end_line: usize) -> ContentChunk {
        ContentChunk {
            id: String::new(),
            content: String::new(),
            start_line,
            end_line,
            headers: vec![],
            preserve_frontmatter: false,
            character_count: 0,
            is_first: false,
            is_last: false,
        }
    }

    #[test]
    fn boundary_gap_is_flagged() {
        let c = chunker();
        let chunks = [fake_chunk(0, 10), fake_chunk(9, 20), fake_chunk(30, 40)];
        let issues = c.validate_chunk_boundaries(&chunks);
        assert_eq!(
            issues,
            vec![BoundaryIssue {
                index: 2,
                kind: BoundaryIssueKind::Gap { lines: 9 }
            }]
        );
    }

    #[test]
    fn small_gap_is_tolerated() {
        let c = chunker();
        let chunks = [fake_chunk(0, 10), fake_chunk(13, 20)];
        assert!(c.validate_chunk_boundaries(&chunks).is_empty());
    }

    #[test]
    fn boundary_regression_is_flagged() {
        let c = chunker();
        let chunks = [fake_chunk(0, 10), fake_chunk(2, 5)];
        let issues = c.validate_chunk_boundaries(&chunks);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, BoundaryIssueKind::Regression);
    }
}
