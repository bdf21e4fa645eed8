//! Highlight ranges and per-line overlap resolution

use std::cmp::Reverse;
use std::ops::Range;

use serde::{Serialize, Serializer};

/// Standard tree-sitter capture names.
/// Index into this array is the HighlightId.
pub const HIGHLIGHT_NAMES: &[&str] = &[
    "attribute",             // @attribute
    "boolean",               // @boolean (true, false)
    "comment",               // @comment
    "constant",              // @constant
    "constant.builtin",      // @constant.builtin (null, nil)
    "constructor",           // @constructor
    "embedded",              // @embedded (interpolations)
    "escape",                // @escape (string escapes)
    "function",              // @function
    "function.builtin",      // @function.builtin (echo, print)
    "function.macro",        // @function.macro (println!)
    "function.method",       // @function.method
    "keyword",               // @keyword
    "keyword.function",      // @keyword.function (fn, def, func)
    "keyword.operator",      // @keyword.operator (and, or)
    "keyword.return",        // @keyword.return
    "label",                 // @label (code fence info strings)
    "number",                // @number
    "operator",              // @operator
    "property",              // @property (JSON keys, fields)
    "punctuation",           // @punctuation (general)
    "punctuation.bracket",   // @punctuation.bracket
    "punctuation.delimiter", // @punctuation.delimiter
    "punctuation.special",   // @punctuation.special (list markers, heading markers)
    "string",                // @string
    "string.special",        // @string.special (regex, heredoc)
    "tag",                   // @tag
    "text",                  // @text
    "text.emphasis",         // @text.emphasis
    "text.literal",          // @text.literal (code blocks)
    "text.strong",           // @text.strong
    "text.title",            // @text.title (headings)
    "text.uri",              // @text.uri (links)
    "type",                  // @type
    "type.builtin",          // @type.builtin (int, bool)
    "variable",              // @variable
    "variable.builtin",      // @variable.builtin (self)
    "variable.parameter",    // @variable.parameter
];

/// Index into HIGHLIGHT_NAMES
pub type HighlightId = u16;

/// Look up highlight ID by capture name
pub fn highlight_id_for_name(name: &str) -> Option<HighlightId> {
    // Handle hierarchical names: try exact match first, then progressively shorter
    // parents (e.g. "keyword.control.import" -> "keyword.control" -> "keyword").
    let mut current = name;
    loop {
        if let Some(pos) = HIGHLIGHT_NAMES.iter().position(|&n| n == current) {
            return Some(pos as HighlightId);
        }

        let Some(dot_pos) = current.rfind('.') else {
            break;
        };
        current = &current[..dot_pos];
    }

    None
}

/// Capture name for a highlight ID
pub fn highlight_name(id: HighlightId) -> &'static str {
    HIGHLIGHT_NAMES.get(id as usize).copied().unwrap_or("unknown")
}

fn serialize_group<S: Serializer>(group: &HighlightId, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(highlight_name(*group))
}

/// A highlighted span within one line.
///
/// Columns are char columns, end exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HighlightRange {
    pub start_col: usize,
    pub end_col: usize,
    #[serde(serialize_with = "serialize_group")]
    pub group: HighlightId,
    /// Produced by a grammar injected into the buffer's own
    pub is_injection: bool,
    /// Filetype of the injected grammar
    #[serde(skip_serializing_if = "Option::is_none")]
    pub injection_lang: Option<String>,
    /// The captured node encloses an injected region
    pub contains_injection: bool,
    /// Replacement text for the renderer; `Some("")` hides the span
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conceal: Option<String>,
    /// The whole line should be hidden
    pub conceal_lines: bool,
}

impl HighlightRange {
    pub fn new(start_col: usize, end_col: usize, group: HighlightId) -> Self {
        Self {
            start_col,
            end_col,
            group,
            is_injection: false,
            injection_lang: None,
            contains_injection: false,
            conceal: None,
            conceal_lines: false,
        }
    }

    pub fn group_name(&self) -> &'static str {
        highlight_name(self.group)
    }

    pub fn width(&self) -> usize {
        self.end_col.saturating_sub(self.start_col)
    }

    fn with_span(&self, span: Range<usize>) -> Self {
        Self {
            start_col: span.start,
            end_col: span.end,
            ..self.clone()
        }
    }
}

/// Highlights for one line of a query window
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HighlightResponse {
    pub line: usize,
    /// Non-overlapping, sorted by start column
    pub highlights: Vec<HighlightRange>,
    /// Spans that lost overlap resolution, sorted by start column
    pub dropped_highlights: Vec<HighlightRange>,
}

impl HighlightResponse {
    /// Group at a char column, if any
    pub fn highlight_at(&self, col: usize) -> Option<HighlightId> {
        for range in &self.highlights {
            if col >= range.start_col && col < range.end_col {
                return Some(range.group);
            }
            if range.start_col > col {
                break;
            }
        }
        None
    }
}

/// A raw capture on one line before overlap resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub range: HighlightRange,
    /// 0 for the buffer's own grammar, 1 inside an injected region
    pub depth: usize,
    /// Query pattern that produced the capture
    pub pattern_index: usize,
}

impl Candidate {
    pub fn new(range: HighlightRange, depth: usize, pattern_index: usize) -> Self {
        Self {
            range,
            depth,
            pattern_index,
        }
    }
}

/// Resolve overlapping captures on one line.
///
/// Candidates are painted in priority order: deeper injection first, then
/// narrower span, then lower pattern index, then lower start column. The part
/// of a candidate already covered by a higher-priority one is moved to
/// `dropped_highlights`; whatever remains uncovered is kept.
pub fn merge_line(line: usize, mut candidates: Vec<Candidate>) -> HighlightResponse {
    candidates.retain(|c| c.range.start_col < c.range.end_col);
    candidates.sort_by_key(|c| {
        (
            Reverse(c.depth),
            c.range.width(),
            c.pattern_index,
            c.range.start_col,
        )
    });

    let mut painted: Vec<Range<usize>> = Vec::new();
    let mut highlights = Vec::new();
    let mut dropped = Vec::new();

    for candidate in &candidates {
        let span = candidate.range.start_col..candidate.range.end_col;
        let (uncovered, covered) = split_by_painted(&painted, span);

        for piece in covered {
            dropped.push(candidate.range.with_span(piece));
        }
        for piece in uncovered {
            let at = painted.partition_point(|p| p.start < piece.start);
            painted.insert(at, piece.clone());
            highlights.push(candidate.range.with_span(piece));
        }
    }

    highlights.sort_by_key(|r| (r.start_col, r.end_col));
    dropped.sort_by_key(|r| (r.start_col, r.end_col));

    HighlightResponse {
        line,
        highlights,
        dropped_highlights: dropped,
    }
}

/// Split `span` into the parts outside and inside `painted` (sorted, disjoint)
fn split_by_painted(
    painted: &[Range<usize>],
    span: Range<usize>,
) -> (Vec<Range<usize>>, Vec<Range<usize>>) {
    let mut uncovered = Vec::new();
    let mut covered: Vec<Range<usize>> = Vec::new();
    let mut cursor = span.start;

    for p in painted
        .iter()
        .filter(|p| p.end > span.start && p.start < span.end)
    {
        if p.start > cursor {
            uncovered.push(cursor..p.start);
        }
        let hit = p.start.max(cursor)..p.end.min(span.end);
        match covered.last_mut() {
            Some(last) if last.end == hit.start => last.end = hit.end,
            _ => covered.push(hit.clone()),
        }
        cursor = hit.end;
    }
    if cursor < span.end {
        uncovered.push(cursor..span.end);
    }

    (uncovered, covered)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> HighlightId {
        highlight_id_for_name(name).unwrap()
    }

    fn base(start: usize, end: usize, group: &str, pattern: usize) -> Candidate {
        Candidate::new(HighlightRange::new(start, end, id(group)), 0, pattern)
    }

    #[test]
    fn test_highlight_id_lookup() {
        assert!(highlight_id_for_name("keyword").is_some());
        assert!(highlight_id_for_name("keyword.function").is_some());
        assert_eq!(
            highlight_id_for_name("keyword.control.import"),
            highlight_id_for_name("keyword")
        );
        assert!(highlight_id_for_name("nonexistent").is_none());
        assert_eq!(highlight_name(id("string")), "string");
    }

    #[test]
    fn test_injected_range_wins_over_base() {
        let injected = Candidate::new(
            HighlightRange {
                is_injection: true,
                injection_lang: Some("rust".into()),
                ..HighlightRange::new(2, 6, id("keyword"))
            },
            1,
            0,
        );
        let response = merge_line(0, vec![base(2, 6, "string", 0), injected]);

        assert_eq!(response.highlights.len(), 1);
        assert!(response.highlights[0].is_injection);
        assert_eq!(response.highlights[0].group, id("keyword"));
        assert_eq!(response.dropped_highlights.len(), 1);
        assert_eq!(response.dropped_highlights[0].group, id("string"));
        assert_eq!(
            (
                response.dropped_highlights[0].start_col,
                response.dropped_highlights[0].end_col
            ),
            (2, 6)
        );
    }

    #[test]
    fn test_narrower_span_wins_and_remainder_survives() {
        // "# Title": marker inside the heading
        let response = merge_line(
            3,
            vec![
                base(0, 7, "text.title", 0),
                base(0, 1, "punctuation.special", 1),
            ],
        );

        let spans: Vec<_> = response
            .highlights
            .iter()
            .map(|r| (r.start_col, r.end_col, r.group_name()))
            .collect();
        assert_eq!(
            spans,
            vec![(0, 1, "punctuation.special"), (1, 7, "text.title")]
        );
        assert_eq!(response.dropped_highlights.len(), 1);
        assert_eq!(response.dropped_highlights[0].end_col, 1);
        assert_eq!(response.line, 3);
    }

    #[test]
    fn test_equal_spans_tie_break_on_pattern_index() {
        let response = merge_line(
            0,
            vec![base(1, 4, "string", 5), base(1, 4, "property", 2)],
        );
        assert_eq!(response.highlights[0].group, id("property"));
        assert_eq!(response.dropped_highlights[0].group, id("string"));
    }

    #[test]
    fn test_wide_span_split_around_winners() {
        let response = merge_line(
            0,
            vec![
                base(0, 10, "comment", 0),
                base(2, 3, "keyword", 1),
                base(5, 7, "number", 2),
            ],
        );
        let spans: Vec<_> = response
            .highlights
            .iter()
            .map(|r| (r.start_col, r.end_col))
            .collect();
        assert_eq!(spans, vec![(0, 2), (2, 3), (3, 5), (5, 7), (7, 10)]);
        let dropped: Vec<_> = response
            .dropped_highlights
            .iter()
            .map(|r| (r.start_col, r.end_col))
            .collect();
        assert_eq!(dropped, vec![(2, 3), (5, 7)]);
    }

    #[test]
    fn test_metadata_passes_through() {
        let concealed = HighlightRange {
            conceal: Some(String::new()),
            conceal_lines: true,
            ..HighlightRange::new(0, 3, id("punctuation.delimiter"))
        };
        let response = merge_line(0, vec![Candidate::new(concealed.clone(), 0, 0)]);
        assert_eq!(response.highlights, vec![concealed]);
    }

    #[test]
    fn test_empty_candidates_are_ignored() {
        let response = merge_line(0, vec![base(4, 4, "keyword", 0)]);
        assert!(response.highlights.is_empty());
        assert!(response.dropped_highlights.is_empty());
    }

    #[test]
    fn test_highlight_at() {
        let response = merge_line(
            0,
            vec![base(0, 5, "keyword", 0), base(10, 15, "string", 1)],
        );
        assert_eq!(response.highlight_at(4), Some(id("keyword")));
        assert_eq!(response.highlight_at(5), None);
        assert_eq!(response.highlight_at(14), Some(id("string")));
    }
}
