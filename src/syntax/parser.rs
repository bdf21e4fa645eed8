//! Tree-sitter parse state and windowed highlight extraction
//!
//! Keeps one parser and tree per buffer so edits reparse incrementally, and
//! answers highlight queries for a window of lines only.

use std::collections::{BTreeMap, HashMap};
use std::ops::Range;

use streaming_iterator::StreamingIterator;
use tree_sitter::{InputEdit, Node, Parser, Query, QueryCursor, Tree};

use super::grammars::grammars;
use super::highlights::{
    highlight_id_for_name, merge_line, Candidate, HighlightRange, HighlightResponse,
};
use super::injection::{collect_sites, InjectionMapping, InjectionSite};
use super::languages::LanguageId;
use crate::buffer::{BufferId, Edit, LineIndex};

/// Cached parse state for a buffer (enables incremental parsing)
struct DocParseState {
    language: LanguageId,
    parser: Parser,
    tree: Tree,
}

/// Per-buffer parsers and trees, owned by the highlight worker
pub struct HighlightEngine {
    docs: HashMap<BufferId, DocParseState>,
    /// One parser per embedded language, reused across buffers
    injection_parsers: HashMap<LanguageId, Parser>,
    injections: InjectionMapping,
}

impl HighlightEngine {
    pub fn new(injections: InjectionMapping) -> Self {
        Self {
            docs: HashMap::new(),
            injection_parsers: HashMap::new(),
            injections,
        }
    }

    /// Whether a grammar is available for `language`
    pub fn supports(language: LanguageId) -> bool {
        grammars().get(language).is_some()
    }

    pub fn has_tree(&self, id: BufferId) -> bool {
        self.docs.contains_key(&id)
    }

    /// Parse `source` from scratch, replacing any cached tree.
    /// Returns false when there is no grammar or the parse failed.
    pub fn parse_full(&mut self, id: BufferId, language: LanguageId, source: &str) -> bool {
        self.docs.remove(&id);

        let Some(grammar) = grammars().get(language) else {
            return false;
        };
        let Some(mut parser) = grammar.parser() else {
            return false;
        };
        match parser.parse(source, None) {
            Some(tree) => {
                self.docs.insert(
                    id,
                    DocParseState {
                        language,
                        parser,
                        tree,
                    },
                );
                true
            }
            None => {
                tracing::error!("Parse failed for {:?}", language);
                false
            }
        }
    }

    /// Apply `edit` to the cached tree and reparse incrementally, falling
    /// back to a full parse. Returns false when the buffer has no tree.
    pub fn apply_edit(&mut self, id: BufferId, edit: &Edit, new_source: &str) -> bool {
        let Some(cached) = self.docs.get_mut(&id) else {
            return false;
        };

        let input: InputEdit = edit.into();
        cached.tree.edit(&input);
        tracing::trace!(
            "Incremental parse: edit at byte {}..{} -> {}..{}",
            input.start_byte,
            input.old_end_byte,
            input.start_byte,
            input.new_end_byte
        );

        match cached.parser.parse(new_source, Some(&cached.tree)) {
            Some(new_tree) => {
                cached.tree = new_tree;
                true
            }
            None => {
                let language = cached.language;
                tracing::warn!(
                    "Incremental parse failed for {:?}, falling back to full parse",
                    language
                );
                self.parse_full(id, language, new_source)
            }
        }
    }

    /// Drop the parser and tree for a buffer
    pub fn forget(&mut self, id: BufferId) {
        self.docs.remove(&id);
    }

    /// Highlights for rows `lines` of `source`, one response per row.
    ///
    /// Returns None when the buffer has no tree.
    pub fn highlight_window(
        &mut self,
        id: BufferId,
        source: &str,
        line_index: &LineIndex,
        lines: Range<usize>,
    ) -> Option<Vec<HighlightResponse>> {
        let cached = self.docs.get(&id)?;
        let grammar = grammars().get(cached.language)?;

        let line_count = line_index.line_count();
        let rows = lines.start.min(line_count)..lines.end.min(line_count);
        let bytes = line_index.byte_range_for_lines(rows.clone());
        let window = Window {
            source,
            line_index,
            rows: rows.clone(),
            bytes: bytes.clone(),
        };

        let sites = if self.injections.is_empty() {
            Vec::new()
        } else {
            collect_sites(
                &self.injections,
                cached.tree.root_node(),
                source.as_bytes(),
                bytes,
            )
        };

        let mut candidates: BTreeMap<usize, Vec<Candidate>> = BTreeMap::new();
        collect_candidates(
            &grammar.query,
            cached.tree.root_node(),
            &window,
            Layer::Base { sites: &sites },
            &mut candidates,
        );

        for (language, ranges) in group_sites(&sites) {
            let Some(injected) = grammars().get(language) else {
                continue;
            };
            let parser = match self.injection_parsers.entry(language) {
                std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
                std::collections::hash_map::Entry::Vacant(e) => match injected.parser() {
                    Some(p) => e.insert(p),
                    None => continue,
                },
            };
            if let Err(e) = parser.set_included_ranges(&ranges) {
                tracing::warn!("Bad injection ranges for {:?}: {}", language, e);
                continue;
            }
            let Some(tree) = parser.parse(source, None) else {
                tracing::warn!("Injected parse failed for {:?}", language);
                continue;
            };
            collect_candidates(
                &injected.query,
                tree.root_node(),
                &window,
                Layer::Injected { language },
                &mut candidates,
            );
        }

        Some(
            rows.map(|row| merge_line(row, candidates.remove(&row).unwrap_or_default()))
                .collect(),
        )
    }
}

struct Window<'a> {
    source: &'a str,
    line_index: &'a LineIndex,
    rows: Range<usize>,
    bytes: Range<usize>,
}

enum Layer<'a> {
    Base { sites: &'a [InjectionSite] },
    Injected { language: LanguageId },
}

/// Included ranges per embedded language, in document order
fn group_sites(sites: &[InjectionSite]) -> Vec<(LanguageId, Vec<tree_sitter::Range>)> {
    let mut groups: Vec<(LanguageId, Vec<tree_sitter::Range>)> = Vec::new();
    for site in sites {
        match groups.iter_mut().find(|(lang, _)| *lang == site.language) {
            Some((_, ranges)) => ranges.push(site.range),
            None => groups.push((site.language, vec![site.range])),
        }
    }
    groups
}

/// Run `query` over the window and split each capture into per-row candidates
fn collect_candidates(
    query: &Query,
    root: Node<'_>,
    window: &Window<'_>,
    layer: Layer<'_>,
    out: &mut BTreeMap<usize, Vec<Candidate>>,
) {
    let mut cursor = QueryCursor::new();
    cursor.set_byte_range(window.bytes.clone());

    let (depth, injection_lang) = match layer {
        Layer::Base { .. } => (0, None),
        Layer::Injected { language } => (1, Some(language.filetype().to_string())),
    };

    // Run query and collect captures using StreamingIterator
    let mut captures = cursor.captures(query, root, window.source.as_bytes());
    while let Some((query_match, capture_idx)) = captures.next() {
        let capture = &query_match.captures[*capture_idx];
        let capture_name = &query.capture_names()[capture.index as usize];

        let Some(group) = highlight_id_for_name(capture_name) else {
            continue; // Skip unknown captures
        };

        let node = capture.node;
        let (start, end) = (node.start_byte(), node.end_byte());
        if start >= end {
            continue;
        }

        let mut template = HighlightRange::new(0, 0, group);
        template.is_injection = depth > 0;
        template.injection_lang = injection_lang.clone();
        if let Layer::Base { sites } = &layer {
            template.contains_injection = sites
                .iter()
                .any(|s| start <= s.range.start_byte && s.range.end_byte <= end);
        }
        for property in query.property_settings(query_match.pattern_index) {
            match &*property.key {
                "conceal" => {
                    template.conceal = Some(property.value.as_deref().unwrap_or("").to_string())
                }
                "conceal_lines" => template.conceal_lines = true,
                _ => {}
            }
        }

        let first = window.line_index.row_of(start).max(window.rows.start);
        let last = window
            .line_index
            .row_of(end)
            .min(window.rows.end.saturating_sub(1));
        for row in first..=last {
            let Some(line) = window.line_index.line_range(row) else {
                continue;
            };
            let from = start.max(line.start);
            let to = end.min(line.end);
            if from >= to {
                continue;
            }
            let range = HighlightRange {
                start_col: char_col(window.source, line.start, from),
                end_col: char_col(window.source, line.start, to),
                ..template.clone()
            };
            out.entry(row)
                .or_default()
                .push(Candidate::new(range, depth, query_match.pattern_index));
        }
    }
}

/// Convert a byte offset to a char column within the line starting at `line_start`
fn char_col(source: &str, line_start: usize, byte: usize) -> usize {
    // Find the nearest valid char boundary at or before byte
    let mut valid = byte.min(source.len());
    while valid > line_start && !source.is_char_boundary(valid) {
        valid -= 1;
    }
    source
        .get(line_start..valid)
        .map_or(0, |text| text.chars().count())
}
