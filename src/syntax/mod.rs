//! Syntax highlighting module
//!
//! Provides tree-sitter based highlighting with:
//! - Language detection from filetype tags and file extensions
//! - A process-wide grammar cache
//! - Incremental reparsing per buffer
//! - Windowed highlight extraction with embedded-language injection
//!
//! ## Architecture
//!
//! ```text
//! Edit → HighlightEngine::apply_edit (tree.edit + incremental reparse)
//! Query(lines) → base captures + injected captures → merge_line per row
//!              → Vec<HighlightResponse>
//! ```
//!
//! ## Supported Languages
//!
//! Rust, Markdown, JSON, Python, Go, C, Bash

mod grammars;
mod highlights;
mod injection;
mod languages;
mod parser;

pub use grammars::{grammars, Grammar, GrammarSet};
pub use highlights::{
    highlight_id_for_name, highlight_name, merge_line, Candidate, HighlightId, HighlightRange,
    HighlightResponse, HIGHLIGHT_NAMES,
};
pub use injection::{collect_sites, InjectionMapping, InjectionSite};
pub use languages::LanguageId;
pub use parser::HighlightEngine;
