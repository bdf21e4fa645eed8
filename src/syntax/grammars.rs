//! Process-wide grammar cache
//!
//! Every grammar is loaded and its highlight query compiled once, on first
//! use, then shared read-only by all buffers of that language.

use std::collections::HashMap;
use std::sync::OnceLock;

use tree_sitter::{Language, Parser, Query};

use super::languages::LanguageId;

// Embedded query files
const MARKDOWN_HIGHLIGHTS: &str = include_str!("../../queries/markdown/highlights.scm");
const JSON_HIGHLIGHTS: &str = include_str!("../../queries/json/highlights.scm");

// Built-in queries shipped with the grammar crates (some use HIGHLIGHT_QUERY singular)
const RUST_HIGHLIGHTS: &str = tree_sitter_rust::HIGHLIGHTS_QUERY;
const PYTHON_HIGHLIGHTS: &str = tree_sitter_python::HIGHLIGHTS_QUERY;
const GO_HIGHLIGHTS: &str = tree_sitter_go::HIGHLIGHTS_QUERY;
const C_HIGHLIGHTS: &str = tree_sitter_c::HIGHLIGHT_QUERY;
const BASH_HIGHLIGHTS: &str = tree_sitter_bash::HIGHLIGHT_QUERY;

/// A loaded grammar and its compiled highlight query
pub struct Grammar {
    pub language: Language,
    pub query: Query,
}

impl Grammar {
    /// A fresh parser for this grammar
    pub fn parser(&self) -> Option<Parser> {
        let mut parser = Parser::new();
        match parser.set_language(&self.language) {
            Ok(()) => Some(parser),
            Err(e) => {
                tracing::error!("Failed to set language: {}", e);
                None
            }
        }
    }
}

#[derive(Default)]
pub struct GrammarSet {
    grammars: HashMap<LanguageId, Grammar>,
    failures: Vec<(LanguageId, String)>,
}

impl GrammarSet {
    fn load() -> Self {
        let mut set = Self::default();
        for lang in LanguageId::WITH_GRAMMAR {
            let (ts_lang, highlights_scm): (Language, &str) = match lang {
                LanguageId::Rust => (tree_sitter_rust::LANGUAGE.into(), RUST_HIGHLIGHTS),
                LanguageId::Markdown => (tree_sitter_md::LANGUAGE.into(), MARKDOWN_HIGHLIGHTS),
                LanguageId::Json => (tree_sitter_json::LANGUAGE.into(), JSON_HIGHLIGHTS),
                LanguageId::Python => (tree_sitter_python::LANGUAGE.into(), PYTHON_HIGHLIGHTS),
                LanguageId::Go => (tree_sitter_go::LANGUAGE.into(), GO_HIGHLIGHTS),
                LanguageId::C => (tree_sitter_c::LANGUAGE.into(), C_HIGHLIGHTS),
                LanguageId::Bash => (tree_sitter_bash::LANGUAGE.into(), BASH_HIGHLIGHTS),
                LanguageId::PlainText => continue,
            };

            // Create query (may fail if query syntax is invalid)
            match Query::new(&ts_lang, highlights_scm) {
                Ok(query) => {
                    set.grammars.insert(
                        lang,
                        Grammar {
                            language: ts_lang,
                            query,
                        },
                    );
                }
                Err(e) => {
                    tracing::warn!("Failed to compile query for {:?}: {:?}", lang, e);
                    set.failures.push((lang, e.to_string()));
                }
            }
        }
        tracing::debug!("Loaded {} grammars", set.grammars.len());
        set
    }

    pub fn get(&self, lang: LanguageId) -> Option<&Grammar> {
        self.grammars.get(&lang)
    }

    /// Languages whose query failed to compile, with the reason
    pub fn failures(&self) -> &[(LanguageId, String)] {
        &self.failures
    }
}

static GRAMMARS: OnceLock<GrammarSet> = OnceLock::new();

/// The shared grammar set, loading it on first call
pub fn grammars() -> &'static GrammarSet {
    GRAMMARS.get_or_init(GrammarSet::load)
}
