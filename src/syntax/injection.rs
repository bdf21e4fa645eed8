//! Embedded-language lookup tables

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tree_sitter::Node;

use super::languages::LanguageId;

/// Decides which regions of a buffer are highlighted with another grammar.
///
/// `node_types` maps a node kind straight to a filetype. `info_strings` maps
/// the label of an embedded block (a fenced code block's language tag) to a
/// filetype. An empty config section falls back to the built-in tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectionMapping {
    pub node_types: HashMap<String, String>,
    pub info_strings: HashMap<String, String>,
}

impl Default for InjectionMapping {
    fn default() -> Self {
        let info_strings = [
            ("rust", "rust"),
            ("rs", "rust"),
            ("json", "json"),
            ("python", "python"),
            ("py", "python"),
            ("go", "go"),
            ("golang", "go"),
            ("c", "c"),
            ("h", "c"),
            ("bash", "bash"),
            ("sh", "bash"),
            ("shell", "bash"),
            ("zsh", "bash"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            node_types: HashMap::new(),
            info_strings,
        }
    }
}

/// One region to highlight with an embedded grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InjectionSite {
    pub language: LanguageId,
    pub range: tree_sitter::Range,
}

impl InjectionMapping {
    pub fn is_empty(&self) -> bool {
        self.node_types.is_empty() && self.info_strings.is_empty()
    }

    /// Target language for `node`, checking the node-type table first and
    /// then a labelled child. Returns the language and the region to reparse.
    pub fn resolve(&self, node: Node<'_>, source: &[u8]) -> Option<InjectionSite> {
        if let Some(filetype) = self.node_types.get(node.kind()) {
            return site(filetype, node);
        }

        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
        let label = children.iter().find(|c| c.kind() == "info_string")?;
        let tag = label
            .utf8_text(source)
            .ok()?
            .split_whitespace()
            .next()?
            .to_lowercase();
        let filetype = self.info_strings.get(&tag)?;
        let content = children
            .iter()
            .find(|c| c.kind() == "code_fence_content")?;
        site(filetype, *content)
    }
}

fn site(filetype: &str, node: Node<'_>) -> Option<InjectionSite> {
    let language = LanguageId::from_filetype(filetype);
    if !language.has_highlighting() || node.start_byte() == node.end_byte() {
        return None;
    }
    Some(InjectionSite {
        language,
        range: node.range(),
    })
}

/// Collect injection sites overlapping `bytes`, in document order.
///
/// Sites are not searched for further sites.
pub fn collect_sites(
    mapping: &InjectionMapping,
    root: Node<'_>,
    source: &[u8],
    bytes: std::ops::Range<usize>,
) -> Vec<InjectionSite> {
    let mut sites = Vec::new();
    let mut stack = vec![root];

    while let Some(node) = stack.pop() {
        if node.end_byte() <= bytes.start || node.start_byte() >= bytes.end {
            continue;
        }
        if let Some(site) = mapping.resolve(node, source) {
            sites.push(site);
            continue;
        }
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
        // Reverse so the stack pops in document order
        stack.extend(children.into_iter().rev());
    }

    sites.sort_by_key(|s| s.range.start_byte);
    sites
}
