//! Language identification
//!
//! Maps filetype tags, file extensions and paths to language IDs.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Supported language identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageId {
    #[default]
    PlainText,
    Rust,
    Markdown,
    Json,
    Python,
    Go,
    C,
    Bash,
}

impl LanguageId {
    /// Every language that ships a grammar
    pub const WITH_GRAMMAR: [LanguageId; 7] = [
        LanguageId::Rust,
        LanguageId::Markdown,
        LanguageId::Json,
        LanguageId::Python,
        LanguageId::Go,
        LanguageId::C,
        LanguageId::Bash,
    ];

    /// Resolve a filetype tag (`"rust"`, `"markdown"`, ...) or a common
    /// alias of one. Unknown tags are plain text.
    pub fn from_filetype(filetype: &str) -> Self {
        Self::lookup(filetype).unwrap_or_default()
    }

    /// Strict filetype lookup: `None` for tags that name no known language.
    /// Plain-text tags (`"text"`, `"plain"`, `"txt"`, empty) resolve to
    /// `PlainText`.
    pub fn lookup(filetype: &str) -> Option<Self> {
        let language = match filetype.trim().to_lowercase().as_str() {
            "" | "text" | "plain" | "plaintext" | "txt" => LanguageId::PlainText,
            "rust" | "rs" => LanguageId::Rust,
            "markdown" | "md" => LanguageId::Markdown,
            "json" | "jsonc" => LanguageId::Json,
            "python" | "py" => LanguageId::Python,
            "go" | "golang" => LanguageId::Go,
            "c" | "h" => LanguageId::C,
            "bash" | "sh" | "shell" | "zsh" => LanguageId::Bash,
            _ => return None,
        };
        Some(language)
    }

    /// Detect language from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "rs" => LanguageId::Rust,
            "md" | "markdown" => LanguageId::Markdown,
            "json" => LanguageId::Json,
            "py" | "pyi" => LanguageId::Python,
            "go" => LanguageId::Go,
            "c" | "h" => LanguageId::C,
            "sh" | "bash" => LanguageId::Bash,
            _ => LanguageId::PlainText,
        }
    }

    /// Detect language from file path
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(LanguageId::PlainText)
    }

    /// Canonical filetype tag
    pub fn filetype(&self) -> &'static str {
        match self {
            LanguageId::PlainText => "text",
            LanguageId::Rust => "rust",
            LanguageId::Markdown => "markdown",
            LanguageId::Json => "json",
            LanguageId::Python => "python",
            LanguageId::Go => "go",
            LanguageId::C => "c",
            LanguageId::Bash => "bash",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            LanguageId::PlainText => "Plain Text",
            LanguageId::Rust => "Rust",
            LanguageId::Markdown => "Markdown",
            LanguageId::Json => "JSON",
            LanguageId::Python => "Python",
            LanguageId::Go => "Go",
            LanguageId::C => "C",
            LanguageId::Bash => "Bash",
        }
    }

    pub fn has_highlighting(&self) -> bool {
        !matches!(self, LanguageId::PlainText)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_filetype() {
        assert_eq!(LanguageId::from_filetype("rust"), LanguageId::Rust);
        assert_eq!(LanguageId::from_filetype("Markdown"), LanguageId::Markdown);
        assert_eq!(LanguageId::from_filetype("sh"), LanguageId::Bash);
        assert_eq!(LanguageId::from_filetype("cobol"), LanguageId::PlainText);
    }

    #[test]
    fn test_lookup_separates_unknown_from_plain() {
        assert_eq!(LanguageId::lookup("cobol"), None);
        assert_eq!(LanguageId::lookup("text"), Some(LanguageId::PlainText));
        assert_eq!(LanguageId::lookup(""), Some(LanguageId::PlainText));
        assert_eq!(LanguageId::lookup(" PY "), Some(LanguageId::Python));
    }

    #[test]
    fn test_from_extension() {
        assert_eq!(LanguageId::from_extension("rs"), LanguageId::Rust);
        assert_eq!(LanguageId::from_extension("MD"), LanguageId::Markdown);
        assert_eq!(LanguageId::from_extension("py"), LanguageId::Python);
        assert_eq!(LanguageId::from_extension("txt"), LanguageId::PlainText);
    }

    #[test]
    fn test_from_path() {
        assert_eq!(
            LanguageId::from_path(Path::new("/path/to/README.md")),
            LanguageId::Markdown
        );
        assert_eq!(
            LanguageId::from_path(Path::new("main.go")),
            LanguageId::Go
        );
        assert_eq!(
            LanguageId::from_path(Path::new("no_extension")),
            LanguageId::PlainText
        );
    }

    #[test]
    fn test_filetype_round_trips() {
        for lang in LanguageId::WITH_GRAMMAR {
            assert_eq!(LanguageId::from_filetype(lang.filetype()), lang);
        }
    }
}
