//! textflow - line-break scanning and incremental syntax highlighting
//!
//! Two independent halves:
//!
//! - [`scan`]: finds line terminators in byte buffers with several
//!   interchangeable strategies that always agree.
//! - The highlight pipeline: [`client::HighlightClient`] mirrors buffers and
//!   talks to a [`worker`] thread that owns the parse trees, dropping any
//!   highlight result older than the text it describes.

pub mod buffer;
pub mod client;
pub mod config;
pub mod config_paths;
pub mod error;
pub mod perf;
pub mod scan;
pub mod syntax;
pub mod tracing;
pub mod worker;

// Re-export commonly used types
pub use buffer::{BufferId, Edit, Position, TextMutation};
pub use client::{HighlightClient, HighlightEvent};
pub use config::EngineConfig;
pub use error::{EditError, EngineError};
pub use perf::{PerformanceStats, PerformanceTracker};
pub use scan::{scan, Algorithm, BreakResult, LineBreakScanner};
pub use syntax::{HighlightRange, HighlightResponse, LanguageId};
