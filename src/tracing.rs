//! Log output for the engine and CLI
//!
//! Filter with `RUST_LOG`, for example `RUST_LOG=textflow::worker=trace` for
//! per-request worker detail or `RUST_LOG=textflow::client=debug` for stale
//! response drops. Console output goes to stderr so JSON on stdout stays
//! clean. A debug-level copy is kept in `<config dir>/logs/textflow.log`,
//! rotated daily.

use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

const LOG_FILE_PREFIX: &str = "textflow.log";

/// Where logs go and how loud the console is
#[derive(Debug, Clone)]
pub struct LogSettings {
    /// Console directive used when `RUST_LOG` is unset
    pub console_default: String,
    pub file: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            console_default: "warn".to_string(),
            file: true,
        }
    }
}

/// Install the global subscriber with default settings
pub fn init() {
    init_with(&LogSettings::default());
}

pub fn init_with(settings: &LogSettings) {
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.console_default));
    let mut layers: Vec<BoxedLayer> = vec![fmt::layer()
        .with_writer(std::io::stderr)
        .with_line_number(true)
        .with_filter(console_filter)
        .boxed()];

    if settings.file {
        layers.extend(file_layer());
    }

    // Another subscriber may already be installed (tests, embedding hosts)
    if let Err(e) = tracing_subscriber::registry().with(layers).try_init() {
        eprintln!("textflow: logging not initialized: {}", e);
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn file_layer() -> Option<BoxedLayer> {
    let logs_dir = match crate::config_paths::ensure_logs_dir() {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("textflow: file logging disabled: {}", e);
            return None;
        }
    };
    let appender = tracing_appender::rolling::daily(logs_dir, LOG_FILE_PREFIX);
    Some(
        fmt::layer()
            .with_writer(appender)
            .with_ansi(false)
            .with_thread_names(true)
            .with_line_number(true)
            .with_filter(EnvFilter::new("debug"))
            .boxed(),
    )
}
