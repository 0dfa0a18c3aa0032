// Logging for Pinpool
//
// Built on the `tracing` ecosystem. Workers run on their own OS threads, so the
// subscriber active when the pool is created is propagated into every worker
// (see `current_subscriber`).
//
// # Usage Examples
//
// ```rust
// use pinpool::logging;
//
// // INFO level, console output
// logging::init_default();
//
// // Or with custom settings
// let config = logging::LogConfig {
//     level: tracing::Level::DEBUG,
//     json_format: false,
//     ..Default::default()
// };
// logging::init(config);
// ```
//
// ## Pool Macros
//
// ```rust
// use pinpool::{log_lifecycle, worker_span};
//
// let span = worker_span!(3);
// let _guard = span.enter();
// log_lifecycle!(3, "running");
// ```

use std::sync::Once;

use tracing::{Level, Subscriber};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Configuration for the logging system
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to display
    pub level: Level,
    /// Whether to use JSON format for logs
    pub json_format: bool,
    /// Whether to include file and line information
    pub show_file_line: bool,
    /// Whether to include thread name/id; worker threads are named after their index
    pub show_thread_info: bool,
    /// Whether to include timestamps
    pub show_time: bool,
    /// Target filter expressions (format: "target=level,target2=level2,...")
    pub target_filters: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            show_file_line: true,
            show_thread_info: true,
            show_time: true,
            target_filters: None,
        }
    }
}

// Initialization guard to ensure we only initialize once
static INIT: Once = Once::new();

/// Initialize the logging system with the given configuration
///
/// Safe to call multiple times; only the first call takes effect.
pub fn init(config: LogConfig) {
    INIT.call_once(|| {
        let mut env_filter = EnvFilter::from_default_env().add_directive(config.level.into());

        if let Some(filters) = &config.target_filters {
            for filter in filters.split(',') {
                if let Ok(directive) = filter.parse() {
                    env_filter = env_filter.add_directive(directive);
                }
            }
        }

        let fmt_layer = fmt::layer()
            .with_ansi(atty::is(atty::Stream::Stdout))
            .with_file(config.show_file_line)
            .with_line_number(config.show_file_line)
            .with_thread_names(config.show_thread_info)
            .with_thread_ids(config.show_thread_info);

        let registry = tracing_subscriber::registry().with(env_filter);

        let subscriber: Box<dyn Subscriber + Send + Sync> = match (config.json_format, config.show_time) {
            (true, _) => Box::new(
                registry.with(
                    fmt::layer()
                        .json()
                        .flatten_event(true)
                        .with_thread_names(config.show_thread_info),
                ),
            ),
            (false, true) => Box::new(registry.with(fmt_layer)),
            (false, false) => Box::new(registry.with(fmt_layer.without_time())),
        };

        set_global_subscriber(subscriber);
    });
}

fn set_global_subscriber<S>(subscriber: S)
where
    S: Subscriber + Send + Sync + 'static,
{
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Error setting global tracing subscriber: {}", err);
    }
}

/// INFO level with human-readable console output.
pub fn init_default() {
    init(LogConfig::default());
}

/// Debug output for the whole crate and trace output for worker threads.
pub fn init_development() {
    let config = LogConfig {
        level: Level::DEBUG,
        json_format: false,
        show_file_line: true,
        show_thread_info: true,
        show_time: true,
        target_filters: Some("pinpool=debug,pinpool::pool::worker=trace".to_string()),
    };
    init(config);
}

/// JSON output without file/line information, for log aggregators.
pub fn init_production() {
    let config = LogConfig {
        level: Level::INFO,
        json_format: true,
        show_file_line: false,
        show_thread_info: true,
        show_time: true,
        target_filters: None,
    };
    init(config);
}

/// Initialize logging for testing
///
/// Only warnings and errors, without thread info or timestamps.
///
/// ```rust,no_run
/// #[test]
/// fn my_test() {
///     pinpool::logging::init_test();
///     // ...
/// }
/// ```
pub fn init_test() {
    let config = LogConfig {
        level: Level::WARN,
        json_format: false,
        show_file_line: true,
        show_thread_info: false,
        show_time: false,
        target_filters: None,
    };
    init(config);
}

/// Span covering everything a worker thread does
///
/// ```rust
/// use pinpool::worker_span;
///
/// let span = worker_span!(0);
/// let _guard = span.enter();
/// ```
#[macro_export]
macro_rules! worker_span {
    ($index:expr) => {
        tracing::info_span!("worker", index = $index)
    };
    ($index:expr, $($fields:tt)*) => {
        tracing::info_span!("worker", index = $index, $($fields)*)
    };
}

/// Span for pool-level operations such as creation and dismissal
#[macro_export]
macro_rules! dispatch_span {
    ($operation:expr) => {
        tracing::info_span!("pool", operation = $operation)
    };
    ($operation:expr, $($fields:tt)*) => {
        tracing::info_span!("pool", operation = $operation, $($fields)*)
    };
}

/// Log worker lifecycle events
///
/// ```rust
/// use pinpool::log_lifecycle;
///
/// log_lifecycle!(2, "dismissed");
/// log_lifecycle!(2, "terminated", discarded = 3);
/// ```
#[macro_export]
macro_rules! log_lifecycle {
    ($index:expr, $event:expr) => {
        tracing::info!(worker = $index, event = $event)
    };
    ($index:expr, $event:expr, $($fields:tt)*) => {
        tracing::info!(worker = $index, event = $event, $($fields)*)
    };
}

/// Log task dispatch events, from the pool or from a single worker
///
/// ```rust
/// use pinpool::log_dispatch;
///
/// log_dispatch!("pool", "submitted", threads = "0-3");
/// log_dispatch!(1, "task_started");
/// ```
#[macro_export]
macro_rules! log_dispatch {
    ($source:expr, $event:expr) => {
        tracing::debug!(source = %$source, event = $event)
    };
    ($source:expr, $event:expr, $($fields:tt)*) => {
        tracing::debug!(source = %$source, event = $event, $($fields)*)
    };
}

/// Log error events
///
/// ```rust
/// use pinpool::log_error;
///
/// let error = std::io::Error::new(std::io::ErrorKind::Other, "engine went away");
/// log_error!(error, worker = 0);
/// ```
#[macro_export]
macro_rules! log_error {
    ($error:expr) => {
        tracing::error!(error = %$error)
    };
    ($error:expr, $($fields:tt)*) => {
        tracing::error!(error = %$error, $($fields)*)
    };
}

/// Get the current tracing dispatcher
///
/// Worker threads install it with `tracing::dispatcher::set_default` so their
/// events reach the same subscriber as the thread that created the pool.
#[inline]
pub fn current_subscriber() -> tracing::Dispatch {
    tracing::dispatcher::get_default(|d| d.clone())
}

pub use tracing::{debug, error, info, trace, warn};
