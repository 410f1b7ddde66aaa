//! Process-wide tracing setup for the `apiwatch` binary.

use std::fmt as stdfmt;
use std::str::FromStr;
use std::sync::Once;

use tracing::Subscriber;
use tracing_log::LogTracer;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, registry::LookupSpan,
};

static INIT: Once = Once::new();

/// HTTP client internals log every connection at debug; keep them quiet
/// unless asked for explicitly.
const DEFAULT_DIRECTIVES: &str = "info,hyper=warn,hyper_util=warn,reqwest=warn";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human readable, colored when attached to a terminal.
    #[default]
    Pretty,
    /// One JSON object per line, with the span stack.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format `{other}`, expected pretty or json")),
        }
    }
}

impl stdfmt::Display for LogFormat {
    fn fmt(&self, f: &mut stdfmt::Formatter<'_>) -> stdfmt::Result {
        f.write_str(match self {
            LogFormat::Pretty => "pretty",
            LogFormat::Json => "json",
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct Config {
    /// Either a simple level like "debug" or a full EnvFilter string
    /// e.g. "info,endpoint_monitor=debug". `None` uses quiet defaults.
    pub level: Option<String>,
    pub format: LogFormat,
    /// Include the module target in each line.
    pub with_targets: bool,
}

/// `RUST_LOG` wins over the configured level. Anything unparsable falls
/// back to the defaults.
pub(crate) fn build_filter(level: Option<&str>) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_env("RUST_LOG") {
        return filter;
    }
    level
        .and_then(|l| EnvFilter::try_new(l).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVES))
}

/// Formatting layer for `cfg`, writing through `writer`.
pub(crate) fn build_layer<S, W>(cfg: &Config, writer: W) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    let base = fmt::layer().with_target(cfg.with_targets).with_writer(writer);
    match cfg.format {
        LogFormat::Json => base
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .boxed(),
        LogFormat::Pretty => base.with_ansi(true).boxed(),
    }
}

/// Install the global subscriber once. Later calls are no-ops.
pub fn init(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let mut result = Ok(());

    INIT.call_once(|| {
        let _ = LogTracer::init();

        let subscriber = Registry::default()
            .with(build_filter(cfg.level.as_deref()))
            .with(build_layer(cfg, std::io::stdout));
        if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
            result = Err(e.into());
        }
    });

    result
}
