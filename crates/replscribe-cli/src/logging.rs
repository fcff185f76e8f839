//! Logging configuration and initialization.
//!
//! Presets select a baseline per `replscribe::` target, `--log` flags override
//! single targets and `RUST_LOG` replaces both. Logs go to stderr so the
//! transcript JSON on stdout stays clean.

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Invalid log format: '{}'. Use 'text' or 'json'.", s)),
        }
    }
}

/// Logging preset levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogPreset {
    /// Startup and process lifecycle only
    Production,
    /// Adds per-run driver detail
    Verbose,
    /// Every line sent and received
    Debug,
    /// Everything, including raw PTY reads and match attempts
    Trace,
    /// Warnings and errors only
    Quiet,
}

/// Logging configuration built from CLI arguments.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub preset: LogPreset,
    /// `--log` overrides in command-line order; later entries win.
    pub overrides: Vec<(String, Level)>,
    pub format: LogFormat,
}

impl LogPreset {
    /// The most restrictive flag given wins; no flag means production.
    fn from_flags(verbose: bool, debug: bool, trace: bool, quiet: bool) -> Self {
        match (quiet, trace, debug, verbose) {
            (true, ..) => LogPreset::Quiet,
            (_, true, ..) => LogPreset::Trace,
            (_, _, true, _) => LogPreset::Debug,
            (_, _, _, true) => LogPreset::Verbose,
            _ => LogPreset::Production,
        }
    }

    fn directives(self) -> &'static [&'static str] {
        match self {
            LogPreset::Production => &[
                "replscribe=warn",
                "replscribe::startup=info",
                "replscribe::process=info",
            ],
            LogPreset::Verbose => &["replscribe=info", "replscribe::matcher=warn"],
            LogPreset::Debug => &["replscribe=debug", "replscribe::matcher=info"],
            LogPreset::Trace => &["replscribe=trace"],
            LogPreset::Quiet => &["replscribe=warn"],
        }
    }
}

impl LogConfig {
    /// Build from the logging flags. Fails on a malformed `--log` entry.
    pub fn from_cli(
        verbose: bool,
        debug: bool,
        trace: bool,
        quiet: bool,
        log_overrides: &[String],
        format: LogFormat,
    ) -> Result<Self, String> {
        let overrides = log_overrides
            .iter()
            .flat_map(|arg| arg.split(','))
            .filter(|part| !part.trim().is_empty())
            .map(parse_override)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            preset: LogPreset::from_flags(verbose, debug, trace, quiet),
            overrides,
            format,
        })
    }

    /// `RUST_LOG` when set, otherwise the preset plus overrides.
    pub fn build_filter(&self) -> EnvFilter {
        if let Ok(env_filter) = EnvFilter::try_from_default_env() {
            return env_filter;
        }

        let directives: Vec<String> = self
            .preset
            .directives()
            .iter()
            .map(|d| d.to_string())
            .chain(self.overrides.iter().map(|(target, level)| format!("{}={}", target, level)))
            .collect();
        EnvFilter::try_new(directives.join(",")).unwrap_or_else(|_| EnvFilter::new("warn"))
    }
}

/// Parse one `target=level` pair; a bare target gets the `replscribe::` prefix.
fn parse_override(part: &str) -> Result<(String, Level), String> {
    let (target, level) = part
        .split_once('=')
        .ok_or_else(|| format!("Invalid --log entry '{}': expected TARGET=LEVEL", part))?;
    let target = target.trim();
    if target.is_empty() {
        return Err(format!("Invalid --log entry '{}': empty target", part));
    }
    let level = level
        .trim()
        .parse::<Level>()
        .map_err(|_| format!("Invalid log level '{}' in --log entry '{}'", level.trim(), part))?;

    let target = if target == "replscribe" || target.starts_with("replscribe::") {
        target.to_string()
    } else {
        format!("replscribe::{}", target)
    };
    Ok((target, level))
}

/// Initialize the tracing subscriber with the given configuration.
pub fn init(config: &LogConfig) {
    let filter = config.build_filter();

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_thread_ids(false)
                        .with_file(false)
                        .with_line_number(false),
                )
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_span_events(FmtSpan::CLOSE),
                )
                .init();
        }
    }
}
