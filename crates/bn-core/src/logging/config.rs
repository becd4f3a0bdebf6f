//! Logging configuration.
//!
//! Resolution order for the filter: `-v`/`-q` on the command line, then a
//! level in `BN_LOG`, then raw `RUST_LOG` directives, then `info`.
//! `BN_LOG_FORMAT` and `BN_LOG_TIMESTAMPS` select the output shape unless
//! `--log-format` is given.

use serde::{Deserialize, Serialize};

/// Log output format on stderr.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Human,
    /// One JSON object per line.
    #[value(alias = "json")]
    Jsonl,
}

/// Minimum level for engine events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Every message transfer.
    Trace,
    /// Sweep and search details.
    Debug,
    /// Load, build and query milestones.
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    const LADDER: [LogLevel; 5] = [
        LogLevel::Error,
        LogLevel::Warn,
        LogLevel::Info,
        LogLevel::Debug,
        LogLevel::Trace,
    ];

    /// Level requested by `-q` and repeated `-v`, if either was given.
    ///
    /// Each `-v` moves one step past `info`; `-q` wins over `-v`.
    pub fn from_verbosity(verbose: u8, quiet: bool) -> Option<Self> {
        if quiet {
            return Some(LogLevel::Error);
        }
        if verbose == 0 {
            return None;
        }
        let step = (2 + verbose as usize).min(Self::LADDER.len() - 1);
        Some(Self::LADDER[step])
    }

    /// Directive name understood by `EnvFilter`.
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::LADDER
            .into_iter()
            .find(|level| level.as_str() == wanted)
            .ok_or_else(|| format!("unknown log level: {}", s))
    }
}

/// Resolved logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: LogLevel,
    /// Raw `RUST_LOG` directives, used only when no level was chosen
    /// explicitly.
    pub directives: Option<String>,
    /// Prefix human output with timestamps.
    pub timestamps: bool,
}

impl LogConfig {
    /// Resolve from the process environment and CLI overrides.
    pub fn from_env(cli_level: Option<LogLevel>, cli_format: Option<LogFormat>) -> Self {
        Self::resolve(|key| std::env::var(key).ok(), cli_level, cli_format)
    }

    /// Resolve from `lookup` instead of the process environment.
    pub fn resolve(
        lookup: impl Fn(&str) -> Option<String>,
        cli_level: Option<LogLevel>,
        cli_format: Option<LogFormat>,
    ) -> Self {
        let mut config = LogConfig::default();

        let env_level = lookup("BN_LOG").and_then(|v| v.parse::<LogLevel>().ok());
        match cli_level.or(env_level) {
            Some(level) => config.level = level,
            None => config.directives = lookup("RUST_LOG").filter(|v| !v.trim().is_empty()),
        }

        config.format = cli_format
            .or_else(|| {
                lookup("BN_LOG_FORMAT")
                    .and_then(|v| <LogFormat as clap::ValueEnum>::from_str(&v, true).ok())
            })
            .unwrap_or_default();
        config.timestamps = lookup("BN_LOG_TIMESTAMPS").is_some_and(|v| v == "1" || v == "true");

        config
    }

    /// `EnvFilter` directive string for this configuration.
    pub fn filter_directives(&self) -> String {
        match &self.directives {
            Some(raw) => raw.clone(),
            None => format!("bn_core={}", self.level.as_str()),
        }
    }
}
