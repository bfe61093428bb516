//! Structured Logging Setup via tracing-subscriber
//!
//! Die Werte aus der Konfiguration koennen per Umgebung uebersteuert werden:
//! - `AL_LOG_LEVEL`: Filter-Direktive (z.B. `info` oder `articulink_auth=debug`)
//! - `AL_LOG_FORMAT`: `text` oder `json`

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, EnvFilter};

pub const ENV_LOG_LEVEL: &str = "AL_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "AL_LOG_FORMAT";

/// Ausgabeformat der Logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("Unbekanntes Log-Format: {other}")),
        }
    }
}

/// Abschnitt `[logging]` der Server-Konfiguration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingKonfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingKonfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Text,
        }
    }
}

/// Initialisiert den globalen Subscriber.
///
/// Schlaegt fehl, wenn bereits ein Subscriber gesetzt ist.
pub fn logging_initialisieren(konfig: &LoggingKonfig) -> anyhow::Result<()> {
    let level = level_waehlen(std::env::var(ENV_LOG_LEVEL).ok().as_deref(), &konfig.level);
    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"));
    let format = format_waehlen(std::env::var(ENV_LOG_FORMAT).ok().as_deref(), konfig.format);

    match format {
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_current_span(true)
            .try_init(),
        LogFormat::Text => fmt().with_env_filter(filter).with_target(true).try_init(),
    }
    .map_err(|e| anyhow::anyhow!("Logging konnte nicht initialisiert werden: {e}"))
}

/// Umgebung vor Konfiguration; leere Werte zaehlen nicht
fn level_waehlen(aus_env: Option<&str>, konfiguriert: &str) -> String {
    match aus_env.map(str::trim) {
        Some(level) if !level.is_empty() => level.to_string(),
        _ => konfiguriert.to_string(),
    }
}

/// Ein ungueltiger Wert in der Umgebung faellt auf die Konfiguration zurueck
fn format_waehlen(aus_env: Option<&str>, konfiguriert: LogFormat) -> LogFormat {
    aus_env
        .and_then(|f| f.trim().to_ascii_lowercase().parse().ok())
        .unwrap_or(konfiguriert)
}
