//! ArticuLink Server – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und startet den Server.

use anyhow::Result;
use articulink_server::{config::ServerConfig, Server};

/// Umgebungsvariable mit dem Pfad zur Konfigurationsdatei
const ENV_CONFIG: &str = "ARTICULINK_CONFIG";

#[tokio::main]
async fn main() -> Result<()> {
    let config_pfad = std::env::var(ENV_CONFIG).unwrap_or_else(|_| "config.toml".into());

    // Standardwerte falls Datei fehlt
    let config = ServerConfig::laden(&config_pfad)?;

    articulink_observability::logging_initialisieren(&config.logging)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        "ArticuLink Server wird initialisiert"
    );

    Server::neu(config).starten().await
}
