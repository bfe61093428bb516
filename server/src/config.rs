//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! Standardwerte, sodass der Server ohne Konfigurationsdatei lauffaehig ist.
//! Die Signaturschluessel stehen nie in der Datei.

use articulink_auth::AuthKonfig;
use articulink_db::{DatabaseBackend, DatabaseConfig};
use articulink_observability::LoggingKonfig;
use serde::{Deserialize, Serialize};

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Datenbank-Einstellungen
    pub datenbank: DatenbankEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingKonfig,
    /// Tokens, Sitzungen, Passwort-Hashing
    pub auth: AuthKonfig,
}

/// Datenbank-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatenbankEinstellungen {
    /// Backend: "sqlite" oder "speicher"
    pub typ: String,
    /// Verbindungs-URL (nur SQLite)
    pub url: String,
    /// Maximale Verbindungspool-Groesse
    pub max_verbindungen: u32,
    /// WAL-Modus fuer SQLite
    pub sqlite_wal: bool,
}

impl Default for DatenbankEinstellungen {
    fn default() -> Self {
        let standard = DatabaseConfig::default();
        Self {
            typ: "sqlite".into(),
            url: standard.url,
            max_verbindungen: standard.max_verbindungen,
            sqlite_wal: standard.sqlite_wal,
        }
    }
}

impl DatenbankEinstellungen {
    /// Uebersetzt in die Konfiguration des DB-Crates
    pub fn als_db_config(&self) -> anyhow::Result<DatabaseConfig> {
        let backend = self
            .typ
            .parse::<DatabaseBackend>()
            .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in [datenbank]: {e}"))?;
        Ok(DatabaseConfig {
            backend,
            url: self.url.clone(),
            max_verbindungen: self.max_verbindungen.max(1),
            sqlite_wal: self.sqlite_wal,
        })
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Logging ist hier noch nicht initialisiert
                eprintln!("Konfigurationsdatei '{pfad}' nicht gefunden, verwende Standardwerte");
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }
}
