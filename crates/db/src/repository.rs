//! Repository-Trait-Definitionen
//!
//! Das Repository-Pattern entkoppelt die Geschaeftslogik von der konkreten
//! Datenbank-Implementierung. Die Methoden liefern `Send`-Futures, damit
//! Aufrufer (z.B. der periodische Bereinigungs-Task) sie in `tokio::spawn`
//! verwenden koennen.

use std::future::Future;

use articulink_core::KontoId;
use chrono::{DateTime, Utc};

use crate::error::DbError;
use crate::models::{
    KontoRecord, KontoUpdate, NeuesKonto, RefreshSitzungRecord, SitzungAngehaengt,
};

/// Result-Alias fuer alle Repository-Operationen
pub type DbResult<T> = Result<T, DbError>;

/// Unterstuetzte Datenbank-Backends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseBackend {
    /// SQLite – Standard fuer den Betrieb
    Sqlite,
    /// Fluechtiger In-Memory-Speicher (Entwicklung, Tests)
    Speicher,
}

impl std::fmt::Display for DatabaseBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite => write!(f, "SQLite"),
            Self::Speicher => write!(f, "In-Memory"),
        }
    }
}

impl std::str::FromStr for DatabaseBackend {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sqlite" => Ok(Self::Sqlite),
            "speicher" => Ok(Self::Speicher),
            other => Err(format!("Unbekanntes Datenbank-Backend: {other}")),
        }
    }
}

/// Konfiguration fuer die Datenbankverbindung
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Ausgewaehltes Backend
    pub backend: DatabaseBackend,
    /// Verbindungs-URL (z.B. "sqlite://articulink.db")
    pub url: String,
    /// Maximale Anzahl gleichzeitiger Verbindungen im Pool
    pub max_verbindungen: u32,
    /// Ob WAL-Modus bei SQLite aktiviert werden soll
    pub sqlite_wal: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: DatabaseBackend::Sqlite,
            url: "sqlite://articulink.db".into(),
            max_verbindungen: 5,
            sqlite_wal: true,
        }
    }
}

/// Repository fuer Konto-Datensaetze
pub trait KontoRepository: Send + Sync {
    /// Legt ein neues Konto an (E-Mail muss eindeutig sein)
    fn create(
        &self,
        data: NeuesKonto<'_>,
    ) -> impl Future<Output = DbResult<KontoRecord>> + Send;

    /// Laedt ein Konto anhand seiner ID
    fn get_by_id(&self, id: KontoId) -> impl Future<Output = DbResult<Option<KontoRecord>>> + Send;

    /// Laedt ein Konto anhand seiner (kleingeschriebenen) E-Mail
    fn get_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = DbResult<Option<KontoRecord>>> + Send;

    /// Aktualisiert die gesetzten Felder eines Kontos
    fn update(
        &self,
        id: KontoId,
        data: KontoUpdate,
    ) -> impl Future<Output = DbResult<KontoRecord>> + Send;

    /// Loescht ein Konto samt Sitzungen
    fn delete(&self, id: KontoId) -> impl Future<Output = DbResult<bool>> + Send;

    /// Reaktiviert ein Konto, aber nur wenn es noch temporaer deaktiviert ist
    /// und das Ende vor `jetzt` liegt. Gibt `true` zurueck wenn geschrieben wurde.
    fn reactivate_expired(
        &self,
        id: KontoId,
        jetzt: DateTime<Utc>,
    ) -> impl Future<Output = DbResult<bool>> + Send;
}

/// Repository fuer die Refresh-Sitzungsliste eines Kontos
///
/// Jede Methode ist pro Konto atomar.
pub trait SitzungRepository: Send + Sync {
    /// Haengt eine Sitzung an: entfernt abgelaufene, verdraengt bei Erreichen
    /// von `obergrenze` die aeltesten und fuegt dann ein, alles in einem Schritt.
    fn append_session(
        &self,
        konto_id: KontoId,
        sitzung: RefreshSitzungRecord,
        obergrenze: usize,
        jetzt: DateTime<Utc>,
    ) -> impl Future<Output = DbResult<SitzungAngehaengt>> + Send;

    /// Tauscht eine nicht abgelaufene Sitzung gegen eine neue, in einem Schritt.
    /// Gibt `false` zurueck (ohne Aenderung) wenn `alter_hash` nicht mehr
    /// gueltig vorhanden ist.
    fn replace_session(
        &self,
        konto_id: KontoId,
        alter_hash: &str,
        neue: RefreshSitzungRecord,
        jetzt: DateTime<Utc>,
    ) -> impl Future<Output = DbResult<bool>> + Send;

    /// Sucht eine Sitzung anhand des Token-Fingerabdrucks
    fn find_session(
        &self,
        konto_id: KontoId,
        token_hash: &str,
    ) -> impl Future<Output = DbResult<Option<RefreshSitzungRecord>>> + Send;

    /// Setzt `last_used` einer Sitzung
    fn touch_session(
        &self,
        konto_id: KontoId,
        token_hash: &str,
        jetzt: DateTime<Utc>,
    ) -> impl Future<Output = DbResult<bool>> + Send;

    /// Entfernt genau die Sitzung mit diesem Fingerabdruck
    fn remove_session(
        &self,
        konto_id: KontoId,
        token_hash: &str,
    ) -> impl Future<Output = DbResult<bool>> + Send;

    /// Entfernt alle Sitzungen eines Kontos
    fn clear_sessions(&self, konto_id: KontoId) -> impl Future<Output = DbResult<u64>> + Send;

    /// Alle Sitzungen eines Kontos in Einfuegereihenfolge
    fn list_sessions(
        &self,
        konto_id: KontoId,
    ) -> impl Future<Output = DbResult<Vec<RefreshSitzungRecord>>> + Send;

    /// Entfernt kontenuebergreifend alle Sitzungen mit `expires_at < jetzt`
    fn purge_expired(&self, jetzt: DateTime<Utc>) -> impl Future<Output = DbResult<u64>> + Send;
}
