//! Datenbankmodelle fuer ArticuLink
//!
//! Diese Typen repraesentieren Datensaetze aus der Datenbank. Pflichtfelder
//! sind explizit typisiert; Zustaende wie Status oder Deaktivierungsart sind
//! Enums statt freier Strings.

use articulink_core::KontoId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Konten
// ---------------------------------------------------------------------------

/// Rolle eines Kontos
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum KontoRolle {
    #[default]
    #[serde(rename = "user")]
    Benutzer,
    #[serde(rename = "admin")]
    Administrator,
}

impl KontoRolle {
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Benutzer => "user",
            Self::Administrator => "admin",
        }
    }
}

impl std::str::FromStr for KontoRolle {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::Benutzer),
            "admin" => Ok(Self::Administrator),
            other => Err(format!("Unbekannte Rolle: {other}")),
        }
    }
}

/// Gespeicherter Kontostatus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum KontoStatus {
    #[default]
    #[serde(rename = "active")]
    Aktiv,
    #[serde(rename = "inactive")]
    Inaktiv,
}

impl KontoStatus {
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Aktiv => "active",
            Self::Inaktiv => "inactive",
        }
    }
}

impl std::str::FromStr for KontoStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Aktiv),
            "inactive" => Ok(Self::Inaktiv),
            other => Err(format!("Unbekannter Kontostatus: {other}")),
        }
    }
}

/// Art einer Deaktivierung
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeaktivierungsArt {
    #[serde(rename = "temporary")]
    Temporaer,
    #[serde(rename = "permanent")]
    Permanent,
}

impl DeaktivierungsArt {
    pub fn als_str(&self) -> &'static str {
        match self {
            Self::Temporaer => "temporary",
            Self::Permanent => "permanent",
        }
    }
}

impl std::str::FromStr for DeaktivierungsArt {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "temporary" => Ok(Self::Temporaer),
            "permanent" => Ok(Self::Permanent),
            other => Err(format!("Unbekannte Deaktivierungsart: {other}")),
        }
    }
}

/// Metadaten einer Deaktivierung
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deaktivierung {
    pub art: DeaktivierungsArt,
    pub grund: Option<String>,
    /// Ende einer temporaeren Deaktivierung
    pub ende: Option<DateTime<Utc>>,
}

/// Profilfelder (werden vom Sitzungskern nur durchgereicht)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KontoProfil {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_pic: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub gender: Option<String>,
}

/// Eine Refresh-Sitzung: nur der Fingerabdruck des Tokens wird gespeichert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshSitzungRecord {
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl RefreshSitzungRecord {
    /// Abgelaufen ist eine Sitzung erst, wenn `expires_at` vor `jetzt` liegt
    pub fn ist_abgelaufen(&self, jetzt: DateTime<Utc>) -> bool {
        self.expires_at < jetzt
    }
}

/// Konto-Datensatz aus der Datenbank
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KontoRecord {
    pub id: KontoId,
    pub email: String,
    pub password_hash: String,
    pub role: KontoRolle,
    pub status: KontoStatus,
    pub deaktivierung: Option<Deaktivierung>,
    pub profil: KontoProfil,
    pub created_at: DateTime<Utc>,
    /// Refresh-Sitzungen in Einfuegereihenfolge (aelteste zuerst)
    pub refresh_tokens: Vec<RefreshSitzungRecord>,
}

/// Daten zum Erstellen eines neuen Kontos
#[derive(Debug, Clone)]
pub struct NeuesKonto<'a> {
    pub email: &'a str,
    pub password_hash: &'a str,
    pub role: KontoRolle,
    pub profil: KontoProfil,
}

/// Daten zum Aktualisieren eines Kontos
///
/// `deaktivierung: Some(None)` entfernt die Deaktivierungs-Metadaten.
#[derive(Debug, Clone, Default)]
pub struct KontoUpdate {
    pub password_hash: Option<String>,
    pub role: Option<KontoRolle>,
    pub status: Option<KontoStatus>,
    pub deaktivierung: Option<Option<Deaktivierung>>,
    pub profil: Option<KontoProfil>,
}

impl KontoUpdate {
    pub fn ist_leer(&self) -> bool {
        self.password_hash.is_none()
            && self.role.is_none()
            && self.status.is_none()
            && self.deaktivierung.is_none()
            && self.profil.is_none()
    }
}

/// Ergebnis eines atomaren Sitzungs-Anhaengens
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SitzungAngehaengt {
    /// Anzahl der dabei entfernten abgelaufenen Sitzungen
    pub abgelaufen_entfernt: u64,
    /// Wegen der Obergrenze verdraengte Sitzungen (aelteste zuerst)
    pub verdraengt: Vec<RefreshSitzungRecord>,
}
