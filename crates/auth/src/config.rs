//! Konfiguration des Auth-Kerns
//!
//! Wird als Abschnitt `[auth]` aus der Server-TOML gelesen. Die
//! Signaturschluessel kommen nur aus der Umgebung
//! (siehe [`crate::token::SignaturSchluessel`]).

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Argon2id-Kostenparameter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Argon2Konfig {
    /// Speicherbedarf in KiB
    pub speicher_kib: u32,
    pub iterationen: u32,
    pub parallelitaet: u32,
}

impl Default for Argon2Konfig {
    fn default() -> Self {
        Self {
            speicher_kib: 64 * 1024,
            iterationen: 3,
            parallelitaet: 1,
        }
    }
}

/// Einstellungen fuer Tokens, Sitzungen und Speicherzugriffe
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthKonfig {
    /// Lebensdauer eines Access-Tokens
    pub zugriff_ttl_sekunden: u64,
    /// Lebensdauer eines Refresh-Tokens und seiner Sitzung
    pub refresh_ttl_sekunden: u64,
    /// Bei `true` liefert jede Erneuerung ein neues Refresh-Token und
    /// widerruft das vorgelegte
    pub refresh_rotation: bool,
    /// Intervall der globalen Bereinigung abgelaufener Sitzungen
    pub bereinigung_intervall_sekunden: u64,
    /// Obergrenze fuer jeden einzelnen Speicheraufruf
    pub speicher_zeitlimit_ms: u64,
    pub passwort_min_laenge: usize,
    pub argon2: Argon2Konfig,
}

impl Default for AuthKonfig {
    fn default() -> Self {
        Self {
            zugriff_ttl_sekunden: 60 * 60,
            refresh_ttl_sekunden: 30 * 24 * 60 * 60,
            refresh_rotation: false,
            bereinigung_intervall_sekunden: 60 * 60,
            speicher_zeitlimit_ms: 5_000,
            passwort_min_laenge: 6,
            argon2: Argon2Konfig::default(),
        }
    }
}

impl AuthKonfig {
    pub fn zugriff_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.zugriff_ttl_sekunden as i64)
    }

    pub fn refresh_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.refresh_ttl_sekunden as i64)
    }

    pub fn bereinigung_intervall(&self) -> Duration {
        Duration::from_secs(self.bereinigung_intervall_sekunden.max(1))
    }

    pub fn speicher_zeitlimit(&self) -> Duration {
        Duration::from_millis(self.speicher_zeitlimit_ms.max(1))
    }
}
