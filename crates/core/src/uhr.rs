//! Injizierbare Zeitquelle
//!
//! Alle Ablauf- und Reaktivierungsentscheidungen lesen die Zeit ueber
//! [`Uhr`]. Im Betrieb ist das [`SystemUhr`], in Tests [`FesteUhr`], die
//! explizit vorgestellt wird.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// Quelle fuer die aktuelle Zeit
pub trait Uhr: Send + Sync {
    fn jetzt(&self) -> DateTime<Utc>;
}

/// Wanduhr des Systems
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemUhr;

impl Uhr for SystemUhr {
    fn jetzt(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manuell gesteuerte Uhr
#[derive(Debug)]
pub struct FesteUhr {
    zeit: Mutex<DateTime<Utc>>,
}

impl FesteUhr {
    /// Erstellt eine Uhr, die auf `start` steht
    pub fn neu(start: DateTime<Utc>) -> Self {
        Self {
            zeit: Mutex::new(start),
        }
    }

    /// Erstellt eine Uhr auf der aktuellen Wanduhrzeit (ganze Sekunden)
    pub fn ab_jetzt() -> Self {
        let jetzt = Utc::now();
        let sekunden = DateTime::from_timestamp(jetzt.timestamp(), 0).unwrap_or(jetzt);
        Self::neu(sekunden)
    }

    /// Stellt die Uhr um `dauer` vor
    pub fn vorstellen(&self, dauer: Duration) {
        let mut zeit = self.zeit.lock();
        *zeit += dauer;
    }

    /// Setzt die Uhr auf einen festen Zeitpunkt
    pub fn setzen(&self, zeitpunkt: DateTime<Utc>) {
        *self.zeit.lock() = zeitpunkt;
    }
}

impl Uhr for FesteUhr {
    fn jetzt(&self) -> DateTime<Utc> {
        *self.zeit.lock()
    }
}
