//! Identifikationstypen fuer ArticuLink
//!
//! IDs verwenden das Newtype-Pattern, damit eine Konto-ID nicht mit einer
//! beliebigen anderen UUID (z.B. einer Sitzungs-ID) verwechselt werden kann.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Eindeutige Konto-ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KontoId(pub Uuid);

impl KontoId {
    /// Erstellt eine neue zufaellige KontoId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }

    /// Parst eine KontoId aus der Textform (z.B. dem `sub`-Claim eines Tokens)
    pub fn parsen(text: &str) -> Option<Self> {
        Uuid::parse_str(text).ok().map(Self)
    }
}

impl Default for KontoId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for KontoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "konto:{}", self.0)
    }
}
