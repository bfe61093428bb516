//! articulink-core – Gemeinsame Typen und Zeitquelle
//!
//! Dieses Crate stellt die Bausteine bereit, die von allen anderen
//! ArticuLink-Crates gemeinsam genutzt werden: die Konto-ID und die
//! injizierbare Uhr.

pub mod types;
pub mod uhr;

// Re-Exporte fuer bequemen Zugriff
pub use types::KontoId;
pub use uhr::{FesteUhr, SystemUhr, Uhr};
