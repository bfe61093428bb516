//! articulink-db – Konto- und Sitzungs-Persistenz
//!
//! Dieses Crate stellt das Repository-Pattern bereit. Die Geschaeftslogik
//! (articulink-auth) kennt nur die Traits [`KontoRepository`] und
//! [`SitzungRepository`]; dahinter stehen entweder SQLite ([`SqliteDb`])
//! oder ein In-Memory-Speicher ([`SpeicherDb`]).

pub mod error;
pub mod models;
pub mod repository;
pub mod speicher;
pub mod sqlite;

pub use error::DbError;
pub use repository::{
    DatabaseBackend, DatabaseConfig, DbResult, KontoRepository, SitzungRepository,
};
pub use speicher::SpeicherDb;
pub use sqlite::SqliteDb;
