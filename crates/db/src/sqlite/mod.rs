//! SQLite-Backend-Implementierungen fuer alle Repository-Traits

pub mod konten;
pub mod pool;
pub mod sitzungen;

pub use pool::SqliteDb;
