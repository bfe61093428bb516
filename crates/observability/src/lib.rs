//! # articulink-observability
//!
//! Structured Logging fuer ArticuLink via tracing-subscriber, als Text
//! oder JSON, per Umgebung uebersteuerbar.

pub mod logging;

pub use logging::{logging_initialisieren, LogFormat, LoggingKonfig};
