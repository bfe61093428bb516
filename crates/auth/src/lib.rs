//! articulink-auth – Sitzungs- und Token-Kern
//!
//! Dieses Crate implementiert:
//! - Passwort-Hashing mit Argon2id
//! - Signierte Access- und Refresh-Tokens (HS256, getrennte Schluessel)
//! - Refresh-Sitzungen mit Obergrenze pro Konto und periodischer Bereinigung
//! - Kontostatus-Pruefung mit automatischer Reaktivierung
//! - AuthService (Registrierung, Login, Erneuerung, Logout, Anfragepruefung)

pub mod config;
pub mod error;
pub mod password;
pub mod service;
pub mod session;
pub mod status;
pub mod token;

// Bequeme Re-Exporte
pub use config::{Argon2Konfig, AuthKonfig};
pub use error::{AuthError, AuthResult};
pub use password::PasswortHasher;
pub use service::{Anmeldung, AuthService, Erneuerung, KontoAnsicht, Prinzipal};
pub use session::{token_fingerabdruck, SitzungsAnsicht, SitzungsSpeicher, MAX_SITZUNGEN_PRO_KONTO};
pub use status::{Entscheidung, KontoZustand, StatusTor};
pub use token::{GeprueftesToken, SignaturSchluessel, TokenCodec, TokenFehler};
