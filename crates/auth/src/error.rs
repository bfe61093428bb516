//! Fehlertypen fuer den Sitzungs-Kern

use std::future::Future;
use std::time::Duration;

use articulink_db::DbError;
use thiserror::Error;

use crate::token::TokenFehler;

/// Alle moeglichen Fehler im Auth-Kern
#[derive(Debug, Error)]
pub enum AuthError {
    // --- Authentifizierung ---
    #[error("E-Mail oder Passwort falsch")]
    UngueltigeAnmeldedaten,

    #[error("Nicht authentifiziert")]
    NichtAuthentifiziert,

    #[error("Konto nicht gefunden")]
    KontoNichtGefunden,

    // --- Kontostatus ---
    #[error("{}", temporaer_meldung(*verbleibende_tage))]
    TemporaerDeaktiviert {
        verbleibende_tage: i64,
        grund: Option<String>,
    },

    #[error("Konto dauerhaft deaktiviert")]
    PermanentDeaktiviert { grund: Option<String> },

    // --- Registrierung / Passwort ---
    #[error("E-Mail bereits registriert")]
    EmailVergeben,

    #[error("Passwort zu kurz (mindestens {0} Zeichen)")]
    PasswortZuKurz(usize),

    #[error("Passwort-Hashing fehlgeschlagen: {0}")]
    PasswortHashing(String),

    // --- Tokens ---
    #[error("Token ungueltig: {0}")]
    Token(#[from] TokenFehler),

    // --- Speicher ---
    #[error("Speicher nicht verfuegbar: {0}")]
    SpeicherNichtVerfuegbar(#[from] DbError),

    // --- Konfiguration / Intern ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    #[error("Interner Fehler: {0}")]
    Intern(String),
}

fn temporaer_meldung(verbleibende_tage: i64) -> String {
    if verbleibende_tage > 0 {
        format!("Konto temporaer deaktiviert, verfuegbar in {verbleibende_tage} Tag(en)")
    } else {
        "Konto temporaer deaktiviert, bald wieder verfuegbar".to_string()
    }
}

impl AuthError {
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    pub fn konfiguration(msg: impl Into<String>) -> Self {
        Self::Konfiguration(msg.into())
    }

    /// Fehler der Serverseite (5xx-Klasse) statt einer Ablehnung des Aufrufers
    pub fn ist_serverfehler(&self) -> bool {
        matches!(
            self,
            Self::SpeicherNichtVerfuegbar(_)
                | Self::PasswortHashing(_)
                | Self::Konfiguration(_)
                | Self::Intern(_)
        ) || matches!(self, Self::Token(TokenFehler::Signieren(_)))
    }
}

/// Result-Alias fuer den Auth-Kern
pub type AuthResult<T> = Result<T, AuthError>;

/// Begrenzt einen Speicheraufruf zeitlich. Ein abgelaufenes Zeitlimit
/// schlaegt geschlossen fehl und liefert nie Erfolg.
pub(crate) async fn mit_zeitlimit<T, F>(zeitlimit: Duration, aufruf: F) -> AuthResult<T>
where
    F: Future<Output = Result<T, DbError>>,
{
    match tokio::time::timeout(zeitlimit, aufruf).await {
        Ok(ergebnis) => ergebnis.map_err(AuthError::from),
        Err(_) => {
            tracing::warn!(
                zeitlimit_ms = zeitlimit.as_millis() as u64,
                "Speicheraufruf hat das Zeitlimit ueberschritten"
            );
            Err(AuthError::SpeicherNichtVerfuegbar(DbError::Zeitlimit))
        }
    }
}
