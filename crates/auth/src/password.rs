//! Passwort-Hashing mit Argon2id
//!
//! Jeder Hash bekommt ein eigenes zufaelliges Salt, das im PHC-String
//! mitgespeichert wird. Die Kostenparameter kommen aus der Konfiguration.

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

use crate::config::Argon2Konfig;
use crate::error::{AuthError, AuthResult};

/// Argon2id-Hasher mit festen Kostenparametern
#[derive(Clone)]
pub struct PasswortHasher {
    argon2: Argon2<'static>,
    /// Vergleichs-Hash fuer unbekannte E-Mails, beim Erstellen berechnet
    attrappe: Arc<str>,
}

impl std::fmt::Debug for PasswortHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswortHasher")
            .field("params", self.argon2.params())
            .finish()
    }
}

impl PasswortHasher {
    /// Erstellt einen Hasher mit den konfigurierten Kosten
    pub fn neu(konfig: &Argon2Konfig) -> AuthResult<Self> {
        let params = Params::new(
            konfig.speicher_kib,
            konfig.iterationen,
            konfig.parallelitaet,
            None,
        )
        .map_err(|e| AuthError::konfiguration(format!("Argon2-Parameter ungueltig: {e}")))?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let attrappe = hash_erzeugen(&argon2, ATTRAPPE_PASSWORT)?;
        Ok(Self {
            argon2,
            attrappe: attrappe.into(),
        })
    }

    /// Hasht ein Passwort und gibt den PHC-String zurueck
    pub fn hashen(&self, passwort: &str) -> AuthResult<String> {
        hash_erzeugen(&self.argon2, passwort)
    }

    /// Prueft ein Passwort gegen einen gespeicherten Hash
    ///
    /// Ein unlesbarer Hash gilt als Fehlschlag, nicht als Fehler.
    pub fn verifizieren(&self, passwort: &str, hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash) else {
            tracing::warn!("Gespeicherter Passwort-Hash ist nicht lesbar");
            return false;
        };
        self.argon2
            .verify_password(passwort.as_bytes(), &parsed)
            .is_ok()
    }

    /// Verifiziert gegen einen Attrappen-Hash, damit Anmeldungen mit
    /// unbekannter E-Mail genauso lange dauern wie mit falschem Passwort
    pub fn blind_verifizieren(&self, passwort: &str) {
        let _ = self.verifizieren(passwort, &self.attrappe);
    }
}

const ATTRAPPE_PASSWORT: &str = "articulink-attrappe";

fn hash_erzeugen(argon2: &Argon2<'_>, passwort: &str) -> AuthResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    argon2
        .hash_password(passwort.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::PasswortHashing(e.to_string()))
}
