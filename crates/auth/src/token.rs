//! Token-Codec: signierte Access- und Refresh-Tokens (HS256)
//!
//! Access- und Refresh-Tokens werden mit zwei verschiedenen Schluesseln
//! signiert und tragen einen `type`-Claim, der bei jeder Pruefung
//! verglichen wird. Ablauf wird ohne Toleranz gegen die injizierte Uhr
//! geprueft: ein Token ist ab `jetzt >= exp` abgelaufen.

use std::collections::HashSet;
use std::sync::Arc;

use articulink_core::{KontoId, Uhr};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::AuthKonfig;
use crate::error::{AuthError, AuthResult};

/// Mindestlaenge eines Signaturschluessels in Bytes
pub const MIN_SCHLUESSEL_LAENGE: usize = 32;

/// Umgebungsvariable fuer den Access-Schluessel
pub const ENV_ZUGRIFF_SCHLUESSEL: &str = "ARTICULINK_ACCESS_SECRET";
/// Umgebungsvariable fuer den Refresh-Schluessel
pub const ENV_REFRESH_SCHLUESSEL: &str = "ARTICULINK_REFRESH_SECRET";

const TYP_ZUGRIFF: &str = "access";
const TYP_REFRESH: &str = "refresh";

/// Fehler beim Ausstellen oder Pruefen eines Tokens
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenFehler {
    #[error("Token nicht lesbar oder Signatur ungueltig")]
    Fehlerhaft,

    #[error("Falscher Token-Typ")]
    FalscherTyp,

    #[error("Token abgelaufen")]
    Abgelaufen,

    #[error("Token ohne gueltiges Subjekt")]
    SubjektFehlt,

    #[error("Token konnte nicht signiert werden: {0}")]
    Signieren(String),
}

/// Claims wie sie im Token stehen
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub: Option<String>,
    iat: i64,
    exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    jti: Option<String>,
    #[serde(rename = "type", default)]
    typ: String,
}

/// Inhalt eines erfolgreich geprueften Tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeprueftesToken {
    pub konto_id: KontoId,
    pub ausgestellt: i64,
    pub ablauf: i64,
    /// Sitzungs-ID (`jti`), nur bei Refresh-Tokens
    pub sitzung_id: Option<Uuid>,
}

/// Die beiden HS256-Schluessel
///
/// Werden nur aus der Umgebung geladen und nie geloggt.
#[derive(Clone)]
pub struct SignaturSchluessel {
    zugriff: Vec<u8>,
    refresh: Vec<u8>,
}

impl std::fmt::Debug for SignaturSchluessel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignaturSchluessel")
            .field("zugriff", &"<verborgen>")
            .field("refresh", &"<verborgen>")
            .finish()
    }
}

impl SignaturSchluessel {
    /// Erstellt ein Schluesselpaar und prueft Laenge und Verschiedenheit
    pub fn neu(zugriff: impl Into<Vec<u8>>, refresh: impl Into<Vec<u8>>) -> AuthResult<Self> {
        let schluessel = Self {
            zugriff: zugriff.into(),
            refresh: refresh.into(),
        };
        schluessel.pruefen()?;
        Ok(schluessel)
    }

    /// Laedt beide Schluessel aus `ARTICULINK_ACCESS_SECRET` und
    /// `ARTICULINK_REFRESH_SECRET`
    pub fn aus_env() -> AuthResult<Self> {
        let lesen = |name: &str| {
            std::env::var(name)
                .map_err(|_| AuthError::konfiguration(format!("Umgebungsvariable {name} fehlt")))
        };
        Self::neu(lesen(ENV_ZUGRIFF_SCHLUESSEL)?, lesen(ENV_REFRESH_SCHLUESSEL)?)
    }

    fn pruefen(&self) -> AuthResult<()> {
        if self.zugriff.len() < MIN_SCHLUESSEL_LAENGE || self.refresh.len() < MIN_SCHLUESSEL_LAENGE
        {
            return Err(AuthError::konfiguration(format!(
                "Signaturschluessel muessen mindestens {MIN_SCHLUESSEL_LAENGE} Bytes lang sein"
            )));
        }
        if self.zugriff == self.refresh {
            return Err(AuthError::konfiguration(
                "Access- und Refresh-Schluessel muessen verschieden sein",
            ));
        }
        Ok(())
    }
}

/// Stellt Tokens aus und prueft sie
pub struct TokenCodec {
    zugriff_enc: EncodingKey,
    zugriff_dec: DecodingKey,
    refresh_enc: EncodingKey,
    refresh_dec: DecodingKey,
    zugriff_ttl: chrono::Duration,
    refresh_ttl: chrono::Duration,
    validierung: Validation,
    uhr: Arc<dyn Uhr>,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("zugriff_ttl", &self.zugriff_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn neu(schluessel: &SignaturSchluessel, konfig: &AuthKonfig, uhr: Arc<dyn Uhr>) -> Self {
        // Ablauf wird selbst gegen die Uhr geprueft, die Bibliothek prueft
        // nur Signatur und Algorithmus
        let mut validierung = Validation::new(Algorithm::HS256);
        validierung.validate_exp = false;
        validierung.validate_aud = false;
        validierung.leeway = 0;
        validierung.required_spec_claims = HashSet::new();

        Self {
            zugriff_enc: EncodingKey::from_secret(&schluessel.zugriff),
            zugriff_dec: DecodingKey::from_secret(&schluessel.zugriff),
            refresh_enc: EncodingKey::from_secret(&schluessel.refresh),
            refresh_dec: DecodingKey::from_secret(&schluessel.refresh),
            zugriff_ttl: konfig.zugriff_ttl(),
            refresh_ttl: konfig.refresh_ttl(),
            validierung,
            uhr,
        }
    }

    pub fn refresh_ttl(&self) -> chrono::Duration {
        self.refresh_ttl
    }

    /// Access-Token mit `exp = jetzt + zugriff_ttl`
    pub fn zugriff_ausstellen(&self, konto_id: KontoId, jetzt: DateTime<Utc>) -> AuthResult<String> {
        let claims = Claims {
            sub: Some(konto_id.inner().to_string()),
            iat: jetzt.timestamp(),
            exp: (jetzt + self.zugriff_ttl).timestamp(),
            jti: None,
            typ: TYP_ZUGRIFF.into(),
        };
        signieren(&claims, &self.zugriff_enc)
    }

    /// Refresh-Token mit frischer Sitzungs-ID
    pub fn refresh_ausstellen(
        &self,
        konto_id: KontoId,
        jetzt: DateTime<Utc>,
    ) -> AuthResult<(String, Uuid)> {
        let sitzung_id = Uuid::new_v4();
        let claims = Claims {
            sub: Some(konto_id.inner().to_string()),
            iat: jetzt.timestamp(),
            exp: (jetzt + self.refresh_ttl).timestamp(),
            jti: Some(sitzung_id.to_string()),
            typ: TYP_REFRESH.into(),
        };
        Ok((signieren(&claims, &self.refresh_enc)?, sitzung_id))
    }

    /// Prueft ein Access-Token gegen die aktuelle Uhrzeit
    pub fn zugriff_pruefen(&self, token: &str) -> Result<GeprueftesToken, TokenFehler> {
        self.zugriff_pruefen_zum(token, self.uhr.jetzt())
    }

    pub fn zugriff_pruefen_zum(
        &self,
        token: &str,
        jetzt: DateTime<Utc>,
    ) -> Result<GeprueftesToken, TokenFehler> {
        self.pruefen(token, &self.zugriff_dec, TYP_ZUGRIFF, jetzt)
    }

    /// Prueft ein Refresh-Token gegen die aktuelle Uhrzeit
    pub fn refresh_pruefen(&self, token: &str) -> Result<GeprueftesToken, TokenFehler> {
        self.refresh_pruefen_zum(token, self.uhr.jetzt())
    }

    pub fn refresh_pruefen_zum(
        &self,
        token: &str,
        jetzt: DateTime<Utc>,
    ) -> Result<GeprueftesToken, TokenFehler> {
        self.pruefen(token, &self.refresh_dec, TYP_REFRESH, jetzt)
    }

    // Reihenfolge: Signatur, Typ, Ablauf, Subjekt
    fn pruefen(
        &self,
        token: &str,
        schluessel: &DecodingKey,
        erwarteter_typ: &str,
        jetzt: DateTime<Utc>,
    ) -> Result<GeprueftesToken, TokenFehler> {
        let claims = decode::<Claims>(token, schluessel, &self.validierung)
            .map_err(|_| TokenFehler::Fehlerhaft)?
            .claims;

        if claims.typ != erwarteter_typ {
            return Err(TokenFehler::FalscherTyp);
        }
        if jetzt.timestamp() >= claims.exp {
            return Err(TokenFehler::Abgelaufen);
        }
        let konto_id = claims
            .sub
            .as_deref()
            .and_then(KontoId::parsen)
            .ok_or(TokenFehler::SubjektFehlt)?;

        Ok(GeprueftesToken {
            konto_id,
            ausgestellt: claims.iat,
            ablauf: claims.exp,
            sitzung_id: claims.jti.as_deref().and_then(|j| Uuid::parse_str(j).ok()),
        })
    }
}

fn signieren(claims: &Claims, schluessel: &EncodingKey) -> AuthResult<String> {
    encode(&Header::new(Algorithm::HS256), claims, schluessel)
        .map_err(|e| AuthError::Token(TokenFehler::Signieren(e.to_string())))
}
