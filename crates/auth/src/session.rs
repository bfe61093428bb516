//! Refresh-Sitzungen pro Konto
//!
//! Gespeichert wird nur der Fingerabdruck eines Refresh-Tokens (SHA-256,
//! URL-sicheres Base64), nie das Token selbst. Pro Konto sind hoechstens
//! [`MAX_SITZUNGEN_PRO_KONTO`] Sitzungen aktiv; das Anhaengen raeumt
//! abgelaufene Sitzungen weg und verdraengt bei voller Liste die aelteste.

use std::sync::Arc;
use std::time::Duration;

use articulink_core::{KontoId, Uhr};
use articulink_db::{
    models::{RefreshSitzungRecord, SitzungAngehaengt},
    SitzungRepository,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;

use crate::error::{mit_zeitlimit, AuthResult};

/// Obergrenze gleichzeitig aktiver Sitzungen pro Konto
pub const MAX_SITZUNGEN_PRO_KONTO: usize = 3;

/// Oeffentliche Sicht auf eine Sitzung (ohne Fingerabdruck)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SitzungsAnsicht {
    pub erstellt_am: DateTime<Utc>,
    pub zuletzt_genutzt: DateTime<Utc>,
    pub laeuft_ab_am: DateTime<Utc>,
}

impl From<&RefreshSitzungRecord> for SitzungsAnsicht {
    fn from(r: &RefreshSitzungRecord) -> Self {
        Self {
            erstellt_am: r.created_at,
            zuletzt_genutzt: r.last_used,
            laeuft_ab_am: r.expires_at,
        }
    }
}

/// Fingerabdruck eines rohen Refresh-Tokens
pub fn token_fingerabdruck(roh_token: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(roh_token.as_bytes()))
}

/// Sitzungsverwaltung ueber einem [`SitzungRepository`]
pub struct SitzungsSpeicher<R: SitzungRepository> {
    repo: Arc<R>,
    uhr: Arc<dyn Uhr>,
    zeitlimit: Duration,
}

impl<R: SitzungRepository + 'static> SitzungsSpeicher<R> {
    pub fn neu(repo: Arc<R>, uhr: Arc<dyn Uhr>, zeitlimit: Duration) -> Self {
        Self {
            repo,
            uhr,
            zeitlimit,
        }
    }

    /// Haengt eine neue Sitzung an (atomar pro Konto)
    pub async fn hinzufuegen(
        &self,
        konto_id: KontoId,
        roh_token: &str,
        laeuft_ab_am: DateTime<Utc>,
    ) -> AuthResult<SitzungAngehaengt> {
        let jetzt = self.uhr.jetzt();
        let sitzung = RefreshSitzungRecord {
            token_hash: token_fingerabdruck(roh_token),
            created_at: jetzt,
            last_used: jetzt,
            expires_at: laeuft_ab_am,
        };

        let ergebnis = mit_zeitlimit(
            self.zeitlimit,
            self.repo
                .append_session(konto_id, sitzung, MAX_SITZUNGEN_PRO_KONTO, jetzt),
        )
        .await?;

        if !ergebnis.verdraengt.is_empty() {
            tracing::info!(
                konto_id = %konto_id,
                verdraengt = ergebnis.verdraengt.len(),
                "Aelteste Sitzung wegen Obergrenze verdraengt"
            );
        }
        tracing::debug!(
            konto_id = %konto_id,
            abgelaufen_entfernt = ergebnis.abgelaufen_entfernt,
            "Sitzung angehaengt"
        );
        Ok(ergebnis)
    }

    /// Prueft ob eine nicht abgelaufene Sitzung zu diesem Token existiert
    ///
    /// Bei Treffer wird `last_used` aktualisiert; scheitert das, wird nur
    /// gewarnt. Eine abgelaufene Sitzung wird entfernt.
    pub async fn validieren(&self, konto_id: KontoId, roh_token: &str) -> AuthResult<bool> {
        let hash = token_fingerabdruck(roh_token);
        let jetzt = self.uhr.jetzt();

        let Some(sitzung) =
            mit_zeitlimit(self.zeitlimit, self.repo.find_session(konto_id, &hash)).await?
        else {
            return Ok(false);
        };

        if sitzung.ist_abgelaufen(jetzt) {
            mit_zeitlimit(self.zeitlimit, self.repo.remove_session(konto_id, &hash)).await?;
            tracing::debug!(konto_id = %konto_id, "Abgelaufene Sitzung beim Pruefen entfernt");
            return Ok(false);
        }

        if let Err(e) =
            mit_zeitlimit(self.zeitlimit, self.repo.touch_session(konto_id, &hash, jetzt)).await
        {
            tracing::warn!(konto_id = %konto_id, fehler = %e, "last_used nicht aktualisiert");
        }
        Ok(true)
    }

    /// Rotiert eine Sitzung: das alte Token wird in einem Schritt gegen das
    /// neue getauscht. `false` wenn das alte Token schon verbraucht ist.
    pub async fn ersetzen(
        &self,
        konto_id: KontoId,
        altes_roh_token: &str,
        neues_roh_token: &str,
        laeuft_ab_am: DateTime<Utc>,
    ) -> AuthResult<bool> {
        let jetzt = self.uhr.jetzt();
        let neue = RefreshSitzungRecord {
            token_hash: token_fingerabdruck(neues_roh_token),
            created_at: jetzt,
            last_used: jetzt,
            expires_at: laeuft_ab_am,
        };
        let alter_hash = token_fingerabdruck(altes_roh_token);

        let getauscht = mit_zeitlimit(
            self.zeitlimit,
            self.repo.replace_session(konto_id, &alter_hash, neue, jetzt),
        )
        .await?;
        if getauscht {
            tracing::debug!(konto_id = %konto_id, "Sitzung rotiert");
        } else {
            tracing::warn!(konto_id = %konto_id, "Rotation mit verbrauchtem Refresh-Token");
        }
        Ok(getauscht)
    }

    /// Entfernt die Sitzung zu diesem Token (idempotent)
    pub async fn einzeln_widerrufen(&self, konto_id: KontoId, roh_token: &str) -> AuthResult<bool> {
        let hash = token_fingerabdruck(roh_token);
        let entfernt =
            mit_zeitlimit(self.zeitlimit, self.repo.remove_session(konto_id, &hash)).await?;
        if entfernt {
            tracing::info!(konto_id = %konto_id, "Sitzung widerrufen");
        }
        Ok(entfernt)
    }

    /// Entfernt alle Sitzungen eines Kontos
    pub async fn alle_widerrufen(&self, konto_id: KontoId) -> AuthResult<u64> {
        let anzahl = mit_zeitlimit(self.zeitlimit, self.repo.clear_sessions(konto_id)).await?;
        tracing::info!(konto_id = %konto_id, anzahl, "Alle Sitzungen widerrufen");
        Ok(anzahl)
    }

    /// Nicht abgelaufene Sitzungen, aelteste zuerst
    pub async fn aktive_auflisten(
        &self,
        konto_id: KontoId,
        jetzt: DateTime<Utc>,
    ) -> AuthResult<Vec<SitzungsAnsicht>> {
        let sitzungen = mit_zeitlimit(self.zeitlimit, self.repo.list_sessions(konto_id)).await?;
        Ok(sitzungen
            .iter()
            .filter(|s| !s.ist_abgelaufen(jetzt))
            .map(SitzungsAnsicht::from)
            .collect())
    }

    /// Kontenuebergreifende Bereinigung
    pub async fn alle_abgelaufenen_bereinigen(&self, jetzt: DateTime<Utc>) -> AuthResult<u64> {
        mit_zeitlimit(self.zeitlimit, self.repo.purge_expired(jetzt)).await
    }

    /// Startet den periodischen Bereinigungs-Task
    ///
    /// Fehler werden geloggt, der Task laeuft weiter.
    pub fn bereinigung_starten(speicher: Arc<Self>, intervall: Duration) -> JoinHandle<()> {
        tracing::info!(intervall_s = intervall.as_secs(), "Sitzungs-Bereinigung gestartet");
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(intervall).await;
                let jetzt = speicher.uhr.jetzt();
                match speicher.alle_abgelaufenen_bereinigen(jetzt).await {
                    Ok(anzahl) if anzahl > 0 => {
                        tracing::info!(anzahl, "Abgelaufene Sitzungen bereinigt");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::error!(fehler = %e, "Fehler bei der Sitzungs-Bereinigung");
                    }
                }
            }
        })
    }
}
