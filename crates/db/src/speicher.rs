//! In-Memory-Backend fuer Konten und Sitzungen
//!
//! Haelt alle Konten in einer `DashMap`. Mutationen an der Sitzungsliste
//! laufen unter dem Schreib-Guard des jeweiligen Eintrags und sind damit
//! pro Konto atomar. Nicht persistent: fuer Entwicklung und Tests.

use articulink_core::KontoId;
use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};

use crate::error::DbError;
use crate::models::{
    DeaktivierungsArt, KontoRecord, KontoStatus, KontoUpdate, NeuesKonto, RefreshSitzungRecord,
    SitzungAngehaengt,
};
use crate::repository::{DbResult, KontoRepository, SitzungRepository};

/// Fluechtiger Konto-Speicher
#[derive(Debug, Default)]
pub struct SpeicherDb {
    konten: DashMap<KontoId, KontoRecord>,
    /// email -> KontoId
    email_index: DashMap<String, KontoId>,
}

impl SpeicherDb {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Anzahl gespeicherter Konten
    pub fn anzahl_konten(&self) -> usize {
        self.konten.len()
    }
}

impl KontoRepository for SpeicherDb {
    async fn create(&self, data: NeuesKonto<'_>) -> DbResult<KontoRecord> {
        let id = KontoId::new();

        // Index-Eintrag zuerst reservieren, damit zwei gleichzeitige
        // Registrierungen derselben Adresse nicht beide durchkommen
        match self.email_index.entry(data.email.to_string()) {
            Entry::Occupied(_) => {
                return Err(DbError::Eindeutigkeit(format!(
                    "E-Mail '{}' bereits registriert",
                    data.email
                )));
            }
            Entry::Vacant(frei) => {
                frei.insert(id);
            }
        }

        let record = KontoRecord {
            id,
            email: data.email.to_string(),
            password_hash: data.password_hash.to_string(),
            role: data.role,
            status: KontoStatus::Aktiv,
            deaktivierung: None,
            profil: data.profil,
            created_at: Utc::now(),
            refresh_tokens: Vec::new(),
        };
        self.konten.insert(id, record.clone());
        Ok(record)
    }

    async fn get_by_id(&self, id: KontoId) -> DbResult<Option<KontoRecord>> {
        Ok(self.konten.get(&id).map(|k| k.clone()))
    }

    async fn get_by_email(&self, email: &str) -> DbResult<Option<KontoRecord>> {
        let id = match self.email_index.get(email) {
            Some(id) => *id,
            None => return Ok(None),
        };
        Ok(self.konten.get(&id).map(|k| k.clone()))
    }

    async fn update(&self, id: KontoId, data: KontoUpdate) -> DbResult<KontoRecord> {
        let mut konto = self
            .konten
            .get_mut(&id)
            .ok_or_else(|| DbError::nicht_gefunden(format!("Konto {id}")))?;

        if let Some(hash) = data.password_hash {
            konto.password_hash = hash;
        }
        if let Some(rolle) = data.role {
            konto.role = rolle;
        }
        if let Some(status) = data.status {
            konto.status = status;
        }
        if let Some(deaktivierung) = data.deaktivierung {
            konto.deaktivierung = deaktivierung;
        }
        if let Some(profil) = data.profil {
            konto.profil = profil;
        }
        Ok(konto.clone())
    }

    async fn delete(&self, id: KontoId) -> DbResult<bool> {
        match self.konten.remove(&id) {
            Some((_, konto)) => {
                self.email_index.remove(&konto.email);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn reactivate_expired(&self, id: KontoId, jetzt: DateTime<Utc>) -> DbResult<bool> {
        let Some(mut konto) = self.konten.get_mut(&id) else {
            return Ok(false);
        };

        let abgelaufen = konto.status == KontoStatus::Inaktiv
            && konto.deaktivierung.as_ref().is_some_and(|d| {
                d.art == DeaktivierungsArt::Temporaer && d.ende.is_some_and(|ende| ende < jetzt)
            });
        if !abgelaufen {
            return Ok(false);
        }

        konto.status = KontoStatus::Aktiv;
        konto.deaktivierung = None;
        Ok(true)
    }
}

impl SitzungRepository for SpeicherDb {
    async fn append_session(
        &self,
        konto_id: KontoId,
        sitzung: RefreshSitzungRecord,
        obergrenze: usize,
        jetzt: DateTime<Utc>,
    ) -> DbResult<SitzungAngehaengt> {
        let mut konto = self
            .konten
            .get_mut(&konto_id)
            .ok_or_else(|| DbError::nicht_gefunden(format!("Konto {konto_id}")))?;
        let sitzungen = &mut konto.refresh_tokens;

        let vorher = sitzungen.len();
        sitzungen.retain(|s| !s.ist_abgelaufen(jetzt));
        let abgelaufen_entfernt = (vorher - sitzungen.len()) as u64;

        // Gleicher Fingerabdruck wird ersetzt, nicht doppelt gefuehrt
        sitzungen.retain(|s| s.token_hash != sitzung.token_hash);

        let obergrenze = obergrenze.max(1);
        let mut verdraengt = Vec::new();
        while sitzungen.len() >= obergrenze {
            verdraengt.push(sitzungen.remove(0));
        }

        sitzungen.push(sitzung);

        Ok(SitzungAngehaengt {
            abgelaufen_entfernt,
            verdraengt,
        })
    }

    async fn replace_session(
        &self,
        konto_id: KontoId,
        alter_hash: &str,
        neue: RefreshSitzungRecord,
        jetzt: DateTime<Utc>,
    ) -> DbResult<bool> {
        let Some(mut konto) = self.konten.get_mut(&konto_id) else {
            return Ok(false);
        };
        let sitzungen = &mut konto.refresh_tokens;

        let Some(pos) = sitzungen
            .iter()
            .position(|s| s.token_hash == alter_hash && !s.ist_abgelaufen(jetzt))
        else {
            return Ok(false);
        };
        sitzungen.remove(pos);
        sitzungen.retain(|s| s.token_hash != neue.token_hash);
        sitzungen.push(neue);
        Ok(true)
    }

    async fn find_session(
        &self,
        konto_id: KontoId,
        token_hash: &str,
    ) -> DbResult<Option<RefreshSitzungRecord>> {
        Ok(self.konten.get(&konto_id).and_then(|konto| {
            konto
                .refresh_tokens
                .iter()
                .find(|s| s.token_hash == token_hash)
                .cloned()
        }))
    }

    async fn touch_session(
        &self,
        konto_id: KontoId,
        token_hash: &str,
        jetzt: DateTime<Utc>,
    ) -> DbResult<bool> {
        let Some(mut konto) = self.konten.get_mut(&konto_id) else {
            return Ok(false);
        };
        match konto
            .refresh_tokens
            .iter_mut()
            .find(|s| s.token_hash == token_hash)
        {
            Some(sitzung) => {
                sitzung.last_used = jetzt;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove_session(&self, konto_id: KontoId, token_hash: &str) -> DbResult<bool> {
        let Some(mut konto) = self.konten.get_mut(&konto_id) else {
            return Ok(false);
        };
        let vorher = konto.refresh_tokens.len();
        konto.refresh_tokens.retain(|s| s.token_hash != token_hash);
        Ok(konto.refresh_tokens.len() < vorher)
    }

    async fn clear_sessions(&self, konto_id: KontoId) -> DbResult<u64> {
        let Some(mut konto) = self.konten.get_mut(&konto_id) else {
            return Ok(0);
        };
        let anzahl = konto.refresh_tokens.len() as u64;
        konto.refresh_tokens.clear();
        Ok(anzahl)
    }

    async fn list_sessions(&self, konto_id: KontoId) -> DbResult<Vec<RefreshSitzungRecord>> {
        Ok(self
            .konten
            .get(&konto_id)
            .map(|k| k.refresh_tokens.clone())
            .unwrap_or_default())
    }

    async fn purge_expired(&self, jetzt: DateTime<Utc>) -> DbResult<u64> {
        let mut entfernt = 0u64;
        for mut konto in self.konten.iter_mut() {
            let vorher = konto.refresh_tokens.len();
            konto.refresh_tokens.retain(|s| !s.ist_abgelaufen(jetzt));
            entfernt += (vorher - konto.refresh_tokens.len()) as u64;
        }
        Ok(entfernt)
    }
}
