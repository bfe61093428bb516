//! Kontostatus-Pruefung mit automatischer Reaktivierung
//!
//! Die Bewertung eines Zustands ist rein ([`KontoZustand::bewerten`]); der
//! Schreibzugriff fuer eine Reaktivierung ist ein eigener, bedingter
//! Speicheraufruf. Der Status wird bei jeder Pruefung frisch aus dem
//! Speicher gelesen, nie zwischengespeichert.

use std::sync::Arc;
use std::time::Duration;

use articulink_core::{KontoId, Uhr};
use articulink_db::{
    models::{Deaktivierung, DeaktivierungsArt, KontoRecord, KontoStatus, KontoUpdate},
    KontoRepository,
};
use chrono::{DateTime, Utc};

use crate::error::{mit_zeitlimit, AuthError, AuthResult};

/// Nach so vielen verlorenen Reaktivierungs-Wettlaeufen wird aufgegeben
const MAX_REAKTIVIERUNGS_VERSUCHE: usize = 3;

/// Aus einem Konto abgeleiteter Zustand
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KontoZustand {
    Aktiv,
    TemporaerDeaktiviert {
        ende: DateTime<Utc>,
        grund: Option<String>,
    },
    PermanentDeaktiviert {
        grund: Option<String>,
    },
}

/// Ergebnis einer Bewertung
#[derive(Debug)]
pub enum Entscheidung {
    Erlauben,
    /// Temporaere Deaktivierung ist abgelaufen: reaktivieren, dann erlauben
    Reaktivieren,
    Ablehnen(AuthError),
}

impl KontoZustand {
    /// Leitet den Zustand ab. Inaktiv ohne temporaere Art mit Enddatum
    /// gilt als permanent.
    pub fn aus_record(konto: &KontoRecord) -> Self {
        if konto.status == KontoStatus::Aktiv {
            return Self::Aktiv;
        }
        match &konto.deaktivierung {
            Some(Deaktivierung {
                art: DeaktivierungsArt::Temporaer,
                grund,
                ende: Some(ende),
            }) => Self::TemporaerDeaktiviert {
                ende: *ende,
                grund: grund.clone(),
            },
            Some(d) => Self::PermanentDeaktiviert {
                grund: d.grund.clone(),
            },
            None => Self::PermanentDeaktiviert { grund: None },
        }
    }

    pub fn bewerten(&self, jetzt: DateTime<Utc>) -> Entscheidung {
        match self {
            Self::Aktiv => Entscheidung::Erlauben,
            Self::TemporaerDeaktiviert { ende, .. } if jetzt > *ende => Entscheidung::Reaktivieren,
            Self::TemporaerDeaktiviert { ende, grund } => {
                Entscheidung::Ablehnen(AuthError::TemporaerDeaktiviert {
                    verbleibende_tage: (*ende - jetzt).num_days(),
                    grund: grund.clone(),
                })
            }
            Self::PermanentDeaktiviert { grund } => {
                Entscheidung::Ablehnen(AuthError::PermanentDeaktiviert {
                    grund: grund.clone(),
                })
            }
        }
    }
}

/// Statuspruefung vor jedem Einstieg (Login, Erneuerung, Anfrage)
pub struct StatusTor<R: KontoRepository> {
    repo: Arc<R>,
    uhr: Arc<dyn Uhr>,
    zeitlimit: Duration,
}

impl<R: KontoRepository> StatusTor<R> {
    pub fn neu(repo: Arc<R>, uhr: Arc<dyn Uhr>, zeitlimit: Duration) -> Self {
        Self {
            repo,
            uhr,
            zeitlimit,
        }
    }

    /// Prueft ein frisch geladenes Konto und gibt es (ggf. reaktiviert) zurueck
    pub async fn pruefen(&self, mut konto: KontoRecord) -> AuthResult<KontoRecord> {
        for _ in 0..MAX_REAKTIVIERUNGS_VERSUCHE {
            let jetzt = self.uhr.jetzt();
            match KontoZustand::aus_record(&konto).bewerten(jetzt) {
                Entscheidung::Erlauben => return Ok(konto),
                Entscheidung::Ablehnen(fehler) => {
                    tracing::debug!(konto_id = %konto.id, fehler = %fehler, "Konto abgelehnt");
                    return Err(fehler);
                }
                Entscheidung::Reaktivieren => {
                    let geschrieben = mit_zeitlimit(
                        self.zeitlimit,
                        self.repo.reactivate_expired(konto.id, jetzt),
                    )
                    .await?;

                    if geschrieben {
                        tracing::info!(konto_id = %konto.id, "Konto automatisch reaktiviert");
                        konto.status = KontoStatus::Aktiv;
                        konto.deaktivierung = None;
                        return Ok(konto);
                    }

                    // Jemand anderes hat das Konto inzwischen geaendert
                    konto = self.neu_laden(konto.id).await?;
                }
            }
        }
        Err(AuthError::intern("Kontostatus aendert sich fortlaufend"))
    }

    /// Deaktiviert ein Konto. Ohne Dauer ist die Deaktivierung permanent.
    pub async fn deaktivieren(
        &self,
        konto_id: KontoId,
        grund: Option<&str>,
        dauer: Option<chrono::Duration>,
    ) -> AuthResult<KontoRecord> {
        let jetzt = self.uhr.jetzt();
        let deaktivierung = Deaktivierung {
            art: if dauer.is_some() {
                DeaktivierungsArt::Temporaer
            } else {
                DeaktivierungsArt::Permanent
            },
            grund: grund.map(str::to_string),
            ende: dauer.map(|d| jetzt + d),
        };
        let ende = deaktivierung.ende;

        let konto = mit_zeitlimit(
            self.zeitlimit,
            self.repo.update(
                konto_id,
                KontoUpdate {
                    status: Some(KontoStatus::Inaktiv),
                    deaktivierung: Some(Some(deaktivierung)),
                    ..Default::default()
                },
            ),
        )
        .await
        .map_err(nicht_gefunden_abbilden)?;

        tracing::info!(
            konto_id = %konto_id,
            permanent = ende.is_none(),
            ende = ?ende,
            "Konto deaktiviert"
        );
        Ok(konto)
    }

    /// Hebt eine Deaktivierung sofort auf
    pub async fn reaktivieren(&self, konto_id: KontoId) -> AuthResult<KontoRecord> {
        let konto = mit_zeitlimit(
            self.zeitlimit,
            self.repo.update(
                konto_id,
                KontoUpdate {
                    status: Some(KontoStatus::Aktiv),
                    deaktivierung: Some(None),
                    ..Default::default()
                },
            ),
        )
        .await
        .map_err(nicht_gefunden_abbilden)?;

        tracing::info!(konto_id = %konto_id, "Konto reaktiviert");
        Ok(konto)
    }

    async fn neu_laden(&self, konto_id: KontoId) -> AuthResult<KontoRecord> {
        mit_zeitlimit(self.zeitlimit, self.repo.get_by_id(konto_id))
            .await?
            .ok_or(AuthError::KontoNichtGefunden)
    }
}

fn nicht_gefunden_abbilden(e: AuthError) -> AuthError {
    match e {
        AuthError::SpeicherNichtVerfuegbar(articulink_db::DbError::NichtGefunden(_)) => {
            AuthError::KontoNichtGefunden
        }
        andere => andere,
    }
}
