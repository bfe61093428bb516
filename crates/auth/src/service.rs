//! Auth-Service fuer ArticuLink
//!
//! Zentraler Einstieg fuer Registrierung, Login, Token-Erneuerung, Logout
//! und die Pruefung eingehender Anfragen. Verbindet Passwort-Hasher,
//! Token-Codec, Sitzungsspeicher und Statuspruefung.

use std::sync::Arc;
use std::time::Duration;

use articulink_core::{KontoId, Uhr};
use articulink_db::{
    models::{KontoProfil, KontoRecord, KontoRolle, KontoUpdate, NeuesKonto},
    KontoRepository, SitzungRepository,
};
use chrono::NaiveDate;
use serde::Serialize;

use crate::{
    config::AuthKonfig,
    error::{mit_zeitlimit, AuthError, AuthResult},
    password::PasswortHasher,
    session::{SitzungsAnsicht, SitzungsSpeicher},
    status::StatusTor,
    token::{SignaturSchluessel, TokenCodec},
};

/// Oeffentliche Sicht auf ein Konto (ohne Hash und Sitzungen)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KontoAnsicht {
    pub id: KontoId,
    pub email: String,
    pub role: KontoRolle,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_pic: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub gender: Option<String>,
}

impl From<&KontoRecord> for KontoAnsicht {
    fn from(k: &KontoRecord) -> Self {
        Self {
            id: k.id,
            email: k.email.clone(),
            role: k.role,
            first_name: k.profil.first_name.clone(),
            last_name: k.profil.last_name.clone(),
            profile_pic: k.profil.profile_pic.clone(),
            birthdate: k.profil.birthdate,
            gender: k.profil.gender.clone(),
        }
    }
}

/// Ergebnis eines erfolgreichen Logins
#[derive(Debug, Clone, Serialize)]
pub struct Anmeldung {
    #[serde(rename = "access_token")]
    pub zugriffs_token: String,
    pub refresh_token: String,
    #[serde(rename = "token_type")]
    pub token_typ: &'static str,
    #[serde(rename = "user")]
    pub konto: KontoAnsicht,
}

/// Ergebnis einer Token-Erneuerung
#[derive(Debug, Clone, Serialize)]
pub struct Erneuerung {
    #[serde(rename = "access_token")]
    pub zugriffs_token: String,
    /// Nur bei aktivierter Rotation gesetzt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(rename = "token_type")]
    pub token_typ: &'static str,
}

/// Authentifizierter Aufrufer einer Anfrage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prinzipal {
    pub konto_id: KontoId,
    pub rolle: KontoRolle,
}

const TOKEN_TYP: &str = "bearer";

/// Auth-Service – zentraler Einstiegspunkt fuer alle Authentifizierungsvorgaenge
pub struct AuthService<R: KontoRepository + SitzungRepository + 'static> {
    repo: Arc<R>,
    hasher: PasswortHasher,
    codec: TokenCodec,
    sitzungen: Arc<SitzungsSpeicher<R>>,
    tor: StatusTor<R>,
    uhr: Arc<dyn Uhr>,
    zeitlimit: Duration,
    refresh_rotation: bool,
    passwort_min_laenge: usize,
}

impl<R: KontoRepository + SitzungRepository + 'static> AuthService<R> {
    /// Erstellt einen neuen AuthService
    pub fn neu(
        repo: Arc<R>,
        konfig: &AuthKonfig,
        schluessel: &SignaturSchluessel,
        uhr: Arc<dyn Uhr>,
    ) -> AuthResult<Self> {
        let zeitlimit = konfig.speicher_zeitlimit();
        Ok(Self {
            hasher: PasswortHasher::neu(&konfig.argon2)?,
            codec: TokenCodec::neu(schluessel, konfig, uhr.clone()),
            sitzungen: Arc::new(SitzungsSpeicher::neu(repo.clone(), uhr.clone(), zeitlimit)),
            tor: StatusTor::neu(repo.clone(), uhr.clone(), zeitlimit),
            repo,
            uhr,
            zeitlimit,
            refresh_rotation: konfig.refresh_rotation,
            passwort_min_laenge: konfig.passwort_min_laenge,
        })
    }

    /// Sitzungsspeicher (z.B. fuer den Bereinigungs-Task)
    pub fn sitzungen(&self) -> &Arc<SitzungsSpeicher<R>> {
        &self.sitzungen
    }

    /// Statuspruefung (fuer Admin-Operationen)
    pub fn status_tor(&self) -> &StatusTor<R> {
        &self.tor
    }

    /// Registriert ein neues Benutzerkonto
    pub async fn registrieren(
        &self,
        email: &str,
        passwort: &str,
        profil: KontoProfil,
    ) -> AuthResult<KontoAnsicht> {
        let email = email_normalisieren(email);
        if passwort.chars().count() < self.passwort_min_laenge {
            return Err(AuthError::PasswortZuKurz(self.passwort_min_laenge));
        }

        let passwort_hash = self.hasher.hashen(passwort)?;
        let konto = mit_zeitlimit(
            self.zeitlimit,
            self.repo.create(NeuesKonto {
                email: &email,
                password_hash: &passwort_hash,
                role: KontoRolle::Benutzer,
                profil,
            }),
        )
        .await
        .map_err(|e| match e {
            AuthError::SpeicherNichtVerfuegbar(ref db) if db.ist_eindeutigkeit() => {
                AuthError::EmailVergeben
            }
            andere => andere,
        })?;

        tracing::info!(konto_id = %konto.id, "Neues Konto registriert");
        Ok(KontoAnsicht::from(&konto))
    }

    /// Meldet ein Konto an und stellt ein Token-Paar aus
    ///
    /// Unbekannte E-Mail, falsches Passwort und falsche Rolle liefern alle
    /// denselben Fehler.
    pub async fn anmelden(&self, email: &str, passwort: &str) -> AuthResult<Anmeldung> {
        let email = email_normalisieren(email);
        let konto = mit_zeitlimit(self.zeitlimit, self.repo.get_by_email(&email)).await?;

        let Some(konto) = konto else {
            self.hasher.blind_verifizieren(passwort);
            tracing::warn!("Login mit unbekannter E-Mail");
            return Err(AuthError::UngueltigeAnmeldedaten);
        };
        if !self.hasher.verifizieren(passwort, &konto.password_hash) {
            tracing::warn!(konto_id = %konto.id, "Fehlgeschlagener Login-Versuch");
            return Err(AuthError::UngueltigeAnmeldedaten);
        }
        if konto.role != KontoRolle::Benutzer {
            tracing::warn!(konto_id = %konto.id, rolle = konto.role.als_str(), "Login mit falscher Rolle");
            return Err(AuthError::UngueltigeAnmeldedaten);
        }

        let konto = self.tor.pruefen(konto).await?;

        let jetzt = self.uhr.jetzt();
        let zugriffs_token = self.codec.zugriff_ausstellen(konto.id, jetzt)?;
        let (refresh_token, sitzung_id) = self.codec.refresh_ausstellen(konto.id, jetzt)?;
        self.sitzungen
            .hinzufuegen(konto.id, &refresh_token, jetzt + self.codec.refresh_ttl())
            .await?;

        tracing::info!(konto_id = %konto.id, sitzung_id = %sitzung_id, "Konto angemeldet");

        Ok(Anmeldung {
            zugriffs_token,
            refresh_token,
            token_typ: TOKEN_TYP,
            konto: KontoAnsicht::from(&konto),
        })
    }

    /// Stellt mit einem Refresh-Token ein neues Access-Token aus
    pub async fn erneuern(&self, refresh_token: &str) -> AuthResult<Erneuerung> {
        let geprueft = self.codec.refresh_pruefen(refresh_token).map_err(|e| {
            tracing::debug!(fehler = %e, "Refresh-Token abgelehnt");
            AuthError::NichtAuthentifiziert
        })?;
        let konto_id = geprueft.konto_id;

        if !self.sitzungen.validieren(konto_id, refresh_token).await? {
            tracing::debug!(konto_id = %konto_id, "Keine passende Sitzung");
            return Err(AuthError::NichtAuthentifiziert);
        }

        let konto = mit_zeitlimit(self.zeitlimit, self.repo.get_by_id(konto_id))
            .await?
            .ok_or(AuthError::NichtAuthentifiziert)?;
        let konto = self
            .tor
            .pruefen(konto)
            .await
            .map_err(|e| match e {
                AuthError::KontoNichtGefunden => AuthError::NichtAuthentifiziert,
                andere => tor_fehler_verbergen(andere),
            })?;

        let jetzt = self.uhr.jetzt();
        let zugriffs_token = self.codec.zugriff_ausstellen(konto.id, jetzt)?;

        let neues_refresh = if self.refresh_rotation {
            let (neu, _) = self.codec.refresh_ausstellen(konto.id, jetzt)?;
            // Der Tausch ist das Tor: ein Token wird hoechstens einmal eingeloest
            let getauscht = self
                .sitzungen
                .ersetzen(konto.id, refresh_token, &neu, jetzt + self.codec.refresh_ttl())
                .await?;
            if !getauscht {
                return Err(AuthError::NichtAuthentifiziert);
            }
            Some(neu)
        } else {
            None
        };

        Ok(Erneuerung {
            zugriffs_token,
            refresh_token: neues_refresh,
            token_typ: TOKEN_TYP,
        })
    }

    /// Prueft den `Authorization`-Header einer Anfrage
    pub async fn authentifizieren(&self, autorisierung: &str) -> AuthResult<Prinzipal> {
        let token = bearer_token(autorisierung).ok_or(AuthError::NichtAuthentifiziert)?;
        let geprueft = self.codec.zugriff_pruefen(token).map_err(|e| {
            tracing::debug!(fehler = %e, "Access-Token abgelehnt");
            AuthError::NichtAuthentifiziert
        })?;

        let konto = mit_zeitlimit(self.zeitlimit, self.repo.get_by_id(geprueft.konto_id))
            .await?
            .ok_or(AuthError::KontoNichtGefunden)?;
        let konto = self.tor.pruefen(konto).await.map_err(tor_fehler_verbergen)?;

        Ok(Prinzipal {
            konto_id: konto.id,
            rolle: konto.role,
        })
    }

    /// Meldet ab: ein Geraet (vorgelegtes Refresh-Token) oder alle
    ///
    /// Bereits ausgestellte Access-Tokens bleiben bis zu ihrem Ablauf gueltig.
    pub async fn abmelden(
        &self,
        konto_id: KontoId,
        refresh_token: Option<&str>,
        alle_geraete: bool,
    ) -> AuthResult<u64> {
        if alle_geraete {
            return self.sitzungen.alle_widerrufen(konto_id).await;
        }
        match refresh_token {
            Some(token) => Ok(self.sitzungen.einzeln_widerrufen(konto_id, token).await? as u64),
            None => {
                tracing::debug!(konto_id = %konto_id, "Abmeldung ohne Refresh-Token");
                Ok(0)
            }
        }
    }

    /// Profil des angemeldeten Kontos
    pub async fn profil(&self, konto_id: KontoId) -> AuthResult<KontoAnsicht> {
        let konto = self.konto_laden(konto_id).await?;
        Ok(KontoAnsicht::from(&konto))
    }

    /// Aendert das Passwort und widerruft danach alle Sitzungen
    pub async fn passwort_aendern(
        &self,
        konto_id: KontoId,
        altes_passwort: &str,
        neues_passwort: &str,
    ) -> AuthResult<u64> {
        let konto = self.konto_laden(konto_id).await?;

        if !self.hasher.verifizieren(altes_passwort, &konto.password_hash) {
            return Err(AuthError::UngueltigeAnmeldedaten);
        }
        if neues_passwort.chars().count() < self.passwort_min_laenge {
            return Err(AuthError::PasswortZuKurz(self.passwort_min_laenge));
        }

        let neuer_hash = self.hasher.hashen(neues_passwort)?;
        mit_zeitlimit(
            self.zeitlimit,
            self.repo.update(
                konto_id,
                KontoUpdate {
                    password_hash: Some(neuer_hash),
                    ..Default::default()
                },
            ),
        )
        .await?;

        let anzahl = self.sitzungen.alle_widerrufen(konto_id).await?;
        tracing::info!(
            konto_id = %konto_id,
            widerrufene_sitzungen = anzahl,
            "Passwort geaendert, Sitzungen widerrufen"
        );
        Ok(anzahl)
    }

    /// Aktive Sitzungen des Kontos
    pub async fn aktive_sitzungen(&self, konto_id: KontoId) -> AuthResult<Vec<SitzungsAnsicht>> {
        self.sitzungen
            .aktive_auflisten(konto_id, self.uhr.jetzt())
            .await
    }

    async fn konto_laden(&self, konto_id: KontoId) -> AuthResult<KontoRecord> {
        mit_zeitlimit(self.zeitlimit, self.repo.get_by_id(konto_id))
            .await?
            .ok_or(AuthError::KontoNichtGefunden)
    }
}

fn email_normalisieren(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Extrahiert das Token aus `Bearer <token>`
fn bearer_token(autorisierung: &str) -> Option<&str> {
    let (schema, token) = autorisierung.trim().split_once(' ')?;
    let token = token.trim();
    (schema.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Deaktivierungen erscheinen ausserhalb des Logins nur als
/// `NichtAuthentifiziert`; Speicherfehler bleiben sichtbar
fn tor_fehler_verbergen(e: AuthError) -> AuthError {
    match e {
        AuthError::TemporaerDeaktiviert { .. } | AuthError::PermanentDeaktiviert { .. } => {
            AuthError::NichtAuthentifiziert
        }
        andere => andere,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use articulink_core::FesteUhr;
    use articulink_db::{
        models::{RefreshSitzungRecord, SitzungAngehaengt},
        DbError, DbResult, SpeicherDb,
    };
    use chrono::{DateTime, Utc};

    use crate::config::Argon2Konfig;

    fn test_konfig() -> AuthKonfig {
        AuthKonfig {
            argon2: Argon2Konfig {
                speicher_kib: 8,
                iterationen: 1,
                parallelitaet: 1,
            },
            ..Default::default()
        }
    }

    fn schluessel() -> SignaturSchluessel {
        SignaturSchluessel::neu(
            "zugriff-schluessel-fuer-tests-0123456789",
            "refresh-schluessel-fuer-tests-0123456789",
        )
        .unwrap()
    }

    fn test_service() -> (AuthService<SpeicherDb>, Arc<FesteUhr>) {
        let uhr = Arc::new(FesteUhr::ab_jetzt());
        let service = AuthService::neu(
            Arc::new(SpeicherDb::neu()),
            &test_konfig(),
            &schluessel(),
            uhr.clone(),
        )
        .unwrap();
        (service, uhr)
    }

    #[test]
    fn bearer_header_parsen() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bearer  abc "), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("abc"), None);
    }

    #[tokio::test]
    async fn registrieren_und_anmelden() {
        let (service, _) = test_service();
        let konto = service
            .registrieren("Alice@Example.com", "geheim123", KontoProfil::default())
            .await
            .expect("Registrierung fehlgeschlagen");
        assert_eq!(konto.email, "alice@example.com");
        assert_eq!(konto.role, KontoRolle::Benutzer);

        let anmeldung = service
            .anmelden("ALICE@example.com", "geheim123")
            .await
            .expect("Anmeldung fehlgeschlagen");
        assert_eq!(anmeldung.token_typ, "bearer");
        assert_eq!(anmeldung.konto.id, konto.id);

        let prinzipal = service
            .authentifizieren(&format!("Bearer {}", anmeldung.zugriffs_token))
            .await
            .unwrap();
        assert_eq!(prinzipal.konto_id, konto.id);
    }

    #[tokio::test]
    async fn registrierung_validiert() {
        let (service, _) = test_service();
        assert!(matches!(
            service.registrieren("a@example.com", "kurz", KontoProfil::default()).await,
            Err(AuthError::PasswortZuKurz(6))
        ));
        service
            .registrieren("a@example.com", "lang_genug", KontoProfil::default())
            .await
            .unwrap();
        assert!(matches!(
            service.registrieren("A@example.com", "lang_genug", KontoProfil::default()).await,
            Err(AuthError::EmailVergeben)
        ));
    }

    #[tokio::test]
    async fn anmeldung_ist_uniform_fehlerhaft() {
        let (service, _) = test_service();
        service
            .registrieren("b@example.com", "richtig123", KontoProfil::default())
            .await
            .unwrap();

        assert!(matches!(
            service.anmelden("b@example.com", "falsch123").await,
            Err(AuthError::UngueltigeAnmeldedaten)
        ));
        assert!(matches!(
            service.anmelden("niemand@example.com", "richtig123").await,
            Err(AuthError::UngueltigeAnmeldedaten)
        ));
    }

    #[tokio::test]
    async fn admin_kann_sich_hier_nicht_anmelden() {
        let (service, _) = test_service();
        let konto = service
            .registrieren("admin@example.com", "richtig123", KontoProfil::default())
            .await
            .unwrap();
        service
            .repo
            .update(
                konto.id,
                KontoUpdate {
                    role: Some(KontoRolle::Administrator),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(matches!(
            service.anmelden("admin@example.com", "richtig123").await,
            Err(AuthError::UngueltigeAnmeldedaten)
        ));
    }

    #[tokio::test]
    async fn erneuern_ohne_rotation() {
        let (service, _) = test_service();
        service
            .registrieren("c@example.com", "passwort1", KontoProfil::default())
            .await
            .unwrap();
        let anmeldung = service.anmelden("c@example.com", "passwort1").await.unwrap();

        let erneuert = service.erneuern(&anmeldung.refresh_token).await.unwrap();
        assert!(erneuert.refresh_token.is_none());
        // Dasselbe Refresh-Token bleibt gueltig
        assert!(service.erneuern(&anmeldung.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn erneuern_mit_rotation() {
        let uhr = Arc::new(FesteUhr::ab_jetzt());
        let konfig = AuthKonfig {
            refresh_rotation: true,
            ..test_konfig()
        };
        let service =
            AuthService::neu(Arc::new(SpeicherDb::neu()), &konfig, &schluessel(), uhr.clone())
                .unwrap();
        let konto = service
            .registrieren("r@example.com", "passwort1", KontoProfil::default())
            .await
            .unwrap();
        let anmeldung = service.anmelden("r@example.com", "passwort1").await.unwrap();

        let erneuert = service.erneuern(&anmeldung.refresh_token).await.unwrap();
        let neu = erneuert.refresh_token.expect("Rotation liefert neues Token");
        assert_ne!(neu, anmeldung.refresh_token);

        assert!(matches!(
            service.erneuern(&anmeldung.refresh_token).await,
            Err(AuthError::NichtAuthentifiziert)
        ));
        assert!(service.erneuern(&neu).await.is_ok());
        assert_eq!(service.aktive_sitzungen(konto.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rotiertes_token_nur_einmal_einloesbar() {
        let konfig = AuthKonfig {
            refresh_rotation: true,
            ..test_konfig()
        };
        let service = AuthService::neu(
            Arc::new(SpeicherDb::neu()),
            &konfig,
            &schluessel(),
            Arc::new(FesteUhr::ab_jetzt()),
        )
        .unwrap();
        let konto = service
            .registrieren("doppelt@example.com", "passwort1", KontoProfil::default())
            .await
            .unwrap();
        let anmeldung = service.anmelden("doppelt@example.com", "passwort1").await.unwrap();

        let (a, b) = tokio::join!(
            service.erneuern(&anmeldung.refresh_token),
            service.erneuern(&anmeldung.refresh_token),
        );
        let erfolgreich = [&a, &b].iter().filter(|e| e.is_ok()).count();
        assert_eq!(erfolgreich, 1, "a={a:?} b={b:?}");
        assert!([a, b]
            .into_iter()
            .any(|e| matches!(e, Err(AuthError::NichtAuthentifiziert))));
        assert_eq!(service.aktive_sitzungen(konto.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn gescheiterte_rotation_laesst_altes_token_gueltig() {
        let konfig = AuthKonfig {
            refresh_rotation: true,
            ..test_konfig()
        };
        let service = AuthService::neu(
            Arc::new(SchreibFehler {
                db: SpeicherDb::neu(),
                anhaengen_scheitert: false,
                tauschen_scheitert: true,
            }),
            &konfig,
            &schluessel(),
            Arc::new(FesteUhr::ab_jetzt()),
        )
        .unwrap();
        let konto = service
            .registrieren("tausch@example.com", "passwort1", KontoProfil::default())
            .await
            .unwrap();
        let anmeldung = service.anmelden("tausch@example.com", "passwort1").await.unwrap();

        let err = service.erneuern(&anmeldung.refresh_token).await.unwrap_err();
        assert!(matches!(err, AuthError::SpeicherNichtVerfuegbar(_)));

        let sitzungen = service.aktive_sitzungen(konto.id).await.unwrap();
        assert_eq!(sitzungen.len(), 1);
        assert!(service
            .sitzungen()
            .validieren(konto.id, &anmeldung.refresh_token)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn zugriffs_token_ist_kein_refresh_token() {
        let (service, _) = test_service();
        service
            .registrieren("d@example.com", "passwort1", KontoProfil::default())
            .await
            .unwrap();
        let anmeldung = service.anmelden("d@example.com", "passwort1").await.unwrap();

        assert!(matches!(
            service.erneuern(&anmeldung.zugriffs_token).await,
            Err(AuthError::NichtAuthentifiziert)
        ));
        assert!(matches!(
            service
                .authentifizieren(&format!("Bearer {}", anmeldung.refresh_token))
                .await,
            Err(AuthError::NichtAuthentifiziert)
        ));
    }

    #[tokio::test]
    async fn abgelaufenes_zugriffs_token() {
        let (service, uhr) = test_service();
        service
            .registrieren("e@example.com", "passwort1", KontoProfil::default())
            .await
            .unwrap();
        let anmeldung = service.anmelden("e@example.com", "passwort1").await.unwrap();
        let header = format!("Bearer {}", anmeldung.zugriffs_token);

        uhr.vorstellen(chrono::Duration::minutes(59));
        assert!(service.authentifizieren(&header).await.is_ok());

        uhr.vorstellen(chrono::Duration::minutes(1));
        assert!(matches!(
            service.authentifizieren(&header).await,
            Err(AuthError::NichtAuthentifiziert)
        ));
        // Mit dem Refresh-Token gibt es ein neues
        let erneuert = service.erneuern(&anmeldung.refresh_token).await.unwrap();
        assert!(service
            .authentifizieren(&format!("Bearer {}", erneuert.zugriffs_token))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn geloeschtes_konto_beim_authentifizieren() {
        let (service, _) = test_service();
        let konto = service
            .registrieren("weg@example.com", "passwort1", KontoProfil::default())
            .await
            .unwrap();
        let anmeldung = service.anmelden("weg@example.com", "passwort1").await.unwrap();
        service.repo.delete(konto.id).await.unwrap();

        assert!(matches!(
            service
                .authentifizieren(&format!("Bearer {}", anmeldung.zugriffs_token))
                .await,
            Err(AuthError::KontoNichtGefunden)
        ));
        assert!(matches!(
            service.erneuern(&anmeldung.refresh_token).await,
            Err(AuthError::NichtAuthentifiziert)
        ));
    }

    #[tokio::test]
    async fn abmelden_varianten() {
        let (service, _) = test_service();
        let konto = service
            .registrieren("f@example.com", "passwort1", KontoProfil::default())
            .await
            .unwrap();
        let a = service.anmelden("f@example.com", "passwort1").await.unwrap();
        let b = service.anmelden("f@example.com", "passwort1").await.unwrap();
        let _c = service.anmelden("f@example.com", "passwort1").await.unwrap();

        assert_eq!(service.abmelden(konto.id, None, false).await.unwrap(), 0);
        assert_eq!(
            service.abmelden(konto.id, Some(&a.refresh_token), false).await.unwrap(),
            1
        );
        assert!(service.erneuern(&a.refresh_token).await.is_err());
        assert!(service.erneuern(&b.refresh_token).await.is_ok());

        assert_eq!(service.abmelden(konto.id, None, true).await.unwrap(), 2);
        assert!(service.aktive_sitzungen(konto.id).await.unwrap().is_empty());
        // Access-Tokens laufen natuerlich aus
        assert!(service
            .authentifizieren(&format!("Bearer {}", b.zugriffs_token))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn passwort_aendern_widerruft_sitzungen() {
        let (service, _) = test_service();
        let konto = service
            .registrieren("g@example.com", "altes_pw", KontoProfil::default())
            .await
            .unwrap();
        let anmeldung = service.anmelden("g@example.com", "altes_pw").await.unwrap();

        assert!(matches!(
            service.passwort_aendern(konto.id, "falsch", "neues_pw").await,
            Err(AuthError::UngueltigeAnmeldedaten)
        ));
        assert_eq!(
            service.passwort_aendern(konto.id, "altes_pw", "neues_pw").await.unwrap(),
            1
        );

        assert!(service.erneuern(&anmeldung.refresh_token).await.is_err());
        assert!(matches!(
            service.anmelden("g@example.com", "altes_pw").await,
            Err(AuthError::UngueltigeAnmeldedaten)
        ));
        assert!(service.anmelden("g@example.com", "neues_pw").await.is_ok());
    }

    #[tokio::test]
    async fn profil_abrufen() {
        let (service, _) = test_service();
        let konto = service
            .registrieren(
                "h@example.com",
                "passwort1",
                KontoProfil {
                    first_name: Some("Hanna".into()),
                    gender: Some("f".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let profil = service.profil(konto.id).await.unwrap();
        assert_eq!(profil.first_name.as_deref(), Some("Hanna"));
        assert!(matches!(
            service.profil(KontoId::new()).await,
            Err(AuthError::KontoNichtGefunden)
        ));
    }

    #[test]
    fn anmeldung_serialisiert_mit_feldnamen_der_schnittstelle() {
        let anmeldung = Anmeldung {
            zugriffs_token: "a".into(),
            refresh_token: "r".into(),
            token_typ: TOKEN_TYP,
            konto: KontoAnsicht {
                id: KontoId::new(),
                email: "x@example.com".into(),
                role: KontoRolle::Benutzer,
                first_name: None,
                last_name: None,
                profile_pic: None,
                birthdate: None,
                gender: None,
            },
        };
        let json = serde_json::to_value(&anmeldung).unwrap();
        assert_eq!(json["access_token"], "a");
        assert_eq!(json["token_type"], "bearer");
        assert_eq!(json["user"]["role"], "user");
    }

    /// Repository mit abschaltbaren Sitzungs-Schreibzugriffen
    struct SchreibFehler {
        db: SpeicherDb,
        anhaengen_scheitert: bool,
        tauschen_scheitert: bool,
    }

    impl KontoRepository for SchreibFehler {
        async fn create(&self, data: NeuesKonto<'_>) -> DbResult<KontoRecord> {
            self.db.create(data).await
        }
        async fn get_by_id(&self, id: KontoId) -> DbResult<Option<KontoRecord>> {
            self.db.get_by_id(id).await
        }
        async fn get_by_email(&self, email: &str) -> DbResult<Option<KontoRecord>> {
            self.db.get_by_email(email).await
        }
        async fn update(&self, id: KontoId, data: KontoUpdate) -> DbResult<KontoRecord> {
            self.db.update(id, data).await
        }
        async fn delete(&self, id: KontoId) -> DbResult<bool> {
            self.db.delete(id).await
        }
        async fn reactivate_expired(&self, id: KontoId, jetzt: DateTime<Utc>) -> DbResult<bool> {
            self.db.reactivate_expired(id, jetzt).await
        }
    }

    impl SitzungRepository for SchreibFehler {
        async fn append_session(
            &self,
            konto_id: KontoId,
            sitzung: RefreshSitzungRecord,
            obergrenze: usize,
            jetzt: DateTime<Utc>,
        ) -> DbResult<SitzungAngehaengt> {
            if self.anhaengen_scheitert {
                return Err(DbError::intern("Speicher schreibgeschuetzt"));
            }
            self.db.append_session(konto_id, sitzung, obergrenze, jetzt).await
        }
        async fn replace_session(
            &self,
            konto_id: KontoId,
            alter_hash: &str,
            neue: RefreshSitzungRecord,
            jetzt: DateTime<Utc>,
        ) -> DbResult<bool> {
            if self.tauschen_scheitert {
                return Err(DbError::Zeitlimit);
            }
            self.db.replace_session(konto_id, alter_hash, neue, jetzt).await
        }
        async fn find_session(
            &self,
            konto_id: KontoId,
            token_hash: &str,
        ) -> DbResult<Option<RefreshSitzungRecord>> {
            self.db.find_session(konto_id, token_hash).await
        }
        async fn touch_session(
            &self,
            konto_id: KontoId,
            token_hash: &str,
            jetzt: DateTime<Utc>,
        ) -> DbResult<bool> {
            self.db.touch_session(konto_id, token_hash, jetzt).await
        }
        async fn remove_session(&self, konto_id: KontoId, token_hash: &str) -> DbResult<bool> {
            self.db.remove_session(konto_id, token_hash).await
        }
        async fn clear_sessions(&self, konto_id: KontoId) -> DbResult<u64> {
            self.db.clear_sessions(konto_id).await
        }
        async fn list_sessions(&self, konto_id: KontoId) -> DbResult<Vec<RefreshSitzungRecord>> {
            self.db.list_sessions(konto_id).await
        }
        async fn purge_expired(&self, jetzt: DateTime<Utc>) -> DbResult<u64> {
            self.db.purge_expired(jetzt).await
        }
    }

    #[tokio::test]
    async fn login_scheitert_wenn_sitzung_nicht_gespeichert_wird() {
        let uhr = Arc::new(FesteUhr::ab_jetzt());
        let service = AuthService::neu(
            Arc::new(SchreibFehler {
                db: SpeicherDb::neu(),
                anhaengen_scheitert: true,
                tauschen_scheitert: false,
            }),
            &test_konfig(),
            &schluessel(),
            uhr,
        )
        .unwrap();
        service
            .registrieren("i@example.com", "passwort1", KontoProfil::default())
            .await
            .unwrap();

        let err = service.anmelden("i@example.com", "passwort1").await.unwrap_err();
        assert!(matches!(err, AuthError::SpeicherNichtVerfuegbar(_)));
        assert!(err.ist_serverfehler());
    }
}
