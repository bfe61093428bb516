//! Ende-zu-Ende-Szenarien des AuthService ueber SQLite (In-Memory und Datei)

use std::sync::Arc;

use articulink_auth::{Argon2Konfig, AuthError, AuthKonfig, AuthService, SignaturSchluessel};
use articulink_core::{FesteUhr, KontoId, Uhr};
use articulink_db::{
    models::KontoProfil, DatabaseBackend, DatabaseConfig, SitzungRepository, SqliteDb,
};
use chrono::Duration;

struct Umgebung {
    service: AuthService<SqliteDb>,
    db: Arc<SqliteDb>,
    uhr: Arc<FesteUhr>,
}

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

async fn umgebung() -> Umgebung {
    let db = Arc::new(
        SqliteDb::in_memory()
            .await
            .expect("In-Memory DB konnte nicht erstellt werden"),
    );
    umgebung_mit(db, test_konfig())
}

fn umgebung_mit(db: Arc<SqliteDb>, konfig: AuthKonfig) -> Umgebung {
    let uhr = Arc::new(FesteUhr::ab_jetzt());
    let schluessel = SignaturSchluessel::neu(
        "zugriff-schluessel-szenarien-0123456789",
        "refresh-schluessel-szenarien-0123456789",
    )
    .unwrap();
    let service = AuthService::neu(db.clone(), &konfig, &schluessel, uhr.clone()).unwrap();
    Umgebung { service, db, uhr }
}

/// SQLite-Datei mit mehreren Verbindungen; wird beim Drop entfernt
struct DateiDb {
    pfad: std::path::PathBuf,
}

impl DateiDb {
    fn neu() -> Self {
        let pfad = std::env::temp_dir().join(format!("articulink-{}.db", uuid::Uuid::new_v4()));
        Self { pfad }
    }

    async fn oeffnen(&self) -> Arc<SqliteDb> {
        let config = DatabaseConfig {
            backend: DatabaseBackend::Sqlite,
            url: format!("sqlite://{}", self.pfad.display()),
            max_verbindungen: 8,
            sqlite_wal: true,
        };
        Arc::new(
            SqliteDb::oeffnen(&config)
                .await
                .expect("Datei-DB konnte nicht geoeffnet werden"),
        )
    }
}

impl Drop for DateiDb {
    fn drop(&mut self) {
        for endung in ["", "-wal", "-shm"] {
            let mut pfad = self.pfad.clone().into_os_string();
            pfad.push(endung);
            let _ = std::fs::remove_file(pfad);
        }
    }
}

async fn konto(u: &Umgebung, email: &str) -> KontoId {
    u.service
        .registrieren(email, "passwort123", KontoProfil::default())
        .await
        .expect("Registrierung fehlgeschlagen")
        .id
}

#[tokio::test]
async fn vierter_login_verdraengt_ersten() {
    let u = umgebung().await;
    let id = konto(&u, "vier@example.com").await;

    let mut refresh = Vec::new();
    for _ in 0..4 {
        let a = u.service.anmelden("vier@example.com", "passwort123").await.unwrap();
        refresh.push(a.refresh_token);
        u.uhr.vorstellen(Duration::seconds(1));
    }

    assert_eq!(u.db.list_sessions(id).await.unwrap().len(), 3);
    assert!(matches!(
        u.service.erneuern(&refresh[0]).await,
        Err(AuthError::NichtAuthentifiziert)
    ));
    for token in &refresh[1..] {
        assert!(u.service.erneuern(token).await.is_ok());
    }
}

#[tokio::test]
async fn gleichzeitige_logins_halten_obergrenze() {
    let u = umgebung().await;
    let id = konto(&u, "parallel@example.com").await;

    let (a, b, c, d, e) = tokio::join!(
        u.service.anmelden("parallel@example.com", "passwort123"),
        u.service.anmelden("parallel@example.com", "passwort123"),
        u.service.anmelden("parallel@example.com", "passwort123"),
        u.service.anmelden("parallel@example.com", "passwort123"),
        u.service.anmelden("parallel@example.com", "passwort123"),
    );
    for ergebnis in [a, b, c, d, e] {
        ergebnis.expect("Login fehlgeschlagen");
    }

    assert_eq!(u.db.list_sessions(id).await.unwrap().len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallele_logins_ueber_mehrere_verbindungen_halten_obergrenze() {
    let datei = DateiDb::neu();
    let u = umgebung_mit(datei.oeffnen().await, test_konfig());
    let id = konto(&u, "pool@example.com").await;
    let service = Arc::new(u.service);

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move { service.anmelden("pool@example.com", "passwort123").await })
        })
        .collect();

    let mut fehlgeschlagen = 0;
    for handle in handles {
        if handle.await.expect("Task abgebrochen").is_err() {
            fehlgeschlagen += 1;
        }
    }

    assert_eq!(fehlgeschlagen, 0);
    assert_eq!(u.db.list_sessions(id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn rotiertes_token_wird_nur_einmal_eingeloest() {
    let db = Arc::new(SqliteDb::in_memory().await.unwrap());
    let u = umgebung_mit(
        db,
        AuthKonfig {
            refresh_rotation: true,
            ..test_konfig()
        },
    );
    let id = konto(&u, "rotation@example.com").await;
    let a = u.service.anmelden("rotation@example.com", "passwort123").await.unwrap();

    let (erste, zweite) = tokio::join!(
        u.service.erneuern(&a.refresh_token),
        u.service.erneuern(&a.refresh_token),
    );

    assert_eq!(
        [&erste, &zweite].iter().filter(|e| e.is_ok()).count(),
        1,
        "erste={erste:?} zweite={zweite:?}"
    );
    assert_eq!(u.db.list_sessions(id).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn rotation_ueber_mehrere_verbindungen_einmalig() {
    let datei = DateiDb::neu();
    let u = umgebung_mit(
        datei.oeffnen().await,
        AuthKonfig {
            refresh_rotation: true,
            ..test_konfig()
        },
    );
    let id = konto(&u, "rennen@example.com").await;
    let a = u.service.anmelden("rennen@example.com", "passwort123").await.unwrap();
    let service = Arc::new(u.service);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let service = service.clone();
            let token = a.refresh_token.clone();
            tokio::spawn(async move { service.erneuern(&token).await })
        })
        .collect();

    let mut erfolgreich = 0;
    for handle in handles {
        match handle.await.expect("Task abgebrochen") {
            Ok(_) => erfolgreich += 1,
            Err(AuthError::NichtAuthentifiziert) => {}
            Err(e) => panic!("Unerwarteter Fehler: {e:?}"),
        }
    }

    assert_eq!(erfolgreich, 1);
    assert_eq!(u.db.list_sessions(id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn alle_geraete_abmelden() {
    let u = umgebung().await;
    let id = konto(&u, "alle@example.com").await;
    let a = u.service.anmelden("alle@example.com", "passwort123").await.unwrap();
    let _b = u.service.anmelden("alle@example.com", "passwort123").await.unwrap();

    assert_eq!(u.service.abmelden(id, None, true).await.unwrap(), 2);
    assert!(u.db.list_sessions(id).await.unwrap().is_empty());
    assert!(matches!(
        u.service.erneuern(&a.refresh_token).await,
        Err(AuthError::NichtAuthentifiziert)
    ));
}

#[tokio::test]
async fn temporaere_sperre_laeuft_ab_und_login_gelingt() {
    let u = umgebung().await;
    let id = konto(&u, "pause@example.com").await;
    u.service
        .status_tor()
        .deaktivieren(id, Some("Pause"), Some(Duration::days(3)))
        .await
        .unwrap();

    match u.service.anmelden("pause@example.com", "passwort123").await {
        Err(AuthError::TemporaerDeaktiviert {
            verbleibende_tage,
            grund,
        }) => {
            assert_eq!(verbleibende_tage, 3);
            assert_eq!(grund.as_deref(), Some("Pause"));
        }
        andere => panic!("Unerwartet: {andere:?}"),
    }

    u.uhr.vorstellen(Duration::days(3) + Duration::seconds(1));
    let anmeldung = u.service.anmelden("pause@example.com", "passwort123").await.unwrap();
    assert_eq!(anmeldung.konto.id, id);

    let profil = u.service.profil(id).await.unwrap();
    assert_eq!(profil.id, id);
}

#[tokio::test]
async fn permanente_sperre() {
    let u = umgebung().await;
    let id = konto(&u, "gesperrt@example.com").await;
    let anmeldung = u.service.anmelden("gesperrt@example.com", "passwort123").await.unwrap();

    u.service
        .status_tor()
        .deaktivieren(id, Some("Missbrauch"), None)
        .await
        .unwrap();

    assert!(matches!(
        u.service.anmelden("gesperrt@example.com", "passwort123").await,
        Err(AuthError::PermanentDeaktiviert { .. })
    ));
    // Ausserhalb des Logins ohne Details
    assert!(matches!(
        u.service
            .authentifizieren(&format!("Bearer {}", anmeldung.zugriffs_token))
            .await,
        Err(AuthError::NichtAuthentifiziert)
    ));
    assert!(matches!(
        u.service.erneuern(&anmeldung.refresh_token).await,
        Err(AuthError::NichtAuthentifiziert)
    ));
}

#[tokio::test]
async fn abgelaufene_sitzung_beim_erneuern() {
    let u = umgebung().await;
    let id = konto(&u, "alt@example.com").await;
    let anmeldung = u.service.anmelden("alt@example.com", "passwort123").await.unwrap();

    u.uhr.vorstellen(Duration::days(31));
    assert!(matches!(
        u.service.erneuern(&anmeldung.refresh_token).await,
        Err(AuthError::NichtAuthentifiziert)
    ));

    // Naechster Login raeumt die abgelaufene Sitzung weg
    u.service.anmelden("alt@example.com", "passwort123").await.unwrap();
    assert_eq!(u.db.list_sessions(id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn bereinigung_ueber_alle_konten() {
    let u = umgebung().await;
    let a = konto(&u, "a@example.com").await;
    let b = konto(&u, "b@example.com").await;
    u.service.anmelden("a@example.com", "passwort123").await.unwrap();
    u.service.anmelden("b@example.com", "passwort123").await.unwrap();

    u.uhr.vorstellen(Duration::days(31));
    let entfernt = u
        .service
        .sitzungen()
        .alle_abgelaufenen_bereinigen(u.uhr.jetzt())
        .await
        .unwrap();

    assert_eq!(entfernt, 2);
    assert!(u.service.aktive_sitzungen(a).await.unwrap().is_empty());
    assert!(u.service.aktive_sitzungen(b).await.unwrap().is_empty());
}
