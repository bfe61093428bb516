//! articulink-server – Bibliotheks-Root
//!
//! Waehlt das Speicher-Backend, baut den AuthService auf, startet die
//! periodische Sitzungs-Bereinigung und laeuft bis zum Shutdown-Signal.

pub mod config;

use std::sync::Arc;

use anyhow::Result;
use articulink_auth::{AuthService, SignaturSchluessel, SitzungsSpeicher};
use articulink_core::{SystemUhr, Uhr};
use articulink_db::{DatabaseBackend, KontoRepository, SitzungRepository, SpeicherDb, SqliteDb};
use config::ServerConfig;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
    uhr: Arc<dyn Uhr>,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self {
            config,
            uhr: Arc::new(SystemUhr),
        }
    }

    /// Startet alle Subsysteme und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Signaturschluessel aus der Umgebung laden
    /// 2. Speicher-Backend oeffnen (inkl. Migrationen)
    /// 3. AuthService aufbauen, Bereinigung starten
    /// 4. Auf Ctrl-C warten
    pub async fn starten(self) -> Result<()> {
        let schluessel = SignaturSchluessel::aus_env()?;
        let db_config = self.config.datenbank.als_db_config()?;

        tracing::info!(
            backend = %db_config.backend,
            url = %db_config.url,
            "Speicher-Backend wird geoeffnet"
        );

        match db_config.backend {
            DatabaseBackend::Sqlite => {
                let db = SqliteDb::oeffnen(&db_config).await?;
                self.betreiben(Arc::new(db), &schluessel).await
            }
            DatabaseBackend::Speicher => {
                tracing::warn!("In-Memory-Backend aktiv, Konten gehen beim Beenden verloren");
                self.betreiben(Arc::new(SpeicherDb::neu()), &schluessel).await
            }
        }
    }

    /// Baut den AuthService ueber einem beliebigen Backend auf
    pub fn dienst_erstellen<R>(
        &self,
        repo: Arc<R>,
        schluessel: &SignaturSchluessel,
    ) -> Result<AuthService<R>>
    where
        R: KontoRepository + SitzungRepository + 'static,
    {
        Ok(AuthService::neu(
            repo,
            &self.config.auth,
            schluessel,
            self.uhr.clone(),
        )?)
    }

    async fn betreiben<R>(&self, repo: Arc<R>, schluessel: &SignaturSchluessel) -> Result<()>
    where
        R: KontoRepository + SitzungRepository + 'static,
    {
        let dienst = self.dienst_erstellen(repo, schluessel)?;
        let bereinigung = SitzungsSpeicher::bereinigung_starten(
            dienst.sitzungen().clone(),
            self.config.auth.bereinigung_intervall(),
        );

        tracing::info!(
            refresh_rotation = self.config.auth.refresh_rotation,
            zugriff_ttl_s = self.config.auth.zugriff_ttl_sekunden,
            refresh_ttl_s = self.config.auth.refresh_ttl_sekunden,
            "Server laeuft. Warte auf Shutdown-Signal (Ctrl-C)..."
        );
        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown-Signal empfangen, Server wird beendet");

        bereinigung.abort();
        Ok(())
    }
}
