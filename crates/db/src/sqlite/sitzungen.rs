//! SQLite-Implementierung des SitzungRepository
//!
//! Das Anhaengen laeuft in einer Transaktion, deren erste Anweisung ein
//! Schreibzugriff ist. SQLite nimmt damit sofort die Schreibsperre; zwei
//! gleichzeitige Logins koennen die Obergrenze nicht gemeinsam ueberschreiten.

use articulink_core::KontoId;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePool, Row};

use crate::error::DbError;
use crate::models::{RefreshSitzungRecord, SitzungAngehaengt};
use crate::repository::{DbResult, SitzungRepository};
use crate::sqlite::pool::{zeit_parsen, zeit_text, SqliteDb};

impl SitzungRepository for SqliteDb {
    async fn append_session(
        &self,
        konto_id: KontoId,
        sitzung: RefreshSitzungRecord,
        obergrenze: usize,
        jetzt: DateTime<Utc>,
    ) -> DbResult<SitzungAngehaengt> {
        let id = konto_id.inner().to_string();
        let mut tx = self.pool.begin().await?;

        let abgelaufen_entfernt =
            sqlx::query("DELETE FROM refresh_tokens WHERE account_id = ? AND expires_at < ?")
                .bind(&id)
                .bind(zeit_text(&jetzt))
                .execute(&mut *tx)
                .await?
                .rows_affected();

        let existiert: Option<i64> = sqlx::query_scalar("SELECT 1 FROM accounts WHERE id = ?")
            .bind(&id)
            .fetch_optional(&mut *tx)
            .await?;
        if existiert.is_none() {
            return Err(DbError::nicht_gefunden(format!("Konto {konto_id}")));
        }

        // Gleicher Fingerabdruck wird ersetzt, nicht doppelt gefuehrt
        sqlx::query("DELETE FROM refresh_tokens WHERE account_id = ? AND token_hash = ?")
            .bind(&id)
            .bind(&sitzung.token_hash)
            .execute(&mut *tx)
            .await?;

        let anzahl: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM refresh_tokens WHERE account_id = ?")
                .bind(&id)
                .fetch_one(&mut *tx)
                .await?;

        let obergrenze = obergrenze.max(1) as i64;
        let mut verdraengt = Vec::new();
        if anzahl >= obergrenze {
            let ueberschuss = anzahl - obergrenze + 1;
            let rows = sqlx::query(
                "SELECT seq, token_hash, created_at, last_used, expires_at
                 FROM refresh_tokens WHERE account_id = ?
                 ORDER BY seq ASC LIMIT ?",
            )
            .bind(&id)
            .bind(ueberschuss)
            .fetch_all(&mut *tx)
            .await?;

            for row in &rows {
                let seq: i64 = row.try_get("seq")?;
                sqlx::query("DELETE FROM refresh_tokens WHERE seq = ?")
                    .bind(seq)
                    .execute(&mut *tx)
                    .await?;
                verdraengt.push(row_to_sitzung(row)?);
            }
        }

        sqlx::query(
            "INSERT INTO refresh_tokens (account_id, token_hash, created_at, last_used, expires_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&sitzung.token_hash)
        .bind(zeit_text(&sitzung.created_at))
        .bind(zeit_text(&sitzung.last_used))
        .bind(zeit_text(&sitzung.expires_at))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

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
        let id = konto_id.inner().to_string();
        let mut tx = self.pool.begin().await?;

        // Nur wer die alte Sitzung tatsaechlich entfernt, darf die neue anlegen
        let entfernt = sqlx::query(
            "DELETE FROM refresh_tokens
             WHERE account_id = ? AND token_hash = ? AND expires_at >= ?",
        )
        .bind(&id)
        .bind(alter_hash)
        .bind(zeit_text(&jetzt))
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if entfernt == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("DELETE FROM refresh_tokens WHERE account_id = ? AND token_hash = ?")
            .bind(&id)
            .bind(&neue.token_hash)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO refresh_tokens (account_id, token_hash, created_at, last_used, expires_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&neue.token_hash)
        .bind(zeit_text(&neue.created_at))
        .bind(zeit_text(&neue.last_used))
        .bind(zeit_text(&neue.expires_at))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn find_session(
        &self,
        konto_id: KontoId,
        token_hash: &str,
    ) -> DbResult<Option<RefreshSitzungRecord>> {
        let row = sqlx::query(
            "SELECT token_hash, created_at, last_used, expires_at
             FROM refresh_tokens WHERE account_id = ? AND token_hash = ?",
        )
        .bind(konto_id.inner().to_string())
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_sitzung(&r)).transpose()
    }

    async fn touch_session(
        &self,
        konto_id: KontoId,
        token_hash: &str,
        jetzt: DateTime<Utc>,
    ) -> DbResult<bool> {
        let affected = sqlx::query(
            "UPDATE refresh_tokens SET last_used = ? WHERE account_id = ? AND token_hash = ?",
        )
        .bind(zeit_text(&jetzt))
        .bind(konto_id.inner().to_string())
        .bind(token_hash)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(affected > 0)
    }

    async fn remove_session(&self, konto_id: KontoId, token_hash: &str) -> DbResult<bool> {
        let affected =
            sqlx::query("DELETE FROM refresh_tokens WHERE account_id = ? AND token_hash = ?")
                .bind(konto_id.inner().to_string())
                .bind(token_hash)
                .execute(&self.pool)
                .await?
                .rows_affected();
        Ok(affected > 0)
    }

    async fn clear_sessions(&self, konto_id: KontoId) -> DbResult<u64> {
        let affected = sqlx::query("DELETE FROM refresh_tokens WHERE account_id = ?")
            .bind(konto_id.inner().to_string())
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected)
    }

    async fn list_sessions(&self, konto_id: KontoId) -> DbResult<Vec<RefreshSitzungRecord>> {
        sitzungen_laden(&self.pool, konto_id).await
    }

    async fn purge_expired(&self, jetzt: DateTime<Utc>) -> DbResult<u64> {
        let affected = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < ?")
            .bind(zeit_text(&jetzt))
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected)
    }
}

pub(crate) async fn sitzungen_laden(
    pool: &SqlitePool,
    konto_id: KontoId,
) -> DbResult<Vec<RefreshSitzungRecord>> {
    let rows = sqlx::query(
        "SELECT token_hash, created_at, last_used, expires_at
         FROM refresh_tokens WHERE account_id = ? ORDER BY seq ASC",
    )
    .bind(konto_id.inner().to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_sitzung).collect()
}

fn row_to_sitzung(row: &sqlx::sqlite::SqliteRow) -> DbResult<RefreshSitzungRecord> {
    let created_at: String = row.try_get("created_at")?;
    let last_used: String = row.try_get("last_used")?;
    let expires_at: String = row.try_get("expires_at")?;

    Ok(RefreshSitzungRecord {
        token_hash: row.try_get("token_hash")?,
        created_at: zeit_parsen(&created_at, "created_at")?,
        last_used: zeit_parsen(&last_used, "last_used")?,
        expires_at: zeit_parsen(&expires_at, "expires_at")?,
    })
}
