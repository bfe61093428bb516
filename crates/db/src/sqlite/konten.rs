//! SQLite-Implementierung des KontoRepository

use articulink_core::KontoId;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::Row;
use uuid::Uuid;

use crate::error::DbError;
use crate::models::{
    Deaktivierung, DeaktivierungsArt, KontoProfil, KontoRecord, KontoRolle, KontoStatus,
    KontoUpdate, NeuesKonto,
};
use crate::repository::{DbResult, KontoRepository};
use crate::sqlite::pool::{zeit_parsen, zeit_text, SqliteDb};
use crate::sqlite::sitzungen::sitzungen_laden;

const KONTO_SPALTEN: &str = "id, email, password_hash, role, status, deactivation_type,
    deactivation_reason, deactivation_end_date, first_name, last_name, profile_pic,
    birthdate, gender, created_at";

impl KontoRepository for SqliteDb {
    async fn create(&self, data: NeuesKonto<'_>) -> DbResult<KontoRecord> {
        let id = KontoId::new();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO accounts (id, email, password_hash, role, status, first_name,
                 last_name, profile_pic, birthdate, gender, created_at)
             VALUES (?, ?, ?, ?, 'active', ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.inner().to_string())
        .bind(data.email)
        .bind(data.password_hash)
        .bind(data.role.als_str())
        .bind(&data.profil.first_name)
        .bind(&data.profil.last_name)
        .bind(&data.profil.profile_pic)
        .bind(data.profil.birthdate.map(|d| d.format("%Y-%m-%d").to_string()))
        .bind(&data.profil.gender)
        .bind(zeit_text(&now))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let msg = e.to_string();
            if msg.contains("UNIQUE") || msg.contains("unique") {
                DbError::Eindeutigkeit(format!("E-Mail '{}' bereits registriert", data.email))
            } else {
                DbError::Sqlx(e)
            }
        })?;

        Ok(KontoRecord {
            id,
            email: data.email.to_string(),
            password_hash: data.password_hash.to_string(),
            role: data.role,
            status: KontoStatus::Aktiv,
            deaktivierung: None,
            profil: data.profil,
            created_at: now,
            refresh_tokens: Vec::new(),
        })
    }

    async fn get_by_id(&self, id: KontoId) -> DbResult<Option<KontoRecord>> {
        let sql = format!("SELECT {KONTO_SPALTEN} FROM accounts WHERE id = ?");
        let row = sqlx::query(&sql)
            .bind(id.inner().to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => Ok(Some(self.konto_mit_sitzungen(&r).await?)),
            None => Ok(None),
        }
    }

    async fn get_by_email(&self, email: &str) -> DbResult<Option<KontoRecord>> {
        let sql = format!("SELECT {KONTO_SPALTEN} FROM accounts WHERE email = ?");
        let row = sqlx::query(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(r) => Ok(Some(self.konto_mit_sitzungen(&r).await?)),
            None => Ok(None),
        }
    }

    async fn update(&self, id: KontoId, data: KontoUpdate) -> DbResult<KontoRecord> {
        if data.ist_leer() {
            return self
                .get_by_id(id)
                .await?
                .ok_or_else(|| DbError::nicht_gefunden(format!("Konto {id}")));
        }

        // Dynamisches UPDATE – nur gesetzte Felder aendern
        let mut sets: Vec<&str> = Vec::new();
        if data.password_hash.is_some() {
            sets.push("password_hash = ?");
        }
        if data.role.is_some() {
            sets.push("role = ?");
        }
        if data.status.is_some() {
            sets.push("status = ?");
        }
        if data.deaktivierung.is_some() {
            sets.push("deactivation_type = ?");
            sets.push("deactivation_reason = ?");
            sets.push("deactivation_end_date = ?");
        }
        if data.profil.is_some() {
            sets.push("first_name = ?");
            sets.push("last_name = ?");
            sets.push("profile_pic = ?");
            sets.push("birthdate = ?");
            sets.push("gender = ?");
        }

        let sql = format!("UPDATE accounts SET {} WHERE id = ?", sets.join(", "));
        let mut q = sqlx::query(&sql);

        if let Some(ref v) = data.password_hash {
            q = q.bind(v);
        }
        if let Some(v) = data.role {
            q = q.bind(v.als_str());
        }
        if let Some(v) = data.status {
            q = q.bind(v.als_str());
        }
        if let Some(ref deaktivierung) = data.deaktivierung {
            let d = deaktivierung.as_ref();
            q = q
                .bind(d.map(|d| d.art.als_str()))
                .bind(d.and_then(|d| d.grund.clone()))
                .bind(d.and_then(|d| d.ende.as_ref().map(zeit_text)));
        }
        if let Some(ref p) = data.profil {
            q = q
                .bind(&p.first_name)
                .bind(&p.last_name)
                .bind(&p.profile_pic)
                .bind(p.birthdate.map(|d| d.format("%Y-%m-%d").to_string()))
                .bind(&p.gender);
        }
        q = q.bind(id.inner().to_string());

        let affected = q.execute(&self.pool).await?.rows_affected();
        if affected == 0 {
            return Err(DbError::nicht_gefunden(format!("Konto {id}")));
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::intern("Konto nach Update nicht gefunden"))
    }

    async fn delete(&self, id: KontoId) -> DbResult<bool> {
        // Sitzungen fallen per ON DELETE CASCADE mit weg
        let affected = sqlx::query("DELETE FROM accounts WHERE id = ?")
            .bind(id.inner().to_string())
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }

    async fn reactivate_expired(&self, id: KontoId, jetzt: DateTime<Utc>) -> DbResult<bool> {
        // Bedingtes UPDATE: eine inzwischen geaenderte Deaktivierung
        // (z.B. verlaengert oder permanent) wird nicht ueberschrieben
        let affected = sqlx::query(
            "UPDATE accounts
             SET status = 'active', deactivation_type = NULL,
                 deactivation_reason = NULL, deactivation_end_date = NULL
             WHERE id = ?
               AND status = 'inactive'
               AND deactivation_type = 'temporary'
               AND deactivation_end_date IS NOT NULL
               AND deactivation_end_date < ?",
        )
        .bind(id.inner().to_string())
        .bind(zeit_text(&jetzt))
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(affected > 0)
    }
}

impl SqliteDb {
    async fn konto_mit_sitzungen(&self, row: &sqlx::sqlite::SqliteRow) -> DbResult<KontoRecord> {
        let mut konto = row_to_konto(row)?;
        konto.refresh_tokens = sitzungen_laden(&self.pool, konto.id).await?;
        Ok(konto)
    }
}

fn row_to_konto(row: &sqlx::sqlite::SqliteRow) -> DbResult<KontoRecord> {
    let id_str: String = row.try_get("id")?;
    let id = Uuid::parse_str(&id_str)
        .map(KontoId)
        .map_err(|e| DbError::intern(format!("Ungueltige UUID '{id_str}': {e}")))?;

    let role_str: String = row.try_get("role")?;
    let role = role_str.parse::<KontoRolle>().map_err(DbError::UngueltigeDaten)?;

    let status_str: String = row.try_get("status")?;
    let status = status_str
        .parse::<KontoStatus>()
        .map_err(DbError::UngueltigeDaten)?;

    let art: Option<String> = row.try_get("deactivation_type")?;
    let art = art
        .as_deref()
        .map(str::parse::<DeaktivierungsArt>)
        .transpose()
        .map_err(DbError::UngueltigeDaten)?;
    let grund: Option<String> = row.try_get("deactivation_reason")?;
    let ende: Option<String> = row.try_get("deactivation_end_date")?;
    let ende = ende
        .as_deref()
        .map(|s| zeit_parsen(s, "deactivation_end_date"))
        .transpose()?;
    let deaktivierung = art.map(|art| Deaktivierung { art, grund, ende });

    let birthdate: Option<String> = row.try_get("birthdate")?;
    let birthdate = birthdate
        .as_deref()
        .map(|s| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|e| DbError::intern(format!("Ungueltiges Geburtsdatum '{s}': {e}")))
        })
        .transpose()?;

    let created_at_str: String = row.try_get("created_at")?;

    Ok(KontoRecord {
        id,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        role,
        status,
        deaktivierung,
        profil: KontoProfil {
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            profile_pic: row.try_get("profile_pic")?,
            birthdate,
            gender: row.try_get("gender")?,
        },
        created_at: zeit_parsen(&created_at_str, "created_at")?,
        refresh_tokens: Vec::new(),
    })
}
