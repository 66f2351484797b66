use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::index::FingerprintIndex;

/// SQLite store holding the catalog and one snapshot of the fingerprint index.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

/// Everything needed to answer queries, as read back from disk.
#[derive(Debug)]
pub struct StoredLibrary {
    pub catalog: Catalog,
    pub index: FingerprintIndex,
    pub settings: serde_json::Value,
}

impl Database {
    pub async fn open(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let db = Database { pool };
        db.init().await?;
        Ok(db)
    }

    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS recordings (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS fingerprint_index (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                entry_count INTEGER NOT NULL,
                config TEXT NOT NULL,
                snapshot BLOB NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Replaces the stored library in a single transaction.
    pub async fn save(&self, catalog: &Catalog, index: &FingerprintIndex, config: &Config) -> Result<()> {
        let snapshot = index.persist()?;
        let settings = serde_json::to_string(&config.fingerprint_settings())?;

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM recordings").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM fingerprint_index").execute(&mut *tx).await?;

        for (id, name) in catalog.iter() {
            sqlx::query("INSERT INTO recordings (id, name) VALUES (?1, ?2)")
                .bind(i64::from(id.0))
                .bind(name)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO fingerprint_index (id, entry_count, config, snapshot)
            VALUES (1, ?1, ?2, ?3)
            "#,
        )
        .bind(index.len() as i64)
        .bind(&settings)
        .bind(&snapshot)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            recordings = catalog.len(),
            keys = index.len(),
            bytes = snapshot.len(),
            "library saved"
        );
        Ok(())
    }

    /// Reads the stored library back. `None` when nothing has been saved yet.
    pub async fn load(&self) -> Result<Option<StoredLibrary>> {
        let row = sqlx::query("SELECT entry_count, config, snapshot FROM fingerprint_index WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let entry_count: i64 = row.try_get("entry_count")?;
        let settings: String = row.try_get("config")?;
        let snapshot: Vec<u8> = row.try_get("snapshot")?;

        let index = FingerprintIndex::restore(&snapshot)?;
        if index.len() as i64 != entry_count {
            return Err(Error::Corrupt(format!(
                "index holds {} keys, {} recorded",
                index.len(),
                entry_count
            )));
        }

        let rows = sqlx::query("SELECT id, name FROM recordings ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        let mut names = Vec::with_capacity(rows.len());
        for (position, row) in rows.iter().enumerate() {
            let id: i64 = row.try_get("id")?;
            if id != position as i64 {
                return Err(Error::Corrupt(format!(
                    "recording ids are not dense: expected {position}, found {id}"
                )));
            }
            names.push(row.try_get::<String, _>("name")?);
        }
        let catalog = Catalog::from_names(names)?;
        index.check_catalog(&catalog)?;

        Ok(Some(StoredLibrary {
            catalog,
            index,
            settings: serde_json::from_str(&settings)?,
        }))
    }

    /// Loads the stored library, warning when it was built with different
    /// fingerprint settings than `config`.
    pub async fn load_for(&self, config: &Config) -> Result<Option<StoredLibrary>> {
        let stored = self.load().await?;
        if let Some(library) = &stored {
            if library.settings != config.fingerprint_settings() {
                warn!(
                    stored = %library.settings,
                    "stored index was built with different fingerprint settings"
                );
            }
        }
        Ok(stored)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
