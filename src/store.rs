//! Persistence for prawns and accepted predictions. Rows live in SQLite;
//! prediction photos are written to the upload directory.

use crate::preprocess;
use anyhow::{Context, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::PathBuf;
use tracing::{debug, info};

/// A tracked broodstock animal
#[derive(Debug, Clone, Serialize, sqlx::FromRow, PartialEq)]
pub struct Prawn {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub date_of_birth: String,
    pub created_at: String,
}

/// A prediction the user chose to keep
#[derive(Debug, Clone, Serialize, sqlx::FromRow, PartialEq)]
pub struct SavedPrediction {
    pub id: i64,
    pub user_id: i64,
    pub prawn_id: i64,
    pub image_path: Option<String>,
    pub predicted_days: i64,
    pub current_day: i64,
    pub confidence: f64,
    pub created_at: String,
}

/// The numeric fields of a prediction to persist
#[derive(Debug, Clone, Deserialize)]
pub struct NewPrediction {
    pub prawn_id: i64,
    pub predicted_days: i64,
    pub current_day: i64,
    pub confidence: f64,
}

#[derive(Debug, Clone)]
pub struct Store {
    pool: SqlitePool,
    upload_dir: PathBuf,
}

impl Store {
    /// Connect to the database and create the tables if needed
    pub async fn connect(database_url: &str, upload_dir: impl Into<PathBuf>) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .with_context(|| format!("failed to open database {database_url}"))?;
        Self::with_pool(pool, upload_dir).await
    }

    /// Use an existing pool, creating the tables if needed
    pub async fn with_pool(pool: SqlitePool, upload_dir: impl Into<PathBuf>) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS prawns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                date_of_birth TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS predictions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                prawn_id INTEGER NOT NULL REFERENCES prawns(id),
                image_path TEXT,
                predicted_days INTEGER NOT NULL,
                current_day INTEGER NOT NULL,
                confidence REAL NOT NULL,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&pool)
        .await?;

        let upload_dir = upload_dir.into();
        tokio::fs::create_dir_all(&upload_dir).await?;
        info!("storage ready, uploads in {}", upload_dir.display());

        Ok(Store { pool, upload_dir })
    }

    pub async fn create_prawn(&self, user_id: i64, name: &str, date_of_birth: &str) -> Result<Prawn> {
        let id = sqlx::query("INSERT INTO prawns (user_id, name, date_of_birth) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(name)
            .bind(date_of_birth)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();

        let prawn = sqlx::query_as::<_, Prawn>("SELECT * FROM prawns WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(prawn)
    }

    /// All prawns of a user, newest first
    pub async fn list_prawns(&self, user_id: i64) -> Result<Vec<Prawn>> {
        let prawns = sqlx::query_as::<_, Prawn>(
            "SELECT * FROM prawns WHERE user_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(prawns)
    }

    /// Delete a prawn and its predictions. Returns false if the user owns no
    /// such prawn.
    pub async fn delete_prawn(&self, user_id: i64, prawn_id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let owned = sqlx::query("SELECT id FROM prawns WHERE id = ? AND user_id = ?")
            .bind(prawn_id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .is_some();
        if !owned {
            return Ok(false);
        }

        sqlx::query("DELETE FROM predictions WHERE prawn_id = ?")
            .bind(prawn_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM prawns WHERE id = ? AND user_id = ?")
            .bind(prawn_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Persist an accepted prediction. A data-URI image is written to the
    /// upload directory and its path stored with the row. Returns None, and
    /// writes nothing, if the user owns no such prawn.
    pub async fn save_prediction(
        &self,
        user_id: i64,
        prediction: &NewPrediction,
        image: Option<&str>,
    ) -> Result<Option<i64>> {
        let mut tx = self.pool.begin().await?;

        let owned = sqlx::query("SELECT id FROM prawns WHERE id = ? AND user_id = ?")
            .bind(prediction.prawn_id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .is_some();
        if !owned {
            return Ok(None);
        }

        let image_path = match image {
            Some(image) if image.starts_with("data:image") => {
                Some(self.save_image(user_id, image).await?)
            }
            _ => None,
        };

        let id = sqlx::query(
            r#"
            INSERT INTO predictions
                (user_id, prawn_id, image_path, predicted_days, current_day, confidence)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(prediction.prawn_id)
        .bind(&image_path)
        .bind(prediction.predicted_days)
        .bind(prediction.current_day)
        .bind(prediction.confidence)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        tx.commit().await?;
        debug!("saved prediction {id} for prawn {}", prediction.prawn_id);
        Ok(Some(id))
    }

    /// Predictions for one of the user's prawns, newest first
    pub async fn list_predictions(&self, user_id: i64, prawn_id: i64) -> Result<Vec<SavedPrediction>> {
        let predictions = sqlx::query_as::<_, SavedPrediction>(
            r#"
            SELECT * FROM predictions
            WHERE user_id = ? AND prawn_id = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .bind(prawn_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(predictions)
    }

    /// Write the photo to disk and return the path relative to the static root
    async fn save_image(&self, user_id: i64, image: &str) -> Result<String> {
        let bytes = preprocess::decode_b64(image)?;

        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let suffix: u32 = rand::thread_rng().gen_range(0, 1_000_000);
        let filename = format!("prediction_{user_id}_{timestamp}_{suffix:06}.jpg");

        let path = self.upload_dir.join(&filename);
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;

        Ok(format!("uploads/{filename}"))
    }
}
