use crate::infrastructure::error::InfraError;
use crate::infrastructure::storage::open_connection;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::params;
use std::path::{Path, PathBuf};

#[async_trait]
pub trait ActivityRegistrar: Send + Sync {
    async fn register_activity(&self, user_id: &str) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteActivityRegistrar {
    db_path: PathBuf,
}

impl SqliteActivityRegistrar {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    pub fn record_at(&self, user_id: &str, at: DateTime<Utc>) -> Result<(), InfraError> {
        let connection = open_connection(&self.db_path)?;
        connection.execute(
            "INSERT INTO activity_log (user_id, activity_date, recorded_at) VALUES (?1, ?2, ?3)",
            params![user_id, at.date_naive().to_string(), at.to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn active_days(&self, user_id: &str) -> Result<Vec<NaiveDate>, InfraError> {
        let connection = open_connection(&self.db_path)?;
        let mut statement = connection.prepare(
            "SELECT DISTINCT activity_date FROM activity_log
             WHERE user_id = ?1 ORDER BY activity_date DESC",
        )?;
        let rows = statement.query_map(params![user_id], |row| row.get::<_, String>(0))?;
        let mut days = Vec::new();
        for raw in rows {
            let raw = raw?;
            let day = NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|error| {
                InfraError::InvalidConfig(format!("invalid activity_log.activity_date '{raw}': {error}"))
            })?;
            days.push(day);
        }
        Ok(days)
    }
}

#[async_trait]
impl ActivityRegistrar for SqliteActivityRegistrar {
    async fn register_activity(&self, user_id: &str) -> Result<(), InfraError> {
        let registrar = self.clone();
        let user_id = user_id.to_string();
        tokio::task::spawn_blocking(move || registrar.record_at(&user_id, Utc::now()))
            .await
            .map_err(|error| InfraError::Unavailable(format!("activity registration task failed: {error}")))?
    }
}
