use crate::domain::models::Subject;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::storage::open_connection;
use rusqlite::{Connection, params};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub trait SubjectCatalog: Send + Sync {
    fn list_subjects(&self, owner_id: &str) -> Result<Vec<Subject>, InfraError>;
    fn insert(&self, owner_id: &str, subject: &Subject) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteSubjectCatalog {
    db_path: PathBuf,
}

impl SqliteSubjectCatalog {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        open_connection(&self.db_path)
    }
}

impl SubjectCatalog for SqliteSubjectCatalog {
    fn list_subjects(&self, owner_id: &str) -> Result<Vec<Subject>, InfraError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(
            "SELECT id, name, color FROM subjects WHERE owner_id = ?1 ORDER BY name, id",
        )?;
        let rows = statement.query_map(params![owner_id], |row| {
            Ok(Subject {
                id: row.get(0)?,
                name: row.get(1)?,
                color: row.get(2)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(InfraError::from)
    }

    fn insert(&self, owner_id: &str, subject: &Subject) -> Result<(), InfraError> {
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO subjects (id, owner_id, name, color) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, color = excluded.color",
            params![subject.id, owner_id, subject.name, subject.color],
        )?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemorySubjectCatalog {
    subjects: Mutex<HashMap<String, Vec<Subject>>>,
}

impl InMemorySubjectCatalog {
    pub fn with_subjects(owner_id: &str, subjects: Vec<Subject>) -> Self {
        Self {
            subjects: Mutex::new(HashMap::from([(owner_id.to_string(), subjects)])),
        }
    }
}

impl SubjectCatalog for InMemorySubjectCatalog {
    fn list_subjects(&self, owner_id: &str) -> Result<Vec<Subject>, InfraError> {
        let subjects = self
            .subjects
            .lock()
            .map_err(|error| InfraError::Unavailable(format!("subject catalog lock poisoned: {error}")))?;
        Ok(subjects.get(owner_id).cloned().unwrap_or_default())
    }

    fn insert(&self, owner_id: &str, subject: &Subject) -> Result<(), InfraError> {
        let mut subjects = self
            .subjects
            .lock()
            .map_err(|error| InfraError::Unavailable(format!("subject catalog lock poisoned: {error}")))?;
        let owned = subjects.entry(owner_id.to_string()).or_default();
        owned.retain(|existing| existing.id != subject.id);
        owned.push(subject.clone());
        Ok(())
    }
}
