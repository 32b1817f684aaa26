use crate::domain::models::{Block, BlockSpec, Cycle, next_id};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::storage::open_connection;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

pub trait CycleRepository: Send + Sync {
    fn create(&self, owner_id: &str, name: &str, blocks: &[BlockSpec]) -> Result<Cycle, InfraError>;
    fn update(&self, cycle_id: &str, name: &str, blocks: &[BlockSpec]) -> Result<(), InfraError>;
    fn delete(&self, cycle_id: &str) -> Result<(), InfraError>;
    fn set_active(&self, cycle_id: &str, is_active: bool) -> Result<(), InfraError>;
    fn list(&self, owner_id: &str) -> Result<Vec<Cycle>, InfraError>;
    fn get(&self, cycle_id: &str) -> Result<Option<Cycle>, InfraError>;
}

fn ranked_blocks(blocks: &[BlockSpec]) -> Vec<Block> {
    blocks
        .iter()
        .enumerate()
        .map(|(index, spec)| Block {
            id: next_id("blk"),
            subject_id: spec.subject_id.clone(),
            allocated_minutes: spec.allocated_minutes,
            order: index as u32,
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct SqliteCycleRepository {
    db_path: PathBuf,
}

impl SqliteCycleRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        open_connection(&self.db_path)
    }

    fn insert_blocks(transaction: &Transaction<'_>, cycle_id: &str, blocks: &[Block]) -> Result<(), InfraError> {
        let mut statement = transaction.prepare(
            "INSERT INTO cycle_blocks (id, cycle_id, subject_id, allocated_minutes, block_order)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for block in blocks {
            statement.execute(params![
                block.id,
                cycle_id,
                block.subject_id,
                block.allocated_minutes,
                block.order
            ])?;
        }
        Ok(())
    }

    fn load_blocks(connection: &Connection, cycle_id: &str) -> Result<Vec<Block>, InfraError> {
        let mut statement = connection.prepare(
            "SELECT id, subject_id, allocated_minutes, block_order
             FROM cycle_blocks WHERE cycle_id = ?1 ORDER BY block_order",
        )?;
        let rows = statement.query_map(params![cycle_id], |row| {
            Ok(Block {
                id: row.get(0)?,
                subject_id: row.get(1)?,
                allocated_minutes: row.get(2)?,
                order: row.get(3)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(InfraError::from)
    }

    fn load_cycle(connection: &Connection, row: CycleRow) -> Result<Cycle, InfraError> {
        let (id, owner_id, name, is_active, created_at, updated_at) = row;
        let blocks = Self::load_blocks(connection, &id)?;
        Ok(Cycle {
            created_at: parse_timestamp(&created_at, "cycles.created_at")?,
            updated_at: parse_timestamp(&updated_at, "cycles.updated_at")?,
            id,
            owner_id,
            name,
            blocks,
            is_active,
        })
    }
}

type CycleRow = (String, String, String, bool, String, String);

fn cycle_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CycleRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn parse_timestamp(raw: &str, field_name: &str) -> Result<DateTime<Utc>, InfraError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| InfraError::InvalidConfig(format!("invalid {field_name} '{raw}': {error}")))
}

impl CycleRepository for SqliteCycleRepository {
    fn create(&self, owner_id: &str, name: &str, blocks: &[BlockSpec]) -> Result<Cycle, InfraError> {
        let now = Utc::now();
        let cycle = Cycle {
            id: next_id("cyc"),
            owner_id: owner_id.to_string(),
            name: name.to_string(),
            blocks: ranked_blocks(blocks),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        let mut connection = self.connect()?;
        let transaction = connection.transaction()?;
        transaction.execute(
            "INSERT INTO cycles (id, owner_id, name, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                cycle.id,
                cycle.owner_id,
                cycle.name,
                cycle.is_active,
                cycle.created_at.to_rfc3339(),
                cycle.updated_at.to_rfc3339()
            ],
        )?;
        Self::insert_blocks(&transaction, &cycle.id, &cycle.blocks)?;
        transaction.commit()?;
        Ok(cycle)
    }

    fn update(&self, cycle_id: &str, name: &str, blocks: &[BlockSpec]) -> Result<(), InfraError> {
        let mut connection = self.connect()?;
        let transaction = connection.transaction()?;
        let changed = transaction.execute(
            "UPDATE cycles SET name = ?2, updated_at = ?3 WHERE id = ?1",
            params![cycle_id, name, Utc::now().to_rfc3339()],
        )?;
        if changed == 0 {
            return Err(InfraError::NotFound(format!("cycle {cycle_id}")));
        }
        transaction.execute(
            "DELETE FROM cycle_blocks WHERE cycle_id = ?1",
            params![cycle_id],
        )?;
        Self::insert_blocks(&transaction, cycle_id, &ranked_blocks(blocks))?;
        transaction.commit()?;
        Ok(())
    }

    fn delete(&self, cycle_id: &str) -> Result<(), InfraError> {
        let connection = self.connect()?;
        let removed = connection.execute("DELETE FROM cycles WHERE id = ?1", params![cycle_id])?;
        if removed == 0 {
            return Err(InfraError::NotFound(format!("cycle {cycle_id}")));
        }
        Ok(())
    }

    fn set_active(&self, cycle_id: &str, is_active: bool) -> Result<(), InfraError> {
        let connection = self.connect()?;
        let changed = connection.execute(
            "UPDATE cycles SET is_active = ?2, updated_at = ?3 WHERE id = ?1",
            params![cycle_id, is_active, Utc::now().to_rfc3339()],
        )?;
        if changed == 0 {
            return Err(InfraError::NotFound(format!("cycle {cycle_id}")));
        }
        Ok(())
    }

    fn list(&self, owner_id: &str) -> Result<Vec<Cycle>, InfraError> {
        let connection = self.connect()?;
        let rows = {
            let mut statement = connection.prepare(
                "SELECT id, owner_id, name, is_active, created_at, updated_at
                 FROM cycles WHERE owner_id = ?1 ORDER BY created_at, id",
            )?;
            let rows = statement.query_map(params![owner_id], cycle_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        rows.into_iter()
            .map(|row| Self::load_cycle(&connection, row))
            .collect()
    }

    fn get(&self, cycle_id: &str) -> Result<Option<Cycle>, InfraError> {
        let connection = self.connect()?;
        let row = connection
            .query_row(
                "SELECT id, owner_id, name, is_active, created_at, updated_at
                 FROM cycles WHERE id = ?1",
                params![cycle_id],
                cycle_row,
            )
            .optional()?;
        row.map(|row| Self::load_cycle(&connection, row)).transpose()
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCycleRepository {
    cycles: Mutex<HashMap<String, Cycle>>,
}

impl InMemoryCycleRepository {
    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Cycle>>, InfraError> {
        self.cycles
            .lock()
            .map_err(|error| InfraError::Unavailable(format!("cycle store lock poisoned: {error}")))
    }

    fn with_cycle<T>(
        &self,
        cycle_id: &str,
        apply: impl FnOnce(&mut Cycle) -> T,
    ) -> Result<T, InfraError> {
        let mut cycles = self.lock()?;
        let cycle = cycles
            .get_mut(cycle_id)
            .ok_or_else(|| InfraError::NotFound(format!("cycle {cycle_id}")))?;
        let result = apply(cycle);
        cycle.updated_at = Utc::now();
        Ok(result)
    }
}

impl CycleRepository for InMemoryCycleRepository {
    fn create(&self, owner_id: &str, name: &str, blocks: &[BlockSpec]) -> Result<Cycle, InfraError> {
        let now = Utc::now();
        let cycle = Cycle {
            id: next_id("cyc"),
            owner_id: owner_id.to_string(),
            name: name.to_string(),
            blocks: ranked_blocks(blocks),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.lock()?.insert(cycle.id.clone(), cycle.clone());
        Ok(cycle)
    }

    fn update(&self, cycle_id: &str, name: &str, blocks: &[BlockSpec]) -> Result<(), InfraError> {
        self.with_cycle(cycle_id, |cycle| {
            cycle.name = name.to_string();
            cycle.blocks = ranked_blocks(blocks);
        })
    }

    fn delete(&self, cycle_id: &str) -> Result<(), InfraError> {
        self.lock()?
            .remove(cycle_id)
            .map(|_| ())
            .ok_or_else(|| InfraError::NotFound(format!("cycle {cycle_id}")))
    }

    fn set_active(&self, cycle_id: &str, is_active: bool) -> Result<(), InfraError> {
        self.with_cycle(cycle_id, |cycle| cycle.is_active = is_active)
    }

    fn list(&self, owner_id: &str) -> Result<Vec<Cycle>, InfraError> {
        let mut cycles = self
            .lock()?
            .values()
            .filter(|cycle| cycle.owner_id == owner_id)
            .cloned()
            .collect::<Vec<_>>();
        cycles.sort_by(|left, right| {
            left.created_at
                .cmp(&right.created_at)
                .then_with(|| left.id.cmp(&right.id))
        });
        Ok(cycles)
    }

    fn get(&self, cycle_id: &str) -> Result<Option<Cycle>, InfraError> {
        Ok(self.lock()?.get(cycle_id).cloned())
    }
}
