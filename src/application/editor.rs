use crate::domain::composition::{
    BlockDraft, SubjectOption, ValidatedCycle, clamp_minutes, clamp_minutes_input, move_element,
    rerank, subject_holder, subject_options, valid_total_minutes, validate_draft,
};
use crate::domain::models::{Cycle, DEFAULT_BLOCK_MINUTES, Subject, ValidationError, format_duration_total, next_id};
use crate::infrastructure::cycle_repository::CycleRepository;
use crate::infrastructure::error::InfraError;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("persistence failed: {0}")]
    Persistence(#[from] InfraError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockField {
    Subject(Option<String>),
    Minutes(String),
}

#[derive(Debug, Clone)]
pub struct CycleEditor {
    cycle_id: Option<String>,
    name: String,
    rows: Vec<BlockDraft>,
    default_minutes: u32,
}

impl Default for CycleEditor {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCK_MINUTES)
    }
}

impl CycleEditor {
    pub fn new(default_minutes: u32) -> Self {
        let mut editor = Self {
            cycle_id: None,
            name: String::new(),
            rows: Vec::new(),
            default_minutes: clamp_minutes(i64::from(default_minutes)),
        };
        editor.add_block();
        editor
    }

    pub fn for_cycle(cycle: &Cycle, default_minutes: u32) -> Self {
        let mut rows = cycle
            .ordered_blocks()
            .into_iter()
            .map(|block| BlockDraft {
                id: block.id.clone(),
                subject_id: Some(block.subject_id.clone()),
                allocated_minutes: block.allocated_minutes,
                order: block.order,
            })
            .collect::<Vec<_>>();
        rerank(&mut rows);
        let mut editor = Self {
            cycle_id: Some(cycle.id.clone()),
            name: cycle.name.clone(),
            rows,
            default_minutes: clamp_minutes(i64::from(default_minutes)),
        };
        if editor.rows.is_empty() {
            editor.add_block();
        }
        editor
    }

    pub fn cycle_id(&self) -> Option<&str> {
        self.cycle_id.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn rows(&self) -> &[BlockDraft] {
        &self.rows
    }

    pub fn add_block(&mut self) -> &BlockDraft {
        let order = self.rows.len() as u32;
        self.rows.push(BlockDraft {
            id: next_id("draft"),
            subject_id: None,
            allocated_minutes: self.default_minutes,
            order,
        });
        &self.rows[self.rows.len() - 1]
    }

    /// Removes a row. The last remaining row is replaced by a fresh
    /// placeholder so there is always something to edit.
    pub fn remove_block(&mut self, block_id: &str) -> bool {
        let before = self.rows.len();
        self.rows.retain(|row| row.id != block_id);
        if self.rows.len() == before {
            return false;
        }
        if self.rows.is_empty() {
            self.add_block();
        }
        rerank(&mut self.rows);
        true
    }

    pub fn update_block(&mut self, block_id: &str, field: BlockField) -> Result<&BlockDraft, ValidationError> {
        let position = self
            .rows
            .iter()
            .position(|row| row.id == block_id)
            .ok_or_else(|| ValidationError::UnknownBlock(block_id.to_string()))?;

        match field {
            BlockField::Minutes(raw) => {
                self.rows[position].allocated_minutes = clamp_minutes_input(&raw);
            }
            BlockField::Subject(subject_id) => {
                let subject_id = subject_id
                    .map(|value| value.trim().to_string())
                    .filter(|value| !value.is_empty());
                if let Some(subject_id) = subject_id.as_deref() {
                    if subject_holder(&self.rows, subject_id, block_id).is_some() {
                        return Err(ValidationError::DuplicateSubject(subject_id.to_string()));
                    }
                }
                self.rows[position].subject_id = subject_id;
            }
        }
        Ok(&self.rows[position])
    }

    pub fn reorder(&mut self, from: usize, to: usize) -> bool {
        if from >= self.rows.len() || to >= self.rows.len() {
            return false;
        }
        let rows = std::mem::take(&mut self.rows);
        self.rows = move_element(rows, from, to);
        rerank(&mut self.rows);
        true
    }

    pub fn subject_options(&self, block_id: &str, catalog: &[Subject]) -> Vec<SubjectOption> {
        subject_options(&self.rows, block_id, catalog)
    }

    pub fn total_minutes(&self) -> u32 {
        valid_total_minutes(&self.rows)
    }

    pub fn total_label(&self) -> String {
        format_duration_total(self.total_minutes())
    }

    pub fn validate(&self) -> Result<ValidatedCycle, ValidationError> {
        validate_draft(&self.name, &self.rows)
    }

    pub fn save<R>(&mut self, owner_id: &str, repository: &R) -> Result<Cycle, SaveError>
    where
        R: CycleRepository + ?Sized,
    {
        let validated = self.validate()?;

        let stored = match self.cycle_id.as_deref() {
            Some(cycle_id) => {
                repository.update(cycle_id, &validated.name, &validated.blocks)?;
                repository
                    .get(cycle_id)?
                    .ok_or_else(|| InfraError::NotFound(format!("cycle {cycle_id}")))?
            }
            None => repository.create(owner_id, &validated.name, &validated.blocks)?,
        };

        info!(
            cycle_id = %stored.id,
            blocks = stored.blocks.len(),
            total = %validated.total_label(),
            "cycle saved"
        );
        self.cycle_id = Some(stored.id.clone());
        self.name = stored.name.clone();
        Ok(stored)
    }

    pub fn try_save<R>(&mut self, owner_id: &str, repository: &R) -> Result<Cycle, SaveError>
    where
        R: CycleRepository + ?Sized,
    {
        self.save(owner_id, repository).inspect_err(|error| {
            warn!(%error, "cycle save failed; draft kept");
        })
    }
}
