use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

pub const MIN_BLOCK_MINUTES: u32 = 5;
pub const MAX_BLOCK_MINUTES: u32 = 480;
pub const DEFAULT_BLOCK_MINUTES: u32 = 60;
pub const MAX_CYCLE_NAME_CHARS: usize = 100;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

pub fn next_id(prefix: &str) -> String {
    let sequence = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{sequence}", Utc::now().timestamp_micros())
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("cycle name must not be empty")]
    EmptyName,
    #[error("cycle name must be at most 100 characters (got {0})")]
    NameTooLong(usize),
    #[error("at least one block must have a subject")]
    NoSubjectBlocks,
    #[error("subject {0} is already used by another block")]
    DuplicateSubject(String),
    #[error("allocated minutes must be between 5 and 480 (got {0})")]
    DurationOutOfRange(u32),
    #[error("block not found: {0}")]
    UnknownBlock(String),
    #[error("{0}")]
    InvalidField(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub color: String,
}

impl Subject {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_non_empty(&self.id, "subject.id")?;
        validate_non_empty(&self.name, "subject.name")?;
        validate_non_empty(&self.color, "subject.color")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Block {
    pub id: String,
    pub subject_id: String,
    pub allocated_minutes: u32,
    pub order: u32,
}

impl Block {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_non_empty(&self.id, "block.id")?;
        validate_non_empty(&self.subject_id, "block.subject_id")?;
        validate_minutes(self.allocated_minutes)
    }

    pub fn allocated_seconds(&self) -> u32 {
        self.allocated_minutes * 60
    }
}

/// A block as handed to persistence: subject and duration only. Ids and ranks
/// are assigned by the repository from list position.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockSpec {
    pub subject_id: String,
    pub allocated_minutes: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cycle {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub blocks: Vec<Block>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cycle {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_non_empty(&self.id, "cycle.id")?;
        validate_non_empty(&self.owner_id, "cycle.owner_id")?;
        validate_cycle_name(&self.name)?;
        if self.blocks.is_empty() {
            return Err(ValidationError::NoSubjectBlocks);
        }

        let mut seen_subjects = HashSet::new();
        let mut orders = BTreeSet::new();
        for block in &self.blocks {
            block.validate()?;
            if !seen_subjects.insert(block.subject_id.as_str()) {
                return Err(ValidationError::DuplicateSubject(block.subject_id.clone()));
            }
            orders.insert(block.order);
        }

        let dense = orders.len() == self.blocks.len()
            && orders.iter().copied().eq(0..self.blocks.len() as u32);
        if !dense {
            return Err(ValidationError::InvalidField(
                "cycle.blocks order must be a dense 0-based sequence".to_string(),
            ));
        }
        Ok(())
    }

    pub fn total_minutes(&self) -> u32 {
        self.blocks.iter().map(|block| block.allocated_minutes).sum()
    }

    pub fn ordered_blocks(&self) -> Vec<&Block> {
        let mut blocks = self.blocks.iter().collect::<Vec<_>>();
        blocks.sort_by_key(|block| block.order);
        blocks
    }
}

pub fn validate_cycle_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    let length = trimmed.chars().count();
    if length > MAX_CYCLE_NAME_CHARS {
        return Err(ValidationError::NameTooLong(length));
    }
    Ok(trimmed.to_string())
}

pub fn validate_minutes(minutes: u32) -> Result<(), ValidationError> {
    if !(MIN_BLOCK_MINUTES..=MAX_BLOCK_MINUTES).contains(&minutes) {
        return Err(ValidationError::DurationOutOfRange(minutes));
    }
    Ok(())
}

pub fn format_duration_total(total_minutes: u32) -> String {
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;
    match (hours, minutes) {
        (0, minutes) => format!("{minutes}m"),
        (hours, 0) => format!("{hours}h"),
        (hours, minutes) => format!("{hours}h {minutes}m"),
    }
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::InvalidField(format!(
            "{field_name} must not be empty"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn sample_cycle() -> Cycle {
        Cycle {
            id: "cyc-1".to_string(),
            owner_id: "user-1".to_string(),
            name: "Morning".to_string(),
            blocks: vec![
                Block {
                    id: "blk-1".to_string(),
                    subject_id: "math".to_string(),
                    allocated_minutes: 60,
                    order: 0,
                },
                Block {
                    id: "blk-2".to_string(),
                    subject_id: "physics".to_string(),
                    allocated_minutes: 30,
                    order: 1,
                },
            ],
            is_active: true,
            created_at: fixed_time("2026-02-16T08:00:00Z"),
            updated_at: fixed_time("2026-02-16T08:00:00Z"),
        }
    }

    #[test]
    fn cycle_validate_accepts_valid_cycle() {
        assert!(sample_cycle().validate().is_ok());
        assert_eq!(sample_cycle().total_minutes(), 90);
    }

    #[test]
    fn cycle_validate_rejects_duplicate_subject() {
        let mut cycle = sample_cycle();
        cycle.blocks[1].subject_id = "math".to_string();
        assert_eq!(
            cycle.validate(),
            Err(ValidationError::DuplicateSubject("math".to_string()))
        );
    }

    #[test]
    fn cycle_validate_rejects_gapped_order() {
        let mut cycle = sample_cycle();
        cycle.blocks[1].order = 2;
        assert!(matches!(
            cycle.validate(),
            Err(ValidationError::InvalidField(_))
        ));
    }

    #[test]
    fn block_validate_enforces_duration_bounds() {
        let mut cycle = sample_cycle();
        cycle.blocks[0].allocated_minutes = 4;
        assert_eq!(
            cycle.blocks[0].validate(),
            Err(ValidationError::DurationOutOfRange(4))
        );
        cycle.blocks[0].allocated_minutes = 481;
        assert!(cycle.blocks[0].validate().is_err());
        cycle.blocks[0].allocated_minutes = 480;
        assert!(cycle.blocks[0].validate().is_ok());
    }

    #[test]
    fn cycle_name_is_trimmed_and_bounded() {
        assert_eq!(validate_cycle_name("  Evening  "), Ok("Evening".to_string()));
        assert_eq!(validate_cycle_name("   "), Err(ValidationError::EmptyName));
        let long_name = "x".repeat(101);
        assert_eq!(
            validate_cycle_name(&long_name),
            Err(ValidationError::NameTooLong(101))
        );
        assert!(validate_cycle_name(&"é".repeat(100)).is_ok());
    }

    #[test]
    fn ordered_blocks_follow_rank() {
        let mut cycle = sample_cycle();
        cycle.blocks.reverse();
        let ordered = cycle.ordered_blocks();
        assert_eq!(ordered[0].subject_id, "math");
        assert_eq!(ordered[1].subject_id, "physics");
    }

    #[test]
    fn duration_total_formats_hours_and_minutes() {
        assert_eq!(format_duration_total(45), "45m");
        assert_eq!(format_duration_total(120), "2h");
        assert_eq!(format_duration_total(90), "1h 30m");
    }

    #[test]
    fn next_id_is_unique_per_call() {
        assert_ne!(next_id("blk"), next_id("blk"));
    }

    #[test]
    fn domain_models_support_serde_roundtrip() {
        let cycle = sample_cycle();
        let roundtrip: Cycle =
            serde_json::from_str(&serde_json::to_string(&cycle).expect("serialize cycle"))
                .expect("deserialize cycle");
        assert_eq!(roundtrip, cycle);
    }
}
