use crate::domain::models::{
    BlockSpec, MAX_BLOCK_MINUTES, MIN_BLOCK_MINUTES, Subject, ValidationError,
    format_duration_total, validate_cycle_name,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockDraft {
    pub id: String,
    pub subject_id: Option<String>,
    pub allocated_minutes: u32,
    pub order: u32,
}

impl BlockDraft {
    pub fn has_subject(&self) -> bool {
        self.subject_id
            .as_deref()
            .map(|subject_id| !subject_id.trim().is_empty())
            .unwrap_or(false)
    }

    fn selected_subject(&self) -> Option<&str> {
        self.subject_id
            .as_deref()
            .map(str::trim)
            .filter(|subject_id| !subject_id.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SubjectOption {
    pub subject: Subject,
    pub disabled: bool,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCycle {
    pub name: String,
    pub blocks: Vec<BlockSpec>,
    pub total_minutes: u32,
}

impl ValidatedCycle {
    pub fn total_label(&self) -> String {
        format_duration_total(self.total_minutes)
    }
}

pub fn move_element<T>(mut items: Vec<T>, from: usize, to: usize) -> Vec<T> {
    if from >= items.len() || to >= items.len() || from == to {
        return items;
    }
    let item = items.remove(from);
    items.insert(to, item);
    items
}

pub fn rerank(rows: &mut [BlockDraft]) {
    for (index, row) in rows.iter_mut().enumerate() {
        row.order = index as u32;
    }
}

pub fn clamp_minutes(minutes: i64) -> u32 {
    minutes.clamp(MIN_BLOCK_MINUTES as i64, MAX_BLOCK_MINUTES as i64) as u32
}

/// Normalizes raw keystroke input for a duration field. Anything that does
/// not parse as an integer coerces to the minimum.
pub fn clamp_minutes_input(raw: &str) -> u32 {
    match raw.trim().parse::<i64>() {
        Ok(minutes) => clamp_minutes(minutes),
        Err(_) => MIN_BLOCK_MINUTES,
    }
}

pub fn subject_holder<'a>(
    rows: &'a [BlockDraft],
    subject_id: &str,
    exclude_row_id: &str,
) -> Option<&'a BlockDraft> {
    let subject_id = subject_id.trim();
    rows.iter()
        .filter(|row| row.id != exclude_row_id)
        .find(|row| row.selected_subject() == Some(subject_id))
}

pub fn subject_options(rows: &[BlockDraft], row_id: &str, catalog: &[Subject]) -> Vec<SubjectOption> {
    let own_selection = rows
        .iter()
        .find(|row| row.id == row_id)
        .and_then(BlockDraft::selected_subject);
    let taken_elsewhere = rows
        .iter()
        .filter(|row| row.id != row_id)
        .filter_map(BlockDraft::selected_subject)
        .collect::<HashSet<_>>();

    catalog
        .iter()
        .map(|subject| {
            let selected = own_selection == Some(subject.id.as_str());
            SubjectOption {
                subject: subject.clone(),
                disabled: !selected && taken_elsewhere.contains(subject.id.as_str()),
                selected,
            }
        })
        .collect()
}

pub fn valid_total_minutes(rows: &[BlockDraft]) -> u32 {
    rows.iter()
        .filter(|row| row.has_subject())
        .map(|row| row.allocated_minutes)
        .sum()
}

pub fn validate_draft(name: &str, rows: &[BlockDraft]) -> Result<ValidatedCycle, ValidationError> {
    let name = validate_cycle_name(name)?;

    let mut seen = HashSet::new();
    let mut blocks = Vec::new();
    let mut ordered = rows.iter().collect::<Vec<_>>();
    ordered.sort_by_key(|row| row.order);
    for row in ordered {
        let Some(subject_id) = row.selected_subject() else {
            continue;
        };
        if !seen.insert(subject_id) {
            return Err(ValidationError::DuplicateSubject(subject_id.to_string()));
        }
        blocks.push(BlockSpec {
            subject_id: subject_id.to_string(),
            allocated_minutes: clamp_minutes(row.allocated_minutes as i64),
        });
    }

    if blocks.is_empty() {
        return Err(ValidationError::NoSubjectBlocks);
    }

    let total_minutes = blocks.iter().map(|block| block.allocated_minutes).sum();
    Ok(ValidatedCycle {
        name,
        blocks,
        total_minutes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn row(id: &str, subject: Option<&str>, minutes: u32, order: u32) -> BlockDraft {
        BlockDraft {
            id: id.to_string(),
            subject_id: subject.map(ToOwned::to_owned),
            allocated_minutes: minutes,
            order,
        }
    }

    fn catalog() -> Vec<Subject> {
        ["math", "physics", "chemistry"]
            .into_iter()
            .map(|id| Subject {
                id: id.to_string(),
                name: id.to_uppercase(),
                color: "#336699".to_string(),
            })
            .collect()
    }

    #[test]
    fn move_element_is_stable_remove_and_reinsert() {
        assert_eq!(move_element(vec!['a', 'b', 'c', 'd'], 0, 2), vec!['b', 'c', 'a', 'd']);
        assert_eq!(move_element(vec!['a', 'b', 'c', 'd'], 3, 1), vec!['a', 'd', 'b', 'c']);
        assert_eq!(move_element(vec!['a', 'b'], 0, 5), vec!['a', 'b']);
    }

    #[test]
    fn clamp_minutes_input_coerces_garbage_to_minimum() {
        assert_eq!(clamp_minutes_input("45"), 45);
        assert_eq!(clamp_minutes_input("2"), 5);
        assert_eq!(clamp_minutes_input("9000"), 480);
        assert_eq!(clamp_minutes_input("-30"), 5);
        assert_eq!(clamp_minutes_input(""), 5);
        assert_eq!(clamp_minutes_input("abc"), 5);
    }

    #[test]
    fn subject_options_disable_other_rows_selections_only() {
        let rows = vec![
            row("r1", Some("math"), 60, 0),
            row("r2", Some("physics"), 30, 1),
            row("r3", None, 60, 2),
        ];
        let catalog = catalog();

        let for_r1 = subject_options(&rows, "r1", &catalog);
        assert!(!for_r1[0].disabled && for_r1[0].selected);
        assert!(for_r1[1].disabled);
        assert!(!for_r1[2].disabled);

        let for_r3 = subject_options(&rows, "r3", &catalog);
        assert!(for_r3[0].disabled);
        assert!(for_r3[1].disabled);
        assert!(!for_r3[2].disabled);
        assert_eq!(for_r3.len(), catalog.len());
    }

    #[test]
    fn validate_draft_drops_rows_without_subject() {
        let rows = vec![
            row("r1", None, 60, 0),
            row("r2", Some("math"), 45, 1),
            row("r3", Some("  "), 30, 2),
            row("r4", Some("physics"), 30, 3),
        ];
        let validated = validate_draft("  Morning ", &rows).expect("valid draft");
        assert_eq!(validated.name, "Morning");
        assert_eq!(validated.blocks.len(), 2);
        assert_eq!(validated.blocks[0].subject_id, "math");
        assert_eq!(validated.total_minutes, 75);
        assert_eq!(validated.total_label(), "1h 15m");
        assert_eq!(valid_total_minutes(&rows), 75);
    }

    #[test]
    fn validate_draft_rejects_empty_name_and_subjectless_rows() {
        let rows = vec![row("r1", Some("math"), 60, 0)];
        assert_eq!(validate_draft("", &rows), Err(ValidationError::EmptyName));
        assert_eq!(validate_draft("Valid", &[]), Err(ValidationError::NoSubjectBlocks));
        assert_eq!(
            validate_draft("Valid", &[row("r1", Some(""), 60, 0)]),
            Err(ValidationError::NoSubjectBlocks)
        );
    }

    #[test]
    fn validate_draft_rejects_duplicate_subjects() {
        let rows = vec![row("r1", Some("math"), 60, 0), row("r2", Some("math"), 30, 1)];
        assert_eq!(
            validate_draft("Morning", &rows),
            Err(ValidationError::DuplicateSubject("math".to_string()))
        );
    }

    proptest! {
        #[test]
        fn reorder_is_a_permutation_with_dense_ranks(
            len in 1usize..12,
            moves in proptest::collection::vec((0usize..16, 0usize..16), 0..24)
        ) {
            let mut rows = (0..len)
                .map(|index| row(&format!("r{index}"), None, 60, index as u32))
                .collect::<Vec<_>>();
            for (from, to) in moves {
                rows = move_element(rows, from, to);
                rerank(&mut rows);
            }

            let mut ids = rows.iter().map(|row| row.id.clone()).collect::<Vec<_>>();
            ids.sort();
            let mut expected = (0..len).map(|index| format!("r{index}")).collect::<Vec<_>>();
            expected.sort();
            prop_assert_eq!(ids, expected);

            let orders = rows.iter().map(|row| row.order).collect::<Vec<_>>();
            prop_assert_eq!(orders, (0..len as u32).collect::<Vec<_>>());
        }

        #[test]
        fn clamp_minutes_always_lands_in_bounds(minutes in any::<i64>()) {
            let clamped = clamp_minutes(minutes);
            prop_assert!((MIN_BLOCK_MINUTES..=MAX_BLOCK_MINUTES).contains(&clamped));
        }
    }
}
