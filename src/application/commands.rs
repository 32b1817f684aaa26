use crate::application::bootstrap::bootstrap_workspace;
use crate::application::editor::{BlockField, CycleEditor, SaveError};
use crate::application::player::{PlayerError, PlayerSession, PlayerSnapshot};
use crate::application::side_effects::SpawningDispatcher;
use crate::domain::clock::PlaybackClock;
use crate::domain::models::{Block, Cycle, Subject, ValidationError, format_duration_total, next_id};
use crate::domain::playback::{PlaybackEngine, PlaybackError};
use crate::infrastructure::activity_log::SqliteActivityRegistrar;
use crate::infrastructure::config::AppSettings;
use crate::infrastructure::cycle_repository::{CycleRepository, SqliteCycleRepository};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::feedback::{FeedbackMessage, QueuedFeedbackChannel};
use crate::infrastructure::subject_catalog::{SqliteSubjectCatalog, SubjectCatalog};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Persistence(#[from] InfraError),
    #[error(transparent)]
    Playback(#[from] PlaybackError),
    #[error("no player is open")]
    NoOpenPlayer,
    #[error("{0}")]
    Runtime(String),
}

impl From<SaveError> for CommandError {
    fn from(error: SaveError) -> Self {
        match error {
            SaveError::Validation(error) => Self::Validation(error),
            SaveError::Persistence(error) => Self::Persistence(error),
        }
    }
}

impl From<PlayerError> for CommandError {
    fn from(error: PlayerError) -> Self {
        match error {
            PlayerError::Playback(error) => Self::Playback(error),
            PlayerError::LockPoisoned(message) => Self::Runtime(message),
        }
    }
}

pub struct AppState {
    database_path: PathBuf,
    settings: AppSettings,
    cycles: Arc<SqliteCycleRepository>,
    subjects: Arc<SqliteSubjectCatalog>,
    activity: Arc<SqliteActivityRegistrar>,
    feedback: Arc<QueuedFeedbackChannel>,
    player: Mutex<Option<PlayerSession>>,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let database_path = bootstrap.database_path;

        Ok(Self {
            cycles: Arc::new(SqliteCycleRepository::new(&database_path)),
            subjects: Arc::new(SqliteSubjectCatalog::new(&database_path)),
            activity: Arc::new(SqliteActivityRegistrar::new(&database_path)),
            feedback: Arc::new(QueuedFeedbackChannel::default()),
            player: Mutex::new(None),
            settings: bootstrap.settings,
            database_path,
        })
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn command_error(&self, command: &str, error: &CommandError) -> String {
        error!(command, %error, "command failed");
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        info!(command, "{message}");
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockInput {
    pub subject_id: Option<String>,
    pub allocated_minutes: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CycleSummaryResponse {
    pub id: String,
    pub name: String,
    pub is_active: bool,
    pub block_count: usize,
    pub total_minutes: u32,
    pub total_label: String,
    pub blocks: Vec<Block>,
    pub updated_at: String,
}

impl From<&Cycle> for CycleSummaryResponse {
    fn from(cycle: &Cycle) -> Self {
        let total_minutes = cycle.total_minutes();
        Self {
            id: cycle.id.clone(),
            name: cycle.name.clone(),
            is_active: cycle.is_active,
            block_count: cycle.blocks.len(),
            total_minutes,
            total_label: format_duration_total(total_minutes),
            blocks: cycle.ordered_blocks().into_iter().cloned().collect(),
            updated_at: cycle.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PlaybackStateResponse {
    pub cycle_id: String,
    pub phase: String,
    pub current_index: usize,
    pub block_count: usize,
    pub subject_name: String,
    pub allocated_minutes: u32,
    pub remaining_seconds: u32,
    pub progress_percent: u32,
    pub completed_indices: Vec<usize>,
    pub controls_enabled: bool,
    pub all_done: bool,
    pub deadline: Option<String>,
}

impl From<&PlayerSnapshot> for PlaybackStateResponse {
    fn from(snapshot: &PlayerSnapshot) -> Self {
        Self {
            cycle_id: snapshot.state.cycle_id.clone(),
            phase: snapshot.state.phase.as_str().to_string(),
            current_index: snapshot.state.current_index,
            block_count: snapshot.block_count,
            subject_name: snapshot.subject_name.clone(),
            allocated_minutes: snapshot.allocated_minutes,
            remaining_seconds: snapshot.state.remaining_seconds,
            progress_percent: snapshot.progress_percent,
            completed_indices: snapshot.state.completed_indices.iter().copied().collect(),
            controls_enabled: snapshot.controls_enabled,
            all_done: snapshot.all_done,
            deadline: snapshot.state.deadline.map(|value| value.to_rfc3339()),
        }
    }
}

pub fn list_subjects_impl(state: &AppState, owner_id: String) -> Result<Vec<Subject>, CommandError> {
    Ok(state.subjects.list_subjects(owner_id.trim())?)
}

pub fn create_subject_impl(
    state: &AppState,
    owner_id: String,
    name: String,
    color: Option<String>,
) -> Result<Subject, CommandError> {
    let subject = Subject {
        id: next_id("sub"),
        name: name.trim().to_string(),
        color: color
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| "#6b7280".to_string()),
    };
    subject.validate()?;
    state.subjects.insert(owner_id.trim(), &subject)?;
    state.log_info("create_subject", &format!("created subject_id={}", subject.id));
    Ok(subject)
}

pub fn save_cycle_impl(
    state: &AppState,
    owner_id: String,
    cycle_id: Option<String>,
    name: String,
    blocks: Vec<BlockInput>,
) -> Result<CycleSummaryResponse, CommandError> {
    let default_minutes = state.settings.composition.default_block_minutes;
    let mut editor = match cycle_id.as_deref().map(str::trim).filter(|value| !value.is_empty()) {
        Some(cycle_id) => {
            let cycle = state
                .cycles
                .get(cycle_id)?
                .ok_or_else(|| InfraError::NotFound(format!("cycle {cycle_id}")))?;
            CycleEditor::for_cycle(&cycle, default_minutes)
        }
        None => CycleEditor::new(default_minutes),
    };

    let existing = editor
        .rows()
        .iter()
        .map(|row| row.id.clone())
        .collect::<Vec<_>>();
    for row_id in &existing {
        editor.remove_block(row_id);
    }
    for (index, input) in blocks.into_iter().enumerate() {
        let row_id = if index == 0 {
            editor.rows()[0].id.clone()
        } else {
            editor.add_block().id.clone()
        };
        editor.update_block(&row_id, BlockField::Minutes(input.allocated_minutes.to_string()))?;
        editor.update_block(&row_id, BlockField::Subject(input.subject_id))?;
    }

    editor.set_name(name);
    let stored = editor.try_save(owner_id.trim(), state.cycles.as_ref())?;
    state.log_info("save_cycle", &format!("saved cycle_id={}", stored.id));
    Ok(CycleSummaryResponse::from(&stored))
}

pub fn list_cycles_impl(state: &AppState, owner_id: String) -> Result<Vec<CycleSummaryResponse>, CommandError> {
    let cycles = state.cycles.list(owner_id.trim())?;
    Ok(cycles.iter().map(CycleSummaryResponse::from).collect())
}

pub fn delete_cycle_impl(state: &AppState, cycle_id: String) -> Result<bool, CommandError> {
    let cycle_id = cycle_id.trim();
    state.cycles.delete(cycle_id)?;
    {
        let mut player = lock_player(state)?;
        let playing_this = player
            .as_ref()
            .map(|session| session.cycle_id() == cycle_id)
            .unwrap_or(false);
        if playing_this {
            if let Some(session) = player.take() {
                session.close()?;
            }
        }
    }
    state.log_info("delete_cycle", &format!("deleted cycle_id={cycle_id}"));
    Ok(true)
}

pub fn set_cycle_active_impl(
    state: &AppState,
    cycle_id: String,
    is_active: bool,
) -> Result<CycleSummaryResponse, CommandError> {
    let cycle_id = cycle_id.trim();
    state.cycles.set_active(cycle_id, is_active)?;
    let cycle = state
        .cycles
        .get(cycle_id)?
        .ok_or_else(|| InfraError::NotFound(format!("cycle {cycle_id}")))?;
    state.log_info(
        "set_cycle_active",
        &format!("cycle_id={cycle_id} is_active={is_active}"),
    );
    Ok(CycleSummaryResponse::from(&cycle))
}

/// Opens a player for `cycle_id`, replacing (and stopping) any player that
/// was already open. Must be called from within a tokio runtime.
pub fn open_player_impl(
    state: &AppState,
    owner_id: String,
    cycle_id: String,
) -> Result<PlaybackStateResponse, CommandError> {
    let owner_id = owner_id.trim();
    let cycle_id = cycle_id.trim();
    let runtime = Handle::try_current()
        .map_err(|error| CommandError::Runtime(format!("player needs a tokio runtime: {error}")))?;

    let cycle = state
        .cycles
        .get(cycle_id)?
        .ok_or_else(|| InfraError::NotFound(format!("cycle {cycle_id}")))?;
    let catalog = state.subjects.list_subjects(owner_id)?;
    let dispatcher = SpawningDispatcher::new(
        Arc::clone(&state.activity),
        Arc::clone(&state.feedback),
        runtime.clone(),
    );
    let playback = &state.settings.playback;
    let engine = PlaybackEngine::new(
        owner_id,
        &cycle,
        &catalog,
        PlaybackClock::system(),
        Arc::new(dispatcher),
    )?
    .with_advance_delay(chrono::Duration::milliseconds(playback.advance_delay_ms as i64));

    let session = PlayerSession::open(
        engine,
        Duration::from_millis(playback.tick_interval_ms),
        &runtime,
    );
    let snapshot = session.snapshot()?;

    let mut player = lock_player(state)?;
    if let Some(previous) = player.replace(session) {
        previous.close()?;
    }
    state.log_info("open_player", &format!("opened cycle_id={cycle_id}"));
    Ok(PlaybackStateResponse::from(&snapshot))
}

pub fn start_playback_impl(state: &AppState) -> Result<PlaybackStateResponse, CommandError> {
    with_player(state, "start_playback", PlayerSession::start)
}

pub fn pause_playback_impl(state: &AppState) -> Result<PlaybackStateResponse, CommandError> {
    with_player(state, "pause_playback", PlayerSession::pause)
}

pub fn skip_block_impl(state: &AppState) -> Result<PlaybackStateResponse, CommandError> {
    with_player(state, "skip_block", PlayerSession::skip)
}

pub fn restart_block_impl(state: &AppState) -> Result<PlaybackStateResponse, CommandError> {
    with_player(state, "restart_block", PlayerSession::restart)
}

pub fn go_to_block_impl(state: &AppState, index: usize) -> Result<PlaybackStateResponse, CommandError> {
    with_player(state, "go_to_block", |session| session.go_to(index))
}

pub fn get_playback_state_impl(state: &AppState) -> Result<PlaybackStateResponse, CommandError> {
    let player = lock_player(state)?;
    let session = player.as_ref().ok_or(CommandError::NoOpenPlayer)?;
    Ok(PlaybackStateResponse::from(&session.snapshot()?))
}

pub fn close_player_impl(state: &AppState) -> Result<Option<PlaybackStateResponse>, CommandError> {
    let Some(session) = lock_player(state)?.take() else {
        return Ok(None);
    };
    let snapshot = session.close()?;
    state.log_info(
        "close_player",
        &format!("closed cycle_id={}", snapshot.state.cycle_id),
    );
    Ok(Some(PlaybackStateResponse::from(&snapshot)))
}

pub fn drain_feedback_impl(state: &AppState) -> Vec<FeedbackMessage> {
    state.feedback.drain()
}

fn with_player(
    state: &AppState,
    command: &str,
    apply: impl FnOnce(&PlayerSession) -> Result<PlayerSnapshot, PlayerError>,
) -> Result<PlaybackStateResponse, CommandError> {
    let player = lock_player(state)?;
    let session = player.as_ref().ok_or(CommandError::NoOpenPlayer)?;
    let snapshot = apply(session)?;
    state.log_info(
        command,
        &format!(
            "phase={} index={}",
            snapshot.state.phase, snapshot.state.current_index
        ),
    );
    Ok(PlaybackStateResponse::from(&snapshot))
}

fn lock_player(state: &AppState) -> Result<MutexGuard<'_, Option<PlayerSession>>, CommandError> {
    state
        .player
        .lock()
        .map_err(|error| CommandError::Runtime(format!("player lock poisoned: {error}")))
}
