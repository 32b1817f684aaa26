pub mod application;
pub mod domain;
pub mod infrastructure;

use application::bootstrap::bootstrap_workspace;
use application::commands::{
    AppState, BlockInput, CycleSummaryResponse, PlaybackStateResponse, close_player_impl,
    create_subject_impl, delete_cycle_impl, drain_feedback_impl, get_playback_state_impl,
    go_to_block_impl, list_cycles_impl, list_subjects_impl, open_player_impl, pause_playback_impl,
    restart_block_impl, save_cycle_impl, set_cycle_active_impl, skip_block_impl,
    start_playback_impl,
};
use domain::models::Subject;
use infrastructure::feedback::FeedbackMessage;
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

pub use application::commands::CommandError;
pub use application::editor::{BlockField, CycleEditor, SaveError};
pub use domain::playback::{PlaybackEngine, PlaybackPhase, PlaybackState};

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[derive(Debug, Serialize)]
pub struct BootstrapResponse {
    pub workspace_root: String,
    pub database_path: String,
}

pub fn bootstrap(root: Option<String>) -> Result<BootstrapResponse, String> {
    let workspace_root = match root {
        Some(path) => PathBuf::from(path),
        None => std::env::current_dir().map_err(|error| error.to_string())?,
    };

    let result = bootstrap_workspace(&workspace_root).map_err(|error| error.to_string())?;
    Ok(BootstrapResponse {
        workspace_root: result.workspace_root.display().to_string(),
        database_path: result.database_path.display().to_string(),
    })
}

pub fn list_subjects(state: &AppState, owner_id: String) -> Result<Vec<Subject>, String> {
    list_subjects_impl(state, owner_id).map_err(|error| state.command_error("list_subjects", &error))
}

pub fn create_subject(
    state: &AppState,
    owner_id: String,
    name: String,
    color: Option<String>,
) -> Result<Subject, String> {
    create_subject_impl(state, owner_id, name, color)
        .map_err(|error| state.command_error("create_subject", &error))
}

pub fn save_cycle(
    state: &AppState,
    owner_id: String,
    cycle_id: Option<String>,
    name: String,
    blocks: Vec<BlockInput>,
) -> Result<CycleSummaryResponse, String> {
    save_cycle_impl(state, owner_id, cycle_id, name, blocks)
        .map_err(|error| state.command_error("save_cycle", &error))
}

pub fn list_cycles(state: &AppState, owner_id: String) -> Result<Vec<CycleSummaryResponse>, String> {
    list_cycles_impl(state, owner_id).map_err(|error| state.command_error("list_cycles", &error))
}

pub fn delete_cycle(state: &AppState, cycle_id: String) -> Result<bool, String> {
    delete_cycle_impl(state, cycle_id).map_err(|error| state.command_error("delete_cycle", &error))
}

pub fn set_cycle_active(
    state: &AppState,
    cycle_id: String,
    is_active: bool,
) -> Result<CycleSummaryResponse, String> {
    set_cycle_active_impl(state, cycle_id, is_active)
        .map_err(|error| state.command_error("set_cycle_active", &error))
}

pub fn open_player(
    state: &AppState,
    owner_id: String,
    cycle_id: String,
) -> Result<PlaybackStateResponse, String> {
    open_player_impl(state, owner_id, cycle_id)
        .map_err(|error| state.command_error("open_player", &error))
}

pub fn start_playback(state: &AppState) -> Result<PlaybackStateResponse, String> {
    start_playback_impl(state).map_err(|error| state.command_error("start_playback", &error))
}

pub fn pause_playback(state: &AppState) -> Result<PlaybackStateResponse, String> {
    pause_playback_impl(state).map_err(|error| state.command_error("pause_playback", &error))
}

pub fn skip_block(state: &AppState) -> Result<PlaybackStateResponse, String> {
    skip_block_impl(state).map_err(|error| state.command_error("skip_block", &error))
}

pub fn restart_block(state: &AppState) -> Result<PlaybackStateResponse, String> {
    restart_block_impl(state).map_err(|error| state.command_error("restart_block", &error))
}

pub fn go_to_block(state: &AppState, index: usize) -> Result<PlaybackStateResponse, String> {
    go_to_block_impl(state, index).map_err(|error| state.command_error("go_to_block", &error))
}

pub fn get_playback_state(state: &AppState) -> Result<PlaybackStateResponse, String> {
    get_playback_state_impl(state).map_err(|error| state.command_error("get_playback_state", &error))
}

pub fn close_player(state: &AppState) -> Result<Option<PlaybackStateResponse>, String> {
    close_player_impl(state).map_err(|error| state.command_error("close_player", &error))
}

pub fn drain_feedback(state: &AppState) -> Vec<FeedbackMessage> {
    drain_feedback_impl(state)
}
