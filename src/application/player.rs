use crate::domain::playback::{PlaybackEngine, PlaybackError, PlaybackState, TickOutcome};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info};

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error(transparent)]
    Playback(#[from] PlaybackError),
    #[error("player lock poisoned: {0}")]
    LockPoisoned(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSnapshot {
    pub state: PlaybackState,
    pub subject_name: String,
    pub allocated_minutes: u32,
    pub progress_percent: u32,
    pub controls_enabled: bool,
    pub all_done: bool,
    pub block_count: usize,
}

impl PlayerSnapshot {
    fn capture(engine: &PlaybackEngine) -> Self {
        let block = engine.current_block();
        Self {
            state: engine.state().clone(),
            subject_name: block.subject_name.clone(),
            allocated_minutes: block.allocated_minutes,
            progress_percent: engine.progress_percent(),
            controls_enabled: engine.controls_enabled(),
            all_done: engine.all_done(),
            block_count: engine.blocks().len(),
        }
    }
}

pub struct PlayerSession {
    cycle_id: String,
    engine: Arc<Mutex<PlaybackEngine>>,
    ticker: Option<JoinHandle<()>>,
}

impl PlayerSession {
    pub fn open(engine: PlaybackEngine, tick_interval: Duration, runtime: &Handle) -> Self {
        let cycle_id = engine.state().cycle_id.clone();
        let engine = Arc::new(Mutex::new(engine));
        let ticker = runtime.spawn(tick_loop(Arc::clone(&engine), tick_interval));
        info!(%cycle_id, ?tick_interval, "player opened");
        Self {
            cycle_id,
            engine,
            ticker: Some(ticker),
        }
    }

    pub fn cycle_id(&self) -> &str {
        &self.cycle_id
    }

    pub fn snapshot(&self) -> Result<PlayerSnapshot, PlayerError> {
        Ok(PlayerSnapshot::capture(&*self.lock()?))
    }

    pub fn start(&self) -> Result<PlayerSnapshot, PlayerError> {
        self.command(|engine| engine.start().map(|_| ()))
    }

    pub fn pause(&self) -> Result<PlayerSnapshot, PlayerError> {
        self.command(|engine| engine.pause().map(|_| ()))
    }

    pub fn skip(&self) -> Result<PlayerSnapshot, PlayerError> {
        self.command(|engine| engine.skip().map(|_| ()))
    }

    pub fn restart(&self) -> Result<PlayerSnapshot, PlayerError> {
        self.command(|engine| engine.restart().map(|_| ()))
    }

    pub fn go_to(&self, index: usize) -> Result<PlayerSnapshot, PlayerError> {
        self.command(|engine| engine.go_to(index).map(|_| ()))
    }

    pub fn close(mut self) -> Result<PlayerSnapshot, PlayerError> {
        self.shutdown();
        self.snapshot()
    }

    fn command(
        &self,
        apply: impl FnOnce(&mut PlaybackEngine) -> Result<(), PlaybackError>,
    ) -> Result<PlayerSnapshot, PlayerError> {
        let mut engine = self.lock()?;
        apply(&mut *engine)?;
        Ok(PlayerSnapshot::capture(&*engine))
    }

    fn lock(&self) -> Result<MutexGuard<'_, PlaybackEngine>, PlayerError> {
        self.engine
            .lock()
            .map_err(|error| PlayerError::LockPoisoned(error.to_string()))
    }

    fn shutdown(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        if let Ok(mut engine) = self.engine.lock() {
            engine.disarm();
        }
    }
}

impl Drop for PlayerSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn tick_loop(engine: Arc<Mutex<PlaybackEngine>>, tick_interval: Duration) {
    let mut ticks = interval(tick_interval);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticks.tick().await;
        let outcome = match engine.lock() {
            Ok(mut engine) => engine.tick(),
            Err(error) => {
                error!(%error, "engine lock poisoned; ticker stopped");
                break;
            }
        };
        match outcome {
            TickOutcome::Ignored | TickOutcome::Counting(_) => {}
            TickOutcome::BlockCompleted(index) => debug!(index, "block expired"),
            TickOutcome::Advanced(index) => debug!(index, "advanced to next block"),
            TickOutcome::CycleCompleted => info!("cycle completed"),
        }
    }
}
