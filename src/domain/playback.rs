use crate::domain::clock::{ClockTick, PlaybackClock};
use crate::domain::models::{Cycle, Subject};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_ADVANCE_DELAY_MS: i64 = 1_500;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackPhase {
    Idle,
    Running,
    Paused,
    BlockCompleted,
    CycleCompleted,
}

impl PlaybackPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::BlockCompleted => "block_completed",
            Self::CycleCompleted => "cycle_completed",
        }
    }
}

impl std::fmt::Display for PlaybackPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("cycle {0} has no blocks to play")]
    EmptyCycle(String),
    #[error("{command} is not available while {phase}")]
    CommandUnavailable {
        command: &'static str,
        phase: PlaybackPhase,
    },
    #[error("block index {index} is out of range for {len} blocks")]
    IndexOutOfRange { index: usize, len: usize },
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PlaybackState {
    pub cycle_id: String,
    pub current_index: usize,
    pub remaining_seconds: u32,
    pub running: bool,
    pub paused: bool,
    pub completed_indices: BTreeSet<usize>,
    pub deadline: Option<DateTime<Utc>>,
    pub phase: PlaybackPhase,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PlaybackBlock {
    pub block_id: String,
    pub subject_id: String,
    pub subject_name: String,
    pub allocated_minutes: u32,
}

impl PlaybackBlock {
    pub fn allocated_seconds(&self) -> u32 {
        self.allocated_minutes * 60
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CompletionCause {
    Expired,
    Skipped,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CompletionEvent {
    pub user_id: String,
    pub cycle_id: String,
    pub cycle_name: String,
    pub block_index: usize,
    pub subject_id: String,
    pub subject_name: String,
    pub cause: CompletionCause,
    pub cycle_completed: bool,
}

/// Receives completion events. Implementations must return promptly and must
/// not report failures back; anything slow belongs on a spawned task.
pub trait CompletionDispatcher: Send + Sync {
    fn dispatch(&self, event: CompletionEvent);
}

#[derive(Debug, Default)]
pub struct NoopDispatcher;

impl CompletionDispatcher for NoopDispatcher {
    fn dispatch(&self, _event: CompletionEvent) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Ignored,
    Counting(u32),
    BlockCompleted(usize),
    CycleCompleted,
    Advanced(usize),
}

pub struct PlaybackEngine {
    user_id: String,
    cycle_name: String,
    blocks: Vec<PlaybackBlock>,
    state: PlaybackState,
    clock: PlaybackClock,
    dispatcher: Arc<dyn CompletionDispatcher>,
    advance_delay: Duration,
    pending_advance: Option<DateTime<Utc>>,
}

impl PlaybackEngine {
    pub fn new(
        user_id: impl Into<String>,
        cycle: &Cycle,
        catalog: &[Subject],
        clock: PlaybackClock,
        dispatcher: Arc<dyn CompletionDispatcher>,
    ) -> Result<Self, PlaybackError> {
        let names = catalog
            .iter()
            .map(|subject| (subject.id.as_str(), subject.name.as_str()))
            .collect::<HashMap<_, _>>();
        let blocks = cycle
            .ordered_blocks()
            .into_iter()
            .map(|block| PlaybackBlock {
                block_id: block.id.clone(),
                subject_id: block.subject_id.clone(),
                subject_name: names
                    .get(block.subject_id.as_str())
                    .map(|name| (*name).to_string())
                    .unwrap_or_else(|| block.subject_id.clone()),
                allocated_minutes: block.allocated_minutes,
            })
            .collect::<Vec<_>>();

        let Some(first) = blocks.first() else {
            return Err(PlaybackError::EmptyCycle(cycle.id.clone()));
        };

        let state = PlaybackState {
            cycle_id: cycle.id.clone(),
            current_index: 0,
            remaining_seconds: first.allocated_seconds(),
            running: false,
            paused: false,
            completed_indices: BTreeSet::new(),
            deadline: None,
            phase: PlaybackPhase::Idle,
        };

        Ok(Self {
            user_id: user_id.into(),
            cycle_name: cycle.name.clone(),
            blocks,
            state,
            clock,
            dispatcher,
            advance_delay: Duration::milliseconds(DEFAULT_ADVANCE_DELAY_MS),
            pending_advance: None,
        })
    }

    pub fn with_advance_delay(mut self, advance_delay: Duration) -> Self {
        self.advance_delay = advance_delay;
        self
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn blocks(&self) -> &[PlaybackBlock] {
        &self.blocks
    }

    pub fn current_block(&self) -> &PlaybackBlock {
        &self.blocks[self.state.current_index]
    }

    pub fn pending_advance(&self) -> Option<DateTime<Utc>> {
        self.pending_advance
    }

    pub fn progress_percent(&self) -> u32 {
        let total = self.current_block().allocated_seconds();
        if total == 0 {
            return 0;
        }
        let elapsed = total.saturating_sub(self.state.remaining_seconds);
        ((f64::from(elapsed) / f64::from(total)) * 100.0).round() as u32
    }

    pub fn all_done(&self) -> bool {
        self.state.completed_indices.len() == self.blocks.len()
    }

    pub fn controls_enabled(&self) -> bool {
        self.state.phase != PlaybackPhase::CycleCompleted && !self.all_done()
    }

    pub fn start(&mut self) -> Result<&PlaybackState, PlaybackError> {
        self.ensure_controls("start")?;
        self.apply_pending_advance();
        match self.state.phase {
            PlaybackPhase::Idle | PlaybackPhase::Paused => {
                self.clock.arm(self.state.remaining_seconds);
                self.set_phase(PlaybackPhase::Running);
                debug!(
                    cycle_id = %self.state.cycle_id,
                    index = self.state.current_index,
                    remaining = self.state.remaining_seconds,
                    "playback started"
                );
                Ok(&self.state)
            }
            phase => Err(PlaybackError::CommandUnavailable {
                command: "start",
                phase,
            }),
        }
    }

    pub fn pause(&mut self) -> Result<&PlaybackState, PlaybackError> {
        if self.state.phase != PlaybackPhase::Running {
            return Err(PlaybackError::CommandUnavailable {
                command: "pause",
                phase: self.state.phase,
            });
        }
        self.clock.disarm();
        self.set_phase(PlaybackPhase::Paused);
        Ok(&self.state)
    }

    pub fn skip(&mut self) -> Result<&PlaybackState, PlaybackError> {
        self.ensure_controls("skip")?;
        // The block in the advance window already counted as completed.
        if self.pending_advance.is_some() {
            self.apply_pending_advance();
            return Ok(&self.state);
        }
        self.clock.disarm();
        self.complete_current(CompletionCause::Skipped);
        Ok(&self.state)
    }

    pub fn restart(&mut self) -> Result<&PlaybackState, PlaybackError> {
        self.ensure_controls("restart")?;
        self.pending_advance = None;
        self.clock.disarm();
        self.state.remaining_seconds = self.current_block().allocated_seconds();
        self.set_phase(PlaybackPhase::Idle);
        Ok(&self.state)
    }

    /// Free navigation. Completed marks are never cleared. After the cycle has
    /// completed the phase stays terminal and the move is review-only.
    pub fn go_to(&mut self, index: usize) -> Result<&PlaybackState, PlaybackError> {
        if index >= self.blocks.len() {
            return Err(PlaybackError::IndexOutOfRange {
                index,
                len: self.blocks.len(),
            });
        }
        self.clock.disarm();
        self.pending_advance = None;
        self.state.current_index = index;
        self.state.remaining_seconds = self.blocks[index].allocated_seconds();
        if self.state.phase == PlaybackPhase::CycleCompleted {
            self.sync_flags();
        } else {
            self.set_phase(PlaybackPhase::Idle);
        }
        Ok(&self.state)
    }

    pub fn tick(&mut self) -> TickOutcome {
        match self.state.phase {
            PlaybackPhase::Running => match self.clock.tick() {
                ClockTick::Disarmed => TickOutcome::Ignored,
                ClockTick::Remaining(remaining) => {
                    self.state.remaining_seconds = remaining;
                    TickOutcome::Counting(remaining)
                }
                ClockTick::Expired => {
                    self.state.remaining_seconds = 0;
                    let index = self.state.current_index;
                    self.complete_current(CompletionCause::Expired);
                    if self.state.phase == PlaybackPhase::CycleCompleted {
                        TickOutcome::CycleCompleted
                    } else {
                        TickOutcome::BlockCompleted(index)
                    }
                }
            },
            PlaybackPhase::BlockCompleted => match self.pending_advance {
                Some(due) if self.clock.now() >= due => {
                    self.apply_pending_advance();
                    TickOutcome::Advanced(self.state.current_index)
                }
                _ => TickOutcome::Ignored,
            },
            _ => TickOutcome::Ignored,
        }
    }

    pub fn disarm(&mut self) {
        self.clock.disarm();
        self.pending_advance = None;
        self.sync_flags();
    }

    fn ensure_controls(&self, command: &'static str) -> Result<(), PlaybackError> {
        if self.controls_enabled() {
            return Ok(());
        }
        Err(PlaybackError::CommandUnavailable {
            command,
            phase: self.state.phase,
        })
    }

    fn complete_current(&mut self, cause: CompletionCause) {
        let index = self.state.current_index;
        self.state.completed_indices.insert(index);
        let cycle_completed = index + 1 == self.blocks.len();

        if cycle_completed {
            self.set_phase(PlaybackPhase::CycleCompleted);
        } else if cause == CompletionCause::Skipped {
            self.advance_to(index + 1);
        } else {
            self.pending_advance = Some(self.clock.now() + self.advance_delay);
            self.set_phase(PlaybackPhase::BlockCompleted);
        }

        debug!(
            cycle_id = %self.state.cycle_id,
            index,
            ?cause,
            cycle_completed,
            "block completed"
        );

        let block = &self.blocks[index];
        self.dispatcher.dispatch(CompletionEvent {
            user_id: self.user_id.clone(),
            cycle_id: self.state.cycle_id.clone(),
            cycle_name: self.cycle_name.clone(),
            block_index: index,
            subject_id: block.subject_id.clone(),
            subject_name: block.subject_name.clone(),
            cause,
            cycle_completed,
        });
    }

    fn apply_pending_advance(&mut self) {
        if self.pending_advance.take().is_some() {
            self.advance_to(self.state.current_index + 1);
        }
    }

    fn advance_to(&mut self, index: usize) {
        self.state.current_index = index;
        self.state.remaining_seconds = self.blocks[index].allocated_seconds();
        self.set_phase(PlaybackPhase::Idle);
    }

    fn set_phase(&mut self, phase: PlaybackPhase) {
        self.state.phase = phase;
        self.sync_flags();
    }

    fn sync_flags(&mut self) {
        self.state.running = self.state.phase == PlaybackPhase::Running;
        self.state.paused = self.state.phase == PlaybackPhase::Paused;
        self.state.deadline = self.clock.deadline();
    }
}

impl std::fmt::Debug for PlaybackEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackEngine")
            .field("user_id", &self.user_id)
            .field("cycle_name", &self.cycle_name)
            .field("state", &self.state)
            .field("pending_advance", &self.pending_advance)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::clock::ManualTime;
    use crate::domain::models::Block;
    use proptest::prelude::*;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct RecordingDispatcher {
        events: Mutex<Vec<CompletionEvent>>,
    }

    impl RecordingDispatcher {
        fn events(&self) -> Vec<CompletionEvent> {
            self.events.lock().expect("events mutex poisoned").clone()
        }
    }

    impl CompletionDispatcher for RecordingDispatcher {
        fn dispatch(&self, event: CompletionEvent) {
            self.events.lock().expect("events mutex poisoned").push(event);
        }
    }

    fn start_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-02-16T09:00:00Z")
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn cycle(blocks: &[(&str, u32)]) -> Cycle {
        Cycle {
            id: "cyc-1".to_string(),
            owner_id: "user-1".to_string(),
            name: "Morning".to_string(),
            blocks: blocks
                .iter()
                .enumerate()
                .map(|(index, (subject, minutes))| Block {
                    id: format!("blk-{index}"),
                    subject_id: subject.to_string(),
                    allocated_minutes: *minutes,
                    order: index as u32,
                })
                .collect(),
            is_active: true,
            created_at: start_time(),
            updated_at: start_time(),
        }
    }

    fn catalog() -> Vec<Subject> {
        vec![Subject {
            id: "math".to_string(),
            name: "Math".to_string(),
            color: "#ff0000".to_string(),
        }]
    }

    fn engine_for(
        blocks: &[(&str, u32)],
    ) -> (PlaybackEngine, ManualTime, Arc<RecordingDispatcher>) {
        let time = ManualTime::new(start_time());
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let engine = PlaybackEngine::new(
            "user-1",
            &cycle(blocks),
            &catalog(),
            PlaybackClock::new(time.provider()),
            dispatcher.clone(),
        )
        .expect("engine");
        (engine, time, dispatcher)
    }

    fn run_to_expiry(engine: &mut PlaybackEngine, time: &ManualTime) -> TickOutcome {
        engine.start().expect("start");
        time.advance(Duration::seconds(i64::from(engine.state().remaining_seconds)));
        engine.tick()
    }

    #[test]
    fn initial_state_is_idle_on_first_block() {
        let (engine, _, _) = engine_for(&[("math", 60), ("physics", 30)]);
        let state = engine.state();
        assert_eq!(state.phase, PlaybackPhase::Idle);
        assert_eq!(state.current_index, 0);
        assert_eq!(state.remaining_seconds, 3600);
        assert!(state.deadline.is_none());
        assert_eq!(engine.current_block().subject_name, "Math");
        assert_eq!(engine.blocks()[1].subject_name, "physics");
    }

    #[test]
    fn empty_cycle_is_rejected() {
        let time = ManualTime::new(start_time());
        let result = PlaybackEngine::new(
            "user-1",
            &cycle(&[]),
            &[],
            PlaybackClock::new(time.provider()),
            Arc::new(NoopDispatcher),
        );
        assert_eq!(result.err(), Some(PlaybackError::EmptyCycle("cyc-1".to_string())));
    }

    #[test]
    fn expiry_waits_then_advances_without_resuming() {
        let (mut engine, time, dispatcher) = engine_for(&[("math", 60), ("physics", 30)]);

        assert_eq!(run_to_expiry(&mut engine, &time), TickOutcome::BlockCompleted(0));
        assert_eq!(engine.state().phase, PlaybackPhase::BlockCompleted);
        assert_eq!(engine.state().current_index, 0);

        time.advance(Duration::milliseconds(1_000));
        assert_eq!(engine.tick(), TickOutcome::Ignored);

        time.advance(Duration::milliseconds(500));
        assert_eq!(engine.tick(), TickOutcome::Advanced(1));

        let state = engine.state();
        assert_eq!(state.completed_indices, BTreeSet::from([0]));
        assert_eq!(state.phase, PlaybackPhase::Idle);
        assert_eq!(state.current_index, 1);
        assert_eq!(state.remaining_seconds, 1800);
        assert!(!state.running);

        let events = dispatcher.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].subject_name, "Math");
        assert_eq!(events[0].cause, CompletionCause::Expired);
        assert!(!events[0].cycle_completed);
    }

    #[test]
    fn skipping_every_block_completes_the_cycle() {
        let (mut engine, _, dispatcher) = engine_for(&[("math", 60), ("physics", 30)]);
        engine.skip().expect("skip first");
        assert_eq!(engine.state().current_index, 1);
        assert_eq!(engine.state().remaining_seconds, 1800);
        engine.skip().expect("skip second");

        let state = engine.state();
        assert_eq!(state.phase, PlaybackPhase::CycleCompleted);
        assert_eq!(state.completed_indices, BTreeSet::from([0, 1]));
        assert!(engine.all_done());
        assert!(!engine.controls_enabled());
        assert!(engine.start().is_err());
        assert!(engine.skip().is_err());
        assert!(engine.restart().is_err());

        let events = dispatcher.events();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|event| event.cause == CompletionCause::Skipped));
        assert!(events[1].cycle_completed);
    }

    #[test]
    fn single_block_expiry_goes_straight_to_cycle_completed() {
        let (mut engine, time, dispatcher) = engine_for(&[("chemistry", 5)]);
        assert_eq!(run_to_expiry(&mut engine, &time), TickOutcome::CycleCompleted);
        assert_eq!(engine.state().phase, PlaybackPhase::CycleCompleted);
        assert_eq!(engine.state().current_index, 0);
        assert!(engine.pending_advance().is_none());
        assert!(dispatcher.events()[0].cycle_completed);
    }

    #[test]
    fn pause_twice_keeps_remaining() {
        let (mut engine, time, _) = engine_for(&[("math", 60)]);
        engine.start().expect("start");
        time.advance(Duration::milliseconds(90_250));
        engine.tick();
        engine.pause().expect("pause");
        let remaining = engine.state().remaining_seconds;
        assert_eq!(remaining, 3509);

        time.advance(Duration::seconds(30));
        assert!(matches!(
            engine.pause(),
            Err(PlaybackError::CommandUnavailable { command: "pause", .. })
        ));
        assert_eq!(engine.tick(), TickOutcome::Ignored);
        assert_eq!(engine.state().remaining_seconds, remaining);
        assert!(engine.state().paused);
        assert!(engine.state().deadline.is_none());
    }

    #[test]
    fn resume_rearms_from_paused_remaining() {
        let (mut engine, time, _) = engine_for(&[("math", 60)]);
        engine.start().expect("start");
        time.advance(Duration::seconds(600));
        engine.tick();
        engine.pause().expect("pause");
        time.advance(Duration::seconds(3_000));
        engine.start().expect("resume");
        assert_eq!(
            engine.state().deadline,
            Some(time.now() + Duration::seconds(3_000))
        );
        time.advance(Duration::milliseconds(250));
        assert_eq!(engine.tick(), TickOutcome::Counting(2_999));
    }

    #[test]
    fn restart_keeps_completed_mark() {
        let (mut engine, time, _) = engine_for(&[("math", 60), ("physics", 30)]);
        engine.skip().expect("skip");
        engine.go_to(0).expect("go back");
        engine.start().expect("start");
        time.advance(Duration::seconds(100));
        engine.tick();
        engine.restart().expect("restart");

        let state = engine.state();
        assert_eq!(state.phase, PlaybackPhase::Idle);
        assert_eq!(state.remaining_seconds, 3600);
        assert!(state.completed_indices.contains(&0));
        assert!(state.deadline.is_none());
    }

    #[test]
    fn replaying_completed_block_keeps_set_unchanged() {
        let (mut engine, time, dispatcher) =
            engine_for(&[("math", 5), ("physics", 5), ("chemistry", 5)]);
        engine.skip().expect("skip");
        engine.go_to(0).expect("revisit");
        assert_eq!(run_to_expiry(&mut engine, &time), TickOutcome::BlockCompleted(0));
        assert_eq!(engine.state().completed_indices, BTreeSet::from([0]));
        assert_eq!(dispatcher.events().len(), 2);
    }

    #[test]
    fn go_to_cancels_running_clock_and_pending_advance() {
        let (mut engine, time, _) = engine_for(&[("math", 5), ("physics", 5), ("chemistry", 5)]);
        run_to_expiry(&mut engine, &time);
        assert!(engine.pending_advance().is_some());

        engine.go_to(2).expect("navigate");
        assert!(engine.pending_advance().is_none());
        time.advance(Duration::seconds(5));
        assert_eq!(engine.tick(), TickOutcome::Ignored);
        assert_eq!(engine.state().current_index, 2);
        assert_eq!(engine.state().remaining_seconds, 300);

        engine.start().expect("start");
        engine.go_to(1).expect("navigate while running");
        assert_eq!(engine.state().phase, PlaybackPhase::Idle);
        time.advance(Duration::seconds(400));
        assert_eq!(engine.tick(), TickOutcome::Ignored);
        assert_eq!(engine.state().remaining_seconds, 300);

        assert_eq!(
            engine.go_to(3).err(),
            Some(PlaybackError::IndexOutOfRange { index: 3, len: 3 })
        );
    }

    #[test]
    fn start_during_advance_window_begins_next_block() {
        let (mut engine, time, _) = engine_for(&[("math", 5), ("physics", 10)]);
        run_to_expiry(&mut engine, &time);
        engine.start().expect("start next");
        assert_eq!(engine.state().current_index, 1);
        assert_eq!(engine.state().phase, PlaybackPhase::Running);
        assert_eq!(engine.state().remaining_seconds, 600);
    }

    #[test]
    fn skip_during_advance_window_moves_on_without_completing_next_block() {
        let (mut engine, time, dispatcher) = engine_for(&[("math", 60), ("physics", 30)]);
        assert_eq!(run_to_expiry(&mut engine, &time), TickOutcome::BlockCompleted(0));

        engine.skip().expect("skip in window");
        let state = engine.state();
        assert_eq!(state.phase, PlaybackPhase::Idle);
        assert_eq!(state.current_index, 1);
        assert_eq!(state.remaining_seconds, 1800);
        assert_eq!(state.completed_indices, BTreeSet::from([0]));
        assert!(engine.pending_advance().is_none());
        assert_eq!(dispatcher.events().len(), 1);

        time.advance(Duration::seconds(2));
        assert_eq!(engine.tick(), TickOutcome::Ignored);
        assert_eq!(engine.state().current_index, 1);
    }

    #[test]
    fn restart_during_advance_window_replays_expired_block() {
        let (mut engine, time, dispatcher) = engine_for(&[("math", 5), ("physics", 10)]);
        run_to_expiry(&mut engine, &time);

        engine.restart().expect("restart in window");
        let state = engine.state();
        assert_eq!(state.phase, PlaybackPhase::Idle);
        assert_eq!(state.current_index, 0);
        assert_eq!(state.remaining_seconds, 300);
        assert_eq!(state.completed_indices, BTreeSet::from([0]));
        assert!(engine.pending_advance().is_none());

        time.advance(Duration::seconds(2));
        assert_eq!(engine.tick(), TickOutcome::Ignored);
        assert_eq!(engine.state().current_index, 0);
        assert_eq!(dispatcher.events().len(), 1);
    }

    #[test]
    fn navigation_after_cycle_completion_is_review_only() {
        let (mut engine, _, _) = engine_for(&[("math", 5), ("physics", 5)]);
        engine.skip().expect("skip");
        engine.skip().expect("skip");
        engine.go_to(0).expect("review");
        assert_eq!(engine.state().phase, PlaybackPhase::CycleCompleted);
        assert_eq!(engine.state().current_index, 0);
        assert!(engine.start().is_err());
    }

    #[test]
    fn progress_percent_tracks_active_block() {
        let (mut engine, time, _) = engine_for(&[("math", 60)]);
        assert_eq!(engine.progress_percent(), 0);
        engine.start().expect("start");
        time.advance(Duration::seconds(900));
        engine.tick();
        assert_eq!(engine.progress_percent(), 25);
    }

    proptest! {
        #[test]
        fn natural_completion_marks_every_block(
            minutes in proptest::collection::vec(5u32..=480, 1..8)
        ) {
            let subjects = (0..minutes.len()).map(|index| format!("s{index}")).collect::<Vec<_>>();
            let blocks = subjects
                .iter()
                .zip(&minutes)
                .map(|(subject, minutes)| (subject.as_str(), *minutes))
                .collect::<Vec<_>>();
            let (mut engine, time, dispatcher) = engine_for(&blocks);

            loop {
                match run_to_expiry(&mut engine, &time) {
                    TickOutcome::CycleCompleted => break,
                    TickOutcome::BlockCompleted(_) => {
                        time.advance(Duration::milliseconds(DEFAULT_ADVANCE_DELAY_MS));
                        prop_assert!(matches!(engine.tick(), TickOutcome::Advanced(_)));
                    }
                    other => prop_assert!(false, "unexpected tick outcome {:?}", other),
                }
            }

            prop_assert_eq!(engine.state().phase, PlaybackPhase::CycleCompleted);
            prop_assert_eq!(
                engine.state().completed_indices.clone(),
                (0..minutes.len()).collect::<BTreeSet<_>>()
            );
            prop_assert_eq!(dispatcher.events().len(), minutes.len());
        }

        #[test]
        fn skip_always_advances(
            minutes in proptest::collection::vec(5u32..=480, 2..8),
            elapsed in 0i64..300
        ) {
            let subjects = (0..minutes.len()).map(|index| format!("s{index}")).collect::<Vec<_>>();
            let blocks = subjects
                .iter()
                .zip(&minutes)
                .map(|(subject, minutes)| (subject.as_str(), *minutes))
                .collect::<Vec<_>>();
            let (mut engine, time, _) = engine_for(&blocks);
            if elapsed > 0 {
                engine.start().expect("start");
                time.advance(Duration::seconds(elapsed));
                engine.tick();
            }

            engine.skip().expect("skip");
            prop_assert_eq!(engine.state().current_index, 1);
            prop_assert!(engine.state().completed_indices.contains(&0));
            prop_assert_eq!(engine.state().remaining_seconds, minutes[1] * 60);
        }
    }
}
