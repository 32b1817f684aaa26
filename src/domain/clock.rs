use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

pub type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockTick {
    Disarmed,
    Remaining(u32),
    Expired,
}

pub struct PlaybackClock {
    now_provider: NowProvider,
    deadline: Option<DateTime<Utc>>,
    remaining_seconds: u32,
}

impl PlaybackClock {
    pub fn new(now_provider: NowProvider) -> Self {
        Self {
            now_provider,
            deadline: None,
            remaining_seconds: 0,
        }
    }

    pub fn system() -> Self {
        Self::new(Arc::new(Utc::now))
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.now_provider)()
    }

    pub fn arm(&mut self, remaining_seconds: u32) {
        let deadline = self.now() + Duration::seconds(i64::from(remaining_seconds));
        self.deadline = Some(deadline);
        self.remaining_seconds = remaining_seconds;
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    pub fn tick(&mut self) -> ClockTick {
        let Some(deadline) = self.deadline else {
            return ClockTick::Disarmed;
        };

        self.remaining_seconds = seconds_until(deadline, self.now());
        if self.remaining_seconds == 0 {
            self.deadline = None;
            return ClockTick::Expired;
        }
        ClockTick::Remaining(self.remaining_seconds)
    }
}

impl std::fmt::Debug for PlaybackClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackClock")
            .field("deadline", &self.deadline)
            .field("remaining_seconds", &self.remaining_seconds)
            .finish()
    }
}

/// `max(0, floor((deadline - now) / 1000ms))`.
pub fn seconds_until(deadline: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    let millis = (deadline - now).num_milliseconds();
    if millis <= 0 {
        return 0;
    }
    u32::try_from(millis / 1000).unwrap_or(u32::MAX)
}

#[derive(Debug, Clone)]
pub struct ManualTime {
    current: Arc<std::sync::Mutex<DateTime<Utc>>>,
}

impl ManualTime {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Arc::new(std::sync::Mutex::new(start)),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        match self.current.lock() {
            Ok(current) => *current,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut current = match self.current.lock() {
            Ok(current) => current,
            Err(poisoned) => poisoned.into_inner(),
        };
        *current += by;
    }

    pub fn provider(&self) -> NowProvider {
        let time = self.clone();
        Arc::new(move || time.now())
    }
}
