//! Race timing scheduler
//!
//! A running race has two background tasks: a one-second tick reporting the
//! seconds left, and a single-shot deadline that finishes the race. They are
//! armed and cancelled together. A separate slot holds the pre-race countdown.
//!
//! Callbacks carry the session the task was armed for. The receiver must check
//! that session is still current before acting on it.

use std::sync::Weak;
use std::time::Duration;

use parking_lot::Mutex;
use pitlane_core::SessionId;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};

/// Period of race and countdown ticks
pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Timing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimingError {
    #[error("No async runtime available to run timers")]
    NoRuntime,
}

/// Receiver of timer callbacks
pub trait TimerSink: Send + Sync + 'static {
    /// Seconds left in the race armed for `session`
    fn race_tick(&self, session: SessionId, remaining_secs: u64);

    /// The race armed for `session` ran out of time
    fn race_deadline(&self, session: SessionId);

    /// Seconds left before the countdown armed for `session` starts the race
    fn countdown_tick(&self, session: SessionId, remaining_secs: u64);

    /// The countdown armed for `session` reached zero
    fn countdown_done(&self, session: SessionId);
}

struct RaceSlot {
    session: SessionId,
    tick: JoinHandle<()>,
    deadline: JoinHandle<()>,
}

impl RaceSlot {
    fn abort(&self) {
        self.tick.abort();
        self.deadline.abort();
    }
}

struct CountdownSlot {
    session: SessionId,
    task: JoinHandle<()>,
}

/// Owner of the race and countdown timer tasks
pub struct RaceTimer {
    sink: Weak<dyn TimerSink>,
    race: Mutex<Option<RaceSlot>>,
    countdown: Mutex<Option<CountdownSlot>>,
}

impl RaceTimer {
    /// Create a scheduler reporting to `sink`.
    /// Tasks stop on their own once the sink is dropped.
    pub fn new(sink: Weak<dyn TimerSink>) -> Self {
        RaceTimer {
            sink,
            race: Mutex::new(None),
            countdown: Mutex::new(None),
        }
    }

    /// Arm tick and deadline for `session` with `remaining` time left.
    /// Any previously armed race is cancelled first.
    pub fn arm_race(&self, session: SessionId, remaining: Duration) -> Result<(), TimingError> {
        let handle = Handle::try_current().map_err(|_| TimingError::NoRuntime)?;
        self.cancel_race();

        let tick = handle.spawn(run_race_ticks(
            self.sink.clone(),
            session,
            remaining.as_secs(),
        ));
        let deadline = handle.spawn(run_race_deadline(self.sink.clone(), session, remaining));

        tracing::debug!(session = %session, remaining_secs = remaining.as_secs(), "race timers armed");
        *self.race.lock() = Some(RaceSlot {
            session,
            tick,
            deadline,
        });
        Ok(())
    }

    /// Arm a pre-race countdown of `seconds` for `session`.
    /// Reporting the initial value is left to the caller.
    pub fn arm_countdown(&self, session: SessionId, seconds: u64) -> Result<(), TimingError> {
        let handle = Handle::try_current().map_err(|_| TimingError::NoRuntime)?;
        self.cancel_countdown();

        let task = handle.spawn(run_countdown(self.sink.clone(), session, seconds));
        tracing::debug!(session = %session, seconds, "countdown armed");
        *self.countdown.lock() = Some(CountdownSlot { session, task });
        Ok(())
    }

    /// Stop the race tick and deadline
    pub fn cancel_race(&self) {
        if let Some(slot) = self.race.lock().take() {
            slot.abort();
            tracing::debug!(session = %slot.session, "race timers cancelled");
        }
    }

    /// Stop the pre-race countdown
    pub fn cancel_countdown(&self) {
        if let Some(slot) = self.countdown.lock().take() {
            slot.task.abort();
        }
    }

    pub fn cancel_all(&self) {
        self.cancel_race();
        self.cancel_countdown();
    }

    /// Session the race timers are armed for, if any task is still live
    pub fn armed_session(&self) -> Option<SessionId> {
        self.race
            .lock()
            .as_ref()
            .filter(|slot| !(slot.tick.is_finished() && slot.deadline.is_finished()))
            .map(|slot| slot.session)
    }

    pub fn race_armed(&self) -> bool {
        self.armed_session().is_some()
    }

    /// Session a live countdown is running for
    pub fn countdown_session(&self) -> Option<SessionId> {
        self.countdown
            .lock()
            .as_ref()
            .filter(|slot| !slot.task.is_finished())
            .map(|slot| slot.session)
    }
}

impl Drop for RaceTimer {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

async fn run_race_ticks(sink: Weak<dyn TimerSink>, session: SessionId, mut remaining: u64) {
    let mut ticker = interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    while remaining > 0 {
        ticker.tick().await;
        remaining -= 1;
        let Some(sink) = sink.upgrade() else {
            return;
        };
        sink.race_tick(session, remaining);
    }
}

async fn run_race_deadline(sink: Weak<dyn TimerSink>, session: SessionId, after: Duration) {
    sleep(after).await;
    if let Some(sink) = sink.upgrade() {
        sink.race_deadline(session);
    }
}

async fn run_countdown(sink: Weak<dyn TimerSink>, session: SessionId, mut remaining: u64) {
    while remaining > 0 {
        sleep(TICK_PERIOD).await;
        remaining -= 1;
        let Some(sink) = sink.upgrade() else {
            return;
        };
        if remaining > 0 {
            sink.countdown_tick(session, remaining);
        }
    }
    if let Some(sink) = sink.upgrade() {
        sink.countdown_done(session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Fired {
        Tick(SessionId, u64),
        Deadline(SessionId),
        Countdown(SessionId, u64),
        CountdownDone(SessionId),
    }

    #[derive(Default)]
    struct Recorder {
        fired: Mutex<Vec<Fired>>,
    }

    impl Recorder {
        fn take(&self) -> Vec<Fired> {
            std::mem::take(&mut *self.fired.lock())
        }
    }

    impl TimerSink for Recorder {
        fn race_tick(&self, session: SessionId, remaining_secs: u64) {
            self.fired.lock().push(Fired::Tick(session, remaining_secs));
        }

        fn race_deadline(&self, session: SessionId) {
            self.fired.lock().push(Fired::Deadline(session));
        }

        fn countdown_tick(&self, session: SessionId, remaining_secs: u64) {
            self.fired.lock().push(Fired::Countdown(session, remaining_secs));
        }

        fn countdown_done(&self, session: SessionId) {
            self.fired.lock().push(Fired::CountdownDone(session));
        }
    }

    fn timer_for(recorder: &Arc<Recorder>) -> RaceTimer {
        let sink: Arc<dyn TimerSink> = recorder.clone();
        RaceTimer::new(Arc::downgrade(&sink))
    }

    const S1: SessionId = SessionId(1);
    const S2: SessionId = SessionId(2);

    #[tokio::test(start_paused = true)]
    async fn test_race_ticks_then_deadline() {
        let recorder = Arc::new(Recorder::default());
        let timer = timer_for(&recorder);

        timer.arm_race(S1, Duration::from_secs(3)).unwrap();
        assert_eq!(timer.armed_session(), Some(S1));

        sleep(Duration::from_millis(1500)).await;
        assert_eq!(recorder.take(), vec![Fired::Tick(S1, 2)]);

        sleep(Duration::from_secs(2)).await;
        let fired = recorder.take();
        assert_eq!(fired.len(), 3);
        assert!(fired.contains(&Fired::Tick(S1, 1)));
        assert!(fired.contains(&Fired::Tick(S1, 0)));
        assert!(fired.contains(&Fired::Deadline(S1)));

        tokio::task::yield_now().await;
        assert!(!timer.race_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_race_silences_tasks() {
        let recorder = Arc::new(Recorder::default());
        let timer = timer_for(&recorder);

        timer.arm_race(S1, Duration::from_secs(5)).unwrap();
        sleep(Duration::from_millis(1500)).await;
        timer.cancel_race();
        assert!(!timer.race_armed());

        sleep(Duration::from_secs(10)).await;
        assert_eq!(recorder.take(), vec![Fired::Tick(S1, 4)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_replaces_previous_race() {
        let recorder = Arc::new(Recorder::default());
        let timer = timer_for(&recorder);

        timer.arm_race(S1, Duration::from_secs(2)).unwrap();
        timer.arm_race(S2, Duration::from_secs(2)).unwrap();
        assert_eq!(timer.armed_session(), Some(S2));

        sleep(Duration::from_secs(3)).await;
        let fired = recorder.take();
        assert!(fired.iter().all(|f| !matches!(f, Fired::Tick(s, _) | Fired::Deadline(s) if *s == S1)));
        assert!(fired.contains(&Fired::Deadline(S2)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_ticks_then_done() {
        let recorder = Arc::new(Recorder::default());
        let timer = timer_for(&recorder);

        timer.arm_countdown(S1, 3).unwrap();
        assert_eq!(timer.countdown_session(), Some(S1));

        sleep(Duration::from_millis(3500)).await;
        assert_eq!(
            recorder.take(),
            vec![
                Fired::Countdown(S1, 2),
                Fired::Countdown(S1, 1),
                Fired::CountdownDone(S1)
            ]
        );
        assert_eq!(timer.countdown_session(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_sink_stops_tasks() {
        let recorder = Arc::new(Recorder::default());
        let timer = timer_for(&recorder);
        timer.arm_race(S1, Duration::from_secs(3)).unwrap();

        drop(recorder);
        sleep(Duration::from_secs(5)).await;
        assert!(!timer.race_armed());
    }

    #[test]
    fn test_arm_without_runtime() {
        let recorder = Arc::new(Recorder::default());
        let timer = timer_for(&recorder);
        assert_eq!(
            timer.arm_race(S1, Duration::from_secs(3)),
            Err(TimingError::NoRuntime)
        );
        assert_eq!(timer.arm_countdown(S1, 5), Err(TimingError::NoRuntime));
        assert!(!timer.race_armed());
    }
}
