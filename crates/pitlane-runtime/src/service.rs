//! Race service - the session lifecycle state machine
//!
//! One `RaceService` is the only authority over race state. Each command runs
//! to completion under a single state lock: validate, mutate, save the
//! snapshot, re-arm or cancel timers, then publish its events.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use pitlane_core::{
    leaderboard, Car, Driver, DriverId, IdSequence, Lap, LeaderboardEntry, ModeRequest,
    RaceError, RaceMode, RaceResult, RaceSnapshot, Session, SessionId, Timestamp,
};
use pitlane_store::SessionStore;
use pitlane_time::{Clock, RaceTimer, TimerSink};

use crate::{EventBus, EventReceiver, RaceConfig, RaceEvent};

/// Mutable race state guarded by the service lock
struct RaceState {
    snapshot: RaceSnapshot,
    ids: IdSequence,
}

/// Single in-process authority for sessions, timers and laps
pub struct RaceService {
    config: RaceConfig,
    state: Mutex<RaceState>,
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    events: EventBus,
    timer: RaceTimer,
}

impl RaceService {
    /// Load the persisted state and resume any race that was running.
    ///
    /// Timers are only armed when called inside a tokio runtime; otherwise a
    /// warning is logged and the race has to be finished by hand.
    pub fn open(
        config: RaceConfig,
        store: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        let snapshot = match store.load() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => RaceSnapshot::empty(),
            Err(e) => {
                tracing::error!(error = %e, "failed to load race state, starting empty");
                RaceSnapshot::empty()
            }
        };
        let ids = IdSequence::after(snapshot.highest_entity_id());
        tracing::info!(
            sessions = snapshot.sessions.len(),
            current = ?snapshot.current_session_id,
            "race state loaded"
        );

        let service = Arc::new_cyclic(|weak: &Weak<RaceService>| {
            let sink: Weak<dyn TimerSink> = weak.clone();
            RaceService {
                events: EventBus::new(config.event_capacity),
                config,
                state: Mutex::new(RaceState { snapshot, ids }),
                store,
                clock,
                timer: RaceTimer::new(sink),
            }
        });
        service.resume();
        service
    }

    pub fn config(&self) -> &RaceConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn current_session(&self) -> Option<Session> {
        self.state.lock().snapshot.current().cloned()
    }

    /// Earliest pending session by creation order
    pub fn next_session(&self) -> Option<Session> {
        self.state.lock().snapshot.next_pending().cloned()
    }

    pub fn session(&self, id: SessionId) -> Option<Session> {
        self.state.lock().snapshot.session(id).cloned()
    }

    pub fn sessions(&self) -> Vec<Session> {
        self.state.lock().snapshot.sessions.clone()
    }

    pub fn pending_sessions(&self) -> Vec<Session> {
        self.state.lock().snapshot.pending().cloned().collect()
    }

    /// Mode of the current session
    pub fn race_mode(&self) -> Option<RaceMode> {
        self.state.lock().snapshot.current().map(|s| s.mode)
    }

    /// Ranked view of the current session, empty without one
    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        self.state
            .lock()
            .snapshot
            .current()
            .map(leaderboard)
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> RaceSnapshot {
        self.state.lock().snapshot.clone()
    }

    /// Are race tick/deadline timers live?
    pub fn timers_armed(&self) -> bool {
        self.timer.race_armed()
    }

    pub fn armed_session(&self) -> Option<SessionId> {
        self.timer.armed_session()
    }

    // ------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------

    /// Create a pending session and make it current
    pub fn create_session(&self) -> RaceResult<Session> {
        let mut state = self.state.lock();
        let max = self.config.max_pending_sessions;
        if state.snapshot.pending().count() >= max {
            return Err(RaceError::TooManyPendingSessions(max));
        }

        let snapshot = &mut state.snapshot;
        let session = Session::new(snapshot.next_session_id);
        snapshot.next_session_id = session.id.next();
        snapshot.sessions.push(session.clone());
        snapshot.current_session_id = Some(session.id);
        self.persist(&state);

        tracing::info!(session = %session.id, "session created");
        self.publish_next(&state);
        self.events.publish(RaceEvent::SessionCreated(session.clone()));
        Ok(session)
    }

    /// Remove a session in any mode
    pub fn delete_session(&self, id: SessionId) -> RaceResult<Session> {
        let mut state = self.state.lock();
        let snapshot = &mut state.snapshot;
        let index = snapshot
            .sessions
            .iter()
            .position(|s| s.id == id)
            .ok_or(RaceError::SessionNotFound(id))?;
        let removed = snapshot.sessions.remove(index);
        if snapshot.current_session_id == Some(id) {
            snapshot.current_session_id = snapshot.sessions.first().map(|s| s.id);
        }
        if self.timer.armed_session() == Some(id) {
            self.timer.cancel_race();
        }
        if self.timer.countdown_session() == Some(id) {
            self.timer.cancel_countdown();
        }
        self.persist(&state);

        tracing::info!(session = %id, "session deleted");
        self.events.publish(RaceEvent::SessionDeleted(removed.clone()));
        self.publish_next(&state);
        Ok(removed)
    }

    /// Point the current-session reference at `id`
    pub fn set_current_session(&self, id: SessionId) -> RaceResult<Session> {
        let mut state = self.state.lock();
        let session = state
            .snapshot
            .session(id)
            .cloned()
            .ok_or(RaceError::SessionNotFound(id))?;
        state.snapshot.current_session_id = Some(id);
        self.persist(&state);

        tracing::info!(session = %id, "current session switched");
        self.publish_next(&state);
        self.events.publish(RaceEvent::SessionSwitched(session.clone()));
        Ok(session)
    }

    // ------------------------------------------------------------------
    // Roster
    // ------------------------------------------------------------------

    pub fn add_driver(&self, name: &str) -> RaceResult<Driver> {
        let mut guard = self.state.lock();
        let RaceState { snapshot, ids } = &mut *guard;
        let session = snapshot.current_mut().ok_or(RaceError::NoActiveSession)?;
        let driver = session
            .add_driver(ids.next_driver(), name, self.config.max_drivers)?
            .clone();
        let session_id = session.id;
        self.persist(&guard);

        tracing::info!(session = %session_id, driver = %driver.id, name = %driver.name, "driver added");
        self.events.publish(RaceEvent::DriverAdded(driver.clone()));
        Ok(driver)
    }

    /// Remove a driver by name. `Ok(None)` when nobody has that name.
    pub fn remove_driver(&self, name: &str) -> RaceResult<Option<Driver>> {
        let mut state = self.state.lock();
        let session = state
            .snapshot
            .current_mut()
            .ok_or(RaceError::NoActiveSession)?;
        let Some(removed) = session.remove_driver(name)? else {
            return Ok(None);
        };
        self.persist(&state);

        tracing::info!(driver = %removed.id, name = %removed.name, "driver removed");
        self.events.publish(RaceEvent::DriverRemoved(removed.clone()));
        Ok(Some(removed))
    }

    pub fn edit_driver(&self, driver_id: DriverId, new_name: &str) -> RaceResult<Driver> {
        let mut state = self.state.lock();
        let session = state
            .snapshot
            .current_mut()
            .ok_or(RaceError::NoActiveSession)?;
        let driver = session.rename_driver(driver_id, new_name)?.clone();
        self.persist(&state);

        self.events.publish(RaceEvent::DriverEdited(driver.clone()));
        Ok(driver)
    }

    pub fn assign_car(&self, driver_id: DriverId, car_number: u32) -> RaceResult<Car> {
        let mut state = self.state.lock();
        let session = state
            .snapshot
            .current_mut()
            .ok_or(RaceError::NoActiveSession)?;
        let car = session.assign_car(driver_id, car_number)?;
        self.persist(&state);

        self.events.publish(RaceEvent::CarAssigned(car));
        Ok(car)
    }

    // ------------------------------------------------------------------
    // Laps
    // ------------------------------------------------------------------

    /// Record a line crossing for `driver_id` now.
    ///
    /// `reported_lap_time` is whatever the lap-line client measured; it is
    /// only logged. The stored lap time is derived from the session start.
    pub fn record_lap(&self, driver_id: DriverId, reported_lap_time: Option<f64>) -> RaceResult<Lap> {
        let now = self.clock.now();
        let mut guard = self.state.lock();
        let RaceState { snapshot, ids } = &mut *guard;
        let session = snapshot.current_mut().ok_or(RaceError::NoActiveSession)?;
        let lap = session.record_lap(ids.next_lap(), driver_id, now)?.clone();
        self.persist(&guard);

        tracing::debug!(
            driver = %driver_id,
            lap_time = lap.lap_time,
            reported = ?reported_lap_time,
            "lap recorded"
        );
        self.events.publish(RaceEvent::LapRecorded(lap.clone()));
        Ok(lap)
    }

    // ------------------------------------------------------------------
    // Mode transitions
    // ------------------------------------------------------------------

    /// Start the earliest pending session under the safe flag
    pub fn start_session(&self) -> RaceResult<Session> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        if let Some(live) = state.snapshot.current().filter(|s| s.is_live()) {
            return Err(RaceError::RaceInProgress(live.id));
        }
        let snapshot = &mut state.snapshot;
        let session = snapshot
            .sessions
            .iter_mut()
            .find(|s| s.is_pending())
            .ok_or(RaceError::NoPendingSession)?;
        session.start_time = Some(now);
        session.mode = RaceMode::Safe;
        let session = session.clone();
        snapshot.current_session_id = Some(session.id);
        self.persist(&state);

        let duration = self.config.race_duration;
        self.timer.cancel_countdown();
        self.arm_race(session.id, duration);

        tracing::info!(session = %session.id, duration_secs = duration.as_secs(), "race started");
        self.events.publish(RaceEvent::SessionStarted(session.clone()));
        self.publish_next(&state);
        self.events.publish(RaceEvent::TimerUpdate(duration.as_secs()));
        Ok(session)
    }

    /// Change the race flag, or finish the race when asked for "finish".
    /// Returns the mode the current session is in afterwards.
    pub fn set_race_mode(&self, mode: &str) -> RaceResult<RaceMode> {
        let mut state = self.state.lock();
        let session = state
            .snapshot
            .current_mut()
            .ok_or(RaceError::NoActiveSession)?;
        let request: ModeRequest = mode.parse()?;
        if session.archived || session.mode == RaceMode::Finished {
            return Err(RaceError::RaceOver);
        }
        if session.is_pending() {
            return Err(RaceError::RaceNotStarted);
        }

        match request {
            ModeRequest::Finish => {
                self.finish_locked(&mut state);
                Ok(RaceMode::Finished)
            }
            ModeRequest::Flag(flag) => {
                session.mode = flag;
                let id = session.id;
                let start = session.start_time;

                // A deadline skipped under the red flag, or never armed after a
                // restart, leaves a live race without timers
                let mut remaining = None;
                if flag != RaceMode::Danger && self.timer.armed_session() != Some(id) {
                    let left = start.map_or(0, |start| self.remaining_secs(start));
                    if left == 0 {
                        tracing::info!(session = %id, "race time ran out while timers were idle");
                        self.finish_locked(&mut state);
                        return Ok(RaceMode::Finished);
                    }
                    remaining = Some(left);
                }
                self.persist(&state);

                tracing::info!(session = %id, mode = %flag, "race mode changed");
                self.events.publish(RaceEvent::RaceModeChanged(flag));
                if let Some(left) = remaining {
                    tracing::info!(session = %id, remaining_secs = left, "race timers re-armed");
                    self.arm_race(id, Duration::from_secs(left));
                    self.events.publish(RaceEvent::TimerUpdate(left));
                }
                Ok(flag)
            }
        }
    }

    /// Finish the current race.
    ///
    /// `Ok(None)` without a current session or when it is already finished.
    pub fn finish_session(&self) -> RaceResult<Option<Session>> {
        let mut state = self.state.lock();
        let Some(session) = state.snapshot.current() else {
            tracing::debug!("no session to finish");
            return Ok(None);
        };
        if session.archived {
            return Err(RaceError::RaceOver);
        }
        let mode = session.mode;
        match mode {
            RaceMode::Finished => Ok(None),
            RaceMode::Pending => Err(RaceError::RaceNotStarted),
            _ => Ok(self.finish_locked(&mut state)),
        }
    }

    /// Archive the current session and move on to the next pending one
    pub fn end_session(&self) -> RaceResult<Session> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let snapshot = &mut state.snapshot;
        let session = snapshot.current_mut().ok_or(RaceError::NoActiveSession)?;
        if session.archived {
            return Err(RaceError::RaceOver);
        }
        if session.is_pending() {
            return Err(RaceError::RaceNotStarted);
        }

        self.timer.cancel_all();
        session.mode = RaceMode::Danger;
        session.archived = true;
        session.end_time.get_or_insert(now);
        let ended = session.clone();
        snapshot.current_session_id = snapshot.next_pending().map(|s| s.id);
        self.persist(&state);

        tracing::info!(session = %ended.id, next = ?state.snapshot.current_session_id, "session ended");
        self.events.publish(RaceEvent::TimerUpdate(0));
        self.events.publish(RaceEvent::RaceModeChanged(RaceMode::Danger));
        self.events.publish(RaceEvent::SessionEnded(ended.clone()));
        self.publish_next(&state);
        Ok(ended)
    }

    /// Count down from `seconds` (default from config) and then start the
    /// next pending session. The current session must be pending.
    pub fn start_countdown(&self, seconds: Option<u64>) -> RaceResult<u64> {
        let seconds = seconds.unwrap_or(self.config.countdown_seconds);
        let state = self.state.lock();
        let session = state
            .snapshot
            .current()
            .filter(|s| s.is_pending())
            .ok_or(RaceError::NoPendingSession)?;
        if let Err(e) = self.timer.arm_countdown(session.id, seconds) {
            tracing::warn!(error = %e, session = %session.id, "countdown not armed");
            return Err(RaceError::TimersUnavailable);
        }

        tracing::info!(session = %session.id, seconds, "countdown started");
        self.events.publish(RaceEvent::CountdownTick(seconds));
        Ok(seconds)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Finish the current session; caller has checked it is a running race
    fn finish_locked(&self, state: &mut MutexGuard<'_, RaceState>) -> Option<Session> {
        let now = self.clock.now();
        let session = state.snapshot.current_mut()?;
        self.timer.cancel_race();
        session.mode = RaceMode::Finished;
        session.end_time = Some(now);
        let finished = session.clone();
        self.persist(state);

        tracing::info!(session = %finished.id, laps = finished.laps.len(), "race finished");
        self.events.publish(RaceEvent::TimerUpdate(0));
        self.events.publish(RaceEvent::RaceModeChanged(RaceMode::Finished));
        self.events.publish(RaceEvent::SessionFinished(finished.clone()));
        Some(finished)
    }

    /// Bring timers back in line with the loaded snapshot
    fn resume(&self) {
        let now = self.clock.now();
        let duration = self.config.race_duration;
        let mut state = self.state.lock();

        let mut expired = 0;
        for session in state.snapshot.sessions.iter_mut() {
            let Some(start) = session.start_time else {
                continue;
            };
            if session.mode == RaceMode::Safe
                && !session.archived
                && now.saturating_duration_since(start) >= duration
            {
                session.mode = RaceMode::Finished;
                session.end_time.get_or_insert(now);
                expired += 1;
            }
        }
        if expired > 0 {
            tracing::info!(expired, "finished races that ran out while offline");
            self.persist(&state);
        }

        let Some((id, start)) = state
            .snapshot
            .current()
            .filter(|s| s.mode == RaceMode::Safe && !s.archived)
            .and_then(|s| s.start_time.map(|start| (s.id, start)))
        else {
            return;
        };
        let remaining = self.remaining_secs(start);
        if remaining > 0 {
            tracing::info!(session = %id, remaining_secs = remaining, "resuming race timers");
            self.arm_race(id, Duration::from_secs(remaining));
            self.events.publish(RaceEvent::TimerUpdate(remaining));
        } else {
            self.finish_locked(&mut state);
        }
    }

    /// Whole seconds left in a race started at `start`
    fn remaining_secs(&self, start: Timestamp) -> u64 {
        let elapsed = self.clock.now().saturating_duration_since(start).as_secs();
        self.config.race_duration.as_secs().saturating_sub(elapsed)
    }

    fn arm_race(&self, session: SessionId, remaining: Duration) {
        if let Err(e) = self.timer.arm_race(session, remaining) {
            tracing::warn!(error = %e, session = %session, "race timers not armed");
        }
    }

    fn publish_next(&self, state: &RaceState) {
        self.events.publish(RaceEvent::NextSessionUpdated(
            state.snapshot.next_pending().cloned(),
        ));
    }

    /// Save after a mutation. Failures are logged, never propagated.
    fn persist(&self, state: &RaceState) {
        if let Err(e) = self.store.save(&state.snapshot) {
            tracing::error!(error = %e, "failed to save race state");
        }
    }

    fn is_current(state: &RaceState, session: SessionId) -> bool {
        state.snapshot.current_session_id == Some(session)
    }
}

impl TimerSink for RaceService {
    fn race_tick(&self, session: SessionId, remaining_secs: u64) {
        let state = self.state.lock();
        let running = Self::is_current(&state, session)
            && state.snapshot.current().is_some_and(|s| s.is_live());
        if running {
            tracing::debug!(session = %session, remaining_secs, "race tick");
            self.events.publish(RaceEvent::TimerUpdate(remaining_secs));
        }
    }

    fn race_deadline(&self, session: SessionId) {
        let mut state = self.state.lock();
        let due = Self::is_current(&state, session)
            && state.snapshot.current().is_some_and(|s| {
                !s.archived && !matches!(s.mode, RaceMode::Finished | RaceMode::Danger)
            });
        if due {
            tracing::info!(session = %session, "race time elapsed");
            self.finish_locked(&mut state);
        } else {
            tracing::debug!(session = %session, "stale race deadline ignored");
        }
    }

    fn countdown_tick(&self, session: SessionId, remaining_secs: u64) {
        let state = self.state.lock();
        if Self::is_current(&state, session) {
            self.events.publish(RaceEvent::CountdownTick(remaining_secs));
        }
    }

    fn countdown_done(&self, session: SessionId) {
        {
            let state = self.state.lock();
            let ready = Self::is_current(&state, session)
                && state.snapshot.current().is_some_and(|s| s.is_pending());
            if !ready {
                tracing::debug!(countdown = %session, "stale countdown ignored");
                return;
            }
        }
        match self.start_session() {
            Ok(started) => {
                tracing::info!(countdown = %session, session = %started.id, "countdown complete")
            }
            Err(e) => tracing::warn!(countdown = %session, error = %e, "countdown could not start race"),
        }
    }
}
