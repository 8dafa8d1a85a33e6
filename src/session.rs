use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, info, warn};

use crate::{
    alarm::Alarm,
    clock::Clock,
    error::{FlowtimeError, Result},
    history::{History, SessionRecord},
    ticker::Ticker,
    time::{elapsed_secs, format_time, remaining_secs},
};

pub const DEFAULT_BREAK_MINUTES: u32 = 5;
pub const MAX_BREAK_MINUTES: u32 = 24 * 60;

// ============================================================================
// State
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub enum Mode {
    Idle,
    Working { task: String, started_at: DateTime<Utc> },
    Breaking { ends_at: DateTime<Utc>, remaining_secs: u64 },
}

impl Mode {
    fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Working { .. } => "working",
            Self::Breaking { .. } => "on a break",
        }
    }
}

/// Asks how long the break after a session should be.
#[derive(Clone, Debug, PartialEq)]
pub struct BreakPrompt {
    pub work_secs: u64,
    pub input: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    Idle,
    Elapsed(u64),
    Remaining(u64),
    AlarmFired,
}

/// Everything the screen shows about the timer.
#[derive(Clone, Debug, PartialEq)]
pub struct Display {
    pub label: &'static str,
    pub status: &'static str,
    pub timer: String,
    pub button: &'static str,
    pub title: String,
}

// ============================================================================
// Controller
// ============================================================================

/// Owns the work/break state machine and the collaborators it drives.
pub struct Controller {
    mode: Mode,
    shown_secs: u64,
    session_complete: bool,
    alarm_active: bool,
    prompt: Option<BreakPrompt>,
    default_break_minutes: u32,
    ticker: Ticker,
    clock: Box<dyn Clock>,
    history: History,
    alarm: Box<dyn Alarm>,
}

impl Controller {
    pub fn new(clock: Box<dyn Clock>, history: History, alarm: Box<dyn Alarm>) -> Self {
        Self {
            mode: Mode::Idle,
            shown_secs: 0,
            session_complete: false,
            alarm_active: false,
            prompt: None,
            default_break_minutes: DEFAULT_BREAK_MINUTES,
            ticker: Ticker::default(),
            clock,
            history,
            alarm,
        }
    }

    pub fn with_default_break(mut self, minutes: u32) -> Self {
        self.default_break_minutes = minutes.clamp(1, MAX_BREAK_MINUTES);
        self
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn prompt(&self) -> Option<&BreakPrompt> {
        self.prompt.as_ref()
    }

    pub fn prompt_mut(&mut self) -> Option<&mut BreakPrompt> {
        self.prompt.as_mut()
    }

    pub fn alarm_active(&self) -> bool {
        self.alarm_active
    }

    pub fn ticker_active(&self) -> bool {
        self.ticker.is_active()
    }

    pub fn ticker(&self) -> &Ticker {
        &self.ticker
    }

    pub fn is_working(&self) -> bool {
        matches!(self.mode, Mode::Working { .. })
    }

    pub fn is_breaking(&self) -> bool {
        matches!(self.mode, Mode::Breaking { .. })
    }

    /// The single action button: skip a running break, otherwise start or
    /// stop work.
    pub fn toggle(&mut self, task: &str) -> Result<()> {
        match self.mode {
            Mode::Breaking { .. } => self.skip_break(),
            Mode::Idle => self.start_work(task),
            Mode::Working { .. } => self.stop_work().map(|_| ()),
        }
    }

    pub fn start_work(&mut self, task: &str) -> Result<()> {
        self.require_idle("start work")?;
        let task = task.trim();
        if task.is_empty() {
            return Err(FlowtimeError::EmptyTask);
        }

        let now = self.clock.now();
        if let Err(e) = self.history.backfill_break(now) {
            error!("could not save break time: {e}");
        }

        self.ticker.cancel();
        self.prompt = None;
        self.session_complete = false;
        self.mode = Mode::Working { task: task.into(), started_at: now };
        self.shown_secs = 0;
        self.ticker.start(Instant::now());
        info!(task, "focus started");
        Ok(())
    }

    /// Ends the running session, records it and opens the break prompt.
    pub fn stop_work(&mut self) -> Result<SessionRecord> {
        let Mode::Working { task, started_at } = &self.mode else {
            return Err(self.invalid("stop work"));
        };

        self.ticker.cancel();
        let record = SessionRecord::new(task, *started_at, self.clock.now());
        let work_secs = elapsed_secs(&record.start_time, &record.end_time);
        if let Err(e) = self.history.append(record.clone()) {
            error!("could not save session: {e}");
        }

        self.mode = Mode::Idle;
        self.shown_secs = 0;
        self.session_complete = true;
        self.prompt = Some(BreakPrompt { work_secs, input: self.default_break_minutes.to_string() });
        Ok(record)
    }

    /// Starts a break of `minutes`. Missing or non-positive values fall back
    /// to the default length.
    pub fn start_break(&mut self, minutes: Option<i64>) -> Result<()> {
        self.require_idle("start a break")?;
        let minutes = match minutes {
            Some(m) if m > 0 => (m as u64).min(MAX_BREAK_MINUTES as u64),
            _ => self.default_break_minutes as u64,
        };

        self.prompt = None;
        self.ticker.cancel();
        let total = minutes * 60;
        let ends_at = self.clock.now() + Duration::seconds(total as i64);
        self.mode = Mode::Breaking { ends_at, remaining_secs: total };
        self.shown_secs = total;
        self.session_complete = false;
        self.ticker.start(Instant::now());
        info!(minutes, "break started");
        Ok(())
    }

    /// Starts a break from whatever is typed in the prompt.
    pub fn confirm_prompt(&mut self) -> Result<()> {
        let minutes = self.prompt.as_ref().and_then(|p| parse_minutes(&p.input));
        self.start_break(minutes)
    }

    pub fn cancel_prompt(&mut self) {
        self.prompt = None;
    }

    pub fn skip_break(&mut self) -> Result<()> {
        if !self.is_breaking() {
            return Err(self.invalid("skip a break"));
        }
        self.ticker.cancel();
        self.reset_to_idle();
        info!("break skipped");
        Ok(())
    }

    /// The once-a-second callback.
    pub fn tick(&mut self) -> TickOutcome {
        let now = self.clock.now();
        match &mut self.mode {
            Mode::Idle => TickOutcome::Idle,
            Mode::Working { started_at, .. } => {
                self.shown_secs = elapsed_secs(started_at, &now);
                TickOutcome::Elapsed(self.shown_secs)
            }
            Mode::Breaking { ends_at, remaining_secs: remaining } => {
                let left = remaining_secs(&now, ends_at);
                if left > *remaining {
                    // The wall clock went backwards. Keep counting down from
                    // where we were instead of stretching the break.
                    warn!(stepped_back = left - *remaining, "clock moved backwards during a break");
                    *ends_at = now + Duration::seconds(*remaining as i64);
                } else {
                    *remaining = left;
                }
                self.shown_secs = *remaining;
                if *remaining == 0 {
                    self.trigger_alarm();
                    TickOutcome::AlarmFired
                } else {
                    TickOutcome::Remaining(self.shown_secs)
                }
            }
        }
    }

    /// Runs [`Controller::tick`] if the ticker is due at `now`.
    pub fn poll_tick(&mut self, now: Instant) -> Option<TickOutcome> {
        self.ticker.poll(now).then(|| self.tick())
    }

    fn trigger_alarm(&mut self) {
        self.ticker.cancel();
        self.mode = Mode::Idle;
        self.shown_secs = 0;
        self.alarm_active = true;
        self.alarm.start();
        info!("break over, alarm ringing");
    }

    pub fn dismiss_alarm(&mut self) {
        if !self.alarm_active {
            return;
        }
        self.alarm.stop();
        self.alarm_active = false;
        self.reset_to_idle();
        debug!("alarm dismissed");
    }

    /// Empties the history when `confirmed`. Returns whether it did.
    pub fn clear_history(&mut self, confirmed: bool) -> Result<bool> {
        if !confirmed {
            return Ok(false);
        }
        self.history.clear()?;
        Ok(true)
    }

    pub fn display(&self) -> Display {
        let timer = format_time(self.shown_secs);
        if self.alarm_active {
            return Display {
                label: "Break Time",
                status: "Break Over!",
                timer,
                button: "Dismiss",
                title: "Break Over".into(),
            };
        }
        match self.mode {
            Mode::Idle => Display {
                label: "Focus Time",
                status: if self.session_complete { "Session Complete" } else { "Ready to Focus" },
                timer,
                button: "Start Focus",
                title: "Flowtime Focus".into(),
            },
            Mode::Working { .. } => Display {
                label: "Focus Time",
                status: "Focusing...",
                title: format!("({timer}) Flowtime"),
                timer,
                button: "Stop & Break",
            },
            Mode::Breaking { .. } => Display {
                label: "Break Time",
                status: "Recharging...",
                title: format!("({timer}) Break"),
                timer,
                button: "Skip Break",
            },
        }
    }

    fn reset_to_idle(&mut self) {
        self.mode = Mode::Idle;
        self.shown_secs = 0;
        self.session_complete = false;
    }

    fn require_idle(&self, action: &'static str) -> Result<()> {
        if self.mode == Mode::Idle && !self.alarm_active {
            Ok(())
        } else {
            Err(self.invalid(action))
        }
    }

    fn invalid(&self, action: &'static str) -> FlowtimeError {
        let mode = if self.alarm_active { "the alarm is ringing" } else { self.mode.name() };
        FlowtimeError::InvalidState { action, mode }
    }
}

/// Reads a minute count typed by the user.
pub fn parse_minutes(input: &str) -> Option<i64> {
    input.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::{
        alarm::{AlarmEvent, RecordingAlarm},
        clock::ManualClock,
        history::STORAGE_KEY,
        logging::TEST_LOGGING,
        storage::{FailingStorage, MemoryStorage, Storage},
    };

    struct Harness {
        clock: ManualClock,
        storage: MemoryStorage,
        alarm: RecordingAlarm,
        controller: Controller,
    }

    fn harness() -> Harness {
        *TEST_LOGGING;
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap());
        let storage = MemoryStorage::new();
        let alarm = RecordingAlarm::new();
        let history = History::load(Box::new(storage.clone())).unwrap();
        let controller = Controller::new(Box::new(clock.clone()), history, Box::new(alarm.clone()));
        Harness { clock, storage, alarm, controller }
    }

    /// Like [`harness`], but storage writes fail once `failing` is switched on.
    fn failing_harness() -> (Harness, FailingStorage) {
        let mut h = harness();
        let failing = FailingStorage::new(h.storage.clone());
        let history = History::load(Box::new(failing.clone())).unwrap();
        h.controller = Controller::new(Box::new(h.clock.clone()), history, Box::new(h.alarm.clone()));
        (h, failing)
    }

    fn stored(storage: &MemoryStorage) -> Vec<SessionRecord> {
        serde_json::from_str(&storage.get(STORAGE_KEY).unwrap().unwrap_or_else(|| "[]".into())).unwrap()
    }

    #[test]
    fn empty_task_is_rejected_without_state_change() {
        let mut h = harness();

        assert!(matches!(h.controller.start_work("   "), Err(FlowtimeError::EmptyTask)));
        assert_eq!(h.controller.mode(), &Mode::Idle);
        assert!(!h.controller.ticker_active());
        assert_eq!(h.controller.display().status, "Ready to Focus");
    }

    #[test]
    fn start_work_enters_working() {
        let mut h = harness();
        h.controller.start_work(" write ").unwrap();

        assert!(h.controller.is_working());
        assert!(h.controller.ticker_active());
        let display = h.controller.display();
        assert_eq!(display.button, "Stop & Break");
        assert_eq!(display.status, "Focusing...");
        assert_eq!(display.timer, "00:00:00");
    }

    #[test]
    fn working_tick_recomputes_from_start() {
        let mut h = harness();
        h.controller.start_work("write").unwrap();

        h.clock.advance(Duration::seconds(3661));
        assert_eq!(h.controller.tick(), TickOutcome::Elapsed(3661));
        let display = h.controller.display();
        assert_eq!(display.timer, "01:01:01");
        assert_eq!(display.title, "(01:01:01) Flowtime");
    }

    #[test]
    fn stop_appends_exactly_one_open_record() {
        let mut h = harness();
        h.controller.start_work("write").unwrap();
        h.clock.advance(Duration::seconds(1500));

        let record = h.controller.stop_work().unwrap();

        assert_eq!(record.duration, "00:25:00");
        assert_eq!(record.break_time, None);
        assert_eq!(h.controller.history().len(), 1);
        assert_eq!(stored(&h.storage), vec![record]);
        assert_eq!(h.controller.mode(), &Mode::Idle);
        assert!(!h.controller.ticker_active());
        assert_eq!(h.controller.display().status, "Session Complete");
        assert_eq!(h.controller.prompt(), Some(&BreakPrompt { work_secs: 1500, input: "5".into() }));
    }

    #[test]
    fn stop_clamps_duration_on_clock_skew() {
        let mut h = harness();
        h.controller.start_work("write").unwrap();
        h.clock.advance(Duration::seconds(-30));

        assert_eq!(h.controller.stop_work().unwrap().duration, "00:00:00");
    }

    #[test]
    fn next_start_backfills_previous_break_once() {
        let mut h = harness();
        h.controller.start_work("one").unwrap();
        h.clock.advance(Duration::seconds(600));
        h.controller.stop_work().unwrap();

        h.clock.advance(Duration::seconds(125));
        h.controller.start_work("two").unwrap();
        assert_eq!(h.controller.prompt(), None);
        h.clock.advance(Duration::seconds(60));
        h.controller.stop_work().unwrap();

        let records = stored(&h.storage);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].break_time.as_deref(), Some("00:02:05"));
        assert_eq!(records[1].break_time, None);
    }

    #[test]
    fn failed_save_still_ends_the_session() {
        let (mut h, failing) = failing_harness();
        h.controller.start_work("write").unwrap();
        h.clock.advance(Duration::seconds(90));
        failing.fail_writes(true);

        let record = h.controller.stop_work().unwrap();

        assert_eq!(h.controller.history().records(), [record]);
        assert!(stored(&h.storage).is_empty());
        assert_eq!(h.controller.mode(), &Mode::Idle);
        assert_eq!(h.controller.prompt().map(|p| p.work_secs), Some(90));
    }

    #[test]
    fn failed_backfill_still_starts_work() {
        let (mut h, failing) = failing_harness();
        h.controller.start_work("one").unwrap();
        h.controller.stop_work().unwrap();
        h.clock.advance(Duration::seconds(40));
        failing.fail_writes(true);

        h.controller.start_work("two").unwrap();

        assert!(h.controller.is_working());
        assert!(h.controller.ticker_active());
        assert_eq!(h.controller.history().last().unwrap().break_time.as_deref(), Some("00:00:40"));
        assert_eq!(stored(&h.storage)[0].break_time, None);
    }

    #[test]
    fn break_prompt_uses_default_for_bad_input() {
        let mut h = harness();
        h.controller.start_work("write").unwrap();
        h.controller.stop_work().unwrap();
        h.controller.prompt_mut().unwrap().input = "abc".into();

        h.controller.confirm_prompt().unwrap();

        assert_eq!(h.controller.prompt(), None);
        assert_eq!(h.controller.display().timer, "00:05:00");

        h.controller.skip_break().unwrap();
        h.controller.start_break(Some(-4)).unwrap();
        assert_eq!(h.controller.display().timer, "00:05:00");
    }

    #[test]
    fn break_countdown_fires_after_exactly_m_times_60_ticks() {
        let mut h = harness();
        h.controller.start_break(Some(2)).unwrap();

        for tick in 1..120 {
            h.clock.advance(Duration::seconds(1));
            assert_eq!(h.controller.tick(), TickOutcome::Remaining(120 - tick));
            assert!(!h.alarm.is_ringing());
        }
        h.clock.advance(Duration::seconds(1));
        assert_eq!(h.controller.tick(), TickOutcome::AlarmFired);

        assert!(h.alarm.is_ringing());
        assert!(h.controller.alarm_active());
        assert!(!h.controller.ticker_active());
        assert_eq!(h.controller.display().timer, "00:00:00");
        assert_eq!(h.controller.display().button, "Dismiss");
    }

    #[test]
    fn delayed_ticks_do_not_drift_the_countdown() {
        let mut h = harness();
        h.controller.start_break(Some(1)).unwrap();

        h.clock.advance(Duration::seconds(45));
        assert_eq!(h.controller.tick(), TickOutcome::Remaining(15));
        h.clock.advance(Duration::seconds(20));
        assert_eq!(h.controller.tick(), TickOutcome::AlarmFired);
    }

    #[test]
    fn clock_stepping_back_does_not_stretch_the_break() {
        let mut h = harness();
        h.controller.start_break(Some(1)).unwrap();
        h.clock.advance(Duration::seconds(20));
        assert_eq!(h.controller.tick(), TickOutcome::Remaining(40));

        h.clock.advance(Duration::seconds(-600));
        assert_eq!(h.controller.tick(), TickOutcome::Remaining(40));
        h.clock.advance(Duration::seconds(1));
        assert_eq!(h.controller.tick(), TickOutcome::Remaining(39));
        h.clock.advance(Duration::seconds(39));
        assert_eq!(h.controller.tick(), TickOutcome::AlarmFired);
    }

    #[test]
    fn skip_break_leaves_history_alone() {
        let mut h = harness();
        h.controller.start_work("write").unwrap();
        h.clock.advance(Duration::seconds(60));
        h.controller.stop_work().unwrap();
        let before = stored(&h.storage);

        h.controller.confirm_prompt().unwrap();
        h.clock.advance(Duration::seconds(30));
        h.controller.tick();
        h.controller.toggle("write").unwrap();

        assert_eq!(h.controller.mode(), &Mode::Idle);
        assert!(!h.controller.ticker_active());
        assert_eq!(stored(&h.storage), before);
        assert_eq!(h.controller.display().status, "Ready to Focus");
        assert!(h.alarm.events().is_empty());
    }

    #[test]
    fn dismiss_stops_alarm_and_resets_display() {
        let mut h = harness();
        h.controller.start_break(Some(1)).unwrap();
        h.clock.advance(Duration::seconds(60));
        h.controller.tick();

        assert!(h.controller.start_work("write").is_err());
        h.controller.dismiss_alarm();

        assert_eq!(h.alarm.events(), [AlarmEvent::Started, AlarmEvent::Stopped]);
        assert!(!h.controller.alarm_active());
        assert_eq!(
            h.controller.display(),
            Display {
                label: "Focus Time",
                status: "Ready to Focus",
                timer: "00:00:00".into(),
                button: "Start Focus",
                title: "Flowtime Focus".into(),
            }
        );
        h.controller.start_work("write").unwrap();
    }

    #[test]
    fn transitions_out_of_order_are_rejected() {
        let mut h = harness();
        assert!(matches!(h.controller.stop_work(), Err(FlowtimeError::InvalidState { .. })));
        assert!(h.controller.skip_break().is_err());

        h.controller.start_work("write").unwrap();
        assert!(h.controller.start_break(Some(5)).is_err());
        assert!(h.controller.start_work("other").is_err());
    }

    #[test]
    fn clear_needs_confirmation() {
        let mut h = harness();
        h.controller.start_work("write").unwrap();
        h.controller.stop_work().unwrap();

        assert!(!h.controller.clear_history(false).unwrap());
        assert_eq!(h.controller.history().len(), 1);

        assert!(h.controller.clear_history(true).unwrap());
        assert!(h.controller.history().is_empty());
        assert!(stored(&h.storage).is_empty());
    }

    #[test]
    fn poll_tick_only_runs_when_due() {
        let mut h = harness();
        let now = Instant::now();
        assert_eq!(h.controller.poll_tick(now + std::time::Duration::from_secs(5)), None);

        h.controller.start_work("write").unwrap();
        assert!(h.controller.poll_tick(Instant::now() + std::time::Duration::from_secs(2)).is_some());
    }
}
