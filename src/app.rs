use std::path::PathBuf;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::{error, warn};

use crate::{
    config::Config,
    error::FlowtimeError,
    session::Controller,
    ui::{get_theme, Theme},
};

pub const EXPORT_FILE: &str = "flowtime_export.csv";

#[derive(PartialEq, Clone, Copy, Debug)]
pub enum Focus {
    Task,
    Actions,
}

#[derive(PartialEq, Clone, Debug)]
pub enum Dialog {
    Message(String),
    ConfirmClear,
}

// ============================================================================
// Application State
// ============================================================================

pub struct App {
    pub controller: Controller,
    pub config: Config,
    pub theme: Theme,
    pub task_input: String,
    pub focus: Focus,
    pub dialog: Option<Dialog>,
    pub notice: Option<String>,
    pub preset_index: Option<usize>,
    data_dir: PathBuf,
}

impl App {
    pub fn new(controller: Controller, config: Config, data_dir: PathBuf) -> Self {
        Self {
            controller: controller.with_default_break(config.default_break_minutes),
            theme: get_theme(&config.theme),
            config,
            task_input: String::new(),
            focus: Focus::Task,
            dialog: None,
            notice: None,
            preset_index: None,
            data_dir,
        }
    }

    pub fn export_path(&self) -> PathBuf {
        self.data_dir.join(EXPORT_FILE)
    }

    fn toggle(&mut self) {
        self.notice = None;
        match self.controller.toggle(&self.task_input) {
            Ok(()) => {
                if self.controller.prompt().is_some() {
                    self.preset_index = None;
                }
            }
            Err(FlowtimeError::EmptyTask) => {
                self.dialog = Some(Dialog::Message(FlowtimeError::EmptyTask.to_string()));
                self.focus = Focus::Task;
            }
            Err(e) => {
                warn!("action ignored: {e}");
                self.notice = Some(e.to_string());
            }
        }
    }

    fn clear_history(&mut self, confirmed: bool) {
        self.dialog = None;
        match self.controller.clear_history(confirmed) {
            Ok(true) => self.notice = Some("History cleared".into()),
            Ok(false) => {}
            Err(e) => {
                error!("could not clear history: {e}");
                self.dialog = Some(Dialog::Message(format!("Could not clear history: {e}")));
            }
        }
    }

    fn export(&mut self) {
        let path = self.export_path();
        self.notice = Some(match self.controller.history().export_csv(&path) {
            Ok(()) => format!("Exported to {}", path.display()),
            Err(e) => {
                error!("export failed: {e}");
                format!("Export failed: {e}")
            }
        });
    }

    fn cycle_preset(&mut self, forward: bool) {
        let presets = &self.config.break_presets;
        if presets.is_empty() {
            return;
        }
        let Some(prompt) = self.controller.prompt_mut() else {
            return;
        };
        let idx = match (self.preset_index, forward) {
            (None, true) => 0,
            (None, false) => presets.len() - 1,
            (Some(i), true) => (i + 1) % presets.len(),
            (Some(i), false) => (i + presets.len() - 1) % presets.len(),
        };
        prompt.input = presets[idx].to_string();
        self.preset_index = Some(idx);
    }
}

// ============================================================================
// Event Handlers
// ============================================================================

/// Applies one key press. Returns `true` when the app should quit.
pub fn handle_input(key: KeyEvent, app: &mut App) -> bool {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    match app.dialog {
        Some(Dialog::Message(_)) => {
            app.dialog = None;
            return false;
        }
        Some(Dialog::ConfirmClear) => {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => app.clear_history(true),
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => app.clear_history(false),
                _ => {}
            }
            return false;
        }
        None => {}
    }

    if app.controller.alarm_active() {
        if matches!(key.code, KeyCode::Enter | KeyCode::Char(' ') | KeyCode::Esc) {
            app.controller.dismiss_alarm();
        }
        return false;
    }

    if app.controller.prompt().is_some() {
        handle_prompt(key, app);
        return false;
    }

    match app.focus {
        Focus::Task => handle_task_field(key, app),
        Focus::Actions => handle_actions(key, app),
    }
}

fn handle_prompt(key: KeyEvent, app: &mut App) {
    match key.code {
        KeyCode::Char(c) if c.is_ascii_digit() => {
            if let Some(prompt) = app.controller.prompt_mut() {
                prompt.input.push(c);
            }
            app.preset_index = None;
        }
        KeyCode::Backspace => {
            if let Some(prompt) = app.controller.prompt_mut() {
                prompt.input.pop();
            }
            app.preset_index = None;
        }
        KeyCode::Tab | KeyCode::Right => app.cycle_preset(true),
        KeyCode::BackTab | KeyCode::Left => app.cycle_preset(false),
        KeyCode::Enter => {
            if let Err(e) = app.controller.confirm_prompt() {
                warn!("break not started: {e}");
                app.notice = Some(e.to_string());
            }
        }
        KeyCode::Esc => app.controller.cancel_prompt(),
        _ => {}
    }
}

fn handle_task_field(key: KeyEvent, app: &mut App) -> bool {
    let locked = app.controller.is_working();
    match key.code {
        KeyCode::Enter => app.toggle(),
        KeyCode::Esc | KeyCode::Tab => app.focus = Focus::Actions,
        KeyCode::Char(c) if !locked => app.task_input.push(c),
        KeyCode::Backspace if !locked => {
            app.task_input.pop();
        }
        _ => {}
    }
    false
}

fn handle_actions(key: KeyEvent, app: &mut App) -> bool {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => return true,
        KeyCode::Enter | KeyCode::Char(' ') => app.toggle(),
        KeyCode::Char('i') | KeyCode::Tab => app.focus = Focus::Task,
        KeyCode::Char('c') => app.dialog = Some(Dialog::ConfirmClear),
        KeyCode::Char('e') => app.export(),
        _ => {}
    }
    false
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use crossterm::event::{KeyEventKind, KeyEventState};
    use tempfile::{tempdir, TempDir};

    use super::*;
    use crate::{
        alarm::RecordingAlarm,
        clock::ManualClock,
        history::History,
        session::Mode,
        storage::{FailingStorage, MemoryStorage},
    };

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            handle_input(key(KeyCode::Char(c)), app);
        }
    }

    fn app() -> (App, ManualClock, TempDir) {
        let dir = tempdir().unwrap();
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap());
        let history = History::load(Box::new(MemoryStorage::new())).unwrap();
        let controller = Controller::new(Box::new(clock.clone()), history, Box::new(RecordingAlarm::new()));
        let app = App::new(controller, Config::default(), dir.path().to_path_buf());
        (app, clock, dir)
    }

    #[test]
    fn enter_with_empty_task_shows_message() {
        let (mut app, _, _dir) = app();

        handle_input(key(KeyCode::Enter), &mut app);

        assert_eq!(app.dialog, Some(Dialog::Message("Please enter a task name first!".into())));
        assert_eq!(app.controller.mode(), &Mode::Idle);

        handle_input(key(KeyCode::Char('x')), &mut app);
        assert_eq!(app.dialog, None);
        assert!(app.task_input.is_empty());
    }

    #[test]
    fn task_is_locked_while_working_and_kept_after() {
        let (mut app, clock, _dir) = app();
        type_text(&mut app, "deep work");
        handle_input(key(KeyCode::Enter), &mut app);
        assert!(app.controller.is_working());

        type_text(&mut app, "zz");
        assert_eq!(app.task_input, "deep work");

        clock.advance(Duration::seconds(90));
        handle_input(key(KeyCode::Enter), &mut app);
        assert_eq!(app.task_input, "deep work");
        assert_eq!(app.controller.history().records()[0].task, "deep work");
        assert!(app.controller.prompt().is_some());
    }

    #[test]
    fn prompt_presets_and_typing() {
        let (mut app, clock, _dir) = app();
        type_text(&mut app, "a");
        handle_input(key(KeyCode::Enter), &mut app);
        clock.advance(Duration::seconds(30));
        handle_input(key(KeyCode::Enter), &mut app);

        handle_input(key(KeyCode::Tab), &mut app);
        handle_input(key(KeyCode::Tab), &mut app);
        assert_eq!(app.controller.prompt().unwrap().input, "10");
        handle_input(key(KeyCode::BackTab), &mut app);
        assert_eq!(app.controller.prompt().unwrap().input, "5");

        handle_input(key(KeyCode::Backspace), &mut app);
        type_text(&mut app, "15");
        handle_input(key(KeyCode::Enter), &mut app);

        assert!(app.controller.is_breaking());
        assert_eq!(app.controller.display().timer, "00:15:00");
    }

    #[test]
    fn escape_closes_prompt_without_break() {
        let (mut app, _, _dir) = app();
        type_text(&mut app, "a");
        handle_input(key(KeyCode::Enter), &mut app);
        handle_input(key(KeyCode::Enter), &mut app);

        handle_input(key(KeyCode::Esc), &mut app);
        assert!(app.controller.prompt().is_none());
        assert_eq!(app.controller.mode(), &Mode::Idle);
    }

    #[test]
    fn alarm_swallows_keys_until_dismissed() {
        let (mut app, clock, _dir) = app();
        app.controller.start_break(Some(1)).unwrap();
        clock.advance(Duration::seconds(60));
        app.controller.tick();
        assert!(app.controller.alarm_active());

        handle_input(key(KeyCode::Char('q')), &mut app);
        assert!(app.controller.alarm_active());
        handle_input(key(KeyCode::Enter), &mut app);
        assert!(!app.controller.alarm_active());
        assert_eq!(app.controller.display().status, "Ready to Focus");
    }

    #[test]
    fn clear_requires_yes() {
        let (mut app, _, _dir) = app();
        type_text(&mut app, "a");
        handle_input(key(KeyCode::Enter), &mut app);
        handle_input(key(KeyCode::Enter), &mut app);
        handle_input(key(KeyCode::Esc), &mut app);
        handle_input(key(KeyCode::Esc), &mut app);
        assert_eq!(app.focus, Focus::Actions);

        handle_input(key(KeyCode::Char('c')), &mut app);
        handle_input(key(KeyCode::Char('n')), &mut app);
        assert_eq!(app.controller.history().len(), 1);

        handle_input(key(KeyCode::Char('c')), &mut app);
        assert_eq!(app.dialog, Some(Dialog::ConfirmClear));
        handle_input(key(KeyCode::Char('y')), &mut app);
        assert!(app.controller.history().is_empty());
        assert_eq!(app.dialog, None);
    }

    #[test]
    fn failed_clear_shows_a_message_and_keeps_history() {
        let dir = tempdir().unwrap();
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap());
        let storage = FailingStorage::new(MemoryStorage::new());
        let history = History::load(Box::new(storage.clone())).unwrap();
        let controller = Controller::new(Box::new(clock), history, Box::new(RecordingAlarm::new()));
        let mut app = App::new(controller, Config::default(), dir.path().to_path_buf());
        type_text(&mut app, "a");
        handle_input(key(KeyCode::Enter), &mut app);
        handle_input(key(KeyCode::Enter), &mut app);
        handle_input(key(KeyCode::Esc), &mut app);
        handle_input(key(KeyCode::Esc), &mut app);

        storage.fail_writes(true);
        handle_input(key(KeyCode::Char('c')), &mut app);
        handle_input(key(KeyCode::Char('y')), &mut app);

        assert!(matches!(
            &app.dialog,
            Some(Dialog::Message(m)) if m.starts_with("Could not clear history")
        ));
        assert_eq!(app.controller.history().len(), 1);
    }

    #[test]
    fn export_writes_csv_to_data_dir() {
        let (mut app, _, _dir) = app();
        type_text(&mut app, "a");
        handle_input(key(KeyCode::Enter), &mut app);
        handle_input(key(KeyCode::Enter), &mut app);
        handle_input(key(KeyCode::Esc), &mut app);
        handle_input(key(KeyCode::Esc), &mut app);

        handle_input(key(KeyCode::Char('e')), &mut app);

        let csv = std::fs::read_to_string(app.export_path()).unwrap();
        assert!(csv.starts_with("Task,Start,End,Duration,Break\na,"));
        assert!(app.notice.as_deref().unwrap().starts_with("Exported to"));
    }

    #[test]
    fn quit_keys() {
        let (mut app, _, _dir) = app();
        assert!(!handle_input(key(KeyCode::Char('q')), &mut app));
        assert_eq!(app.task_input, "q");

        handle_input(key(KeyCode::Esc), &mut app);
        assert!(handle_input(key(KeyCode::Char('q')), &mut app));

        let ctrl_c = KeyEvent { modifiers: KeyModifiers::CONTROL, ..key(KeyCode::Char('c')) };
        assert!(handle_input(ctrl_c, &mut app));
    }
}
