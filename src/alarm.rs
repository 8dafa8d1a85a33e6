use std::{
    path::{Path, PathBuf},
    process::{Command, Stdio},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread,
    time::Duration,
};

use notify_rust::{Notification, Urgency};
use tracing::{debug, warn};

const PLAYERS: &[&str] = &["paplay", "aplay"];
const POLL_INTERVAL: Duration = Duration::from_millis(100);
const THEME_ICON: &str = "alarm-clock";

/// Fired when a break runs out. Failures inside an alarm are its own
/// business; neither call reports back to the caller.
pub trait Alarm: Send {
    fn start(&mut self);
    fn stop(&mut self);
}

// ============================================================================
// Desktop alarm
// ============================================================================

/// Critical desktop notification plus a sound that loops until stopped.
/// Without a sound file only the notification is shown. Without an icon file
/// the notification falls back to the theme's alarm clock.
pub struct SoundAlarm {
    sound: Option<PathBuf>,
    icon: Option<PathBuf>,
    playing: Option<Arc<AtomicBool>>,
}

impl SoundAlarm {
    pub fn new(sound: Option<PathBuf>, icon: Option<PathBuf>) -> Self {
        Self { sound, icon, playing: None }
    }

    fn notification_icon(&self) -> String {
        match &self.icon {
            Some(path) => path.display().to_string(),
            None => THEME_ICON.into(),
        }
    }
}

impl Alarm for SoundAlarm {
    fn start(&mut self) {
        self.stop();

        if let Err(e) = Notification::new()
            .summary("Break is over!")
            .body("Time to get back to focus.")
            .appname("flowtime")
            .icon(&self.notification_icon())
            .urgency(Urgency::Critical)
            .show()
        {
            warn!("could not show notification: {e}");
        }

        let Some(sound) = self.sound.clone() else {
            return;
        };
        let stop = Arc::new(AtomicBool::new(false));
        self.playing = Some(stop.clone());
        thread::spawn(move || play_loop(&sound, &stop));
    }

    fn stop(&mut self) {
        if let Some(stop) = self.playing.take() {
            stop.store(true, Ordering::SeqCst);
        }
    }
}

impl Drop for SoundAlarm {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Replays `sound` until `stop` is set. Each round starts a fresh player, so
/// stopping and restarting always plays from the beginning.
fn play_loop(sound: &Path, stop: &AtomicBool) {
    'rounds: while !stop.load(Ordering::SeqCst) {
        let spawned = PLAYERS.iter().find_map(|player| {
            Command::new(player)
                .arg(sound)
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
                .ok()
        });
        let Some(mut child) = spawned else {
            warn!("no audio player could play {}, alarm stays silent", sound.display());
            return;
        };

        loop {
            if stop.load(Ordering::SeqCst) {
                let _ = child.kill();
                let _ = child.wait();
                break 'rounds;
            }
            match child.try_wait() {
                Ok(Some(status)) if status.success() => break,
                Ok(Some(status)) => {
                    warn!("audio player exited with {status}, alarm stays silent");
                    return;
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    warn!("lost track of audio player: {e}");
                    return;
                }
            }
        }
    }
    debug!("alarm sound stopped");
}

// ============================================================================
// Recording alarm
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlarmEvent {
    Started,
    Stopped,
}

/// Remembers every call instead of making noise. Clones share the log.
#[derive(Clone, Default)]
pub struct RecordingAlarm {
    events: Arc<Mutex<Vec<AlarmEvent>>>,
}

impl RecordingAlarm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AlarmEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn is_ringing(&self) -> bool {
        self.events().last() == Some(&AlarmEvent::Started)
    }

    fn push(&self, event: AlarmEvent) {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).push(event);
    }
}

impl Alarm for RecordingAlarm {
    fn start(&mut self) {
        self.push(AlarmEvent::Started);
    }

    fn stop(&mut self) {
        self.push(AlarmEvent::Stopped);
    }
}
