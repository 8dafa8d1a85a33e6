use std::{
    env, fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::session::{DEFAULT_BREAK_MINUTES, MAX_BREAK_MINUTES};

pub const CONFIG_FILE: &str = "config.json";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Config {
    pub default_break_minutes: u32,
    pub break_presets: Vec<u32>,
    pub sound_enabled: bool,
    pub theme: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_break_minutes: DEFAULT_BREAK_MINUTES,
            break_presets: vec![5, 10, 15, 20, 25, 30],
            sound_enabled: true,
            theme: "default".into(),
        }
    }
}

impl Config {
    /// Reads `config.json` from `dir`, falling back to defaults when the file
    /// is missing or unreadable.
    pub fn load(dir: &Path) -> Self {
        let mut config: Self = load_json(&dir.join(CONFIG_FILE));
        config.sanitize();
        config
    }

    pub fn save(&self, dir: &Path) -> io::Result<()> {
        save_json(&dir.join(CONFIG_FILE), self)
    }

    fn sanitize(&mut self) {
        self.default_break_minutes = self.default_break_minutes.clamp(1, MAX_BREAK_MINUTES);
        self.break_presets.retain(|m| (1..=MAX_BREAK_MINUTES).contains(m));
        if self.break_presets.is_empty() {
            self.break_presets = Self::default().break_presets;
        }
    }
}

/// Resolves the data directory: an explicit path wins, then
/// `$XDG_STATE_HOME/flowtime`, then `~/.local/state/flowtime`, then `./flowtime`.
pub fn data_dir(explicit: Option<PathBuf>) -> io::Result<PathBuf> {
    let path = explicit.unwrap_or_else(|| {
        env::var("XDG_STATE_HOME")
            .map(PathBuf::from)
            .or_else(|_| env::var("HOME").map(|home| PathBuf::from(home).join(".local/state")))
            .unwrap_or_else(|_| PathBuf::from("."))
            .join("flowtime")
    });
    fs::create_dir_all(&path)?;
    Ok(path)
}

pub fn load_json<T: for<'de> Deserialize<'de> + Default>(path: &Path) -> T {
    match fs::read_to_string(path) {
        Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
            warn!(path = %path.display(), "ignoring invalid file: {e}");
            T::default()
        }),
        Err(_) => T::default(),
    }
}

pub fn save_json<T: Serialize>(path: &Path, data: &T) -> io::Result<()> {
    fs::write(path, serde_json::to_string_pretty(data)?)
}
