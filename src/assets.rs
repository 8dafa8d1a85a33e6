use std::{
    fs, io,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

use crate::error::{FlowtimeError, Result};

pub const CACHE_NAME: &str = "flowtime-v1";
pub const ALARM_SOUND: &str = "notification.oga";
pub const ICON: &str = "icon.png";

/// Everything the app needs to run without reaching outside its data dir.
pub const ASSETS: &[&str] = &[ALARM_SOUND, ICON];

/// Where assets come from when they are not cached yet.
pub trait AssetSource {
    fn fetch(&self, name: &str) -> Result<Vec<u8>>;
}

/// Looks assets up in the usual freedesktop locations.
pub struct SystemSounds {
    roots: Vec<PathBuf>,
}

impl Default for SystemSounds {
    fn default() -> Self {
        Self { roots: vec![PathBuf::from("/usr/share")] }
    }
}

impl SystemSounds {
    pub fn with_roots(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    fn candidates(name: &str) -> &'static [&'static str] {
        match name {
            ALARM_SOUND => &[
                "sounds/freedesktop/stereo/alarm-clock-elapsed.oga",
                "sounds/freedesktop/stereo/complete.oga",
                "sounds/sound-icons/guitar-11.wav",
                "sounds/generic.wav",
            ],
            ICON => &[
                "icons/hicolor/48x48/apps/alarm-clock.png",
                "icons/Adwaita/48x48/legacy/alarm-symbolic.png",
            ],
            _ => &[],
        }
    }
}

impl AssetSource for SystemSounds {
    fn fetch(&self, name: &str) -> Result<Vec<u8>> {
        for root in &self.roots {
            for candidate in Self::candidates(name) {
                let path = root.join(candidate);
                if path.exists() {
                    return Ok(fs::read(path)?);
                }
            }
        }
        Err(FlowtimeError::AssetMissing(name.into()))
    }
}

/// Cache-first store of [`ASSETS`] under `<data>/cache/flowtime-v1`.
pub struct AssetCache {
    dir: PathBuf,
}

impl AssetCache {
    pub fn new(data_dir: &Path) -> Result<Self> {
        let dir = data_dir.join("cache").join(CACHE_NAME);
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Copies every missing asset from `source`. Assets the source cannot
    /// provide are skipped. Returns how many assets are now cached.
    pub fn install(&self, source: &dyn AssetSource) -> usize {
        ASSETS
            .iter()
            .filter(|name| {
                if self.path(name).is_some() {
                    return true;
                }
                match source.fetch(name).and_then(|bytes| self.store(name, &bytes)) {
                    Ok(()) => {
                        debug!(asset = %name, "asset cached");
                        true
                    }
                    Err(e) => {
                        warn!(asset = %name, "could not cache asset: {e}");
                        false
                    }
                }
            })
            .count()
    }

    /// Serves the cached copy if there is one, otherwise asks `source`.
    /// Source errors are returned as they are.
    pub fn fetch(&self, name: &str, source: &dyn AssetSource) -> Result<Vec<u8>> {
        match fs::read(self.dir.join(name)) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => source.fetch(name),
            Err(e) => Err(e.into()),
        }
    }

    /// Location of the cached copy of `name`, if it was installed. This is
    /// how the running app reads the cache; [`AssetCache::fetch`] is for
    /// callers that want the bytes with a fallback source.
    pub fn path(&self, name: &str) -> Option<PathBuf> {
        let path = self.dir.join(name);
        path.is_file().then_some(path)
    }

    fn store(&self, name: &str, bytes: &[u8]) -> Result<()> {
        fs::write(self.dir.join(name), bytes)?;
        Ok(())
    }
}
