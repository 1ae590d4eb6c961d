use std::path::{Path, PathBuf};
use std::{env, fs, io};

use hunt_core::GameConfig;

use crate::error::{Result, StoreError};

pub const CONFIG_FILE: &str = "config.toml";
pub const DATABASE_FILE: &str = "hunt.db";

/// `~/.treasure-hunt`, or `./.treasure-hunt` when no home is set.
pub fn default_base_dir() -> PathBuf {
    dirs_home().join(".treasure-hunt")
}

fn dirs_home() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Read a TOML config. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<GameConfig> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(toml::from_str(&text)?),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(GameConfig::default())
        }
        Err(e) => Err(StoreError::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use hunt_core::RecoveryAction;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config, GameConfig::default());
    }

    #[test]
    fn test_partial_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            "[settings]\naudio_volume = 3.5\n\n[resilience]\nmax_attempts = 5\n\n[resilience.timeouts_ms]\nreprobe_location = 250\n",
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.settings.audio_volume(), 1.0);
        assert!(config.settings.audio_enabled());
        assert_eq!(config.resilience.max_attempts, 5);
        assert_eq!(
            config.resilience.timeout(RecoveryAction::ReprobeLocation),
            Duration::from_millis(250)
        );
        assert_eq!(config.resilience.history_capacity, 100);
        assert_eq!(config.location.weak_signal_accuracy_m, 50.0);
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[resilience\nmax_attempts = ").unwrap();
        assert!(matches!(load_config(&path), Err(StoreError::Config(_))));
    }
}
