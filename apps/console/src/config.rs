use std::{fs, path::Path, time::Duration};

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// How long the splash surface stays up before onboarding begins.
    pub splash: Duration,
    /// Simulated matchmaking latency of the mock backend.
    pub matchmaking_delay: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            splash: Duration::from_millis(3000),
            matchmaking_delay: Duration::from_millis(1500),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    splash_millis: Option<u64>,
    matchmaking_delay_millis: Option<u64>,
}

pub fn load_settings(path: &Path) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        if let Ok(file_cfg) = toml::from_str::<FileSettings>(&raw) {
            if let Some(v) = file_cfg.splash_millis {
                settings.splash = Duration::from_millis(v);
            }
            if let Some(v) = file_cfg.matchmaking_delay_millis {
                settings.matchmaking_delay = Duration::from_millis(v);
            }
        }
    }

    if let Some(v) = env_millis("SPLASH_MILLIS").or_else(|| env_millis("APP__SPLASH_MILLIS")) {
        settings.splash = v;
    }
    if let Some(v) =
        env_millis("MATCHMAKING_DELAY_MILLIS").or_else(|| env_millis("APP__MATCHMAKING_DELAY_MILLIS"))
    {
        settings.matchmaking_delay = v;
    }

    settings
}

fn env_millis(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
        .map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use std::{
        env,
        time::{SystemTime, UNIX_EPOCH},
    };

    use super::*;

    #[test]
    fn defaults_match_the_shipped_timings() {
        let settings = load_settings(Path::new("/definitely/not/here.toml"));
        assert_eq!(settings.splash, Duration::from_millis(3000));
        assert_eq!(settings.matchmaking_delay, Duration::from_millis(1500));
    }

    #[test]
    fn file_values_override_defaults() {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let path = env::temp_dir().join(format!("console_settings_test_{suffix}.toml"));
        fs::write(&path, "splash_millis = 10\nmatchmaking_delay_millis = 20\n")
            .expect("write settings");

        let settings = load_settings(&path);
        assert_eq!(settings.splash, Duration::from_millis(10));
        assert_eq!(settings.matchmaking_delay, Duration::from_millis(20));

        fs::remove_file(path).expect("cleanup");
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let path = env::temp_dir().join(format!("console_settings_extra_{suffix}.toml"));
        fs::write(&path, "splash_millis = 5\nunrelated = \"x\"\n").expect("write settings");

        let settings = load_settings(&path);
        assert_eq!(settings.splash, Duration::from_millis(5));

        fs::remove_file(path).expect("cleanup");
    }
}
