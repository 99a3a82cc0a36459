use std::ffi::OsString;
use std::path::Path;
use std::sync::Mutex;

use tempfile::TempDir;

use crate::core::config::CONFIG_DIR_ENV;

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Restores every variable it touched when dropped.
#[derive(Default)]
pub struct TestEnvVarGuard {
    saved: Vec<(String, Option<OsString>)>,
}

impl TestEnvVarGuard {
    pub fn new() -> Self {
        Self::default()
    }

    fn remember(&mut self, key: &str) {
        if !self.saved.iter().any(|(saved, _)| saved == key) {
            self.saved.push((key.to_string(), std::env::var_os(key)));
        }
    }

    pub fn set_var(&mut self, key: &str, value: impl AsRef<std::ffi::OsStr>) {
        self.remember(key);
        std::env::set_var(key, value);
    }

    pub fn remove_var(&mut self, key: &str) {
        self.remember(key);
        std::env::remove_var(key);
    }
}

impl Drop for TestEnvVarGuard {
    fn drop(&mut self) {
        for (key, value) in self.saved.drain(..).rev() {
            match value {
                Some(value) => std::env::set_var(&key, value),
                None => std::env::remove_var(&key),
            }
        }
    }
}

/// Run `f` with the config directory pointed at a fresh temp dir.
///
/// Holds a process-wide lock for the duration so tests that touch the
/// environment never interleave.
pub fn with_test_config_env<F, T>(f: F) -> T
where
    F: FnOnce(&Path) -> T,
{
    let _lock = ENV_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let temp_dir = TempDir::new().expect("temp config dir");
    let mut guard = TestEnvVarGuard::new();
    guard.set_var(CONFIG_DIR_ENV, temp_dir.path());
    f(temp_dir.path())
}
