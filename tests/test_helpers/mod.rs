//! Scoped environment overrides for integration tests.

use std::env;
use std::ffi::OsStr;
use std::sync::{Mutex, MutexGuard, OnceLock};

static ENV_MUTEX: OnceLock<Mutex<()>> = OnceLock::new();

/// Guard that sets or clears one environment variable and restores the
/// previous value on drop.
pub struct EnvVarGuard {
    key: &'static str,
    previous: Option<std::ffi::OsString>,
    _lock: MutexGuard<'static, ()>,
}

impl EnvVarGuard {
    /// Sets `key` to `value` for the guard lifetime.
    pub fn set(key: &'static str, value: impl AsRef<OsStr>) -> Self {
        Self::apply(key, Some(value.as_ref()))
    }

    /// Removes `key` for the guard lifetime.
    pub fn remove(key: &'static str) -> Self {
        Self::apply(key, None)
    }

    fn apply(key: &'static str, value: Option<&OsStr>) -> Self {
        let lock = env_lock();
        let previous = env::var_os(key);
        unsafe {
            // SAFETY: the global mutex serializes environment mutations in tests.
            match value {
                Some(new_value) => env::set_var(key, new_value),
                None => env::remove_var(key),
            }
        }
        Self {
            key,
            previous,
            _lock: lock,
        }
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        unsafe {
            // SAFETY: the global mutex serializes environment mutations in tests.
            match self.previous.take() {
                Some(previous) => env::set_var(self.key, previous),
                None => env::remove_var(self.key),
            }
        }
    }
}

fn env_lock() -> MutexGuard<'static, ()> {
    ENV_MUTEX
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
