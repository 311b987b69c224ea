//! Process environment provider and scoped overrides
//!
//! Orders never touch `std::env` directly. The engine is handed an
//! [`Environment`] and threads it through every execution, so a run can
//! target the real process environment or an isolated in-memory one.

use crate::error::{Error, Result};
use crate::types::RestorePolicy;
use std::collections::BTreeMap;
use std::process::Command;

/// Provider for environment variable reads and writes
pub trait Environment {
    /// Current value of a variable, `None` if unset
    fn var(&self, key: &str) -> Option<String>;

    /// Set a variable
    fn set_var(&mut self, key: &str, value: &str) -> Result<()>;

    /// Unset a variable
    fn remove_var(&mut self, key: &str) -> Result<()>;

    /// Prepare a child command so it observes this environment
    ///
    /// Children inherit the real process environment on their own, so the
    /// default does nothing.
    fn configure(&self, _command: &mut Command) {}
}

/// Check that a variable can be held by a process environment
pub fn validate_var(key: &str, value: &str) -> Result<()> {
    let reason = if key.is_empty() {
        "key is empty"
    } else if key.contains('=') {
        "key contains '='"
    } else if key.contains('\0') {
        "key contains NUL"
    } else if value.contains('\0') {
        "value contains NUL"
    } else {
        return Ok(());
    };

    Err(Error::InvalidEnvVar {
        key: key.to_string(),
        reason,
    })
}

/// The real environment of the current process
///
/// # Thread safety
/// Writes go through `std::env::set_var`/`remove_var`, which are unsound if
/// any other thread reads or writes the environment at the same time. That
/// includes libc calls such as `getenv` made by other libraries. Only hand a
/// `SystemEnvironment` to a run while no other thread touches the process
/// environment; embedders running background threads should use
/// [`MemoryEnvironment`] instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemEnvironment;

impl Environment for SystemEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var_os(key).map(|v| v.to_string_lossy().into_owned())
    }

    fn set_var(&mut self, key: &str, value: &str) -> Result<()> {
        validate_var(key, value)?;
        // SAFETY: callers uphold the single-threaded contract documented on
        // SystemEnvironment; the engine itself never writes from two threads
        unsafe { std::env::set_var(key, value) };
        Ok(())
    }

    fn remove_var(&mut self, key: &str) -> Result<()> {
        validate_var(key, "")?;
        // SAFETY: see set_var
        unsafe { std::env::remove_var(key) };
        Ok(())
    }
}

/// An isolated environment held in memory
///
/// Spawned children get these variables layered over the inherited
/// process environment.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemoryEnvironment {
    vars: BTreeMap<String, String>,
}

impl MemoryEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style variable insertion
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }
}

impl Environment for MemoryEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }

    fn set_var(&mut self, key: &str, value: &str) -> Result<()> {
        validate_var(key, value)?;
        self.vars.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_var(&mut self, key: &str) -> Result<()> {
        validate_var(key, "")?;
        self.vars.remove(key);
        Ok(())
    }

    fn configure(&self, command: &mut Command) {
        command.envs(&self.vars);
    }
}

/// Scoped environment override - restores snapshotted variables on drop
///
/// Call [`EnvGuard::restore`] to collect restoration errors; dropping the
/// guard without it still restores, logging any failure.
pub struct EnvGuard<'e> {
    env: &'e mut dyn Environment,
    saved: Vec<(String, Option<String>)>,
    policy: RestorePolicy,
    restored: bool,
}

impl<'e> EnvGuard<'e> {
    pub fn new(env: &'e mut dyn Environment, policy: RestorePolicy) -> Self {
        Self {
            env,
            saved: Vec::new(),
            policy,
            restored: false,
        }
    }

    /// Validate every variable in `vars`, then snapshot and set each one
    ///
    /// An invalid variable fails the call before anything is touched. Only
    /// keys that were snapshotted are restored.
    pub fn apply(&mut self, vars: &BTreeMap<String, String>) -> Result<()> {
        for (key, value) in vars {
            validate_var(key, value)?;
        }

        for (key, value) in vars {
            if !self.saved.iter().any(|(saved, _)| saved == key) {
                let original = self.env.var(key);
                self.saved.push((key.clone(), original));
            }
            self.env.set_var(key, value)?;
        }

        Ok(())
    }

    /// The environment as currently overridden
    pub fn environment(&self) -> &dyn Environment {
        &*self.env
    }

    /// Put snapshotted variables back, returning any failures
    pub fn restore(mut self) -> Vec<Error> {
        self.restore_saved()
    }

    fn restore_saved(&mut self) -> Vec<Error> {
        self.restored = true;
        let mut errors = Vec::new();

        for (key, original) in self.saved.drain(..) {
            let result = match (self.policy, original) {
                (_, Some(value)) if !value.is_empty() => self.env.set_var(&key, &value),
                (RestorePolicy::Exact, Some(value)) => self.env.set_var(&key, &value),
                (RestorePolicy::Exact, None) => self.env.remove_var(&key),
                // Unset and empty originals keep the injected value
                (RestorePolicy::Legacy, _) => Ok(()),
            };

            if let Err(source) = result {
                errors.push(Error::RestoreFailed {
                    key,
                    source: Box::new(source),
                });
            }
        }

        errors
    }
}

impl Drop for EnvGuard<'_> {
    fn drop(&mut self) {
        if !self.restored {
            for error in self.restore_saved() {
                log::warn!("{error}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_validate_var() {
        assert!(validate_var("PATH", "/bin").is_ok());
        assert!(validate_var("EMPTY_OK", "").is_ok());
        assert!(validate_var("", "x").is_err());
        assert!(validate_var("A=B", "x").is_err());
        assert!(validate_var("A\0", "x").is_err());
        assert!(validate_var("A", "x\0y").is_err());
    }

    #[test]
    fn test_guard_exact_restores_and_removes() {
        let mut env = MemoryEnvironment::new().with_var("FOO", "old");

        let mut guard = EnvGuard::new(&mut env, RestorePolicy::Exact);
        guard.apply(&vars(&[("FOO", "bar"), ("NEW", "1")])).unwrap();
        assert_eq!(guard.environment().var("FOO").as_deref(), Some("bar"));
        assert_eq!(guard.environment().var("NEW").as_deref(), Some("1"));
        assert!(guard.restore().is_empty());

        assert_eq!(env.var("FOO").as_deref(), Some("old"));
        assert_eq!(env.var("NEW"), None);
    }

    #[test]
    fn test_guard_exact_keeps_empty_values_distinct() {
        let mut env = MemoryEnvironment::new().with_var("BLANK", "");

        let mut guard = EnvGuard::new(&mut env, RestorePolicy::Exact);
        guard.apply(&vars(&[("BLANK", "filled")])).unwrap();
        drop(guard);

        assert_eq!(env.var("BLANK").as_deref(), Some(""));
    }

    #[test]
    fn test_guard_legacy_leaves_unset_keys_set() {
        let mut env = MemoryEnvironment::new().with_var("FOO", "old");

        let mut guard = EnvGuard::new(&mut env, RestorePolicy::Legacy);
        guard.apply(&vars(&[("FOO", "bar"), ("NEW", "1")])).unwrap();
        assert!(guard.restore().is_empty());

        assert_eq!(env.var("FOO").as_deref(), Some("old"));
        assert_eq!(env.var("NEW").as_deref(), Some("1"));
    }

    #[test]
    fn test_guard_invalid_variable_touches_nothing() {
        let mut env = MemoryEnvironment::new().with_var("A_GOOD", "before");

        let mut guard = EnvGuard::new(&mut env, RestorePolicy::Exact);
        let err = guard
            .apply(&vars(&[("A_GOOD", "after"), ("Z=BAD", "x")]))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidEnvVar { .. }));
        assert_eq!(guard.environment().var("A_GOOD").as_deref(), Some("before"));
        assert!(guard.restore().is_empty());

        assert_eq!(env.var("A_GOOD").as_deref(), Some("before"));
        assert_eq!(env.vars().len(), 1);
    }

    #[test]
    fn test_guard_restores_on_drop_after_later_apply_fails() {
        let mut env = MemoryEnvironment::new().with_var("FIRST", "before");

        {
            let mut guard = EnvGuard::new(&mut env, RestorePolicy::Exact);
            guard.apply(&vars(&[("FIRST", "after")])).unwrap();
            assert!(guard.apply(&vars(&[("=", "x")])).is_err());
            assert_eq!(guard.environment().var("FIRST").as_deref(), Some("after"));
        }

        assert_eq!(env.var("FIRST").as_deref(), Some("before"));
    }

    #[test]
    fn test_memory_environment_configures_child() {
        let env = MemoryEnvironment::new().with_var("ORDERKIT_CHILD", "yes");
        let mut command = Command::new("true");
        env.configure(&mut command);

        let configured: Vec<_> = command.get_envs().collect();
        assert_eq!(configured.len(), 1);
        assert_eq!(configured[0].0, "ORDERKIT_CHILD");
    }

    #[test]
    #[serial]
    fn test_system_environment_round_trip() {
        let mut env = SystemEnvironment;
        let key = "ORDERKIT_SYSTEM_ENV_TEST";

        env.set_var(key, "value").unwrap();
        assert_eq!(env.var(key).as_deref(), Some("value"));
        assert_eq!(std::env::var(key).as_deref(), Ok("value"));

        env.remove_var(key).unwrap();
        assert_eq!(env.var(key), None);
        assert!(env.set_var("", "x").is_err());
    }
}
