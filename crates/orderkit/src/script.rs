//! Script order - runs a disposable shell script under the order's environment
//!
//! Execution steps:
//! 1. Override the environment with the context's variables (restored afterwards)
//! 2. Resolve the interpreter and the directory the script is written to
//! 3. Substitute `#shared[name]` placeholders with shared data
//! 4. Write the script with an interpreter line and run it, capturing
//!    stdout and stderr through a single pipe
//! 5. Delete the script unless scripts are kept for debugging

use crate::environment::{EnvGuard, Environment};
use crate::error::{Error, Result};
use crate::order::{Host, Orderer};
use crate::types::{Order, OrderContext, Report, SHARED_DATA_PREFIX, shared_key};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use uuid::Uuid;

/// Interpreter used when none is configured and `sh` is not on the search path
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Runs `source` as a shell script
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptOrder {
    pub order: Order,
    /// Directory the script is written to; the system temp dir if unset
    pub source_dir: Option<PathBuf>,
    /// Interpreter; `sh` from the search path if unset
    pub shell: Option<PathBuf>,
    pub source: String,
    /// Publish the script's output as shared data under this name
    pub output_var: Option<String>,
}

impl ScriptOrder {
    pub fn new(order: Order, source: impl Into<String>) -> Self {
        Self {
            order,
            source: source.into(),
            ..Default::default()
        }
    }

    pub fn with_shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = Some(shell.into());
        self
    }

    pub fn with_source_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.source_dir = Some(dir.into());
        self
    }

    pub fn with_output_var(mut self, name: impl Into<String>) -> Self {
        self.output_var = Some(name.into());
        self
    }

    /// Interpreter the script will be run with
    pub fn resolve_shell(&self) -> PathBuf {
        if let Some(shell) = &self.shell {
            return shell.clone();
        }

        which::which("sh").unwrap_or_else(|e| {
            log::debug!("sh not found on PATH ({e}), using {DEFAULT_SHELL}");
            PathBuf::from(DEFAULT_SHELL)
        })
    }

    /// Directory the script will be written to
    pub fn resolve_dir(&self) -> PathBuf {
        self.source_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    fn run_script(
        &self,
        context: &OrderContext,
        env: &dyn Environment,
        keep: bool,
        report: &mut Report,
    ) -> Result<()> {
        let shell = self.resolve_shell();
        let source = substitute_shared(&self.source, &context.data);
        let contents = format!("#! {}\n\n{}\n", shell.display(), source);

        let script = ScriptFile::create(&self.resolve_dir(), &contents, keep)?;
        log::debug!(
            "order {}: running {} with {}",
            self.order.id,
            script.path().display(),
            shell.display()
        );

        let mut command = Command::new(script.path());
        env.configure(&mut command);
        let status = capture_combined(command, script.path(), &mut report.output)?;
        log::debug!("order {} output:\n{}", self.order.id, report.output_str());

        if status.success() {
            Ok(())
        } else {
            Err(Error::ScriptFailed {
                path: script.path().to_path_buf(),
                status: status.to_string(),
                code: status.code(),
            })
        }
    }
}

impl Orderer for ScriptOrder {
    fn order(&self) -> &Order {
        &self.order
    }

    fn kind(&self) -> &'static str {
        "script"
    }

    fn execute(&self, context: &OrderContext, host: &mut Host<'_>) -> Report {
        let mut report = Report::default();
        let keep = host.options.keep_scripts;

        let mut guard = EnvGuard::new(&mut *host.env, host.options.restore);
        let result = guard
            .apply(&context.env_vars)
            .and_then(|()| self.run_script(context, guard.environment(), keep, &mut report));

        if let Err(e) = result {
            report.fail(e);
        }
        for e in guard.restore() {
            report.fail(e);
        }

        if let Some(name) = self.output_var.as_deref()
            && !name.is_empty()
            && report.is_success()
        {
            let value = report.output_str().trim_end().to_string();
            report.data.insert(shared_key(name), value);
        }

        report
    }
}

/// Replace every `#shared[name]` with the shared value published as `#data:name`
///
/// Data keys without the shared prefix are ignored and unknown placeholders
/// are left as written.
pub fn substitute_shared(source: &str, data: &BTreeMap<String, String>) -> String {
    let mut substituted = source.to_string();

    for (key, value) in data {
        if let Some(name) = key.strip_prefix(SHARED_DATA_PREFIX) {
            substituted = substituted.replace(&format!("#shared[{name}]"), value);
        }
    }

    substituted
}

/// Temporary executable script - removed on drop unless kept
#[derive(Debug)]
pub struct ScriptFile {
    path: PathBuf,
    keep: bool,
}

impl ScriptFile {
    /// Write `contents` to a uniquely named executable file in `dir`
    pub fn create(dir: &Path, contents: &str, keep: bool) -> Result<Self> {
        let path = dir.join(Uuid::new_v4().to_string());
        let write_error = |source| Error::ScriptWrite {
            path: path.clone(),
            source,
        };

        let mut file = open_executable(&path).map_err(write_error)?;
        let script = Self {
            path: path.clone(),
            keep,
        };
        file.write_all(contents.as_bytes()).map_err(write_error)?;
        file.sync_all().map_err(write_error)?;

        // The handle must be closed before the file can be executed
        drop(file);
        Ok(script)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScriptFile {
    fn drop(&mut self) {
        if self.keep {
            log::info!("keeping script {}", self.path.display());
            return;
        }

        if let Err(e) = fs::remove_file(&self.path) {
            log::warn!("failed to remove script {}: {e}", self.path.display());
        }
    }
}

#[cfg(unix)]
fn open_executable(path: &Path) -> io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;

    OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o744)
        .open(path)
}

#[cfg(not(unix))]
fn open_executable(path: &Path) -> io::Result<File> {
    OpenOptions::new().write(true).create_new(true).open(path)
}

/// Run `command` to completion with stdout and stderr sharing one pipe
///
/// Whatever was read is left in `output` even when waiting fails.
fn capture_combined(
    mut command: Command,
    path: &Path,
    output: &mut Vec<u8>,
) -> Result<ExitStatus> {
    let spawn_error = |source| Error::Spawn {
        path: path.to_path_buf(),
        source,
    };
    let capture_error = |source| Error::Capture {
        path: path.to_path_buf(),
        source,
    };

    let (mut reader, writer) = io::pipe().map_err(spawn_error)?;
    let stderr = writer.try_clone().map_err(spawn_error)?;
    command.stdin(Stdio::null()).stdout(writer).stderr(stderr);

    let mut child = command.spawn().map_err(spawn_error)?;
    // Release the parent's write ends so the read sees EOF when the child exits
    drop(command);

    let read = reader.read_to_end(output);
    let status = child.wait().map_err(capture_error)?;
    read.map_err(capture_error)?;

    Ok(status)
}
