//! Foreground child processes: the child shares our stdin, stdout and stderr
//! and we block until it exits.

use std::ffi::OsStr;
use std::process::{Command, ExitStatus};

use anyhow::{Context, Result};

use crate::errors::SpawnError;

/// Run `program` with `args` in the foreground and return its exit status.
/// A program that cannot be started fails with [`SpawnError`].
pub fn run_foreground<I, S>(program: impl AsRef<OsStr>, args: I) -> Result<ExitStatus>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let program = program.as_ref();
    let name = program.to_string_lossy().into_owned();
    let mut child = Command::new(program)
        .args(args)
        .spawn()
        .map_err(|e| SpawnError::new(name.clone(), e))?;
    child
        .wait()
        .with_context(|| format!("failed to wait for {name}"))
}

/// `sh -c <script>`.
pub fn run_shell(script: &str) -> Result<ExitStatus> {
    run_foreground("sh", ["-c", script])
}
