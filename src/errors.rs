//! Error mapping guide:
//! - A program that could not be started ([`SpawnError`]) maps by its io kind:
//!   127 for NotFound, 1 otherwise.
//! - Every other error maps to 1, io errors from files included.
//! - Child processes handed the terminal (ssh) pass their own status through.
use std::fmt;
use std::io;
use std::process::ExitStatus;

/// Exit code for command-line usage errors (no action, bad flag combination).
pub const EXIT_USAGE: u8 = 64;

/// Map an io::Error to a process exit code:
/// - 127 for NotFound (command not found)
/// - 1 for all other errors
pub fn exit_code_for_io_error(e: &io::Error) -> u8 {
    if e.kind() == io::ErrorKind::NotFound {
        127
    } else {
        1
    }
}

/// A local program could not be located or started.
#[derive(Debug)]
pub struct SpawnError {
    pub program: String,
    pub source: io::Error,
}

impl SpawnError {
    pub fn new(program: impl Into<String>, source: io::Error) -> Self {
        Self {
            program: program.into(),
            source,
        }
    }
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot start {}", self.program)
    }
}

impl std::error::Error for SpawnError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Map a [`SpawnError`] anywhere in the chain; anything else is 1.
pub fn exit_code_for_error(e: &anyhow::Error) -> u8 {
    e.chain()
        .find_map(|cause| cause.downcast_ref::<SpawnError>())
        .map(|spawn| exit_code_for_io_error(&spawn.source))
        .unwrap_or(1)
}

/// Render the full context chain on one line: "outer: inner: root".
pub fn display_for_error(e: &anyhow::Error) -> String {
    e.chain()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(": ")
}

/// Translate a child's exit status into our own exit code.
/// Signals map to 128 + signo on unix, like a shell would report them.
pub fn exit_code_for_status(status: &ExitStatus) -> u8 {
    if let Some(code) = status.code() {
        return (code & 0xff) as u8;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(sig) = status.signal() {
            return (128 + (sig & 0x7f)) as u8;
        }
    }
    1
}
