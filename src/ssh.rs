//! SSH hand-off.
//!
//! Host-key checking is off unless `strict_host_keys` is set. Callers announce
//! every unchecked connection on stderr.

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

use anyhow::{Context, Result};
use which::which;

use crate::errors::SpawnError;
use crate::util::{run_foreground, shell_join};

/// Remote account every pairing image provides.
pub const SSH_USER: &str = "pairing";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub host: String,
    pub port: u16,
    pub command: Option<String>,
    pub strict_host_keys: bool,
}

impl SshTarget {
    /// Arguments after the `ssh` program name.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec!["-t".to_string()];
        if !self.strict_host_keys {
            args.push("-o".to_string());
            args.push("StrictHostKeyChecking=no".to_string());
        }
        args.push("-p".to_string());
        args.push(self.port.to_string());
        args.push(format!("{SSH_USER}@{}", self.host));
        if let Some(cmd) = self.command.as_deref().filter(|c| !c.trim().is_empty()) {
            args.push(cmd.to_string());
        }
        args
    }

    /// Printable command line, for debug output.
    pub fn command_line(&self) -> String {
        format!("ssh {}", shell_join(&self.args()))
    }
}

pub fn ssh_binary() -> Result<PathBuf, SpawnError> {
    which("ssh").map_err(|_| {
        SpawnError::new(
            "ssh",
            io::Error::new(
                io::ErrorKind::NotFound,
                "ssh is required but was not found in PATH",
            ),
        )
    })
}

/// Run ssh in the foreground with our terminal and wait for it to finish.
pub fn hand_off(target: &SshTarget) -> Result<ExitStatus> {
    let ssh = ssh_binary().context("cannot connect")?;
    tracing::debug!("exec: {}", target.command_line());
    run_foreground(&ssh, target.args()).context("failed to run ssh")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(command: Option<&str>, strict: bool) -> SshTarget {
        SshTarget {
            host: "docker.internal".to_string(),
            port: 49153,
            command: command.map(str::to_string),
            strict_host_keys: strict,
        }
    }

    #[test]
    fn test_args_default_disable_host_key_checking() {
        assert_eq!(
            target(None, false).args(),
            vec![
                "-t",
                "-o",
                "StrictHostKeyChecking=no",
                "-p",
                "49153",
                "pairing@docker.internal"
            ]
        );
    }

    #[test]
    fn test_args_with_command_and_strict_keys() {
        let args = target(Some("tmux attach -t main"), true).args();
        assert_eq!(
            args,
            vec!["-t", "-p", "49153", "pairing@docker.internal", "tmux attach -t main"]
        );
        assert!(!args.iter().any(|a| a.contains("StrictHostKeyChecking")));
    }

    #[test]
    fn test_blank_command_is_dropped() {
        assert_eq!(target(Some("  "), false).args().len(), 6);
    }

    #[test]
    fn test_command_line_quotes_remote_command() {
        assert_eq!(
            target(Some("ls -la"), true).command_line(),
            "ssh -t -p 49153 pairing@docker.internal 'ls -la'"
        );
    }
}
