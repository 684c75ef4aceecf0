#![allow(clippy::module_name_repetitions)]
//! Option resolution: built-in defaults, environment, YAML config file, CLI flags.
//!
//! The config file is plain YAML (default `~/.spoonrc`) using the same option
//! names as the long CLI flags:
//!
//! ```yaml
//! url: tcp://docker.internal:2375
//! image: spoon-pairing
//! prefix: spoon-
//! builddir: ./pairing
//! pre-build-commands:
//!   - make assets
//! wait-timeout: 120
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::cli::Cli;

pub const DEFAULT_URL: &str = "unix:///var/run/docker.sock";
pub const DEFAULT_IMAGE: &str = "spoon-pairing";
pub const DEFAULT_PREFIX: &str = "spoon-";
pub const CONFIG_FILE_NAME: &str = ".spoonrc";

/// On-disk configuration. Every key is optional and overrides the built-in default.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    pub url: Option<String>,
    pub image: Option<String>,
    pub prefix: Option<String>,
    pub builddir: Option<PathBuf>,
    pub pre_build_commands: Option<Vec<String>>,
    pub command: Option<String>,
    pub debug: Option<bool>,
    pub wait_timeout: Option<u64>,
    pub strict_host_keys: Option<bool>,
}

impl FileConfig {
    pub fn parse(text: &str) -> Result<Self> {
        // An empty file is a valid, empty config.
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).context("invalid config file")
    }
}

/// Resolved options for one invocation. Built once, then only read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub url: String,
    pub image: String,
    pub prefix: String,
    pub builddir: PathBuf,
    pub pre_build_commands: Vec<String>,
    pub command: String,
    pub debug: bool,
    pub wait_timeout: Option<Duration>,
    pub strict_host_keys: bool,
    pub config: Option<PathBuf>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            image: DEFAULT_IMAGE.to_string(),
            prefix: DEFAULT_PREFIX.to_string(),
            builddir: PathBuf::from("."),
            pre_build_commands: Vec::new(),
            command: String::new(),
            debug: false,
            wait_timeout: None,
            strict_host_keys: false,
            config: None,
        }
    }
}

impl Options {
    /// Resolve options for `cli`, reading the config file from disk.
    pub fn load(cli: &Cli) -> Result<Self> {
        let (path, explicit) = match &cli.config {
            Some(p) => (Some(p.clone()), true),
            None => (default_config_path(), false),
        };
        let file = match &path {
            Some(p) => read_config_file(p, explicit)?,
            None => None,
        };
        let mut opts = Self::resolve(cli, file.as_ref(), engine_url_from_env());
        if file.is_some() {
            opts.config = path;
        }
        Ok(opts)
    }

    /// Layer defaults < env url < config file < CLI flags.
    pub fn resolve(cli: &Cli, file: Option<&FileConfig>, env_url: Option<String>) -> Self {
        let mut opts = Self::default();
        if let Some(url) = env_url {
            opts.url = url;
        }

        if let Some(f) = file {
            if let Some(v) = &f.url {
                opts.url = v.clone();
            }
            if let Some(v) = &f.image {
                opts.image = v.clone();
            }
            if let Some(v) = &f.prefix {
                opts.prefix = v.clone();
            }
            if let Some(v) = &f.builddir {
                opts.builddir = v.clone();
            }
            if let Some(v) = &f.pre_build_commands {
                opts.pre_build_commands = v.clone();
            }
            if let Some(v) = &f.command {
                opts.command = v.clone();
            }
            if let Some(v) = f.debug {
                opts.debug = v;
            }
            if let Some(secs) = f.wait_timeout {
                opts.wait_timeout = Some(Duration::from_secs(secs));
            }
            if let Some(v) = f.strict_host_keys {
                opts.strict_host_keys = v;
            }
        }

        if let Some(v) = &cli.url {
            opts.url = v.clone();
        }
        if let Some(v) = &cli.image {
            opts.image = v.clone();
        }
        if let Some(v) = &cli.prefix {
            opts.prefix = v.clone();
        }
        if let Some(v) = &cli.builddir {
            opts.builddir = v.clone();
        }
        if !cli.pre_build_commands.is_empty() {
            opts.pre_build_commands = cli.pre_build_commands.clone();
        }
        if let Some(cmd) = cli.remote_command() {
            opts.command = cmd;
        }
        // Flags can only switch these on.
        opts.debug |= cli.debug;
        opts.strict_host_keys |= cli.strict_host_keys;
        if let Some(secs) = cli.wait_timeout {
            opts.wait_timeout = Some(Duration::from_secs(secs));
        }
        opts.config = cli.config.clone();
        opts
    }
}

/// `~/.spoonrc`, or None when no home directory can be determined.
pub fn default_config_path() -> Option<PathBuf> {
    home::home_dir().map(|h| h.join(CONFIG_FILE_NAME))
}

/// Engine URL from DOCKER_URL, then DOCKER_HOST; empty values are ignored.
pub fn engine_url_from_env() -> Option<String> {
    ["DOCKER_URL", "DOCKER_HOST"]
        .iter()
        .filter_map(|k| env::var(k).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

fn read_config_file(path: &Path, explicit: bool) -> Result<Option<FileConfig>> {
    if !explicit && !path.exists() {
        tracing::debug!("no config file at {}", path.display());
        return Ok(None);
    }
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let cfg = FileConfig::parse(&text).with_context(|| format!("in {}", path.display()))?;
    Ok(Some(cfg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["spoon"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).expect("parse")
    }

    #[test]
    fn test_defaults_without_file_or_env() {
        let opts = Options::resolve(&cli(&[]), None, None);
        assert_eq!(opts, Options::default());
        assert_eq!(opts.prefix, "spoon-");
        assert_eq!(opts.image, "spoon-pairing");
        assert_eq!(opts.url, DEFAULT_URL);
        assert!(opts.wait_timeout.is_none());
    }

    #[test]
    fn test_precedence_env_file_cli() {
        let file = FileConfig::parse("url: tcp://file:2375\nimage: from-file\nprefix: pair-\n")
            .expect("yaml");
        let opts = Options::resolve(
            &cli(&["-i", "from-cli"]),
            Some(&file),
            Some("tcp://env:2375".to_string()),
        );
        assert_eq!(opts.url, "tcp://file:2375");
        assert_eq!(opts.image, "from-cli");
        assert_eq!(opts.prefix, "pair-");

        let only_env = Options::resolve(&cli(&[]), None, Some("tcp://env:2375".to_string()));
        assert_eq!(only_env.url, "tcp://env:2375");
    }

    #[test]
    fn test_file_keys_are_kebab_case() {
        let file = FileConfig::parse(
            "pre-build-commands:\n  - make\n  - make test\nwait-timeout: 30\nstrict-host-keys: true\ndebug: true\n",
        )
        .expect("yaml");
        let opts = Options::resolve(&cli(&[]), Some(&file), None);
        assert_eq!(opts.pre_build_commands, vec!["make", "make test"]);
        assert_eq!(opts.wait_timeout, Some(Duration::from_secs(30)));
        assert!(opts.strict_host_keys);
        assert!(opts.debug);
    }

    #[test]
    fn test_cli_pre_build_commands_replace_file_list() {
        let file = FileConfig::parse("pre-build-commands: [a, b]\n").expect("yaml");
        let opts = Options::resolve(
            &cli(&["--pre-build-commands", "c"]),
            Some(&file),
            None,
        );
        assert_eq!(opts.pre_build_commands, vec!["c"]);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let err = FileConfig::parse("imgae: typo\n").unwrap_err();
        assert!(format!("{err:#}").contains("imgae"), "{err:#}");
    }

    #[test]
    fn test_ruby_style_config_is_not_evaluated() {
        // Old executable configs are not YAML mappings and must not be accepted.
        assert!(FileConfig::parse("options[:url] = 'tcp://x:2375'\n").is_err());
    }

    #[test]
    fn test_empty_file_is_empty_config() {
        assert_eq!(FileConfig::parse("  \n").unwrap(), FileConfig::default());
    }

    #[test]
    fn test_missing_explicit_config_fails() {
        let td = tempfile::tempdir().expect("tmpdir");
        let missing = td.path().join("nope.yml");
        let err = read_config_file(&missing, true).unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
        assert!(read_config_file(&missing, false).unwrap().is_none());
    }
}
