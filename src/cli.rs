use std::path::PathBuf;

use clap::Parser;

use crate::color::ColorMode;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\ntarget: ",
    env!("SPOON_BUILD_TARGET"),
    "\nbuilt:  ",
    env!("SPOON_BUILD_DATE"),
);

#[derive(Parser, Debug, Default)]
#[command(
    name = "spoon",
    version,
    long_version = LONG_VERSION,
    about = "Create & connect to pairing environments in Docker",
    override_usage = "spoon [OPTIONS] [INSTANCE] [COMMAND]...",
    after_long_help = "Examples:\n  spoon alice\n  spoon alice 'tmux attach'\n  spoon --list\n  spoon --destroy alice\n  spoon --build --builddir ./pairing --image spoon-pairing\n"
)]
pub struct Cli {
    /// List available spoon instances
    #[arg(short = 'l', long)]
    pub list: bool,

    /// Destroy spoon instance with NAME
    #[arg(short = 'd', long, value_name = "NAME")]
    pub destroy: Option<String>,

    /// Build image from Dockerfile using name passed to --image
    #[arg(short = 'b', long)]
    pub build: bool,

    /// Directory containing Dockerfile
    #[arg(long, value_name = "DIR")]
    pub builddir: Option<PathBuf>,

    /// Command to run locally before building the image (repeatable)
    #[arg(long = "pre-build-commands", value_name = "CMD")]
    pub pre_build_commands: Vec<String>,

    /// Docker url to connect to
    #[arg(short = 'u', long, value_name = "URL")]
    pub url: Option<String>,

    /// List available spoon images
    #[arg(short = 'L', long = "list-images")]
    pub list_images: bool,

    /// Use image for spoon instance
    #[arg(short = 'i', long, value_name = "NAME")]
    pub image: Option<String>,

    /// Prefix for container names
    #[arg(short = 'p', long, value_name = "PREFIX")]
    pub prefix: Option<String>,

    /// Config file to use for spoon options
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable debug
    #[arg(long)]
    pub debug: bool,

    /// Give up waiting for the instance's SSH port after SECS seconds (default: wait forever)
    #[arg(long = "wait-timeout", value_name = "SECS")]
    pub wait_timeout: Option<u64>,

    /// Keep ssh host-key checking enabled when connecting
    #[arg(long = "strict-host-keys")]
    pub strict_host_keys: bool,

    /// Colorize output: auto|always|never
    #[arg(long = "color", value_enum)]
    pub color: Option<ColorMode>,

    /// Spoon instance to connect to
    pub instance: Option<String>,

    /// Command to run in the instance instead of a login shell
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

/// The single thing a spoon invocation does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    List,
    ListImages,
    Build,
    Destroy(String),
    Connect(String),
}

impl Cli {
    /// Pick the action, in the fixed precedence list > list-images > build > destroy > instance.
    pub fn action(&self) -> Option<Action> {
        if self.list {
            Some(Action::List)
        } else if self.list_images {
            Some(Action::ListImages)
        } else if self.build {
            Some(Action::Build)
        } else if let Some(name) = &self.destroy {
            Some(Action::Destroy(name.clone()))
        } else {
            self.instance.clone().map(Action::Connect)
        }
    }

    /// Remote command from the trailing words, None when absent.
    pub fn remote_command(&self) -> Option<String> {
        if self.command.is_empty() {
            None
        } else {
            Some(self.command.join(" "))
        }
    }
}
