//! spoon: create and connect to per-developer pairing environments running as
//! Docker containers, reached over SSH.
//!
//! The binary resolves [`Options`], connects an [`engine::Engine`], and runs
//! exactly one action: list instances, list images, build the image, destroy
//! an instance, or connect to one (creating it on demand).

pub mod cli;
pub mod color;
pub mod config;
pub mod engine;
pub mod errors;
pub mod images;
pub mod instance;
pub mod logging;
pub mod probe;
pub mod ssh;
pub mod util;

pub use cli::{Action, Cli};
pub use color::{
    color_enabled_stderr, log_error_stderr, log_warn_stderr, paint, set_color_mode, ColorMode,
};
pub use config::{FileConfig, Options};
pub use engine::{DockerEngine, Engine, EngineEndpoint, MemoryEngine};
pub use errors::{
    display_for_error, exit_code_for_error, exit_code_for_io_error, exit_code_for_status,
    SpawnError, EXIT_USAGE,
};
pub use instance::{apply_prefix, remove_prefix};
pub use logging::{init_logging, set_debug};
pub use probe::{wait_for_port, ProbeState, WaitError, WaitOptions};
pub use ssh::SshTarget;
