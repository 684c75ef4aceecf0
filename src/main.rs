use std::process::ExitCode;

use clap::Parser;
use spoon::{
    color_enabled_stderr, display_for_error, exit_code_for_error, init_logging, log_error_stderr,
    set_color_mode, set_debug, Action, Cli, Options, EXIT_USAGE,
};

mod commands;

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Some(mode) = cli.color {
        set_color_mode(mode);
    }
    let use_err = color_enabled_stderr();

    let Some(action) = cli.action() else {
        log_error_stderr(
            use_err,
            "spoon: you either need to provide an action or an instance to connect to",
        );
        eprintln!("Run 'spoon --help' for usage.");
        return ExitCode::from(EXIT_USAGE);
    };

    init_logging(cli.debug);
    let opts = match Options::load(&cli) {
        Ok(o) => o,
        Err(e) => {
            log_error_stderr(use_err, &format!("spoon: {}", display_for_error(&e)));
            return ExitCode::from(exit_code_for_error(&e));
        }
    };
    if opts.debug != cli.debug {
        set_debug(opts.debug);
    }
    tracing::debug!("{opts:?}");

    let result = match &action {
        Action::List => commands::run_list(&opts),
        Action::ListImages => commands::run_list_images(&opts),
        Action::Build => commands::run_build(&opts),
        Action::Destroy(name) => commands::run_destroy(&opts, name),
        Action::Connect(name) => commands::run_connect(&opts, name),
    };
    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            log_error_stderr(use_err, &format!("spoon: {}", display_for_error(&e)));
            ExitCode::from(exit_code_for_error(&e))
        }
    }
}
