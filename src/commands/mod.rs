//! One function per action. Each returns the process exit code or an error
//! for `main` to report.

use std::io::{self, Write};

use anyhow::Result;
use spoon::instance::{self, prepare_connect};
use spoon::probe::{wait_for_port, WaitOptions};
use spoon::{
    apply_prefix, color_enabled_stderr, exit_code_for_status, images, log_warn_stderr, ssh,
    DockerEngine, EngineEndpoint, Options, SshTarget,
};

pub fn run_list(opts: &Options) -> Result<u8> {
    let engine = DockerEngine::connect(&opts.url)?;
    let mut out = io::stdout().lock();
    instance::print_instances(&engine, &opts.prefix, &mut out)?;
    Ok(0)
}

pub fn run_list_images(opts: &Options) -> Result<u8> {
    let engine = DockerEngine::connect(&opts.url)?;
    let mut out = io::stdout().lock();
    images::list_images(&engine, &mut out)?;
    Ok(0)
}

pub fn run_build(opts: &Options) -> Result<u8> {
    let engine = DockerEngine::connect(&opts.url)?;
    let mut out = io::stdout().lock();
    images::build_image(&engine, opts, &mut out)?;
    Ok(0)
}

pub fn run_destroy(opts: &Options, instance_name: &str) -> Result<u8> {
    let engine = DockerEngine::connect(&opts.url)?;
    let name = apply_prefix(&opts.prefix, instance_name);
    let mut out = io::stdout().lock();
    instance::destroy(&engine, &name, &mut out)?;
    Ok(0)
}

pub fn run_connect(opts: &Options, instance_name: &str) -> Result<u8> {
    let endpoint = EngineEndpoint::parse(&opts.url)?;
    let engine = DockerEngine::connect(&opts.url)?;
    let name = apply_prefix(&opts.prefix, instance_name);

    let mut out = io::stdout().lock();
    let Some(ep) = prepare_connect(&engine, opts, &name, &mut out)? else {
        return Ok(0);
    };

    let host = endpoint.ssh_host().to_string();
    let wait = WaitOptions::default().with_deadline(opts.wait_timeout);
    wait_for_port(&host, ep.port, &wait, || {
        let _ = writeln!(out, "Waiting for {}:{}...", ep.name, ep.port);
        let _ = out.flush();
    })?;

    if !opts.strict_host_keys {
        log_warn_stderr(
            color_enabled_stderr(),
            &format!(
                "spoon: host-key checking is disabled for {host}:{} (pass --strict-host-keys to enable)",
                ep.port
            ),
        );
    }
    out.flush()?;
    drop(out);

    let target = SshTarget {
        host,
        port: ep.port,
        command: Some(opts.command.clone()),
        strict_host_keys: opts.strict_host_keys,
    };
    let status = ssh::hand_off(&target)?;
    Ok(exit_code_for_status(&status))
}
