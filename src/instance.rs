#![allow(clippy::module_name_repetitions)]
//! Instance lifecycle: every pairing environment is one container named
//! `<prefix><instance>`, always looked up fresh by exact name.

use std::io::Write;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::config::Options;
use crate::engine::{ContainerRecord, ContainerSpec, Engine};

pub const SSH_PORT: &str = "22/tcp";
pub const ENTRYPOINT: &str = "runit";
/// Upper bound on waiting for a killed container to stop.
pub const DESTROY_WAIT: Duration = Duration::from_secs(10);

pub fn apply_prefix(prefix: &str, name: &str) -> String {
    format!("{prefix}{name}")
}

/// Drop the engine's leading '/' and then `prefix`, once.
pub fn remove_prefix<'a>(prefix: &str, name: &'a str) -> &'a str {
    let name = name.strip_prefix('/').unwrap_or(name);
    name.strip_prefix(prefix).unwrap_or(name)
}

/// Instance names (prefix removed) of every container carrying `prefix`.
pub fn list_instances(engine: &dyn Engine, prefix: &str) -> Result<Vec<String>> {
    Ok(engine
        .list_containers()?
        .iter()
        .map(ContainerRecord::name)
        .filter(|n| n.starts_with(prefix))
        .map(|n| remove_prefix(prefix, n).to_string())
        .collect())
}

pub fn print_instances(engine: &dyn Engine, prefix: &str, out: &mut dyn Write) -> Result<()> {
    let names = list_instances(engine, prefix)?;
    writeln!(out, "List of available spoon containers:")?;
    for name in names {
        writeln!(out, "{name}")?;
    }
    Ok(())
}

/// Exact-name lookup across all containers.
pub fn get_container(engine: &dyn Engine, name: &str) -> Result<Option<ContainerRecord>> {
    Ok(engine
        .list_containers()?
        .into_iter()
        .find(|c| c.name() == name))
}

/// Create `name` from `image` and start it. Returns the container id.
pub fn create_and_start(
    engine: &dyn Engine,
    name: &str,
    prefix: &str,
    image: &str,
) -> Result<String> {
    let spec = ContainerSpec {
        name: name.to_string(),
        image: image.to_string(),
        hostname: remove_prefix(prefix, name).to_string(),
        entrypoint: vec![ENTRYPOINT.to_string()],
        publish_all_ports: true,
    };
    let id = engine.create_container(&spec)?;
    engine.start_container(&id)?;
    Ok(id)
}

/// Best-effort teardown. Only the initial lookup can fail the call; kill,
/// wait and remove failures are reported and the next step still runs.
/// Returns false when no container has that name.
pub fn destroy(engine: &dyn Engine, name: &str, out: &mut dyn Write) -> Result<bool> {
    let Some(container) = get_container(engine, name)? else {
        writeln!(out, "No container named: {name}")?;
        return Ok(false);
    };

    writeln!(out, "Destroying {name}")?;
    if let Err(e) = engine.kill_container(&container.id) {
        tracing::warn!("kill {}: {e:#}", container.id);
        writeln!(out, "Failed to kill container {}", container.id)?;
    }
    if let Err(e) = engine.wait_container(&container.id, DESTROY_WAIT) {
        tracing::warn!("wait {}: {e:#}", container.id);
    }
    if let Err(e) = engine.remove_container(&container.id) {
        tracing::warn!("remove {}: {e:#}", container.id);
        writeln!(out, "Failed to remove container {}", container.id)?;
    }
    writeln!(out, "Done!")?;
    Ok(true)
}

/// First host port published for `container_port` (e.g. "22/tcp").
pub fn host_port(
    engine: &dyn Engine,
    container: &ContainerRecord,
    container_port: &str,
) -> Result<u16> {
    let ports = engine.port_bindings(&container.id)?;
    let raw = ports
        .get(container_port)
        .and_then(|bindings| bindings.first())
        .ok_or_else(|| {
            anyhow!(
                "container {} does not publish {container_port}",
                container.name()
            )
        })?;
    raw.parse::<u16>()
        .with_context(|| format!("invalid host port '{raw}' for {container_port}"))
}

/// Where to point ssh once the instance is up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub name: String,
    pub port: u16,
}

/// Make sure `name` exists and runs, then resolve its published SSH port.
/// Returns None (after telling the user) when the container vanished.
pub fn prepare_connect(
    engine: &dyn Engine,
    opts: &Options,
    name: &str,
    out: &mut dyn Write,
) -> Result<Option<Endpoint>> {
    match get_container(engine, name)? {
        None => {
            writeln!(out, "The `{name}` container doesn't exist, creating...")?;
            create_and_start(engine, name, &opts.prefix, &opts.image)?;
        }
        Some(c) if !c.running => {
            writeln!(out, "Starting `{name}`")?;
            engine.start_container(&c.id)?;
        }
        Some(_) => {}
    }

    writeln!(out, "Connecting to `{name}`")?;
    let Some(container) = get_container(engine, name)? else {
        writeln!(out, "No container named: {name}")?;
        return Ok(None);
    };
    let port = host_port(engine, &container, SSH_PORT)?;
    Ok(Some(Endpoint {
        name: name.to_string(),
        port,
    }))
}
