#![allow(clippy::module_name_repetitions)]
//! Container engine seam.
//!
//! Actions talk to the engine through the synchronous [`Engine`] trait. The
//! production implementation is [`DockerEngine`] (Docker remote API via
//! bollard); [`MemoryEngine`] records calls for tests.

pub mod context;
pub mod docker;
pub mod memory;

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use url::Url;

pub use docker::DockerEngine;
pub use memory::MemoryEngine;

/// Container port -> published host ports, e.g. "22/tcp" -> ["49153"].
pub type PortMap = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImageRecord {
    pub repo_tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContainerRecord {
    pub id: String,
    /// Names as the engine reports them, usually with a leading '/'.
    pub names: Vec<String>,
    pub running: bool,
}

impl ContainerRecord {
    /// First name without the engine's leading '/'.
    pub fn name(&self) -> &str {
        self.names
            .first()
            .map(|n| n.strip_prefix('/').unwrap_or(n))
            .unwrap_or("")
    }
}

/// What to create. Ports exposed by the image are published to ephemeral host ports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub hostname: String,
    pub entrypoint: Vec<String>,
    pub publish_all_ports: bool,
}

/// Callback receiving each build-log record as a JSON object, fields in the
/// order the daemon emits them.
pub type BuildLogSink<'a> = dyn FnMut(&serde_json::Value) -> Result<()> + 'a;

pub trait Engine {
    fn list_images(&self) -> Result<Vec<ImageRecord>>;

    /// Build `context` (a tar archive holding a Dockerfile) and tag the result.
    ///
    /// A daemon-reported build failure is first passed to `on_record` as an
    /// `{"error": ...}` record, then returned as the error.
    fn build_image(&self, tag: &str, context: Vec<u8>, on_record: &mut BuildLogSink<'_>)
        -> Result<()>;

    /// All containers, stopped ones included.
    fn list_containers(&self) -> Result<Vec<ContainerRecord>>;

    /// Create a container; returns its id.
    fn create_container(&self, spec: &ContainerSpec) -> Result<String>;

    fn start_container(&self, id: &str) -> Result<()>;

    fn kill_container(&self, id: &str) -> Result<()>;

    /// Block until the container stops or `timeout` elapses (error).
    fn wait_container(&self, id: &str, timeout: Duration) -> Result<()>;

    /// Force-remove.
    fn remove_container(&self, id: &str) -> Result<()>;

    fn port_bindings(&self, id: &str) -> Result<PortMap>;
}

/// Where the engine listens, parsed from the configured URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEndpoint {
    Unix(String),
    Http { host: String, port: u16 },
    Https { host: String, port: u16 },
}

impl EngineEndpoint {
    pub fn parse(raw: &str) -> Result<Self> {
        let url = Url::parse(raw.trim()).with_context(|| format!("invalid engine url: {raw}"))?;
        match url.scheme() {
            "unix" => {
                let path = url.path();
                if path.is_empty() || path == "/" {
                    bail!("engine url {raw} has no socket path");
                }
                Ok(EngineEndpoint::Unix(path.to_string()))
            }
            "tcp" | "http" => Ok(EngineEndpoint::Http {
                host: host_of(&url, raw)?,
                port: url.port().unwrap_or(2375),
            }),
            "https" => Ok(EngineEndpoint::Https {
                host: host_of(&url, raw)?,
                port: url.port().unwrap_or(2376),
            }),
            other => bail!("unsupported engine url scheme '{other}' in {raw}"),
        }
    }

    /// `host:port` for TCP endpoints (IPv6 hosts keep their brackets), the
    /// socket path for unix ones.
    pub fn address(&self) -> String {
        match self {
            EngineEndpoint::Unix(path) => path.clone(),
            EngineEndpoint::Http { host, port } | EngineEndpoint::Https { host, port } => {
                format!("{host}:{port}")
            }
        }
    }

    /// Host that published container ports are reachable on.
    pub fn ssh_host(&self) -> &str {
        match self {
            EngineEndpoint::Unix(_) => "localhost",
            EngineEndpoint::Http { host, .. } | EngineEndpoint::Https { host, .. } => {
                host.trim_start_matches('[').trim_end_matches(']')
            }
        }
    }
}

/// Host as written in the url; IPv6 literals stay bracketed.
fn host_of(url: &Url, raw: &str) -> Result<String> {
    match url.host_str() {
        Some(h) if !h.is_empty() => Ok(h.to_string()),
        _ => bail!("engine url {raw} has no host"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unix_socket() {
        let ep = EngineEndpoint::parse("unix:///var/run/docker.sock").unwrap();
        assert_eq!(ep, EngineEndpoint::Unix("/var/run/docker.sock".to_string()));
        assert_eq!(ep.ssh_host(), "localhost");
    }

    #[test]
    fn test_parse_tcp_and_http_default_ports() {
        assert_eq!(
            EngineEndpoint::parse("tcp://docker.internal").unwrap(),
            EngineEndpoint::Http {
                host: "docker.internal".to_string(),
                port: 2375
            }
        );
        let ep = EngineEndpoint::parse("http://10.0.0.5:4243").unwrap();
        assert_eq!(ep.ssh_host(), "10.0.0.5");
        assert_eq!(
            EngineEndpoint::parse("https://dock:9999").unwrap(),
            EngineEndpoint::Https {
                host: "dock".to_string(),
                port: 9999
            }
        );
    }

    #[test]
    fn test_ipv6_host_keeps_brackets_for_engine_address() {
        let ep = EngineEndpoint::parse("tcp://[::1]:2375").unwrap();
        assert_eq!(
            ep,
            EngineEndpoint::Http {
                host: "[::1]".to_string(),
                port: 2375
            }
        );
        assert_eq!(ep.address(), "[::1]:2375");
        assert_eq!(ep.ssh_host(), "::1");
        assert_eq!(
            EngineEndpoint::parse("https://[fd00::5]").unwrap().address(),
            "[fd00::5]:2376"
        );
        assert_eq!(
            EngineEndpoint::parse("unix:///run/docker.sock").unwrap().address(),
            "/run/docker.sock"
        );
    }

    #[test]
    fn test_parse_rejects_unknown_scheme() {
        let err = EngineEndpoint::parse("ftp://host").unwrap_err();
        assert!(err.to_string().contains("unsupported engine url scheme"));
        assert!(EngineEndpoint::parse("not a url").is_err());
    }

    #[test]
    fn test_container_name_strips_slash() {
        let c = ContainerRecord {
            names: vec!["/spoon-alice".to_string()],
            ..Default::default()
        };
        assert_eq!(c.name(), "spoon-alice");
        assert_eq!(ContainerRecord::default().name(), "");
    }
}
