#![allow(clippy::module_name_repetitions)]
//! Docker remote API client.
//!
//! Synchronous wrapper around bollard's async API: every call is driven to
//! completion on a private current-thread tokio runtime.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, KillContainerOptions,
    ListContainersOptions, RemoveContainerOptions, StartContainerOptions, WaitContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::image::{BuildImageOptions, ListImagesOptions};
use bollard::models::{BuildInfo, HostConfig};
use bollard::{Docker, API_DEFAULT_VERSION};
use futures::StreamExt;
use serde_json::{json, Map, Value};
use tokio::runtime::Runtime;

use super::{
    BuildLogSink, ContainerRecord, ContainerSpec, Engine, EngineEndpoint, ImageRecord, PortMap,
};

/// Seconds bollard waits for a single API response.
const REQUEST_TIMEOUT_SECS: u64 = 120;

pub struct DockerEngine {
    docker: Docker,
    runtime: Runtime,
}

impl DockerEngine {
    /// Connect to the engine at `url` (unix://, tcp://, http:// or https://).
    pub fn connect(url: &str) -> Result<Self> {
        let endpoint = EngineEndpoint::parse(url)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to start engine runtime")?;
        let docker = {
            let _guard = runtime.enter();
            connect_endpoint(&endpoint)
                .with_context(|| format!("failed to connect to Docker at {url}"))?
        };
        tracing::debug!("engine client ready for {url}");
        Ok(Self { docker, runtime })
    }
}

fn connect_endpoint(endpoint: &EngineEndpoint) -> Result<Docker> {
    let docker = match endpoint {
        #[cfg(unix)]
        EngineEndpoint::Unix(path) => {
            Docker::connect_with_unix(path, REQUEST_TIMEOUT_SECS, API_DEFAULT_VERSION)?
        }
        #[cfg(not(unix))]
        EngineEndpoint::Unix(path) => {
            bail!("unix socket {path} is not supported on this platform")
        }
        EngineEndpoint::Http { .. } => Docker::connect_with_http(
            &endpoint.address(),
            REQUEST_TIMEOUT_SECS,
            API_DEFAULT_VERSION,
        )?,
        EngineEndpoint::Https { .. } => {
            let certs = cert_dir()?;
            Docker::connect_with_ssl(
                &endpoint.address(),
                &certs.join("key.pem"),
                &certs.join("cert.pem"),
                &certs.join("ca.pem"),
                REQUEST_TIMEOUT_SECS,
                API_DEFAULT_VERSION,
            )?
        }
    };
    Ok(docker)
}

/// DOCKER_CERT_PATH, else ~/.docker, the same lookup the docker CLI does.
fn cert_dir() -> Result<PathBuf> {
    if let Ok(p) = env::var("DOCKER_CERT_PATH") {
        if !p.trim().is_empty() {
            return Ok(PathBuf::from(p));
        }
    }
    home::home_dir()
        .map(|h| h.join(".docker"))
        .ok_or_else(|| anyhow!("cannot locate TLS certificates: set DOCKER_CERT_PATH"))
}

impl Engine for DockerEngine {
    fn list_images(&self) -> Result<Vec<ImageRecord>> {
        tracing::debug!("engine: list images");
        let options = ListImagesOptions::<String> {
            all: false,
            ..Default::default()
        };
        let images = self
            .runtime
            .block_on(self.docker.list_images(Some(options)))
            .context("failed to list images")?;
        Ok(images
            .into_iter()
            .map(|i| ImageRecord {
                repo_tags: i.repo_tags,
            })
            .collect())
    }

    fn build_image(
        &self,
        tag: &str,
        context: Vec<u8>,
        on_record: &mut BuildLogSink<'_>,
    ) -> Result<()> {
        tracing::debug!("engine: build image {tag} ({} byte context)", context.len());
        let options = BuildImageOptions::<String> {
            t: tag.to_string(),
            rm: true,
            ..Default::default()
        };
        self.runtime.block_on(async {
            let mut stream = self.docker.build_image(options, None, Some(context.into()));
            while let Some(item) = stream.next().await {
                match item {
                    Ok(info) => on_record(&build_record(&info)?)?,
                    // bollard turns any record carrying `error` into this.
                    Err(DockerError::DockerStreamError { error }) => {
                        on_record(&json!({ "error": &error }))?;
                        bail!("{}", error.trim());
                    }
                    Err(e) => {
                        return Err(anyhow::Error::new(e).context("image build request failed"));
                    }
                }
            }
            Ok(())
        })
    }

    fn list_containers(&self) -> Result<Vec<ContainerRecord>> {
        tracing::debug!("engine: list containers");
        let options = ListContainersOptions::<String> {
            all: true,
            ..Default::default()
        };
        let containers = self
            .runtime
            .block_on(self.docker.list_containers(Some(options)))
            .context("failed to list containers")?;
        Ok(containers
            .into_iter()
            .map(|c| ContainerRecord {
                id: c.id.unwrap_or_default(),
                names: c.names.unwrap_or_default(),
                running: c.state.as_deref() == Some("running"),
            })
            .collect())
    }

    fn create_container(&self, spec: &ContainerSpec) -> Result<String> {
        tracing::debug!("engine: create container {} from {}", spec.name, spec.image);
        let config = Config {
            image: Some(spec.image.clone()),
            hostname: Some(spec.hostname.clone()),
            entrypoint: Some(spec.entrypoint.clone()),
            host_config: Some(HostConfig {
                publish_all_ports: Some(spec.publish_all_ports),
                ..Default::default()
            }),
            ..Default::default()
        };
        let options = CreateContainerOptions {
            name: spec.name.clone(),
            ..Default::default()
        };
        let response = self
            .runtime
            .block_on(self.docker.create_container(Some(options), config))
            .with_context(|| format!("failed to create container {}", spec.name))?;
        for warning in &response.warnings {
            tracing::warn!("engine: {warning}");
        }
        Ok(response.id)
    }

    fn start_container(&self, id: &str) -> Result<()> {
        tracing::debug!("engine: start container {id}");
        self.runtime
            .block_on(
                self.docker
                    .start_container(id, None::<StartContainerOptions<String>>),
            )
            .with_context(|| format!("failed to start container {id}"))
    }

    fn kill_container(&self, id: &str) -> Result<()> {
        tracing::debug!("engine: kill container {id}");
        self.runtime
            .block_on(
                self.docker
                    .kill_container(id, None::<KillContainerOptions<String>>),
            )
            .with_context(|| format!("failed to kill container {id}"))
    }

    fn wait_container(&self, id: &str, timeout: Duration) -> Result<()> {
        tracing::debug!("engine: wait for container {id} (up to {timeout:?})");
        let waited = self.runtime.block_on(async {
            let mut stream = self
                .docker
                .wait_container(id, None::<WaitContainerOptions<String>>);
            tokio::time::timeout(timeout, stream.next()).await
        });
        match waited {
            Err(_) => bail!("container {id} did not stop within {timeout:?}"),
            Ok(None) | Ok(Some(Ok(_))) => Ok(()),
            // A killed container exits non-zero; it has still stopped.
            Ok(Some(Err(bollard::errors::Error::DockerContainerWaitError { .. }))) => Ok(()),
            Ok(Some(Err(e))) => {
                Err::<(), _>(e).with_context(|| format!("failed to wait for container {id}"))
            }
        }
    }

    fn remove_container(&self, id: &str) -> Result<()> {
        tracing::debug!("engine: remove container {id}");
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        self.runtime
            .block_on(self.docker.remove_container(id, Some(options)))
            .with_context(|| format!("failed to remove container {id}"))
    }

    fn port_bindings(&self, id: &str) -> Result<PortMap> {
        tracing::debug!("engine: inspect container {id}");
        let info = self
            .runtime
            .block_on(
                self.docker
                    .inspect_container(id, None::<InspectContainerOptions>),
            )
            .with_context(|| format!("failed to inspect container {id}"))?;
        let ports: HashMap<_, _> = info
            .network_settings
            .and_then(|n| n.ports)
            .unwrap_or_default();
        Ok(ports
            .into_iter()
            .map(|(container_port, bindings)| {
                let host_ports = bindings
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|b| b.host_port)
                    .collect();
                (container_port, host_ports)
            })
            .collect())
    }
}

/// Rebuild a build-log record with the daemon's wire field order:
/// stream, status, progressDetail, progress, id, errorDetail, error, aux.
fn build_record(info: &BuildInfo) -> Result<Value> {
    let mut map = Map::new();
    if let Some(v) = &info.stream {
        map.insert("stream".into(), json!(v));
    }
    if let Some(v) = &info.status {
        map.insert("status".into(), json!(v));
    }
    if let Some(v) = &info.progress_detail {
        map.insert("progressDetail".into(), serde_json::to_value(v)?);
    }
    if let Some(v) = &info.progress {
        map.insert("progress".into(), json!(v));
    }
    if let Some(v) = &info.id {
        map.insert("id".into(), json!(v));
    }
    if let Some(v) = &info.error_detail {
        map.insert("errorDetail".into(), serde_json::to_value(v)?);
    }
    if let Some(v) = &info.error {
        map.insert("error".into(), json!(v));
    }
    if let Some(v) = &info.aux {
        map.insert("aux".into(), serde_json::to_value(v)?);
    }
    Ok(Value::Object(map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bollard::models::{ImageId, ProgressDetail};

    #[test]
    fn test_build_record_uses_wire_order() {
        let info = BuildInfo {
            id: Some("abc123".to_string()),
            status: Some("Downloading".to_string()),
            progress: Some("[=>   ]".to_string()),
            progress_detail: Some(ProgressDetail {
                current: Some(1),
                total: Some(4),
            }),
            ..Default::default()
        };
        let record = build_record(&info).unwrap();
        let keys: Vec<&str> = record
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, vec!["status", "progressDetail", "progress", "id"]);
        assert_eq!(record["progressDetail"], json!({"current": 1, "total": 4}));
    }

    #[test]
    fn test_build_record_skips_absent_fields() {
        let info = BuildInfo {
            stream: Some("Step 1/2 : FROM ubuntu\n".to_string()),
            aux: Some(ImageId {
                id: Some("sha256:feed".to_string()),
            }),
            ..Default::default()
        };
        assert_eq!(
            build_record(&info).unwrap(),
            json!({"stream": "Step 1/2 : FROM ubuntu\n", "aux": {"ID": "sha256:feed"}})
        );
    }
}
