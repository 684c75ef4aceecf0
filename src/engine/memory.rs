//! In-memory engine that records every call. Used by the test suites.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use serde_json::json;

use super::{BuildLogSink, ContainerRecord, ContainerSpec, Engine, ImageRecord, PortMap};

#[derive(Debug, Default)]
struct State {
    images: Vec<ImageRecord>,
    containers: Vec<ContainerRecord>,
    ports: Vec<(String, PortMap)>,
    build_log: Vec<serde_json::Value>,
    created: Vec<ContainerSpec>,
    calls: Vec<String>,
    failing: BTreeSet<&'static str>,
    next_id: u32,
}

#[derive(Debug, Default)]
pub struct MemoryEngine {
    state: RefCell<State>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(self, tags: &[&str]) -> Self {
        self.state.borrow_mut().images.push(ImageRecord {
            repo_tags: tags.iter().map(|t| t.to_string()).collect(),
        });
        self
    }

    /// Add a container; `name` is stored engine-style with a leading '/'.
    pub fn with_container(self, id: &str, name: &str, running: bool) -> Self {
        self.state.borrow_mut().containers.push(ContainerRecord {
            id: id.to_string(),
            names: vec![format!("/{name}")],
            running,
            ..Default::default()
        });
        self
    }

    pub fn with_ports(self, id: &str, ports: &[(&str, &str)]) -> Self {
        let mut map = PortMap::new();
        for (container_port, host_port) in ports {
            map.entry(container_port.to_string())
                .or_default()
                .push(host_port.to_string());
        }
        self.state.borrow_mut().ports.push((id.to_string(), map));
        self
    }

    /// Records replayed by `build_image`. A record with an `error` string
    /// ends the build the way the Docker client does.
    pub fn with_build_log(self, records: Vec<serde_json::Value>) -> Self {
        self.state.borrow_mut().build_log = records;
        self
    }

    /// Make the named operation ("kill", "wait", "remove", "create", "start", "list") fail.
    pub fn failing(self, op: &'static str) -> Self {
        self.state.borrow_mut().failing.insert(op);
        self
    }

    /// Calls in order, as "op arg".
    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }

    /// Calls that change engine state.
    pub fn mutations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| !c.starts_with("list") && !c.starts_with("inspect"))
            .collect()
    }

    pub fn created(&self) -> Vec<ContainerSpec> {
        self.state.borrow().created.clone()
    }

    fn record(&self, op: &'static str, arg: &str) -> Result<()> {
        let mut st = self.state.borrow_mut();
        st.calls.push(if arg.is_empty() {
            op.to_string()
        } else {
            format!("{op} {arg}")
        });
        if st.failing.contains(op) {
            bail!("{op} {arg}: simulated engine failure");
        }
        Ok(())
    }
}

impl Engine for MemoryEngine {
    fn list_images(&self) -> Result<Vec<ImageRecord>> {
        self.record("list", "images")?;
        Ok(self.state.borrow().images.clone())
    }

    fn build_image(
        &self,
        tag: &str,
        context: Vec<u8>,
        on_record: &mut BuildLogSink<'_>,
    ) -> Result<()> {
        self.record("build", tag)?;
        if context.is_empty() {
            bail!("empty build context");
        }
        let log = self.state.borrow().build_log.clone();
        for rec in &log {
            if let Some(error) = rec.get("error").and_then(serde_json::Value::as_str) {
                on_record(&json!({ "error": error }))?;
                bail!("{}", error.trim());
            }
            on_record(rec)?;
        }
        self.state.borrow_mut().images.push(ImageRecord {
            repo_tags: vec![format!("{tag}:latest")],
        });
        Ok(())
    }

    fn list_containers(&self) -> Result<Vec<ContainerRecord>> {
        self.record("list", "containers")?;
        Ok(self.state.borrow().containers.clone())
    }

    fn create_container(&self, spec: &ContainerSpec) -> Result<String> {
        self.record("create", &spec.name)?;
        let mut st = self.state.borrow_mut();
        if st.containers.iter().any(|c| c.name() == spec.name) {
            bail!("conflict: container name {} already in use", spec.name);
        }
        st.next_id += 1;
        let id = format!("c{:04}", st.next_id);
        st.containers.push(ContainerRecord {
            id: id.clone(),
            names: vec![format!("/{}", spec.name)],
            running: false,
            ..Default::default()
        });
        st.created.push(spec.clone());
        Ok(id)
    }

    fn start_container(&self, id: &str) -> Result<()> {
        self.record("start", id)?;
        let mut st = self.state.borrow_mut();
        let c = st
            .containers
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| anyhow!("no such container: {id}"))?;
        c.running = true;
        Ok(())
    }

    fn kill_container(&self, id: &str) -> Result<()> {
        self.record("kill", id)?;
        if let Some(c) = self.state.borrow_mut().containers.iter_mut().find(|c| c.id == id) {
            c.running = false;
        }
        Ok(())
    }

    fn wait_container(&self, id: &str, _timeout: Duration) -> Result<()> {
        self.record("wait", id)
    }

    fn remove_container(&self, id: &str) -> Result<()> {
        self.record("remove", id)?;
        self.state.borrow_mut().containers.retain(|c| c.id != id);
        Ok(())
    }

    fn port_bindings(&self, id: &str) -> Result<PortMap> {
        self.record("inspect", id)?;
        Ok(self
            .state
            .borrow()
            .ports
            .iter()
            .find(|(cid, _)| cid == id)
            .map(|(_, m)| m.clone())
            .unwrap_or_default())
    }
}
