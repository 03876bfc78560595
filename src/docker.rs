use crate::backend::{ResourceBackend, ensure_absent};
use crate::error::BackendError;
use crate::form::CreateContainerFields;
use crate::model::{ContainerSummary, ImageSummary};
use serde::de::DeserializeOwned;
use std::ffi::OsString;
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::debug;

/// Talks to the engine through the `docker` command line client.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
    host: Option<String>,
}

impl DockerCli {
    pub fn new(binary: impl Into<String>, host: Option<String>) -> Self {
        Self {
            binary: binary.into(),
            host,
        }
    }

    fn run<I, S>(&self, args: I) -> Result<String, BackendError>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let mut cmd = Command::new(&self.binary);
        if let Some(host) = &self.host {
            cmd.arg("-H").arg(host);
        }
        let args = args.into_iter().map(Into::into).collect::<Vec<OsString>>();
        debug!(binary = %self.binary, ?args, "running docker");
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = cmd.output().map_err(|error| BackendError::Spawn {
            program: self.binary.clone(),
            reason: error.to_string(),
        })?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = stderr
            .trim()
            .strip_prefix("Error response from daemon: ")
            .unwrap_or(stderr.trim())
            .to_string();
        if message.is_empty() {
            return Err(BackendError::Command(format!(
                "{} exited with {}",
                self.binary, output.status
            )));
        }
        Err(BackendError::Command(message))
    }

    fn inspect(&self, object: &str, id: &str) -> Result<String, BackendError> {
        let raw = self.run([object, "inspect", id])?;
        pretty_first(&raw)
    }
}

pub fn parse_json_lines<T: DeserializeOwned>(raw: &str) -> Result<Vec<T>, BackendError> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| serde_json::from_str(line).map_err(|error| BackendError::Decode(error.to_string())))
        .collect()
}

/// `docker inspect` prints an array; show its first element indented.
pub fn pretty_first(raw: &str) -> Result<String, BackendError> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|error| BackendError::Decode(error.to_string()))?;
    let first = match value {
        serde_json::Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
        serde_json::Value::Array(_) => {
            return Err(BackendError::Decode("inspect returned no objects".to_string()));
        }
        other => other,
    };
    serde_json::to_string_pretty(&first).map_err(|error| BackendError::Decode(error.to_string()))
}

pub fn create_args(fields: &CreateContainerFields) -> Vec<String> {
    let mut args = vec!["create".to_string()];
    if let Some(name) = &fields.name {
        args.push("--name".to_string());
        args.push(name.clone());
    }
    if let Some((host, container)) = fields.port {
        args.push("-p".to_string());
        args.push(match host {
            Some(host) => format!("{host}:{container}"),
            None => container.to_string(),
        });
    }
    if let Some((host, target)) = &fields.volume {
        args.push("-v".to_string());
        args.push(format!("{host}:{target}"));
    }
    for pair in &fields.env {
        args.push("-e".to_string());
        args.push(pair.clone());
    }
    if fields.attach {
        args.extend(["-i".to_string(), "-t".to_string()]);
    }
    args.push(fields.image.clone());
    args.extend(fields.cmd.iter().cloned());
    args
}

impl ResourceBackend for DockerCli {
    fn ping(&self) -> Result<String, BackendError> {
        let version = self.run(["version", "--format", "{{.Server.Version}}"])?;
        Ok(version.trim().to_string())
    }

    fn containers(&self) -> Result<Vec<ContainerSummary>, BackendError> {
        let raw = self.run(["ps", "-a", "--no-trunc", "--format", "{{json .}}"])?;
        parse_json_lines(&raw)
    }

    fn images(&self) -> Result<Vec<ImageSummary>, BackendError> {
        let raw = self.run(["images", "--no-trunc", "--format", "{{json .}}"])?;
        parse_json_lines(&raw)
    }

    fn inspect_container(&self, id: &str) -> Result<String, BackendError> {
        self.inspect("container", id)
    }

    fn inspect_image(&self, id: &str) -> Result<String, BackendError> {
        self.inspect("image", id)
    }

    fn create_container(&self, fields: &CreateContainerFields) -> Result<(), BackendError> {
        self.run(create_args(fields)).map(drop)
    }

    fn start_container(&self, id: &str) -> Result<(), BackendError> {
        self.run(["start", id]).map(drop)
    }

    fn stop_container(&self, id: &str) -> Result<(), BackendError> {
        self.run(["stop", id]).map(drop)
    }

    fn remove_container(&self, id: &str) -> Result<(), BackendError> {
        self.run(["rm", id]).map(drop)
    }

    fn rename_container(&self, container: &str, new_name: &str) -> Result<(), BackendError> {
        self.run(["rename", container, new_name]).map(drop)
    }

    fn export_container(&self, container: &str, path: &Path) -> Result<(), BackendError> {
        ensure_absent(path)?;
        self.run([
            OsString::from("export"),
            OsString::from("-o"),
            path.as_os_str().to_os_string(),
            OsString::from(container),
        ])
        .map(drop)
    }

    fn commit_container(
        &self,
        container: &str,
        repository: &str,
        tag: &str,
    ) -> Result<(), BackendError> {
        self.run(["commit".to_string(), container.to_string(), format!("{repository}:{tag}")])
            .map(drop)
    }

    fn remove_image(&self, reference: &str) -> Result<(), BackendError> {
        self.run(["rmi", reference]).map(drop)
    }

    fn remove_dangling_images(&self) -> Result<(), BackendError> {
        self.run(["image", "prune", "-f"]).map(drop)
    }

    fn pull_image(&self, repository: &str, tag: &str) -> Result<(), BackendError> {
        self.run(["pull".to_string(), format!("{repository}:{tag}")])
            .map(drop)
    }

    fn save_image(&self, image: &str, path: &Path) -> Result<(), BackendError> {
        ensure_absent(path)?;
        self.run([
            OsString::from("save"),
            OsString::from("-o"),
            path.as_os_str().to_os_string(),
            OsString::from(image),
        ])
        .map(drop)
    }

    fn import_image(&self, path: &Path, repository: &str, tag: &str) -> Result<(), BackendError> {
        self.run([
            OsString::from("import"),
            path.as_os_str().to_os_string(),
            OsString::from(format!("{repository}:{tag}")),
        ])
        .map(drop)
    }

    fn load_image(&self, path: &Path) -> Result<(), BackendError> {
        self.run([
            OsString::from("load"),
            OsString::from("-i"),
            path.as_os_str().to_os_string(),
        ])
        .map(drop)
    }
}
