use crate::error::BackendError;
use crate::form::CreateContainerFields;
use crate::model::{ContainerSummary, ImageSummary, Listing, PanelKind};
use std::path::Path;

/// Blocking operations against the container engine. Calls may take a while;
/// run them off the serializer.
pub trait ResourceBackend: Send + Sync {
    /// Returns the engine version when the daemon answers.
    fn ping(&self) -> Result<String, BackendError>;

    fn containers(&self) -> Result<Vec<ContainerSummary>, BackendError>;
    fn images(&self) -> Result<Vec<ImageSummary>, BackendError>;

    fn inspect_container(&self, id: &str) -> Result<String, BackendError>;
    fn inspect_image(&self, id: &str) -> Result<String, BackendError>;

    fn create_container(&self, fields: &CreateContainerFields) -> Result<(), BackendError>;
    fn start_container(&self, id: &str) -> Result<(), BackendError>;
    fn stop_container(&self, id: &str) -> Result<(), BackendError>;
    fn remove_container(&self, id: &str) -> Result<(), BackendError>;
    fn rename_container(&self, container: &str, new_name: &str) -> Result<(), BackendError>;
    fn export_container(&self, container: &str, path: &Path) -> Result<(), BackendError>;
    fn commit_container(
        &self,
        container: &str,
        repository: &str,
        tag: &str,
    ) -> Result<(), BackendError>;

    fn remove_image(&self, reference: &str) -> Result<(), BackendError>;
    fn remove_dangling_images(&self) -> Result<(), BackendError>;
    fn pull_image(&self, repository: &str, tag: &str) -> Result<(), BackendError>;
    fn save_image(&self, image: &str, path: &Path) -> Result<(), BackendError>;
    fn import_image(&self, path: &Path, repository: &str, tag: &str) -> Result<(), BackendError>;
    fn load_image(&self, path: &Path) -> Result<(), BackendError>;
}

pub fn list(backend: &dyn ResourceBackend, kind: PanelKind) -> Result<Listing, BackendError> {
    match kind {
        PanelKind::Images => backend.images().map(Listing::Images),
        PanelKind::Containers => backend.containers().map(Listing::Containers),
    }
}

/// Refuses to clobber an existing archive.
pub fn ensure_absent(path: &Path) -> Result<(), BackendError> {
    if path.exists() {
        return Err(BackendError::Io {
            path: path.display().to_string(),
            reason: "file already exists".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
pub mod fake {
    use super::ResourceBackend;
    use crate::error::BackendError;
    use crate::form::CreateContainerFields;
    use crate::model::{ContainerSummary, ImageSummary};
    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;

    /// In-memory engine that records every call.
    #[derive(Debug, Default)]
    pub struct FakeBackend {
        containers: Mutex<Vec<ContainerSummary>>,
        scripted: Mutex<VecDeque<(Duration, Vec<ContainerSummary>)>>,
        images: Mutex<Vec<ImageSummary>>,
        calls: Mutex<Vec<String>>,
        failure: Mutex<Option<String>>,
    }

    pub fn container(id: &str, name: &str) -> ContainerSummary {
        ContainerSummary {
            id: id.to_string(),
            name: name.to_string(),
            image: "nginx:latest".to_string(),
            status: "Up 1 minute".to_string(),
            ..ContainerSummary::default()
        }
    }

    pub fn image(id: &str, repository: &str, tag: &str) -> ImageSummary {
        ImageSummary {
            id: id.to_string(),
            repository: repository.to_string(),
            tag: tag.to_string(),
            size: "10MB".to_string(),
            ..ImageSummary::default()
        }
    }

    impl FakeBackend {
        pub fn with_containers(names: &[&str]) -> Self {
            let backend = Self::default();
            *backend.containers.lock().unwrap() = names
                .iter()
                .map(|name| container(&format!("id-{name}"), name))
                .collect();
            backend
        }

        /// Queues a container listing that is returned after `delay`, ahead
        /// of the live collection.
        pub fn script_containers(&self, delay: Duration, names: &[&str]) {
            let items = names
                .iter()
                .map(|name| container(&format!("id-{name}"), name))
                .collect();
            self.scripted.lock().unwrap().push_back((delay, items));
        }

        pub fn set_images(&self, images: Vec<ImageSummary>) {
            *self.images.lock().unwrap() = images;
        }

        /// Every later mutating call fails with `message`.
        pub fn fail_with(&self, message: &str) {
            *self.failure.lock().unwrap() = Some(message.to_string());
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) -> Result<(), BackendError> {
            self.calls.lock().unwrap().push(call);
            match self.failure.lock().unwrap().as_ref() {
                Some(message) => Err(BackendError::Command(message.clone())),
                None => Ok(()),
            }
        }
    }

    impl ResourceBackend for FakeBackend {
        fn ping(&self) -> Result<String, BackendError> {
            Ok("fake".to_string())
        }

        fn containers(&self) -> Result<Vec<ContainerSummary>, BackendError> {
            let scripted = self.scripted.lock().unwrap().pop_front();
            if let Some((delay, items)) = scripted {
                thread::sleep(delay);
                return Ok(items);
            }
            Ok(self.containers.lock().unwrap().clone())
        }

        fn images(&self) -> Result<Vec<ImageSummary>, BackendError> {
            Ok(self.images.lock().unwrap().clone())
        }

        fn inspect_container(&self, id: &str) -> Result<String, BackendError> {
            self.record(format!("inspect-container {id}"))?;
            Ok(format!("{{\"Id\": \"{id}\"}}"))
        }

        fn inspect_image(&self, id: &str) -> Result<String, BackendError> {
            self.record(format!("inspect-image {id}"))?;
            Ok(format!("{{\"Id\": \"{id}\"}}"))
        }

        fn create_container(&self, fields: &CreateContainerFields) -> Result<(), BackendError> {
            self.record(format!("create {}", fields.image))?;
            let name = fields.name.clone().unwrap_or_else(|| "created".to_string());
            self.containers
                .lock()
                .unwrap()
                .push(container(&format!("id-{name}"), &name));
            Ok(())
        }

        fn start_container(&self, id: &str) -> Result<(), BackendError> {
            self.record(format!("start {id}"))
        }

        fn stop_container(&self, id: &str) -> Result<(), BackendError> {
            self.record(format!("stop {id}"))
        }

        fn remove_container(&self, id: &str) -> Result<(), BackendError> {
            self.record(format!("remove {id}"))?;
            self.containers.lock().unwrap().retain(|item| item.id != id);
            Ok(())
        }

        fn rename_container(&self, container: &str, new_name: &str) -> Result<(), BackendError> {
            self.record(format!("rename {container} {new_name}"))
        }

        fn export_container(&self, container: &str, path: &Path) -> Result<(), BackendError> {
            self.record(format!("export {container} {}", path.display()))
        }

        fn commit_container(
            &self,
            container: &str,
            repository: &str,
            tag: &str,
        ) -> Result<(), BackendError> {
            self.record(format!("commit {container} {repository}:{tag}"))
        }

        fn remove_image(&self, reference: &str) -> Result<(), BackendError> {
            self.record(format!("remove-image {reference}"))?;
            self.images
                .lock()
                .unwrap()
                .retain(|item| item.id != reference && format!("{}:{}", item.repository, item.tag) != reference);
            Ok(())
        }

        fn remove_dangling_images(&self) -> Result<(), BackendError> {
            self.record("prune".to_string())
        }

        fn pull_image(&self, repository: &str, tag: &str) -> Result<(), BackendError> {
            self.record(format!("pull {repository}:{tag}"))
        }

        fn save_image(&self, image: &str, path: &Path) -> Result<(), BackendError> {
            self.record(format!("save {image} {}", path.display()))
        }

        fn import_image(
            &self,
            path: &Path,
            repository: &str,
            tag: &str,
        ) -> Result<(), BackendError> {
            self.record(format!("import {} {repository}:{tag}", path.display()))
        }

        fn load_image(&self, path: &Path) -> Result<(), BackendError> {
            self.record(format!("load {}", path.display()))
        }
    }
}
