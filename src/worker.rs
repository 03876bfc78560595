use crate::backend::{ResourceBackend, list};
use crate::console::Effect;
use crate::error::BackendError;
use crate::serializer::{Task, Updater};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Runs effects on the blocking pool and reports back through the serializer.
///
/// Results come back in completion order, so every fetch is stamped when it is
/// dispatched and the console drops listings older than the one it shows.
#[derive(Clone)]
pub struct Worker {
    backend: Arc<dyn ResourceBackend>,
    updater: Updater<Task>,
    fetches: Arc<AtomicU64>,
}

impl Worker {
    pub fn new(backend: Arc<dyn ResourceBackend>, updater: Updater<Task>) -> Self {
        Self {
            backend,
            updater,
            fetches: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn run(&self, effect: Effect) -> JoinHandle<()> {
        let backend = Arc::clone(&self.backend);
        let updater = self.updater.clone();
        // Stamp before spawning; spawned tasks may start in any order.
        let seq = match effect {
            Effect::Fetch(_) => self.fetches.fetch_add(1, Ordering::SeqCst) + 1,
            Effect::Call { .. } => 0,
        };
        tokio::spawn(async move {
            let task = match effect {
                Effect::Fetch(panel) => {
                    let result = tokio::task::spawn_blocking(move || list(backend.as_ref(), panel))
                        .await
                        .unwrap_or_else(|error| Err(join_failure(error)));
                    if let Err(error) = &result {
                        warn!(%panel, seq, %error, "refresh failed");
                    }
                    Task::Listing { panel, seq, result }
                }
                Effect::Call { flow, call } => {
                    let result = tokio::task::spawn_blocking(move || call.execute(backend.as_ref()))
                        .await
                        .unwrap_or_else(|error| Err(join_failure(error)));
                    debug!(flow, ok = result.is_ok(), "backend call finished");
                    Task::Finished { flow, result }
                }
            };
            if !updater.submit(task) {
                debug!("console closed before the result arrived");
            }
        })
    }
}

fn join_failure(error: tokio::task::JoinError) -> BackendError {
    BackendError::Command(format!("backend task aborted: {error}"))
}

#[cfg(test)]
mod tests {
    use super::Worker;
    use crate::backend::fake::FakeBackend;
    use crate::console::{Console, Effect};
    use crate::error::BackendError;
    use crate::flow::{BackendCall, CallOutput};
    use crate::model::{Listing, PanelKind};
    use crate::serializer::{Serializer, Task};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn fetch_results_come_back_as_listing_tasks() {
        let backend = Arc::new(FakeBackend::with_containers(&["web", "db"]));
        let (mut serializer, updater) = Serializer::new();
        let worker = Worker::new(backend, updater);

        worker.run(Effect::Fetch(PanelKind::Containers)).await.unwrap();

        match serializer.try_next() {
            Some(Task::Listing {
                panel: PanelKind::Containers,
                seq: 1,
                result: Ok(Listing::Containers(items)),
            }) => assert_eq!(items.len(), 2),
            other => panic!("unexpected task {other:?}"),
        }
    }

    #[tokio::test]
    async fn call_failures_are_reported_with_their_flow() {
        let backend = Arc::new(FakeBackend::with_containers(&["web"]));
        backend.fail_with("not found");
        let (mut serializer, updater) = Serializer::new();
        let worker = Worker::new(backend.clone(), updater);

        let call = BackendCall::StopContainer {
            id: "id-web".to_string(),
        };
        worker.run(Effect::Call { flow: 7, call }).await.unwrap();

        match serializer.try_next() {
            Some(Task::Finished { flow: 7, result }) => assert_eq!(
                result,
                Err::<CallOutput, _>(BackendError::Command("not found".to_string()))
            ),
            other => panic!("unexpected task {other:?}"),
        }
        assert_eq!(backend.calls(), vec!["stop id-web".to_string()]);
    }

    #[tokio::test]
    async fn a_slow_older_fetch_cannot_overwrite_a_newer_listing() {
        let backend = Arc::new(FakeBackend::default());
        backend.script_containers(Duration::from_millis(300), &["alpha", "beta"]);
        backend.script_containers(Duration::ZERO, &["alpha"]);
        let (mut serializer, updater) = Serializer::new();
        let worker = Worker::new(backend, updater);
        let mut console = Console::new(&[]).unwrap();

        let tick = worker.run(Effect::Fetch(PanelKind::Containers));
        tokio::time::sleep(Duration::from_millis(50)).await;
        let after_remove = worker.run(Effect::Fetch(PanelKind::Containers));
        after_remove.await.unwrap();
        tick.await.unwrap();

        let mut arrived = Vec::new();
        while let Some(task) = serializer.try_next() {
            if let Task::Listing { seq, .. } = &task {
                arrived.push(*seq);
            }
            console.apply(task).unwrap();
        }
        assert_eq!(arrived, vec![2, 1]);
        let names = console
            .containers()
            .rows()
            .iter()
            .map(|row| row.name.clone())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["alpha"]);
    }
}
