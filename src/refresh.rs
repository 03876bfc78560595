use crate::model::PanelKind;
use crate::serializer::{Task, Updater};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::debug;

/// Periodic refresh for one list panel. Ticks go through the serializer, so a
/// tick that lands during another task waits its turn instead of being lost.
#[derive(Debug)]
pub struct RefreshLoop {
    panel: PanelKind,
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl RefreshLoop {
    pub fn spawn(panel: PanelKind, every: Duration, updater: Updater<Task>) -> Self {
        let (stop, mut stopped) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if !updater.submit(Task::Refresh(panel)) {
                            break;
                        }
                    }
                    changed = stopped.changed() => {
                        if changed.is_err() || *stopped.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!(%panel, "refresh loop stopped");
        });
        Self {
            panel,
            stop,
            handle,
        }
    }

    /// Signals the loop and waits for it to wind down.
    pub async fn stop(self) {
        debug!(panel = %self.panel, "stopping refresh loop");
        let _ = self.stop.send(true);
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::RefreshLoop;
    use crate::model::PanelKind;
    use crate::serializer::{Serializer, Task};
    use tokio::time::{Duration, timeout};

    #[tokio::test]
    async fn ticks_are_submitted_until_stopped() {
        let (mut serializer, updater) = Serializer::new();
        let refresh = RefreshLoop::spawn(PanelKind::Images, Duration::from_millis(5), updater);
        assert_eq!(refresh.panel, PanelKind::Images);

        for _ in 0..2 {
            let task = timeout(Duration::from_secs(1), serializer.next())
                .await
                .unwrap();
            assert!(matches!(task, Some(Task::Refresh(PanelKind::Images))));
        }

        refresh.stop().await;
        while serializer.try_next().is_some() {}
        assert!(serializer.next().await.is_none());
    }

    #[tokio::test]
    async fn loop_exits_when_the_consumer_is_gone() {
        let (serializer, updater) = Serializer::new();
        let refresh = RefreshLoop::spawn(PanelKind::Containers, Duration::from_millis(5), updater);
        drop(serializer);
        timeout(Duration::from_secs(1), refresh.handle).await.unwrap().unwrap();
    }
}
