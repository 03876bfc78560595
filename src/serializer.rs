use crate::error::BackendError;
use crate::flow::{CallOutput, FlowId};
use crate::model::{Listing, PanelKind};
use crossterm::event::KeyEvent;
use tokio::sync::mpsc;

/// Everything that may touch console state arrives as one of these.
#[derive(Debug)]
pub enum Task {
    Key(KeyEvent),
    Resize,
    InputError(String),
    InputClosed,
    Refresh(PanelKind),
    /// `seq` orders fetches of one panel by the time they were issued.
    Listing {
        panel: PanelKind,
        seq: u64,
        result: Result<Listing, BackendError>,
    },
    Finished {
        flow: FlowId,
        result: Result<CallOutput, BackendError>,
    },
}

/// Single-consumer FIFO. Only the holder of the `Serializer` applies tasks,
/// so two mutation passes can never interleave.
#[derive(Debug)]
pub struct Serializer<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

/// Cloneable submit handle given to producers.
#[derive(Debug)]
pub struct Updater<T> {
    tx: mpsc::UnboundedSender<T>,
}

impl<T> Clone for Updater<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> Serializer<T> {
    pub fn new() -> (Self, Updater<T>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx }, Updater { tx })
    }

    /// Resolves to `None` once every `Updater` is gone and the queue is drained.
    pub async fn next(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    pub fn try_next(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    pub fn close(&mut self) {
        self.rx.close();
    }
}

impl<T> Updater<T> {
    /// Returns false when the consumer has shut down.
    pub fn submit(&self, task: T) -> bool {
        self.tx.send(task).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::Serializer;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn tasks_run_in_submission_order_across_sources() {
        let (mut serializer, updater) = Serializer::<&'static str>::new();
        let (first_done, first_submitted) = oneshot::channel();

        let tick = updater.clone();
        let ticker = tokio::spawn(async move {
            assert!(tick.submit("tick"));
            let _ = first_done.send(());
        });
        let user = updater.clone();
        let action = tokio::spawn(async move {
            let _ = first_submitted.await;
            assert!(user.submit("action"));
        });
        drop(updater);

        ticker.await.unwrap();
        action.await.unwrap();

        let in_flight = Arc::new(AtomicBool::new(false));
        let mut seen = Vec::new();
        while let Some(task) = serializer.next().await {
            assert!(!in_flight.swap(true, Ordering::SeqCst));
            seen.push(task);
            in_flight.store(false, Ordering::SeqCst);
        }
        assert_eq!(seen, vec!["tick", "action"]);
    }

    #[tokio::test]
    async fn per_source_order_survives_concurrent_producers() {
        let (mut serializer, updater) = Serializer::<(u8, u32)>::new();
        let mut producers = Vec::new();
        for source in 0..2u8 {
            let updater = updater.clone();
            producers.push(tokio::spawn(async move {
                for n in 0..100u32 {
                    updater.submit((source, n));
                    tokio::task::yield_now().await;
                }
            }));
        }
        drop(updater);
        for producer in producers {
            producer.await.unwrap();
        }

        let mut next_expected = [0u32; 2];
        let mut total = 0;
        while let Some((source, n)) = serializer.next().await {
            assert_eq!(n, next_expected[source as usize]);
            next_expected[source as usize] += 1;
            total += 1;
        }
        assert_eq!(total, 200);
    }

    #[tokio::test]
    async fn submit_reports_a_closed_consumer() {
        let (mut serializer, updater) = Serializer::<u8>::new();
        assert!(updater.submit(1));
        serializer.close();
        assert!(!updater.submit(2));
        assert_eq!(serializer.try_next(), Some(1));
        assert_eq!(serializer.try_next(), None);
    }
}
