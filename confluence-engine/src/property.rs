//! Latest-value cell driven by a stream.

use std::sync::Arc;

use futures_util::stream::{BoxStream, Stream, StreamExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;

/// Holds the latest value of a stream.
///
/// Starts at `initial` and follows the driving stream from then on.
/// Consecutive equal values are dropped, so subscribers only observe
/// changes. Late subscribers receive the current value first.
///
/// The driving stream runs on a spawned task; construction therefore
/// requires a tokio runtime. Dropping the property aborts the task.
pub struct StateProperty<S> {
    sender: Arc<watch::Sender<S>>,
    driver: JoinHandle<()>,
}

impl<S> StateProperty<S>
where
    S: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new<St>(initial: S, then: St) -> Self
    where
        St: Stream<Item = S> + Send + 'static,
    {
        let (sender, _) = watch::channel(initial);
        let sender = Arc::new(sender);

        let driver_sender = Arc::clone(&sender);
        let driver = tokio::spawn(async move {
            let mut then = std::pin::pin!(then);
            while let Some(next) = then.next().await {
                driver_sender.send_if_modified(|current| {
                    if *current == next {
                        false
                    } else {
                        *current = next;
                        true
                    }
                });
            }
        });

        Self { sender, driver }
    }

    /// Current value.
    pub fn value(&self) -> S {
        self.sender.borrow().clone()
    }

    /// Evaluate `f` against the current value without cloning it.
    pub fn with_value<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.sender.borrow())
    }

    /// Receiver positioned at the current value; `changed()` resolves on
    /// the next change.
    pub fn subscribe(&self) -> watch::Receiver<S> {
        self.sender.subscribe()
    }

    /// Current value followed by every change.
    pub fn stream(&self) -> BoxStream<'static, S> {
        WatchStream::new(self.sender.subscribe()).boxed()
    }

    /// Changes after the current value.
    pub fn changes(&self) -> BoxStream<'static, S> {
        WatchStream::from_changes(self.sender.subscribe()).boxed()
    }
}

impl<S> Drop for StateProperty<S> {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::UnboundedReceiverStream;

    #[tokio::test]
    async fn test_starts_with_initial_value() {
        let property = StateProperty::new(0u32, stream::pending());
        assert_eq!(property.value(), 0);
        assert_eq!(property.stream().next().await, Some(0));
    }

    #[tokio::test]
    async fn test_follows_driving_stream() {
        let (tx, rx) = mpsc::unbounded_channel();
        let property = StateProperty::new(0u32, UnboundedReceiverStream::new(rx));
        let mut updates = property.subscribe();

        tx.send(1).unwrap();
        updates.changed().await.unwrap();
        assert_eq!(*updates.borrow_and_update(), 1);
        assert_eq!(property.value(), 1);
        assert!(property.with_value(|v| *v == 1));
    }

    #[tokio::test]
    async fn test_equal_values_are_not_republished() {
        let (tx, rx) = mpsc::unbounded_channel();
        let property = StateProperty::new(0u32, UnboundedReceiverStream::new(rx));
        let mut updates = property.subscribe();

        tx.send(0).unwrap();
        tx.send(0).unwrap();
        tx.send(2).unwrap();

        updates.changed().await.unwrap();
        assert_eq!(*updates.borrow_and_update(), 2);
        let again = tokio::time::timeout(Duration::from_millis(50), updates.changed()).await;
        assert!(again.is_err());
    }

    #[tokio::test]
    async fn test_late_subscriber_gets_latest() {
        let property = StateProperty::new(0u32, stream::iter(vec![1, 2, 3]));
        let mut updates = property.subscribe();
        while *updates.borrow_and_update() != 3 {
            updates.changed().await.unwrap();
        }
        assert_eq!(property.stream().next().await, Some(3));
    }
}
