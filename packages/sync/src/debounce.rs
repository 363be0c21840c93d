//! Debounced trigger backed by a spawned task

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

enum Poke {
    Reset,
    Cancel,
}

/// Fires `on_fire` once the quiet window has elapsed since the last `poke`.
/// Every poke restarts the window. Dropping the debouncer stops the task.
#[derive(Debug)]
pub struct Debouncer {
    tx: mpsc::UnboundedSender<Poke>,
    task: JoinHandle<()>,
}

impl Debouncer {
    /// Must be called inside a tokio runtime
    pub fn spawn<F>(delay: Duration, on_fire: F) -> Self
    where
        F: Fn() + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Some(Poke::Reset) => {}
                    Some(Poke::Cancel) => continue,
                    None => return,
                }

                loop {
                    match tokio::time::timeout(delay, rx.recv()).await {
                        Ok(Some(Poke::Reset)) => continue,
                        Ok(Some(Poke::Cancel)) => break,
                        Ok(None) => return,
                        Err(_) => {
                            debug!(delay_ms = delay.as_millis() as u64, "Debounce window elapsed");
                            on_fire();
                            break;
                        }
                    }
                }
            }
        });

        Self { tx, task }
    }

    /// Start or restart the quiet window
    pub fn poke(&self) {
        let _ = self.tx.send(Poke::Reset);
    }

    /// Drop a pending firing, if any
    pub fn cancel(&self) {
        let _ = self.tx.send(Poke::Cancel);
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting(delay: Duration) -> (Debouncer, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let debouncer = Debouncer::spawn(delay, move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (debouncer, count)
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_pokes_fire_once() {
        let (debouncer, count) = counting(Duration::from_secs(3));

        for _ in 0..5 {
            debouncer.poke();
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_pending_fire() {
        let (debouncer, count) = counting(Duration::from_secs(3));

        debouncer.poke();
        tokio::time::sleep(Duration::from_secs(1)).await;
        debouncer.cancel();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
