use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

/// Flush policy for a [`WriteBehind`] buffer: flush as soon as
/// `max_batch` distinct keys are pending, or once `quiet_delay` passes
/// with no new writes, whichever comes first.
#[derive(Clone, Copy, Debug)]
pub struct BatchPolicy {
    pub max_batch: usize,
    pub quiet_delay: Duration,
}

impl BatchPolicy {
    pub fn new(max_batch: usize, quiet_delay: Duration) -> Self {
        Self {
            max_batch: max_batch.max(1),
            quiet_delay,
        }
    }

    /// Debounce-only policy: the count trigger never fires.
    pub fn debounce(quiet_delay: Duration) -> Self {
        Self {
            max_batch: usize::MAX,
            quiet_delay,
        }
    }
}

enum Cmd<K, V> {
    Push(K, V),
    Flush(oneshot::Sender<()>),
    Close(oneshot::Sender<()>),
}

/// Keyed write-behind buffer.
///
/// Writes coalesce per key (last write wins) in a buffer owned by a
/// spawned worker task; the sink receives whole batches. `push` is
/// synchronous and never fails from the caller's side. Closing the
/// handle, explicitly via [`close`](Self::close) or by dropping it,
/// makes the worker flush whatever is pending exactly once and exit,
/// so no timer outlives the buffer. Must be created inside a tokio
/// runtime.
pub struct WriteBehind<K, V> {
    tx: mpsc::UnboundedSender<Cmd<K, V>>,
}

impl<K, V> WriteBehind<K, V>
where
    K: Eq + Hash + Send + 'static,
    V: Send + 'static,
{
    pub fn spawn<S, Fut>(policy: BatchPolicy, mut sink: S) -> Self
    where
        S: FnMut(Vec<(K, V)>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<Cmd<K, V>>();
        tokio::spawn(async move {
            let mut pending: HashMap<K, V> = HashMap::new();
            let mut deadline = Instant::now();
            loop {
                tokio::select! {
                    cmd = rx.recv() => match cmd {
                        Some(Cmd::Push(k, v)) => {
                            pending.insert(k, v);
                            deadline = Instant::now() + policy.quiet_delay;
                            if pending.len() >= policy.max_batch {
                                drain(&mut pending, &mut sink).await;
                            }
                        }
                        Some(Cmd::Flush(done)) => {
                            drain(&mut pending, &mut sink).await;
                            let _ = done.send(());
                        }
                        Some(Cmd::Close(done)) => {
                            drain(&mut pending, &mut sink).await;
                            let _ = done.send(());
                            break;
                        }
                        // All handles dropped: final flush, then exit.
                        None => {
                            drain(&mut pending, &mut sink).await;
                            break;
                        }
                    },
                    _ = tokio::time::sleep_until(deadline), if !pending.is_empty() => {
                        drain(&mut pending, &mut sink).await;
                    }
                }
            }
        });
        Self { tx }
    }

    /// Buffer one write; a later push for the same key overwrites it.
    pub fn push(&self, key: K, value: V) {
        let _ = self.tx.send(Cmd::Push(key, value));
    }

    /// Flush now and wait until the batch has been handed to the sink.
    pub async fn flush(&self) {
        let (done, ack) = oneshot::channel();
        if self.tx.send(Cmd::Flush(done)).is_ok() {
            let _ = ack.await;
        }
    }

    /// Final flush; the worker exits and later pushes are dropped.
    pub async fn close(&self) {
        let (done, ack) = oneshot::channel();
        if self.tx.send(Cmd::Close(done)).is_ok() {
            let _ = ack.await;
        }
    }
}

async fn drain<K, V, S, Fut>(pending: &mut HashMap<K, V>, sink: &mut S)
where
    S: FnMut(Vec<(K, V)>) -> Fut,
    Fut: Future<Output = ()>,
{
    if pending.is_empty() {
        return;
    }
    let batch: Vec<(K, V)> = pending.drain().collect();
    sink(batch).await;
}
