//! In-flight request deduplication. The first caller for a key becomes the
//! leader and drives the producer; later callers for the same key become
//! followers that replay everything the leader has already produced, then
//! switch onto the live stream — built on `tokio::sync::broadcast` wrapped
//! with an explicit history buffer, since plain `broadcast` drops events
//! that predate a receiver's subscription.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use gw_llm::{Chunk, ProviderError};
use tokio::sync::{broadcast, mpsc};

#[derive(Clone, Debug)]
enum CoalesceEvent {
    Chunk(Chunk),
    Failed(String),
    Done,
}

struct CoalesceEntry {
    history: Mutex<Vec<Chunk>>,
    tx: broadcast::Sender<CoalesceEvent>,
    terminal: Mutex<Option<Result<(), String>>>,
    ref_count: AtomicUsize,
}

#[derive(Default)]
pub struct Coalescer {
    entries: Mutex<HashMap<String, Arc<CoalesceEntry>>>,
}

impl Coalescer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// `run(key, producer) → Stream`. `producer` is invoked at most once
    /// per in-flight key, only by whichever caller attaches first.
    pub async fn run<F, Fut>(self: &Arc<Self>, key: String, producer: F) -> mpsc::Receiver<Result<Chunk, ProviderError>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<mpsc::Receiver<Result<Chunk, ProviderError>>, ProviderError>> + Send + 'static,
    {
        let (entry, is_leader) = self.attach_or_create(&key);

        if is_leader {
            let leader_entry = entry.clone();
            tokio::spawn(async move {
                match producer().await {
                    Ok(mut upstream) => {
                        loop {
                            match upstream.recv().await {
                                Some(Ok(chunk)) => {
                                    leader_entry.history.lock().unwrap().push(chunk.clone());
                                    let _ = leader_entry.tx.send(CoalesceEvent::Chunk(chunk));
                                }
                                Some(Err(err)) => {
                                    *leader_entry.terminal.lock().unwrap() = Some(Err(err.message.clone()));
                                    let _ = leader_entry.tx.send(CoalesceEvent::Failed(err.message));
                                    return;
                                }
                                None => break,
                            }
                        }
                        *leader_entry.terminal.lock().unwrap() = Some(Ok(()));
                        let _ = leader_entry.tx.send(CoalesceEvent::Done);
                    }
                    Err(err) => {
                        *leader_entry.terminal.lock().unwrap() = Some(Err(err.message.clone()));
                        let _ = leader_entry.tx.send(CoalesceEvent::Failed(err.message));
                    }
                }
            });
        }

        self.spawn_follower_channel(key, entry)
    }

    fn attach_or_create(&self, key: &str) -> (Arc<CoalesceEntry>, bool) {
        let mut guard = self.entries.lock().unwrap();
        if let Some(existing) = guard.get(key) {
            existing.ref_count.fetch_add(1, Ordering::SeqCst);
            (existing.clone(), false)
        } else {
            let (tx, _rx) = broadcast::channel(256);
            let entry = Arc::new(CoalesceEntry {
                history: Mutex::new(Vec::new()),
                tx,
                terminal: Mutex::new(None),
                ref_count: AtomicUsize::new(1),
            });
            guard.insert(key.to_string(), entry.clone());
            (entry, true)
        }
    }

    fn spawn_follower_channel(
        self: &Arc<Self>,
        key: String,
        entry: Arc<CoalesceEntry>,
    ) -> mpsc::Receiver<Result<Chunk, ProviderError>> {
        // Subscribe while still holding the history lock so no chunk
        // produced between the snapshot and the subscription is missed.
        let (replay, mut broadcast_rx, already_terminal) = {
            let history = entry.history.lock().unwrap();
            let rx = entry.tx.subscribe();
            (history.clone(), rx, entry.terminal.lock().unwrap().clone())
        };

        let (out_tx, out_rx) = mpsc::channel(128);
        let coalescer = self.clone();
        tokio::spawn(async move {
            for chunk in replay {
                if out_tx.send(Ok(chunk)).await.is_err() {
                    coalescer.detach(&key);
                    return;
                }
            }
            match already_terminal {
                Some(Err(message)) => {
                    let _ = out_tx.send(Err(ProviderError::transient(message))).await;
                    coalescer.detach(&key);
                    return;
                }
                Some(Ok(())) => {
                    coalescer.detach(&key);
                    return;
                }
                None => {}
            }
            loop {
                match broadcast_rx.recv().await {
                    Ok(CoalesceEvent::Chunk(chunk)) => {
                        if out_tx.send(Ok(chunk)).await.is_err() {
                            break;
                        }
                    }
                    Ok(CoalesceEvent::Failed(message)) => {
                        let _ = out_tx.send(Err(ProviderError::transient(message))).await;
                        break;
                    }
                    Ok(CoalesceEvent::Done) => break,
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                }
            }
            coalescer.detach(&key);
        });
        out_rx
    }

    fn detach(&self, key: &str) {
        let mut guard = self.entries.lock().unwrap();
        if let Some(entry) = guard.get(key) {
            if entry.ref_count.fetch_sub(1, Ordering::SeqCst) == 1 {
                guard.remove(key);
            }
        }
    }

    pub fn in_flight_count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}
