//! Thread persistence. `InMemoryThreadStore` is the only backing
//! implementation shipped; the trait exists so a durable store can be
//! substituted later without touching Dispatch, per spec.md §3.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::schema::{MemoryError, Thread};

#[async_trait]
pub trait ThreadPersistence: Send + Sync {
    async fn load(&self, thread_id: Uuid) -> Result<Option<Thread>, MemoryError>;
    async fn save(&self, thread: &Thread) -> Result<(), MemoryError>;
}

#[derive(Default)]
pub struct InMemoryThreadStore {
    threads: Mutex<HashMap<Uuid, Thread>>,
}

impl InMemoryThreadStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ThreadPersistence for InMemoryThreadStore {
    async fn load(&self, thread_id: Uuid) -> Result<Option<Thread>, MemoryError> {
        Ok(self.threads.lock().unwrap().get(&thread_id).cloned())
    }

    async fn save(&self, thread: &Thread) -> Result<(), MemoryError> {
        self.threads
            .lock()
            .unwrap()
            .insert(thread.id, thread.clone());
        Ok(())
    }
}
