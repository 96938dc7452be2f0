// src/pool.rs

use std::future::Future;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use futures::future::join_all;
use log::warn;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Bounded fan-out pool: at most `workers` submitted tasks run concurrently,
/// and [`WorkerPool::join`] does not return until every task has finished.
///
/// Workers are slots, not dedicated threads: a task holds a slot from the
/// moment it starts until it completes, and slots are reused across tasks.
/// The orchestrator must drive `join` to completion; a pool dropped without
/// joining leaves its tasks running detached.
pub struct WorkerPool<T> {
    permits: Arc<Semaphore>,
    handles: Vec<JoinHandle<T>>,
}

impl<T: Send + 'static> WorkerPool<T> {
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(anyhow!("worker pool requires at least one worker"));
        }
        Ok(Self {
            permits: Arc::new(Semaphore::new(workers)),
            handles: Vec::new(),
        })
    }

    /// Schedules one task. The task body starts only once a worker slot
    /// frees up, and holds the slot until it completes.
    pub fn submit<F>(&mut self, task: F)
    where
        F: Future<Output = T> + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        self.handles.push(tokio::spawn(async move {
            // The semaphore is never closed while any handle is live, so
            // acquisition cannot fail here.
            let _slot = permits
                .acquire_owned()
                .await
                .expect("worker pool semaphore closed");
            task.await
        }));
    }

    /// Waits for every submitted task and collects the outcomes. A panicked
    /// task contributes no outcome but does not disturb its siblings.
    pub async fn join(self) -> Vec<T> {
        let mut outcomes = Vec::with_capacity(self.handles.len());
        for joined in join_all(self.handles).await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => warn!("Worker task did not run to completion: {}", e),
            }
        }
        outcomes
    }
}
