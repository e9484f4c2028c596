// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Background job execution
//!
//! A [`Job`] names a node and the statistics to recompute there. Jobs are
//! fire-and-forget: submission returns as soon as the job is queued, there
//! is no ordering between jobs, and handlers must be safe to run twice.
//!
//! [`LocalJobRunner`] is a process-local pool of tokio workers sharing one
//! unbounded queue. Handlers may submit further jobs from inside a worker.

use crate::error::{Error, Result};
use crate::node::TreeItem;
use crate::stat::StatName;
use async_trait::async_trait;
use log::{debug, error};
use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, Notify, mpsc};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Unit of background work: recompute `names` at `item`
#[derive(Clone, Debug)]
pub struct Job {
    pub item: TreeItem,
    pub names: Vec<StatName>,
}

impl Job {
    pub fn new<I>(item: TreeItem, names: I) -> Self
    where
        I: IntoIterator<Item = StatName>,
    {
        Self {
            item,
            names: names.into_iter().collect(),
        }
    }
}

/// Executes a job body
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn run(&self, job: Job) -> Result<()>;
}

/// Accepts jobs for later execution on some worker
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn submit(&self, job: Job) -> Result<()>;
}

/// Queue plus worker pool, all within this process
pub struct LocalJobRunner {
    sender: mpsc::UnboundedSender<Job>,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<Job>>>,
    outstanding: Arc<AtomicUsize>,
    failed: Arc<AtomicUsize>,
    idle: Arc<Notify>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl Default for LocalJobRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalJobRunner {
    /// Create the queue. Jobs submitted before [`LocalJobRunner::start`]
    /// wait in the queue.
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Arc::new(Mutex::new(receiver)),
            outstanding: Arc::new(AtomicUsize::new(0)),
            failed: Arc::new(AtomicUsize::new(0)),
            idle: Arc::new(Notify::new()),
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Spawn `workers` tasks (at least one) running `handler`.
    ///
    /// Workers hold `handler` weakly; once its last owner drops it, they
    /// abandon the queue and exit. Must be called from within a tokio
    /// runtime.
    pub fn start(&self, handler: Arc<dyn JobHandler>, workers: usize) {
        let workers = workers.max(1);
        debug!("starting {} stats workers", workers);
        for id in 0..workers {
            let worker = Worker {
                id,
                handler: Arc::downgrade(&handler),
                receiver: self.receiver.clone(),
                outstanding: self.outstanding.clone(),
                failed: self.failed.clone(),
                idle: self.idle.clone(),
                shutdown: self.shutdown.clone(),
            };
            _ = self.tracker.spawn(worker.run());
        }
    }

    /// Jobs submitted and not yet finished
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Jobs whose handler returned an error
    pub fn failed_jobs(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Wait until every submitted job, including jobs submitted by other
    /// jobs, has finished
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            _ = notified.as_mut().enable();
            if self.outstanding() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Stop the workers. Queued jobs that have not started are abandoned
    /// and further submissions fail with [`Error::QueueClosed`].
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        _ = self.tracker.close();
        self.tracker.wait().await;
        debug!(
            "stats workers stopped with {} jobs abandoned",
            self.outstanding()
        );
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

#[async_trait]
impl JobRunner for LocalJobRunner {
    async fn submit(&self, job: Job) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(Error::QueueClosed);
        }
        debug!("submit job for {} ({} stats)", job.item.cache_key(), job.names.len());
        _ = self.outstanding.fetch_add(1, Ordering::SeqCst);
        if self.sender.send(job).is_err() {
            self.finish_one();
            return Err(Error::QueueClosed);
        }
        Ok(())
    }
}

impl Drop for LocalJobRunner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl LocalJobRunner {
    fn finish_one(&self) {
        if self.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

struct Worker {
    id: usize,
    handler: Weak<dyn JobHandler>,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<Job>>>,
    outstanding: Arc<AtomicUsize>,
    failed: Arc<AtomicUsize>,
    idle: Arc<Notify>,
    shutdown: CancellationToken,
}

impl Worker {
    async fn run(self) {
        loop {
            let job = {
                let mut receiver = self.receiver.lock().await;
                tokio::select! {
                    _ = self.shutdown.cancelled() => None,
                    job = receiver.recv() => job,
                }
            };
            let Some(job) = job else {
                break;
            };

            let key = job.item.cache_key();
            let Some(handler) = self.handler.upgrade() else {
                debug!("worker {} dropping job for {}: handler gone", self.id, key);
                self.finish_one();
                break;
            };
            debug!("worker {} running job for {}", self.id, key);
            let result = handler.run(job).await;
            drop(handler);
            if let Err(e) = result {
                error!("stats job for {} failed: {}", key, e);
                _ = self.failed.fetch_add(1, Ordering::SeqCst);
            }

            self.finish_one();
        }
        debug!("worker {} exiting", self.id);
    }

    fn finish_one(&self) {
        if self.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeHandle, TreeNode};

    struct Named(String);

    #[async_trait]
    impl TreeNode for Named {
        fn cache_key(&self) -> String {
            self.0.clone()
        }

        async fn get_children(&self) -> Result<Vec<NodeHandle>> {
            Ok(Vec::new())
        }

        async fn get_parents(&self) -> Result<Vec<NodeHandle>> {
            Ok(Vec::new())
        }
    }

    fn job(key: &str) -> Job {
        Job::new(TreeItem::new(Arc::new(Named(key.to_string()))), StatName::ALL)
    }

    /// Records jobs; a job for `/chain/N` submits `/chain/N-1`
    struct Recorder {
        seen: Mutex<Vec<String>>,
        runner: Mutex<Option<Arc<LocalJobRunner>>>,
    }

    #[async_trait]
    impl JobHandler for Recorder {
        async fn run(&self, job: Job) -> Result<()> {
            let key = job.item.cache_key();
            self.seen.lock().await.push(key.clone());
            if key == "/fail" {
                return Err(Error::node(key, "boom"));
            }
            if let Some(n) = key.strip_prefix("/chain/").and_then(|n| n.parse::<u32>().ok()) {
                if n > 0 {
                    let runner = self.runner.lock().await.clone();
                    if let Some(runner) = runner {
                        runner.submit(job_for(n - 1)).await?;
                    }
                }
            }
            Ok(())
        }
    }

    fn job_for(n: u32) -> Job {
        job(&format!("/chain/{}", n))
    }

    #[tokio::test]
    async fn test_pool_runs_nested_jobs_until_idle() {
        let runner = Arc::new(LocalJobRunner::new());
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
            runner: Mutex::new(Some(runner.clone())),
        });
        runner.start(recorder.clone(), 3);

        runner.submit(job_for(4)).await.unwrap();
        runner.submit(job("/fail")).await.unwrap();
        runner.wait_idle().await;

        let mut seen = recorder.seen.lock().await.clone();
        seen.sort();
        assert_eq!(
            seen,
            vec!["/chain/0", "/chain/1", "/chain/2", "/chain/3", "/chain/4", "/fail"]
        );
        assert_eq!(runner.outstanding(), 0);
        assert_eq!(runner.failed_jobs(), 1);

        *recorder.runner.lock().await = None;
        runner.shutdown().await;
    }

    #[tokio::test]
    async fn test_submit_after_shutdown() {
        let runner = LocalJobRunner::new();
        runner.shutdown().await;
        assert!(runner.is_shut_down());
        assert!(matches!(
            runner.submit(job("/af/")).await,
            Err(Error::QueueClosed)
        ));
    }

    #[tokio::test]
    async fn test_queued_job_waits_for_workers() {
        let runner = Arc::new(LocalJobRunner::new());
        runner.submit(job("/af/")).await.unwrap();
        assert_eq!(runner.outstanding(), 1);

        let mut idle = tokio_test::task::spawn(runner.wait_idle());
        tokio_test::assert_pending!(idle.poll());
        drop(idle);

        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
            runner: Mutex::new(None),
        });
        runner.start(recorder.clone(), 1);
        runner.wait_idle().await;

        assert_eq!(*recorder.seen.lock().await, vec!["/af/".to_string()]);
        runner.shutdown().await;
    }

    #[tokio::test]
    async fn test_workers_exit_when_runner_dropped() {
        let runner = LocalJobRunner::new();
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
            runner: Mutex::new(None),
        });
        runner.start(recorder.clone(), 2);
        runner.submit(job("/af/")).await.unwrap();
        runner.wait_idle().await;

        let tracker = runner.tracker.clone();
        drop(runner);
        _ = tracker.close();
        let exited = tokio::time::timeout(std::time::Duration::from_secs(5), tracker.wait()).await;
        assert!(exited.is_ok());
        assert_eq!(*recorder.seen.lock().await, vec!["/af/".to_string()]);
    }

    #[tokio::test]
    async fn test_wait_idle_without_jobs() {
        let runner = LocalJobRunner::new();
        runner.wait_idle().await;
        assert_eq!(runner.outstanding(), 0);
    }
}
