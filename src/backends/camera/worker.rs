// SPDX-License-Identifier: GPL-3.0-only

//! Background worker thread for camera callbacks
//!
//! Exactly one worker exists per controller. It is created at startup and
//! handed to both the controller and the camera platform, which posts every
//! device and session callback onto it. Posting is the only way to run code on
//! the worker, so "runs on the camera thread" is a property of the call site
//! rather than a convention.

use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

enum WorkerMessage {
    Run(Job),
    Stop,
}

/// Cloneable handle for posting jobs onto the worker thread
#[derive(Clone)]
pub struct WorkerHandle {
    tx: mpsc::UnboundedSender<WorkerMessage>,
    name: Arc<str>,
    thread_id: ThreadId,
}

impl WorkerHandle {
    /// Queue `job` to run on the worker thread
    ///
    /// Returns false if the worker has already stopped; the job is dropped.
    pub fn post<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        if self.tx.send(WorkerMessage::Run(Box::new(job))).is_err() {
            warn!(name = %self.name, "Worker stopped, dropping job");
            return false;
        }
        true
    }

    /// True when called from the worker thread itself
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_alive(&self) -> bool {
        !self.tx.is_closed()
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("name", &self.name)
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Owner of the worker thread
///
/// Dropping the owner stops the thread after the jobs already queued.
pub struct WorkerThread {
    thread_handle: Option<JoinHandle<()>>,
    handle: WorkerHandle,
}

impl WorkerThread {
    /// Spawn a named worker thread
    pub fn start(name: &str) -> std::io::Result<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<WorkerMessage>();
        let thread_name = name.to_string();

        info!(name = %name, "Starting camera worker thread");

        let thread_handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                debug!(name = %thread_name, "Worker thread started");

                while let Some(message) = rx.blocking_recv() {
                    match message {
                        WorkerMessage::Run(job) => job(),
                        WorkerMessage::Stop => {
                            debug!(name = %thread_name, "Stop requested");
                            break;
                        }
                    }
                }

                rx.close();
                info!(name = %thread_name, "Worker thread exiting");
            })?;

        let handle = WorkerHandle {
            tx,
            name: Arc::from(name),
            thread_id: thread_handle.thread().id(),
        };

        Ok(Self {
            thread_handle: Some(thread_handle),
            handle,
        })
    }

    /// Handle for posting jobs and for injection into the controller
    pub fn handle(&self) -> WorkerHandle {
        self.handle.clone()
    }

    /// Stop after queued jobs and wait for the thread
    pub fn stop(&mut self) {
        let _ = self.handle.tx.send(WorkerMessage::Stop);
        self.join();
    }

    fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            if let Err(e) = handle.join() {
                warn!(name = %self.handle.name, "Worker thread panicked: {:?}", e);
            }
        }
    }
}

impl Drop for WorkerThread {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            debug!(name = %self.handle.name, "WorkerThread dropped, stopping");
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::mpsc as std_mpsc;
    use std::time::Duration;

    #[test]
    fn test_jobs_run_in_order_on_worker() {
        let mut worker = WorkerThread::start("test-worker").unwrap();
        let handle = worker.handle();
        let (tx, rx) = std_mpsc::channel();

        for i in 0..5u32 {
            let tx = tx.clone();
            let h = handle.clone();
            handle.post(move || {
                tx.send((i, h.is_current())).unwrap();
            });
        }

        let results: Vec<_> = (0..5)
            .map(|_| rx.recv_timeout(Duration::from_secs(1)).unwrap())
            .collect();
        assert_eq!(results.iter().map(|r| r.0).collect::<Vec<_>>(), [0, 1, 2, 3, 4]);
        assert!(results.iter().all(|r| r.1));
        assert!(!handle.is_current());

        worker.stop();
    }

    #[test]
    fn test_stop_drains_queued_jobs() {
        let counter = Arc::new(AtomicU32::new(0));
        let mut worker = WorkerThread::start("test-drain").unwrap();
        let handle = worker.handle();

        for _ in 0..10 {
            let counter = Arc::clone(&counter);
            handle.post(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        worker.stop();

        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_post_after_stop_is_rejected() {
        let mut worker = WorkerThread::start("test-stopped").unwrap();
        let handle = worker.handle();
        worker.stop();

        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = Arc::clone(&ran);
        assert!(!handle.post(move || ran_clone.store(true, Ordering::SeqCst)));
        assert!(!handle.is_alive());
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_drop_stops_thread() {
        let worker = WorkerThread::start("test-drop").unwrap();
        let handle = worker.handle();
        drop(worker);
        assert!(!handle.is_alive());
    }
}
