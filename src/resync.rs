//! Directory re-sync queue
//!
//! Listing a folder may reveal stale metadata. Instead of refreshing inline,
//! the store submits a [`ResyncTask`] to a worker thread that calls the
//! caller-supplied [`DirectoryRefresher`] and, once it succeeds, signals the
//! folder's address on the [`ChangeBus`].

use crate::address::ResourceAddress;
use crate::notify::ChangeBus;
use crate::Result;
use crossbeam::channel::{self, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, warn};

/// Refreshes one folder from the server. Implemented by the sync layer.
pub trait DirectoryRefresher: Send + Sync + 'static {
    fn refresh(&self, account: &str, directory_id: i64) -> Result<()>;
}

/// A folder waiting to be refreshed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResyncTask {
    pub address: ResourceAddress,
    pub account: String,
    pub directory_id: i64,
}

impl ResyncTask {
    pub fn new(address: ResourceAddress, account: impl Into<String>, directory_id: i64) -> Self {
        Self {
            address,
            account: account.into(),
            directory_id,
        }
    }
}

/// Submitting side of a [`ResyncQueue`]; cheap to clone.
#[derive(Debug, Clone)]
pub struct ResyncHandle {
    sender: Sender<ResyncTask>,
}

impl ResyncHandle {
    /// Queue a task; returns false once the queue has shut down
    pub fn submit(&self, task: ResyncTask) -> bool {
        debug!("Queueing re-sync of {}", task.address);
        self.sender.send(task).is_ok()
    }
}

/// Worker thread consuming re-sync tasks in submission order.
pub struct ResyncQueue {
    sender: Option<Sender<ResyncTask>>,
    stop: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl ResyncQueue {
    /// Start the worker
    pub fn start(refresher: Arc<dyn DirectoryRefresher>, bus: ChangeBus) -> Result<Self> {
        let (sender, receiver) = channel::unbounded::<ResyncTask>();
        let (stop, stopped) = channel::bounded::<()>(0);
        let worker = std::thread::Builder::new()
            .name("syncstore-resync".to_string())
            .spawn(move || {
                let run = |task: ResyncTask| {
                    match refresher.refresh(&task.account, task.directory_id) {
                        Ok(()) => bus.notify(&task.address),
                        Err(e) => warn!("Re-sync of {} failed: {}", task.address, e),
                    }
                };
                loop {
                    crossbeam::select! {
                        recv(receiver) -> task => match task {
                            Ok(task) => run(task),
                            Err(_) => break,
                        },
                        recv(stopped) -> _ => {
                            receiver.try_iter().for_each(&run);
                            break;
                        }
                    }
                }
                debug!("Re-sync worker stopped");
            })?;

        Ok(Self {
            sender: Some(sender),
            stop: Some(stop),
            worker: Some(worker),
        })
    }

    pub fn handle(&self) -> Option<ResyncHandle> {
        self.sender.as_ref().map(|sender| ResyncHandle {
            sender: sender.clone(),
        })
    }

    /// Run the tasks already queued, then join the worker. Handles still
    /// held elsewhere start returning false from `submit`.
    pub fn shutdown(&mut self) {
        self.sender.take();
        self.stop.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Re-sync worker panicked");
            }
        }
    }
}

impl Drop for ResyncQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{Resource, Router};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(String, i64)>>,
    }

    impl DirectoryRefresher for Recorder {
        fn refresh(&self, account: &str, directory_id: i64) -> Result<()> {
            self.seen
                .lock()
                .unwrap()
                .push((account.to_string(), directory_id));
            Ok(())
        }
    }

    #[test]
    fn test_completed_task_signals_folder() {
        let router = Router::new("org.syncstore");
        let bus = ChangeBus::new();
        let folder = router.address(Resource::Directory(Some(3)));
        let rx = bus.subscribe(folder.clone(), false);

        let recorder = Arc::new(Recorder::default());
        let mut queue = ResyncQueue::start(recorder.clone(), bus.clone()).unwrap();
        let handle = queue.handle().unwrap();
        assert!(handle.submit(ResyncTask::new(folder.clone(), "alice@host", 3)));

        let event = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(event.address, folder);

        drop(handle);
        queue.shutdown();
        assert_eq!(
            *recorder.seen.lock().unwrap(),
            vec![("alice@host".to_string(), 3)]
        );
        assert!(queue.handle().is_none());
    }
}
