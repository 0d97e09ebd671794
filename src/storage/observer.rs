//! Observer that writes emitted opportunities to storage.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::domain::Opportunity;
use crate::monitor::{MonitorEvent, Observer};
use crate::storage::{OpportunityStorage, StorageError};

/// StorageObserver persists every opportunity it receives.
///
/// Writes happen on a background task so coordinator workers never wait on
/// the database. Other monitor events are ignored.
pub struct StorageObserver {
    storage: Arc<dyn OpportunityStorage>,
    sender: Mutex<Option<mpsc::UnboundedSender<Opportunity>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl StorageObserver {
    pub fn new(storage: Arc<dyn OpportunityStorage>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_writer(storage.clone(), receiver));

        Self {
            storage,
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Flushes pending writes and closes the storage.
    pub async fn close(&self) -> Result<(), StorageError> {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                error!(error = %e, "storage writer failed");
            }
        }

        match self.storage.count().await {
            Ok(stored) => info!(stored, "opportunity log flushed"),
            Err(e) => warn!(error = %e, "failed to count stored opportunities"),
        }

        self.storage.close().await
    }
}

impl Observer for StorageObserver {
    fn notify(&self, event: MonitorEvent) {
        let MonitorEvent::Opportunity(opp) = event else {
            return;
        };

        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        match sender.as_ref() {
            Some(sender) => {
                if sender.send(opp).is_err() {
                    warn!("storage writer is gone, opportunity dropped");
                }
            }
            None => debug!(id = %opp.id, "storage closed, opportunity dropped"),
        }
    }
}

async fn run_writer(
    storage: Arc<dyn OpportunityStorage>,
    mut receiver: mpsc::UnboundedReceiver<Opportunity>,
) {
    while let Some(opp) = receiver.recv().await {
        match storage.save(&opp).await {
            Ok(true) => {}
            Ok(false) => debug!(id = %opp.id, symbol = %opp.symbol, "repeat opportunity not stored"),
            Err(e) => error!(id = %opp.id, symbol = %opp.symbol, error = %e, "failed to store opportunity"),
        }
    }
}
