use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, error, info};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::service::LedgerNode;

pub const NEIGHBOR_SYNC: &str = "neighbor-sync";
pub const CONFLICT_RESOLUTION: &str = "conflict-resolution";
pub const MINING: &str = "mining";

/// A running periodic task and its own stop signal
struct Task {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Task {
    fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

/// Owns the node's periodic tasks for the lifetime of the process.
///
/// Each task runs its job, then sleeps for its interval, until it is
/// stopped by name or the supervisor shuts down.
pub struct Supervisor {
    shut_down: AtomicBool,
    tasks: Mutex<HashMap<&'static str, Task>>,
}

impl Supervisor {
    pub fn new() -> Self {
        Supervisor {
            shut_down: AtomicBool::new(false),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    fn tasks(&self) -> MutexGuard<'_, HashMap<&'static str, Task>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts `job` on a fixed interval under `name`.
    ///
    /// Returns false if a task with that name is already running or the
    /// supervisor has been shut down.
    pub fn spawn_periodic<F, Fut>(&self, name: &'static str, interval: Duration, job: F) -> bool
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks();

        if self.shut_down.load(Ordering::SeqCst) || tasks.get(name).map_or(false, Task::is_running) {
            return false;
        }

        let (stop_tx, mut stop) = watch::channel(false);
        let handle = tokio::spawn(async move {
            loop {
                if *stop.borrow() {
                    break;
                }

                job().await;

                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = stop.changed() => break,
                }
            }
            debug!("Task {} stopped", name);
        });

        tasks.insert(
            name,
            Task {
                stop: stop_tx,
                handle,
            },
        );
        info!("Started task {} every {:?}", name, interval);
        true
    }

    #[cfg(test)]
    pub fn is_running(&self, name: &str) -> bool {
        self.tasks().get(name).map_or(false, Task::is_running)
    }

    /// Stops one task and waits for it, leaving the others running.
    ///
    /// Returns false if no task with that name was running. A stopped task
    /// can be started again.
    pub async fn stop(&self, name: &str) -> bool {
        let task = self.tasks().remove(name);
        let Some(task) = task else {
            return false;
        };

        let was_running = task.is_running();
        task.stop.send_replace(true);
        if let Err(err) = task.handle.await {
            error!("Task {} ended abnormally: {}", name, err);
        }
        info!("Stopped task {}", name);
        was_running
    }

    pub fn start_neighbor_sync(&self, node: Arc<LedgerNode>, interval: Duration) -> bool {
        self.spawn_periodic(NEIGHBOR_SYNC, interval, move || {
            let node = Arc::clone(&node);
            async move { node.sync_neighbors().await }
        })
    }

    pub fn start_conflict_resolution(&self, node: Arc<LedgerNode>, interval: Duration) -> bool {
        self.spawn_periodic(CONFLICT_RESOLUTION, interval, move || {
            let node = Arc::clone(&node);
            async move {
                node.resolve_conflicts().await;
            }
        })
    }

    /// Starts the mining loop; a no-op if it is already running
    pub fn start_mining(&self, node: Arc<LedgerNode>, interval: Duration) -> bool {
        self.spawn_periodic(MINING, interval, move || {
            let node = Arc::clone(&node);
            async move {
                node.mine_once().await;
            }
        })
    }

    /// Signals every task to stop and waits for them. No task can be
    /// started afterwards.
    pub async fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);

        let tasks: Vec<_> = self.tasks().drain().collect();
        for (_, task) in &tasks {
            task.stop.send_replace(true);
        }

        for (name, task) in tasks {
            if let Err(err) = task.handle.await {
                error!("Task {} ended abnormally: {}", name, err);
            }
        }
        info!("Supervisor stopped");
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}
