// Copyright (C) 2026  Caprica Software Limited
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Service lifecycle and thread ownership.
//!
//! The [`ServiceContainer`] is the one place where long-lived services are
//! created, assigned to worker threads, and torn down again. Services that
//! must not run on the main control flow get a dedicated worker; services
//! that have to share thread affinity (say, a storage façade that wraps a
//! connection owner) are constructed onto an existing worker. The
//! container never executes business logic itself; it is wiring and
//! lifecycle only.
//!
//! # Shutdown
//!
//! Teardown order matters: a service whose cleanup touches objects owned
//! by another worker has to finish that cleanup while the other worker is
//! still alive. Shutdown therefore runs in phases:
//!
//! 1. Eager teardown steps registered during building, in order, each run
//!    to completion on the calling thread.
//! 2. Every worker-owned service is scheduled for destruction on its own
//!    worker (non-blocking), dependents before the services they use.
//! 3. Every worker is signalled to stop accepting work.
//! 4. Every worker is joined.
//!
//! Signalling all workers before joining any of them means no worker can
//! end up blocked waiting on another worker that is itself being joined.

pub(crate) mod worker;

mod service;

pub use service::ServiceHandle;

use anyhow::Result;
use log::{debug, info};
use thiserror::Error;

use crate::container::worker::{TaskSender, Worker};

/// Identifies a worker allocated by a [`ServiceContainer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerId(usize);

/// Lifecycle states of a [`ServiceContainer`].
///
/// Services can only be added while `Building`; the worker and service
/// registry is read-only once `Running`, which is why no lock guards it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Building,
    Running,
    Stopping,
    Stopped,
}

#[derive(Debug, Error)]
pub enum ContainerError {
    /// Allocating a worker thread failed. Unrecoverable during startup.
    #[error("failed to spawn worker '{name}': {source}")]
    WorkerSpawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// A service's initialiser returned an error. Unrecoverable during
    /// startup.
    #[error("failed to construct service '{name}': {reason}")]
    ServiceInit { name: String, reason: String },

    #[error("worker '{name}' is no longer running")]
    WorkerGone { name: String },

    #[error("service '{name}' has been destroyed")]
    ServiceStopped { name: String },

    #[error("no worker with id {0:?}")]
    UnknownWorker(WorkerId),

    #[error("services can only be added while building (state: {0:?})")]
    NotBuilding(ContainerState),
}

/// Builds the graph of long-lived services and owns their shutdown.
pub struct ServiceContainer {
    state: ContainerState,
    workers: Vec<Worker>,
    // Destruction tasks for worker-owned services, in construction order.
    deferred: Vec<(WorkerId, worker::Task)>,
    // Order-sensitive teardown, run before anything else at shutdown.
    eager_teardown: Vec<Box<dyn FnOnce() + Send>>,
}

impl ServiceContainer {
    pub fn new() -> Self {
        Self {
            state: ContainerState::Building,
            workers: Vec::new(),
            deferred: Vec::new(),
            eager_teardown: Vec::new(),
        }
    }

    pub fn state(&self) -> ContainerState {
        self.state
    }

    /// Allocates a new worker and constructs `service` on it.
    ///
    /// The service's whole life happens on that worker: `init` runs there,
    /// every [`ServiceHandle::invoke`] call runs there, and the service is
    /// dropped there during shutdown.
    pub fn create_on_dedicated_worker<S, F>(
        &mut self,
        name: &str,
        init: F,
    ) -> Result<ServiceHandle<S>, ContainerError>
    where
        S: Send + 'static,
        F: FnOnce() -> Result<S> + Send + 'static,
    {
        self.ensure_building()?;

        let worker = Worker::spawn(name)?;
        let id = WorkerId(self.workers.len());
        self.workers.push(worker);

        self.construct(name, id, init)
    }

    /// Constructs `service` on a worker allocated for another service, so
    /// the two share thread affinity.
    pub fn create_on_existing_worker<S, F>(
        &mut self,
        name: &str,
        worker: WorkerId,
        init: F,
    ) -> Result<ServiceHandle<S>, ContainerError>
    where
        S: Send + 'static,
        F: FnOnce() -> Result<S> + Send + 'static,
    {
        self.ensure_building()?;

        if worker.0 >= self.workers.len() {
            return Err(ContainerError::UnknownWorker(worker));
        }

        self.construct(name, worker, init)
    }

    /// Registers an order-sensitive teardown step.
    ///
    /// Steps run at the very start of shutdown, in registration order,
    /// each to completion before the next, while every worker is still
    /// alive. This is where cleanup that reaches into another worker's
    /// objects belongs.
    pub fn register_eager_teardown(
        &mut self,
        step: Box<dyn FnOnce() + Send>,
    ) -> Result<(), ContainerError> {
        self.ensure_building()?;
        self.eager_teardown.push(step);
        Ok(())
    }

    /// Marks the graph complete. No further services can be added.
    pub fn finish_building(&mut self) -> Result<(), ContainerError> {
        self.ensure_building()?;
        self.state = ContainerState::Running;
        info!(
            "service graph running ({} workers, {} services)",
            self.workers.len(),
            self.deferred.len()
        );
        Ok(())
    }

    /// Tears the graph down and blocks until every worker has stopped.
    ///
    /// Safe to call once from any state; calling it on an already stopped
    /// container does nothing.
    pub fn shutdown(&mut self) {
        if matches!(self.state, ContainerState::Stopping | ContainerState::Stopped) {
            return;
        }
        self.state = ContainerState::Stopping;
        debug!("container stopping");

        // Phase 1: order-sensitive services, synchronously, while every
        // worker still runs.
        for step in self.eager_teardown.drain(..) {
            step();
        }

        // Phase 2: remaining services are dropped on their own workers.
        // Dependents were constructed after the services they use, so
        // destruction walks the list backwards.
        for (id, destroy) in self.deferred.drain(..).rev() {
            let _ = self.workers[id.0].sender().post(destroy);
        }

        // Phase 3 and 4: signal every worker, then join every worker.
        for worker in &self.workers {
            worker.signal_stop();
        }
        for worker in &mut self.workers {
            worker.join();
        }

        self.state = ContainerState::Stopped;
        info!("container stopped");
    }

    /// Submission end of a worker's queue, for owners that manage
    /// short-lived services on that worker outside the container registry.
    pub(crate) fn task_sender(&self, worker: WorkerId) -> Result<TaskSender, ContainerError> {
        self.workers
            .get(worker.0)
            .map(Worker::sender)
            .ok_or(ContainerError::UnknownWorker(worker))
    }

    fn construct<S, F>(
        &mut self,
        name: &str,
        worker: WorkerId,
        init: F,
    ) -> Result<ServiceHandle<S>, ContainerError>
    where
        S: Send + 'static,
        F: FnOnce() -> Result<S> + Send + 'static,
    {
        let sender = self.workers[worker.0].sender();
        let handle = ServiceHandle::create(name, worker, sender, init)?;
        self.deferred.push((worker, handle.destroy_task()));
        Ok(handle)
    }

    fn ensure_building(&self) -> Result<(), ContainerError> {
        match self.state {
            ContainerState::Building => Ok(()),
            state => Err(ContainerError::NotBuilding(state)),
        }
    }
}

impl Default for ServiceContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ServiceContainer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::thread;

    // Records lifecycle moments so tests can assert ordering.
    type EventLog = Arc<Mutex<Vec<String>>>;

    struct LoggingService {
        label: String,
        log: EventLog,
    }

    impl LoggingService {
        fn new(label: &str, log: EventLog) -> Self {
            Self {
                label: label.to_string(),
                log,
            }
        }
    }

    impl Drop for LoggingService {
        fn drop(&mut self) {
            self.log.lock().unwrap().push(format!("drop:{}", self.label));
        }
    }

    #[test]
    fn services_run_on_their_assigned_worker() {
        let mut container = ServiceContainer::new();
        let handle = container
            .create_on_dedicated_worker("storage", || Ok(()))
            .unwrap();
        container.finish_building().unwrap();

        let thread_name = handle
            .invoke(|_| thread::current().name().map(str::to_string))
            .unwrap();
        assert_eq!(thread_name.as_deref(), Some("worker-storage"));

        container.shutdown();
    }

    #[test]
    fn shared_affinity_services_use_the_same_thread() {
        let mut container = ServiceContainer::new();
        let first = container
            .create_on_dedicated_worker("storage", || Ok(()))
            .unwrap();
        let second = container
            .create_on_existing_worker("facade", first.worker(), || Ok(()))
            .unwrap();
        container.finish_building().unwrap();

        let a = first.invoke(|_| thread::current().id()).unwrap();
        let b = second.invoke(|_| thread::current().id()).unwrap();
        assert_eq!(a, b);

        container.shutdown();
    }

    #[test]
    fn construction_happens_on_the_owning_worker() {
        let mut container = ServiceContainer::new();
        let handle = container
            .create_on_dedicated_worker("storage", || {
                Ok(thread::current().name().map(str::to_string))
            })
            .unwrap();
        container.finish_building().unwrap();

        let built_on = handle.invoke(|name| name.clone()).unwrap();
        assert_eq!(built_on.as_deref(), Some("worker-storage"));

        container.shutdown();
    }

    #[test]
    fn no_services_can_be_added_once_running() {
        let mut container = ServiceContainer::new();
        container.finish_building().unwrap();

        let result = container.create_on_dedicated_worker("late", || Ok(()));
        assert!(matches!(
            result,
            Err(ContainerError::NotBuilding(ContainerState::Running))
        ));
    }

    #[test]
    fn failed_service_construction_is_fatal() {
        let mut container = ServiceContainer::new();
        let result: Result<ServiceHandle<()>, _> = container
            .create_on_dedicated_worker("broken", || anyhow::bail!("no disk"));

        assert!(matches!(
            result,
            Err(ContainerError::ServiceInit { ref name, .. }) if name == "broken"
        ));
    }

    #[test]
    fn eager_teardown_runs_before_any_worker_stops() {
        let log: EventLog = Arc::new(Mutex::new(Vec::new()));

        let mut container = ServiceContainer::new();
        let storage_log = Arc::clone(&log);
        let storage = container
            .create_on_dedicated_worker("storage", move || {
                Ok(LoggingService::new("storage", storage_log))
            })
            .unwrap();

        // The eager step can still reach the storage service; if its
        // worker had already been joined this invoke would fail.
        let eager_log = Arc::clone(&log);
        let probe = storage.clone();
        container
            .register_eager_teardown(Box::new(move || {
                let alive = probe.invoke(|_| ()).is_ok();
                eager_log
                    .lock()
                    .unwrap()
                    .push(format!("eager(storage-alive={alive})"));
            }))
            .unwrap();

        container.finish_building().unwrap();
        container.shutdown();

        let events = log.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                "eager(storage-alive=true)".to_string(),
                "drop:storage".to_string()
            ]
        );
    }

    #[test]
    fn deferred_destruction_runs_in_reverse_construction_order() {
        let log: EventLog = Arc::new(Mutex::new(Vec::new()));

        let mut container = ServiceContainer::new();
        let leaf_log = Arc::clone(&log);
        let leaf = container
            .create_on_dedicated_worker("storage", move || Ok(LoggingService::new("leaf", leaf_log)))
            .unwrap();
        let facade_log = Arc::clone(&log);
        container
            .create_on_existing_worker("facade", leaf.worker(), move || {
                Ok(LoggingService::new("facade", facade_log))
            })
            .unwrap();

        container.finish_building().unwrap();
        container.shutdown();

        let events = log.lock().unwrap();
        assert_eq!(*events, vec!["drop:facade".to_string(), "drop:leaf".to_string()]);
    }

    #[test]
    fn shutdown_returns_only_after_workers_have_stopped() {
        let mut container = ServiceContainer::new();
        let handle = container
            .create_on_dedicated_worker("storage", || Ok(()))
            .unwrap();
        container.finish_building().unwrap();

        container.shutdown();
        assert_eq!(container.state(), ContainerState::Stopped);

        // The worker is gone, so the handle can no longer reach it.
        assert!(matches!(
            handle.invoke(|_| ()),
            Err(ContainerError::WorkerGone { .. }) | Err(ContainerError::ServiceStopped { .. })
        ));
    }

    #[test]
    fn dropping_a_running_container_still_tears_down() {
        let log: EventLog = Arc::new(Mutex::new(Vec::new()));

        {
            let mut container = ServiceContainer::new();
            let service_log = Arc::clone(&log);
            container
                .create_on_dedicated_worker("storage", move || {
                    Ok(LoggingService::new("storage", service_log))
                })
                .unwrap();
            container.finish_building().unwrap();
        }

        assert_eq!(*log.lock().unwrap(), vec!["drop:storage".to_string()]);
    }
}
