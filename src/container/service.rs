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

//! Worker-bound service handles.
//!
//! A service never moves between threads. It is constructed by a task on
//! its assigned worker, every call against it runs as a task on that
//! worker, and destruction is a task that drops it there too. The
//! [`ServiceHandle`] is the cross-thread face of such a service: cloneable,
//! sendable, and only able to reach the service through the worker's queue.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use log::debug;

use crate::container::worker::{Task, TaskSender};
use crate::container::{ContainerError, WorkerId};

/// Handle to a service owned by a worker thread.
pub struct ServiceHandle<S> {
    name: Arc<str>,
    worker: WorkerId,
    sender: TaskSender,
    cell: Arc<Mutex<Option<S>>>,
}

impl<S> Clone for ServiceHandle<S> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            worker: self.worker,
            sender: self.sender.clone(),
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<S: Send + 'static> ServiceHandle<S> {
    /// Constructs the service on its worker and blocks until it is ready.
    ///
    /// `init` runs as a task on the worker, so the service is created on
    /// the thread that will own it for its whole life. An `init` failure
    /// is construction-fatal and surfaced to the caller.
    pub(crate) fn create<F>(
        name: &str,
        worker: WorkerId,
        sender: TaskSender,
        init: F,
    ) -> Result<Self, ContainerError>
    where
        F: FnOnce() -> Result<S> + Send + 'static,
    {
        let name: Arc<str> = Arc::from(name);
        let cell = Arc::new(Mutex::new(None));

        let (ready_tx, ready_rx) = mpsc::channel();
        let init_cell = Arc::clone(&cell);
        sender.post(Box::new(move || match init() {
            Ok(service) => {
                *init_cell.lock().unwrap() = Some(service);
                let _ = ready_tx.send(Ok(()));
            }
            Err(source) => {
                let _ = ready_tx.send(Err(source));
            }
        }))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                debug!("service '{name}' ready on worker '{}'", sender.worker_name());
                Ok(Self {
                    name,
                    worker,
                    sender,
                    cell,
                })
            }
            Ok(Err(source)) => Err(ContainerError::ServiceInit {
                name: name.to_string(),
                reason: format!("{source:#}"),
            }),
            Err(_) => Err(ContainerError::WorkerGone {
                name: sender.worker_name().to_string(),
            }),
        }
    }

    /// Runs `f` against the service on its owning worker and blocks for
    /// the result.
    ///
    /// Must not be called from the service's own worker: the task would
    /// wait behind the caller and never run.
    ///
    /// # Errors
    ///
    /// [`ContainerError::ServiceStopped`] once the service has been
    /// destroyed, [`ContainerError::WorkerGone`] once its worker has
    /// exited.
    pub fn invoke<F, R>(&self, f: F) -> Result<R, ContainerError>
    where
        F: FnOnce(&mut S) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply_tx, reply_rx) = mpsc::channel();
        let cell = Arc::clone(&self.cell);
        self.sender.post(Box::new(move || {
            let reply = cell.lock().unwrap().as_mut().map(f);
            let _ = reply_tx.send(reply);
        }))?;

        match reply_rx.recv() {
            Ok(Some(result)) => Ok(result),
            Ok(None) => Err(ContainerError::ServiceStopped {
                name: self.name.to_string(),
            }),
            Err(_) => Err(ContainerError::WorkerGone {
                name: self.sender.worker_name().to_string(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The worker this service was assigned to, usable to give another
    /// service the same thread affinity.
    pub fn worker(&self) -> WorkerId {
        self.worker
    }

    /// A task that drops the service on its own worker. Used for the
    /// deferred, non-blocking destruction pass at shutdown.
    pub(crate) fn destroy_task(&self) -> Task {
        let name = Arc::clone(&self.name);
        let cell = Arc::clone(&self.cell);
        Box::new(move || {
            if cell.lock().unwrap().take().is_some() {
                debug!("service '{name}' destroyed");
            }
        })
    }

    /// Destroys the service on its worker and blocks until the drop has
    /// run. Used by owners whose cleanup must complete while the worker is
    /// still alive.
    pub(crate) fn destroy_blocking(&self) -> Result<(), ContainerError> {
        let (done_tx, done_rx) = mpsc::channel();
        let name = Arc::clone(&self.name);
        let cell = Arc::clone(&self.cell);
        self.sender.post(Box::new(move || {
            if cell.lock().unwrap().take().is_some() {
                debug!("service '{name}' destroyed");
            }
            let _ = done_tx.send(());
        }))?;

        done_rx.recv().map_err(|_| ContainerError::WorkerGone {
            name: self.sender.worker_name().to_string(),
        })
    }
}
