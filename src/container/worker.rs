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

//! Task-queue worker threads.
//!
//! A [`Worker`] is a named OS thread draining a queue of boxed closures.
//! Everything that runs "on" a worker, from service construction to
//! service calls to service destruction, is a task submitted through its
//! [`TaskSender`]. Stopping is two-phase: [`Worker::signal_stop`] enqueues
//! a stop message and returns immediately, [`Worker::join`] blocks until
//! the thread has drained its queue and exited. Keeping the phases apart
//! lets the container signal every worker before it joins any of them.

use std::sync::Arc;
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

use log::{debug, warn};

use crate::container::ContainerError;

/// A unit of work executed on a worker thread.
pub(crate) type Task = Box<dyn FnOnce() + Send>;

enum WorkerMessage {
    Run(Task),
    Stop,
}

/// Cloneable submission end of a worker's task queue.
#[derive(Clone)]
pub struct TaskSender {
    name: Arc<str>,
    tx: Sender<WorkerMessage>,
}

impl TaskSender {
    /// Enqueues a task without waiting for it to run.
    pub(crate) fn post(&self, task: Task) -> Result<(), ContainerError> {
        self.tx
            .send(WorkerMessage::Run(task))
            .map_err(|_| ContainerError::WorkerGone {
                name: self.name.to_string(),
            })
    }

    pub(crate) fn worker_name(&self) -> &str {
        &self.name
    }
}

/// A dedicated thread of execution owned by the service container.
pub(crate) struct Worker {
    name: Arc<str>,
    tx: Sender<WorkerMessage>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawns the worker thread. Failure to allocate the thread is fatal
    /// for startup and is surfaced as a construction error.
    pub(crate) fn spawn(name: &str) -> Result<Self, ContainerError> {
        let name: Arc<str> = Arc::from(name);
        let (tx, rx) = mpsc::channel::<WorkerMessage>();

        let loop_name = Arc::clone(&name);
        let handle = thread::Builder::new()
            .name(format!("worker-{name}"))
            .spawn(move || {
                while let Ok(message) = rx.recv() {
                    match message {
                        WorkerMessage::Run(task) => task(),
                        WorkerMessage::Stop => break,
                    }
                }
                debug!("worker '{loop_name}' stopped");
            })
            .map_err(|source| ContainerError::WorkerSpawn {
                name: name.to_string(),
                source,
            })?;

        debug!("worker '{name}' started");

        Ok(Self {
            name,
            tx,
            handle: Some(handle),
        })
    }

    pub(crate) fn sender(&self) -> TaskSender {
        TaskSender {
            name: Arc::clone(&self.name),
            tx: self.tx.clone(),
        }
    }

    /// Asks the worker to stop accepting new work. Tasks already queued
    /// still run before the thread exits. Never blocks.
    pub(crate) fn signal_stop(&self) {
        let _ = self.tx.send(WorkerMessage::Stop);
    }

    /// Blocks until the worker thread has exited.
    pub(crate) fn join(&mut self) {
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!("worker '{}' panicked before stopping", self.name);
        }
    }
}
