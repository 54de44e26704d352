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

//! Removable-media bookkeeping.
//!
//! When a portable player or storage device is attached, a
//! [`DeviceBackend`] is created for it *on the storage worker*, because it
//! reads the episode table while tracking which episodes have been copied
//! onto the device. That affinity is what makes teardown order-sensitive:
//! every device backend has to be destroyed while the storage worker is
//! still alive, so [`DeviceManager::detach_all`] runs as an eager teardown
//! step before the container stops any worker.
//!
//! Attach and detach arrive at runtime from a platform integration that is
//! not part of this crate; it drives the manager through plain method
//! calls.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use log::{info, warn};

use crate::container::worker::TaskSender;
use crate::container::{ContainerError, ServiceHandle, WorkerId};
use crate::db::Database;

/// Per-device bookkeeping, owned by the storage worker.
pub struct DeviceBackend {
    db: Arc<Database>,
    device_id: String,
    // Source URLs of episodes known to be present on the device.
    copied: HashSet<String>,
}

impl DeviceBackend {
    fn new(db: Arc<Database>, device_id: String) -> Self {
        Self {
            db,
            device_id,
            copied: HashSet::new(),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Records that the episode with this source URL now exists on the
    /// device.
    pub fn mark_copied(&mut self, url: impl Into<String>) {
        self.copied.insert(url.into());
    }

    pub fn is_copied(&self, url: &str) -> bool {
        self.copied.contains(url)
    }

    pub fn copied_count(&self) -> usize {
        self.copied.len()
    }

    /// Drops bookkeeping entries whose episodes no longer exist in the
    /// store (for example after an unsubscribe while the device was
    /// attached). Returns how many entries were pruned.
    pub fn reconcile(&mut self) -> Result<usize> {
        let conn = self.db.lock();

        let mut stmt = conn.prepare_cached("SELECT url FROM podcast_episodes")?;
        let mut rows = stmt.query([])?;
        let mut stored = HashSet::new();
        while let Some(row) = rows.next()? {
            stored.insert(row.get::<_, String>(0)?);
        }

        let before = self.copied.len();
        self.copied.retain(|url| stored.contains(url));
        Ok(before - self.copied.len())
    }
}

/// Creates and destroys [`DeviceBackend`]s as devices come and go.
///
/// The manager itself lives on the main control flow; only the backends it
/// manages are bound to the storage worker. Backends attached at runtime
/// live outside the container's build-time registry and are owned here.
pub struct DeviceManager {
    storage_worker: WorkerId,
    storage: TaskSender,
    db: Arc<Database>,
    backends: Mutex<Vec<ServiceHandle<DeviceBackend>>>,
}

impl DeviceManager {
    pub(crate) fn new(storage_worker: WorkerId, storage: TaskSender, db: Arc<Database>) -> Self {
        Self {
            storage_worker,
            storage,
            db,
            backends: Mutex::new(Vec::new()),
        }
    }

    /// Creates the backend for a newly attached device on the storage
    /// worker and returns a handle to it.
    pub fn attach(&self, device_id: &str) -> Result<ServiceHandle<DeviceBackend>, ContainerError> {
        let db = Arc::clone(&self.db);
        let id = device_id.to_string();
        let handle = ServiceHandle::create(
            &format!("device-{device_id}"),
            self.storage_worker,
            self.storage.clone(),
            move || Ok(DeviceBackend::new(db, id)),
        )?;

        self.backends.lock().unwrap().push(handle.clone());
        info!("device '{device_id}' attached");

        Ok(handle)
    }

    /// Destroys the backend for a detached device, blocking until the drop
    /// has run on the storage worker.
    pub fn detach(&self, device_id: &str) -> Result<(), ContainerError> {
        let name = format!("device-{device_id}");
        let handle = {
            let mut backends = self.backends.lock().unwrap();
            let index = backends.iter().position(|b| b.name() == name);
            index.map(|i| backends.remove(i))
        };

        match handle {
            Some(handle) => {
                handle.destroy_blocking()?;
                info!("device '{device_id}' detached");
                Ok(())
            }
            None => Err(ContainerError::ServiceStopped { name }),
        }
    }

    /// Synchronously destroys every device backend.
    ///
    /// Runs as the container's eager teardown step: it must complete while
    /// the storage worker is still accepting work, so it blocks on each
    /// destruction in turn.
    pub fn detach_all(&self) {
        let backends: Vec<_> = self.backends.lock().unwrap().drain(..).collect();
        for handle in backends {
            if let Err(e) = handle.destroy_blocking() {
                warn!("failed to destroy '{}': {e}", handle.name());
            }
        }
    }

    pub fn attached_count(&self) -> usize {
        self.backends.lock().unwrap().len()
    }
}
