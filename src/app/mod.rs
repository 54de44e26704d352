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

//! Application service graph.
//!
//! [`App`] wires the long-lived services together in dependency order and
//! owns their lifetime. Construction runs leaf services first, composites
//! after, and the removable-device bookkeeping last; the shutdown sequence
//! is the mirror image, driven by the service container.
//!
//! Embedding layers (UI, feed-fetch pipeline) hold an `App` and reach the
//! persistence backend through its worker-bound handle. Calls on the
//! handle block, so UI-responsive threads should marshal work onto a
//! background thread of their own rather than calling in directly.

use std::sync::Arc;

use anyhow::{Context, Result};
use log::debug;

use crate::config::AppConfig;
use crate::container::{ServiceContainer, ServiceHandle};
use crate::db::Database;
use crate::devices::DeviceManager;
use crate::podcasts::PodcastBackend;

/// Owns every long-lived service and the workers they run on.
pub struct App {
    container: ServiceContainer,
    backend: ServiceHandle<PodcastBackend>,
    devices: Arc<DeviceManager>,
}

impl App {
    /// Builds the full service graph.
    ///
    /// The database opens on a dedicated worker; the podcast backend is
    /// constructed onto that same worker because it borrows the shared
    /// connection, which is not safe to use across workers without the
    /// storage lock. The device manager comes last: its backends live on
    /// the storage worker, so it registers the eager teardown step that
    /// dismantles them before any worker stops.
    ///
    /// # Errors
    ///
    /// Any worker or service construction failure aborts startup.
    pub fn new(config: &AppConfig) -> Result<Self> {
        let mut container = ServiceContainer::new();

        let db_file = config.database_file.clone();
        let database = container
            .create_on_dedicated_worker("database", move || Ok(Arc::new(Database::open(&db_file)?)))
            .context("Failed to start the database service")?;
        let db = database.invoke(|db| Arc::clone(db))?;

        let backend_db = Arc::clone(&db);
        let backend = container
            .create_on_existing_worker("podcasts", database.worker(), move || {
                Ok(PodcastBackend::new(backend_db))
            })
            .context("Failed to start the podcast backend")?;

        let devices = Arc::new(DeviceManager::new(
            database.worker(),
            container.task_sender(database.worker())?,
            Arc::clone(&db),
        ));
        let teardown_devices = Arc::clone(&devices);
        container.register_eager_teardown(Box::new(move || teardown_devices.detach_all()))?;

        container.finish_building()?;
        debug!("application services running");

        Ok(Self {
            container,
            backend,
            devices,
        })
    }

    /// Handle to the subscription store. All calls execute on the storage
    /// worker and block the caller until they complete.
    pub fn podcast_backend(&self) -> &ServiceHandle<PodcastBackend> {
        &self.backend
    }

    pub fn device_manager(&self) -> &Arc<DeviceManager> {
        &self.devices
    }

    /// Tears the graph down in order and blocks until every worker has
    /// stopped. Dropping the `App` without calling this performs the same
    /// sequence.
    pub fn shutdown(mut self) {
        self.container.shutdown();
    }
}
