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

//! Common utilities and helper functions.

use anyhow::{Context, Result};

/// Initialises logging for embedding applications and tooling.
///
/// The log specification is read from `RUST_LOG` when set, falling back to
/// `info`. Output goes to stdout.
///
/// # Errors
///
/// Returns an error if a logger has already been installed.
pub fn init_log() -> Result<()> {
    flexi_logger::Logger::try_with_env_or_str("info")
        .context("Invalid log specification")?
        .log_to_stdout()
        .start()
        .context("Failed to start logger")?;

    Ok(())
}
