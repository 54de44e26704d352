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

//! Domain models and core data structures.
//!
//! This module defines the central entities of the application, podcast
//! subscriptions and their episodes, as copy-on-write value types. Copies
//! share one underlying record until a setter is invoked on one of them, at
//! which point that copy detaches onto a private clone; the other copy is
//! unaffected. Callers only ever observe plain value semantics.
//!
//! Both types carry an open-ended `extra` attribute map for feed metadata
//! that has no dedicated column. The map is persisted as an opaque blob by a
//! codec chosen at the storage layer.

mod episode;
mod podcast;

pub use episode::{PodcastEpisode, UNKNOWN_DURATION};
pub use podcast::Podcast;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Sentinel for a database identity that has not been assigned yet.
pub const UNASSIGNED_ID: i64 = -1;

/// A single scalar value in an `extra` attribute map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtraValue {
    Text(String),
    Integer(i64),
    Real(f64),
    Boolean(bool),
}

/// Open-ended attribute map carried by podcasts and episodes.
///
/// Ordered so that encoding the same map always yields the same bytes.
pub type ExtraMap = BTreeMap<String, ExtraValue>;

impl From<&str> for ExtraValue {
    fn from(value: &str) -> Self {
        ExtraValue::Text(value.to_string())
    }
}

impl From<i64> for ExtraValue {
    fn from(value: i64) -> Self {
        ExtraValue::Integer(value)
    }
}

impl From<bool> for ExtraValue {
    fn from(value: bool) -> Self {
        ExtraValue::Boolean(value)
    }
}
