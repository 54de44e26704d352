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

use std::sync::Arc;

use crate::model::{ExtraMap, ExtraValue, UNASSIGNED_ID};

/// Duration sentinel for episodes whose feed did not declare one.
pub const UNKNOWN_DURATION: i64 = -1;

/// A single episode of a podcast subscription.
///
/// Episodes do not own their parent podcast; `podcast_database_id` is a
/// plain foreign key resolved through storage. Like [`Podcast`], an episode
/// is a copy-on-write handle over a shared record.
///
/// [`Podcast`]: crate::model::Podcast
#[derive(Debug, Clone, Default)]
pub struct PodcastEpisode {
    data: Arc<EpisodeData>,
}

#[derive(Debug, Clone, PartialEq)]
struct EpisodeData {
    database_id: Option<i64>,
    podcast_database_id: Option<i64>,

    title: String,
    description: String,
    author: String,
    /// Publication time as Unix seconds.
    publication_date: i64,
    duration_secs: i64,
    url: String,

    listened: bool,
    downloaded: bool,

    local_url: Option<String>,

    extra: ExtraMap,
}

impl Default for EpisodeData {
    fn default() -> Self {
        Self {
            database_id: None,
            podcast_database_id: None,
            title: String::new(),
            description: String::new(),
            author: String::new(),
            publication_date: 0,
            duration_secs: UNKNOWN_DURATION,
            url: String::new(),
            listened: false,
            downloaded: false,
            local_url: None,
            extra: ExtraMap::new(),
        }
    }
}

impl PodcastEpisode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether this episode has been persisted and assigned an identity.
    pub fn is_valid(&self) -> bool {
        self.data.database_id.is_some()
    }

    /// The storage identity, or [`UNASSIGNED_ID`] before the first insert.
    pub fn database_id(&self) -> i64 {
        self.data.database_id.unwrap_or(UNASSIGNED_ID)
    }

    /// The owning podcast's storage identity, or [`UNASSIGNED_ID`].
    pub fn podcast_database_id(&self) -> i64 {
        self.data.podcast_database_id.unwrap_or(UNASSIGNED_ID)
    }

    pub fn title(&self) -> &str {
        &self.data.title
    }

    pub fn description(&self) -> &str {
        &self.data.description
    }

    pub fn author(&self) -> &str {
        &self.data.author
    }

    pub fn publication_date(&self) -> i64 {
        self.data.publication_date
    }

    pub fn duration_secs(&self) -> i64 {
        self.data.duration_secs
    }

    pub fn url(&self) -> &str {
        &self.data.url
    }

    pub fn listened(&self) -> bool {
        self.data.listened
    }

    pub fn downloaded(&self) -> bool {
        self.data.downloaded
    }

    pub fn local_url(&self) -> Option<&str> {
        self.data.local_url.as_deref()
    }

    pub fn extra(&self) -> &ExtraMap {
        &self.data.extra
    }

    pub fn extra_value(&self, key: &str) -> Option<&ExtraValue> {
        self.data.extra.get(key)
    }

    pub fn set_database_id(&mut self, id: i64) {
        self.detach().database_id = Some(id);
    }

    pub fn set_podcast_database_id(&mut self, id: i64) {
        self.detach().podcast_database_id = Some(id);
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.detach().title = title.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.detach().description = description.into();
    }

    pub fn set_author(&mut self, author: impl Into<String>) {
        self.detach().author = author.into();
    }

    pub fn set_publication_date(&mut self, unix_seconds: i64) {
        self.detach().publication_date = unix_seconds;
    }

    pub fn set_duration_secs(&mut self, duration_secs: i64) {
        self.detach().duration_secs = duration_secs;
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        self.detach().url = url.into();
    }

    pub fn set_listened(&mut self, listened: bool) {
        self.detach().listened = listened;
    }

    pub fn set_downloaded(&mut self, downloaded: bool) {
        self.detach().downloaded = downloaded;
    }

    pub fn set_local_url(&mut self, local_url: Option<String>) {
        self.detach().local_url = local_url;
    }

    pub fn set_extra(&mut self, extra: ExtraMap) {
        self.detach().extra = extra;
    }

    pub fn set_extra_value(&mut self, key: impl Into<String>, value: impl Into<ExtraValue>) {
        self.detach().extra.insert(key.into(), value.into());
    }

    fn detach(&mut self) -> &mut EpisodeData {
        Arc::make_mut(&mut self.data)
    }
}

impl PartialEq for PodcastEpisode {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_sentinels() {
        let episode = PodcastEpisode::new();
        assert!(!episode.is_valid());
        assert_eq!(episode.database_id(), UNASSIGNED_ID);
        assert_eq!(episode.podcast_database_id(), UNASSIGNED_ID);
        assert_eq!(episode.duration_secs(), UNKNOWN_DURATION);
        assert_eq!(episode.local_url(), None);
    }

    #[test]
    fn copies_detach_on_write() {
        let mut original = PodcastEpisode::new();
        original.set_title("Pilot");
        original.set_listened(false);

        let mut copy = original.clone();
        copy.set_listened(true);

        assert!(!original.listened());
        assert!(copy.listened());
        assert_eq!(original.title(), copy.title());
    }
}
