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

use crate::model::{ExtraMap, ExtraValue, PodcastEpisode, UNASSIGNED_ID};

/// A podcast subscription.
///
/// Identity is the `database_id` assigned by storage at first insert, plus
/// the feed `url` as the natural key: two podcasts with equal URLs denote
/// the same logical subscription regardless of how they were fetched.
///
/// `Podcast` is a cheap-to-clone handle over a shared record. Setters
/// detach the handle onto a private clone of the record first, so mutating
/// one copy never changes another.
#[derive(Debug, Clone, Default)]
pub struct Podcast {
    data: Arc<PodcastData>,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct PodcastData {
    database_id: Option<i64>,
    url: String,

    title: String,
    description: String,
    copyright: String,
    link: String,
    image_url: String,

    // iTunes extensions
    author: String,
    owner_name: String,
    owner_email: String,

    extra: ExtraMap,

    // Stored in a separate table, keyed back to this podcast by id.
    episodes: Vec<PodcastEpisode>,
}

impl Podcast {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether this podcast has been persisted and assigned an identity.
    pub fn is_valid(&self) -> bool {
        self.data.database_id.is_some()
    }

    /// The storage identity, or [`UNASSIGNED_ID`] before the first insert.
    pub fn database_id(&self) -> i64 {
        self.data.database_id.unwrap_or(UNASSIGNED_ID)
    }

    pub fn url(&self) -> &str {
        &self.data.url
    }

    pub fn title(&self) -> &str {
        &self.data.title
    }

    pub fn description(&self) -> &str {
        &self.data.description
    }

    pub fn copyright(&self) -> &str {
        &self.data.copyright
    }

    pub fn link(&self) -> &str {
        &self.data.link
    }

    pub fn image_url(&self) -> &str {
        &self.data.image_url
    }

    pub fn author(&self) -> &str {
        &self.data.author
    }

    pub fn owner_name(&self) -> &str {
        &self.data.owner_name
    }

    pub fn owner_email(&self) -> &str {
        &self.data.owner_email
    }

    pub fn extra(&self) -> &ExtraMap {
        &self.data.extra
    }

    pub fn extra_value(&self, key: &str) -> Option<&ExtraValue> {
        self.data.extra.get(key)
    }

    pub fn episodes(&self) -> &[PodcastEpisode] {
        &self.data.episodes
    }

    pub fn set_database_id(&mut self, id: i64) {
        self.detach().database_id = Some(id);
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        self.detach().url = url.into();
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.detach().title = title.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.detach().description = description.into();
    }

    pub fn set_copyright(&mut self, copyright: impl Into<String>) {
        self.detach().copyright = copyright.into();
    }

    pub fn set_link(&mut self, link: impl Into<String>) {
        self.detach().link = link.into();
    }

    pub fn set_image_url(&mut self, image_url: impl Into<String>) {
        self.detach().image_url = image_url.into();
    }

    pub fn set_author(&mut self, author: impl Into<String>) {
        self.detach().author = author.into();
    }

    pub fn set_owner_name(&mut self, owner_name: impl Into<String>) {
        self.detach().owner_name = owner_name.into();
    }

    pub fn set_owner_email(&mut self, owner_email: impl Into<String>) {
        self.detach().owner_email = owner_email.into();
    }

    pub fn set_extra(&mut self, extra: ExtraMap) {
        self.detach().extra = extra;
    }

    pub fn set_extra_value(&mut self, key: impl Into<String>, value: impl Into<ExtraValue>) {
        self.detach().extra.insert(key.into(), value.into());
    }

    pub fn set_episodes(&mut self, episodes: Vec<PodcastEpisode>) {
        self.detach().episodes = episodes;
    }

    pub fn add_episode(&mut self, episode: PodcastEpisode) {
        self.detach().episodes.push(episode);
    }

    /// Mutable access to the episode sequence, detaching this copy first.
    pub fn episodes_mut(&mut self) -> &mut Vec<PodcastEpisode> {
        &mut self.detach().episodes
    }

    // Clones the shared record if any other handle still points at it.
    fn detach(&mut self) -> &mut PodcastData {
        Arc::make_mut(&mut self.data)
    }
}

/// Structural equality over record contents. Two handles to the same record
/// are always equal; independently built but identical records compare
/// equal too, without becoming the same handle.
impl PartialEq for Podcast {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Podcast {
        let mut podcast = Podcast::new();
        podcast.set_url("https://example.com/feed.xml");
        podcast.set_title("Example Cast");
        podcast.set_author("Example Author");
        podcast
    }

    #[test]
    fn new_podcast_has_no_identity() {
        let podcast = Podcast::new();
        assert!(!podcast.is_valid());
        assert_eq!(podcast.database_id(), UNASSIGNED_ID);
    }

    #[test]
    fn copies_detach_on_write() {
        let original = sample();
        let mut copy = original.clone();

        copy.set_title("Renamed");

        assert_eq!(original.title(), "Example Cast");
        assert_eq!(copy.title(), "Renamed");
    }

    #[test]
    fn episode_sequence_is_shared_until_detach() {
        let mut original = sample();
        let mut episode = PodcastEpisode::new();
        episode.set_title("Episode 1");
        original.add_episode(episode);

        let mut copy = original.clone();
        copy.episodes_mut().clear();

        assert_eq!(original.episodes().len(), 1);
        assert!(copy.episodes().is_empty());
    }

    #[test]
    fn handle_and_structural_equality() {
        let original = sample();
        let copy = original.clone();
        assert_eq!(original, copy);

        // An independently constructed twin is equal by value as well.
        let twin = sample();
        assert_eq!(original, twin);

        let mut other = sample();
        other.set_url("https://example.com/other.xml");
        assert_ne!(original, other);
    }

    #[test]
    fn extra_values_round_trip_through_the_map() {
        let mut podcast = sample();
        podcast.set_extra_value("itunes:category", "Technology");
        podcast.set_extra_value("episode_count", 42i64);

        assert_eq!(
            podcast.extra_value("itunes:category"),
            Some(&ExtraValue::Text("Technology".to_string()))
        );
        assert_eq!(
            podcast.extra_value("episode_count"),
            Some(&ExtraValue::Integer(42))
        );
        assert_eq!(podcast.extra_value("missing"), None);
    }
}
