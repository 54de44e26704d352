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

//! Database row mapping for domain models.
//!
//! This module provides the conversion logic between raw SQLite result rows
//! and the podcast value types. Both mappers expect the query to select
//! `ROWID` first, followed by the table's declared columns in schema order,
//! and both run the opaque `extra` blob through the caller's codec.

use anyhow::Result;
use rusqlite::Row;

use crate::db::ExtraCodec;
use crate::model::{Podcast, PodcastEpisode};

impl Podcast {
    /// Maps a `SELECT ROWID, url, ... extra` result row to a [`Podcast`].
    ///
    /// # Errors
    ///
    /// Returns an error if a column is missing or of the wrong type, or if
    /// the `extra` blob fails to decode.
    pub(crate) fn from_row(row: &Row<'_>, codec: &dyn ExtraCodec) -> Result<Self> {
        let mut podcast = Podcast::new();
        podcast.set_database_id(row.get(0)?);
        podcast.set_url(row.get::<_, String>(1)?);
        podcast.set_title(row.get::<_, String>(2)?);
        podcast.set_description(row.get::<_, String>(3)?);
        podcast.set_copyright(row.get::<_, String>(4)?);
        podcast.set_link(row.get::<_, String>(5)?);
        podcast.set_image_url(row.get::<_, String>(6)?);
        podcast.set_author(row.get::<_, String>(7)?);
        podcast.set_owner_name(row.get::<_, String>(8)?);
        podcast.set_owner_email(row.get::<_, String>(9)?);

        let extra: Vec<u8> = row.get(10)?;
        podcast.set_extra(codec.decode(&extra)?);

        Ok(podcast)
    }
}

impl PodcastEpisode {
    /// Maps a `SELECT ROWID, podcast_database_id, ... extra` result row to
    /// a [`PodcastEpisode`].
    ///
    /// # Errors
    ///
    /// Returns an error if a column is missing or of the wrong type, or if
    /// the `extra` blob fails to decode.
    pub(crate) fn from_row(row: &Row<'_>, codec: &dyn ExtraCodec) -> Result<Self> {
        let mut episode = PodcastEpisode::new();
        episode.set_database_id(row.get(0)?);
        episode.set_podcast_database_id(row.get(1)?);
        episode.set_title(row.get::<_, String>(2)?);
        episode.set_description(row.get::<_, String>(3)?);
        episode.set_author(row.get::<_, String>(4)?);
        episode.set_publication_date(row.get(5)?);
        episode.set_duration_secs(row.get(6)?);
        episode.set_url(row.get::<_, String>(7)?);
        episode.set_listened(row.get(8)?);
        episode.set_downloaded(row.get(9)?);
        episode.set_local_url(row.get(10)?);

        let extra: Vec<u8> = row.get(11)?;
        episode.set_extra(codec.decode(&extra)?);

        Ok(episode)
    }
}
