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

//! Podcast subscription persistence.
//!
//! [`PodcastBackend`] is the only surface other subsystems (library UI,
//! feed-fetch pipeline) call to store or read subscriptions. Every public
//! operation holds the storage lock from before its first statement until
//! after its last, so all podcast-table access is serialized across every
//! calling worker.
//!
//! Subscribing is idempotent: a podcast that is already persisted is left
//! alone, and a podcast whose URL matches a stored row converges onto that
//! row instead of creating a duplicate. First-time subscriptions write the
//! podcast row and its whole episode batch inside one transaction, so
//! storage ends up with either all rows or none of them.

use std::sync::Arc;

use anyhow::{Context, Result};
use log::debug;
use rusqlite::{Connection, Transaction, params};

use crate::db::{Database, ExtraCodec, JsonCodec};
use crate::model::{Podcast, PodcastEpisode};

/// Stateless façade over the shared database for podcast subscriptions.
pub struct PodcastBackend {
    db: Arc<Database>,
    codec: Box<dyn ExtraCodec>,
}

impl PodcastBackend {
    /// Creates a backend using the default JSON codec for `extra` blobs.
    pub fn new(db: Arc<Database>) -> Self {
        Self::with_codec(db, Box::new(JsonCodec))
    }

    /// Creates a backend with a custom `extra` blob codec.
    pub fn with_codec(db: Arc<Database>, codec: Box<dyn ExtraCodec>) -> Self {
        Self { db, codec }
    }

    /// Registers a subscription and its initial episode batch.
    ///
    /// Three paths, in order:
    ///
    /// 1. The podcast already has a database id: nothing to do.
    /// 2. A stored row matches the podcast's URL: the caller's value is
    ///    overwritten with the stored record, episodes included. The
    ///    caller's own episode batch is discarded, not merged.
    /// 3. Otherwise the podcast row and every pending episode are inserted
    ///    inside one transaction; the generated ids are written back into
    ///    the value objects as each insert lands.
    ///
    /// The URL lookup runs inside the same critical section as the insert,
    /// so two callers racing on the same feed can never both take the
    /// insert path.
    ///
    /// # Errors
    ///
    /// Returns the first statement or codec failure. The transaction rolls
    /// back, leaving storage untouched; the in-memory podcast keeps
    /// whatever ids were assigned before the failure, and the caller must
    /// treat it as not fully persisted. Re-invoking `subscribe` is safe for
    /// a podcast that never received an id, thanks to the URL dedup path.
    pub fn subscribe(&self, podcast: &mut Podcast) -> Result<()> {
        // Already in the database, nothing to do.
        if podcast.is_valid() {
            return Ok(());
        }

        let mut conn = self.db.lock();

        // If there is a stored row with the same URL, take its data.
        if let Some(mut existing) = self.lookup_by_url(&conn, podcast.url())? {
            let episodes = self.load_episodes(&conn, existing.database_id())?;
            existing.set_episodes(episodes);

            debug!(
                "subscribe deduplicated {} onto stored podcast {}",
                existing.url(),
                existing.database_id()
            );

            *podcast = existing;
            return Ok(());
        }

        let tx = conn
            .transaction()
            .context("Failed to begin subscribe transaction")?;

        let extra = self.codec.encode(podcast.extra())?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO podcasts
                 (url, title, description, copyright, link, image_url,
                  author, owner_name, author_email, extra)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            stmt.execute(params![
                podcast.url(),
                podcast.title(),
                podcast.description(),
                podcast.copyright(),
                podcast.link(),
                podcast.image_url(),
                podcast.author(),
                podcast.owner_name(),
                podcast.owner_email(),
                extra,
            ])?;
        }

        let database_id = tx.last_insert_rowid();
        podcast.set_database_id(database_id);

        for episode in podcast.episodes_mut() {
            episode.set_podcast_database_id(database_id);
        }

        self.add_episodes(&tx, podcast.episodes_mut())?;

        tx.commit().context("Failed to commit subscription")?;

        debug!(
            "subscribed podcast {} with {} episodes",
            database_id,
            podcast.episodes().len()
        );

        Ok(())
    }

    /// Returns every stored podcast in storage row order. Episodes are not
    /// joined in; they are loaded on demand by the caller.
    pub fn get_all_subscriptions(&self) -> Result<Vec<Podcast>> {
        let conn = self.db.lock();

        let mut stmt = conn.prepare_cached(
            "SELECT ROWID, url, title, description, copyright, link, image_url,
                    author, owner_name, author_email, extra
             FROM podcasts",
        )?;

        let mut rows = stmt.query([])?;
        let mut ret = Vec::new();
        while let Some(row) = rows.next()? {
            ret.push(Podcast::from_row(row, self.codec.as_ref())?);
        }

        Ok(ret)
    }

    /// Looks up a subscription by its database id. A missing id yields a
    /// podcast with an unassigned id, not an error.
    pub fn get_subscription_by_id(&self, id: i64) -> Result<Podcast> {
        let conn = self.db.lock();

        let mut stmt = conn.prepare_cached(
            "SELECT ROWID, url, title, description, copyright, link, image_url,
                    author, owner_name, author_email, extra
             FROM podcasts
             WHERE ROWID = ?1",
        )?;

        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => Podcast::from_row(row, self.codec.as_ref()),
            None => Ok(Podcast::new()),
        }
    }

    /// Looks up a subscription by feed URL. A missing URL yields a podcast
    /// with an unassigned id, not an error.
    pub fn get_subscription_by_url(&self, url: &str) -> Result<Podcast> {
        let conn = self.db.lock();
        Ok(self.lookup_by_url(&conn, url)?.unwrap_or_default())
    }

    fn lookup_by_url(&self, conn: &Connection, url: &str) -> Result<Option<Podcast>> {
        let mut stmt = conn.prepare_cached(
            "SELECT ROWID, url, title, description, copyright, link, image_url,
                    author, owner_name, author_email, extra
             FROM podcasts
             WHERE url = ?1",
        )?;

        let mut rows = stmt.query([url])?;
        match rows.next()? {
            Some(row) => Ok(Some(Podcast::from_row(row, self.codec.as_ref())?)),
            None => Ok(None),
        }
    }

    fn load_episodes(&self, conn: &Connection, podcast_id: i64) -> Result<Vec<PodcastEpisode>> {
        let mut stmt = conn.prepare_cached(
            "SELECT ROWID, podcast_database_id, title, description, author,
                    publication_date, duration_secs, url, listened, downloaded,
                    local_url, extra
             FROM podcast_episodes
             WHERE podcast_database_id = ?1",
        )?;

        let mut rows = stmt.query([podcast_id])?;
        let mut ret = Vec::new();
        while let Some(row) = rows.next()? {
            ret.push(PodcastEpisode::from_row(row, self.codec.as_ref())?);
        }

        Ok(ret)
    }

    // Inserts the batch in sequence order, writing each generated id back
    // onto the in-memory episode. Runs inside the subscribe transaction; a
    // failure aborts the whole batch.
    fn add_episodes(&self, tx: &Transaction<'_>, episodes: &mut [PodcastEpisode]) -> Result<()> {
        let mut stmt = tx.prepare_cached(
            "INSERT INTO podcast_episodes
             (podcast_database_id, title, description, author, publication_date,
              duration_secs, url, listened, downloaded, local_url, extra)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )?;

        for episode in episodes {
            let extra = self.codec.encode(episode.extra())?;
            stmt.execute(params![
                episode.podcast_database_id(),
                episode.title(),
                episode.description(),
                episode.author(),
                episode.publication_date(),
                episode.duration_secs(),
                episode.url(),
                episode.listened(),
                episode.downloaded(),
                episode.local_url(),
                extra,
            ])?;
            episode.set_database_id(tx.last_insert_rowid());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::CodecError;
    use crate::model::{ExtraMap, UNASSIGNED_ID};
    use std::collections::HashSet;
    use std::sync::Barrier;
    use std::thread;

    fn backend() -> (Arc<Database>, PodcastBackend) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let backend = PodcastBackend::new(Arc::clone(&db));
        (db, backend)
    }

    fn sample_podcast(url: &str, episode_count: usize) -> Podcast {
        let mut podcast = Podcast::new();
        podcast.set_url(url);
        podcast.set_title("Test Cast");
        podcast.set_description("A feed used in tests");
        podcast.set_copyright("CC-BY");
        podcast.set_link("https://example.com");
        podcast.set_image_url("https://example.com/cover.png");
        podcast.set_author("An Author");
        podcast.set_owner_name("An Owner");
        podcast.set_owner_email("owner@example.com");
        podcast.set_extra_value("itunes:category", "Technology");

        for i in 0..episode_count {
            let mut episode = PodcastEpisode::new();
            episode.set_title(format!("Episode {i}"));
            episode.set_url(format!("{url}/episode/{i}"));
            episode.set_publication_date(1_700_000_000 + i as i64);
            episode.set_duration_secs(1800);
            podcast.add_episode(episode);
        }

        podcast
    }

    fn count(db: &Database, table: &str) -> i64 {
        db.lock()
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn subscribe_assigns_ids_to_podcast_and_episodes() {
        let (db, backend) = backend();
        let mut podcast = sample_podcast("https://example.com/feed.xml", 3);

        backend.subscribe(&mut podcast).unwrap();

        assert!(podcast.is_valid());
        assert_eq!(count(&db, "podcasts"), 1);
        assert_eq!(count(&db, "podcast_episodes"), 3);

        let mut seen = HashSet::new();
        for episode in podcast.episodes() {
            assert_eq!(episode.podcast_database_id(), podcast.database_id());
            assert!(episode.is_valid());
            assert!(seen.insert(episode.database_id()));
        }
    }

    #[test]
    fn subscribe_twice_converges_on_one_row() {
        let (db, backend) = backend();

        let mut first = sample_podcast("https://example.com/feed.xml", 2);
        backend.subscribe(&mut first).unwrap();

        // A second, independently fetched copy of the same feed with a
        // different episode batch.
        let mut second = sample_podcast("https://example.com/feed.xml", 5);
        backend.subscribe(&mut second).unwrap();

        assert_eq!(second.database_id(), first.database_id());
        assert_eq!(count(&db, "podcasts"), 1);
        // The duplicate's batch is discarded in favour of the stored one.
        assert_eq!(second.episodes().len(), 2);
        assert_eq!(count(&db, "podcast_episodes"), 2);
    }

    #[test]
    fn subscribe_is_a_noop_for_persisted_podcasts() {
        let (db, backend) = backend();

        let mut podcast = sample_podcast("https://example.com/feed.xml", 1);
        backend.subscribe(&mut podcast).unwrap();

        let mut again = podcast.clone();
        backend.subscribe(&mut again).unwrap();

        assert_eq!(again, podcast);
        assert_eq!(count(&db, "podcasts"), 1);
        assert_eq!(count(&db, "podcast_episodes"), 1);
    }

    #[test]
    fn round_trips_all_attributes_by_url() {
        let (_db, backend) = backend();

        let mut podcast = sample_podcast("https://example.com/feed.xml", 0);
        backend.subscribe(&mut podcast).unwrap();

        let stored = backend
            .get_subscription_by_url("https://example.com/feed.xml")
            .unwrap();

        assert_eq!(stored, podcast);
        assert_eq!(stored.extra(), podcast.extra());
    }

    #[test]
    fn missing_id_yields_an_unassigned_record() {
        let (_db, backend) = backend();

        let stored = backend.get_subscription_by_id(4242).unwrap();
        assert!(!stored.is_valid());
        assert_eq!(stored.database_id(), UNASSIGNED_ID);

        let stored = backend
            .get_subscription_by_url("https://nobody.example/feed.xml")
            .unwrap();
        assert!(!stored.is_valid());
    }

    #[test]
    fn get_all_subscriptions_returns_storage_order_without_episodes() {
        let (_db, backend) = backend();

        for i in 0..3 {
            let mut podcast = sample_podcast(&format!("https://example.com/{i}"), 2);
            backend.subscribe(&mut podcast).unwrap();
        }

        let all = backend.get_all_subscriptions().unwrap();
        assert_eq!(all.len(), 3);
        for (i, podcast) in all.iter().enumerate() {
            assert_eq!(podcast.url(), format!("https://example.com/{i}"));
            assert!(podcast.episodes().is_empty());
        }
    }

    /// Codec that refuses any map containing a marker key, so tests can
    /// fail a specific insert partway through a batch.
    struct PoisonCodec;

    impl ExtraCodec for PoisonCodec {
        fn encode(&self, extra: &ExtraMap) -> Result<Vec<u8>, CodecError> {
            if extra.contains_key("poison") {
                return Err(CodecError::Encode {
                    reason: "poisoned".to_string(),
                });
            }
            JsonCodec.encode(extra)
        }

        fn decode(&self, blob: &[u8]) -> Result<ExtraMap, CodecError> {
            JsonCodec.decode(blob)
        }
    }

    #[test]
    fn failed_episode_batch_rolls_back_everything() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let backend = PodcastBackend::with_codec(Arc::clone(&db), Box::new(PoisonCodec));

        let mut podcast = sample_podcast("https://example.com/feed.xml", 3);
        podcast.episodes_mut()[1].set_extra_value("poison", true);

        assert!(backend.subscribe(&mut podcast).is_err());

        // The podcast insert and the first episode insert had executed, so
        // the in-memory value reached that point; storage rolled back as a
        // unit.
        assert!(podcast.is_valid());
        assert_eq!(count(&db, "podcasts"), 0);
        assert_eq!(count(&db, "podcast_episodes"), 0);
    }

    #[test]
    fn racing_subscribers_never_create_two_rows() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let backend = Arc::new(PodcastBackend::new(Arc::clone(&db)));
        let barrier = Arc::new(Barrier::new(2));

        let mut handles = Vec::new();
        for _ in 0..2 {
            let backend = Arc::clone(&backend);
            let barrier = Arc::clone(&barrier);
            handles.push(thread::spawn(move || {
                let mut podcast = sample_podcast("https://example.com/feed.xml", 2);
                // Release both threads into the lookup-then-insert path at
                // the same moment.
                barrier.wait();
                backend.subscribe(&mut podcast).unwrap();
                podcast.database_id()
            }));
        }

        let ids: Vec<i64> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(count(&db, "podcasts"), 1);
        assert_eq!(count(&db, "podcast_episodes"), 2);
        assert_eq!(ids[0], ids[1]);
    }
}
