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

//! Lazily expanded catalog tree.
//!
//! Composite nodes ([`Artist`], [`Album`]) fetch their children from the
//! [`CatalogClient`] the first time they are asked for them and keep the
//! result for the rest of the process. Asking again, from any thread, returns
//! the same cached slice without another remote call.
//!
//! Children hold non-owning back-references to their parents, the owning
//! direction is always parent to child.

use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex, OnceLock, PoisonError, Weak},
};

use crate::{
    client::{AlbumRecord, ArtistRecord, CatalogClient, ClientResult, TrackRecord},
    model::{Entity, EntityKind},
    util::path::album_destination,
};

/// A child list that is fetched at most once.
pub(crate) struct Children<T> {
    cell: OnceLock<Vec<Arc<T>>>,
    fetch_lock: Mutex<()>,
}

impl<T> Children<T> {
    fn new() -> Self {
        Self {
            cell: OnceLock::new(),
            fetch_lock: Mutex::new(()),
        }
    }

    /// Returns the cached children, running `fetch` to populate them first if
    /// needed.
    ///
    /// A failed fetch caches nothing, so a later call tries again. An empty
    /// result is cached like any other.
    fn get_or_fetch<E>(
        &self,
        fetch: impl FnOnce() -> Result<Vec<Arc<T>>, E>,
    ) -> Result<&[Arc<T>], E> {
        if let Some(children) = self.cell.get() {
            return Ok(children);
        }

        let _guard = self
            .fetch_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // Another caller may have finished the fetch while we waited.
        if let Some(children) = self.cell.get() {
            return Ok(children);
        }

        let fetched = fetch()?;
        Ok(self.cell.get_or_init(|| fetched))
    }

    fn cached(&self) -> Option<&[Arc<T>]> {
        self.cell.get().map(Vec::as_slice)
    }
}

pub(crate) struct Artist {
    pub id: u64,
    pub title: String,
    pub link: String,
    albums: Children<Album>,
}

impl Artist {
    pub(crate) fn new(record: ArtistRecord) -> Arc<Self> {
        Arc::new(Self {
            id: record.id,
            title: record.name,
            link: record.link,
            albums: Children::new(),
        })
    }

    /// The artist's albums, fetched on first use.
    pub(crate) fn albums<'a>(
        self: &'a Arc<Self>,
        client: &dyn CatalogClient,
    ) -> ClientResult<&'a [Arc<Album>]> {
        self.albums.get_or_fetch(|| {
            let records = client.list_albums(self.id)?;
            Ok(records
                .into_iter()
                .map(|record| Album::new(record, Arc::downgrade(self)))
                .collect())
        })
    }

    /// Total number of tracks across all albums, as declared by the catalog.
    ///
    /// This expands the albums but not their tracks.
    pub(crate) fn total_tracks(self: &Arc<Self>, client: &dyn CatalogClient) -> ClientResult<u64> {
        Ok(self
            .albums(client)?
            .iter()
            .map(|album| u64::from(album.track_count))
            .sum())
    }
}

impl Entity for Artist {
    fn kind(&self) -> EntityKind {
        EntityKind::Artist
    }

    fn id(&self) -> u64 {
        self.id
    }

    fn title(&self) -> &str {
        &self.title
    }
}

pub(crate) struct Album {
    pub id: u64,
    pub title: String,
    pub release_date: String,
    pub disk_count: u32,
    pub track_count: u32,
    artist: Weak<Artist>,
    tracks: Children<Track>,
}

impl Album {
    fn new(record: AlbumRecord, artist: Weak<Artist>) -> Arc<Self> {
        Arc::new(Self {
            id: record.id,
            title: record.title,
            release_date: record.release_date,
            disk_count: record.disk_count,
            track_count: record.track_count,
            artist,
            tracks: Children::new(),
        })
    }

    pub(crate) fn artist(&self) -> Option<Arc<Artist>> {
        self.artist.upgrade()
    }

    /// The album's tracks, fetched on first use.
    pub(crate) fn tracks<'a>(
        self: &'a Arc<Self>,
        client: &dyn CatalogClient,
    ) -> ClientResult<&'a [Arc<Track>]> {
        self.tracks.get_or_fetch(|| {
            let records = client.list_tracks(self.id)?;
            Ok(records
                .into_iter()
                .map(|record| Track::new(record, Arc::downgrade(self)))
                .collect())
        })
    }

    pub(crate) fn cached_tracks(&self) -> Option<&[Arc<Track>]> {
        self.tracks.cached()
    }

    /// Directory this album's tracks are written to below `root`.
    ///
    /// Depends only on the album's own metadata, never on which of its tracks
    /// are being downloaded.
    pub(crate) fn destination(&self, root: &Path) -> PathBuf {
        let artist_title = self
            .artist()
            .map(|artist| artist.title.clone())
            .unwrap_or_default();

        album_destination(
            root,
            &artist_title,
            &self.title,
            self.track_count,
            self.disk_count,
        )
    }
}

impl Entity for Album {
    fn kind(&self) -> EntityKind {
        EntityKind::Album
    }

    fn id(&self) -> u64 {
        self.id
    }

    fn title(&self) -> &str {
        &self.title
    }
}

pub(crate) struct Track {
    pub id: u64,
    pub title: String,
    pub short_title: String,
    pub link: String,
    pub duration_seconds: u64,
    album: Weak<Album>,
}

impl Track {
    fn new(record: TrackRecord, album: Weak<Album>) -> Arc<Self> {
        Arc::new(Self {
            id: record.id,
            title: record.title,
            short_title: record.short_title,
            link: record.link,
            duration_seconds: record.duration_seconds,
            album,
        })
    }

    pub(crate) fn album(&self) -> Option<Arc<Album>> {
        self.album.upgrade()
    }

    pub(crate) fn artist(&self) -> Option<Arc<Artist>> {
        self.album().and_then(|album| album.artist())
    }
}

impl Entity for Track {
    fn kind(&self) -> EntityKind {
        EntityKind::Track
    }

    fn id(&self) -> u64 {
        self.id
    }

    fn title(&self) -> &str {
        &self.title
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Barrier, atomic::Ordering},
        thread,
        time::Duration,
    };

    use super::*;
    use crate::client::testing::FakeCatalog;

    fn artist(catalog: &FakeCatalog) -> Arc<Artist> {
        Artist::new(catalog.resolve_artist("Nina").unwrap())
    }

    #[test]
    fn albums_are_fetched_once() {
        let catalog = FakeCatalog::with_artist("Nina", &[(10, "One", &[1, 2]), (11, "Two", &[3])]);
        let artist = artist(&catalog);

        assert_eq!(catalog.album_fetches.load(Ordering::SeqCst), 0);

        let first: Vec<u64> = artist.albums(&catalog).unwrap().iter().map(|a| a.id).collect();
        let second: Vec<u64> = artist.albums(&catalog).unwrap().iter().map(|a| a.id).collect();

        assert_eq!(first, vec![10, 11]);
        assert_eq!(first, second);
        assert_eq!(catalog.album_fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn repeated_calls_return_the_same_nodes() {
        let catalog = FakeCatalog::with_artist("Nina", &[(10, "One", &[1, 2])]);
        let artist = artist(&catalog);

        let album = Arc::clone(&artist.albums(&catalog).unwrap()[0]);
        let a = Arc::clone(&album.tracks(&catalog).unwrap()[1]);
        let b = Arc::clone(&album.tracks(&catalog).unwrap()[1]);

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(catalog.track_fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_callers_share_a_single_fetch() {
        let mut catalog =
            FakeCatalog::with_artist("Nina", &[(10, "One", &[1, 2]), (11, "Two", &[3])]);
        catalog.fetch_delay = Duration::from_millis(50);
        let artist = artist(&catalog);
        let barrier = Barrier::new(8);

        let seen: Vec<Vec<u64>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        artist
                            .albums(&catalog)
                            .unwrap()
                            .iter()
                            .map(|a| a.id)
                            .collect::<Vec<u64>>()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(seen.iter().all(|ids| ids == &vec![10, 11]));
        assert_eq!(catalog.album_fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_discography_is_cached() {
        let catalog = FakeCatalog::with_artist("Nina", &[]);
        let artist = artist(&catalog);

        assert!(artist.albums(&catalog).unwrap().is_empty());
        assert!(artist.albums(&catalog).unwrap().is_empty());
        assert_eq!(catalog.album_fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn total_tracks_uses_declared_counts_without_expanding_tracks() {
        let catalog =
            FakeCatalog::with_artist("Nina", &[(10, "One", &[1, 2, 3]), (11, "Two", &[4])]);
        let artist = artist(&catalog);

        assert_eq!(artist.total_tracks(&catalog).unwrap(), 4);
        assert_eq!(catalog.track_fetches.load(Ordering::SeqCst), 0);
        assert!(artist
            .albums(&catalog)
            .unwrap()
            .iter()
            .all(|a| a.cached_tracks().is_none()));
    }

    #[test]
    fn children_point_back_to_their_parents() {
        let catalog = FakeCatalog::with_artist("Nina", &[(10, "One", &[1, 2])]);
        let artist = artist(&catalog);

        let album = Arc::clone(&artist.albums(&catalog).unwrap()[0]);
        let track = Arc::clone(&album.tracks(&catalog).unwrap()[0]);

        assert_eq!(track.album().unwrap().id, 10);
        assert!(Arc::ptr_eq(&track.artist().unwrap(), &artist));
        assert_eq!(track.kind(), EntityKind::Track);
        assert_eq!(album.kind(), EntityKind::Album);
        assert_eq!(artist.kind(), EntityKind::Artist);
    }

    #[test]
    fn album_destination_follows_declared_track_count() {
        let catalog =
            FakeCatalog::with_artist("Nina", &[(10, "One", &[1, 2, 3]), (11, "Solo", &[4])]);
        let artist = artist(&catalog);
        let albums = artist.albums(&catalog).unwrap();
        let root = Path::new("music");

        assert_eq!(albums[0].destination(root), PathBuf::from("music/Nina/One"));
        assert_eq!(albums[1].destination(root), PathBuf::from("music/Nina"));
    }
}
