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

//! Remote catalog access.
//!
//! This module defines the [`CatalogClient`] capability the rest of the
//! application is written against. The capability covers authentication,
//! artist search, metadata listing and the transfer of a single track to
//! disk. Everything above this seam only deals in the plain records defined
//! here, so the download engine can be driven by any backend (or by an
//! in-memory double in tests).

pub(crate) mod deezer;

use std::{
    fmt,
    path::{Path, PathBuf},
};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub(crate) type ClientResult<T> = std::result::Result<T, ClientError>;

/// Failures reported by a [`CatalogClient`].
#[derive(Error, Debug)]
pub(crate) enum ClientError {
    /// The credential was rejected, nothing can be done without a session.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The requested entity does not exist in the remote catalog.
    #[error("not found: {0}")]
    NotFound(String),

    /// A track could not be transferred.
    #[error("download failed: {0}")]
    Download(String),

    /// The backend cannot serve the requested quality preset.
    #[error("quality preset {0} is not available from this catalog backend")]
    Unsupported(Quality),

    /// The remote service answered with an error payload.
    #[error("catalog API error ({code}): {message}")]
    Api { code: i64, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Audio quality requested for a track download.
#[derive(Serialize, Deserialize, ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum Quality {
    /// The publicly available 30 second clip.
    #[default]
    Preview,
    #[value(name = "mp3-128")]
    #[serde(rename = "mp3-128")]
    Mp3_128,
    #[value(name = "mp3-320")]
    #[serde(rename = "mp3-320")]
    Mp3_320,
    Flac,
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Quality::Preview => "preview",
            Quality::Mp3_128 => "mp3-128",
            Quality::Mp3_320 => "mp3-320",
            Quality::Flac => "flac",
        };
        f.write_str(name)
    }
}

/// An authenticated session.
#[derive(Debug, Clone)]
pub(crate) struct Session {
    pub user_id: u64,
    pub user_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ArtistRecord {
    pub id: u64,
    pub name: String,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AlbumRecord {
    pub id: u64,
    pub title: String,
    pub release_date: String,
    pub disk_count: u32,
    pub track_count: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TrackRecord {
    pub id: u64,
    pub title: String,
    pub short_title: String,
    pub link: String,
    pub duration_seconds: u64,
}

/// The capability the download engine needs from a remote music catalog.
///
/// Implementations must be shareable across the download worker threads;
/// only [`CatalogClient::download_track`] is ever called concurrently.
pub(crate) trait CatalogClient: Send + Sync {
    /// Opens a session with the given credential.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Auth`] if the credential is rejected.
    fn authenticate(&self, credential: &str) -> ClientResult<Session>;

    /// Resolves an artist name to the best matching catalog artist.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotFound`] if nothing matches.
    fn resolve_artist(&self, name: &str) -> ClientResult<ArtistRecord>;

    /// Lists an artist's albums in catalog order.
    fn list_albums(&self, artist_id: u64) -> ClientResult<Vec<AlbumRecord>>;

    /// Lists an album's tracks in catalog order.
    fn list_tracks(&self, album_id: u64) -> ClientResult<Vec<TrackRecord>>;

    /// Transfers one track into `destination`, returning the written file.
    ///
    /// The destination directory is expected to exist already.
    fn download_track(
        &self,
        track_id: u64,
        destination: &Path,
        quality: Quality,
    ) -> ClientResult<PathBuf>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! An in-memory catalog used to drive the engine in tests.

    use std::{
        collections::{HashMap, HashSet},
        fs,
        path::{Path, PathBuf},
        sync::{
            Arc, Mutex,
            atomic::{AtomicBool, AtomicUsize, Ordering},
        },
        thread,
        time::Duration,
    };

    use super::*;

    #[derive(Default)]
    pub(crate) struct FakeCatalog {
        pub artists: Vec<ArtistRecord>,
        pub albums: HashMap<u64, Vec<AlbumRecord>>,
        pub tracks: HashMap<u64, Vec<TrackRecord>>,
        pub failing: HashSet<u64>,
        /// Albums whose track listing fails.
        pub unlistable: HashSet<u64>,
        pub hanging: HashSet<u64>,
        pub hang_for: Duration,
        /// Added to every album listing.
        pub fetch_delay: Duration,
        /// Raises the flag once this many tracks have been downloaded.
        pub cancel_after: Option<(usize, Arc<AtomicBool>)>,
        pub track_bytes: usize,
        pub album_fetches: AtomicUsize,
        pub track_fetches: AtomicUsize,
        pub downloaded: Mutex<Vec<u64>>,
    }

    impl FakeCatalog {
        /// One artist with the given albums, each `(album id, title, track ids)`.
        pub(crate) fn with_artist(name: &str, albums: &[(u64, &str, &[u64])]) -> Self {
            let mut catalog = FakeCatalog {
                track_bytes: 1000,
                ..Default::default()
            };
            catalog.artists.push(ArtistRecord {
                id: 1,
                name: name.to_string(),
                link: "https://example.test/artist/1".to_string(),
            });

            let mut records = Vec::new();
            for (album_id, title, track_ids) in albums {
                records.push(AlbumRecord {
                    id: *album_id,
                    title: title.to_string(),
                    release_date: "2001-01-01".to_string(),
                    disk_count: 1,
                    track_count: track_ids.len() as u32,
                });
                let tracks = track_ids
                    .iter()
                    .map(|id| TrackRecord {
                        id: *id,
                        title: format!("Track {id}"),
                        short_title: format!("Track {id}"),
                        link: format!("https://example.test/track/{id}"),
                        duration_seconds: 180,
                    })
                    .collect();
                catalog.tracks.insert(*album_id, tracks);
            }
            catalog.albums.insert(1, records);

            catalog
        }

        pub(crate) fn downloaded(&self) -> Vec<u64> {
            let mut ids = self.downloaded.lock().unwrap().clone();
            ids.sort();
            ids
        }
    }

    impl CatalogClient for FakeCatalog {
        fn authenticate(&self, credential: &str) -> ClientResult<Session> {
            if credential == "good" {
                Ok(Session {
                    user_id: 7,
                    user_name: "tester".to_string(),
                })
            } else {
                Err(ClientError::Auth("bad token".to_string()))
            }
        }

        fn resolve_artist(&self, name: &str) -> ClientResult<ArtistRecord> {
            self.artists
                .iter()
                .find(|a| a.name.eq_ignore_ascii_case(name))
                .cloned()
                .ok_or_else(|| ClientError::NotFound(name.to_string()))
        }

        fn list_albums(&self, artist_id: u64) -> ClientResult<Vec<AlbumRecord>> {
            self.album_fetches.fetch_add(1, Ordering::SeqCst);
            thread::sleep(self.fetch_delay);
            Ok(self.albums.get(&artist_id).cloned().unwrap_or_default())
        }

        fn list_tracks(&self, album_id: u64) -> ClientResult<Vec<TrackRecord>> {
            self.track_fetches.fetch_add(1, Ordering::SeqCst);
            if self.unlistable.contains(&album_id) {
                return Err(ClientError::NotFound(format!("album {album_id}")));
            }
            Ok(self.tracks.get(&album_id).cloned().unwrap_or_default())
        }

        fn download_track(
            &self,
            track_id: u64,
            destination: &Path,
            _quality: Quality,
        ) -> ClientResult<PathBuf> {
            if self.hanging.contains(&track_id) {
                thread::sleep(self.hang_for);
            }
            if self.failing.contains(&track_id) {
                return Err(ClientError::Download(format!("track {track_id} unavailable")));
            }

            let path = destination.join(format!("{track_id}.mp3"));
            fs::write(&path, vec![0u8; self.track_bytes])?;

            let mut downloaded = self.downloaded.lock().unwrap();
            downloaded.push(track_id);
            if let Some((count, flag)) = &self.cancel_after {
                if downloaded.len() >= *count {
                    flag.store(true, Ordering::SeqCst);
                }
            }

            Ok(path)
        }
    }
}
