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

//! Deezer public API backend.
//!
//! Metadata comes from the documented JSON API. Audio is limited to what
//! that API exposes publicly, the 30 second preview stream, so only
//! [`Quality::Preview`] is accepted for downloads.

use std::{
    fs::{self, File},
    path::{Path, PathBuf},
    sync::RwLock,
    time::Duration,
};

use reqwest::blocking::Client;
use serde::{Deserialize, de::DeserializeOwned};
use tracing::{debug, warn};

use crate::{
    client::{
        AlbumRecord, ArtistRecord, CatalogClient, ClientError, ClientResult, Quality, Session,
        TrackRecord,
    },
    util::path::sanitize_segment,
};

const API_BASE: &str = "https://api.deezer.com";

const PAGE_SIZE: usize = 100;

// Error code the API uses for "no data" responses.
const DATA_NOT_FOUND: i64 = 800;

pub(crate) struct DeezerClient {
    client: Client,
    access_token: RwLock<Option<String>>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct Page<T> {
    data: Vec<T>,
    next: Option<String>,
}

#[derive(Deserialize)]
struct User {
    id: u64,
    name: String,
}

#[derive(Deserialize)]
struct ApiArtist {
    id: u64,
    name: String,
    link: String,
}

/// An entry of an artist's album listing.
#[derive(Deserialize)]
struct ApiAlbumSummary {
    id: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    release_date: String,
    #[serde(default)]
    nb_tracks: Option<u32>,
}

impl ApiAlbumSummary {
    /// Best effort record for an album whose details cannot be fetched.
    ///
    /// Its track listing is still attempted later, a failure there is counted
    /// against the artist instead of hiding the album.
    fn into_record(self) -> AlbumRecord {
        AlbumRecord {
            id: self.id,
            title: self.title,
            release_date: self.release_date,
            disk_count: 1,
            track_count: self.nb_tracks.unwrap_or(0),
        }
    }
}

#[derive(Deserialize)]
struct ApiAlbum {
    id: u64,
    title: String,
    #[serde(default)]
    release_date: String,
    nb_tracks: u32,
    tracks: Page<ApiAlbumTrack>,
}

#[derive(Deserialize)]
struct ApiAlbumTrack {
    id: u64,
    #[serde(default)]
    disk_number: Option<u32>,
}

/// Disc count from the album's own track list, when it carries disc numbers.
fn declared_disk_count(tracks: &[ApiAlbumTrack]) -> Option<u32> {
    tracks.iter().filter_map(|t| t.disk_number).max()
}

#[derive(Deserialize)]
struct ApiTrack {
    id: u64,
    title: String,
    #[serde(default)]
    title_short: String,
    link: String,
    duration: u64,
}

impl From<ApiTrack> for TrackRecord {
    fn from(track: ApiTrack) -> Self {
        let short_title = if track.title_short.is_empty() {
            track.title.clone()
        } else {
            track.title_short
        };

        TrackRecord {
            id: track.id,
            title: track.title,
            short_title,
            link: track.link,
            duration_seconds: track.duration,
        }
    }
}

#[derive(Deserialize)]
struct ApiTrackDetail {
    id: u64,
    title: String,
    #[serde(default)]
    preview: String,
    #[serde(default)]
    track_position: Option<u32>,
    #[serde(default)]
    disk_number: Option<u32>,
}

impl ApiTrackDetail {
    /// File name for this track.
    ///
    /// The track id keeps names unique when several tracks with the same
    /// title share a directory.
    fn file_name(&self) -> String {
        let title = sanitize_segment(&self.title);
        match (self.disk_number, self.track_position) {
            (Some(disk), Some(position)) if disk > 1 => {
                format!("{disk}-{position:02} - {title} [{}].mp3", self.id)
            }
            (_, Some(position)) => format!("{position:02} - {title} [{}].mp3", self.id),
            _ => format!("{title} [{}].mp3", self.id),
        }
    }
}

/// Turns a decoded response body into `T`.
///
/// The API reports most failures with a 200 status and an `error` object in
/// the body, so the payload is inspected before it is decoded.
fn decode_response<T: DeserializeOwned>(
    url: &str,
    mut body: serde_json::Value,
) -> ClientResult<T> {
    if let Some(error) = body.get_mut("error").map(serde_json::Value::take) {
        let error: ApiErrorBody = serde_json::from_value(error).unwrap_or(ApiErrorBody {
            code: 0,
            message: "unknown error".to_string(),
        });
        if error.code == DATA_NOT_FOUND {
            return Err(ClientError::NotFound(url.to_string()));
        }
        return Err(ClientError::Api {
            code: error.code,
            message: error.message,
        });
    }

    serde_json::from_value(body).map_err(|e| ClientError::Api {
        code: 0,
        message: format!("unexpected response from {url}: {e}"),
    })
}

impl DeezerClient {
    pub(crate) fn new(request_timeout: Duration) -> ClientResult<Self> {
        let client = Client::builder().timeout(request_timeout).build()?;

        Ok(Self {
            client,
            access_token: RwLock::new(None),
        })
    }

    fn token(&self) -> Option<String> {
        self.access_token
            .read()
            .map(|token| token.clone())
            .unwrap_or_default()
    }

    /// Issues a GET against the API and decodes the body.
    fn get<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> ClientResult<T> {
        let mut request = self.client.get(url).query(query);
        if let Some(token) = self.token() {
            request = request.query(&[("access_token", token)]);
        }

        let response = request.send()?.error_for_status()?;
        decode_response(url, response.json()?)
    }

    /// Follows `next` links until the listing is exhausted.
    fn get_all<T: DeserializeOwned>(&self, url: &str) -> ClientResult<Vec<T>> {
        let mut items = Vec::new();
        let mut page: Page<T> = self.get(url, &[("limit", PAGE_SIZE.to_string())])?;

        loop {
            items.extend(page.data);
            match page.next {
                Some(next) => page = self.get(&next, &[])?,
                None => break,
            }
        }

        Ok(items)
    }

    fn album_record(&self, summary: ApiAlbumSummary) -> AlbumRecord {
        let url = format!("{API_BASE}/album/{}", summary.id);
        let album: ApiAlbum = match self.get(&url, &[]) {
            Ok(album) => album,
            Err(e) => {
                warn!("Failed to fetch details of album '{}': {}", summary.title, e);
                return summary.into_record();
            }
        };

        let disk_count = self.disk_count(&album);

        AlbumRecord {
            id: album.id,
            title: album.title,
            release_date: album.release_date,
            disk_count,
            track_count: album.nb_tracks,
        }
    }

    /// Number of discs of `album`.
    ///
    /// Album track lists usually omit disc numbers. Tracks are listed in disc
    /// order, so the last track's own details give the count.
    fn disk_count(&self, album: &ApiAlbum) -> u32 {
        if let Some(count) = declared_disk_count(&album.tracks.data) {
            return count;
        }

        let Some(last) = album.tracks.data.last() else {
            return 1;
        };

        match self.get::<ApiTrackDetail>(&format!("{API_BASE}/track/{}", last.id), &[]) {
            Ok(track) => track.disk_number.unwrap_or(1),
            Err(e) => {
                debug!("No disc number for album '{}': {}", album.title, e);
                1
            }
        }
    }
}

impl CatalogClient for DeezerClient {
    fn authenticate(&self, credential: &str) -> ClientResult<Session> {
        if credential.trim().is_empty() {
            return Err(ClientError::Auth("no access token given".to_string()));
        }

        let user: User = self
            .client
            .get(format!("{API_BASE}/user/me"))
            .query(&[("access_token", credential)])
            .send()?
            .error_for_status()?
            .json::<serde_json::Value>()
            .map_err(ClientError::from)
            .and_then(|body| {
                if let Some(error) = body.get("error") {
                    let message = error
                        .get("message")
                        .and_then(|m| m.as_str())
                        .unwrap_or("token rejected");
                    return Err(ClientError::Auth(message.to_string()));
                }
                serde_json::from_value(body).map_err(|e| ClientError::Auth(e.to_string()))
            })?;

        if let Ok(mut token) = self.access_token.write() {
            *token = Some(credential.to_string());
        }

        Ok(Session {
            user_id: user.id,
            user_name: user.name,
        })
    }

    fn resolve_artist(&self, name: &str) -> ClientResult<ArtistRecord> {
        let page: Page<ApiArtist> = self.get(
            &format!("{API_BASE}/search/artist"),
            &[("q", name.to_string()), ("limit", "1".to_string())],
        )?;

        let artist = page
            .data
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::NotFound(format!("artist '{name}'")))?;

        Ok(ArtistRecord {
            id: artist.id,
            name: artist.name,
            link: artist.link,
        })
    }

    fn list_albums(&self, artist_id: u64) -> ClientResult<Vec<AlbumRecord>> {
        let summaries: Vec<ApiAlbumSummary> =
            self.get_all(&format!("{API_BASE}/artist/{artist_id}/albums"))?;

        // The discography listing carries no track or disc counts, those
        // only come with the album itself.
        Ok(summaries
            .into_iter()
            .map(|summary| self.album_record(summary))
            .collect())
    }

    fn list_tracks(&self, album_id: u64) -> ClientResult<Vec<TrackRecord>> {
        let tracks: Vec<ApiTrack> = self.get_all(&format!("{API_BASE}/album/{album_id}/tracks"))?;

        Ok(tracks.into_iter().map(TrackRecord::from).collect())
    }

    fn download_track(
        &self,
        track_id: u64,
        destination: &Path,
        quality: Quality,
    ) -> ClientResult<PathBuf> {
        if quality != Quality::Preview {
            return Err(ClientError::Unsupported(quality));
        }

        let track: ApiTrackDetail = self.get(&format!("{API_BASE}/track/{track_id}"), &[])?;
        if track.preview.is_empty() {
            return Err(ClientError::Download(format!(
                "track {track_id} has no stream available"
            )));
        }

        let target = destination.join(track.file_name());
        let partial = target.with_extension("mp3.part");

        debug!("Fetching track {} into {:?}", track_id, target);

        let mut response = self.client.get(&track.preview).send()?.error_for_status()?;
        let mut file = File::create(&partial)?;
        if let Err(e) = response.copy_to(&mut file) {
            drop(file);
            let _ = fs::remove_file(&partial);
            return Err(ClientError::Download(format!("track {track_id}: {e}")));
        }
        drop(file);

        fs::rename(&partial, &target)?;

        Ok(target)
    }
}
