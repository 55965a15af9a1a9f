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

//! Discography download orchestration.
//!
//! The [`Orchestrator`] drives a whole run:
//!
//! 1. Artist names are resolved one after the other against the catalog.
//! 2. For each artist in turn, albums and then tracks are expanded (again
//!    sequentially) and every track the history does not already hold is
//!    planned into its album's destination directory.
//! 3. The planned tracks are handed to a bounded [`pool::WorkerPool`] all at
//!    once, and outcomes are collected in whatever order they arrive.
//!
//! Collected outcomes are the only place the history is written to. A track
//! is recorded complete as soon as its download succeeds; failed, timed out
//! and cancelled tracks are not recorded and will be tried again next run.
//!
//! Per track the states are `Pending -> Scheduled -> {Succeeded, Failed}`,
//! nothing is retried within a run.

pub(crate) mod pool;

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::RecvTimeoutError,
    },
    time::{Duration, Instant},
};

use tracing::{debug, info, warn};

use crate::{
    client::{CatalogClient, ClientError, ClientResult, Quality},
    history::History,
    model::{Album, Artist, EntityKind, Track},
    progress::DownloadProgress,
    summary::{ArtistSummary, RunSummary},
    tasks::pool::{DownloadJob, WorkerMessage, WorkerPool},
    util::{
        disk::{dir_size, file_size},
        format::format_time,
        path::artist_destination,
    },
};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

// How long in-flight downloads may keep going after an interrupt.
const CANCEL_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub(crate) struct DownloadSettings {
    pub download_dir: PathBuf,
    pub workers: usize,
    pub quality: Quality,
    /// Longest wait for a started download before it counts as failed.
    pub unit_timeout: Duration,
    pub artist_limit: Option<usize>,
    pub skip_completed_artists: bool,
}

struct PendingUnit {
    track: Arc<Track>,
    /// When the unit started, and on which worker.
    started: Option<(Instant, usize)>,
}

pub(crate) struct Orchestrator {
    client: Arc<dyn CatalogClient>,
    history: History,
    settings: DownloadSettings,
    cancel: Arc<AtomicBool>,
    progress: Box<dyn DownloadProgress>,
    pool: WorkerPool,
    next_seq: usize,
}

impl Orchestrator {
    /// Creates an orchestrator that owns `history` until [`Self::into_history`].
    ///
    /// `cancel` is the process-wide interrupt flag. Once set, no further work
    /// is started.
    pub(crate) fn new(
        client: Arc<dyn CatalogClient>,
        history: History,
        settings: DownloadSettings,
        cancel: Arc<AtomicBool>,
        progress: Box<dyn DownloadProgress>,
    ) -> Self {
        let pool = WorkerPool::spawn(
            settings.workers,
            Arc::clone(&client),
            settings.quality,
            Arc::clone(&cancel),
        );

        Self {
            client,
            history,
            settings,
            cancel,
            progress,
            pool,
            next_seq: 0,
        }
    }

    pub(crate) fn history(&self) -> &History {
        &self.history
    }

    pub(crate) fn into_history(self) -> History {
        self.history
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Resolves the names and downloads every artist found.
    pub(crate) fn run(&mut self, names: &[String]) -> RunSummary {
        let mut summary = RunSummary::default();

        let artists = self.resolve_artists(names, &mut summary);
        info!("Resolved {} of {} artists", artists.len(), names.len());

        for artist in &artists {
            if self.cancelled() {
                break;
            }

            match self.download_artist(artist) {
                Ok(artist_summary) => {
                    info!("{}", artist_summary);
                    summary.artists.push(artist_summary);
                }
                Err(e) => {
                    warn!("Failed to list albums of '{}': {}", artist.title, e);
                    summary.errors.push(artist.title.clone());
                }
            }
        }

        summary.interrupted = self.cancelled();

        summary
    }

    /// Resolves artist names to catalog artists, one request at a time.
    ///
    /// Names that do not resolve are reported and skipped. At most
    /// `artist_limit` artists are returned.
    pub(crate) fn resolve_artists(
        &self,
        names: &[String],
        summary: &mut RunSummary,
    ) -> Vec<Arc<Artist>> {
        let mut artists: Vec<Arc<Artist>> = Vec::new();

        for name in names {
            if self.cancelled() {
                break;
            }
            if self
                .settings
                .artist_limit
                .is_some_and(|limit| artists.len() >= limit)
            {
                debug!("Artist limit reached, ignoring the remaining names");
                break;
            }

            if self.settings.skip_completed_artists
                && self.history.find_by_title(EntityKind::Artist, name)
            {
                info!("Skipping '{}', already complete", name);
                summary.already_complete.push(name.clone());
                continue;
            }

            match self.client.resolve_artist(name) {
                Ok(record) => {
                    if self.settings.skip_completed_artists
                        && self.history.contains(EntityKind::Artist, record.id)
                    {
                        info!("Skipping '{}', already complete", record.name);
                        summary.already_complete.push(name.clone());
                        continue;
                    }
                    if artists.iter().any(|a| a.id == record.id) {
                        debug!("'{}' resolves to an artist already queued", name);
                        continue;
                    }

                    info!("Resolved '{}' to {} ({})", name, record.name, record.link);
                    artists.push(Artist::new(record));
                }
                Err(ClientError::NotFound(_)) => {
                    warn!("Artist '{}' not found", name);
                    summary.not_found.push(name.clone());
                }
                Err(e) => {
                    warn!("Search for '{}' failed: {}", name, e);
                    summary.errors.push(name.clone());
                }
            }
        }

        artists
    }

    /// Downloads everything of `artist` the history does not already hold.
    ///
    /// # Errors
    ///
    /// Returns an error if the artist's albums cannot be listed. Failures
    /// listing a single album's tracks, or downloading single tracks, are
    /// counted in the summary instead.
    pub(crate) fn download_artist(&mut self, artist: &Arc<Artist>) -> ClientResult<ArtistSummary> {
        let client = Arc::clone(&self.client);

        let albums = artist.albums(client.as_ref())?;
        let total_tracks = artist.total_tracks(client.as_ref())?;

        info!(
            "{} ({}): {} albums, {} tracks",
            artist.title,
            artist.link,
            albums.len(),
            total_tracks
        );

        let mut summary = ArtistSummary {
            artist: artist.title.clone(),
            albums: albums.len(),
            total_tracks,
            ..Default::default()
        };

        let plan = self.plan(albums, client.as_ref(), &mut summary);
        summary.scheduled = plan.len();

        self.progress.artist_started(&artist.title, plan.len());
        if !plan.is_empty() {
            self.execute(plan, &mut summary);
        }
        self.record_complete_albums(artist, albums, &summary);

        summary.disk_usage = dir_size(&artist_destination(
            &self.settings.download_dir,
            &artist.title,
        ));
        self.progress.artist_finished(&summary);

        Ok(summary)
    }

    /// Expands each album and lists the tracks still to download, paired
    /// with their destination directory.
    fn plan(
        &self,
        albums: &[Arc<Album>],
        client: &dyn CatalogClient,
        summary: &mut ArtistSummary,
    ) -> Vec<(Arc<Track>, PathBuf)> {
        let mut plan = Vec::new();

        for album in albums {
            if self.cancelled() {
                break;
            }

            if self.history.contains(EntityKind::Album, album.id) {
                debug!("Album '{}' already complete", album.title);
                summary.skipped += album.track_count as usize;
                continue;
            }

            let tracks = match album.tracks(client) {
                Ok(tracks) => tracks,
                Err(e) => {
                    warn!("Failed to list tracks of '{}': {}", album.title, e);
                    summary.unlisted_albums += 1;
                    continue;
                }
            };

            // Computed once per album, whichever of its tracks are left.
            let destination = album.destination(&self.settings.download_dir);
            debug!(
                "Album '{}' ({}, {} tracks) goes to {:?}",
                album.title, album.release_date, album.track_count, destination
            );

            for track in tracks {
                if self.history.contains(EntityKind::Track, track.id) {
                    summary.skipped += 1;
                } else {
                    plan.push((Arc::clone(track), destination.clone()));
                }
            }
        }

        plan
    }

    /// Schedules every planned track at once and collects the outcomes.
    fn execute(&mut self, plan: Vec<(Arc<Track>, PathBuf)>, summary: &mut ArtistSummary) {
        let mut pending: HashMap<usize, PendingUnit> = HashMap::with_capacity(plan.len());

        for (track, destination) in plan {
            let seq = self.next_seq;
            self.next_seq += 1;

            let job = DownloadJob {
                seq,
                track_id: track.id,
                destination,
            };

            if self.pool.submit(job) {
                pending.insert(
                    seq,
                    PendingUnit {
                        track,
                        started: None,
                    },
                );
            } else {
                warn!("No download worker available for '{}'", track.title);
                let error = ClientError::Download("no worker available".to_string());
                self.settle(&track, Err(error), summary);
            }
        }

        let mut cancelled_at: Option<Instant> = None;

        while !pending.is_empty() {
            match self.pool.next_message(POLL_INTERVAL) {
                Ok(WorkerMessage::Started { seq, worker }) => {
                    if let Some(unit) = pending.get_mut(&seq) {
                        unit.started = Some((Instant::now(), worker));
                    }
                }
                Ok(WorkerMessage::Finished { seq, result }) => match pending.remove(&seq) {
                    Some(unit) => self.settle(&unit.track, result, summary),
                    None => debug!("Ignoring late result for job {}", seq),
                },
                Ok(WorkerMessage::Cancelled { seq }) => {
                    if pending.remove(&seq).is_some() {
                        summary.cancelled += 1;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("All download workers have exited");
                    for (_, unit) in pending.drain() {
                        self.settle(
                            &unit.track,
                            Err(ClientError::Download("download worker exited".to_string())),
                            summary,
                        );
                    }
                    break;
                }
            }

            self.expire_stalled(&mut pending, summary);

            if self.cancelled() && !pending.is_empty() {
                let since = *cancelled_at.get_or_insert_with(Instant::now);
                if since.elapsed() >= CANCEL_GRACE {
                    warn!("Abandoning {} unfinished downloads", pending.len());
                    summary.cancelled += pending.len();
                    pending.clear();
                }
            }
        }
    }

    /// Fails every started unit that has been running longer than the unit
    /// timeout. Its eventual result, if any, is ignored, and the worker stuck
    /// on it is replaced so queued units keep moving.
    fn expire_stalled(
        &mut self,
        pending: &mut HashMap<usize, PendingUnit>,
        summary: &mut ArtistSummary,
    ) {
        let timeout = self.settings.unit_timeout;

        let stalled: Vec<(usize, usize)> = pending
            .iter()
            .filter_map(|(seq, unit)| match unit.started {
                Some((since, worker)) if since.elapsed() >= timeout => Some((*seq, worker)),
                _ => None,
            })
            .collect();

        for (seq, worker) in stalled {
            if let Some(unit) = pending.remove(&seq) {
                warn!(
                    "'{}' still running after {:?}, replacing its worker",
                    unit.track.title, timeout
                );
                self.pool.replace_worker(worker);
                self.settle(
                    &unit.track,
                    Err(ClientError::Download(format!("timed out after {:?}", timeout))),
                    summary,
                );
            }
        }
    }

    /// Folds one unit's outcome into the summary, recording successes in the
    /// history.
    fn settle(
        &mut self,
        track: &Arc<Track>,
        result: ClientResult<PathBuf>,
        summary: &mut ArtistSummary,
    ) {
        let success = match result {
            Ok(path) => {
                let bytes = file_size(&path);
                debug!(
                    "Downloaded '{}' by {} to {:?}",
                    track.title,
                    track.artist().map(|a| a.title.clone()).unwrap_or_default(),
                    path
                );
                self.history.record_complete(&**track);
                summary.tally.record(true, bytes);
                true
            }
            Err(e) => {
                warn!(
                    "Failed to download '{}' from '{}' [{}] ({}): {}",
                    track.title,
                    track.album().map(|a| a.title.clone()).unwrap_or_default(),
                    format_time(track.duration_seconds),
                    track.link,
                    e
                );
                summary.tally.record(false, 0);
                false
            }
        };

        self.progress.track_settled(&track.short_title, success);
    }

    /// Records albums whose every track is now in the history, and the
    /// artist once all of its albums are.
    fn record_complete_albums(
        &mut self,
        artist: &Arc<Artist>,
        albums: &[Arc<Album>],
        summary: &ArtistSummary,
    ) {
        let mut artist_complete = summary.unlisted_albums == 0 && !albums.is_empty();

        for album in albums {
            if self.history.contains(EntityKind::Album, album.id) {
                continue;
            }

            let complete = album.cached_tracks().is_some_and(|tracks| {
                tracks
                    .iter()
                    .all(|t| self.history.contains(EntityKind::Track, t.id))
            });

            if complete {
                self.history.record_complete(&**album);
            } else {
                artist_complete = false;
            }
        }

        if artist_complete {
            self.history.record_complete(&**artist);
        }
    }
}
