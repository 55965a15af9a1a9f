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

//! Run summaries.
//!
//! Per-track outcomes are folded into a [`Tally`] per artist. The summary
//! types here only aggregate and format, they never touch the history or the
//! file system.

use std::fmt;

use crate::util::format::format_size;

/// Aggregated outcomes of a set of track downloads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Tally {
    pub succeeded: usize,
    pub failed: usize,
    pub total_bytes: u64,
}

impl Tally {
    /// Adds one outcome. Bytes only count for successful downloads.
    pub(crate) fn record(&mut self, success: bool, bytes: u64) {
        if success {
            self.succeeded += 1;
            self.total_bytes += bytes;
        } else {
            self.failed += 1;
        }
    }

    pub(crate) fn merge(&mut self, other: &Tally) {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.total_bytes += other.total_bytes;
    }
}

/// The outcome of processing one artist.
#[derive(Debug, Clone, Default)]
pub(crate) struct ArtistSummary {
    pub artist: String,
    pub albums: usize,
    /// Track count declared by the catalog across all albums.
    pub total_tracks: u64,
    /// Tracks left out because the history already had them.
    pub skipped: usize,
    /// Tracks handed to the worker pool.
    pub scheduled: usize,
    /// Scheduled tracks never started because the run was interrupted.
    pub cancelled: usize,
    /// Albums whose track listing could not be fetched.
    pub unlisted_albums: usize,
    pub tally: Tally,
    /// Size of everything below the artist's download directory.
    pub disk_usage: u64,
}

impl ArtistSummary {
    pub(crate) fn nothing_to_do(&self) -> bool {
        self.scheduled == 0
    }
}

impl fmt::Display for ArtistSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nothing_to_do() {
            return write!(
                f,
                "{}: nothing to do ({} tracks in {} albums already downloaded)",
                self.artist, self.total_tracks, self.albums
            );
        }

        write!(
            f,
            "{}: {}/{} tracks from {} albums, {} downloaded, {} failed",
            self.artist,
            self.tally.succeeded,
            self.scheduled,
            self.albums,
            format_size(self.tally.total_bytes),
            self.tally.failed
        )?;

        if self.skipped > 0 {
            write!(f, ", {} already present", self.skipped)?;
        }
        if self.cancelled > 0 {
            write!(f, ", {} cancelled", self.cancelled)?;
        }
        if self.unlisted_albums > 0 {
            write!(f, ", {} albums could not be listed", self.unlisted_albums)?;
        }

        write!(f, " ({} on disk)", format_size(self.disk_usage))
    }
}

/// The outcome of a whole run.
#[derive(Debug, Default)]
pub(crate) struct RunSummary {
    pub artists: Vec<ArtistSummary>,
    /// Names that did not resolve in the catalog.
    pub not_found: Vec<String>,
    /// Names skipped because the history marks the artist complete.
    pub already_complete: Vec<String>,
    /// Artists that could not be expanded.
    pub errors: Vec<String>,
    pub interrupted: bool,
}

impl RunSummary {
    pub(crate) fn totals(&self) -> Tally {
        self.artists.iter().fold(Tally::default(), |mut acc, a| {
            acc.merge(&a.tally);
            acc
        })
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let totals = self.totals();

        write!(
            f,
            "{} artists processed: {} tracks downloaded ({}), {} failed",
            self.artists.len(),
            totals.succeeded,
            format_size(totals.total_bytes),
            totals.failed
        )?;

        if !self.not_found.is_empty() {
            write!(f, ", {} not found", self.not_found.len())?;
        }
        if !self.already_complete.is_empty() {
            write!(f, ", {} already complete", self.already_complete.len())?;
        }
        if !self.errors.is_empty() {
            write!(f, ", {} could not be listed", self.errors.len())?;
        }
        if self.interrupted {
            write!(f, " [interrupted]")?;
        }

        Ok(())
    }
}
