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

//! Download progress reporting.
//!
//! The orchestrator reports through [`DownloadProgress`] so the engine stays
//! independent of how (or whether) progress is shown.

use std::{cell::RefCell, time::Duration};

use indicatif::{ProgressBar, ProgressStyle};

use crate::summary::ArtistSummary;

pub(crate) trait DownloadProgress {
    /// An artist's downloads are about to be scheduled.
    fn artist_started(&self, _artist: &str, _scheduled: usize) {}

    /// One scheduled track settled, successfully or not.
    fn track_settled(&self, _title: &str, _success: bool) {}

    fn artist_finished(&self, _summary: &ArtistSummary) {}
}

/// Reports nothing, used when stderr is not a terminal.
pub(crate) struct NoProgress;

impl DownloadProgress for NoProgress {}

/// One terminal progress bar per artist, drawn on stderr.
pub(crate) struct ConsoleProgress {
    bar: RefCell<Option<ProgressBar>>,
}

impl ConsoleProgress {
    pub(crate) fn new() -> Self {
        Self {
            bar: RefCell::new(None),
        }
    }
}

impl DownloadProgress for ConsoleProgress {
    fn artist_started(&self, artist: &str, scheduled: usize) {
        let bar = ProgressBar::new(scheduled as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} (ETA: {eta})")
        {
            bar.set_style(style.progress_chars("=> "));
        }
        bar.set_message(artist.to_string());
        bar.enable_steady_tick(Duration::from_millis(250));

        if let Some(previous) = self.bar.replace(Some(bar)) {
            previous.finish_and_clear();
        }
    }

    fn track_settled(&self, _title: &str, _success: bool) {
        if let Some(bar) = self.bar.borrow().as_ref() {
            bar.inc(1);
        }
    }

    fn artist_finished(&self, _summary: &ArtistSummary) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}
