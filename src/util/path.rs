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

//! Destination path construction.

use std::path::{Path, PathBuf};

const REPLACEMENT: char = '_';

/// Makes a catalog title safe to use as a single path component.
///
/// Separators and NUL are replaced so a title can never introduce extra
/// directory levels, and the special names `.` and `..` are neutralised.
pub(crate) fn sanitize_segment(title: &str) -> String {
    let cleaned: String = title
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => REPLACEMENT,
            c if c.is_control() => REPLACEMENT,
            c => c,
        })
        .collect();

    match cleaned.as_str() {
        "" | "." | ".." => REPLACEMENT.to_string(),
        _ => cleaned,
    }
}

/// Computes the directory an album's tracks are written to.
///
/// Albums with more than one track, or spread over several discs, get their
/// own folder below the artist's; single tracks land directly in the artist
/// folder.
pub(crate) fn album_destination(
    root: &Path,
    artist_title: &str,
    album_title: &str,
    track_count: u32,
    disk_count: u32,
) -> PathBuf {
    let artist_dir = artist_destination(root, artist_title);

    if track_count > 1 || disk_count > 1 {
        artist_dir.join(sanitize_segment(album_title))
    } else {
        artist_dir
    }
}

pub(crate) fn artist_destination(root: &Path, artist_title: &str) -> PathBuf {
    root.join(sanitize_segment(artist_title))
}
