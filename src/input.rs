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

//! Artist list input.

use std::{collections::HashSet, fs, path::Path};

use anyhow::{Context, Result};
use tracing::debug;

/// Reads artist names, one per line.
///
/// Lines are trimmed, blank lines are ignored and repeated names (ignoring
/// case) are kept only once, in first-seen order.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub(crate) fn read_artist_list(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read artist list {:?}", path))?;

    Ok(parse_artist_list(&content))
}

fn parse_artist_list(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();

    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| {
            let fresh = seen.insert(line.to_lowercase());
            if !fresh {
                debug!("Ignoring repeated artist '{}'", line);
            }
            fresh
        })
        .map(str::to_string)
        .collect()
}
