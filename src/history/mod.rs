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

//! Download history.
//!
//! The history is the record of every catalog entity that has been fully
//! processed, kept so that later runs can skip finished work. It is a JSON
//! document keyed by [`EntityKind`], then by entity id, mapping to the
//! entity's title:
//!
//! ```json
//! {
//!   "Album": { "302127": "Discovery" },
//!   "Track": { "3135553": "One More Time" }
//! }
//! ```
//!
//! Entries are only ever added. The whole document is rewritten on every
//! persist, ordered by kind then id, through a temporary file that is renamed
//! into place.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::model::{Entity, EntityKind};

type Entries = BTreeMap<EntityKind, BTreeMap<u64, String>>;

#[derive(Error, Debug)]
pub(crate) enum LedgerError {
    #[error("failed to read history file {path:?}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed history file {path:?}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write history file {path:?}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode history: {0}")]
    Encode(#[from] serde_json::Error),
}

pub(crate) struct History {
    path: PathBuf,
    entries: Entries,
    // Lower-cased titles per kind, for lookups made before an id is known.
    titles: HashMap<EntityKind, HashSet<String>>,
}

impl History {
    /// Creates an empty history backed by `path`, without reading it.
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Entries::new(),
            titles: HashMap::new(),
        }
    }

    /// Loads the history stored at `path`.
    ///
    /// A missing file gives an empty history. A file that cannot be read or
    /// parsed also gives an empty history, with a warning, and is moved aside
    /// to `<path>.corrupt` so that persisting later cannot overwrite it.
    pub(crate) fn load(path: impl Into<PathBuf>) -> Self {
        let mut history = Self::new(path);

        if !history.path.exists() {
            info!("No history at {:?}, starting fresh", history.path);
            return history;
        }

        match read_entries(&history.path) {
            Ok(entries) => {
                history.entries = entries;
                history.rebuild_titles();
                info!(
                    "Loaded history from {:?}: {} artists, {} albums, {} tracks",
                    history.path,
                    history.count(EntityKind::Artist),
                    history.count(EntityKind::Album),
                    history.count(EntityKind::Track)
                );
            }
            Err(e) => {
                warn!("{}, using a blank history", e);
                let preserved = sibling(&history.path, "corrupt");
                match fs::rename(&history.path, &preserved) {
                    Ok(()) => warn!("Unreadable history moved to {:?}", preserved),
                    Err(e) => warn!("Could not move unreadable history aside: {}", e),
                }
            }
        }

        history
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the entity `kind`/`id` has been recorded complete.
    pub(crate) fn contains(&self, kind: EntityKind, id: u64) -> bool {
        self.entries
            .get(&kind)
            .is_some_and(|ids| ids.contains_key(&id))
    }

    /// Whether any entity of `kind` with this title (ignoring case) has been
    /// recorded complete.
    pub(crate) fn find_by_title(&self, kind: EntityKind, title: &str) -> bool {
        self.titles
            .get(&kind)
            .is_some_and(|titles| titles.contains(&title_key(title)))
    }

    /// Records an entity as complete. Recording it again only refreshes the
    /// stored title.
    pub(crate) fn record_complete(&mut self, entity: &dyn Entity) {
        let kind = entity.kind();
        let title = entity.title().to_string();

        debug!("Recording {} {} '{}' complete", kind, entity.id(), title);

        self.titles
            .entry(kind)
            .or_default()
            .insert(title_key(&title));
        self.entries
            .entry(kind)
            .or_default()
            .insert(entity.id(), title);
    }

    pub(crate) fn count(&self, kind: EntityKind) -> usize {
        self.entries.get(&kind).map_or(0, BTreeMap::len)
    }

    /// Writes the full history to its backing file.
    ///
    /// The content goes to `<path>.tmp` first and is renamed over the target,
    /// so a failure part way leaves the previous file intact. Safe to call any
    /// number of times.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be encoded or written.
    pub(crate) fn persist(&self) -> Result<(), LedgerError> {
        let json = serde_json::to_string_pretty(&self.entries)?;
        let temp = sibling(&self.path, "tmp");

        let write = || -> io::Result<()> {
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let mut file = File::create(&temp)?;
            file.write_all(json.as_bytes())?;
            file.write_all(b"\n")?;
            file.sync_all()?;
            fs::rename(&temp, &self.path)
        };

        write().map_err(|source| LedgerError::Persist {
            path: self.path.clone(),
            source,
        })?;

        info!("History written to {:?}", self.path);

        Ok(())
    }

    fn rebuild_titles(&mut self) {
        self.titles = self
            .entries
            .iter()
            .map(|(kind, ids)| (*kind, ids.values().map(|t| title_key(t)).collect()))
            .collect();
    }
}

fn read_entries(path: &Path) -> Result<Entries, LedgerError> {
    let content = fs::read_to_string(path).map_err(|source| LedgerError::Load {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| LedgerError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

fn title_key(title: &str) -> String {
    title.trim().to_lowercase()
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Item(EntityKind, u64, &'static str);

    impl Entity for Item {
        fn kind(&self) -> EntityKind {
            self.0
        }

        fn id(&self) -> u64 {
            self.1
        }

        fn title(&self) -> &str {
            self.2
        }
    }

    #[test]
    fn unseen_kinds_are_not_contained() {
        let history = History::new("unused.json");
        assert!(!history.contains(EntityKind::Track, 1));
        assert!(!history.find_by_title(EntityKind::Artist, "Nina"));
    }

    #[test]
    fn recorded_entities_are_contained_under_their_kind_only() {
        let mut history = History::new("unused.json");
        history.record_complete(&Item(EntityKind::Track, 42, "Song"));

        assert!(history.contains(EntityKind::Track, 42));
        assert!(!history.contains(EntityKind::Album, 42));
        assert!(!history.contains(EntityKind::Track, 43));
    }

    #[test]
    fn re_recording_overwrites_the_title() {
        let mut history = History::new("unused.json");
        history.record_complete(&Item(EntityKind::Album, 1, "Old"));
        history.record_complete(&Item(EntityKind::Album, 1, "New"));

        assert_eq!(history.count(EntityKind::Album), 1);
        assert!(history.find_by_title(EntityKind::Album, "new"));
    }

    #[test]
    fn finds_artists_by_title_ignoring_case() {
        let mut history = History::new("unused.json");
        history.record_complete(&Item(EntityKind::Artist, 27, "Daft Punk"));

        assert!(history.find_by_title(EntityKind::Artist, "daft punk"));
        assert!(history.find_by_title(EntityKind::Artist, " Daft Punk "));
        assert!(!history.find_by_title(EntityKind::Album, "Daft Punk"));
    }

    #[test]
    fn persisted_entries_survive_a_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");

        let mut history = History::load(&path);
        history.record_complete(&Item(EntityKind::Track, 3, "Three"));
        history.record_complete(&Item(EntityKind::Artist, 1, "One"));
        history.persist().unwrap();
        history.persist().unwrap();

        let reloaded = History::load(&path);
        assert!(reloaded.contains(EntityKind::Track, 3));
        assert!(reloaded.contains(EntityKind::Artist, 1));
        assert!(reloaded.find_by_title(EntityKind::Artist, "one"));
        assert!(!sibling(&path, "tmp").exists());
    }

    #[test]
    fn persisted_document_is_sorted_by_kind_then_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");

        let mut history = History::new(&path);
        history.record_complete(&Item(EntityKind::Track, 100, "b"));
        history.record_complete(&Item(EntityKind::Track, 9, "a"));
        history.record_complete(&Item(EntityKind::Album, 5, "c"));
        history.record_complete(&Item(EntityKind::Artist, 7, "d"));
        history.persist().unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let positions: Vec<usize> = ["\"Artist\"", "\"Album\"", "\"Track\"", "\"9\"", "\"100\""]
            .iter()
            .map(|needle| text.find(needle).unwrap())
            .collect();

        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{text}");
    }

    #[test]
    fn malformed_file_gives_empty_history_and_is_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        fs::write(&path, "{ not json").unwrap();

        let mut history = History::load(&path);
        assert_eq!(history.count(EntityKind::Track), 0);

        history.record_complete(&Item(EntityKind::Track, 1, "x"));
        history.persist().unwrap();

        let preserved = fs::read_to_string(sibling(&path, "corrupt")).unwrap();
        assert_eq!(preserved, "{ not json");
        assert!(History::load(&path).contains(EntityKind::Track, 1));
    }

    #[test]
    fn persist_creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state/nested/history.json");

        History::new(&path).persist().unwrap();

        assert!(path.exists());
    }
}
