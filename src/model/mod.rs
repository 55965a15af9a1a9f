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

//! Catalog domain model.
//!
//! The remote catalog is mirrored as a tree of [`catalog::Artist`],
//! [`catalog::Album`] and [`catalog::Track`] nodes. Every node is an
//! [`Entity`] tagged with an [`EntityKind`], which is also the namespace the
//! history ledger files it under.

pub(crate) mod catalog;

use std::fmt;

use serde::{Deserialize, Serialize};

pub(crate) use catalog::{Album, Artist, Track};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum EntityKind {
    Artist,
    Album,
    Track,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Artist => "artist",
            EntityKind::Album => "album",
            EntityKind::Track => "track",
        };
        f.write_str(name)
    }
}

/// Anything the ledger can record as complete.
pub(crate) trait Entity {
    fn kind(&self) -> EntityKind;

    /// Identifier, unique within the entity's kind.
    fn id(&self) -> u64;

    fn title(&self) -> &str;
}
