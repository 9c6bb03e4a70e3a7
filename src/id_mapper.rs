// Copyright (C) 2017 Hove and/or its affiliates.
//
// This program is free software: you can redistribute it and/or modify it
// under the terms of the GNU Affero General Public License as published by the
// Free Software Foundation, version 3.

// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more
// details.

// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>

//! Mapping of internal identifiers to identifiers written in a GTFS feed.

use std::collections::{BTreeMap, HashSet};
use tracing::warn;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Turn a human readable name into an identifier safe for CSV files and URLs.
///
/// Diacritics are stripped, each run of whitespaces becomes a `-` and every
/// character outside `[A-Za-z0-9_.~-]` is removed.
///
/// ```
/// use transit_exchange::id_mapper::slugify;
///
/// assert_eq!(
///     "AC2-ALLO-with-spaces-and-eeae",
///     slugify("AC2 ALLO with spaces and éèàê")
/// );
/// ```
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut in_whitespace = false;
    for c in name.trim().nfd().filter(|c| !is_combining_mark(*c)) {
        if c.is_whitespace() {
            if !in_whitespace {
                slug.push('-');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;
        if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~') {
            slug.push(c);
        }
    }
    slug
}

/// Identifiers given to the objects of one type during one export.
///
/// An object is identified by the slug of its name when there is one, by its
/// internal identifier otherwise. When two objects give the same slug, the
/// later one keeps its internal identifier, so identifiers stay unique.
#[derive(Debug, Default)]
pub struct IdMapper {
    gtfs_ids: BTreeMap<String, String>,
    used: HashSet<String>,
}

impl IdMapper {
    /// Give a GTFS identifier to the object `id` named `name`, returns it.
    ///
    /// The same `id` always gets the same GTFS identifier.
    pub fn map(&mut self, id: &str, name: Option<&str>) -> String {
        if let Some(gtfs_id) = self.gtfs_ids.get(id) {
            return gtfs_id.clone();
        }
        let slug = name.map(slugify).filter(|slug| !slug.is_empty());
        let gtfs_id = match slug {
            Some(slug) if !self.used.contains(&slug) => slug,
            Some(slug) => {
                warn!(
                    "identifier {:?} is already used, '{}' is exported with its own identifier",
                    slug, id
                );
                id.to_string()
            }
            None => id.to_string(),
        };
        self.used.insert(gtfs_id.clone());
        self.gtfs_ids.insert(id.to_string(), gtfs_id.clone());
        gtfs_id
    }

    /// The GTFS identifier already given to `id`, if any
    pub fn get(&self, id: &str) -> Option<&str> {
        self.gtfs_ids.get(id).map(String::as_str)
    }

    /// The mapping from internal to GTFS identifiers
    pub fn into_map(self) -> BTreeMap<String, String> {
        self.gtfs_ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn slugify_names() {
        assert_eq!("STM", slugify("STM"));
        assert_eq!(
            "AC2-ALLO-with-spaces-and-eeae",
            slugify("AC2 ALLO with spaces and éèàê")
        );
        assert_eq!("a-b", slugify("  a \t\n b "));
        assert_eq!("Semaine_1.0~x", slugify("Semaine_1.0~x"));
        assert_eq!("ca-va", slugify("ça /va?"));
        assert_eq!("", slugify("  "));
    }

    #[test]
    fn map_falls_back_to_internal_id() {
        let mut mapper = IdMapper::default();
        assert_eq!("id1", mapper.map("id1", None));
        assert_eq!("id2", mapper.map("id2", Some("   ")));
        assert_eq!("id3", mapper.map("id3", Some("???")));
        assert_eq!("Week", mapper.map("id4", Some("Week")));
    }

    #[test]
    fn map_keeps_identifiers_unique() {
        let mut mapper = IdMapper::default();
        assert_eq!("Weekday", mapper.map("id1", Some("Weekday")));
        assert_eq!("id2", mapper.map("id2", Some("Weekday")));
        // Mapping the same object again does not change its identifier
        assert_eq!("Weekday", mapper.map("id1", Some("Weekday")));
        assert_eq!(Some("id2"), mapper.get("id2"));
        assert_eq!(None, mapper.get("id3"));
    }
}
