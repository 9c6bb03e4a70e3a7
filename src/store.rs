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

//! Access to the persisted transit objects.
//!
//! Export and import only see the [`Store`] trait. [`InMemoryStore`] is a
//! reference implementation keeping a [`CollectionWithId`] behind a lock, and
//! [`NetworkStores`] groups one store per object type, read from and written
//! to a directory of JSON files.

use crate::objects::{Agency, Line, Node, Path, Schedule, Service};
use crate::Result;
use anyhow::Context;
use serde::{de::DeserializeOwned, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path;
use std::sync::RwLock;
use tracing::info;
use typed_index_collection::{CollectionWithId, Id};

/// Errors reported by a store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An object with this identifier is already stored
    #[error("object '{0}' already exists")]
    AlreadyExists(String),
    /// No object with this identifier is stored
    #[error("object '{0}' does not exist")]
    NotFound(String),
    /// The same identifier appears twice in one batch
    #[error("object '{0}' appears more than once in the batch")]
    DuplicateInBatch(String),
    /// The storage backend failed
    #[error("store failure: {0}")]
    Backend(String),
}

/// A store of objects of type `T`.
///
/// Batch operations are all-or-nothing: when one object of the batch is
/// rejected, none is written.
pub trait Store<T> {
    /// All the stored objects
    fn collection(&self) -> std::result::Result<CollectionWithId<T>, StoreError>;

    /// Whether an object with this identifier is stored
    fn exists(&self, id: &str) -> std::result::Result<bool, StoreError>;

    /// Store new objects, returns their identifiers
    fn create_multiple(&self, objects: Vec<T>) -> std::result::Result<Vec<String>, StoreError>;

    /// Replace stored objects, returns their identifiers
    fn update_multiple(&self, objects: Vec<T>) -> std::result::Result<Vec<String>, StoreError>;

    /// Remove objects, returns the identifiers actually removed
    fn delete_multiple(&self, ids: &[String]) -> std::result::Result<Vec<String>, StoreError>;
}

/// The store of schedules, which can also be queried by line
pub trait ScheduleStore: Store<Schedule> {
    /// Schedules of the given lines, in the order of `line_ids`
    fn read_for_lines(&self, line_ids: &[String])
        -> std::result::Result<Vec<Schedule>, StoreError>;
}

/// A store keeping all its objects in memory
#[derive(Debug)]
pub struct InMemoryStore<T> {
    objects: RwLock<CollectionWithId<T>>,
}

impl<T> Default for InMemoryStore<T> {
    fn default() -> Self {
        InMemoryStore {
            objects: RwLock::new(CollectionWithId::default()),
        }
    }
}

impl<T: Id<T> + Clone> InMemoryStore<T> {
    /// Create a store holding `objects`
    pub fn new(objects: Vec<T>) -> std::result::Result<Self, StoreError> {
        let objects = CollectionWithId::new(objects).map_err(backend_error)?;
        Ok(InMemoryStore {
            objects: RwLock::new(objects),
        })
    }

    fn snapshot(&self) -> std::result::Result<Vec<T>, StoreError> {
        let objects = self.objects.read().map_err(backend_error)?;
        Ok(objects.values().cloned().collect())
    }
}

impl<T: Id<T> + Clone + DeserializeOwned> InMemoryStore<T> {
    /// Read a store from a JSON file holding an array of objects.
    ///
    /// A missing file gives an empty store.
    pub fn from_json<P: AsRef<path::Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!("Skipping missing {:?}", path);
            return Ok(InMemoryStore::default());
        }
        info!(file_name = ?path, "Reading");
        let file = File::open(path).with_context(|| format!("Error reading {path:?}"))?;
        let objects: Vec<T> = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Error reading {path:?}"))?;
        InMemoryStore::new(objects).with_context(|| format!("Error reading {path:?}"))
    }
}

impl<T: Id<T> + Clone + Serialize> InMemoryStore<T> {
    /// Write all the objects of the store as a JSON array.
    ///
    /// The file is replaced only once fully written.
    pub fn to_json<P: AsRef<path::Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!(file_name = ?path, "Writing");
        let directory = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| path::Path::new("."));
        let tmp_file = tempfile::NamedTempFile::new_in(directory)
            .with_context(|| format!("Error writing {path:?}"))?;
        {
            let mut writer = BufWriter::new(tmp_file.as_file());
            serde_json::to_writer_pretty(&mut writer, &self.snapshot()?)
                .with_context(|| format!("Error writing {path:?}"))?;
            writer
                .flush()
                .with_context(|| format!("Error writing {path:?}"))?;
        }
        tmp_file
            .persist(path)
            .with_context(|| format!("Error writing {path:?}"))?;
        Ok(())
    }
}

impl<T: Id<T> + Clone> Store<T> for InMemoryStore<T> {
    fn collection(&self) -> std::result::Result<CollectionWithId<T>, StoreError> {
        CollectionWithId::new(self.snapshot()?).map_err(backend_error)
    }

    fn exists(&self, id: &str) -> std::result::Result<bool, StoreError> {
        let objects = self.objects.read().map_err(backend_error)?;
        Ok(objects.contains_id(id))
    }

    fn create_multiple(&self, objects: Vec<T>) -> std::result::Result<Vec<String>, StoreError> {
        let mut stored_objects = self.objects.write().map_err(backend_error)?;
        let mut ids = Vec::with_capacity(objects.len());
        for object in &objects {
            if stored_objects.contains_id(object.id()) {
                return Err(StoreError::AlreadyExists(object.id().to_string()));
            }
            if ids.iter().any(|id| id == object.id()) {
                return Err(StoreError::DuplicateInBatch(object.id().to_string()));
            }
            ids.push(object.id().to_string());
        }
        let mut stored: Vec<T> = stored_objects.values().cloned().collect();
        stored.extend(objects);
        *stored_objects = CollectionWithId::new(stored).map_err(backend_error)?;
        Ok(ids)
    }

    fn update_multiple(&self, objects: Vec<T>) -> std::result::Result<Vec<String>, StoreError> {
        let mut stored_objects = self.objects.write().map_err(backend_error)?;
        let mut stored: Vec<T> = stored_objects.values().cloned().collect();
        let mut ids = Vec::with_capacity(objects.len());
        for object in objects {
            let id = object.id().to_string();
            if ids.contains(&id) {
                return Err(StoreError::DuplicateInBatch(id));
            }
            let position = stored
                .iter()
                .position(|o| o.id() == id)
                .ok_or_else(|| StoreError::NotFound(id.clone()))?;
            stored[position] = object;
            ids.push(id);
        }
        *stored_objects = CollectionWithId::new(stored).map_err(backend_error)?;
        Ok(ids)
    }

    fn delete_multiple(&self, ids: &[String]) -> std::result::Result<Vec<String>, StoreError> {
        let mut objects = self.objects.write().map_err(backend_error)?;
        let deleted: Vec<String> = ids
            .iter()
            .filter(|id| objects.contains_id(id))
            .cloned()
            .collect();
        objects.retain(|object| !deleted.iter().any(|id| id == object.id()));
        Ok(deleted)
    }
}

impl ScheduleStore for InMemoryStore<Schedule> {
    fn read_for_lines(
        &self,
        line_ids: &[String],
    ) -> std::result::Result<Vec<Schedule>, StoreError> {
        let schedules = self.snapshot()?;
        Ok(line_ids
            .iter()
            .flat_map(|line_id| {
                schedules
                    .iter()
                    .filter(move |schedule| &schedule.line_id == line_id)
            })
            .cloned()
            .collect())
    }
}

fn backend_error<E: std::fmt::Display>(error: E) -> StoreError {
    StoreError::Backend(error.to_string())
}

/// One in-memory store per object type of a transit network
#[derive(Debug, Default)]
pub struct NetworkStores {
    /// Store of the agencies
    pub agencies: InMemoryStore<Agency>,
    /// Store of the lines
    pub lines: InMemoryStore<Line>,
    /// Store of the services
    pub services: InMemoryStore<Service>,
    /// Store of the schedules
    pub schedules: InMemoryStore<Schedule>,
    /// Store of the nodes
    pub nodes: InMemoryStore<Node>,
    /// Store of the paths
    pub paths: InMemoryStore<Path>,
}

impl NetworkStores {
    /// Read the stores from the JSON files of a directory
    /// (`agencies.json`, `lines.json`, `services.json`, `schedules.json`,
    /// `nodes.json` and `paths.json`), missing files giving empty stores.
    pub fn read<P: AsRef<path::Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        Ok(NetworkStores {
            agencies: InMemoryStore::from_json(path.join("agencies.json"))?,
            lines: InMemoryStore::from_json(path.join("lines.json"))?,
            services: InMemoryStore::from_json(path.join("services.json"))?,
            schedules: InMemoryStore::from_json(path.join("schedules.json"))?,
            nodes: InMemoryStore::from_json(path.join("nodes.json"))?,
            paths: InMemoryStore::from_json(path.join("paths.json"))?,
        })
    }

    /// Write every store as a JSON file in a directory, created if needed
    pub fn write<P: AsRef<path::Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        std::fs::create_dir_all(path).with_context(|| format!("Error creating {path:?}"))?;
        self.agencies.to_json(path.join("agencies.json"))?;
        self.lines.to_json(path.join("lines.json"))?;
        self.services.to_json(path.join("services.json"))?;
        self.schedules.to_json(path.join("schedules.json"))?;
        self.nodes.to_json(path.join("nodes.json"))?;
        self.paths.to_json(path.join("paths.json"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn service(id: &str, name: &str) -> Service {
        Service {
            id: id.to_string(),
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    fn ids<T: Id<T>>(collection: &CollectionWithId<T>) -> Vec<String> {
        collection.values().map(|o| o.id().to_string()).collect()
    }

    #[test]
    fn create_then_update() {
        let store = InMemoryStore::default();
        let created = store
            .create_multiple(vec![service("s1", "Week"), service("s2", "Weekend")])
            .unwrap();
        assert_eq!(vec!["s1", "s2"], created);
        assert!(store.exists("s1").unwrap());
        assert!(!store.exists("s3").unwrap());

        store
            .update_multiple(vec![service("s2", "Sunday")])
            .unwrap();
        let collection = store.collection().unwrap();
        assert_eq!(vec!["s1", "s2"], ids(&collection));
        assert_eq!(Some("Sunday".to_string()), collection.get("s2").unwrap().name);
    }

    #[test]
    fn create_batch_is_atomic() {
        let store = InMemoryStore::new(vec![service("s1", "Week")]).unwrap();
        let error = store
            .create_multiple(vec![service("s2", "Weekend"), service("s1", "Again")])
            .unwrap_err();
        assert_eq!("object 's1' already exists", error.to_string());
        assert!(!store.exists("s2").unwrap());
    }

    #[test]
    fn update_batch_is_atomic() {
        let store = InMemoryStore::new(vec![service("s1", "Week")]).unwrap();
        let error = store
            .update_multiple(vec![service("s1", "Changed"), service("s2", "Unknown")])
            .unwrap_err();
        assert!(matches!(error, StoreError::NotFound(id) if id == "s2"));
        let collection = store.collection().unwrap();
        assert_eq!(Some("Week".to_string()), collection.get("s1").unwrap().name);
    }

    #[test]
    fn concurrent_batches_are_all_kept() {
        let store = InMemoryStore::<Service>::default();
        std::thread::scope(|scope| {
            for thread in 0..4 {
                let store = &store;
                scope.spawn(move || {
                    for batch in 0..200 {
                        let id = format!("s{thread}-{batch}");
                        store.create_multiple(vec![service(&id, "Week")]).unwrap();
                        store.update_multiple(vec![service(&id, "Weekend")]).unwrap();
                    }
                });
            }
        });
        let collection = store.collection().unwrap();
        assert_eq!(800, collection.len());
        assert!(collection
            .values()
            .all(|service| service.name.as_deref() == Some("Weekend")));
    }

    #[test]
    fn delete_only_known_ids() {
        let store =
            InMemoryStore::new(vec![service("s1", "Week"), service("s2", "Weekend")]).unwrap();
        let deleted = store
            .delete_multiple(&["s2".to_string(), "s3".to_string()])
            .unwrap();
        assert_eq!(vec!["s2"], deleted);
        assert_eq!(vec!["s1"], ids(&store.collection().unwrap()));
    }

    #[test]
    fn schedules_for_lines_follow_line_order() {
        let schedule = |id: &str, line_id: &str| Schedule {
            id: id.to_string(),
            line_id: line_id.to_string(),
            ..Default::default()
        };
        let store = InMemoryStore::new(vec![
            schedule("sc1", "l1"),
            schedule("sc2", "l2"),
            schedule("sc3", "l1"),
        ])
        .unwrap();
        let schedules = store
            .read_for_lines(&["l2".to_string(), "l1".to_string()])
            .unwrap();
        let schedule_ids: Vec<&str> = schedules.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(vec!["sc2", "sc1", "sc3"], schedule_ids);
    }

    #[test]
    fn json_files_round_trip() {
        let tmp_dir = tempdir().expect("create temp dir");
        let stores = NetworkStores {
            services: InMemoryStore::new(vec![service("s1", "Week")]).unwrap(),
            ..Default::default()
        };
        stores.write(tmp_dir.path()).unwrap();
        assert!(tmp_dir.path().join("agencies.json").is_file());

        let read = NetworkStores::read(tmp_dir.path()).unwrap();
        assert_eq!(
            stores.services.collection().unwrap().into_vec(),
            read.services.collection().unwrap().into_vec()
        );
        tmp_dir.close().expect("delete temp dir");
    }
}
