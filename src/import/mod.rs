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

//! Import of externally supplied records into a [`Store`].
//!
//! A [`CollectionImporter`] reads records (see [`read_records`]), validates
//! each of them against the [`ImportSchema`] of the object type, then stores
//! the new objects with one batch creation and the known ones with one batch
//! update. Nothing is written unless every record is valid.

mod agencies;
mod lines;
mod nodes;
mod paths;
mod read;
mod services;

pub use self::agencies::{AgenciesImporter, AgencyAttributes, AgencySchema};
pub use self::lines::{LineAttributes, LineSchema, LinesImporter};
pub use self::nodes::{NodeAttributes, NodeSchema, NodesImporter};
pub use self::paths::{PathAttributes, PathSchema, PathsImporter};
pub use self::read::read_records;
pub use self::services::{ServiceAttributes, ServiceSchema, ServicesImporter};

use crate::store::{Store, StoreError};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::io::Read;
use std::marker::PhantomData;
use tracing::{info, warn};
use typed_index_collection::Id;
use uuid::Uuid;

/// Why a record was rejected
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    /// No field of the record belongs to the object type
    #[error("No valid fields")]
    NoValidFields,
    /// The identifier is not a UUID
    #[error("Invalid ID format")]
    InvalidId,
    /// The record of a geographic object is not a GeoJSON feature
    #[error("Object is not a feature")]
    NotAFeature,
    /// A field has a value of the wrong type
    #[error("{0}")]
    Schema(String),
    /// The object built from the record is not valid
    #[error("{}", .0.join(", "))]
    Object(Vec<String>),
}

/// Errors of an import
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// A record was rejected, nothing was imported
    #[error("Error validating data for object at position {position}: {error}")]
    Validation {
        /// Position of the record in the source, starting at 0
        position: usize,
        /// Why the record was rejected
        error: ValidationError,
    },
    /// The source is not valid JSON
    #[error("Error reading the object at position {position}")]
    Read {
        /// Position of the record being read, starting at 0
        position: usize,
        /// Cause of the failure
        #[source]
        source: serde_json::Error,
    },
    /// The store refused the objects
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// How the records of an object type are given
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordShape {
    /// A JSON object with the fields of the object
    Plain,
    /// A GeoJSON feature, its properties being the fields of the object and
    /// its geometry the `geography` field
    GeoFeature,
}

/// What the importer needs to know of an object type
pub trait ImportSchema {
    /// Fields of the object that a record may give, all optional
    type Attributes: DeserializeOwned + Serialize;
    /// The object stored
    type Object: Id<Self::Object> + Clone;

    /// Shape of the records
    const SHAPE: RecordShape;

    /// Build the object `id` from the fields of a record, with defaults for
    /// the missing ones
    fn new_object(id: String, attributes: Self::Attributes) -> Self::Object;

    /// Problems making the object invalid, empty for a valid object
    fn errors(object: &Self::Object) -> Vec<String>;
}

/// Number of objects written by an import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Objects created
    pub created: usize,
    /// Existing objects replaced
    pub updated: usize,
}

fn schema_error(error: serde_json::Error) -> ValidationError {
    ValidationError::Schema(error.to_string())
}

// Fields of a GeoJSON feature as a plain record
fn flatten_feature(record: Value) -> Result<Value, ValidationError> {
    let mut feature = match record {
        Value::Object(feature) => feature,
        _ => return Err(ValidationError::NotAFeature),
    };
    if feature.get("type").and_then(Value::as_str) != Some("Feature") {
        return Err(ValidationError::NotAFeature);
    }
    let geometry = match feature.remove("geometry") {
        Some(geometry @ Value::Object(_)) => geometry,
        _ => return Err(ValidationError::NotAFeature),
    };
    let mut fields = match feature.remove("properties") {
        Some(Value::Object(properties)) => properties,
        _ => Map::new(),
    };
    fields.insert("geography".to_string(), geometry);
    Ok(Value::Object(fields))
}

/// Importer of the records of one object type into its store
pub struct CollectionImporter<'a, S: ImportSchema> {
    store: &'a dyn Store<S::Object>,
    schema: PhantomData<S>,
}

impl<'a, S: ImportSchema> CollectionImporter<'a, S> {
    /// Importer writing in `store`
    pub fn new(store: &'a dyn Store<S::Object>) -> Self {
        CollectionImporter {
            store,
            schema: PhantomData,
        }
    }

    /// Build the object of one record, returns it with whether the record
    /// gave its identifier
    fn object(&self, record: Value) -> Result<(S::Object, bool), ValidationError> {
        let record = match S::SHAPE {
            RecordShape::Plain => record,
            RecordShape::GeoFeature => flatten_feature(record)?,
        };
        let mut record = match record {
            Value::Object(record) => record,
            other => {
                return Err(ValidationError::Schema(format!(
                    "expected an object, found {other}"
                )))
            }
        };
        let id = match record.remove("id") {
            None | Some(Value::Null) => None,
            Some(Value::String(id)) => Some(id),
            Some(_) => return Err(ValidationError::InvalidId),
        };
        let attributes: S::Attributes =
            serde_json::from_value(Value::Object(record)).map_err(schema_error)?;
        let has_fields = match serde_json::to_value(&attributes).map_err(schema_error)? {
            Value::Object(fields) => fields.values().any(|value| !value.is_null()),
            _ => false,
        };
        if id.is_none() && !has_fields {
            return Err(ValidationError::NoValidFields);
        }

        let has_id = id.is_some();
        let id = match id {
            Some(id) => {
                Uuid::parse_str(&id).map_err(|_| ValidationError::InvalidId)?;
                id
            }
            None => Uuid::new_v4().to_string(),
        };
        let object = S::new_object(id, attributes);
        let errors = S::errors(&object);
        if !errors.is_empty() {
            return Err(ValidationError::Object(errors));
        }
        Ok((object, has_id))
    }

    /// Import the records of `reader`.
    ///
    /// A record with an identifier already stored updates that object, any
    /// other record creates one. Every record is validated before anything is
    /// written.
    pub fn import<R: Read>(&self, reader: R) -> Result<ImportSummary, ImportError> {
        let mut objects = Vec::new();
        read_records(reader, |position, record| {
            let object = self
                .object(record)
                .map_err(|error| ImportError::Validation { position, error })?;
            objects.push(object);
            Ok(())
        })?;

        let mut new_objects = Vec::new();
        let mut existing_objects = Vec::new();
        for (object, has_id) in objects {
            if has_id && self.store.exists(object.id())? {
                existing_objects.push(object);
            } else {
                new_objects.push(object);
            }
        }
        info!(
            "Importing {} new and {} existing objects",
            new_objects.len(),
            existing_objects.len()
        );

        let created = if new_objects.is_empty() {
            Vec::new()
        } else {
            self.store.create_multiple(new_objects)?
        };
        let updated = if existing_objects.is_empty() {
            Vec::new()
        } else {
            match self.store.update_multiple(existing_objects) {
                Ok(updated) => updated,
                Err(error) => {
                    self.remove_created(&created);
                    return Err(error.into());
                }
            }
        };
        Ok(ImportSummary {
            created: created.len(),
            updated: updated.len(),
        })
    }

    // Undo the creation of a failed import, the update error is the one
    // reported
    fn remove_created(&self, created: &[String]) {
        if created.is_empty() {
            return;
        }
        if let Err(e) = self.store.delete_multiple(created) {
            warn!("objects created by the failed import are kept: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;
    use std::cell::RefCell;
    use typed_index_collection::CollectionWithId;

    #[derive(Debug, Clone, PartialEq)]
    struct Stub {
        id: String,
        field1: u32,
        field2: Option<u32>,
        field3: String,
        field4: Vec<String>,
    }

    impl Id<Stub> for Stub {
        fn id(&self) -> &str {
            &self.id
        }
        fn set_id(&mut self, id: String) {
            self.id = id;
        }
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(default)]
    struct StubAttributes {
        field1: Option<u32>,
        field2: Option<u32>,
        field3: Option<String>,
        field4: Option<Vec<String>>,
    }

    struct StubSchema;

    impl ImportSchema for StubSchema {
        type Attributes = StubAttributes;
        type Object = Stub;
        const SHAPE: RecordShape = RecordShape::Plain;

        fn new_object(id: String, attributes: StubAttributes) -> Stub {
            Stub {
                id,
                field1: attributes.field1.unwrap_or(9),
                field2: attributes.field2,
                field3: attributes.field3.unwrap_or_default(),
                field4: attributes.field4.unwrap_or_default(),
            }
        }

        fn errors(stub: &Stub) -> Vec<String> {
            if stub.field1 > 10 {
                vec!["Value for field 1 is too high".to_string()]
            } else {
                vec![]
            }
        }
    }

    struct GeoSchema;

    impl ImportSchema for GeoSchema {
        type Attributes = GeoAttributes;
        type Object = Stub;
        const SHAPE: RecordShape = RecordShape::GeoFeature;

        fn new_object(id: String, attributes: GeoAttributes) -> Stub {
            Stub {
                id,
                field1: 0,
                field2: None,
                field3: match attributes.geography.map(|geometry| geometry.value) {
                    Some(geojson::Value::Point(_)) => "Point".to_string(),
                    Some(geojson::Value::LineString(_)) => "LineString".to_string(),
                    _ => String::new(),
                },
                field4: attributes.name.into_iter().collect(),
            }
        }

        fn errors(_: &Stub) -> Vec<String> {
            vec![]
        }
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(default)]
    struct GeoAttributes {
        name: Option<String>,
        geography: Option<geojson::Geometry>,
    }

    const EXISTING_ID: &str = "9d3c1d2e-5f4b-4a7e-8c1d-2b3a4c5d6e7f";
    const OTHER_ID: &str = "0b6f2c9a-1e3d-4f5a-9b8c-7d6e5f4a3b2c";

    /// Store recording each batch it receives
    #[derive(Default)]
    struct MockStore {
        created: RefCell<Vec<Vec<Stub>>>,
        updated: RefCell<Vec<Vec<Stub>>>,
        deleted: RefCell<Vec<Vec<String>>>,
        fail_update: bool,
    }

    impl Store<Stub> for MockStore {
        fn collection(&self) -> Result<CollectionWithId<Stub>, StoreError> {
            Ok(CollectionWithId::default())
        }
        fn exists(&self, id: &str) -> Result<bool, StoreError> {
            Ok(id == EXISTING_ID)
        }
        fn create_multiple(&self, objects: Vec<Stub>) -> Result<Vec<String>, StoreError> {
            let ids = objects.iter().map(|o| o.id.clone()).collect();
            self.created.borrow_mut().push(objects);
            Ok(ids)
        }
        fn update_multiple(&self, objects: Vec<Stub>) -> Result<Vec<String>, StoreError> {
            if self.fail_update {
                return Err(StoreError::Backend("connection lost".to_string()));
            }
            let ids = objects.iter().map(|o| o.id.clone()).collect();
            self.updated.borrow_mut().push(objects);
            Ok(ids)
        }
        fn delete_multiple(&self, ids: &[String]) -> Result<Vec<String>, StoreError> {
            self.deleted.borrow_mut().push(ids.to_vec());
            Ok(ids.to_vec())
        }
    }

    fn import(store: &MockStore, source: &str) -> Result<ImportSummary, ImportError> {
        CollectionImporter::<StubSchema>::new(store).import(source.as_bytes())
    }

    #[test]
    fn all_new() {
        let store = MockStore::default();
        let summary = import(
            &store,
            &format!(
                r#"[
                    {{"field1": 2, "field2": 3, "field3": "test", "field4": ["a", "b"], "data": {{"test": "data"}}}},
                    {{"id": "{OTHER_ID}", "field1": 3, "field3": "test2", "field4": ["a", "b"]}}
                ]"#
            ),
        )
        .unwrap();
        assert_eq!(ImportSummary { created: 2, updated: 0 }, summary);
        let created = store.created.borrow();
        assert_eq!(1, created.len());
        let first = &created[0][0];
        assert!(Uuid::parse_str(&first.id).is_ok());
        assert_eq!(
            Stub {
                id: first.id.clone(),
                field1: 2,
                field2: Some(3),
                field3: "test".to_string(),
                field4: vec!["a".to_string(), "b".to_string()],
            },
            *first
        );
        assert_eq!(OTHER_ID, created[0][1].id);
        assert!(store.updated.borrow().is_empty());
    }

    #[test]
    fn missing_fields_get_defaults() {
        let store = MockStore::default();
        let summary = import(&store, r#"[{"field4": ["a"]}, {"field2": 5}]"#).unwrap();
        assert_eq!(ImportSummary { created: 2, updated: 0 }, summary);
        assert_eq!(9, store.created.borrow()[0][0].field1);
    }

    #[test]
    fn one_existing_one_new() {
        let store = MockStore::default();
        let summary = import(
            &store,
            &format!(
                r#"[
                    {{"id": "{EXISTING_ID}", "field1": 2, "field3": "test"}},
                    {{"id": "{OTHER_ID}", "field1": 3, "field3": "test2"}}
                ]"#
            ),
        )
        .unwrap();
        assert_eq!(ImportSummary { created: 1, updated: 1 }, summary);
        assert_eq!(OTHER_ID, store.created.borrow()[0][0].id);
        let updated = store.updated.borrow();
        assert_eq!(1, updated.len());
        assert_eq!(EXISTING_ID, updated[0][0].id);
    }

    #[test]
    fn only_existing_objects() {
        let store = MockStore::default();
        let summary = import(&store, &format!(r#"{{"id": "{EXISTING_ID}", "field1": 1}}"#))
            .unwrap();
        assert_eq!(ImportSummary { created: 0, updated: 1 }, summary);
        assert!(store.created.borrow().is_empty());
    }

    #[test]
    fn empty_source() {
        let store = MockStore::default();
        assert_eq!(ImportSummary::default(), import(&store, "[]").unwrap());
        assert!(store.created.borrow().is_empty());
        assert!(store.updated.borrow().is_empty());
    }

    #[test]
    fn invalid_data_type() {
        let store = MockStore::default();
        let error = import(
            &store,
            r#"[
                {"field1": 2, "field3": "test"},
                {"field1": 3, "field3": "test2"},
                {"field1": "3", "field3": ["should not be an array"]}
            ]"#,
        )
        .unwrap_err();
        assert!(error
            .to_string()
            .starts_with("Error validating data for object at position 2: invalid type"));
        assert!(store.created.borrow().is_empty());
    }

    #[test]
    fn invalid_uuid() {
        let store = MockStore::default();
        let error = import(&store, r#"[{"id": "not a uuid", "field1": 2}]"#).unwrap_err();
        assert_eq!(
            "Error validating data for object at position 0: Invalid ID format",
            error.to_string()
        );
    }

    #[test]
    fn invalid_object() {
        let store = MockStore::default();
        let error = import(&store, r#"[{"field1": 15, "field3": "test"}]"#).unwrap_err();
        assert_eq!(
            "Error validating data for object at position 0: Value for field 1 is too high",
            error.to_string()
        );
    }

    #[test]
    fn no_valid_fields() {
        let store = MockStore::default();
        let error = import(
            &store,
            r#"[{"field1": 2, "field4": ["a", "b"]}, {"invalidField": "useless data"}]"#,
        )
        .unwrap_err();
        assert_eq!(
            "Error validating data for object at position 1: No valid fields",
            error.to_string()
        );
        assert!(store.created.borrow().is_empty());
    }

    #[test]
    fn newline_delimited_records() {
        let store = MockStore::default();
        let summary = import(&store, "{\"field1\": 1}\n{\"field1\": 2}\n").unwrap();
        assert_eq!(ImportSummary { created: 2, updated: 0 }, summary);
    }

    #[test]
    fn malformed_source() {
        let store = MockStore::default();
        let error = import(&store, r#"[{"field1": 1}"#).unwrap_err();
        assert!(matches!(error, ImportError::Read { position: 1, .. }));
        assert!(store.created.borrow().is_empty());

        let error = import(
            &store,
            r#"[{"field1": 1}, {"field1": 2}, {"field1": 3}, {"field1": 4,, {"field1": 5}]"#,
        )
        .unwrap_err();
        assert!(error
            .to_string()
            .starts_with("Error reading the object at position 3"));
        assert!(store.created.borrow().is_empty());
    }

    #[test]
    fn failed_update_removes_created_objects() {
        let store = MockStore {
            fail_update: true,
            ..Default::default()
        };
        let error = import(
            &store,
            &format!(
                r#"[{{"id": "{EXISTING_ID}", "field1": 2}}, {{"id": "{OTHER_ID}", "field1": 3}}]"#
            ),
        )
        .unwrap_err();
        assert_eq!("store failure: connection lost", error.to_string());
        assert_eq!(vec![vec![OTHER_ID.to_string()]], *store.deleted.borrow());
    }

    #[test]
    fn features() {
        let store = MockStore::default();
        let summary = CollectionImporter::<GeoSchema>::new(&store)
            .import(
                format!(
                    r#"{{
                        "type": "FeatureCollection",
                        "features": [
                            {{
                                "type": "Feature",
                                "id": 1,
                                "geometry": {{"type": "Point", "coordinates": [-1, 0]}},
                                "properties": {{"id": "{OTHER_ID}", "name": "Foo", "extraField": "hello"}}
                            }},
                            {{
                                "type": "Feature",
                                "geometry": {{"type": "LineString", "coordinates": [[0, 0], [-1, 1]]}},
                                "properties": null
                            }}
                        ]
                    }}"#
                )
                .as_bytes(),
            )
            .unwrap();
        assert_eq!(ImportSummary { created: 2, updated: 0 }, summary);
        let created = store.created.borrow();
        assert_eq!(OTHER_ID, created[0][0].id);
        assert_eq!("Point", created[0][0].field3);
        assert_eq!(vec!["Foo".to_string()], created[0][0].field4);
        assert_eq!("LineString", created[0][1].field3);
    }

    #[test]
    fn not_a_feature() {
        let store = MockStore::default();
        let error = CollectionImporter::<GeoSchema>::new(&store)
            .import(format!(r#"[{{"d": "{OTHER_ID}", "name": "An agency"}}]"#).as_bytes())
            .unwrap_err();
        assert_eq!(
            "Error validating data for object at position 0: Object is not a feature",
            error.to_string()
        );
    }
}
