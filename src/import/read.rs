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

//! Streaming reader of the records of a JSON source.
//!
//! The source is either a JSON array of records, a GeoJSON
//! `FeatureCollection`, a single record, or a sequence of these
//! (newline-delimited JSON). Records of an array or of the `features` of a
//! collection are parsed and handed over one at a time.

use super::ImportError;
use serde::de::{self, DeserializeSeed, Deserializer, MapAccess, SeqAccess, Visitor};
use serde_json::{Map, Value};
use std::fmt;
use std::io::Read;

struct RecordSink<'f> {
    position: usize,
    on_record: &'f mut dyn FnMut(usize, Value) -> Result<(), ImportError>,
    // Error of `on_record`, the parsing being aborted with a placeholder
    error: Option<ImportError>,
}

impl RecordSink<'_> {
    fn push<E: de::Error>(&mut self, record: Value) -> Result<(), E> {
        let position = self.position;
        self.position += 1;
        (self.on_record)(position, record).map_err(|error| {
            self.error = Some(error);
            E::custom("record rejected")
        })
    }
}

/// The records of a JSON array
struct Records<'s, 'f>(&'s mut RecordSink<'f>);

impl<'de> DeserializeSeed<'de> for Records<'_, '_> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_seq(self)
    }
}

impl<'de> Visitor<'de> for Records<'_, '_> {
    type Value = ();

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("an array of records")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<(), A::Error> {
        while let Some(record) = seq.next_element::<Value>()? {
            self.0.push(record)?;
        }
        Ok(())
    }
}

/// One top level JSON value: an array, a feature collection or a record
struct TopLevel<'s, 'f>(&'s mut RecordSink<'f>);

impl<'de> DeserializeSeed<'de> for TopLevel<'_, '_> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for TopLevel<'_, '_> {
    type Value = ();

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a record, an array of records or a feature collection")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, seq: A) -> Result<(), A::Error> {
        Records(self.0).visit_seq(seq)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<(), A::Error> {
        let mut fields = Map::new();
        let mut is_collection = false;
        let mut features_read = false;
        while let Some(key) = map.next_key::<String>()? {
            // Features are streamed when the type comes first, as usual
            if key == "features" && is_collection {
                map.next_value_seed(Records(&mut *self.0))?;
                features_read = true;
                continue;
            }
            let value: Value = map.next_value()?;
            if key == "type" && value.as_str() == Some("FeatureCollection") {
                is_collection = true;
            }
            fields.insert(key, value);
        }
        if !is_collection {
            return self.0.push(Value::Object(fields));
        }
        if !features_read {
            match fields.remove("features") {
                Some(Value::Array(features)) => {
                    for feature in features {
                        self.0.push(feature)?;
                    }
                }
                Some(Value::Null) | None => {}
                Some(_) => return Err(de::Error::custom("features must be an array")),
            }
        }
        Ok(())
    }
}

/// Call `on_record` with the position, starting at 0, and the content of
/// each record of `reader`, stopping at the first error.
///
/// Returns the number of records read. A malformed source gives an
/// [`ImportError::Read`] with the position of the record being read.
pub fn read_records<R, F>(reader: R, mut on_record: F) -> Result<usize, ImportError>
where
    R: Read,
    F: FnMut(usize, Value) -> Result<(), ImportError>,
{
    let mut sink = RecordSink {
        position: 0,
        on_record: &mut on_record,
        error: None,
    };
    let mut deserializer = serde_json::Deserializer::from_reader(reader);
    // `end` fails as long as something else than white space remains
    while deserializer.end().is_err() {
        let result = TopLevel(&mut sink).deserialize(&mut deserializer);
        if let Some(error) = sink.error.take() {
            return Err(error);
        }
        result.map_err(|source| ImportError::Read {
            position: sink.position,
            source,
        })?;
    }
    Ok(sink.position)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;
    use pretty_assertions::assert_eq;

    fn records(source: &str) -> Result<Vec<(usize, Value)>, ImportError> {
        let mut records = Vec::new();
        read_records(source.as_bytes(), |position, record| {
            records.push((position, record));
            Ok(())
        })?;
        Ok(records)
    }

    fn names(records: &[(usize, Value)]) -> Vec<(usize, &str)> {
        records
            .iter()
            .map(|(position, record)| {
                let name = record
                    .get("name")
                    .or_else(|| record.get("properties").and_then(|p| p.get("name")))
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                (*position, name)
            })
            .collect()
    }

    #[test]
    fn read_array() {
        let records = records(r#"[{"name": "a"}, {"name": "b"}]"#).unwrap();
        assert_eq!(vec![(0, "a"), (1, "b")], names(&records));
    }

    #[test]
    fn read_newline_delimited() {
        let records = records("{\"name\": \"a\"}\n{\"name\": \"b\"}\n\n").unwrap();
        assert_eq!(vec![(0, "a"), (1, "b")], names(&records));
    }

    #[test]
    fn read_feature_collection() {
        let feature = r#"{"type": "Feature", "geometry": null, "properties": {"name": "a"}}"#;
        let records = records(&format!(
            r#"{{"type": "FeatureCollection", "features": [{feature}, {feature}]}}"#
        ))
        .unwrap();
        assert_eq!(vec![(0, "a"), (1, "a")], names(&records));

        // features before the type
        let records = self::records(&format!(
            r#"{{"features": [{feature}], "bbox": [0, 0, 1, 1], "type": "FeatureCollection"}}"#
        ))
        .unwrap();
        assert_eq!(vec![(0, "a")], names(&records));
    }

    #[test]
    fn records_are_handed_over_while_reading() {
        let mut seen = Vec::new();
        let error = read_records(
            r#"[{"name": "a"}, {"name": "b"}, {"name": "c" "#.as_bytes(),
            |position, _| {
                seen.push(position);
                Ok(())
            },
        )
        .unwrap_err();
        assert_eq!(vec![0, 1], seen);
        assert!(matches!(error, ImportError::Read { position: 2, .. }));
    }

    #[test]
    fn stop_at_rejected_record() {
        let mut seen = Vec::new();
        let source = r#"[{"name": "a"}, {"name": "b"}, {"name": "c"}]"#;
        let error = read_records(source.as_bytes(), |position, _| {
            seen.push(position);
            if position == 1 {
                Err(ImportError::Store(StoreError::Backend("rejected".to_string())))
            } else {
                Ok(())
            }
        })
        .unwrap_err();
        assert_eq!(vec![0, 1], seen);
        assert_eq!("store failure: rejected", error.to_string());
    }
}
