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

use super::{CollectionImporter, ImportSchema, RecordShape};
use crate::modes::is_known_mode;
use crate::objects::{Line, LineGtfsData, DEFAULT_LINE_MODE};
use serde::{Deserialize, Serialize};

/// Fields of a line record
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct LineAttributes {
    pub internal_id: Option<String>,
    pub shortname: Option<String>,
    pub longname: Option<String>,
    pub description: Option<String>,
    pub agency_id: Option<String>,
    pub mode: Option<String>,
    pub category: Option<String>,
    pub is_autonomous: Option<bool>,
    pub allow_same_line_transfers: Option<bool>,
    pub color: Option<String>,
    pub text_color: Option<String>,
    pub path_ids: Option<Vec<String>>,
    pub service_ids: Option<Vec<String>>,
    pub gtfs: Option<LineGtfsData>,
}

/// Lines are plain records
pub struct LineSchema;

impl ImportSchema for LineSchema {
    type Attributes = LineAttributes;
    type Object = Line;
    const SHAPE: RecordShape = RecordShape::Plain;

    fn new_object(id: String, attributes: LineAttributes) -> Line {
        Line {
            id,
            internal_id: attributes.internal_id,
            shortname: attributes.shortname,
            longname: attributes.longname,
            description: attributes.description,
            agency_id: attributes.agency_id.unwrap_or_default(),
            mode: attributes
                .mode
                .unwrap_or_else(|| DEFAULT_LINE_MODE.to_string()),
            category: attributes.category,
            is_autonomous: attributes.is_autonomous.unwrap_or(false),
            allow_same_line_transfers: attributes.allow_same_line_transfers.unwrap_or(false),
            color: attributes.color,
            text_color: attributes.text_color,
            path_ids: attributes.path_ids.unwrap_or_default(),
            service_ids: attributes.service_ids.unwrap_or_default(),
            gtfs: attributes.gtfs,
        }
    }

    fn errors(line: &Line) -> Vec<String> {
        let mut errors = vec![];
        if line.agency_id.is_empty() {
            errors.push("Agency is required".to_string());
        }
        if !is_known_mode(&line.mode) {
            errors.push(format!("Mode '{}' is invalid", line.mode));
        }
        errors
    }
}

/// Importer of lines
pub type LinesImporter<'a> = CollectionImporter<'a, LineSchema>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryStore, Store};
    use pretty_assertions::assert_eq;

    const LINE_ID: &str = "1f0d7c3e-2a4b-4c6d-8e9f-0a1b2c3d4e5f";
    const AGENCY_ID: &str = "7a8b9c0d-1e2f-4a3b-8c4d-5e6f7a8b9c0d";

    #[test]
    fn import_lines() {
        let store = InMemoryStore::<Line>::default();
        let source = format!(
            r##"[
                {{"id": "{LINE_ID}", "internal_id": null, "mode": "metro", "category": "C+", "agency_id": "{AGENCY_ID}",
                  "shortname": "B", "longname": "Bar Line", "color": "#009EE0", "is_enabled": true,
                  "is_autonomous": true, "created_at": "2021-09-15T18:44:47.964Z",
                  "gtfs": {{"route_url": "https://bar.example", "route_sort_order": 2}}}},
                {{"agency_id": "{AGENCY_ID}", "shortname": "F"}}
            ]"##
        );
        let summary = LinesImporter::new(&store).import(source.as_bytes()).unwrap();
        assert_eq!(2, summary.created);

        let lines = store.collection().unwrap();
        let metro = lines.get(LINE_ID).unwrap();
        assert_eq!("metro", metro.mode);
        assert!(metro.is_autonomous);
        assert!(!metro.allow_same_line_transfers);
        assert_eq!(Some(2), metro.gtfs.as_ref().and_then(|gtfs| gtfs.route_sort_order));
        let bus = lines.values().find(|line| line.id != LINE_ID).unwrap();
        assert_eq!("bus", bus.mode);
        assert_eq!(Some("F".to_string()), bus.shortname);
    }

    #[test]
    fn invalid_lines() {
        let store = InMemoryStore::<Line>::default();
        let error = LinesImporter::new(&store)
            .import(r#"{"shortname": "F", "mode": "hovercraft"}"#.as_bytes())
            .unwrap_err();
        assert_eq!(
            "Error validating data for object at position 0: Agency is required, Mode 'hovercraft' is invalid",
            error.to_string()
        );
    }
}
