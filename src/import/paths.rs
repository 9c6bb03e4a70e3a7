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
use crate::objects::Path;
use serde::{Deserialize, Serialize};

/// Fields of a path feature, `geography` being the feature geometry
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct PathAttributes {
    pub line_id: Option<String>,
    pub name: Option<String>,
    pub direction: Option<String>,
    pub mode: Option<String>,
    pub geography: Option<geojson::Geometry>,
    pub nodes: Option<Vec<String>>,
    pub segments: Option<Vec<usize>>,
    pub routing_mode: Option<String>,
    pub routing_engine: Option<String>,
}

/// Paths are GeoJSON features with a line string geometry
pub struct PathSchema;

impl ImportSchema for PathSchema {
    type Attributes = PathAttributes;
    type Object = Path;
    const SHAPE: RecordShape = RecordShape::GeoFeature;

    fn new_object(id: String, attributes: PathAttributes) -> Path {
        Path {
            id,
            line_id: attributes.line_id.unwrap_or_default(),
            name: attributes.name,
            direction: attributes.direction,
            mode: attributes.mode,
            geography: attributes.geography,
            nodes: attributes.nodes.unwrap_or_default(),
            segments: attributes.segments.unwrap_or_default(),
            routing_mode: attributes.routing_mode,
            routing_engine: attributes.routing_engine,
        }
    }

    fn errors(path: &Path) -> Vec<String> {
        let mut errors = vec![];
        if path.line_id.is_empty() {
            errors.push("Line is required".to_string());
        }
        let is_line_string = matches!(
            path.geography.as_ref().map(|geometry| &geometry.value),
            Some(geojson::Value::LineString(_))
        );
        if !is_line_string {
            errors.push("Geography must be a line string".to_string());
        }
        errors
    }
}

/// Importer of paths
pub type PathsImporter<'a> = CollectionImporter<'a, PathSchema>;
