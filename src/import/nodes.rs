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
use crate::objects::{Node, DEFAULT_DWELL_TIME_SECONDS, DEFAULT_ROUTING_RADIUS_METERS};
use serde::{Deserialize, Serialize};

/// Fields of a node feature, `geography` being the feature geometry
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct NodeAttributes {
    pub code: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub internal_id: Option<String>,
    pub color: Option<String>,
    pub geography: Option<geojson::Geometry>,
    pub routing_radius_meters: Option<u32>,
    pub default_dwell_time_seconds: Option<u32>,
}

/// Nodes are GeoJSON features with a point geometry
pub struct NodeSchema;

impl ImportSchema for NodeSchema {
    type Attributes = NodeAttributes;
    type Object = Node;
    const SHAPE: RecordShape = RecordShape::GeoFeature;

    fn new_object(id: String, attributes: NodeAttributes) -> Node {
        Node {
            id,
            code: attributes.code,
            name: attributes.name,
            description: attributes.description,
            internal_id: attributes.internal_id,
            color: attributes.color,
            // Always set by a feature
            geography: attributes
                .geography
                .unwrap_or_else(|| geojson::Geometry::new(geojson::Value::Point(vec![]))),
            routing_radius_meters: attributes
                .routing_radius_meters
                .unwrap_or(DEFAULT_ROUTING_RADIUS_METERS),
            default_dwell_time_seconds: attributes
                .default_dwell_time_seconds
                .unwrap_or(DEFAULT_DWELL_TIME_SECONDS),
        }
    }

    fn errors(node: &Node) -> Vec<String> {
        let mut errors = vec![];
        if node.point().is_none() {
            errors.push("Geography must be a point".to_string());
        }
        errors
    }
}

/// Importer of nodes
pub type NodesImporter<'a> = CollectionImporter<'a, NodeSchema>;
