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

//! The transit network objects.
//!
//! Every object is identified by a UUID in its string form. That identifier
//! is internal: the identifier written in a GTFS feed may differ (see
//! [`crate::id_mapper`]).

#![allow(missing_docs)]

use geo::{HaversineDistance, Point};
use serde::{Deserialize, Serialize};
use typed_index_collection::Id;

/// A calendar date
pub type Date = chrono::NaiveDate;

/// Default routing radius of a node, in meters
pub const DEFAULT_ROUTING_RADIUS_METERS: u32 = 50;
/// Default dwell time at a node, in seconds
pub const DEFAULT_DWELL_TIME_SECONDS: u32 = 20;
/// Mode given to a line created without one
pub const DEFAULT_LINE_MODE: &str = "bus";

macro_rules! impl_id {
    ($ty:ty) => {
        impl Id<$ty> for $ty {
            fn id(&self) -> &str {
                &self.id
            }
            fn set_id(&mut self, id: String) {
                self.id = id;
            }
        }
    };
}

/// A transit agency. Its lines are the lines having its identifier as
/// `agency_id`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Agency {
    pub id: String,
    /// Short name of the agency, base of its GTFS identifier
    pub acronym: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub internal_id: Option<String>,
    pub url: Option<String>,
    pub timezone: Option<String>,
    pub lang: Option<String>,
    pub phone: Option<String>,
    pub fare_url: Option<String>,
    pub email: Option<String>,
}
impl_id!(Agency);

/// Data kept from a GTFS route when the line was created from a feed
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct LineGtfsData {
    pub route_url: Option<String>,
    pub route_sort_order: Option<u32>,
    pub continuous_pickup: Option<u8>,
    pub continuous_drop_off: Option<u8>,
    pub route_text_color: Option<String>,
}

/// A line, exported as a GTFS route
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub id: String,
    pub internal_id: Option<String>,
    pub shortname: Option<String>,
    pub longname: Option<String>,
    pub description: Option<String>,
    pub agency_id: String,
    /// Transport mode, see [`crate::modes`]
    pub mode: String,
    pub category: Option<String>,
    #[serde(default)]
    pub is_autonomous: bool,
    #[serde(default)]
    pub allow_same_line_transfers: bool,
    pub color: Option<String>,
    pub text_color: Option<String>,
    #[serde(default)]
    pub path_ids: Vec<String>,
    /// Services used by the schedules of the line
    #[serde(default)]
    pub service_ids: Vec<String>,
    #[serde(default)]
    pub gtfs: Option<LineGtfsData>,
}
impl_id!(Line);

impl Default for Line {
    fn default() -> Self {
        Line {
            id: String::new(),
            internal_id: None,
            shortname: None,
            longname: None,
            description: None,
            agency_id: String::new(),
            mode: DEFAULT_LINE_MODE.to_string(),
            category: None,
            is_autonomous: false,
            allow_same_line_transfers: false,
            color: None,
            text_color: None,
            path_ids: vec![],
            service_ids: vec![],
            gtfs: None,
        }
    }
}

/// A service, the days on which trips run
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Service {
    pub id: String,
    /// Name of the service, base of its GTFS identifier
    pub name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub internal_id: Option<String>,
    #[serde(default)]
    pub monday: bool,
    #[serde(default)]
    pub tuesday: bool,
    #[serde(default)]
    pub wednesday: bool,
    #[serde(default)]
    pub thursday: bool,
    #[serde(default)]
    pub friday: bool,
    #[serde(default)]
    pub saturday: bool,
    #[serde(default)]
    pub sunday: bool,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    /// Dates on which the service runs whatever its weekdays
    #[serde(default)]
    pub only_dates: Vec<Date>,
    /// Dates on which the service does not run
    #[serde(default)]
    pub except_dates: Vec<Date>,
}
impl_id!(Service);

/// A trip on a path, with its times at each node of the path
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Trip {
    pub id: String,
    pub path_id: String,
    pub block_id: Option<String>,
    /// Arrival at each node, in seconds since midnight
    #[serde(default)]
    pub node_arrival_times_seconds: Vec<Option<u32>>,
    /// Departure from each node, in seconds since midnight
    #[serde(default)]
    pub node_departure_times_seconds: Vec<Option<u32>>,
    #[serde(default)]
    pub nodes_can_board: Vec<bool>,
    #[serde(default)]
    pub nodes_can_unboard: Vec<bool>,
}

/// A period of the day and the trips running during it
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct SchedulePeriod {
    pub period_shortname: Option<String>,
    #[serde(default)]
    pub trips: Vec<Trip>,
}

/// The trips of a line for a service
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Schedule {
    pub id: String,
    pub line_id: String,
    pub service_id: Option<String>,
    #[serde(default)]
    pub periods: Vec<SchedulePeriod>,
}
impl_id!(Schedule);

impl Schedule {
    /// Iterate over the trips of every period, in order
    pub fn trips(&self) -> impl Iterator<Item = &Trip> {
        self.periods.iter().flat_map(|period| period.trips.iter())
    }
}

/// A node, exported as a GTFS stop
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub code: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub internal_id: Option<String>,
    pub color: Option<String>,
    /// Point geometry of the node
    pub geography: geojson::Geometry,
    pub routing_radius_meters: u32,
    pub default_dwell_time_seconds: u32,
}
impl_id!(Node);

impl Node {
    /// Position of the node, `None` if its geography is not a point
    pub fn point(&self) -> Option<Point<f64>> {
        match &self.geography.value {
            geojson::Value::Point(position) if position.len() >= 2 => {
                Some(Point::new(position[0], position[1]))
            }
            _ => None,
        }
    }
}

/// A path of a line, its geometry and the nodes it serves
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Path {
    pub id: String,
    pub line_id: String,
    pub name: Option<String>,
    pub direction: Option<String>,
    pub mode: Option<String>,
    /// LineString geometry of the path
    pub geography: Option<geojson::Geometry>,
    /// Nodes served, in order
    #[serde(default)]
    pub nodes: Vec<String>,
    /// For each node, index of the first coordinate of the segment leaving it
    #[serde(default)]
    pub segments: Vec<usize>,
    pub routing_mode: Option<String>,
    pub routing_engine: Option<String>,
}
impl_id!(Path);

impl Path {
    /// Coordinates of the path, empty if its geography is not a line string
    pub fn points(&self) -> Vec<Point<f64>> {
        match self.geography.as_ref().map(|geometry| &geometry.value) {
            Some(geojson::Value::LineString(positions)) => positions
                .iter()
                .filter(|position| position.len() >= 2)
                .map(|position| Point::new(position[0], position[1]))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Distance traveled from the start of the path at each coordinate, in
    /// meters
    pub fn distances_traveled_meters(&self) -> Vec<f64> {
        let points = self.points();
        let mut traveled = 0.0;
        let mut distances = Vec::with_capacity(points.len());
        for (idx, point) in points.iter().enumerate() {
            if idx > 0 {
                traveled += points[idx - 1].haversine_distance(point);
            }
            distances.push(traveled);
        }
        distances
    }
}
