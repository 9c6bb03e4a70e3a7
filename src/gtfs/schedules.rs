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

//! Export of the schedules as `trips.txt` and `stop_times.txt`.

use super::{
    kilometers, ExportError, ExportOptions, GtfsFile, ScheduleExport, StopTime, Trip,
    STOP_TIMES_FILE, TRIPS_FILE,
};
use crate::objects::{self, Path, Schedule};
use crate::store::{ScheduleStore, Store};
use anyhow::anyhow;
use skip_error::skip_error_and_warn;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;
use typed_index_collection::CollectionWithId;

// Schedules of many lines can hold a lot of trips, they are read and written
// by batches to bound memory use.
const LINES_PER_BATCH: usize = 50;
const SCHEDULES_PER_BATCH: usize = 100;

/// A path used by the exported trips, with the distance traveled at each of
/// its coordinates
struct UsedPath<'a> {
    path: &'a Path,
    distances: Vec<f64>,
}

/// Paths and nodes used by the exported trips, in order of first use
#[derive(Default)]
struct UsedObjects<'a> {
    paths: HashMap<&'a str, UsedPath<'a>>,
    path_ids: Vec<String>,
    node_ids: Vec<String>,
    known_node_ids: HashSet<&'a str>,
}

impl<'a> UsedObjects<'a> {
    fn path(
        &mut self,
        paths: &'a CollectionWithId<Path>,
        path_id: &str,
    ) -> Option<&UsedPath<'a>> {
        if !self.paths.contains_key(path_id) {
            let path = paths.get(path_id)?;
            self.path_ids.push(path.id.clone());
            for node_id in &path.nodes {
                if self.known_node_ids.insert(node_id.as_str()) {
                    self.node_ids.push(node_id.clone());
                }
            }
            let used_path = UsedPath {
                path,
                distances: path.distances_traveled_meters(),
            };
            self.paths.insert(path.id.as_str(), used_path);
        }
        self.paths.get(path_id)
    }

    fn into_export(self) -> ScheduleExport {
        ScheduleExport {
            node_ids: self.node_ids,
            path_ids: self.path_ids,
        }
    }
}

fn gtfs_trip(trip: &objects::Trip, path: &Path, line_id: &str, service_id: &str) -> Trip {
    Trip {
        route_id: line_id.to_string(),
        service_id: service_id.to_string(),
        id: trip.id.clone(),
        headsign: path
            .name
            .clone()
            .filter(|name| !name.is_empty())
            .or_else(|| path.direction.clone()),
        short_name: None,
        direction: u8::from(path.direction.as_deref() == Some("inbound")),
        block_id: trip.block_id.clone(),
        shape_id: trip.path_id.clone(),
        wheelchair_accessible: None,
        bikes_allowed: None,
    }
}

fn gtfs_stop_times(
    trip: &objects::Trip,
    used_path: &UsedPath,
) -> Result<Vec<StopTime>, ExportError> {
    let path = used_path.path;
    let distances = &used_path.distances;
    let count = trip.node_arrival_times_seconds.len();
    let mut stop_times = Vec::with_capacity(count);
    for (k, stop_id) in path.nodes.iter().enumerate().take(count) {
        // The last node is at the end of the path, the others at the start of
        // their segment
        let coordinate = if k + 1 < count {
            path.segments.get(k).copied()
        } else {
            distances.len().checked_sub(1)
        };
        let distance = coordinate
            .and_then(|idx| distances.get(idx))
            .copied()
            .unwrap_or(0.0);
        let arrival = trip.node_arrival_times_seconds[k];
        let departure = trip
            .node_departure_times_seconds
            .get(k)
            .copied()
            .flatten();
        let (arrival_time, departure_time) = match (arrival.or(departure), departure.or(arrival)) {
            (Some(arrival_time), Some(departure_time)) => (arrival_time, departure_time),
            _ => {
                return Err(ExportError::MissingStopTime {
                    trip_id: trip.id.clone(),
                    stop_sequence: k + 1,
                })
            }
        };
        let can_board = trip.nodes_can_board.get(k).copied().unwrap_or(false);
        let can_unboard = trip.nodes_can_unboard.get(k).copied().unwrap_or(false);
        stop_times.push(StopTime {
            trip_id: trip.id.clone(),
            arrival_time,
            departure_time,
            stop_id: stop_id.clone(),
            stop_sequence: k + 1,
            stop_headsign: None,
            pickup_type: u8::from(!can_board),
            drop_off_type: u8::from(!can_unboard),
            continuous_pickup: 1,
            continuous_drop_off: 1,
            shape_dist_traveled: kilometers(distance),
            timepoint: 1,
        });
    }
    Ok(stop_times)
}

fn export_schedule_batch<'a>(
    schedules: &[Schedule],
    paths: &'a CollectionWithId<Path>,
    service_to_gtfs_id: &BTreeMap<String, String>,
    used: &mut UsedObjects<'a>,
) -> Result<(Vec<Trip>, Vec<StopTime>), ExportError> {
    let mut trips = Vec::new();
    let mut stop_times = Vec::new();
    for schedule in schedules {
        let service_id = match schedule
            .service_id
            .as_ref()
            .and_then(|service_id| service_to_gtfs_id.get(service_id))
        {
            Some(service_id) => service_id,
            None => {
                debug!(
                    "schedule '{}' has no exported service, it is not exported",
                    schedule.id
                );
                continue;
            }
        };
        for trip in schedule.trips() {
            let used_path = used.path(paths, &trip.path_id).ok_or_else(|| {
                anyhow!(
                    "path '{}' not found for trip '{}' of line '{}'",
                    trip.path_id,
                    trip.id,
                    schedule.line_id
                )
            });
            let used_path = skip_error_and_warn!(used_path);
            trips.push(gtfs_trip(trip, used_path.path, &schedule.line_id, service_id));
            stop_times.extend(gtfs_stop_times(trip, used_path)?);
        }
    }
    Ok((trips, stop_times))
}

/// Write `trips.txt` and `stop_times.txt` for the schedules of the lines
/// `line_ids`.
///
/// Only the schedules of an exported service (a key of
/// `service_to_gtfs_id`) are written. Trips whose path does not exist are
/// skipped. Returns the paths used by the written trips, and the nodes of
/// these paths.
pub fn export_schedules<S, P>(
    schedule_store: &S,
    path_store: &P,
    line_ids: &[String],
    options: &ExportOptions,
    service_to_gtfs_id: &BTreeMap<String, String>,
) -> Result<ScheduleExport, ExportError>
where
    S: ScheduleStore + ?Sized,
    P: Store<Path> + ?Sized,
{
    let mut trips_file = GtfsFile::create(options, TRIPS_FILE)?;
    let mut stop_times_file = GtfsFile::create(options, STOP_TIMES_FILE)?;
    let paths = path_store.collection()?;
    let mut used = UsedObjects::default();
    for line_ids in line_ids.chunks(LINES_PER_BATCH) {
        let schedules = schedule_store.read_for_lines(line_ids)?;
        for schedules in schedules.chunks(SCHEDULES_PER_BATCH) {
            let (trips, stop_times) =
                export_schedule_batch(schedules, &paths, service_to_gtfs_id, &mut used)?;
            trips_file.write_rows(&trips)?;
            stop_times_file.write_rows(&stop_times)?;
        }
    }
    Ok(used.into_export())
}
