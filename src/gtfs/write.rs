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

use super::{
    gtfs_color, kilometers, AgencyExport, Calendar, CalendarDate, ExceptionType, ExportError,
    ExportOptions, GtfsAgency, GtfsFile, LineExport, Route, ServiceExport, Shape, Stop,
    AGENCY_FILE, CALENDAR_DATES_FILE, CALENDAR_FILE, ROUTES_FILE, SHAPES_FILE, STOPS_FILE,
};
use crate::id_mapper::IdMapper;
use crate::modes::{gtfs_route_type, GtfsRouteType};
use crate::objects::{Agency, Line, Node, Path, Service};
use crate::store::Store;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

// Keep the value only when the tr_* columns are written. A written column
// must have a value on every row, hence the empty string default.
fn custom_field(options: &ExportOptions, value: Option<String>) -> Option<String> {
    options
        .include_custom_fields
        .then(|| value.unwrap_or_default())
}

fn gtfs_agency(agency: &Agency, gtfs_id: String, options: &ExportOptions) -> GtfsAgency {
    GtfsAgency {
        id: gtfs_id,
        name: agency
            .name
            .clone()
            .or_else(|| agency.acronym.clone())
            .unwrap_or_default(),
        url: agency.url.clone().unwrap_or_default(),
        timezone: agency
            .timezone
            .clone()
            .unwrap_or_else(|| options.timezone.name().to_string()),
        lang: agency.lang.clone(),
        phone: agency.phone.clone(),
        fare_url: agency.fare_url.clone(),
        email: agency.email.clone(),
        tr_color: custom_field(options, gtfs_color(agency.color.as_deref(), &agency.id)),
        tr_description: custom_field(options, agency.description.clone()),
    }
}

/// Write `agency.txt` for the agencies `agency_ids`.
///
/// Returns the lines of these agencies, found in `line_store`, and the GTFS
/// identifier of each agency: its slugified acronym, or its own identifier.
pub fn export_agencies<S, L>(
    store: &S,
    line_store: &L,
    agency_ids: &[String],
    options: &ExportOptions,
) -> Result<AgencyExport, ExportError>
where
    S: Store<Agency> + ?Sized,
    L: Store<Line> + ?Sized,
{
    let mut file = GtfsFile::create(options, AGENCY_FILE)?;
    let agencies = store.collection()?;
    let lines = line_store.collection()?;
    let mut mapper = IdMapper::default();
    let mut line_ids = Vec::new();
    let mut rows = Vec::with_capacity(agency_ids.len());
    for agency_id in agency_ids {
        let agency = agencies
            .get(agency_id)
            .ok_or_else(|| ExportError::UnknownAgency(agency_id.clone()))?;
        let gtfs_id = mapper.map(&agency.id, agency.acronym.as_deref());
        line_ids.extend(
            lines
                .values()
                .filter(|line| line.agency_id == agency.id)
                .map(|line| line.id.clone()),
        );
        rows.push(gtfs_agency(agency, gtfs_id, options));
    }
    file.write_rows(&rows)?;
    Ok(AgencyExport {
        line_ids,
        agency_to_gtfs_id: mapper.into_map(),
    })
}

fn route(
    line: &Line,
    route_type: u16,
    agency_id: String,
    options: &ExportOptions,
) -> Route {
    let gtfs = line.gtfs.clone().unwrap_or_default();
    Route {
        id: line.id.clone(),
        agency_id,
        short_name: line.shortname.clone(),
        long_name: line.longname.clone(),
        desc: line.description.clone(),
        route_type,
        url: gtfs.route_url,
        color: gtfs_color(line.color.as_deref(), &line.id),
        text_color: gtfs_color(
            line.text_color
                .as_deref()
                .or(gtfs.route_text_color.as_deref()),
            &line.id,
        ),
        sort_order: gtfs.route_sort_order,
        continuous_pickup: gtfs.continuous_pickup,
        continuous_drop_off: gtfs.continuous_drop_off,
        tr_internal_id: custom_field(options, line.internal_id.clone()),
        tr_row_category: custom_field(options, line.category.clone()),
        tr_is_autonomous: options.include_custom_fields.then_some(line.is_autonomous),
        tr_allow_same_route_transfers: options
            .include_custom_fields
            .then_some(line.allow_same_line_transfers),
    }
}

/// Write `routes.txt` for the lines `line_ids`.
///
/// Lines whose mode is not exported to GTFS are skipped. A line of unknown
/// mode is an error. Returns the lines written and the services they use.
pub fn export_lines<S>(
    store: &S,
    line_ids: &[String],
    options: &ExportOptions,
    agency_to_gtfs_id: &BTreeMap<String, String>,
) -> Result<LineExport, ExportError>
where
    S: Store<Line> + ?Sized,
{
    let mut file = GtfsFile::create(options, ROUTES_FILE)?;
    let lines = store.collection()?;
    let mut exported_line_ids = Vec::with_capacity(line_ids.len());
    let mut service_ids = Vec::new();
    let mut seen_services = HashSet::new();
    let mut rows = Vec::with_capacity(line_ids.len());
    for line_id in line_ids {
        let line = lines
            .get(line_id)
            .ok_or_else(|| ExportError::UnknownLine(line_id.clone()))?;
        let route_type = match gtfs_route_type(&line.mode) {
            Some(GtfsRouteType::Export(route_type)) => route_type,
            Some(GtfsRouteType::Omit) => {
                debug!("line '{}' of mode '{}' is not exported", line.id, line.mode);
                continue;
            }
            None => {
                return Err(ExportError::UnknownRouteMode {
                    line_id: line.id.clone(),
                    mode: line.mode.clone(),
                })
            }
        };
        let agency_id = agency_to_gtfs_id.get(&line.agency_id).cloned().ok_or_else(|| {
            ExportError::AgencyNotExported {
                line_id: line.id.clone(),
                agency_id: line.agency_id.clone(),
            }
        })?;
        rows.push(route(line, route_type, agency_id, options));
        exported_line_ids.push(line.id.clone());
        for service_id in &line.service_ids {
            if seen_services.insert(service_id.clone()) {
                service_ids.push(service_id.clone());
            }
        }
    }
    file.write_rows(&rows)?;
    Ok(LineExport {
        line_ids: exported_line_ids,
        service_ids,
    })
}

fn calendar(service: &Service, gtfs_id: String, options: &ExportOptions) -> Calendar {
    Calendar {
        id: gtfs_id,
        monday: service.monday,
        tuesday: service.tuesday,
        wednesday: service.wednesday,
        thursday: service.thursday,
        friday: service.friday,
        saturday: service.saturday,
        sunday: service.sunday,
        start_date: service.start_date.unwrap_or(options.export_date),
        end_date: service.end_date.unwrap_or(options.export_date),
        tr_desc: custom_field(options, service.description.clone()),
        tr_color: custom_field(options, gtfs_color(service.color.as_deref(), &service.id)),
    }
}

fn calendar_dates(service: &Service, gtfs_id: &str) -> Vec<CalendarDate> {
    let only_dates = service
        .only_dates
        .iter()
        .map(|date| (*date, ExceptionType::Add));
    let except_dates = service
        .except_dates
        .iter()
        .map(|date| (*date, ExceptionType::Remove));
    only_dates
        .chain(except_dates)
        .map(|(date, exception_type)| CalendarDate {
            service_id: gtfs_id.to_string(),
            date,
            exception_type,
        })
        .collect()
}

/// Write `calendar.txt`, and `calendar_dates.txt` for the dates added to or
/// removed from the services, for the services `service_ids`.
///
/// Returns the GTFS identifier of each service: its slugified name, or its
/// own identifier.
pub fn export_services<S>(
    store: &S,
    service_ids: &[String],
    options: &ExportOptions,
) -> Result<ServiceExport, ExportError>
where
    S: Store<Service> + ?Sized,
{
    let mut file = GtfsFile::create(options, CALENDAR_FILE)?;
    let mut dates_file = GtfsFile::create(options, CALENDAR_DATES_FILE)?;
    let services = store.collection()?;
    let mut mapper = IdMapper::default();
    let mut rows = Vec::with_capacity(service_ids.len());
    let mut date_rows = Vec::new();
    for service_id in service_ids {
        let service = services
            .get(service_id)
            .ok_or_else(|| ExportError::UnknownService(service_id.clone()))?;
        let gtfs_id = mapper.map(&service.id, service.name.as_deref());
        date_rows.extend(calendar_dates(service, &gtfs_id));
        rows.push(calendar(service, gtfs_id, options));
    }
    file.write_rows(&rows)?;
    dates_file.write_rows(&date_rows)?;
    Ok(ServiceExport {
        service_to_gtfs_id: mapper.into_map(),
    })
}

fn stop(node: &Node, options: &ExportOptions) -> Result<Stop, ExportError> {
    let point = node
        .point()
        .ok_or_else(|| ExportError::NodeWithoutPoint(node.id.clone()))?;
    Ok(Stop {
        id: node.id.clone(),
        code: node.code.clone(),
        name: node.name.clone(),
        desc: node.description.clone(),
        lat: point.y().to_string(),
        lon: point.x().to_string(),
        location_type: 0,
        tr_color: custom_field(options, gtfs_color(node.color.as_deref(), &node.id)),
        tr_routing_radius_meters: options
            .include_custom_fields
            .then_some(node.routing_radius_meters),
        tr_default_dwell_time_seconds: options
            .include_custom_fields
            .then_some(node.default_dwell_time_seconds),
    })
}

/// Write `stops.txt` for the nodes `node_ids`.
pub fn export_nodes<S>(
    store: &S,
    node_ids: &[String],
    options: &ExportOptions,
) -> Result<(), ExportError>
where
    S: Store<Node> + ?Sized,
{
    let mut file = GtfsFile::create(options, STOPS_FILE)?;
    let nodes = store.collection()?;
    let rows = node_ids
        .iter()
        .map(|node_id| {
            let node = nodes
                .get(node_id)
                .ok_or_else(|| ExportError::UnknownNode(node_id.clone()))?;
            stop(node, options)
        })
        .collect::<Result<Vec<_>, _>>()?;
    file.write_rows(&rows)
}

fn shapes(path: &Path, options: &ExportOptions) -> Vec<Shape> {
    let distances = path.distances_traveled_meters();
    path.points()
        .into_iter()
        .zip(distances)
        .enumerate()
        .map(|(sequence, (point, distance))| Shape {
            id: path.id.clone(),
            lat: point.y().to_string(),
            lon: point.x().to_string(),
            sequence,
            dist_traveled: kilometers(distance),
            tr_routing_mode: custom_field(options, path.routing_mode.clone()),
            tr_routing_engine: custom_field(options, path.routing_engine.clone()),
        })
        .collect()
}

/// Write `shapes.txt` for the paths `path_ids`, one point per coordinate of
/// each path.
pub fn export_paths<S>(
    store: &S,
    path_ids: &[String],
    options: &ExportOptions,
) -> Result<(), ExportError>
where
    S: Store<Path> + ?Sized,
{
    let mut file = GtfsFile::create(options, SHAPES_FILE)?;
    let paths = store.collection()?;
    let mut rows = Vec::new();
    for path_id in path_ids {
        let path = paths
            .get(path_id)
            .ok_or_else(|| ExportError::UnknownPath(path_id.clone()))?;
        rows.extend(shapes(path, options));
    }
    file.write_rows(&rows)
}
