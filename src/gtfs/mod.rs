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

//! [GTFS](https://gtfs.org/) export.
//!
//! The export runs one stage per object type, in dependency order: agencies,
//! lines, services, schedules, nodes and paths. Each stage writes its files
//! and hands the identifiers the next stages need (see [`AgencyExport`],
//! [`LineExport`], [`ServiceExport`] and [`ScheduleExport`]). The files are
//! then packaged into a zip archive.

mod schedules;
mod write;

pub use self::schedules::export_schedules;
pub use self::write::{export_agencies, export_lines, export_nodes, export_paths, export_services};

use crate::objects::{Agency, Date, Line, Node, Path, Service};
use crate::store::{NetworkStores, ScheduleStore, Store, StoreError};
use crate::utils::zip_to;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{self, PathBuf};
use tracing::{info, warn};

/// Name of the agencies file
pub const AGENCY_FILE: &str = "agency.txt";
/// Name of the routes file
pub const ROUTES_FILE: &str = "routes.txt";
/// Name of the calendar file
pub const CALENDAR_FILE: &str = "calendar.txt";
/// Name of the calendar exceptions file
pub const CALENDAR_DATES_FILE: &str = "calendar_dates.txt";
/// Name of the trips file
pub const TRIPS_FILE: &str = "trips.txt";
/// Name of the stop times file
pub const STOP_TIMES_FILE: &str = "stop_times.txt";
/// Name of the stops file
pub const STOPS_FILE: &str = "stops.txt";
/// Name of the shapes file
pub const SHAPES_FILE: &str = "shapes.txt";

/// Name of the zip archive produced by [`export`]
pub const ZIP_FILE_NAME: &str = "gtfs.zip";
/// Sub-directory of the output directory receiving the GTFS files
pub const GTFS_DIRECTORY: &str = "gtfs";
/// Progress label of the export stages
pub const PREPARATION_PROGRESS: &str = "GTFSExporterPreparation";
/// Progress label of the archive creation
pub const ZIPPING_PROGRESS: &str = "GTFSExporterZipping";

const EXPORT_STEPS: u32 = 7;

/// Errors of the GTFS export
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// A requested agency is not in the store
    #[error("unknown agency '{0}'")]
    UnknownAgency(String),
    /// A requested line is not in the store
    #[error("unknown line '{0}'")]
    UnknownLine(String),
    /// A requested service is not in the store
    #[error("unknown service '{0}'")]
    UnknownService(String),
    /// A requested node is not in the store
    #[error("unknown node '{0}'")]
    UnknownNode(String),
    /// A requested path is not in the store
    #[error("unknown path '{0}'")]
    UnknownPath(String),
    /// The mode of a line has no GTFS route type
    #[error("unknown route mode '{mode}' for line '{line_id}'")]
    UnknownRouteMode {
        /// Identifier of the line
        line_id: String,
        /// Mode of the line
        mode: String,
    },
    /// The agency of a line is not in `agency.txt`
    #[error("agency '{agency_id}' of line '{line_id}' is not exported")]
    AgencyNotExported {
        /// Identifier of the line
        line_id: String,
        /// Identifier of the agency
        agency_id: String,
    },
    /// A node has no point geography
    #[error("node '{0}' has no point geography")]
    NodeWithoutPoint(String),
    /// A trip has neither arrival nor departure time at a stop
    #[error("missing both arrival_time and departure_time for trip '{trip_id}' at stop_sequence {stop_sequence}")]
    MissingStopTime {
        /// Identifier of the trip
        trip_id: String,
        /// Sequence of the stop in the trip, starting at 1
        stop_sequence: usize,
    },
    /// Reading a store failed
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Writing a file failed
    #[error("error writing {path:?}")]
    Io {
        /// Path of the file
        path: PathBuf,
        /// Cause of the failure
        #[source]
        source: std::io::Error,
    },
    /// Serializing rows failed
    #[error("error serializing rows of {path:?}")]
    Csv {
        /// Path of the file
        path: PathBuf,
        /// Cause of the failure
        #[source]
        source: csv::Error,
    },
    /// Creating the zip archive failed
    #[error(transparent)]
    Packaging(anyhow::Error),
}

/// Which values are quoted in the GTFS files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotePolicy {
    /// Quote values containing a delimiter, a quote or a new line
    #[default]
    Necessary,
    /// Quote every value that is not a number
    NonNumeric,
    /// Quote every value
    Always,
}

impl From<QuotePolicy> for csv::QuoteStyle {
    fn from(policy: QuotePolicy) -> Self {
        match policy {
            QuotePolicy::Necessary => csv::QuoteStyle::Necessary,
            QuotePolicy::NonNumeric => csv::QuoteStyle::NonNumeric,
            QuotePolicy::Always => csv::QuoteStyle::Always,
        }
    }
}

/// Settings of a whole export
#[derive(Debug, Clone)]
pub struct ExportSettings {
    /// Quoting of the values
    pub quote: QuotePolicy,
    /// Whether to add the `tr_*` columns
    pub include_custom_fields: bool,
    /// Timezone of the agencies without one, and of the export date
    pub timezone: Tz,
    /// Date used for services without validity period, today in `timezone`
    /// if not set
    pub export_date: Option<Date>,
}

impl Default for ExportSettings {
    fn default() -> Self {
        ExportSettings {
            quote: QuotePolicy::default(),
            include_custom_fields: true,
            timezone: chrono_tz::UTC,
            export_date: None,
        }
    }
}

impl ExportSettings {
    /// Options of the stages writing in `directory_path`
    pub fn options<P: Into<PathBuf>>(&self, directory_path: P) -> ExportOptions {
        let export_date = self.export_date.unwrap_or_else(|| {
            chrono::Utc::now()
                .with_timezone(&self.timezone)
                .date_naive()
        });
        ExportOptions {
            directory_path: directory_path.into(),
            quote: self.quote,
            include_custom_fields: self.include_custom_fields,
            timezone: self.timezone,
            export_date,
        }
    }
}

/// Options shared by the export stages
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Directory receiving the files
    pub directory_path: PathBuf,
    /// Quoting of the values
    pub quote: QuotePolicy,
    /// Whether to add the `tr_*` columns
    pub include_custom_fields: bool,
    /// Timezone of the agencies without one
    pub timezone: Tz,
    /// Date used for services without validity period
    pub export_date: Date,
}

/// Output of the agencies stage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgencyExport {
    /// Lines of the exported agencies, in agency order
    pub line_ids: Vec<String>,
    /// GTFS identifier of each exported agency
    pub agency_to_gtfs_id: BTreeMap<String, String>,
}

/// Output of the lines stage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineExport {
    /// Lines written to the routes file
    pub line_ids: Vec<String>,
    /// Services used by the written lines, without duplicates
    pub service_ids: Vec<String>,
}

/// Output of the services stage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceExport {
    /// GTFS identifier of each exported service
    pub service_to_gtfs_id: BTreeMap<String, String>,
}

/// Output of the schedules stage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleExport {
    /// Nodes of the paths used by the exported trips
    pub node_ids: Vec<String>,
    /// Paths used by the exported trips
    pub path_ids: Vec<String>,
}

/// A progress notification of the export
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    /// Label of the running step
    pub name: &'static str,
    /// Completion, between 0 and 1
    pub progress: f64,
}

/// Receiver of progress notifications
pub trait ProgressSink {
    /// Called on each progress notification
    fn emit(&self, event: ProgressEvent);
}

impl<F: Fn(ProgressEvent)> ProgressSink for F {
    fn emit(&self, event: ProgressEvent) {
        self(event)
    }
}

fn emit(sink: Option<&dyn ProgressSink>, name: &'static str, progress: f64) {
    if let Some(sink) = sink {
        sink.emit(ProgressEvent { name, progress });
    }
}

// Completion notified when the export ends, whether it succeeded or not
struct PreparationDone<'a>(Option<&'a dyn ProgressSink>);

impl Drop for PreparationDone<'_> {
    fn drop(&mut self) {
        emit(self.0, PREPARATION_PROGRESS, 1.0);
    }
}

/// The stages of an export.
///
/// [`StoreStages`] runs the stages on stores; tests may substitute their own.
pub trait GtfsStages {
    /// Write the agencies
    fn export_agencies(
        &self,
        agency_ids: &[String],
        options: &ExportOptions,
    ) -> Result<AgencyExport, ExportError>;

    /// Write the lines as routes
    fn export_lines(
        &self,
        line_ids: &[String],
        options: &ExportOptions,
        agency_to_gtfs_id: &BTreeMap<String, String>,
    ) -> Result<LineExport, ExportError>;

    /// Write the services as calendars
    fn export_services(
        &self,
        service_ids: &[String],
        options: &ExportOptions,
    ) -> Result<ServiceExport, ExportError>;

    /// Write the trips and stop times of the lines
    fn export_schedules(
        &self,
        line_ids: &[String],
        options: &ExportOptions,
        service_to_gtfs_id: &BTreeMap<String, String>,
    ) -> Result<ScheduleExport, ExportError>;

    /// Write the nodes as stops
    fn export_nodes(&self, node_ids: &[String], options: &ExportOptions)
        -> Result<(), ExportError>;

    /// Write the paths as shapes
    fn export_paths(&self, path_ids: &[String], options: &ExportOptions)
        -> Result<(), ExportError>;
}

/// Export stages reading from stores
pub struct StoreStages<'a> {
    /// Store of the agencies
    pub agencies: &'a dyn Store<Agency>,
    /// Store of the lines
    pub lines: &'a dyn Store<Line>,
    /// Store of the services
    pub services: &'a dyn Store<Service>,
    /// Store of the schedules
    pub schedules: &'a dyn ScheduleStore,
    /// Store of the nodes
    pub nodes: &'a dyn Store<Node>,
    /// Store of the paths
    pub paths: &'a dyn Store<Path>,
}

impl<'a> From<&'a NetworkStores> for StoreStages<'a> {
    fn from(stores: &'a NetworkStores) -> Self {
        StoreStages {
            agencies: &stores.agencies,
            lines: &stores.lines,
            services: &stores.services,
            schedules: &stores.schedules,
            nodes: &stores.nodes,
            paths: &stores.paths,
        }
    }
}

impl GtfsStages for StoreStages<'_> {
    fn export_agencies(
        &self,
        agency_ids: &[String],
        options: &ExportOptions,
    ) -> Result<AgencyExport, ExportError> {
        export_agencies(self.agencies, self.lines, agency_ids, options)
    }

    fn export_lines(
        &self,
        line_ids: &[String],
        options: &ExportOptions,
        agency_to_gtfs_id: &BTreeMap<String, String>,
    ) -> Result<LineExport, ExportError> {
        export_lines(self.lines, line_ids, options, agency_to_gtfs_id)
    }

    fn export_services(
        &self,
        service_ids: &[String],
        options: &ExportOptions,
    ) -> Result<ServiceExport, ExportError> {
        export_services(self.services, service_ids, options)
    }

    fn export_schedules(
        &self,
        line_ids: &[String],
        options: &ExportOptions,
        service_to_gtfs_id: &BTreeMap<String, String>,
    ) -> Result<ScheduleExport, ExportError> {
        export_schedules(
            self.schedules,
            self.paths,
            line_ids,
            options,
            service_to_gtfs_id,
        )
    }

    fn export_nodes(
        &self,
        node_ids: &[String],
        options: &ExportOptions,
    ) -> Result<(), ExportError> {
        export_nodes(self.nodes, node_ids, options)
    }

    fn export_paths(
        &self,
        path_ids: &[String],
        options: &ExportOptions,
    ) -> Result<(), ExportError> {
        export_paths(self.paths, path_ids, options)
    }
}

/// Export the agencies `agency_ids`, with their lines, services, schedules,
/// nodes and paths, as a GTFS archive.
///
/// The files are written in the `gtfs` sub-directory of `output_dir`, then
/// zipped into `output_dir/gtfs.zip`. Returns the name of the archive.
///
/// The export stops at the first failing stage and returns its error. Files
/// already written are left as they are. Two exports must not share an
/// output directory.
pub fn export<S, P>(
    stages: &S,
    agency_ids: &[String],
    output_dir: P,
    settings: &ExportSettings,
    progress: Option<&dyn ProgressSink>,
) -> Result<String, ExportError>
where
    S: GtfsStages + ?Sized,
    P: AsRef<path::Path>,
{
    emit(progress, PREPARATION_PROGRESS, 0.0);
    let _done = PreparationDone(progress);

    let output_dir = output_dir.as_ref();
    info!("Exporting GTFS to {:?}", output_dir);
    let gtfs_dir = output_dir.join(GTFS_DIRECTORY);
    std::fs::create_dir_all(&gtfs_dir).map_err(|source| ExportError::Io {
        path: gtfs_dir.clone(),
        source,
    })?;
    let options = settings.options(&gtfs_dir);
    let mut completed = 0;
    let mut step_done = || {
        completed += 1;
        let fraction = f64::from(completed) / f64::from(EXPORT_STEPS);
        emit(
            progress,
            PREPARATION_PROGRESS,
            (fraction * 100.0).round() / 100.0,
        );
    };

    let agencies = stages.export_agencies(agency_ids, &options)?;
    step_done();
    let lines = stages.export_lines(&agencies.line_ids, &options, &agencies.agency_to_gtfs_id)?;
    step_done();
    let services = stages.export_services(&lines.service_ids, &options)?;
    step_done();
    let schedules =
        stages.export_schedules(&lines.line_ids, &options, &services.service_to_gtfs_id)?;
    step_done();
    stages.export_nodes(&schedules.node_ids, &options)?;
    step_done();
    stages.export_paths(&schedules.path_ids, &options)?;
    step_done();

    write_zip(&gtfs_dir, &output_dir.join(ZIP_FILE_NAME), progress)?;
    Ok(ZIP_FILE_NAME.to_string())
}

fn write_zip(
    gtfs_dir: &path::Path,
    zip_file: &path::Path,
    progress: Option<&dyn ProgressSink>,
) -> Result<(), ExportError> {
    emit(progress, ZIPPING_PROGRESS, 0.0);
    info!("Writing GTFS to ZIP File {:?}", zip_file);
    emit(progress, ZIPPING_PROGRESS, 0.1);
    zip_to(gtfs_dir, zip_file).map_err(ExportError::Packaging)?;
    emit(progress, ZIPPING_PROGRESS, 1.0);
    Ok(())
}

/// Keep a 6 hexadecimal digits color, without its leading `#`
pub(crate) fn gtfs_color(color: Option<&str>, object_id: &str) -> Option<String> {
    let color = color?.trim();
    if color.is_empty() {
        return None;
    }
    let hex = color.strip_prefix('#').unwrap_or(color);
    if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(hex.to_string())
    } else {
        warn!("invalid color {:?} of '{}' is not exported", color, object_id);
        None
    }
}

/// A GTFS file being written by a stage.
///
/// The file is created, or truncated, as soon as the stage starts and closed
/// when dropped.
pub(crate) struct GtfsFile {
    path: PathBuf,
    file: File,
    quote: QuotePolicy,
    header_written: bool,
}

impl GtfsFile {
    pub(crate) fn create(options: &ExportOptions, name: &str) -> Result<Self, ExportError> {
        info!(file_name = %name, "Writing");
        let path = options.directory_path.join(name);
        let file = File::create(&path).map_err(|source| ExportError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(GtfsFile {
            path,
            file,
            quote: options.quote,
            header_written: false,
        })
    }

    /// Serialize `rows` in memory and write them with a single call, with the
    /// header if it is not already in the file.
    pub(crate) fn write_rows<R: Serialize>(&mut self, rows: &[R]) -> Result<(), ExportError> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(!self.header_written)
            .quote_style(self.quote.into())
            .from_writer(Vec::new());
        for row in rows {
            wtr.serialize(row).map_err(|source| ExportError::Csv {
                path: self.path.clone(),
                source,
            })?;
        }
        let buffer = wtr.into_inner().map_err(|e| ExportError::Io {
            path: self.path.clone(),
            source: e.into_error(),
        })?;
        self.file
            .write_all(&buffer)
            .map_err(|source| ExportError::Io {
                path: self.path.clone(),
                source,
            })?;
        self.header_written = true;
        Ok(())
    }
}

#[derive(Serialize, Debug, PartialEq)]
struct GtfsAgency {
    #[serde(rename = "agency_id")]
    id: String,
    #[serde(rename = "agency_name")]
    name: String,
    #[serde(rename = "agency_url")]
    url: String,
    #[serde(rename = "agency_timezone")]
    timezone: String,
    #[serde(rename = "agency_lang")]
    lang: Option<String>,
    #[serde(rename = "agency_phone")]
    phone: Option<String>,
    #[serde(rename = "agency_fare_url")]
    fare_url: Option<String>,
    #[serde(rename = "agency_email")]
    email: Option<String>,
    #[serde(rename = "tr_agency_color", skip_serializing_if = "Option::is_none")]
    tr_color: Option<String>,
    #[serde(
        rename = "tr_agency_description",
        skip_serializing_if = "Option::is_none"
    )]
    tr_description: Option<String>,
}

#[derive(Serialize, Debug, PartialEq)]
struct Route {
    #[serde(rename = "route_id")]
    id: String,
    agency_id: String,
    #[serde(rename = "route_short_name")]
    short_name: Option<String>,
    #[serde(rename = "route_long_name")]
    long_name: Option<String>,
    #[serde(rename = "route_desc")]
    desc: Option<String>,
    route_type: u16,
    #[serde(rename = "route_url")]
    url: Option<String>,
    #[serde(rename = "route_color")]
    color: Option<String>,
    #[serde(rename = "route_text_color")]
    text_color: Option<String>,
    #[serde(rename = "route_sort_order")]
    sort_order: Option<u32>,
    continuous_pickup: Option<u8>,
    continuous_drop_off: Option<u8>,
    #[serde(
        rename = "tr_route_internal_id",
        skip_serializing_if = "Option::is_none"
    )]
    tr_internal_id: Option<String>,
    #[serde(
        rename = "tr_route_row_category",
        skip_serializing_if = "Option::is_none"
    )]
    tr_row_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tr_is_autonomous: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tr_allow_same_route_transfers: Option<bool>,
}

#[derive(Serialize, Debug, PartialEq)]
struct Calendar {
    #[serde(rename = "service_id")]
    id: String,
    #[serde(serialize_with = "crate::serde_utils::ser_from_bool")]
    monday: bool,
    #[serde(serialize_with = "crate::serde_utils::ser_from_bool")]
    tuesday: bool,
    #[serde(serialize_with = "crate::serde_utils::ser_from_bool")]
    wednesday: bool,
    #[serde(serialize_with = "crate::serde_utils::ser_from_bool")]
    thursday: bool,
    #[serde(serialize_with = "crate::serde_utils::ser_from_bool")]
    friday: bool,
    #[serde(serialize_with = "crate::serde_utils::ser_from_bool")]
    saturday: bool,
    #[serde(serialize_with = "crate::serde_utils::ser_from_bool")]
    sunday: bool,
    #[serde(serialize_with = "crate::serde_utils::ser_from_naive_date")]
    start_date: Date,
    #[serde(serialize_with = "crate::serde_utils::ser_from_naive_date")]
    end_date: Date,
    #[serde(rename = "tr_service_desc", skip_serializing_if = "Option::is_none")]
    tr_desc: Option<String>,
    #[serde(rename = "tr_service_color", skip_serializing_if = "Option::is_none")]
    tr_color: Option<String>,
}

#[derive(Serialize, Debug, PartialEq)]
struct CalendarDate {
    service_id: String,
    #[serde(serialize_with = "crate::serde_utils::ser_from_naive_date")]
    date: Date,
    exception_type: ExceptionType,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
enum ExceptionType {
    #[serde(rename = "1")]
    Add,
    #[serde(rename = "2")]
    Remove,
}

#[derive(Serialize, Debug, PartialEq)]
struct Stop {
    #[serde(rename = "stop_id")]
    id: String,
    #[serde(rename = "stop_code")]
    code: Option<String>,
    #[serde(rename = "stop_name")]
    name: Option<String>,
    #[serde(rename = "stop_desc")]
    desc: Option<String>,
    #[serde(rename = "stop_lat")]
    lat: String,
    #[serde(rename = "stop_lon")]
    lon: String,
    location_type: u8,
    #[serde(rename = "tr_node_color", skip_serializing_if = "Option::is_none")]
    tr_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tr_routing_radius_meters: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tr_default_dwell_time_seconds: Option<u32>,
}

#[derive(Serialize, Debug, PartialEq)]
struct Shape {
    #[serde(rename = "shape_id")]
    id: String,
    #[serde(rename = "shape_pt_lat")]
    lat: String,
    #[serde(rename = "shape_pt_lon")]
    lon: String,
    #[serde(rename = "shape_pt_sequence")]
    sequence: usize,
    #[serde(rename = "shape_dist_traveled")]
    dist_traveled: String,
    #[serde(
        rename = "tr_shape_routing_mode",
        skip_serializing_if = "Option::is_none"
    )]
    tr_routing_mode: Option<String>,
    #[serde(
        rename = "tr_shape_routing_engine",
        skip_serializing_if = "Option::is_none"
    )]
    tr_routing_engine: Option<String>,
}

#[derive(Serialize, Debug, PartialEq)]
struct Trip {
    route_id: String,
    service_id: String,
    #[serde(rename = "trip_id")]
    id: String,
    #[serde(rename = "trip_headsign")]
    headsign: Option<String>,
    #[serde(rename = "trip_short_name")]
    short_name: Option<String>,
    #[serde(rename = "direction_id")]
    direction: u8,
    block_id: Option<String>,
    shape_id: String,
    wheelchair_accessible: Option<u8>,
    bikes_allowed: Option<u8>,
}

#[derive(Serialize, Debug, PartialEq)]
struct StopTime {
    trip_id: String,
    #[serde(serialize_with = "crate::serde_utils::ser_from_seconds")]
    arrival_time: u32,
    #[serde(serialize_with = "crate::serde_utils::ser_from_seconds")]
    departure_time: u32,
    stop_id: String,
    stop_sequence: usize,
    stop_headsign: Option<String>,
    pickup_type: u8,
    drop_off_type: u8,
    continuous_pickup: u8,
    continuous_drop_off: u8,
    shape_dist_traveled: String,
    timepoint: u8,
}

/// Meters to kilometers, rounded to the meter
fn kilometers(meters: f64) -> String {
    (meters.round() / 1000.0).to_string()
}
