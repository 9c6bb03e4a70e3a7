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

use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    layer::SubscriberExt as _,
    util::SubscriberInitExt as _,
};
use transit_exchange::{
    configuration::read_config,
    gtfs::{self, ProgressEvent, ProgressSink, StoreStages},
    store::{NetworkStores, Store},
    Result,
};

#[derive(Debug, Parser)]
#[command(
    name = "transit2gtfs",
    about = "Export the agencies of a transit network as a GTFS archive.",
    version
)]
struct Opt {
    /// Directory of the network JSON stores.
    #[arg(short = 'i', long = "input", default_value = ".")]
    input: PathBuf,

    /// Output directory, receiving the gtfs/ directory and gtfs.zip.
    #[arg(short = 'o', long = "output")]
    output: PathBuf,

    /// Agency to export, may be repeated. Every agency is exported if none
    /// is given.
    #[arg(short = 'a', long = "agency")]
    agencies: Vec<String>,

    /// JSON configuration file of the export.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Date of the services without validity period, format YYYY-MM-DD.
    /// Overrides the one of the configuration.
    #[arg(short = 'd', long = "export-date")]
    export_date: Option<NaiveDate>,
}

fn init_logger() {
    let default_level = LevelFilter::INFO;
    let rust_log =
        std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_else(|_| default_level.to_string());
    let env_filter_subscriber = EnvFilter::try_new(rust_log).unwrap_or_else(|e| {
        eprintln!(
            "invalid {}, falling back to level '{}' - {}",
            EnvFilter::DEFAULT_ENV,
            default_level,
            e,
        );
        EnvFilter::new(default_level.to_string())
    });
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter_subscriber)
        .init();
}

fn run(opt: Opt) -> Result<()> {
    info!("Launching transit2gtfs...");

    let stores = NetworkStores::read(&opt.input)?;
    let mut settings = read_config(opt.config)?;
    if opt.export_date.is_some() {
        settings.export_date = opt.export_date;
    }
    let agency_ids = if opt.agencies.is_empty() {
        stores
            .agencies
            .collection()?
            .values()
            .map(|agency| agency.id.clone())
            .collect()
    } else {
        opt.agencies
    };

    let progress = |event: ProgressEvent| debug!("{}: {}", event.name, event.progress);
    let zip_name = gtfs::export(
        &StoreStages::from(&stores),
        &agency_ids,
        &opt.output,
        &settings,
        Some(&progress as &dyn ProgressSink),
    )?;
    info!("GTFS written to {:?}", opt.output.join(zip_name));
    Ok(())
}

fn main() {
    init_logger();
    if let Err(err) = run(Opt::parse()) {
        for cause in err.chain() {
            eprintln!("{cause}");
        }
        std::process::exit(1);
    }
}
