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

use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::{fs::File, io::BufReader, path::PathBuf};
use tracing::info;
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    layer::SubscriberExt as _,
    util::SubscriberInitExt as _,
};
use transit_exchange::{
    import::{
        AgenciesImporter, ImportSummary, LinesImporter, NodesImporter, PathsImporter,
        ServicesImporter,
    },
    store::NetworkStores,
    Result,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ObjectType {
    Agencies,
    Lines,
    Services,
    Nodes,
    Paths,
}

#[derive(Debug, Parser)]
#[command(
    name = "import-objects",
    about = "Import JSON records or GeoJSON features into the stores of a transit network.",
    version
)]
struct Opt {
    /// File of the objects: a JSON array, newline-delimited JSON, or a
    /// GeoJSON feature collection for nodes and paths.
    #[arg(short = 'i', long = "input")]
    input: PathBuf,

    /// Directory of the network JSON stores, updated in place.
    #[arg(short = 's', long = "store", default_value = ".")]
    store: PathBuf,

    /// Type of the imported objects.
    #[arg(short = 't', long = "type", value_enum)]
    object_type: ObjectType,
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
    info!("Launching import-objects...");

    let stores = NetworkStores::read(&opt.store)?;
    let input = &opt.input;
    let file = File::open(input).with_context(|| format!("Error reading {input:?}"))?;
    let reader = BufReader::new(file);
    let summary: ImportSummary = match opt.object_type {
        ObjectType::Agencies => AgenciesImporter::new(&stores.agencies).import(reader),
        ObjectType::Lines => LinesImporter::new(&stores.lines).import(reader),
        ObjectType::Services => ServicesImporter::new(&stores.services).import(reader),
        ObjectType::Nodes => NodesImporter::new(&stores.nodes).import(reader),
        ObjectType::Paths => PathsImporter::new(&stores.paths).import(reader),
    }
    .with_context(|| format!("Error importing {input:?}"))?;
    info!(
        created = summary.created,
        updated = summary.updated,
        "{:?} imported",
        opt.object_type
    );

    stores.write(&opt.store)?;
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
