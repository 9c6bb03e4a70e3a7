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

//! The `transit_exchange` crate exchanges transit network data (agencies,
//! lines, services, schedules, nodes and paths) with
//! [GTFS](https://gtfs.org/) feeds.
//!
//! Export goes through [`gtfs::export`], which runs one stage per entity type
//! and packages the produced files into a zip archive. Import of JSON or
//! GeoJSON records into a [`store::Store`] goes through
//! [`import::CollectionImporter`].

#![deny(missing_docs)]

pub mod configuration;
pub mod gtfs;
pub mod id_mapper;
pub mod import;
pub mod modes;
pub mod objects;
pub(crate) mod serde_utils;
pub mod store;
#[doc(hidden)]
pub mod test_utils;
pub(crate) mod utils;

/// The error type used by the crate.
pub type Error = anyhow::Error;

/// The corresponding result type used by the crate.
pub type Result<T> = std::result::Result<T, Error>;
