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

//! Configuration of a GTFS export.

use crate::{
    gtfs::{ExportSettings, QuotePolicy},
    objects::Date,
    Result,
};
use anyhow::Context;
use chrono_tz::Tz;
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path;
use tracing::info;

#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
struct Config {
    timezone: Option<Tz>,
    include_custom_fields: Option<bool>,
    quote: Option<QuotePolicy>,
    export_date: Option<Date>,
}

/// Read a JSON configuration file giving the [`ExportSettings`].
///
/// Every key is optional, the default settings being used without a file.
/// Below is an example of this file
/// ```text
/// {
///     "timezone": "America/Montreal",
///     "include_custom_fields": false,
///     "quote": "non_numeric",
///     "export_date": "2024-03-15"
/// }
/// ```
/// `quote` is one of `necessary`, `non_numeric` or `always`.
pub fn read_config<P: AsRef<path::Path>>(config_path: Option<P>) -> Result<ExportSettings> {
    let config = match config_path {
        Some(config_path) => {
            let config_path = config_path.as_ref();
            info!("Reading export settings from {:?}", config_path);
            let json_config_file = File::open(config_path)
                .with_context(|| format!("Error reading {config_path:?}"))?;
            serde_json::from_reader(BufReader::new(json_config_file))
                .with_context(|| format!("Error reading {config_path:?}"))?
        }
        None => Config::default(),
    };

    let mut settings = ExportSettings::default();
    if let Some(timezone) = config.timezone {
        settings.timezone = timezone;
    }
    if let Some(include_custom_fields) = config.include_custom_fields {
        settings.include_custom_fields = include_custom_fields;
    }
    if let Some(quote) = config.quote {
        settings.quote = quote;
    }
    settings.export_date = config.export_date;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn default_settings_without_file() {
        let settings = read_config(None::<&str>).unwrap();
        assert_eq!(chrono_tz::UTC, settings.timezone);
        assert!(settings.include_custom_fields);
        assert_eq!(QuotePolicy::Necessary, settings.quote);
        assert_eq!(None, settings.export_date);
    }

    #[test]
    fn settings_from_file() {
        let tmp_dir = tempdir().expect("create temp dir");
        let config_path = tmp_dir.path().join("config.json");
        std::fs::write(
            &config_path,
            r#"{
                "timezone": "America/Montreal",
                "include_custom_fields": false,
                "quote": "non_numeric",
                "export_date": "2024-03-15"
            }"#,
        )
        .unwrap();
        let settings = read_config(Some(&config_path)).unwrap();
        assert_eq!(chrono_tz::America::Montreal, settings.timezone);
        assert!(!settings.include_custom_fields);
        assert_eq!(QuotePolicy::NonNumeric, settings.quote);
        assert_eq!(NaiveDate::from_ymd_opt(2024, 3, 15), settings.export_date);
        tmp_dir.close().expect("delete temp dir");
    }

    #[test]
    fn partial_settings_from_file() {
        let tmp_dir = tempdir().expect("create temp dir");
        let config_path = tmp_dir.path().join("config.json");
        std::fs::write(&config_path, r#"{"quote": "always"}"#).unwrap();
        let settings = read_config(Some(&config_path)).unwrap();
        assert_eq!(QuotePolicy::Always, settings.quote);
        assert!(settings.include_custom_fields);
        tmp_dir.close().expect("delete temp dir");
    }

    #[test]
    fn invalid_timezone_fails() {
        let tmp_dir = tempdir().expect("create temp dir");
        let config_path = tmp_dir.path().join("config.json");
        std::fs::write(&config_path, r#"{"timezone": "Mars/Olympus"}"#).unwrap();
        let error = read_config(Some(&config_path)).unwrap_err();
        assert!(error.to_string().starts_with("Error reading"));
        tmp_dir.close().expect("delete temp dir");
    }
}
