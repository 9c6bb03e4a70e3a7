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

use crate::Result;
use anyhow::{bail, Context};
use std::fs::File;
use std::io::{self, BufWriter};
use std::path;
use tracing::debug;
use walkdir::WalkDir;

/// Zip every file found under `source_path` into `zip_file`, each file being
/// streamed into the archive. Entries are named after their path relative to
/// `source_path`, in file name order.
///
/// Returns the number of files added, an error if there is none.
pub fn zip_to<P, R>(source_path: P, zip_file: R) -> Result<usize>
where
    P: AsRef<path::Path>,
    R: AsRef<path::Path>,
{
    let source_path = source_path.as_ref();
    let zip_file = zip_file.as_ref();
    let mut files = Vec::new();
    for entry in WalkDir::new(source_path).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Error reading {source_path:?}"))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    if files.is_empty() {
        bail!("No files found for GTFS export in folder {:?}", source_path);
    }

    let file = File::create(zip_file).with_context(|| format!("Error creating {zip_file:?}"))?;
    let mut zip = zip::ZipWriter::new(BufWriter::new(file));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    for path in &files {
        let name = path.strip_prefix(source_path)?.to_string_lossy().replace('\\', "/");
        debug!("adding {:?} as {:?} ...", path, name);
        zip.start_file(name.as_str(), options)
            .with_context(|| format!("Error zipping {path:?}"))?;
        let mut f = File::open(path).with_context(|| format!("Error reading {path:?}"))?;
        io::copy(&mut f, &mut zip).with_context(|| format!("Error zipping {path:?}"))?;
    }
    zip.finish()
        .with_context(|| format!("Error writing {zip_file:?}"))?;
    Ok(files.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Read;
    use tempfile::tempdir;

    #[test]
    fn zip_files_in_name_order() {
        let tmp_dir = tempdir().expect("create temp dir");
        let source = tmp_dir.path().join("gtfs");
        std::fs::create_dir(&source).unwrap();
        std::fs::write(source.join("stops.txt"), "stop_id\n1\n").unwrap();
        std::fs::write(source.join("agency.txt"), "agency_id\nA\n").unwrap();
        let zip_path = tmp_dir.path().join("gtfs.zip");

        assert_eq!(2, zip_to(&source, &zip_path).unwrap());

        let mut archive = zip::ZipArchive::new(File::open(&zip_path).unwrap()).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(vec!["agency.txt", "stops.txt"], sorted);
        let mut content = String::new();
        archive
            .by_name("stops.txt")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!("stop_id\n1\n", content);
        tmp_dir.close().expect("delete temp dir");
    }

    #[test]
    fn zip_empty_directory_fails() {
        let tmp_dir = tempdir().expect("create temp dir");
        let zip_path = tmp_dir.path().join("gtfs.zip");
        let error = zip_to(tmp_dir.path(), &zip_path).unwrap_err();
        assert!(error.to_string().starts_with("No files found for GTFS export"));
        assert!(!zip_path.exists());
        tmp_dir.close().expect("delete temp dir");
    }
}
