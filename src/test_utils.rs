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

//! Helpers shared by the integration tests

use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Content of a file, panicking when it can't be read
pub fn get_file_content<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();
    fs::read_to_string(path).unwrap_or_else(|_| panic!("file {:?} not found", path))
}

/// Check that every file of `files_to_check` in `output_dir` has the same
/// content as its counterpart in `expected_dir`
pub fn compare_output_dir_with_expected<P: AsRef<Path>>(
    output_dir: P,
    files_to_check: &[&str],
    expected_dir: &str,
) {
    let output_dir = output_dir.as_ref();
    for file_name in files_to_check {
        let output_contents = get_file_content(output_dir.join(file_name));
        let expected_contents = get_file_content(Path::new(expected_dir).join(file_name));
        assert_eq!(
            expected_contents,
            output_contents,
            "content of {} differs",
            file_name
        );
    }
}

/// Names of the entries of a zip archive, sorted
pub fn zip_entries<P: AsRef<Path>>(zip_file: P) -> Vec<String> {
    let file = fs::File::open(zip_file.as_ref()).expect("open zip file");
    let archive = zip::ZipArchive::new(file).expect("read zip file");
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    names
}

/// Run `func` with a temporary directory, deleted afterwards
pub fn test_in_tmp_dir<F>(func: F)
where
    F: FnOnce(&Path),
{
    let tmp_dir = TempDir::new().expect("create temp dir");
    func(tmp_dir.path());
    tmp_dir.close().expect("delete temp dir");
}
