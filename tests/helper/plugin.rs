//! Plugin fixture and checker run utilities

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use wpvc::checker::{CheckOptions, CheckOutcome, Checker};
use wpvc::config::Settings;
use wpvc::error::CheckError;
use wpvc::index::probe::StaticProbe;
use wpvc::parser::PhpParser;

use super::FakeRelease;

/// Create a data directory inside `root`
pub fn create_data_dir(root: &TempDir) -> PathBuf {
    let data_dir = root.path().join("data");
    fs::create_dir_all(&data_dir).unwrap();
    data_dir
}

/// Create a plugin directory named `name` inside `root` with the given files
pub fn create_plugin(root: &Path, name: &str, files: &[(&str, &str)]) -> PathBuf {
    let dir = root.join(name);
    for (path, content) in files {
        let file = dir.join(path);
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(file, content).unwrap();
    }
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// Run a checker over `dirs` with default settings
pub fn run_checker(
    data_dir: &Path,
    release: &FakeRelease,
    probe: &StaticProbe,
    dirs: &[PathBuf],
    options: &CheckOptions,
) -> Result<Vec<CheckOutcome>, CheckError> {
    let parser = PhpParser::new();
    let base_name = dirs
        .first()
        .and_then(|dir| dir.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let checker = Checker::new(Settings::default(), data_dir, &parser, probe, release, &base_name);
    checker.run(dirs, options)
}
