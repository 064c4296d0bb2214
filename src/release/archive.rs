//! Release archive extraction

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use zip::ZipArchive;

use crate::error::ReleaseError;

/// Top-level directory every release archive nests its files under
const ARCHIVE_ROOT: &str = "wordpress";

/// Entry path with the leading `wordpress/` component removed
fn strip_archive_root(path: &Path) -> PathBuf {
    path.strip_prefix(ARCHIVE_ROOT).unwrap_or(path).to_path_buf()
}

/// Extract `archive` into `dest`, flattening the archive's root directory.
/// Returns the number of files written.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<usize, ReleaseError> {
    info!("Extracting {:?} to {:?}", archive, dest);

    let file = File::open(archive).map_err(|source| ReleaseError::Io {
        path: archive.to_path_buf(),
        source,
    })?;
    let mut zip = ZipArchive::new(BufReader::new(file)).map_err(|source| ReleaseError::Extraction {
        path: archive.to_path_buf(),
        source,
    })?;

    let mut written = 0;
    for idx in 0..zip.len() {
        let mut entry = zip.by_index(idx).map_err(|source| ReleaseError::Extraction {
            path: archive.to_path_buf(),
            source,
        })?;

        let Some(name) = entry.enclosed_name() else {
            debug!("Skipping unsafe archive entry {}", entry.name());
            continue;
        };
        let relative = strip_archive_root(&name);
        if relative.as_os_str().is_empty() {
            continue;
        }
        let target = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(|source| ReleaseError::Io {
                path: target.clone(),
                source,
            })?;
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|source| ReleaseError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let mut out = File::create(&target).map_err(|source| ReleaseError::Io {
            path: target.clone(),
            source,
        })?;
        io::copy(&mut entry, &mut out).map_err(|source| ReleaseError::Io {
            path: target.clone(),
            source,
        })?;
        written += 1;
    }

    info!("Extracted {} files", written);
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn write_archive(path: &Path, entries: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        for (name, content) in entries {
            if name.ends_with('/') {
                zip.add_directory(*name, SimpleFileOptions::default()).unwrap();
            } else {
                zip.start_file(*name, SimpleFileOptions::default()).unwrap();
                zip.write_all(content.as_bytes()).unwrap();
            }
        }
        zip.finish().unwrap();
    }

    #[test]
    fn extract_archive_strips_root_directory() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("wordpress-6.7.1.zip");
        write_archive(
            &archive,
            &[
                ("wordpress/", ""),
                ("wordpress/wp-includes/", ""),
                ("wordpress/wp-includes/version.php", "<?php\n$wp_version = '6.7.1';\n"),
                ("wordpress/index.php", "<?php\n"),
            ],
        );
        let dest = temp_dir.path().join("wordpress");

        let written = extract_archive(&archive, &dest).unwrap();

        assert_eq!(written, 2);
        assert!(dest.join("wp-includes/version.php").is_file());
        assert!(dest.join("index.php").is_file());
        assert!(!dest.join("wordpress").exists());
    }

    #[test]
    fn extract_archive_rejects_corrupt_archive() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("broken.zip");
        fs::write(&archive, b"not a zip").unwrap();

        let result = extract_archive(&archive, &temp_dir.path().join("out"));

        assert!(matches!(result, Err(ReleaseError::Extraction { .. })));
    }

    #[test]
    fn strip_archive_root_keeps_other_paths() {
        assert_eq!(
            strip_archive_root(Path::new("wordpress/wp-admin/admin.php")),
            PathBuf::from("wp-admin/admin.php")
        );
        assert_eq!(
            strip_archive_root(Path::new("other/file.php")),
            PathBuf::from("other/file.php")
        );
    }
}
