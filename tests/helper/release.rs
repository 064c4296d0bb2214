//! Release source test utilities

use std::cell::Cell;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use zip::write::SimpleFileOptions;

use wpvc::error::ReleaseError;
use wpvc::release::ReleaseSource;
use wpvc::version::Version;

/// In-process release source serving one WordPress release as a zip archive
pub struct FakeRelease {
    version: String,
    files: Vec<(String, String)>,
    offline: bool,
    queries: Cell<usize>,
    downloads: Cell<usize>,
}

impl FakeRelease {
    pub fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
            files: Vec::new(),
            offline: false,
            queries: Cell::new(0),
            downloads: Cell::new(0),
        }
    }

    /// Add a file to the release, `path` relative to the WordPress root
    pub fn with_file(mut self, path: &str, content: &str) -> Self {
        self.files.push((path.to_string(), content.to_string()));
        self
    }

    /// Fail every request as if the network were down
    pub fn offline(mut self) -> Self {
        self.offline = true;
        self
    }

    pub fn queries(&self) -> usize {
        self.queries.get()
    }

    pub fn downloads(&self) -> usize {
        self.downloads.get()
    }
}

impl ReleaseSource for FakeRelease {
    fn latest_version(&self) -> Result<Version, ReleaseError> {
        self.queries.set(self.queries.get() + 1);
        if self.offline {
            return Err(ReleaseError::InvalidResponse("offline".to_string()));
        }
        Ok(self.version.parse().unwrap())
    }

    fn download(&self, version: &Version, dest: &Path) -> Result<(), ReleaseError> {
        self.downloads.set(self.downloads.get() + 1);
        if self.offline {
            return Err(ReleaseError::InvalidResponse("offline".to_string()));
        }

        let file = File::create(dest).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file("wordpress/wp-includes/version.php", SimpleFileOptions::default())
            .unwrap();
        write!(zip, "<?php\n$wp_version = '{}';\n", version).unwrap();
        for (path, content) in &self.files {
            zip.start_file(format!("wordpress/{}", path), SimpleFileOptions::default())
                .unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
        Ok(())
    }
}
