//! wordpress.org release API client

use std::fs::{self, File};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::ReleaseError;
use crate::release::ReleaseSource;
use crate::version::Version;

/// Default base URL of the version-check API
pub const DEFAULT_API_BASE_URL: &str = "https://api.wordpress.org";

/// Default base URL of release downloads
pub const DEFAULT_DOWNLOAD_BASE_URL: &str = "https://downloads.w.org";

/// Channel that also offers betas and release candidates
pub const DEFAULT_CHANNEL: &str = "beta";

/// Timeout for version-check queries (30 seconds)
const QUERY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct VersionCheckResponse {
    #[serde(default)]
    offers: Vec<Offer>,
}

#[derive(Debug, Deserialize)]
struct Offer {
    current: String,
}

pub struct WordPressOrg {
    client: reqwest::blocking::Client,
    api_base_url: String,
    download_base_url: String,
    channel: String,
    pretend_release: Option<String>,
}

impl WordPressOrg {
    pub fn new(api_base_url: &str, download_base_url: &str) -> Result<Self, ReleaseError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("wpvc/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            download_base_url: download_base_url.trim_end_matches('/').to_string(),
            channel: DEFAULT_CHANNEL.to_string(),
            pretend_release: None,
        })
    }

    pub fn with_channel(mut self, channel: &str) -> Self {
        self.channel = channel.to_string();
        self
    }

    /// Ask the API to offer `release` as if it had been published
    pub fn with_pretend_release(mut self, release: Option<String>) -> Self {
        self.pretend_release = release;
        self
    }

    fn version_check_url(&self) -> String {
        format!("{}/core/version-check/1.7/", self.api_base_url)
    }

    fn download_url(&self, version: &Version) -> String {
        format!(
            "{}/release/wordpress-{}.zip",
            self.download_base_url, version
        )
    }
}

impl ReleaseSource for WordPressOrg {
    fn latest_version(&self) -> Result<Version, ReleaseError> {
        let mut query = vec![("channel", self.channel.as_str())];
        if let Some(release) = &self.pretend_release {
            query.push(("pretend_releases[]", release.as_str()));
        }

        let url = reqwest::Url::parse_with_params(&self.version_check_url(), &query)
            .map_err(|e| ReleaseError::InvalidResponse(format!("Invalid API URL: {}", e)))?;

        info!("Querying version API on channel {}", self.channel);
        let response = self.client.get(url).timeout(QUERY_TIMEOUT).send()?;

        let status = response.status();
        if !status.is_success() {
            warn!("Version API returned status {}", status);
            return Err(ReleaseError::InvalidResponse(format!(
                "Unexpected status: {}",
                status
            )));
        }

        let body: VersionCheckResponse = response.json().map_err(|e| {
            warn!("Failed to parse version API response: {}", e);
            ReleaseError::InvalidResponse(e.to_string())
        })?;

        let current = body
            .offers
            .into_iter()
            .next()
            .map(|offer| offer.current)
            .ok_or_else(|| ReleaseError::InvalidResponse("No offers in response".to_string()))?;

        let latest = current
            .parse()
            .map_err(|_| ReleaseError::InvalidResponse(format!("Invalid version '{}'", current)))?;
        info!("Latest WordPress version: {}", latest);
        Ok(latest)
    }

    fn download(&self, version: &Version, dest: &Path) -> Result<(), ReleaseError> {
        let url = self.download_url(version);
        info!("Downloading WordPress {} from {}", version, url);

        let mut response = self.client.get(&url).send()?;
        let status = response.status();
        if !status.is_success() {
            warn!("Download returned status {}: {}", status, url);
            return Err(ReleaseError::InvalidResponse(format!(
                "Unexpected status: {}",
                status
            )));
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|source| ReleaseError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let mut file = File::create(dest).map_err(|source| ReleaseError::Io {
            path: dest.to_path_buf(),
            source,
        })?;
        let bytes = response.copy_to(&mut file)?;

        info!("Downloaded {} bytes to {:?}", bytes, dest);
        Ok(())
    }
}
