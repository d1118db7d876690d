//! Best-effort persistence of debug artifacts and extracted results.

use std::path::{Path, PathBuf};

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::config::Settings;
use crate::models::{ExtractionReport, FlightRecord};
use crate::request::SearchRequest;

/// Stable filename for the most recent result set.
const LATEST_RESULTS_FILE: &str = "flight_data.json";

/// Writes page snapshots, screenshots, and result files under the data
/// directory.
///
/// Every save is best-effort: a failed write logs a warning and returns
/// `None` rather than aborting a crawl that has already done the hard work.
pub struct ArtifactStore {
    data_dir: PathBuf,
    artifacts_dir: PathBuf,
    enabled: bool,
}

impl ArtifactStore {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            data_dir: settings.data_dir.clone(),
            artifacts_dir: settings.artifacts_dir(),
            enabled: settings.save_artifacts,
        }
    }

    fn stamp() -> String {
        Utc::now().format("%Y%m%d_%H%M%S").to_string()
    }

    fn short_hash(content: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content);
        let digest = hex::encode(hasher.finalize());
        digest[..8].to_string()
    }

    fn write(&self, path: &Path, content: &[u8]) -> Option<PathBuf> {
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!("Could not create {}: {}", parent.display(), e);
                return None;
            }
        }
        match std::fs::write(path, content) {
            Ok(()) => {
                debug!("Saved {}", path.display());
                Some(path.to_path_buf())
            }
            Err(e) => {
                warn!("Could not write {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Snapshot page HTML, named by kind, timestamp, and content hash.
    pub fn save_html(&self, kind: &str, html: &str) -> Option<PathBuf> {
        if !self.enabled {
            return None;
        }
        let name = format!(
            "{}_{}_{}.html",
            kind,
            Self::stamp(),
            Self::short_hash(html.as_bytes())
        );
        self.write(&self.artifacts_dir.join(name), html.as_bytes())
    }

    /// Save a PNG screenshot alongside the HTML snapshots.
    pub fn save_screenshot(&self, kind: &str, png: &[u8]) -> Option<PathBuf> {
        if !self.enabled {
            return None;
        }
        let name = format!("{}_{}_{}.png", kind, Self::stamp(), Self::short_hash(png));
        self.write(&self.artifacts_dir.join(name), png)
    }

    /// Persist the per-tier extraction report for a finished crawl.
    pub fn save_report(&self, report: &ExtractionReport) -> Option<PathBuf> {
        if !self.enabled {
            return None;
        }
        let body = match serde_json::to_vec_pretty(report) {
            Ok(body) => body,
            Err(e) => {
                warn!("Could not serialize extraction report: {}", e);
                return None;
            }
        };
        let name = format!("report_{}_{}.json", Self::stamp(), Self::short_hash(&body));
        self.write(&self.artifacts_dir.join(name), &body)
    }

    /// Write extracted flights to a timestamped file plus a stable
    /// `flight_data.json` that always holds the latest run.
    ///
    /// Result files are written regardless of the artifact toggle; they are
    /// the product of the crawl, not debug output.
    pub fn save_results(
        &self,
        request: &SearchRequest,
        records: &[FlightRecord],
    ) -> Option<PathBuf> {
        let body = match serde_json::to_vec_pretty(records) {
            Ok(body) => body,
            Err(e) => {
                warn!("Could not serialize flight records: {}", e);
                return None;
            }
        };
        let name = format!(
            "flight_data_{}_{}_{}_{}.json",
            request.origin(),
            request.destination(),
            request.date(),
            Self::stamp()
        );
        let path = self.write(&self.data_dir.join(name), &body)?;
        self.write(&self.data_dir.join(LATEST_RESULTS_FILE), &body);
        Some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FlightCandidate;
    use crate::models::ExtractionTier;
    use crate::normalize;

    fn store(dir: &Path, enabled: bool) -> ArtifactStore {
        let mut settings = Settings::with_data_dir(dir.to_path_buf());
        settings.save_artifacts = enabled;
        ArtifactStore::from_settings(&settings)
    }

    #[test]
    fn saves_html_under_artifacts_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path(), true);

        let path = store.save_html("results_page", "<html></html>").unwrap();
        assert!(path.starts_with(dir.path().join("artifacts")));
        assert!(path.extension().is_some_and(|e| e == "html"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "<html></html>");
    }

    #[test]
    fn disabled_store_skips_debug_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path(), false);

        assert!(store.save_html("results_page", "<html></html>").is_none());
        assert!(store.save_screenshot("homepage", &[1, 2, 3]).is_none());
        assert!(!dir.path().join("artifacts").exists());
    }

    #[test]
    fn results_are_saved_even_when_artifacts_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path(), false);

        let request = SearchRequest::new("SFO", "NRT", "2026-09-15", true).unwrap();
        let mut candidate = FlightCandidate::new(ExtractionTier::Dom);
        candidate.miles = Some(70_000);
        let records = normalize::normalize_batch(&[candidate], &request);

        let path = store.save_results(&request, &records).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("flight_data_SFO_NRT_2026-09-15_"));

        let latest = dir.path().join(LATEST_RESULTS_FILE);
        assert_eq!(
            std::fs::read(&path).unwrap(),
            std::fs::read(&latest).unwrap()
        );

        let parsed: Vec<FlightRecord> = serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn filenames_embed_content_hash() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path(), true);

        let a = store.save_html("page", "<p>one</p>").unwrap();
        let b = store.save_html("page", "<p>two</p>").unwrap();
        assert_ne!(a, b);
    }
}
