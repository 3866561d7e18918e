//! Output directory layout, image downloads and JSON reports.
//!
//! ```text
//! <root>/
//!   brands/<brand>/original/<name>_<timestamp>.png
//!   catalog/
//!   logs/
//!   results.json
//!   brand_summary.json
//! ```

use crate::aggregate::{BatchResults, BatchSummary, BrandBreakdown};
use crate::config::OutputConfig;
use crate::error::StorageError;
use crate::generation::GenerationResult;
use crate::product::sanitize_file_component;
use crate::provider::ProviderRegistry;
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const RESULTS_FILE: &str = "results.json";
pub const BRAND_SUMMARY_FILE: &str = "brand_summary.json";

#[derive(Debug, Clone)]
pub struct OutputWriter {
    root: PathBuf,
    organize_by_brand: bool,
    download_images: bool,
}

#[derive(Serialize)]
struct ResultsReport<'a> {
    summary: &'a BatchSummary,
    results: &'a [GenerationResult],
}

impl OutputWriter {
    pub fn new(config: &OutputConfig) -> Self {
        Self {
            root: config.dir.clone(),
            organize_by_brand: config.organize_by_brand,
            download_images: config.download_images,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the directory skeleton.
    pub fn prepare(&self) -> Result<(), StorageError> {
        for dir in ["brands", "catalog", "logs"] {
            std::fs::create_dir_all(self.root.join(dir))?;
        }
        Ok(())
    }

    /// Where a result's original image goes.
    pub fn image_path(&self, brand: &str, stem: &str) -> PathBuf {
        let file = format!("{}_{}.png", stem, Utc::now().format("%Y%m%d_%H%M%S"));
        if self.organize_by_brand {
            self.root
                .join("brands")
                .join(sanitize_file_component(brand))
                .join("original")
                .join(file)
        } else {
            self.root.join("brands").join(file)
        }
    }

    /// Fetch every successful image through the provider that produced it.
    ///
    /// Best effort: a failed download is logged and the result keeps no local path.
    /// Returns the number of images saved.
    pub async fn download_results(
        &self,
        results: &mut BatchResults,
        registry: &ProviderRegistry,
    ) -> usize {
        if !self.download_images {
            return 0;
        }

        let mut saved = 0;
        for result in &mut results.successful {
            let Some(url) = result.image_url.clone() else {
                continue;
            };
            let Some(provider) = result.provider_used.and_then(|kind| registry.get(kind)) else {
                warn!(product = %result.product_name, "No provider to download result with");
                continue;
            };

            let bytes = match provider.download_result(&url).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(product = %result.product_name, url = %url, error = %e, "Image download failed");
                    continue;
                }
            };

            let stem = sanitize_file_component(&result.product_name);
            let path = self.image_path(&result.brand_name, &stem);
            match write_file(&path, &bytes) {
                Ok(()) => {
                    debug!(path = %path.display(), bytes = bytes.len(), "Image saved");
                    result.local_image_path = Some(path.to_string_lossy().into_owned());
                    saved += 1;
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Cannot save image"),
            }
        }

        results.refresh_all();
        info!(saved, total = results.successful.len(), "Downloaded generated images");
        saved
    }

    /// Write `results.json` and `brand_summary.json`.
    pub fn write_reports(
        &self,
        results: &BatchResults,
        summary: &BatchSummary,
        brands: &BTreeMap<String, BrandBreakdown>,
    ) -> Result<Vec<PathBuf>, StorageError> {
        let results_path = self.root.join(RESULTS_FILE);
        let report = ResultsReport {
            summary,
            results: &results.all,
        };
        write_file(&results_path, &serde_json::to_vec_pretty(&report)?)?;

        let brands_path = self.root.join(BRAND_SUMMARY_FILE);
        write_file(&brands_path, &serde_json::to_vec_pretty(brands)?)?;

        info!(
            results = %results_path.display(),
            brands = %brands_path.display(),
            "Reports written"
        );
        Ok(vec![results_path, brands_path])
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    Ok(())
}
