use crate::config::CoherenceConfig;
use crate::types::{PrepError, PrepResult};
use regex::Regex;
use std::path::{Path, PathBuf};

/// Acquisition date pair naming an interferogram, e.g. `20151025-20160501`
const EPOCH_PATTERN: &str = r"\d{8}-\d{8}";

/// Extract the `YYYYMMDD-YYYYMMDD` epoch from a file name
pub fn epoch_of(path: &Path) -> PrepResult<Option<String>> {
    let name = match path.file_name() {
        Some(name) => name.to_string_lossy(),
        None => return Ok(None),
    };
    let pattern = Regex::new(EPOCH_PATTERN)
        .map_err(|e| PrepError::Processing(format!("Regex error: {}", e)))?;
    Ok(pattern.find(&name).map(|m| m.as_str().to_string()))
}

/// Name of the converted GeoTIFF for a listed coherence file.
///
/// `x_filt.cc` becomes `x_filt_cc.tif`; names already ending in `.tif` are kept.
fn converted_name(name: &str) -> String {
    let path = Path::new(name);
    match path.extension().and_then(|e| e.to_str()) {
        Some("tif") => name.to_string(),
        Some(ext) => {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            format!("{}_{}.tif", stem, ext)
        }
        None => format!("{}.tif", name),
    }
}

/// Locate the coherence raster paired with an interferogram.
///
/// Returns `None` when no coherence masking is configured. When masking is
/// configured, an interferogram without an epoch or without a matching file
/// is a configuration error.
pub fn coherence_path_for(ifg_path: &Path, config: &CoherenceConfig) -> PrepResult<Option<PathBuf>> {
    if config.files.is_empty() {
        return Ok(None);
    }

    let epoch = epoch_of(ifg_path)?.ok_or_else(|| {
        PrepError::Configuration(format!(
            "no acquisition epoch in interferogram name {}",
            ifg_path.display()
        ))
    })?;

    let mut matches = config.files.iter().filter(|name| name.contains(&epoch));
    let name = matches.next().ok_or_else(|| {
        PrepError::Configuration(format!(
            "no coherence file listed for epoch {} ({})",
            epoch,
            ifg_path.display()
        ))
    })?;
    if matches.next().is_some() {
        log::warn!("Several coherence files match epoch {}, using {}", epoch, name);
    }

    let dir = config
        .dir
        .clone()
        .or_else(|| ifg_path.parent().map(Path::to_path_buf))
        .unwrap_or_default();

    Ok(Some(dir.join(converted_name(name))))
}
