use crate::types::{CropPolicy, LookFactors};
use std::path::{Path, PathBuf};

/// Deterministic output path for a prepared raster.
///
/// `<dir>/<stem>[_<ext>]_<looks>rlks_<crop>cr.tif`, where the input extension is kept in
/// the stem unless it already is `tif`. The same input and settings always map to the
/// same file.
pub fn prepared_path(
    input: &Path,
    output_dir: Option<&Path>,
    looks: LookFactors,
    crop: CropPolicy,
) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let base = match input.extension().and_then(|e| e.to_str()) {
        Some("tif") | None => stem,
        Some(ext) => format!("{}_{}", stem, ext),
    };

    let dir = output_dir
        .map(Path::to_path_buf)
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_default();

    dir.join(format!(
        "{}_{}rlks_{}cr.tif",
        base,
        looks.y_looks,
        crop.option()
    ))
}
